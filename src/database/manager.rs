use sqlx::{postgres::PgPoolOptions, PgPool};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use super::memory::MemoryRecipeStore;
use super::postgres::PgRecipeStore;
use super::store::RecipeStore;
use crate::config::{DatabaseConfig, StoreBackend};

/// Errors from DatabaseManager
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

const CREATE_RECIPES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS recipes (
    id          UUID PRIMARY KEY,
    title       TEXT NOT NULL,
    ingredients TEXT[] NOT NULL DEFAULT '{}',
    recipe      TEXT NOT NULL,
    user_id     TEXT NOT NULL,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
)"#;

const CREATE_RECIPES_OWNER_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS recipes_user_id_idx ON recipes (user_id)";

/// Builds connection pools and recipe stores from configuration
pub struct DatabaseManager;

impl DatabaseManager {
    /// Open a PostgreSQL pool with the configured limits
    pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, DatabaseError> {
        let url = config
            .url
            .as_deref()
            .ok_or(DatabaseError::ConfigMissing("DATABASE_URL"))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(url)
            .await?;

        info!("Created database pool (max {} connections)", config.max_connections);
        Ok(pool)
    }

    /// Create the recipes schema if it does not exist yet
    pub async fn migrate(pool: &PgPool) -> Result<(), DatabaseError> {
        sqlx::query(CREATE_RECIPES_TABLE).execute(pool).await?;
        sqlx::query(CREATE_RECIPES_OWNER_INDEX).execute(pool).await?;
        info!("Recipes schema is up to date");
        Ok(())
    }

    /// Build the store selected by `config.backend`, migrating postgres first
    pub async fn open_store(config: &DatabaseConfig) -> Result<Arc<dyn RecipeStore>, DatabaseError> {
        match config.backend {
            StoreBackend::Memory => {
                info!("Using in-memory recipe store; data is lost on restart");
                Ok(Arc::new(MemoryRecipeStore::new()))
            }
            StoreBackend::Postgres => {
                let pool = Self::connect(config).await?;
                Self::migrate(&pool).await?;
                Ok(Arc::new(PgRecipeStore::new(pool)))
            }
        }
    }
}
