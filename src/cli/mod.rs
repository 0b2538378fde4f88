use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::app::{app, AppState};
use crate::auth::JwtKeys;
use crate::config::{self, AppConfig, StoreBackend};
use crate::database::DatabaseManager;

#[derive(Parser)]
#[command(name = "recipe-api")]
#[command(about = "Authenticated CRUD API for user-owned recipes")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the HTTP server (default)")]
    Serve {
        #[arg(long, help = "Port to listen on, overrides PORT")]
        port: Option<u16>,
    },

    #[command(about = "Create the recipes schema and exit")]
    Migrate,

    #[command(about = "Mint a bearer token signed with JWT_SECRET")]
    Token {
        #[arg(help = "User id the token authenticates as")]
        user_id: String,
        #[arg(long, help = "Display name stored in the token")]
        username: Option<String>,
        #[arg(long, help = "Token lifetime in hours, overrides JWT_EXPIRY_HOURS")]
        hours: Option<u64>,
    },
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = config::config();

    match cli.command.unwrap_or(Commands::Serve { port: None }) {
        Commands::Serve { port } => serve(config, port).await,
        Commands::Migrate => migrate(config).await,
        Commands::Token {
            user_id,
            username,
            hours,
        } => token(config, &user_id, username, hours),
    }
}

async fn serve(config: &AppConfig, port: Option<u16>) -> anyhow::Result<()> {
    config.validate().context("invalid configuration")?;
    tracing::info!("Starting Recipe API in {:?} mode", config.environment);

    let store = DatabaseManager::open_store(&config.database)
        .await
        .context("failed to open recipe store")?;
    let jwt = JwtKeys::from_config(&config.security)?;
    let router = app(AppState::new(store, jwt, &config.api.root), config);

    let bind_addr = format!("0.0.0.0:{}", port.unwrap_or(config.api.port));
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Recipe API listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Recipe API stopped");
    Ok(())
}

async fn migrate(config: &AppConfig) -> anyhow::Result<()> {
    if config.database.backend == StoreBackend::Memory {
        anyhow::bail!("nothing to migrate: DATABASE_BACKEND is memory");
    }

    let pool = DatabaseManager::connect(&config.database).await?;
    DatabaseManager::migrate(&pool).await?;
    pool.close().await;
    println!("Recipes schema is up to date");
    Ok(())
}

fn token(
    config: &AppConfig,
    user_id: &str,
    username: Option<String>,
    hours: Option<u64>,
) -> anyhow::Result<()> {
    let expiry_hours = hours.unwrap_or(config.security.jwt_expiry_hours);
    let keys = JwtKeys::from_secret(&config.security.jwt_secret, expiry_hours)?;
    println!("{}", keys.issue(user_id, username)?);
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
