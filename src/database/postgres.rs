use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::store::{RecipeStore, StoreError};
use crate::models::{OwnerId, Recipe, RecipeFields, RecipeId};

const RECIPE_COLUMNS: &str = "id, title, ingredients, recipe, user_id";

#[derive(Debug, sqlx::FromRow)]
struct RecipeRow {
    id: Uuid,
    title: String,
    ingredients: Vec<String>,
    recipe: String,
    user_id: String,
}

impl From<RecipeRow> for Recipe {
    fn from(row: RecipeRow) -> Self {
        Recipe {
            id: RecipeId::from(row.id),
            title: row.title,
            ingredients: row.ingredients,
            recipe: row.recipe,
            owner_id: OwnerId::new(row.user_id),
        }
    }
}

/// PostgreSQL-backed recipe store over the `recipes` table
#[derive(Debug, Clone)]
pub struct PgRecipeStore {
    pool: PgPool,
}

impl PgRecipeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecipeStore for PgRecipeStore {
    async fn find_by_owner(&self, owner: &OwnerId) -> Result<Vec<Recipe>, StoreError> {
        let sql = format!(
            "SELECT {} FROM recipes WHERE user_id = $1 ORDER BY created_at, id",
            RECIPE_COLUMNS
        );
        let rows = sqlx::query_as::<_, RecipeRow>(&sql)
            .bind(owner.as_str())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Recipe::from).collect())
    }

    async fn find_one(&self, id: RecipeId, owner: &OwnerId) -> Result<Option<Recipe>, StoreError> {
        let sql = format!(
            "SELECT {} FROM recipes WHERE id = $1 AND user_id = $2",
            RECIPE_COLUMNS
        );
        let row = sqlx::query_as::<_, RecipeRow>(&sql)
            .bind(id.as_uuid())
            .bind(owner.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Recipe::from))
    }

    async fn create(&self, owner: &OwnerId, fields: RecipeFields) -> Result<Recipe, StoreError> {
        let sql = format!(
            "INSERT INTO recipes (id, title, ingredients, recipe, user_id) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            RECIPE_COLUMNS
        );
        let row = sqlx::query_as::<_, RecipeRow>(&sql)
            .bind(RecipeId::new().as_uuid())
            .bind(&fields.title)
            .bind(&fields.ingredients)
            .bind(&fields.recipe)
            .bind(owner.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(row.into())
    }

    async fn update(
        &self,
        id: RecipeId,
        owner: &OwnerId,
        fields: RecipeFields,
    ) -> Result<Option<Recipe>, StoreError> {
        let sql = format!(
            "UPDATE recipes SET title = $3, ingredients = $4, recipe = $5 \
             WHERE id = $1 AND user_id = $2 RETURNING {}",
            RECIPE_COLUMNS
        );
        let row = sqlx::query_as::<_, RecipeRow>(&sql)
            .bind(id.as_uuid())
            .bind(owner.as_str())
            .bind(&fields.title)
            .bind(&fields.ingredients)
            .bind(&fields.recipe)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Recipe::from))
    }

    async fn delete_one(&self, id: RecipeId, owner: &OwnerId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM recipes WHERE id = $1 AND user_id = $2")
            .bind(id.as_uuid())
            .bind(owner.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
