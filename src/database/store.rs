use async_trait::async_trait;
use thiserror::Error;

use crate::models::{OwnerId, Recipe, RecipeFields, RecipeId};

/// Errors surfaced by a recipe store backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl StoreError {
    /// Whether the failure is a connectivity problem rather than a bad query
    pub fn is_unavailable(&self) -> bool {
        match self {
            StoreError::Sqlx(err) => matches!(
                err,
                sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
            ),
        }
    }
}

/// Persistent recipe collection.
///
/// Every lookup takes the owner as a mandatory filter term, so no backend
/// can hand one user's recipe to another.
#[async_trait]
pub trait RecipeStore: Send + Sync {
    /// All recipes belonging to `owner`, in insertion order
    async fn find_by_owner(&self, owner: &OwnerId) -> Result<Vec<Recipe>, StoreError>;

    /// The recipe matching both `id` and `owner`
    async fn find_one(&self, id: RecipeId, owner: &OwnerId) -> Result<Option<Recipe>, StoreError>;

    /// Insert a new recipe. The store assigns the identifier.
    async fn create(&self, owner: &OwnerId, fields: RecipeFields) -> Result<Recipe, StoreError>;

    /// Replace the content of the recipe matching both `id` and `owner`
    async fn update(
        &self,
        id: RecipeId,
        owner: &OwnerId,
        fields: RecipeFields,
    ) -> Result<Option<Recipe>, StoreError>;

    /// Remove the recipe matching both `id` and `owner`. Returns whether a
    /// record was removed.
    async fn delete_one(&self, id: RecipeId, owner: &OwnerId) -> Result<bool, StoreError>;

    /// Cheap round trip used by the health endpoint
    async fn ping(&self) -> Result<(), StoreError>;
}
