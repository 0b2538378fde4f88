use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

use super::store::{RecipeStore, StoreError};
use crate::models::{OwnerId, Recipe, RecipeFields, RecipeId};

/// In-memory recipe store for tests and local development
#[derive(Debug, Default)]
pub struct MemoryRecipeStore {
    records: RwLock<Vec<Recipe>>,
    calls: AtomicUsize,
}

impl MemoryRecipeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of store operations served so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RecipeStore for MemoryRecipeStore {
    async fn find_by_owner(&self, owner: &OwnerId) -> Result<Vec<Recipe>, StoreError> {
        self.record_call();
        let records = self.records.read().await;
        Ok(records.iter().filter(|r| r.is_owned_by(owner)).cloned().collect())
    }

    async fn find_one(&self, id: RecipeId, owner: &OwnerId) -> Result<Option<Recipe>, StoreError> {
        self.record_call();
        let records = self.records.read().await;
        Ok(records
            .iter()
            .find(|r| r.id == id && r.is_owned_by(owner))
            .cloned())
    }

    async fn create(&self, owner: &OwnerId, fields: RecipeFields) -> Result<Recipe, StoreError> {
        self.record_call();
        let recipe = Recipe::new(RecipeId::new(), owner.clone(), fields);
        self.records.write().await.push(recipe.clone());
        Ok(recipe)
    }

    async fn update(
        &self,
        id: RecipeId,
        owner: &OwnerId,
        fields: RecipeFields,
    ) -> Result<Option<Recipe>, StoreError> {
        self.record_call();
        let mut records = self.records.write().await;
        let Some(existing) = records.iter_mut().find(|r| r.id == id && r.is_owned_by(owner)) else {
            return Ok(None);
        };
        *existing = Recipe::new(id, owner.clone(), fields);
        Ok(Some(existing.clone()))
    }

    async fn delete_one(&self, id: RecipeId, owner: &OwnerId) -> Result<bool, StoreError> {
        self.record_call();
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| !(r.id == id && r.is_owned_by(owner)));
        Ok(records.len() != before)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
