use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::database::{RecipeStore, StoreError};
use crate::models::{OwnerId, Recipe, RecipeFields, RecipeId};

/// Body keys a recipe must carry, in the order they are checked
pub const REQUIRED_FIELDS: [&str; 3] = ["title", "ingredients", "recipe"];

#[derive(Debug, Error)]
pub enum RecipeError {
    #[error("The `id` is not valid")]
    InvalidIdentifier,

    #[error("Missing `{0}` in request body")]
    MissingField(&'static str),

    #[error("`{field}` must be {expected}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },

    /// No recipe with that id for this owner. Foreign and nonexistent ids
    /// are deliberately indistinguishable.
    #[error("Recipe not found")]
    NotFound,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Owner-scoped CRUD over recipes.
///
/// Every operation takes the authenticated owner and validates its input
/// before issuing exactly one store call.
#[derive(Clone)]
pub struct RecipeService {
    store: Arc<dyn RecipeStore>,
}

impl RecipeService {
    pub fn new(store: Arc<dyn RecipeStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self, owner: &OwnerId) -> Result<Vec<Recipe>, RecipeError> {
        let recipes = self.store.find_by_owner(owner).await?;
        debug!("Listed {} recipes for {}", recipes.len(), owner);
        Ok(recipes)
    }

    pub async fn get(&self, owner: &OwnerId, raw_id: &str) -> Result<Recipe, RecipeError> {
        let id = parse_id(raw_id)?;
        self.store
            .find_one(id, owner)
            .await?
            .ok_or(RecipeError::NotFound)
    }

    /// Create from a raw JSON body. Any owner supplied in the body is ignored.
    pub async fn create(&self, owner: &OwnerId, body: &Value) -> Result<Recipe, RecipeError> {
        let body = as_object(body);
        if let Some(missing) = REQUIRED_FIELDS.iter().find(|f| !body.contains_key(**f)) {
            return Err(RecipeError::MissingField(*missing));
        }
        let fields = parse_fields(&body)?;

        let recipe = self.store.create(owner, fields).await?;
        info!("Created recipe {} for {}", recipe.id, owner);
        Ok(recipe)
    }

    /// Full replacement of title, ingredients and recipe.
    ///
    /// Content fields are checked before the id, and every field must be
    /// truthy rather than merely present.
    pub async fn update(
        &self,
        owner: &OwnerId,
        raw_id: &str,
        body: &Value,
    ) -> Result<Recipe, RecipeError> {
        let body = as_object(body);
        if let Some(missing) = REQUIRED_FIELDS.iter().find(|f| !is_truthy(body.get(**f))) {
            return Err(RecipeError::MissingField(*missing));
        }
        let id = parse_id(raw_id)?;
        let fields = parse_fields(&body)?;

        let recipe = self
            .store
            .update(id, owner, fields)
            .await?
            .ok_or(RecipeError::NotFound)?;
        info!("Updated recipe {} for {}", recipe.id, owner);
        Ok(recipe)
    }

    /// Delete succeeds whether or not a matching recipe existed
    pub async fn delete(&self, owner: &OwnerId, raw_id: &str) -> Result<(), RecipeError> {
        let id = parse_id(raw_id)?;
        if self.store.delete_one(id, owner).await? {
            info!("Deleted recipe {} for {}", id, owner);
        } else {
            debug!("Delete of recipe {} for {} matched nothing", id, owner);
        }
        Ok(())
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        self.store.ping().await
    }
}

fn parse_id(raw: &str) -> Result<RecipeId, RecipeError> {
    RecipeId::parse(raw).ok_or(RecipeError::InvalidIdentifier)
}

/// Non-object bodies carry no fields
fn as_object(body: &Value) -> Map<String, Value> {
    body.as_object().cloned().unwrap_or_default()
}

/// Loose truthiness for JSON values: null, false, zero and the empty string
/// are falsy. Arrays and objects are truthy even when empty.
fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map_or(true, |f| f != 0.0 && !f.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

fn parse_fields(body: &Map<String, Value>) -> Result<RecipeFields, RecipeError> {
    let title = string_field(body, "title")?;

    let ingredients = match body.get("ingredients") {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect::<Option<Vec<_>>>(),
        _ => None,
    }
    .ok_or(RecipeError::InvalidField {
        field: "ingredients",
        expected: "an array of strings",
    })?;

    let recipe = string_field(body, "recipe")?;

    Ok(RecipeFields {
        title,
        ingredients,
        recipe,
    })
}

fn string_field(body: &Map<String, Value>, field: &'static str) -> Result<String, RecipeError> {
    body.get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(RecipeError::InvalidField {
            field,
            expected: "a string",
        })
}
