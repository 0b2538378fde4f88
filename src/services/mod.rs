pub mod recipe_service;

pub use recipe_service::{RecipeError, RecipeService, REQUIRED_FIELDS};
