pub mod recipe;

pub use recipe::{OwnerId, Recipe, RecipeFields, RecipeId};
