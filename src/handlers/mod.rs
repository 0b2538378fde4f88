pub mod health;
pub mod recipes;
