pub mod manager;
pub mod memory;
pub mod postgres;
pub mod store;

pub use manager::{DatabaseError, DatabaseManager};
pub use memory::MemoryRecipeStore;
pub use postgres::PgRecipeStore;
pub use store::{RecipeStore, StoreError};
