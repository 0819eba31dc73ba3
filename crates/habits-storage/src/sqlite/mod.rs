//! SQLite-backed storage implementation.

mod habits;
mod records;
pub mod schema;
mod store;
mod transaction;

pub use store::SqliteStore;
