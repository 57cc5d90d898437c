//! RegistryStore implementations: in-memory (tests) and SQLite (production).

mod memory;
mod sqlite;

pub use memory::InMemoryRegistryStore;
pub use portal_types::{Page, RegistryStore, ServiceFilter, StoreError};
pub use sqlite::SqliteRegistryStore;
