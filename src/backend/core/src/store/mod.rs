//! Persistence collaborators for the entity aggregate.
//!
//! This module provides pluggable stores:
//! - **InMemoryStore**: process-local store for tests and dry runs
//! - **PostgresStore**: durable store backed by PostgreSQL
//!
//! Every store persists one entity (with all of its versions) atomically.
//! Writes are guarded by the entity's revision: a save based on a stale
//! snapshot fails with `ConcurrencyConflict` and changes nothing.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::config::{StoreBackend, StoreConfig};
use crate::domain::Entity;
use crate::error::Result;

pub use memory::InMemoryStore;
pub use postgres::PostgresStore;

/// Trait for entity stores.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Load an entity together with its versions.
    async fn find_entity(&self, id: &str) -> Result<Option<Entity>>;

    /// Create a fresh aggregate for `id`. Nothing is written until
    /// [`EntityStore::save_entity`] commits it.
    async fn create_entity(&self, id: &str) -> Result<Entity> {
        Ok(Entity::new(id))
    }

    /// Upsert the entity and its versions in one transaction.
    ///
    /// Returns the new revision. Fails with `ConcurrencyConflict` when the
    /// stored revision differs from `entity.revision()`.
    async fn save_entity(&self, entity: &Entity) -> Result<i64>;

    /// Remove the entity and all of its versions. Returns whether it existed.
    async fn delete_entity(&self, id: &str) -> Result<bool>;

    /// All stored entities, ordered by id.
    async fn list_entities(&self) -> Result<Vec<Entity>>;

    /// Get the store name.
    fn name(&self) -> &'static str;
}

/// Build the store selected by configuration.
pub async fn connect(config: &StoreConfig) -> Result<Arc<dyn EntityStore>> {
    let store: Arc<dyn EntityStore> = match config.backend {
        StoreBackend::Memory => Arc::new(InMemoryStore::new()),
        StoreBackend::Postgres => Arc::new(PostgresStore::connect(config).await?),
    };
    info!(store = store.name(), "Entity store ready");
    Ok(store)
}
