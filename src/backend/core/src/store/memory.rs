//! In-memory entity store.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::EntityStore;
use crate::domain::Entity;
use crate::error::{CmsError, Result};

/// Entity store that keeps aggregates in a concurrent hash map.
///
/// Each save replaces the whole aggregate under the map's shard lock, which
/// gives the same all-or-nothing visibility as a database transaction.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entities: DashMap<String, Entity>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EntityStore for InMemoryStore {
    async fn find_entity(&self, id: &str) -> Result<Option<Entity>> {
        Ok(self.entities.get(id).map(|e| e.value().clone()))
    }

    async fn save_entity(&self, entity: &Entity) -> Result<i64> {
        let expected = entity.revision();
        let next = expected + 1;

        match self.entities.entry(entity.id().to_string()) {
            Entry::Occupied(mut occupied) => {
                let actual = occupied.get().revision();
                if actual != expected {
                    return Err(CmsError::concurrency_conflict(entity.id(), expected, Some(actual)));
                }
                let mut stored = entity.clone();
                stored.set_revision(next);
                occupied.insert(stored);
            }
            Entry::Vacant(vacant) => {
                if expected != 0 {
                    return Err(CmsError::concurrency_conflict(entity.id(), expected, None));
                }
                let mut stored = entity.clone();
                stored.set_revision(next);
                vacant.insert(stored);
            }
        }

        Ok(next)
    }

    async fn delete_entity(&self, id: &str) -> Result<bool> {
        Ok(self.entities.remove(id).is_some())
    }

    async fn list_entities(&self) -> Result<Vec<Entity>> {
        let mut entities: Vec<Entity> = self.entities.iter().map(|e| e.value().clone()).collect();
        entities.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(entities)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
