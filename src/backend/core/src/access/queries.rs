//! Read access to entities and the admin disable action.

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};

use super::roles::RequestContext;
use crate::domain::Entity;
use crate::error::{CmsError, Result};
use crate::store::EntityStore;

/// What a reader gets back for one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityView {
    pub id: String,
    pub latest_published_version: Option<i32>,
    /// Payload of the latest published version.
    pub payload: Option<String>,
}

impl From<&Entity> for EntityView {
    fn from(entity: &Entity) -> Self {
        Self {
            id: entity.id().to_string(),
            latest_published_version: entity.latest_published_version(),
            payload: entity.latest_published_payload().map(str::to_string),
        }
    }
}

/// Whether `ctx` may see `entity`.
pub fn is_visible(entity: &Entity, ctx: &RequestContext) -> bool {
    ctx.is_admin()
        || (!entity.is_deleted()
            && !entity.is_disabled_by_admin()
            && entity.latest_published_version().is_some())
}

/// Role-filtered queries over an entity store.
#[derive(Clone)]
pub struct EntityQueries {
    store: Arc<dyn EntityStore>,
}

impl EntityQueries {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    /// Fetch one entity. Hidden entities are reported as not found.
    #[instrument(skip(self, ctx), fields(user = %ctx.username, role = ctx.role.id()))]
    pub async fn get_by_id(&self, ctx: &RequestContext, id: &str) -> Result<EntityView> {
        self.store
            .find_entity(id)
            .await?
            .filter(|entity| is_visible(entity, ctx))
            .map(|entity| EntityView::from(&entity))
            .ok_or_else(|| CmsError::entity_not_found(id))
    }

    /// All entities visible to the caller, ordered by id.
    pub async fn list(&self, ctx: &RequestContext) -> Result<Vec<EntityView>> {
        Ok(self
            .store
            .list_entities()
            .await?
            .iter()
            .filter(|entity| is_visible(entity, ctx))
            .map(EntityView::from)
            .collect())
    }

    /// Disable an entity. Admin only.
    #[instrument(skip(self, ctx), fields(user = %ctx.username))]
    pub async fn disable(&self, ctx: &RequestContext, id: &str) -> Result<()> {
        if !ctx.is_admin() {
            return Err(CmsError::forbidden("Only administrators may disable entities"));
        }

        let mut entity = self
            .store
            .find_entity(id)
            .await?
            .ok_or_else(|| CmsError::entity_not_found(id))?;

        entity.disable_by_admin();
        self.store.save_entity(&entity).await?;

        info!(entity_id = id, "Entity disabled by admin");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CmsEvent, EventProcessor};
    use crate::error::ErrorCode;
    use crate::store::InMemoryStore;
    use serde_json::json;

    fn publish(id: &str, version: i32, payload: serde_json::Value) -> CmsEvent {
        CmsEvent::publish(id, version, payload.to_string()).unwrap()
    }

    async fn seeded() -> (EventProcessor, EntityQueries) {
        let store: Arc<dyn EntityStore> = Arc::new(InMemoryStore::new());
        let processor = EventProcessor::new(store.clone());
        processor.apply(&publish("live", 1, json!({"t": 1}))).await.unwrap();
        processor.apply(&publish("draft", 1, json!({"t": 2}))).await.unwrap();
        processor.apply(&CmsEvent::unpublish("draft", 1)).await.unwrap();
        (processor, EntityQueries::new(store))
    }

    #[tokio::test]
    async fn test_public_sees_only_published() {
        let (_, queries) = seeded().await;
        let reader = RequestContext::public("reader");

        let view = queries.get_by_id(&reader, "live").await.unwrap();
        assert_eq!(view.latest_published_version, Some(1));
        assert_eq!(view.payload.as_deref(), Some(r#"{"t":1}"#));

        let err = queries.get_by_id(&reader, "draft").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::EntityNotFound);

        let ids: Vec<String> = queries.list(&reader).await.unwrap().into_iter().map(|v| v.id).collect();
        assert_eq!(ids, vec!["live"]);
    }

    #[tokio::test]
    async fn test_admin_sees_everything() {
        let (_, queries) = seeded().await;
        let admin = RequestContext::admin("admin");

        let draft = queries.get_by_id(&admin, "draft").await.unwrap();
        assert_eq!(draft.latest_published_version, None);
        assert_eq!(draft.payload, None);
        assert_eq!(queries.list(&admin).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_disable_requires_admin() {
        let (_, queries) = seeded().await;

        let err = queries
            .disable(&RequestContext::public("reader"), "live")
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Forbidden);

        queries.disable(&RequestContext::admin("admin"), "live").await.unwrap();
        let err = queries
            .get_by_id(&RequestContext::public("reader"), "live")
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::EntityNotFound);
        assert!(queries.get_by_id(&RequestContext::admin("admin"), "live").await.is_ok());
    }

    #[tokio::test]
    async fn test_disable_missing_entity() {
        let (_, queries) = seeded().await;
        let err = queries
            .disable(&RequestContext::admin("admin"), "ghost")
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::EntityNotFound);
    }

    #[tokio::test]
    async fn test_disabled_entity_still_accepts_events() {
        let (processor, queries) = seeded().await;
        let admin = RequestContext::admin("admin");
        queries.disable(&admin, "live").await.unwrap();

        processor.apply(&publish("live", 2, json!({"t": 3}))).await.unwrap();

        let view = queries.get_by_id(&admin, "live").await.unwrap();
        assert_eq!(view.latest_published_version, Some(2));
        assert!(queries.get_by_id(&RequestContext::public("reader"), "live").await.is_err());
    }
}
