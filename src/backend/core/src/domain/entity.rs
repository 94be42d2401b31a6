//! The entity aggregate and its version history.
//!
//! All mutation goes through [`Entity`]'s own operations. After every
//! successful operation `latest_published_version` equals the highest
//! version number whose `is_published` flag is set, or `None`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{CmsError, Result};

// =============================================================================
// Entity Version
// =============================================================================

/// An immutable snapshot of an entity's content, tagged with a version number.
///
/// Only `is_published` may change after creation, and only from `true` to `false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityVersion {
    id: Uuid,
    entity_id: String,
    version: i32,
    payload: Option<String>,
    is_published: bool,
    timestamp: DateTime<Utc>,
}

impl EntityVersion {
    pub fn new(
        entity_id: impl Into<String>,
        version: i32,
        payload: Option<String>,
        is_published: bool,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            entity_id: entity_id.into(),
            version,
            payload,
            is_published,
            timestamp,
        }
    }

    /// Rehydrate a version from persisted state.
    pub fn restore(
        id: Uuid,
        entity_id: String,
        version: i32,
        payload: Option<String>,
        is_published: bool,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            entity_id,
            version,
            payload,
            is_published,
            timestamp,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn payload(&self) -> Option<&str> {
        self.payload.as_deref()
    }

    pub fn is_published(&self) -> bool {
        self.is_published
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub(crate) fn unpublish(&mut self) {
        self.is_published = false;
    }
}

// =============================================================================
// Entity
// =============================================================================

/// A content item and the versions it owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entity {
    id: String,
    is_deleted: bool,
    is_disabled_by_admin: bool,
    latest_published_version: Option<i32>,
    created_at: DateTime<Utc>,
    versions: Vec<EntityVersion>,
    /// Number of successful saves; 0 means never stored.
    #[serde(skip)]
    revision: i64,
}

impl Entity {
    /// Create an empty entity stamped with the current time.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_deleted: false,
            is_disabled_by_admin: false,
            latest_published_version: None,
            created_at: Utc::now(),
            versions: Vec::new(),
            revision: 0,
        }
    }

    /// Rehydrate an entity from persisted state.
    ///
    /// The derived `latest_published_version` is recomputed from `versions`
    /// rather than trusted from storage.
    pub fn restore(
        id: String,
        is_deleted: bool,
        is_disabled_by_admin: bool,
        created_at: DateTime<Utc>,
        versions: Vec<EntityVersion>,
        revision: i64,
    ) -> Self {
        let mut entity = Self {
            id,
            is_deleted,
            is_disabled_by_admin,
            latest_published_version: None,
            created_at,
            versions,
            revision,
        };
        entity.recompute_latest_published_version();
        entity
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_deleted(&self) -> bool {
        self.is_deleted
    }

    pub fn is_disabled_by_admin(&self) -> bool {
        self.is_disabled_by_admin
    }

    pub fn latest_published_version(&self) -> Option<i32> {
        self.latest_published_version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Versions in insertion order.
    pub fn versions(&self) -> &[EntityVersion] {
        &self.versions
    }

    /// Look up a version by its number.
    pub fn version(&self, version: i32) -> Option<&EntityVersion> {
        self.versions.iter().find(|v| v.version == version)
    }

    /// Payload of the latest published version, if any.
    pub fn latest_published_payload(&self) -> Option<&str> {
        self.latest_published_version
            .and_then(|n| self.version(n))
            .and_then(EntityVersion::payload)
    }

    pub fn revision(&self) -> i64 {
        self.revision
    }

    pub(crate) fn set_revision(&mut self, revision: i64) {
        self.revision = revision;
    }

    // -------------------------------------------------------------------------
    // Operations
    // -------------------------------------------------------------------------

    /// Append a version; a published one becomes the latest published version.
    ///
    /// Callers must have checked the publish-ordering rule first; see [`Entity::publish`].
    pub fn add_version(&mut self, version: EntityVersion) {
        if version.is_published {
            self.latest_published_version = Some(version.version);
        }
        self.versions.push(version);
    }

    /// Reset `latest_published_version` to the highest still-published version.
    pub fn recompute_latest_published_version(&mut self) {
        self.latest_published_version = self
            .versions
            .iter()
            .filter(|v| v.is_published)
            .map(|v| v.version)
            .max();
    }

    /// Mark the entity as disabled. Idempotent; version history is untouched.
    pub fn disable_by_admin(&mut self) {
        self.is_disabled_by_admin = true;
    }

    // -------------------------------------------------------------------------
    // Rules
    // -------------------------------------------------------------------------

    /// Whether `version` may be published: it must be strictly greater than
    /// the current latest published version, if there is one.
    pub fn can_publish(&self, version: i32) -> bool {
        match self.latest_published_version {
            Some(latest) => version > latest,
            None => true,
        }
    }

    /// Apply the publish-ordering rule, then append the version.
    ///
    /// A version number already present in the history is rejected as well,
    /// so `(entity_id, version)` stays unique. On error nothing changes.
    pub fn publish(&mut self, version: EntityVersion) -> Result<()> {
        if !self.can_publish(version.version) || self.version(version.version).is_some() {
            return Err(CmsError::ordering_violation(
                &self.id,
                version.version,
                self.latest_published_version,
            ));
        }

        self.add_version(version);
        Ok(())
    }

    /// Clear the publish flag of `version` and recompute the latest published version.
    pub fn unpublish(&mut self, version: i32) -> Result<()> {
        let target = self
            .versions
            .iter_mut()
            .find(|v| v.version == version)
            .ok_or_else(|| CmsError::version_not_found(&self.id, version))?;

        target.unpublish();
        self.recompute_latest_published_version();
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn published(entity_id: &str, version: i32) -> EntityVersion {
        EntityVersion::new(
            entity_id,
            version,
            Some(format!(r#"{{"v":{}}}"#, version)),
            true,
            Utc::now(),
        )
    }

    #[test]
    fn test_new_entity_is_empty() {
        let entity = Entity::new("doc-1");
        assert_eq!(entity.id(), "doc-1");
        assert!(entity.versions().is_empty());
        assert_eq!(entity.latest_published_version(), None);
        assert!(!entity.is_deleted());
        assert!(!entity.is_disabled_by_admin());
        assert_eq!(entity.revision(), 0);
    }

    #[test]
    fn test_add_published_version_sets_latest() {
        let mut entity = Entity::new("doc-1");
        entity.add_version(published("doc-1", 3));
        assert_eq!(entity.latest_published_version(), Some(3));
        assert_eq!(entity.latest_published_payload(), Some(r#"{"v":3}"#));
    }

    #[test]
    fn test_add_unpublished_version_keeps_latest() {
        let mut entity = Entity::new("doc-1");
        entity.add_version(published("doc-1", 1));
        entity.add_version(EntityVersion::new("doc-1", 2, None, false, Utc::now()));
        assert_eq!(entity.latest_published_version(), Some(1));
        assert_eq!(entity.versions().len(), 2);
    }

    #[test]
    fn test_publish_accepts_any_version_without_published_history() {
        let mut entity = Entity::new("doc-1");
        entity.publish(published("doc-1", -5)).unwrap();
        assert_eq!(entity.latest_published_version(), Some(-5));
    }

    #[test]
    fn test_publish_rejects_non_increasing_versions() {
        let mut entity = Entity::new("doc-1");
        entity.publish(published("doc-1", 2)).unwrap();

        let before = entity.clone();
        for v in [1, 2] {
            let err = entity.publish(published("doc-1", v)).unwrap_err();
            assert_eq!(err.code(), ErrorCode::OrderingViolation);
        }
        assert_eq!(entity, before);
    }

    #[test]
    fn test_publish_rejects_reused_unpublished_number() {
        let mut entity = Entity::new("doc-1");
        entity.publish(published("doc-1", 1)).unwrap();
        entity.publish(published("doc-1", 5)).unwrap();
        entity.unpublish(5).unwrap();
        assert_eq!(entity.latest_published_version(), Some(1));

        // 5 > 1 passes ordering, but the number is already in the history.
        let err = entity.publish(published("doc-1", 5)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::OrderingViolation);
        assert_eq!(entity.versions().len(), 2);
    }

    #[test]
    fn test_unpublish_latest_falls_back_to_next_highest() {
        let mut entity = Entity::new("doc-1");
        for v in [1, 2, 3] {
            entity.publish(published("doc-1", v)).unwrap();
        }

        entity.unpublish(3).unwrap();
        assert_eq!(entity.latest_published_version(), Some(2));
        assert!(!entity.version(3).unwrap().is_published());

        entity.unpublish(1).unwrap();
        assert_eq!(entity.latest_published_version(), Some(2));

        entity.unpublish(2).unwrap();
        assert_eq!(entity.latest_published_version(), None);
        assert_eq!(entity.versions().len(), 3);
    }

    #[test]
    fn test_unpublish_missing_version() {
        let mut entity = Entity::new("doc-1");
        entity.publish(published("doc-1", 1)).unwrap();

        let err = entity.unpublish(99).unwrap_err();
        assert_eq!(err.code(), ErrorCode::VersionNotFound);
        assert_eq!(entity.latest_published_version(), Some(1));
    }

    #[test]
    fn test_unpublish_is_repeatable() {
        let mut entity = Entity::new("doc-1");
        entity.publish(published("doc-1", 1)).unwrap();
        entity.unpublish(1).unwrap();
        entity.unpublish(1).unwrap();
        assert_eq!(entity.latest_published_version(), None);
    }

    #[test]
    fn test_disable_is_idempotent_and_orthogonal() {
        let mut entity = Entity::new("doc-1");
        entity.publish(published("doc-1", 1)).unwrap();
        let versions = entity.versions().to_vec();

        entity.disable_by_admin();
        entity.disable_by_admin();

        assert!(entity.is_disabled_by_admin());
        assert_eq!(entity.versions(), versions.as_slice());
        assert_eq!(entity.latest_published_version(), Some(1));
    }

    #[test]
    fn test_restore_recomputes_latest() {
        let now = Utc::now();
        let versions = vec![
            EntityVersion::restore(Uuid::new_v4(), "doc-1".into(), 1, None, true, now),
            EntityVersion::restore(Uuid::new_v4(), "doc-1".into(), 2, None, false, now),
        ];
        let entity = Entity::restore("doc-1".into(), false, true, now, versions, 4);
        assert_eq!(entity.latest_published_version(), Some(1));
        assert!(entity.is_disabled_by_admin());
        assert_eq!(entity.revision(), 4);
    }
}
