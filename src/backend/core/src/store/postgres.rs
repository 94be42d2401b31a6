//! PostgreSQL entity store.
//!
//! Uses sqlx with one transaction per save. Versions keep their insertion
//! order through a `position` column.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::EntityStore;
use crate::config::StoreConfig;
use crate::domain::{Entity, EntityVersion};
use crate::error::{CmsError, ErrorCode, ErrorContext, Result};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS entities (
        id                        TEXT PRIMARY KEY,
        is_deleted                BOOLEAN NOT NULL DEFAULT FALSE,
        is_disabled_by_admin      BOOLEAN NOT NULL DEFAULT FALSE,
        latest_published_version  INTEGER,
        created_at                TIMESTAMPTZ NOT NULL,
        revision                  BIGINT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS entity_versions (
        id            UUID PRIMARY KEY,
        entity_id     TEXT NOT NULL REFERENCES entities (id) ON DELETE CASCADE,
        position      INTEGER NOT NULL,
        version       INTEGER NOT NULL,
        payload       TEXT,
        is_published  BOOLEAN NOT NULL,
        timestamp     TIMESTAMPTZ NOT NULL,
        CONSTRAINT entity_versions_entity_id_version_key UNIQUE (entity_id, version)
    )
    "#,
];

/// Entity store backed by PostgreSQL.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a connection pool from configuration.
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let url = config.url.as_deref().ok_or_else(|| {
            CmsError::new(
                ErrorCode::InvalidConfiguration,
                "store.url is required for the postgres backend",
            )
        })?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(url)
            .await?;

        Ok(Self { pool })
    }

    /// Create the tables if they do not exist yet.
    pub async fn ensure_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn load_versions(&self, entity_id: &str) -> Result<Vec<EntityVersion>> {
        let rows = sqlx::query_as::<_, VersionRow>(
            r#"
            SELECT id, entity_id, version, payload, is_published, timestamp
            FROM entity_versions
            WHERE entity_id = $1
            ORDER BY position
            "#,
        )
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(VersionRow::into_version).collect())
    }
}

#[async_trait]
impl EntityStore for PostgresStore {
    #[instrument(skip(self))]
    async fn find_entity(&self, id: &str) -> Result<Option<Entity>> {
        let row = sqlx::query_as::<_, EntityRow>(
            r#"
            SELECT id, is_deleted, is_disabled_by_admin, created_at, revision
            FROM entities
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let versions = self.load_versions(id).await?;
                Ok(Some(row.into_entity(versions)))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self, entity), fields(entity_id = %entity.id(), revision = entity.revision()))]
    async fn save_entity(&self, entity: &Entity) -> Result<i64> {
        let expected = entity.revision();
        let next = expected + 1;
        let mut tx = self.pool.begin().await?;

        let updated = if expected == 0 {
            sqlx::query(
                r#"
                INSERT INTO entities (id, is_deleted, is_disabled_by_admin, latest_published_version, created_at, revision)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (id) DO NOTHING
                "#,
            )
            .bind(entity.id())
            .bind(entity.is_deleted())
            .bind(entity.is_disabled_by_admin())
            .bind(entity.latest_published_version())
            .bind(entity.created_at())
            .bind(next)
            .execute(&mut *tx)
            .await?
            .rows_affected()
        } else {
            sqlx::query(
                r#"
                UPDATE entities
                SET is_deleted = $2,
                    is_disabled_by_admin = $3,
                    latest_published_version = $4,
                    revision = $6
                WHERE id = $1 AND revision = $5
                "#,
            )
            .bind(entity.id())
            .bind(entity.is_deleted())
            .bind(entity.is_disabled_by_admin())
            .bind(entity.latest_published_version())
            .bind(expected)
            .bind(next)
            .execute(&mut *tx)
            .await?
            .rows_affected()
        };

        if updated == 0 {
            let actual: Option<i64> = sqlx::query_scalar("SELECT revision FROM entities WHERE id = $1")
                .bind(entity.id())
                .fetch_optional(&mut *tx)
                .await?;
            return Err(CmsError::concurrency_conflict(entity.id(), expected, actual));
        }

        // Payload and timestamp are immutable; only the publish flag can change.
        for (position, version) in entity.versions().iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO entity_versions (id, entity_id, position, version, payload, is_published, timestamp)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (id) DO UPDATE SET is_published = EXCLUDED.is_published
                "#,
            )
            .bind(version.id())
            .bind(version.entity_id())
            .bind(position as i32)
            .bind(version.version())
            .bind(version.payload())
            .bind(version.is_published())
            .bind(version.timestamp())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit()
            .await
            .with_error_code(ErrorCode::DatabaseTransactionFailed)?;

        debug!(revision = next, "Entity saved");
        Ok(next)
    }

    #[instrument(skip(self))]
    async fn delete_entity(&self, id: &str) -> Result<bool> {
        let deleted = sqlx::query("DELETE FROM entities WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(deleted > 0)
    }

    async fn list_entities(&self) -> Result<Vec<Entity>> {
        let rows = sqlx::query_as::<_, EntityRow>(
            r#"
            SELECT id, is_deleted, is_disabled_by_admin, created_at, revision
            FROM entities
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let version_rows = sqlx::query_as::<_, VersionRow>(
            r#"
            SELECT id, entity_id, version, payload, is_published, timestamp
            FROM entity_versions
            ORDER BY entity_id, position
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut versions: HashMap<String, Vec<EntityVersion>> = HashMap::new();
        for row in version_rows {
            versions
                .entry(row.entity_id.clone())
                .or_default()
                .push(row.into_version());
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let owned = versions.remove(&row.id).unwrap_or_default();
                row.into_entity(owned)
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Row Types
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, sqlx::FromRow)]
struct EntityRow {
    id: String,
    is_deleted: bool,
    is_disabled_by_admin: bool,
    created_at: DateTime<Utc>,
    revision: i64,
}

impl EntityRow {
    fn into_entity(self, versions: Vec<EntityVersion>) -> Entity {
        Entity::restore(
            self.id,
            self.is_deleted,
            self.is_disabled_by_admin,
            self.created_at,
            versions,
            self.revision,
        )
    }
}

#[derive(Debug, sqlx::FromRow)]
struct VersionRow {
    id: Uuid,
    entity_id: String,
    version: i32,
    payload: Option<String>,
    is_published: bool,
    timestamp: DateTime<Utc>,
}

impl VersionRow {
    fn into_version(self) -> EntityVersion {
        EntityVersion::restore(
            self.id,
            self.entity_id,
            self.version,
            self.payload,
            self.is_published,
            self.timestamp,
        )
    }
}
