//! Event processor: routes lifecycle events to the aggregate rules.
//!
//! Each event is a single unit of persistence. Rules run against the loaded
//! aggregate in memory and the result is committed with one store call, so a
//! rejected event never reaches the store.

use metrics::counter;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, instrument};

use super::entity::EntityVersion;
use super::event::{CmsEvent, EventKind};
use crate::error::{CmsError, ErrorCode, ErrorSeverity, Result};
use crate::store::EntityStore;

/// What applying one event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventOutcome {
    /// State changed and was committed.
    Applied,
    /// Silent no-op: redelivery, or unpublish/delete of an unknown entity.
    Ignored,
}

impl EventOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Ignored => "ignored",
        }
    }
}

/// A per-event failure captured during batch processing.
#[derive(Debug, Clone, Serialize)]
pub struct EventFailure {
    /// Position of the event in the batch.
    pub index: usize,
    pub event_type: String,
    pub entity_id: String,
    pub code: ErrorCode,
    pub message: String,
}

/// Summary of a processed batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub applied: usize,
    pub ignored: usize,
    pub failures: Vec<EventFailure>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.applied + self.ignored + self.failures.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Applies lifecycle events to durable entity state.
#[derive(Clone)]
pub struct EventProcessor {
    store: Arc<dyn EntityStore>,
}

impl EventProcessor {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    /// Apply one event.
    ///
    /// # Errors
    ///
    /// `UnknownEventType`, `ValidationError`, `OrderingViolation` and
    /// `VersionNotFound` from the rules, plus store errors. The entity is
    /// unchanged whenever an error is returned.
    #[instrument(skip(self, event), fields(event_type = %event.event_type, entity_id = %event.id))]
    pub async fn apply(&self, event: &CmsEvent) -> Result<EventOutcome> {
        let kind = event.kind()?;

        let outcome = match kind {
            EventKind::Publish => self.publish(event).await?,
            EventKind::Unpublish => self.unpublish(event).await?,
            EventKind::Delete => self.delete(event).await?,
        };

        counter!(
            "cms_events_total",
            "type" => kind.as_str(),
            "outcome" => outcome.as_str(),
        )
        .increment(1);

        Ok(outcome)
    }

    /// Apply events strictly in order. A failing event is logged and
    /// recorded; processing continues with the next one.
    pub async fn process_batch(&self, events: &[CmsEvent]) -> BatchReport {
        let mut report = BatchReport::default();

        for (index, event) in events.iter().enumerate() {
            match self.apply(event).await {
                Ok(outcome) => {
                    info!(
                        event_type = %event.event_type,
                        entity_id = %event.id,
                        outcome = outcome.as_str(),
                        "Processed event {} for entity {}",
                        event.event_type,
                        event.id
                    );
                    match outcome {
                        EventOutcome::Applied => report.applied += 1,
                        EventOutcome::Ignored => report.ignored += 1,
                    }
                }
                Err(err) => {
                    counter!("cms_events_failed_total", "code" => err.code().to_string()).increment(1);
                    // Storage and internal failures also get the full error report.
                    if err.severity() != ErrorSeverity::Low {
                        err.log();
                    }
                    error!(
                        event_type = %event.event_type,
                        entity_id = %event.id,
                        error = %err,
                        "Failed processing event {} for entity {}",
                        event.event_type,
                        event.id
                    );
                    report.failures.push(EventFailure {
                        index,
                        event_type: event.event_type.clone(),
                        entity_id: event.id.clone(),
                        code: err.code(),
                        message: err.user_message().to_string(),
                    });
                }
            }
        }

        report
    }

    async fn publish(&self, event: &CmsEvent) -> Result<EventOutcome> {
        let (version, payload) = match (event.version, event.payload_text()) {
            (Some(version), Some(payload)) => (version, payload),
            _ => return Err(CmsError::validation("Publish requires version and payload")),
        };

        let mut entity = match self.store.find_entity(&event.id).await? {
            Some(entity) => entity,
            None => self.store.create_entity(&event.id).await?,
        };

        // Redelivery of an already stored version is a no-op.
        if let Some(existing) = entity.version(version) {
            if existing.payload() == Some(payload) {
                return Ok(EventOutcome::Ignored);
            }
        }

        let record = EntityVersion::new(
            &event.id,
            version,
            Some(payload.to_string()),
            true,
            event.timestamp,
        );
        entity.publish(record)?;

        self.store.save_entity(&entity).await?;
        Ok(EventOutcome::Applied)
    }

    async fn unpublish(&self, event: &CmsEvent) -> Result<EventOutcome> {
        let version = event
            .version
            .ok_or_else(|| CmsError::validation("Unpublish requires version"))?;

        let Some(mut entity) = self.store.find_entity(&event.id).await? else {
            return Ok(EventOutcome::Ignored);
        };

        entity.unpublish(version)?;

        self.store.save_entity(&entity).await?;
        Ok(EventOutcome::Applied)
    }

    async fn delete(&self, event: &CmsEvent) -> Result<EventOutcome> {
        if self.store.delete_entity(&event.id).await? {
            Ok(EventOutcome::Applied)
        } else {
            Ok(EventOutcome::Ignored)
        }
    }
}
