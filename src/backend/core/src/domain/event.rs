//! Inbound lifecycle events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::error::{CmsError, Result};

/// A lifecycle event emitted by an external producer.
///
/// ```json
/// { "type": "publish", "id": "doc-1", "version": 2, "payload": {"title": "Hi"}, "timestamp": "2026-01-28T14:06:24Z" }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CmsEvent {
    #[serde(rename = "type")]
    pub event_type: String,

    /// Target entity id.
    pub id: String,

    #[serde(default)]
    pub version: Option<i32>,

    /// Opaque content, kept as the exact JSON text it arrived as.
    #[serde(default)]
    pub payload: Option<Box<RawValue>>,

    pub timestamp: DateTime<Utc>,
}

impl CmsEvent {
    /// Build a publish event. `payload` must be valid JSON text.
    pub fn publish(id: impl Into<String>, version: i32, payload: impl Into<String>) -> Result<Self> {
        Ok(Self {
            event_type: "publish".to_string(),
            id: id.into(),
            version: Some(version),
            payload: Some(RawValue::from_string(payload.into())?),
            timestamp: Utc::now(),
        })
    }

    pub fn unpublish(id: impl Into<String>, version: i32) -> Self {
        Self {
            event_type: "unpublish".to_string(),
            id: id.into(),
            version: Some(version),
            payload: None,
            timestamp: Utc::now(),
        }
    }

    pub fn delete(id: impl Into<String>) -> Self {
        Self {
            event_type: "delete".to_string(),
            id: id.into(),
            version: None,
            payload: None,
            timestamp: Utc::now(),
        }
    }

    /// Resolve the event type.
    pub fn kind(&self) -> Result<EventKind> {
        self.event_type.parse()
    }

    /// The payload text, byte for byte as received.
    pub fn payload_text(&self) -> Option<&str> {
        self.payload.as_deref().map(RawValue::get)
    }
}

/// The three lifecycle transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Publish,
    Unpublish,
    Delete,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Publish => "publish",
            Self::Unpublish => "unpublish",
            Self::Delete => "delete",
        }
    }
}

impl std::str::FromStr for EventKind {
    type Err = CmsError;

    /// Case-insensitive.
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "publish" => Ok(Self::Publish),
            "unpublish" => Ok(Self::Unpublish),
            "delete" => Ok(Self::Delete),
            _ => Err(CmsError::unknown_event_type(s)),
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
