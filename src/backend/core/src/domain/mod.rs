//! Content lifecycle domain.
//!
//! - **`entity`**: the `Entity` aggregate and its `EntityVersion` history.
//! - **`event`**: inbound lifecycle events (`publish`, `unpublish`, `delete`).
//! - **`processor`**: the `EventProcessor` applying one event at a time.

pub mod entity;
pub mod event;
pub mod processor;

pub use entity::{Entity, EntityVersion};
pub use event::{CmsEvent, EventKind};
pub use processor::{BatchReport, EventFailure, EventOutcome, EventProcessor};
