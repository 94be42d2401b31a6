#![allow(clippy::result_large_err)]
//! # CMS Core
//!
//! Event-driven record keeper for versioned content entities.
//!
//! ## Architecture
//!
//! - **Domain**: The `Entity` aggregate, its versions, and the lifecycle event processor
//! - **Store**: Persistence behind the `EntityStore` trait (in-memory and PostgreSQL)
//! - **Access**: Role-filtered reads and the admin disable action
//! - **Telemetry**: Structured logging setup
//! - **Config**: Layered configuration from files and `CMS__*` environment variables

pub mod access;
pub mod config;
pub mod domain;
pub mod error;
pub mod store;
pub mod telemetry;

pub use error::{CmsError, ErrorCode, ErrorContext, ErrorSeverity, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::access::{EntityQueries, EntityView, RequestContext, Role};
    pub use crate::config::{AccessConfig, Config, StoreBackend, StoreConfig};
    pub use crate::domain::{
        BatchReport, CmsEvent, Entity, EntityVersion, EventFailure, EventKind, EventOutcome,
        EventProcessor,
    };
    pub use crate::error::{CmsError, ErrorCode, ErrorContext, ErrorSeverity, Result};
    pub use crate::store::{connect, EntityStore, InMemoryStore, PostgresStore};
}
