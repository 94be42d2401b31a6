//! Telemetry: structured logging setup.
//!
//! Metrics are recorded through the `metrics` facade at the call sites
//! (`cms_events_total`, `cms_errors_total`); installing an exporter is left
//! to the embedding binary.

pub mod logging;

pub use logging::{init_logging, LogFormat, LoggingConfig};
