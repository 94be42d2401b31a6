//! Error handling for the CMS core.
//!
//! This module provides:
//! - Stable error codes for the event rules, the read path and storage
//! - Severity classification that drives log levels
//! - An error type carrying a user-facing message, an internal message and a source chain
//! - Metrics integration for error tracking
//!
//! # Usage
//!
//! ```rust,ignore
//! use cms_core::error::{CmsError, Result, ErrorContext};
//!
//! fn load(path: &str) -> Result<String> {
//!     std::fs::read_to_string(path).context("Failed to read event batch")
//! }
//! ```

use metrics::counter;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use thiserror::Error;
use tracing::{debug, error, warn};

// ═══════════════════════════════════════════════════════════════════════════════
// Result Type Alias
// ═══════════════════════════════════════════════════════════════════════════════

/// A specialized Result type for CMS operations.
pub type Result<T> = std::result::Result<T, CmsError>;

// ═══════════════════════════════════════════════════════════════════════════════
// Error Codes
// ═══════════════════════════════════════════════════════════════════════════════

/// Machine-readable error codes.
///
/// These codes are stable and can be used by callers for programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Event Errors (1000-1099)
    ValidationError,
    OrderingViolation,
    VersionNotFound,
    UnknownEventType,
    ConcurrencyConflict,

    // Read / Authorization Errors (1100-1199)
    EntityNotFound,
    Forbidden,

    // Database Errors (2000-2099)
    DatabaseError,
    DatabaseConnectionFailed,
    DatabaseQueryFailed,
    DatabaseTransactionFailed,

    // Serialization Errors (2200-2299)
    SerializationError,
    DeserializationError,

    // Configuration Errors (5000-5099)
    ConfigurationError,
    InvalidConfiguration,

    // Internal Errors (9000-9099)
    InternalError,
}

impl ErrorCode {
    /// Get the numeric code for this error.
    pub const fn numeric_code(&self) -> u32 {
        match self {
            Self::ValidationError => 1000,
            Self::OrderingViolation => 1001,
            Self::VersionNotFound => 1002,
            Self::UnknownEventType => 1003,
            Self::ConcurrencyConflict => 1004,

            Self::EntityNotFound => 1100,
            Self::Forbidden => 1101,

            Self::DatabaseError => 2000,
            Self::DatabaseConnectionFailed => 2001,
            Self::DatabaseQueryFailed => 2002,
            Self::DatabaseTransactionFailed => 2003,

            Self::SerializationError => 2200,
            Self::DeserializationError => 2201,

            Self::ConfigurationError => 5000,
            Self::InvalidConfiguration => 5001,

            Self::InternalError => 9000,
        }
    }

    /// Check if this error is retryable.
    ///
    /// Rule violations are never retryable: redelivering the same event
    /// produces the same rejection.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConcurrencyConflict
                | Self::DatabaseConnectionFailed
                | Self::DatabaseQueryFailed
                | Self::DatabaseTransactionFailed
        )
    }

    /// Get the error category for grouping.
    pub const fn category(&self) -> &'static str {
        match self.numeric_code() {
            1000..=1099 => "event",
            1100..=1199 => "access",
            2000..=2099 => "database",
            2200..=2299 => "serialization",
            5000..=5099 => "configuration",
            9000..=9099 => "internal",
            _ => "unknown",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Severity
// ═══════════════════════════════════════════════════════════════════════════════

/// Severity level for errors (affects logging).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    /// Rejected events and bad input
    Low,
    /// Operational issues (conflicts, access denials)
    Medium,
    /// Storage and serialization failures
    High,
    /// Errors requiring immediate attention
    Critical,
}

impl ErrorSeverity {
    /// Get severity based on error code.
    pub const fn from_code(code: &ErrorCode) -> Self {
        match code {
            ErrorCode::ValidationError
            | ErrorCode::OrderingViolation
            | ErrorCode::VersionNotFound
            | ErrorCode::UnknownEventType
            | ErrorCode::EntityNotFound => Self::Low,

            ErrorCode::ConcurrencyConflict | ErrorCode::Forbidden => Self::Medium,

            ErrorCode::DatabaseError
            | ErrorCode::DatabaseQueryFailed
            | ErrorCode::DatabaseTransactionFailed
            | ErrorCode::SerializationError
            | ErrorCode::DeserializationError
            | ErrorCode::ConfigurationError
            | ErrorCode::InvalidConfiguration => Self::High,

            ErrorCode::DatabaseConnectionFailed | ErrorCode::InternalError => Self::Critical,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Main Error Type
// ═══════════════════════════════════════════════════════════════════════════════

/// The main error type for the CMS core.
#[derive(Error, Debug)]
pub struct CmsError {
    /// Machine-readable error code
    code: ErrorCode,

    /// User-friendly error message (safe to expose to callers)
    user_message: Cow<'static, str>,

    /// Detailed internal message (for logging only)
    internal_message: Option<String>,

    /// The source error that caused this error
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl fmt::Display for CmsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.user_message)?;
        if let Some(ref internal) = self.internal_message {
            write!(f, " (internal: {})", internal)?;
        }
        Ok(())
    }
}

impl CmsError {
    // ─────────────────────────────────────────────────────────────────────────
    // Constructors
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a new error with code and user message.
    pub fn new(code: ErrorCode, user_message: impl Into<Cow<'static, str>>) -> Self {
        let error = Self {
            code,
            user_message: user_message.into(),
            internal_message: None,
            source: None,
        };
        error.record_metrics();
        error
    }

    /// Create an error with both user and internal messages.
    pub fn with_internal(
        code: ErrorCode,
        user_message: impl Into<Cow<'static, str>>,
        internal_message: impl Into<String>,
    ) -> Self {
        let mut error = Self::new(code, user_message);
        error.internal_message = Some(internal_message.into());
        error
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_internal(ErrorCode::InternalError, "An internal error occurred", message)
    }

    /// A required event field is missing.
    pub fn validation(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    /// A publish did not move strictly past the latest published version.
    pub fn ordering_violation(entity_id: &str, version: i32, latest: Option<i32>) -> Self {
        Self::with_internal(
            ErrorCode::OrderingViolation,
            "Published version must be greater than the last published version.",
            format!(
                "entity {} rejected version {} (latest published: {:?})",
                entity_id, version, latest
            ),
        )
    }

    /// An unpublish targeted a version absent from the entity's history.
    pub fn version_not_found(entity_id: &str, version: i32) -> Self {
        Self::with_internal(
            ErrorCode::VersionNotFound,
            "Version not found for unpublish.",
            format!("entity {} has no version {}", entity_id, version),
        )
    }

    /// The event type is outside publish/unpublish/delete.
    pub fn unknown_event_type(event_type: &str) -> Self {
        Self::new(
            ErrorCode::UnknownEventType,
            format!("Unknown event type: {}", event_type),
        )
    }

    /// Another writer saved the entity since it was loaded.
    pub fn concurrency_conflict(entity_id: &str, expected: i64, actual: Option<i64>) -> Self {
        Self::with_internal(
            ErrorCode::ConcurrencyConflict,
            format!("Entity {} was modified concurrently", entity_id),
            format!("expected revision {}, found {:?}", expected, actual),
        )
    }

    /// The entity does not exist or is hidden from the caller.
    pub fn entity_not_found(entity_id: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::EntityNotFound,
            format!("Entity not found: {}", entity_id.into()),
        )
    }

    /// The caller lacks the role required for the action.
    pub fn forbidden(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Builder Methods
    // ─────────────────────────────────────────────────────────────────────────

    /// Add a source error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Add internal message.
    pub fn with_internal_message(mut self, message: impl Into<String>) -> Self {
        self.internal_message = Some(message.into());
        self
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Get the user-friendly message.
    pub fn user_message(&self) -> &str {
        &self.user_message
    }

    /// Get the internal message (if any).
    pub fn internal_message(&self) -> Option<&str> {
        self.internal_message.as_deref()
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }

    /// Get the error severity.
    pub fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::from_code(&self.code)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Logging
    // ─────────────────────────────────────────────────────────────────────────

    /// Log this error with appropriate severity.
    pub fn log(&self) {
        let code = self.code.to_string();
        let category = self.code.category();

        match self.severity() {
            ErrorSeverity::Critical => {
                error!(
                    error_code = %code,
                    category = category,
                    user_message = %self.user_message,
                    internal_message = ?self.internal_message,
                    source = ?self.source,
                    "CRITICAL ERROR"
                );
            }
            ErrorSeverity::High => {
                error!(
                    error_code = %code,
                    category = category,
                    user_message = %self.user_message,
                    internal_message = ?self.internal_message,
                    "High severity error"
                );
            }
            ErrorSeverity::Medium => {
                warn!(
                    error_code = %code,
                    category = category,
                    user_message = %self.user_message,
                    "Medium severity error"
                );
            }
            ErrorSeverity::Low => {
                debug!(
                    error_code = %code,
                    category = category,
                    user_message = %self.user_message,
                    "Low severity error"
                );
            }
        }
    }

    fn record_metrics(&self) {
        counter!(
            "cms_errors_total",
            "code" => self.code.to_string(),
            "category" => self.code.category().to_string(),
            "severity" => format!("{:?}", self.severity()),
        )
        .increment(1);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Context Extension Trait
// ═══════════════════════════════════════════════════════════════════════════════

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Add context to an error.
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with error code.
    fn with_error_code(self, code: ErrorCode) -> Result<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| CmsError::internal(message.into()).with_source(e))
    }

    fn with_error_code(self, code: ErrorCode) -> Result<T> {
        self.map_err(|e| CmsError::new(code, e.to_string()).with_source(e))
    }
}

impl<T> ErrorContext<T> for Option<T> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.ok_or_else(|| CmsError::new(ErrorCode::EntityNotFound, message.into()))
    }

    fn with_error_code(self, code: ErrorCode) -> Result<T> {
        self.ok_or_else(|| CmsError::new(code, "Resource not found"))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// From Implementations for Common Error Types
// ═══════════════════════════════════════════════════════════════════════════════

impl From<sqlx::Error> for CmsError {
    fn from(error: sqlx::Error) -> Self {
        let (code, user_msg) = match &error {
            sqlx::Error::RowNotFound => (ErrorCode::EntityNotFound, "The requested record was not found"),
            sqlx::Error::Database(db_err) => {
                // A duplicate (entity_id, version) means another writer got there first.
                if let Some(constraint) = db_err.constraint() {
                    if is_write_race_constraint(constraint) {
                        return Self::with_internal(
                            ErrorCode::ConcurrencyConflict,
                            "The entity was modified concurrently",
                            format!("Constraint violation: {}", constraint),
                        )
                        .with_source(error);
                    }
                }
                (ErrorCode::DatabaseQueryFailed, "A database error occurred")
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => (
                ErrorCode::DatabaseConnectionFailed,
                "Unable to connect to the database",
            ),
            _ => (ErrorCode::DatabaseError, "A database error occurred"),
        };

        Self::with_internal(code, user_msg, error.to_string()).with_source(error)
    }
}

/// Unique constraints a concurrent writer can trip. Foreign keys are not among them.
fn is_write_race_constraint(constraint: &str) -> bool {
    constraint == "entity_versions_entity_id_version_key" || constraint.ends_with("_pkey")
}

impl From<serde_json::Error> for CmsError {
    fn from(error: serde_json::Error) -> Self {
        let code = if error.is_syntax() || error.is_data() || error.is_eof() {
            ErrorCode::DeserializationError
        } else {
            ErrorCode::SerializationError
        };

        Self::with_internal(code, "Failed to process JSON data", error.to_string()).with_source(error)
    }
}

impl From<std::io::Error> for CmsError {
    fn from(error: std::io::Error) -> Self {
        Self::with_internal(
            ErrorCode::InternalError,
            "An I/O error occurred",
            error.to_string(),
        )
        .with_source(error)
    }
}

impl From<config::ConfigError> for CmsError {
    fn from(error: config::ConfigError) -> Self {
        let (code, user_msg) = match &error {
            config::ConfigError::PathParse(_) | config::ConfigError::FileParse { .. } => (
                ErrorCode::InvalidConfiguration,
                "Configuration file is invalid",
            ),
            _ => (ErrorCode::ConfigurationError, "Configuration error occurred"),
        };

        Self::with_internal(code, user_msg, error.to_string())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_errors_keep_their_messages() {
        let err = CmsError::ordering_violation("a", 1, Some(1));
        assert_eq!(err.code(), ErrorCode::OrderingViolation);
        assert_eq!(
            err.user_message(),
            "Published version must be greater than the last published version."
        );

        let err = CmsError::version_not_found("a", 99);
        assert_eq!(err.user_message(), "Version not found for unpublish.");

        let err = CmsError::unknown_event_type("invalid-event");
        assert_eq!(err.user_message(), "Unknown event type: invalid-event");
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(ErrorCode::OrderingViolation.category(), "event");
        assert_eq!(ErrorCode::Forbidden.category(), "access");
        assert_eq!(ErrorCode::DatabaseError.category(), "database");
        assert_eq!(ErrorCode::InvalidConfiguration.category(), "configuration");
    }

    #[test]
    fn test_rule_violations_are_not_retryable() {
        assert!(!CmsError::validation("missing").is_retryable());
        assert!(!CmsError::ordering_violation("a", 1, Some(2)).is_retryable());
        assert!(CmsError::concurrency_conflict("a", 1, Some(2)).is_retryable());
    }

    #[test]
    fn test_severity() {
        assert_eq!(CmsError::validation("x").severity(), ErrorSeverity::Low);
        assert_eq!(CmsError::forbidden("x").severity(), ErrorSeverity::Medium);
        assert_eq!(CmsError::internal("x").severity(), ErrorSeverity::Critical);
    }

    #[test]
    fn test_display_includes_internal_message() {
        let err = CmsError::version_not_found("doc-1", 3);
        let rendered = err.to_string();
        assert!(rendered.starts_with("[VersionNotFound]"));
        assert!(rendered.contains("doc-1 has no version 3"));
    }

    #[test]
    fn test_result_with_error_code_keeps_source() {
        let io: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::Other, "disk gone"));
        let err = io
            .with_error_code(ErrorCode::DatabaseTransactionFailed)
            .unwrap_err()
            .with_internal_message("commit");
        assert_eq!(err.code(), ErrorCode::DatabaseTransactionFailed);
        assert_eq!(err.user_message(), "disk gone");
        assert_eq!(err.internal_message(), Some("commit"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_write_race_constraints() {
        assert!(is_write_race_constraint("entity_versions_entity_id_version_key"));
        assert!(is_write_race_constraint("entities_pkey"));
        assert!(is_write_race_constraint("entity_versions_pkey"));
        assert!(!is_write_race_constraint("entity_versions_entity_id_fkey"));
    }

    #[test]
    fn test_option_context() {
        let missing: Option<u8> = None;
        let err = missing.context("nothing here").unwrap_err();
        assert_eq!(err.code(), ErrorCode::EntityNotFound);
    }

    #[test]
    fn test_error_code_serialization() {
        let json = serde_json::to_string(&ErrorCode::OrderingViolation).unwrap();
        assert_eq!(json, "\"ORDERING_VIOLATION\"");
    }
}
