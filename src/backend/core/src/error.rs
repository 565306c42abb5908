//! Production-grade error handling for the orchestrator core.
//!
//! This module provides:
//! - Error kinds grouped by the taxonomy the whole crate shares
//! - HTTP status code mapping for the thin operator-facing API
//! - Retryability and severity classification used by the retry engine and DLQ
//! - User-friendly messages vs detailed internal messages
//! - Error logging via `tracing` and counters via `metrics`
//!
//! # Usage
//!
//! ```rust,ignore
//! use orka_core::error::{OrchestratorError, Result, ErrorContext};
//!
//! fn my_function() -> Result<()> {
//!     some_operation()
//!         .context("failed to perform operation")?;
//!     Ok(())
//! }
//! ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tracing::{error, warn};

/// A specialized Result type for orchestrator operations.
pub type Result<T> = std::result::Result<T, OrchestratorError>;

// ═══════════════════════════════════════════════════════════════════════════════
// Error Codes
// ═══════════════════════════════════════════════════════════════════════════════

/// Machine-readable error codes, grouped by the taxonomy kinds in the design:
/// validation, not_found, conflict, invalid_transition, admission, transport,
/// timeout, handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation (1000-1099): malformed DAG, invalid cron, invalid duration,
    // non-existent dependency, cycle, orphan.
    CycleDetected,
    OrphanTask,
    DagValidationFailed,
    InvalidCronExpression,
    InvalidDuration,
    DependencyNotFound,
    InvalidDagDefinition,

    // Not found (1100-1199)
    DagNotFound,
    DagRunNotFound,
    TaskNotFound,
    TaskInstanceNotFound,
    DlqEntryNotFound,

    // Conflict (1200-1299)
    DuplicateDagName,
    DuplicateDlqEntry,
    OptimisticLock,
    DuplicateRun,

    // Invalid transition (1300-1399)
    InvalidTransition,

    // Admission (1400-1499)
    CircuitOpen,
    TooManyRequests,
    PoolFull,
    GlobalConcurrencyExceeded,
    DagConcurrencyExceeded,

    // Transport (1500-1599)
    MessageBusUnavailable,
    PublishFailed,
    SubscribeFailed,

    // Timeout (1600-1699)
    TaskTimeout,
    LockTimeout,

    // Handler (1700-1799)
    HandlerNonZeroExit,
    HandlerHttpError,
    HandlerPanic,
    HandlerNotFound,
    HandlerInternalError,

    // Database / serialization plumbing (2000-2099)
    DatabaseError,
    DatabaseConnectionFailed,
    SerializationError,

    // Configuration (2100-2199)
    ConfigurationError,

    // Internal (9000-9099)
    InternalError,
    Unknown,
}

impl ErrorCode {
    /// Numeric code, stable for clients.
    pub const fn numeric_code(&self) -> u32 {
        match self {
            Self::CycleDetected => 1000,
            Self::OrphanTask => 1001,
            Self::DagValidationFailed => 1002,
            Self::InvalidCronExpression => 1003,
            Self::InvalidDuration => 1004,
            Self::DependencyNotFound => 1005,
            Self::InvalidDagDefinition => 1006,

            Self::DagNotFound => 1100,
            Self::DagRunNotFound => 1101,
            Self::TaskNotFound => 1102,
            Self::TaskInstanceNotFound => 1103,
            Self::DlqEntryNotFound => 1104,

            Self::DuplicateDagName => 1200,
            Self::DuplicateDlqEntry => 1201,
            Self::OptimisticLock => 1202,
            Self::DuplicateRun => 1203,

            Self::InvalidTransition => 1300,

            Self::CircuitOpen => 1400,
            Self::TooManyRequests => 1401,
            Self::PoolFull => 1402,
            Self::GlobalConcurrencyExceeded => 1403,
            Self::DagConcurrencyExceeded => 1404,

            Self::MessageBusUnavailable => 1500,
            Self::PublishFailed => 1501,
            Self::SubscribeFailed => 1502,

            Self::TaskTimeout => 1600,
            Self::LockTimeout => 1601,

            Self::HandlerNonZeroExit => 1700,
            Self::HandlerHttpError => 1701,
            Self::HandlerPanic => 1702,
            Self::HandlerNotFound => 1703,
            Self::HandlerInternalError => 1704,

            Self::DatabaseError => 2000,
            Self::DatabaseConnectionFailed => 2001,
            Self::SerializationError => 2002,

            Self::ConfigurationError => 2100,

            Self::InternalError => 9000,
            Self::Unknown => 9099,
        }
    }

    /// HTTP status code the thin operator API maps this error to.
    pub const fn http_status(&self) -> StatusCode {
        match self {
            Self::DagNotFound
            | Self::DagRunNotFound
            | Self::TaskNotFound
            | Self::TaskInstanceNotFound
            | Self::DlqEntryNotFound => StatusCode::NOT_FOUND,

            Self::DuplicateDagName
            | Self::DuplicateDlqEntry
            | Self::OptimisticLock
            | Self::DuplicateRun
            | Self::InvalidTransition => StatusCode::CONFLICT,

            Self::CycleDetected
            | Self::OrphanTask
            | Self::DagValidationFailed
            | Self::InvalidCronExpression
            | Self::InvalidDuration
            | Self::DependencyNotFound
            | Self::InvalidDagDefinition => StatusCode::UNPROCESSABLE_ENTITY,

            Self::TooManyRequests
            | Self::PoolFull
            | Self::GlobalConcurrencyExceeded
            | Self::DagConcurrencyExceeded => StatusCode::TOO_MANY_REQUESTS,

            Self::CircuitOpen => StatusCode::SERVICE_UNAVAILABLE,

            Self::TaskTimeout | Self::LockTimeout => StatusCode::GATEWAY_TIMEOUT,

            Self::MessageBusUnavailable
            | Self::PublishFailed
            | Self::SubscribeFailed
            | Self::DatabaseConnectionFailed => StatusCode::SERVICE_UNAVAILABLE,

            Self::HandlerNonZeroExit
            | Self::HandlerHttpError
            | Self::HandlerPanic
            | Self::HandlerNotFound
            | Self::HandlerInternalError => StatusCode::BAD_GATEWAY,

            Self::DatabaseError
            | Self::SerializationError
            | Self::ConfigurationError
            | Self::InternalError
            | Self::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether a retry engine should consider this error retryable.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::DatabaseConnectionFailed
                | Self::DatabaseError
                | Self::MessageBusUnavailable
                | Self::PublishFailed
                | Self::SubscribeFailed
                | Self::TaskTimeout
                | Self::LockTimeout
                | Self::HandlerNonZeroExit
                | Self::HandlerHttpError
                | Self::HandlerInternalError
                | Self::CircuitOpen
                | Self::TooManyRequests
                | Self::PoolFull
                | Self::GlobalConcurrencyExceeded
                | Self::DagConcurrencyExceeded
        )
    }

    /// The taxonomy kind this code belongs to (spec.md §7).
    pub const fn category(&self) -> &'static str {
        match self.numeric_code() {
            1000..=1099 => "validation",
            1100..=1199 => "not_found",
            1200..=1299 => "conflict",
            1300..=1399 => "invalid_transition",
            1400..=1499 => "admission",
            1500..=1599 => "transport",
            1600..=1699 => "timeout",
            1700..=1799 => "handler",
            2000..=2099 => "database",
            2100..=2199 => "configuration",
            _ => "internal",
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

/// Severity level for errors, affects logging verbosity and alerting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    pub const fn from_code(code: &ErrorCode) -> Self {
        match code {
            ErrorCode::CycleDetected
            | ErrorCode::OrphanTask
            | ErrorCode::DagValidationFailed
            | ErrorCode::InvalidCronExpression
            | ErrorCode::InvalidDuration
            | ErrorCode::DependencyNotFound
            | ErrorCode::InvalidDagDefinition
            | ErrorCode::DagNotFound
            | ErrorCode::DagRunNotFound
            | ErrorCode::TaskNotFound
            | ErrorCode::TaskInstanceNotFound
            | ErrorCode::DlqEntryNotFound
            | ErrorCode::DuplicateDagName
            | ErrorCode::DuplicateDlqEntry
            | ErrorCode::DuplicateRun
            | ErrorCode::InvalidTransition => Self::Low,

            ErrorCode::OptimisticLock
            | ErrorCode::CircuitOpen
            | ErrorCode::TooManyRequests
            | ErrorCode::PoolFull
            | ErrorCode::GlobalConcurrencyExceeded
            | ErrorCode::DagConcurrencyExceeded
            | ErrorCode::TaskTimeout
            | ErrorCode::LockTimeout
            | ErrorCode::HandlerNonZeroExit
            | ErrorCode::HandlerHttpError => Self::Medium,

            ErrorCode::MessageBusUnavailable
            | ErrorCode::PublishFailed
            | ErrorCode::SubscribeFailed
            | ErrorCode::HandlerPanic
            | ErrorCode::HandlerNotFound
            | ErrorCode::HandlerInternalError
            | ErrorCode::DatabaseError
            | ErrorCode::SerializationError
            | ErrorCode::ConfigurationError => Self::High,

            ErrorCode::DatabaseConnectionFailed | ErrorCode::InternalError | ErrorCode::Unknown => {
                Self::Critical
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Details
// ═══════════════════════════════════════════════════════════════════════════════

/// Additional structured details about an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorDetails {
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

impl ErrorDetails {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity(mut self, entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id.into());
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    pub fn with_retry_after(mut self, seconds: u64) -> Self {
        self.retry_after_secs = Some(seconds);
        self
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Main Error Type
// ═══════════════════════════════════════════════════════════════════════════════

/// The crate-wide error type.
#[derive(Error, Debug)]
#[allow(dead_code)]
pub struct OrchestratorError {
    code: ErrorCode,
    user_message: Cow<'static, str>,
    internal_message: Option<String>,
    details: ErrorDetails,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    #[cfg(debug_assertions)]
    backtrace: Option<std::backtrace::Backtrace>,
}

impl fmt::Display for OrchestratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.user_message)?;
        if let Some(ref internal) = self.internal_message {
            write!(f, " (internal: {})", internal)?;
        }
        Ok(())
    }
}

impl OrchestratorError {
    // ─────────────────────────────────────────────────────────────────────────
    // Constructors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn new(code: ErrorCode, user_message: impl Into<Cow<'static, str>>) -> Self {
        let error = Self {
            code,
            user_message: user_message.into(),
            internal_message: None,
            details: ErrorDetails::default(),
            source: None,
            #[cfg(debug_assertions)]
            backtrace: Some(std::backtrace::Backtrace::capture()),
        };
        error.record_metrics();
        error
    }

    pub fn with_internal(
        code: ErrorCode,
        user_message: impl Into<Cow<'static, str>>,
        internal_message: impl Into<String>,
    ) -> Self {
        let mut error = Self::new(code, user_message);
        error.internal_message = Some(internal_message.into());
        error
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_internal(ErrorCode::InternalError, "an internal error occurred", message)
    }

    pub fn not_found(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        let entity_type = entity_type.into();
        let entity_id = entity_id.into();
        let code = match entity_type.as_str() {
            "dag" => ErrorCode::DagNotFound,
            "dag_run" => ErrorCode::DagRunNotFound,
            "task_instance" => ErrorCode::TaskInstanceNotFound,
            "dlq_entry" => ErrorCode::DlqEntryNotFound,
            _ => ErrorCode::TaskNotFound,
        };
        Self::new(code, format!("{entity_type} not found: {entity_id}"))
            .with_details(ErrorDetails::new().with_entity(entity_type, entity_id))
    }

    pub fn validation(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorCode::DagValidationFailed, message)
    }

    pub fn cycle_detected() -> Self {
        Self::new(ErrorCode::CycleDetected, "dependency graph contains a cycle")
    }

    pub fn orphan_task(task_id: impl Into<String>) -> Self {
        let task_id = task_id.into();
        Self::new(ErrorCode::OrphanTask, format!("task {task_id} has no dependencies and no dependents"))
            .with_details(ErrorDetails::new().with_entity("task", task_id))
    }

    pub fn invalid_transition(from: impl fmt::Display, to: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::InvalidTransition,
            format!("cannot transition from {from} to {to}"),
        )
    }

    pub fn optimistic_lock(entity_id: impl Into<String>) -> Self {
        let entity_id = entity_id.into();
        Self::new(
            ErrorCode::OptimisticLock,
            format!("concurrent update conflict for {entity_id}"),
        )
        .with_details(ErrorDetails::new().with_entity("entity", entity_id))
    }

    pub fn circuit_open() -> Self {
        Self::new(ErrorCode::CircuitOpen, "circuit breaker is open")
    }

    pub fn pool_full(pool: impl Into<String>) -> Self {
        Self::new(ErrorCode::PoolFull, format!("pool {} is full", pool.into()))
    }

    pub fn task_timeout(task_instance_id: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::TaskTimeout,
            format!("task instance {} exceeded its timeout", task_instance_id.into()),
        )
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Builder Methods
    // ─────────────────────────────────────────────────────────────────────────

    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub fn with_details(mut self, details: ErrorDetails) -> Self {
        self.details = details;
        self
    }

    pub fn with_internal_message(mut self, message: impl Into<String>) -> Self {
        self.internal_message = Some(message.into());
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.details.context.insert(key.into(), v);
        }
        self
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn user_message(&self) -> &str {
        &self.user_message
    }

    pub fn internal_message(&self) -> Option<&str> {
        self.internal_message.as_deref()
    }

    pub fn details(&self) -> &ErrorDetails {
        &self.details
    }

    pub fn http_status(&self) -> StatusCode {
        self.code.http_status()
    }

    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }

    pub fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::from_code(&self.code)
    }

    /// The taxonomy kind (validation / not_found / conflict / ...).
    pub fn kind(&self) -> &'static str {
        self.code.category()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Logging & Metrics
    // ─────────────────────────────────────────────────────────────────────────

    pub fn log(&self) {
        let code = self.code.to_string();
        let category = self.code.category();
        let status = self.http_status().as_u16();

        match self.severity() {
            ErrorSeverity::Critical => {
                error!(
                    error_code = %code,
                    category = category,
                    http_status = status,
                    user_message = %self.user_message,
                    internal_message = ?self.internal_message,
                    details = ?self.details,
                    source = ?self.source,
                    "critical error"
                );
            }
            ErrorSeverity::High => {
                error!(
                    error_code = %code,
                    category = category,
                    http_status = status,
                    user_message = %self.user_message,
                    internal_message = ?self.internal_message,
                    "high severity error"
                );
            }
            ErrorSeverity::Medium => {
                warn!(
                    error_code = %code,
                    category = category,
                    http_status = status,
                    user_message = %self.user_message,
                    "medium severity error"
                );
            }
            ErrorSeverity::Low => {
                tracing::debug!(
                    error_code = %code,
                    category = category,
                    http_status = status,
                    user_message = %self.user_message,
                    "low severity error"
                );
            }
        }
    }

    fn record_metrics(&self) {
        counter!(
            "orka_errors_total",
            "code" => self.code.to_string(),
            "category" => self.code.category().to_string(),
            "severity" => format!("{:?}", self.severity()),
            "retryable" => self.is_retryable().to_string(),
        )
        .increment(1);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// API Response
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorInfo,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub numeric_code: u32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ErrorDetails>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl From<&OrchestratorError> for ErrorResponse {
    fn from(error: &OrchestratorError) -> Self {
        Self {
            success: false,
            error: ErrorInfo {
                code: error.code,
                numeric_code: error.code.numeric_code(),
                message: error.user_message.to_string(),
                details: if error.details.context.is_empty() && error.details.entity_id.is_none() {
                    None
                } else {
                    Some(error.details.clone())
                },
                timestamp: chrono::Utc::now(),
            },
        }
    }
}

impl IntoResponse for OrchestratorError {
    fn into_response(self) -> Response {
        self.log();
        let status = self.http_status();
        let response = ErrorResponse::from(&self);
        (status, Json(response)).into_response()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Context Extension Trait
// ═══════════════════════════════════════════════════════════════════════════════

pub trait ErrorContext<T> {
    fn context(self, message: impl Into<String>) -> Result<T>;
    fn with_error_code(self, code: ErrorCode) -> Result<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| OrchestratorError::internal(message.into()).with_source(e))
    }

    fn with_error_code(self, code: ErrorCode) -> Result<T> {
        self.map_err(|e| OrchestratorError::new(code, e.to_string()).with_source(e))
    }
}

impl<T> ErrorContext<T> for Option<T> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.ok_or_else(|| OrchestratorError::new(ErrorCode::TaskNotFound, message.into()))
    }

    fn with_error_code(self, code: ErrorCode) -> Result<T> {
        self.ok_or_else(|| OrchestratorError::new(code, "resource not found"))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// From Implementations
// ═══════════════════════════════════════════════════════════════════════════════

impl From<sqlx::Error> for OrchestratorError {
    fn from(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::RowNotFound => {
                Self::new(ErrorCode::TaskNotFound, "the requested record was not found")
            }
            sqlx::Error::Database(db_err) => {
                if let Some(constraint) = db_err.constraint() {
                    if constraint.contains("unique") || constraint.contains("pkey") {
                        return Self::with_internal(
                            ErrorCode::DuplicateDagName,
                            "a record with this identity already exists",
                            error.to_string(),
                        );
                    }
                }
                Self::with_internal(ErrorCode::DatabaseError, "a database error occurred", error.to_string())
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => Self::with_internal(
                ErrorCode::DatabaseConnectionFailed,
                "could not reach the database",
                error.to_string(),
            ),
            _ => Self::with_internal(ErrorCode::DatabaseError, "a database error occurred", error.to_string()),
        }
        .with_source(error)
    }
}

impl From<redis::RedisError> for OrchestratorError {
    fn from(error: redis::RedisError) -> Self {
        Self::with_internal(
            ErrorCode::MessageBusUnavailable,
            "message bus is unavailable",
            error.to_string(),
        )
        .with_source(error)
    }
}

impl From<serde_json::Error> for OrchestratorError {
    fn from(error: serde_json::Error) -> Self {
        Self::with_internal(ErrorCode::SerializationError, "failed to (de)serialize payload", error.to_string())
            .with_source(error)
    }
}

impl From<serde_yaml::Error> for OrchestratorError {
    fn from(error: serde_yaml::Error) -> Self {
        Self::with_internal(ErrorCode::InvalidDagDefinition, "failed to parse DAG definition", error.to_string())
            .with_source(error)
    }
}

impl From<std::io::Error> for OrchestratorError {
    fn from(error: std::io::Error) -> Self {
        Self::with_internal(ErrorCode::InternalError, "an I/O error occurred", error.to_string()).with_source(error)
    }
}

impl From<config::ConfigError> for OrchestratorError {
    fn from(error: config::ConfigError) -> Self {
        Self::with_internal(ErrorCode::ConfigurationError, "failed to load configuration", error.to_string())
            .with_source(error)
    }
}

impl From<anyhow::Error> for OrchestratorError {
    fn from(error: anyhow::Error) -> Self {
        Self::with_internal(ErrorCode::InternalError, "an internal error occurred", error.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for OrchestratorError {
    fn from(error: tokio::time::error::Elapsed) -> Self {
        Self::with_internal(ErrorCode::TaskTimeout, "operation timed out", error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_have_stable_numeric_values() {
        assert_eq!(ErrorCode::CycleDetected.numeric_code(), 1000);
        assert_eq!(ErrorCode::OptimisticLock.numeric_code(), 1202);
    }

    #[test]
    fn category_maps_to_taxonomy_kind() {
        assert_eq!(ErrorCode::CycleDetected.category(), "validation");
        assert_eq!(ErrorCode::DagNotFound.category(), "not_found");
        assert_eq!(ErrorCode::OptimisticLock.category(), "conflict");
        assert_eq!(ErrorCode::InvalidTransition.category(), "invalid_transition");
        assert_eq!(ErrorCode::CircuitOpen.category(), "admission");
        assert_eq!(ErrorCode::MessageBusUnavailable.category(), "transport");
        assert_eq!(ErrorCode::TaskTimeout.category(), "timeout");
        assert_eq!(ErrorCode::HandlerPanic.category(), "handler");
    }

    #[test]
    fn admission_and_transport_errors_are_retryable() {
        assert!(ErrorCode::CircuitOpen.is_retryable());
        assert!(ErrorCode::MessageBusUnavailable.is_retryable());
        assert!(!ErrorCode::CycleDetected.is_retryable());
        assert!(!ErrorCode::InvalidTransition.is_retryable());
    }

    #[test]
    fn optimistic_lock_error_carries_entity_id() {
        let err = OrchestratorError::optimistic_lock("task-instance-123");
        assert_eq!(err.code(), ErrorCode::OptimisticLock);
        assert_eq!(err.details().entity_id.as_deref(), Some("task-instance-123"));
    }
}
