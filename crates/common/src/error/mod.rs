//! Error classification shared by every keystore layer.
//!
//! Each crate defines its own `thiserror` enum for the failures it can
//! produce. Those enums implement [`ErrorClassification`] so callers can make
//! uniform decisions without matching on every variant:
//!
//! - **`is_retryable()`**: can the same call succeed if attempted again?
//! - **`severity()`**: how loudly should this be reported?
//! - **`is_critical()`**: does the process need operator attention?
//! - **`retry_after()`**: suggested delay before a retry, if any
//!
//! ## Severity Levels
//!
//! | Level | Use Case | Examples |
//! |-------|----------|----------|
//! | **Info** | Expected conditions | Key not created yet |
//! | **Warning** | Degraded but operational | Insert race lost, transient store failure |
//! | **Error** | Failure requiring attention | Store not provisioned, bad ciphertext |
//! | **Critical** | Integrity at risk | Master key unusable, wrapped key cannot be unwrapped |
//!
//! ## Example
//!
//! ```rust,ignore
//! use keystore_common::error::{ErrorClassification, ErrorSeverity};
//! use thiserror::Error;
//!
//! #[derive(Debug, Error)]
//! pub enum WidgetError {
//!     #[error("widget backend unavailable: {0}")]
//!     Unavailable(String),
//!
//!     #[error("widget payload corrupt")]
//!     Corrupt,
//! }
//!
//! impl ErrorClassification for WidgetError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, Self::Unavailable(_))
//!     }
//!
//!     fn severity(&self) -> ErrorSeverity {
//!         match self {
//!             Self::Unavailable(_) => ErrorSeverity::Warning,
//!             Self::Corrupt => ErrorSeverity::Critical,
//!         }
//!     }
//!
//!     fn is_critical(&self) -> bool {
//!         matches!(self, Self::Corrupt)
//!     }
//!
//!     fn retry_after(&self) -> Option<Duration> {
//!         None
//!     }
//! }
//! ```

use std::fmt;
use std::time::Duration;

/// Standard interface for classifying errors by their characteristics.
pub trait ErrorClassification {
    /// Check if this error is retryable
    ///
    /// Retryable errors are transient: a timeout talking to the table
    /// service, a throttled request, a dropped connection.
    fn is_retryable(&self) -> bool;

    /// Get the error severity level
    ///
    /// Used for monitoring, alerting, and logging decisions.
    fn severity(&self) -> ErrorSeverity;

    /// Check if this is a critical error requiring immediate attention
    ///
    /// Critical errors indicate the key hierarchy itself is unusable
    /// (unloadable master key, wrapped keys that no longer unwrap).
    fn is_critical(&self) -> bool;

    /// Get the suggested retry delay if applicable
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// Error severity levels for monitoring and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational, typically for debugging
    Info,
    /// Warning, should be monitored but not critical
    Warning,
    /// Error, requires attention and action
    Error,
    /// Critical, immediate action required
    Critical,
}

impl ErrorSeverity {
    /// Stable lowercase label for structured log fields.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}
