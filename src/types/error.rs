//! Unified Error Type System
//!
//! Centralized error types for the entire application.
//! Every failure surfaced to callers is a [`WikiError`]; the category helpers
//! decide whether a failure ends the current run phase or only the page.
//!
//! ## Error Categories
//!
//! - **Network**: transport could not connect or the stream broke
//! - **HostApi**: repository host rejected or failed a metadata request
//! - **Malformed**: model output did not contain the expected structure
//! - **Backend**: cache/export/config endpoints returned a failure
//! - **Config**: invalid local configuration
//!
//! ## Design Principles
//!
//! - Single unified error type (WikiError) for the entire application
//! - No automatic retries; every error is reported once and the user decides
//! - No panic/unwrap in library code

use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Error Categories
// =============================================================================

/// Coarse classification used for reporting and phase decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Connection refused, socket dropped, stream aborted
    Network,
    /// Authentication rejected by a host or the backend
    Auth,
    /// Resource missing (repository, cache entry, branch)
    NotFound,
    /// Model output could not be parsed
    Malformed,
    /// Server-side failure (5xx)
    Server,
    /// Local configuration or I/O problem
    Local,
    /// Anything else
    Unknown,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network => write!(f, "NETWORK"),
            Self::Auth => write!(f, "AUTH"),
            Self::NotFound => write!(f, "NOT_FOUND"),
            Self::Malformed => write!(f, "MALFORMED"),
            Self::Server => write!(f, "SERVER"),
            Self::Local => write!(f, "LOCAL"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

impl ErrorCategory {
    /// Classify an HTTP status code
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::Auth,
            404 => Self::NotFound,
            500..=599 => Self::Server,
            _ => Self::Unknown,
        }
    }
}

// =============================================================================
// Transport Kind
// =============================================================================

/// Which delivery mechanism produced a transport failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Http,
    WebSocket,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http => write!(f, "http"),
            Self::WebSocket => write!(f, "websocket"),
        }
    }
}

// =============================================================================
// Application Error
// =============================================================================

#[derive(Debug, Error)]
pub enum WikiError {
    // -------------------------------------------------------------------------
    // System Errors (auto From impl)
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    // -------------------------------------------------------------------------
    // Generation Errors
    // -------------------------------------------------------------------------
    /// Network failure or non-success response while streaming
    #[error("{kind} transport error: {message}")]
    Transport {
        kind: TransportKind,
        message: String,
        status: Option<u16>,
    },

    /// No parseable wiki structure in the planning response
    #[error("Malformed wiki structure: {0}")]
    MalformedStructure(String),

    /// Repository host metadata request failed
    #[error("{host} API error: {message}")]
    HostApi { host: String, message: String },

    /// Backend cache/config/projects endpoint failed
    #[error("Backend error ({status}): {message}")]
    Backend { status: u16, message: String },

    /// Export request failed
    #[error("Export failed: {0}")]
    Export(String),

    /// A run phase was started while the same phase is already active
    #[error("A generation run is already in progress for {0}")]
    RunInProgress(String),

    /// Operation timeout with context
    #[error("Timeout after {duration:?}: {operation}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    // -------------------------------------------------------------------------
    // Domain Errors
    // -------------------------------------------------------------------------
    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid repository: {0}")]
    InvalidRepository(String),

    #[error("Cache error: {0}")]
    Cache(String),
}

pub type Result<T> = std::result::Result<T, WikiError>;

// =============================================================================
// Helper Functions
// =============================================================================

impl WikiError {
    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a transport error without an HTTP status
    pub fn transport(kind: TransportKind, message: impl Into<String>) -> Self {
        Self::Transport {
            kind,
            message: message.into(),
            status: None,
        }
    }

    /// Create an HTTP transport error from a non-success response
    pub fn http_status(status: u16, message: impl Into<String>) -> Self {
        Self::Transport {
            kind: TransportKind::Http,
            message: message.into(),
            status: Some(status),
        }
    }

    /// Create a host API error
    pub fn host(host: impl Into<String>, message: impl Into<String>) -> Self {
        Self::HostApi {
            host: host.into(),
            message: message.into(),
        }
    }

    /// Create a backend error
    pub fn backend(status: u16, message: impl Into<String>) -> Self {
        Self::Backend {
            status,
            message: message.into(),
        }
    }

    /// Classify this error for reporting
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Transport {
                status: Some(status),
                ..
            }
            | Self::Backend { status, .. } => ErrorCategory::from_status(*status),
            Self::Transport { .. } | Self::Http(_) | Self::Timeout { .. } => {
                ErrorCategory::Network
            }
            Self::MalformedStructure(_) | Self::Json(_) | Self::Yaml(_) => {
                ErrorCategory::Malformed
            }
            Self::HostApi { message, .. } => {
                if message.contains("Status: 401") || message.contains("Status: 403") {
                    ErrorCategory::Auth
                } else if message.contains("Status: 404") || message.contains("might not exist")
                {
                    ErrorCategory::NotFound
                } else {
                    ErrorCategory::Unknown
                }
            }
            Self::Config(_) | Self::Io(_) | Self::Cache(_) | Self::InvalidRepository(_) => {
                ErrorCategory::Local
            }
            Self::Export(_) | Self::RunInProgress(_) => ErrorCategory::Unknown,
        }
    }

    /// Whether this error ends the run phase it occurred in.
    ///
    /// Page-level failures are recorded on the page instead; export failures
    /// never touch in-memory content.
    pub fn is_phase_fatal(&self) -> bool {
        matches!(
            self,
            Self::MalformedStructure(_)
                | Self::HostApi { .. }
                | Self::Config(_)
                | Self::InvalidRepository(_)
        )
    }
}

/// Context extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn with_context<C: Into<String>>(self, context: C) -> Result<T>;

    /// Add context using a closure (lazy evaluation)
    fn with_context_fn<F, C>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>;
}

impl<T, E: std::error::Error + Send + Sync + 'static> ResultExt<T> for std::result::Result<T, E> {
    fn with_context<C: Into<String>>(self, context: C) -> Result<T> {
        self.map_err(|e| WikiError::Cache(format!("{}: {}", context.into(), e)))
    }

    fn with_context_fn<F, C>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>,
    {
        self.map_err(|e| WikiError::Cache(format!("{}: {}", f().into(), e)))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category_display() {
        assert_eq!(ErrorCategory::Network.to_string(), "NETWORK");
        assert_eq!(ErrorCategory::NotFound.to_string(), "NOT_FOUND");
        assert_eq!(ErrorCategory::Malformed.to_string(), "MALFORMED");
    }

    #[test]
    fn test_category_from_status() {
        assert_eq!(ErrorCategory::from_status(401), ErrorCategory::Auth);
        assert_eq!(ErrorCategory::from_status(403), ErrorCategory::Auth);
        assert_eq!(ErrorCategory::from_status(404), ErrorCategory::NotFound);
        assert_eq!(ErrorCategory::from_status(502), ErrorCategory::Server);
        assert_eq!(ErrorCategory::from_status(418), ErrorCategory::Unknown);
    }

    #[test]
    fn test_transport_error_display() {
        let err = WikiError::http_status(500, "Error generating page content: 500 - boom");
        assert_eq!(
            err.to_string(),
            "http transport error: Error generating page content: 500 - boom"
        );
        assert_eq!(err.category(), ErrorCategory::Server);

        let ws = WikiError::transport(TransportKind::WebSocket, "closed");
        assert_eq!(ws.category(), ErrorCategory::Network);
    }

    #[test]
    fn test_phase_fatal() {
        assert!(WikiError::MalformedStructure("none".into()).is_phase_fatal());
        assert!(WikiError::host("github", "Status: 404").is_phase_fatal());
        assert!(!WikiError::Export("nope".into()).is_phase_fatal());
        assert!(!WikiError::transport(TransportKind::Http, "reset").is_phase_fatal());
    }

    #[test]
    fn test_host_error_category() {
        let err = WikiError::host(
            "github",
            "Could not fetch repository structure. API Error: Status: 404, Response: Not Found",
        );
        assert_eq!(err.category(), ErrorCategory::NotFound);

        let auth = WikiError::host("gitlab", "API Error: Status: 401, Response: denied");
        assert_eq!(auth.category(), ErrorCategory::Auth);
    }

    #[test]
    fn test_result_ext_context() {
        let raw: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::other("disk full"));
        let err = raw.with_context("writing cache").unwrap_err();
        assert_eq!(err.to_string(), "Cache error: writing cache: disk full");
    }
}
