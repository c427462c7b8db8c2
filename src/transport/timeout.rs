//! Unified Timeout Configuration
//!
//! Per-category timeouts derived from the backend configuration, and a helper
//! for bounding async operations with consistent timeout errors.
//!
//! ## Usage
//!
//! ```ignore
//! use crate::transport::timeout::{TimeoutConfig, with_timeout_map};
//!
//! let timeouts = TimeoutConfig::from(&config.backend);
//! let socket = with_timeout_map(timeouts.connect, connect_async(url), "WebSocket connection").await?;
//! ```

use std::future::Future;
use std::time::Duration;

use crate::config::BackendConfig;
use crate::types::{Result, WikiError};

/// Timeouts for backend and host calls
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// WebSocket open timeout for structure and page calls
    pub connect: Duration,
    /// WebSocket open timeout for slide and workshop calls
    pub slide_connect: Duration,
    /// Whole-request timeout for non-streaming JSON requests
    pub request: Duration,
}

impl From<&BackendConfig> for TimeoutConfig {
    fn from(config: &BackendConfig) -> Self {
        Self {
            connect: config.connect_timeout(),
            slide_connect: config.slide_connect_timeout(),
            request: config.request_timeout(),
        }
    }
}

/// Execute an async operation with a timeout
pub async fn with_timeout_map<T, F>(timeout: Duration, future: F, operation_name: &str) -> Result<T>
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => Ok(result),
        Err(_) => Err(WikiError::timeout(operation_name, timeout)),
    }
}
