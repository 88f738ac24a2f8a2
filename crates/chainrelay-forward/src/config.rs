//! Sink configuration.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_request_timeout_ms() -> u64 {
    10_000
}

/// Where records go: an event-name → endpoint table, optionally relative to a base URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Joined with relative endpoints; unused when every endpoint is absolute
    #[serde(default)]
    pub base_url: Option<String>,
    /// Event name → path or absolute URL
    #[serde(default)]
    pub endpoints: IndexMap<String, String>,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            endpoints: IndexMap::new(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl SinkConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
