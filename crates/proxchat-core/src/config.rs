//! Chat endpoint configuration

use std::time::Duration;

use crate::protocol::ServiceDescriptor;

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// Tunables shared by the advertising, discovery, and session components
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ChatConfig {
    /// Display name carried in the advertise payload
    pub device_name: String,
    /// How long one discovery cycle runs before stopping automatically
    pub scan_window: Duration,
    /// Maximum single-write payload; one write carries one whole message
    pub max_payload: usize,
    /// Identifier pair all peers of this deployment share
    pub descriptor: ServiceDescriptor,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            device_name: "proxchat".to_string(),
            scan_window: Duration::from_secs(20),
            max_payload: 512,
            descriptor: ServiceDescriptor::default(),
        }
    }
}

impl ChatConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the advertised display name
    pub fn with_device_name(mut self, name: impl Into<String>) -> Self {
        self.device_name = name.into();
        self
    }

    /// Set the discovery window
    pub fn with_scan_window(mut self, window: Duration) -> Self {
        self.scan_window = window;
        self
    }

    /// Set the maximum single-write payload size
    pub fn with_max_payload(mut self, max: usize) -> Self {
        self.max_payload = max;
        self
    }

    /// Set a non-default service descriptor
    pub fn with_descriptor(mut self, descriptor: ServiceDescriptor) -> Self {
        self.descriptor = descriptor;
        self
    }
}
