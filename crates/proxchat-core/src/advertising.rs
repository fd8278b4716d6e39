//! Advertising lifecycle
//!
//! Publishes the service descriptor plus the local display name so peers
//! can find this device. Failure to start is observational only: it is
//! logged and stays terminal until the next `start` call. No retry.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::ChatConfig;
use crate::link::{Radio, RadioHandle};
use crate::protocol::ServiceDescriptor;

// ----------------------------------------------------------------------------
// Advertiser
// ----------------------------------------------------------------------------

/// Publishes the chat service over the local radio
pub struct Advertiser {
    radio: Arc<dyn Radio>,
    descriptor: ServiceDescriptor,
    local_name: String,
    handle: Option<RadioHandle>,
}

impl Advertiser {
    pub fn new(radio: Arc<dyn Radio>, config: &ChatConfig) -> Self {
        Self {
            radio,
            descriptor: config.descriptor,
            local_name: config.device_name.clone(),
            handle: None,
        }
    }

    /// Start advertising. A no-op while an advertising handle is already
    /// held; failure is logged and otherwise silent.
    pub async fn start(&mut self) {
        if self.handle.is_some() {
            debug!("advertising already active");
            return;
        }

        match self
            .radio
            .start_advertising(&self.descriptor, &self.local_name)
            .await
        {
            Ok(handle) => {
                info!("advertising started as {}", self.local_name);
                self.handle = Some(handle);
            }
            Err(e) => {
                warn!("advertising failed to start: {}", e);
            }
        }
    }

    /// Tear down advertising. Safe to call when not started.
    pub fn stop(&mut self) {
        if self.handle.take().is_some() {
            info!("advertising stopped");
        }
    }

    /// Check if currently advertising
    pub fn is_advertising(&self) -> bool {
        self.handle.is_some()
    }
}
