//! Error types for the chat core

use thiserror::Error;

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Failures raised by discovery, advertising, and session operations.
///
/// Every failure is local and terminal for the operation that triggered it;
/// nothing here auto-retries, and nothing crosses the observable state
/// surface as a fault. Callers see a state value, a false dispatch outcome,
/// or a log line instead.
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("adapter does not support multi-advertisement")]
    Unsupported,

    #[error("scan failed: {0}")]
    ScanFailed(String),

    #[error("advertising failed: {0}")]
    AdvertiseFailed(String),

    #[error("link failed: {0}")]
    LinkFailed(String),

    #[error("message channel not found on peer service")]
    ChannelDiscoveryFailed,

    #[error("transport write failed")]
    WriteFailed,

    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("no active peer link")]
    NotConnected,
}

pub type Result<T> = std::result::Result<T, ChatError>;
