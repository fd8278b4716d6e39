//! Shared service identifiers and the message-channel codec

use uuid::Uuid;

use crate::error::{ChatError, Result};

// ----------------------------------------------------------------------------
// Service and Channel UUIDs
// ----------------------------------------------------------------------------

/// Chat service UUID advertised by every endpoint
pub const CHAT_SERVICE_UUID: Uuid = Uuid::from_u128(0x8C51_0001_5A7D_4B6C_9E2F_1D43A8C0F5E1);

/// Write-only message channel inside the chat service
pub const MESSAGE_CHANNEL_UUID: Uuid = Uuid::from_u128(0x8C51_0002_5A7D_4B6C_9E2F_1D43A8C0F5E1);

// ----------------------------------------------------------------------------
// Service Descriptor
// ----------------------------------------------------------------------------

/// The identifier pair both roles share so they recognize each other.
/// Peers advertising a different service id are invisible to the scan
/// filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ServiceDescriptor {
    /// Service id carried in the advertise payload and scan filter
    pub service: Uuid,
    /// Message channel id resolved during channel discovery
    pub message_channel: Uuid,
}

impl Default for ServiceDescriptor {
    fn default() -> Self {
        Self {
            service: CHAT_SERVICE_UUID,
            message_channel: MESSAGE_CHANNEL_UUID,
        }
    }
}

// ----------------------------------------------------------------------------
// Message Codec
// ----------------------------------------------------------------------------

/// Encode one outbound message: the UTF-8 bytes of the text, no framing,
/// no length prefix, no escaping. A single write carries a single whole
/// message, so payloads over the transport limit are rejected rather than
/// chunked.
pub fn encode_message(text: &str, max_payload: usize) -> Result<Vec<u8>> {
    let payload = text.as_bytes();
    if payload.len() > max_payload {
        return Err(ChatError::PayloadTooLarge {
            size: payload.len(),
            max: max_payload,
        });
    }
    Ok(payload.to_vec())
}

/// Decode one inbound write. Anything that is not valid UTF-8 yields no
/// message.
pub fn decode_message(payload: &[u8]) -> Option<String> {
    String::from_utf8(payload.to_vec()).ok()
}
