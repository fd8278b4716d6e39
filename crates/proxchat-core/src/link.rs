//! The abstract radio capability and peer-link interface
//!
//! The actual short-range transport lives behind these traits. The core
//! only assumes it can advertise a service, register one server, run a
//! filtered scan, and open outbound links that carry whole-message writes.
//! All asynchronous radio activity is delivered as typed events on the
//! channel senders supplied per call, so each component drains exactly one
//! single-consumer channel.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::error::Result;
use crate::peer::PeerIdentity;
use crate::protocol::ServiceDescriptor;

// ----------------------------------------------------------------------------
// Radio Events
// ----------------------------------------------------------------------------

/// Discovery events pushed by an active scan
#[derive(Debug, Clone)]
pub enum ScanEvent {
    /// A peer advertising the filtered service id was sighted
    PeerSighted(PeerIdentity),
    /// The underlying discovery process failed; the scan halts
    Failed(String),
}

/// Link and server events pushed at a session manager
#[derive(Debug)]
pub enum SessionEvent {
    /// The local server role accepted an inbound connection
    PeerConnected(PeerIdentity),
    /// A link to the peer went down
    PeerDisconnected(PeerIdentity),
    /// A write arrived on the message channel
    InboundWrite {
        peer: PeerIdentity,
        payload: Vec<u8>,
        ack: WriteAck,
    },
}

pub type ScanEventSender = mpsc::UnboundedSender<ScanEvent>;
pub type ScanEventReceiver = mpsc::UnboundedReceiver<ScanEvent>;
pub type SessionEventSender = mpsc::UnboundedSender<SessionEvent>;
pub type SessionEventReceiver = mpsc::UnboundedReceiver<SessionEvent>;

// ----------------------------------------------------------------------------
// Write Acknowledgement
// ----------------------------------------------------------------------------

/// Acknowledgement token for one inbound write.
///
/// The transport contract requires every write on the message channel to
/// be acknowledged back to its origin; leaving one unanswered may stall
/// the writing peer.
#[derive(Debug)]
pub struct WriteAck {
    reply: Option<oneshot::Sender<()>>,
}

impl WriteAck {
    pub fn new(reply: oneshot::Sender<()>) -> Self {
        Self { reply: Some(reply) }
    }

    /// Token for transports that acknowledge at a lower layer
    pub fn noop() -> Self {
        Self { reply: None }
    }

    /// Confirm the write back to its origin
    pub fn send(mut self) {
        if let Some(reply) = self.reply.take() {
            let _ = reply.send(());
        }
    }
}

// ----------------------------------------------------------------------------
// Teardown Guard
// ----------------------------------------------------------------------------

/// Guard for one advertising, server, or scan process on the radio.
/// Dropping the handle tears the process down.
pub struct RadioHandle {
    stop: Option<oneshot::Sender<()>>,
}

impl RadioHandle {
    pub fn new(stop: oneshot::Sender<()>) -> Self {
        Self { stop: Some(stop) }
    }
}

impl Drop for RadioHandle {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

impl fmt::Debug for RadioHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RadioHandle")
            .field("armed", &self.stop.is_some())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Peer Link
// ----------------------------------------------------------------------------

/// One established bidirectional channel to a remote peer, with the
/// message channel already resolved
#[async_trait]
pub trait PeerLink: Send + Sync {
    /// The remote end of this link
    fn peer(&self) -> &PeerIdentity;

    /// Write one message payload. Returns true only when the transport
    /// confirms the write; there is no retry at this layer.
    async fn send(&self, payload: &[u8]) -> bool;
}

impl fmt::Debug for dyn PeerLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerLink").field("peer", self.peer()).finish()
    }
}

// ----------------------------------------------------------------------------
// Radio Capability
// ----------------------------------------------------------------------------

/// The short-range radio the chat core runs over
#[async_trait]
pub trait Radio: Send + Sync + 'static {
    /// Whether the adapter can advertise and scan at the same time.
    /// Scanning refuses to start without this capability.
    fn supports_multi_advertisement(&self) -> bool;

    /// Publish the service id and display name so peers can find this
    /// device. The advertise payload carries nothing else.
    async fn start_advertising(
        &self,
        descriptor: &ServiceDescriptor,
        local_name: &str,
    ) -> Result<RadioHandle>;

    /// Register the chat service: one service with one write-only message
    /// channel. Connection and write events arrive on `events` until the
    /// handle is dropped.
    async fn open_server(
        &self,
        descriptor: &ServiceDescriptor,
        events: SessionEventSender,
    ) -> Result<RadioHandle>;

    /// Begin discovery filtered to the descriptor's service id
    async fn start_scan(
        &self,
        descriptor: &ServiceDescriptor,
        events: ScanEventSender,
    ) -> Result<RadioHandle>;

    /// Open an outbound link to `peer` and resolve the message channel on
    /// it. Later teardown of the link is reported through `events`.
    async fn connect(
        &self,
        peer: &PeerIdentity,
        descriptor: &ServiceDescriptor,
        events: SessionEventSender,
    ) -> Result<Arc<dyn PeerLink>>;
}
