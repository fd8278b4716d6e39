//! Peer identity and connection state

// ----------------------------------------------------------------------------
// Peer Identity
// ----------------------------------------------------------------------------

/// A remote endpoint as seen during discovery, keyed by its stable address
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PeerIdentity {
    /// Unique stable address of the peer
    pub address: String,
    /// Advertised display name, when the peer included one
    pub display_name: Option<String>,
}

impl PeerIdentity {
    /// Create an identity with no display name
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            display_name: None,
        }
    }

    /// Create an identity with a display name
    pub fn named(address: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            display_name: Some(display_name.into()),
        }
    }

    /// Name suitable for display, falling back to the address
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.address)
    }
}

// ----------------------------------------------------------------------------
// Connection State
// ----------------------------------------------------------------------------

/// Observable state of the single chat session.
///
/// `Connected` is published only after the underlying link reports
/// success; any teardown or failure publishes `Disconnected`, regardless
/// of which role established the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected(PeerIdentity),
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected(_))
    }

    /// The connected peer, when there is one
    pub fn peer(&self) -> Option<&PeerIdentity> {
        match self {
            Self::Connected(peer) => Some(peer),
            Self::Disconnected => None,
        }
    }
}
