//! Session, discovery, and message delivery core for proxchat
//!
//! One party registers a chat service and advertises it, a peer discovers
//! and connects, and short UTF-8 messages flow both ways over a single
//! active link. The radio itself stays behind the [`link::Radio`]
//! abstraction; this crate owns the lifecycle around it:
//!
//! - [`protocol`] - shared service identifiers and the message codec
//! - [`config`] - endpoint configuration
//! - [`error`] - failure taxonomy
//! - [`peer`] - peer identity and connection state
//! - [`message`] - chat messages and the append-only log
//! - [`link`] - the abstract radio and peer-link interface
//! - [`advertising`] - advertising lifecycle
//! - [`discovery`] - timed peer scanning
//! - [`session`] - the single-session manager, both roles
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use proxchat_core::{Advertiser, ChatConfig, Scanner, SessionManager};
//! use proxchat_core::link::Radio;
//!
//! # async fn example(radio: Arc<dyn Radio>) -> proxchat_core::Result<()> {
//! let config = ChatConfig::new().with_device_name("kitchen-tablet");
//!
//! // Host role: register the service before advertising it, so a peer
//! // connecting right after discovery finds the message channel.
//! let session = SessionManager::new(Arc::clone(&radio), &config);
//! session.start_server().await?;
//!
//! let mut advertiser = Advertiser::new(Arc::clone(&radio), &config);
//! advertiser.start().await;
//!
//! // Client role: scan, pick a peer from the results, connect, chat.
//! let mut scanner = Scanner::new(radio, &config);
//! scanner.start_scan().await;
//! # Ok(())
//! # }
//! ```

pub mod advertising;
pub mod config;
pub mod discovery;
pub mod error;
pub mod link;
pub mod message;
pub mod peer;
pub mod protocol;
pub mod session;

#[cfg(test)]
mod test_support;

// Public API exports
pub use advertising::Advertiser;
pub use config::ChatConfig;
pub use discovery::{ScanState, Scanner};
pub use error::{ChatError, Result};
pub use link::{PeerLink, Radio, RadioHandle, ScanEvent, SessionEvent, WriteAck};
pub use message::{ChatLog, Message, MessageOrigin};
pub use peer::{ConnectionState, PeerIdentity};
pub use protocol::{ServiceDescriptor, CHAT_SERVICE_UUID, MESSAGE_CHANNEL_UUID};
pub use session::{ActiveLink, SessionManager};
