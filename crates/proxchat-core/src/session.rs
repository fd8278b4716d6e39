//! Single-session management, both roles
//!
//! One `SessionManager` covers the server role (accept exactly one inbound
//! connection, relay message-channel writes) and the client role (dial a
//! chosen peer). Whichever role establishes the session, the active link
//! is held as a tagged [`ActiveLink`] and `send_message` dispatches
//! uniformly through it.
//!
//! The manager owns one worker task that drains the session event channel;
//! every radio callback becomes a typed [`SessionEvent`] on that channel,
//! so state mutation is serialized in one place.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ChatConfig;
use crate::error::Result;
use crate::link::{
    PeerLink, Radio, RadioHandle, SessionEvent, SessionEventReceiver, SessionEventSender, WriteAck,
};
use crate::message::Message;
use crate::peer::{ConnectionState, PeerIdentity};
use crate::protocol::{self, ServiceDescriptor};

/// Capacity of the observable message stream
const MESSAGE_STREAM_CAPACITY: usize = 64;

// ----------------------------------------------------------------------------
// Active Link
// ----------------------------------------------------------------------------

/// The one live session, tagged by which role established it
pub enum ActiveLink {
    /// Accepted inbound by the server role, with the return link dialed
    /// back out so this side can send too
    ServerAccepted(Arc<dyn PeerLink>),
    /// Dialed outbound after the peer was chosen from scan results
    ClientInitiated(Arc<dyn PeerLink>),
}

impl ActiveLink {
    pub fn link(&self) -> &Arc<dyn PeerLink> {
        match self {
            Self::ServerAccepted(link) | Self::ClientInitiated(link) => link,
        }
    }
}

// ----------------------------------------------------------------------------
// Session Manager
// ----------------------------------------------------------------------------

/// Owns the single chat session and its observable state.
///
/// Explicit lifecycle: create with [`SessionManager::new`] inside a tokio
/// runtime, tear down with [`SessionManager::shutdown`]. Dropping the
/// manager stops its worker.
pub struct SessionManager {
    shared: Arc<SessionShared>,
    worker: JoinHandle<()>,
}

struct SessionShared {
    radio: Arc<dyn Radio>,
    descriptor: ServiceDescriptor,
    max_payload: usize,
    connection: watch::Sender<ConnectionState>,
    messages: broadcast::Sender<Message>,
    events: SessionEventSender,
    inner: Mutex<SessionInner>,
}

#[derive(Default)]
struct SessionInner {
    server: Option<RadioHandle>,
    active: Option<ActiveLink>,
    /// Address currently being dialed, so a concurrent inbound connect
    /// from the same peer does not trigger a second dial
    dialing: Option<String>,
}

impl SessionManager {
    pub fn new(radio: Arc<dyn Radio>, config: &ChatConfig) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (connection, _) = watch::channel(ConnectionState::Disconnected);
        let (messages, _) = broadcast::channel(MESSAGE_STREAM_CAPACITY);

        let shared = Arc::new(SessionShared {
            radio,
            descriptor: config.descriptor,
            max_payload: config.max_payload,
            connection,
            messages,
            events: events_tx,
            inner: Mutex::new(SessionInner::default()),
        });

        let worker = tokio::spawn(run_session(Arc::clone(&shared), events_rx));
        Self { shared, worker }
    }

    /// Observable connection state, last write wins
    pub fn connection(&self) -> watch::Receiver<ConnectionState> {
        self.shared.connection.subscribe()
    }

    /// Observable message stream: one entry per delivered inbound message
    /// and per transport-confirmed outbound message, in arrival order
    pub fn messages(&self) -> broadcast::Receiver<Message> {
        self.shared.messages.subscribe()
    }

    /// Register the chat service with the radio so inbound connections and
    /// writes can be accepted. Call before advertising, so a peer that
    /// connects straight after discovery finds the message channel.
    pub async fn start_server(&self) -> Result<()> {
        let mut inner = self.shared.inner.lock().await;
        if inner.server.is_some() {
            debug!("server already registered");
            return Ok(());
        }

        let handle = self
            .shared
            .radio
            .open_server(&self.shared.descriptor, self.shared.events.clone())
            .await?;
        inner.server = Some(handle);
        info!("chat service registered");
        Ok(())
    }

    /// Dial a discovered peer. Returns immediately; the outcome arrives on
    /// the connection state channel. Any existing session is resolved to
    /// `Disconnected` first.
    pub fn connect(&self, peer: PeerIdentity) {
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            shared.establish(peer, ActiveLink::ClientInitiated).await;
        });
    }

    /// Send one message over the active session, whichever role created
    /// it. Returns true when the attempt was dispatched; the write itself
    /// completes asynchronously, and only a transport-confirmed write
    /// publishes a `Message` with local origin. A failed write is dropped
    /// without a trace in the message stream.
    pub async fn send_message(&self, text: &str) -> bool {
        let link = {
            let inner = self.shared.inner.lock().await;
            match &inner.active {
                Some(active) => Arc::clone(active.link()),
                None => {
                    debug!("send with no active session");
                    return false;
                }
            }
        };

        let payload = match protocol::encode_message(text, self.shared.max_payload) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("refusing to send: {}", e);
                return false;
            }
        };

        let messages = self.shared.messages.clone();
        let text = text.to_owned();
        tokio::spawn(async move {
            if link.send(&payload).await {
                let _ = messages.send(Message::local(text));
            } else {
                debug!("transport write failed, message dropped");
            }
        });
        true
    }

    /// Drop the server registration and the active link, publish
    /// `Disconnected`, and stop the worker
    pub async fn shutdown(&self) {
        {
            let mut inner = self.shared.inner.lock().await;
            inner.server = None;
            inner.active = None;
            inner.dialing = None;
        }
        self.shared
            .connection
            .send_replace(ConnectionState::Disconnected);
        self.worker.abort();
        info!("session manager shut down");
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

impl SessionShared {
    /// Resolve any existing session, dial `peer`, and publish the outcome.
    /// `Connected` goes out only after the link (message channel included)
    /// is up.
    async fn establish(&self, peer: PeerIdentity, wrap: fn(Arc<dyn PeerLink>) -> ActiveLink) {
        {
            let mut inner = self.inner.lock().await;
            if inner.dialing.as_deref() == Some(peer.address.as_str()) {
                debug!("already dialing {}", peer.address);
                return;
            }
            inner.dialing = Some(peer.address.clone());
            if inner.active.take().is_some() {
                debug!("existing session resolved before new connection attempt");
                self.connection.send_replace(ConnectionState::Disconnected);
            }
        }

        info!("connecting to {}", peer.address);
        match self
            .radio
            .connect(&peer, &self.descriptor, self.events.clone())
            .await
        {
            Ok(link) => {
                let mut inner = self.inner.lock().await;
                inner.dialing = None;
                inner.active = Some(wrap(link));
                drop(inner);
                info!("session established with {}", peer.label());
                self.connection
                    .send_replace(ConnectionState::Connected(peer));
            }
            Err(e) => {
                self.inner.lock().await.dialing = None;
                warn!("link to {} failed: {}", peer.address, e);
                self.connection.send_replace(ConnectionState::Disconnected);
            }
        }
    }

    /// Inbound connection accepted by the server role. Dial the return
    /// link so this side can send too, unless a session with that peer is
    /// already up or being set up.
    async fn handle_peer_connected(&self, peer: PeerIdentity) {
        {
            let inner = self.inner.lock().await;
            let already_active = inner
                .active
                .as_ref()
                .is_some_and(|active| active.link().peer().address == peer.address);
            let already_dialing = inner.dialing.as_deref() == Some(peer.address.as_str());
            if already_active || already_dialing {
                debug!("inbound connect from {} matches the current session", peer.address);
                return;
            }
        }

        self.establish(peer, ActiveLink::ServerAccepted).await;
    }

    /// A link went down. Only a teardown of the current session's peer
    /// clears state; anything else is a stale report.
    async fn handle_peer_disconnected(&self, peer: PeerIdentity) {
        let mut inner = self.inner.lock().await;
        let matches_active = inner
            .active
            .as_ref()
            .is_some_and(|active| active.link().peer().address == peer.address);
        if !matches_active {
            if inner.active.is_some() {
                debug!("stale disconnect report from {}", peer.address);
            }
            return;
        }

        inner.active = None;
        drop(inner);
        info!("peer {} disconnected", peer.address);
        self.connection.send_replace(ConnectionState::Disconnected);
    }

    /// A write arrived on the message channel. The write is acknowledged
    /// before anything else, even when the payload turns out to be
    /// malformed; a malformed payload then yields no message at all.
    fn handle_inbound_write(&self, peer: PeerIdentity, payload: Vec<u8>, ack: WriteAck) {
        ack.send();
        match protocol::decode_message(&payload) {
            Some(text) => {
                debug!("message from {} ({} bytes)", peer.address, text.len());
                let _ = self.messages.send(Message::remote(text));
            }
            None => debug!("dropping malformed payload from {}", peer.address),
        }
    }
}

/// Worker loop: every radio callback arrives here as a typed event
async fn run_session(shared: Arc<SessionShared>, mut events: SessionEventReceiver) {
    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::PeerConnected(peer) => shared.handle_peer_connected(peer).await,
            SessionEvent::PeerDisconnected(peer) => shared.handle_peer_disconnected(peer).await,
            SessionEvent::InboundWrite { peer, payload, ack } => {
                shared.handle_inbound_write(peer, payload, ack)
            }
        }
    }
    debug!("session event channel closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tokio::sync::oneshot;
    use tokio::time::timeout;

    use crate::test_support::MockRadio;

    fn manager_with(radio: &Arc<MockRadio>, config: &ChatConfig) -> SessionManager {
        let radio: Arc<dyn Radio> = radio.clone();
        SessionManager::new(radio, config)
    }

    #[tokio::test]
    async fn test_connect_publishes_connected_after_link_success() {
        let radio = Arc::new(MockRadio::new());
        let manager = manager_with(&radio, &ChatConfig::default());
        let mut connection = manager.connection();

        manager.connect(PeerIdentity::named("AA:BB", "X"));

        let state = connection.wait_for(|c| c.is_connected()).await.unwrap().clone();
        assert_eq!(
            state,
            ConnectionState::Connected(PeerIdentity::named("AA:BB", "X"))
        );
    }

    #[tokio::test]
    async fn test_failed_dial_publishes_disconnected() {
        let radio = Arc::new(MockRadio::new());
        radio.fail_connect(true);
        let manager = manager_with(&radio, &ChatConfig::default());
        let mut connection = manager.connection();

        manager.connect(PeerIdentity::new("AA:BB"));

        // the watch sees a fresh Disconnected publication
        connection.changed().await.unwrap();
        assert_eq!(*connection.borrow(), ConnectionState::Disconnected);
        assert!(!manager.send_message("hi").await);
    }

    #[tokio::test]
    async fn test_inbound_connect_dials_the_return_link() {
        let radio = Arc::new(MockRadio::new());
        let manager = manager_with(&radio, &ChatConfig::default());
        let mut connection = manager.connection();
        manager.start_server().await.unwrap();

        radio
            .session_events()
            .send(SessionEvent::PeerConnected(PeerIdentity::named("AA:BB", "X")))
            .unwrap();

        connection.wait_for(|c| c.is_connected()).await.unwrap();
        assert_eq!(radio.connect_calls(), 1);

        // host can now send through the server-accepted session
        assert!(manager.send_message("hi from host").await);
    }

    #[tokio::test]
    async fn test_repeated_inbound_connect_is_ignored_for_the_active_peer() {
        let radio = Arc::new(MockRadio::new());
        let manager = manager_with(&radio, &ChatConfig::default());
        let mut connection = manager.connection();
        manager.start_server().await.unwrap();

        let events = radio.session_events();
        events
            .send(SessionEvent::PeerConnected(PeerIdentity::new("AA:BB")))
            .unwrap();
        connection.wait_for(|c| c.is_connected()).await.unwrap();

        events
            .send(SessionEvent::PeerConnected(PeerIdentity::new("AA:BB")))
            .unwrap();
        // sync on a write so the event above has been drained
        let (ack_tx, ack_rx) = oneshot::channel();
        events
            .send(SessionEvent::InboundWrite {
                peer: PeerIdentity::new("AA:BB"),
                payload: b"ping".to_vec(),
                ack: WriteAck::new(ack_tx),
            })
            .unwrap();
        ack_rx.await.unwrap();

        assert_eq!(radio.connect_calls(), 1);
    }

    #[tokio::test]
    async fn test_new_connection_resolves_the_existing_session_first() {
        let radio = Arc::new(MockRadio::new());
        let manager = manager_with(&radio, &ChatConfig::default());
        let mut connection = manager.connection();

        manager.connect(PeerIdentity::new("AA:BB"));
        connection.wait_for(|c| c.is_connected()).await.unwrap();

        manager.connect(PeerIdentity::new("CC:DD"));
        let state = connection
            .wait_for(|c| c.peer().map(|p| p.address.as_str()) == Some("CC:DD"))
            .await
            .unwrap()
            .clone();
        assert_eq!(state, ConnectionState::Connected(PeerIdentity::new("CC:DD")));
        assert_eq!(radio.connect_calls(), 2);
    }

    #[tokio::test]
    async fn test_disconnect_event_clears_the_session() {
        let radio = Arc::new(MockRadio::new());
        let manager = manager_with(&radio, &ChatConfig::default());
        let mut connection = manager.connection();

        manager.connect(PeerIdentity::new("AA:BB"));
        connection.wait_for(|c| c.is_connected()).await.unwrap();

        radio
            .session_events()
            .send(SessionEvent::PeerDisconnected(PeerIdentity::new("AA:BB")))
            .unwrap();

        connection
            .wait_for(|c| !c.is_connected())
            .await
            .unwrap();
        assert!(!manager.send_message("too late").await);
    }

    #[tokio::test]
    async fn test_confirmed_send_publishes_exactly_one_local_message() {
        let radio = Arc::new(MockRadio::new());
        let manager = manager_with(&radio, &ChatConfig::default());
        let mut connection = manager.connection();
        let mut messages = manager.messages();

        manager.connect(PeerIdentity::new("AA:BB"));
        connection.wait_for(|c| c.is_connected()).await.unwrap();

        assert!(manager.send_message("hi").await);

        assert_eq!(messages.recv().await.unwrap(), Message::local("hi"));
        assert_eq!(radio.sent_payloads(), vec![b"hi".to_vec()]);
        // nothing else was published
        assert!(timeout(Duration::from_millis(50), messages.recv())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_unconfirmed_send_is_dropped_silently() {
        let radio = Arc::new(MockRadio::new());
        radio.confirm_writes(false);
        let manager = manager_with(&radio, &ChatConfig::default());
        let mut connection = manager.connection();
        let mut messages = manager.messages();

        manager.connect(PeerIdentity::new("AA:BB"));
        connection.wait_for(|c| c.is_connected()).await.unwrap();

        // dispatched, but the transport never confirms
        assert!(manager.send_message("hi").await);
        assert!(timeout(Duration::from_millis(50), messages.recv())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_send_rejects_oversize_payload() {
        let radio = Arc::new(MockRadio::new());
        let config = ChatConfig::new().with_max_payload(4);
        let manager = manager_with(&radio, &config);
        let mut connection = manager.connection();

        manager.connect(PeerIdentity::new("AA:BB"));
        connection.wait_for(|c| c.is_connected()).await.unwrap();

        assert!(!manager.send_message("way too long").await);
        assert!(radio.sent_payloads().is_empty());
    }

    #[tokio::test]
    async fn test_inbound_write_is_acked_and_published() {
        let radio = Arc::new(MockRadio::new());
        let manager = manager_with(&radio, &ChatConfig::default());
        let mut messages = manager.messages();
        manager.start_server().await.unwrap();

        let (ack_tx, ack_rx) = oneshot::channel();
        radio
            .session_events()
            .send(SessionEvent::InboundWrite {
                peer: PeerIdentity::new("AA:BB"),
                payload: b"hello".to_vec(),
                ack: WriteAck::new(ack_tx),
            })
            .unwrap();

        ack_rx.await.unwrap();
        assert_eq!(messages.recv().await.unwrap(), Message::remote("hello"));
    }

    #[tokio::test]
    async fn test_malformed_inbound_write_is_acked_but_dropped() {
        let radio = Arc::new(MockRadio::new());
        let manager = manager_with(&radio, &ChatConfig::default());
        let mut connection = manager.connection();
        let mut messages = manager.messages();
        manager.start_server().await.unwrap();

        let before = connection.borrow_and_update().clone();

        let (ack_tx, ack_rx) = oneshot::channel();
        let events = radio.session_events();
        events
            .send(SessionEvent::InboundWrite {
                peer: PeerIdentity::new("AA:BB"),
                payload: vec![0xFF, 0xFE],
                ack: WriteAck::new(ack_tx),
            })
            .unwrap();

        // still acknowledged per the transport contract
        ack_rx.await.unwrap();

        // zero messages came out of it, and the connection state is untouched
        events
            .send(SessionEvent::InboundWrite {
                peer: PeerIdentity::new("AA:BB"),
                payload: b"ok".to_vec(),
                ack: WriteAck::noop(),
            })
            .unwrap();
        assert_eq!(messages.recv().await.unwrap(), Message::remote("ok"));
        assert_eq!(*connection.borrow(), before);
    }

    #[tokio::test]
    async fn test_start_server_is_idempotent() {
        let radio = Arc::new(MockRadio::new());
        let manager = manager_with(&radio, &ChatConfig::default());

        manager.start_server().await.unwrap();
        manager.start_server().await.unwrap();

        assert_eq!(radio.server_opens(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_publishes_disconnected() {
        let radio = Arc::new(MockRadio::new());
        let manager = manager_with(&radio, &ChatConfig::default());
        let mut connection = manager.connection();
        manager.start_server().await.unwrap();

        manager.connect(PeerIdentity::new("AA:BB"));
        connection.wait_for(|c| c.is_connected()).await.unwrap();

        manager.shutdown().await;

        assert_eq!(*connection.borrow(), ConnectionState::Disconnected);
        assert!(!manager.send_message("after shutdown").await);
    }
}
