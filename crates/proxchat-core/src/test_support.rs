//! Scriptable radio doubles shared by the unit tests

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::error::{ChatError, Result};
use crate::link::{
    PeerLink, Radio, RadioHandle, ScanEventSender, SessionEventSender,
};
use crate::peer::PeerIdentity;
use crate::protocol::ServiceDescriptor;

/// A radio whose behavior the tests script directly: event senders are
/// captured so tests can play radio callbacks, and every start/connect is
/// counted.
pub struct MockRadio {
    multi_advertisement: bool,
    fail_advertising: AtomicBool,
    fail_connect: AtomicBool,
    confirm_writes: AtomicBool,
    advertise_starts: AtomicUsize,
    scan_starts: AtomicUsize,
    server_opens: AtomicUsize,
    connect_calls: AtomicUsize,
    scan_events: Mutex<Option<ScanEventSender>>,
    session_events: Mutex<Option<SessionEventSender>>,
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl MockRadio {
    pub fn new() -> Self {
        Self {
            multi_advertisement: true,
            fail_advertising: AtomicBool::new(false),
            fail_connect: AtomicBool::new(false),
            confirm_writes: AtomicBool::new(true),
            advertise_starts: AtomicUsize::new(0),
            scan_starts: AtomicUsize::new(0),
            server_opens: AtomicUsize::new(0),
            connect_calls: AtomicUsize::new(0),
            scan_events: Mutex::new(None),
            session_events: Mutex::new(None),
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn without_multi_advertisement(mut self) -> Self {
        self.multi_advertisement = false;
        self
    }

    pub fn fail_advertising(&self, fail: bool) {
        self.fail_advertising.store(fail, Ordering::SeqCst);
    }

    pub fn fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    pub fn confirm_writes(&self, confirm: bool) {
        self.confirm_writes.store(confirm, Ordering::SeqCst);
    }

    pub fn advertise_starts(&self) -> usize {
        self.advertise_starts.load(Ordering::SeqCst)
    }

    pub fn scan_starts(&self) -> usize {
        self.scan_starts.load(Ordering::SeqCst)
    }

    pub fn server_opens(&self) -> usize {
        self.server_opens.load(Ordering::SeqCst)
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    /// Sender captured from the most recent `start_scan`
    pub fn scan_events(&self) -> ScanEventSender {
        self.scan_events
            .lock()
            .unwrap()
            .clone()
            .expect("no scan running")
    }

    /// Sender captured from the most recent `open_server` or `connect`
    pub fn session_events(&self) -> SessionEventSender {
        self.session_events
            .lock()
            .unwrap()
            .clone()
            .expect("no server or link open")
    }

    /// Payloads written through links handed out by this radio
    pub fn sent_payloads(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }

    fn handle() -> RadioHandle {
        let (stop, _discarded) = oneshot::channel();
        RadioHandle::new(stop)
    }
}

#[async_trait]
impl Radio for MockRadio {
    fn supports_multi_advertisement(&self) -> bool {
        self.multi_advertisement
    }

    async fn start_advertising(
        &self,
        _descriptor: &ServiceDescriptor,
        _local_name: &str,
    ) -> Result<RadioHandle> {
        if self.fail_advertising.load(Ordering::SeqCst) {
            return Err(ChatError::AdvertiseFailed("mock refusal".to_string()));
        }
        self.advertise_starts.fetch_add(1, Ordering::SeqCst);
        Ok(Self::handle())
    }

    async fn open_server(
        &self,
        _descriptor: &ServiceDescriptor,
        events: SessionEventSender,
    ) -> Result<RadioHandle> {
        self.server_opens.fetch_add(1, Ordering::SeqCst);
        *self.session_events.lock().unwrap() = Some(events);
        Ok(Self::handle())
    }

    async fn start_scan(
        &self,
        _descriptor: &ServiceDescriptor,
        events: ScanEventSender,
    ) -> Result<RadioHandle> {
        self.scan_starts.fetch_add(1, Ordering::SeqCst);
        *self.scan_events.lock().unwrap() = Some(events);
        Ok(Self::handle())
    }

    async fn connect(
        &self,
        peer: &PeerIdentity,
        _descriptor: &ServiceDescriptor,
        events: SessionEventSender,
    ) -> Result<Arc<dyn PeerLink>> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        *self.session_events.lock().unwrap() = Some(events);
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(ChatError::LinkFailed("mock refusal".to_string()));
        }
        Ok(Arc::new(MockLink {
            peer: peer.clone(),
            confirm: self.confirm_writes.load(Ordering::SeqCst),
            sent: Arc::clone(&self.sent),
        }))
    }
}

struct MockLink {
    peer: PeerIdentity,
    confirm: bool,
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
}

#[async_trait]
impl PeerLink for MockLink {
    fn peer(&self) -> &PeerIdentity {
        &self.peer
    }

    async fn send(&self, payload: &[u8]) -> bool {
        self.sent.lock().unwrap().push(payload.to_vec());
        self.confirm
    }
}
