//! Timed peer discovery
//!
//! One scan cycle runs Idle → Scanning → (Results | Failed). Sightings
//! accumulate into an address-keyed map (last seen wins) and the full map
//! is republished on every sighting, so consumers see results build up
//! rather than only at the end. The scan stops on its own after the
//! configured window, or earlier on an explicit stop; either way the
//! final accumulated map is published.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ChatConfig;
use crate::link::{Radio, RadioHandle, ScanEvent, ScanEventReceiver};
use crate::peer::PeerIdentity;
use crate::protocol::ServiceDescriptor;

// ----------------------------------------------------------------------------
// Scan State
// ----------------------------------------------------------------------------

/// Observable discovery state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Scanning,
    /// Full accumulated set of sightings since the scan began, keyed by
    /// address. Never a partial delta.
    Results(HashMap<String, PeerIdentity>),
    Failed(String),
    /// The adapter cannot run multi-advertisement discovery; terminal
    Unsupported,
}

// ----------------------------------------------------------------------------
// Scanner
// ----------------------------------------------------------------------------

/// Runs bounded-duration discovery cycles for chat peers
pub struct Scanner {
    radio: Arc<dyn Radio>,
    descriptor: ServiceDescriptor,
    scan_window: Duration,
    state: watch::Sender<ScanState>,
    active: Option<ActiveScan>,
}

struct ActiveScan {
    cancel: Option<oneshot::Sender<()>>,
    worker: JoinHandle<()>,
}

impl Scanner {
    pub fn new(radio: Arc<dyn Radio>, config: &ChatConfig) -> Self {
        let (state, _) = watch::channel(ScanState::Idle);
        Self {
            radio,
            descriptor: config.descriptor,
            scan_window: config.scan_window,
            state,
            active: None,
        }
    }

    /// Observable scan state, last write wins
    pub fn state(&self) -> watch::Receiver<ScanState> {
        self.state.subscribe()
    }

    /// Begin one discovery cycle. Fails fast with `Unsupported` when the
    /// adapter lacks multi-advertisement capability; a no-op while a scan
    /// is already in progress.
    pub async fn start_scan(&mut self) {
        if !self.radio.supports_multi_advertisement() {
            warn!("adapter does not support multi-advertisement, not scanning");
            self.state.send_replace(ScanState::Unsupported);
            return;
        }

        if let Some(active) = &self.active {
            if !active.worker.is_finished() {
                debug!("scan already in progress");
                return;
            }
        }
        self.active = None;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        match self.radio.start_scan(&self.descriptor, events_tx).await {
            Ok(handle) => {
                info!("scan started, window {:?}", self.scan_window);
                self.state.send_replace(ScanState::Scanning);

                let (cancel_tx, cancel_rx) = oneshot::channel();
                let worker = tokio::spawn(drive_scan(
                    handle,
                    events_rx,
                    cancel_rx,
                    self.state.clone(),
                    self.scan_window,
                ));
                self.active = Some(ActiveScan {
                    cancel: Some(cancel_tx),
                    worker,
                });
            }
            Err(e) => {
                warn!("failed to start scan: {}", e);
                self.state.send_replace(ScanState::Failed(e.to_string()));
            }
        }
    }

    /// Cancel the discovery cycle early. The final accumulated results
    /// are still published. Safe to call when no scan is running.
    pub fn stop_scan(&mut self) {
        if let Some(mut active) = self.active.take() {
            if let Some(cancel) = active.cancel.take() {
                let _ = cancel.send(());
            }
        }
    }
}

impl Drop for Scanner {
    fn drop(&mut self) {
        self.stop_scan();
    }
}

/// Drain one scan cycle: accumulate sightings, republish on each, stop on
/// window expiry or cancellation, and publish the final map. A failure
/// event overrides everything and halts discovery with no final results.
async fn drive_scan(
    handle: RadioHandle,
    mut events: ScanEventReceiver,
    mut cancel: oneshot::Receiver<()>,
    state: watch::Sender<ScanState>,
    window: Duration,
) {
    let mut sightings: HashMap<String, PeerIdentity> = HashMap::new();
    let deadline = tokio::time::sleep(window);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => {
                debug!("scan window elapsed");
                break;
            }
            _ = &mut cancel => {
                debug!("scan cancelled");
                break;
            }
            event = events.recv() => match event {
                Some(ScanEvent::PeerSighted(peer)) => {
                    debug!("sighted {} at {}", peer.label(), peer.address);
                    sightings.insert(peer.address.clone(), peer);
                    state.send_replace(ScanState::Results(sightings.clone()));
                }
                Some(ScanEvent::Failed(reason)) => {
                    warn!("scan failed: {}", reason);
                    state.send_replace(ScanState::Failed(reason));
                    return;
                }
                None => break,
            }
        }
    }

    drop(handle);
    info!("scan finished with {} peer(s)", sightings.len());
    state.send_replace(ScanState::Results(sightings));
}
