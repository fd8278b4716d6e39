//! In-memory virtual radio
//!
//! Any number of endpoints share one [`VirtualAir`] bus. Advertising makes
//! an endpoint visible to scans filtered on the same service id (including
//! scans already in progress), connecting requires the target to expose a
//! matching server, and message-channel writes are delivered with a
//! per-write acknowledgement that resolves the writer's `send` to true.
//! This mirrors how the real transport behaves closely enough to exercise
//! the whole session lifecycle in tests and demos.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::oneshot;
use tracing::{debug, info};
use uuid::Uuid;

use proxchat_core::link::{
    PeerLink, Radio, RadioHandle, ScanEvent, ScanEventSender, SessionEvent, SessionEventSender,
    WriteAck,
};
use proxchat_core::{ChatError, PeerIdentity, Result, ServiceDescriptor};

// ----------------------------------------------------------------------------
// Airspace
// ----------------------------------------------------------------------------

/// Shared airspace connecting virtual endpoints
#[derive(Clone, Default)]
pub struct VirtualAir {
    inner: Arc<Mutex<AirInner>>,
}

#[derive(Default)]
struct AirInner {
    endpoints: HashMap<String, Endpoint>,
    scans: Vec<ScanPort>,
    next_scan_id: u64,
}

struct Endpoint {
    identity: PeerIdentity,
    /// Service id currently being advertised, if any
    advertising: Option<Uuid>,
    server: Option<ServerPort>,
}

struct ServerPort {
    descriptor: ServiceDescriptor,
    events: SessionEventSender,
}

struct ScanPort {
    id: u64,
    owner: String,
    service: Uuid,
    events: ScanEventSender,
}

impl VirtualAir {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an endpoint in the airspace and hand back its radio
    pub fn endpoint(&self, address: impl Into<String>, display_name: impl Into<String>) -> VirtualRadio {
        let address = address.into();
        let identity = PeerIdentity::named(address.clone(), display_name);
        self.inner.lock().unwrap().endpoints.insert(
            address.clone(),
            Endpoint {
                identity,
                advertising: None,
                server: None,
            },
        );
        VirtualRadio {
            air: self.clone(),
            address,
            multi_advertisement: true,
        }
    }

    /// Fail every scan currently in progress, as a dying adapter would
    pub fn inject_scan_failure(&self, reason: &str) {
        let ports: Vec<ScanPort> = self.inner.lock().unwrap().scans.drain(..).collect();
        for port in ports {
            let _ = port.events.send(ScanEvent::Failed(reason.to_string()));
        }
    }
}

// ----------------------------------------------------------------------------
// Virtual Radio
// ----------------------------------------------------------------------------

/// One endpoint's radio, implementing the core's [`Radio`] capability
pub struct VirtualRadio {
    air: VirtualAir,
    address: String,
    multi_advertisement: bool,
}

impl VirtualRadio {
    /// Simulate an adapter without multi-advertisement support
    pub fn without_multi_advertisement(mut self) -> Self {
        self.multi_advertisement = false;
        self
    }

    /// This endpoint's own identity
    pub fn identity(&self) -> PeerIdentity {
        let inner = self.air.inner.lock().unwrap();
        inner
            .endpoints
            .get(&self.address)
            .map(|endpoint| endpoint.identity.clone())
            .unwrap_or_else(|| PeerIdentity::new(self.address.clone()))
    }

    /// Spawn a task that runs `teardown` once the returned handle drops
    fn guard(air: VirtualAir, teardown: impl FnOnce(&mut AirInner) + Send + 'static) -> RadioHandle {
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            let _ = stop_rx.await;
            teardown(&mut air.inner.lock().unwrap());
        });
        RadioHandle::new(stop_tx)
    }
}

#[async_trait]
impl Radio for VirtualRadio {
    fn supports_multi_advertisement(&self) -> bool {
        self.multi_advertisement
    }

    async fn start_advertising(
        &self,
        descriptor: &ServiceDescriptor,
        local_name: &str,
    ) -> Result<RadioHandle> {
        let identity = PeerIdentity::named(self.address.clone(), local_name);
        {
            let mut inner = self.air.inner.lock().unwrap();
            let endpoint = inner
                .endpoints
                .get_mut(&self.address)
                .ok_or_else(|| ChatError::AdvertiseFailed("endpoint left the air".to_string()))?;
            // the advertise payload carries the display name
            endpoint.identity = identity.clone();
            endpoint.advertising = Some(descriptor.service);

            // scans already in progress see the new advertiser right away
            for scan in &inner.scans {
                if scan.service == descriptor.service && scan.owner != self.address {
                    let _ = scan.events.send(ScanEvent::PeerSighted(identity.clone()));
                }
            }
        }
        debug!("{} advertising {}", self.address, descriptor.service);

        let address = self.address.clone();
        Ok(Self::guard(self.air.clone(), move |inner| {
            if let Some(endpoint) = inner.endpoints.get_mut(&address) {
                endpoint.advertising = None;
            }
        }))
    }

    async fn open_server(
        &self,
        descriptor: &ServiceDescriptor,
        events: SessionEventSender,
    ) -> Result<RadioHandle> {
        {
            let mut inner = self.air.inner.lock().unwrap();
            let endpoint = inner
                .endpoints
                .get_mut(&self.address)
                .ok_or_else(|| ChatError::LinkFailed("endpoint left the air".to_string()))?;
            endpoint.server = Some(ServerPort {
                descriptor: *descriptor,
                events,
            });
        }
        debug!("{} registered chat service", self.address);

        let address = self.address.clone();
        Ok(Self::guard(self.air.clone(), move |inner| {
            if let Some(endpoint) = inner.endpoints.get_mut(&address) {
                endpoint.server = None;
            }
        }))
    }

    async fn start_scan(
        &self,
        descriptor: &ServiceDescriptor,
        events: ScanEventSender,
    ) -> Result<RadioHandle> {
        let id;
        let sightings: Vec<PeerIdentity>;
        {
            let mut inner = self.air.inner.lock().unwrap();
            sightings = inner
                .endpoints
                .values()
                .filter(|endpoint| {
                    endpoint.identity.address != self.address
                        && endpoint.advertising == Some(descriptor.service)
                })
                .map(|endpoint| endpoint.identity.clone())
                .collect();

            id = inner.next_scan_id;
            inner.next_scan_id += 1;
            inner.scans.push(ScanPort {
                id,
                owner: self.address.clone(),
                service: descriptor.service,
                events: events.clone(),
            });
        }

        // endpoints that were already advertising are sighted immediately
        for peer in sightings {
            let _ = events.send(ScanEvent::PeerSighted(peer));
        }

        Ok(Self::guard(self.air.clone(), move |inner| {
            inner.scans.retain(|scan| scan.id != id);
        }))
    }

    async fn connect(
        &self,
        peer: &PeerIdentity,
        descriptor: &ServiceDescriptor,
        _events: SessionEventSender,
    ) -> Result<Arc<dyn PeerLink>> {
        let (local, remote, remote_events) = {
            let inner = self.air.inner.lock().unwrap();
            let target = inner
                .endpoints
                .get(&peer.address)
                .ok_or_else(|| ChatError::LinkFailed(format!("no endpoint at {}", peer.address)))?;
            // channel discovery: the target must expose the same service
            // with the same message channel
            let server = target
                .server
                .as_ref()
                .filter(|server| server.descriptor == *descriptor)
                .ok_or(ChatError::ChannelDiscoveryFailed)?;
            let local = inner
                .endpoints
                .get(&self.address)
                .map(|endpoint| endpoint.identity.clone())
                .ok_or_else(|| ChatError::LinkFailed("endpoint left the air".to_string()))?;
            (local, target.identity.clone(), server.events.clone())
        };

        // the target's server role learns about the inbound connection
        let _ = remote_events.send(SessionEvent::PeerConnected(local.clone()));
        info!("virtual link {} -> {}", local.address, remote.address);

        Ok(Arc::new(VirtualLink {
            local,
            remote,
            descriptor: *descriptor,
            air: self.air.clone(),
        }))
    }
}

// ----------------------------------------------------------------------------
// Virtual Link
// ----------------------------------------------------------------------------

/// One direction of an established pairing. Writes resolve the target's
/// message channel at send time, so a closed server fails the write.
struct VirtualLink {
    local: PeerIdentity,
    remote: PeerIdentity,
    descriptor: ServiceDescriptor,
    air: VirtualAir,
}

impl VirtualLink {
    fn remote_events(&self) -> Option<SessionEventSender> {
        let inner = self.air.inner.lock().unwrap();
        inner
            .endpoints
            .get(&self.remote.address)
            .and_then(|endpoint| endpoint.server.as_ref())
            .filter(|server| server.descriptor.message_channel == self.descriptor.message_channel)
            .map(|server| server.events.clone())
    }
}

#[async_trait]
impl PeerLink for VirtualLink {
    fn peer(&self) -> &PeerIdentity {
        &self.remote
    }

    async fn send(&self, payload: &[u8]) -> bool {
        let Some(events) = self.remote_events() else {
            debug!("write to {} failed: message channel gone", self.remote.address);
            return false;
        };

        let (ack_tx, ack_rx) = oneshot::channel();
        let delivered = events.send(SessionEvent::InboundWrite {
            peer: self.local.clone(),
            payload: payload.to_vec(),
            ack: WriteAck::new(ack_tx),
        });
        if delivered.is_err() {
            return false;
        }

        // the write succeeds only once the receiver acknowledges it
        ack_rx.await.is_ok()
    }
}

impl Drop for VirtualLink {
    fn drop(&mut self) {
        // tell the other side its link went down
        if let Some(events) = self.remote_events() {
            let _ = events.send(SessionEvent::PeerDisconnected(self.local.clone()));
        }
    }
}
