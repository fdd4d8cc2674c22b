//! Unicast sender: serializes access to one transport and applies the
//! multicast/broadcast routing policy.

use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::membership::RoutingTable;
use super::transport::{Transport, TransportKind};
use super::PeerAddr;

/// Wraps one transport. Concurrent callers serialize on the send lock
/// because the underlying socket must not be driven by two tasks at once;
/// each batch of sends is atomic from the transport's perspective.
///
/// The routing table is snapshot data: the membership store publishes a
/// fresh `Arc` on every update and senders clone the latest reference
/// without holding any lock across I/O. A send racing a membership update
/// may use a table one update stale, which is fine for soft state.
pub struct UnicastSender {
    kind: TransportKind,
    transport: Mutex<Box<dyn Transport>>,
    static_hosts: Arc<Vec<PeerAddr>>,
    routes: RwLock<Arc<RoutingTable>>,
}

impl UnicastSender {
    pub fn new(transport: Box<dyn Transport>, static_hosts: Arc<Vec<PeerAddr>>) -> UnicastSender {
        UnicastSender {
            kind: transport.kind(),
            transport: Mutex::new(transport),
            static_hosts,
            routes: RwLock::new(Arc::new(RoutingTable::default())),
        }
    }

    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    /// Replace the routing snapshot. Called by the membership store after
    /// every rebuild.
    pub fn publish_routes(&self, table: Arc<RoutingTable>) {
        *self.routes.write() = table;
    }

    pub fn current_routes(&self) -> Arc<RoutingTable> {
        self.routes.read().clone()
    }

    /// Send the same payload to each peer. Failures are isolated per
    /// address and never abort the batch.
    pub async fn unicast_each(&self, payload: &[u8], peers: &[PeerAddr]) {
        let transport = self.transport.lock().await;
        for peer in peers {
            if let Err(e) = transport.send(payload, peer).await {
                tracing::warn!("📤 {} send to {} failed: {}", self.kind.label(), peer, e);
            }
        }
    }

    /// Routing-table-driven fan-out. An empty table means no liveness data
    /// has arrived yet, so flood the static host set; a known class
    /// narrows to its entries; an unknown class still reaches the union of
    /// everything we know rather than silently dropping.
    pub async fn multicast(&self, payload: &[u8], node_class: Option<&str>) {
        let targets = self.multicast_targets(node_class);
        self.unicast_each(payload, &targets).await;
    }

    fn multicast_targets(&self, node_class: Option<&str>) -> Vec<PeerAddr> {
        let routes = self.current_routes();
        if routes.is_empty() {
            return self.static_hosts.as_ref().clone();
        }
        if let Some(class) = node_class {
            if let Some(peers) = routes.get(class) {
                return peers.to_vec();
            }
        }
        routes.all_peers()
    }

    /// Always targets the static host set, whatever the routing table
    /// says. Used for this node's own liveness announcements, which must
    /// reach every statically known host to bootstrap discovery.
    pub async fn broadcast(&self, payload: &[u8]) {
        self.unicast_each(payload, &self.static_hosts).await;
    }

    pub async fn disable(&self) {
        self.transport.lock().await.disable().await;
    }
}
