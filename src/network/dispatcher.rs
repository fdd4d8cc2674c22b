//! Dispatcher: the node's outward face.
//!
//! Encodes an event once and fans it out over both transports using each
//! transport's own routing table, keeps the federation aware of this node
//! through the periodic liveness announcement, and feeds received
//! heartbeats into the membership store.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::membership::{MembershipStore, RoutingTable};
use super::sender::UnicastSender;
use super::transport::TransportKind;
use crate::config::Config;
use crate::error::RelayError;
use crate::event::{Event, Heartbeat};

/// Roughly a third of the 120s liveness TTL, so at least two announcements
/// land before a peer would forget us.
pub const ANNOUNCE_INTERVAL: Duration = Duration::from_secs(40);

pub struct Dispatcher {
    udp: Arc<UnicastSender>,
    reliable: Arc<UnicastSender>,
    membership: Arc<MembershipStore>,
    config: Arc<Config>,
    cancel: CancellationToken,
}

impl Dispatcher {
    pub fn new(
        udp: Arc<UnicastSender>,
        reliable: Arc<UnicastSender>,
        membership: Arc<MembershipStore>,
        config: Arc<Config>,
        cancel: CancellationToken,
    ) -> Dispatcher {
        Dispatcher {
            udp,
            reliable,
            membership,
            config,
            cancel,
        }
    }

    /// Encode once, multicast on both transports. Routing is keyed by the
    /// envelope's own node class against each transport's table.
    pub async fn broadcast_event(&self, evt: &Event) -> Result<(), RelayError> {
        let bytes = evt.encode()?;
        tracing::debug!("📣 Relaying {} (id {})", evt.kind(), evt.origin().event_id);
        self.udp.multicast(&bytes, Some(evt.node_class())).await;
        self.reliable.multicast(&bytes, Some(evt.node_class())).await;
        Ok(())
    }

    /// Broadcast this node's heartbeat to every statically known host on
    /// both transports.
    pub async fn announce_liveness(&self) -> Result<(), RelayError> {
        let hb = Heartbeat::announce(&self.config);
        let bytes = Event::Heartbeat(hb).encode()?;
        self.udp.broadcast(&bytes).await;
        self.reliable.broadcast(&bytes).await;
        Ok(())
    }

    /// Repeating liveness timer. First announcement fires immediately.
    pub async fn run_announcer(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(ANNOUNCE_INTERVAL);
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.announce_liveness().await {
                        tracing::warn!("💓 Liveness announcement failed: {}", e);
                    }
                }
            }
        }
        tracing::info!("💓 Announcer stopped");
    }

    pub fn on_liveness_received(&self, hb: &Heartbeat) {
        self.membership.apply(hb);
    }

    /// Routing snapshot for one transport, for introspection and tests.
    pub fn routes(&self, kind: TransportKind) -> Arc<RoutingTable> {
        match kind {
            TransportKind::Udp => self.udp.current_routes(),
            TransportKind::Reliable => self.reliable.current_routes(),
        }
    }

    /// Stop the announcer and disable both transports. Idempotent, safe
    /// from any task.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.udp.disable().await;
        self.reliable.disable().await;
    }
}
