//! Soft-state membership store and the routing tables derived from it.
//!
//! One liveness record per (host, class) pair, refreshed by every
//! heartbeat and forgotten 120 seconds after the last one. There is no
//! background sweep: expiry is evaluated lazily on the next heartbeat,
//! which is enough because routing tables are only consulted at send time.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use super::sender::UnicastSender;
use super::transport::TransportKind;
use super::PeerAddr;
use crate::event::Heartbeat;

/// A peer is forgotten this long after its last heartbeat.
pub const LIVENESS_TTL_SECS: u64 = 120;

pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// One peer's advertised liveness. Identity key is (host, class); a fresh
/// record with the same key supersedes the old one.
#[derive(Debug, Clone)]
pub struct LivenessRecord {
    pub udp_port: Option<u16>,
    pub reliable_port: Option<u16>,
    pub node_host: String,
    pub node_class: String,
    pub last_seen: u64,
}

impl LivenessRecord {
    fn from_heartbeat(hb: &Heartbeat, now: u64) -> LivenessRecord {
        LivenessRecord {
            udp_port: hb.udp_port,
            reliable_port: hb.reliable_port,
            node_host: hb.origin.node_host.clone(),
            node_class: hb.origin.node_class.clone(),
            last_seen: now,
        }
    }

    fn is_match(&self, other: &LivenessRecord) -> bool {
        self.node_host == other.node_host && self.node_class == other.node_class
    }

    fn is_stale(&self, now: u64) -> bool {
        now.saturating_sub(self.last_seen) > LIVENESS_TTL_SECS
    }

    fn port_for(&self, kind: TransportKind) -> Option<u16> {
        match kind {
            TransportKind::Udp => self.udp_port,
            TransportKind::Reliable => self.reliable_port,
        }
    }
}

/// Derived mapping from node class to reachable peer endpoints for one
/// transport kind. Never mutated in place after publication; the store
/// rebuilds it from scratch on every membership change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingTable {
    routes: HashMap<String, Vec<PeerAddr>>,
}

impl RoutingTable {
    /// Rebuild from the full live-record set. Pure: the same record set
    /// yields the same table regardless of insertion order.
    pub fn build(records: &[LivenessRecord], kind: TransportKind) -> RoutingTable {
        let mut table = RoutingTable::default();
        for record in records {
            if let Some(port) = record.port_for(kind) {
                table.insert(&record.node_class, PeerAddr::new(record.node_host.clone(), port));
            }
        }
        for peers in table.routes.values_mut() {
            peers.sort();
            peers.dedup();
        }
        table
    }

    pub fn insert(&mut self, class: &str, peer: PeerAddr) {
        self.routes.entry(class.to_string()).or_default().push(peer);
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn get(&self, class: &str) -> Option<&[PeerAddr]> {
        self.routes.get(class).map(Vec::as_slice)
    }

    /// Union of every class's entries.
    pub fn all_peers(&self) -> Vec<PeerAddr> {
        let mut peers: Vec<PeerAddr> = self.routes.values().flatten().cloned().collect();
        peers.sort();
        peers.dedup();
        peers
    }
}

/// Owns the liveness record set and pushes rebuilt routing snapshots to
/// the two unicast senders. The record lock is short-held and never spans
/// I/O; publication is a snapshot replace, not a shared-mutable update.
pub struct MembershipStore {
    records: Mutex<Vec<LivenessRecord>>,
    udp: Arc<UnicastSender>,
    reliable: Arc<UnicastSender>,
}

impl MembershipStore {
    pub fn new(udp: Arc<UnicastSender>, reliable: Arc<UnicastSender>) -> MembershipStore {
        MembershipStore {
            records: Mutex::new(Vec::new()),
            udp,
            reliable,
        }
    }

    /// Apply one received heartbeat: supersede the same-key record, drop
    /// stale ones, insert the fresh record, rebuild and publish both
    /// per-transport tables.
    pub fn apply(&self, hb: &Heartbeat) {
        self.apply_at(hb, now_secs());
    }

    /// Clock-explicit variant; the seam the expiry tests drive.
    pub fn apply_at(&self, hb: &Heartbeat, now: u64) {
        let fresh = LivenessRecord::from_heartbeat(hb, now);
        tracing::debug!(
            "💓 Heartbeat from {} ({}) udp={:?} reliable={:?}",
            fresh.node_host,
            fresh.node_class,
            fresh.udp_port,
            fresh.reliable_port
        );

        let (udp_table, reliable_table) = {
            let mut records = self.records.lock();
            records.retain(|r| !r.is_match(&fresh) && !r.is_stale(now));
            records.push(fresh);
            (
                RoutingTable::build(&records, TransportKind::Udp),
                RoutingTable::build(&records, TransportKind::Reliable),
            )
        };

        // A table with no entries for a transport is not published: known
        // routes outlive the records they came from until something for
        // that transport reappears.
        if !udp_table.is_empty() {
            self.udp.publish_routes(Arc::new(udp_table));
        }
        if !reliable_table.is_empty() {
            self.reliable.publish_routes(Arc::new(reliable_table));
        }
    }

    /// Current live records for the given clock, oldest first.
    pub fn live_records(&self, now: u64) -> Vec<LivenessRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| !r.is_stale(now))
            .cloned()
            .collect()
    }
}
