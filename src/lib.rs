//! Federated chat/presence relay core.
//!
//! Relays chat and presence events across a federation of independent
//! server nodes with no central broker. Peers discover each other through
//! periodic heartbeat announcements; every event travels over two
//! transports (UDP datagrams and a reliable framed TCP path) and the
//! receive side suppresses the resulting duplicates before handing events
//! to the consumer.

pub mod config;
pub mod consumer;
pub mod error;
pub mod event;
pub mod network;
pub mod node;
pub mod shutdown;

pub use config::Config;
pub use consumer::{EventConsumer, LogConsumer};
pub use error::RelayError;
pub use node::RelayNode;
