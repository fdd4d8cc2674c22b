//! Receive-side decode and duplicate suppression.
//!
//! Both receive loops feed raw envelope bytes here. The generic envelope
//! is decoded first (discriminant + event id only); the dedup check runs
//! before the full variant decode so the consumer never sees the same
//! logical event twice when both transports deliver it. Heartbeats are
//! routed to the dispatcher and never exposed to the consumer. Unknown
//! discriminants are ignored for forward compatibility with newer peers.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

use super::dispatcher::Dispatcher;
use crate::consumer::EventConsumer;
use crate::event::{Direction, Event, Head};

/// Number of recently accepted event ids remembered for dedup.
pub const DEDUP_WINDOW: usize = 50;

pub struct Decoder {
    consumer: Arc<dyn EventConsumer>,
    dispatcher: Arc<Dispatcher>,
    seen: Mutex<VecDeque<u32>>,
}

impl Decoder {
    pub fn new(consumer: Arc<dyn EventConsumer>, dispatcher: Arc<Dispatcher>) -> Decoder {
        Decoder {
            consumer,
            dispatcher,
            seen: Mutex::new(VecDeque::with_capacity(DEDUP_WINDOW + 1)),
        }
    }

    /// Handle one raw envelope received on the named transport.
    pub fn on_bytes(&self, transport: &str, bytes: &[u8]) {
        let head: Head = match serde_json::from_slice(bytes) {
            Ok(head) => head,
            Err(e) => {
                tracing::warn!("📥 Malformed envelope on {}: {}", transport, e);
                return;
            }
        };

        // Atomic check-and-record. The lock is never held across the full
        // decode or the consumer call.
        {
            let mut seen = self.seen.lock();
            if seen.contains(&head.event_id) {
                tracing::debug!(
                    "📥 Duplicate {} (id {}) on {}",
                    head.kind,
                    head.event_id,
                    transport
                );
                return;
            }
            seen.push_back(head.event_id);
            while seen.len() > DEDUP_WINDOW {
                seen.pop_front();
            }
        }

        match head.kind.as_str() {
            "Chat" | "Join" | "Quit" | "Switch" | "Heartbeat" | "Image" => {}
            other => {
                tracing::debug!("📥 Ignoring unknown event type {:?} from {}", other, transport);
                return;
            }
        }

        let evt: Event = match serde_json::from_slice(bytes) {
            Ok(evt) => evt,
            Err(e) => {
                tracing::warn!(
                    "📥 Failed to decode {} envelope on {}: {}",
                    head.kind,
                    transport,
                    e
                );
                return;
            }
        };

        match evt {
            Event::Heartbeat(hb) => self.dispatcher.on_liveness_received(&hb),
            Event::Chat(chat) => {
                if chat.should_show() {
                    self.consumer.on_chat(chat);
                }
            }
            Event::Join(presence) => self.consumer.on_presence(Direction::Join, presence),
            Event::Quit(presence) => self.consumer.on_presence(Direction::Quit, presence),
            Event::Switch(switch) => self.consumer.on_switch(switch),
            Event::Image(image) => self.consumer.on_image(image),
        }
    }
}
