//! Consumer boundary: where decoded events leave the relay core.

use crate::event::{ChatEvent, Direction, ImageEvent, PresenceEvent, SwitchEvent};

/// Capability the decoder hands fully decoded, non-liveness events to.
/// One method per event variant; implementations must not block the
/// decoder for long. Heartbeats never reach a consumer.
pub trait EventConsumer: Send + Sync {
    fn on_chat(&self, evt: ChatEvent);
    fn on_presence(&self, direction: Direction, evt: PresenceEvent);
    fn on_switch(&self, evt: SwitchEvent);
    fn on_image(&self, evt: ImageEvent);
}

/// Consumer that writes every relayed event to the log. The daemon's
/// default; real deployments inject their own formatter.
pub struct LogConsumer;

impl EventConsumer for LogConsumer {
    fn on_chat(&self, evt: ChatEvent) {
        tracing::info!("💬 [{}] {}: {}", evt.server, evt.name, evt.plaintext);
    }

    fn on_presence(&self, direction: Direction, evt: PresenceEvent) {
        let verb = match direction {
            Direction::Join => "joined",
            Direction::Quit => "left",
        };
        tracing::info!("🚪 {} {} {}", evt.name, verb, evt.server);
    }

    fn on_switch(&self, evt: SwitchEvent) {
        tracing::info!("🔀 {} moved from {} to {}", evt.name, evt.from_server, evt.server);
    }

    fn on_image(&self, evt: ImageEvent) {
        tracing::info!("🖼️ {} posted {} on {}", evt.name, evt.url, evt.server);
    }
}
