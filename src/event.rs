//! Wire envelope and event variants.
//!
//! Every message on the wire is one JSON map carrying a `type` discriminant
//! plus the origin fields (`eventId`, `nodeClass`, `nodeHost`, `nodeName`)
//! and the variant-specific payload. Decoding happens in two steps: a
//! [`Head`] partial decode reads just the discriminant and event id for
//! routing and dedup, and the full tagged [`Event`] decode only runs for
//! messages that survive the duplicate check. Unknown fields are ignored
//! and missing optional fields are defaulted, so newer peers can extend
//! the envelope without breaking older ones.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::{Config, NodeConfig};
use crate::error::RelayError;

/// Room shared by all bridge platforms. Bridged chat from any other room
/// is relayed for dedup purposes but not shown to the consumer.
pub const SHARED_ROOM: &str = "#relay";

/// Generate an event id: a random component with the node's numeric
/// identity folded into the low decimal digit. Not globally unique, only
/// collision-poor within the receive-side dedup window.
pub fn new_event_id(node_id: u8) -> u32 {
    let random: u32 = rand::thread_rng().gen_range(0..1_000_000);
    random * 10 + u32::from(node_id % 10)
}

/// Origin fields carried by every envelope variant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Origin {
    #[serde(rename = "eventId", default)]
    pub event_id: u32,
    #[serde(rename = "nodeClass", default)]
    pub node_class: String,
    #[serde(rename = "nodeHost", default)]
    pub node_host: String,
    #[serde(rename = "nodeName", default)]
    pub node_name: String,
}

impl Origin {
    /// Fresh origin for an event emitted by this node.
    pub fn new(node: &NodeConfig) -> Origin {
        Origin {
            event_id: new_event_id(node.node_id),
            node_class: node.class.clone(),
            node_host: node.host.clone(),
            node_name: node.name.clone(),
        }
    }
}

/// Generic-envelope partial decode: just enough for routing and dedup.
#[derive(Debug, Deserialize)]
pub struct Head {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "eventId", default)]
    pub event_id: u32,
}

fn default_platform() -> String {
    "In-Game".to_string()
}

fn default_room() -> String {
    SHARED_ROOM.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatEvent {
    #[serde(flatten)]
    pub origin: Origin,
    #[serde(default)]
    pub plaintext: String,
    /// Display name of the speaker.
    #[serde(default)]
    pub name: String,
    /// Server the speaker is on.
    #[serde(default)]
    pub server: String,
    /// Origin platform ("In-Game", or a bridge like "Discord" / "IRC").
    #[serde(default = "default_platform")]
    pub platform: String,
    /// Room the line was spoken in, for bridged platforms.
    #[serde(default = "default_room")]
    pub room: String,
    #[serde(rename = "replyUser", default, skip_serializing_if = "Option::is_none")]
    pub reply_user: Option<String>,
    #[serde(rename = "replyText", default, skip_serializing_if = "Option::is_none")]
    pub reply_text: Option<String>,
    #[serde(rename = "replyColour", default, skip_serializing_if = "Option::is_none")]
    pub reply_color: Option<String>,
}

impl ChatEvent {
    /// Visibility predicate evaluated from origin context. In-game lines
    /// always show; bridged lines show only when spoken in the shared
    /// relay room. Only affects consumer delivery, never dedup.
    pub fn should_show(&self) -> bool {
        self.platform == "In-Game" || self.room == SHARED_ROOM
    }
}

/// Whether a presence event is an arrival or a departure. The wire carries
/// this as the `type` discriminant ("Join" / "Quit"), not as a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Join,
    Quit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceEvent {
    #[serde(flatten)]
    pub origin: Origin,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub server: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchEvent {
    #[serde(flatten)]
    pub origin: Origin,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "fromServer", default)]
    pub from_server: String,
    #[serde(default)]
    pub server: String,
}

/// Liveness announcement: advertises this node's listening ports. Consumed
/// only by the membership store, never by the end consumer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Heartbeat {
    #[serde(flatten)]
    pub origin: Origin,
    #[serde(rename = "udpPort", default, skip_serializing_if = "Option::is_none")]
    pub udp_port: Option<u16>,
    #[serde(rename = "reliablePort", default, skip_serializing_if = "Option::is_none")]
    pub reliable_port: Option<u16>,
}

impl Heartbeat {
    /// The heartbeat this node broadcasts: both transports listen on the
    /// shared port.
    pub fn announce(config: &Config) -> Heartbeat {
        Heartbeat {
            origin: Origin::new(&config.node),
            udp_port: Some(config.network.listen_port),
            reliable_port: Some(config.network.listen_port),
        }
    }
}

/// Image reference. The fields are opaque to the relay core; rendering is
/// the consumer's business.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageEvent {
    #[serde(flatten)]
    pub origin: Origin,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub server: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    Chat(ChatEvent),
    Join(PresenceEvent),
    Quit(PresenceEvent),
    Switch(SwitchEvent),
    Heartbeat(Heartbeat),
    Image(ImageEvent),
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Chat(_) => "Chat",
            Event::Join(_) => "Join",
            Event::Quit(_) => "Quit",
            Event::Switch(_) => "Switch",
            Event::Heartbeat(_) => "Heartbeat",
            Event::Image(_) => "Image",
        }
    }

    pub fn origin(&self) -> &Origin {
        match self {
            Event::Chat(evt) => &evt.origin,
            Event::Join(evt) | Event::Quit(evt) => &evt.origin,
            Event::Switch(evt) => &evt.origin,
            Event::Heartbeat(evt) => &evt.origin,
            Event::Image(evt) => &evt.origin,
        }
    }

    pub fn node_class(&self) -> &str {
        &self.origin().node_class
    }

    pub fn encode(&self) -> Result<Vec<u8>, RelayError> {
        Ok(serde_json::to_vec(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> Origin {
        Origin {
            event_id: 421,
            node_class: "BG".to_string(),
            node_host: "icarus".to_string(),
            node_name: "BG relay@icarus".to_string(),
        }
    }

    #[test]
    fn event_id_carries_node_identity() {
        for _ in 0..20 {
            assert_eq!(new_event_id(3) % 10, 3);
            assert_eq!(new_event_id(13) % 10, 3);
            assert!(new_event_id(3) < 10_000_000);
        }
    }

    #[test]
    fn chat_roundtrip_keeps_tag_and_origin() {
        let evt = Event::Chat(ChatEvent {
            origin: origin(),
            plaintext: "hello".to_string(),
            name: "mira".to_string(),
            server: "hub".to_string(),
            platform: default_platform(),
            room: default_room(),
            reply_user: None,
            reply_text: None,
            reply_color: None,
        });
        let bytes = evt.encode().unwrap();

        let head: Head = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(head.kind, "Chat");
        assert_eq!(head.event_id, 421);

        match serde_json::from_slice::<Event>(&bytes).unwrap() {
            Event::Chat(chat) => {
                assert_eq!(chat.plaintext, "hello");
                assert_eq!(chat.origin.node_host, "icarus");
            }
            other => panic!("wrong variant: {}", other.kind()),
        }
    }

    #[test]
    fn join_and_quit_share_payload_but_not_tag() {
        let join = Event::Join(PresenceEvent {
            origin: origin(),
            name: "mira".to_string(),
            server: "hub".to_string(),
        });
        let bytes = join.encode().unwrap();
        let quit_bytes = String::from_utf8(bytes.clone())
            .unwrap()
            .replace("\"Join\"", "\"Quit\"");

        assert!(matches!(
            serde_json::from_slice::<Event>(&bytes).unwrap(),
            Event::Join(_)
        ));
        assert!(matches!(
            serde_json::from_str::<Event>(&quit_bytes).unwrap(),
            Event::Quit(_)
        ));
    }

    #[test]
    fn decode_ignores_unknown_fields() {
        let raw = r#"{
            "type": "Chat",
            "eventId": 77,
            "nodeClass": "JS",
            "nodeHost": "styx",
            "nodeName": "JS relay@styx",
            "plaintext": "hi",
            "name": "n",
            "server": "s",
            "futureField": {"nested": true},
            "anotherOne": 12
        }"#;
        match serde_json::from_str::<Event>(raw).unwrap() {
            Event::Chat(chat) => assert_eq!(chat.plaintext, "hi"),
            other => panic!("wrong variant: {}", other.kind()),
        }
    }

    #[test]
    fn decode_defaults_missing_optional_fields() {
        let raw = r#"{"type": "Heartbeat", "eventId": 5, "nodeHost": "styx", "nodeClass": "BG"}"#;
        match serde_json::from_str::<Event>(raw).unwrap() {
            Event::Heartbeat(hb) => {
                assert_eq!(hb.udp_port, None);
                assert_eq!(hb.reliable_port, None);
                assert_eq!(hb.origin.node_name, "");
            }
            other => panic!("wrong variant: {}", other.kind()),
        }

        let raw = r#"{"type": "Chat", "eventId": 6, "plaintext": "x"}"#;
        match serde_json::from_str::<Event>(raw).unwrap() {
            Event::Chat(chat) => {
                assert_eq!(chat.platform, "In-Game");
                assert_eq!(chat.room, SHARED_ROOM);
                assert_eq!(chat.reply_user, None);
            }
            other => panic!("wrong variant: {}", other.kind()),
        }
    }

    #[test]
    fn chat_visibility_follows_origin_context() {
        let mut chat = ChatEvent {
            origin: origin(),
            plaintext: "hello".to_string(),
            name: "mira".to_string(),
            server: "hub".to_string(),
            platform: "In-Game".to_string(),
            room: "ignored-for-in-game".to_string(),
            reply_user: None,
            reply_text: None,
            reply_color: None,
        };
        assert!(chat.should_show());

        chat.platform = "Discord".to_string();
        chat.room = "#off-topic".to_string();
        assert!(!chat.should_show());

        chat.room = SHARED_ROOM.to_string();
        assert!(chat.should_show());
    }

    #[test]
    fn heartbeat_announce_carries_listen_port() {
        let mut config = Config::default();
        config.node.node_id = 4;
        config.network.listen_port = 2502;
        let config = config.normalized();

        let hb = Heartbeat::announce(&config);
        assert_eq!(hb.udp_port, Some(2502));
        assert_eq!(hb.reliable_port, Some(2502));
        assert_eq!(hb.origin.event_id % 10, 4);
        assert_eq!(hb.origin.node_host, config.node.host);
    }
}
