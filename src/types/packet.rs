//! Normalized packet handed to subscribers.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use super::packet_type::PacketType;
use super::text::TextData;
use crate::directory::NodeDirectory;
use crate::messages::{BROADCAST_ADDR, Position, RemoteHardware, Telemetry, User};
use crate::{MeshError, Result};

/// Highest hop count or limit considered plausible for display.
const MAX_DISPLAY_HOPS: u8 = 10;

/// Identity carried by node-info packets.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NodeIdentity {
    /// Node number when the source stated it explicitly.
    pub node_num: Option<u32>,
    pub user: User,
    /// Set for the radio this client is attached to.
    pub local_device: bool,
}

impl NodeIdentity {
    pub fn from_user(user: User) -> Self {
        Self { node_num: None, user, local_device: false }
    }

    /// Directory key: the explicit node number, else the hex id, else `fallback`.
    pub fn node_id(&self, fallback: u32) -> u32 {
        self.node_num.or_else(|| parse_node_id(&self.user.id)).unwrap_or(fallback)
    }

    /// Whether there is a name worth recording.
    pub fn has_names(&self) -> bool {
        !self.user.long_name.is_empty() || !self.user.short_name.is_empty()
    }
}

/// Parse `!a1b2c3d4`, `0xa1b2c3d4` or bare hex into a node number.
pub fn parse_node_id(text: &str) -> Option<u32> {
    let digits = text.trim();
    let digits = digits.strip_prefix('!').unwrap_or(digits);
    let digits = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")).unwrap_or(digits);
    if digits.is_empty() {
        return None;
    }
    u32::from_str_radix(digits, 16).ok()
}

/// Interpreted application payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum DecodedData {
    Text(TextData),
    Position(Position),
    Telemetry(Telemetry),
    NodeIdentity(NodeIdentity),
    RemoteHardware(RemoteHardware),
    /// Payload present but deliberately left opaque, e.g. encrypted.
    Unknown,
}

impl DecodedData {
    /// Whether this payload shape may accompany `packet_type`.
    pub fn is_consistent_with(&self, packet_type: PacketType) -> bool {
        match self {
            DecodedData::Text(_) => packet_type == PacketType::Text,
            DecodedData::Position(_) => packet_type == PacketType::Position,
            DecodedData::Telemetry(_) => packet_type == PacketType::Telemetry,
            DecodedData::NodeIdentity(_) => packet_type == PacketType::NodeInfo,
            DecodedData::RemoteHardware(_) => packet_type == PacketType::RemoteHardware,
            DecodedData::Unknown => packet_type == PacketType::Unknown,
        }
    }

    /// Identity to record in the node directory, if any.
    pub fn identity(&self) -> Option<&NodeIdentity> {
        match self {
            DecodedData::NodeIdentity(identity) => Some(identity),
            DecodedData::Text(text) => text.identity.as_ref(),
            _ => None,
        }
    }
}

fn as_hex<S: Serializer>(bytes: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&hex::encode(bytes))
}

/// One classified packet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Packet {
    pub id: u32,
    pub from: u32,
    pub to: u32,
    #[serde(rename = "type")]
    pub packet_type: PacketType,
    pub channel: u8,
    pub hop_count: u8,
    pub hop_limit: u8,
    pub want_ack: bool,
    pub priority: u8,
    pub rx_time: DateTime<Utc>,
    pub rx_snr: f32,
    pub rx_rssi: i32,
    #[serde(serialize_with = "as_hex")]
    pub payload: Vec<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decoded: Option<DecodedData>,
    #[serde(serialize_with = "as_hex")]
    pub raw: Vec<u8>,
}

impl Packet {
    /// Empty broadcast packet of `packet_type` received now.
    pub fn new(packet_type: PacketType, raw: impl Into<Vec<u8>>) -> Self {
        Self {
            id: 0,
            from: 0,
            to: BROADCAST_ADDR,
            packet_type,
            channel: 0,
            hop_count: 0,
            hop_limit: 0,
            want_ack: false,
            priority: 0,
            rx_time: Utc::now(),
            rx_snr: 0.0,
            rx_rssi: 0,
            payload: Vec::new(),
            decoded: None,
            raw: raw.into(),
        }
    }

    pub fn with_decoded(mut self, decoded: DecodedData) -> Self {
        self.decoded = Some(decoded);
        self
    }

    pub fn type_name(&self) -> &'static str {
        self.packet_type.name()
    }

    pub fn from_hex(&self) -> String {
        format!("!{:08x}", self.from)
    }

    pub fn to_hex(&self) -> String {
        format!("!{:08x}", self.to)
    }

    pub fn is_broadcast(&self) -> bool {
        self.to == BROADCAST_ADDR
    }

    pub fn from_name(&self, directory: &NodeDirectory) -> String {
        directory.resolve_name(self.from)
    }

    pub fn to_name(&self, directory: &NodeDirectory) -> String {
        if self.is_broadcast() { "ALL".to_string() } else { directory.resolve_name(self.to) }
    }

    pub fn from_short_name(&self, directory: &NodeDirectory) -> String {
        directory.resolve_short_name(self.from)
    }

    pub fn to_short_name(&self, directory: &NodeDirectory) -> String {
        if self.is_broadcast() { "ALL".to_string() } else { directory.resolve_short_name(self.to) }
    }

    /// `-97 dBm (SNR: 5.2)`, or `N/A` when no RSSI was reported.
    pub fn signal_strength(&self) -> String {
        if self.rx_rssi == 0 {
            return "N/A".to_string();
        }
        format!("{} dBm (SNR: {:.1})", self.rx_rssi, self.rx_snr)
    }

    /// `hops/limit`, or `?/?` when the values look implausible.
    pub fn hop_info(&self) -> String {
        if self.hop_count > MAX_DISPLAY_HOPS || self.hop_limit > MAX_DISPLAY_HOPS || self.hop_limit == 0 {
            return "?/?".to_string();
        }
        format!("{}/{}", self.hop_count, self.hop_limit)
    }

    /// Pretty-printed JSON for logs and detail views.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(MeshError::from)
    }
}
