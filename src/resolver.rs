//! Packet type resolution.
//!
//! Packets that come with a port number are classified by a fixed table. When
//! no port is available, as with legacy binary framing or damaged data
//! messages, [`infer_packet_type`] runs a chain of heuristics that stops at
//! the first one that fires:
//!
//! 1. speculative structured decodes (position, telemetry, user identity),
//!    accepted only when the whole buffer walks cleanly and carries content
//! 2. leading tag bytes
//! 3. a leading `{` for embedded JSON
//! 4. telemetry and position keywords
//! 5. the share of printable ASCII

use tracing::trace;

use crate::messages::{
    AirQualityMetrics, DeviceMetrics, EnvironmentMetrics, Position, PowerMetrics, RemoteHardware, Telemetry, User,
};
use crate::types::{DecodedData, NodeIdentity, PacketType, TextData};
use crate::wire::{Decoded, FieldReader, WireMessage};

/// Printable share above which an unclassified payload is treated as text.
pub const DEFAULT_PRINTABLE_THRESHOLD: f64 = 0.7;

/// Number of leading bytes inspected for tag signatures.
const TAG_SCAN_LEN: usize = 10;

const TELEMETRY_KEYWORDS: [&str; 8] =
    ["battery", "voltage", "current", "temperature", "humidity", "pressure", "telemetry", "sensor"];

const POSITION_KEYWORDS: [&str; 7] = ["lat", "lon", "altitude", "position", "gps", "coords", "location"];

/// Well-known application ports.
pub mod port {
    pub const UNKNOWN_APP: u32 = 0;
    pub const TEXT_MESSAGE_APP: u32 = 1;
    pub const REMOTE_HARDWARE_APP: u32 = 2;
    pub const POSITION_APP: u32 = 3;
    pub const NODEINFO_APP: u32 = 4;
    pub const ROUTING_APP: u32 = 5;
    pub const ADMIN_APP: u32 = 6;
    pub const TEXT_MESSAGE_COMPRESSED_APP: u32 = 7;
    pub const WAYPOINT_APP: u32 = 8;
    pub const AUDIO_APP: u32 = 9;
    pub const DETECTION_SENSOR_APP: u32 = 10;
    pub const ALERT_APP: u32 = 11;
    pub const KEY_VERIFICATION_APP: u32 = 12;
    pub const REPLY_APP: u32 = 32;
    pub const IP_TUNNEL_APP: u32 = 33;
    pub const PAXCOUNTER_APP: u32 = 34;
    pub const SERIAL_APP: u32 = 64;
    pub const STORE_FORWARD_APP: u32 = 65;
    pub const RANGE_TEST_APP: u32 = 66;
    pub const TELEMETRY_APP: u32 = 67;
    pub const ZPS_APP: u32 = 68;
    pub const SIMULATOR_APP: u32 = 69;
    pub const TRACEROUTE_APP: u32 = 70;
    pub const NEIGHBORINFO_APP: u32 = 71;
    pub const ATAK_PLUGIN: u32 = 224;
    pub const PRIVATE_APP: u32 = 256;
}

/// Map a port number to its semantic type. Unlisted ports are `Unknown`.
pub fn packet_type_for_port(port_num: u32) -> PacketType {
    use port::*;

    match port_num {
        UNKNOWN_APP | AUDIO_APP | KEY_VERIFICATION_APP | PAXCOUNTER_APP => PacketType::Unknown,
        TEXT_MESSAGE_APP | TEXT_MESSAGE_COMPRESSED_APP | ALERT_APP => PacketType::Text,
        REMOTE_HARDWARE_APP => PacketType::RemoteHardware,
        POSITION_APP | WAYPOINT_APP => PacketType::Position,
        NODEINFO_APP => PacketType::NodeInfo,
        ROUTING_APP => PacketType::Routing,
        ADMIN_APP => PacketType::Admin,
        DETECTION_SENSOR_APP => PacketType::DetectionSensor,
        REPLY_APP | ATAK_PLUGIN | PRIVATE_APP => PacketType::ReplyApp,
        IP_TUNNEL_APP => PacketType::IpTunnelApp,
        SERIAL_APP => PacketType::SerialApp,
        STORE_FORWARD_APP => PacketType::StoreForwardApp,
        RANGE_TEST_APP => PacketType::RangeTest,
        TELEMETRY_APP => PacketType::Telemetry,
        ZPS_APP => PacketType::ZpsApp,
        SIMULATOR_APP => PacketType::SimulatorApp,
        TRACEROUTE_APP => PacketType::TracerouteApp,
        NEIGHBORINFO_APP => PacketType::NeighborInfo,
        _ => PacketType::Unknown,
    }
}

/// Resolve and decode a payload that arrived with a port number.
pub fn resolve_port(port_num: u32, payload: &[u8]) -> (PacketType, Option<DecodedData>) {
    let packet_type = packet_type_for_port(port_num);
    // Waypoints share the position category but not its schema.
    let decoded = if port_num == port::WAYPOINT_APP { None } else { decode_payload(packet_type, payload) };
    (packet_type, decoded)
}

/// Classify a payload that arrived without a port number.
pub fn infer_packet_type(payload: &[u8], printable_threshold: f64) -> PacketType {
    if payload.is_empty() {
        return PacketType::Unknown;
    }

    if let Decoded::Complete(position) = Position::decode(payload) {
        if position.has_fix() {
            trace!("payload decodes as position");
            return PacketType::Position;
        }
    }
    if let Decoded::Complete(telemetry) = Telemetry::decode(payload) {
        if telemetry.has_metrics() && metrics_groups_complete(payload) {
            trace!("payload decodes as telemetry");
            return PacketType::Telemetry;
        }
    }
    if let Decoded::Complete(user) = User::decode(payload) {
        if user.has_identity() {
            trace!("payload decodes as user identity");
            return PacketType::NodeInfo;
        }
    }

    if let Some(packet_type) = payload.iter().take(TAG_SCAN_LEN).find_map(|&byte| tag_signature(byte)) {
        return packet_type;
    }

    if payload.len() > TAG_SCAN_LEN && payload[0] == b'{' {
        return PacketType::Text;
    }

    let lower = String::from_utf8_lossy(payload).to_ascii_lowercase();
    if TELEMETRY_KEYWORDS.iter().any(|keyword| lower.contains(keyword)) {
        return PacketType::Telemetry;
    }
    if POSITION_KEYWORDS.iter().any(|keyword| lower.contains(keyword)) {
        return PacketType::Position;
    }

    if printable_ratio(payload) > printable_threshold { PacketType::Text } else { PacketType::Unknown }
}

/// Whether every metrics group nested in a telemetry body decodes cleanly.
fn metrics_groups_complete(payload: &[u8]) -> bool {
    FieldReader::new(payload).all(|field| match field {
        Ok(field) => match field.number {
            2 => field.message::<DeviceMetrics>().is_none_or(|m| m.is_complete()),
            3 => field.message::<EnvironmentMetrics>().is_none_or(|m| m.is_complete()),
            4 => field.message::<AirQualityMetrics>().is_none_or(|m| m.is_complete()),
            5 => field.message::<PowerMetrics>().is_none_or(|m| m.is_complete()),
            _ => true,
        },
        Err(_) => false,
    })
}

fn tag_signature(byte: u8) -> Option<PacketType> {
    match byte {
        // fixed32 field 1: latitude_i
        0x0D => Some(PacketType::Position),
        // length-delimited field 1
        0x0A => Some(PacketType::Text),
        0x08 | 0x10 | 0x18 => Some(PacketType::Telemetry),
        // length-delimited field 2: nested user
        0x12 => Some(PacketType::NodeInfo),
        _ => None,
    }
}

/// Share of bytes that are printable ASCII or common whitespace.
pub fn printable_ratio(payload: &[u8]) -> f64 {
    if payload.is_empty() {
        return 0.0;
    }
    let printable =
        payload.iter().filter(|&&byte| (32..=126).contains(&byte) || matches!(byte, b'\n' | b'\r' | b'\t')).count();
    printable as f64 / payload.len() as f64
}

/// Text up to the first NUL, with invalid UTF-8 replaced.
pub fn decode_text(payload: &[u8]) -> String {
    let end = payload.iter().position(|&byte| byte == 0).unwrap_or(payload.len());
    String::from_utf8_lossy(&payload[..end]).into_owned()
}

/// Interpret `payload` according to `packet_type`.
///
/// Only text, position, telemetry, node info and remote hardware payloads
/// are interpreted; every other type yields `None`.
pub fn decode_payload(packet_type: PacketType, payload: &[u8]) -> Option<DecodedData> {
    match packet_type {
        PacketType::Text => Some(DecodedData::Text(TextData::new(decode_text(payload)))),
        PacketType::Position => Some(DecodedData::Position(Position::decode(payload).into_value())),
        PacketType::Telemetry => Some(DecodedData::Telemetry(Telemetry::decode(payload).into_value())),
        PacketType::NodeInfo => {
            Some(DecodedData::NodeIdentity(NodeIdentity::from_user(User::decode(payload).into_value())))
        }
        PacketType::RemoteHardware => {
            Some(DecodedData::RemoteHardware(RemoteHardware::decode(payload).into_value()))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::WireWriter;

    fn infer(payload: &[u8]) -> PacketType {
        infer_packet_type(payload, DEFAULT_PRINTABLE_THRESHOLD)
    }

    #[test]
    fn port_table() {
        assert_eq!(packet_type_for_port(4), PacketType::NodeInfo);
        assert_eq!(packet_type_for_port(7), PacketType::Text);
        assert_eq!(packet_type_for_port(8), PacketType::Position);
        assert_eq!(packet_type_for_port(34), PacketType::Unknown);
        assert_eq!(packet_type_for_port(67), PacketType::Telemetry);
        assert_eq!(packet_type_for_port(71), PacketType::NeighborInfo);
        assert_eq!(packet_type_for_port(256), PacketType::ReplyApp);
        assert_eq!(packet_type_for_port(99_999), PacketType::Unknown);
    }

    #[test]
    fn structured_position_wins() {
        let mut writer = WireWriter::new();
        writer.sfixed32(1, 377_749_000).sfixed32(2, -1_224_194_000);
        assert_eq!(infer(writer.as_bytes()), PacketType::Position);
    }

    #[test]
    fn structured_telemetry_and_identity() {
        let mut telemetry = WireWriter::new();
        telemetry.message(2, |device| {
            device.varint(1, 90);
        });
        assert_eq!(infer(telemetry.as_bytes()), PacketType::Telemetry);

        let mut user = WireWriter::new();
        user.string(1, "!0000beef").string(2, "Ridge");
        // the long name does not parse as a nested metrics group
        assert_eq!(infer(user.as_bytes()), PacketType::NodeInfo);
    }

    #[test]
    fn leading_latitude_tag_without_valid_body() {
        assert_eq!(infer(&[0x0D, 0x01]), PacketType::Position);
    }

    #[test]
    fn tag_scan_and_content_fallbacks() {
        assert_eq!(infer(&[0xFF, 0xFF, 0x18]), PacketType::Telemetry);
        assert_eq!(infer(b"{\"rssi\": -60, \"ok\": true}"), PacketType::Text);
        assert_eq!(infer(b"BATTERY LOW!"), PacketType::Telemetry);
        assert_eq!(infer(b"gps: 51.5 N"), PacketType::Position);
        assert_eq!(infer(b"hello, world"), PacketType::Text);
        assert_eq!(infer(&[0xC8, 0xC9, 0xCA, 0xCB]), PacketType::Unknown);
        assert_eq!(infer(&[]), PacketType::Unknown);
    }

    #[test]
    fn printable_share() {
        assert_eq!(printable_ratio(b"abc\n"), 1.0);
        assert_eq!(printable_ratio(&[b'a', 0xFF]), 0.5);
        assert_eq!(infer_packet_type(b"plain words", 1.0), PacketType::Unknown);
    }

    #[test]
    fn text_stops_at_nul() {
        assert_eq!(decode_text(b"hi\0garbage"), "hi");
        assert!(matches!(
            decode_payload(PacketType::Text, b"ping"),
            Some(DecodedData::Text(TextData { ref text, .. })) if text == "ping"
        ));
        assert_eq!(decode_payload(PacketType::Routing, &[0x08, 0x01]), None);
    }

    #[test]
    fn waypoints_are_not_decoded_as_positions() {
        let (packet_type, decoded) = resolve_port(port::WAYPOINT_APP, &[0x08, 0x01]);
        assert_eq!(packet_type, PacketType::Position);
        assert_eq!(decoded, None);
    }
}
