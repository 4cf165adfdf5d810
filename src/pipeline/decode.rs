//! Turning one inbound chunk into a [`Packet`].
//!
//! Decoders are tried in a fixed order and the first that accepts the chunk
//! wins: device status JSON, radio envelope, legacy binary header, free text.

use chrono::DateTime;
use serde_json::Value;
use tracing::{debug, trace};

use super::text::text_packet;
use crate::config::PipelineConfig;
use crate::messages::{
    DeviceIdentity, DeviceMetrics, LogRecord, MeshPacketEnvelope, NodeRecord, PacketPayload, RadioEnvelope,
    Telemetry, User,
};
use crate::resolver::{decode_payload, infer_packet_type, printable_ratio, resolve_port};
use crate::types::{DecodedData, NodeIdentity, Packet, PacketType, TextData};
use crate::wire::FieldReader;

/// Smallest chunk worth walking as an envelope.
const MIN_ENVELOPE_LEN: usize = 4;

/// id, from, to and the flags word.
const LEGACY_HEADER_LEN: usize = 16;

/// Envelope field holding a node database record.
const NODE_RECORD_FIELD: u32 = 4;

pub(crate) fn decode_chunk(raw: &[u8], config: &PipelineConfig) -> Option<Packet> {
    if let Some(packet) = status_packet(raw, config) {
        trace!("chunk is device status json");
        return Some(packet);
    }
    if let Some(packet) = envelope_packet(raw, config) {
        trace!(packet_type = %packet.packet_type, "chunk is a radio envelope");
        return Some(packet);
    }
    if let Some(packet) = legacy_packet(raw, config) {
        trace!(packet_type = %packet.packet_type, "chunk is a legacy binary packet");
        return Some(packet);
    }
    text_packet(raw)
}

/// Numeric leaf under `path`, or `None` when any step is missing or not a number.
fn status_number(info: &Value, path: &[&str]) -> Option<f64> {
    path.iter().try_fold(info, |value, key| value.get(key))?.as_f64()
}

/// Status document synthesized by polling transports.
///
/// Only the `type` tag and an object `device_info` are required. Metrics
/// with the wrong JSON type are skipped one by one.
fn status_packet(raw: &[u8], config: &PipelineConfig) -> Option<Packet> {
    if raw.trim_ascii_start().first() != Some(&b'{') {
        return None;
    }
    let status: Value = serde_json::from_slice(raw).ok()?;
    if status.get("type").and_then(Value::as_str) != Some("device_status") {
        return None;
    }
    let Some(info) = status.get("device_info").filter(|info| info.is_object()) else {
        debug!("device status without a device_info object");
        return None;
    };
    let timestamp = status.get("timestamp").and_then(Value::as_f64).unwrap_or(0.0);

    let device = DeviceMetrics {
        battery_level: status_number(info, &["power", "battery_percent"]).map(|percent| percent as u32),
        voltage: status_number(info, &["power", "battery_voltage_mv"]).map(|millivolts| (millivolts / 1000.0) as f32),
        channel_utilization: status_number(info, &["airtime", "channel_utilization"]).map(|value| value as f32),
        air_util_tx: status_number(info, &["airtime", "utilization_tx"]).map(|value| value as f32),
        uptime_seconds: None,
    };
    let telemetry = Telemetry { time: Some(timestamp as u32), device_metrics: Some(device), ..Telemetry::default() };

    let mut packet = Packet::new(PacketType::Telemetry, raw).with_decoded(DecodedData::Telemetry(telemetry));
    packet.from = config.status_node_id;
    packet.hop_limit = config.status_hop_limit;
    packet.rx_time = DateTime::from_timestamp(timestamp as i64, 0).unwrap_or_default();
    if let Some(rssi) = status_number(info, &["wifi", "rssi"]) {
        packet.rx_rssi = rssi as i32;
    }
    Some(packet)
}

fn envelope_packet(raw: &[u8], config: &PipelineConfig) -> Option<Packet> {
    if raw.len() < MIN_ENVELOPE_LEN {
        return None;
    }
    // console output is printable end to end, an envelope never is
    if printable_ratio(raw) >= 1.0 {
        return None;
    }
    let decoded = RadioEnvelope::decode(raw);
    if let Some(failure) = decoded.failure() {
        trace!(%failure, "envelope walk stopped early, trying other decoders");
        return None;
    }
    let packet = match decoded.into_value()? {
        RadioEnvelope::MeshPacket(mesh) => mesh_packet(mesh, raw, config),
        RadioEnvelope::DeviceIdentity(info) => local_device_packet(info, raw),
        RadioEnvelope::NodeRecord(record) => node_record_packet(&record, raw),
        RadioEnvelope::Config(config) => {
            debug!(len = config.len(), "device configuration received");
            Packet::new(PacketType::Admin, raw)
        }
        RadioEnvelope::LogRecord(record) => log_packet(record, raw),
    };
    Some(packet)
}

fn mesh_packet(mesh: MeshPacketEnvelope, raw: &[u8], config: &PipelineConfig) -> Packet {
    let mut packet = Packet::new(PacketType::Unknown, raw);
    packet.id = mesh.id;
    packet.from = mesh.from;
    packet.to = mesh.to;
    packet.channel = mesh.channel;
    packet.hop_count = mesh.hops_travelled();
    packet.hop_limit = mesh.hop_limit;
    packet.want_ack = mesh.want_ack;
    packet.priority = mesh.priority;
    packet.rx_snr = mesh.rx_snr;
    packet.rx_rssi = mesh.rx_rssi;
    if let Some(time) =
        mesh.rx_time.and_then(|secs| i64::try_from(secs).ok()).and_then(|secs| DateTime::from_timestamp(secs, 0))
    {
        packet.rx_time = time;
    }

    match mesh.payload {
        Some(PacketPayload::Decoded(data)) => {
            let (packet_type, decoded) = match data.port {
                Some(port) => resolve_port(port, &data.payload),
                None => {
                    let packet_type = infer_packet_type(&data.payload, config.printable_threshold);
                    (packet_type, decode_payload(packet_type, &data.payload))
                }
            };
            packet.packet_type = packet_type;
            packet.decoded = decoded;
            packet.payload = data.payload;
        }
        Some(PacketPayload::Encrypted(blob)) => {
            debug!(from = %packet.from_hex(), len = blob.len(), "encrypted mesh packet");
            packet.decoded = Some(DecodedData::Unknown);
            packet.payload = blob;
        }
        None => {}
    }
    packet
}

fn local_device_packet(info: DeviceIdentity, raw: &[u8]) -> Packet {
    let node_num = info.my_node_num.unwrap_or(0);
    let identity = NodeIdentity {
        node_num: Some(node_num),
        user: User { id: format!("!{node_num:08x}"), ..User::default() },
        local_device: true,
    };
    let mut packet = Packet::new(PacketType::NodeInfo, raw).with_decoded(DecodedData::NodeIdentity(identity));
    packet.from = node_num;
    packet
}

fn node_record_packet(record: &NodeRecord, raw: &[u8]) -> Packet {
    let Some(user) = record.identity() else {
        let body = FieldReader::new(raw)
            .filter_map(Result::ok)
            .filter(|field| field.number == NODE_RECORD_FIELD)
            .last()
            .and_then(|field| field.bytes())
            .unwrap_or_default();
        let dump = TextData::new(format!("NodeInfo data: {}", hex::encode_upper(body)));
        return Packet::new(PacketType::Text, raw).with_decoded(DecodedData::Text(dump));
    };

    let identity = NodeIdentity { node_num: record.num, user, local_device: false };
    let mut packet = Packet::new(PacketType::NodeInfo, raw).with_decoded(DecodedData::NodeIdentity(identity));
    packet.from = record.num.unwrap_or(0);
    packet
}

fn log_packet(record: LogRecord, raw: &[u8]) -> Packet {
    let text = if record.message.is_empty() {
        "[LOG] Device log record".to_string()
    } else {
        format!("[LOG] {}", record.message)
    };
    Packet::new(PacketType::Text, raw).with_decoded(DecodedData::Text(TextData::new(text)))
}

/// Fixed 16-byte little-endian header followed by the payload.
///
/// A header made only of printable characters is console text, not a packet.
fn legacy_packet(raw: &[u8], config: &PipelineConfig) -> Option<Packet> {
    let (header, payload) = raw.split_at_checked(LEGACY_HEADER_LEN)?;
    if printable_ratio(header) == 1.0 {
        return None;
    }
    let word =
        |index: usize| u32::from_le_bytes([header[index], header[index + 1], header[index + 2], header[index + 3]]);
    let flags = word(12).to_le_bytes();

    let packet_type = infer_packet_type(payload, config.printable_threshold);
    let mut packet = Packet::new(packet_type, raw);
    packet.id = word(0);
    packet.from = word(4);
    packet.to = word(8);
    packet.channel = flags[0];
    packet.hop_count = flags[1];
    packet.hop_limit = flags[2];
    packet.priority = flags[3];
    packet.decoded = decode_payload(packet_type, payload);
    packet.payload = payload.to_vec();
    Some(packet)
}
