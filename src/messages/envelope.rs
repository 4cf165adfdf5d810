//! Top-level radio envelope and the mesh packet it usually carries.

use serde::Serialize;

use super::user::{DeviceIdentity, NodeRecord};
use crate::wire::{Decoded, RawField, WireMessage};

/// Destination address meaning "every node".
pub const BROADCAST_ADDR: u32 = 0xFFFF_FFFF;

/// The one message an envelope carries.
#[derive(Debug, Clone, PartialEq)]
pub enum RadioEnvelope {
    MeshPacket(MeshPacketEnvelope),
    DeviceIdentity(DeviceIdentity),
    NodeRecord(NodeRecord),
    Config(Vec<u8>),
    LogRecord(LogRecord),
}

impl RadioEnvelope {
    /// Decode an envelope body.
    ///
    /// The value is `None` when no known variant field was found before the
    /// walk ended. When several variant fields appear the last one wins.
    pub fn decode(bytes: &[u8]) -> Decoded<Option<RadioEnvelope>> {
        EnvelopeFields::decode(bytes).map(|fields| fields.variant)
    }
}

#[derive(Default)]
struct EnvelopeFields {
    variant: Option<RadioEnvelope>,
}

impl WireMessage for EnvelopeFields {
    fn merge_field(&mut self, field: &RawField<'_>) {
        let variant = match field.number {
            2 => field.message::<MeshPacketEnvelope>().map(|packet| RadioEnvelope::MeshPacket(packet.into_value())),
            3 => field.message::<DeviceIdentity>().map(|info| RadioEnvelope::DeviceIdentity(info.into_value())),
            4 => field.message::<NodeRecord>().map(|record| RadioEnvelope::NodeRecord(record.into_value())),
            5 => field.bytes().map(|config| RadioEnvelope::Config(config.to_vec())),
            6 => field.message::<LogRecord>().map(|record| RadioEnvelope::LogRecord(record.into_value())),
            _ => None,
        };
        if variant.is_some() {
            self.variant = variant;
        }
    }
}

/// Application payload inside a mesh packet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplicationData {
    /// Port number; `None` when the data message was damaged before it.
    pub port: Option<u32>,
    pub payload: Vec<u8>,
    pub want_response: bool,
    pub request_id: Option<u32>,
    pub reply_id: Option<u32>,
}

impl WireMessage for ApplicationData {
    fn merge_field(&mut self, field: &RawField<'_>) {
        match field.number {
            1 => self.port = field.uint32().or(self.port),
            2 => {
                if let Some(payload) = field.bytes() {
                    self.payload = payload.to_vec();
                }
            }
            3 => self.want_response = field.bool().unwrap_or(self.want_response),
            6 => self.request_id = field.fixed32().or(self.request_id),
            7 => self.reply_id = field.fixed32().or(self.reply_id),
            _ => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PacketPayload {
    Decoded(ApplicationData),
    Encrypted(Vec<u8>),
}

/// Routed packet as received from the mesh.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeshPacketEnvelope {
    pub from: u32,
    pub to: u32,
    pub channel: u8,
    pub id: u32,
    /// Receive time, seconds since the Unix epoch.
    pub rx_time: Option<u64>,
    pub rx_snr: f32,
    pub rx_rssi: i32,
    pub hop_limit: u8,
    pub hop_start: u8,
    pub want_ack: bool,
    pub priority: u8,
    pub via_mqtt: bool,
    pub public_key: Vec<u8>,
    pub pki_encrypted: bool,
    pub payload: Option<PacketPayload>,
}

impl Default for MeshPacketEnvelope {
    fn default() -> Self {
        Self {
            from: 0,
            to: BROADCAST_ADDR,
            channel: 0,
            id: 0,
            rx_time: None,
            rx_snr: 0.0,
            rx_rssi: 0,
            hop_limit: 0,
            hop_start: 0,
            want_ack: false,
            priority: 0,
            via_mqtt: false,
            public_key: Vec::new(),
            pki_encrypted: false,
            payload: None,
        }
    }
}

impl WireMessage for MeshPacketEnvelope {
    fn merge_field(&mut self, field: &RawField<'_>) {
        match field.number {
            1 => self.from = field.flexible_u32().unwrap_or(self.from),
            2 => self.to = field.flexible_u32().unwrap_or(self.to),
            3 => self.channel = field.uint32().map(|value| value as u8).unwrap_or(self.channel),
            4 => {
                if let Some(data) = field.message::<ApplicationData>() {
                    self.payload = Some(PacketPayload::Decoded(data.into_value()));
                }
            }
            5 => {
                if let Some(blob) = field.bytes() {
                    self.payload = Some(PacketPayload::Encrypted(blob.to_vec()));
                }
            }
            6 => self.id = field.flexible_u32().unwrap_or(self.id),
            7 => {
                let seconds =
                    field.varint().or_else(|| field.fixed32().map(u64::from)).or_else(|| field.fixed64());
                self.rx_time = seconds.or(self.rx_time);
            }
            8 => self.rx_snr = field.float().unwrap_or(self.rx_snr),
            9 => self.hop_limit = field.uint32().map(|value| value as u8).unwrap_or(self.hop_limit),
            10 => self.want_ack = field.bool().unwrap_or(self.want_ack),
            11 => self.priority = field.uint32().map(|value| value as u8).unwrap_or(self.priority),
            12 => self.rx_rssi = field.int32().unwrap_or(self.rx_rssi),
            14 => self.via_mqtt = field.bool().unwrap_or(self.via_mqtt),
            15 => self.hop_start = field.uint32().map(|value| value as u8).unwrap_or(self.hop_start),
            16 => {
                if let Some(key) = field.bytes() {
                    self.public_key = key.to_vec();
                }
            }
            17 => self.pki_encrypted = field.bool().unwrap_or(self.pki_encrypted),
            _ => {}
        }
    }
}

impl MeshPacketEnvelope {
    /// Hops already travelled, when the sender announced its starting limit.
    pub fn hops_travelled(&self) -> u8 {
        self.hop_start.saturating_sub(self.hop_limit)
    }
}

/// Firmware log line forwarded by the radio.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LogRecord {
    pub message: String,
    pub time: Option<u32>,
    pub source: String,
    pub level: Option<u32>,
}

impl WireMessage for LogRecord {
    fn merge_field(&mut self, field: &RawField<'_>) {
        match field.number {
            1 => self.message = field.string().unwrap_or_else(|| std::mem::take(&mut self.message)),
            2 => self.time = field.fixed32().or(self.time),
            3 => self.source = field.string().unwrap_or_else(|| std::mem::take(&mut self.source)),
            4 => self.level = field.uint32().or(self.level),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::WireWriter;

    fn text_packet() -> WireWriter {
        let mut packet = WireWriter::new();
        packet
            .fixed32(1, 0xa1b2_c3d4)
            .fixed32(2, BROADCAST_ADDR)
            .varint(3, 2)
            .message(4, |data| {
                data.varint(1, 1).bytes(2, b"hi mesh");
            })
            .fixed32(6, 0x0102_0304)
            .fixed32(7, 1_700_000_000)
            .float(8, 5.25)
            .varint(9, 3)
            .bool(10, true)
            .int32(12, -97)
            .varint(15, 7);
        packet
    }

    #[test]
    fn decodes_mesh_packet_variant() {
        let mut envelope = WireWriter::new();
        envelope.varint(1, 42).bytes(2, text_packet().as_bytes());
        let decoded = RadioEnvelope::decode(envelope.as_bytes());
        assert!(decoded.is_complete());

        let Some(RadioEnvelope::MeshPacket(packet)) = decoded.into_value() else {
            panic!("expected mesh packet variant");
        };
        assert_eq!(packet.from, 0xa1b2_c3d4);
        assert_eq!(packet.to, BROADCAST_ADDR);
        assert_eq!(packet.channel, 2);
        assert_eq!(packet.id, 0x0102_0304);
        assert_eq!(packet.rx_time, Some(1_700_000_000));
        assert_eq!(packet.rx_snr, 5.25);
        assert_eq!(packet.rx_rssi, -97);
        assert!(packet.want_ack);
        assert_eq!(packet.hops_travelled(), 4);
        let Some(PacketPayload::Decoded(data)) = packet.payload else {
            panic!("expected decoded payload");
        };
        assert_eq!(data.port, Some(1));
        assert_eq!(data.payload, b"hi mesh");
    }

    #[test]
    fn varint_addresses_are_accepted() {
        let mut packet = WireWriter::new();
        packet.varint(1, 0x1234).varint(2, 0x5678).varint(6, 99).varint(7, 1_600_000_000);
        let packet = MeshPacketEnvelope::decode(packet.as_bytes()).into_value();
        assert_eq!((packet.from, packet.to, packet.id), (0x1234, 0x5678, 99));
        assert_eq!(packet.rx_time, Some(1_600_000_000));
    }

    #[test]
    fn encrypted_payload_variant() {
        let mut packet = WireWriter::new();
        packet.fixed32(1, 7).bytes(5, &[0xde, 0xad]).bool(17, true);
        let packet = MeshPacketEnvelope::decode(packet.as_bytes()).into_value();
        assert_eq!(packet.payload, Some(PacketPayload::Encrypted(vec![0xde, 0xad])));
        assert!(packet.pki_encrypted);
    }

    #[test]
    fn other_variants() {
        let mut envelope = WireWriter::new();
        envelope.message(6, |log| {
            log.string(1, "GPS fix acquired").string(3, "gps").varint(4, 20);
        });
        assert!(matches!(
            RadioEnvelope::decode(envelope.as_bytes()).into_value(),
            Some(RadioEnvelope::LogRecord(LogRecord { ref message, .. })) if message == "GPS fix acquired"
        ));

        let mut envelope = WireWriter::new();
        envelope.bytes(5, &[0x0A, 0x00]).message(3, |info| {
            info.varint(1, 5);
        });
        let variant = RadioEnvelope::decode(envelope.as_bytes()).into_value();
        assert!(matches!(variant, Some(RadioEnvelope::DeviceIdentity(info)) if info.my_node_num == Some(5)));
    }

    #[test]
    fn envelope_without_variant() {
        let mut envelope = WireWriter::new();
        envelope.varint(1, 9).varint(2, 3);
        let decoded = RadioEnvelope::decode(envelope.as_bytes());
        assert!(decoded.is_complete());
        assert_eq!(decoded.into_value(), None);
    }
}
