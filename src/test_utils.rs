//! Fixture builders for tests and benchmarks.
//!
//! Each builder produces the exact bytes a radio would hand to a transport,
//! so tests exercise the same decode chain as live traffic.

#![cfg(any(test, feature = "benchmark"))]

use crate::frame::PREAMBLE;
use crate::resolver::port;
use crate::wire::WireWriter;

/// Radio envelope carrying one mesh packet built by `build`.
pub fn mesh_envelope(build: impl FnOnce(&mut WireWriter)) -> Vec<u8> {
    let mut envelope = WireWriter::new();
    envelope.message(2, build);
    envelope.into_bytes()
}

/// Mesh packet with a decoded application payload on `port`.
pub fn app_message(from: u32, to: u32, id: u32, port: u32, payload: &[u8]) -> Vec<u8> {
    mesh_envelope(|mesh| {
        mesh.fixed32(1, from).fixed32(2, to).fixed32(6, id);
        mesh.message(4, |data| {
            data.varint(1, u64::from(port)).bytes(2, payload);
        });
    })
}

pub fn text_message(from: u32, to: u32, id: u32, text: &str) -> Vec<u8> {
    app_message(from, to, id, port::TEXT_MESSAGE_APP, text.as_bytes())
}

/// Position report with coordinates in 1e-7 degrees.
pub fn position_message(from: u32, id: u32, latitude_i: i32, longitude_i: i32) -> Vec<u8> {
    let mut position = WireWriter::new();
    position.sfixed32(1, latitude_i).sfixed32(2, longitude_i);
    app_message(from, crate::messages::BROADCAST_ADDR, id, port::POSITION_APP, position.as_bytes())
}

/// Node database entry for `num` with the given names.
pub fn node_record(num: u32, long_name: &str, short_name: &str) -> Vec<u8> {
    let mut envelope = WireWriter::new();
    envelope.message(4, |record| {
        record.varint(1, u64::from(num));
        record.message(2, |user| {
            user.string(2, long_name).string(3, short_name);
        });
    });
    envelope.into_bytes()
}

/// Legacy fixed-header packet: little-endian id, from, to and flags, then the payload.
pub fn legacy_chunk(id: u32, from: u32, to: u32, flags: u32, payload: &[u8]) -> Vec<u8> {
    let mut chunk = Vec::with_capacity(16 + payload.len());
    for word in [id, from, to, flags] {
        chunk.extend_from_slice(&word.to_le_bytes());
    }
    chunk.extend_from_slice(payload);
    chunk
}

/// Device status document as served by the status endpoint.
pub fn device_status_json(battery_percent: u32, voltage_mv: u32, rssi: i32) -> String {
    serde_json::json!({
        "type": "device_status",
        "timestamp": 1_700_000_000.0,
        "device_info": {
            "power": { "battery_percent": battery_percent, "battery_voltage_mv": voltage_mv },
            "airtime": { "channel_utilization": 12.5, "utilization_tx": 1.5 },
            "wifi": { "rssi": rssi },
        },
    })
    .to_string()
}

/// Frame each payload and join them, with a noise byte ahead of every frame.
pub fn framed_stream(payloads: &[Vec<u8>]) -> Vec<u8> {
    let mut stream = Vec::new();
    for payload in payloads {
        stream.push(0x00);
        stream.extend_from_slice(&PREAMBLE);
        stream.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        stream.extend_from_slice(payload);
    }
    stream
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameSynchronizer;

    #[test]
    fn framed_stream_round_trips_through_the_synchronizer() {
        let payloads = vec![text_message(1, 2, 3, "hi"), node_record(7, "Seven", "7")];
        let frames = FrameSynchronizer::new().push(&framed_stream(&payloads));
        let decoded: Vec<Vec<u8>> = frames.into_iter().map(|frame| frame.payload.to_vec()).collect();
        assert_eq!(decoded, payloads);
    }

    #[test]
    fn legacy_chunk_layout() {
        let chunk = legacy_chunk(1, 2, 3, 0x0403_0201, b"x");
        assert_eq!(chunk.len(), 17);
        assert_eq!(&chunk[12..16], &[0x01, 0x02, 0x03, 0x04]);
    }
}
