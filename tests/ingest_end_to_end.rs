//! End-to-end ingestion through the public API.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use futures::StreamExt;
use meshtap::messages::BROADCAST_ADDR;
use meshtap::transport::ReplayTransport;
use meshtap::wire::WireWriter;
use meshtap::{DecodedData, Meshtap, Packet, PacketType, Pipeline, PipelineConfig, SubmitOutcome};
use tokio::io::{AsyncReadExt, AsyncWriteExt, duplex};

fn mesh_app(from: u32, to: u32, id: u32, port: u64, payload: &[u8]) -> Vec<u8> {
    let mut envelope = WireWriter::new();
    envelope.message(2, |mesh| {
        mesh.fixed32(1, from).fixed32(2, to).fixed32(6, id).varint(9, 2).varint(15, 3).int32(12, -97);
        mesh.message(4, |data| {
            data.varint(1, port).bytes(2, payload);
        });
    });
    envelope.into_bytes()
}

/// Fixed-header packet: id, from, broadcast, then channel 0, one hop of three.
fn legacy(id: u32, from: u32, payload: &[u8]) -> Vec<u8> {
    let mut chunk: Vec<u8> = [id, from, BROADCAST_ADDR, 0x0003_0100].iter().flat_map(|word| word.to_le_bytes()).collect();
    chunk.extend_from_slice(payload);
    chunk
}

fn frame(payload: &[u8]) -> Vec<u8> {
    let mut out = vec![0x94, 0xC3];
    out.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

async fn wait_for_total(pipeline: &Pipeline, total: u64) -> Result<()> {
    tokio::time::timeout(Duration::from_secs(5), async {
        while pipeline.snapshot_statistics().total_packets < total {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .context("pipeline did not process packets in time")
}

#[tokio::test]
async fn mixed_sources_are_classified() -> Result<()> {
    let _ = tracing_subscriber::fmt::try_init();
    let pipeline = Pipeline::start(PipelineConfig::default())?;
    let seen = Arc::new(Mutex::new(Vec::<Packet>::new()));
    let sink = Arc::clone(&seen);
    pipeline.subscribe_fn(move |packet| sink.lock().unwrap().push(packet.clone()));

    let status = r#"{"type":"device_status","timestamp":1700000000.5,"device_info":{"power":{"battery_percent":91,"battery_voltage_mv":4150},"airtime":{"channel_utilization":8.25,"utilization_tx":0.5},"wifi":{"rssi":-58}}}"#;
    let chunks: Vec<Vec<u8>> = vec![
        status.as_bytes().to_vec(),
        mesh_app(0xA1B2_C3D4, BROADCAST_ADDR, 42, 1, b"hello mesh"),
        legacy(9, 0x0000_0101, &[0x0D, 0x00, 0x5C, 0x40, 0x1C, 0x15, 0x00, 0x1E, 0x17, 0x05]),
        b"Firmware version 2.5.1.abcdef".to_vec(),
    ];
    for chunk in &chunks {
        assert_eq!(pipeline.submit(chunk), SubmitOutcome::Queued);
    }
    wait_for_total(&pipeline, 4).await?;
    tokio::time::timeout(Duration::from_secs(5), async {
        while seen.lock().unwrap().len() < 4 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await?;

    let seen = seen.lock().unwrap();
    let types: Vec<PacketType> = seen.iter().map(|packet| packet.packet_type).collect();
    assert_eq!(types, [PacketType::Telemetry, PacketType::Text, PacketType::Position, PacketType::Text]);

    let status = &seen[0];
    assert_eq!(status.from, 0x1234_5678);
    assert_eq!(status.rx_rssi, -58);
    assert_eq!(status.hop_limit, 3);
    match &status.decoded {
        Some(DecodedData::Telemetry(telemetry)) => {
            let metrics = telemetry.device_metrics.as_ref().context("device metrics")?;
            assert_eq!(metrics.battery_level, Some(91));
            assert!((metrics.voltage.unwrap_or_default() - 4.15).abs() < 1e-6);
        }
        other => panic!("unexpected decoded payload {other:?}"),
    }

    let position = &seen[2];
    assert_eq!((position.id, position.from, position.hop_count, position.hop_limit), (9, 0x0101, 1, 3));
    assert!(matches!(position.decoded, Some(DecodedData::Position(_))));

    let text = &seen[1];
    assert_eq!(text.id, 42);
    assert_eq!(text.from_hex(), "!a1b2c3d4");
    assert!(text.is_broadcast());
    assert_eq!(text.hop_count, 1);
    assert_eq!(text.signal_strength(), "-97 dBm (SNR: 0.0)");
    match &text.decoded {
        Some(DecodedData::Text(data)) => assert_eq!(data.text, "hello mesh"),
        other => panic!("unexpected decoded payload {other:?}"),
    }

    let stats = pipeline.snapshot_statistics();
    assert_eq!(stats.packets_by_type.get(&PacketType::Text), Some(&2));
    assert_eq!(stats.dropped_packets, 0);
    Ok(())
}

#[tokio::test]
async fn serial_stream_with_noise_and_node_records() -> Result<()> {
    let (client, mut radio) = duplex(8192);
    let (pipeline, radio_task) = Meshtap::connect(client, "test-radio", PipelineConfig::default())?;

    let mut greeting = vec![0u8; 38];
    radio.read_exact(&mut greeting).await?;
    assert_eq!(&greeting[32..], &[0x94, 0xC3, 0x00, 0x02, 0x18, 0x00]);

    let mut record = WireWriter::new();
    record.message(4, |node| {
        node.varint(1, 0x0000_BEEF);
        node.message(2, |user| {
            user.string(1, "!0000beef").string(2, "Hilltop Repeater").string(3, "HILL");
        });
    });

    let mut capture = b"INFO  | ??:??:?? 3 [Router] booting\r\n".to_vec();
    capture.extend(frame(record.as_bytes()));
    capture.extend([0x94, 0xC3, 0x02, 0x01, 0xFF]);
    capture.extend(frame(&mesh_app(0x0000_BEEF, 0x0000_0001, 7, 1, b"direct")));
    // split mid-frame
    let (head, tail) = capture.split_at(capture.len() / 2);
    radio.write_all(head).await?;
    radio.write_all(tail).await?;
    drop(radio);

    let transport = radio_task.await?;
    assert_eq!(transport.sync_counters().frames, 2);
    assert_eq!(transport.sync_counters().oversized, 1);

    wait_for_total(&pipeline, 2).await?;
    assert_eq!(pipeline.resolve_name(0x0000_BEEF), "Hilltop Repeater");
    assert_eq!(pipeline.resolve_short_name(0x0000_BEEF), "HILL");
    assert_eq!(pipeline.resolve_name(0x0000_0001), "!00000001");
    Ok(())
}

#[tokio::test]
async fn replayed_capture_reaches_stream_readers() -> Result<()> {
    let pipeline = Pipeline::start(PipelineConfig::default())?;
    let mut packets = Box::pin(pipeline.packets());

    let capture: Vec<u8> = (1..=3u32).flat_map(|id| frame(&mesh_app(5, 6, id, 1, b"relay"))).collect();
    let replay = pipeline.attach(ReplayTransport::from_stream_capture(&capture));
    let transport = replay.await?;
    assert_eq!(transport.remaining(), 0);

    let mut ids = Vec::new();
    while ids.len() < 3 {
        let packet = tokio::time::timeout(Duration::from_secs(5), packets.next())
            .await?
            .context("packet stream ended early")?;
        ids.push(packet.id);
    }
    assert_eq!(ids, [1, 2, 3]);
    pipeline.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn config_from_yaml_drives_queue_capacity() -> Result<()> {
    let config = PipelineConfig::from_yaml_str("queue_capacity: 2\nstatus_node_id: 51966\n")?;
    let pipeline = Pipeline::start(config)?;
    let outcomes: Vec<_> = (0..4).map(|_| pipeline.submit(b"status line")).collect();
    assert_eq!(outcomes, [SubmitOutcome::Queued, SubmitOutcome::Queued, SubmitOutcome::Dropped, SubmitOutcome::Dropped]);

    wait_for_total(&pipeline, 2).await?;
    assert_eq!(pipeline.snapshot_statistics().dropped_packets, 2);
    Ok(())
}
