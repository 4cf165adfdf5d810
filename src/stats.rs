//! Running statistics over processed packets.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::{Packet, PacketType};

/// Point-in-time copy of the aggregated counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statistics {
    pub total_packets: u64,
    pub packets_by_type: BTreeMap<PacketType, u64>,
    pub packets_by_channel: BTreeMap<u8, u64>,
    /// Smoothed RSSI in dBm, `0.0` until a sample arrives.
    pub average_rssi: f64,
    pub average_snr: f64,
    pub start_time: DateTime<Utc>,
    pub last_packet_time: Option<DateTime<Utc>>,
    /// Packets discarded because the ingestion queue was full.
    pub dropped_packets: u64,
}

impl Statistics {
    fn new(start_time: DateTime<Utc>) -> Self {
        Self {
            total_packets: 0,
            packets_by_type: BTreeMap::new(),
            packets_by_channel: BTreeMap::new(),
            average_rssi: 0.0,
            average_snr: 0.0,
            start_time,
            last_packet_time: None,
            dropped_packets: 0,
        }
    }

    /// Total followed by one line per type with its share.
    pub fn summary(&self) -> String {
        if self.total_packets == 0 {
            return "No packets processed".to_string();
        }

        let mut out = format!("Total: {} packets\n", self.total_packets);
        for (packet_type, count) in &self.packets_by_type {
            let share = *count as f64 / self.total_packets as f64 * 100.0;
            let _ = writeln!(out, "  {}: {} ({:.1}%)", packet_type.name(), count, share);
        }
        out
    }
}

/// Two-term smoothing: the first sample seeds the average, each later
/// sample is averaged with the previous value.
fn smooth(average: f64, sample: f64) -> f64 {
    if average == 0.0 { sample } else { (average + sample) / 2.0 }
}

/// Statistics owned by one pipeline.
#[derive(Debug)]
pub struct StatisticsAggregator {
    inner: Mutex<Statistics>,
}

impl Default for StatisticsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl StatisticsAggregator {
    pub fn new() -> Self {
        Self { inner: Mutex::new(Statistics::new(Utc::now())) }
    }

    pub fn record(&self, packet: &Packet) {
        let mut stats = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        stats.total_packets += 1;
        *stats.packets_by_type.entry(packet.packet_type).or_default() += 1;
        *stats.packets_by_channel.entry(packet.channel).or_default() += 1;
        stats.last_packet_time = Some(packet.rx_time);

        // zero means the radio reported nothing
        if packet.rx_rssi != 0 {
            stats.average_rssi = smooth(stats.average_rssi, f64::from(packet.rx_rssi));
        }
        if packet.rx_snr != 0.0 {
            stats.average_snr = smooth(stats.average_snr, f64::from(packet.rx_snr));
        }
    }

    pub fn snapshot(&self) -> Statistics {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}
