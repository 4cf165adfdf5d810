//! Semantic packet categories.

use std::fmt;

use serde::{Deserialize, Serialize};

/// What a packet is about, independent of how it reached us.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PacketType {
    Unknown,
    Position,
    Text,
    Telemetry,
    NodeInfo,
    Routing,
    Admin,
    RangeTest,
    NeighborInfo,
    DetectionSensor,
    RemoteHardware,
    ReplyApp,
    IpTunnelApp,
    SerialApp,
    StoreForwardApp,
    ZpsApp,
    SimulatorApp,
    TracerouteApp,
}

impl PacketType {
    /// Every variant, in declaration order.
    pub const ALL: [PacketType; 18] = [
        PacketType::Unknown,
        PacketType::Position,
        PacketType::Text,
        PacketType::Telemetry,
        PacketType::NodeInfo,
        PacketType::Routing,
        PacketType::Admin,
        PacketType::RangeTest,
        PacketType::NeighborInfo,
        PacketType::DetectionSensor,
        PacketType::RemoteHardware,
        PacketType::ReplyApp,
        PacketType::IpTunnelApp,
        PacketType::SerialApp,
        PacketType::StoreForwardApp,
        PacketType::ZpsApp,
        PacketType::SimulatorApp,
        PacketType::TracerouteApp,
    ];

    /// Display name, e.g. `NODE_INFO`.
    pub fn name(self) -> &'static str {
        match self {
            PacketType::Unknown => "UNKNOWN",
            PacketType::Position => "POSITION",
            PacketType::Text => "TEXT",
            PacketType::Telemetry => "TELEMETRY",
            PacketType::NodeInfo => "NODE_INFO",
            PacketType::Routing => "ROUTING",
            PacketType::Admin => "ADMIN",
            PacketType::RangeTest => "RANGE_TEST",
            PacketType::NeighborInfo => "NEIGHBOR_INFO",
            PacketType::DetectionSensor => "DETECTION_SENSOR",
            PacketType::RemoteHardware => "REMOTE_HARDWARE",
            PacketType::ReplyApp => "REPLY_APP",
            PacketType::IpTunnelApp => "IP_TUNNEL_APP",
            PacketType::SerialApp => "SERIAL_APP",
            PacketType::StoreForwardApp => "STORE_FORWARD_APP",
            PacketType::ZpsApp => "ZPS_APP",
            PacketType::SimulatorApp => "SIMULATOR_APP",
            PacketType::TracerouteApp => "TRACEROUTE_APP",
        }
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
