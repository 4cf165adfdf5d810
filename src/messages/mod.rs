//! Message shapes of the radio protocol.
//!
//! Each type implements [`WireMessage`](crate::wire::WireMessage) and picks
//! out its known fields by number; everything else is skipped.

pub mod envelope;
pub mod position;
pub mod remote_hardware;
pub mod telemetry;
pub mod to_radio;
pub mod user;

pub use envelope::{ApplicationData, BROADCAST_ADDR, LogRecord, MeshPacketEnvelope, PacketPayload, RadioEnvelope};
pub use position::Position;
pub use remote_hardware::{HardwareOperation, RemoteHardware};
pub use telemetry::{AirQualityMetrics, DeviceMetrics, EnvironmentMetrics, PowerMetrics, Telemetry};
pub use user::{DeviceIdentity, NodeRecord, User, hardware_model_name};
