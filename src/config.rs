//! Pipeline configuration.
//!
//! Every field has a default, so an empty document is a valid configuration:
//!
//! ```yaml
//! queue_capacity: 100
//! subscriber_buffer: 256
//! broadcast_capacity: 256
//! max_frame_len: 512
//! status_node_id: 0x12345678
//! status_hop_limit: 3
//! printable_threshold: 0.7
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::frame::MAX_FRAME_LEN;
use crate::resolver::DEFAULT_PRINTABLE_THRESHOLD;
use crate::{MeshError, Result};

/// Node number used as the source of synthesized device status packets.
pub const DEFAULT_STATUS_NODE_ID: u32 = 0x1234_5678;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Packets buffered between `submit` and the consumer.
    pub queue_capacity: usize,
    /// Packets buffered per subscriber before that subscriber starts missing packets.
    pub subscriber_buffer: usize,
    /// Capacity of the broadcast channel behind `Pipeline::packets`.
    pub broadcast_capacity: usize,
    /// Largest frame payload a transport will accept.
    pub max_frame_len: usize,
    pub status_node_id: u32,
    pub status_hop_limit: u8,
    /// Printable share above which an unclassified payload counts as text.
    pub printable_threshold: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 100,
            subscriber_buffer: 256,
            broadcast_capacity: 256,
            max_frame_len: MAX_FRAME_LEN,
            status_node_id: DEFAULT_STATUS_NODE_ID,
            status_hop_limit: 3,
            printable_threshold: DEFAULT_PRINTABLE_THRESHOLD,
        }
    }
}

impl PipelineConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self =
            serde_yaml_ng::from_str(yaml).map_err(|err| MeshError::config(None, err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|err| MeshError::config(Some(path.to_path_buf()), err.to_string()))?;
        Self::from_yaml_str(&yaml).map_err(|err| match err {
            MeshError::Config { details, .. } => MeshError::config(Some(path.to_path_buf()), details),
            other => other,
        })
    }

    pub fn validate(&self) -> Result<()> {
        let capacities = [
            ("queue_capacity", self.queue_capacity),
            ("subscriber_buffer", self.subscriber_buffer),
            ("broadcast_capacity", self.broadcast_capacity),
            ("max_frame_len", self.max_frame_len),
        ];
        if let Some((name, _)) = capacities.iter().find(|(_, value)| *value == 0) {
            return Err(MeshError::config(None, format!("{name} must be greater than zero")));
        }
        if self.max_frame_len > usize::from(u16::MAX) {
            return Err(MeshError::config(
                None,
                format!("max_frame_len {} exceeds the 16-bit length header", self.max_frame_len),
            ));
        }
        if !(self.printable_threshold > 0.0 && self.printable_threshold <= 1.0) {
            return Err(MeshError::config(
                None,
                format!("printable_threshold {} must be in (0, 1]", self.printable_threshold),
            ));
        }
        Ok(())
    }
}
