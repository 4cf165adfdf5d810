use std::time::Duration;

use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info};

use super::{ByteHandler, Transport};
use crate::frame::FrameSynchronizer;
use crate::{MeshError, Result};

/// Plays back recorded chunks, the way polling transports deliver them.
#[derive(Debug, Clone, Default)]
pub struct ReplayTransport {
    chunks: Vec<Vec<u8>>,
    pace: Option<Duration>,
    position: usize,
    connected: bool,
    commands: Vec<String>,
}

impl ReplayTransport {
    pub fn new(chunks: impl IntoIterator<Item = impl Into<Vec<u8>>>) -> Self {
        Self { chunks: chunks.into_iter().map(Into::into).collect(), ..Self::default() }
    }

    /// Split a captured byte stream into the frames it contains.
    pub fn from_stream_capture(capture: &[u8]) -> Self {
        let frames = FrameSynchronizer::new().push(capture);
        Self::new(frames.into_iter().map(|frame| frame.payload.to_vec()))
    }

    /// Wait `pace` between chunks instead of delivering them back to back.
    pub fn with_pace(mut self, pace: Duration) -> Self {
        self.pace = Some(pace);
        self
    }

    pub fn remaining(&self) -> usize {
        self.chunks.len() - self.position
    }

    /// Commands received through [`Transport::send_command`].
    pub fn sent_commands(&self) -> &[String] {
        &self.commands
    }
}

#[async_trait::async_trait]
impl Transport for ReplayTransport {
    async fn connect(&mut self) -> Result<()> {
        info!(chunks = self.chunks.len(), "replay opened");
        self.connected = true;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn connection_info(&self) -> String {
        format!("replay ({} chunks)", self.chunks.len())
    }

    async fn start_listening(&mut self, on_bytes: ByteHandler) -> Result<()> {
        if !self.connected {
            return Err(MeshError::NotConnected);
        }

        let mut ticker = self.pace.map(|pace| {
            let mut ticker = interval(pace);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        while self.position < self.chunks.len() {
            if let Some(ticker) = ticker.as_mut() {
                ticker.tick().await;
            }
            on_bytes(&self.chunks[self.position][..]);
            self.position += 1;
        }

        debug!("replay exhausted");
        self.connected = false;
        Ok(())
    }

    async fn send_command(&mut self, command: &str) -> Result<()> {
        self.commands.push(command.to_string());
        Ok(())
    }
}
