//! Byte sources feeding the pipeline.
//!
//! A transport owns its connection and its timing. The pipeline only asks it
//! to connect and then to listen, handing it a callback that receives one
//! chunk per frame or per poll.

mod replay;
mod stream;

pub use replay::ReplayTransport;
pub use stream::StreamTransport;

use std::sync::Arc;

use crate::Result;

/// Receives each inbound chunk. Called from the read loop, so it must not block.
pub type ByteHandler = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Connection to a radio, however it is reached.
#[async_trait::async_trait]
pub trait Transport: Send + 'static {
    async fn connect(&mut self) -> Result<()>;

    async fn close(&mut self) -> Result<()>;

    fn is_connected(&self) -> bool;

    /// Human-readable description of the endpoint.
    fn connection_info(&self) -> String;

    /// Deliver chunks to `on_bytes` until the source ends or fails.
    ///
    /// Returns `Ok(())` on a clean end of stream.
    async fn start_listening(&mut self, on_bytes: ByteHandler) -> Result<()>;

    /// Write a text command to the device verbatim.
    async fn send_command(&mut self, command: &str) -> Result<()>;
}
