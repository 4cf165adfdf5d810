//! Packet ingestion core for Meshtastic-style mesh radios.
//!
//! meshtap turns the raw bytes a radio hands over a serial port, a TCP
//! socket or a polled HTTP endpoint into classified [`Packet`]s, tracks
//! which nodes have been heard and keeps running statistics.
//!
//! # Features
//!
//! - **Frame sync**: recovers `0x94 0xC3` frames from noisy serial streams
//! - **Lenient decoding**: damaged messages keep every field read before the damage
//! - **Classification**: port numbers first, content heuristics when they are missing
//! - **Non-blocking ingest**: a bounded queue that drops instead of stalling the reader
//!
//! ## Example (replay)
//!
//! ```rust,no_run
//! use meshtap::{Meshtap, PipelineConfig};
//! use meshtap::transport::ReplayTransport;
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> meshtap::Result<()> {
//!     let capture = std::fs::read("capture.bin").map_err(|err| meshtap::MeshError::io("reading capture", err))?;
//!     let transport = ReplayTransport::from_stream_capture(&capture);
//!     let (pipeline, _replay) = Meshtap::attach(transport, PipelineConfig::default())?;
//!
//!     let mut packets = Box::pin(pipeline.packets());
//!     while let Some(packet) = packets.next().await {
//!         println!("{} {} -> {}", packet.type_name(), packet.from_name(pipeline.directory()), packet.to_name(pipeline.directory()));
//!     }
//!     Ok(())
//! }
//! ```

// Core types and error handling
pub mod config;
mod error;
pub mod logging;
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Wire format
pub mod frame;
pub mod messages;
pub mod wire;

// Classification and state
pub mod directory;
pub mod resolver;
pub mod stats;

// Ingestion
pub mod driver;
pub mod pipeline;
pub mod transport;

// Core exports
pub use config::PipelineConfig;
pub use error::*;
pub use types::*;

pub use directory::NodeDirectory;
pub use frame::{Frame, FrameSynchronizer};
pub use pipeline::{Pipeline, SubmitOutcome, Subscriber, SubscriptionId};
pub use stats::Statistics;
pub use transport::{ReplayTransport, StreamTransport, Transport};

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinHandle;

/// Entry point pairing a pipeline with the transport feeding it.
///
/// # Examples
///
/// ## Serial or TCP stream
/// ```rust,no_run
/// use meshtap::{Meshtap, PipelineConfig};
///
/// #[tokio::main]
/// async fn main() -> meshtap::Result<()> {
///     let socket = tokio::net::TcpStream::connect("192.168.1.40:4403")
///         .await
///         .map_err(|err| meshtap::MeshError::io("connecting", err))?;
///     let (pipeline, _radio) = Meshtap::connect(socket, "192.168.1.40:4403", PipelineConfig::default())?;
///     pipeline.subscribe_fn(|packet| println!("{}", packet.type_name()));
///     Ok(())
/// }
/// ```
pub struct Meshtap;

impl Meshtap {
    /// Start a pipeline and drive a framed radio stream into it.
    ///
    /// The stream accepts frames up to `config.max_frame_len`. Must be called
    /// inside a tokio runtime.
    pub fn connect<IO>(
        io: IO,
        endpoint: impl Into<String>,
        config: PipelineConfig,
    ) -> Result<(Pipeline, JoinHandle<StreamTransport<IO>>)>
    where
        IO: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let transport = StreamTransport::new(io, endpoint).with_max_frame_len(config.max_frame_len);
        Self::attach(transport, config)
    }

    /// Start a pipeline and attach any transport to it.
    pub fn attach<T: Transport>(transport: T, config: PipelineConfig) -> Result<(Pipeline, JoinHandle<T>)> {
        let pipeline = Pipeline::start(config)?;
        let handle = pipeline.attach(transport);
        Ok((pipeline, handle))
    }
}
