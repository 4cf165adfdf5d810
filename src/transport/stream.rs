use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, trace};

use super::{ByteHandler, Transport};
use crate::frame::{FrameSynchronizer, MAX_FRAME_LEN, SyncCounters, WAKE_SEQUENCE};
use crate::messages::to_radio::want_config_frame;
use crate::{MeshError, Result};

const READ_BUFFER_LEN: usize = 1024;

/// Framed radio protocol over any byte stream: a serial port, a TCP socket
/// or an in-memory pipe.
pub struct StreamTransport<IO> {
    io: IO,
    endpoint: String,
    synchronizer: FrameSynchronizer,
    config_id: u32,
    connected: bool,
}

impl<IO> StreamTransport<IO>
where
    IO: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(io: IO, endpoint: impl Into<String>) -> Self {
        Self {
            io,
            endpoint: endpoint.into(),
            synchronizer: FrameSynchronizer::with_max_len(MAX_FRAME_LEN),
            config_id: 0,
            connected: false,
        }
    }

    /// Accept frames up to `max_len` payload bytes.
    pub fn with_max_frame_len(mut self, max_len: usize) -> Self {
        self.synchronizer = FrameSynchronizer::with_max_len(max_len);
        self
    }

    /// Id echoed back by the radio when its configuration dump completes.
    pub fn with_config_id(mut self, config_id: u32) -> Self {
        self.config_id = config_id;
        self
    }

    pub fn sync_counters(&self) -> SyncCounters {
        self.synchronizer.counters()
    }

    async fn write(&mut self, bytes: &[u8], context: &str) -> Result<()> {
        self.io.write_all(bytes).await.map_err(|err| MeshError::io(context, err))?;
        self.io.flush().await.map_err(|err| MeshError::io(context, err))
    }
}

#[async_trait::async_trait]
impl<IO> Transport for StreamTransport<IO>
where
    IO: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn connect(&mut self) -> Result<()> {
        info!(endpoint = %self.endpoint, "waking radio");
        self.write(&WAKE_SEQUENCE, "writing wake sequence").await?;
        let request = want_config_frame(self.config_id)?;
        self.write(&request, "requesting configuration").await?;
        self.synchronizer.reset();
        self.connected = true;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if !self.connected {
            return Ok(());
        }
        self.connected = false;
        self.io.shutdown().await.map_err(|err| MeshError::io("closing stream", err))?;
        info!(endpoint = %self.endpoint, "stream closed");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn connection_info(&self) -> String {
        format!("stream {}", self.endpoint)
    }

    async fn start_listening(&mut self, on_bytes: ByteHandler) -> Result<()> {
        if !self.connected {
            return Err(MeshError::NotConnected);
        }

        let mut buffer = vec![0u8; READ_BUFFER_LEN];
        loop {
            let read = match self.io.read(&mut buffer).await {
                Ok(read) => read,
                Err(err) => {
                    self.connected = false;
                    return Err(MeshError::io("reading stream", err));
                }
            };
            if read == 0 {
                self.connected = false;
                let counters = self.synchronizer.counters();
                info!(
                    endpoint = %self.endpoint,
                    frames = counters.frames,
                    noise_bytes = counters.noise_bytes,
                    "stream ended"
                );
                return Ok(());
            }

            trace!(bytes = read, "stream read");
            for frame in self.synchronizer.push(&buffer[..read]) {
                on_bytes(&frame.payload[..]);
            }
        }
    }

    async fn send_command(&mut self, command: &str) -> Result<()> {
        if !self.connected {
            return Err(MeshError::NotConnected);
        }
        debug!(endpoint = %self.endpoint, command, "sending command");
        self.write(command.as_bytes(), "sending command").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::io::duplex;

    fn collector() -> (ByteHandler, Arc<Mutex<Vec<Vec<u8>>>>) {
        let chunks = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&chunks);
        let handler: ByteHandler = Arc::new(move |bytes: &[u8]| sink.lock().unwrap().push(bytes.to_vec()));
        (handler, chunks)
    }

    #[tokio::test]
    async fn connect_wakes_radio_and_requests_config() {
        let (client, mut radio) = duplex(256);
        let mut transport = StreamTransport::new(client, "pipe").with_config_id(1);
        transport.connect().await.unwrap();
        assert!(transport.is_connected());

        let mut sent = vec![0u8; WAKE_SEQUENCE.len() + 6];
        radio.read_exact(&mut sent).await.unwrap();
        assert!(sent[..32].iter().all(|&byte| byte == 0xC3));
        assert_eq!(&sent[32..], &[0x94, 0xC3, 0x00, 0x02, 0x18, 0x01]);
    }

    #[tokio::test]
    async fn frames_reach_handler_until_eof() {
        let (client, mut radio) = duplex(256);
        let mut transport = StreamTransport::new(client, "pipe");
        transport.connect().await.unwrap();

        let mut greeting = vec![0u8; WAKE_SEQUENCE.len() + 6];
        radio.read_exact(&mut greeting).await.unwrap();
        radio.write_all(&[0x00, 0x94, 0xC3, 0x00, 0x02, 0xAA]).await.unwrap();
        radio.write_all(&[0xBB, 0x94, 0xC3, 0x00, 0x01, 0xCC]).await.unwrap();
        drop(radio);

        let (handler, chunks) = collector();
        transport.start_listening(handler).await.unwrap();
        assert_eq!(*chunks.lock().unwrap(), vec![vec![0xAA, 0xBB], vec![0xCC]]);
        assert!(!transport.is_connected());
        assert_eq!(transport.sync_counters().frames, 2);
    }

    #[tokio::test]
    async fn listening_requires_connection() {
        let (client, _radio) = duplex(16);
        let mut transport = StreamTransport::new(client, "pipe");
        let (handler, _) = collector();
        assert!(matches!(transport.start_listening(handler).await, Err(MeshError::NotConnected)));
        assert!(matches!(transport.send_command("--info").await, Err(MeshError::NotConnected)));
        assert_eq!(transport.connection_info(), "stream pipe");
    }

    #[tokio::test]
    async fn commands_are_written_verbatim() {
        let (client, mut radio) = duplex(256);
        let mut transport = StreamTransport::new(client, "pipe");
        transport.connect().await.unwrap();
        transport.send_command("--nodes\n").await.unwrap();
        transport.close().await.unwrap();

        let mut written = Vec::new();
        radio.read_to_end(&mut written).await.unwrap();
        assert!(written.ends_with(b"--nodes\n"));
    }
}
