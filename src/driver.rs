//! Driver runs a transport in its own task and feeds its chunks onward.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::transport::{ByteHandler, Transport};

/// Consecutive failures after which the driver gives up.
const MAX_ERRORS: u32 = 10;

/// Spawns and supervises transport tasks.
pub struct Driver;

impl Driver {
    /// Drive `transport` until its stream ends, it fails too often, or
    /// `cancel` fires. The task hands the transport back when it stops.
    pub fn spawn<T>(transport: T, on_bytes: ByteHandler, cancel: CancellationToken) -> JoinHandle<T>
    where
        T: Transport,
    {
        tokio::spawn(Self::transport_task(transport, on_bytes, cancel))
    }

    async fn transport_task<T>(mut transport: T, on_bytes: ByteHandler, cancel: CancellationToken) -> T
    where
        T: Transport,
    {
        let endpoint = transport.connection_info();
        info!(%endpoint, "transport task started");
        let mut error_count = 0u32;

        loop {
            if cancel.is_cancelled() {
                info!(%endpoint, "transport task cancelled");
                break;
            }

            let result = if transport.is_connected() {
                Ok(())
            } else {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    result = transport.connect() => result,
                }
            };

            let result = match result {
                Ok(()) => {
                    error_count = 0;
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            info!(%endpoint, "transport cancelled while listening");
                            break;
                        }
                        result = transport.start_listening(on_bytes.clone()) => result,
                    }
                }
                Err(err) => Err(err),
            };

            match result {
                Ok(()) => {
                    info!(%endpoint, "transport stream ended");
                    break;
                }
                Err(err) if !err.is_retryable() => {
                    error!(%endpoint, error = %err, "transport failed permanently");
                    break;
                }
                Err(err) => {
                    error_count += 1;
                    error!(%endpoint, error = %err, "transport error ({}/{})", error_count, MAX_ERRORS);
                    if error_count >= MAX_ERRORS {
                        error!(%endpoint, "too many transport errors, shutting down");
                        break;
                    }

                    // Exponential backoff: 50ms, 100ms, 200ms, ...
                    let backoff = Duration::from_millis(50 * (1 << error_count.min(5)));
                    debug!(?backoff, "retrying transport");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(backoff) => {}
                    }
                }
            }
        }

        if transport.is_connected() {
            if let Err(err) = transport.close().await {
                warn!(%endpoint, error = %err, "failed to close transport");
            }
        }
        info!(%endpoint, "transport task ended");
        transport
    }
}
