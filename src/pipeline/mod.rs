//! Ingestion pipeline: chunks in, classified packets out.
//!
//! [`Pipeline::submit`] decodes a chunk on the caller's thread and pushes
//! the packet into a bounded queue without waiting. One consumer task drains
//! the queue, updating statistics and the node directory before fanning the
//! packet out to subscribers.
//!
//! ```rust,no_run
//! use meshtap::config::PipelineConfig;
//! use meshtap::pipeline::Pipeline;
//! use meshtap::transport::ReplayTransport;
//!
//! # async fn run() -> meshtap::Result<()> {
//! let pipeline = Pipeline::start(PipelineConfig::default())?;
//! pipeline.subscribe_fn(|packet| println!("{} from {}", packet.type_name(), packet.from_hex()));
//!
//! let transport = ReplayTransport::new([b"Firmware version 2.5.1".to_vec()]);
//! let replay = pipeline.attach(transport);
//! let _ = replay.await;
//! println!("{}", pipeline.snapshot_statistics().summary());
//! pipeline.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod decode;
mod queue;
mod text;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures::{Stream, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use self::decode::decode_chunk;
use self::queue::{PacketQueue, PushError};
use crate::Result;
use crate::config::PipelineConfig;
use crate::directory::NodeDirectory;
use crate::driver::Driver;
use crate::stats::{Statistics, StatisticsAggregator};
use crate::transport::{ByteHandler, Transport};
use crate::types::{DecodedData, Packet};

/// Receives every packet the pipeline produces, in arrival order.
#[async_trait::async_trait]
pub trait Subscriber: Send + Sync + 'static {
    async fn on_packet(&self, packet: &Packet);
}

/// Adapts a plain closure into a [`Subscriber`].
pub struct FnSubscriber<F>(pub F);

#[async_trait::async_trait]
impl<F> Subscriber for FnSubscriber<F>
where
    F: Fn(&Packet) + Send + Sync + 'static,
{
    async fn on_packet(&self, packet: &Packet) {
        (self.0)(packet)
    }
}

/// Handle returned by [`Pipeline::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// What happened to a submitted chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Decoded and waiting for the consumer.
    Queued,
    /// Decoded, but the queue was full.
    Dropped,
    /// No decoder produced a packet.
    Ignored,
    /// The pipeline has shut down.
    Closed,
}

/// Decode-and-enqueue half, shared with transport callbacks.
#[derive(Clone)]
struct Ingest {
    config: Arc<PipelineConfig>,
    queue: PacketQueue,
}

impl Ingest {
    fn submit(&self, raw: &[u8]) -> SubmitOutcome {
        let Some(packet) = decode_chunk(raw, &self.config) else {
            trace!(len = raw.len(), "chunk produced no packet");
            return SubmitOutcome::Ignored;
        };

        let packet_type = packet.packet_type;
        match self.queue.try_push(packet) {
            Ok(()) => SubmitOutcome::Queued,
            Err(PushError::Full) => {
                warn!(
                    %packet_type,
                    capacity = self.queue.capacity(),
                    dropped = self.queue.dropped(),
                    "packet queue full, dropping packet"
                );
                SubmitOutcome::Dropped
            }
            Err(PushError::Closed) => {
                debug!(%packet_type, "pipeline closed, discarding packet");
                SubmitOutcome::Closed
            }
        }
    }
}

struct SubscriberSlot {
    id: SubscriptionId,
    sender: mpsc::Sender<Arc<Packet>>,
    /// Stops the subscriber task, dropping whatever it has queued.
    cancel: CancellationToken,
}

/// State the consumer task updates.
struct Shared {
    stats: StatisticsAggregator,
    directory: NodeDirectory,
    subscribers: Mutex<Vec<SubscriberSlot>>,
    broadcast: broadcast::Sender<Arc<Packet>>,
}

impl Shared {
    fn process(&self, packet: Packet) {
        self.stats.record(&packet);

        if let Some(identity) = packet.decoded.as_ref().and_then(DecodedData::identity) {
            // a bare identity, such as the local device info, carries no names to record
            if identity.has_names() {
                let user = &identity.user;
                self.directory.update(identity.node_id(packet.from), &user.id, &user.long_name, &user.short_name);
            }
        }

        let packet = Arc::new(packet);
        self.dispatch(&packet);
        // no stream readers is fine
        let _ = self.broadcast.send(packet);
    }

    fn dispatch(&self, packet: &Arc<Packet>) {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|slot| match slot.sender.try_send(Arc::clone(packet)) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(subscriber = slot.id.0, packet_id = packet.id, "subscriber lagging, packet skipped");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(subscriber = slot.id.0, "subscriber gone");
                false
            }
        });
    }
}

/// Running ingestion pipeline. Must be created inside a tokio runtime.
pub struct Pipeline {
    ingest: Ingest,
    shared: Arc<Shared>,
    next_subscriber: AtomicU64,
    cancel: CancellationToken,
    consumer: Mutex<Option<JoinHandle<()>>>,
}

impl Pipeline {
    /// Validate `config` and spawn the consumer task.
    pub fn start(config: PipelineConfig) -> Result<Self> {
        config.validate()?;

        let (queue, receiver) = PacketQueue::bounded(config.queue_capacity);
        let (broadcast, _) = broadcast::channel(config.broadcast_capacity);
        let shared = Arc::new(Shared {
            stats: StatisticsAggregator::new(),
            directory: NodeDirectory::new(),
            subscribers: Mutex::new(Vec::new()),
            broadcast,
        });
        let cancel = CancellationToken::new();
        let consumer = tokio::spawn(consume(receiver, Arc::clone(&shared), cancel.clone()));

        info!(queue_capacity = config.queue_capacity, "pipeline started");
        Ok(Self {
            ingest: Ingest { config: Arc::new(config), queue },
            shared,
            next_subscriber: AtomicU64::new(0),
            cancel,
            consumer: Mutex::new(Some(consumer)),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.ingest.config
    }

    /// Decode one inbound chunk and queue the result. Never waits.
    pub fn submit(&self, raw: &[u8]) -> SubmitOutcome {
        self.ingest.submit(raw)
    }

    /// Register a subscriber with its own ordered queue and task.
    pub fn subscribe(&self, subscriber: impl Subscriber) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscriber.fetch_add(1, Ordering::Relaxed));
        let (sender, mut receiver) = mpsc::channel::<Arc<Packet>>(self.ingest.config.subscriber_buffer);
        let cancel = self.cancel.child_token();
        let task_cancel = cancel.clone();

        tokio::spawn(async move {
            loop {
                let packet = tokio::select! {
                    biased;
                    _ = task_cancel.cancelled() => break,
                    packet = receiver.recv() => match packet {
                        Some(packet) => packet,
                        None => break,
                    },
                };
                subscriber.on_packet(&packet).await;
            }
            debug!(subscriber = id.0, "subscriber task ended");
        });

        self.shared.subscribers.lock().unwrap_or_else(PoisonError::into_inner).push(SubscriberSlot { id, sender, cancel });
        debug!(subscriber = id.0, "subscriber registered");
        id
    }

    pub fn subscribe_fn<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Packet) + Send + Sync + 'static,
    {
        self.subscribe(FnSubscriber(callback))
    }

    /// Remove a subscriber. Packets already queued for it are discarded;
    /// a callback already running is allowed to finish.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.shared.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(index) = subscribers.iter().position(|slot| slot.id == id) else {
            return false;
        };
        subscribers.remove(index).cancel.cancel();
        debug!(subscriber = id.0, "subscriber removed");
        true
    }

    /// Stream of packets processed from now on. A reader that falls behind
    /// the broadcast buffer skips the packets it missed.
    pub fn packets(&self) -> impl Stream<Item = Arc<Packet>> + Send + 'static {
        BroadcastStream::new(self.shared.broadcast.subscribe()).filter_map(|item| async move {
            match item {
                Ok(packet) => Some(packet),
                Err(err) => {
                    debug!(error = %err, "packet stream lagged");
                    None
                }
            }
        })
    }

    pub fn resolve_name(&self, node_id: u32) -> String {
        self.shared.directory.resolve_name(node_id)
    }

    pub fn resolve_short_name(&self, node_id: u32) -> String {
        self.shared.directory.resolve_short_name(node_id)
    }

    pub fn directory(&self) -> &NodeDirectory {
        &self.shared.directory
    }

    /// Copy of the statistics, including packets dropped at the queue.
    pub fn snapshot_statistics(&self) -> Statistics {
        let mut stats = self.shared.stats.snapshot();
        stats.dropped_packets = self.ingest.queue.dropped();
        stats
    }

    /// Packets waiting for the consumer.
    pub fn queue_len(&self) -> usize {
        self.ingest.queue.len()
    }

    /// Drive `transport` into [`submit`](Self::submit) on its own task.
    ///
    /// The task stops on shutdown and hands the transport back.
    pub fn attach<T: Transport>(&self, transport: T) -> JoinHandle<T> {
        let ingest = self.ingest.clone();
        let on_bytes: ByteHandler = Arc::new(move |bytes: &[u8]| {
            ingest.submit(bytes);
        });
        Driver::spawn(transport, on_bytes, self.cancel.child_token())
    }

    /// Stop the consumer, subscriber tasks and attached transports.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let consumer = self.consumer.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(consumer) = consumer {
            if let Err(err) = consumer.await {
                warn!(error = %err, "pipeline consumer ended abnormally");
            }
        }
        info!("pipeline shut down");
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn consume(mut receiver: mpsc::Receiver<Packet>, shared: Arc<Shared>, cancel: CancellationToken) {
    loop {
        let packet = tokio::select! {
            _ = cancel.cancelled() => break,
            packet = receiver.recv() => match packet {
                Some(packet) => packet,
                None => break,
            },
        };
        trace!(packet_type = %packet.packet_type, from = packet.from, "processing packet");
        shared.process(packet);
    }
    debug!("pipeline consumer stopped");
}
