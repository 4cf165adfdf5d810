//! Stream framing for serial and TCP links.
//!
//! Each frame on the wire is `0x94 0xC3 <len_hi> <len_lo> <payload>`. The
//! [`FrameSynchronizer`] is a byte-at-a-time state machine that recovers
//! frame boundaries from a stream that may begin mid-frame or carry debug
//! console noise between frames. Bytes that do not fit the expected
//! preamble are dropped without error.

use bytes::{BufMut, Bytes, BytesMut};
use tracing::{debug, trace};

use crate::{MeshError, Result};

/// Two-byte preamble opening every frame.
pub const PREAMBLE: [u8; 2] = [0x94, 0xC3];

/// Preamble plus the big-endian length.
pub const HEADER_LEN: usize = 4;

/// Largest payload the radio firmware will send or accept.
pub const MAX_FRAME_LEN: usize = 512;

/// Bytes sent before the first request to wake a sleeping device.
pub const WAKE_SEQUENCE: [u8; 32] = [PREAMBLE[1]; 32];

/// Synchronizer position within a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    AwaitingSync1,
    AwaitingSync2,
    AccumulatingLength,
    AccumulatingPayload,
}

/// One complete frame payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub payload: Bytes,
}

impl Frame {
    /// Length announced in the header, always equal to the payload length.
    pub fn declared_length(&self) -> u16 {
        self.payload.len() as u16
    }
}

/// Running diagnostics for one synchronizer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncCounters {
    pub frames: u64,
    pub noise_bytes: u64,
    pub oversized: u64,
}

#[derive(Debug)]
pub struct FrameSynchronizer {
    state: SyncState,
    length_hi: Option<u8>,
    expected: usize,
    payload: BytesMut,
    max_len: usize,
    counters: SyncCounters,
}

impl Default for FrameSynchronizer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSynchronizer {
    pub fn new() -> Self {
        Self::with_max_len(MAX_FRAME_LEN)
    }

    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            state: SyncState::AwaitingSync1,
            length_hi: None,
            expected: 0,
            payload: BytesMut::with_capacity(max_len),
            max_len,
            counters: SyncCounters::default(),
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn counters(&self) -> SyncCounters {
        self.counters
    }

    /// Drop any partial frame and wait for a new preamble.
    pub fn reset(&mut self) {
        self.state = SyncState::AwaitingSync1;
        self.length_hi = None;
        self.expected = 0;
        self.payload.clear();
    }

    /// Consume one byte, returning a frame if it completed one.
    pub fn feed(&mut self, byte: u8) -> Option<Frame> {
        match self.state {
            SyncState::AwaitingSync1 => {
                if byte == PREAMBLE[0] {
                    self.state = SyncState::AwaitingSync2;
                } else {
                    self.counters.noise_bytes += 1;
                }
                None
            }
            SyncState::AwaitingSync2 => {
                if byte == PREAMBLE[1] {
                    self.state = SyncState::AccumulatingLength;
                } else {
                    trace!(byte, "expected second preamble byte, resyncing");
                    self.counters.noise_bytes += 2;
                    self.reset();
                }
                None
            }
            SyncState::AccumulatingLength => match self.length_hi.take() {
                None => {
                    self.length_hi = Some(byte);
                    None
                }
                Some(hi) => {
                    let length = usize::from(u16::from_be_bytes([hi, byte]));
                    if length > self.max_len {
                        debug!(length, max = self.max_len, "frame length exceeds maximum, discarding");
                        self.counters.oversized += 1;
                        self.reset();
                        return None;
                    }
                    self.expected = length;
                    self.state = SyncState::AccumulatingPayload;
                    if length == 0 { self.complete() } else { None }
                }
            },
            SyncState::AccumulatingPayload => {
                self.payload.put_u8(byte);
                if self.payload.len() == self.expected { self.complete() } else { None }
            }
        }
    }

    /// Consume a buffer, returning every frame completed within it.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Frame> {
        bytes.iter().filter_map(|&byte| self.feed(byte)).collect()
    }

    fn complete(&mut self) -> Option<Frame> {
        let payload = self.payload.split().freeze();
        self.counters.frames += 1;
        trace!(len = payload.len(), "frame complete");
        self.reset();
        Some(Frame { payload })
    }
}

/// Wrap `payload` in a frame header.
pub fn encode_frame(payload: &[u8]) -> Result<Bytes> {
    if payload.len() > MAX_FRAME_LEN {
        return Err(MeshError::FrameTooLarge { length: payload.len(), max: MAX_FRAME_LEN });
    }
    let mut frame = BytesMut::with_capacity(HEADER_LEN + payload.len());
    frame.put_slice(&PREAMBLE);
    frame.put_u16(payload.len() as u16);
    frame.put_slice(payload);
    Ok(frame.freeze())
}
