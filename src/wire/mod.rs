//! Tag/length/value wire primitives.
//!
//! Every field starts with a varint tag: the low three bits carry the wire
//! type and the remaining bits the field number. [`FieldReader`] walks a
//! buffer field by field without any schema; message types implement
//! [`WireMessage`] to pick the fields they know and let the rest fall away.
//!
//! Decoding never fails outright. A walk that hits a malformed field stops
//! there and the message comes back as [`Decoded::Partial`] with everything
//! merged up to that point.

mod writer;

pub use writer::{WireWriter, encode_varint};

use tracing::trace;

use crate::error::DecodeFailure;

/// Maximum number of 7-bit groups in a varint (enough for a u64).
pub const MAX_VARINT_GROUPS: usize = 10;

/// Wire types understood by the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WireType {
    Varint = 0,
    Fixed64 = 1,
    LengthDelimited = 2,
    Fixed32 = 5,
}

impl WireType {
    /// Interpret the low three tag bits found at `offset`.
    pub fn from_bits(bits: u8, offset: usize) -> Result<Self, DecodeFailure> {
        match bits {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::Fixed64),
            2 => Ok(WireType::LengthDelimited),
            5 => Ok(WireType::Fixed32),
            wire_type => Err(DecodeFailure::InvalidWireType { offset, wire_type }),
        }
    }
}

/// Read a base-128 varint starting at `offset`.
///
/// Returns the value and the offset of the first byte after it.
pub fn read_varint(bytes: &[u8], offset: usize) -> Result<(u64, usize), DecodeFailure> {
    let mut value = 0u64;
    let mut position = offset;

    for group in 0..MAX_VARINT_GROUPS {
        let Some(&byte) = bytes.get(position) else {
            return Err(DecodeFailure::Truncated {
                offset,
                needed: group + 1,
                available: bytes.len().saturating_sub(offset),
            });
        };
        value |= u64::from(byte & 0x7F) << (7 * group);
        position += 1;
        if byte & 0x80 == 0 {
            return Ok((value, position));
        }
    }

    Err(DecodeFailure::VarintTooLong { offset })
}

/// Advance past one field value of the given wire type.
///
/// `offset` points at the value, just after the tag.
pub fn skip_field(bytes: &[u8], offset: usize, wire_type: WireType) -> Result<usize, DecodeFailure> {
    match wire_type {
        WireType::Varint => read_varint(bytes, offset).map(|(_, next)| next),
        WireType::Fixed64 => advance(bytes, offset, 8),
        WireType::Fixed32 => advance(bytes, offset, 4),
        WireType::LengthDelimited => {
            let (length, start) = read_varint(bytes, offset)?;
            advance(bytes, start, usize::try_from(length).unwrap_or(usize::MAX))
        }
    }
}

fn advance(bytes: &[u8], offset: usize, length: usize) -> Result<usize, DecodeFailure> {
    offset.checked_add(length).filter(|&end| end <= bytes.len()).ok_or(DecodeFailure::Truncated {
        offset,
        needed: length,
        available: bytes.len().saturating_sub(offset),
    })
}

/// One field as found on the wire.
///
/// `value` holds the encoded value bytes; for length-delimited fields the
/// length prefix is already stripped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawField<'a> {
    pub number: u32,
    pub wire_type: WireType,
    /// Offset of the tag within the walked buffer.
    pub offset: usize,
    pub value: &'a [u8],
}

impl<'a> RawField<'a> {
    pub fn varint(&self) -> Option<u64> {
        match self.wire_type {
            WireType::Varint => read_varint(self.value, 0).ok().map(|(value, _)| value),
            _ => None,
        }
    }

    /// Varint truncated to 32 bits, as `uint32` fields are.
    pub fn uint32(&self) -> Option<u32> {
        self.varint().map(|value| value as u32)
    }

    /// Varint reinterpreted as `int32`; negative values arrive sign-extended.
    pub fn int32(&self) -> Option<i32> {
        self.varint().map(|value| value as i32)
    }

    pub fn bool(&self) -> Option<bool> {
        self.varint().map(|value| value != 0)
    }

    pub fn fixed32(&self) -> Option<u32> {
        match self.wire_type {
            WireType::Fixed32 => self.value.try_into().ok().map(u32::from_le_bytes),
            _ => None,
        }
    }

    pub fn sfixed32(&self) -> Option<i32> {
        self.fixed32().map(|value| value as i32)
    }

    pub fn float(&self) -> Option<f32> {
        self.fixed32().map(f32::from_bits)
    }

    pub fn fixed64(&self) -> Option<u64> {
        match self.wire_type {
            WireType::Fixed64 => self.value.try_into().ok().map(u64::from_le_bytes),
            _ => None,
        }
    }

    /// 32-bit value sent either as a varint or as fixed32.
    pub fn flexible_u32(&self) -> Option<u32> {
        self.uint32().or_else(|| self.fixed32())
    }

    pub fn bytes(&self) -> Option<&'a [u8]> {
        match self.wire_type {
            WireType::LengthDelimited => Some(self.value),
            _ => None,
        }
    }

    /// Length-delimited value as text; invalid UTF-8 is replaced.
    pub fn string(&self) -> Option<String> {
        self.bytes().map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    /// Decode a nested message from a length-delimited value.
    pub fn message<M: WireMessage>(&self) -> Option<Decoded<M>> {
        self.bytes().map(M::decode)
    }
}

/// Lazy walk over the fields of one message body.
///
/// The walk ends at the end of the buffer or right after the first
/// failure, which is yielded once.
#[derive(Debug, Clone)]
pub struct FieldReader<'a> {
    bytes: &'a [u8],
    offset: usize,
    failed: bool,
}

impl<'a> FieldReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self::at(bytes, 0)
    }

    /// Start (or restart) the walk at `offset`.
    pub fn at(bytes: &'a [u8], offset: usize) -> Self {
        Self { bytes, offset, failed: false }
    }

    /// Offset of the next unread tag.
    pub fn offset(&self) -> usize {
        self.offset
    }

    fn read_field(&self) -> Result<(RawField<'a>, usize), DecodeFailure> {
        let start = self.offset;
        let (tag, value_start) = read_varint(self.bytes, start)?;
        let wire_type = WireType::from_bits((tag & 0x07) as u8, start)?;
        let number = match u32::try_from(tag >> 3) {
            Ok(0) | Err(_) => return Err(DecodeFailure::InvalidFieldNumber { offset: start }),
            Ok(number) => number,
        };

        let end = skip_field(self.bytes, value_start, wire_type)?;
        let value = match wire_type {
            WireType::LengthDelimited => {
                let (_, body) = read_varint(self.bytes, value_start)?;
                &self.bytes[body..end]
            }
            _ => &self.bytes[value_start..end],
        };

        Ok((RawField { number, wire_type, offset: start, value }, end))
    }
}

impl<'a> Iterator for FieldReader<'a> {
    type Item = Result<RawField<'a>, DecodeFailure>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.bytes.len() {
            return None;
        }

        match self.read_field() {
            Ok((field, end)) => {
                self.offset = end;
                Some(Ok(field))
            }
            Err(failure) => {
                self.failed = true;
                Some(Err(failure))
            }
        }
    }
}

/// Outcome of decoding one message.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded<T> {
    /// Every field in the buffer was walked.
    Complete(T),
    /// The walk stopped at a malformed field; `T` holds what came before it.
    Partial(T, DecodeFailure),
}

impl<T> Decoded<T> {
    pub fn value(&self) -> &T {
        match self {
            Decoded::Complete(value) | Decoded::Partial(value, _) => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Decoded::Complete(value) | Decoded::Partial(value, _) => value,
        }
    }

    pub fn failure(&self) -> Option<DecodeFailure> {
        match self {
            Decoded::Complete(_) => None,
            Decoded::Partial(_, failure) => Some(*failure),
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Decoded::Complete(_))
    }

    /// Treat a partial decode as an error for callers that need every field.
    pub fn into_strict(self, context: &str) -> crate::Result<T> {
        match self {
            Decoded::Complete(value) => Ok(value),
            Decoded::Partial(_, failure) => Err(crate::MeshError::decode(context, failure)),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Decoded<U> {
        match self {
            Decoded::Complete(value) => Decoded::Complete(f(value)),
            Decoded::Partial(value, failure) => Decoded::Partial(f(value), failure),
        }
    }
}

/// A message shape that can be assembled from raw fields.
///
/// Implementors match on field numbers they know; typed accessors on
/// [`RawField`] return `None` for a mismatched wire type, so such fields are
/// skipped like unknown ones.
pub trait WireMessage: Default {
    fn merge_field(&mut self, field: &RawField<'_>);

    fn decode(bytes: &[u8]) -> Decoded<Self> {
        let mut message = Self::default();
        for field in FieldReader::new(bytes) {
            match field {
                Ok(field) => message.merge_field(&field),
                Err(failure) => {
                    trace!(message = std::any::type_name::<Self>(), %failure, "decode stopped early");
                    return Decoded::Partial(message, failure);
                }
            }
        }
        Decoded::Complete(message)
    }
}
