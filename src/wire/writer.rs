//! Encoder counterpart of the field reader.

use super::WireType;

/// Append `value` as a base-128 varint.
pub fn encode_varint(mut value: u64, out: &mut Vec<u8>) {
    while value >= 0x80 {
        out.push((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

/// Builds one message body field by field.
///
/// ```rust
/// use meshtap::wire::WireWriter;
///
/// let mut data = WireWriter::new();
/// data.varint(1, 1).bytes(2, b"hello");
/// assert_eq!(data.as_bytes()[0], 0x08);
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WireWriter {
    buf: Vec<u8>,
}

impl WireWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tag(&mut self, field: u32, wire_type: WireType) -> &mut Self {
        encode_varint((u64::from(field) << 3) | wire_type as u64, &mut self.buf);
        self
    }

    pub fn varint(&mut self, field: u32, value: u64) -> &mut Self {
        self.tag(field, WireType::Varint);
        encode_varint(value, &mut self.buf);
        self
    }

    /// `int32` encoding: negative values are sign-extended to ten bytes.
    pub fn int32(&mut self, field: u32, value: i32) -> &mut Self {
        self.varint(field, i64::from(value) as u64)
    }

    pub fn bool(&mut self, field: u32, value: bool) -> &mut Self {
        self.varint(field, u64::from(value))
    }

    pub fn fixed32(&mut self, field: u32, value: u32) -> &mut Self {
        self.tag(field, WireType::Fixed32);
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn sfixed32(&mut self, field: u32, value: i32) -> &mut Self {
        self.fixed32(field, value as u32)
    }

    pub fn float(&mut self, field: u32, value: f32) -> &mut Self {
        self.fixed32(field, value.to_bits())
    }

    pub fn fixed64(&mut self, field: u32, value: u64) -> &mut Self {
        self.tag(field, WireType::Fixed64);
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn bytes(&mut self, field: u32, value: &[u8]) -> &mut Self {
        self.tag(field, WireType::LengthDelimited);
        encode_varint(value.len() as u64, &mut self.buf);
        self.buf.extend_from_slice(value);
        self
    }

    pub fn string(&mut self, field: u32, value: &str) -> &mut Self {
        self.bytes(field, value.as_bytes())
    }

    /// Write a nested message built by `build`.
    pub fn message(&mut self, field: u32, build: impl FnOnce(&mut WireWriter)) -> &mut Self {
        let mut nested = WireWriter::new();
        build(&mut nested);
        self.bytes(field, &nested.buf)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}
