//! Requests sent to the radio.

use bytes::Bytes;

use crate::Result;
use crate::frame::encode_frame;
use crate::wire::WireWriter;

/// `ToRadio` field asking the device to dump its configuration and node list.
pub const WANT_CONFIG_FIELD: u32 = 3;

/// Framed request for the configuration dump tagged with `config_id`.
pub fn want_config_frame(config_id: u32) -> Result<Bytes> {
    let mut request = WireWriter::new();
    request.varint(WANT_CONFIG_FIELD, u64::from(config_id));
    encode_frame(request.as_bytes())
}
