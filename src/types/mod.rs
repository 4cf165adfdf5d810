//! Core types for classified mesh traffic.
//!
//! - [`Packet`] is the normalized record produced for each inbound chunk
//! - [`PacketType`] is its semantic category
//! - [`DecodedData`] is the interpreted payload, a closed set matched exhaustively
//! - [`TextData`] carries text payloads with optional console categorization
//!
//! ## Usage Example
//!
//! ```rust
//! use meshtap::types::{DecodedData, Packet, PacketType, TextData};
//!
//! let packet = Packet::new(PacketType::Text, b"hello".to_vec())
//!     .with_decoded(DecodedData::Text(TextData::new("hello")));
//!
//! assert!(packet.is_broadcast());
//! assert_eq!(packet.type_name(), "TEXT");
//! ```

mod packet;
mod packet_type;
mod text;

pub use packet::{DecodedData, NodeIdentity, Packet, parse_node_id};
pub use packet_type::PacketType;
pub use text::{TextCategory, TextData};

pub(crate) use text::find_all_ci;
