//! Arbitrary input never panics the decoders and never splits frames wrongly.

use meshtap::frame::{FrameSynchronizer, PREAMBLE};
use meshtap::messages::{Position, RadioEnvelope, Telemetry, User};
use meshtap::resolver::{DEFAULT_PRINTABLE_THRESHOLD, infer_packet_type, printable_ratio};
use meshtap::wire::{Decoded, FieldReader, WireMessage};
use proptest::prelude::*;

proptest! {
    #[test]
    fn envelopes_tolerate_garbage(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
        match RadioEnvelope::decode(&bytes) {
            Decoded::Complete(_) => {}
            Decoded::Partial(_, failure) => prop_assert!(failure.offset() <= bytes.len()),
        }
        let _ = Position::decode(&bytes);
        let _ = Telemetry::decode(&bytes);
        let _ = User::decode(&bytes);
        prop_assert!(FieldReader::new(&bytes).count() <= bytes.len());
    }

    #[test]
    fn classification_is_total(bytes in proptest::collection::vec(any::<u8>(), 0..128)) {
        let _ = infer_packet_type(&bytes, DEFAULT_PRINTABLE_THRESHOLD);
        let ratio = printable_ratio(&bytes);
        prop_assert!((0.0..=1.0).contains(&ratio));
    }

    #[test]
    fn frames_survive_any_chunking(
        payloads in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..64), 1..8),
        split in 1usize..32,
    ) {
        let mut stream = Vec::new();
        for payload in &payloads {
            // noise that cannot start a preamble
            stream.extend_from_slice(b"log\n");
            stream.extend_from_slice(&PREAMBLE);
            stream.extend_from_slice(&(payload.len() as u16).to_be_bytes());
            stream.extend_from_slice(payload);
        }

        let mut synchronizer = FrameSynchronizer::new();
        let frames: Vec<Vec<u8>> = stream
            .chunks(split)
            .flat_map(|chunk| synchronizer.push(chunk))
            .map(|frame| frame.payload.to_vec())
            .collect();
        prop_assert_eq!(frames, payloads);
    }
}
