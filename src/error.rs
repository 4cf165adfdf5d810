//! Error types for mesh packet ingestion.
//!
//! Two layers of failure exist in this crate:
//!
//! - [`DecodeFailure`] describes why a wire-level walk stopped. It never
//!   escapes as a hard error from the decoders; interpreters attach it to a
//!   [`Decoded::Partial`](crate::wire::Decoded) result instead.
//! - [`MeshError`] covers everything that is allowed to fail outright:
//!   transports, configuration, I/O and frame encoding.
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use meshtap::MeshError;
//!
//! let error = MeshError::transport_failed("serial port vanished");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for mesh ingestion operations.
pub type Result<T, E = MeshError> = std::result::Result<T, E>;

/// Reason a wire-level decode walk stopped early.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeFailure {
    #[error("input truncated at offset {offset}: needed {needed} bytes, {available} available")]
    Truncated { offset: usize, needed: usize, available: usize },

    #[error("varint at offset {offset} exceeds 10 groups")]
    VarintTooLong { offset: usize },

    #[error("unsupported wire type {wire_type} at offset {offset}")]
    InvalidWireType { offset: usize, wire_type: u8 },

    #[error("field number 0 at offset {offset}")]
    InvalidFieldNumber { offset: usize },
}

impl DecodeFailure {
    /// Byte offset where the failing element started.
    pub fn offset(&self) -> usize {
        match *self {
            DecodeFailure::Truncated { offset, .. }
            | DecodeFailure::VarintTooLong { offset }
            | DecodeFailure::InvalidWireType { offset, .. }
            | DecodeFailure::InvalidFieldNumber { offset } => offset,
        }
    }
}

/// Main error type for ingestion operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum MeshError {
    #[error("Transport failure: {reason}")]
    Transport {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Transport is not connected")]
    NotConnected,

    #[error("I/O error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error in {path:?}: {details}")]
    Config { path: Option<PathBuf>, details: String },

    #[error("Decode error in {context}")]
    Decode {
        context: String,
        #[source]
        source: DecodeFailure,
    },

    #[error("Frame of {length} bytes exceeds maximum {max}")]
    FrameTooLarge { length: usize, max: usize },

    #[error("JSON error")]
    Json(#[from] serde_json::Error),
}

impl MeshError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            MeshError::Transport { .. } => true,
            MeshError::NotConnected => true,
            MeshError::Io { .. } => true,
            MeshError::Config { .. } => false,
            MeshError::Decode { .. } => false,
            MeshError::FrameTooLarge { .. } => false,
            MeshError::Json(_) => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            MeshError::Transport { .. } => vec![
                "Check the device is powered and in range",
                "Verify the serial port or host address",
                "Reconnect the transport",
            ],
            MeshError::NotConnected => {
                vec!["Call connect() before listening", "Check the transport was not closed"]
            }
            MeshError::Io { .. } => vec![
                "Check the device node or socket still exists",
                "Verify read and write permissions",
            ],
            MeshError::Config { .. } => vec![
                "Check the YAML syntax",
                "Compare field names against PipelineConfig",
                "Remove values outside their valid range",
            ],
            MeshError::Decode { .. } => vec![
                "Capture the raw bytes for inspection",
                "Check the firmware protocol version",
            ],
            MeshError::FrameTooLarge { .. } => vec!["Split the payload below the frame limit"],
            MeshError::Json(_) => vec![
                "Check the status endpoint returns a device_status document",
                "Verify the device_info object is present",
            ],
        }
    }

    /// Helper constructor for transport failures.
    pub fn transport_failed(reason: impl Into<String>) -> Self {
        MeshError::Transport { reason: reason.into(), source: None }
    }

    /// Helper constructor for transport failures with source.
    pub fn transport_failed_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        MeshError::Transport { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for I/O errors with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        MeshError::Io { context: context.into(), source }
    }

    /// Helper constructor for configuration errors.
    pub fn config(path: Option<PathBuf>, details: impl Into<String>) -> Self {
        MeshError::Config { path, details: details.into() }
    }

    /// Helper constructor wrapping a wire-level failure.
    pub fn decode(context: impl Into<String>, source: DecodeFailure) -> Self {
        MeshError::Decode { context: context.into(), source }
    }
}

impl From<std::io::Error> for MeshError {
    fn from(err: std::io::Error) -> Self {
        MeshError::Io { context: "<unknown>".to_string(), source: err }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
          #[test]
          fn error_messages_carry_their_context(
            reason in ".*",
            details in ".*",
            offset in 0usize..0x10000usize,
            length in 513usize..70000usize
          ) {
            let transport = MeshError::transport_failed(reason.clone());
            prop_assert!(transport.to_string().contains(&reason));

            let config = MeshError::config(None, details.clone());
            prop_assert!(config.to_string().contains(&details));

            let decode = MeshError::decode("envelope", DecodeFailure::VarintTooLong { offset });
            prop_assert!(decode.to_string().contains("envelope"));

            let frame = MeshError::FrameTooLarge { length, max: 512 };
            prop_assert!(frame.to_string().contains(&length.to_string()));
          }

          #[test]
          fn decode_failure_reports_its_offset(offset in 0usize..0x10000usize, wire_type in 0u8..8u8) {
            let failures = [
              DecodeFailure::Truncated { offset, needed: 4, available: 1 },
              DecodeFailure::VarintTooLong { offset },
              DecodeFailure::InvalidWireType { offset, wire_type },
              DecodeFailure::InvalidFieldNumber { offset },
            ];
            for failure in failures {
              prop_assert_eq!(failure.offset(), offset);
              prop_assert!(failure.to_string().contains(&offset.to_string()));
            }
          }
        }
    }

    #[test]
    fn error_traits_validation() {
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<MeshError>();
        assert_send_sync_static::<DecodeFailure>();

        let error = MeshError::transport_failed("test");
        let _: &dyn std::error::Error = &error;
    }

    #[test]
    fn decode_error_chains_to_failure() {
        let failure = DecodeFailure::Truncated { offset: 3, needed: 4, available: 2 };
        let error = MeshError::decode("mesh packet", failure);
        let source = std::error::Error::source(&error).expect("decode error has a source");
        assert_eq!(source.to_string(), failure.to_string());
    }

    #[test]
    fn recovery_methods_work() {
        let transport = MeshError::transport_failed("gone");
        let config = MeshError::config(Some(PathBuf::from("meshtap.yaml")), "bad capacity");

        assert!(transport.is_retryable());
        assert!(MeshError::NotConnected.is_retryable());
        assert!(!config.is_retryable());
        assert!(!MeshError::decode("user", DecodeFailure::InvalidFieldNumber { offset: 0 }).is_retryable());

        for suggestion in transport.recovery_suggestions() {
            assert!(suggestion.len() > 5);
        }
        assert!(!config.recovery_suggestions().is_empty());
    }

    #[test]
    fn from_conversions_work() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        match MeshError::from(io_err) {
            MeshError::Io { source, .. } => assert_eq!(source.to_string(), "pipe closed"),
            other => panic!("Expected Io error variant, got {other:?}"),
        }

        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(matches!(MeshError::from(json_err), MeshError::Json(_)));
    }
}
