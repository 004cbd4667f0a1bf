//! Error types for the NKMS keystore core.

use thiserror::Error;

/// Core errors raised by key, signature and fragment decoding.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidPublicKey,

    /// A fixed-length encoding had the wrong number of bytes.
    #[error("malformed {what}: expected {expected} bytes, got {actual}")]
    MalformedEncoding {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
