//! Error types for the keystore.

use nkms_keystore_core::CoreError;
use thiserror::Error;

/// Errors that can occur during keystore operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite, including constraint violations.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Lookup by fingerprint or HRAC matched no rows.
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller's identity does not match the delegator on record.
    ///
    /// This is a security signal, not a miss. Do not retry it.
    #[error("suspicious activity: delegator mismatch on policy {hrac}")]
    SuspiciousActivity { hrac: String },

    /// Stored bytes failed to decode.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    pub fn is_suspicious(&self) -> bool {
        matches!(self, StoreError::SuspiciousActivity { .. })
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
