//! Re-encryption key fragments and the signed-kfrag codec.
//!
//! A delegator hands a proxy its fragment as a single blob:
//!
//! ```text
//! +----------------------+-------------------------------+
//! | signature (64 bytes) | kfrag (KFRAG_LENGTH bytes)    |
//! +----------------------+-------------------------------+
//! ```
//!
//! Both parts are fixed length, so the total length is fixed too and is
//! checked before anything is decoded.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::Ed25519Signature;
use crate::error::{CoreError, Result};

/// Serialized length of a key fragment.
pub const KFRAG_LENGTH: usize = 194;

/// Serialized length of the signature preceding a fragment.
pub const SIGNATURE_LENGTH: usize = 64;

/// Total length of a signed fragment blob.
pub const SIGNED_KFRAG_LENGTH: usize = SIGNATURE_LENGTH + KFRAG_LENGTH;

/// An opaque re-encryption key fragment of fixed length.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct KFrag(Box<[u8; KFRAG_LENGTH]>);

impl KFrag {
    /// Decode a fragment, checking the length.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; KFRAG_LENGTH] =
            bytes
                .try_into()
                .map_err(|_| CoreError::MalformedEncoding {
                    what: "kfrag",
                    expected: KFRAG_LENGTH,
                    actual: bytes.len(),
                })?;
        Ok(Self(Box::new(arr)))
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; KFRAG_LENGTH] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0.as_slice())
    }
}

impl fmt::Debug for KFrag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KFrag({}...)", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for KFrag {
    fn as_ref(&self) -> &[u8] {
        self.0.as_slice()
    }
}

impl TryFrom<Vec<u8>> for KFrag {
    type Error = CoreError;

    fn try_from(bytes: Vec<u8>) -> Result<Self> {
        Self::from_bytes(&bytes)
    }
}

impl From<KFrag> for Vec<u8> {
    fn from(kfrag: KFrag) -> Self {
        kfrag.0.to_vec()
    }
}

/// Split a signed fragment blob into its signature and fragment.
///
/// Fails with [`CoreError::MalformedEncoding`] unless the blob is exactly
/// [`SIGNED_KFRAG_LENGTH`] bytes.
pub fn split(bytes: &[u8]) -> Result<(Ed25519Signature, KFrag)> {
    if bytes.len() != SIGNED_KFRAG_LENGTH {
        return Err(CoreError::MalformedEncoding {
            what: "signed kfrag",
            expected: SIGNED_KFRAG_LENGTH,
            actual: bytes.len(),
        });
    }

    let (sig_bytes, kfrag_bytes) = bytes.split_at(SIGNATURE_LENGTH);
    let signature = Ed25519Signature::from_slice(sig_bytes)?;
    let kfrag = KFrag::from_bytes(kfrag_bytes)?;
    Ok((signature, kfrag))
}

/// Compose a signed fragment blob. Inverse of [`split`].
pub fn compose(signature: &Ed25519Signature, kfrag: &KFrag) -> Vec<u8> {
    let mut out = Vec::with_capacity(SIGNED_KFRAG_LENGTH);
    out.extend_from_slice(signature.as_bytes());
    out.extend_from_slice(kfrag.as_bytes());
    out
}
