//! Identifier types for the NKMS keystore.
//!
//! All identifiers are newtypes to prevent mixing a key fingerprint with a
//! policy HRAC at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::Ed25519PublicKey;

/// A 32-byte key fingerprint, computed as Blake3(key_data).
///
/// This is the content-address of a public key. Two keys with the same
/// serialized bytes have the same fingerprint and are the same logical key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint(pub [u8; 32]);

impl Fingerprint {
    /// Fingerprint the given serialized key bytes.
    pub fn of(key_data: &[u8]) -> Self {
        Self(*blake3::hash(key_data).as_bytes())
    }

    /// Create a Fingerprint from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for Fingerprint {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for Fingerprint {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for Fingerprint {
    type Error = std::array::TryFromSliceError;

    fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; 32] = slice.try_into()?;
        Ok(Self(arr))
    }
}

/// Domain separator for HRAC derivation.
const HRAC_DOMAIN: &str = "nkms.hrac.v1";

/// Hashed Resource Access Code: the identity of a policy contract.
///
/// Binds a delegator, a delegatee and a resource label. Canonical HRACs are
/// 32 bytes (see [`Hrac::derive`]), but the store treats them as opaque bytes
/// so externally produced codes of other lengths round-trip unchanged.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Hrac(Vec<u8>);

impl Hrac {
    /// Wrap externally supplied HRAC bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Derive the HRAC for `alice` delegating `label` to `bob`.
    pub fn derive(alice: &Ed25519PublicKey, bob: &Ed25519PublicKey, label: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new_derive_key(HRAC_DOMAIN);
        hasher.update(alice.as_bytes());
        hasher.update(bob.as_bytes());
        hasher.update(label);
        Self(hasher.finalize().as_bytes().to_vec())
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// An empty HRAC names no contract; the store refuses it.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        hex::decode(s).map(Self)
    }
}

impl fmt::Debug for Hrac {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hrac({})", self)
    }
}

impl fmt::Display for Hrac {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        write!(f, "{}", &hex[..hex.len().min(16)])
    }
}

impl AsRef<[u8]> for Hrac {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<&[u8]> for Hrac {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl<const N: usize> From<&[u8; N]> for Hrac {
    fn from(bytes: &[u8; N]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<Vec<u8>> for Hrac {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}
