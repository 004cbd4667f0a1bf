//! # NKMS KeyStore Core
//!
//! Pure primitives for the NKMS keystore: key fingerprints, hashed resource
//! access codes, typed public keys and signatures, and the kfrag codec.
//!
//! This crate contains no I/O and no storage. The re-encryption cryptography
//! itself is opaque here; keys, signatures and fragments are fixed-length byte
//! values with documented encodings.
//!
//! ## Key Types
//!
//! - [`Fingerprint`] - Content-addressed key identifier (Blake3 of key bytes)
//! - [`Hrac`] - Hashed Resource Access Code, the identity of a policy
//! - [`PublicKey`] - Tagged signing/encrypting public key
//! - [`KFrag`] - Re-encryption key fragment of fixed length
//! - [`Principal`] - Anything exposing an identity stamp
//!
//! ## Fragment codec
//!
//! A signed kfrag travels as `signature || kfrag`. See [`kfrag::split`] and
//! [`kfrag::compose`].

pub mod crypto;
pub mod error;
pub mod kfrag;
pub mod types;

pub use crypto::{
    Ed25519PublicKey, Ed25519Signature, Principal, PublicKey, SigningKeypair, X25519PublicKey,
};
pub use error::{CoreError, Result};
pub use kfrag::{compose, split, KFrag, KFRAG_LENGTH, SIGNATURE_LENGTH, SIGNED_KFRAG_LENGTH};
pub use types::{Fingerprint, Hrac};
