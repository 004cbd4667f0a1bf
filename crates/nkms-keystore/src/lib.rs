//! # NKMS KeyStore
//!
//! Durable storage for the state of a proxy re-encryption access-control
//! scheme: public keys, delegation policies (policy contracts) and service
//! workorders, kept in SQLite.
//!
//! ## Overview
//!
//! - [`Engine`] - A configured database that hands out sessions
//! - [`Session`] - One unit of work; every operation runs in its own transaction
//! - [`KeyStore`] - Facade with a session bound at construction
//! - [`Store`] - The operations, implemented by both of the above
//!
//! ## Usage
//!
//! ```rust,no_run
//! use nkms_keystore::{KeyStore, NewPolicyContract, StoreConfig, Store};
//! use nkms_keystore::core::{Hrac, KFrag, SigningKeypair, KFRAG_LENGTH};
//!
//! fn example() -> nkms_keystore::Result<()> {
//!     let mut keystore = KeyStore::open(&StoreConfig::file("keystore.db"))?;
//!
//!     let alice = SigningKeypair::generate();
//!     let hrac = Hrac::from(b"H1");
//!     keystore.add_policy_contract(NewPolicyContract::new(
//!         hrac.clone(),
//!         1_900_000_000_000,
//!         100,
//!         alice.public_key(),
//!     ))?;
//!
//!     let kfrag = KFrag::from_bytes(&[0u8; KFRAG_LENGTH])?;
//!     keystore.attach_kfrag_to_saved_contract(&alice, &hrac, &kfrag)?;
//!
//!     // Another thread gets its own session.
//!     let mut session = keystore.open_session()?;
//!     let contract = session.get_policy_contract(&hrac)?;
//!     assert_eq!(contract.kfrag, Some(kfrag));
//!     Ok(())
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Content-addressed keys**: `add_key` is an upsert by fingerprint
//! - **Integrity gate**: attaching a kfrag checks the caller's stamp against
//!   the delegator on record and fails with `SuspiciousActivity` otherwise
//! - **No caching**: every read queries the database

pub mod config;
pub mod engine;
pub mod error;
pub mod keystore;
pub mod migration;
pub mod models;
pub mod session;
pub mod traits;

pub use nkms_keystore_core as core;

pub use config::StoreConfig;
pub use engine::Engine;
pub use error::{Result, StoreError};
pub use keystore::KeyStore;
pub use models::{Key, NewPolicyContract, PolicyContract, Workorder};
pub use session::Session;
pub use traits::Store;
