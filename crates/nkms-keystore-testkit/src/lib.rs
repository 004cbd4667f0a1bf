//! # NKMS KeyStore Testkit
//!
//! Testing utilities for the NKMS keystore.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: a keystore plus an "alice" delegator and a "bob" requester
//! - **Generators**: Proptest strategies for keys, fragments and contracts
//!
//! ## Test Fixtures
//!
//! ```rust
//! use nkms_keystore_testkit::fixtures::TestFixture;
//!
//! let mut fixture = TestFixture::new();
//! let contract = fixture.make_policy(b"H1", 100);
//! assert!(contract.kfrag.is_none());
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use nkms_keystore_testkit::generators::ContractParams;
//!
//! proptest! {
//!     #[test]
//!     fn contract_roundtrips(params: ContractParams) {
//!         // ...
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{encrypting_key, multi_party_fixtures, random_kfrag, TestFixture};
pub use generators::ContractParams;
