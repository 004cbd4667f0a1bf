//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use rand::RngCore;
use x25519_dalek::{PublicKey as DalekPublicKey, StaticSecret};

use nkms_keystore::{KeyStore, NewPolicyContract, PolicyContract, Store, StoreConfig, Workorder};
use nkms_keystore_core::{
    Ed25519PublicKey, Hrac, KFrag, PublicKey, SigningKeypair, X25519PublicKey, KFRAG_LENGTH,
};

/// Policy expiration used by fixtures (Unix ms, far future).
pub const FIXTURE_EXPIRATION: i64 = 4_102_444_800_000;

/// A keystore with a delegator (alice) and a requester (bob).
pub struct TestFixture {
    pub alice: SigningKeypair,
    pub bob: SigningKeypair,
    pub keystore: KeyStore,
}

impl TestFixture {
    /// Create a new fixture with random keypairs and an in-memory keystore.
    pub fn new() -> Self {
        Self::with_keystore(
            SigningKeypair::generate(),
            SigningKeypair::generate(),
            KeyStore::open_memory().expect("in-memory keystore"),
        )
    }

    /// Create with deterministic keypairs from a seed.
    pub fn with_seed(seed: [u8; 32]) -> Self {
        let mut bob_seed = seed;
        bob_seed[31] ^= 0xff;
        Self::with_keystore(
            SigningKeypair::from_seed(&seed),
            SigningKeypair::from_seed(&bob_seed),
            KeyStore::open_memory().expect("in-memory keystore"),
        )
    }

    /// Create with random keypairs over the given configuration.
    pub fn with_config(config: &StoreConfig) -> Self {
        Self::with_keystore(
            SigningKeypair::generate(),
            SigningKeypair::generate(),
            KeyStore::open(config).expect("configured keystore"),
        )
    }

    fn with_keystore(alice: SigningKeypair, bob: SigningKeypair, keystore: KeyStore) -> Self {
        Self {
            alice,
            bob,
            keystore,
        }
    }

    pub fn alice_key(&self) -> Ed25519PublicKey {
        self.alice.public_key()
    }

    pub fn bob_key(&self) -> Ed25519PublicKey {
        self.bob.public_key()
    }

    /// The HRAC for alice granting `label` to bob.
    pub fn hrac(&self, label: &[u8]) -> Hrac {
        Hrac::derive(&self.alice.public_key(), &self.bob.public_key(), label)
    }

    /// Store an unsigned policy from alice.
    pub fn make_policy(&mut self, hrac: impl Into<Hrac>, deposit: u128) -> PolicyContract {
        let terms = NewPolicyContract::new(hrac, FIXTURE_EXPIRATION, deposit, self.alice_key());
        self.keystore
            .add_policy_contract(terms)
            .expect("store policy contract")
    }

    /// Store a policy from alice with her signature over the terms.
    pub fn make_signed_policy(&mut self, hrac: impl Into<Hrac>, deposit: u128) -> PolicyContract {
        let terms = NewPolicyContract::new(hrac, FIXTURE_EXPIRATION, deposit, self.alice_key());
        let signature = self.alice.sign(&terms.terms());
        self.keystore
            .add_policy_contract(terms.alice_signature(signature))
            .expect("store signed policy contract")
    }

    /// Store a workorder from bob, signing `request`.
    pub fn make_workorder(&mut self, hrac: &Hrac, request: &[u8]) -> Workorder {
        let signature = self.bob.sign(request);
        self.keystore
            .add_workorder(&self.bob.public_key(), &signature, hrac)
            .expect("store workorder")
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Create multiple fixtures with distinct deterministic identities.
pub fn multi_party_fixtures(count: usize) -> Vec<TestFixture> {
    (0..count)
        .map(|i| {
            let mut seed = [0u8; 32];
            seed[0] = i as u8;
            TestFixture::with_seed(seed)
        })
        .collect()
}

/// A random X25519 encrypting key.
pub fn encrypting_key() -> PublicKey {
    let mut seed = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut seed);
    let secret = StaticSecret::from(seed);
    PublicKey::Encrypting(X25519PublicKey::from_bytes(
        DalekPublicKey::from(&secret).to_bytes(),
    ))
}

/// A random kfrag of the correct length.
pub fn random_kfrag() -> KFrag {
    let mut bytes = [0u8; KFRAG_LENGTH];
    rand::thread_rng().fill_bytes(&mut bytes);
    KFrag::from_bytes(&bytes).expect("kfrag of KFRAG_LENGTH bytes")
}
