//! KeyStore: the facade with a session bound at construction.
//!
//! The bound session is a single-owner resource. Every operation takes
//! `&mut self`, so sharing a `KeyStore` between threads needs an external
//! lock. Concurrent callers should open their own [`Session`] instead.

use nkms_keystore_core::{
    Ed25519PublicKey, Ed25519Signature, Fingerprint, Hrac, KFrag, Principal, PublicKey,
};

use crate::config::StoreConfig;
use crate::engine::Engine;
use crate::error::Result;
use crate::models::{Key, NewPolicyContract, PolicyContract, Workorder};
use crate::session::Session;
use crate::traits::Store;

/// Durable storage for keys, policy contracts and workorders.
pub struct KeyStore {
    engine: Engine,
    session: Session,
}

impl KeyStore {
    /// Create a keystore over `engine`, binding its default session.
    pub fn new(engine: Engine) -> Result<Self> {
        let session = engine.open_session()?;
        Ok(Self { engine, session })
    }

    /// Build the engine from configuration and bind a keystore to it.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        Self::new(Engine::from_config(config)?)
    }

    /// A keystore over a fresh in-memory database.
    pub fn open_memory() -> Result<Self> {
        Self::new(Engine::open_memory()?)
    }

    /// The engine this keystore was built on.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Open an independent session on the same database.
    pub fn open_session(&self) -> Result<Session> {
        self.engine.open_session()
    }

    /// The bound default session.
    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }
}

impl std::fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyStore({:?})", self.engine)
    }
}

impl Store for KeyStore {
    fn add_key(&mut self, key: &PublicKey) -> Result<Key> {
        self.session.add_key(key)
    }

    fn get_key(&mut self, fingerprint: &Fingerprint) -> Result<PublicKey> {
        self.session.get_key(fingerprint)
    }

    fn get_key_record(&mut self, fingerprint: &Fingerprint) -> Result<Key> {
        self.session.get_key_record(fingerprint)
    }

    fn del_key(&mut self, fingerprint: &Fingerprint) -> Result<()> {
        self.session.del_key(fingerprint)
    }

    fn add_policy_contract(&mut self, contract: NewPolicyContract) -> Result<PolicyContract> {
        self.session.add_policy_contract(contract)
    }

    fn get_policy_contract(&mut self, hrac: &Hrac) -> Result<PolicyContract> {
        self.session.get_policy_contract(hrac)
    }

    fn del_policy_contract(&mut self, hrac: &Hrac) -> Result<()> {
        self.session.del_policy_contract(hrac)
    }

    fn attach_kfrag_to_saved_contract(
        &mut self,
        alice: &dyn Principal,
        hrac: &Hrac,
        kfrag: &KFrag,
    ) -> Result<()> {
        self.session.attach_kfrag_to_saved_contract(alice, hrac, kfrag)
    }

    fn add_workorder(
        &mut self,
        bob_pubkey_sig: &Ed25519PublicKey,
        bob_signature: &Ed25519Signature,
        hrac: &Hrac,
    ) -> Result<Workorder> {
        self.session.add_workorder(bob_pubkey_sig, bob_signature, hrac)
    }

    fn get_workorders(&mut self, hrac: &Hrac) -> Result<Vec<Workorder>> {
        self.session.get_workorders(hrac)
    }

    fn del_workorders(&mut self, hrac: &Hrac) -> Result<usize> {
        self.session.del_workorders(hrac)
    }
}
