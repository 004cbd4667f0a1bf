//! Store trait: the keystore operations, independent of who owns the session.
//!
//! [`Session`](crate::Session) implements these against its own connection.
//! [`KeyStore`](crate::KeyStore) implements them by delegating to the session
//! it bound at construction. Code that only needs the operations can be
//! generic over either.

use nkms_keystore_core::{
    Ed25519PublicKey, Ed25519Signature, Fingerprint, Hrac, KFrag, Principal, PublicKey,
};

use crate::error::Result;
use crate::models::{Key, NewPolicyContract, PolicyContract, Workorder};

/// Create/read/delete over keys, policy contracts and workorders.
///
/// Every mutating method commits its own transaction before returning.
/// There is no span covering several calls.
pub trait Store {
    // ─────────────────────────────────────────────────────────────────────────
    // Keys
    // ─────────────────────────────────────────────────────────────────────────

    /// Store a public key, keyed by its fingerprint.
    ///
    /// Storing the same key bytes again returns the existing row.
    fn add_key(&mut self, key: &PublicKey) -> Result<Key>;

    /// Get a public key by fingerprint.
    ///
    /// Fails with `NotFound` if no key has that fingerprint.
    fn get_key(&mut self, fingerprint: &Fingerprint) -> Result<PublicKey>;

    /// Get the stored key row by fingerprint.
    fn get_key_record(&mut self, fingerprint: &Fingerprint) -> Result<Key>;

    /// Delete a key by fingerprint. Deleting an absent key is a no-op.
    fn del_key(&mut self, fingerprint: &Fingerprint) -> Result<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // Policy contracts
    // ─────────────────────────────────────────────────────────────────────────

    /// Store a policy contract, resolving or creating the delegator's key.
    fn add_policy_contract(&mut self, contract: NewPolicyContract) -> Result<PolicyContract>;

    /// Get a policy contract by HRAC.
    fn get_policy_contract(&mut self, hrac: &Hrac) -> Result<PolicyContract>;

    /// Delete a policy contract by HRAC.
    fn del_policy_contract(&mut self, hrac: &Hrac) -> Result<()>;

    /// Attach a kfrag to a stored contract on behalf of `alice`.
    ///
    /// Fails with `SuspiciousActivity`, leaving the contract untouched, unless
    /// `alice`'s stamp is the delegator key on record.
    fn attach_kfrag_to_saved_contract(
        &mut self,
        alice: &dyn Principal,
        hrac: &Hrac,
        kfrag: &KFrag,
    ) -> Result<()>;

    /// Decode a `signature || kfrag` blob and attach the fragment.
    ///
    /// Returns the signature that travelled with the fragment.
    fn attach_signed_kfrag(
        &mut self,
        alice: &dyn Principal,
        hrac: &Hrac,
        signed_kfrag: &[u8],
    ) -> Result<Ed25519Signature> {
        let (signature, kfrag) = nkms_keystore_core::split(signed_kfrag)?;
        self.attach_kfrag_to_saved_contract(alice, hrac, &kfrag)?;
        Ok(signature)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Workorders
    // ─────────────────────────────────────────────────────────────────────────

    /// Record a workorder, resolving or creating the requester's key.
    fn add_workorder(
        &mut self,
        bob_pubkey_sig: &Ed25519PublicKey,
        bob_signature: &Ed25519Signature,
        hrac: &Hrac,
    ) -> Result<Workorder>;

    /// Get all workorders for a policy, oldest first.
    ///
    /// Fails with `NotFound` if there are none.
    fn get_workorders(&mut self, hrac: &Hrac) -> Result<Vec<Workorder>>;

    /// Delete all workorders for a policy, returning how many were removed.
    fn del_workorders(&mut self, hrac: &Hrac) -> Result<usize>;
}
