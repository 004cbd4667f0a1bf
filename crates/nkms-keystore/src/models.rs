//! Row models for keys, policy contracts and workorders.
//!
//! Records are owned values. Nothing here holds a connection, so a record can
//! outlive the session that loaded it without keeping that session busy.

use rusqlite::types::Type;
use rusqlite::Row;

use nkms_keystore_core::{
    Ed25519PublicKey, Ed25519Signature, Fingerprint, Hrac, KFrag, PublicKey,
};

use crate::error::{Result, StoreError};

/// Key columns, aliased so the same mapper works on joined queries.
pub(crate) const KEY_COLUMNS: &str = "k.id AS key_id, k.fingerprint AS key_fingerprint, \
     k.key_data AS key_data, k.is_signing AS key_is_signing, k.created_at AS key_created_at";

/// A stored public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key {
    /// Row id, the join key used by contracts and workorders.
    pub id: i64,
    pub fingerprint: Fingerprint,
    pub key_data: Vec<u8>,
    pub is_signing: bool,
    /// When the key was first stored (Unix ms).
    pub created_at: i64,
}

impl Key {
    /// Deserialize into the tagged public key.
    pub fn public_key(&self) -> Result<PublicKey> {
        Ok(PublicKey::from_bytes(&self.key_data, self.is_signing)?)
    }

    /// The key as a signing key, failing for encrypting keys.
    pub fn signing_key(&self) -> Result<Ed25519PublicKey> {
        self.public_key()?.as_signing().copied().ok_or_else(|| {
            StoreError::InvalidData(format!("key {} is not a signing key", self.fingerprint))
        })
    }
}

/// Terms of a new policy contract, before it is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPolicyContract {
    /// Unix ms.
    pub expiration: i64,
    pub deposit: u128,
    pub hrac: Hrac,
    pub kfrag: Option<KFrag>,
    pub alice_pubkey_sig: Ed25519PublicKey,
    pub alice_signature: Option<Ed25519Signature>,
}

impl NewPolicyContract {
    /// Create terms with no kfrag and no delegator signature.
    pub fn new(
        hrac: impl Into<Hrac>,
        expiration: i64,
        deposit: u128,
        alice_pubkey_sig: Ed25519PublicKey,
    ) -> Self {
        Self {
            expiration,
            deposit,
            hrac: hrac.into(),
            kfrag: None,
            alice_pubkey_sig,
            alice_signature: None,
        }
    }

    pub fn kfrag(mut self, kfrag: KFrag) -> Self {
        self.kfrag = Some(kfrag);
        self
    }

    pub fn alice_signature(mut self, signature: Ed25519Signature) -> Self {
        self.alice_signature = Some(signature);
        self
    }

    /// The bytes a delegator signs to endorse these terms.
    pub fn terms(&self) -> Vec<u8> {
        contract_terms(&self.hrac, self.expiration, self.deposit)
    }
}

/// A stored policy contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyContract {
    pub id: i64,
    pub hrac: Hrac,
    /// Unix ms.
    pub expiration: i64,
    pub deposit: u128,
    pub kfrag: Option<KFrag>,
    /// The delegator's signing key.
    pub alice_pubkey_sig: Key,
    pub alice_signature: Option<Ed25519Signature>,
    pub created_at: i64,
}

impl PolicyContract {
    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.expiration
    }

    /// The bytes the delegator signs to endorse this contract.
    pub fn terms(&self) -> Vec<u8> {
        contract_terms(&self.hrac, self.expiration, self.deposit)
    }

    /// Check the stored delegator signature over the contract terms.
    ///
    /// A contract stored without a signature fails verification.
    pub fn verify_alice_signature(&self) -> Result<()> {
        let signature = self
            .alice_signature
            .as_ref()
            .ok_or_else(|| StoreError::InvalidData(format!("policy {} is unsigned", self.hrac)))?;
        self.alice_pubkey_sig
            .signing_key()?
            .verify(&self.terms(), signature)?;
        Ok(())
    }
}

/// A stored service request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workorder {
    pub id: i64,
    /// The requester's signing key.
    pub bob_pubkey_sig: Key,
    pub bob_signature: Ed25519Signature,
    pub hrac: Hrac,
    pub created_at: i64,
}

impl Workorder {
    /// Check `bob_signature` over `message` against the requester's key.
    pub fn verify(&self, message: &[u8]) -> Result<()> {
        self.bob_pubkey_sig
            .signing_key()?
            .verify(message, &self.bob_signature)?;
        Ok(())
    }
}

/// `hrac || expiration (i64 BE) || deposit (u128 BE)`
fn contract_terms(hrac: &Hrac, expiration: i64, deposit: u128) -> Vec<u8> {
    let mut out = Vec::with_capacity(hrac.as_bytes().len() + 8 + 16);
    out.extend_from_slice(hrac.as_bytes());
    out.extend_from_slice(&expiration.to_be_bytes());
    out.extend_from_slice(&deposit.to_be_bytes());
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Row mapping
// ─────────────────────────────────────────────────────────────────────────────

fn blob_array<const N: usize>(row: &Row<'_>, column: &str) -> rusqlite::Result<[u8; N]> {
    let bytes: Vec<u8> = row.get(column)?;
    bytes.try_into().map_err(|_| {
        rusqlite::Error::InvalidColumnType(0, column.into(), Type::Blob)
    })
}

fn optional_blob_array<const N: usize>(
    row: &Row<'_>,
    column: &str,
) -> rusqlite::Result<Option<[u8; N]>> {
    let bytes: Option<Vec<u8>> = row.get(column)?;
    bytes
        .map(|b| {
            b.try_into()
                .map_err(|_| rusqlite::Error::InvalidColumnType(0, column.into(), Type::Blob))
        })
        .transpose()
}

pub(crate) fn row_to_key(row: &Row<'_>) -> rusqlite::Result<Key> {
    Ok(Key {
        id: row.get("key_id")?,
        fingerprint: Fingerprint::from_bytes(blob_array(row, "key_fingerprint")?),
        key_data: row.get("key_data")?,
        is_signing: row.get("key_is_signing")?,
        created_at: row.get("key_created_at")?,
    })
}

pub(crate) fn row_to_policy_contract(row: &Row<'_>) -> rusqlite::Result<PolicyContract> {
    let hrac: Vec<u8> = row.get("hrac")?;
    let kfrag: Option<Vec<u8>> = row.get("kfrag")?;
    let kfrag = kfrag
        .map(|b| KFrag::from_bytes(&b))
        .transpose()
        .map_err(|_| rusqlite::Error::InvalidColumnType(0, "kfrag".into(), Type::Blob))?;

    Ok(PolicyContract {
        id: row.get("id")?,
        hrac: Hrac::new(hrac),
        expiration: row.get("expiration")?,
        deposit: u128::from_be_bytes(blob_array(row, "deposit")?),
        kfrag,
        alice_pubkey_sig: row_to_key(row)?,
        alice_signature: optional_blob_array(row, "alice_signature")?
            .map(Ed25519Signature::from_bytes),
        created_at: row.get("created_at")?,
    })
}

pub(crate) fn row_to_workorder(row: &Row<'_>) -> rusqlite::Result<Workorder> {
    let hrac: Vec<u8> = row.get("hrac")?;

    Ok(Workorder {
        id: row.get("id")?,
        bob_pubkey_sig: row_to_key(row)?,
        bob_signature: Ed25519Signature::from_bytes(blob_array(row, "bob_signature")?),
        hrac: Hrac::new(hrac),
        created_at: row.get("created_at")?,
    })
}

/// Get current time in milliseconds.
pub(crate) fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
