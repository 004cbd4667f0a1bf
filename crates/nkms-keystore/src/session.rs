//! Session: one unit of work against the keystore database.
//!
//! A session owns one SQLite connection. It is `Send` but not `Sync`: hand it
//! to another thread if you like, but never share one between threads. The
//! connection closes when the session is dropped.
//!
//! Sessions of an in-memory engine share a gate and run one operation at a
//! time; each operation still gets its own transaction.

use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};

use nkms_keystore_core::{
    Ed25519PublicKey, Ed25519Signature, Fingerprint, Hrac, KFrag, Principal, PublicKey,
};

use crate::engine::Gate;
use crate::error::{Result, StoreError};
use crate::models::{
    now_millis, row_to_key, row_to_policy_contract, row_to_workorder, Key, NewPolicyContract,
    PolicyContract, Workorder, KEY_COLUMNS,
};
use crate::traits::Store;

/// A unit of work: one connection, one transaction per operation.
pub struct Session {
    conn: Connection,
    gate: Gate,
}

impl Session {
    pub(crate) fn new(conn: Connection, gate: Gate) -> Self {
        Self { conn, gate }
    }

    /// The underlying connection, for inspection and ad-hoc queries.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

}

fn begin(conn: &mut Connection) -> Result<Transaction<'_>> {
    Ok(conn.transaction_with_behavior(TransactionBehavior::Immediate)?)
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Session({:?})", self.conn.path())
    }
}

// Helpers take a plain connection so they compose inside one transaction.

fn find_key(conn: &Connection, fingerprint: &Fingerprint) -> Result<Option<Key>> {
    conn.query_row(
        &format!("SELECT {} FROM keys k WHERE k.fingerprint = ?1", KEY_COLUMNS),
        params![fingerprint.as_bytes().as_slice()],
        row_to_key,
    )
    .optional()
    .map_err(StoreError::from)
}

/// Insert the key unless its fingerprint is already stored.
fn upsert_key(conn: &Connection, key: &PublicKey) -> Result<Key> {
    let fingerprint = key.fingerprint();

    let inserted = conn.execute(
        "INSERT INTO keys (fingerprint, key_data, is_signing, created_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(fingerprint) DO NOTHING",
        params![
            fingerprint.as_bytes().as_slice(),
            key.as_bytes().as_slice(),
            key.is_signing(),
            now_millis(),
        ],
    )?;

    tracing::debug!(fingerprint = %fingerprint, inserted = inserted > 0, "resolved key");

    let stored = find_key(conn, &fingerprint)?.ok_or_else(|| {
        StoreError::InvalidData(format!("key {} vanished after insert", fingerprint))
    })?;
    if stored.is_signing != key.is_signing() {
        return Err(StoreError::InvalidData(format!(
            "key {} is already stored with is_signing = {}",
            fingerprint, stored.is_signing
        )));
    }
    Ok(stored)
}

fn find_policy_contract(conn: &Connection, hrac: &Hrac) -> Result<Option<PolicyContract>> {
    conn.query_row(
        &format!(
            "SELECT pc.id, pc.hrac, pc.expiration, pc.deposit, pc.kfrag,
                    pc.alice_signature, pc.created_at, {}
             FROM policy_contracts pc
             JOIN keys k ON k.id = pc.alice_pubkey_sig_id
             WHERE pc.hrac = ?1",
            KEY_COLUMNS
        ),
        params![hrac.as_bytes()],
        row_to_policy_contract,
    )
    .optional()
    .map_err(StoreError::from)
}

fn find_workorder(conn: &Connection, id: i64) -> Result<Workorder> {
    conn.query_row(
        &format!(
            "SELECT w.id, w.bob_signature, w.hrac, w.created_at, {}
             FROM workorders w
             JOIN keys k ON k.id = w.bob_pubkey_sig_id
             WHERE w.id = ?1",
            KEY_COLUMNS
        ),
        params![id],
        row_to_workorder,
    )
    .map_err(StoreError::from)
}

impl Store for Session {
    fn add_key(&mut self, key: &PublicKey) -> Result<Key> {
        let _gate = self.gate.enter()?;
        let tx = begin(&mut self.conn)?;
        let stored = upsert_key(&tx, key)?;
        tx.commit()?;
        Ok(stored)
    }

    fn get_key(&mut self, fingerprint: &Fingerprint) -> Result<PublicKey> {
        self.get_key_record(fingerprint)?.public_key()
    }

    fn get_key_record(&mut self, fingerprint: &Fingerprint) -> Result<Key> {
        let _gate = self.gate.enter()?;
        find_key(&self.conn, fingerprint)?.ok_or_else(|| {
            StoreError::NotFound(format!("no key with fingerprint {}", fingerprint.to_hex()))
        })
    }

    fn del_key(&mut self, fingerprint: &Fingerprint) -> Result<()> {
        let _gate = self.gate.enter()?;
        let tx = begin(&mut self.conn)?;
        let deleted = tx.execute(
            "DELETE FROM keys WHERE fingerprint = ?1",
            params![fingerprint.as_bytes().as_slice()],
        )?;
        tx.commit()?;

        tracing::debug!(fingerprint = %fingerprint, deleted, "deleted key");
        Ok(())
    }

    fn add_policy_contract(&mut self, contract: NewPolicyContract) -> Result<PolicyContract> {
        if contract.hrac.is_empty() {
            return Err(StoreError::InvalidData("empty HRAC".into()));
        }

        let _gate = self.gate.enter()?;
        let tx = begin(&mut self.conn)?;

        let alice = upsert_key(&tx, &PublicKey::Signing(contract.alice_pubkey_sig))?;

        tx.execute(
            "INSERT INTO policy_contracts (
                hrac, expiration, deposit, kfrag, alice_pubkey_sig_id,
                alice_signature, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                contract.hrac.as_bytes(),
                contract.expiration,
                contract.deposit.to_be_bytes().as_slice(),
                contract.kfrag.as_ref().map(|k| k.as_bytes().as_slice()),
                alice.id,
                contract.alice_signature.as_ref().map(|s| s.as_bytes().as_slice()),
                now_millis(),
            ],
        )?;

        let stored = find_policy_contract(&tx, &contract.hrac)?.ok_or_else(|| {
            StoreError::InvalidData(format!("policy {} vanished after insert", contract.hrac))
        })?;
        tx.commit()?;

        tracing::debug!(
            hrac = %stored.hrac,
            alice = %alice.fingerprint,
            expiration = stored.expiration,
            "stored policy contract"
        );
        Ok(stored)
    }

    fn get_policy_contract(&mut self, hrac: &Hrac) -> Result<PolicyContract> {
        let _gate = self.gate.enter()?;
        find_policy_contract(&self.conn, hrac)?.ok_or_else(|| {
            StoreError::NotFound(format!("no policy contract with HRAC {}", hrac.to_hex()))
        })
    }

    fn del_policy_contract(&mut self, hrac: &Hrac) -> Result<()> {
        let _gate = self.gate.enter()?;
        let tx = begin(&mut self.conn)?;
        let deleted = tx.execute(
            "DELETE FROM policy_contracts WHERE hrac = ?1",
            params![hrac.as_bytes()],
        )?;
        tx.commit()?;

        tracing::debug!(hrac = %hrac, deleted, "deleted policy contract");
        Ok(())
    }

    fn attach_kfrag_to_saved_contract(
        &mut self,
        alice: &dyn Principal,
        hrac: &Hrac,
        kfrag: &KFrag,
    ) -> Result<()> {
        let _gate = self.gate.enter()?;
        let tx = begin(&mut self.conn)?;

        let (contract_id, delegator): (i64, Vec<u8>) = tx
            .query_row(
                "SELECT pc.id, k.key_data
                 FROM policy_contracts pc
                 JOIN keys k ON k.id = pc.alice_pubkey_sig_id
                 WHERE pc.hrac = ?1",
                params![hrac.as_bytes()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
            .ok_or_else(|| {
                StoreError::NotFound(format!("no policy contract with HRAC {}", hrac.to_hex()))
            })?;

        let stamp = alice.stamp();
        if delegator.as_slice() != stamp.as_bytes().as_slice() {
            // Dropping the transaction rolls it back; nothing was written.
            tracing::warn!(
                hrac = %hrac,
                claimed = %stamp.to_hex(),
                "kfrag attach rejected: delegator mismatch"
            );
            return Err(StoreError::SuspiciousActivity {
                hrac: hrac.to_hex(),
            });
        }

        tx.execute(
            "UPDATE policy_contracts SET kfrag = ?1 WHERE id = ?2",
            params![kfrag.as_bytes().as_slice(), contract_id],
        )?;
        tx.commit()?;

        tracing::debug!(hrac = %hrac, "attached kfrag");
        Ok(())
    }

    fn add_workorder(
        &mut self,
        bob_pubkey_sig: &Ed25519PublicKey,
        bob_signature: &Ed25519Signature,
        hrac: &Hrac,
    ) -> Result<Workorder> {
        if hrac.is_empty() {
            return Err(StoreError::InvalidData("empty HRAC".into()));
        }

        let _gate = self.gate.enter()?;
        let tx = begin(&mut self.conn)?;

        let bob = upsert_key(&tx, &PublicKey::Signing(*bob_pubkey_sig))?;

        tx.execute(
            "INSERT INTO workorders (bob_pubkey_sig_id, bob_signature, hrac, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                bob.id,
                bob_signature.as_bytes().as_slice(),
                hrac.as_bytes(),
                now_millis(),
            ],
        )?;
        let workorder = find_workorder(&tx, tx.last_insert_rowid())?;
        tx.commit()?;

        tracing::debug!(hrac = %hrac, bob = %bob.fingerprint, "stored workorder");
        Ok(workorder)
    }

    fn get_workorders(&mut self, hrac: &Hrac) -> Result<Vec<Workorder>> {
        let _gate = self.gate.enter()?;
        let mut stmt = self.conn.prepare(&format!(
            "SELECT w.id, w.bob_signature, w.hrac, w.created_at, {}
             FROM workorders w
             JOIN keys k ON k.id = w.bob_pubkey_sig_id
             WHERE w.hrac = ?1
             ORDER BY w.id",
            KEY_COLUMNS
        ))?;

        let workorders = stmt
            .query_map(params![hrac.as_bytes()], row_to_workorder)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        if workorders.is_empty() {
            return Err(StoreError::NotFound(format!(
                "no workorders with HRAC {}",
                hrac.to_hex()
            )));
        }
        Ok(workorders)
    }

    fn del_workorders(&mut self, hrac: &Hrac) -> Result<usize> {
        let _gate = self.gate.enter()?;
        let tx = begin(&mut self.conn)?;
        let deleted = tx.execute(
            "DELETE FROM workorders WHERE hrac = ?1",
            params![hrac.as_bytes()],
        )?;
        tx.commit()?;

        tracing::debug!(hrac = %hrac, deleted, "deleted workorders");
        Ok(deleted)
    }
}
