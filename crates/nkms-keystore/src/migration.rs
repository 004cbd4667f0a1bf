//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL string
//! that transforms the schema from version N to N+1.

use rusqlite::Connection;

use crate::error::{Result, StoreError};
use crate::models::now_millis;

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema version {} is newer than supported version {}",
            current, CURRENT_VERSION
        )));
    }

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
            tracing::debug!(version, "applied keystore migration");
        }

        tx.commit()?;
    }

    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Public keys, content-addressed by fingerprint
        CREATE TABLE keys (
            id INTEGER PRIMARY KEY,
            fingerprint BLOB NOT NULL UNIQUE,  -- 32 bytes, Blake3 of key_data
            key_data BLOB NOT NULL,            -- serialized public key
            is_signing INTEGER NOT NULL,       -- 1=signing, 0=encrypting
            created_at INTEGER NOT NULL        -- Unix ms
        );

        -- Delegation policies
        CREATE TABLE policy_contracts (
            id INTEGER PRIMARY KEY,
            hrac BLOB NOT NULL UNIQUE,
            expiration INTEGER NOT NULL,       -- Unix ms
            deposit BLOB NOT NULL,             -- 16 bytes, big-endian u128
            kfrag BLOB,                        -- attached after creation
            alice_pubkey_sig_id INTEGER NOT NULL REFERENCES keys(id),
            alice_signature BLOB,              -- 64 bytes, nullable
            created_at INTEGER NOT NULL
        );

        -- Service requests against a policy
        CREATE TABLE workorders (
            id INTEGER PRIMARY KEY,
            bob_pubkey_sig_id INTEGER NOT NULL REFERENCES keys(id),
            bob_signature BLOB NOT NULL,       -- 64 bytes
            hrac BLOB NOT NULL,
            created_at INTEGER NOT NULL
        );

        CREATE INDEX idx_workorders_hrac ON workorders(hrac);
        CREATE INDEX idx_policy_contracts_alice ON policy_contracts(alice_pubkey_sig_id);
        CREATE INDEX idx_workorders_bob ON workorders(bob_pubkey_sig_id);
        "#,
    )?;

    Ok(())
}
