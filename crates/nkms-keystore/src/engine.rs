//! The storage engine: where the database lives and how to connect to it.
//!
//! An [`Engine`] is the configured storage handle handed to a keystore at
//! construction. It is cheap to clone and safe to share between threads; the
//! per-thread resource is the [`Session`] it opens.
//!
//! File databases rely on SQLite's own locking and the busy timeout. Shared-cache
//! memory databases report table-lock conflicts as `SQLITE_LOCKED` without ever
//! waiting, so their sessions take the engine's `Gate` around each operation.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{Connection, OpenFlags};

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::migration;
use crate::session::Session;

static NEXT_MEMORY_DB: AtomicU64 = AtomicU64::new(0);

enum Target {
    File(PathBuf),
    /// Named shared-cache in-memory database.
    Memory(String),
}

struct EngineInner {
    target: Target,
    busy_timeout: Duration,
    /// Keeps a shared in-memory database alive between sessions and
    /// serializes their operations.
    anchor: Gate,
}

/// Serializes sessions of one in-memory database.
///
/// Holds the anchor connection of the database; file engines have no gate.
#[derive(Clone, Default)]
pub(crate) struct Gate(Option<Arc<Mutex<Connection>>>);

impl Gate {
    /// Block until no other session of this database is mid-operation.
    pub(crate) fn enter(&self) -> Result<Option<MutexGuard<'_, Connection>>> {
        self.0
            .as_ref()
            .map(|anchor| {
                anchor.lock().map_err(|e| {
                    StoreError::Database(rusqlite::Error::SqliteFailure(
                        rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
                        Some(format!("mutex poisoned: {}", e)),
                    ))
                })
            })
            .transpose()
    }
}

/// A configured SQLite database that sessions connect to.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    /// Build an engine from configuration and bring its schema up to date.
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        let target = match &config.path {
            Some(path) => Target::File(path.clone()),
            None => Target::Memory(format!(
                "nkms-keystore-{}-{}",
                std::process::id(),
                NEXT_MEMORY_DB.fetch_add(1, Ordering::Relaxed)
            )),
        };

        let mut conn = connect(&target, config.busy_timeout())?;
        migration::migrate(&mut conn)?;

        let anchor = match target {
            Target::Memory(_) => Gate(Some(Arc::new(Mutex::new(conn)))),
            Target::File(_) => Gate::default(),
        };

        Ok(Self {
            inner: Arc::new(EngineInner {
                target,
                busy_timeout: config.busy_timeout(),
                anchor,
            }),
        })
    }

    /// Open a SQLite database file at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        Self::from_config(&StoreConfig::file(path.into()))
    }

    /// Open a fresh in-memory database.
    ///
    /// Useful for testing. The data lives as long as any clone of the engine
    /// or any session opened from it.
    pub fn open_memory() -> Result<Self> {
        Self::from_config(&StoreConfig::memory())
    }

    /// Open a new unit of work on this database.
    pub fn open_session(&self) -> Result<Session> {
        let conn = connect(&self.inner.target, self.inner.busy_timeout)?;
        Ok(Session::new(conn, self.inner.anchor.clone()))
    }

    /// Run `f` inside a fresh session, closing it afterwards.
    pub fn with_session<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Session) -> Result<T>,
    {
        let mut session = self.open_session()?;
        f(&mut session)
    }

    pub fn is_memory(&self) -> bool {
        matches!(self.inner.target, Target::Memory(_))
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner.target {
            Target::File(path) => write!(f, "Engine(file: {})", path.display()),
            Target::Memory(name) => write!(f, "Engine(memory: {})", name),
        }
    }
}

fn connect(target: &Target, busy_timeout: Duration) -> Result<Connection> {
    let conn = match target {
        Target::File(path) => Connection::open(path)?,
        Target::Memory(name) => Connection::open_with_flags(
            format!("file:{}?mode=memory&cache=shared", name),
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?,
    };
    conn.busy_timeout(busy_timeout)?;
    conn.pragma_update(None, "foreign_keys", true)?;
    Ok(conn)
}
