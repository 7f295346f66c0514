//! SQLite board store utilities.
//!
//! Connections are configured with:
//! - `journal_mode = WAL` so readers never block the single writer
//! - `busy_timeout` (default 5s) so a writer waits for the lock instead of
//!   failing immediately
//! - `foreign_keys = ON` so deleting a board or list cascades to its items
//!
//! Each thread or process opens its own [`Connection`]; all mutation goes
//! through `BEGIN IMMEDIATE` transactions (see [`crate::store::begin`]).

pub mod migrations;
pub mod query;
pub mod schema;

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::{path::Path, path::PathBuf, time::Duration};

use crate::config::DATA_DIR;

/// Busy timeout used when the project config does not override it.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// File name of the store inside the data directory.
pub const STORE_FILE: &str = "tack.db";

/// Location of the store for a project rooted at `root`.
#[must_use]
pub fn store_path(root: &Path) -> PathBuf {
    root.join(DATA_DIR).join(STORE_FILE)
}

/// Open (or create) the store, apply runtime pragmas, and migrate the
/// schema to the latest version.
///
/// # Errors
///
/// Returns an error if opening, configuring, or migrating the database
/// fails.
pub fn open_store(path: &Path, busy_timeout: Duration) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create store directory {}", parent.display()))?;
    }

    let mut conn =
        Connection::open(path).with_context(|| format!("open store {}", path.display()))?;

    configure_connection(&conn, busy_timeout).context("configure sqlite pragmas")?;
    migrations::migrate(&mut conn).context("apply store migrations")?;

    Ok(conn)
}

/// Open an existing store. Returns `Ok(None)` when no store file exists,
/// so callers can report "not initialized" instead of silently creating
/// one.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be opened or migrated.
pub fn try_open_store(path: &Path, busy_timeout: Duration) -> Result<Option<Connection>> {
    if !path.exists() {
        return Ok(None);
    }
    open_store(path, busy_timeout).map(Some)
}

/// A private, migrated in-memory store. Nothing is shared between handles.
///
/// # Errors
///
/// Returns an error if SQLite cannot allocate the database or migrate it.
pub fn open_in_memory() -> Result<Connection> {
    let mut conn = Connection::open_in_memory().context("open in-memory store")?;
    configure_connection(&conn, DEFAULT_BUSY_TIMEOUT).context("configure sqlite pragmas")?;
    migrations::migrate(&mut conn).context("apply store migrations")?;
    Ok(conn)
}

/// Apply the connection pragmas every store handle needs.
///
/// # Errors
///
/// Returns an error if SQLite rejects a pragma.
pub fn configure_connection(conn: &Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.busy_timeout(busy_timeout)?;
    Ok(())
}
