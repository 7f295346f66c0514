//! The board service: one store connection, its project config, and an
//! [`Authorizer`].
//!
//! Every mutating call runs in one `BEGIN IMMEDIATE` transaction. If the
//! write lock cannot be taken within the busy timeout, the whole call is
//! retried from fresh reads up to `moves.max_conflict_retries` times
//! before the conflict is surfaced. A service is single-threaded; open one
//! per thread.
//!
//! - [`positions`]: move and reorder lists and cards
//! - [`catalog`]: create, update, and delete boards, lists, cards, labels

pub mod catalog;
pub mod positions;

use std::path::Path;
use std::time::Duration;

use anyhow::Context as _;
use rusqlite::Connection;

use crate::authz::{Authorizer, OwnerAuthorizer};
use crate::config::{ProjectConfig, load_project_config};
use crate::db;
use crate::error::{Result, TackError};
use crate::store;
use crate::verify;

pub use catalog::{BoardPatch, CardPatch, NewCard, Removed};
pub use positions::{MoveOutcome, ReorderOutcome};

pub struct Service<A: Authorizer = OwnerAuthorizer> {
    conn: Connection,
    config: ProjectConfig,
    authorizer: A,
}

impl Service<OwnerAuthorizer> {
    /// Open the existing store under `root`.
    ///
    /// # Errors
    ///
    /// Fails with [`TackError::NotInitialized`] if there is no store, or if
    /// the config or database cannot be loaded.
    pub fn open(root: &Path) -> anyhow::Result<Self> {
        let config = load_project_config(root)?;
        let path = db::store_path(root);
        let conn = db::try_open_store(&path, config.store.busy_timeout())?
            .ok_or(TackError::NotInitialized { path })?;
        Ok(Self::with_parts(conn, config, OwnerAuthorizer))
    }

    /// Create the store under `root` if needed and open it.
    ///
    /// # Errors
    ///
    /// Fails if the config cannot be parsed or the database cannot be
    /// created.
    pub fn init(root: &Path) -> anyhow::Result<Self> {
        let config = load_project_config(root)?;
        let path = db::store_path(root);
        let conn = db::open_store(&path, config.store.busy_timeout())
            .with_context(|| format!("initialize store at {}", path.display()))?;
        Ok(Self::with_parts(conn, config, OwnerAuthorizer))
    }
}

impl<A: Authorizer> Service<A> {
    /// Assemble a service from an already configured connection.
    pub const fn with_parts(conn: Connection, config: ProjectConfig, authorizer: A) -> Self {
        Self {
            conn,
            config,
            authorizer,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &ProjectConfig {
        &self.config
    }

    /// Read-only access for queries and checks.
    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Report containers whose positions are not `0..N`.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub fn check_density(&self) -> Result<verify::DensityReport> {
        verify::check_density(&self.conn)
    }

    /// Re-densify damaged containers in one write transaction.
    ///
    /// # Errors
    ///
    /// Returns a store error; nothing is written in that case.
    pub fn repair_density(&mut self) -> Result<verify::DensityReport> {
        verify::repair_density(&mut self.conn)
    }

    /// Run `op` in a write transaction, retrying busy conflicts.
    fn write<T, F>(&mut self, op: &'static str, mut f: F) -> Result<T>
    where
        F: FnMut(&Connection, &A) -> Result<T>,
    {
        let retries = self.config.moves.max_conflict_retries;
        let conn = &mut self.conn;
        let authorizer = &self.authorizer;
        let mut attempt = 0_u32;

        loop {
            let result = store::begin(conn).and_then(|tx| {
                let value = f(&tx, authorizer)?;
                tx.commit()?;
                Ok(value)
            });

            match result {
                Err(err) if err.is_retryable() && attempt < retries => {
                    attempt += 1;
                    tracing::warn!(op, attempt, retries, error = %err, "write conflict, retrying");
                    std::thread::sleep(backoff(attempt));
                }
                other => return other,
            }
        }
    }
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(10_u64.saturating_mul(1_u64 << attempt.min(6)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::AllowAll;
    use crate::config::DATA_DIR;
    use crate::error::{ConflictReason, ErrorCode};
    use crate::model::UserId;

    #[test]
    fn open_without_store_reports_not_initialized() {
        let dir = tempfile::tempdir().expect("temp dir");
        let err = Service::open(dir.path()).err().expect("must fail");
        let tack = err.downcast_ref::<TackError>().expect("typed error");
        assert_eq!(tack.error_code(), ErrorCode::NotInitialized);
    }

    #[test]
    fn init_then_open_round_trips() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut svc = Service::init(dir.path()).expect("init");
        let alice = UserId::new("alice");
        let board = svc.create_board(&alice, "Roadmap", "").expect("board");
        drop(svc);

        assert!(dir.path().join(DATA_DIR).join(db::STORE_FILE).exists());
        let svc = Service::open(dir.path()).expect("open");
        assert_eq!(svc.boards_for(&alice).expect("boards"), vec![board]);
    }

    #[test]
    fn busy_conflicts_are_retried_then_surfaced() {
        let mut conn = Connection::open_in_memory().expect("open");
        db::migrations::migrate(&mut conn).expect("migrate");
        let mut svc = Service::with_parts(conn, ProjectConfig::default(), AllowAll);

        let mut calls = 0;
        let err = svc
            .write("test", |_, _| -> Result<()> {
                calls += 1;
                Err(TackError::Conflict {
                    container: "l-1".into(),
                    reason: ConflictReason::Busy,
                })
            })
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(calls, 3);
    }

    #[test]
    fn non_retryable_errors_fail_fast() {
        let mut conn = Connection::open_in_memory().expect("open");
        db::migrations::migrate(&mut conn).expect("migrate");
        let mut svc = Service::with_parts(conn, ProjectConfig::default(), AllowAll);

        let mut calls = 0;
        let _ = svc.write("test", |_, _| -> Result<()> {
            calls += 1;
            Err(TackError::not_found("card", "c-1"))
        });
        assert_eq!(calls, 1);
    }

    #[test]
    fn backoff_grows_and_saturates() {
        assert!(backoff(1) < backoff(2));
        assert_eq!(backoff(6), backoff(40));
    }
}
