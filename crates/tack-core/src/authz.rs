//! Who may change a board.
//!
//! Position maintenance never decides access itself; the service asks an
//! [`Authorizer`] before touching a board's lists or cards. A move between
//! boards needs permission on both.

use rusqlite::{Connection, OptionalExtension, params};

use crate::error::{Result, TackError};
use crate::model::{BoardId, UserId};

pub trait Authorizer {
    /// Whether `caller` may read and change `board` and everything on it.
    ///
    /// # Errors
    ///
    /// Returns [`TackError::NotFound`] if the board does not exist.
    fn can_mutate(&self, conn: &Connection, board: &BoardId, caller: &UserId) -> Result<bool>;
}

/// Only the board's owner may change it.
#[derive(Debug, Clone, Copy, Default)]
pub struct OwnerAuthorizer;

impl Authorizer for OwnerAuthorizer {
    fn can_mutate(&self, conn: &Connection, board: &BoardId, caller: &UserId) -> Result<bool> {
        let owner: UserId = conn
            .query_row(
                "SELECT owner_id FROM boards WHERE board_id = ?1",
                params![board],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| TackError::not_found("board", board))?;
        Ok(owner == *caller)
    }
}

/// Everyone may change everything. For embedding behind an external
/// access layer, and for simulation.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn can_mutate(&self, _conn: &Connection, _board: &BoardId, _caller: &UserId) -> Result<bool> {
        Ok(true)
    }
}

/// Fail with [`TackError::Forbidden`] unless `caller` may change `board`.
///
/// # Errors
///
/// Returns [`TackError::Forbidden`], or [`TackError::NotFound`] for a
/// missing board.
pub fn ensure_can_mutate<A: Authorizer + ?Sized>(
    authorizer: &A,
    conn: &Connection,
    board: &BoardId,
    caller: &UserId,
) -> Result<()> {
    if authorizer.can_mutate(conn, board, caller)? {
        Ok(())
    } else {
        tracing::debug!(%board, %caller, "board access refused");
        Err(TackError::Forbidden {
            user: caller.to_string(),
            board: board.to_string(),
        })
    }
}
