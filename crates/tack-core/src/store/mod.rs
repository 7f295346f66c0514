//! Transactional position persistence.
//!
//! A container (a board holding lists, or a list holding cards) is read
//! into a [`ContainerSnapshot`], transformed by [`crate::order`], and
//! written back by [`commit`]. Only rows whose stored position differs
//! from the new one are written, and the container's version stamp is
//! bumped whenever its membership or order changed.
//!
//! Writes use two phases so the per-container unique position index never
//! sees a transient duplicate: every changed row is first parked at
//! `-(position + 1)`, then one statement flips all negative rows of the
//! container back.
//!
//! Callers run everything between [`begin`] and `commit()` of the returned
//! transaction. `BEGIN IMMEDIATE` takes the write lock up front, so reads
//! inside the transaction see the state the writes apply to.

use std::collections::BTreeMap;
use std::fmt;

use rusqlite::types::FromSql;
use rusqlite::{Connection, OptionalExtension, ToSql, Transaction, TransactionBehavior, params};

use crate::error::{ConflictReason, Result, TackError};
use crate::model::{BoardId, CardId, ListId};
use crate::order::OrderedContainer;

/// A parent/child pair whose children carry dense positions.
pub trait ContainerKind {
    type Container: Clone + Ord + fmt::Debug + fmt::Display + ToSql + FromSql;
    type Item: Clone + Ord + fmt::Debug + fmt::Display + ToSql + FromSql;

    /// Entity names used in errors and logs.
    const CONTAINER: &'static str;
    const ITEM: &'static str;

    const CONTAINER_TABLE: &'static str;
    /// Primary key of the container table and foreign key on the item table.
    const CONTAINER_KEY: &'static str;
    const VERSION_COLUMN: &'static str;
    const ITEM_TABLE: &'static str;
    const ITEM_KEY: &'static str;

    /// Board whose owner governs changes to `container`.
    ///
    /// # Errors
    ///
    /// Returns [`TackError::NotFound`] if the container does not exist.
    fn owning_board(conn: &Connection, container: &Self::Container) -> Result<BoardId>;
}

/// Lists on a board.
#[derive(Debug, Clone, Copy)]
pub struct BoardLists;

impl ContainerKind for BoardLists {
    type Container = BoardId;
    type Item = ListId;

    const CONTAINER: &'static str = "board";
    const ITEM: &'static str = "list";
    const CONTAINER_TABLE: &'static str = "boards";
    const CONTAINER_KEY: &'static str = "board_id";
    const VERSION_COLUMN: &'static str = "lists_version";
    const ITEM_TABLE: &'static str = "lists";
    const ITEM_KEY: &'static str = "list_id";

    fn owning_board(conn: &Connection, container: &BoardId) -> Result<BoardId> {
        conn.query_row(
            "SELECT board_id FROM boards WHERE board_id = ?1",
            params![container],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| TackError::not_found(Self::CONTAINER, container))
    }
}

/// Cards in a list.
#[derive(Debug, Clone, Copy)]
pub struct ListCards;

impl ContainerKind for ListCards {
    type Container = ListId;
    type Item = CardId;

    const CONTAINER: &'static str = "list";
    const ITEM: &'static str = "card";
    const CONTAINER_TABLE: &'static str = "lists";
    const CONTAINER_KEY: &'static str = "list_id";
    const VERSION_COLUMN: &'static str = "cards_version";
    const ITEM_TABLE: &'static str = "cards";
    const ITEM_KEY: &'static str = "card_id";

    fn owning_board(conn: &Connection, container: &ListId) -> Result<BoardId> {
        conn.query_row(
            "SELECT board_id FROM lists WHERE list_id = ?1",
            params![container],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| TackError::not_found(Self::CONTAINER, container))
    }
}

/// One container's items as read inside a transaction.
#[derive(Debug, Clone)]
pub struct ContainerSnapshot<K: ContainerKind> {
    pub container: K::Container,
    pub version: i64,
    /// Items in stored order, re-indexed densely.
    pub items: OrderedContainer<K::Item>,
    stored: BTreeMap<K::Item, i64>,
}

impl<K: ContainerKind> ContainerSnapshot<K> {
    /// Position exactly as stored, which differs from the index in
    /// [`Self::items`] only for a damaged container.
    #[must_use]
    pub fn stored_position(&self, item: &K::Item) -> Option<i64> {
        self.stored.get(item).copied()
    }

    /// True when the stored positions are exactly `0..len`.
    #[must_use]
    pub fn is_dense(&self) -> bool {
        self.items
            .assignments()
            .all(|(item, slot)| self.stored_position(item) == Some(slot_value(slot)))
    }

    /// Rows of `after` whose stored position must change.
    #[must_use]
    pub fn changes_to(&self, after: &OrderedContainer<K::Item>) -> Vec<(K::Item, usize)> {
        after
            .assignments()
            .filter(|(item, slot)| self.stored_position(item) != Some(slot_value(*slot)))
            .map(|(item, slot)| (item.clone(), slot))
            .collect()
    }

    /// Fail with a non-retryable conflict if the caller saw another version.
    ///
    /// # Errors
    ///
    /// Returns [`TackError::Conflict`] with [`ConflictReason::StaleVersion`].
    pub fn check_version(&self, expected: Option<i64>) -> Result<()> {
        match expected {
            Some(expected) if expected != self.version => Err(TackError::Conflict {
                container: self.container.to_string(),
                reason: ConflictReason::StaleVersion {
                    expected,
                    actual: self.version,
                },
            }),
            _ => Ok(()),
        }
    }
}

/// Where an item currently sits.
#[derive(Debug, Clone)]
pub struct ItemLocation<K: ContainerKind> {
    pub container: K::Container,
    pub position: i64,
}

/// Result of writing one container back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Committed {
    /// Rows whose stored position was rewritten.
    pub changed: usize,
    /// Version stamp after the write.
    pub version: i64,
}

/// Start a write transaction that holds the database write lock.
///
/// # Errors
///
/// Returns a retryable [`TackError::Conflict`] if the lock could not be
/// taken within the busy timeout.
pub fn begin(conn: &mut Connection) -> Result<Transaction<'_>> {
    Ok(conn.transaction_with_behavior(TransactionBehavior::Immediate)?)
}

/// Read a container's version and items.
///
/// # Errors
///
/// Returns [`TackError::NotFound`] if the container does not exist.
pub fn load_container_items<K: ContainerKind>(
    conn: &Connection,
    container: &K::Container,
) -> Result<ContainerSnapshot<K>> {
    let version: i64 = conn
        .query_row(
            &format!(
                "SELECT {} FROM {} WHERE {} = ?1",
                K::VERSION_COLUMN,
                K::CONTAINER_TABLE,
                K::CONTAINER_KEY
            ),
            params![container],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| TackError::not_found(K::CONTAINER, container))?;

    let mut stmt = conn.prepare(&format!(
        "SELECT {}, position FROM {} WHERE {} = ?1 ORDER BY position ASC, {} ASC",
        K::ITEM_KEY,
        K::ITEM_TABLE,
        K::CONTAINER_KEY,
        K::ITEM_KEY
    ))?;
    let rows = stmt
        .query_map(params![container], |row| {
            Ok((row.get::<_, K::Item>(0)?, row.get::<_, i64>(1)?))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let stored = rows.iter().cloned().collect();
    Ok(ContainerSnapshot {
        container: container.clone(),
        version,
        items: OrderedContainer::from_positions(rows),
        stored,
    })
}

/// Find the container and stored position of `item`.
///
/// # Errors
///
/// Returns [`TackError::NotFound`] if the item does not exist.
pub fn load_item_location<K: ContainerKind>(
    conn: &Connection,
    item: &K::Item,
) -> Result<ItemLocation<K>> {
    conn.query_row(
        &format!(
            "SELECT {}, position FROM {} WHERE {} = ?1",
            K::CONTAINER_KEY,
            K::ITEM_TABLE,
            K::ITEM_KEY
        ),
        params![item],
        |row| {
            Ok(ItemLocation {
                container: row.get(0)?,
                position: row.get(1)?,
            })
        },
    )
    .optional()?
    .ok_or_else(|| TackError::not_found(K::ITEM, item))
}

/// Write `changes` into `container` using the park-then-flip scheme.
///
/// Each changed row also has its container column set, so an item arriving
/// from another container is re-parented in the same statement.
///
/// # Errors
///
/// Returns an error if any statement fails.
pub fn persist_positions<K: ContainerKind>(
    conn: &Connection,
    container: &K::Container,
    changes: &[(K::Item, usize)],
) -> Result<usize> {
    if changes.is_empty() {
        return Ok(0);
    }

    let mut park = conn.prepare_cached(&format!(
        "UPDATE {} SET {} = ?1, position = ?2 WHERE {} = ?3",
        K::ITEM_TABLE,
        K::CONTAINER_KEY,
        K::ITEM_KEY
    ))?;
    for (item, slot) in changes {
        park.execute(params![container, parked(*slot), item])?;
    }

    conn.execute(
        &format!(
            "UPDATE {} SET position = -position - 1 WHERE {} = ?1 AND position < 0",
            K::ITEM_TABLE,
            K::CONTAINER_KEY
        ),
        params![container],
    )?;

    Ok(changes.len())
}

/// Increment the container's version stamp and touch its update time.
///
/// # Errors
///
/// Returns an error if the update fails.
pub fn bump_version<K: ContainerKind>(
    conn: &Connection,
    container: &K::Container,
    now_us: i64,
) -> Result<()> {
    conn.execute(
        &format!(
            "UPDATE {table} SET {col} = {col} + 1, updated_at_us = ?2 WHERE {key} = ?1",
            table = K::CONTAINER_TABLE,
            col = K::VERSION_COLUMN,
            key = K::CONTAINER_KEY
        ),
        params![container, now_us],
    )?;
    Ok(())
}

/// Persist `after` as the new state of `before`'s container.
///
/// Writes only changed rows and bumps the version when the order or the
/// membership differs. A no-op commit touches nothing.
///
/// # Errors
///
/// Returns an error if a write fails.
pub fn commit<K: ContainerKind>(
    conn: &Connection,
    before: &ContainerSnapshot<K>,
    after: &OrderedContainer<K::Item>,
) -> Result<Committed> {
    let changes = before.changes_to(after);
    if changes.is_empty() && before.items == *after {
        return Ok(Committed {
            changed: 0,
            version: before.version,
        });
    }

    let changed = persist_positions::<K>(conn, &before.container, &changes)?;
    bump_version::<K>(conn, &before.container, now_us())?;

    tracing::debug!(
        container = %before.container,
        kind = K::CONTAINER,
        changed,
        version = before.version + 1,
        "positions committed"
    );

    Ok(Committed {
        changed,
        version: before.version + 1,
    })
}

/// Stored value of a parked row bound for `slot`.
#[must_use]
pub fn parked(slot: usize) -> i64 {
    -slot_value(slot) - 1
}

fn slot_value(slot: usize) -> i64 {
    i64::try_from(slot).unwrap_or(i64::MAX)
}

/// Current wall clock in microseconds since the epoch.
#[must_use]
pub fn now_us() -> i64 {
    chrono::Utc::now().timestamp_micros()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations;
    use crate::order::{OutOfRangePolicy, move_between};

    fn seeded() -> Connection {
        let mut conn = Connection::open_in_memory().expect("open");
        migrations::migrate(&mut conn).expect("migrate");
        conn.execute_batch(
            "INSERT INTO boards (board_id, title, owner_id, created_at_us, updated_at_us)
             VALUES ('b-1', 'Roadmap', 'alice', 1, 1);
             INSERT INTO lists (list_id, board_id, title, position, created_at_us, updated_at_us)
             VALUES ('l-1', 'b-1', 'Todo', 0, 1, 1), ('l-2', 'b-1', 'Done', 1, 1, 1);
             INSERT INTO cards (card_id, list_id, title, position, created_at_us, updated_at_us)
             VALUES ('c-a', 'l-1', 'A', 0, 1, 1), ('c-b', 'l-1', 'B', 1, 1, 1),
                    ('c-c', 'l-1', 'C', 2, 1, 1), ('c-x', 'l-2', 'X', 0, 1, 1);",
        )
        .expect("seed");
        conn
    }

    fn stored(conn: &Connection, list: &str) -> Vec<(String, i64)> {
        conn.prepare("SELECT card_id, position FROM cards WHERE list_id = ?1 ORDER BY position")
            .expect("prepare")
            .query_map([list], |row| Ok((row.get(0)?, row.get(1)?)))
            .expect("query")
            .collect::<rusqlite::Result<_>>()
            .expect("rows")
    }

    fn card(id: &str) -> CardId {
        CardId::new(id)
    }

    #[test]
    fn load_reads_version_and_order() {
        let conn = seeded();
        let snap = load_container_items::<ListCards>(&conn, &ListId::new("l-1")).expect("load");
        assert_eq!(snap.version, 0);
        assert_eq!(snap.items.items(), [card("c-a"), card("c-b"), card("c-c")]);
        assert!(snap.is_dense());

        let missing = load_container_items::<ListCards>(&conn, &ListId::new("l-9")).unwrap_err();
        assert!(matches!(missing, TackError::NotFound { entity: "list", .. }));
    }

    #[test]
    fn commit_writes_only_changed_rows_and_bumps_version() {
        let mut conn = seeded();
        let tx = begin(&mut conn).expect("begin");
        let snap = load_container_items::<ListCards>(&tx, &ListId::new("l-1")).expect("load");
        let mut after = snap.items.clone();
        after
            .move_within(&card("c-b"), 0, OutOfRangePolicy::Reject)
            .expect("move");

        let committed = commit(&tx, &snap, &after).expect("commit");
        tx.commit().expect("tx commit");

        assert_eq!(committed, Committed { changed: 2, version: 1 });
        assert_eq!(
            stored(&conn, "l-1"),
            [("c-b".to_string(), 0), ("c-a".to_string(), 1), ("c-c".to_string(), 2)]
        );
    }

    #[test]
    fn unchanged_commit_touches_nothing() {
        let conn = seeded();
        let snap = load_container_items::<ListCards>(&conn, &ListId::new("l-1")).expect("load");
        let committed = commit(&conn, &snap, &snap.items.clone()).expect("commit");
        assert_eq!(committed, Committed { changed: 0, version: 0 });
    }

    #[test]
    fn cross_container_commit_reparents_moved_item() {
        let mut conn = seeded();
        let tx = begin(&mut conn).expect("begin");
        let src = load_container_items::<ListCards>(&tx, &ListId::new("l-1")).expect("src");
        let dst = load_container_items::<ListCards>(&tx, &ListId::new("l-2")).expect("dst");
        let (mut src_after, mut dst_after) = (src.items.clone(), dst.items.clone());
        move_between(
            &mut src_after,
            &mut dst_after,
            &card("c-a"),
            0,
            OutOfRangePolicy::Reject,
        )
        .expect("move");

        commit(&tx, &dst, &dst_after).expect("dst commit");
        commit(&tx, &src, &src_after).expect("src commit");
        tx.commit().expect("tx commit");

        assert_eq!(stored(&conn, "l-1"), [("c-b".to_string(), 0), ("c-c".to_string(), 1)]);
        assert_eq!(stored(&conn, "l-2"), [("c-a".to_string(), 0), ("c-x".to_string(), 1)]);
        let location = load_item_location::<ListCards>(&conn, &card("c-a")).expect("location");
        assert_eq!(location.container.as_str(), "l-2");
    }

    #[test]
    fn stale_version_is_not_retryable() {
        let conn = seeded();
        let snap = load_container_items::<ListCards>(&conn, &ListId::new("l-1")).expect("load");
        assert!(snap.check_version(None).is_ok());
        assert!(snap.check_version(Some(0)).is_ok());
        let err = snap.check_version(Some(3)).unwrap_err();
        assert!(matches!(
            err,
            TackError::Conflict {
                reason: ConflictReason::StaleVersion {
                    expected: 3,
                    actual: 0
                },
                ..
            }
        ));
        assert!(!err.is_retryable());
    }

    #[test]
    fn gaps_are_closed_by_the_next_commit() {
        let conn = seeded();
        conn.execute("UPDATE cards SET position = 7 WHERE card_id = 'c-c'", [])
            .expect("damage");
        let snap = load_container_items::<ListCards>(&conn, &ListId::new("l-1")).expect("load");
        assert!(!snap.is_dense());
        assert_eq!(snap.stored_position(&card("c-c")), Some(7));

        let committed = commit(&conn, &snap, &snap.items.clone()).expect("repair");
        assert_eq!(committed.changed, 1);
        assert_eq!(stored(&conn, "l-1").last(), Some(&("c-c".to_string(), 2)));
    }

    #[test]
    fn owning_board_resolves_for_both_kinds() {
        let conn = seeded();
        assert_eq!(
            ListCards::owning_board(&conn, &ListId::new("l-2"))
                .expect("owner")
                .as_str(),
            "b-1"
        );
        assert!(BoardLists::owning_board(&conn, &BoardId::new("b-9")).is_err());
    }

    #[test]
    fn parked_values_never_collide_with_live_slots() {
        assert_eq!(parked(0), -1);
        assert_eq!(parked(4), -5);
    }
}
