//! Move and reorder, for cards within and across lists and for lists
//! within and across boards.
//!
//! Each call resolves where the item lives, checks the caller against the
//! owning board of every container it touches, computes the new order with
//! [`crate::order`], and writes back only the rows that changed.

use std::collections::BTreeMap;

use rusqlite::Connection;
use serde::Serialize;

use super::Service;
use crate::authz::{Authorizer, ensure_can_mutate};
use crate::error::Result;
use crate::model::{BoardId, CardId, ListId, UserId};
use crate::order::{OutOfRangePolicy, UnknownItemPolicy, move_between};
use crate::store::{self, BoardLists, ContainerKind, ListCards};

/// What a committed (or no-op) move did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoveOutcome {
    pub item: String,
    pub source: String,
    pub target: String,
    pub from: usize,
    pub to: usize,
    /// The item already sat at the requested place; nothing was written.
    pub noop: bool,
    /// Rows rewritten across both containers.
    pub changed: usize,
    pub source_version: i64,
    pub target_version: i64,
}

/// What a reorder did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReorderOutcome {
    pub container: String,
    /// Item ids in their new position order.
    pub order: Vec<String>,
    /// Mapping entries ignored because the item is elsewhere.
    pub skipped: Vec<String>,
    pub changed: usize,
    pub version: i64,
}

impl<A: Authorizer> Service<A> {
    /// Move `card` to `position` in `target` (its own list or another).
    ///
    /// # Errors
    ///
    /// `NotFound` for a missing card or list, `Forbidden` if the caller
    /// may not change either board, `PositionOutOfRange` for a rejected
    /// target, or a store error.
    pub fn move_card(
        &mut self,
        caller: &UserId,
        card: &CardId,
        target: &ListId,
        position: i64,
    ) -> Result<MoveOutcome> {
        self.move_item::<ListCards>(caller, card, target, position)
    }

    /// Move `list` to `position` on `target` (its own board or another).
    ///
    /// # Errors
    ///
    /// As [`Self::move_card`].
    pub fn move_list(
        &mut self,
        caller: &UserId,
        list: &ListId,
        target: &BoardId,
        position: i64,
    ) -> Result<MoveOutcome> {
        self.move_item::<BoardLists>(caller, list, target, position)
    }

    /// Re-assign card positions in `list` from `mapping`.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Forbidden`, `PositionOutOfRange`,
    /// `PositionClaimedTwice`, a `StaleVersion` conflict when
    /// `expected_version` is given and out of date, or a store error.
    pub fn reorder_cards(
        &mut self,
        caller: &UserId,
        list: &ListId,
        mapping: &BTreeMap<CardId, i64>,
        expected_version: Option<i64>,
    ) -> Result<ReorderOutcome> {
        self.reorder_items::<ListCards>(caller, list, mapping, expected_version)
    }

    /// Re-assign list positions on `board` from `mapping`.
    ///
    /// # Errors
    ///
    /// As [`Self::reorder_cards`].
    pub fn reorder_lists(
        &mut self,
        caller: &UserId,
        board: &BoardId,
        mapping: &BTreeMap<ListId, i64>,
        expected_version: Option<i64>,
    ) -> Result<ReorderOutcome> {
        self.reorder_items::<BoardLists>(caller, board, mapping, expected_version)
    }

    fn move_item<K: ContainerKind>(
        &mut self,
        caller: &UserId,
        item: &K::Item,
        target: &K::Container,
        position: i64,
    ) -> Result<MoveOutcome> {
        let policy = self.config.moves.out_of_range;
        let outcome = self.write("move", |conn, authorizer| {
            move_in_tx::<K, A>(conn, authorizer, caller, item, target, position, policy)
        })?;

        if !outcome.noop {
            tracing::info!(
                kind = K::ITEM,
                item = %outcome.item,
                source = %outcome.source,
                target = %outcome.target,
                from = outcome.from,
                to = outcome.to,
                changed = outcome.changed,
                "moved"
            );
        }
        Ok(outcome)
    }

    fn reorder_items<K: ContainerKind>(
        &mut self,
        caller: &UserId,
        container: &K::Container,
        mapping: &BTreeMap<K::Item, i64>,
        expected_version: Option<i64>,
    ) -> Result<ReorderOutcome> {
        let policy = self.config.reorder.unknown_items;
        let outcome = self.write("reorder", |conn, authorizer| {
            reorder_in_tx::<K, A>(
                conn,
                authorizer,
                caller,
                container,
                mapping,
                expected_version,
                policy,
            )
        })?;

        if !outcome.skipped.is_empty() {
            tracing::warn!(
                kind = K::CONTAINER,
                container = %outcome.container,
                skipped = ?outcome.skipped,
                "reorder ignored items that are not in the container"
            );
        }
        tracing::info!(
            kind = K::CONTAINER,
            container = %outcome.container,
            changed = outcome.changed,
            version = outcome.version,
            "reordered"
        );
        Ok(outcome)
    }
}

fn move_in_tx<K: ContainerKind, A: Authorizer>(
    conn: &Connection,
    authorizer: &A,
    caller: &UserId,
    item: &K::Item,
    target: &K::Container,
    requested: i64,
    policy: OutOfRangePolicy,
) -> Result<MoveOutcome> {
    let location = store::load_item_location::<K>(conn, item)?;
    let source_board = K::owning_board(conn, &location.container)?;
    let target_board = K::owning_board(conn, target)?;
    ensure_can_mutate(authorizer, conn, &source_board, caller)?;
    if target_board != source_board {
        ensure_can_mutate(authorizer, conn, &target_board, caller)?;
    }

    if location.container == *target {
        let before = store::load_container_items::<K>(conn, target)?;
        let mut after = before.items.clone();
        let effect = after.move_within(item, requested, policy)?;
        tracing::debug!(item = %item, from = effect.from, to = effect.to, "planned move");

        let committed = if effect.noop {
            store::Committed {
                changed: 0,
                version: before.version,
            }
        } else {
            store::commit(conn, &before, &after)?
        };

        return Ok(MoveOutcome {
            item: item.to_string(),
            source: target.to_string(),
            target: target.to_string(),
            from: effect.from,
            to: effect.to,
            noop: effect.noop,
            changed: committed.changed,
            source_version: committed.version,
            target_version: committed.version,
        });
    }

    let source_before = store::load_container_items::<K>(conn, &location.container)?;
    let target_before = store::load_container_items::<K>(conn, target)?;
    let mut source_after = source_before.items.clone();
    let mut target_after = target_before.items.clone();
    let effect = move_between(
        &mut source_after,
        &mut target_after,
        item,
        requested,
        policy,
    )?;
    tracing::debug!(item = %item, from = effect.from, to = effect.to, "planned cross-container move");

    // The target write re-parents the item, so it must land first.
    let target_committed = store::commit(conn, &target_before, &target_after)?;
    let source_committed = store::commit(conn, &source_before, &source_after)?;

    Ok(MoveOutcome {
        item: item.to_string(),
        source: location.container.to_string(),
        target: target.to_string(),
        from: effect.from,
        to: effect.to,
        noop: false,
        changed: target_committed.changed + source_committed.changed,
        source_version: source_committed.version,
        target_version: target_committed.version,
    })
}

fn reorder_in_tx<K: ContainerKind, A: Authorizer>(
    conn: &Connection,
    authorizer: &A,
    caller: &UserId,
    container: &K::Container,
    mapping: &BTreeMap<K::Item, i64>,
    expected_version: Option<i64>,
    policy: UnknownItemPolicy,
) -> Result<ReorderOutcome> {
    let board = K::owning_board(conn, container)?;
    ensure_can_mutate(authorizer, conn, &board, caller)?;

    let before = store::load_container_items::<K>(conn, container)?;
    let plan = before.items.reorder(mapping, policy)?;

    // A request that is already satisfied succeeds even against a newer
    // version, so retrying a reorder that committed is harmless.
    let satisfied = plan.result == before.items && before.is_dense();
    if !satisfied {
        before.check_version(expected_version)?;
    }

    let committed = store::commit(conn, &before, &plan.result)?;
    Ok(ReorderOutcome {
        container: container.to_string(),
        order: plan.result.items().iter().map(ToString::to_string).collect(),
        skipped: plan.skipped.iter().map(ToString::to_string).collect(),
        changed: committed.changed,
        version: committed.version,
    })
}
