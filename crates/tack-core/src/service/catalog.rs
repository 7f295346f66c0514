//! Boards, lists, cards, and labels.
//!
//! Creating a list or card appends it, or inserts it at a requested slot
//! and shifts the following siblings. Deleting one closes the gap. Both go
//! through the same snapshot/commit path as moves, so the container's
//! version is bumped and positions stay dense.

use rusqlite::{Connection, params};
use serde::Serialize;

use super::Service;
use crate::authz::{Authorizer, ensure_can_mutate};
use crate::db::query;
use crate::error::Result;
use crate::model::{
    Board, BoardId, BoardList, BoardView, Card, CardId, Label, LabelId, ListId, Priority, UserId,
    validate_name, validate_title,
};
use crate::order::OutOfRangePolicy;
use crate::store::{self, BoardLists, ContainerKind, ContainerSnapshot, ListCards, now_us, parked};

/// Fields for a new card.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewCard {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub due_at_us: Option<i64>,
    pub assignee: Option<UserId>,
}

impl NewCard {
    #[must_use]
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Board fields to change; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardPatch {
    pub title: Option<String>,
    pub description: Option<String>,
}

/// Card fields to change; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    /// `Some(None)` clears the due date.
    pub due_at_us: Option<Option<i64>>,
}

/// A removed list or card and the slot it vacated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Removed {
    pub id: String,
    pub container: String,
    pub position: usize,
    /// Siblings shifted to close the gap.
    pub shifted: usize,
}

impl<A: Authorizer> Service<A> {
    // -----------------------------------------------------------------------
    // Boards
    // -----------------------------------------------------------------------

    /// Create a board owned by `caller`.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a bad title, or a store error.
    pub fn create_board(&mut self, caller: &UserId, title: &str, description: &str) -> Result<Board> {
        let title = validate_title(title)?;
        let id = BoardId::generate(&title);
        self.write("create_board", |conn, _| {
            let now = now_us();
            conn.execute(
                "INSERT INTO boards (board_id, title, description, owner_id, created_at_us, updated_at_us)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![id, title, description.trim(), caller, now],
            )?;
            query::require_board(conn, &id)
        })
        .inspect(|board| tracing::info!(board = %board.id, owner = %board.owner, "created board"))
    }

    /// Boards owned by `caller`.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub fn boards_for(&self, caller: &UserId) -> Result<Vec<Board>> {
        query::boards_owned_by(&self.conn, caller)
    }

    /// A board with its lists and cards.
    ///
    /// # Errors
    ///
    /// `NotFound` or `Forbidden`.
    pub fn board(&self, caller: &UserId, board: &BoardId) -> Result<BoardView> {
        ensure_can_mutate(&self.authorizer, &self.conn, board, caller)?;
        query::board_view(&self.conn, board)
    }

    /// Change a board's title or description.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Forbidden`, or `InvalidInput`.
    pub fn update_board(
        &mut self,
        caller: &UserId,
        board: &BoardId,
        patch: &BoardPatch,
    ) -> Result<Board> {
        let title = patch.title.as_deref().map(validate_title).transpose()?;
        self.write("update_board", |conn, authorizer| {
            ensure_can_mutate(authorizer, conn, board, caller)?;
            let current = query::require_board(conn, board)?;
            conn.execute(
                "UPDATE boards SET title = ?2, description = ?3, updated_at_us = ?4
                 WHERE board_id = ?1",
                params![
                    board,
                    title.as_deref().unwrap_or(&current.title),
                    patch
                        .description
                        .as_deref()
                        .map_or(current.description.as_str(), str::trim),
                    now_us()
                ],
            )?;
            query::require_board(conn, board)
        })
    }

    /// Delete a board with all of its lists and cards.
    ///
    /// # Errors
    ///
    /// `NotFound` or `Forbidden`.
    pub fn delete_board(&mut self, caller: &UserId, board: &BoardId) -> Result<()> {
        self.write("delete_board", |conn, authorizer| {
            ensure_can_mutate(authorizer, conn, board, caller)?;
            conn.execute("DELETE FROM boards WHERE board_id = ?1", params![board])?;
            Ok(())
        })?;
        tracing::info!(%board, "deleted board");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Lists
    // -----------------------------------------------------------------------

    /// Add a list to `board`, appended or inserted at `position`.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Forbidden`, `InvalidInput`, or `PositionOutOfRange`.
    pub fn create_list(
        &mut self,
        caller: &UserId,
        board: &BoardId,
        title: &str,
        position: Option<i64>,
    ) -> Result<BoardList> {
        let title = validate_title(title)?;
        let id = ListId::generate(&title);
        let policy = self.config.moves.out_of_range;
        let list = self.write("create_list", |conn, authorizer| {
            ensure_can_mutate(authorizer, conn, board, caller)?;
            insert_item::<BoardLists>(conn, board, &id, position, policy, |slot| {
                let now = now_us();
                conn.execute(
                    "INSERT INTO lists (list_id, board_id, title, position, created_at_us, updated_at_us)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                    params![id, board, title, parked(slot), now],
                )?;
                Ok(())
            })?;
            query::require_list(conn, &id)
        })?;
        tracing::info!(list = %list.id, %board, position = list.position, "created list");
        Ok(list)
    }

    /// Rename a list.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Forbidden`, or `InvalidInput`.
    pub fn rename_list(&mut self, caller: &UserId, list: &ListId, title: &str) -> Result<BoardList> {
        let title = validate_title(title)?;
        self.write("rename_list", |conn, authorizer| {
            let board = ListCards::owning_board(conn, list)?;
            ensure_can_mutate(authorizer, conn, &board, caller)?;
            conn.execute(
                "UPDATE lists SET title = ?2, updated_at_us = ?3 WHERE list_id = ?1",
                params![list, title, now_us()],
            )?;
            query::require_list(conn, list)
        })
    }

    /// Delete a list and its cards, closing the gap on the board.
    ///
    /// # Errors
    ///
    /// `NotFound` or `Forbidden`.
    pub fn delete_list(&mut self, caller: &UserId, list: &ListId) -> Result<Removed> {
        let removed = self.write("delete_list", |conn, authorizer| {
            let board = ListCards::owning_board(conn, list)?;
            ensure_can_mutate(authorizer, conn, &board, caller)?;
            remove_item::<BoardLists>(conn, &board, list, || {
                conn.execute("DELETE FROM lists WHERE list_id = ?1", params![list])?;
                Ok(())
            })
        })?;
        tracing::info!(%list, board = %removed.container, shifted = removed.shifted, "deleted list");
        Ok(removed)
    }

    // -----------------------------------------------------------------------
    // Cards
    // -----------------------------------------------------------------------

    /// Add a card to `list`, appended or inserted at `position`.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Forbidden`, `InvalidInput`, or `PositionOutOfRange`.
    pub fn create_card(
        &mut self,
        caller: &UserId,
        list: &ListId,
        card: &NewCard,
        position: Option<i64>,
    ) -> Result<Card> {
        let title = validate_title(&card.title)?;
        let id = CardId::generate(&title);
        let policy = self.config.moves.out_of_range;
        let created = self.write("create_card", |conn, authorizer| {
            let board = ListCards::owning_board(conn, list)?;
            ensure_can_mutate(authorizer, conn, &board, caller)?;
            insert_item::<ListCards>(conn, list, &id, position, policy, |slot| {
                let now = now_us();
                conn.execute(
                    "INSERT INTO cards (card_id, list_id, title, description, priority, due_at_us,
                                        assignee_id, position, created_at_us, updated_at_us)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
                    params![
                        id,
                        list,
                        title,
                        card.description.trim(),
                        card.priority,
                        card.due_at_us,
                        card.assignee,
                        parked(slot),
                        now
                    ],
                )?;
                Ok(())
            })?;
            query::require_card(conn, &id)
        })?;
        tracing::info!(card = %created.id, %list, position = created.position, "created card");
        Ok(created)
    }

    /// A single card.
    ///
    /// # Errors
    ///
    /// `NotFound` or `Forbidden`.
    pub fn card(&self, caller: &UserId, card: &CardId) -> Result<Card> {
        let found = query::require_card(&self.conn, card)?;
        let board = ListCards::owning_board(&self.conn, &found.list_id)?;
        ensure_can_mutate(&self.authorizer, &self.conn, &board, caller)?;
        Ok(found)
    }

    /// Change a card's title, description, priority, or due date.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Forbidden`, or `InvalidInput`.
    pub fn update_card(&mut self, caller: &UserId, card: &CardId, patch: &CardPatch) -> Result<Card> {
        let title = patch.title.as_deref().map(validate_title).transpose()?;
        self.write("update_card", |conn, authorizer| {
            let current = authorize_card(conn, authorizer, caller, card)?;
            conn.execute(
                "UPDATE cards
                 SET title = ?2, description = ?3, priority = ?4, due_at_us = ?5, updated_at_us = ?6
                 WHERE card_id = ?1",
                params![
                    card,
                    title.as_deref().unwrap_or(&current.title),
                    patch
                        .description
                        .as_deref()
                        .map_or(current.description.as_str(), str::trim),
                    patch.priority.unwrap_or(current.priority),
                    patch.due_at_us.unwrap_or(current.due_at_us),
                    now_us()
                ],
            )?;
            query::require_card(conn, card)
        })
    }

    /// Assign a card to `assignee`, or clear the assignment with `None`.
    ///
    /// # Errors
    ///
    /// `NotFound` or `Forbidden`.
    pub fn assign_card(
        &mut self,
        caller: &UserId,
        card: &CardId,
        assignee: Option<&UserId>,
    ) -> Result<Card> {
        self.write("assign_card", |conn, authorizer| {
            authorize_card(conn, authorizer, caller, card)?;
            conn.execute(
                "UPDATE cards SET assignee_id = ?2, updated_at_us = ?3 WHERE card_id = ?1",
                params![card, assignee, now_us()],
            )?;
            query::require_card(conn, card)
        })
    }

    /// Delete a card, closing the gap in its list.
    ///
    /// # Errors
    ///
    /// `NotFound` or `Forbidden`.
    pub fn delete_card(&mut self, caller: &UserId, card: &CardId) -> Result<Removed> {
        let removed = self.write("delete_card", |conn, authorizer| {
            let current = authorize_card(conn, authorizer, caller, card)?;
            remove_item::<ListCards>(conn, &current.list_id, card, || {
                conn.execute("DELETE FROM cards WHERE card_id = ?1", params![card])?;
                Ok(())
            })
        })?;
        tracing::info!(%card, list = %removed.container, shifted = removed.shifted, "deleted card");
        Ok(removed)
    }

    /// Cards assigned to `user` on any board.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub fn cards_assigned_to(&self, user: &UserId) -> Result<Vec<Card>> {
        query::cards_assigned_to(&self.conn, user)
    }

    // -----------------------------------------------------------------------
    // Labels
    // -----------------------------------------------------------------------

    /// Create a label.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a blank name.
    pub fn create_label(&mut self, name: &str, color: &str) -> Result<Label> {
        let name = validate_name("name", name)?;
        let id = LabelId::generate(&name);
        self.write("create_label", |conn, _| {
            conn.execute(
                "INSERT INTO labels (label_id, name, color, created_at_us) VALUES (?1, ?2, ?3, ?4)",
                params![id, name, color.trim(), now_us()],
            )?;
            query::require_label(conn, &id)
        })
    }

    /// Every label, by name.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub fn labels(&self) -> Result<Vec<Label>> {
        query::list_labels(&self.conn)
    }

    /// Rename or recolor a label.
    ///
    /// # Errors
    ///
    /// `NotFound` or `InvalidInput`.
    pub fn update_label(
        &mut self,
        label: &LabelId,
        name: Option<&str>,
        color: Option<&str>,
    ) -> Result<Label> {
        let name = name.map(|raw| validate_name("name", raw)).transpose()?;
        self.write("update_label", |conn, _| {
            let current = query::require_label(conn, label)?;
            conn.execute(
                "UPDATE labels SET name = ?2, color = ?3 WHERE label_id = ?1",
                params![
                    label,
                    name.as_deref().unwrap_or(&current.name),
                    color.map_or(current.color.as_str(), str::trim)
                ],
            )?;
            query::require_label(conn, label)
        })
    }

    /// Delete a label.
    ///
    /// # Errors
    ///
    /// `NotFound` if the label does not exist.
    pub fn delete_label(&mut self, label: &LabelId) -> Result<()> {
        self.write("delete_label", |conn, _| {
            query::require_label(conn, label)?;
            conn.execute("DELETE FROM labels WHERE label_id = ?1", params![label])?;
            Ok(())
        })
    }
}

fn authorize_card<A: Authorizer>(
    conn: &Connection,
    authorizer: &A,
    caller: &UserId,
    card: &CardId,
) -> Result<Card> {
    let current = query::require_card(conn, card)?;
    let board = ListCards::owning_board(conn, &current.list_id)?;
    ensure_can_mutate(authorizer, conn, &board, caller)?;
    Ok(current)
}

/// Place a new item in `container`. `insert_row` receives the slot and must
/// write the row at [`parked`]`(slot)`; the commit then flips it into place
/// together with the siblings it displaced.
fn insert_item<K: ContainerKind>(
    conn: &Connection,
    container: &K::Container,
    item: &K::Item,
    position: Option<i64>,
    policy: OutOfRangePolicy,
    insert_row: impl FnOnce(usize) -> Result<()>,
) -> Result<usize> {
    let before: ContainerSnapshot<K> = store::load_container_items(conn, container)?;
    let slot = match position {
        Some(requested) => policy.resolve(requested, before.items.len())?,
        None => before.items.len(),
    };

    let mut after = before.items.clone();
    after.insert(item.clone(), slot)?;
    insert_row(slot)?;
    store::commit(conn, &before, &after)?;
    Ok(slot)
}

/// Remove `item` from `container` via `delete_row` and close the gap.
fn remove_item<K: ContainerKind>(
    conn: &Connection,
    container: &K::Container,
    item: &K::Item,
    delete_row: impl FnOnce() -> Result<()>,
) -> Result<Removed> {
    let before: ContainerSnapshot<K> = store::load_container_items(conn, container)?;
    let mut after = before.items.clone();
    let position = after.remove(item)?;
    delete_row()?;
    let committed = store::commit(conn, &before, &after)?;
    Ok(Removed {
        id: item.to_string(),
        container: container.to_string(),
        position,
        shifted: committed.changed,
    })
}
