//! Typed read helpers for boards, lists, cards, and labels.
//!
//! Every function takes a shared `&Connection` (a `Transaction` derefs to
//! one) and returns typed model structs, never raw rows. Ordered reads
//! always sort by `position` with the id as tie-break.

use rusqlite::{Connection, OptionalExtension, params};

use crate::error::{Result, TackError};
use crate::model::{
    Board, BoardId, BoardList, BoardView, Card, CardId, Label, LabelId, ListId, ListView, UserId,
};

const BOARD_COLUMNS: &str =
    "board_id, title, description, owner_id, lists_version, created_at_us, updated_at_us";

const LIST_COLUMNS: &str =
    "list_id, board_id, title, position, cards_version, created_at_us, updated_at_us";

const CARD_COLUMNS: &str = "card_id, list_id, title, description, priority, due_at_us, \
     assignee_id, position, created_at_us, updated_at_us";

// ---------------------------------------------------------------------------
// Boards
// ---------------------------------------------------------------------------

/// Fetch a board by id.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_board(conn: &Connection, board_id: &BoardId) -> Result<Option<Board>> {
    let sql = format!("SELECT {BOARD_COLUMNS} FROM boards WHERE board_id = ?1");
    Ok(conn
        .query_row(&sql, params![board_id], row_to_board)
        .optional()?)
}

/// Fetch a board, failing with [`TackError::NotFound`] if absent.
///
/// # Errors
///
/// Returns [`TackError::NotFound`] or a persistence error.
pub fn require_board(conn: &Connection, board_id: &BoardId) -> Result<Board> {
    get_board(conn, board_id)?.ok_or_else(|| TackError::not_found("board", board_id))
}

/// Boards owned by `owner`, most recently updated first.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn boards_owned_by(conn: &Connection, owner: &UserId) -> Result<Vec<Board>> {
    let sql = format!(
        "SELECT {BOARD_COLUMNS} FROM boards WHERE owner_id = ?1 \
         ORDER BY updated_at_us DESC, board_id ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![owner], row_to_board)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// A board with its lists and their cards, all in position order.
///
/// # Errors
///
/// Returns [`TackError::NotFound`] if the board does not exist.
pub fn board_view(conn: &Connection, board_id: &BoardId) -> Result<BoardView> {
    let board = require_board(conn, board_id)?;
    let lists = lists_for_board(conn, board_id)?
        .into_iter()
        .map(|list| -> Result<ListView> {
            let cards = cards_for_list(conn, &list.id)?;
            Ok(ListView { list, cards })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(BoardView { board, lists })
}

// ---------------------------------------------------------------------------
// Lists
// ---------------------------------------------------------------------------

/// Fetch a list by id.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_list(conn: &Connection, list_id: &ListId) -> Result<Option<BoardList>> {
    let sql = format!("SELECT {LIST_COLUMNS} FROM lists WHERE list_id = ?1");
    Ok(conn
        .query_row(&sql, params![list_id], row_to_list)
        .optional()?)
}

/// Fetch a list, failing with [`TackError::NotFound`] if absent.
///
/// # Errors
///
/// Returns [`TackError::NotFound`] or a persistence error.
pub fn require_list(conn: &Connection, list_id: &ListId) -> Result<BoardList> {
    get_list(conn, list_id)?.ok_or_else(|| TackError::not_found("list", list_id))
}

/// Lists of a board in position order.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn lists_for_board(conn: &Connection, board_id: &BoardId) -> Result<Vec<BoardList>> {
    let sql = format!(
        "SELECT {LIST_COLUMNS} FROM lists WHERE board_id = ?1 ORDER BY position ASC, list_id ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![board_id], row_to_list)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Cards
// ---------------------------------------------------------------------------

/// Fetch a card by id.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_card(conn: &Connection, card_id: &CardId) -> Result<Option<Card>> {
    let sql = format!("SELECT {CARD_COLUMNS} FROM cards WHERE card_id = ?1");
    Ok(conn
        .query_row(&sql, params![card_id], row_to_card)
        .optional()?)
}

/// Fetch a card, failing with [`TackError::NotFound`] if absent.
///
/// # Errors
///
/// Returns [`TackError::NotFound`] or a persistence error.
pub fn require_card(conn: &Connection, card_id: &CardId) -> Result<Card> {
    get_card(conn, card_id)?.ok_or_else(|| TackError::not_found("card", card_id))
}

/// Cards of a list in position order.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn cards_for_list(conn: &Connection, list_id: &ListId) -> Result<Vec<Card>> {
    let sql = format!(
        "SELECT {CARD_COLUMNS} FROM cards WHERE list_id = ?1 ORDER BY position ASC, card_id ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![list_id], row_to_card)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Cards assigned to `user` across every board, soonest due first.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn cards_assigned_to(conn: &Connection, user: &UserId) -> Result<Vec<Card>> {
    let sql = format!(
        "SELECT {CARD_COLUMNS} FROM cards WHERE assignee_id = ?1 \
         ORDER BY due_at_us IS NULL, due_at_us ASC, updated_at_us DESC, card_id ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![user], row_to_card)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Labels
// ---------------------------------------------------------------------------

/// Fetch a label, failing with [`TackError::NotFound`] if absent.
///
/// # Errors
///
/// Returns [`TackError::NotFound`] or a persistence error.
pub fn require_label(conn: &Connection, label_id: &LabelId) -> Result<Label> {
    conn.query_row(
        "SELECT label_id, name, color, created_at_us FROM labels WHERE label_id = ?1",
        params![label_id],
        row_to_label,
    )
    .optional()?
    .ok_or_else(|| TackError::not_found("label", label_id))
}

/// Every label, by name.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn list_labels(conn: &Connection) -> Result<Vec<Label>> {
    let mut stmt = conn.prepare(
        "SELECT label_id, name, color, created_at_us FROM labels ORDER BY name ASC, label_id ASC",
    )?;
    let rows = stmt
        .query_map([], row_to_label)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Row mappers
// ---------------------------------------------------------------------------

fn row_to_board(row: &rusqlite::Row<'_>) -> rusqlite::Result<Board> {
    Ok(Board {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        owner: row.get(3)?,
        lists_version: row.get(4)?,
        created_at_us: row.get(5)?,
        updated_at_us: row.get(6)?,
    })
}

fn row_to_list(row: &rusqlite::Row<'_>) -> rusqlite::Result<BoardList> {
    Ok(BoardList {
        id: row.get(0)?,
        board_id: row.get(1)?,
        title: row.get(2)?,
        position: row.get(3)?,
        cards_version: row.get(4)?,
        created_at_us: row.get(5)?,
        updated_at_us: row.get(6)?,
    })
}

fn row_to_card(row: &rusqlite::Row<'_>) -> rusqlite::Result<Card> {
    Ok(Card {
        id: row.get(0)?,
        list_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        priority: row.get(4)?,
        due_at_us: row.get(5)?,
        assignee: row.get(6)?,
        position: row.get(7)?,
        created_at_us: row.get(8)?,
        updated_at_us: row.get(9)?,
    })
}

fn row_to_label(row: &rusqlite::Row<'_>) -> rusqlite::Result<Label> {
    Ok(Label {
        id: row.get(0)?,
        name: row.get(1)?,
        color: row.get(2)?,
        created_at_us: row.get(3)?,
    })
}
