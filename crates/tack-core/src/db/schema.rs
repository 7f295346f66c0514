//! Canonical SQLite schema for the board store.
//!
//! Boards contain lists and lists contain cards. Each container row carries
//! a version stamp (`boards.lists_version`, `lists.cards_version`) that is
//! bumped whenever the positions of its items change.
//!
//! Positions are unique per container through the `idx_*_position`
//! indexes. Writers park changed rows at `-(position + 1)` and then flip
//! every negative row of the container back in one statement, so the
//! column deliberately has no `CHECK (position >= 0)`.

/// Migration v1: core tables.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS store_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL,
    created_at_us INTEGER NOT NULL
);

INSERT OR IGNORE INTO store_meta (id, schema_version, created_at_us)
VALUES (1, 0, CAST(strftime('%s', 'now') AS INTEGER) * 1000000);

CREATE TABLE IF NOT EXISTS boards (
    board_id TEXT PRIMARY KEY,
    title TEXT NOT NULL CHECK (length(trim(title)) > 0),
    description TEXT NOT NULL DEFAULT '',
    owner_id TEXT NOT NULL CHECK (length(trim(owner_id)) > 0),
    lists_version INTEGER NOT NULL DEFAULT 0,
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS lists (
    list_id TEXT PRIMARY KEY,
    board_id TEXT NOT NULL REFERENCES boards(board_id) ON DELETE CASCADE,
    title TEXT NOT NULL CHECK (length(trim(title)) > 0),
    position INTEGER NOT NULL,
    cards_version INTEGER NOT NULL DEFAULT 0,
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS cards (
    card_id TEXT PRIMARY KEY,
    list_id TEXT NOT NULL REFERENCES lists(list_id) ON DELETE CASCADE,
    title TEXT NOT NULL CHECK (length(trim(title)) > 0),
    description TEXT NOT NULL DEFAULT '',
    priority TEXT NOT NULL DEFAULT 'medium'
        CHECK (priority IN ('low', 'medium', 'high')),
    due_at_us INTEGER,
    assignee_id TEXT,
    position INTEGER NOT NULL,
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS labels (
    label_id TEXT PRIMARY KEY,
    name TEXT NOT NULL CHECK (length(trim(name)) > 0),
    color TEXT NOT NULL DEFAULT '',
    created_at_us INTEGER NOT NULL
);
";

/// Migration v2: position uniqueness and lookup indexes.
pub const MIGRATION_V2_SQL: &str = r"
CREATE UNIQUE INDEX IF NOT EXISTS idx_lists_board_position
    ON lists(board_id, position);

CREATE UNIQUE INDEX IF NOT EXISTS idx_cards_list_position
    ON cards(list_id, position);

CREATE INDEX IF NOT EXISTS idx_boards_owner
    ON boards(owner_id, updated_at_us DESC);

CREATE INDEX IF NOT EXISTS idx_cards_assignee
    ON cards(assignee_id)
    WHERE assignee_id IS NOT NULL;
";

/// Indexes expected by the query layer and the write path.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_lists_board_position",
    "idx_cards_list_position",
    "idx_boards_owner",
    "idx_cards_assignee",
];
