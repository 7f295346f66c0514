//! Opaque identifiers for boards, lists, cards, labels, and users.
//!
//! Generated ids are `<prefix>-<10 hex chars>`, taken from a blake3 digest
//! of the creation inputs, the wall clock, the process id, and a process-
//! wide counter. Ids are never parsed for meaning.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use rusqlite::ToSql;
use rusqlite::types::{FromSql, FromSqlResult, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

const ID_HASH_LEN: usize = 10;

fn mint(prefix: &str, salt: &str) -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let mut hasher = blake3::Hasher::new();
    hasher.update(prefix.as_bytes());
    hasher.update(salt.as_bytes());
    hasher.update(
        &chrono::Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or_default()
            .to_le_bytes(),
    );
    hasher.update(&std::process::id().to_le_bytes());
    hasher.update(&COUNTER.fetch_add(1, Ordering::Relaxed).to_le_bytes());
    let digest = hasher.finalize().to_hex();
    format!("{prefix}-{}", &digest.as_str()[..ID_HASH_LEN])
}

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub const PREFIX: &'static str = $prefix;

            /// Mint a fresh id. `salt` only widens the hash input.
            #[must_use]
            pub fn generate(salt: &str) -> Self {
                Self(mint(Self::PREFIX, salt))
            }

            /// Wrap an existing id without validation.
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.pad(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                Self(raw.to_string())
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                Self(raw)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                self.0.to_sql()
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                String::column_result(value).map(Self)
            }
        }
    };
}

define_id!(
    /// A board: the container of lists.
    BoardId,
    "b"
);
define_id!(
    /// A list: an item of a board and the container of cards.
    ListId,
    "l"
);
define_id!(
    /// A card: an item of a list.
    CardId,
    "c"
);
define_id!(LabelId, "lb");
define_id!(
    /// The caller on whose behalf an operation runs. Supplied by the
    /// embedding application; never generated for real users.
    UserId,
    "u"
);
