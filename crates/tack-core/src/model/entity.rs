use rusqlite::ToSql;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::ids::{BoardId, CardId, LabelId, ListId, UserId};
use crate::error::TackError;

/// Longest title accepted for boards, lists, and cards.
pub const MAX_TITLE_LEN: usize = 200;

/// Card priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = TackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" | "med" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(TackError::InvalidInput {
                field: "priority",
                reason: format!("unknown priority '{other}': expected low, medium, or high"),
            }),
        }
    }
}

impl ToSql for Priority {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Priority {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|err: TackError| FromSqlError::Other(Box::new(err)))
    }
}

/// Trim `raw` and check it is a usable title.
///
/// # Errors
///
/// Returns [`TackError::InvalidInput`] for blank or over-long titles.
pub fn validate_title(raw: &str) -> Result<String, TackError> {
    validate_name("title", raw)
}

/// Trim `raw` and check it is non-blank and at most [`MAX_TITLE_LEN`]
/// characters, reporting failures against `field`.
///
/// # Errors
///
/// Returns [`TackError::InvalidInput`] naming `field`.
pub fn validate_name(field: &'static str, raw: &str) -> Result<String, TackError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(TackError::InvalidInput {
            field,
            reason: "must not be empty".into(),
        });
    }
    if name.chars().count() > MAX_TITLE_LEN {
        return Err(TackError::InvalidInput {
            field,
            reason: format!("must be at most {MAX_TITLE_LEN} characters"),
        });
    }
    Ok(name.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Board {
    pub id: BoardId,
    pub title: String,
    pub description: String,
    pub owner: UserId,
    /// Bumped whenever the positions of this board's lists change.
    pub lists_version: i64,
    pub created_at_us: i64,
    pub updated_at_us: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoardList {
    pub id: ListId,
    pub board_id: BoardId,
    pub title: String,
    pub position: i64,
    /// Bumped whenever the positions of this list's cards change.
    pub cards_version: i64,
    pub created_at_us: i64,
    pub updated_at_us: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Card {
    pub id: CardId,
    pub list_id: ListId,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub due_at_us: Option<i64>,
    pub assignee: Option<UserId>,
    pub position: i64,
    pub created_at_us: i64,
    pub updated_at_us: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Label {
    pub id: LabelId,
    pub name: String,
    pub color: String,
    pub created_at_us: i64,
}

/// A list together with its cards in position order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListView {
    #[serde(flatten)]
    pub list: BoardList,
    pub cards: Vec<Card>,
}

/// A board with every list and card, for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoardView {
    #[serde(flatten)]
    pub board: Board,
    pub lists: Vec<ListView>,
}

#[cfg(test)]
mod tests {
    use super::{MAX_TITLE_LEN, Priority, validate_name, validate_title};
    use crate::error::TackError;

    #[test]
    fn priority_parse_aliases_and_case() {
        assert_eq!("HIGH".parse::<Priority>().ok(), Some(Priority::High));
        assert_eq!(" med ".parse::<Priority>().ok(), Some(Priority::Medium));
        assert!("urgent".parse::<Priority>().is_err());
        assert_eq!(Priority::default(), Priority::Medium);
    }

    #[test]
    fn title_validation() {
        assert_eq!(validate_title("  Backlog ").ok().as_deref(), Some("Backlog"));
        assert!(validate_title("   ").is_err());
        assert!(validate_title(&"x".repeat(MAX_TITLE_LEN)).is_ok());
        assert!(validate_title(&"x".repeat(MAX_TITLE_LEN + 1)).is_err());
    }

    #[test]
    fn name_errors_report_their_field() {
        let err = validate_name("name", "").unwrap_err();
        assert!(matches!(err, TackError::InvalidInput { field: "name", .. }));
    }
}
