//! Command handlers for `tk`.
//!
//! Each handler takes its parsed args and a [`Context`], runs one service
//! call, and renders the result. Errors are returned untouched; `main`
//! renders them once in the active output mode.

pub mod board;
pub mod card;
pub mod check;
pub mod init;
pub mod label;
pub mod list;

use std::io::{self, Write};
use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use tack_core::Service;
use tack_core::model::UserId;
use tack_core::service::{MoveOutcome, ReorderOutcome};

use crate::output::{OutputMode, pretty_kv, render};
use crate::user;

/// Everything a handler needs besides its own args.
#[derive(Debug, Clone, Copy)]
pub struct Context<'a> {
    pub root: &'a Path,
    pub output: OutputMode,
    user_flag: Option<&'a str>,
    configured_user: Option<&'a str>,
}

impl<'a> Context<'a> {
    pub const fn new(
        root: &'a Path,
        output: OutputMode,
        user_flag: Option<&'a str>,
        configured_user: Option<&'a str>,
    ) -> Self {
        Self {
            root,
            output,
            user_flag,
            configured_user,
        }
    }

    /// Open the store under the project root.
    pub fn open(&self) -> Result<Service> {
        Service::open(self.root)
    }

    /// The caller's identity; required by every board-scoped command.
    pub fn caller(&self) -> Result<UserId> {
        Ok(user::require_user(self.user_flag, self.configured_user)?)
    }
}

/// Parse an `ID=POSITION` reorder entry.
pub fn parse_assignment(raw: &str) -> Result<(String, i64), String> {
    let (id, position) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected ID=POSITION, got '{raw}'"))?;
    let id = id.trim();
    if id.is_empty() {
        return Err(format!("missing id in '{raw}'"));
    }
    let position = position
        .trim()
        .parse::<i64>()
        .map_err(|err| format!("bad position in '{raw}': {err}"))?;
    Ok((id.to_string(), position))
}

/// Parse a due date: `YYYY-MM-DD` (midnight UTC) or RFC 3339. Returns
/// microseconds since the epoch.
pub fn parse_due(raw: &str) -> Result<i64, String> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        let midnight = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| format!("invalid date '{raw}'"))?;
        return Ok(Utc.from_utc_datetime(&midnight).timestamp_micros());
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.timestamp_micros())
        .map_err(|_| format!("expected YYYY-MM-DD or an RFC 3339 timestamp, got '{raw}'"))
}

/// Format stored microseconds for humans.
pub fn format_us(us: i64) -> String {
    DateTime::<Utc>::from_timestamp_micros(us)
        .map_or_else(|| us.to_string(), |dt| dt.format("%Y-%m-%d %H:%M").to_string())
}

pub fn render_move(output: OutputMode, kind: &str, outcome: &MoveOutcome) -> Result<()> {
    render(output, outcome, |o, w| write_move(w, output, kind, o))
}

fn write_move(
    w: &mut dyn Write,
    output: OutputMode,
    kind: &str,
    o: &MoveOutcome,
) -> io::Result<()> {
    if !output.is_pretty() {
        return writeln!(
            w,
            "{}\t{}\t{}\t{}\t{}\t{}",
            o.item, o.source, o.target, o.from, o.to, o.changed
        );
    }
    if o.noop {
        return writeln!(w, "{kind} {} already at {} in {}", o.item, o.to, o.target);
    }
    if o.source == o.target {
        writeln!(w, "✓ moved {kind} {} from {} to {}", o.item, o.from, o.to)?;
    } else {
        writeln!(
            w,
            "✓ moved {kind} {} from {}[{}] to {}[{}]",
            o.item, o.source, o.from, o.target, o.to
        )?;
    }
    pretty_kv(w, "rows", o.changed.to_string())
}

pub fn render_reorder(output: OutputMode, outcome: &ReorderOutcome) -> Result<()> {
    render(output, outcome, |o, w| {
        if output.is_pretty() {
            writeln!(w, "✓ reordered {} (version {})", o.container, o.version)?;
            for (position, item) in o.order.iter().enumerate() {
                writeln!(w, "  {position:>3}  {item}")?;
            }
            if !o.skipped.is_empty() {
                pretty_kv(w, "skipped", o.skipped.join(", "))?;
            }
            Ok(())
        } else {
            for (position, item) in o.order.iter().enumerate() {
                writeln!(w, "{position}\t{item}")?;
            }
            Ok(())
        }
    })
}
