//! `tk list`: manage the lists on a board, move them, and reorder their
//! cards.

use std::collections::BTreeMap;

use anyhow::Result;
use clap::{Args, Subcommand};
use tack_core::db::query;
use tack_core::model::{BoardId, CardId, ListId};

use super::{Context, parse_assignment, render_move, render_reorder};
use crate::output::render;

#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(subcommand)]
    pub command: ListCommand,
}

#[derive(Subcommand, Debug)]
pub enum ListCommand {
    /// Add a list to a board; appended unless `--position` is given.
    Create {
        board: String,
        title: String,
        #[arg(long)]
        position: Option<i64>,
    },
    /// Rename a list.
    Rename { list: String, title: String },
    /// Delete a list and its cards; later lists shift up.
    Delete { list: String },
    /// Move a list to POSITION on its board, or on `--to` another board.
    Move {
        list: String,
        #[arg(allow_negative_numbers = true)]
        position: i64,
        /// Target board; defaults to the list's current board.
        #[arg(long)]
        to: Option<String>,
    },
    /// Re-assign card positions: `tk list reorder l-1 c-9=0 c-2=1`.
    Reorder {
        list: String,
        /// `CARD_ID=POSITION` pairs; unnamed cards fill the free slots.
        #[arg(required = true, value_parser = parse_assignment)]
        positions: Vec<(String, i64)>,
        /// Fail if the list's card order changed since this version.
        #[arg(long)]
        expected_version: Option<i64>,
    },
}

pub fn run_list(args: &ListArgs, ctx: &Context<'_>) -> Result<()> {
    let caller = ctx.caller()?;
    let mut svc = ctx.open()?;

    match &args.command {
        ListCommand::Create {
            board,
            title,
            position,
        } => {
            let list = svc.create_list(&caller, &BoardId::new(board.as_str()), title, *position)?;
            render(ctx.output, &list, |l, w| {
                if ctx.output.is_pretty() {
                    writeln!(w, "✓ created list {} \"{}\" at {}", l.id, l.title, l.position)
                } else {
                    writeln!(w, "{}\t{}", l.id, l.position)
                }
            })
        }
        ListCommand::Rename { list, title } => {
            let renamed = svc.rename_list(&caller, &ListId::new(list.as_str()), title)?;
            render(ctx.output, &renamed, |l, w| {
                writeln!(w, "✓ renamed list {} to \"{}\"", l.id, l.title)
            })
        }
        ListCommand::Delete { list } => {
            let removed = svc.delete_list(&caller, &ListId::new(list.as_str()))?;
            render(ctx.output, &removed, |r, w| {
                writeln!(
                    w,
                    "✓ deleted list {} from {} ({} shifted)",
                    r.id, r.container, r.shifted
                )
            })
        }
        ListCommand::Move { list, position, to } => {
            let id = ListId::new(list.as_str());
            let target = match to {
                Some(board) => BoardId::new(board.as_str()),
                None => query::require_list(svc.connection(), &id)?.board_id,
            };
            let outcome = svc.move_list(&caller, &id, &target, *position)?;
            render_move(ctx.output, "list", &outcome)
        }
        ListCommand::Reorder {
            list,
            positions,
            expected_version,
        } => {
            let mapping: BTreeMap<CardId, i64> = positions
                .iter()
                .map(|(id, position)| (CardId::new(id.as_str()), *position))
                .collect();
            let outcome = svc.reorder_cards(
                &caller,
                &ListId::new(list.as_str()),
                &mapping,
                *expected_version,
            )?;
            render_reorder(ctx.output, &outcome)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: ListArgs,
    }

    #[test]
    fn move_defaults_to_current_board() {
        let w = Wrapper::parse_from(["test", "move", "l-1", "2"]);
        match w.args.command {
            ListCommand::Move { list, position, to } => {
                assert_eq!(list, "l-1");
                assert_eq!(position, 2);
                assert!(to.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn reorder_collects_pairs() {
        let w = Wrapper::parse_from(["test", "reorder", "l-1", "c-b=0", "c-a=1"]);
        match w.args.command {
            ListCommand::Reorder { positions, .. } => {
                assert_eq!(
                    positions,
                    vec![("c-b".to_string(), 0), ("c-a".to_string(), 1)]
                );
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn reorder_rejects_malformed_pairs() {
        assert!(Wrapper::try_parse_from(["test", "reorder", "l-1", "c-b"]).is_err());
    }
}
