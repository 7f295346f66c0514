//! `tk board`: create, inspect, edit, and delete boards, and reorder the
//! lists on a board.

use std::collections::BTreeMap;
use std::io::{self, Write};

use anyhow::Result;
use clap::{Args, Subcommand};
use tack_core::model::{BoardId, BoardView, ListId};
use tack_core::service::BoardPatch;

use super::{Context, format_us, parse_assignment, render_reorder};
use crate::output::{pretty_kv, pretty_section, render, render_mode};

#[derive(Args, Debug)]
pub struct BoardArgs {
    #[command(subcommand)]
    pub command: BoardCommand,
}

#[derive(Subcommand, Debug)]
pub enum BoardCommand {
    /// Create a board owned by the caller.
    Create {
        title: String,
        #[arg(long, short, default_value = "")]
        description: String,
    },
    /// List the caller's boards, most recently updated first.
    #[command(alias = "ls")]
    List,
    /// Show a board with its lists and cards in position order.
    Show { board: String },
    /// Change a board's title or description.
    Update {
        board: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long, short)]
        description: Option<String>,
    },
    /// Delete a board with all of its lists and cards.
    Delete { board: String },
    /// Re-assign list positions: `tk board reorder b-1 l-3=0 l-1=1`.
    Reorder {
        board: String,
        /// `LIST_ID=POSITION` pairs; unnamed lists fill the free slots.
        #[arg(required = true, value_parser = parse_assignment)]
        positions: Vec<(String, i64)>,
        /// Fail if the board's list order changed since this version.
        #[arg(long)]
        expected_version: Option<i64>,
    },
}

pub fn run_board(args: &BoardArgs, ctx: &Context<'_>) -> Result<()> {
    let caller = ctx.caller()?;
    let mut svc = ctx.open()?;

    match &args.command {
        BoardCommand::Create { title, description } => {
            let board = svc.create_board(&caller, title, description)?;
            render(ctx.output, &board, |b, w| {
                if ctx.output.is_pretty() {
                    writeln!(w, "✓ created board {} \"{}\"", b.id, b.title)
                } else {
                    writeln!(w, "{}", b.id)
                }
            })
        }
        BoardCommand::List => {
            let boards = svc.boards_for(&caller)?;
            render_mode(
                ctx.output,
                &boards,
                |boards, w| {
                    for b in boards {
                        writeln!(w, "{}\t{}\t{}", b.id, b.lists_version, b.title)?;
                    }
                    Ok(())
                },
                |boards, w| {
                    if boards.is_empty() {
                        return writeln!(w, "No boards yet. Create one with `tk board create`.");
                    }
                    pretty_section(w, "Boards")?;
                    for b in boards {
                        writeln!(w, "{:<14} {:<32} {}", b.id, b.title, format_us(b.updated_at_us))?;
                    }
                    Ok(())
                },
            )
        }
        BoardCommand::Show { board } => {
            let view = svc.board(&caller, &BoardId::new(board.as_str()))?;
            render_mode(ctx.output, &view, write_view_rows, write_view_pretty)
        }
        BoardCommand::Update {
            board,
            title,
            description,
        } => {
            let patch = BoardPatch {
                title: title.clone(),
                description: description.clone(),
            };
            let updated = svc.update_board(&caller, &BoardId::new(board.as_str()), &patch)?;
            render(ctx.output, &updated, |b, w| writeln!(w, "✓ updated board {}", b.id))
        }
        BoardCommand::Delete { board } => {
            let id = BoardId::new(board.as_str());
            svc.delete_board(&caller, &id)?;
            let value = serde_json::json!({ "ok": true, "deleted": id.as_str() });
            render(ctx.output, &value, |_, w| writeln!(w, "✓ deleted board {id}"))
        }
        BoardCommand::Reorder {
            board,
            positions,
            expected_version,
        } => {
            let mapping: BTreeMap<ListId, i64> = positions
                .iter()
                .map(|(id, position)| (ListId::new(id.as_str()), *position))
                .collect();
            let outcome = svc.reorder_lists(
                &caller,
                &BoardId::new(board.as_str()),
                &mapping,
                *expected_version,
            )?;
            render_reorder(ctx.output, &outcome)
        }
    }
}

fn write_view_rows(view: &BoardView, w: &mut dyn Write) -> io::Result<()> {
    for lv in &view.lists {
        writeln!(w, "{}\t{}\t{}", lv.list.position, lv.list.id, lv.list.title)?;
        for card in &lv.cards {
            writeln!(w, "{}.{}\t{}\t{}", lv.list.position, card.position, card.id, card.title)?;
        }
    }
    Ok(())
}

fn write_view_pretty(view: &BoardView, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(w, &format!("{} ({})", view.board.title, view.board.id))?;
    if !view.board.description.is_empty() {
        writeln!(w, "{}", view.board.description)?;
    }
    pretty_kv(w, "owner", view.board.owner.as_str())?;
    pretty_kv(w, "version", view.board.lists_version.to_string())?;
    for lv in &view.lists {
        writeln!(w)?;
        writeln!(w, "[{}] {} ({})", lv.list.position, lv.list.title, lv.list.id)?;
        if lv.cards.is_empty() {
            writeln!(w, "      (empty)")?;
        }
        for card in &lv.cards {
            let assignee = card
                .assignee
                .as_ref()
                .map(|u| format!("  @{u}"))
                .unwrap_or_default();
            writeln!(
                w,
                "  {:>3}  {:<14} {} [{}]{assignee}",
                card.position, card.id, card.title, card.priority
            )?;
        }
    }
    Ok(())
}
