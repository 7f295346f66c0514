//! `tk card`: create, edit, assign, move, and delete cards.

use std::io::{self, Write};

use anyhow::Result;
use clap::{Args, Subcommand};
use tack_core::db::query;
use tack_core::model::{Card, CardId, ListId, Priority, UserId};
use tack_core::service::{CardPatch, NewCard};

use super::{Context, format_us, parse_due, render_move};
use crate::output::{pretty_kv, pretty_section, render, render_mode};

#[derive(Args, Debug)]
pub struct CardArgs {
    #[command(subcommand)]
    pub command: CardCommand,
}

#[derive(Subcommand, Debug)]
pub enum CardCommand {
    /// Add a card to a list; appended unless `--position` is given.
    Create {
        list: String,
        title: String,
        #[arg(long, short, default_value = "")]
        description: String,
        /// low | medium | high
        #[arg(long, short, value_parser = parse_priority, default_value = "medium")]
        priority: Priority,
        /// Due date: YYYY-MM-DD or RFC 3339.
        #[arg(long, value_parser = parse_due)]
        due: Option<i64>,
        #[arg(long)]
        assignee: Option<String>,
        #[arg(long)]
        position: Option<i64>,
    },
    /// Show one card.
    Show { card: String },
    /// Change a card's title, description, priority, or due date.
    Update {
        card: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long, short)]
        description: Option<String>,
        #[arg(long, short, value_parser = parse_priority)]
        priority: Option<Priority>,
        #[arg(long, value_parser = parse_due, conflicts_with = "no_due")]
        due: Option<i64>,
        /// Clear the due date.
        #[arg(long)]
        no_due: bool,
    },
    /// Assign a card to USER, or clear the assignment with `--none`.
    Assign {
        card: String,
        #[arg(value_name = "USER", required_unless_present = "none", conflicts_with = "none")]
        assignee: Option<String>,
        #[arg(long)]
        none: bool,
    },
    /// Delete a card; later cards in its list shift up.
    Delete { card: String },
    /// Move a card to POSITION in its list, or in `--to` another list.
    Move {
        card: String,
        #[arg(allow_negative_numbers = true)]
        position: i64,
        /// Target list; defaults to the card's current list.
        #[arg(long)]
        to: Option<String>,
    },
    /// Cards assigned to a user (default: the caller), soonest due first.
    Assigned {
        #[arg(long, value_name = "USER")]
        assignee: Option<String>,
    },
}

fn parse_priority(raw: &str) -> Result<Priority, String> {
    raw.parse().map_err(|err: tack_core::TackError| err.to_string())
}

pub fn run_card(args: &CardArgs, ctx: &Context<'_>) -> Result<()> {
    let caller = ctx.caller()?;
    let mut svc = ctx.open()?;

    match &args.command {
        CardCommand::Create {
            list,
            title,
            description,
            priority,
            due,
            assignee,
            position,
        } => {
            let card = NewCard {
                title: title.clone(),
                description: description.clone(),
                priority: *priority,
                due_at_us: *due,
                assignee: assignee.as_deref().map(UserId::new),
            };
            let created =
                svc.create_card(&caller, &ListId::new(list.as_str()), &card, *position)?;
            render(ctx.output, &created, |c, w| {
                if ctx.output.is_pretty() {
                    writeln!(w, "✓ created card {} \"{}\" at {}", c.id, c.title, c.position)
                } else {
                    writeln!(w, "{}\t{}", c.id, c.position)
                }
            })
        }
        CardCommand::Show { card } => {
            let found = svc.card(&caller, &CardId::new(card.as_str()))?;
            render_mode(
                ctx.output,
                &found,
                |c, w| write_card_row(w, c),
                |c, w| write_card_pretty(w, c),
            )
        }
        CardCommand::Update {
            card,
            title,
            description,
            priority,
            due,
            no_due,
        } => {
            let patch = CardPatch {
                title: title.clone(),
                description: description.clone(),
                priority: *priority,
                due_at_us: if *no_due { Some(None) } else { due.map(Some) },
            };
            let updated = svc.update_card(&caller, &CardId::new(card.as_str()), &patch)?;
            render(ctx.output, &updated, |c, w| writeln!(w, "✓ updated card {}", c.id))
        }
        CardCommand::Assign {
            card,
            assignee,
            none,
        } => {
            let assignee = if *none {
                None
            } else {
                assignee.as_deref().map(UserId::new)
            };
            let updated =
                svc.assign_card(&caller, &CardId::new(card.as_str()), assignee.as_ref())?;
            render(ctx.output, &updated, |c, w| match &c.assignee {
                Some(user) => writeln!(w, "✓ assigned {} to {user}", c.id),
                None => writeln!(w, "✓ unassigned {}", c.id),
            })
        }
        CardCommand::Delete { card } => {
            let removed = svc.delete_card(&caller, &CardId::new(card.as_str()))?;
            render(ctx.output, &removed, |r, w| {
                writeln!(
                    w,
                    "✓ deleted card {} from {} ({} shifted)",
                    r.id, r.container, r.shifted
                )
            })
        }
        CardCommand::Move { card, position, to } => {
            let id = CardId::new(card.as_str());
            let target = match to {
                Some(list) => ListId::new(list.as_str()),
                None => query::require_card(svc.connection(), &id)?.list_id,
            };
            let outcome = svc.move_card(&caller, &id, &target, *position)?;
            render_move(ctx.output, "card", &outcome)
        }
        CardCommand::Assigned { assignee } => {
            let who = assignee.as_deref().map_or_else(|| caller.clone(), UserId::new);
            let cards = svc.cards_assigned_to(&who)?;
            render_mode(
                ctx.output,
                &cards,
                |cards, w| {
                    for c in cards {
                        write_card_row(w, c)?;
                    }
                    Ok(())
                },
                |cards, w| {
                    pretty_section(w, &format!("Assigned to {who}"))?;
                    if cards.is_empty() {
                        writeln!(w, "  (nothing)")?;
                    }
                    for c in cards {
                        let due = c.due_at_us.map(format_us).unwrap_or_default();
                        writeln!(w, "{:<14} {:<16} {} [{}]", c.id, due, c.title, c.priority)?;
                    }
                    Ok(())
                },
            )
        }
    }
}

fn write_card_row(w: &mut dyn Write, c: &Card) -> io::Result<()> {
    writeln!(
        w,
        "{}\t{}\t{}\t{}\t{}\t{}",
        c.id,
        c.list_id,
        c.position,
        c.priority,
        c.assignee.as_ref().map(UserId::as_str).unwrap_or("-"),
        c.title
    )
}

fn write_card_pretty(w: &mut dyn Write, c: &Card) -> io::Result<()> {
    pretty_section(w, &format!("{} ({})", c.title, c.id))?;
    pretty_kv(w, "list", format!("{} @ {}", c.list_id, c.position))?;
    pretty_kv(w, "priority", c.priority.as_str())?;
    if let Some(due) = c.due_at_us {
        pretty_kv(w, "due", format_us(due))?;
    }
    if let Some(assignee) = &c.assignee {
        pretty_kv(w, "assignee", assignee.as_str())?;
    }
    pretty_kv(w, "updated", format_us(c.updated_at_us))?;
    if !c.description.is_empty() {
        writeln!(w)?;
        writeln!(w, "{}", c.description)?;
    }
    Ok(())
}
