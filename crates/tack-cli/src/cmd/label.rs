//! `tk label`: the shared label catalog.

use anyhow::Result;
use clap::{Args, Subcommand};
use tack_core::model::LabelId;

use super::Context;
use crate::output::{pretty_section, render, render_mode};

#[derive(Args, Debug)]
pub struct LabelArgs {
    #[command(subcommand)]
    pub command: LabelCommand,
}

#[derive(Subcommand, Debug)]
pub enum LabelCommand {
    /// Create a label.
    Create {
        name: String,
        #[arg(long, short, default_value = "")]
        color: String,
    },
    /// List every label by name.
    #[command(alias = "ls")]
    List,
    /// Rename or recolor a label.
    Update {
        label: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, short)]
        color: Option<String>,
    },
    /// Delete a label.
    Delete { label: String },
}

pub fn run_label(args: &LabelArgs, ctx: &Context<'_>) -> Result<()> {
    let mut svc = ctx.open()?;

    match &args.command {
        LabelCommand::Create { name, color } => {
            let label = svc.create_label(name, color)?;
            render(ctx.output, &label, |l, w| {
                if ctx.output.is_pretty() {
                    writeln!(w, "✓ created label {} \"{}\"", l.id, l.name)
                } else {
                    writeln!(w, "{}", l.id)
                }
            })
        }
        LabelCommand::List => {
            let labels = svc.labels()?;
            render_mode(
                ctx.output,
                &labels,
                |labels, w| {
                    for l in labels {
                        writeln!(w, "{}\t{}\t{}", l.id, l.name, l.color)?;
                    }
                    Ok(())
                },
                |labels, w| {
                    pretty_section(w, "Labels")?;
                    if labels.is_empty() {
                        writeln!(w, "  (none)")?;
                    }
                    for l in labels {
                        writeln!(w, "{:<14} {:<24} {}", l.id, l.name, l.color)?;
                    }
                    Ok(())
                },
            )
        }
        LabelCommand::Update { label, name, color } => {
            let updated = svc.update_label(
                &LabelId::new(label.as_str()),
                name.as_deref(),
                color.as_deref(),
            )?;
            render(ctx.output, &updated, |l, w| writeln!(w, "✓ updated label {}", l.id))
        }
        LabelCommand::Delete { label } => {
            let id = LabelId::new(label.as_str());
            svc.delete_label(&id)?;
            let value = serde_json::json!({ "ok": true, "deleted": id.as_str() });
            render(ctx.output, &value, |_, w| writeln!(w, "✓ deleted label {id}"))
        }
    }
}
