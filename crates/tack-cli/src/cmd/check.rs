use anyhow::Result;
use clap::Args;

use super::Context;
use crate::output::{pretty_kv, render_mode};

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Rewrite damaged containers to `0..N`, keeping their stored order.
    #[arg(long)]
    pub fix: bool,
}

/// Check every board and list for position gaps or duplicates.
///
/// # Errors
///
/// Returns an error when violations are found and `--fix` is not set, or
/// when the store cannot be read.
pub fn run_check(args: &CheckArgs, ctx: &Context<'_>) -> Result<()> {
    let mut svc = ctx.open()?;
    let report = if args.fix {
        svc.repair_density()?
    } else {
        svc.check_density()?
    };

    render_mode(
        ctx.output,
        &report,
        |r, w| {
            for v in &r.violations {
                let positions: Vec<String> = v.positions.iter().map(i64::to_string).collect();
                writeln!(w, "{}\t{}\t{}", v.kind, v.container, positions.join(","))?;
            }
            Ok(())
        },
        |r, w| {
            for v in &r.violations {
                let verdict = if args.fix { "FIX " } else { "FAIL" };
                writeln!(w, "{verdict} {} {} positions {:?}", v.kind, v.container, v.positions)?;
            }
            pretty_kv(w, "checked", r.containers_checked.to_string())?;
            if args.fix {
                pretty_kv(w, "repaired", r.repaired_rows.to_string())?;
            }
            if r.is_clean() {
                writeln!(w, "check: all positions dense")?;
            }
            Ok(())
        },
    )?;

    if report.is_clean() || args.fix {
        Ok(())
    } else {
        anyhow::bail!(
            "check: {} container(s) with position gaps; run `tk check --fix`",
            report.violations.len()
        );
    }
}
