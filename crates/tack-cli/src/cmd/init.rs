use anyhow::{Context as _, Result};
use clap::Args;
use serde::Serialize;
use tack_core::Service;
use tack_core::config::{DATA_DIR, project_config_path};
use tack_core::db::store_path;

use super::Context;
use crate::output::{pretty_kv, render_mode};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Rewrite `.tack/config.toml` even if the store already exists.
    #[arg(long)]
    pub force: bool,
}

const CONFIG_TOML: &str = "[store]\n\
    busy_timeout_ms = 5000\n\
    \n\
    [moves]\n\
    # Extra attempts when another writer holds the store.\n\
    max_conflict_retries = 2\n\
    # reject | clamp\n\
    out_of_range = \"reject\"\n\
    \n\
    [reorder]\n\
    # skip | reject\n\
    unknown_items = \"skip\"\n";

const GITIGNORE: &str = "tack.db\ntack.db-wal\ntack.db-shm\n";

#[derive(Debug, Serialize)]
struct InitReport {
    ok: bool,
    store: String,
    config: String,
    config_written: bool,
}

/// Execute `tk init`. Creates the project skeleton:
///
/// ```text
/// .tack/
///   tack.db        (SQLite store, migrated to the latest schema)
///   config.toml    (default project config)
///   .gitignore     (store files)
/// ```
///
/// # Errors
///
/// Returns an error if the store already exists and `--force` is not set,
/// or if any filesystem or database operation fails.
pub fn run_init(args: &InitArgs, ctx: &Context<'_>) -> Result<()> {
    let data_dir = ctx.root.join(DATA_DIR);
    let store = store_path(ctx.root);
    if store.exists() && !args.force {
        anyhow::bail!("{DATA_DIR}/ already initialized. Use `tk init --force` to rewrite its config.");
    }

    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("create data directory {}", data_dir.display()))?;

    let config = project_config_path(ctx.root);
    let config_written = args.force || !config.exists();
    if config_written {
        std::fs::write(&config, CONFIG_TOML)
            .with_context(|| format!("write config {}", config.display()))?;
    }

    let gitignore = data_dir.join(".gitignore");
    std::fs::write(&gitignore, GITIGNORE)
        .with_context(|| format!("write {}", gitignore.display()))?;

    Service::init(ctx.root)?;
    tracing::info!(store = %store.display(), "initialized store");

    let report = InitReport {
        ok: true,
        store: store.display().to_string(),
        config: config.display().to_string(),
        config_written,
    };
    render_mode(
        ctx.output,
        &report,
        |r, w| writeln!(w, "{}\t{}", r.store, r.config),
        |r, w| {
            writeln!(w, "✓ Initialized {DATA_DIR}/")?;
            writeln!(w)?;
            pretty_kv(w, "store", &r.store)?;
            pretty_kv(w, "config", &r.config)?;
            writeln!(w)?;
            writeln!(w, "Next steps:")?;
            writeln!(w, "  export TACK_USER=your-name")?;
            writeln!(w, "  tk board create \"My board\"")
        },
    )
}
