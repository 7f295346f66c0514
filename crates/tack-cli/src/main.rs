#![forbid(unsafe_code)]

mod cmd;
mod output;
mod user;

use std::env;
use std::process::ExitCode;

use clap::Parser;
use clap::Subcommand;
use output::{CliError, OutputMode, render_error, resolve_output_mode};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "tack: kanban boards with dense card ordering",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON output (shorthand for `--format json`).
    #[arg(long, global = true)]
    json: bool,

    /// Output format: pretty, text, or json.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Act as this user (skips env and config resolution).
    #[arg(long, global = true)]
    user: Option<String>,

    /// Only log errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn user_flag(&self) -> Option<&str> {
        self.user.as_deref()
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Setup",
        about = "Initialize a tack project",
        long_about = "Create .tack/ with a migrated store and a default config.",
        after_help = "EXAMPLES:\n    # Initialize in the current directory\n    tk init\n\n    # Rewrite the default config\n    tk init --force"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        next_help_heading = "Boards",
        about = "Create, show, and reorder boards",
        after_help = "EXAMPLES:\n    # Create a board\n    tk board create \"Roadmap\"\n\n    # Show lists and cards in order\n    tk board show b-1a2b3c\n\n    # Put list l-9 first\n    tk board reorder b-1a2b3c l-9=0 --json"
    )]
    Board(cmd::board::BoardArgs),

    #[command(
        next_help_heading = "Boards",
        about = "Manage and move lists",
        after_help = "EXAMPLES:\n    # Append a list\n    tk list create b-1a2b3c \"Doing\"\n\n    # Move a list to the front\n    tk list move l-9 0\n\n    # Reorder a list's cards\n    tk list reorder l-9 c-2=0 c-1=1"
    )]
    List(cmd::list::ListArgs),

    #[command(
        next_help_heading = "Cards",
        about = "Manage, assign, and move cards",
        after_help = "EXAMPLES:\n    # Add a card\n    tk card create l-9 \"Fix login\" --priority high\n\n    # Move it to the top of another list\n    tk card move c-1 0 --to l-7\n\n    # What is on my plate\n    tk card assigned"
    )]
    Card(cmd::card::CardArgs),

    #[command(
        next_help_heading = "Cards",
        about = "Manage labels",
        after_help = "EXAMPLES:\n    # Create a label\n    tk label create bug --color red\n\n    # List labels\n    tk label list --json"
    )]
    Label(cmd::label::LabelArgs),

    #[command(
        next_help_heading = "Maintenance",
        about = "Check position density",
        long_about = "Check that every board's lists and every list's cards sit at 0..N.",
        after_help = "EXAMPLES:\n    # Report gaps and duplicates\n    tk check\n\n    # Rewrite damaged containers\n    tk check --fix"
    )]
    Check(cmd::check::CheckArgs),
}

fn init_tracing(verbose: bool, quiet: bool) {
    let filter = EnvFilter::try_from_env("TACK_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if quiet {
            "error"
        } else if verbose || env::var("DEBUG").is_ok() {
            "tack=debug,info"
        } else {
            "tack=info,warn"
        })
    });

    let format = env::var("TACK_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let user_config = tack_core::config::load_user_config().unwrap_or_else(|err| {
        tracing::warn!(error = %err, "ignoring unreadable user config");
        tack_core::config::UserConfig::default()
    });
    let output = resolve_output_mode(cli.format, cli.json, user_config.output.as_deref());

    let project_root = match env::current_dir() {
        Ok(root) => root,
        Err(err) => {
            let _ = render_error(output, &CliError::new(format!("current directory: {err}")));
            return ExitCode::FAILURE;
        }
    };
    let ctx = cmd::Context::new(
        &project_root,
        output,
        cli.user_flag(),
        user_config.user.as_deref(),
    );

    let result = match &cli.command {
        Commands::Init(args) => cmd::init::run_init(args, &ctx),
        Commands::Board(args) => cmd::board::run_board(args, &ctx),
        Commands::List(args) => cmd::list::run_list(args, &ctx),
        Commands::Card(args) => cmd::card::run_card(args, &ctx),
        Commands::Label(args) => cmd::label::run_label(args, &ctx),
        Commands::Check(args) => cmd::check::run_check(args, &ctx),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::debug!(error = ?err, "command failed");
            let _ = render_error(output, &CliError::from(&err));
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::parse_from(["tk", "board", "list", "--json", "--user", "alice"]);
        assert!(cli.json);
        assert_eq!(cli.user_flag(), Some("alice"));
    }

    #[test]
    fn format_flag_parses_value_enum() {
        let cli = Cli::parse_from(["tk", "--format", "text", "board", "ls"]);
        assert_eq!(cli.format, Some(OutputMode::Text));
        assert!(Cli::try_parse_from(["tk", "--format", "yaml", "board", "ls"]).is_err());
    }

    #[test]
    fn user_flag_none_by_default() {
        let cli = Cli::parse_from(["tk", "label", "list"]);
        assert!(cli.user_flag().is_none());
        assert!(!cli.quiet);
    }

    #[test]
    fn all_subcommands_parse() {
        let subcommands = [
            vec!["tk", "init"],
            vec!["tk", "board", "create", "Roadmap"],
            vec!["tk", "board", "show", "b-1"],
            vec!["tk", "board", "reorder", "b-1", "l-1=0"],
            vec!["tk", "list", "create", "b-1", "Todo", "--position", "0"],
            vec!["tk", "list", "move", "l-1", "3", "--to", "b-2"],
            vec!["tk", "card", "create", "l-1", "Fix it"],
            vec!["tk", "card", "move", "c-1", "0"],
            vec!["tk", "card", "assigned", "--assignee", "bob"],
            vec!["tk", "label", "update", "lb-1", "--color", "red"],
            vec!["tk", "check", "--fix"],
        ];
        for args in &subcommands {
            let result = Cli::try_parse_from(args.iter());
            assert!(result.is_ok(), "failed to parse {args:?}: {:?}", result.err());
        }
    }
}
