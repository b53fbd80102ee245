//! CLI entry point for the `karma` command-line tool.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use karma::cli::{commands, CliContext};

#[derive(Parser)]
#[command(name = "karma", about = "Term reputation scores with links, cooldowns and decay")]
struct Cli {
    /// Snapshot file holding the store; created on first write
    #[arg(long, default_value = "karma.krm")]
    store: PathBuf,

    /// TOML settings file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output format: "text" (default) or "json"
    #[arg(long, default_value = "text")]
    format: String,

    /// Enable debug logging
    #[arg(long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add one point to a term
    Inc {
        term: String,
        /// Acting user id
        #[arg(long)]
        user: String,
    },
    /// Take one point from a term
    Dec {
        term: String,
        /// Acting user id
        #[arg(long)]
        user: String,
    },
    /// Show a term's score
    Check { term: String },
    /// Count TERM2's score towards TERM1's total
    Link { term1: String, term2: String },
    /// Remove a link
    Unlink { term1: String, term2: String },
    /// Highest scores
    Best { n: Option<usize> },
    /// Lowest scores
    Worst { n: Option<usize> },
    /// Who changed a term and how often
    Modified { term: String },
    /// Delete a term by its exact stored name
    Delete { term: String },
    /// Expire old contributions now
    Decay,
    /// Apply pending data upgrades
    Migrate,
    /// Describe the store and active settings
    Info,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    let json = cli.format == "json";
    let ctx = match CliContext::new(cli.store, cli.config.as_deref(), json) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Inc { term, user } => commands::cmd_inc(&ctx, &term, &user),
        Commands::Dec { term, user } => commands::cmd_dec(&ctx, &term, &user),
        Commands::Check { term } => commands::cmd_check(&ctx, &term),
        Commands::Link { term1, term2 } => commands::cmd_link(&ctx, &term1, &term2),
        Commands::Unlink { term1, term2 } => commands::cmd_unlink(&ctx, &term1, &term2),
        Commands::Best { n } => commands::cmd_best(&ctx, n),
        Commands::Worst { n } => commands::cmd_worst(&ctx, n),
        Commands::Modified { term } => commands::cmd_modified(&ctx, &term),
        Commands::Delete { term } => commands::cmd_delete(&ctx, &term),
        Commands::Decay => commands::cmd_decay(&ctx),
        Commands::Migrate => commands::cmd_migrate(&ctx),
        Commands::Info => commands::cmd_info(&ctx),
    };

    match result {
        Ok(status) => process::exit(status.exit_code()),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}
