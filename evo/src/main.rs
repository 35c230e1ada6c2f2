use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use evo::{commands, config, telemetry};

#[derive(Parser)]
#[command(name = "evo")]
#[command(about = "A rebasing token ledger with transfer fees and spend limits", long_about = None)]
struct Cli {
    /// Path to config file (default: ~/.evo/config.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default ledger configuration
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Replay a scripted scenario and print the final balances
    Replay {
        /// Scenario file (TOML)
        scenario: PathBuf,

        /// Save the final ledger state as a JSON snapshot
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },

    /// Show an account's balance from a snapshot
    Balance {
        /// Snapshot file (JSON)
        snapshot: PathBuf,

        /// Account address (0x followed by 40 hex digits)
        account: String,
    },

    /// Project a balance forward over a number of rebases
    Project {
        /// Starting balance in tokens
        amount: String,

        /// Number of rebases
        rebases: u32,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .map(PathBuf::from)
        .unwrap_or_else(config::default_config_path);

    // A broken config must not stop `init --force` from replacing it.
    let logging = config::Config::load_or_default(&config_path)
        .map(|c| c.logging)
        .unwrap_or_default();
    telemetry::init_tracing(&logging, cli.verbose)?;

    match cli.command {
        Commands::Init { force } => commands::init::run(&config_path, force),
        Commands::Replay { scenario, snapshot } => {
            commands::replay::run(&scenario, snapshot.as_deref())
        }
        Commands::Balance { snapshot, account } => commands::balance::run(&snapshot, &account),
        Commands::Project { amount, rebases } => {
            commands::project::run(&config_path, &amount, rebases)
        }
    }
}
