//! walletdb CLI
//!
//! Command-line tools for walletdb snapshot files.
//!
//! # Commands
//!
//! - `init` - Create an empty storage snapshot
//! - `inspect` - Display instance settings and row counts
//! - `sync` - Merge one owner's rows from another snapshot

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use walletdb_core::Chain;

/// walletdb command-line snapshot tools.
#[derive(Parser)]
#[command(name = "walletdb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the snapshot file
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ChainArg {
    Main,
    Test,
}

impl From<ChainArg> for Chain {
    fn from(chain: ChainArg) -> Self {
        match chain {
            ChainArg::Main => Chain::Main,
            ChainArg::Test => Chain::Test,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty storage snapshot
    Init {
        /// Human readable instance name
        #[arg(short, long, default_value = "walletdb")]
        name: String,

        /// Instance identity key (random if omitted)
        #[arg(short, long)]
        identity_key: Option<String>,

        /// Chain the instance holds data for
        #[arg(short, long, value_enum, default_value = "test")]
        chain: ChainArg,

        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },

    /// Display instance settings and row counts
    Inspect {
        /// List users and their active storage
        #[arg(short, long)]
        users: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Merge one owner's rows from another snapshot into this one
    Sync {
        /// Snapshot to read from
        #[arg(short, long)]
        from: PathBuf,

        /// Identity key of the wallet owner
        #[arg(short, long)]
        identity_key: String,

        /// Maximum rows per chunk
        #[arg(long)]
        max_items: Option<usize>,

        /// Maximum rough byte size per chunk
        #[arg(long)]
        max_size: Option<usize>,

        /// Show what would be merged without saving
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Init {
            name,
            identity_key,
            chain,
            force,
        } => {
            let path = cli.path.ok_or("Snapshot path required for init")?;
            commands::init::run(&path, &name, identity_key, chain.into(), force)?;
        }
        Commands::Inspect { users, format } => {
            let path = cli.path.ok_or("Snapshot path required for inspect")?;
            commands::inspect::run(&path, users, &format)?;
        }
        Commands::Sync {
            from,
            identity_key,
            max_items,
            max_size,
            dry_run,
        } => {
            let path = cli.path.ok_or("Snapshot path required for sync")?;
            let options = commands::sync::SyncOptions {
                max_items,
                max_size,
                dry_run,
            };
            commands::sync::run(&from, &path, &identity_key, options)?;
        }
        Commands::Version => {
            println!("walletdb CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("walletdb Core v{}", walletdb_core::VERSION);
        }
    }

    Ok(())
}
