use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "shopfront")]
#[command(about = "Keep point-of-sale records in sync with the shop backend")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// CLI profile name holding remote and owner configuration
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,

    /// Optional sync settings JSON file (overrides the profile settings)
    #[arg(long, global = true, value_name = "PATH")]
    pub settings: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one sync pass over every configured collection
    Sync {
        /// Output the sync report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show local collections and the last sync time
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check whether the device is online
    Check,
    /// Stay running and sync on every reconnect
    Watch {
        /// Print sync events as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// List the local records of a collection
    Records {
        /// Collection name, e.g. products
        collection: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage advisory edit locks
    Lock {
        #[command(subcommand)]
        command: LockCommands,
    },
    /// Configure CLI profiles
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Subcommand)]
pub enum LockCommands {
    /// Take the edit lock on a record
    Acquire {
        collection: String,
        item_id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Release a lock held by this profile
    Release { collection: String, item_id: String },
    /// Show who holds the lock on a record
    Show {
        collection: String,
        item_id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update profile config
    Init {
        /// Profile name to initialize
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
        /// Base URL of the remote document store
        #[arg(long, value_name = "URL")]
        remote_url: Option<String>,
        /// Name shown to other users when this profile holds a lock
        #[arg(long, value_name = "NAME")]
        owner_name: Option<String>,
        /// Keep current active profile instead of activating this one
        #[arg(long)]
        no_activate: bool,
    },
    /// Print the resolved profile
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Make a profile the active one
    Use {
        /// Profile name
        name: String,
    },
}
