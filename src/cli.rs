use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "plugman")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Git-backed plugin manager", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Plugin declarations (default: <config dir>/plugman/plugins.toml)
    #[arg(short, long, global = true, env = "PLUGMAN_FILE")]
    pub file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Declare all plugins and install the missing ones
    Install,

    /// Fetch plugins and check out new revisions
    Update {
        /// Only these plugins (default: all)
        names: Vec<String>,

        /// Use what is already downloaded
        #[arg(long)]
        offline: bool,

        /// Skip confirmation
        #[arg(short, long)]
        force: bool,
    },

    /// Remove installed plugins that are no longer declared
    Clean {
        /// Skip confirmation
        #[arg(short, long)]
        force: bool,
    },

    /// Show declared plugins in install order
    List,

    /// Save or restore exact revisions
    #[command(subcommand)]
    Snapshot(SnapshotCommand),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum SnapshotCommand {
    /// Write the current revisions to a file
    Save {
        /// Snapshot file (default: configured snapshot path)
        path: Option<PathBuf>,
    },

    /// Check out the revisions recorded in a file
    Load {
        /// Snapshot file (default: configured snapshot path)
        path: Option<PathBuf>,
    },

    /// Print the current revisions
    Show,
}
