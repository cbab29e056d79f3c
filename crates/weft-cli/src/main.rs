//! Weft command-line driver
//!
//! Imports, runs and snapshots Weft programs whose syntax trees live as
//! JSON files under a source root.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "weft")]
#[command(about = "Weft language engine driver", long_about = None)]
#[command(version)]
struct Cli {
    /// Directory module URLs are resolved against
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Engine configuration file (defaults to `<root>/weft.toml` if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a module and everything it depends on, reporting errors
    Check {
        /// Module URL
        url: String,
        /// Print the module table as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run a module's main class and print the resulting object graph
    Run {
        /// Module URL
        url: String,
        /// Write the snapshot to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Restore a snapshot against a module and print it back
    Restore {
        /// Module URL whose classes the snapshot uses
        url: String,
        /// Snapshot file
        snapshot: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut engine = commands::open_engine(&cli.root, cli.config.as_deref())?;

    match cli.command {
        Commands::Check { url, json } => commands::check::execute(&mut engine, &url, json),
        Commands::Run { url, output } => commands::run::execute(&mut engine, &url, output.as_deref()),
        Commands::Restore { url, snapshot } => commands::restore::execute(&mut engine, &url, &snapshot),
    }
}
