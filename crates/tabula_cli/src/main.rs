//! tabula CLI
//!
//! Command-line tools for tabula snapshot files.
//!
//! # Commands
//!
//! - `inspect` - Display tables, record counts and indices
//! - `verify` - Check every index against its records
//! - `dump` - Print the records of a table

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// tabula command-line snapshot tools.
#[derive(Parser)]
#[command(name = "tabula")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Human-readable text.
    Text,
    /// Pretty-printed JSON.
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Display tables, record counts and indices
    Inspect {
        /// Path to the snapshot file
        snapshot: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Check every index against its records
    Verify {
        /// Path to the snapshot file
        snapshot: PathBuf,
    },

    /// Print the records of a table
    Dump {
        /// Path to the snapshot file
        snapshot: PathBuf,

        /// Table to dump
        #[arg(short, long)]
        table: String,

        /// Maximum number of records to dump
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
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
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Inspect { snapshot, format } => {
            commands::inspect::run(&snapshot, format)?;
        }
        Commands::Verify { snapshot } => {
            commands::verify::run(&snapshot)?;
        }
        Commands::Dump {
            snapshot,
            table,
            limit,
            format,
        } => {
            commands::dump::run(&snapshot, &table, limit, format)?;
        }
        Commands::Version => {
            println!("tabula CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("snapshot format v{}", tabula_core::FORMAT_VERSION);
        }
    }

    Ok(())
}
