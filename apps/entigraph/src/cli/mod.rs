//! # Entigraph CLI Module
//!
//! This module implements the CLI interface for Entigraph.
//!
//! ## Available Commands
//!
//! - `schema` - Show reachable types, relation fields and operations
//! - `entities` - List the reachable entities of a snapshot with their ids
//! - `triples` - Print the triple store of a snapshot
//! - `invoke` - Validate and execute one operation against a snapshot
//! - `equiv` - Compare two snapshots structurally
//! - `export` - Write the canonical triple export of a snapshot
//! - `hash` - Compute checksum and BLAKE3 hash of a snapshot's triples

mod commands;

use crate::config::AppConfig;
use clap::{Parser, Subcommand};
use entigraph_core::GraphError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Entigraph - entity-graph runtime
///
/// Turns a typed object graph into stable identifiers and triples, and tries
/// candidate operations on isolated copies.
#[derive(Parser, Debug)]
#[command(name = "entigraph")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, global = true, default_value = "entigraph.toml")]
    pub config: PathBuf,

    /// Output in JSON format (overrides the config file)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Walk without canonical ordering (overrides the config file)
    #[arg(long, global = true)]
    pub unordered: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the schema of the bundled domain
    Schema,

    /// List reachable entities with their ids
    Entities {
        /// Snapshot file (JSON)
        #[arg(short, long)]
        snapshot: PathBuf,
    },

    /// Print the triple store
    Triples {
        /// Snapshot file (JSON)
        #[arg(short, long)]
        snapshot: PathBuf,
    },

    /// Validate and execute one operation
    Invoke {
        /// Snapshot file (JSON)
        #[arg(short, long)]
        snapshot: PathBuf,

        /// Operation friendly id (e.g. Company.fire)
        #[arg(short, long)]
        operation: String,

        /// Id of the entity to invoke on (e.g. e1)
        #[arg(long)]
        on: String,

        /// One argument per parameter; collections are comma-separated
        args: Vec<String>,
    },

    /// Compare two snapshots structurally
    Equiv {
        /// First snapshot file (JSON)
        left: PathBuf,

        /// Second snapshot file (JSON)
        right: PathBuf,
    },

    /// Export the triple store in canonical format
    Export {
        /// Snapshot file (JSON)
        #[arg(short, long)]
        snapshot: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Export format (canonical, json)
        #[arg(short = 't', long, default_value = "canonical")]
        format: String,
    },

    /// Compute checksum and BLAKE3 hash of the triple store
    Hash {
        /// Snapshot file (JSON)
        #[arg(short, long)]
        snapshot: PathBuf,
    },
}

/// Settings resolved from the config file and command-line flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub deterministic: bool,
    pub json_mode: bool,
}

impl Settings {
    #[must_use]
    pub fn resolve(cli: &Cli, config: &AppConfig) -> Self {
        Self {
            deterministic: config.walk.deterministic && !cli.unordered,
            json_mode: config.output.json || cli.json_mode,
        }
    }
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli, config: &AppConfig) -> Result<(), GraphError> {
    let settings = Settings::resolve(&cli, config);

    match cli.command {
        Commands::Schema => cmd_schema(settings),
        Commands::Entities { snapshot } => cmd_entities(settings, &snapshot),
        Commands::Triples { snapshot } => cmd_triples(settings, &snapshot),
        Commands::Invoke {
            snapshot,
            operation,
            on,
            args,
        } => cmd_invoke(settings, &snapshot, &operation, &on, &args),
        Commands::Equiv { left, right } => cmd_equiv(settings, &left, &right),
        Commands::Export {
            snapshot,
            output,
            format,
        } => cmd_export(settings, &snapshot, &output, &format),
        Commands::Hash { snapshot } => cmd_hash(settings, &snapshot),
    }
}
