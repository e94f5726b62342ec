//! # Affordance CLI Module
//!
//! This module implements the CLI interface for Affordance.
//!
//! ## Available Commands
//!
//! - `explore` - Read a resource or a collection page
//! - `act` - Invoke an action on a resource
//! - `create` - Create a resource
//! - `link` / `unlink` - Manage bidirectional links
//! - `referencing` - Find resources linking to a resource
//! - `graph` - Build the link graph around a resource
//! - `types` - List stored resource types
//! - `machines` - Show the configured state machines
//! - `compact` - Reclaim space in the database file
//! - `init` - Initialize a new database

mod commands;

use affordance_core::AffordanceError;
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Affordance - hypermedia resource engine
///
/// Typed resources with computed actions, state machines and navigable links.
#[derive(Parser, Debug)]
#[command(name = "affordance")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print nothing on success
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the resource database
    #[arg(short = 'D', long, global = true, default_value = "affordance.redb")]
    pub database: PathBuf,

    /// Storage backend
    #[arg(short = 'B', long, global = true, value_enum, default_value_t = Backend::Redb)]
    pub backend: Backend,

    /// Engine configuration file (TOML)
    #[arg(short = 'c', long, global = true, env = "AFFORDANCE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print JSON on a single line
    #[arg(long, global = true)]
    pub compact: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Storage backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// Volatile, lives for one command
    Memory,
    /// ACID database file
    Redb,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Read a resource (/type/id) or a collection page (/type?key=value&page=1)
    Explore {
        /// Resource or collection URI
        uri: String,
    },

    /// Invoke an action on a resource
    Act {
        /// Resource URI (/type/id)
        uri: String,

        /// Action name
        action: String,

        /// JSON object payload
        #[arg(short = 'd', long)]
        data: Option<String>,
    },

    /// Create a resource in a collection (/type or /type/id)
    Create {
        /// Collection URI
        uri: String,

        /// JSON object payload
        #[arg(short = 'd', long)]
        data: Option<String>,
    },

    /// Link two resources in both directions
    Link {
        /// Source resource URI
        source: String,

        /// Target resource URI
        target: String,

        /// Relation from source to target
        #[arg(short, long)]
        rel: String,

        /// Relation from target back to source
        #[arg(short, long)]
        back_rel: String,
    },

    /// Remove a link created by `link`
    Unlink {
        /// Source resource URI
        source: String,

        /// Target resource URI
        target: String,

        /// Relation from source to target
        #[arg(short, long)]
        rel: String,

        /// Relation from target back to source
        #[arg(short, long)]
        back_rel: String,
    },

    /// Find resources holding a link to a resource
    Referencing {
        /// Resource URI
        uri: String,

        /// Only count links of this relation
        #[arg(short, long)]
        relation: Option<String>,
    },

    /// Build the link graph around a resource
    Graph {
        /// Seed resource URI
        uri: String,

        /// Expansion depth
        #[arg(short, long, default_value = "3")]
        depth: usize,

        /// Only follow these relations (repeatable)
        #[arg(short, long)]
        relation: Vec<String>,
    },

    /// List stored resource types
    Types,

    /// Show the configured state machines
    Machines,

    /// Compact the database file
    Compact,

    /// Initialize a new empty database
    Init {
        /// Force initialization even if database exists
        #[arg(short, long)]
        force: bool,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Run a command and return its JSON output.
pub fn run(cli: &Cli) -> Result<Value, AffordanceError> {
    match &cli.command {
        Commands::Explore { uri } => cmd_explore(&open_store(cli)?, uri),
        Commands::Act { uri, action, data } => {
            cmd_act(&mut open_store(cli)?, uri, action, data.as_deref())
        }
        Commands::Create { uri, data } => cmd_create(&mut open_store(cli)?, uri, data.as_deref()),
        Commands::Link {
            source,
            target,
            rel,
            back_rel,
        } => cmd_link(&mut open_store(cli)?, source, target, rel, back_rel),
        Commands::Unlink {
            source,
            target,
            rel,
            back_rel,
        } => cmd_unlink(&mut open_store(cli)?, source, target, rel, back_rel),
        Commands::Referencing { uri, relation } => {
            cmd_referencing(&mut open_store(cli)?, uri, relation.as_deref())
        }
        Commands::Graph {
            uri,
            depth,
            relation,
        } => cmd_graph(&mut open_store(cli)?, uri, *depth, relation),
        Commands::Types => cmd_types(&open_store(cli)?),
        Commands::Machines => cmd_machines(&open_store(cli)?),
        Commands::Compact => cmd_compact(&mut open_store(cli)?),
        Commands::Init { force } => cmd_init(&cli.database, cli.backend, *force),
    }
}

/// Execute the CLI with parsed arguments, printing the result to stdout.
pub fn execute(cli: Cli) -> Result<(), AffordanceError> {
    let output = run(&cli)?;
    if cli.quiet {
        return Ok(());
    }

    let rendered = if cli.compact {
        serde_json::to_string(&output)
    } else {
        serde_json::to_string_pretty(&output)
    }
    .map_err(|e| AffordanceError::SerializationError(e.to_string()))?;
    println!("{}", rendered);
    Ok(())
}
