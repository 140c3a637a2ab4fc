//! TripSync CLI
//!
//! Command-line driver for TripSync.
//!
//! # Commands
//!
//! - `replay` - Replay a scripted transport through the replication supervisor
//! - `project` - Project a raw document into a view record
//! - `welcome` - Render the welcome screen from seeded documents

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// TripSync replication and view tools.
#[derive(Parser)]
#[command(name = "tripsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a JSON event script through the replication supervisor
    Replay {
        /// Remote endpoint URL
        #[arg(short, long)]
        endpoint: String,

        /// Collection to replicate, as `scope.name` or `name` (repeatable)
        #[arg(short, long = "collection", required = true)]
        collections: Vec<String>,

        /// User name for basic authentication
        #[arg(short, long)]
        username: Option<String>,

        /// Password for basic authentication
        #[arg(long, requires = "username")]
        password: Option<String>,

        /// JSON file containing an array of transport events
        #[arg(short, long)]
        script: PathBuf,

        /// Pause before each scripted event, in milliseconds
        #[arg(short, long, default_value = "0")]
        delay_ms: u64,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Project a JSON document into a view record
    Project {
        /// Record kind (membership, trip, shared)
        #[arg(short, long)]
        kind: String,

        /// JSON file containing the document
        #[arg(short, long)]
        document: PathBuf,
    },

    /// Render the welcome screen for a user from seeded documents
    Welcome {
        /// User whose membership and trip are shown
        #[arg(short, long)]
        username: String,

        /// JSON file of `{collection: {id: document}}` to seed the store with
        #[arg(short, long)]
        documents: Option<PathBuf>,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
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
        Commands::Replay {
            endpoint,
            collections,
            username,
            password,
            script,
            delay_ms,
            format,
        } => {
            let options = commands::replay::ReplayOptions {
                endpoint,
                collections,
                username,
                password,
                script,
                delay_ms,
                format,
            };
            commands::replay::run(options).await?;
        }
        Commands::Project { kind, document } => {
            commands::project::run(&kind, &document)?;
        }
        Commands::Welcome {
            username,
            documents,
        } => {
            commands::welcome::run(&username, documents.as_deref())?;
        }
        Commands::Version => {
            println!("TripSync CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
