//! syncbridge CLI
//!
//! Command-line tools for a synchronization record journal.
//!
//! # Commands
//!
//! - `list` - List records, optionally filtered
//! - `show` - Print one record with its payload
//! - `verify` - Check the journal's frames and checksums
//! - `set-status` - Apply a status callback by hand
//! - `compact` - Rewrite the journal with live records only

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use syncbridge_core::FlowType;
use tracing_subscriber::EnvFilter;

/// syncbridge record journal tools.
#[derive(Parser)]
#[command(name = "syncbridge")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the record journal
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Output format of listing commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// One line per record.
    Text,
    /// A JSON array.
    Json,
}

/// Flow filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Flow {
    /// Inbox records.
    Incoming,
    /// Outbox records.
    Outcoming,
}

impl From<Flow> for FlowType {
    fn from(flow: Flow) -> Self {
        match flow {
            Flow::Incoming => FlowType::Incoming,
            Flow::Outcoming => FlowType::Outcoming,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List records
    List {
        /// Only records with this status
        #[arg(short, long)]
        status: Option<String>,

        /// Only records of this batch
        #[arg(short, long)]
        operation_id: Option<String>,

        /// Only records of this direction
        #[arg(long, value_enum)]
        flow: Option<Flow>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Print one record
    Show {
        /// Record id
        id: u64,
    },

    /// Verify journal integrity
    Verify,

    /// Write a status reported by the receiving side
    SetStatus {
        /// Batch of the record
        operation_id: String,

        /// Sync id of the record
        sync_id: String,

        /// New status
        status: String,

        /// Error text
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Rewrite the journal with live records only
    Compact {
        /// Dry run - show what would be done
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::List {
            status,
            operation_id,
            flow,
            format,
        } => {
            let path = cli.path.ok_or("Journal path required for list")?;
            let filter = commands::list::Filter {
                status,
                operation_id,
                flow: flow.map(FlowType::from),
            };
            commands::list::run(&path, &filter, format)?;
        }
        Commands::Show { id } => {
            let path = cli.path.ok_or("Journal path required for show")?;
            commands::show::run(&path, id)?;
        }
        Commands::Verify => {
            let path = cli.path.ok_or("Journal path required for verify")?;
            commands::verify::run(&path)?;
        }
        Commands::SetStatus {
            operation_id,
            sync_id,
            status,
            message,
        } => {
            let path = cli.path.ok_or("Journal path required for set-status")?;
            commands::set_status::run(&path, operation_id, sync_id, status, message)?;
        }
        Commands::Compact { dry_run } => {
            let path = cli.path.ok_or("Journal path required for compact")?;
            commands::compact::run(&path, dry_run)?;
        }
        Commands::Version => {
            println!("syncbridge CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("syncbridge core v{}", syncbridge_core::VERSION);
        }
    }

    Ok(())
}
