//! xastore CLI
//!
//! Command-line access to an engine persisted as a snapshot file.
//!
//! # Commands
//!
//! - `get`, `status`, `list` - Query keys and transactions
//! - `prepare`, `commit`, `rollback` - Drive a transaction by hand
//! - `put`, `delete` - Read-modify-write a key in one transaction
//! - `trim`, `trim-pending` - Garbage-collect the changelog
//! - `inspect`, `verify` - Examine a snapshot file

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// xastore transactional key-value tools.
#[derive(Parser)]
#[command(name = "xastore")]
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

#[derive(Subcommand)]
enum Commands {
    /// Print the current value of a key
    Get {
        /// Business key
        key: String,
    },

    /// Prepare a transaction
    Prepare {
        /// Transaction name
        name: String,

        /// Operation (insert, update, delete)
        operation: String,

        /// Business key
        key: String,

        /// Version the key must currently have
        #[arg(long, default_value = "0")]
        expected_version: u64,

        /// New value
        #[arg(long, default_value = "")]
        value: String,
    },

    /// Commit a prepared transaction
    Commit {
        /// Transaction name
        name: String,
    },

    /// Roll back a prepared transaction
    Rollback {
        /// Transaction name
        name: String,
    },

    /// Print the status of a transaction
    Status {
        /// Transaction name
        name: String,
    },

    /// List transactions by status
    List {
        /// Status to list (prepare, commited)
        #[arg(short, long, default_value = "prepare")]
        status: String,
    },

    /// Set a key to a value in one transaction
    Put {
        /// Transaction name
        name: String,

        /// Business key
        key: String,

        /// New value
        value: String,
    },

    /// Delete a key in one transaction
    Delete {
        /// Transaction name
        name: String,

        /// Business key
        key: String,
    },

    /// Remove transactions whose name starts with a prefix
    Trim {
        /// Name prefix
        prefix: String,
    },

    /// Remove transactions that were never committed
    TrimPending,

    /// Display snapshot metadata and contents
    Inspect {
        /// Show every transaction record
        #[arg(short, long)]
        records: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Verify snapshot integrity
    Verify,

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
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Commands::Version = cli.command {
        println!("xastore CLI v{}", env!("CARGO_PKG_VERSION"));
        println!("xastore core v{}", xastore_core::VERSION);
        return Ok(());
    }

    let path = cli.path.ok_or("Snapshot path required")?;

    match cli.command {
        Commands::Get { key } => commands::txn::get(&path, &key)?,
        Commands::Prepare {
            name,
            operation,
            key,
            expected_version,
            value,
        } => commands::txn::prepare(&path, &name, &operation, &key, expected_version, &value)?,
        Commands::Commit { name } => commands::txn::commit(&path, &name)?,
        Commands::Rollback { name } => commands::txn::rollback(&path, &name)?,
        Commands::Status { name } => commands::txn::status(&path, &name)?,
        Commands::List { status } => commands::txn::list(&path, &status)?,
        Commands::Put { name, key, value } => commands::txn::put(&path, &name, &key, Some(value))?,
        Commands::Delete { name, key } => commands::txn::put(&path, &name, &key, None)?,
        Commands::Trim { prefix } => commands::txn::trim(&path, &prefix)?,
        Commands::TrimPending => commands::txn::trim_pending(&path)?,
        Commands::Inspect { records, format } => commands::inspect::run(&path, records, &format)?,
        Commands::Verify => commands::verify::run(&path)?,
        Commands::Version => {}
    }

    Ok(())
}
