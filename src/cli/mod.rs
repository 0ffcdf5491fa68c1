//! Command-line interface for fleetd.

mod commands;

use clap::{Parser, Subcommand};

/// fleetd - fleet control plane
#[derive(Parser)]
#[command(name = "fleetd")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API (default)
    #[command(alias = "daemon", alias = "-d")]
    Serve,

    /// Create default config file
    #[command(alias = "--init")]
    Init,

    /// Rename hosts that share a name to name-1, name-2, ...
    RepairDuplicates,

    /// Create an admin account
    CreateAdmin {
        username: String,
        /// Generated when omitted
        #[arg(long)]
        password: Option<String>,
    },

    /// List registered hosts with their derived status
    #[command(alias = "ls")]
    Hosts,
}

pub use commands::*;
