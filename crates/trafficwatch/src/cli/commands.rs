//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand};

/// Serve command arguments.
#[derive(Debug, Args)]
pub struct ServeCommand {
    /// Address to listen on (overrides `server.bind`)
    #[arg(short, long, value_name = "ADDR")]
    pub bind: Option<String>,
}

/// Bulk CSV import commands.
///
/// Rows that cannot be parsed or written are logged and skipped.
#[derive(Debug, Subcommand)]
pub enum ImportCommand {
    /// Import road segments with their initial speed
    Segments {
        /// CSV file with `id,start_lon,start_lat,end_lon,end_lat,length,speed`
        file: PathBuf,
    },

    /// Import sensors
    Sensors {
        /// CSV file with `id,name,uuid`
        file: PathBuf,
    },
}

/// User management commands.
#[derive(Debug, Subcommand)]
pub enum UserCommand {
    /// Create an API user
    Create {
        /// Login name
        username: String,

        /// Password for HTTP Basic authentication
        #[arg(short, long)]
        password: String,

        /// Allow the user to modify data
        #[arg(long)]
        staff: bool,
    },
}

/// Traffic intensity threshold commands.
#[derive(Debug, Subcommand)]
pub enum ThresholdsCommand {
    /// Show the thresholds currently in force
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Record a new pair of thresholds
    Set {
        /// Lowest speed still classified as medium
        min: f64,

        /// Highest speed still classified as medium
        max: f64,
    },
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}
