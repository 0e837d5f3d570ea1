//! Command-line interface for trafficwatch.
//!
//! This module provides the CLI structure for the `trafficwatch` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{ConfigCommand, ImportCommand, ServeCommand, ThresholdsCommand, UserCommand};

/// trafficwatch - Road segment speeds and traffic sightings
///
/// Serves the HTTP API and manages its database: bulk imports, users and
/// intensity thresholds.
#[derive(Debug, Parser)]
#[command(name = "trafficwatch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP API until interrupted
    Serve(ServeCommand),

    /// Bulk import data from CSV files
    #[command(subcommand)]
    Import(ImportCommand),

    /// Manage API users
    #[command(subcommand)]
    User(UserCommand),

    /// View or change traffic intensity thresholds
    #[command(subcommand)]
    Thresholds(ThresholdsCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        crate::logging::Verbosity::from_flags(self.verbose, self.quiet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_cli_name() {
        let cli = Cli::command();
        assert_eq!(cli.get_name(), "trafficwatch");
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbosity() {
        use crate::logging::Verbosity;

        assert_eq!(parse(&["trafficwatch", "serve"]).verbosity(), Verbosity::Normal);
        assert_eq!(
            parse(&["trafficwatch", "-v", "serve"]).verbosity(),
            Verbosity::Verbose
        );
        assert_eq!(
            parse(&["trafficwatch", "-vv", "serve"]).verbosity(),
            Verbosity::Trace
        );
        assert_eq!(
            parse(&["trafficwatch", "serve", "-q"]).verbosity(),
            Verbosity::Quiet
        );
    }

    #[test]
    fn test_parse_serve() {
        let cli = parse(&["trafficwatch", "serve", "--bind", "0.0.0.0:8080"]);
        match cli.command {
            Command::Serve(cmd) => assert_eq!(cmd.bind.as_deref(), Some("0.0.0.0:8080")),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_import() {
        let cli = parse(&["trafficwatch", "import", "sensors", "sensors.csv"]);
        assert!(matches!(
            cli.command,
            Command::Import(ImportCommand::Sensors { ref file }) if file == &PathBuf::from("sensors.csv")
        ));
    }

    #[test]
    fn test_parse_user_create() {
        let cli = parse(&[
            "trafficwatch",
            "user",
            "create",
            "admin",
            "--password",
            "admin",
            "--staff",
        ]);
        match cli.command {
            Command::User(UserCommand::Create {
                username,
                password,
                staff,
            }) => {
                assert_eq!(username, "admin");
                assert_eq!(password, "admin");
                assert!(staff);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_user_create_requires_password() {
        assert!(Cli::try_parse_from(["trafficwatch", "user", "create", "admin"]).is_err());
    }

    #[test]
    fn test_parse_thresholds_set() {
        let cli = parse(&["trafficwatch", "thresholds", "set", "25", "55.5"]);
        match cli.command {
            Command::Thresholds(ThresholdsCommand::Set { min, max }) => {
                assert!((min - 25.0).abs() < f64::EPSILON);
                assert!((max - 55.5).abs() < f64::EPSILON);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_with_config() {
        let cli = parse(&["trafficwatch", "-c", "/custom/config.toml", "config", "path"]);
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
        assert!(matches!(cli.command, Command::Config(ConfigCommand::Path)));
    }
}
