//! Reelfeed CLI - Command-line interface
//!
//! Runs feed simulations against the reelfeed library and manages its
//! configuration file.

mod commands;
mod error;

use clap::{Parser, Subcommand};

use commands::config::ConfigCommands;
use commands::simulate::SimulateArgs;
use error::CliError;

/// Reelfeed - windowed playback engine for vertical media feeds
#[derive(Debug, Parser)]
#[command(name = "reelfeed")]
#[command(version)]
#[command(about = "Simulate and configure the reelfeed playback engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Swipe through a generated feed with simulated decoders and report telemetry
    Simulate(SimulateArgs),

    /// View or edit configuration settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Simulate(args) => commands::simulate::run(args).await,
        Commands::Config { command } => commands::config::run(command),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commands::simulate::ConnectionProfile;

    #[test]
    fn test_help_does_not_error() {
        let result = Cli::try_parse_from(["reelfeed", "--help"]);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["reelfeed"]).is_err());
    }

    #[test]
    fn test_simulate_defaults() {
        let cli = Cli::parse_from(["reelfeed", "simulate"]);
        let Commands::Simulate(args) = cli.command else {
            panic!("expected simulate");
        };
        assert_eq!(args.items, 60);
        assert_eq!(args.radius, None);
        assert_eq!(args.connection, ConnectionProfile::Medium);
        assert!(!args.json);
    }

    #[test]
    fn test_simulate_options() {
        let cli = Cli::parse_from([
            "reelfeed",
            "simulate",
            "--radius",
            "2",
            "--connection",
            "save-data",
            "--fail-rate",
            "0.5",
            "--seed",
            "42",
            "--json",
        ]);
        let Commands::Simulate(args) = cli.command else {
            panic!("expected simulate");
        };
        assert_eq!(args.radius, Some(2));
        assert_eq!(args.connection, ConnectionProfile::SaveData);
        assert_eq!(args.fail_rate, 0.5);
        assert_eq!(args.seed, Some(42));
        assert!(args.json);
    }

    #[test]
    fn test_config_set_parses() {
        let cli = Cli::parse_from(["reelfeed", "config", "set", "feed.window_radius", "2"]);
        match cli.command {
            Commands::Config {
                command: ConfigCommands::Set { key, value },
            } => {
                assert_eq!(key, "feed.window_radius");
                assert_eq!(value, "2");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
