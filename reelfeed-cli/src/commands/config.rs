//! Configuration management CLI commands.
//!
//! `config get`, `config set`, `config list` and `config path` read and edit
//! `config.ini` by key name.

use clap::Subcommand;
use reelfeed::config::{config_file_path, ConfigFile, ConfigKey};

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Get a configuration value
    Get {
        /// Configuration key in format section.key (e.g., feed.window_radius)
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key in format section.key (e.g., retry.max_attempts)
        key: String,

        /// Value to set
        value: String,
    },

    /// List all configuration settings
    List,

    /// Show the configuration file path
    Path,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Get { key } => run_get(&key),
        ConfigCommands::Set { key, value } => run_set(&key, &value),
        ConfigCommands::List => run_list(),
        ConfigCommands::Path => run_path(),
    }
}

fn parse_key(key: &str) -> Result<ConfigKey, CliError> {
    key.parse().map_err(|_| {
        CliError::Config(format!(
            "Unknown configuration key '{}'. Use 'reelfeed config list' to see available keys.",
            key
        ))
    })
}

/// Keys grouped by the part of the feed they tune.
const CONCERNS: &[(&str, &[ConfigKey])] = &[
    (
        "Windowing",
        &[ConfigKey::FeedWindowRadius, ConfigKey::FeedPrefetchTriggerDistance],
    ),
    (
        "Activation",
        &[ConfigKey::VisibilityThreshold, ConfigKey::VisibilitySettleMs],
    ),
    (
        "Retry backoff",
        &[
            ConfigKey::RetryBaseDelayMs,
            ConfigKey::RetryMaxAttempts,
            ConfigKey::RetryMaxDelaySecs,
        ],
    ),
    (
        "Network budget",
        &[
            ConfigKey::NetworkRecomputeIntervalSecs,
            ConfigKey::NetworkRttCeilingMs,
            ConfigKey::NetworkFastRttMs,
            ConfigKey::NetworkFastDownlinkMbps,
            ConfigKey::NetworkSlowDownlinkMbps,
        ],
    ),
    ("Logging", &[ConfigKey::LoggingDirectory, ConfigKey::LoggingLevel]),
];

fn describe(key: ConfigKey) -> &'static str {
    match key {
        ConfigKey::FeedWindowRadius => "items mounted on each side of the active one",
        ConfigKey::FeedPrefetchTriggerDistance => "items from the end that trigger a page fetch",
        ConfigKey::VisibilityThreshold => "visible ratio an item must exceed to activate",
        ConfigKey::VisibilitySettleMs => "time a candidate must stay on screen",
        ConfigKey::RetryBaseDelayMs => "first retry delay, doubled per attempt",
        ConfigKey::RetryMaxAttempts => "automatic retries before a slot gives up",
        ConfigKey::RetryMaxDelaySecs => "cap on a single retry delay",
        ConfigKey::NetworkRecomputeIntervalSecs => "minimum time between budget changes",
        ConfigKey::NetworkRttCeilingMs => "round trip above which the network is slow",
        ConfigKey::NetworkFastRttMs => "round trip below which the network may be fast",
        ConfigKey::NetworkFastDownlinkMbps => "downlink needed for the fast tier",
        ConfigKey::NetworkSlowDownlinkMbps => "downlink below which the network is slow",
        ConfigKey::LoggingDirectory => "directory holding reelfeed.log",
        ConfigKey::LoggingLevel => "default log level when RUST_LOG is unset",
    }
}

fn run_get(key: &str) -> Result<(), CliError> {
    let config_key = parse_key(key)?;
    let config = ConfigFile::load()?;
    let value = config_key.get(&config);

    if value.is_empty() {
        println!("(not set)");
    } else {
        println!("{}", value);
    }
    Ok(())
}

fn run_set(key: &str, value: &str) -> Result<(), CliError> {
    let config_key = parse_key(key)?;

    let mut config = ConfigFile::load()?;
    let previous = config_key.get(&config);
    config_key.set(&mut config, value)?;
    config.save()?;

    let current = config_key.get(&config);
    if previous == current {
        println!("{} unchanged ({})", config_key.name(), current);
    } else {
        println!("{}: {} -> {}", config_key.name(), previous, current);
    }
    Ok(())
}

fn run_list() -> Result<(), CliError> {
    let config = ConfigFile::load()?;
    print!("{}", render_list(&config));
    Ok(())
}

/// Settings grouped by concern, flagging values that differ from defaults.
fn render_list(config: &ConfigFile) -> String {
    let defaults = ConfigFile::default();
    let width = ConfigKey::all()
        .iter()
        .map(|key| key.name().len())
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    for (index, (concern, keys)) in CONCERNS.iter().enumerate() {
        if index > 0 {
            out.push('\n');
        }
        out.push_str(&format!("{}:\n", concern));
        for key in keys.iter() {
            let value = key.get(config);
            let shown = if value.is_empty() { "(not set)" } else { value.as_str() };
            let marker = if value != key.get(&defaults) { " *" } else { "" };
            out.push_str(&format!(
                "  {:<width$}  {}{}\n      {}\n",
                key.name(),
                shown,
                marker,
                describe(*key),
            ));
        }
    }
    out.push_str("\n* differs from default\n");
    out
}

fn run_path() -> Result<(), CliError> {
    println!("{}", config_file_path().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_key_listed_once() {
        let listed: Vec<ConfigKey> = CONCERNS
            .iter()
            .flat_map(|(_, keys)| keys.iter().copied())
            .collect();
        assert_eq!(listed.len(), ConfigKey::all().len());
        for key in ConfigKey::all() {
            assert_eq!(listed.iter().filter(|k| *k == key).count(), 1, "{key:?}");
        }
    }

    #[test]
    fn test_list_groups_by_concern() {
        let output = render_list(&ConfigFile::default());
        let windowing = output.find("Windowing:").unwrap();
        let activation = output.find("Activation:").unwrap();
        let network = output.find("Network budget:").unwrap();
        assert!(windowing < activation && activation < network);
        assert!(output.contains("feed.window_radius"));
        assert!(output.contains("items mounted on each side"));
        assert!(!output.contains("[feed]"));
    }

    #[test]
    fn test_list_marks_changed_values() {
        let mut config = ConfigFile::default();
        ConfigKey::FeedWindowRadius.set(&mut config, "3").unwrap();
        let output = render_list(&config);

        let radius = output
            .lines()
            .find(|line| line.contains("feed.window_radius"))
            .unwrap();
        assert!(radius.ends_with("3 *"), "{radius}");
        let attempts = output
            .lines()
            .find(|line| line.contains("retry.max_attempts"))
            .unwrap();
        assert!(!attempts.ends_with('*'), "{attempts}");
    }
}
