//! CLI argument definitions for the wrench binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Wrench: maintenance support core with provider failover.
#[derive(Parser, Debug)]
#[command(name = "wrench", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Data directory for the session database.
    #[arg(short = 'd', long = "data-dir", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List every provider chain with eligibility and priority.
    Providers,
    /// Time out idle chat sessions until interrupted.
    Sweep,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > WRENCH_CONFIG env var > ~/.wrench/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("WRENCH_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Data directory override, if given.
    pub fn resolve_data_dir(&self) -> Option<String> {
        self.data_dir
            .as_ref()
            .map(|p| p.to_string_lossy().to_string())
    }

    /// Log level override, if given.
    pub fn resolve_log_level(&self) -> Option<String> {
        self.log_level.clone()
    }
}

fn default_config_path() -> PathBuf {
    match std::env::var("HOME") {
        Ok(home) => PathBuf::from(home).join(".wrench").join("config.toml"),
        Err(_) => PathBuf::from("config.toml"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_subcommand_and_globals() {
        let args = CliArgs::parse_from([
            "wrench",
            "providers",
            "--config",
            "/etc/wrench.toml",
            "-l",
            "debug",
        ]);
        assert_eq!(args.command, Command::Providers);
        assert_eq!(args.resolve_config_path(), PathBuf::from("/etc/wrench.toml"));
        assert_eq!(args.resolve_log_level().as_deref(), Some("debug"));
        assert_eq!(args.resolve_data_dir(), None);
    }

    #[test]
    fn test_parse_sweep_with_data_dir() {
        let args = CliArgs::parse_from(["wrench", "-d", "/var/lib/wrench", "sweep"]);
        assert_eq!(args.command, Command::Sweep);
        assert_eq!(args.resolve_data_dir().as_deref(), Some("/var/lib/wrench"));
    }

    #[test]
    fn test_subcommand_required() {
        assert!(CliArgs::try_parse_from(["wrench"]).is_err());
    }
}
