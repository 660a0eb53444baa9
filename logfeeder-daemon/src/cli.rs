//! CLI argument definitions for logfeeder-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

use logfeeder_core::config::FeederConfig;

/// logfeeder log shipping daemon.
///
/// Loads global/output config documents, builds one input -> filter -> output
/// pipeline per service found in the input config directory, and keeps those
/// pipelines in sync with the directory until shut down.
#[derive(Parser, Debug)]
#[command(name = "logfeeder-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to logfeeder.toml configuration file.
    #[arg(short, long, default_value = "/etc/logfeeder/logfeeder.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration file and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,

    /// Override PID file path (takes precedence over config file).
    #[arg(long)]
    pub pid_file: Option<String>,

    /// Override the number of simulated inputs (0 disables simulation).
    #[arg(long)]
    pub simulate: Option<usize>,

    /// Load every service once, wait for inputs to finish, print a status
    /// summary and exit. Intended for non-tailing file inputs.
    #[arg(long)]
    pub once: bool,
}

impl DaemonCli {
    /// Apply CLI overrides on top of a loaded configuration.
    pub fn apply_overrides(&self, config: &mut FeederConfig) {
        if let Some(level) = &self.log_level {
            config.general.log_level.clone_from(level);
        }
        if let Some(format) = &self.log_format {
            config.general.log_format.clone_from(format);
        }
        if let Some(pid_file) = &self.pid_file {
            config.general.pid_file.clone_from(pid_file);
        }
        if let Some(count) = self.simulate {
            config.feed.simulate_input_number = count;
        }
    }
}
