//! Logging initialization for logfeeder-daemon.
//!
//! Configures `tracing-subscriber` from the `[general]` section of
//! `FeederConfig`. `RUST_LOG` wins over the configured level when set.

use std::str::FromStr;

use anyhow::Result;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use logfeeder_core::config::GeneralConfig;

/// Crates whose events follow the configured level. Everything else is
/// capped at `warn` so dependency chatter stays out of the log stream.
const OWN_CRATES: [&str; 3] = ["logfeeder_core", "logfeeder_pipeline", "logfeeder_daemon"];

/// Output format of the log stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Machine-parseable JSON lines (default for production).
    Json,
    /// Human-readable multi-line output (for development).
    Pretty,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            other => Err(anyhow::anyhow!(
                "unknown log format '{}', expected 'json' or 'pretty'",
                other
            )),
        }
    }
}

/// Filter directives used when `RUST_LOG` is not set.
pub fn default_directives(level: &str) -> String {
    let mut directives = vec!["warn".to_owned()];
    directives.extend(OWN_CRATES.iter().map(|krate| format!("{krate}={level}")));
    directives.join(",")
}

/// Initialize the global tracing subscriber.
///
/// Must be called exactly once, before any tracing macros are used.
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let format: LogFormat = config.log_format.parse()?;
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(&config.log_level)));

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
            .try_init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init(),
    };
    result.map_err(|e| anyhow::anyhow!("failed to initialize tracing subscriber: {}", e))
}
