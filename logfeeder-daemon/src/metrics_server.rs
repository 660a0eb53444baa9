//! Prometheus metrics HTTP server.
//!
//! Uses the built-in HTTP listener from `metrics-exporter-prometheus`.
//! Once installed, every `metrics::counter!()` / `metrics::gauge!()` call in
//! the pipeline crate is exported under the `logfeeder_` prefix.
//!
//! ```ignore
//! let config = MetricsConfig { enabled: true, ..MetricsConfig::default() };
//! install_metrics_recorder(&config)?;
//! ```

use std::net::SocketAddr;

use anyhow::Result;
use metrics_exporter_prometheus::PrometheusBuilder;

use logfeeder_core::config::MetricsConfig;

/// Resolve and check the listen address without binding it.
pub fn listen_address(config: &MetricsConfig) -> Result<SocketAddr> {
    if config.endpoint != "/metrics" {
        return Err(anyhow::anyhow!(
            "unsupported metrics endpoint '{}': only '/metrics' is currently supported",
            config.endpoint
        ));
    }

    format!("{}:{}", config.listen_addr, config.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid metrics listen address: {}", e))
}

/// Install the global metrics recorder and start the HTTP listener.
///
/// Should be called once per process.
///
/// # Errors
///
/// - Invalid endpoint or listen address
/// - Socket binding fails
/// - Global recorder is already installed
pub fn install_metrics_recorder(config: &MetricsConfig) -> Result<()> {
    let addr = listen_address(config)?;

    if addr.ip().is_unspecified() {
        tracing::warn!(
            listen_addr = %addr,
            "metrics endpoint is exposed on all interfaces; restrict listen_addr in untrusted networks"
        );
    }

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("failed to install metrics recorder: {}", e))?;

    logfeeder_core::metrics::describe_all();
    tracing::info!(listen_addr = %addr, "Prometheus metrics endpoint active");
    Ok(())
}
