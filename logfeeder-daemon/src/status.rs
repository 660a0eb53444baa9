//! Periodic statistics and status snapshots.
//!
//! The stats reporter logs per-stage deltas through the assembler on a
//! fixed interval and refreshes the daemon gauges. [`DaemonStatus`] is a
//! serializable point-in-time view used by `--once` and by tests.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::{Mutex, broadcast};

use logfeeder_core::metrics as m;
use logfeeder_core::types::MetricData;
use logfeeder_pipeline::PipelineAssembler;

/// Point-in-time view of the running assembler.
#[derive(Debug, Clone, Serialize)]
pub struct DaemonStatus {
    /// Daemon uptime in seconds since start.
    pub uptime_secs: u64,
    /// Whether service configs are being diverted to the simulation catalog.
    pub simulation_mode: bool,
    /// Per-service input counts, sorted by service name.
    pub services: Vec<ServiceStatus>,
    /// Number of registered output instances.
    pub outputs: usize,
    /// Cumulative per-stage counters.
    pub metrics: Vec<MetricData>,
}

/// Input count for a single service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceStatus {
    pub name: String,
    pub inputs: usize,
}

impl DaemonStatus {
    /// Build a snapshot from the assembler's current state.
    pub fn snapshot(assembler: &PipelineAssembler, start_time: Instant) -> Self {
        let inputs = assembler.lifecycle().inputs();
        let services = inputs
            .service_names()
            .into_iter()
            .map(|name| ServiceStatus {
                name: name.to_owned(),
                inputs: inputs.input_count(name),
            })
            .collect();

        let mut metrics = Vec::new();
        assembler.collect_metrics(&mut metrics);

        Self {
            uptime_secs: start_time.elapsed().as_secs(),
            simulation_mode: assembler.is_simulation_mode(),
            services,
            outputs: assembler.lifecycle().outputs().len(),
            metrics,
        }
    }

    /// Total number of inputs across all services.
    pub fn total_inputs(&self) -> usize {
        self.services.iter().map(|s| s.inputs).sum()
    }
}

/// Spawn a background task that logs stage statistics every `interval`.
///
/// Also refreshes the uptime and active-services gauges so Prometheus
/// scrapes stay current.
pub fn spawn_stats_reporter(
    assembler: Arc<Mutex<PipelineAssembler>>,
    interval: Duration,
    start_time: Instant,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // First tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let assembler = assembler.lock().await;
                    assembler.log_stats();
                    let status = DaemonStatus::snapshot(&assembler, start_time);
                    drop(assembler);

                    #[allow(clippy::cast_precision_loss)]
                    {
                        metrics::gauge!(m::DAEMON_UPTIME_SECONDS).set(status.uptime_secs as f64);
                        metrics::gauge!(m::DAEMON_SERVICES_ACTIVE).set(status.services.len() as f64);
                    }
                    tracing::debug!(
                        services = status.services.len(),
                        inputs = status.total_inputs(),
                        outputs = status.outputs,
                        "stats reported"
                    );
                }
                _ = shutdown_rx.recv() => {
                    tracing::debug!("stats reporter shutting down");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use logfeeder_pipeline::{AssemblerConfig, BundledResources};

    #[tokio::test]
    async fn snapshot_of_fresh_assembler_is_empty() {
        let assembler = PipelineAssembler::new(AssemblerConfig::default())
            .with_resources(BundledResources::empty());
        let status = DaemonStatus::snapshot(&assembler, Instant::now());

        assert!(status.services.is_empty());
        assert_eq!(status.total_inputs(), 0);
        assert_eq!(status.outputs, 0);
        assert!(!status.simulation_mode);

        let json = serde_json::to_value(&status).expect("status should serialize");
        assert_eq!(json["outputs"], 0);
    }

    #[tokio::test]
    async fn stats_reporter_stops_on_shutdown() {
        let assembler = Arc::new(Mutex::new(PipelineAssembler::new(AssemblerConfig::default())));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let task = spawn_stats_reporter(
            assembler,
            Duration::from_millis(10),
            Instant::now(),
            shutdown_rx,
        );
        tokio::time::sleep(Duration::from_millis(30)).await;
        let _ = shutdown_tx.send(());

        let result = tokio::time::timeout(Duration::from_secs(1), task).await;
        assert!(result.is_ok(), "stats reporter should shut down within timeout");
    }
}
