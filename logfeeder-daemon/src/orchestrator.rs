//! Daemon orchestration -- assembly, config watching, and lifecycle management.
//!
//! The [`Orchestrator`] is the central coordinator of `logfeeder-daemon`.
//! It owns the [`PipelineAssembler`] behind a `tokio::sync::Mutex` so that
//! directory reloads and periodic stats never interleave with each other.
//!
//! # Startup Order
//!
//! 1. PID file
//! 2. Global/output config documents, then outputs, then simulation inputs
//! 3. Stale checkpoint cleanup
//! 4. Initial load of every `input.config-<service>.json`
//! 5. Background tasks: config watcher, stats reporter, uptime updater
//!
//! # Shutdown Order
//!
//! 1. Broadcast shutdown to background tasks and wait for them
//! 2. Close the assembler (inputs first, then outputs)
//! 3. Remove PID file

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::{Mutex, broadcast};

use logfeeder_core::config::FeederConfig;
use logfeeder_pipeline::{AssemblerConfig, DirectoryInputConfigSource, PipelineAssembler};

use crate::metrics_server;
use crate::status::{DaemonStatus, spawn_stats_reporter};

/// The main daemon orchestrator.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: FeederConfig,
    /// Shared assembler; every mutation goes through this lock.
    assembler: Arc<Mutex<PipelineAssembler>>,
    /// Shutdown broadcast sender (signals all background tasks).
    shutdown_tx: broadcast::Sender<()>,
    /// Daemon start time (for uptime reporting).
    start_time: Instant,
}

impl Orchestrator {
    /// Load configuration and build the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file cannot be read, parsed,
    /// or fails validation.
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = FeederConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config).await
    }

    /// Build from an already-loaded configuration.
    pub async fn build_from_config(config: FeederConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        let assembler_config = AssemblerConfig::from_core(&config.feed);
        assembler_config
            .validate()
            .map_err(|e| anyhow::anyhow!("feed config validation failed: {}", e))?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
            tracing::info!(port = config.metrics.port, "metrics endpoint enabled");
        }

        let (shutdown_tx, _) = broadcast::channel(16);
        tracing::info!(
            sources = ?assembler_config.config_sources(),
            input_config_dir = %assembler_config.input_config_dir.display(),
            simulate = assembler_config.simulate_input_number,
            "orchestrator initialized"
        );

        Ok(Self {
            config,
            assembler: Arc::new(Mutex::new(PipelineAssembler::new(assembler_config))),
            shutdown_tx,
            start_time: Instant::now(),
        })
    }

    /// Load config documents and every service config found in the input
    /// config directory.
    ///
    /// Returns the directory source so callers can keep polling it.
    pub async fn start(&self) -> Result<DirectoryInputConfigSource> {
        let mut assembler = self.assembler.lock().await;
        assembler
            .init()
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config documents: {}", e))?;
        assembler.clean_checkpoints();

        let mut source = DirectoryInputConfigSource::new(&assembler.config().input_config_dir);
        let summary = source
            .load_all(&mut *assembler)
            .await
            .map_err(|e| anyhow::anyhow!("failed to read input config directory: {}", e))?;
        tracing::info!(
            services = summary.loaded.len(),
            failed = summary.failed,
            "initial service configs applied"
        );
        Ok(source)
    }

    /// Start the pipelines and block until a shutdown signal is received.
    ///
    /// # Shutdown Triggers
    ///
    /// - `SIGTERM` (from systemd, Docker, or `kill`)
    /// - `SIGINT` (Ctrl+C)
    pub async fn run(&mut self) -> Result<()> {
        let pid_file = self.pid_file();
        if let Some(path) = pid_file {
            write_pid_file(path)?;
        }

        let source = match self.start().await {
            Ok(source) => source,
            Err(e) => {
                tracing::error!(error = %e, "startup failed");
                self.shutdown().await;
                if let Some(path) = pid_file {
                    remove_pid_file(path);
                }
                return Err(e);
            }
        };

        let watcher_task = spawn_config_watcher(
            Arc::clone(&self.assembler),
            source,
            Duration::from_secs(self.config.feed.config_poll_secs),
            self.shutdown_tx.subscribe(),
        );
        let stats_task = spawn_stats_reporter(
            Arc::clone(&self.assembler),
            Duration::from_secs(self.config.feed.stats_interval_secs),
            self.start_time,
            self.shutdown_tx.subscribe(),
        );
        let uptime_task = self
            .config
            .metrics
            .enabled
            .then(|| spawn_uptime_updater(self.start_time, self.shutdown_tx.subscribe()));

        tracing::info!("entering main loop");
        let signal = wait_for_shutdown_signal().await?;
        tracing::info!(signal = signal, "shutdown signal received");

        let _ = self.shutdown_tx.send(());
        let _ = watcher_task.await;
        let _ = stats_task.await;
        if let Some(task) = uptime_task {
            let _ = task.await;
        }

        self.shutdown().await;

        if let Some(path) = pid_file {
            remove_pid_file(path);
        }
        Ok(())
    }

    /// Load every service once, wait for all inputs to finish on their own,
    /// then close. Returns the final status.
    pub async fn run_once(&mut self) -> Result<DaemonStatus> {
        let started = self.start().await;
        let mut assembler = self.assembler.lock().await;
        if started.is_ok() {
            assembler.wait_on_all_inputs().await;
        }
        assembler.log_stats();
        let status = DaemonStatus::snapshot(&assembler, self.start_time);
        assembler.close().await;
        started?;
        Ok(status)
    }

    /// Close every input and output. Safe to call more than once.
    pub async fn shutdown(&self) {
        tracing::info!("closing pipelines");
        self.assembler.lock().await.close().await;
    }

    /// Current status snapshot.
    pub async fn status(&self) -> DaemonStatus {
        let assembler = self.assembler.lock().await;
        DaemonStatus::snapshot(&assembler, self.start_time)
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &FeederConfig {
        &self.config
    }

    /// Shared handle to the assembler.
    pub fn assembler(&self) -> Arc<Mutex<PipelineAssembler>> {
        Arc::clone(&self.assembler)
    }

    fn pid_file(&self) -> Option<&Path> {
        let path = self.config.general.pid_file.as_str();
        (!path.is_empty()).then(|| Path::new(path))
    }
}

/// Spawn a background task that polls the input config directory and
/// applies changed or removed service configs.
pub fn spawn_config_watcher(
    assembler: Arc<Mutex<PipelineAssembler>>,
    mut source: DirectoryInputConfigSource,
    interval: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let mut assembler = assembler.lock().await;
                    if let Err(e) = source.poll_changes(&mut *assembler).await {
                        tracing::warn!(
                            dir = %source.dir().display(),
                            error = %e,
                            "input config poll failed"
                        );
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::debug!("config watcher shutting down");
                    break;
                }
            }
        }
    })
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Write the current process PID to a file.
///
/// Fails if the file already exists, so a second daemon instance refuses to
/// start. The file is created atomically with mode 0o600 inside a parent
/// directory created with mode 0o700.
pub fn write_pid_file(path: &Path) -> Result<()> {
    use std::fs::{self, OpenOptions};
    use std::io::{ErrorKind, Write};

    if let Some(parent) = path.parent() {
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            fs::DirBuilder::new()
                .mode(0o700)
                .recursive(true)
                .create(parent)?;
        }
        #[cfg(not(unix))]
        {
            fs::create_dir_all(parent)?;
        }
    }

    let pid = std::process::id();
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            let existing_pid = fs::read_to_string(path).unwrap_or_else(|_| "unknown".to_owned());
            return Err(anyhow::anyhow!(
                "PID file {} already exists with PID: {}. Is another instance running?",
                path.display(),
                existing_pid.trim()
            ));
        }
        Err(e) => return Err(e.into()),
    };

    if !file.metadata()?.is_file() {
        let _ = fs::remove_file(path);
        return Err(anyhow::anyhow!(
            "PID file {} is not a regular file",
            path.display()
        ));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }

    writeln!(file, "{}", pid)?;
    tracing::info!(pid = pid, path = %path.display(), "PID file written");
    Ok(())
}

/// Remove the PID file on daemon shutdown.
///
/// Logs a warning but does not fail if the file cannot be removed.
pub fn remove_pid_file(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        tracing::warn!(path = %path.display(), error = %e, "failed to remove PID file");
    } else {
        tracing::info!(path = %path.display(), "PID file removed");
    }
}

/// Spawn a background task that refreshes the uptime gauge every 10 seconds.
fn spawn_uptime_updater(
    start_time: Instant,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    use logfeeder_core::metrics as m;

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(10));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    #[allow(clippy::cast_precision_loss)]
                    metrics::gauge!(m::DAEMON_UPTIME_SECONDS).set(start_time.elapsed().as_secs() as f64);
                }
                _ = shutdown_rx.recv() => {
                    tracing::debug!("uptime updater shutting down");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn write_pid_file_creates_parent_directory() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let pid_file = dir.path().join("subdir").join("logfeeder.pid");

        write_pid_file(&pid_file).expect("write_pid_file should create parent directory");

        let content = fs::read_to_string(&pid_file).expect("should read PID file");
        assert_eq!(content.trim(), std::process::id().to_string());
    }

    #[test]
    fn write_pid_file_fails_if_already_exists() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let pid_file = dir.path().join("logfeeder.pid");
        fs::write(&pid_file, "12345").expect("should write initial PID file");

        let err_msg = write_pid_file(&pid_file).unwrap_err().to_string();
        assert!(err_msg.contains("already exists"), "got: {}", err_msg);
        assert!(err_msg.contains("12345"), "got: {}", err_msg);
    }

    #[test]
    fn remove_pid_file_handles_nonexistent_gracefully() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        remove_pid_file(&dir.path().join("missing.pid"));
    }

    #[tokio::test]
    async fn config_watcher_applies_new_service_and_stops_on_shutdown() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let inputs = dir.path().join("inputs");
        fs::create_dir(&inputs).expect("should create inputs dir");

        let config = logfeeder_pipeline::AssemblerConfigBuilder::new()
            .input_config_dir(&inputs)
            .checkpoint_dir(dir.path().join("cp"))
            .build()
            .expect("valid config");
        let assembler = Arc::new(Mutex::new(PipelineAssembler::new(config)));
        let source = DirectoryInputConfigSource::new(&inputs);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let task = spawn_config_watcher(
            Arc::clone(&assembler),
            source,
            Duration::from_millis(10),
            shutdown_rx,
        );

        let log = dir.path().join("app.log");
        fs::write(&log, "k=v\n").expect("should write log");
        let service = serde_json::json!({
            "input": [{"source": "file", "type": "app", "path": log}],
            "filter": [{"filter": "keyvalue"}]
        });
        fs::write(inputs.join("input.config-app.json"), service.to_string())
            .expect("should write service config");

        let mut loaded = false;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            if assembler.lock().await.lifecycle().inputs().contains_service("app") {
                loaded = true;
                break;
            }
        }
        assert!(loaded, "watcher should pick up the new service config");

        let _ = shutdown_tx.send(());
        let result = tokio::time::timeout(Duration::from_secs(1), task).await;
        assert!(result.is_ok(), "watcher should shut down within timeout");
        assembler.lock().await.close().await;
    }
}
