use anyhow::Result;
use clap::Parser;

use logfeeder_core::config::FeederConfig;
use logfeeder_daemon::cli::DaemonCli;
use logfeeder_daemon::logging::init_tracing;
use logfeeder_daemon::orchestrator::Orchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    let mut config = FeederConfig::load(&cli.config)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load {}: {}", cli.config.display(), e))?;
    cli.apply_overrides(&mut config);
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

    if cli.validate {
        println!("configuration is valid: {}", cli.config.display());
        return Ok(());
    }

    init_tracing(&config.general)?;
    tracing::info!(config = %cli.config.display(), "logfeeder-daemon starting");

    let mut orchestrator = Orchestrator::build_from_config(config).await?;

    if cli.once {
        let status = orchestrator.run_once().await?;
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        orchestrator.run().await?;
    }

    tracing::info!("logfeeder-daemon shut down");
    Ok(())
}
