mod config;
mod demo_transport;
mod runtime;

use std::sync::Arc;
use std::time::Duration;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::MakeWriterExt;

use voxpipe_foundation::{AppState, StateManager};
use voxpipe_provisioning::{
    FailureReason, Provisioner, ProvisioningCallbacks, ProvisioningOptions,
};

use crate::config::AppConfig;
use crate::demo_transport::LoopbackTransport;

fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all("logs")?;
    let file_appender = RollingFileAppender::new(Rotation::DAILY, "logs", "voxpipe.log");
    let (non_blocking_file, _guard) = tracing_appender::non_blocking(file_appender);
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_writer(std::io::stdout.and(non_blocking_file))
        .with_env_filter(log_level)
        .init();
    std::mem::forget(_guard);
    Ok(())
}

/// Walk the provisioning exchange to completion before audio starts.
fn run_provisioning(config: &AppConfig) -> anyhow::Result<()> {
    let (done_tx, done_rx) = crossbeam_channel::bounded::<Result<String, FailureReason>>(1);
    let success_tx = done_tx.clone();

    let transport = Arc::new(LoopbackTransport::new("VoxPipe-Demo-Net"));
    let provisioner = Provisioner::new(transport);
    provisioner.start(
        ProvisioningOptions {
            name_prefix: config.provisioning.name_prefix.clone(),
            pop: config.provisioning.pop.clone(),
            timeout: Some(Duration::from_secs(config.provisioning.timeout_minutes * 60)),
        },
        ProvisioningCallbacks {
            on_connecting: Box::new(|ssid| tracing::info!(%ssid, "Joining network")),
            on_success: Box::new(move |ssid| {
                let _ = success_tx.send(Ok(ssid.to_string()));
            }),
            on_failure: Box::new(move |reason| {
                let _ = done_tx.send(Err(reason));
            }),
        },
    )?;

    match done_rx.recv_timeout(Duration::from_secs(30)) {
        Ok(Ok(ssid)) => {
            tracing::info!(%ssid, "Network provisioned");
            Ok(())
        }
        Ok(Err(reason)) => anyhow::bail!("provisioning failed: {}", reason),
        Err(_) => anyhow::bail!("provisioning did not complete"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging().map_err(|e| anyhow::anyhow!("logging init failed: {}", e))?;
    tracing::info!("Starting VoxPipe");

    let config_path = std::env::var("VOXPIPE_CONFIG").ok();
    let config = AppConfig::load(config_path.as_deref())?;
    let state_manager = StateManager::new();

    if config.provisioning.enabled {
        state_manager.transition(AppState::Provisioning)?;
        run_provisioning(&config)?;
        state_manager.transition(AppState::Running)?;
    } else {
        state_manager.transition(AppState::Running)?;
    }

    let handle = runtime::start_pipeline(&config)?;
    tracing::info!(demo_secs = config.demo_secs, "Pipeline running");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Ctrl-C received");
        }
        _ = tokio::time::sleep(Duration::from_secs(config.demo_secs)) => {
            tracing::info!("Demo window elapsed");
        }
    }

    state_manager.transition(AppState::Stopping)?;
    handle.shutdown();
    state_manager.transition(AppState::Stopped)?;
    tracing::info!("VoxPipe exited cleanly");
    Ok(())
}
