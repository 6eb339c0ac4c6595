mod bootstrap;
mod health;

use std::time::Duration;

use anyhow::Result;
use brewbot_core::config::{AppConfig, LoadOptions, LogFormat};
use brewbot_scheduler::spawn_pairing_job;
use tracing_subscriber::EnvFilter;

use crate::bootstrap::{bootstrap_with_config, Collaborators};
use crate::health::HealthState;

fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));
    let builder = tracing_subscriber::fmt().with_target(false).with_env_filter(filter);

    match config.logging.format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let mut app = bootstrap_with_config(config, Collaborators::default()).await?;
    let correlation_id = app.instance_id.to_string();

    let sweeper = app.start_reminders().await;
    let pairing = app.pairing_job.take().map(spawn_pairing_job);
    if pairing.is_none() {
        tracing::warn!(
            event_name = "system.server.pairing_unscheduled",
            correlation_id = %correlation_id,
            "no chat.guild_id configured; scheduled coffee pairings are disabled"
        );
    }

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        HealthState {
            instance_id: app.instance_id,
            data_dir: app.config.storage.data_dir.clone(),
            reminders: app.reminders.clone(),
        },
    )
    .await?;

    app.gateway.start().await?;

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = %correlation_id,
        "brewbot-server started"
    );
    wait_for_shutdown().await?;
    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = %correlation_id,
        grace_secs = app.config.server.graceful_shutdown_secs,
        "brewbot-server stopping"
    );

    let background: Vec<_> = sweeper.into_iter().chain(pairing).collect();
    for task in &background {
        task.abort();
    }
    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    let drained = tokio::time::timeout(grace, async move {
        for task in background {
            let _ = task.await;
        }
    })
    .await;
    if drained.is_err() {
        tracing::warn!(
            event_name = "system.server.shutdown_timeout",
            correlation_id = %correlation_id,
            "background jobs did not stop within the grace period"
        );
    }

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
