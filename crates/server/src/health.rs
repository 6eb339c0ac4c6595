use std::path::PathBuf;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use brewbot_db::probe_writable;
use brewbot_scheduler::ReminderService;
use chrono::Utc;
use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Clone)]
pub struct HealthState {
    pub instance_id: Uuid,
    pub data_dir: PathBuf,
    pub reminders: ReminderService,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReminderStats {
    pub pending: usize,
    pub armed_timers: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub instance_id: String,
    pub storage: HealthCheck,
    pub reminders: ReminderStats,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

pub async fn spawn(bind_address: &str, port: u16, state: HealthState) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        correlation_id = %state.instance_id,
        bind_address = %address,
        "health endpoint started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(state)).await {
            error!(
                event_name = "system.health.error",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let storage = storage_check(&state.data_dir);
    let ready = storage.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        instance_id: state.instance_id.to_string(),
        storage,
        reminders: ReminderStats {
            pending: state.reminders.pending_count().await,
            armed_timers: state.reminders.armed_timer_count().await,
        },
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

fn storage_check(data_dir: &std::path::Path) -> HealthCheck {
    match probe_writable(data_dir) {
        Ok(()) => HealthCheck {
            status: "ready",
            detail: format!("data directory `{}` is writable", data_dir.display()),
        },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("storage probe failed: {error}") }
        }
    }
}
