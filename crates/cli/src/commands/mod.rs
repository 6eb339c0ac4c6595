pub mod config;
pub mod doctor;
pub mod history;
pub mod reminders;

use std::future::Future;

use anyhow::Context;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
}

#[derive(Debug, Serialize)]
struct CommandData<'a> {
    command: &'a str,
    status: &'static str,
    data: Value,
}

impl CommandResult {
    /// Successful result carrying a structured `data` document.
    pub fn data(command: &str, data: Value) -> Self {
        let payload = CommandData { command, status: "ok", data };
        let output = serde_json::to_string_pretty(&payload).unwrap_or_else(|error| {
            serialize_payload(&CommandOutcome {
                command: command.to_string(),
                status: "error".to_string(),
                error_class: Some("serialization".to_string()),
                message: error.to_string(),
            })
        });
        Self { exit_code: 0, output }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
        };
        Self { exit_code, output: serialize_payload(&payload) }
    }
}

/// Exit code for configuration that fails to load or validate.
pub const EXIT_CONFIG: u8 = 2;
/// Exit code for runtime failures after configuration loaded.
pub const EXIT_RUNTIME: u8 = 1;

fn serialize_payload(payload: &CommandOutcome) -> String {
    serde_json::to_string(payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// Drives an async store call from the synchronous CLI entry point.
pub(crate) fn block_on<F: Future>(future: F) -> anyhow::Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to initialize async runtime")?;
    Ok(runtime.block_on(future))
}
