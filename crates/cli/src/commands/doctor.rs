use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use brewbot_core::config::{AppConfig, LoadOptions};
use brewbot_core::domain::pairing::PairingHistory;
use brewbot_db::probe_writable;
use serde::Serialize;

use super::{CommandResult, EXIT_RUNTIME};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

const CONFIG_CHECK: &str = "config_validation";
const DATA_DIR_CHECK: &str = "data_dir_writable";
const REMINDERS_CHECK: &str = "reminders_store_readable";
const HISTORY_CHECK: &str = "pairing_history_readable";

pub fn run(options: LoadOptions, json_output: bool) -> CommandResult {
    let report = build_report(AppConfig::load(options).map_err(|error| error.to_string()));
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { EXIT_RUNTIME };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report(loaded: Result<AppConfig, String>) -> DoctorReport {
    let mut checks = Vec::new();

    match loaded {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: CONFIG_CHECK,
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_data_dir(&config.storage.data_dir));
            checks.push(check_reminders_store(&config.storage.reminders_path()));
            checks.push(check_pairing_history(&config.storage.pairing_history_path()));
        }
        Err(error) => {
            checks.push(DoctorCheck { name: CONFIG_CHECK, status: CheckStatus::Fail, details: error });
            for name in [DATA_DIR_CHECK, REMINDERS_CHECK, HISTORY_CHECK] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_data_dir(data_dir: &Path) -> DoctorCheck {
    match probe_writable(data_dir) {
        Ok(()) => DoctorCheck {
            name: DATA_DIR_CHECK,
            status: CheckStatus::Pass,
            details: format!("`{}` accepts writes", data_dir.display()),
        },
        Err(error) => {
            DoctorCheck { name: DATA_DIR_CHECK, status: CheckStatus::Fail, details: error.to_string() }
        }
    }
}

fn check_reminders_store(path: &Path) -> DoctorCheck {
    let result = read_document(path).and_then(|document| match document {
        None => Ok(format!("`{}` not created yet", path.display())),
        Some(serde_json::Value::Array(items)) => {
            Ok(format!("`{}` holds {} reminders", path.display(), items.len()))
        }
        Some(_) => Err(format!("`{}` is not a JSON array", path.display())),
    });
    into_check(REMINDERS_CHECK, result)
}

fn check_pairing_history(path: &Path) -> DoctorCheck {
    let result = read_document(path).and_then(|document| match document {
        None => Ok(format!("`{}` not created yet", path.display())),
        Some(value) => PairingHistory::from_json(value, 0)
            .map(|history| {
                format!("`{}` holds {} participant records", path.display(), history.len())
            })
            .map_err(|error| format!("`{}`: {error}", path.display())),
    });
    into_check(HISTORY_CHECK, result)
}

/// Reads and parses a store document. A missing file is healthy; stores
/// create it on first save.
fn read_document(path: &Path) -> Result<Option<serde_json::Value>, String> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
        Err(error) => return Err(format!("could not read `{}`: {error}", path.display())),
    };

    if raw.trim().is_empty() {
        return Ok(None);
    }

    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|error| format!("`{}` is not valid JSON: {error}", path.display()))
}

fn into_check(name: &'static str, result: Result<String, String>) -> DoctorCheck {
    match result {
        Ok(details) => DoctorCheck { name, status: CheckStatus::Pass, details },
        Err(details) => DoctorCheck { name, status: CheckStatus::Fail, details },
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
