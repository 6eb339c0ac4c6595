use std::env;
use std::fs;
use std::sync::{Mutex, OnceLock};

use brewbot_cli::commands::{config, doctor, history, reminders};
use brewbot_core::config::LoadOptions;
use serde_json::Value;
use tempfile::TempDir;

#[test]
fn config_reports_env_sources_and_redacts_the_token() {
    let dir = TempDir::new().expect("temp dir");
    let data_dir = dir.path().display().to_string();
    with_env(
        &[("BREWBOT_STORAGE_DATA_DIR", &data_dir), ("BREWBOT_CHAT_BOT_TOKEN", "MTIz.very.secret")],
        || {
            let result = config::run(LoadOptions::default());
            assert_eq!(result.exit_code, 0);
            assert!(!result.output.contains("very.secret"));

            let payload = parse_payload(&result.output);
            assert_eq!(payload["command"], "config");
            let values = payload["data"]["values"].as_array().expect("values");
            let data_dir_line = values
                .iter()
                .find(|line| line["key"] == "storage.data_dir")
                .expect("data_dir line");
            assert_eq!(data_dir_line["source"], "env (BREWBOT_STORAGE_DATA_DIR)");
        },
    );
}

#[test]
fn config_returns_validation_failure_for_bad_env() {
    with_env(&[("BREWBOT_COFFEE_CADENCE", "monthly")], || {
        let result = config::run(LoadOptions::default());
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn doctor_json_passes_on_an_empty_data_dir() {
    let dir = TempDir::new().expect("temp dir");
    let data_dir = dir.path().join("data").display().to_string();
    with_env(&[("BREWBOT_STORAGE_DATA_DIR", &data_dir)], || {
        let result = doctor::run(LoadOptions::default(), true);
        assert_eq!(result.exit_code, 0, "{}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "pass");
        assert_eq!(payload["checks"].as_array().map(Vec::len), Some(4));
    });
}

#[test]
fn reminders_lists_persisted_entries_for_one_user() {
    let dir = TempDir::new().expect("temp dir");
    fs::write(
        dir.path().join("reminders.json"),
        r#"[
            {"id": "2", "userId": "U1", "msg": "later", "time": 4102444800000},
            {"id": "1", "userId": "U2", "msg": "other", "time": 4102444800000},
            {"id": "3", "userId": "U1", "msg": "sooner", "time": 4102358400000}
        ]"#,
    )
    .expect("write reminders");
    let data_dir = dir.path().display().to_string();

    with_env(&[("BREWBOT_STORAGE_DATA_DIR", &data_dir)], || {
        let result = reminders::run(LoadOptions::default(), Some("U1"));
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["data"]["count"], 2);
        assert_eq!(payload["data"]["reminders"][0]["msg"], "sooner");
        assert_eq!(payload["data"]["reminders"][1]["dueAt"], "2100-01-01T00:00:00Z");
    });
}

#[test]
fn history_reads_legacy_records() {
    let dir = TempDir::new().expect("temp dir");
    fs::write(
        dir.path().join("coffee_pairs.json"),
        r#"{ "A": { "lastPaired": 1000, "partners": ["B"] } }"#,
    )
    .expect("write history");
    let data_dir = dir.path().display().to_string();

    with_env(&[("BREWBOT_STORAGE_DATA_DIR", &data_dir)], || {
        let result = history::run(LoadOptions::default(), "B");
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        let partners = payload["data"]["partners"].as_array().expect("partners");
        assert_eq!(partners.len(), 1);
        assert_eq!(partners[0]["partnerId"], "A");
        assert_eq!(partners[0]["pairCount"], 1);
        assert_eq!(partners[0]["lastPairedAt"], 1000);
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "BREWBOT_STORAGE_DATA_DIR",
        "BREWBOT_CHAT_BOT_TOKEN",
        "BREWBOT_CHAT_GUILD_ID",
        "BREWBOT_CHAT_ADMIN_USER_ID",
        "BREWBOT_CHAT_ALLOWED_USER_IDS",
        "BREWBOT_COFFEE_CADENCE",
        "BREWBOT_COFFEE_CRON",
        "BREWBOT_COFFEE_MIN_LEVEL",
        "BREWBOT_LOGGING_LEVEL",
        "BREWBOT_LOGGING_FORMAT",
        "BREWBOT_LOG_LEVEL",
        "BREWBOT_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        match value {
            Some(value) => env::set_var(key, value),
            None => env::remove_var(key),
        }
    }
}
