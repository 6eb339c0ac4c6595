use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use brewbot_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use serde::Serialize;
use serde_json::json;
use toml::Value;

use super::{CommandResult, EXIT_CONFIG};

const COMMAND: &str = "config";

#[derive(Debug, Serialize)]
struct ConfigLine {
    key: &'static str,
    value: String,
    source: String,
}

pub fn run(options: LoadOptions) -> CommandResult {
    let explicit_path = options.config_path.clone();
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "config_validation",
                format!("config validation failed: {error}"),
                EXIT_CONFIG,
            )
        }
    };

    let config_file_path = explicit_path.or_else(detect_config_path);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let lines = render(&config, config_file_doc.as_ref(), config_file_path.as_deref());

    CommandResult::data(
        COMMAND,
        json!({
            "precedence": "overrides > env > file > default",
            "config_file": config_file_path.map(|path| path.display().to_string()),
            "values": lines,
        }),
    )
}

fn render(config: &AppConfig, doc: Option<&Value>, file_path: Option<&Path>) -> Vec<ConfigLine> {
    let bot_token = match &config.chat.bot_token {
        Some(token) => redact_token(token.expose_secret()),
        None => "<unset>".to_string(),
    };

    let entries: Vec<(&'static str, &'static str, String)> = vec![
        (
            "storage.data_dir",
            "BREWBOT_STORAGE_DATA_DIR",
            config.storage.data_dir.display().to_string(),
        ),
        (
            "storage.lock_max_retries",
            "BREWBOT_STORAGE_LOCK_MAX_RETRIES",
            config.storage.lock_max_retries.to_string(),
        ),
        (
            "storage.lock_retry_delay_ms",
            "BREWBOT_STORAGE_LOCK_RETRY_DELAY_MS",
            config.storage.lock_retry_delay_ms.to_string(),
        ),
        (
            "storage.lock_stale_after_secs",
            "BREWBOT_STORAGE_LOCK_STALE_AFTER_SECS",
            config.storage.lock_stale_after_secs.to_string(),
        ),
        ("chat.bot_token", "BREWBOT_CHAT_BOT_TOKEN", bot_token),
        ("chat.guild_id", "BREWBOT_CHAT_GUILD_ID", optional(config.chat.guild_id.as_deref())),
        (
            "chat.admin_user_id",
            "BREWBOT_CHAT_ADMIN_USER_ID",
            optional(config.chat.admin_user_id.as_deref()),
        ),
        (
            "chat.allowed_user_ids",
            "BREWBOT_CHAT_ALLOWED_USER_IDS",
            config.chat.allowed_user_ids.join(","),
        ),
        ("coffee.role_name", "BREWBOT_COFFEE_ROLE_NAME", config.coffee.role_name.clone()),
        ("coffee.cron", "BREWBOT_COFFEE_CRON", config.coffee.cron.clone()),
        ("coffee.cadence", "BREWBOT_COFFEE_CADENCE", config.coffee.cadence.as_str().to_string()),
        (
            "coffee.cooldown_days",
            "BREWBOT_COFFEE_COOLDOWN_DAYS",
            config.coffee.cooldown_days.to_string(),
        ),
        (
            "coffee.fetch_members",
            "BREWBOT_COFFEE_FETCH_MEMBERS",
            config.coffee.fetch_members.to_string(),
        ),
        (
            "coffee.fetch_timeout_ms",
            "BREWBOT_COFFEE_FETCH_TIMEOUT_MS",
            config.coffee.fetch_timeout_ms.to_string(),
        ),
        ("coffee.min_level", "BREWBOT_COFFEE_MIN_LEVEL", config.coffee.min_level.to_string()),
        (
            "coffee.leaderboard_base_url",
            "BREWBOT_COFFEE_LEADERBOARD_BASE_URL",
            config.coffee.leaderboard_base_url.clone(),
        ),
        (
            "coffee.strict_level_filter",
            "BREWBOT_COFFEE_STRICT_LEVEL_FILTER",
            config.coffee.strict_level_filter.to_string(),
        ),
        ("coffee.dm_delay_ms", "BREWBOT_COFFEE_DM_DELAY_MS", config.coffee.dm_delay_ms.to_string()),
        (
            "reminders.sweep_interval_secs",
            "BREWBOT_REMINDERS_SWEEP_INTERVAL_SECS",
            config.reminders.sweep_interval_secs.to_string(),
        ),
        (
            "reminders.sweep_grace_secs",
            "BREWBOT_REMINDERS_SWEEP_GRACE_SECS",
            config.reminders.sweep_grace_secs.to_string(),
        ),
        (
            "reminders.duplicate_tolerance_ms",
            "BREWBOT_REMINDERS_DUPLICATE_TOLERANCE_MS",
            config.reminders.duplicate_tolerance_ms.to_string(),
        ),
        (
            "server.bind_address",
            "BREWBOT_SERVER_BIND_ADDRESS",
            config.server.bind_address.clone(),
        ),
        (
            "server.health_check_port",
            "BREWBOT_SERVER_HEALTH_CHECK_PORT",
            config.server.health_check_port.to_string(),
        ),
        (
            "server.graceful_shutdown_secs",
            "BREWBOT_SERVER_GRACEFUL_SHUTDOWN_SECS",
            config.server.graceful_shutdown_secs.to_string(),
        ),
        ("logging.level", "BREWBOT_LOGGING_LEVEL", config.logging.level.clone()),
        ("logging.format", "BREWBOT_LOGGING_FORMAT", format!("{:?}", config.logging.format)),
    ];

    entries
        .into_iter()
        .map(|(key, env_key, value)| ConfigLine {
            key,
            value,
            source: field_source(key, env_key, doc, file_path),
        })
        .collect()
}

fn optional(value: Option<&str>) -> String {
    value.unwrap_or("<unset>").to_string()
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("brewbot.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/brewbot.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

/// Keeps only the first dot-separated segment of a bot token, which encodes
/// the bot's own id rather than anything secret.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('.') {
        return format!("{prefix}.***");
    }

    "<redacted>".to_string()
}
