use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub chat: ChatConfig,
    pub coffee: CoffeeConfig,
    pub reminders: ReminderConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub lock_max_retries: u32,
    pub lock_retry_delay_ms: u64,
    pub lock_stale_after_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ChatConfig {
    pub bot_token: Option<SecretString>,
    pub guild_id: Option<String>,
    pub admin_user_id: Option<String>,
    pub allowed_user_ids: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct CoffeeConfig {
    pub role_name: String,
    pub cron: String,
    pub cadence: PairingCadence,
    pub cooldown_days: u32,
    pub fetch_members: bool,
    pub fetch_timeout_ms: u64,
    pub min_level: u32,
    pub leaderboard_base_url: String,
    pub strict_level_filter: bool,
    pub dm_delay_ms: u64,
}

#[derive(Clone, Debug)]
pub struct ReminderConfig {
    pub sweep_interval_secs: u64,
    pub sweep_grace_secs: u64,
    pub duplicate_tolerance_ms: i64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

/// Which ISO weeks a scheduled pairing is allowed to run in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairingCadence {
    Weekly,
    EvenWeeks,
    OddWeeks,
}

impl PairingCadence {
    pub fn allows_iso_week(self, iso_week: u32) -> bool {
        match self {
            Self::Weekly => true,
            Self::EvenWeeks => iso_week % 2 == 0,
            Self::OddWeeks => iso_week % 2 == 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Weekly => "weekly",
            Self::EvenWeeks => "even_weeks",
            Self::OddWeeks => "odd_weeks",
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub data_dir: Option<PathBuf>,
    pub log_level: Option<String>,
    pub bot_token: Option<String>,
    pub guild_id: Option<String>,
    pub coffee_role_name: Option<String>,
    pub coffee_min_level: Option<u32>,
    pub health_check_port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig {
                data_dir: PathBuf::from("data"),
                lock_max_retries: 50,
                lock_retry_delay_ms: 100,
                lock_stale_after_secs: 30,
            },
            chat: ChatConfig {
                bot_token: None,
                guild_id: None,
                admin_user_id: None,
                allowed_user_ids: Vec::new(),
            },
            coffee: CoffeeConfig {
                role_name: "coffee chat".to_string(),
                cron: "0 9 * * 1".to_string(),
                cadence: PairingCadence::EvenWeeks,
                cooldown_days: 30,
                fetch_members: true,
                fetch_timeout_ms: 10_000,
                min_level: 0,
                leaderboard_base_url: "https://mee6.xyz".to_string(),
                strict_level_filter: false,
                dm_delay_ms: 500,
            },
            reminders: ReminderConfig {
                sweep_interval_secs: 600,
                sweep_grace_secs: 60,
                duplicate_tolerance_ms: 5_000,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                health_check_port: 3000,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl StorageConfig {
    pub fn reminders_path(&self) -> PathBuf {
        self.data_dir.join("reminders.json")
    }

    pub fn pairing_history_path(&self) -> PathBuf {
        self.data_dir.join("coffee_pairs.json")
    }

    pub fn lock_retry_delay(&self) -> Duration {
        Duration::from_millis(self.lock_retry_delay_ms)
    }

    pub fn lock_stale_after(&self) -> Duration {
        Duration::from_secs(self.lock_stale_after_secs)
    }
}

impl ChatConfig {
    /// Admin commands are open to everyone until an allow-list is configured.
    pub fn is_admin_allowed(&self, user_id: &str) -> bool {
        self.allowed_user_ids.is_empty() || self.allowed_user_ids.iter().any(|id| id == user_id)
    }
}

impl CoffeeConfig {
    pub fn cooldown_ms(&self) -> i64 {
        i64::from(self.cooldown_days) * DAY_MS
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn dm_delay(&self) -> Duration {
        Duration::from_millis(self.dm_delay_ms)
    }
}

impl ReminderConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn sweep_grace_ms(&self) -> i64 {
        i64::try_from(self.sweep_grace_secs.saturating_mul(1_000)).unwrap_or(i64::MAX)
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl std::str::FromStr for PairingCadence {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "weekly" => Ok(Self::Weekly),
            "even_weeks" | "biweekly" => Ok(Self::EvenWeeks),
            "odd_weeks" => Ok(Self::OddWeeks),
            other => Err(ConfigError::Validation(format!(
                "unsupported pairing cadence `{other}` (expected weekly|even_weeks|odd_weeks)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("brewbot.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(storage) = patch.storage {
            if let Some(data_dir) = storage.data_dir {
                self.storage.data_dir = data_dir;
            }
            if let Some(lock_max_retries) = storage.lock_max_retries {
                self.storage.lock_max_retries = lock_max_retries;
            }
            if let Some(lock_retry_delay_ms) = storage.lock_retry_delay_ms {
                self.storage.lock_retry_delay_ms = lock_retry_delay_ms;
            }
            if let Some(lock_stale_after_secs) = storage.lock_stale_after_secs {
                self.storage.lock_stale_after_secs = lock_stale_after_secs;
            }
        }

        if let Some(chat) = patch.chat {
            if let Some(bot_token) = chat.bot_token {
                self.chat.bot_token = Some(secret_value(bot_token));
            }
            if let Some(guild_id) = chat.guild_id {
                self.chat.guild_id = Some(guild_id);
            }
            if let Some(admin_user_id) = chat.admin_user_id {
                self.chat.admin_user_id = Some(admin_user_id);
            }
            if let Some(allowed_user_ids) = chat.allowed_user_ids {
                self.chat.allowed_user_ids = normalize_ids(allowed_user_ids);
            }
        }

        if let Some(coffee) = patch.coffee {
            if let Some(role_name) = coffee.role_name {
                self.coffee.role_name = role_name;
            }
            if let Some(cron) = coffee.cron {
                self.coffee.cron = cron;
            }
            if let Some(cadence) = coffee.cadence {
                self.coffee.cadence = cadence;
            }
            if let Some(cooldown_days) = coffee.cooldown_days {
                self.coffee.cooldown_days = cooldown_days;
            }
            if let Some(fetch_members) = coffee.fetch_members {
                self.coffee.fetch_members = fetch_members;
            }
            if let Some(fetch_timeout_ms) = coffee.fetch_timeout_ms {
                self.coffee.fetch_timeout_ms = fetch_timeout_ms;
            }
            if let Some(min_level) = coffee.min_level {
                self.coffee.min_level = min_level;
            }
            if let Some(leaderboard_base_url) = coffee.leaderboard_base_url {
                self.coffee.leaderboard_base_url = leaderboard_base_url;
            }
            if let Some(strict_level_filter) = coffee.strict_level_filter {
                self.coffee.strict_level_filter = strict_level_filter;
            }
            if let Some(dm_delay_ms) = coffee.dm_delay_ms {
                self.coffee.dm_delay_ms = dm_delay_ms;
            }
        }

        if let Some(reminders) = patch.reminders {
            if let Some(sweep_interval_secs) = reminders.sweep_interval_secs {
                self.reminders.sweep_interval_secs = sweep_interval_secs;
            }
            if let Some(sweep_grace_secs) = reminders.sweep_grace_secs {
                self.reminders.sweep_grace_secs = sweep_grace_secs;
            }
            if let Some(duplicate_tolerance_ms) = reminders.duplicate_tolerance_ms {
                self.reminders.duplicate_tolerance_ms = duplicate_tolerance_ms;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("BREWBOT_STORAGE_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(value);
        }
        if let Some(value) = read_env("BREWBOT_STORAGE_LOCK_MAX_RETRIES") {
            self.storage.lock_max_retries = parse_u32("BREWBOT_STORAGE_LOCK_MAX_RETRIES", &value)?;
        }
        if let Some(value) = read_env("BREWBOT_STORAGE_LOCK_RETRY_DELAY_MS") {
            self.storage.lock_retry_delay_ms =
                parse_u64("BREWBOT_STORAGE_LOCK_RETRY_DELAY_MS", &value)?;
        }
        if let Some(value) = read_env("BREWBOT_STORAGE_LOCK_STALE_AFTER_SECS") {
            self.storage.lock_stale_after_secs =
                parse_u64("BREWBOT_STORAGE_LOCK_STALE_AFTER_SECS", &value)?;
        }

        if let Some(value) = read_env("BREWBOT_CHAT_BOT_TOKEN") {
            self.chat.bot_token = Some(secret_value(value));
        }
        if let Some(value) = read_env("BREWBOT_CHAT_GUILD_ID") {
            self.chat.guild_id = Some(value);
        }
        if let Some(value) = read_env("BREWBOT_CHAT_ADMIN_USER_ID") {
            self.chat.admin_user_id = Some(value);
        }
        if let Some(value) = read_env("BREWBOT_CHAT_ALLOWED_USER_IDS") {
            self.chat.allowed_user_ids =
                normalize_ids(value.split(',').map(str::to_owned).collect());
        }

        if let Some(value) = read_env("BREWBOT_COFFEE_ROLE_NAME") {
            self.coffee.role_name = value;
        }
        if let Some(value) = read_env("BREWBOT_COFFEE_CRON") {
            self.coffee.cron = value;
        }
        if let Some(value) = read_env("BREWBOT_COFFEE_CADENCE") {
            self.coffee.cadence = value.parse()?;
        }
        if let Some(value) = read_env("BREWBOT_COFFEE_COOLDOWN_DAYS") {
            self.coffee.cooldown_days = parse_u32("BREWBOT_COFFEE_COOLDOWN_DAYS", &value)?;
        }
        if let Some(value) = read_env("BREWBOT_COFFEE_FETCH_MEMBERS") {
            self.coffee.fetch_members = parse_bool("BREWBOT_COFFEE_FETCH_MEMBERS", &value)?;
        }
        if let Some(value) = read_env("BREWBOT_COFFEE_FETCH_TIMEOUT_MS") {
            self.coffee.fetch_timeout_ms = parse_u64("BREWBOT_COFFEE_FETCH_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = read_env("BREWBOT_COFFEE_MIN_LEVEL") {
            self.coffee.min_level = parse_u32("BREWBOT_COFFEE_MIN_LEVEL", &value)?;
        }
        if let Some(value) = read_env("BREWBOT_COFFEE_LEADERBOARD_BASE_URL") {
            self.coffee.leaderboard_base_url = value;
        }
        if let Some(value) = read_env("BREWBOT_COFFEE_STRICT_LEVEL_FILTER") {
            self.coffee.strict_level_filter =
                parse_bool("BREWBOT_COFFEE_STRICT_LEVEL_FILTER", &value)?;
        }
        if let Some(value) = read_env("BREWBOT_COFFEE_DM_DELAY_MS") {
            self.coffee.dm_delay_ms = parse_u64("BREWBOT_COFFEE_DM_DELAY_MS", &value)?;
        }

        if let Some(value) = read_env("BREWBOT_REMINDERS_SWEEP_INTERVAL_SECS") {
            self.reminders.sweep_interval_secs =
                parse_u64("BREWBOT_REMINDERS_SWEEP_INTERVAL_SECS", &value)?;
        }
        if let Some(value) = read_env("BREWBOT_REMINDERS_SWEEP_GRACE_SECS") {
            self.reminders.sweep_grace_secs =
                parse_u64("BREWBOT_REMINDERS_SWEEP_GRACE_SECS", &value)?;
        }
        if let Some(value) = read_env("BREWBOT_REMINDERS_DUPLICATE_TOLERANCE_MS") {
            self.reminders.duplicate_tolerance_ms =
                parse_i64("BREWBOT_REMINDERS_DUPLICATE_TOLERANCE_MS", &value)?;
        }

        if let Some(value) = read_env("BREWBOT_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("BREWBOT_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port = parse_u16("BREWBOT_SERVER_HEALTH_CHECK_PORT", &value)?;
        }
        if let Some(value) = read_env("BREWBOT_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("BREWBOT_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("BREWBOT_LOGGING_LEVEL").or_else(|| read_env("BREWBOT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("BREWBOT_LOGGING_FORMAT").or_else(|| read_env("BREWBOT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(data_dir) = overrides.data_dir {
            self.storage.data_dir = data_dir;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(bot_token) = overrides.bot_token {
            self.chat.bot_token = Some(secret_value(bot_token));
        }
        if let Some(guild_id) = overrides.guild_id {
            self.chat.guild_id = Some(guild_id);
        }
        if let Some(role_name) = overrides.coffee_role_name {
            self.coffee.role_name = role_name;
        }
        if let Some(min_level) = overrides.coffee_min_level {
            self.coffee.min_level = min_level;
        }
        if let Some(port) = overrides.health_check_port {
            self.server.health_check_port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_storage(&self.storage)?;
        validate_chat(&self.chat)?;
        validate_coffee(&self.coffee)?;
        validate_reminders(&self.reminders)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("brewbot.toml"), PathBuf::from("config/brewbot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

/// Replaces every `${VAR}` with the value of the environment variable `VAR`.
fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let end = after_open.find('}').ok_or(ConfigError::UnterminatedInterpolation)?;
        let key = &after_open[..end];

        let value = env::var(key)
            .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.to_string() })?;
        output.push_str(&value);
        rest = &after_open[end + 1..];
    }

    output.push_str(rest);
    Ok(output)
}

fn normalize_ids(ids: Vec<String>) -> Vec<String> {
    ids.into_iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect()
}

fn validate_storage(storage: &StorageConfig) -> Result<(), ConfigError> {
    if storage.data_dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation("storage.data_dir must not be empty".to_string()));
    }

    if storage.lock_max_retries == 0 {
        return Err(ConfigError::Validation(
            "storage.lock_max_retries must be greater than zero".to_string(),
        ));
    }

    if storage.lock_stale_after_secs == 0 {
        return Err(ConfigError::Validation(
            "storage.lock_stale_after_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_chat(chat: &ChatConfig) -> Result<(), ConfigError> {
    if let Some(token) = &chat.bot_token {
        if token.expose_secret().trim().is_empty() {
            return Err(ConfigError::Validation(
                "chat.bot_token is set but empty; remove it or provide the bot token".to_string(),
            ));
        }
    }

    if chat.guild_id.as_deref().is_some_and(|id| id.trim().is_empty()) {
        return Err(ConfigError::Validation("chat.guild_id must not be blank".to_string()));
    }

    Ok(())
}

fn validate_coffee(coffee: &CoffeeConfig) -> Result<(), ConfigError> {
    if coffee.role_name.trim().is_empty() {
        return Err(ConfigError::Validation("coffee.role_name must not be empty".to_string()));
    }

    if coffee.cron.split_whitespace().count() != 5 {
        return Err(ConfigError::Validation(format!(
            "coffee.cron must be a 5-field cron expression, got `{}`",
            coffee.cron
        )));
    }

    if coffee.fetch_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "coffee.fetch_timeout_ms must be greater than zero".to_string(),
        ));
    }

    let url = coffee.leaderboard_base_url.trim();
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "coffee.leaderboard_base_url must start with http:// or https://".to_string(),
        ));
    }

    Ok(())
}

fn validate_reminders(reminders: &ReminderConfig) -> Result<(), ConfigError> {
    if reminders.sweep_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "reminders.sweep_interval_secs must be greater than zero".to_string(),
        ));
    }

    if reminders.duplicate_tolerance_ms < 0 {
        return Err(ConfigError::Validation(
            "reminders.duplicate_tolerance_ms must not be negative".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn invalid_env(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.trim().parse::<u16>().map_err(|_| invalid_env(key, value))
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.trim().parse::<u32>().map_err(|_| invalid_env(key, value))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|_| invalid_env(key, value))
}

fn parse_i64(key: &str, value: &str) -> Result<i64, ConfigError> {
    value.trim().parse::<i64>().map_err(|_| invalid_env(key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.trim().to_ascii_lowercase().parse::<bool>().map_err(|_| invalid_env(key, value))
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    storage: Option<StoragePatch>,
    chat: Option<ChatPatch>,
    coffee: Option<CoffeePatch>,
    reminders: Option<ReminderPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct StoragePatch {
    data_dir: Option<PathBuf>,
    lock_max_retries: Option<u32>,
    lock_retry_delay_ms: Option<u64>,
    lock_stale_after_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatPatch {
    bot_token: Option<String>,
    guild_id: Option<String>,
    admin_user_id: Option<String>,
    allowed_user_ids: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct CoffeePatch {
    role_name: Option<String>,
    cron: Option<String>,
    cadence: Option<PairingCadence>,
    cooldown_days: Option<u32>,
    fetch_members: Option<bool>,
    fetch_timeout_ms: Option<u64>,
    min_level: Option<u32>,
    leaderboard_base_url: Option<String>,
    strict_level_filter: Option<bool>,
    dm_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ReminderPatch {
    sweep_interval_secs: Option<u64>,
    sweep_grace_secs: Option<u64>,
    duplicate_tolerance_ms: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
