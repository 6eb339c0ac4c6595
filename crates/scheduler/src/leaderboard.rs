use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(8);
const PAGE_LIMIT: u32 = 1_000;

const ENTRY_KEYS: [&str; 3] = ["entries", "players", "leaderboard"];
const ID_KEYS: [&str; 6] = ["id", "user_id", "userId", "uid", "discord_id", "discordId"];

#[derive(Debug, Error)]
pub enum LeaderboardError {
    #[error("leaderboard request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("leaderboard returned HTTP {status}")]
    Status { status: u16 },
    #[error("leaderboard response could not be decoded: {0}")]
    Decode(String),
}

/// Member activity levels per guild. An empty map means the service has no
/// data for the guild.
#[async_trait]
pub trait LevelProvider: Send + Sync {
    async fn fetch_levels(
        &self,
        guild_id: &str,
        member_ids: &[String],
    ) -> Result<HashMap<String, u32>, LeaderboardError>;
}

/// Client for the public MEE6 levels leaderboard.
pub struct Mee6LeaderboardClient {
    base_url: String,
    client: Client,
}

impl Mee6LeaderboardClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, LeaderboardError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { base_url: base_url.into().trim_end_matches('/').to_owned(), client })
    }

    fn leaderboard_url(&self, guild_id: &str) -> String {
        format!("{}/api/plugins/levels/leaderboard/{guild_id}?limit={PAGE_LIMIT}", self.base_url)
    }
}

#[async_trait]
impl LevelProvider for Mee6LeaderboardClient {
    async fn fetch_levels(
        &self,
        guild_id: &str,
        member_ids: &[String],
    ) -> Result<HashMap<String, u32>, LeaderboardError> {
        if member_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let response = self
            .client
            .get(self.leaderboard_url(guild_id))
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            info!(
                event_name = "egress.leaderboard.not_found",
                guild_id,
                "leaderboard has no data for guild"
            );
            return Ok(HashMap::new());
        }
        if !status.is_success() {
            return Err(LeaderboardError::Status { status: status.as_u16() });
        }

        let body = response.text().await?;
        let document: Value =
            serde_json::from_str(&body).map_err(|error| LeaderboardError::Decode(error.to_string()))?;
        let levels = parse_leaderboard(&document);

        debug!(
            event_name = "egress.leaderboard.fetched",
            guild_id,
            entries = levels.len(),
            "leaderboard fetched"
        );
        Ok(levels)
    }
}

/// Extracts `user id -> level` from a leaderboard document. Entries without a
/// usable id are skipped; a missing level reads as 0.
pub fn parse_leaderboard(document: &Value) -> HashMap<String, u32> {
    let Some(entries) = ENTRY_KEYS.iter().find_map(|key| document.get(key)?.as_array()) else {
        return HashMap::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            let user_id = ID_KEYS.iter().find_map(|key| id_value(entry.get(key)?))?;
            Some((user_id, level_value(entry)))
        })
        .collect()
}

fn id_value(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn level_value(entry: &Value) -> u32 {
    let raw = match entry.get("level") {
        Some(level) => Some(level),
        None => ["rank", "xp"].iter().find_map(|key| entry.get(key).filter(|value| is_truthy(value))),
    };
    raw.and_then(as_number).map(|level| level.clamp(0.0, f64::from(u32::MAX)) as u32).unwrap_or(0)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => false,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        _ => true,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|number| number.is_finite())
}
