use brewbot_core::config::{AppConfig, LoadOptions};
use brewbot_core::domain::pairing::PairingHistory;
use brewbot_core::domain::participant::ParticipantId;
use brewbot_db::{JsonPairingHistoryStore, PairingHistoryStore};
use serde::Serialize;
use serde_json::json;

use super::{block_on, CommandResult, EXIT_CONFIG, EXIT_RUNTIME};

const COMMAND: &str = "history";

#[derive(Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
struct PartnerSummary {
    partner_id: String,
    pair_count: usize,
    last_paired_at: Option<i64>,
}

pub fn run(options: LoadOptions, participant: &str) -> CommandResult {
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(COMMAND, "config_validation", error.to_string(), EXIT_CONFIG)
        }
    };

    let store = JsonPairingHistoryStore::new(config.storage.pairing_history_path());
    match block_on(store.load()) {
        Ok(history) => {
            let partners = summarize(&history, &ParticipantId::new(participant));
            CommandResult::data(
                COMMAND,
                json!({
                    "path": store.path().display().to_string(),
                    "participant": participant,
                    "partners": partners,
                }),
            )
        }
        Err(error) => CommandResult::failure(COMMAND, "runtime", format!("{error:#}"), EXIT_RUNTIME),
    }
}

/// Per-partner totals, most recently paired first.
fn summarize(history: &PairingHistory, participant: &ParticipantId) -> Vec<PartnerSummary> {
    let mut partners: Vec<PartnerSummary> = history
        .partners_of(participant)
        .into_iter()
        .map(|partner_id| {
            let partner = ParticipantId::new(partner_id.clone());
            PartnerSummary {
                pair_count: history.pair_count(participant, &partner),
                last_paired_at: history.last_paired_at(participant, &partner),
                partner_id,
            }
        })
        .collect();

    partners.sort_by(|a, b| {
        b.last_paired_at.cmp(&a.last_paired_at).then_with(|| a.partner_id.cmp(&b.partner_id))
    });
    partners
}
