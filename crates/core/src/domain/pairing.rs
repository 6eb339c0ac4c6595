use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::participant::{Participant, ParticipantId};

/// Most recent entries kept per participant; older ones are evicted first.
pub const HISTORY_CAP: usize = 200;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairingHistoryEntry {
    pub partner_id: String,
    pub timestamp: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingRecord {
    #[serde(default)]
    pub history: Vec<PairingHistoryEntry>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HistoryDecodeError {
    #[error("pairing history document must be a JSON object, found {0}")]
    NotAnObject(&'static str),
}

/// Who was paired with whom and when, keyed by participant id.
///
/// Entries are written to both sides of a pairing, but every lookup consults
/// both directions so data with only one side recorded still answers correctly.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PairingHistory {
    records: BTreeMap<String, PairingRecord>,
}

impl PairingHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes a persisted document, upgrading legacy `{ lastPaired, partners }`
    /// records into `history` entries. Already-migrated records pass through
    /// unchanged, so decoding is idempotent.
    pub fn from_json(value: Value, now_ms: i64) -> Result<Self, HistoryDecodeError> {
        let Value::Object(map) = value else {
            return Err(HistoryDecodeError::NotAnObject(json_kind(&value)));
        };

        let records = map
            .into_iter()
            .map(|(participant_id, raw)| (participant_id, decode_record(&raw, now_ms)))
            .collect();

        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn record(&self, participant: &ParticipantId) -> Option<&PairingRecord> {
        self.records.get(participant.as_str())
    }

    pub fn participants(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    /// Most recent pairing timestamp of `a` and `b`, looked up in both records.
    pub fn last_paired_at(&self, a: &ParticipantId, b: &ParticipantId) -> Option<i64> {
        let forward = self.latest_entry(a, b);
        let backward = self.latest_entry(b, a);
        forward.max(backward)
    }

    /// Total number of recorded pairings between `a` and `b` (both directions summed).
    pub fn pair_count(&self, a: &ParticipantId, b: &ParticipantId) -> usize {
        self.count_entries(a, b) + self.count_entries(b, a)
    }

    pub fn was_recently_paired(
        &self,
        a: &ParticipantId,
        b: &ParticipantId,
        cooldown_ms: i64,
        now_ms: i64,
    ) -> bool {
        match self.last_paired_at(a, b) {
            Some(timestamp) => now_ms.saturating_sub(timestamp) < cooldown_ms,
            None => false,
        }
    }

    /// Everyone `participant` has a recorded pairing with, from either side.
    pub fn partners_of(&self, participant: &ParticipantId) -> BTreeSet<String> {
        let mut partners: BTreeSet<String> = self
            .record(participant)
            .map(|record| record.history.iter().map(|entry| entry.partner_id.clone()).collect())
            .unwrap_or_default();

        for (owner, record) in &self.records {
            if owner != participant.as_str()
                && record.history.iter().any(|entry| entry.partner_id == participant.0)
            {
                partners.insert(owner.clone());
            }
        }

        partners.remove(participant.as_str());
        partners
    }

    /// Appends an entry for every ordered pair inside `group` and trims each
    /// touched record to [`HISTORY_CAP`].
    pub fn record_group(&mut self, group: &[Participant], timestamp: i64) {
        for member in group {
            let record = self.records.entry(member.id.0.clone()).or_default();
            for partner in group.iter().filter(|partner| partner.id != member.id) {
                record
                    .history
                    .push(PairingHistoryEntry { partner_id: partner.id.0.clone(), timestamp });
            }

            let overflow = record.history.len().saturating_sub(HISTORY_CAP);
            if overflow > 0 {
                record.history.drain(..overflow);
            }
        }
    }

    fn latest_entry(&self, owner: &ParticipantId, partner: &ParticipantId) -> Option<i64> {
        self.record(owner)?
            .history
            .iter()
            .filter(|entry| entry.partner_id == partner.0)
            .map(|entry| entry.timestamp)
            .max()
    }

    fn count_entries(&self, owner: &ParticipantId, partner: &ParticipantId) -> usize {
        self.record(owner).map_or(0, |record| {
            record.history.iter().filter(|entry| entry.partner_id == partner.0).count()
        })
    }
}

fn decode_record(raw: &Value, now_ms: i64) -> PairingRecord {
    let Value::Object(fields) = raw else {
        return PairingRecord::default();
    };

    if let Some(Value::Array(entries)) = fields.get("history") {
        let history = entries.iter().filter_map(decode_entry).collect();
        return PairingRecord { history };
    }

    if let Some(last_paired) = fields.get("lastPaired") {
        let timestamp = coerce_millis(last_paired).filter(|ts| *ts > 0).unwrap_or(now_ms);
        let history = fields
            .get("partners")
            .and_then(Value::as_array)
            .map(|partners| {
                partners
                    .iter()
                    .filter_map(coerce_id)
                    .map(|partner_id| PairingHistoryEntry { partner_id, timestamp })
                    .collect()
            })
            .unwrap_or_default();
        return PairingRecord { history };
    }

    PairingRecord::default()
}

fn decode_entry(raw: &Value) -> Option<PairingHistoryEntry> {
    let partner_id = coerce_id(raw.get("partnerId")?)?;
    let timestamp = raw.get("timestamp").and_then(coerce_millis).unwrap_or(0).max(0);
    Some(PairingHistoryEntry { partner_id, timestamp })
}

fn coerce_id(raw: &Value) -> Option<String> {
    match raw {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

fn coerce_millis(raw: &Value) -> Option<i64> {
    match raw {
        Value::Number(number) => {
            number.as_i64().or_else(|| number.as_f64().map(|value| value.round() as i64))
        }
        Value::String(text) => text.trim().parse::<f64>().ok().map(|value| value.round() as i64),
        _ => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
