//! Free-text durations for reminders: `"10m"`, `"1.5 hours"`, `"2 weeks 3 days"`.
//!
//! Every `<number><unit>` phrase in the input is summed. Months are a fixed
//! 30 days.

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

const SECOND_MS: f64 = 1_000.0;
const MINUTE_MS: f64 = 60.0 * SECOND_MS;
const HOUR_MS: f64 = 60.0 * MINUTE_MS;
const DAY_MS: f64 = 24.0 * HOUR_MS;
const WEEK_MS: f64 = 7.0 * DAY_MS;
const MONTH_MS: f64 = 30.0 * DAY_MS;

const UNIT_PREFIXES: [&str; 20] = [
    "mo", "month", "months", "w", "week", "weeks", "d", "day", "days", "h", "hour", "hours", "m",
    "min", "minute", "minutes", "s", "sec", "second", "seconds",
];

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DurationParseError {
    #[error("no duration found in `{0}`")]
    NoUnits(String),
    #[error("duration `{0}` is not positive")]
    NotPositive(String),
}

fn phrase_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)(\d+(?:\.\d+)?)\s*(mo(?:nths?)?|w(?:eeks?)?|d(?:ays?)?|h(?:ours?|rs?)?|m(?:in(?:ute)?s?)?|s(?:ec(?:ond)?s?)?)",
        )
        .unwrap_or_else(|error| panic!("duration pattern must compile: {error}"))
    })
}

fn compact_token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^\d+(?:\.\d+)?[smhdwo]+$")
            .unwrap_or_else(|error| panic!("compact duration pattern must compile: {error}"))
    })
}

/// Parses `input` into whole milliseconds.
pub fn parse_duration(input: &str) -> Result<u64, DurationParseError> {
    let normalized = input.to_lowercase().replace(',', " ");
    let mut total = 0.0_f64;
    let mut matched = false;

    for captures in phrase_pattern().captures_iter(&normalized) {
        let Ok(value) = captures[1].parse::<f64>() else {
            continue;
        };
        matched = true;
        total += value * unit_millis(&captures[2]);
    }

    if !matched {
        return Err(DurationParseError::NoUnits(input.to_owned()));
    }

    let rounded = total.round();
    if rounded <= 0.0 || !rounded.is_finite() {
        return Err(DurationParseError::NotPositive(input.to_owned()));
    }

    Ok(rounded as u64)
}

fn unit_millis(unit: &str) -> f64 {
    if unit.starts_with("mo") {
        MONTH_MS
    } else if unit.starts_with('w') {
        WEEK_MS
    } else if unit.starts_with('d') {
        DAY_MS
    } else if unit.starts_with('h') {
        HOUR_MS
    } else if unit.starts_with('m') {
        MINUTE_MS
    } else {
        SECOND_MS
    }
}

/// Splits leading duration tokens off a free-text command, e.g.
/// `["2", "days", "call", "mom"]` into `("2 days", "call mom")`.
pub fn split_time_and_message(tokens: &[&str]) -> (String, String) {
    let mut time_tokens = Vec::new();
    let mut index = 0;

    while index < tokens.len() {
        let token = tokens[index].to_lowercase();
        let next = tokens.get(index + 1).map(|value| value.to_lowercase());

        let is_number = token.parse::<f64>().is_ok();
        let next_is_unit = next
            .as_deref()
            .is_some_and(|next| UNIT_PREFIXES.iter().any(|unit| next.starts_with(unit)));

        if is_number && next_is_unit {
            time_tokens.push(tokens[index]);
            time_tokens.push(tokens[index + 1]);
            index += 2;
        } else if compact_token_pattern().is_match(&token) {
            time_tokens.push(tokens[index]);
            index += 1;
        } else {
            break;
        }
    }

    (time_tokens.join(" "), tokens[index..].join(" "))
}
