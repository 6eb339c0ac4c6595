use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub String);

impl ParticipantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParticipantId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// A chat-platform member as reported by the membership directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Member {
    pub id: String,
    pub display_name: String,
    pub is_bot: bool,
}

impl Member {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self { id: id.into(), display_name: display_name.into(), is_bot: false }
    }

    pub fn bot(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self { id: id.into(), display_name: display_name.into(), is_bot: true }
    }
}

/// Someone eligible for pairing. The display name is captured when the pool is
/// resolved so reports never need to re-fetch it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub display_name: String,
}

impl Participant {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self { id: ParticipantId(id.into()), display_name: display_name.into() }
    }
}

impl From<&Member> for Participant {
    fn from(member: &Member) -> Self {
        let display_name = if member.display_name.trim().is_empty() {
            "Unknown".to_owned()
        } else {
            member.display_name.clone()
        };
        Self { id: ParticipantId(member.id.clone()), display_name }
    }
}

#[cfg(test)]
mod tests {
    use super::{Member, Participant, ParticipantId};

    #[test]
    fn participant_snapshot_falls_back_to_unknown_name() {
        let participant = Participant::from(&Member::new("U1", "  "));

        assert_eq!(participant.id, ParticipantId::from("U1"));
        assert_eq!(participant.display_name, "Unknown");
    }

    #[test]
    fn participant_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&ParticipantId::new("U42")).expect("serialize id");
        assert_eq!(json, "\"U42\"");
    }
}
