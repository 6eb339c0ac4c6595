//! Pure pairing engine: partitions a participant pool into coffee groups
//! using pairing history to avoid repeats.

pub mod engine;

use serde::Serialize;

use crate::domain::participant::Participant;

pub use engine::{cooldown_violations, pair_up_with_cooldown};

/// Two participants, or three when the pool was odd.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PairingGroup {
    pub members: Vec<Participant>,
}

impl PairingGroup {
    pub fn new(members: Vec<Participant>) -> Self {
        Self { members }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn is_trio(&self) -> bool {
        self.members.len() == 3
    }

    /// Everyone in the group except `member_id`, for notification text.
    pub fn partners_of<'a>(&'a self, member_id: &'a str) -> impl Iterator<Item = &'a Participant> {
        self.members.iter().filter(move |member| member.id.as_str() != member_id)
    }
}

#[cfg(test)]
mod tests {
    use super::PairingGroup;
    use crate::domain::participant::Participant;

    #[test]
    fn partners_exclude_the_member_itself() {
        let group = PairingGroup::new(vec![
            Participant::new("A", "Ada"),
            Participant::new("B", "Bea"),
            Participant::new("C", "Cy"),
        ]);

        let partners: Vec<&str> = group.partners_of("B").map(|member| member.id.as_str()).collect();
        assert_eq!(partners, vec!["A", "C"]);
        assert!(group.is_trio());
    }
}
