use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::domain::pairing::PairingHistory;
use crate::domain::participant::{Participant, ParticipantId};
use crate::pairing::PairingGroup;

/// Partitions `participants` into pairs (and at most one trio) while avoiding
/// anyone paired together within `cooldown_ms`.
///
/// The pool is shuffled first so pairings feel random. Each participant takes
/// the first fresh partner in shuffle order; when every candidate is on
/// cooldown the least-paired candidate is chosen instead, preferring the one
/// paired longest ago. Nobody is left out: an odd participant joins the last
/// pair, and a pool of one yields a singleton group.
pub fn pair_up_with_cooldown<R>(
    participants: &[Participant],
    history: &PairingHistory,
    cooldown_ms: i64,
    now_ms: i64,
    rng: &mut R,
) -> Vec<PairingGroup>
where
    R: Rng + ?Sized,
{
    let mut seen = HashSet::new();
    let mut pool: Vec<Participant> = participants
        .iter()
        .filter(|participant| seen.insert(participant.id.clone()))
        .cloned()
        .collect();
    pool.shuffle(rng);

    let mut groups: Vec<PairingGroup> = Vec::with_capacity(pool.len() / 2 + 1);

    while pool.len() >= 2 {
        let first = pool.remove(0);
        let partner_index = first_fresh_partner(&first.id, &pool, history, cooldown_ms, now_ms)
            .unwrap_or_else(|| least_paired_partner(&first.id, &pool, history));
        let partner = pool.remove(partner_index);
        groups.push(PairingGroup::new(vec![first, partner]));
    }

    if let Some(leftover) = pool.pop() {
        match groups.last_mut() {
            Some(last) => last.members.push(leftover),
            None => groups.push(PairingGroup::new(vec![leftover])),
        }
    }

    groups
}

/// Every within-group pair that was already together inside the cooldown window.
pub fn cooldown_violations(
    groups: &[PairingGroup],
    history: &PairingHistory,
    cooldown_ms: i64,
    now_ms: i64,
) -> Vec<(ParticipantId, ParticipantId)> {
    let mut violations = Vec::new();
    for group in groups {
        for (index, a) in group.members.iter().enumerate() {
            for b in &group.members[index + 1..] {
                if history.was_recently_paired(&a.id, &b.id, cooldown_ms, now_ms) {
                    violations.push((a.id.clone(), b.id.clone()));
                }
            }
        }
    }
    violations
}

fn first_fresh_partner(
    participant: &ParticipantId,
    pool: &[Participant],
    history: &PairingHistory,
    cooldown_ms: i64,
    now_ms: i64,
) -> Option<usize> {
    pool.iter().position(|candidate| {
        !history.was_recently_paired(participant, &candidate.id, cooldown_ms, now_ms)
    })
}

// `pool` is never empty here: the caller only looks for partners while two or
// more participants remain.
fn least_paired_partner(
    participant: &ParticipantId,
    pool: &[Participant],
    history: &PairingHistory,
) -> usize {
    let mut best_index = 0;
    let mut best_count = usize::MAX;
    let mut best_last_paired = i64::MAX;

    for (index, candidate) in pool.iter().enumerate() {
        let count = history.pair_count(participant, &candidate.id);
        if count == 0 {
            return index;
        }

        let last_paired = history.last_paired_at(participant, &candidate.id).unwrap_or(0);
        if count < best_count || (count == best_count && last_paired < best_last_paired) {
            best_index = index;
            best_count = count;
            best_last_paired = last_paired;
        }
    }

    best_index
}
