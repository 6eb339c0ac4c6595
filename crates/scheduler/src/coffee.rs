use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{info, warn};

use brewbot_chat::platform::{DirectMessenger, MembershipDirectory};
use brewbot_chat::replies;
use brewbot_core::clock::Clock;
use brewbot_core::config::CoffeeConfig;
use brewbot_core::domain::participant::{Member, Participant};
use brewbot_core::pairing::{cooldown_violations, pair_up_with_cooldown, PairingGroup};
use brewbot_core::retry::{retry_with_backoff, BackoffPolicy};
use brewbot_db::repositories::PairingHistoryStore;

use crate::alerts::OperatorAlerts;
use crate::leaderboard::LevelProvider;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PairingSource {
    Manual,
    Scheduled,
}

impl PairingSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Scheduled => "scheduled",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NotEnoughParticipants,
    LevelLookupFailed,
    AlreadyRunning,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PairingResult {
    pub members: Vec<Participant>,
}

impl From<PairingGroup> for PairingResult {
    fn from(group: PairingGroup) -> Self {
        Self { members: group.members }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PairingRunReport {
    pub groups: Vec<PairingResult>,
    pub failed_notifications: usize,
    pub history_persisted: bool,
    pub skipped: Option<SkipReason>,
}

impl PairingRunReport {
    fn skipped(reason: SkipReason) -> Self {
        Self { groups: Vec::new(), failed_notifications: 0, history_persisted: false, skipped: Some(reason) }
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PairingSettings {
    pub cooldown_ms: i64,
    pub fetch_members: bool,
    pub fetch_timeout: Duration,
    pub min_level: u32,
    pub strict_level_filter: bool,
    pub dm_delay: Duration,
    pub level_retry: BackoffPolicy,
}

impl Default for PairingSettings {
    fn default() -> Self {
        Self {
            cooldown_ms: 30 * 24 * 60 * 60 * 1_000,
            fetch_members: true,
            fetch_timeout: Duration::from_secs(10),
            min_level: 0,
            strict_level_filter: false,
            dm_delay: Duration::from_millis(500),
            level_retry: BackoffPolicy::default(),
        }
    }
}

impl PairingSettings {
    pub fn from_config(config: &CoffeeConfig) -> Self {
        Self {
            cooldown_ms: config.cooldown_ms(),
            fetch_members: config.fetch_members,
            fetch_timeout: config.fetch_timeout(),
            min_level: config.min_level,
            strict_level_filter: config.strict_level_filter,
            dm_delay: config.dm_delay(),
            level_retry: BackoffPolicy::default(),
        }
    }
}

/// Runs coffee pairings: resolves eligible members, pairs them around the
/// cooldown, notifies everyone, and records the run in the pairing history.
///
/// A run never fails outright. Problems degrade to an empty or partial
/// [`PairingRunReport`] and are logged.
pub struct CoffeeOrchestrator {
    directory: Arc<dyn MembershipDirectory>,
    messenger: Arc<dyn DirectMessenger>,
    history_store: Arc<dyn PairingHistoryStore>,
    levels: Option<Arc<dyn LevelProvider>>,
    alerts: Arc<OperatorAlerts>,
    clock: Arc<dyn Clock>,
    settings: PairingSettings,
    rng: Mutex<StdRng>,
    running: Mutex<HashSet<String>>,
}

impl CoffeeOrchestrator {
    pub fn new(
        directory: Arc<dyn MembershipDirectory>,
        messenger: Arc<dyn DirectMessenger>,
        history_store: Arc<dyn PairingHistoryStore>,
        alerts: Arc<OperatorAlerts>,
        clock: Arc<dyn Clock>,
        settings: PairingSettings,
    ) -> Self {
        Self {
            directory,
            messenger,
            history_store,
            levels: None,
            alerts,
            clock,
            settings,
            rng: Mutex::new(StdRng::from_entropy()),
            running: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_level_provider(mut self, levels: Arc<dyn LevelProvider>) -> Self {
        self.levels = Some(levels);
        self
    }

    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    pub fn settings(&self) -> &PairingSettings {
        &self.settings
    }

    pub async fn run_pairing(&self, guild_id: &str, role: &str, source: PairingSource) -> PairingRunReport {
        let Some(_guard) = RunGuard::acquire(&self.running, guild_id) else {
            warn!(
                event_name = "coffee.run.already_running",
                guild_id,
                source = source.as_str(),
                "pairing run already in progress for guild"
            );
            return PairingRunReport::skipped(SkipReason::AlreadyRunning);
        };

        let participants = match self.resolve_participants(guild_id, role).await {
            Ok(participants) => participants,
            Err(reason) => return PairingRunReport::skipped(reason),
        };
        info!(
            event_name = "coffee.run.eligible",
            guild_id,
            source = source.as_str(),
            eligible = participants.len(),
            "resolved eligible participants"
        );
        if participants.len() < 2 {
            info!(event_name = "coffee.run.not_enough", guild_id, "not enough members to pair");
            return PairingRunReport::skipped(SkipReason::NotEnoughParticipants);
        }

        let mut history = self.history_store.load().await;
        let now = self.clock.now_ms();
        let groups = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            pair_up_with_cooldown(&participants, &history, self.settings.cooldown_ms, now, &mut *rng)
        };

        for (a, b) in cooldown_violations(&groups, &history, self.settings.cooldown_ms, now) {
            warn!(
                event_name = "coffee.run.cooldown_fallback",
                guild_id,
                first = %a,
                second = %b,
                pair_count = history.pair_count(&a, &b),
                "pairing despite cooldown; no fresh partner was available"
            );
        }

        let failed_notifications = self.notify_groups(&groups, source).await;
        let total_notifications: usize = groups.iter().map(PairingGroup::len).sum();
        if failed_notifications > 0 && failed_notifications == total_notifications {
            self.alerts
                .notify(&format!(
                    "Coffee pairing ({}) could not DM any of the {total_notifications} paired members.",
                    source.as_str()
                ))
                .await;
        }

        for group in &groups {
            history.record_group(&group.members, now);
        }
        let history_persisted = match self.history_store.save(&history).await {
            Ok(()) => true,
            Err(error) => {
                self.alerts.report_error("Error saving coffee_pairs.json", &error).await;
                false
            }
        };

        info!(
            event_name = "coffee.run.completed",
            guild_id,
            source = source.as_str(),
            groups = groups.len(),
            failed_notifications,
            history_persisted,
            "coffee pairing completed"
        );

        PairingRunReport {
            groups: groups.into_iter().map(PairingResult::from).collect(),
            failed_notifications,
            history_persisted,
            skipped: None,
        }
    }

    /// Members that a run would pair right now, without pairing them.
    pub async fn list_eligible(&self, guild_id: &str, role: &str) -> Vec<Participant> {
        self.resolve_participants(guild_id, role).await.unwrap_or_default()
    }

    async fn resolve_participants(&self, guild_id: &str, role: &str) -> Result<Vec<Participant>, SkipReason> {
        let members = self.fetch_members(guild_id, role).await;

        let mut seen = HashSet::new();
        let humans: Vec<Member> = members
            .into_iter()
            .filter(|member| !member.is_bot)
            .filter(|member| seen.insert(member.id.clone()))
            .collect();

        let eligible = self.apply_level_filter(guild_id, humans).await?;
        Ok(eligible.iter().map(Participant::from).collect())
    }

    async fn fetch_members(&self, guild_id: &str, role: &str) -> Vec<Member> {
        if !self.settings.fetch_members {
            return self.directory.cached_members_with_role(guild_id, role).await;
        }

        let fetch = self.directory.fetch_members_with_role(guild_id, role);
        match tokio::time::timeout(self.settings.fetch_timeout, fetch).await {
            Ok(Ok(members)) => members,
            Ok(Err(error)) => {
                warn!(
                    event_name = "coffee.members.fetch_failed",
                    guild_id,
                    error = %error,
                    "member fetch failed; falling back to cached role members"
                );
                self.directory.cached_members_with_role(guild_id, role).await
            }
            Err(_) => {
                warn!(
                    event_name = "coffee.members.fetch_timeout",
                    guild_id,
                    timeout_ms = self.settings.fetch_timeout.as_millis() as u64,
                    "member fetch timed out; falling back to cached role members"
                );
                self.directory.cached_members_with_role(guild_id, role).await
            }
        }
    }

    async fn apply_level_filter(&self, guild_id: &str, members: Vec<Member>) -> Result<Vec<Member>, SkipReason> {
        let min_level = self.settings.min_level;
        if min_level == 0 {
            return Ok(members);
        }
        let strict = self.settings.strict_level_filter;

        let lookup: Result<HashMap<String, u32>, String> = match &self.levels {
            None => Err("no level provider configured".to_owned()),
            Some(provider) => {
                let member_ids: Vec<String> = members.iter().map(|member| member.id.clone()).collect();
                retry_with_backoff(&self.settings.level_retry, "leaderboard.fetch_levels", |_| {
                    provider.fetch_levels(guild_id, &member_ids)
                })
                .await
                .map_err(|error| error.to_string())
            }
        };

        let levels = match lookup {
            Ok(levels) => levels,
            Err(reason) if strict => {
                warn!(
                    event_name = "coffee.levels.lookup_failed",
                    guild_id,
                    reason = %reason,
                    "level lookup failed and strict filtering is enabled; aborting pairing"
                );
                return Err(SkipReason::LevelLookupFailed);
            }
            Err(reason) => {
                warn!(
                    event_name = "coffee.levels.lookup_failed",
                    guild_id,
                    reason = %reason,
                    "level lookup failed; skipping level filter"
                );
                return Ok(members);
            }
        };

        if levels.is_empty() && !strict {
            info!(
                event_name = "coffee.levels.no_data",
                guild_id,
                "level filter configured but no level data found; skipping filter"
            );
            return Ok(members);
        }

        let before = members.len();
        let filtered: Vec<Member> = members
            .into_iter()
            .filter(|member| levels.get(&member.id).copied().unwrap_or(0) >= min_level)
            .collect();
        info!(
            event_name = "coffee.levels.filtered",
            guild_id,
            min_level,
            before,
            after = filtered.len(),
            "level filter applied"
        );
        Ok(filtered)
    }

    /// DMs every member of every group; returns how many sends failed.
    async fn notify_groups(&self, groups: &[PairingGroup], source: PairingSource) -> usize {
        let mut failed = 0;
        let mut first_send = true;

        for group in groups {
            for member in &group.members {
                if !first_send && !self.settings.dm_delay.is_zero() {
                    tokio::time::sleep(self.settings.dm_delay).await;
                }
                first_send = false;

                let partners: Vec<&Participant> = group.partners_of(member.id.as_str()).collect();
                let content = replies::coffee_pairing_dm(member, &partners, source.as_str());
                if let Err(error) = self.messenger.send_direct_message(member.id.as_str(), &content).await {
                    failed += 1;
                    warn!(
                        event_name = "coffee.notify.delivery_failed",
                        user_id = %member.id,
                        error = %error,
                        "could not DM paired member"
                    );
                }
            }
        }

        failed
    }
}

/// Marks a guild as mid-run until dropped.
struct RunGuard<'a> {
    running: &'a Mutex<HashSet<String>>,
    guild_id: String,
}

impl<'a> RunGuard<'a> {
    fn acquire(running: &'a Mutex<HashSet<String>>, guild_id: &str) -> Option<Self> {
        let mut active = running.lock().unwrap_or_else(PoisonError::into_inner);
        if !active.insert(guild_id.to_owned()) {
            return None;
        }
        Some(Self { running, guild_id: guild_id.to_owned() })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.running.lock().unwrap_or_else(PoisonError::into_inner).remove(&self.guild_id);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use brewbot_chat::platform::{ChatError, MembershipDirectory};
    use brewbot_core::clock::ManualClock;
    use brewbot_core::domain::pairing::PairingHistory;
    use brewbot_core::domain::participant::{Member, Participant, ParticipantId};
    use brewbot_core::retry::BackoffPolicy;
    use brewbot_db::repositories::InMemoryPairingHistoryStore;

    use super::{CoffeeOrchestrator, PairingSettings, PairingSource, SkipReason};
    use crate::alerts::testing::RecordingMessenger;
    use crate::alerts::OperatorAlerts;
    use crate::leaderboard::{LeaderboardError, LevelProvider};

    const NOW: i64 = 1_700_000_000_000;
    const DAY_MS: i64 = 24 * 60 * 60 * 1_000;

    #[derive(Default)]
    struct FakeDirectory {
        live: Vec<Member>,
        cached: Vec<Member>,
        live_delay: Option<Duration>,
        live_fails: bool,
    }

    #[async_trait]
    impl MembershipDirectory for FakeDirectory {
        async fn fetch_members_with_role(&self, guild_id: &str, _role: &str) -> Result<Vec<Member>, ChatError> {
            if let Some(delay) = self.live_delay {
                tokio::time::sleep(delay).await;
            }
            if self.live_fails {
                return Err(ChatError::MembershipFailed(format!("guild {guild_id} unavailable")));
            }
            Ok(self.live.clone())
        }

        async fn cached_members_with_role(&self, _guild_id: &str, _role: &str) -> Vec<Member> {
            self.cached.clone()
        }
    }

    struct FakeLevels {
        result: Result<HashMap<String, u32>, ()>,
        calls: AtomicUsize,
    }

    impl FakeLevels {
        fn ok(levels: &[(&str, u32)]) -> Self {
            Self {
                result: Ok(levels.iter().map(|(id, level)| ((*id).to_owned(), *level)).collect()),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self { result: Err(()), calls: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl LevelProvider for FakeLevels {
        async fn fetch_levels(
            &self,
            _guild_id: &str,
            _member_ids: &[String],
        ) -> Result<HashMap<String, u32>, LeaderboardError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone().map_err(|()| LeaderboardError::Status { status: 502 })
        }
    }

    fn members(ids: &[&str]) -> Vec<Member> {
        ids.iter().map(|id| Member::new(*id, format!("user-{id}"))).collect()
    }

    fn settings() -> PairingSettings {
        PairingSettings {
            dm_delay: Duration::ZERO,
            level_retry: BackoffPolicy::no_delay(2),
            ..PairingSettings::default()
        }
    }

    struct Harness {
        orchestrator: CoffeeOrchestrator,
        messenger: Arc<RecordingMessenger>,
        history: Arc<InMemoryPairingHistoryStore>,
    }

    fn harness(directory: FakeDirectory, settings: PairingSettings) -> Harness {
        harness_with(directory, settings, RecordingMessenger::default(), PairingHistory::new())
    }

    fn harness_with(
        directory: FakeDirectory,
        settings: PairingSettings,
        messenger: RecordingMessenger,
        history: PairingHistory,
    ) -> Harness {
        let messenger = Arc::new(messenger);
        let history = Arc::new(InMemoryPairingHistoryStore::with_history(history));
        let orchestrator = CoffeeOrchestrator::new(
            Arc::new(directory),
            messenger.clone(),
            history.clone(),
            Arc::new(OperatorAlerts::disabled()),
            Arc::new(ManualClock::new(NOW)),
            settings,
        )
        .with_rng_seed(7);
        Harness { orchestrator, messenger, history }
    }

    fn member_ids(report: &super::PairingRunReport) -> Vec<Vec<String>> {
        report
            .groups
            .iter()
            .map(|group| group.members.iter().map(|member| member.id.to_string()).collect())
            .collect()
    }

    #[tokio::test]
    async fn pairs_everyone_notifies_and_records_history() {
        let h = harness(FakeDirectory { live: members(&["1", "2", "3", "4"]), ..FakeDirectory::default() }, settings());

        let report = h.orchestrator.run_pairing("G1", "coffee chat", PairingSource::Manual).await;

        assert_eq!(report.skipped, None);
        assert_eq!(report.groups.len(), 2);
        assert!(report.history_persisted);
        assert_eq!(report.failed_notifications, 0);

        let mut everyone: Vec<String> = member_ids(&report).into_iter().flatten().collect();
        everyone.sort();
        assert_eq!(everyone, vec!["1", "2", "3", "4"]);

        let sent = h.messenger.sent().await;
        assert_eq!(sent.len(), 4);
        assert!(sent.iter().all(|(_, content)| content.ends_with("(manual)")));

        let history = h.history.snapshot().await;
        for group in &report.groups {
            let (a, b) = (&group.members[0].id, &group.members[1].id);
            assert_eq!(history.last_paired_at(a, b), Some(NOW));
            assert_eq!(history.pair_count(a, b), 2);
        }
    }

    #[tokio::test]
    async fn odd_pool_produces_one_trio_with_two_partners_each() {
        let h = harness(FakeDirectory { live: members(&["1", "2", "3", "4", "5"]), ..FakeDirectory::default() }, settings());

        let report = h.orchestrator.run_pairing("G1", "coffee chat", PairingSource::Scheduled).await;

        let sizes: Vec<usize> = report.groups.iter().map(|group| group.members.len()).collect();
        assert_eq!(sizes, vec![2, 3]);

        let trio = &report.groups[1].members;
        let dm = h.messenger.sent_to(trio[0].id.as_str()).await;
        assert_eq!(dm.len(), 1);
        assert!(dm[0].contains(&format!("{} ({})", trio[1].display_name, trio[1].id)));
        assert!(dm[0].contains(&format!("{} ({})", trio[2].display_name, trio[2].id)));
        assert!(dm[0].ends_with("(scheduled)"));
    }

    #[tokio::test]
    async fn bots_and_duplicates_are_excluded_and_small_pools_are_skipped() {
        let mut live = members(&["1", "1"]);
        live.push(Member::bot("B", "helper-bot"));
        let h = harness(FakeDirectory { live, ..FakeDirectory::default() }, settings());

        let report = h.orchestrator.run_pairing("G1", "coffee chat", PairingSource::Manual).await;

        assert!(report.is_empty());
        assert_eq!(report.skipped, Some(SkipReason::NotEnoughParticipants));
        assert!(h.messenger.sent().await.is_empty());
        assert_eq!(h.history.save_count(), 0);
    }

    #[tokio::test]
    async fn recently_paired_members_are_split_when_possible() {
        let mut history = PairingHistory::new();
        history.record_group(&[Participant::new("1", "a"), Participant::new("2", "b")], NOW - DAY_MS);
        history.record_group(&[Participant::new("3", "c"), Participant::new("4", "d")], NOW - DAY_MS);

        for seed in 0..10 {
            let h = harness_with(
                FakeDirectory { live: members(&["1", "2", "3", "4"]), ..FakeDirectory::default() },
                settings(),
                RecordingMessenger::default(),
                history.clone(),
            );
            let orchestrator = h.orchestrator.with_rng_seed(seed);

            let report = orchestrator.run_pairing("G1", "coffee chat", PairingSource::Scheduled).await;
            for group in member_ids(&report) {
                assert_ne!(group, vec!["1", "2"]);
                assert_ne!(group, vec!["2", "1"]);
                assert_ne!(group, vec!["3", "4"]);
                assert_ne!(group, vec!["4", "3"]);
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn membership_timeout_falls_back_to_cached_members() {
        let directory = FakeDirectory {
            live: members(&["9", "10"]),
            cached: members(&["1", "2"]),
            live_delay: Some(Duration::from_secs(60)),
            live_fails: false,
        };
        let h = harness(directory, settings());

        let eligible = h.orchestrator.list_eligible("G1", "coffee chat").await;

        let ids: Vec<&str> = eligible.iter().map(|participant| participant.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn membership_failure_and_disabled_fetch_use_the_cache() {
        let failing = FakeDirectory {
            live: members(&["9", "10"]),
            cached: members(&["1", "2"]),
            live_fails: true,
            ..FakeDirectory::default()
        };
        let h = harness(failing, settings());
        assert_eq!(h.orchestrator.list_eligible("G1", "coffee chat").await.len(), 2);

        let disabled = FakeDirectory { live: members(&["9", "10", "11"]), cached: members(&["1"]), ..FakeDirectory::default() };
        let h = harness(disabled, PairingSettings { fetch_members: false, ..settings() });
        let eligible = h.orchestrator.list_eligible("G1", "coffee chat").await;
        assert_eq!(eligible, vec![Participant::new("1", "user-1")]);
    }

    #[tokio::test]
    async fn level_filter_drops_members_below_threshold() {
        let levels = Arc::new(FakeLevels::ok(&[("1", 10), ("2", 3), ("3", 5)]));
        let h = harness(
            FakeDirectory { live: members(&["1", "2", "3", "4"]), ..FakeDirectory::default() },
            PairingSettings { min_level: 5, ..settings() },
        );
        let orchestrator = h.orchestrator.with_level_provider(levels);

        let eligible = orchestrator.list_eligible("G1", "coffee chat").await;
        let ids: Vec<&str> = eligible.iter().map(|participant| participant.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
    }

    #[tokio::test]
    async fn failed_level_lookup_is_fail_open_unless_strict() {
        let live = members(&["1", "2", "3"]);

        let levels = Arc::new(FakeLevels::failing());
        let h = harness(
            FakeDirectory { live: live.clone(), ..FakeDirectory::default() },
            PairingSettings { min_level: 5, ..settings() },
        );
        let lenient = h.orchestrator.with_level_provider(levels.clone());
        assert_eq!(lenient.list_eligible("G1", "coffee chat").await.len(), 3);
        assert_eq!(levels.calls.load(Ordering::SeqCst), 2);

        let h = harness(
            FakeDirectory { live, ..FakeDirectory::default() },
            PairingSettings { min_level: 5, strict_level_filter: true, ..settings() },
        );
        let strict = h.orchestrator.with_level_provider(Arc::new(FakeLevels::failing()));
        let report = strict.run_pairing("G1", "coffee chat", PairingSource::Scheduled).await;
        assert_eq!(report.skipped, Some(SkipReason::LevelLookupFailed));
        assert!(report.is_empty());
    }

    #[tokio::test]
    async fn empty_level_data_skips_filter_unless_strict() {
        let live = members(&["1", "2"]);

        let h = harness(
            FakeDirectory { live: live.clone(), ..FakeDirectory::default() },
            PairingSettings { min_level: 5, ..settings() },
        );
        let lenient = h.orchestrator.with_level_provider(Arc::new(FakeLevels::ok(&[])));
        assert_eq!(lenient.list_eligible("G1", "coffee chat").await.len(), 2);

        let h = harness(
            FakeDirectory { live, ..FakeDirectory::default() },
            PairingSettings { min_level: 5, strict_level_filter: true, ..settings() },
        );
        let strict = h.orchestrator.with_level_provider(Arc::new(FakeLevels::ok(&[])));
        assert!(strict.list_eligible("G1", "coffee chat").await.is_empty());
    }

    #[tokio::test]
    async fn missing_level_provider_counts_as_lookup_failure() {
        let h = harness(
            FakeDirectory { live: members(&["1", "2"]), ..FakeDirectory::default() },
            PairingSettings { min_level: 1, strict_level_filter: true, ..settings() },
        );

        let report = h.orchestrator.run_pairing("G1", "coffee chat", PairingSource::Manual).await;
        assert_eq!(report.skipped, Some(SkipReason::LevelLookupFailed));
    }

    #[tokio::test]
    async fn delivery_failures_are_counted_without_stopping_the_batch() {
        let h = harness_with(
            FakeDirectory { live: members(&["1", "2", "3", "4"]), ..FakeDirectory::default() },
            settings(),
            RecordingMessenger::failing_for(&["2"]),
            PairingHistory::new(),
        );

        let report = h.orchestrator.run_pairing("G1", "coffee chat", PairingSource::Manual).await;

        assert_eq!(report.failed_notifications, 1);
        assert_eq!(h.messenger.sent().await.len(), 3);
        assert!(report.history_persisted);
    }

    #[tokio::test]
    async fn history_save_failure_is_reported_not_raised() {
        let h = harness(FakeDirectory { live: members(&["1", "2"]), ..FakeDirectory::default() }, settings());
        h.history.set_fail_saves(true);

        let report = h.orchestrator.run_pairing("G1", "coffee chat", PairingSource::Manual).await;

        assert_eq!(report.groups.len(), 1);
        assert!(!report.history_persisted);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_runs_for_the_same_guild_are_refused() {
        let directory = FakeDirectory {
            live: members(&["1", "2"]),
            live_delay: Some(Duration::from_secs(1)),
            ..FakeDirectory::default()
        };
        let h = harness(directory, settings());

        let (first, second) = tokio::join!(
            h.orchestrator.run_pairing("G1", "coffee chat", PairingSource::Scheduled),
            h.orchestrator.run_pairing("G1", "coffee chat", PairingSource::Manual),
        );

        assert_eq!(first.skipped, None);
        assert_eq!(second.skipped, Some(SkipReason::AlreadyRunning));

        let third = h.orchestrator.run_pairing("G1", "coffee chat", PairingSource::Manual).await;
        assert_eq!(third.skipped, None);
    }

    #[tokio::test(start_paused = true)]
    async fn consecutive_dms_are_spaced_by_the_configured_delay() {
        let h = harness(
            FakeDirectory { live: members(&["1", "2", "3", "4"]), ..FakeDirectory::default() },
            PairingSettings { dm_delay: Duration::from_millis(500), ..settings() },
        );

        let started = tokio::time::Instant::now();
        h.orchestrator.run_pairing("G1", "coffee chat", PairingSource::Manual).await;

        assert_eq!(started.elapsed(), Duration::from_millis(1_500));
    }

    #[test]
    fn participant_ids_are_snapshotted_from_members() {
        let participant = Participant::from(&Member::new("42", "ada"));
        assert_eq!(participant.id, ParticipantId::new("42"));
        assert_eq!(participant.display_name, "ada");
    }
}
