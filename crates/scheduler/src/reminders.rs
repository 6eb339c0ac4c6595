use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use brewbot_chat::commands::CancelTarget;
use brewbot_chat::platform::DirectMessenger;
use brewbot_chat::replies;
use brewbot_core::clock::Clock;
use brewbot_core::config::ReminderConfig;
use brewbot_core::domain::reminder::{Reminder, ReminderId};
use brewbot_core::duration::parse_duration;
use brewbot_core::errors::{ApplicationError, DomainError};
use brewbot_db::lock::StoreLock;
use brewbot_db::repositories::ReminderStore;

use crate::alerts::OperatorAlerts;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CreateOutcome {
    Created(Reminder),
    /// An equivalent reminder was already pending; nothing was written.
    Duplicate(Reminder),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RescheduleReport {
    pub armed: usize,
    pub overdue: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub removed: usize,
    pub timers_cleared: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReminderSettings {
    pub duplicate_tolerance_ms: i64,
    pub sweep_grace_ms: i64,
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self { duplicate_tolerance_ms: 5_000, sweep_grace_ms: 60_000 }
    }
}

impl ReminderSettings {
    pub fn from_config(config: &ReminderConfig) -> Self {
        Self {
            duplicate_tolerance_ms: config.duplicate_tolerance_ms,
            sweep_grace_ms: config.sweep_grace_ms(),
        }
    }
}

struct TimerSlot {
    generation: u64,
    handle: JoinHandle<()>,
}

struct ReminderInner {
    store: Arc<dyn ReminderStore>,
    messenger: Arc<dyn DirectMessenger>,
    clock: Arc<dyn Clock>,
    alerts: Arc<OperatorAlerts>,
    settings: ReminderSettings,
    timers: Mutex<HashMap<ReminderId, TimerSlot>>,
    generations: AtomicU64,
    last_id: AtomicI64,
}

/// Persists reminders and delivers each one at most once.
///
/// The persisted list is the source of truth: a timer re-reads it before
/// delivering, so a reminder canceled by another process is silently dropped.
/// Every read-modify-write runs under the store lock, or unlocked with a
/// warning when the lock cannot be taken.
#[derive(Clone)]
pub struct ReminderService {
    inner: Arc<ReminderInner>,
}

impl ReminderService {
    pub fn new(
        store: Arc<dyn ReminderStore>,
        messenger: Arc<dyn DirectMessenger>,
        clock: Arc<dyn Clock>,
        alerts: Arc<OperatorAlerts>,
        settings: ReminderSettings,
    ) -> Self {
        Self {
            inner: Arc::new(ReminderInner {
                store,
                messenger,
                clock,
                alerts,
                settings,
                timers: Mutex::new(HashMap::new()),
                generations: AtomicU64::new(0),
                last_id: AtomicI64::new(0),
            }),
        }
    }

    pub async fn create(
        &self,
        user_id: &str,
        raw_duration: &str,
        message: &str,
    ) -> Result<CreateOutcome, ApplicationError> {
        let delay_ms = parse_duration(raw_duration).map_err(DomainError::from)?;
        let message = message.trim();
        if message.is_empty() {
            return Err(DomainError::EmptyReminderMessage.into());
        }

        let now = self.inner.clock.now_ms();
        let candidate = Reminder {
            id: self.next_id(now),
            user_id: user_id.to_owned(),
            msg: message.to_owned(),
            time: now.saturating_add(i64::try_from(delay_ms).unwrap_or(i64::MAX)),
        };

        {
            let _lock = self.lock_or_fallback("create").await;
            let mut persisted = self.inner.store.load().await;
            let tolerance = self.inner.settings.duplicate_tolerance_ms;
            if let Some(existing) =
                persisted.iter().find(|other| candidate.is_duplicate_of(other, tolerance))
            {
                info!(
                    event_name = "reminder.create.duplicate",
                    reminder_id = %existing.id,
                    user_id,
                    "equivalent reminder already pending"
                );
                return Ok(CreateOutcome::Duplicate(existing.clone()));
            }

            persisted.push(candidate.clone());
            self.inner.store.save(&persisted).await?;
        }

        info!(
            event_name = "reminder.create.persisted",
            reminder_id = %candidate.id,
            user_id,
            fire_at_ms = candidate.time,
            "reminder scheduled"
        );
        self.arm(candidate.clone(), candidate.remaining_ms(self.inner.clock.now_ms())).await;
        Ok(CreateOutcome::Created(candidate))
    }

    /// Delivers `reminder` now if it is still persisted, then removes it.
    pub async fn fire(&self, reminder: &Reminder) {
        self.deliver(reminder.clone(), None).await;
    }

    /// Removes the user's reminders matching `target` and stops their timers.
    /// Reminders owned by other users are never touched.
    pub async fn cancel(&self, user_id: &str, target: &CancelTarget) -> Result<usize, ApplicationError> {
        let _lock = self.lock_or_fallback("cancel").await;
        let persisted = self.inner.store.load().await;
        let (selected, remaining): (Vec<Reminder>, Vec<Reminder>) =
            persisted.into_iter().partition(|reminder| {
                reminder.user_id == user_id
                    && match target {
                        CancelTarget::All => true,
                        CancelTarget::Id(id) => reminder.id.as_str() == id,
                    }
            });
        if selected.is_empty() {
            return Ok(0);
        }

        // Timers stop before the list changes; a failed save re-arms them.
        let mut timers = self.inner.timers.lock().await;
        for reminder in &selected {
            if let Some(slot) = timers.remove(&reminder.id) {
                slot.handle.abort();
            }
        }
        drop(timers);

        if let Err(error) = self.inner.store.save(&remaining).await {
            let now = self.inner.clock.now_ms();
            for reminder in selected {
                let delay = reminder.remaining_ms(now);
                self.arm(reminder, delay).await;
            }
            return Err(error.into());
        }

        info!(
            event_name = "reminder.cancel.completed",
            user_id,
            removed = selected.len(),
            "reminders canceled"
        );
        Ok(selected.len())
    }

    /// The user's pending reminders, soonest first.
    pub async fn list(&self, user_id: &str) -> Vec<Reminder> {
        let mut reminders: Vec<Reminder> = self
            .inner
            .store
            .load()
            .await
            .into_iter()
            .filter(|reminder| reminder.user_id == user_id)
            .collect();
        reminders.sort_by_key(|reminder| reminder.time);
        reminders
    }

    /// Re-arms every persisted reminder after a restart. Overdue reminders
    /// fire immediately.
    pub async fn reschedule_all(&self) -> RescheduleReport {
        let persisted = self.inner.store.load().await;
        let now = self.inner.clock.now_ms();
        let mut report = RescheduleReport::default();

        for reminder in persisted {
            if let Ok(numeric_id) = reminder.id.as_str().parse::<i64>() {
                self.inner.last_id.fetch_max(numeric_id, Ordering::SeqCst);
            }

            if reminder.is_overdue(now) {
                report.overdue += 1;
                self.arm(reminder, 0).await;
            } else {
                report.armed += 1;
                let delay = reminder.remaining_ms(now);
                self.arm(reminder, delay).await;
            }
        }

        info!(
            event_name = "reminder.reschedule.completed",
            armed = report.armed,
            overdue = report.overdue,
            "persisted reminders re-armed"
        );
        report
    }

    /// Drops persisted reminders whose fire time passed more than the grace
    /// period ago, and timers whose reminder no longer exists.
    pub async fn sweep(&self) -> SweepReport {
        let cutoff = self.inner.clock.now_ms().saturating_sub(self.inner.settings.sweep_grace_ms);
        let mut report = SweepReport::default();

        let live: HashSet<ReminderId> = {
            let _lock = self.lock_or_fallback("sweep").await;
            let persisted = self.inner.store.load().await;
            let (stale, live): (Vec<Reminder>, Vec<Reminder>) =
                persisted.into_iter().partition(|reminder| reminder.time < cutoff);

            if stale.is_empty() {
                live.into_iter().map(|reminder| reminder.id).collect()
            } else {
                match self.inner.store.save(&live).await {
                    Ok(()) => {
                        report.removed = stale.len();
                        live.into_iter().map(|reminder| reminder.id).collect()
                    }
                    Err(error) => {
                        self.inner.alerts.report_error("Failed to sweep stale reminders", &error).await;
                        live.into_iter().chain(stale).map(|reminder| reminder.id).collect()
                    }
                }
            }
        };

        let mut timers = self.inner.timers.lock().await;
        let orphaned: Vec<ReminderId> =
            timers.keys().filter(|id| !live.contains(*id)).cloned().collect();
        for id in &orphaned {
            if let Some(slot) = timers.remove(id) {
                slot.handle.abort();
            }
        }
        report.timers_cleared = orphaned.len();
        drop(timers);

        if report.removed > 0 || report.timers_cleared > 0 {
            info!(
                event_name = "reminder.sweep.completed",
                removed = report.removed,
                timers_cleared = report.timers_cleared,
                "stale reminders swept"
            );
        }
        report
    }

    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let service = self.clone();
        let period = interval.max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                service.sweep().await;
            }
        })
    }

    pub async fn pending_count(&self) -> usize {
        self.inner.store.load().await.len()
    }

    pub async fn armed_timer_count(&self) -> usize {
        self.inner.timers.lock().await.len()
    }

    pub async fn is_armed(&self, id: &ReminderId) -> bool {
        self.inner.timers.lock().await.contains_key(id)
    }

    /// Time-based ids, strictly increasing within the process.
    fn next_id(&self, now_ms: i64) -> ReminderId {
        let previous = match self.inner.last_id.fetch_update(
            Ordering::SeqCst,
            Ordering::SeqCst,
            |last| Some(now_ms.max(last + 1)),
        ) {
            Ok(previous) | Err(previous) => previous,
        };
        ReminderId(now_ms.max(previous + 1).to_string())
    }

    async fn arm(&self, reminder: Reminder, delay_ms: u64) {
        let generation = self.inner.generations.fetch_add(1, Ordering::SeqCst);
        let id = reminder.id.clone();

        let mut timers = self.inner.timers.lock().await;
        if let Some(previous) = timers.remove(&id) {
            previous.handle.abort();
        }

        let service = self.clone();
        let handle = tokio::spawn(async move {
            if delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
            // Delivery is detached from the timer so aborting the timer cannot
            // interrupt a send that already started.
            tokio::spawn(async move {
                service.deliver(reminder, Some(generation)).await;
            });
        });
        timers.insert(id, TimerSlot { generation, handle });
    }

    async fn deliver(&self, reminder: Reminder, generation: Option<u64>) {
        let persisted = self.inner.store.load().await;
        let Some(current) = persisted.into_iter().find(|stored| stored.id == reminder.id) else {
            debug!(
                event_name = "reminder.fire.skipped",
                reminder_id = %reminder.id,
                "reminder no longer persisted; not delivering"
            );
            self.clear_timer(&reminder.id, generation).await;
            return;
        };

        let content = replies::reminder_notification(&current.msg);
        match self.inner.messenger.send_direct_message(&current.user_id, &content).await {
            Ok(()) => info!(
                event_name = "reminder.fire.delivered",
                reminder_id = %current.id,
                user_id = %current.user_id,
                "reminder delivered"
            ),
            Err(error) => warn!(
                event_name = "reminder.fire.delivery_failed",
                reminder_id = %current.id,
                user_id = %current.user_id,
                error = %error,
                "reminder could not be delivered"
            ),
        }

        self.remove_persisted(&current.id).await;
        self.clear_timer(&current.id, generation).await;
    }

    async fn remove_persisted(&self, id: &ReminderId) {
        let _lock = self.lock_or_fallback("fire").await;
        let mut persisted = self.inner.store.load().await;
        let before = persisted.len();
        persisted.retain(|reminder| &reminder.id != id);
        if persisted.len() == before {
            return;
        }

        if let Err(error) = self.inner.store.save(&persisted).await {
            self.inner.alerts.report_error("Failed to remove delivered reminder", &error).await;
        }
    }

    /// A timer only clears its own slot; `None` clears whatever is armed.
    async fn clear_timer(&self, id: &ReminderId, generation: Option<u64>) {
        let mut timers = self.inner.timers.lock().await;
        let owned = timers
            .get(id)
            .is_some_and(|slot| generation.map_or(true, |generation| slot.generation == generation));
        if owned {
            if let Some(slot) = timers.remove(id) {
                slot.handle.abort();
            }
        }
    }

    async fn lock_or_fallback(&self, operation: &'static str) -> Option<StoreLock> {
        match self.inner.store.acquire_lock().await {
            Ok(lock) => Some(lock),
            Err(error) => {
                warn!(
                    event_name = "reminder.store.lock_fallback",
                    operation,
                    error = %error,
                    "reminder store lock unavailable; continuing unlocked"
                );
                None
            }
        }
    }
}
