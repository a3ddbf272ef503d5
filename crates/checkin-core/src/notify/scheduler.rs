//! Reminder scheduling for active check-ins.
//!
//! Each tracked session moves through a small state machine:
//!
//! ```text
//! Idle -> WaitingForThreshold -> Recurring -> Idle (cancel)
//! ```
//!
//! The scheduler holds no timers of its own. Every decision is recomputed
//! from the session's [`TimerState`] and the `now` passed in, so the same
//! call can come from a one-shot wake-up, a coarse periodic poll, or a
//! freshly restarted process and it will reach the same answer.
//!
//! Recurring reminders are keyed by boundary: boundary `k` is the elapsed
//! second `target + k * interval`. The last boundary notified is stored in
//! `last_fired_marker`, and a boundary is only ever notified once.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::events::Event;
use crate::history::format_duration;
use crate::timer::TimerState;

/// Nine hours.
pub const DEFAULT_TARGET_SECS: u64 = 32_400;
/// Five minutes between reminders once the target is reached.
pub const DEFAULT_REMINDER_INTERVAL_SECS: u64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderPhase {
    WaitingForThreshold,
    Recurring,
}

/// Scheduling bookkeeping for one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub check_in_id: String,
    pub target_secs: u64,
    pub phase: ReminderPhase,
    /// Elapsed-seconds boundary most recently notified. The threshold itself
    /// is the first boundary.
    pub last_fired_marker: Option<u64>,
    /// Copy of the session timer, refreshed on pause/resume.
    pub timer: TimerState,
}

impl ScheduleEntry {
    /// Elapsed second at which the next reminder becomes due.
    fn due_elapsed(&self, interval: u64) -> u64 {
        match (self.phase, self.last_fired_marker) {
            (ReminderPhase::Recurring, Some(marker)) => marker.saturating_add(interval),
            _ => self.target_secs,
        }
    }

    /// Latest boundary at or before `elapsed`, if the target has been reached.
    fn boundary_at(&self, elapsed: u64, interval: u64) -> Option<u64> {
        let past = elapsed.checked_sub(self.target_secs)?;
        Some(self.target_secs + (past / interval) * interval)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReminderKind {
    Threshold,
    Recurring { boundary_secs: u64 },
}

/// A reminder that has become due and should be shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    pub check_in_id: String,
    pub kind: ReminderKind,
    pub elapsed_secs: u64,
    pub target_secs: u64,
    pub at: DateTime<Utc>,
}

impl Reminder {
    pub fn title(&self) -> String {
        match self.kind {
            ReminderKind::Threshold => format!("{} reached!", format_target(self.target_secs)),
            ReminderKind::Recurring { .. } => "Done Work".to_string(),
        }
    }

    pub fn body(&self) -> String {
        match self.kind {
            ReminderKind::Threshold => format!(
                "You have been checked in for {}.",
                format_target(self.target_secs)
            ),
            ReminderKind::Recurring { .. } => format!(
                "You have been checked in for {}. Time to check out?",
                format_duration(self.elapsed_secs)
            ),
        }
    }

    pub fn to_event(&self) -> Event {
        match self.kind {
            ReminderKind::Threshold => Event::ThresholdReached {
                check_in_id: self.check_in_id.clone(),
                elapsed_secs: self.elapsed_secs,
                at: self.at,
            },
            ReminderKind::Recurring { boundary_secs } => Event::ReminderFired {
                check_in_id: self.check_in_id.clone(),
                boundary_secs,
                elapsed_secs: self.elapsed_secs,
                at: self.at,
            },
        }
    }
}

/// "9 hours", "1 hour", or `HH:MM:SS` for targets that are not whole hours.
pub fn format_target(target_secs: u64) -> String {
    match (target_secs / 3600, target_secs % 3600) {
        (1, 0) => "1 hour".to_string(),
        (hours, 0) if hours > 0 => format!("{hours} hours"),
        _ => format_duration(target_secs),
    }
}

/// Owns the schedule entries of every tracked session, keyed by check-in id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationScheduler {
    interval_secs: u64,
    entries: BTreeMap<String, ScheduleEntry>,
}

impl Default for NotificationScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_REMINDER_INTERVAL_SECS)
    }
}

impl NotificationScheduler {
    pub fn new(interval_secs: u64) -> Self {
        Self {
            interval_secs: interval_secs.max(1),
            entries: BTreeMap::new(),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn interval_secs(&self) -> u64 {
        self.interval_secs
    }

    pub fn entry(&self, check_in_id: &str) -> Option<&ScheduleEntry> {
        self.entries.get(check_in_id)
    }

    pub fn entries(&self) -> impl Iterator<Item = &ScheduleEntry> {
        self.entries.values()
    }

    pub fn is_scheduled(&self, check_in_id: &str) -> bool {
        self.entries.contains_key(check_in_id)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Earliest wall-clock instant at which any running session has a
    /// reminder due. Paused sessions never become due on their own.
    pub fn next_due_at(&self) -> Option<DateTime<Utc>> {
        self.entries
            .values()
            .filter_map(|e| e.timer.instant_at_elapsed(e.due_elapsed(self.interval_secs)))
            .min()
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Track a session that just started. The threshold reminder fires on
    /// the first evaluation at or past `target_secs`.
    pub fn schedule(&mut self, timer: &TimerState, target_secs: u64) {
        tracing::debug!(
            check_in_id = %timer.check_in_id,
            target_secs,
            "scheduling threshold reminder"
        );
        self.entries.insert(
            timer.check_in_id.clone(),
            ScheduleEntry {
                check_in_id: timer.check_in_id.clone(),
                target_secs,
                phase: ReminderPhase::WaitingForThreshold,
                last_fired_marker: None,
                timer: timer.clone(),
            },
        );
    }

    /// Track a session recovered after a restart.
    ///
    /// Past the target the entry resumes in `Recurring` with the marker on
    /// the most recent boundary, so nothing fires until the next one.
    pub fn restore(&mut self, timer: &TimerState, target_secs: u64, now: DateTime<Utc>) {
        let entry = self.plan(timer, target_secs, now);
        tracing::debug!(
            check_in_id = %entry.check_in_id,
            phase = ?entry.phase,
            marker = ?entry.last_fired_marker,
            "restored reminder schedule"
        );
        self.entries.insert(entry.check_in_id.clone(), entry);
    }

    /// Refresh the timer copy after a pause or resume.
    pub fn update_timer(&mut self, timer: &TimerState) -> bool {
        match self.entries.get_mut(&timer.check_in_id) {
            Some(entry) => {
                entry.timer = timer.clone();
                true
            }
            None => false,
        }
    }

    /// Change the target of every tracked session, re-planning each one as
    /// if it had just been restored.
    pub fn retarget(&mut self, target_secs: u64, now: DateTime<Utc>) {
        let stale: Vec<TimerState> = self
            .entries
            .values()
            .filter(|e| e.target_secs != target_secs)
            .map(|e| e.timer.clone())
            .collect();
        for timer in stale {
            let entry = self.plan(&timer, target_secs, now);
            self.entries.insert(entry.check_in_id.clone(), entry);
        }
    }

    /// Stop all reminders for a session. Returns whether it was tracked.
    pub fn cancel(&mut self, check_in_id: &str) -> bool {
        let removed = self.entries.remove(check_in_id).is_some();
        if removed {
            tracing::debug!(%check_in_id, "cancelled reminders");
        }
        removed
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Decide whether a reminder is due for one session.
    ///
    /// At most one reminder is produced per call. A caller that was asleep
    /// across several boundaries gets a single reminder for the latest one.
    pub fn evaluate(&mut self, check_in_id: &str, now: DateTime<Utc>) -> Option<Reminder> {
        let interval = self.interval_secs;
        let entry = self.entries.get_mut(check_in_id)?;
        let elapsed = entry.timer.elapsed(now);
        let boundary = entry.boundary_at(elapsed, interval)?;

        let kind = match entry.phase {
            ReminderPhase::WaitingForThreshold => {
                entry.phase = ReminderPhase::Recurring;
                ReminderKind::Threshold
            }
            ReminderPhase::Recurring => match entry.last_fired_marker {
                Some(marker) if boundary <= marker => return None,
                _ => ReminderKind::Recurring {
                    boundary_secs: boundary,
                },
            },
        };
        entry.last_fired_marker = Some(boundary);

        Some(Reminder {
            check_in_id: entry.check_in_id.clone(),
            kind,
            elapsed_secs: elapsed,
            target_secs: entry.target_secs,
            at: now,
        })
    }

    /// Evaluate every tracked session.
    pub fn poll(&mut self, now: DateTime<Utc>) -> Vec<Reminder> {
        let ids: Vec<String> = self.entries.keys().cloned().collect();
        ids.iter()
            .filter_map(|id| self.evaluate(id, now))
            .collect()
    }

    /// Fold in progress recorded by another copy of this schedule (for
    /// example one persisted by a different process), keeping whichever
    /// copy has notified further. Entries unknown to `self` are ignored.
    pub fn merge_progress(&mut self, other: &NotificationScheduler) {
        for (id, entry) in self.entries.iter_mut() {
            let Some(theirs) = other.entries.get(id) else {
                continue;
            };
            if theirs.target_secs != entry.target_secs {
                continue;
            }
            if theirs.last_fired_marker > entry.last_fired_marker {
                entry.last_fired_marker = theirs.last_fired_marker;
            }
            if theirs.phase == ReminderPhase::Recurring {
                entry.phase = ReminderPhase::Recurring;
            }
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn plan(&self, timer: &TimerState, target_secs: u64, now: DateTime<Utc>) -> ScheduleEntry {
        let mut entry = ScheduleEntry {
            check_in_id: timer.check_in_id.clone(),
            target_secs,
            phase: ReminderPhase::WaitingForThreshold,
            last_fired_marker: None,
            timer: timer.clone(),
        };
        if let Some(boundary) = entry.boundary_at(timer.elapsed(now), self.interval_secs) {
            entry.phase = ReminderPhase::Recurring;
            entry.last_fired_marker = Some(boundary);
        }
        entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 8, 0, 0).unwrap()
    }

    fn at(secs: i64) -> DateTime<Utc> {
        t0() + Duration::seconds(secs)
    }

    fn running(id: &str) -> TimerState {
        TimerState::started(id, t0())
    }

    #[test]
    fn threshold_fires_once_then_recurring() {
        let mut scheduler = NotificationScheduler::default();
        scheduler.schedule(&running("s"), 36);

        assert!(scheduler.evaluate("s", at(35)).is_none());

        let first = scheduler.evaluate("s", at(36)).unwrap();
        assert_eq!(first.kind, ReminderKind::Threshold);
        assert!(scheduler.evaluate("s", at(36)).is_none());
        assert!(scheduler.evaluate("s", at(186)).is_none());

        let second = scheduler.evaluate("s", at(336)).unwrap();
        assert_eq!(second.kind, ReminderKind::Recurring { boundary_secs: 336 });
        assert!(scheduler.evaluate("s", at(400)).is_none());

        let third = scheduler.evaluate("s", at(636)).unwrap();
        assert_eq!(third.kind, ReminderKind::Recurring { boundary_secs: 636 });
    }

    #[test]
    fn late_evaluation_fires_single_reminder_for_latest_boundary() {
        let mut scheduler = NotificationScheduler::default();
        scheduler.schedule(&running("s"), 36);
        scheduler.evaluate("s", at(40));

        let fired = scheduler.poll(at(36 + 300 * 4 + 10));
        assert_eq!(fired.len(), 1);
        assert_eq!(
            fired[0].kind,
            ReminderKind::Recurring {
                boundary_secs: 36 + 1200
            }
        );
        assert!(scheduler.poll(at(36 + 300 * 4 + 20)).is_empty());
    }

    #[test]
    fn missed_threshold_catches_up_without_extra_recurring() {
        let mut scheduler = NotificationScheduler::default();
        scheduler.schedule(&running("s"), 36);

        let fired = scheduler.poll(at(700));
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].kind, ReminderKind::Threshold);
        assert_eq!(scheduler.entry("s").unwrap().last_fired_marker, Some(636));
        assert!(scheduler.poll(at(935)).is_empty());
        assert_eq!(scheduler.poll(at(936)).len(), 1);
    }

    #[test]
    fn restore_before_target_waits_for_threshold() {
        let mut scheduler = NotificationScheduler::default();
        scheduler.restore(&running("s"), 3600, at(1000));

        let entry = scheduler.entry("s").unwrap();
        assert_eq!(entry.phase, ReminderPhase::WaitingForThreshold);
        assert_eq!(scheduler.next_due_at(), Some(at(3600)));
    }

    #[test]
    fn restore_past_target_skips_already_passed_boundary() {
        let mut scheduler = NotificationScheduler::default();
        scheduler.restore(&running("s"), 36, at(400));

        let entry = scheduler.entry("s").unwrap();
        assert_eq!(entry.phase, ReminderPhase::Recurring);
        assert_eq!(entry.last_fired_marker, Some(336));
        assert!(scheduler.evaluate("s", at(400)).is_none());
        assert_eq!(scheduler.next_due_at(), Some(at(636)));
    }

    #[test]
    fn cancel_stops_everything() {
        let mut scheduler = NotificationScheduler::default();
        scheduler.schedule(&running("s"), 36);
        assert!(scheduler.cancel("s"));
        assert!(!scheduler.cancel("s"));
        assert!(scheduler.evaluate("s", at(1000)).is_none());
        assert!(scheduler.next_due_at().is_none());
    }

    #[test]
    fn paused_session_is_never_due() {
        let mut timer = running("s");
        let mut scheduler = NotificationScheduler::default();
        scheduler.schedule(&timer, 36);

        timer.pause(at(20));
        scheduler.update_timer(&timer);
        assert!(scheduler.next_due_at().is_none());
        assert!(scheduler.evaluate("s", at(5000)).is_none());

        timer.resume(at(100));
        scheduler.update_timer(&timer);
        assert_eq!(scheduler.next_due_at(), Some(at(116)));
        assert!(scheduler.evaluate("s", at(115)).is_none());
        assert!(scheduler.evaluate("s", at(116)).is_some());
    }

    #[test]
    fn retarget_replans_tracked_sessions() {
        let mut scheduler = NotificationScheduler::default();
        scheduler.schedule(&running("s"), 32_400);
        scheduler.retarget(60, at(500));

        let entry = scheduler.entry("s").unwrap();
        assert_eq!(entry.target_secs, 60);
        assert_eq!(entry.phase, ReminderPhase::Recurring);
        assert_eq!(entry.last_fired_marker, Some(360));
    }

    #[test]
    fn merge_progress_keeps_furthest_marker() {
        let mut ours = NotificationScheduler::default();
        ours.schedule(&running("s"), 36);

        let mut theirs = ours.clone();
        theirs.evaluate("s", at(36));
        theirs.evaluate("s", at(336));

        ours.merge_progress(&theirs);
        let entry = ours.entry("s").unwrap();
        assert_eq!(entry.phase, ReminderPhase::Recurring);
        assert_eq!(entry.last_fired_marker, Some(336));
        assert!(ours.evaluate("s", at(340)).is_none());
    }

    #[test]
    fn sessions_are_tracked_independently() {
        let mut scheduler = NotificationScheduler::default();
        scheduler.schedule(&running("a"), 36);
        scheduler.schedule(&running("b"), 72);

        let fired: Vec<String> = scheduler
            .poll(at(40))
            .into_iter()
            .map(|r| r.check_in_id)
            .collect();
        assert_eq!(fired, vec!["a"]);
        assert_eq!(scheduler.poll(at(72)).len(), 1);
    }

    #[test]
    fn reminder_text() {
        let reminder = Reminder {
            check_in_id: "s".into(),
            kind: ReminderKind::Threshold,
            elapsed_secs: 32_400,
            target_secs: 32_400,
            at: t0(),
        };
        assert_eq!(reminder.title(), "9 hours reached!");

        let recurring = Reminder {
            kind: ReminderKind::Recurring {
                boundary_secs: 32_700,
            },
            elapsed_secs: 32_712,
            ..reminder
        };
        assert_eq!(recurring.title(), "Done Work");
        assert!(recurring.body().contains("09:05:12"));
        assert_eq!(format_target(36), "00:00:36");
        assert_eq!(format_target(3600), "1 hour");
    }
}
