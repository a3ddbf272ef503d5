//! A check-in session bound to storage and a notifier.
//!
//! [`CheckInSession`] applies timer transitions, persists the resulting
//! state, and keeps the reminder schedule in step with it. Persistence is
//! best-effort: a failed write is logged and the in-memory transition
//! stands. The only exception is check-out, where losing the history record
//! would lose data, so that error is returned to the caller.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::{NotifyError, Result};
use crate::events::Event;
use crate::history::{format_duration, CheckInRecord};
use crate::notify::{NotificationScheduler, Notifier, Permission, Reminder};
use crate::storage::{AppSettings, HistoryStore, SessionStore};
use crate::timer::{TimerEngine, TimerState, TimerStatus};

pub struct CheckInSession<S> {
    store: S,
    engine: TimerEngine,
    scheduler: NotificationScheduler,
    settings: AppSettings,
    notifier: Arc<dyn Notifier>,
    permission: Permission,
    /// Timer document as last read from or written to the store. A stored
    /// document that differs from this was written by someone else.
    synced: Option<TimerState>,
}

impl<S: SessionStore + HistoryStore> CheckInSession<S> {
    /// Load any active check-in from `store` and resume tracking it.
    ///
    /// A store that cannot be read is treated as empty.
    pub fn open(
        store: S,
        settings: AppSettings,
        notifier: Arc<dyn Notifier>,
        now: DateTime<Utc>,
    ) -> Self {
        let permission = notifier.request_permission();
        if !permission.is_granted() {
            tracing::warn!(?permission, "notification permission not granted; reminders will not be shown");
        }

        let stored = store.load_timer().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to load active check-in; starting idle");
            None
        });

        let mut session = Self {
            store,
            engine: TimerEngine::new(),
            scheduler: NotificationScheduler::new(settings.reminder_interval_secs),
            settings,
            notifier,
            permission,
            synced: None,
        };
        session.adopt(stored, now);
        session.merge_persisted_schedule();
        session
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn status(&self) -> TimerStatus {
        self.engine.status()
    }

    pub fn state(&self) -> Option<&TimerState> {
        self.engine.state()
    }

    pub fn elapsed(&self, now: DateTime<Utc>) -> u64 {
        self.engine.elapsed(now)
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> Event {
        self.engine.snapshot(now)
    }

    /// When the next reminder becomes due, if the session keeps running.
    pub fn next_due_at(&self) -> Option<DateTime<Utc>> {
        self.scheduler.next_due_at()
    }

    pub fn scheduler(&self) -> &NotificationScheduler {
        &self.scheduler
    }

    pub fn settings(&self) -> AppSettings {
        self.settings
    }

    pub fn permission(&self) -> Permission {
        self.permission
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn check_in(&mut self, now: DateTime<Utc>) -> Option<Event> {
        let event = self.engine.start(now)?;
        self.persist_timer();
        if let Some(state) = self.engine.state() {
            self.scheduler.schedule(state, self.settings.target_seconds);
        }
        self.persist_schedule();
        tracing::info!(?event, "checked in");
        Some(event)
    }

    pub fn pause(&mut self, now: DateTime<Utc>) -> Option<Event> {
        let event = self.engine.pause(now)?;
        self.sync_timer();
        tracing::info!(?event, "paused");
        Some(event)
    }

    pub fn resume(&mut self, now: DateTime<Utc>) -> Option<Event> {
        let event = self.engine.resume(now)?;
        self.sync_timer();
        tracing::info!(?event, "resumed");
        Some(event)
    }

    /// Discard the active check-in without recording it.
    pub fn reset(&mut self, now: DateTime<Utc>) -> Option<Event> {
        let id = self.engine.check_in_id()?.to_string();
        let event = self.engine.reset(now)?;
        self.scheduler.cancel(&id);
        self.persist_timer();
        self.persist_schedule();
        tracing::info!(?event, "timer reset");
        Some(event)
    }

    /// End the active check-in and append it to the history.
    ///
    /// # Errors
    /// Returns an error if the history record cannot be written. The
    /// session stays active in that case.
    pub fn check_out(&mut self, now: DateTime<Utc>) -> Result<Option<CheckInRecord>> {
        let mut engine = self.engine.clone();
        let Some(record) = engine.check_out(now) else {
            return Ok(None);
        };
        self.store.save_record(&record)?;

        self.engine = engine;
        self.scheduler.cancel(&record.id);
        self.persist_timer();
        self.persist_schedule();
        tracing::info!(check_in_id = %record.id, duration = record.duration, "checked out");

        self.dispatch(
            "Checked out!",
            &format!("Duration: {}", format_duration(record.duration)),
        );
        Ok(Some(record))
    }

    /// Fire every reminder that is due at `now`.
    ///
    /// Progress stored by other sessions is merged first, and claiming a
    /// boundary happens inside one store update, so a boundary fires in only
    /// one of several processes sharing the store.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<Reminder> {
        let scheduler = &mut self.scheduler;
        let mut claimed = None;
        let updated = self.store.update_schedule(&mut |persisted| {
            if let Some(persisted) = persisted {
                scheduler.merge_progress(&persisted);
            }
            let due = scheduler.poll(now);
            let changed = !due.is_empty();
            claimed = Some(due);
            changed.then(|| scheduler.clone())
        });
        if let Err(e) = &updated {
            tracing::warn!(error = %e, "failed to persist reminder schedule");
        }
        let reminders = match claimed {
            Some(due) => due,
            None => self.scheduler.poll(now),
        };

        for reminder in &reminders {
            tracing::info!(
                check_in_id = %reminder.check_in_id,
                kind = ?reminder.kind,
                elapsed_secs = reminder.elapsed_secs,
                "reminder due"
            );
            self.dispatch(&reminder.title(), &reminder.body());
        }
        reminders
    }

    /// Pick up changes another process made to the store.
    pub fn reload(&mut self, now: DateTime<Utc>) {
        match self.store.load_timer() {
            Ok(stored) if stored != self.synced => {
                tracing::info!(
                    from = ?self.engine.check_in_id(),
                    to = ?stored.as_ref().map(|s| s.check_in_id.as_str()),
                    "active check-in changed externally"
                );
                self.adopt(stored, now);
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "failed to reload active check-in"),
        }
        self.merge_persisted_schedule();
    }

    /// Apply new settings, re-planning reminders for the active check-in.
    pub fn update_settings(&mut self, settings: AppSettings, now: DateTime<Utc>) {
        if settings.reminder_interval_secs != self.scheduler.interval_secs() {
            self.scheduler = NotificationScheduler::new(settings.reminder_interval_secs);
            if let Some(state) = self.engine.state() {
                self.scheduler.restore(state, settings.target_seconds, now);
            }
        } else {
            self.scheduler.retarget(settings.target_seconds, now);
        }
        self.settings = settings;
        self.persist_schedule();
    }

    /// Ask the notifier for permission again.
    pub fn request_permission(&mut self) -> Permission {
        self.permission = self.notifier.request_permission();
        self.permission
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// Replace the in-memory session with `stored`.
    fn adopt(&mut self, stored: Option<TimerState>, now: DateTime<Utc>) {
        let previous = self.engine.check_in_id().map(str::to_string);
        self.engine.restore(stored.clone());

        match &stored {
            Some(state) if previous.as_deref() == Some(state.check_in_id.as_str()) => {
                self.scheduler.update_timer(state);
            }
            Some(state) => {
                if let Some(id) = previous {
                    self.scheduler.cancel(&id);
                }
                self.scheduler
                    .restore(state, self.settings.target_seconds, now);
            }
            None => self.scheduler.clear(),
        }
        self.synced = stored;
    }

    fn merge_persisted_schedule(&mut self) {
        match self.store.load_schedule() {
            Ok(Some(persisted)) => self.scheduler.merge_progress(&persisted),
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "failed to load reminder schedule"),
        }
    }

    fn sync_timer(&mut self) {
        self.persist_timer();
        if let Some(state) = self.engine.state() {
            self.scheduler.update_timer(state);
        }
        self.persist_schedule();
    }

    fn persist_timer(&mut self) {
        let state = self.engine.state();
        match self.store.save_timer(state) {
            Ok(()) => self.synced = state.cloned(),
            Err(e) => tracing::warn!(error = %e, "failed to persist active check-in"),
        }
    }

    fn persist_schedule(&self) {
        if let Err(e) = self.store.save_schedule(&self.scheduler) {
            tracing::warn!(error = %e, "failed to persist reminder schedule");
        }
    }

    fn dispatch(&self, title: &str, body: &str) {
        if !self.settings.notifications_enabled {
            tracing::debug!(%title, "notifications disabled; skipping");
            return;
        }
        if let Err(e) = self.deliver(title, body) {
            tracing::warn!(error = %e, %title, "failed to deliver notification");
        }
    }

    fn deliver(&self, title: &str, body: &str) -> Result<(), NotifyError> {
        if !self.permission.is_granted() {
            return Err(NotifyError::PermissionDenied);
        }
        self.notifier.notify(title, body)
    }
}
