//! Background reminder loop.
//!
//! One tokio task owns the wake-up schedule. Each pass it reloads the
//! session from storage, fires whatever is due, then sleeps until the next
//! reminder or the poll interval, whichever comes first. The poll interval
//! bounds how long a missed wake-up (system sleep, external edits) can go
//! unnoticed.
//!
//! Transitions go through [`ReminderHandle`], which takes the same lock as
//! the loop, so a reminder can never be dispatched for a session that has
//! already been checked out.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, Notify};

use crate::error::Result;
use crate::events::Event;
use crate::history::CheckInRecord;
use crate::session::CheckInSession;
use crate::storage::{AppSettings, HistoryStore, SessionStore};

/// Source of wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

pub struct ReminderService<S> {
    session: Arc<Mutex<CheckInSession<S>>>,
    clock: Arc<dyn Clock>,
    wake: Arc<Notify>,
    poll_interval: Duration,
}

impl<S> ReminderService<S>
where
    S: SessionStore + HistoryStore + Send + 'static,
{
    pub fn new(session: CheckInSession<S>, clock: Arc<dyn Clock>) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
            clock,
            wake: Arc::new(Notify::new()),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval.max(Duration::from_secs(1));
        self
    }

    pub fn handle(&self) -> ReminderHandle<S> {
        ReminderHandle {
            session: Arc::clone(&self.session),
            clock: Arc::clone(&self.clock),
            wake: Arc::clone(&self.wake),
        }
    }

    /// Run until `shutdown` completes.
    pub async fn run<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        tracing::info!(poll_secs = self.poll_interval.as_secs(), "reminder service started");

        loop {
            let sleep_for = self.pass().await;
            tracing::debug!(sleep_ms = sleep_for.as_millis() as u64, "reminder service idle");

            tokio::select! {
                _ = &mut shutdown => break,
                _ = self.wake.notified() => {}
                _ = tokio::time::sleep(sleep_for) => {}
            }
        }

        tracing::info!("reminder service stopped");
    }

    /// One reload/fire cycle. Returns how long to sleep afterwards.
    async fn pass(&self) -> Duration {
        let mut session = self.session.lock().await;
        let now = self.clock.now();
        session.reload(now);
        session.tick(now);

        match session.next_due_at() {
            Some(due) => (due - now)
                .to_std()
                .unwrap_or(Duration::ZERO)
                .min(self.poll_interval),
            None => self.poll_interval,
        }
    }
}

/// Applies transitions to a session driven by a [`ReminderService`].
pub struct ReminderHandle<S> {
    session: Arc<Mutex<CheckInSession<S>>>,
    clock: Arc<dyn Clock>,
    wake: Arc<Notify>,
}

impl<S> Clone for ReminderHandle<S> {
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
            clock: Arc::clone(&self.clock),
            wake: Arc::clone(&self.wake),
        }
    }
}

impl<S: SessionStore + HistoryStore> ReminderHandle<S> {
    pub async fn check_in(&self) -> Option<Event> {
        let event = self.session.lock().await.check_in(self.clock.now());
        self.wake.notify_one();
        event
    }

    pub async fn pause(&self) -> Option<Event> {
        let event = self.session.lock().await.pause(self.clock.now());
        self.wake.notify_one();
        event
    }

    pub async fn resume(&self) -> Option<Event> {
        let event = self.session.lock().await.resume(self.clock.now());
        self.wake.notify_one();
        event
    }

    pub async fn reset(&self) -> Option<Event> {
        let event = self.session.lock().await.reset(self.clock.now());
        self.wake.notify_one();
        event
    }

    pub async fn check_out(&self) -> Result<Option<CheckInRecord>> {
        let record = self.session.lock().await.check_out(self.clock.now());
        self.wake.notify_one();
        record
    }

    pub async fn update_settings(&self, settings: AppSettings) {
        self.session
            .lock()
            .await
            .update_settings(settings, self.clock.now());
        self.wake.notify_one();
    }

    pub async fn elapsed(&self) -> u64 {
        self.session.lock().await.elapsed(self.clock.now())
    }

    pub async fn snapshot(&self) -> Event {
        self.session.lock().await.snapshot(self.clock.now())
    }
}
