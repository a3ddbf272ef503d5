//! Storage seams used by [`CheckInSession`](crate::session::CheckInSession).
//!
//! The session keeps two kinds of data: the active timer (plus its reminder
//! bookkeeping) as small documents, and the append-only check-in history.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;

use crate::error::{DatabaseError, Result};
use crate::history::{sort_newest_first, CheckInRecord};
use crate::notify::NotificationScheduler;
use crate::timer::TimerState;

/// Documents describing the session in progress.
pub trait SessionStore {
    /// The active timer, or `None` when nobody is checked in.
    fn load_timer(&self) -> Result<Option<TimerState>>;
    /// Persist the active timer; `None` removes it.
    fn save_timer(&self, state: Option<&TimerState>) -> Result<()>;
    fn load_schedule(&self) -> Result<Option<NotificationScheduler>>;
    fn save_schedule(&self, schedule: &NotificationScheduler) -> Result<()>;

    /// Read-modify-write of the reminder schedule. `update` receives the
    /// stored schedule and returns the one to save, or `None` to leave it.
    /// Stores shared between processes run this as one atomic step.
    fn update_schedule(
        &self,
        update: &mut dyn FnMut(Option<NotificationScheduler>) -> Option<NotificationScheduler>,
    ) -> Result<()> {
        if let Some(schedule) = update(self.load_schedule()?) {
            self.save_schedule(&schedule)?;
        }
        Ok(())
    }
}

/// Completed check-ins.
pub trait HistoryStore {
    /// Insert or replace a record by id.
    fn save_record(&self, record: &CheckInRecord) -> Result<()>;
    /// All records, newest first.
    fn list_records(&self) -> Result<Vec<CheckInRecord>>;
    fn delete_record(&self, id: &str) -> Result<bool>;
    /// Remove everything. Returns how many records were dropped.
    fn clear_records(&self) -> Result<usize>;
    /// Swap the whole history for `records`.
    fn replace_records(&self, records: &[CheckInRecord]) -> Result<()>;
}

impl<T: SessionStore + ?Sized> SessionStore for Arc<T> {
    fn load_timer(&self) -> Result<Option<TimerState>> {
        (**self).load_timer()
    }

    fn save_timer(&self, state: Option<&TimerState>) -> Result<()> {
        (**self).save_timer(state)
    }

    fn load_schedule(&self) -> Result<Option<NotificationScheduler>> {
        (**self).load_schedule()
    }

    fn save_schedule(&self, schedule: &NotificationScheduler) -> Result<()> {
        (**self).save_schedule(schedule)
    }

    fn update_schedule(
        &self,
        update: &mut dyn FnMut(Option<NotificationScheduler>) -> Option<NotificationScheduler>,
    ) -> Result<()> {
        (**self).update_schedule(update)
    }
}

impl<T: HistoryStore + ?Sized> HistoryStore for Arc<T> {
    fn save_record(&self, record: &CheckInRecord) -> Result<()> {
        (**self).save_record(record)
    }

    fn list_records(&self) -> Result<Vec<CheckInRecord>> {
        (**self).list_records()
    }

    fn delete_record(&self, id: &str) -> Result<bool> {
        (**self).delete_record(id)
    }

    fn clear_records(&self) -> Result<usize> {
        (**self).clear_records()
    }

    fn replace_records(&self, records: &[CheckInRecord]) -> Result<()> {
        (**self).replace_records(records)
    }
}

#[derive(Debug, Default)]
struct MemoryInner {
    timer: Option<TimerState>,
    schedule: Option<NotificationScheduler>,
    records: Vec<CheckInRecord>,
    fail_writes: bool,
}

/// In-process store. Writes can be made to fail to exercise the
/// best-effort persistence paths.
#[derive(Debug)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
    timer_tx: watch::Sender<Option<TimerState>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        let (timer_tx, _) = watch::channel(None);
        Self {
            inner: Mutex::new(MemoryInner::default()),
            timer_tx,
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// Observe changes to the active timer document.
    pub fn subscribe(&self) -> watch::Receiver<Option<TimerState>> {
        self.timer_tx.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn writable(&self) -> Result<MutexGuard<'_, MemoryInner>> {
        let guard = self.lock();
        if guard.fail_writes {
            return Err(DatabaseError::QueryFailed("memory store is read-only".into()).into());
        }
        Ok(guard)
    }
}

impl SessionStore for MemoryStore {
    fn load_timer(&self) -> Result<Option<TimerState>> {
        Ok(self.lock().timer.clone())
    }

    fn save_timer(&self, state: Option<&TimerState>) -> Result<()> {
        let mut inner = self.writable()?;
        inner.timer = state.cloned();
        self.timer_tx.send_replace(inner.timer.clone());
        Ok(())
    }

    fn load_schedule(&self) -> Result<Option<NotificationScheduler>> {
        Ok(self.lock().schedule.clone())
    }

    fn save_schedule(&self, schedule: &NotificationScheduler) -> Result<()> {
        self.writable()?.schedule = Some(schedule.clone());
        Ok(())
    }
}

impl HistoryStore for MemoryStore {
    fn save_record(&self, record: &CheckInRecord) -> Result<()> {
        let mut inner = self.writable()?;
        inner.records.retain(|r| r.id != record.id);
        inner.records.push(record.clone());
        Ok(())
    }

    fn list_records(&self) -> Result<Vec<CheckInRecord>> {
        let mut records = self.lock().records.clone();
        sort_newest_first(&mut records);
        Ok(records)
    }

    fn delete_record(&self, id: &str) -> Result<bool> {
        let mut inner = self.writable()?;
        let before = inner.records.len();
        inner.records.retain(|r| r.id != id);
        Ok(inner.records.len() != before)
    }

    fn clear_records(&self) -> Result<usize> {
        let mut inner = self.writable()?;
        let count = inner.records.len();
        inner.records.clear();
        Ok(count)
    }

    fn replace_records(&self, records: &[CheckInRecord]) -> Result<()> {
        self.writable()?.records = records.to_vec();
        Ok(())
    }
}
