//! Persisted timer state and the elapsed-time arithmetic built on it.
//!
//! A [`TimerState`] is the only document that survives a restart. Elapsed
//! time is never accumulated in memory; it is always recomputed from
//! `start_time`, `paused_duration` and (when paused) `paused_at` against the
//! wall clock passed in by the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The active check-in session as stored in the session store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    /// Identifies the session for reminder bookkeeping and the history record.
    #[serde(default)]
    pub check_in_id: String,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub is_paused: bool,
    /// Set while paused. Older documents may omit it even when paused.
    #[serde(default)]
    pub paused_at: Option<DateTime<Utc>>,
    /// Total seconds spent paused so far.
    #[serde(default)]
    pub paused_duration: u64,
}

impl TimerState {
    /// A freshly started, running session.
    pub fn started(check_in_id: impl Into<String>, start_time: DateTime<Utc>) -> Self {
        Self {
            check_in_id: check_in_id.into(),
            start_time,
            is_paused: false,
            paused_at: None,
            paused_duration: 0,
        }
    }

    /// Running seconds at `now`, excluding paused intervals. Never negative.
    pub fn elapsed(&self, now: DateTime<Utc>) -> u64 {
        let anchor = if self.is_paused {
            self.paused_at.unwrap_or(now)
        } else {
            now
        };
        let since_start = whole_seconds_between(self.start_time, anchor);
        let paused = i64::try_from(self.paused_duration).unwrap_or(i64::MAX);
        since_start.saturating_sub(paused).max(0) as u64
    }

    /// Mark the session paused at `now`. No-op when already paused.
    pub fn pause(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_paused {
            return false;
        }
        self.is_paused = true;
        self.paused_at = Some(now);
        true
    }

    /// Resume at `now`, folding the pause gap into `paused_duration`.
    /// Returns the gap in seconds, or `None` when not paused.
    pub fn resume(&mut self, now: DateTime<Utc>) -> Option<u64> {
        if !self.is_paused {
            return None;
        }
        let gap = self
            .paused_at
            .map(|at| whole_seconds_between(at, now).max(0) as u64)
            .unwrap_or(0);
        self.paused_duration = self.paused_duration.saturating_add(gap);
        self.paused_at = None;
        self.is_paused = false;
        Some(gap)
    }

    /// Wall-clock instant at which the running time reaches `elapsed_secs`,
    /// assuming the session keeps running. `None` while paused.
    pub fn instant_at_elapsed(&self, elapsed_secs: u64) -> Option<DateTime<Utc>> {
        if self.is_paused {
            return None;
        }
        let offset = elapsed_secs.saturating_add(self.paused_duration);
        let offset = i64::try_from(offset).ok()?;
        self.start_time
            .checked_add_signed(chrono::Duration::try_seconds(offset)?)
    }
}

/// Floor of `(to - from)` in seconds; negative when `to` precedes `from`.
fn whole_seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    (to - from).num_milliseconds().div_euclid(1000)
}
