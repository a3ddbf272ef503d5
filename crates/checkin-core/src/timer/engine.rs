//! Timer engine implementation.
//!
//! The engine is a wall-clock-based state machine over an optional
//! [`TimerState`]. It keeps no ticking counter: every query recomputes the
//! elapsed time from the state and the `now` supplied by the caller, so a
//! freshly restored engine answers exactly like one that never stopped.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running <-> Paused -> Idle   (check_out / reset)
//! ```
//!
//! Transitions that are not valid from the current status return `None`
//! and leave the engine untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::state::TimerState;
use crate::events::Event;
use crate::history::{CheckInRecord, CheckInStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerStatus {
    Idle,
    Running,
    Paused,
}

/// Core timer engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimerEngine {
    state: Option<TimerState>,
}

impl TimerEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild an engine from a persisted state.
    pub fn restored(state: Option<TimerState>) -> Self {
        Self { state }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn status(&self) -> TimerStatus {
        match &self.state {
            None => TimerStatus::Idle,
            Some(s) if s.is_paused => TimerStatus::Paused,
            Some(_) => TimerStatus::Running,
        }
    }

    pub fn state(&self) -> Option<&TimerState> {
        self.state.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.state.is_some()
    }

    pub fn check_in_id(&self) -> Option<&str> {
        self.state.as_ref().map(|s| s.check_in_id.as_str())
    }

    /// Running seconds at `now`; zero when idle.
    pub fn elapsed(&self, now: DateTime<Utc>) -> u64 {
        self.state.as_ref().map(|s| s.elapsed(now)).unwrap_or(0)
    }

    /// Build a full state snapshot event.
    pub fn snapshot(&self, now: DateTime<Utc>) -> Event {
        Event::StateSnapshot {
            status: self.status(),
            check_in_id: self.state.as_ref().map(|s| s.check_in_id.clone()),
            start_time: self.state.as_ref().map(|s| s.start_time),
            elapsed_secs: self.elapsed(now),
            paused_secs: self
                .state
                .as_ref()
                .map(|s| s.paused_duration)
                .unwrap_or(0),
            at: now,
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start(&mut self, now: DateTime<Utc>) -> Option<Event> {
        if self.state.is_some() {
            return None; // Already checked in.
        }
        let check_in_id = Uuid::new_v4().to_string();
        self.state = Some(TimerState::started(check_in_id.clone(), now));
        Some(Event::CheckedIn {
            check_in_id,
            at: now,
        })
    }

    pub fn pause(&mut self, now: DateTime<Utc>) -> Option<Event> {
        let state = self.state.as_mut()?;
        if !state.pause(now) {
            return None;
        }
        Some(Event::Paused {
            check_in_id: state.check_in_id.clone(),
            elapsed_secs: state.elapsed(now),
            at: now,
        })
    }

    pub fn resume(&mut self, now: DateTime<Utc>) -> Option<Event> {
        let state = self.state.as_mut()?;
        let paused_secs = state.resume(now)?;
        Some(Event::Resumed {
            check_in_id: state.check_in_id.clone(),
            paused_secs,
            elapsed_secs: state.elapsed(now),
            at: now,
        })
    }

    pub fn reset(&mut self, now: DateTime<Utc>) -> Option<Event> {
        let state = self.state.take()?;
        Some(Event::TimerReset {
            check_in_id: state.check_in_id,
            at: now,
        })
    }

    /// End the session, returning the history record captured at `now`.
    pub fn check_out(&mut self, now: DateTime<Utc>) -> Option<CheckInRecord> {
        let state = self.state.take()?;
        Some(CheckInRecord {
            duration: state.elapsed(now),
            id: state.check_in_id,
            start_time: state.start_time,
            end_time: Some(now),
            status: CheckInStatus::CheckedOut,
        })
    }

    /// Replace the engine state with one read back from storage.
    pub fn restore(&mut self, state: Option<TimerState>) {
        self.state = state;
    }
}
