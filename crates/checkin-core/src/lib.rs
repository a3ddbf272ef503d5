//! # Checkin Core Library
//!
//! This library provides the core logic for the Checkin work-time tracker:
//! check in when the workday starts, pause and resume as needed, check out at
//! the end, and get reminded once the daily target has been reached.
//! Everything is available via the standalone `checkin` CLI binary.
//!
//! ## Architecture
//!
//! - **Timer Engine**: A wall-clock-based state machine. Elapsed time is always
//!   recomputed from the persisted state, so a restart loses nothing
//! - **Reminders**: A pure scheduler that decides when the threshold and
//!   recurring reminders are due, and a tokio service that drives it
//! - **Storage**: SQLite-based session and history storage and TOML-based
//!   configuration
//!
//! ## Key Components
//!
//! - [`TimerEngine`]: Core timer state machine
//! - [`NotificationScheduler`]: Threshold and recurring reminder bookkeeping
//! - [`CheckInSession`]: Timer, reminders and storage bound together
//! - [`Database`]: Active check-in and history persistence
//! - [`Config`]: Application configuration management

pub mod error;
pub mod events;
pub mod history;
pub mod notify;
pub mod session;
pub mod storage;
pub mod timer;

pub use error::{ConfigError, CoreError, DatabaseError, NotifyError, ValidationError};
pub use events::Event;
pub use history::{format_duration, merge_history, CheckInRecord, CheckInStatus, HistorySummary};
pub use notify::{
    Clock, LogNotifier, NotificationScheduler, Notifier, Permission, Reminder, ReminderHandle,
    ReminderKind, ReminderService, SystemClock,
};
pub use session::CheckInSession;
pub use storage::{AppSettings, Config, Database, HistoryStore, MemoryStore, SessionStore};
pub use timer::{TimerEngine, TimerState, TimerStatus};
