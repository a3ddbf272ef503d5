use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::history::CheckInRecord;
use crate::timer::TimerStatus;

/// Every state change in the system produces an Event.
/// The CLI prints them; the reminder service logs them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    CheckedIn {
        check_in_id: String,
        at: DateTime<Utc>,
    },
    Paused {
        check_in_id: String,
        elapsed_secs: u64,
        at: DateTime<Utc>,
    },
    Resumed {
        check_in_id: String,
        /// Length of the pause that just ended.
        paused_secs: u64,
        elapsed_secs: u64,
        at: DateTime<Utc>,
    },
    CheckedOut {
        record: CheckInRecord,
        at: DateTime<Utc>,
    },
    TimerReset {
        check_in_id: String,
        at: DateTime<Utc>,
    },
    /// The configured target was reached for the first time.
    ThresholdReached {
        check_in_id: String,
        elapsed_secs: u64,
        at: DateTime<Utc>,
    },
    /// A five-minute boundary past the target was reached.
    ReminderFired {
        check_in_id: String,
        boundary_secs: u64,
        elapsed_secs: u64,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        status: TimerStatus,
        check_in_id: Option<String>,
        start_time: Option<DateTime<Utc>>,
        elapsed_secs: u64,
        paused_secs: u64,
        at: DateTime<Utc>,
    },
}
