//! Check-in history records.
//!
//! A record is written once, at check-out, and is immutable afterwards.
//! This module also holds the helpers that operate on whole histories:
//! merging a copy from another device and summarizing totals.

use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckInStatus {
    CheckedIn,
    CheckedOut,
}

impl CheckInStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckInStatus::CheckedIn => "checked-in",
            CheckInStatus::CheckedOut => "checked-out",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "checked-in" => Some(CheckInStatus::CheckedIn),
            "checked-out" => Some(CheckInStatus::CheckedOut),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInRecord {
    pub id: String,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Recorded running time in seconds.
    pub duration: u64,
    pub status: CheckInStatus,
}

impl CheckInRecord {
    /// `end_time` when recorded, otherwise derived from the duration.
    pub fn effective_end_time(&self) -> DateTime<Utc> {
        self.end_time.unwrap_or_else(|| {
            let secs = i64::try_from(self.duration).unwrap_or(i64::MAX);
            Duration::try_seconds(secs)
                .and_then(|d| self.start_time.checked_add_signed(d))
                .unwrap_or(self.start_time)
        })
    }
}

/// Merge a local history with one fetched from another source.
///
/// Remote records win unless the local copy of the same id has a newer
/// start time. The result is sorted newest first.
pub fn merge_history(local: &[CheckInRecord], remote: &[CheckInRecord]) -> Vec<CheckInRecord> {
    let mut by_id: HashMap<&str, &CheckInRecord> = HashMap::new();
    for record in remote {
        by_id.insert(record.id.as_str(), record);
    }
    for record in local {
        match by_id.get(record.id.as_str()) {
            Some(existing) if existing.start_time >= record.start_time => {}
            _ => {
                by_id.insert(record.id.as_str(), record);
            }
        }
    }

    let mut merged: Vec<CheckInRecord> = by_id.into_values().cloned().collect();
    sort_newest_first(&mut merged);
    merged
}

pub fn sort_newest_first(records: &mut [CheckInRecord]) {
    records.sort_by(|a, b| b.start_time.cmp(&a.start_time).then_with(|| a.id.cmp(&b.id)));
}

/// Totals over a history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistorySummary {
    pub total_sessions: u64,
    pub total_secs: u64,
    pub longest_secs: u64,
    pub average_secs: u64,
    pub today_sessions: u64,
    pub today_secs: u64,
}

impl HistorySummary {
    /// Summarize `records`, counting sessions that started on `today` (UTC).
    pub fn from_records(records: &[CheckInRecord], today: NaiveDate) -> Self {
        let mut summary = HistorySummary::default();
        for record in records {
            summary.total_sessions += 1;
            summary.total_secs = summary.total_secs.saturating_add(record.duration);
            summary.longest_secs = summary.longest_secs.max(record.duration);
            if record.start_time.date_naive() == today {
                summary.today_sessions += 1;
                summary.today_secs = summary.today_secs.saturating_add(record.duration);
            }
        }
        if summary.total_sessions > 0 {
            summary.average_secs = summary.total_secs / summary.total_sessions;
        }
        summary
    }
}

/// `HH:MM:SS`, with hours allowed to exceed 24.
pub fn format_duration(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let secs = total_secs % 60;
    format!("{hours:02}:{minutes:02}:{secs:02}")
}
