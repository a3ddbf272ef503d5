//! SQLite-based check-in storage.
//!
//! Provides persistent storage for:
//! - The active check-in and its reminder schedule (JSON documents in `kv`)
//! - Completed check-ins (`check_ins`)

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::data_dir;
use super::migrations;
use super::store::{HistoryStore, SessionStore};
use crate::error::{DatabaseError, Result};
use crate::history::{CheckInRecord, CheckInStatus};
use crate::notify::NotificationScheduler;
use crate::timer::TimerState;

const ACTIVE_CHECK_IN_KEY: &str = "active_check_in";
const REMINDER_SCHEDULE_KEY: &str = "reminder_schedule";

/// SQLite database for check-in storage.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `<data_dir>/checkin.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        Self::open_at(&data_dir()?.join("checkin.db"))
    }

    /// Open (or create) the database at `path`.
    pub fn open_at(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::with_connection(conn)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        migrations::migrate(&conn)
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self { conn })
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, rusqlite::Error> {
        let mut stmt = self.conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn kv_delete(&self, key: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn get_document<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.kv_get(key)? else {
            return Ok(None);
        };
        serde_json::from_str(&raw).map(Some).map_err(|e| {
            DatabaseError::CorruptDocument {
                key: key.to_string(),
                message: e.to_string(),
            }
            .into()
        })
    }

    fn put_document<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.kv_set(key, &raw)?;
        Ok(())
    }
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(idx: usize, raw: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn record_from_row(row: &Row<'_>) -> Result<CheckInRecord, rusqlite::Error> {
    let start: String = row.get(1)?;
    let end: Option<String> = row.get(2)?;
    let status: String = row.get(4)?;
    Ok(CheckInRecord {
        id: row.get(0)?,
        start_time: parse_timestamp(1, &start)?,
        end_time: end.as_deref().map(|raw| parse_timestamp(2, raw)).transpose()?,
        duration: row.get(3)?,
        // Rows only ever hold finished sessions.
        status: CheckInStatus::parse(&status).unwrap_or(CheckInStatus::CheckedOut),
    })
}

fn insert_record(conn: &Connection, record: &CheckInRecord) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT OR REPLACE INTO check_ins (id, start_time, end_time, duration_secs, status)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            record.id,
            format_timestamp(record.start_time),
            record.end_time.map(format_timestamp),
            record.duration,
            record.status.as_str(),
        ],
    )?;
    Ok(())
}

impl SessionStore for Database {
    fn load_timer(&self) -> Result<Option<TimerState>> {
        self.get_document(ACTIVE_CHECK_IN_KEY)
    }

    fn save_timer(&self, state: Option<&TimerState>) -> Result<()> {
        match state {
            Some(state) => self.put_document(ACTIVE_CHECK_IN_KEY, state),
            None => Ok(self.kv_delete(ACTIVE_CHECK_IN_KEY)?),
        }
    }

    fn load_schedule(&self) -> Result<Option<NotificationScheduler>> {
        self.get_document(REMINDER_SCHEDULE_KEY)
    }

    fn save_schedule(&self, schedule: &NotificationScheduler) -> Result<()> {
        self.put_document(REMINDER_SCHEDULE_KEY, schedule)
    }

    /// Holds the write lock from read to save, so two processes ticking the
    /// same database cannot both claim a boundary.
    fn update_schedule(
        &self,
        update: &mut dyn FnMut(Option<NotificationScheduler>) -> Option<NotificationScheduler>,
    ) -> Result<()> {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        if let Some(schedule) = update(self.load_schedule()?) {
            self.save_schedule(&schedule)?;
        }
        tx.commit()?;
        Ok(())
    }
}

impl HistoryStore for Database {
    fn save_record(&self, record: &CheckInRecord) -> Result<()> {
        insert_record(&self.conn, record)?;
        Ok(())
    }

    fn list_records(&self) -> Result<Vec<CheckInRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, start_time, end_time, duration_secs, status
             FROM check_ins
             ORDER BY start_time DESC, id ASC",
        )?;
        let rows = stmt.query_map([], record_from_row)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    fn delete_record(&self, id: &str) -> Result<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM check_ins WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    fn clear_records(&self) -> Result<usize> {
        Ok(self.conn.execute("DELETE FROM check_ins", [])?)
    }

    fn replace_records(&self, records: &[CheckInRecord]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM check_ins", [])?;
        for record in records {
            insert_record(&tx, record)?;
        }
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 8, 0, 0).unwrap()
    }

    fn record(id: &str, start: DateTime<Utc>, duration: u64) -> CheckInRecord {
        CheckInRecord {
            id: id.into(),
            start_time: start,
            end_time: Some(start + Duration::seconds(duration as i64)),
            duration,
            status: CheckInStatus::CheckedOut,
        }
    }

    #[test]
    fn kv_store() {
        let db = Database::open_memory().unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
        db.kv_set("test", "hello").unwrap();
        assert_eq!(db.kv_get("test").unwrap().unwrap(), "hello");
        db.kv_delete("test").unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
    }

    #[test]
    fn missing_timer_reads_as_none() {
        let db = Database::open_memory().unwrap();
        assert!(db.load_timer().unwrap().is_none());
        assert!(db.load_schedule().unwrap().is_none());
    }

    #[test]
    fn timer_document_round_trips() {
        let db = Database::open_memory().unwrap();
        let mut state = TimerState::started("abc", t0());
        state.pause(t0() + Duration::seconds(30));
        db.save_timer(Some(&state)).unwrap();
        assert_eq!(db.load_timer().unwrap(), Some(state));

        db.save_timer(None).unwrap();
        assert!(db.load_timer().unwrap().is_none());
    }

    #[test]
    fn corrupt_timer_document_is_reported() {
        let db = Database::open_memory().unwrap();
        db.kv_set(ACTIVE_CHECK_IN_KEY, "{not json").unwrap();
        let err = db.load_timer().unwrap_err();
        assert!(err.to_string().contains("active_check_in"));
    }

    #[test]
    fn record_and_list_newest_first() {
        let db = Database::open_memory().unwrap();
        db.save_record(&record("old", t0(), 100)).unwrap();
        db.save_record(&record("new", t0() + Duration::hours(24), 200))
            .unwrap();

        let records = db.list_records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "new");
        assert_eq!(records[1], record("old", t0(), 100));
    }

    #[test]
    fn delete_and_clear() {
        let db = Database::open_memory().unwrap();
        db.save_record(&record("a", t0(), 1)).unwrap();
        db.save_record(&record("b", t0(), 2)).unwrap();

        assert!(db.delete_record("a").unwrap());
        assert!(!db.delete_record("a").unwrap());
        assert_eq!(db.clear_records().unwrap(), 1);
        assert!(db.list_records().unwrap().is_empty());
    }

    #[test]
    fn replace_swaps_whole_history() {
        let db = Database::open_memory().unwrap();
        db.save_record(&record("a", t0(), 1)).unwrap();
        db.replace_records(&[record("b", t0(), 2), record("c", t0(), 3)])
            .unwrap();

        let ids: Vec<String> = db.list_records().unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn update_schedule_sees_and_replaces_stored_schedule() {
        let db = Database::open_memory().unwrap();
        let mut schedule = NotificationScheduler::new(300);
        schedule.schedule(&TimerState::started("a", t0()), 36);
        db.save_schedule(&schedule).unwrap();

        let mut seen = None;
        db.update_schedule(&mut |stored| {
            seen = stored;
            None
        })
        .unwrap();
        assert!(seen.unwrap().is_scheduled("a"));
        assert!(db.load_schedule().unwrap().unwrap().is_scheduled("a"));

        db.update_schedule(&mut |_| Some(NotificationScheduler::new(300)))
            .unwrap();
        assert!(db.load_schedule().unwrap().unwrap().is_empty());
    }

    #[test]
    fn update_schedule_waits_for_other_writers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkin.db");
        let holder = Database::open_at(&path).unwrap();
        let other = Database::open_at(&path).unwrap();
        other.conn().busy_timeout(std::time::Duration::ZERO).unwrap();

        holder.conn().execute_batch("BEGIN IMMEDIATE").unwrap();
        let mut ran = false;
        let blocked = other.update_schedule(&mut |_| {
            ran = true;
            None
        });
        assert!(blocked.is_err());
        assert!(!ran);

        holder.conn().execute_batch("COMMIT").unwrap();
        other.update_schedule(&mut |_| None).unwrap();
    }

    #[test]
    fn reopening_file_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("checkin.db");
        {
            let db = Database::open_at(&path).unwrap();
            db.save_timer(Some(&TimerState::started("x", t0()))).unwrap();
        }
        let db = Database::open_at(&path).unwrap();
        assert_eq!(db.load_timer().unwrap().unwrap().check_in_id, "x");
    }
}
