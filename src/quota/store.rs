//! Backing store for per-identity usage records.
//!
//! The tracker never touches the database directly; it operates through the
//! [`UsageStore`] trait so it can be tested against scripted stores and so
//! concurrent callers (multiple tabs/devices of the same identity) are safe.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::params;

use crate::db::Database;

/// A single identity's accumulated usage for one calendar day.
///
/// One record exists per `(identity, day)` pair, created lazily on first use.
/// `count` only moves forward within a reset epoch; it returns to 0 only when
/// a reset is applied.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageRecord {
    pub identity: String,
    pub day: NaiveDate,
    pub count: u32,
    pub last_reset: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Usage store unavailable: {0}")]
    Unavailable(String),
}

/// Storage interface for usage records.
///
/// `update` must apply the mutation atomically: no two concurrent callers may
/// observe the same pre-mutation record (linearizable read-modify-write).
pub trait UsageStore: Send + Sync {
    /// Fetch the record for `(identity, day)`, creating one with `count = 0`
    /// and `last_reset = now` if absent.
    fn get_or_create(&self, identity: &str, day: NaiveDate) -> Result<UsageRecord, StoreError>;

    /// Atomically read, mutate, and persist the record for `(identity, day)`,
    /// creating it first if absent. Returns the post-mutation record.
    fn update(
        &self,
        identity: &str,
        day: NaiveDate,
        mutate: &mut dyn FnMut(&mut UsageRecord),
    ) -> Result<UsageRecord, StoreError>;
}

// ---------------------------------------------------------------------------
// SQLite implementation
// ---------------------------------------------------------------------------

/// [`UsageStore`] backed by the shared SQLite handle.
///
/// Updates run inside a transaction under the connection mutex, so the
/// read-evaluate-write sequence is a single atomic step.
#[derive(Clone)]
pub struct SqliteUsageStore {
    db: Database,
}

impl SqliteUsageStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn select_record(
        conn: &rusqlite::Connection,
        identity: &str,
        day: NaiveDate,
    ) -> Result<Option<UsageRecord>, rusqlite::Error> {
        let mut stmt = conn.prepare_cached(
            "SELECT identity, day, count, last_reset FROM usage_records \
             WHERE identity = ?1 AND day = ?2",
        )?;
        let record = stmt.query_row(params![identity, format_day(day)], |row| {
            let day_str: String = row.get(1)?;
            let reset_str: String = row.get(3)?;
            Ok(UsageRecord {
                identity: row.get(0)?,
                day: parse_day(&day_str, 1)?,
                count: row.get(2)?,
                last_reset: parse_timestamp(&reset_str, 3)?,
            })
        });

        match record {
            Ok(r) => Ok(Some(r)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn upsert_record(
        conn: &rusqlite::Connection,
        record: &UsageRecord,
    ) -> Result<(), rusqlite::Error> {
        conn.execute(
            "INSERT INTO usage_records (identity, day, count, last_reset) \
             VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(identity, day) DO UPDATE SET \
               count = excluded.count, \
               last_reset = excluded.last_reset",
            params![
                record.identity,
                format_day(record.day),
                record.count,
                format_timestamp(record.last_reset),
            ],
        )?;
        Ok(())
    }
}

impl UsageStore for SqliteUsageStore {
    fn get_or_create(&self, identity: &str, day: NaiveDate) -> Result<UsageRecord, StoreError> {
        self.db
            .with_conn(|conn| {
                if let Some(record) = Self::select_record(conn, identity, day)? {
                    return Ok(record);
                }
                let record = UsageRecord {
                    identity: identity.to_string(),
                    day,
                    count: 0,
                    last_reset: Utc::now(),
                };
                Self::upsert_record(conn, &record)?;
                Ok(record)
            })
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    fn update(
        &self,
        identity: &str,
        day: NaiveDate,
        mutate: &mut dyn FnMut(&mut UsageRecord),
    ) -> Result<UsageRecord, StoreError> {
        self.db
            .with_conn(|conn| {
                let tx = conn.unchecked_transaction()?;
                let mut record = Self::select_record(&tx, identity, day)?.unwrap_or_else(|| {
                    UsageRecord {
                        identity: identity.to_string(),
                        day,
                        count: 0,
                        last_reset: Utc::now(),
                    }
                });
                mutate(&mut record);
                Self::upsert_record(&tx, &record)?;
                tx.commit()?;
                Ok(record)
            })
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Column formats
// ---------------------------------------------------------------------------

const DAY_FORMAT: &str = "%Y-%m-%d";

fn format_day(day: NaiveDate) -> String {
    day.format(DAY_FORMAT).to_string()
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    // Millisecond precision so compressed reset windows survive a round-trip.
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_day(s: &str, column: usize) -> Result<NaiveDate, rusqlite::Error> {
    NaiveDate::parse_from_str(s, DAY_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn parse_timestamp(s: &str, column: usize) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                column,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
