pub mod filters;
pub mod schema;

pub use filters::LegFilter;

use crate::error::CdrError;
use crate::model::{Direction, ImportLogEntry, ImportStatus, LegRecord, LegStatus, LegType};
use crate::parsing::values::calendar_date;
use parking_lot::Mutex;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OpenFlags, Row, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const LEG_COLUMNS: &str = "natural_key, correlation_id, leg_id, call_id, start_time, \
     answer_time, end_time, release_time, duration, location, department, user_name, \
     direction, call_type, leg_type, status, outcome, caller_number, called_number, \
     user_type, client_type, device_type, release_cause, extra, raw_data, import_date";

/// Result of one batch insert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertOutcome {
    pub inserted: usize,
    pub duplicates: usize,
}

/// Per-call aggregate computed inside the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallAggregate {
    /// Correlation id, or `#<natural key>` for an uncorrelated leg.
    pub call_key: String,
    pub location: String,
    pub total_duration: u64,
    pub start_time: String,
    pub end_time: String,
    pub was_answered: bool,
    pub leg_count: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreCounts {
    pub legs: usize,
    pub calls: usize,
    pub locations: usize,
}

/// Durable, idempotent storage for leg records and the import audit trail.
///
/// The store owns its connection; callers construct one and hand a reference
/// to the reporting facade and the importer.
pub struct LegStore {
    conn: Mutex<Connection>,
}

impl LegStore {
    /// Open (or create) a database file. `:memory:` opens a private
    /// in-memory database.
    pub fn open(path: &Path) -> Result<Self, CdrError> {
        if path.as_os_str() == ":memory:" {
            return Self::open_in_memory();
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                CdrError::StorageUnavailable(format!("{}: {e}", parent.display()))
            })?;
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )
        .map_err(|e| CdrError::StorageUnavailable(format!("{}: {e}", path.display())))?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        tracing::debug!(path = %path.display(), "Opened leg store");
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, CdrError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| CdrError::StorageUnavailable(e.to_string()))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, CdrError> {
        schema::initialize(&conn)?;
        Ok(LegStore {
            conn: Mutex::new(conn),
        })
    }

    /// Insert a batch in one transaction. Rows whose natural key already
    /// exists are skipped and counted as duplicates, never overwritten.
    pub fn insert(&self, records: &[LegRecord]) -> Result<InsertOutcome, CdrError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut outcome = InsertOutcome::default();
        {
            let sql = format!(
                "INSERT OR IGNORE INTO cdr_legs ({LEG_COLUMNS}, start_date, start_key, end_key) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, \
                 ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28, ?29)"
            );
            let mut stmt = tx.prepare_cached(&sql)?;
            for leg in records {
                let extra = serde_json::to_string(&leg.extra)?;
                let start_date =
                    calendar_date(&leg.start_time).map(|d| d.format("%Y-%m-%d").to_string());
                let changed = stmt.execute(params![
                    leg.natural_key,
                    leg.correlation_id,
                    leg.leg_id,
                    leg.call_id,
                    leg.start_time,
                    leg.answer_time,
                    leg.end_time,
                    leg.release_time,
                    i64::try_from(leg.duration).unwrap_or(i64::MAX),
                    leg.location,
                    leg.department,
                    leg.user_name,
                    leg.direction.to_string(),
                    leg.call_type.to_string(),
                    leg.leg_type.to_string(),
                    leg.status.to_string(),
                    leg.outcome,
                    leg.caller_number,
                    leg.called_number,
                    leg.user_type,
                    leg.client_type,
                    leg.device_type,
                    leg.release_cause,
                    extra,
                    leg.raw_data,
                    leg.import_date,
                    start_date,
                    schema::start_sort_key(&leg.start_time),
                    schema::end_sort_key(leg.finished_at()),
                ])?;
                if changed == 0 {
                    outcome.duplicates += 1;
                } else {
                    outcome.inserted += 1;
                }
            }
        }
        tx.commit()?;

        tracing::debug!(
            inserted = outcome.inserted,
            duplicates = outcome.duplicates,
            "Inserted leg batch"
        );
        Ok(outcome)
    }

    /// Legs matching the filter, newest first by parsed start instant.
    pub fn list_legs(&self, filter: &LegFilter) -> Result<Vec<LegRecord>, CdrError> {
        let (where_sql, mut values) = filter.where_clause();
        let (page_sql, page_values) = filter.page_clause();
        values.extend(page_values);

        let sql = format!(
            "SELECT {LEG_COLUMNS} FROM cdr_legs{where_sql} \
             ORDER BY start_key DESC, start_time DESC, id DESC{page_sql}"
        );
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql)?;
        let legs = stmt
            .query_map(params_from_iter(values), leg_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(legs)
    }

    /// One aggregate row per call: summed duration, first leg's start and
    /// location, latest release, any-answered flag and leg count. Legs are
    /// ordered by parsed instant, as in call reconstruction. Pagination is
    /// ignored.
    pub fn call_aggregates(&self, filter: &LegFilter) -> Result<Vec<CallAggregate>, CdrError> {
        let (where_sql, values) = filter.where_clause();
        let key = schema::CALL_KEY_SQL;
        let sql = format!(
            "WITH legs AS ( \
                 SELECT {key} AS call_key, location, duration, status, start_time, start_key, \
                 COALESCE(release_time, end_time, start_time) AS finished, \
                 ROW_NUMBER() OVER (PARTITION BY {key} \
                     ORDER BY start_key, start_time, leg_id, natural_key) AS first_pos, \
                 ROW_NUMBER() OVER (PARTITION BY {key} \
                     ORDER BY end_key DESC, COALESCE(release_time, end_time, start_time) DESC) \
                     AS last_pos \
                 FROM cdr_legs{where_sql}) \
             SELECT call_key, \
                 MAX(CASE WHEN first_pos = 1 THEN location END), \
                 TOTAL(duration), \
                 MAX(CASE WHEN first_pos = 1 THEN start_time END), \
                 MAX(CASE WHEN last_pos = 1 THEN finished END), \
                 MAX(CASE WHEN status = 'Answered' THEN 1 ELSE 0 END), COUNT(*) \
             FROM legs GROUP BY call_key \
             ORDER BY MIN(start_key), MIN(start_time), call_key"
        );
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values), |row| {
                Ok(CallAggregate {
                    call_key: row.get(0)?,
                    location: row.get(1)?,
                    // TOTAL is a float and cannot overflow
                    total_duration: row.get::<_, f64>(2)?.max(0.0) as u64,
                    start_time: row.get(3)?,
                    end_time: row.get(4)?,
                    was_answered: row.get::<_, i64>(5)? != 0,
                    leg_count: row.get::<_, i64>(6)?.max(0) as usize,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Distinct non-empty locations, sorted.
    pub fn locations(&self) -> Result<Vec<String>, CdrError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT location FROM cdr_legs WHERE TRIM(location) != '' ORDER BY location",
        )?;
        let locations = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(locations)
    }

    pub fn counts(&self) -> Result<StoreCounts, CdrError> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT COUNT(*), COUNT(DISTINCT {}), \
             COUNT(DISTINCT CASE WHEN TRIM(location) != '' THEN location END) FROM cdr_legs",
            schema::CALL_KEY_SQL
        );
        let (legs, calls, locations): (i64, i64, i64) =
            conn.query_row(&sql, [], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?;
        Ok(StoreCounts {
            legs: legs.max(0) as usize,
            calls: calls.max(0) as usize,
            locations: locations.max(0) as usize,
        })
    }

    /// Append one audit entry. The entry's `id` is ignored; the assigned id
    /// is returned.
    pub fn append_log(&self, entry: &ImportLogEntry) -> Result<i64, CdrError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO import_logs (timestamp, rows_read, rows_inserted, rows_deduplicated, \
             calls_produced, source_reference, status, error_message) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                entry.timestamp,
                entry.rows_read as i64,
                entry.rows_inserted as i64,
                entry.rows_deduplicated as i64,
                entry.calls_produced as i64,
                entry.source_reference,
                entry.status.to_string(),
                entry.error_message,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Most recent audit entries first.
    pub fn import_logs(&self, limit: usize) -> Result<Vec<ImportLogEntry>, CdrError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, timestamp, rows_read, rows_inserted, rows_deduplicated, calls_produced, \
             source_reference, status, error_message \
             FROM import_logs ORDER BY id DESC LIMIT ?1",
        )?;
        let entries = stmt
            .query_map([Value::Integer(limit as i64)], |row| {
                let status: String = row.get(7)?;
                Ok(ImportLogEntry {
                    id: row.get(0)?,
                    timestamp: row.get(1)?,
                    rows_read: row.get::<_, i64>(2)?.max(0) as usize,
                    rows_inserted: row.get::<_, i64>(3)?.max(0) as usize,
                    rows_deduplicated: row.get::<_, i64>(4)?.max(0) as usize,
                    calls_produced: row.get::<_, i64>(5)?.max(0) as usize,
                    source_reference: row.get(6)?,
                    status: ImportStatus::from_str_loose(&status),
                    error_message: row.get(8)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}

fn leg_from_row(row: &Row<'_>) -> rusqlite::Result<LegRecord> {
    let direction: String = row.get(12)?;
    let call_type: String = row.get(13)?;
    let leg_type: String = row.get(14)?;
    let status: String = row.get(15)?;
    let extra_json: String = row.get(23)?;
    let extra = match serde_json::from_str::<BTreeMap<String, String>>(&extra_json) {
        Ok(extra) => extra,
        Err(e) => {
            let natural_key: String = row.get(0)?;
            tracing::warn!(%natural_key, error = %e, "Ignoring unreadable extra attributes");
            BTreeMap::new()
        }
    };

    Ok(LegRecord {
        natural_key: row.get(0)?,
        correlation_id: row.get(1)?,
        leg_id: row.get(2)?,
        call_id: row.get(3)?,
        start_time: row.get(4)?,
        answer_time: row.get(5)?,
        end_time: row.get(6)?,
        release_time: row.get(7)?,
        duration: row.get::<_, i64>(8)?.max(0) as u64,
        location: row.get(9)?,
        department: row.get(10)?,
        user_name: row.get(11)?,
        direction: Direction::from_str_loose(&direction),
        call_type: Direction::from_str_loose(&call_type),
        leg_type: LegType::from_str_loose(&leg_type).unwrap_or_default(),
        status: LegStatus::from_str_loose(&status).unwrap_or(LegStatus::Failed),
        outcome: row.get(16)?,
        caller_number: row.get(17)?,
        called_number: row.get(18)?,
        user_type: row.get(19)?,
        client_type: row.get(20)?,
        device_type: row.get(21)?,
        release_cause: row.get(22)?,
        extra,
        raw_data: row.get(24)?,
        import_date: row.get(25)?,
    })
}
