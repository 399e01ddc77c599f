use crate::parsing::values::parse_instant;
use rusqlite::{params, Connection};

pub const SCHEMA_VERSION: i32 = 2;

const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS cdr_legs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    natural_key TEXT NOT NULL UNIQUE,
    correlation_id TEXT NOT NULL,
    leg_id TEXT NOT NULL,
    call_id TEXT NOT NULL,
    start_time TEXT NOT NULL,
    start_date TEXT,
    answer_time TEXT,
    end_time TEXT,
    release_time TEXT,
    duration INTEGER NOT NULL DEFAULT 0,
    location TEXT NOT NULL,
    department TEXT NOT NULL,
    user_name TEXT NOT NULL,
    direction TEXT NOT NULL,
    call_type TEXT NOT NULL,
    leg_type TEXT NOT NULL,
    status TEXT NOT NULL,
    outcome TEXT NOT NULL,
    caller_number TEXT NOT NULL,
    called_number TEXT NOT NULL,
    user_type TEXT NOT NULL,
    client_type TEXT NOT NULL,
    device_type TEXT NOT NULL,
    release_cause TEXT NOT NULL,
    extra TEXT NOT NULL DEFAULT '{}',
    raw_data TEXT NOT NULL,
    import_date TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS idx_legs_correlation_id ON cdr_legs(correlation_id);
CREATE INDEX IF NOT EXISTS idx_legs_start_date ON cdr_legs(start_date);
CREATE INDEX IF NOT EXISTS idx_legs_location ON cdr_legs(location);

CREATE TABLE IF NOT EXISTS import_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    rows_read INTEGER NOT NULL,
    rows_inserted INTEGER NOT NULL,
    rows_deduplicated INTEGER NOT NULL,
    calls_produced INTEGER NOT NULL,
    source_reference TEXT NOT NULL,
    status TEXT NOT NULL,
    error_message TEXT
);
"#;

// Chronological sort keys. Timestamps compare as instants, so
// `08:00-04:00` sorts after `11:00Z`.
const SCHEMA_V2: &str = r#"
ALTER TABLE cdr_legs ADD COLUMN start_key TEXT NOT NULL DEFAULT '';
ALTER TABLE cdr_legs ADD COLUMN end_key TEXT NOT NULL DEFAULT '';
CREATE INDEX IF NOT EXISTS idx_legs_start_key ON cdr_legs(start_key);
"#;

/// Create tables and indexes, apply pending migrations, then stamp the
/// schema version.
pub fn initialize(conn: &Connection) -> rusqlite::Result<()> {
    let current: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if current >= SCHEMA_VERSION {
        return Ok(());
    }

    let tx = conn.unchecked_transaction()?;
    if current < 1 {
        tx.execute_batch(SCHEMA_V1)?;
    }
    if current < 2 {
        tx.execute_batch(SCHEMA_V2)?;
        backfill_sort_keys(&tx)?;
    }
    tx.execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION};"))?;
    tx.commit()
}

fn backfill_sort_keys(conn: &Connection) -> rusqlite::Result<()> {
    let mut select = conn.prepare(
        "SELECT id, start_time, COALESCE(release_time, end_time, start_time) FROM cdr_legs",
    )?;
    let rows = select
        .query_map([], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    if !rows.is_empty() {
        tracing::info!(legs = rows.len(), "Backfilling leg sort keys");
    }
    let mut update =
        conn.prepare("UPDATE cdr_legs SET start_key = ?1, end_key = ?2 WHERE id = ?3")?;
    for (id, start, finished) in rows {
        update.execute(params![start_sort_key(&start), end_sort_key(&finished), id])?;
    }
    Ok(())
}

/// Fixed-width UTC rendering; lexical order equals chronological order.
fn instant_text(raw: &str) -> Option<String> {
    parse_instant(raw).map(|t| t.format("%Y-%m-%dT%H:%M:%S%.9fZ").to_string())
}

/// Ascending key for a leg start. Parseable timestamps come first in time
/// order, unparseable ones after them in string order.
pub fn start_sort_key(start_time: &str) -> String {
    match instant_text(start_time) {
        Some(text) => format!("0{text}"),
        None => format!("1{start_time}"),
    }
}

/// Ascending key for a leg finish. Unparseable values sort before every
/// parseable one, so the latest parseable finish wins a `MAX`.
pub fn end_sort_key(finished_at: &str) -> String {
    match instant_text(finished_at) {
        Some(text) => format!("1{text}"),
        None => format!("0{finished_at}"),
    }
}

/// Bucket key that groups legs into calls: the correlation id, or a per-leg
/// key when the correlation id is empty so uncorrelated legs never merge.
pub const CALL_KEY_SQL: &str =
    "CASE WHEN TRIM(correlation_id) = '' THEN '#' || natural_key ELSE correlation_id END";
