use crate::error::CdrError;
use crate::model::{Direction, LegRecord, LegStatus, LegType};
use crate::parsing::header::{canonical_field, Field};
use crate::parsing::normalize::{infer_department, normalize_location, normalize_phone};
use crate::parsing::values::{optional_value, parse_duration, parse_flag};
use crate::parsing::{parse_rows, RawRow};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};

const UNKNOWN: &str = "Unknown";
const UNKNOWN_LOCATION: &str = "Unknown Location";
const DEFAULT_DEPARTMENT: &str = "General";

/// Per-run inputs to the mapper. Mapping itself is pure.
#[derive(Debug, Clone)]
pub struct MapContext {
    pub import_date: NaiveDate,
    /// Unix milliseconds of the run; seeds synthesized call ids.
    pub run_stamp: i64,
    pub country_code: String,
}

impl MapContext {
    pub fn new(now: DateTime<Utc>, country_code: &str) -> Self {
        MapContext {
            import_date: now.date_naive(),
            run_stamp: now.timestamp_millis(),
            country_code: country_code.to_string(),
        }
    }
}

/// A source line that could not be turned into a row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedLine {
    pub line: usize,
    pub reason: String,
}

/// Mapped records of one export plus the lines that were skipped.
#[derive(Debug, Clone, Default)]
pub struct MappedBatch {
    pub records: Vec<LegRecord>,
    pub skipped: Vec<SkippedLine>,
}

impl MappedBatch {
    /// Data lines seen, mapped or not.
    pub fn rows_read(&self) -> usize {
        self.records.len() + self.skipped.len()
    }
}

/// Split an export into well-formed rows and skipped lines.
pub fn normalize_export(text: &str) -> (Vec<RawRow>, Vec<SkippedLine>) {
    let mut rows = Vec::new();
    let mut skipped = Vec::new();
    for result in parse_rows(text) {
        match result {
            Ok(row) => rows.push(row),
            Err(CdrError::MalformedInput { line, reason }) => {
                tracing::warn!(line, %reason, "Skipping malformed CDR line");
                skipped.push(SkippedLine { line, reason });
            }
            Err(other) => {
                tracing::warn!(error = %other, "Skipping unreadable CDR line");
                skipped.push(SkippedLine {
                    line: 0,
                    reason: other.to_string(),
                });
            }
        }
    }
    (rows, skipped)
}

/// Normalize and map a whole export. Malformed lines are recorded in
/// `skipped` and never abort the batch.
pub fn map_export(text: &str, ctx: &MapContext) -> MappedBatch {
    let (rows, skipped) = normalize_export(text);
    MappedBatch {
        records: rows.iter().map(|row| map_row(row, ctx)).collect(),
        skipped,
    }
}

/// Map one normalized row to a canonical leg record.
pub fn map_row(row: &RawRow, ctx: &MapContext) -> LegRecord {
    let mut canonical: HashMap<Field, String> = HashMap::new();
    let mut extra = BTreeMap::new();

    for (header, value) in &row.fields {
        match canonical_field(header) {
            Some(field) => {
                // First non-empty value wins when two headers share a field
                let slot = canonical.entry(field).or_default();
                if slot.is_empty() {
                    *slot = value.clone();
                }
            }
            None => {
                extra.insert(header.clone(), value.clone());
            }
        }
    }

    let get = |field: Field| -> Option<String> {
        canonical.get(&field).and_then(|v| optional_value(v))
    };

    let call_id =
        get(Field::CallId).unwrap_or_else(|| format!("CALL_{}_{}", ctx.run_stamp, row.line));
    let correlation_id = get(Field::CorrelationId).unwrap_or_else(|| call_id.clone());
    let leg_id = get(Field::LegId).unwrap_or_else(|| call_id.clone());

    let raw_called = get(Field::CalledNumber).unwrap_or_default();
    let raw_caller = get(Field::CallerNumber).unwrap_or_default();

    let leg_type = classify_leg_type(
        get(Field::LegType).as_deref(),
        get(Field::RedirectingNumber).as_deref(),
        get(Field::OriginalCalledNumber).as_deref(),
        &raw_called,
    );

    let answer_time = get(Field::AnswerTime);
    let release_cause = get(Field::ReleaseCause);
    let answered_flag = get(Field::Answered).is_some_and(|v| parse_flag(&v));
    let status = classify_status(
        answer_time.is_some() || answered_flag,
        release_cause.as_deref(),
    );
    let outcome = get(Field::CallOutcome).unwrap_or_else(|| status.to_string());

    let direction = get(Field::Direction)
        .or_else(|| get(Field::CallType))
        .map(|d| Direction::from_str_loose(&d))
        .unwrap_or(Direction::Outbound);

    let location = get(Field::Location)
        .map(|l| normalize_location(&l))
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| UNKNOWN_LOCATION.to_string());
    let department = get(Field::Department)
        .map(|d| normalize_location(&d))
        .filter(|d| !d.is_empty())
        .or_else(|| infer_department(&raw_called).map(str::to_string))
        .unwrap_or_else(|| DEFAULT_DEPARTMENT.to_string());

    LegRecord {
        natural_key: fingerprint_row(row),
        correlation_id,
        leg_id,
        call_id,
        start_time: get(Field::StartTime).unwrap_or_default(),
        answer_time,
        end_time: get(Field::EndTime),
        release_time: get(Field::ReleaseTime),
        duration: get(Field::Duration).map(|d| parse_duration(&d)).unwrap_or(0),
        location,
        department,
        user_name: get(Field::UserName).unwrap_or_default(),
        direction,
        call_type: direction,
        leg_type,
        status,
        outcome,
        caller_number: normalize_phone(&raw_caller, &ctx.country_code),
        called_number: normalize_phone(&raw_called, &ctx.country_code),
        user_type: get(Field::UserType).unwrap_or_else(|| UNKNOWN.to_string()),
        client_type: get(Field::ClientType).unwrap_or_else(|| UNKNOWN.to_string()),
        device_type: get(Field::DeviceType).unwrap_or_else(|| UNKNOWN.to_string()),
        release_cause: release_cause.unwrap_or_else(|| UNKNOWN.to_string()),
        extra,
        raw_data: raw_json(row),
        import_date: ctx.import_date.format("%Y-%m-%d").to_string(),
    }
}

/// An explicit source label wins. Otherwise a redirecting party, or an
/// original called party that differs from the final one, marks a transfer.
fn classify_leg_type(
    label: Option<&str>,
    redirecting: Option<&str>,
    original_called: Option<&str>,
    called: &str,
) -> LegType {
    if let Some(explicit) = label.and_then(LegType::from_str_loose) {
        return explicit;
    }
    if redirecting.is_some() {
        return LegType::Transfer;
    }
    match original_called {
        Some(original) if original != called => LegType::Transfer,
        _ => LegType::Initial,
    }
}

fn classify_status(answered: bool, release_cause: Option<&str>) -> LegStatus {
    if answered {
        return LegStatus::Answered;
    }
    let cause = release_cause.unwrap_or_default().to_lowercase();
    if cause.contains("no answer") {
        LegStatus::NoAnswer
    } else if cause.contains("busy") {
        LegStatus::Busy
    } else {
        LegStatus::Failed
    }
}

/// SHA-256 over the row's header/value pairs in sorted order.
///
/// Independent of line position and of any synthesized identifiers, so
/// re-importing the same export produces the same keys.
pub fn fingerprint_row(row: &RawRow) -> String {
    let mut pairs: Vec<&(String, String)> = row.fields.iter().collect();
    pairs.sort();

    let mut hasher = Sha256::new();
    for (header, value) in pairs {
        hasher.update(header.as_bytes());
        hasher.update(b"\x1f");
        hasher.update(value.as_bytes());
        hasher.update(b"\x1e");
    }
    hex::encode(hasher.finalize())
}

fn raw_json(row: &RawRow) -> String {
    let map: serde_json::Map<String, serde_json::Value> = row
        .fields
        .iter()
        .map(|(h, v)| (h.clone(), serde_json::Value::String(v.clone())))
        .collect();
    serde_json::Value::Object(map).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> MapContext {
        MapContext {
            import_date: NaiveDate::from_ymd_opt(2025, 6, 24).unwrap(),
            run_stamp: 1_750_000_000_000,
            country_code: "1".into(),
        }
    }

    fn row(pairs: &[(&str, &str)]) -> RawRow {
        RawRow::new(
            7,
            pairs
                .iter()
                .map(|(h, v)| (h.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_synthesized_identifiers() {
        let rec = map_row(&row(&[("Start time", "2025-06-24T10:00:00Z")]), &ctx());
        assert_eq!(rec.call_id, "CALL_1750000000000_7");
        assert_eq!(rec.correlation_id, rec.call_id);
        assert_eq!(rec.leg_id, rec.call_id);
        assert_eq!(rec.user_type, "Unknown");
        assert_eq!(rec.client_type, "Unknown");
        assert_eq!(rec.device_type, "Unknown");
        assert_eq!(rec.release_cause, "Unknown");
        assert_eq!(rec.location, "Unknown Location");
        assert_eq!(rec.department, "General");
        assert_eq!(rec.import_date, "2025-06-24");
    }

    #[test]
    fn test_correlation_defaults_to_source_call_id() {
        let rec = map_row(&row(&[("CallId", "abc"), ("Local call ID", "leg-9")]), &ctx());
        assert_eq!(rec.correlation_id, "abc");
        assert_eq!(rec.leg_id, "leg-9");
    }

    #[test]
    fn test_unknown_headers_preserved() {
        let rec = map_row(
            &row(&[("Call ID", "c1"), ("Site main number", "+15550000000")]),
            &ctx(),
        );
        assert_eq!(rec.extra.get("Site main number").map(String::as_str), Some("+15550000000"));
        assert!(rec.raw_data.contains("Site main number"));
    }

    #[test]
    fn test_transfer_from_redirecting_party() {
        let rec = map_row(&row(&[("Redirecting party number", "5550001111")]), &ctx());
        assert_eq!(rec.leg_type, LegType::Transfer);
    }

    #[test]
    fn test_transfer_from_original_called_mismatch() {
        let moved = map_row(
            &row(&[("Called number", "200"), ("Original called party number", "100")]),
            &ctx(),
        );
        assert_eq!(moved.leg_type, LegType::Transfer);

        let same = map_row(
            &row(&[("Called number", "100"), ("Original called party number", "100")]),
            &ctx(),
        );
        assert_eq!(same.leg_type, LegType::Initial);
    }

    #[test]
    fn test_explicit_leg_type_label() {
        let rec = map_row(&row(&[("Leg Type", "Conference")]), &ctx());
        assert_eq!(rec.leg_type, LegType::Conference);
        let unknown_label = map_row(&row(&[("Leg Type", "weird")]), &ctx());
        assert_eq!(unknown_label.leg_type, LegType::Initial);
    }

    #[test]
    fn test_status_classification() {
        let answered = map_row(&row(&[("Answer time", "2025-06-24T10:00:05Z")]), &ctx());
        assert_eq!(answered.status, LegStatus::Answered);
        assert_eq!(answered.outcome, "Answered");

        let na = map_row(&row(&[("Answer time", "NA"), ("Release cause", "No Answer")]), &ctx());
        assert_eq!(na.status, LegStatus::NoAnswer);
        assert!(na.answer_time.is_none());

        let busy = map_row(&row(&[("Release cause", "User BUSY")]), &ctx());
        assert_eq!(busy.status, LegStatus::Busy);

        let failed = map_row(&row(&[("Release cause", "normal")]), &ctx());
        assert_eq!(failed.status, LegStatus::Failed);
    }

    #[test]
    fn test_answered_flag_and_source_outcome() {
        let rec = map_row(&row(&[("Answered", "true"), ("Call outcome", "Success")]), &ctx());
        assert_eq!(rec.status, LegStatus::Answered);
        assert_eq!(rec.outcome, "Success");
    }

    #[test]
    fn test_direction_and_numbers() {
        let rec = map_row(
            &row(&[
                ("Direction", "TERMINATING"),
                ("Calling number", "555-123-4567"),
                ("Called number", "4021"),
            ]),
            &ctx(),
        );
        assert_eq!(rec.direction, Direction::Inbound);
        assert_eq!(rec.call_type, Direction::Inbound);
        assert_eq!(rec.caller_number, "+15551234567");
        assert_eq!(rec.called_number, "4021");
    }

    #[test]
    fn test_location_and_inferred_department() {
        let rec = map_row(
            &row(&[("Site", "north_clinic"), ("Called number", "cardio-line")]),
            &ctx(),
        );
        assert_eq!(rec.location, "North Clinic");
        assert_eq!(rec.department, "Cardiology");
    }

    #[test]
    fn test_fingerprint_stable_across_positions() {
        let a = RawRow::new(2, vec![("a".into(), "1".into()), ("b".into(), "2".into())]);
        let b = RawRow::new(9, vec![("b".into(), "2".into()), ("a".into(), "1".into())]);
        assert_eq!(fingerprint_row(&a), fingerprint_row(&b));

        let c = RawRow::new(2, vec![("a".into(), "1".into()), ("b".into(), "3".into())]);
        assert_ne!(fingerprint_row(&a), fingerprint_row(&c));
    }

    #[test]
    fn test_map_export_skips_malformed() {
        let text = "Call ID,Correlation ID,Duration\nA,C1,10\nB,C1\nD,C2,5\n";
        let batch = map_export(text, &ctx());
        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.skipped.len(), 1);
        assert_eq!(batch.skipped[0].line, 3);
        assert_eq!(batch.rows_read(), 3);
    }
}
