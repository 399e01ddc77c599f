use crate::error::CdrError;
use crate::model::{Call, LegRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Column order of the grouped export. Downstream spreadsheets depend on it.
pub const GROUPED_HEADERS: [&str; 10] = [
    "Correlation ID",
    "Start Time",
    "End Time",
    "Total Duration (s)",
    "Location",
    "Department",
    "Leg Count",
    "Was Answered",
    "Transfer Count",
    "Hold Count",
];

/// Column order of the detailed (one row per leg) export.
pub const DETAILED_HEADERS: [&str; 14] = [
    "Start Time",
    "Answer Time",
    "Duration (s)",
    "Calling Number",
    "Called Number",
    "User Name",
    "Location",
    "Direction",
    "Call Type",
    "Answered",
    "Call Outcome",
    "Release Time",
    "Correlation ID",
    "Leg Type",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportMode {
    /// One row per call.
    Grouped,
    /// One row per leg.
    Detailed,
}

impl fmt::Display for ExportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportMode::Grouped => write!(f, "grouped"),
            ExportMode::Detailed => write!(f, "detailed"),
        }
    }
}

impl ExportMode {
    pub fn from_str_loose(s: &str) -> Option<ExportMode> {
        match s.trim().to_lowercase().as_str() {
            "grouped" | "calls" | "summary" => Some(ExportMode::Grouped),
            "detailed" | "legs" | "details" => Some(ExportMode::Detailed),
            _ => None,
        }
    }

    /// `call_summary_<timestamp>.csv` or `call_details_<timestamp>.csv`.
    pub fn filename(self, generated_at: DateTime<Utc>) -> String {
        let prefix = match self {
            ExportMode::Grouped => "call_summary",
            ExportMode::Detailed => "call_details",
        };
        format!("{prefix}_{}.csv", generated_at.format("%Y-%m-%d_%H-%M-%S"))
    }
}

/// A rendered export, ready to write or send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Yes"
    } else {
        "No"
    }
}

fn writer() -> csv::Writer<Vec<u8>> {
    csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new())
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<Vec<u8>, CdrError> {
    wtr.into_inner().map_err(|e| CdrError::Io(e.into_error()))
}

pub fn grouped_csv(calls: &[Call]) -> Result<Vec<u8>, CdrError> {
    let mut wtr = writer();
    wtr.write_record(GROUPED_HEADERS)?;
    for call in calls {
        wtr.write_record([
            call.correlation_id.as_str(),
            call.start_time.as_str(),
            call.end_time.as_str(),
            &call.total_duration.to_string(),
            call.location.as_str(),
            call.department.as_str(),
            &call.leg_count.to_string(),
            yes_no(call.was_answered),
            &call.transfer_count.to_string(),
            &call.hold_count.to_string(),
        ])?;
    }
    finish(wtr)
}

pub fn detailed_csv(legs: &[LegRecord]) -> Result<Vec<u8>, CdrError> {
    let mut wtr = writer();
    wtr.write_record(DETAILED_HEADERS)?;
    for leg in legs {
        let release = leg
            .release_time
            .as_deref()
            .or(leg.end_time.as_deref())
            .unwrap_or_default();
        wtr.write_record([
            leg.start_time.as_str(),
            leg.answer_time.as_deref().unwrap_or_default(),
            &leg.duration.to_string(),
            leg.caller_number.as_str(),
            leg.called_number.as_str(),
            leg.user_name.as_str(),
            leg.location.as_str(),
            &leg.direction.to_string(),
            &leg.call_type.to_string(),
            yes_no(leg.answered()),
            leg.outcome.as_str(),
            release,
            leg.correlation_id.as_str(),
            &leg.leg_type.to_string(),
        ])?;
    }
    finish(wtr)
}
