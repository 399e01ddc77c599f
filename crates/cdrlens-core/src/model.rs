use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Inbound,
    Outbound,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Inbound => write!(f, "Inbound"),
            Direction::Outbound => write!(f, "Outbound"),
        }
    }
}

impl Direction {
    /// Vendor exports say "inbound"/"incoming"/"outbound" or
    /// "TERMINATING"/"ORIGINATING".
    /// Anything unrecognized is treated as outbound.
    pub fn from_str_loose(s: &str) -> Direction {
        match s.trim().to_lowercase().as_str() {
            "inbound" | "incoming" | "in" | "terminating" => Direction::Inbound,
            _ => Direction::Outbound,
        }
    }
}

/// Role of a leg within a multi-leg call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LegType {
    #[default]
    Initial,
    Transfer,
    Hold,
    Conference,
}

impl fmt::Display for LegType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LegType::Initial => write!(f, "Initial"),
            LegType::Transfer => write!(f, "Transfer"),
            LegType::Hold => write!(f, "Hold"),
            LegType::Conference => write!(f, "Conference"),
        }
    }
}

impl LegType {
    pub fn from_str_loose(s: &str) -> Option<LegType> {
        let lower = s.trim().to_lowercase();
        if lower.contains("conf") {
            Some(LegType::Conference)
        } else if lower.contains("transfer") || lower.contains("redirect") {
            Some(LegType::Transfer)
        } else if lower.contains("hold") || lower.contains("park") {
            Some(LegType::Hold)
        } else if lower == "initial" || lower == "original" {
            Some(LegType::Initial)
        } else {
            None
        }
    }

    /// Aggregation rank: Conference > Transfer > Hold > Initial.
    pub fn precedence(self) -> u8 {
        match self {
            LegType::Initial => 0,
            LegType::Hold => 1,
            LegType::Transfer => 2,
            LegType::Conference => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LegStatus {
    Answered,
    NoAnswer,
    Busy,
    Failed,
}

impl fmt::Display for LegStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LegStatus::Answered => write!(f, "Answered"),
            LegStatus::NoAnswer => write!(f, "NoAnswer"),
            LegStatus::Busy => write!(f, "Busy"),
            LegStatus::Failed => write!(f, "Failed"),
        }
    }
}

impl LegStatus {
    pub fn from_str_loose(s: &str) -> Option<LegStatus> {
        let lower: String = s
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect();
        match lower.as_str() {
            "answered" => Some(LegStatus::Answered),
            "noanswer" => Some(LegStatus::NoAnswer),
            "busy" => Some(LegStatus::Busy),
            "failed" => Some(LegStatus::Failed),
            _ => None,
        }
    }
}

/// One raw call-detail record in canonical form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegRecord {
    /// Stable fingerprint of the source row; the deduplication key.
    pub natural_key: String,
    pub correlation_id: String,
    pub leg_id: String,
    pub call_id: String,
    pub start_time: String,
    pub answer_time: Option<String>,
    pub end_time: Option<String>,
    pub release_time: Option<String>,
    /// Seconds.
    pub duration: u64,
    pub location: String,
    pub department: String,
    pub user_name: String,
    pub direction: Direction,
    pub call_type: Direction,
    pub leg_type: LegType,
    pub status: LegStatus,
    /// Free-text outcome from the source, or the status name.
    pub outcome: String,
    pub caller_number: String,
    pub called_number: String,
    pub user_type: String,
    pub client_type: String,
    pub device_type: String,
    pub release_cause: String,
    /// Source columns with no canonical counterpart.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
    /// The original row serialized as JSON.
    pub raw_data: String,
    /// Date of ingestion (YYYY-MM-DD).
    pub import_date: String,
}

impl LegRecord {
    pub fn answered(&self) -> bool {
        self.status == LegStatus::Answered
    }

    /// Release time, else end time, else start time.
    pub fn finished_at(&self) -> &str {
        self.release_time
            .as_deref()
            .or(self.end_time.as_deref())
            .unwrap_or(&self.start_time)
    }
}

/// A logical phone call reconstructed from all legs sharing a correlation id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    pub correlation_id: String,
    pub start_time: String,
    pub end_time: String,
    pub total_duration: u64,
    pub location: String,
    pub department: String,
    pub leg_count: usize,
    pub was_answered: bool,
    pub outcome: String,
    pub leg_type: LegType,
    pub transfer_count: usize,
    pub hold_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStatus {
    Success,
    Partial,
    Failed,
}

impl fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportStatus::Success => write!(f, "success"),
            ImportStatus::Partial => write!(f, "partial"),
            ImportStatus::Failed => write!(f, "failed"),
        }
    }
}

impl ImportStatus {
    pub fn from_str_loose(s: &str) -> ImportStatus {
        match s.trim().to_lowercase().as_str() {
            "success" => ImportStatus::Success,
            "partial" => ImportStatus::Partial,
            _ => ImportStatus::Failed,
        }
    }
}

/// One append-only audit row per import attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportLogEntry {
    pub id: i64,
    /// RFC 3339 timestamp of the attempt.
    pub timestamp: String,
    pub rows_read: usize,
    pub rows_inserted: usize,
    pub rows_deduplicated: usize,
    pub calls_produced: usize,
    /// File path or credential fingerprint, never the credential itself.
    pub source_reference: String,
    pub status: ImportStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Result of a completed import run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub records_processed: usize,
    pub records_inserted: usize,
    pub duplicates_skipped: usize,
    pub calls_created: usize,
    pub skipped_lines: usize,
    pub source_reference: String,
    pub status: ImportStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived_path: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_loose() {
        assert_eq!(Direction::from_str_loose("inbound"), Direction::Inbound);
        assert_eq!(Direction::from_str_loose("TERMINATING"), Direction::Inbound);
        assert_eq!(Direction::from_str_loose("ORIGINATING"), Direction::Outbound);
        assert_eq!(Direction::from_str_loose(""), Direction::Outbound);
        assert_eq!(Direction::from_str_loose(" Incoming "), Direction::Inbound);
        assert_eq!(Direction::from_str_loose("internal"), Direction::Outbound);
        assert_eq!(Direction::from_str_loose("invalid"), Direction::Outbound);
    }

    #[test]
    fn test_direction_display_round_trips() {
        for d in [Direction::Inbound, Direction::Outbound] {
            assert_eq!(Direction::from_str_loose(&d.to_string()), d);
        }
    }

    #[test]
    fn test_leg_type_loose() {
        assert_eq!(LegType::from_str_loose("Transfer"), Some(LegType::Transfer));
        assert_eq!(LegType::from_str_loose("CONFERENCE"), Some(LegType::Conference));
        assert_eq!(LegType::from_str_loose("on hold"), Some(LegType::Hold));
        assert_eq!(LegType::from_str_loose("Initial"), Some(LegType::Initial));
        assert_eq!(LegType::from_str_loose("something"), None);
    }

    #[test]
    fn test_leg_type_precedence_order() {
        assert!(LegType::Conference.precedence() > LegType::Transfer.precedence());
        assert!(LegType::Transfer.precedence() > LegType::Hold.precedence());
        assert!(LegType::Hold.precedence() > LegType::Initial.precedence());
    }

    #[test]
    fn test_status_loose() {
        assert_eq!(LegStatus::from_str_loose("No Answer"), Some(LegStatus::NoAnswer));
        assert_eq!(LegStatus::from_str_loose("busy"), Some(LegStatus::Busy));
        assert_eq!(LegStatus::from_str_loose("Completed"), None);
    }
}
