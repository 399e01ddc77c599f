pub mod export;

pub use export::{ExportFile, ExportMode};

use crate::clock::{Clock, SystemClock};
use crate::correlate::reconstruct;
use crate::error::CdrError;
use crate::model::{Call, ImportLogEntry, LegRecord};
use crate::store::{LegFilter, LegStore};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Call-level selection. Dates are inclusive; the department matches as a
/// case-insensitive substring.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallFilter {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub location: Option<String>,
    pub department: Option<String>,
}

impl CallFilter {
    fn leg_filter(&self) -> LegFilter {
        LegFilter::range(self.start_date, self.end_date, self.location.clone())
    }

    fn department_matches(&self, department: &str) -> bool {
        match self.department.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(wanted) => department
                .to_lowercase()
                .contains(&wanted.to_lowercase()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClinicSummary {
    pub location: String,
    pub call_count: usize,
    pub leg_count: usize,
    /// Mean call duration in seconds, rounded.
    pub avg_duration: u64,
    pub answered_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardMetrics {
    pub total_calls: usize,
    pub total_answered: usize,
    /// Percent, rounded.
    pub answer_rate: u32,
    /// Seconds, rounded.
    pub avg_duration: u64,
    pub missed_calls: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total_legs: usize,
    pub total_calls: usize,
    pub total_locations: usize,
}

/// Read-only queries over the leg store. Empty results are never errors.
pub struct Reporter<'a> {
    store: &'a LegStore,
    clock: &'a dyn Clock,
}

impl<'a> Reporter<'a> {
    pub fn new(store: &'a LegStore) -> Self {
        Reporter {
            store,
            clock: &SystemClock,
        }
    }

    /// Use a different time source for export file names.
    pub fn with_clock(mut self, clock: &'a dyn Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn list_legs(&self, filter: &LegFilter) -> Result<Vec<LegRecord>, CdrError> {
        self.store.list_legs(filter)
    }

    /// Calls rebuilt from the matching legs, newest first.
    pub fn list_calls(&self, filter: &CallFilter) -> Result<Vec<Call>, CdrError> {
        let legs = self.store.list_legs(&filter.leg_filter())?;
        let mut calls: Vec<Call> = reconstruct(&legs)
            .into_iter()
            .filter(|call| filter.department_matches(&call.department))
            .collect();
        calls.reverse();
        Ok(calls)
    }

    /// Per-location call statistics, busiest location first.
    pub fn clinic_summaries(&self, filter: &CallFilter) -> Result<Vec<ClinicSummary>, CdrError> {
        struct Acc {
            calls: usize,
            legs: usize,
            duration: u64,
            answered: usize,
        }

        let mut by_location: BTreeMap<String, Acc> = BTreeMap::new();
        for agg in self.store.call_aggregates(&filter.leg_filter())? {
            let acc = by_location.entry(agg.location).or_insert(Acc {
                calls: 0,
                legs: 0,
                duration: 0,
                answered: 0,
            });
            acc.calls += 1;
            acc.legs += agg.leg_count;
            acc.duration = acc.duration.saturating_add(agg.total_duration);
            acc.answered += usize::from(agg.was_answered);
        }

        let mut summaries: Vec<ClinicSummary> = by_location
            .into_iter()
            .map(|(location, acc)| ClinicSummary {
                location,
                call_count: acc.calls,
                leg_count: acc.legs,
                avg_duration: rounded_mean(acc.duration, acc.calls),
                answered_count: acc.answered,
            })
            .collect();
        summaries.sort_by(|a, b| {
            b.call_count
                .cmp(&a.call_count)
                .then_with(|| a.location.cmp(&b.location))
        });
        Ok(summaries)
    }

    pub fn metrics(&self, filter: &CallFilter) -> Result<DashboardMetrics, CdrError> {
        let calls = self.list_calls(filter)?;
        let total_calls = calls.len();
        let total_answered = calls.iter().filter(|c| c.was_answered).count();
        let total_duration = calls
            .iter()
            .fold(0u64, |acc, c| acc.saturating_add(c.total_duration));
        let answer_rate = if total_calls == 0 {
            0
        } else {
            (total_answered as f64 * 100.0 / total_calls as f64).round() as u32
        };
        Ok(DashboardMetrics {
            total_calls,
            total_answered,
            answer_rate,
            avg_duration: rounded_mean(total_duration, total_calls),
            missed_calls: total_calls - total_answered,
        })
    }

    pub fn locations(&self) -> Result<Vec<String>, CdrError> {
        self.store.locations()
    }

    pub fn stats(&self) -> Result<Stats, CdrError> {
        let counts = self.store.counts()?;
        Ok(Stats {
            total_legs: counts.legs,
            total_calls: counts.calls,
            total_locations: counts.locations,
        })
    }

    pub fn import_logs(&self, limit: usize) -> Result<Vec<ImportLogEntry>, CdrError> {
        self.store.import_logs(limit)
    }

    /// Render an export. Grouped mode writes one row per call, detailed mode
    /// one row per leg (newest first).
    pub fn export_csv(&self, filter: &CallFilter, mode: ExportMode) -> Result<ExportFile, CdrError> {
        let bytes = match mode {
            ExportMode::Grouped => export::grouped_csv(&self.list_calls(filter)?)?,
            ExportMode::Detailed => {
                let legs: Vec<LegRecord> = self
                    .store
                    .list_legs(&filter.leg_filter())?
                    .into_iter()
                    .filter(|leg| filter.department_matches(&leg.department))
                    .collect();
                export::detailed_csv(&legs)?
            }
        };
        let filename = mode.filename(self.clock.now());
        tracing::info!(%mode, %filename, bytes = bytes.len(), "Rendered export");
        Ok(ExportFile { filename, bytes })
    }
}

fn rounded_mean(total: u64, count: usize) -> u64 {
    if count == 0 {
        0
    } else {
        (total as f64 / count as f64).round() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_department_substring_case_insensitive() {
        let filter = CallFilter {
            department: Some("cardio".into()),
            ..Default::default()
        };
        assert!(filter.department_matches("Cardiology"));
        assert!(!filter.department_matches("General"));
        assert!(CallFilter::default().department_matches("anything"));
    }

    #[test]
    fn test_rounded_mean() {
        assert_eq!(rounded_mean(0, 0), 0);
        assert_eq!(rounded_mean(65, 2), 33);
        assert_eq!(rounded_mean(64, 2), 32);
    }

    #[test]
    fn test_empty_store_reports() {
        let store = LegStore::open_in_memory().unwrap();
        let reporter = Reporter::new(&store);
        assert!(reporter.list_calls(&CallFilter::default()).unwrap().is_empty());
        assert!(reporter.clinic_summaries(&CallFilter::default()).unwrap().is_empty());
        let metrics = reporter.metrics(&CallFilter::default()).unwrap();
        assert_eq!(metrics.total_calls, 0);
        assert_eq!(metrics.answer_rate, 0);
        assert_eq!(
            reporter.stats().unwrap(),
            Stats {
                total_legs: 0,
                total_calls: 0,
                total_locations: 0
            }
        );
        let export = reporter
            .export_csv(&CallFilter::default(), ExportMode::Grouped)
            .unwrap();
        assert!(export.filename.starts_with("call_summary_"));
        assert_eq!(String::from_utf8(export.bytes).unwrap().lines().count(), 1);
    }
}
