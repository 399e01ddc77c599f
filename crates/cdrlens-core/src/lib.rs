pub mod clock;
pub mod config;
pub mod correlate;
pub mod error;
pub mod fetch;
pub mod import;
pub mod mapping;
pub mod model;
pub mod parsing;
pub mod report;
pub mod store;

use mapping::{MapContext, SkippedLine};
use model::{Call, LegRecord};
use serde::Serialize;

/// Outcome of a dry-run parse: what an import would store and correlate.
#[derive(Debug, Clone, Serialize)]
pub struct ParseReport {
    pub rows_read: usize,
    pub records: Vec<LegRecord>,
    pub skipped: Vec<SkippedLine>,
    pub calls: Vec<Call>,
}

/// Normalize, map and correlate an export without touching storage.
///
/// Malformed lines are reported in `skipped`; they never fail the parse.
pub fn parse_export(text: &str, ctx: &MapContext) -> ParseReport {
    let batch = mapping::map_export(text, ctx);
    let calls = correlate::reconstruct(&batch.records);
    ParseReport {
        rows_read: batch.rows_read(),
        records: batch.records,
        skipped: batch.skipped,
        calls,
    }
}
