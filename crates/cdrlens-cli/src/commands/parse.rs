use cdrlens_core::error::CdrError;
use cdrlens_core::mapping::MapContext;
use cdrlens_core::parsing::decode_export;
use chrono::Utc;
use std::path::Path;

use super::Context;
use crate::output;

pub fn run(ctx: &Context, input_file: &Path, output_format: &str) -> Result<(), CdrError> {
    let text = decode_export(std::fs::read(input_file)?);
    let map_ctx = MapContext::new(Utc::now(), &ctx.config.country_code);
    let report = cdrlens_core::parse_export(&text, &map_ctx);

    match output_format {
        "json" => output::json::print(&report)?,
        _ => {
            output::table::print_calls(&report.calls);
            println!();
            println!(
                "{} row(s) read, {} leg(s) mapped, {} call(s)",
                report.rows_read,
                report.records.len(),
                report.calls.len()
            );
            if !report.skipped.is_empty() {
                eprintln!("  {} line(s) skipped during parsing", report.skipped.len());
                for skipped in &report.skipped {
                    eprintln!("    line {}: {}", skipped.line, skipped.reason);
                }
            }
        }
    }

    Ok(())
}
