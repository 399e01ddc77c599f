use cdrlens_core::clock::SystemClock;
use cdrlens_core::error::CdrError;
use cdrlens_core::fetch::{check_token, WebexReportApi};
use cdrlens_core::import::{ImportSettings, ImportSource, Importer};
use cdrlens_core::model::ImportSummary;
use std::path::PathBuf;

use super::Context;

pub fn run_file(ctx: &Context, input_file: PathBuf) -> Result<(), CdrError> {
    let store = ctx.open_store()?;
    let summary = Importer::new(&store, &SystemClock, ImportSettings::from(&ctx.config))
        .run(&ImportSource::File(input_file))?;
    print_summary(&summary);
    Ok(())
}

pub fn run_fetch(
    ctx: &Context,
    token: String,
    hours: u32,
    archive_dir: Option<PathBuf>,
) -> Result<(), CdrError> {
    let store = ctx.open_store()?;
    let api = WebexReportApi::new(&ctx.config.remote)?;

    let mut settings = ImportSettings::from(&ctx.config);
    if archive_dir.is_some() {
        settings.archive_dir = archive_dir;
    }

    let summary = Importer::new(&store, &SystemClock, settings)
        .with_api(&api)
        .run(&ImportSource::Remote {
            token,
            hours_back: hours,
        })?;
    print_summary(&summary);
    Ok(())
}

pub fn run_check_token(ctx: &Context, token: &str, output_format: &str) -> Result<(), CdrError> {
    let api = WebexReportApi::new(&ctx.config.remote)?;
    let check = check_token(&api, token)?;
    match output_format {
        "json" => crate::output::json::print(&check)?,
        _ => {
            println!("Token accepted ({})", check.fingerprint);
            match check.email {
                Some(ref email) => println!("  User: {} <{email}>", check.display_name),
                None => println!("  User: {}", check.display_name),
            }
            println!("  Report access: ok");
        }
    }
    Ok(())
}

fn print_summary(summary: &ImportSummary) {
    println!("Import {} ({})", summary.status, summary.source_reference);
    println!("  Records processed:  {}", summary.records_processed);
    println!("  Records inserted:   {}", summary.records_inserted);
    println!("  Duplicates skipped: {}", summary.duplicates_skipped);
    println!("  Calls created:      {}", summary.calls_created);
    if summary.skipped_lines > 0 {
        println!("  Malformed lines:    {}", summary.skipped_lines);
    }
    if let Some(ref path) = summary.archived_path {
        println!("  Raw report saved:   {}", path.display());
    }
}
