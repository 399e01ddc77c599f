use cdrlens_core::error::CdrError;
use cdrlens_core::report::Reporter;
use cdrlens_core::store::LegFilter;

use super::Context;
use crate::output;
use crate::RangeArgs;

pub fn legs(
    ctx: &Context,
    range: &RangeArgs,
    phone: Option<String>,
    limit: usize,
    offset: usize,
    output_format: &str,
) -> Result<(), CdrError> {
    let store = ctx.open_store()?;
    let filter = LegFilter {
        start_date: range.from,
        end_date: range.to,
        location: range.location.clone(),
        phone_number: phone,
        limit: Some(limit),
        offset,
    };
    let legs = Reporter::new(&store).list_legs(&filter)?;

    match output_format {
        "json" => output::json::print(&legs)?,
        _ => output::table::print_legs(&legs),
    }
    Ok(())
}

pub fn calls(
    ctx: &Context,
    range: &RangeArgs,
    department: Option<String>,
    output_format: &str,
) -> Result<(), CdrError> {
    let store = ctx.open_store()?;
    let calls = Reporter::new(&store).list_calls(&range.call_filter(department))?;

    match output_format {
        "json" => output::json::print(&calls)?,
        _ => output::table::print_calls(&calls),
    }
    Ok(())
}

pub fn clinics(ctx: &Context, range: &RangeArgs, output_format: &str) -> Result<(), CdrError> {
    let store = ctx.open_store()?;
    let summaries = Reporter::new(&store).clinic_summaries(&range.call_filter(None))?;

    match output_format {
        "json" => output::json::print(&summaries)?,
        _ => output::table::print_clinics(&summaries),
    }
    Ok(())
}

pub fn metrics(ctx: &Context, range: &RangeArgs, output_format: &str) -> Result<(), CdrError> {
    let store = ctx.open_store()?;
    let metrics = Reporter::new(&store).metrics(&range.call_filter(None))?;

    match output_format {
        "json" => output::json::print(&metrics)?,
        _ => output::table::print_metrics(&metrics),
    }
    Ok(())
}

pub fn locations(ctx: &Context, output_format: &str) -> Result<(), CdrError> {
    let store = ctx.open_store()?;
    let locations = Reporter::new(&store).locations()?;

    match output_format {
        "json" => output::json::print(&locations)?,
        _ => {
            for location in &locations {
                println!("{location}");
            }
        }
    }
    Ok(())
}

pub fn stats(ctx: &Context, output_format: &str) -> Result<(), CdrError> {
    let store = ctx.open_store()?;
    let stats = Reporter::new(&store).stats()?;

    match output_format {
        "json" => output::json::print(&stats)?,
        _ => {
            println!("Legs:      {}", stats.total_legs);
            println!("Calls:     {}", stats.total_calls);
            println!("Locations: {}", stats.total_locations);
        }
    }
    Ok(())
}

pub fn logs(ctx: &Context, limit: usize, output_format: &str) -> Result<(), CdrError> {
    let store = ctx.open_store()?;
    let entries = Reporter::new(&store).import_logs(limit)?;

    match output_format {
        "json" => output::json::print(&entries)?,
        _ => output::table::print_import_logs(&entries),
    }
    Ok(())
}
