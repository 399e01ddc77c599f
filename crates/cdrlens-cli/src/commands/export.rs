use cdrlens_core::error::CdrError;
use cdrlens_core::report::{ExportMode, Reporter};
use std::path::Path;

use super::Context;
use crate::RangeArgs;

pub fn run(
    ctx: &Context,
    mode: ExportMode,
    range: &RangeArgs,
    department: Option<String>,
    dir: &Path,
) -> Result<(), CdrError> {
    let store = ctx.open_store()?;
    let export = Reporter::new(&store).export_csv(&range.call_filter(department), mode)?;

    std::fs::create_dir_all(dir)?;
    let path = dir.join(&export.filename);
    std::fs::write(&path, &export.bytes)?;
    println!("{}", path.display());
    Ok(())
}
