use cdrlens_core::error::CdrError;
use serde::Serialize;

pub fn print<T: Serialize + ?Sized>(value: &T) -> Result<(), CdrError> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}
