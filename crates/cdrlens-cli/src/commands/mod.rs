pub mod export;
pub mod import;
pub mod parse;
pub mod query;

use cdrlens_core::config::{load_config, Config};
use cdrlens_core::error::CdrError;
use cdrlens_core::report::CallFilter;
use cdrlens_core::store::LegStore;
use std::path::{Path, PathBuf};

use crate::RangeArgs;

/// Settings resolved from the config file and global flags.
pub struct Context {
    pub config: Config,
}

impl Context {
    /// Flags win over the config file; a missing `--config` means defaults.
    pub fn load(config_path: Option<&Path>, db: Option<PathBuf>) -> Result<Self, CdrError> {
        let mut config = match config_path {
            Some(path) => load_config(path)?,
            None => Config::default(),
        };
        if let Some(db) = db {
            config.database_path = db;
        }
        tracing::debug!(db = %config.database_path.display(), "Resolved configuration");
        Ok(Context { config })
    }

    pub fn open_store(&self) -> Result<LegStore, CdrError> {
        LegStore::open(&self.config.database_path)
    }
}

impl RangeArgs {
    pub fn call_filter(&self, department: Option<String>) -> CallFilter {
        CallFilter {
            start_date: self.from,
            end_date: self.to,
            location: self.location.clone(),
            department,
        }
    }
}
