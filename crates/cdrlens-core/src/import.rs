use crate::clock::Clock;
use crate::config::Config;
use crate::correlate::reconstruct;
use crate::error::CdrError;
use crate::fetch::{days_for_hours, Credential, PollPolicy, ReportApi, ReportJob};
use crate::mapping::{map_row, normalize_export, MapContext};
use crate::model::{ImportLogEntry, ImportStatus, ImportSummary};
use crate::parsing::decode_export;
use crate::store::LegStore;
use chrono::{DateTime, Utc};
use std::fmt;
use std::path::{Path, PathBuf};

/// Where an import run reads its export from.
#[derive(Clone, PartialEq, Eq)]
pub enum ImportSource {
    File(PathBuf),
    /// Remote report covering the last `hours_back` hours. The token is
    /// checked when the run starts so a blank one is still logged.
    Remote { token: String, hours_back: u32 },
}

impl ImportSource {
    /// Audit reference: the file path, or the credential fingerprint.
    pub fn reference(&self) -> String {
        match self {
            ImportSource::File(path) => path.display().to_string(),
            ImportSource::Remote { token, .. } => match Credential::new(token.as_str()) {
                Ok(credential) => credential.fingerprint(),
                Err(_) => "bearer:none".to_string(),
            },
        }
    }
}

impl fmt::Debug for ImportSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportSource::File(path) => f.debug_tuple("File").field(path).finish(),
            ImportSource::Remote { hours_back, .. } => f
                .debug_struct("Remote")
                .field("credential", &self.reference())
                .field("hours_back", hours_back)
                .finish(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportStage {
    Started,
    Fetching,
    Normalizing,
    Mapping,
    Persisting,
    Logged,
    Failed,
}

impl fmt::Display for ImportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImportStage::Started => "started",
            ImportStage::Fetching => "fetching",
            ImportStage::Normalizing => "normalizing",
            ImportStage::Mapping => "mapping",
            ImportStage::Persisting => "persisting",
            ImportStage::Logged => "logged",
            ImportStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Import-time settings taken from [`Config`].
#[derive(Debug, Clone)]
pub struct ImportSettings {
    pub country_code: String,
    pub archive_dir: Option<PathBuf>,
    pub poll: PollPolicy,
}

impl Default for ImportSettings {
    fn default() -> Self {
        ImportSettings::from(&Config::default())
    }
}

impl From<&Config> for ImportSettings {
    fn from(config: &Config) -> Self {
        ImportSettings {
            country_code: config.country_code.clone(),
            archive_dir: config.archive_dir.clone(),
            poll: PollPolicy {
                interval: config.remote.poll_interval(),
                max_wait: config.remote.max_wait(),
            },
        }
    }
}

/// Counters gathered as a run advances, kept for the audit entry even when
/// a later stage fails.
#[derive(Debug, Default)]
struct Progress {
    rows_read: usize,
    rows_inserted: usize,
    rows_deduplicated: usize,
    calls_produced: usize,
    skipped_lines: usize,
    archived_path: Option<PathBuf>,
}

/// Runs one import end to end and owns the audit trail.
///
/// Every run appends exactly one [`ImportLogEntry`], including runs that fail.
/// Runs are never retried here.
pub struct Importer<'a> {
    store: &'a LegStore,
    clock: &'a dyn Clock,
    api: Option<&'a dyn ReportApi>,
    settings: ImportSettings,
}

impl<'a> Importer<'a> {
    pub fn new(store: &'a LegStore, clock: &'a dyn Clock, settings: ImportSettings) -> Self {
        Importer {
            store,
            clock,
            api: None,
            settings,
        }
    }

    /// Attach the remote report client used by [`ImportSource::Remote`].
    pub fn with_api(mut self, api: &'a dyn ReportApi) -> Self {
        self.api = Some(api);
        self
    }

    pub fn run(&self, source: &ImportSource) -> Result<ImportSummary, CdrError> {
        let started = self.clock.now();
        let source_reference = source.reference();
        tracing::info!(source = %source_reference, stage = %ImportStage::Started, "Import started");

        let mut progress = Progress::default();
        let result = self.execute(source, started, &mut progress);

        let (status, error_message) = match &result {
            Ok(()) if progress.skipped_lines > 0 => (ImportStatus::Partial, None),
            Ok(()) => (ImportStatus::Success, None),
            Err(e) => (ImportStatus::Failed, Some(e.to_string())),
        };

        let entry = ImportLogEntry {
            id: 0,
            timestamp: started.to_rfc3339(),
            rows_read: progress.rows_read,
            rows_inserted: progress.rows_inserted,
            rows_deduplicated: progress.rows_deduplicated,
            calls_produced: progress.calls_produced,
            source_reference: source_reference.clone(),
            status,
            error_message,
        };
        let logged = self.store.append_log(&entry);

        match result {
            Ok(()) => {
                logged?;
                tracing::info!(
                    stage = %ImportStage::Logged,
                    %status,
                    rows_read = progress.rows_read,
                    inserted = progress.rows_inserted,
                    duplicates = progress.rows_deduplicated,
                    calls = progress.calls_produced,
                    "Import finished"
                );
                Ok(ImportSummary {
                    records_processed: progress.rows_read,
                    records_inserted: progress.rows_inserted,
                    duplicates_skipped: progress.rows_deduplicated,
                    calls_created: progress.calls_produced,
                    skipped_lines: progress.skipped_lines,
                    source_reference,
                    status,
                    archived_path: progress.archived_path,
                })
            }
            Err(e) => {
                if let Err(log_err) = logged {
                    tracing::warn!(error = %log_err, "Could not record failed import");
                }
                tracing::warn!(stage = %ImportStage::Failed, error = %e, "Import failed");
                Err(e)
            }
        }
    }

    fn execute(
        &self,
        source: &ImportSource,
        started: DateTime<Utc>,
        progress: &mut Progress,
    ) -> Result<(), CdrError> {
        tracing::info!(stage = %ImportStage::Fetching, "Reading export");
        let text = match source {
            ImportSource::File(path) => decode_export(std::fs::read(path)?),
            ImportSource::Remote { token, hours_back } => {
                let (text, archived) = self.fetch_remote(token, *hours_back)?;
                progress.archived_path = archived;
                text
            }
        };

        tracing::info!(stage = %ImportStage::Normalizing, bytes = text.len(), "Normalizing export");
        let (rows, skipped) = normalize_export(&text);
        progress.rows_read = rows.len() + skipped.len();
        progress.skipped_lines = skipped.len();

        tracing::info!(stage = %ImportStage::Mapping, rows = rows.len(), "Mapping rows");
        let ctx = MapContext::new(started, &self.settings.country_code);
        let records: Vec<_> = rows.iter().map(|row| map_row(row, &ctx)).collect();

        tracing::info!(stage = %ImportStage::Persisting, records = records.len(), "Persisting legs");
        let outcome = self.store.insert(&records)?;
        progress.rows_inserted = outcome.inserted;
        progress.rows_deduplicated = outcome.duplicates;
        progress.calls_produced = reconstruct(&records).len();
        Ok(())
    }

    fn fetch_remote(
        &self,
        token: &str,
        hours_back: u32,
    ) -> Result<(String, Option<PathBuf>), CdrError> {
        let credential = Credential::new(token)?;
        let api = self
            .api
            .ok_or_else(|| CdrError::Fetch("no report client configured".into()))?;

        let days = days_for_hours(hours_back);
        let url = ReportJob::submit(api, self.clock, &credential, days, self.settings.poll)?.wait()?;
        let text = api.download(&credential, &url)?;
        tracing::info!(bytes = text.len(), "Downloaded CDR report");

        let archived = match &self.settings.archive_dir {
            Some(dir) => Some(archive_report(dir, &text, self.clock.now())?),
            None => None,
        };
        Ok((text, archived))
    }
}

/// Save a downloaded report as `cdr_report_YYYYMMDD_HHMMSS.csv`.
fn archive_report(dir: &Path, text: &str, now: DateTime<Utc>) -> Result<PathBuf, CdrError> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("cdr_report_{}.csv", now.format("%Y%m%d_%H%M%S")));
    std::fs::write(&path, text)?;
    tracing::info!(path = %path.display(), "Archived raw report");
    Ok(path)
}
