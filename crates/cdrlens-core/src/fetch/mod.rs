pub mod poll;
pub mod webex;

pub use poll::{JobState, PollPolicy, ReportJob};
pub use webex::WebexReportApi;

use crate::error::CdrError;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;

/// Bearer token for the remote report service.
///
/// Never printed: `Debug` is redacted and logs carry only [`fingerprint`].
///
/// [`fingerprint`]: Credential::fingerprint
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Fails with `MissingCredential` for an empty or blank token.
    pub fn new(token: impl Into<String>) -> Result<Self, CdrError> {
        let token = token.into().trim().to_string();
        if token.is_empty() {
            return Err(CdrError::MissingCredential);
        }
        Ok(Credential(token))
    }

    pub fn token(&self) -> &str {
        &self.0
    }

    /// Stable, non-reversible reference used as an import's source reference.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0.as_bytes());
        let hex = hex::encode(digest);
        format!("bearer:{}", &hex[..12])
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential({})", self.fingerprint())
    }
}

/// Remote view of a report job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportState {
    Pending,
    Ready { download_url: String },
    Failed { reason: String },
}

/// Remote report-generation service: submit, poll, download.
pub trait ReportApi {
    /// Request a CDR report covering the last `days` days. Returns the job id.
    fn submit(&self, credential: &Credential, days: u32) -> Result<String, CdrError>;

    fn status(&self, credential: &Credential, report_id: &str) -> Result<ReportState, CdrError>;

    /// Download a finished report as text.
    fn download(&self, credential: &Credential, url: &str) -> Result<String, CdrError>;

    /// Confirm the token is accepted and may read reports.
    fn verify(&self, credential: &Credential) -> Result<TokenCheck, CdrError>;
}

/// Owner of a token that passed [`ReportApi::verify`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenCheck {
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Filled in by [`check_token`].
    pub fingerprint: String,
}

/// Validate a bearer token against the report service without starting a
/// report. A blank token fails before any request is made.
pub fn check_token(api: &dyn ReportApi, token: &str) -> Result<TokenCheck, CdrError> {
    let credential = Credential::new(token)?;
    let fingerprint = credential.fingerprint();
    match api.verify(&credential) {
        Ok(check) => {
            tracing::info!(%fingerprint, user = %check.display_name, "Token accepted");
            Ok(TokenCheck {
                fingerprint,
                ..check
            })
        }
        Err(e) => {
            tracing::warn!(%fingerprint, error = %e, "Token check failed");
            Err(e)
        }
    }
}

/// Report requests take whole days: round the lookback up, never below one.
pub fn days_for_hours(hours: u32) -> u32 {
    hours.div_ceil(24).max(1)
}
