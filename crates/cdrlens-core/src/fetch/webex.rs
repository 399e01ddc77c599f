use super::{Credential, ReportApi, ReportState, TokenCheck};
use crate::config::RemoteConfig;
use crate::error::CdrError;
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde::Deserialize;

const CDR_TEMPLATE_ID: &str = "cdr";

/// Report client for the Webex Calling reports API.
pub struct WebexReportApi {
    client: Client,
    download_client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    #[serde(alias = "reportId")]
    id: String,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    #[serde(default)]
    status: String,
    #[serde(rename = "downloadUrl", alias = "downloadURL", default)]
    download_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PersonResponse {
    #[serde(rename = "displayName", default)]
    display_name: String,
    #[serde(default)]
    emails: Vec<String>,
}

impl WebexReportApi {
    pub fn new(config: &RemoteConfig) -> Result<Self, CdrError> {
        let build = |timeout: std::time::Duration| {
            Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| CdrError::Fetch(format!("failed to build HTTP client: {e}")))
        };
        Ok(WebexReportApi {
            client: build(config.request_timeout())?,
            download_client: build(config.download_timeout())?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn send(request: reqwest::blocking::RequestBuilder) -> Result<Response, CdrError> {
        let response = request.send().map_err(|e| CdrError::Fetch(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        Err(status_error(status, &body))
    }
}

impl ReportApi for WebexReportApi {
    fn submit(&self, credential: &Credential, days: u32) -> Result<String, CdrError> {
        let url = format!("{}/reports", self.base_url);
        let body = serde_json::json!({ "templateId": CDR_TEMPLATE_ID, "days": days });
        let response = Self::send(
            self.client
                .post(&url)
                .bearer_auth(credential.token())
                .json(&body),
        )?;
        let parsed: SubmitResponse = response
            .json()
            .map_err(|e| CdrError::Fetch(format!("unexpected submit response: {e}")))?;
        Ok(parsed.id)
    }

    fn status(&self, credential: &Credential, report_id: &str) -> Result<ReportState, CdrError> {
        let url = format!("{}/reports/{report_id}", self.base_url);
        let response = Self::send(self.client.get(&url).bearer_auth(credential.token()))?;
        let parsed: StatusResponse = response
            .json()
            .map_err(|e| CdrError::Fetch(format!("unexpected status response: {e}")))?;
        Ok(report_state(&parsed.status, parsed.download_url))
    }

    fn download(&self, credential: &Credential, url: &str) -> Result<String, CdrError> {
        let response = Self::send(self.download_client.get(url).bearer_auth(credential.token()))?;
        response.text().map_err(|e| CdrError::Fetch(e.to_string()))
    }

    fn verify(&self, credential: &Credential) -> Result<TokenCheck, CdrError> {
        let me = format!("{}/people/me", self.base_url);
        let person: PersonResponse = Self::send(self.client.get(&me).bearer_auth(credential.token()))?
            .json()
            .map_err(|e| CdrError::Fetch(format!("unexpected people/me response: {e}")))?;

        // Reading reports needs its own scope
        let reports = format!("{}/reports", self.base_url);
        Self::send(self.client.get(&reports).bearer_auth(credential.token()))?;

        Ok(TokenCheck {
            display_name: person.display_name,
            email: person.emails.into_iter().next(),
            fingerprint: String::new(),
        })
    }
}

/// Map a provider status string to a job state.
fn report_state(status: &str, download_url: Option<String>) -> ReportState {
    match status.trim().to_lowercase().as_str() {
        "done" | "complete" | "completed" => match download_url.filter(|u| !u.trim().is_empty()) {
            Some(download_url) => ReportState::Ready { download_url },
            None => ReportState::Failed {
                reason: "report completed without a download URL".into(),
            },
        },
        "failed" | "error" => ReportState::Failed {
            reason: format!("report status '{status}'"),
        },
        _ => ReportState::Pending,
    }
}

fn status_error(status: StatusCode, body: &str) -> CdrError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => CdrError::AuthenticationRejected(
            format!("HTTP {}. Check the token and its scopes", status.as_u16()),
        ),
        StatusCode::TOO_MANY_REQUESTS => CdrError::RateLimited,
        _ => {
            let snippet: String = body.chars().take(200).collect();
            CdrError::Fetch(format!("HTTP {}: {snippet}", status.as_u16()))
        }
    }
}
