use super::{Credential, ReportApi, ReportState};
use crate::clock::Clock;
use crate::error::CdrError;
use chrono::{DateTime, Utc};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_wait: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        PollPolicy {
            interval: Duration::from_secs(5),
            max_wait: Duration::from_secs(300),
        }
    }
}

/// Lifecycle of one remote report job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Submitted { report_id: String },
    Polling { report_id: String, attempts: u32 },
    Ready { download_url: String },
    Failed { reason: String },
    TimedOut { waited_secs: u64 },
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Ready { .. } | JobState::Failed { .. } | JobState::TimedOut { .. }
        )
    }
}

/// Drives a submitted report to a terminal state.
///
/// Each [`step`](ReportJob::step) performs at most one status request. Waiting
/// goes through the [`Clock`], so tests advance time without sleeping.
pub struct ReportJob<'a> {
    api: &'a dyn ReportApi,
    clock: &'a dyn Clock,
    credential: &'a Credential,
    policy: PollPolicy,
    started: DateTime<Utc>,
    state: JobState,
}

impl<'a> ReportJob<'a> {
    pub fn submit(
        api: &'a dyn ReportApi,
        clock: &'a dyn Clock,
        credential: &'a Credential,
        days: u32,
        policy: PollPolicy,
    ) -> Result<Self, CdrError> {
        let report_id = api.submit(credential, days)?;
        tracing::info!(%report_id, days, "Submitted CDR report request");
        Ok(ReportJob {
            api,
            clock,
            credential,
            policy,
            started: clock.now(),
            state: JobState::Submitted { report_id },
        })
    }

    pub fn state(&self) -> &JobState {
        &self.state
    }

    fn waited(&self) -> Duration {
        (self.clock.now() - self.started)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// Advance one transition. Terminal states are left unchanged.
    pub fn step(&mut self) -> Result<&JobState, CdrError> {
        let next = match &self.state {
            JobState::Submitted { report_id } => self.check(report_id, 1)?,
            JobState::Polling {
                report_id,
                attempts,
            } => {
                let waited = self.waited();
                if waited >= self.policy.max_wait {
                    JobState::TimedOut {
                        waited_secs: waited.as_secs(),
                    }
                } else {
                    self.clock.sleep(self.policy.interval);
                    self.check(report_id, attempts + 1)?
                }
            }
            terminal => terminal.clone(),
        };
        self.state = next;
        Ok(&self.state)
    }

    fn check(&self, report_id: &str, attempts: u32) -> Result<JobState, CdrError> {
        let state = self.api.status(self.credential, report_id)?;
        tracing::debug!(report_id, attempts, ?state, "Polled report status");
        Ok(match state {
            ReportState::Pending => JobState::Polling {
                report_id: report_id.to_string(),
                attempts,
            },
            ReportState::Ready { download_url } => JobState::Ready { download_url },
            ReportState::Failed { reason } => JobState::Failed { reason },
        })
    }

    /// Step until terminal and return the download URL.
    pub fn wait(mut self) -> Result<String, CdrError> {
        loop {
            match self.step()? {
                JobState::Ready { download_url } => return Ok(download_url.clone()),
                JobState::Failed { reason } => return Err(CdrError::ReportFailed(reason.clone())),
                JobState::TimedOut { waited_secs } => {
                    tracing::warn!(waited_secs, "Report generation timed out");
                    return Err(CdrError::ReportTimeout {
                        waited_secs: *waited_secs,
                    });
                }
                JobState::Submitted { .. } | JobState::Polling { .. } => {}
            }
        }
    }
}
