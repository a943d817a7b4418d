//! Polling loop for check results
//!
//! Probe nodes report asynchronously; the service marks a node that has not
//! answered yet with a `null` entry and only ever transitions entries from
//! `null` to populated. The poller re-fetches the extended-result endpoint
//! until no sentinel remains or a wall-clock deadline passes, keeping the
//! last well-formed report as the best-effort answer.

use std::time::Duration;

use log::debug;
use tokio::time::{sleep, Instant};
use url::Url;

use crate::error::{CheckHostError, Result};
use crate::transport::Transport;
use crate::wire::RawReport;

/// Phases of one poll run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// Still waiting for nodes to report
    Polling,
    /// Every node entry is populated
    Ready,
    /// Deadline elapsed before all nodes reported
    TimedOut,
    /// A non-transient error aborted the loop
    Failed,
}

/// Deadline-bounded poller for one request identifier
pub struct ResultPoller<'a> {
    transport: &'a dyn Transport,
    base_url: &'a Url,
    timeout: Duration,
    interval: Duration,
}

impl<'a> ResultPoller<'a> {
    pub fn new(
        transport: &'a dyn Transport,
        base_url: &'a Url,
        timeout: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            transport,
            base_url,
            timeout,
            interval,
        }
    }

    /// Fetch the report for `request_id` until every node has answered or
    /// the deadline passes
    ///
    /// Transient failures (transport, undecodable body, service error
    /// marker) are logged and retried within the deadline. On timeout the
    /// last well-formed report is returned as long as its results
    /// collection is non-empty; entries may then still be `null`.
    pub async fn poll(&self, request_id: &str) -> Result<RawReport> {
        if request_id.is_empty() {
            return Err(CheckHostError::invalid_input("empty request id"));
        }
        let url = self
            .base_url
            .join(&format!("check-result-extended/{}", request_id))?;

        let deadline = Instant::now() + self.timeout;
        let mut state = PollState::Polling;
        let mut last: Option<RawReport> = None;
        let mut failure: Option<CheckHostError> = None;

        while state == PollState::Polling {
            match self.fetch_report(url.clone()).await {
                Ok(report) if report.is_well_formed() => {
                    if report.all_nodes_ready() {
                        state = PollState::Ready;
                    }
                    last = Some(report);
                }
                Ok(report) => {
                    debug!(
                        "poll attempt for {} returned unusable report: {:?}",
                        request_id, report.error
                    );
                }
                Err(error) if error.is_transient() => {
                    debug!("poll attempt for {} failed: {}", request_id, error);
                }
                Err(error) => {
                    failure = Some(error);
                    state = PollState::Failed;
                }
            }

            if state == PollState::Polling {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    state = PollState::TimedOut;
                } else {
                    sleep(self.interval.min(remaining)).await;
                }
            }
        }

        match state {
            PollState::Failed => Err(failure.unwrap_or(CheckHostError::NoData)),
            _ => match last {
                Some(report) if report.has_results() => Ok(report),
                _ if state == PollState::TimedOut => Err(CheckHostError::Timeout(self.timeout)),
                _ => Err(CheckHostError::NoData),
            },
        }
    }

    async fn fetch_report(&self, url: Url) -> Result<RawReport> {
        let body = self.transport.get(url).await?;
        Ok(serde_json::from_str(&body)?)
    }
}
