//! Shaping raw check reports into per-country summaries
//!
//! This is the consumer-facing half of the pipeline: raw per-node payloads
//! come in keyed by node identifier, summaries go out grouped by country
//! name in first-encounter order, with derived statistics for ping and
//! http checks.

use chrono::{DateTime, Utc};
use log::warn;
use serde::Serialize;
use serde_json::Value;

use crate::nodes::{Node, NodeSet};
use crate::types::CheckType;
use crate::wire::{self, HttpReply, PingAttempt, RawReport};

/// Latency charged for a failed ping attempt, in milliseconds
const PENALTY_MS: i64 = 1000;

/// Sentinel for a statistic that could not be computed
const UNAVAILABLE: i64 = -1;

/// Ping statistics for one node, in milliseconds
///
/// The four numeric fields are `None` when the node produced no attempts at
/// all, and -1 when attempts exist but the statistic is unavailable (all
/// attempts failed, or fewer than two samples for jitter).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PingSummary {
    pub ip: Option<String>,
    /// Counter string `"ok/total"`, e.g. `"4/4"`
    pub ping: String,
    pub average_ms: Option<i64>,
    pub min_ms: Option<i64>,
    pub max_ms: Option<i64>,
    pub jitter_ms: Option<i64>,
}

/// Http latency and status for one node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HttpSummary {
    pub ip: Option<String>,
    pub ok: Option<bool>,
    /// Response time rounded to 2 decimals; -1.0 when the reply exists but
    /// is incomplete, `None` when the node produced no reply
    pub time_s: Option<f64>,
    pub status_message: Option<String>,
    pub status_code: Option<String>,
}

/// Type-specific portion of a node summary
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CheckSummary {
    Ping(PingSummary),
    Http(HttpSummary),
}

/// Summary for a single probe node
#[derive(Debug, Clone, Serialize)]
pub struct NodeSummary {
    /// Whether the node produced any data worth displaying
    pub show: bool,
    pub node_info: Node,
    /// Present for ping and http checks only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_summary: Option<CheckSummary>,
    /// Raw first result entry, untouched
    pub result: Value,
}

/// Per-country node summaries, in first-encounter order
#[derive(Debug, Clone, Serialize)]
pub struct CountryResults {
    pub country: String,
    pub nodes: Vec<NodeSummary>,
}

/// Fully summarized check report
#[derive(Debug, Clone, Serialize)]
pub struct SummarizedResult {
    pub host: Option<String>,
    /// Summarization wall-clock
    pub time: DateTime<Utc>,
    /// Service-reported submission time
    pub create_time: Option<DateTime<Utc>>,
    #[serde(rename = "type")]
    pub check_type: CheckType,
    pub results: Vec<CountryResults>,
}

impl SummarizedResult {
    /// Summaries for one country, by name
    pub fn country(&self, name: &str) -> Option<&[NodeSummary]> {
        self.results
            .iter()
            .find(|group| group.country == name)
            .map(|group| group.nodes.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Merged output of a full check, one entry per directory country
#[derive(Debug, Clone, Serialize)]
pub struct CountryChecks {
    pub country: String,
    pub ping: Option<Vec<NodeSummary>>,
    pub http: Option<Vec<NodeSummary>>,
    pub tcp: Option<Vec<NodeSummary>>,
    pub udp: Option<Vec<NodeSummary>>,
    pub dns: Option<Vec<NodeSummary>>,
}

impl CountryChecks {
    /// Summaries for one of the five full-check types; traceroute is not
    /// part of a full check and always yields `None`
    pub fn check(&self, check_type: CheckType) -> Option<&[NodeSummary]> {
        match check_type {
            CheckType::Ping => self.ping.as_deref(),
            CheckType::Http => self.http.as_deref(),
            CheckType::Tcp => self.tcp.as_deref(),
            CheckType::Udp => self.udp.as_deref(),
            CheckType::Dns => self.dns.as_deref(),
            CheckType::Traceroute => None,
        }
    }
}

/// Result of running every full-check type against one host
#[derive(Debug, Clone, Serialize)]
pub struct FullCheckReport {
    pub host: String,
    pub countries: Vec<CountryChecks>,
}

impl FullCheckReport {
    pub fn country(&self, name: &str) -> Option<&CountryChecks> {
        self.countries.iter().find(|entry| entry.country == name)
    }
}

/// Transform a raw report into per-country summaries
///
/// Entries for node identifiers missing from `nodes` are skipped with a
/// warning rather than failing the whole summarization.
pub fn summarize(report: &RawReport, check_type: CheckType, nodes: &NodeSet) -> SummarizedResult {
    let mut results: Vec<CountryResults> = Vec::new();

    if let Some(raw) = report.results.as_ref() {
        for (identifier, value) in raw {
            let Some(node) = nodes.get(identifier) else {
                warn!("result for unknown node {}, skipping", identifier);
                continue;
            };

            let first = wire::first_result(value);
            let result_summary = match check_type {
                CheckType::Ping => Some(CheckSummary::Ping(ping_summary(first))),
                CheckType::Http => Some(CheckSummary::Http(http_summary(first))),
                _ => None,
            };

            let entry = NodeSummary {
                show: first.map(wire::is_nonempty).unwrap_or(false),
                node_info: node.clone(),
                result_summary,
                result: first.cloned().unwrap_or(Value::Null),
            };
            push_grouped(&mut results, &node.location.country_name, entry);
        }
    }

    SummarizedResult {
        host: report.host.clone(),
        time: Utc::now(),
        create_time: report
            .created
            .and_then(|secs| DateTime::from_timestamp(secs, 0)),
        check_type,
        results,
    }
}

fn push_grouped(groups: &mut Vec<CountryResults>, country: &str, entry: NodeSummary) {
    match groups.iter_mut().find(|group| group.country == country) {
        Some(group) => group.nodes.push(entry),
        None => groups.push(CountryResults {
            country: country.to_owned(),
            nodes: vec![entry],
        }),
    }
}

/// Derive ping statistics from a node's first result entry
///
/// OK attempts contribute their latency in rounded milliseconds; failed
/// attempts contribute a fixed penalty sample. `max` is only reported when
/// every attempt succeeded.
fn ping_summary(first: Option<&Value>) -> PingSummary {
    let attempts: Vec<PingAttempt> = first
        .and_then(Value::as_array)
        .map(|entries| entries.iter().map(PingAttempt::parse).collect())
        .unwrap_or_default();

    let mut pings: Vec<i64> = Vec::new();
    let mut ok = 0usize;
    let mut failed = 0usize;
    for attempt in &attempts {
        match attempt {
            PingAttempt::Ok { latency_s, .. } => {
                pings.push((latency_s * 1000.0).round() as i64);
                ok += 1;
            }
            PingAttempt::Failed { .. } => {
                pings.push(PENALTY_MS);
                failed += 1;
            }
            PingAttempt::Empty => {}
        }
    }
    let total = attempts.len();

    let (average_ms, min_ms, max_ms, jitter_ms) = if total == 0 {
        (None, None, None, None)
    } else if failed == total {
        (
            Some(UNAVAILABLE),
            Some(UNAVAILABLE),
            Some(UNAVAILABLE),
            Some(UNAVAILABLE),
        )
    } else {
        let average = rounded_mean(&pings).unwrap_or(UNAVAILABLE);
        let min = pings.iter().min().copied().unwrap_or(UNAVAILABLE);
        let max = if failed == 0 {
            pings.iter().max().copied().unwrap_or(UNAVAILABLE)
        } else {
            UNAVAILABLE
        };
        let diffs: Vec<i64> = pings.windows(2).map(|pair| (pair[1] - pair[0]).abs()).collect();
        let jitter = rounded_mean(&diffs).unwrap_or(UNAVAILABLE);
        (Some(average), Some(min), Some(max), Some(jitter))
    };

    PingSummary {
        ip: attempts.first().and_then(PingAttempt::ip).map(str::to_owned),
        ping: format!("{}/{}", ok, total),
        average_ms,
        min_ms,
        max_ms,
        jitter_ms,
    }
}

fn rounded_mean(samples: &[i64]) -> Option<i64> {
    if samples.is_empty() {
        return None;
    }
    let sum: i64 = samples.iter().sum();
    Some((sum as f64 / samples.len() as f64).round() as i64)
}

/// Derive http latency and status from a node's first result entry
fn http_summary(first: Option<&Value>) -> HttpSummary {
    let Some(reply) = first.and_then(HttpReply::parse) else {
        return HttpSummary {
            ip: None,
            ok: None,
            time_s: None,
            status_message: None,
            status_code: None,
        };
    };

    let has_ip = reply.ip.as_deref().is_some_and(|ip| !ip.is_empty());
    let has_status = reply
        .status_code
        .as_deref()
        .is_some_and(|code| !code.is_empty() && code != "0");
    let time_s = if has_ip && has_status {
        reply
            .time_s
            .filter(|time| *time != 0.0)
            .map(|time| (time * 100.0).round() / 100.0)
    } else {
        Some(-1.0)
    };

    HttpSummary {
        ip: reply.ip,
        ok: Some(reply.success),
        time_s,
        status_message: reply.status_message,
        status_code: reply.status_code,
    }
}
