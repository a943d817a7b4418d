//! Wire-format payloads returned by the service
//!
//! The API reports check results as positional JSON arrays. Everything here
//! decodes those into named fields so no business logic ever indexes a raw
//! array by position.

use serde::Deserialize;
use serde_json::{Map, Value};

/// Reply to a check submission
#[derive(Debug, Clone, Deserialize)]
pub struct CheckSubmission {
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub permanent_link: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Raw extended check report, as fetched while polling
///
/// `results` maps node identifiers to raw per-node payloads; `null` marks a
/// node that has not reported yet.
#[derive(Debug, Clone, Deserialize)]
pub struct RawReport {
    #[serde(default)]
    pub host: Option<String>,
    /// Service-reported submission time, unix seconds
    #[serde(default)]
    pub created: Option<i64>,
    /// Check type the service ran, e.g. "ping"
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub results: Option<Map<String, Value>>,
    #[serde(default)]
    pub error: Option<Value>,
}

impl RawReport {
    /// A report is usable once it carries a results map and no error marker
    pub fn is_well_formed(&self) -> bool {
        self.error.is_none() && self.results.is_some()
    }

    /// True when no per-node entry is still the null sentinel
    pub fn all_nodes_ready(&self) -> bool {
        self.results
            .as_ref()
            .map(|results| results.values().all(|value| !value.is_null()))
            .unwrap_or(false)
    }

    /// True when the results collection exists and is non-empty
    pub fn has_results(&self) -> bool {
        self.results
            .as_ref()
            .map(|results| !results.is_empty())
            .unwrap_or(false)
    }
}

/// One attempt from a ping check, decoded from `[status, latency, ip]`
#[derive(Debug, Clone, PartialEq)]
pub enum PingAttempt {
    /// Probe answered; latency in seconds plus the answering address
    Ok { latency_s: f64, ip: Option<String> },
    /// Probe reported a non-OK outcome ("TIMEOUT", "MALFORMED", ...),
    /// or an "OK" entry that lost its latency field
    Failed { status: String, ip: Option<String> },
    /// Entry carried no usable data
    Empty,
}

impl PingAttempt {
    pub fn parse(value: &Value) -> Self {
        let Some(fields) = value.as_array() else {
            return Self::Empty;
        };

        let status = fields.first().and_then(Value::as_str);
        let latency = fields.get(1).and_then(Value::as_f64);
        let ip = fields.get(2).and_then(Value::as_str).map(str::to_owned);

        match (status, latency) {
            (Some("OK"), Some(latency_s)) => Self::Ok { latency_s, ip },
            (Some(status), _) => Self::Failed {
                status: status.to_owned(),
                ip,
            },
            (None, _) => Self::Empty,
        }
    }

    /// Address reported by the attempt, if any
    pub fn ip(&self) -> Option<&str> {
        match self {
            Self::Ok { ip, .. } | Self::Failed { ip, .. } => ip.as_deref(),
            Self::Empty => None,
        }
    }
}

/// Reply from an http check, decoded from
/// `[ok, time, status_message, status_code, ip]`
#[derive(Debug, Clone, PartialEq)]
pub struct HttpReply {
    pub success: bool,
    pub time_s: Option<f64>,
    pub status_message: Option<String>,
    pub status_code: Option<String>,
    pub ip: Option<String>,
}

impl HttpReply {
    /// Returns `None` when the node has not produced a reply yet
    pub fn parse(value: &Value) -> Option<Self> {
        let fields = value.as_array()?;
        if fields.is_empty() {
            return None;
        }

        Some(Self {
            success: truthy(fields.first()),
            time_s: fields.get(1).and_then(Value::as_f64),
            status_message: fields.get(2).and_then(Value::as_str).map(str::to_owned),
            status_code: field_as_string(fields.get(3)),
            ip: fields.get(4).and_then(Value::as_str).map(str::to_owned),
        })
    }
}

/// First entry of a node's raw result list
///
/// The service wraps every per-node payload in a single-element outer array.
pub fn first_result(node_value: &Value) -> Option<&Value> {
    node_value.as_array().and_then(|entries| entries.first())
}

/// Whether a raw value carries any data at all
pub fn is_nonempty(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|v| v != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Array(entries) => !entries.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn truthy(value: Option<&Value>) -> bool {
    value.map(is_nonempty).unwrap_or(false)
}

/// Number-or-string field rendered as a string
fn field_as_string(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ping_attempt_ok() {
        let attempt = PingAttempt::parse(&json!(["OK", 0.021, "93.184.216.34"]));
        assert_eq!(
            attempt,
            PingAttempt::Ok {
                latency_s: 0.021,
                ip: Some("93.184.216.34".to_string()),
            }
        );
    }

    #[test]
    fn test_ping_attempt_failed() {
        let attempt = PingAttempt::parse(&json!(["TIMEOUT", 3.0]));
        assert_eq!(
            attempt,
            PingAttempt::Failed {
                status: "TIMEOUT".to_string(),
                ip: None,
            }
        );
    }

    #[test]
    fn test_ping_attempt_ok_without_latency_counts_as_failed() {
        let attempt = PingAttempt::parse(&json!(["OK"]));
        assert_eq!(
            attempt,
            PingAttempt::Failed {
                status: "OK".to_string(),
                ip: None,
            }
        );
    }

    #[test]
    fn test_ping_attempt_empty() {
        assert_eq!(PingAttempt::parse(&json!([])), PingAttempt::Empty);
        assert_eq!(PingAttempt::parse(&json!(null)), PingAttempt::Empty);
        assert_eq!(PingAttempt::parse(&json!("garbage")), PingAttempt::Empty);
    }

    #[test]
    fn test_http_reply_full() {
        let reply = HttpReply::parse(&json!([1, 0.134, "OK", "200", "93.184.216.34"])).unwrap();
        assert!(reply.success);
        assert_eq!(reply.time_s, Some(0.134));
        assert_eq!(reply.status_message.as_deref(), Some("OK"));
        assert_eq!(reply.status_code.as_deref(), Some("200"));
        assert_eq!(reply.ip.as_deref(), Some("93.184.216.34"));
    }

    #[test]
    fn test_http_reply_numeric_status_code() {
        let reply = HttpReply::parse(&json!([1, 0.2, "OK", 200, "1.2.3.4"])).unwrap();
        assert_eq!(reply.status_code.as_deref(), Some("200"));
    }

    #[test]
    fn test_http_reply_absent() {
        assert!(HttpReply::parse(&json!(null)).is_none());
        assert!(HttpReply::parse(&json!([])).is_none());
    }

    #[test]
    fn test_http_reply_failure_flag() {
        let reply = HttpReply::parse(&json!([0, 0.0, "Connection timed out"])).unwrap();
        assert!(!reply.success);
        assert_eq!(reply.status_code, None);
        assert_eq!(reply.ip, None);
    }

    #[test]
    fn test_raw_report_readiness() {
        let report: RawReport = serde_json::from_value(json!({
            "host": "example.com",
            "results": {"us1": null, "de1": [[["OK", 0.01]]]}
        }))
        .unwrap();
        assert!(report.is_well_formed());
        assert!(report.has_results());
        assert!(!report.all_nodes_ready());

        let ready: RawReport = serde_json::from_value(json!({
            "results": {"us1": [[["OK", 0.01]]]}
        }))
        .unwrap();
        assert!(ready.all_nodes_ready());
    }

    #[test]
    fn test_raw_report_error_marker() {
        let report: RawReport =
            serde_json::from_value(json!({"error": "invalid request id"})).unwrap();
        assert!(!report.is_well_formed());
        assert!(!report.has_results());
        assert!(!report.all_nodes_ready());
    }

    #[test]
    fn test_submission_decodes_request_id() {
        let submission: CheckSubmission = serde_json::from_value(json!({
            "ok": 1,
            "request_id": "7a4bd9c",
            "permanent_link": "https://check-host.net/check-report/7a4bd9c"
        }))
        .unwrap();
        assert_eq!(submission.request_id.as_deref(), Some("7a4bd9c"));
        assert!(submission.error.is_none());
    }

    #[test]
    fn test_first_result_unwraps_outer_array() {
        let value = json!([["inner"]]);
        assert_eq!(first_result(&value), Some(&json!(["inner"])));
        assert_eq!(first_result(&json!(null)), None);
        assert_eq!(first_result(&json!([])), None);
    }

    #[test]
    fn test_is_nonempty() {
        assert!(is_nonempty(&json!(["x"])));
        assert!(is_nonempty(&json!(1)));
        assert!(!is_nonempty(&json!(null)));
        assert!(!is_nonempty(&json!([])));
        assert!(!is_nonempty(&json!(0)));
        assert!(!is_nonempty(&json!("")));
    }
}
