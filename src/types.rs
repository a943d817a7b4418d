//! Type definitions shared across the client

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// Re-export commonly used types
pub use crate::error::{CheckHostError, Result};

/// Check types supported by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckType {
    Ping,
    Http,
    Tcp,
    Udp,
    Dns,
    Traceroute,
}

impl CheckType {
    /// Every check type the service understands
    pub const ALL: [CheckType; 6] = [
        CheckType::Ping,
        CheckType::Http,
        CheckType::Tcp,
        CheckType::Udp,
        CheckType::Dns,
        CheckType::Traceroute,
    ];

    /// The five types exercised by a full check; traceroute is submit-only
    pub const FULL_CHECK: [CheckType; 5] = [
        CheckType::Ping,
        CheckType::Http,
        CheckType::Tcp,
        CheckType::Udp,
        CheckType::Dns,
    ];

    /// Lowercase name as it appears in endpoint paths and payloads
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckType::Ping => "ping",
            CheckType::Http => "http",
            CheckType::Tcp => "tcp",
            CheckType::Udp => "udp",
            CheckType::Dns => "dns",
            CheckType::Traceroute => "traceroute",
        }
    }
}

impl fmt::Display for CheckType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckType {
    type Err = CheckHostError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "ping" => Ok(CheckType::Ping),
            "http" => Ok(CheckType::Http),
            "tcp" => Ok(CheckType::Tcp),
            "udp" => Ok(CheckType::Udp),
            "dns" => Ok(CheckType::Dns),
            "traceroute" => Ok(CheckType::Traceroute),
            _ => Err(CheckHostError::invalid_input(format!(
                "unknown check type: {}",
                s
            ))),
        }
    }
}
