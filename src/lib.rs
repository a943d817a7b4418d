//! check-host client
//!
//! Client library for the check-host.net distributed network diagnostics
//! service. The service operates probe nodes around the world that run
//! ping/http/tcp/udp/dns/traceroute checks against a target host; this
//! crate discovers and filters those nodes, submits checks, polls for
//! results with a wall-clock deadline, and reshapes the raw payloads into
//! per-country summaries with derived ping and http statistics.
//!
//! ```no_run
//! use checkhost::{CheckHost, CheckType, NodeFilter};
//!
//! # async fn demo() -> checkhost::Result<()> {
//! let client = CheckHost::builder()
//!     .filter(NodeFilter::include(["us", "de"]))
//!     .connect()
//!     .await?;
//!
//! let summary = client.run_check("example.com", CheckType::Ping, None).await?;
//! for group in &summary.results {
//!     println!("{}: {} node(s)", group.country, group.nodes.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod nodes;
pub mod poller;
pub mod summary;
pub mod transport;
pub mod types;
pub mod wire;

// Re-export commonly used types
pub use client::{CheckHost, CheckHostBuilder};
pub use error::{CheckHostError, Result};
pub use nodes::{Node, NodeFilter, NodeLocation, NodeSet};
pub use poller::{PollState, ResultPoller};
pub use summary::{
    CheckSummary, CountryChecks, CountryResults, FullCheckReport, HttpSummary, NodeSummary,
    PingSummary, SummarizedResult,
};
pub use transport::{HttpTransport, Transport};
pub use types::CheckType;

/// Crate version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    /// Public API base of the hosted service
    pub const BASE_URL: &str = "https://check-host.net/";

    /// Wall-clock budget for one result poll
    pub const POLL_TIMEOUT: Duration = Duration::from_secs(60);

    /// Delay between poll attempts
    pub const POLL_INTERVAL: Duration = Duration::from_millis(500);
}
