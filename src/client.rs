//! The check-host client: node directory plus the submit/poll/summarize
//! pipeline

use std::time::Duration;

use log::{debug, warn};
use serde_json::{Map, Value};
use url::Url;

use crate::defaults;
use crate::error::{CheckHostError, Result};
use crate::nodes::{self, NodeFilter, NodeSet};
use crate::poller::ResultPoller;
use crate::summary::{self, CountryChecks, FullCheckReport, NodeSummary, SummarizedResult};
use crate::transport::{HttpTransport, Transport};
use crate::types::CheckType;
use crate::wire::CheckSubmission;

/// Client for the check-host.net diagnostics service
///
/// Owns the filtered probe-node directory and drives the
/// submit → poll → summarize pipeline. One instance per consumer; node
/// refresh takes `&mut self`, so sharing requires external synchronization.
pub struct CheckHost {
    transport: Box<dyn Transport>,
    base_url: Url,
    filter: NodeFilter,
    nodes: NodeSet,
    timeout: Duration,
    poll_interval: Duration,
}

/// Builder for [`CheckHost`]
pub struct CheckHostBuilder {
    base_url: String,
    filter: NodeFilter,
    proxy: Option<String>,
    timeout: Duration,
    poll_interval: Duration,
    transport: Option<Box<dyn Transport>>,
}

impl Default for CheckHostBuilder {
    fn default() -> Self {
        Self {
            base_url: defaults::BASE_URL.to_string(),
            filter: NodeFilter::all(),
            proxy: None,
            timeout: defaults::POLL_TIMEOUT,
            poll_interval: defaults::POLL_INTERVAL,
            transport: None,
        }
    }
}

impl CheckHostBuilder {
    /// Override the service base URL (mock servers, self-hosted relays)
    pub fn base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Restrict the node directory to the given filter
    pub fn filter(mut self, filter: NodeFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Route every request through an upstream proxy
    pub fn proxy<S: Into<String>>(mut self, proxy: S) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    /// Wall-clock budget for one result poll
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Delay between poll attempts
    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Substitute a custom transport; `proxy` is then ignored
    pub fn transport(mut self, transport: Box<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Construct the client without touching the network
    ///
    /// The node directory starts empty; call [`CheckHost::update_nodes`]
    /// before submitting directory-targeted checks, or use
    /// [`CheckHostBuilder::connect`].
    pub fn build(self) -> Result<CheckHost> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => Box::new(HttpTransport::new(self.proxy.as_deref())?),
        };

        Ok(CheckHost {
            transport,
            base_url: Url::parse(&self.base_url)?,
            filter: self.filter,
            nodes: NodeSet::default(),
            timeout: self.timeout,
            poll_interval: self.poll_interval,
        })
    }

    /// Construct the client and perform the initial node refresh
    pub async fn connect(self) -> Result<CheckHost> {
        let mut client = self.build()?;
        client.update_nodes().await?;
        Ok(client)
    }
}

impl CheckHost {
    pub fn builder() -> CheckHostBuilder {
        CheckHostBuilder::default()
    }

    /// The current filtered node directory
    pub fn nodes(&self) -> &NodeSet {
        &self.nodes
    }

    /// Replace the poll timeout
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Replace the delay between poll attempts
    pub fn set_poll_interval(&mut self, poll_interval: Duration) {
        self.poll_interval = poll_interval;
    }

    /// Route subsequent requests through `proxy`
    ///
    /// Rebuilds the HTTP transport; a transport injected via the builder is
    /// replaced.
    pub fn set_proxy<S: Into<String>>(&mut self, proxy: S) -> Result<()> {
        let proxy = proxy.into();
        self.transport = Box::new(HttpTransport::new(Some(proxy.as_str()))?);
        Ok(())
    }

    /// Replace the node filter and refresh the directory
    pub async fn set_country(&mut self, filter: NodeFilter) -> Result<()> {
        let fresh = nodes::fetch_nodes(self.transport.as_ref(), &self.base_url, &filter).await?;
        self.filter = filter;
        self.nodes = fresh;
        Ok(())
    }

    /// Refresh the directory with the current filter
    ///
    /// Atomic: on failure the previous node set stays in place.
    pub async fn update_nodes(&mut self) -> Result<()> {
        let fresh =
            nodes::fetch_nodes(self.transport.as_ref(), &self.base_url, &self.filter).await?;
        self.nodes = fresh;
        Ok(())
    }

    /// Raw node-to-IP listing from the service
    pub async fn node_ips(&self) -> Result<Map<String, Value>> {
        nodes::fetch_node_ips(self.transport.as_ref(), &self.base_url).await
    }

    /// Submit a check and return its opaque request identifier
    ///
    /// With `max_nodes` the service picks that many nodes at random;
    /// otherwise every node currently in the directory is named explicitly.
    pub async fn send_request(
        &self,
        host: &str,
        check_type: CheckType,
        max_nodes: Option<u32>,
    ) -> Result<String> {
        if host.is_empty() {
            return Err(CheckHostError::invalid_input("empty target host"));
        }

        let mut url = self.base_url.join(&format!("check-{}", check_type))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("host", host);
            match max_nodes {
                Some(count) => {
                    query.append_pair("max_nodes", &count.to_string());
                }
                None => {
                    for identifier in self.nodes.identifiers() {
                        query.append_pair("node", identifier);
                    }
                }
            }
        }

        let body = self.transport.get(url).await?;
        let submission: CheckSubmission = serde_json::from_str(&body)?;

        if let Some(error) = submission.error {
            return Err(CheckHostError::service(error));
        }
        submission.request_id.ok_or(CheckHostError::NoData)
    }

    /// Poll a submitted check to completion and summarize it
    pub async fn get_results(
        &self,
        request_id: &str,
        check_type: CheckType,
    ) -> Result<SummarizedResult> {
        let poller = ResultPoller::new(
            self.transport.as_ref(),
            &self.base_url,
            self.timeout,
            self.poll_interval,
        );
        let report = poller.poll(request_id).await?;

        if let Some(command) = report.command.as_deref() {
            if command != check_type.as_str() {
                debug!(
                    "service ran {} for request {} (asked to summarize {})",
                    command, request_id, check_type
                );
            }
        }

        Ok(summary::summarize(&report, check_type, &self.nodes))
    }

    /// Submit, poll and summarize one check
    pub async fn run_check(
        &self,
        host: &str,
        check_type: CheckType,
        max_nodes: Option<u32>,
    ) -> Result<SummarizedResult> {
        let request_id = self.send_request(host, check_type, max_nodes).await?;
        self.get_results(&request_id, check_type).await
    }

    /// Run ping/http/tcp/udp/dns against `host` and merge the summaries
    /// per country
    ///
    /// Checks run sequentially. A failed submission or poll drops that
    /// check type from the merge rather than failing the whole run; only
    /// five empty summaries make the full check fail.
    pub async fn full_check(&self, host: &str) -> Result<FullCheckReport> {
        let mut summaries: Vec<(CheckType, Option<SummarizedResult>)> = Vec::new();
        for check_type in CheckType::FULL_CHECK {
            let outcome = match self.run_check(host, check_type, None).await {
                Ok(summarized) => Some(summarized),
                Err(error) => {
                    warn!("{} check against {} failed: {}", check_type, host, error);
                    None
                }
            };
            summaries.push((check_type, outcome));
        }

        if summaries
            .iter()
            .all(|(_, outcome)| outcome.as_ref().map_or(true, SummarizedResult::is_empty))
        {
            return Err(CheckHostError::NoData);
        }

        let mut countries: Vec<CountryChecks> = Vec::new();
        for node in self.nodes.iter() {
            let country = &node.location.country_name;
            if countries.iter().any(|entry| &entry.country == country) {
                continue;
            }
            countries.push(CountryChecks {
                country: country.clone(),
                ping: pick(&summaries, CheckType::Ping, country),
                http: pick(&summaries, CheckType::Http, country),
                tcp: pick(&summaries, CheckType::Tcp, country),
                udp: pick(&summaries, CheckType::Udp, country),
                dns: pick(&summaries, CheckType::Dns, country),
            });
        }

        Ok(FullCheckReport {
            host: host.to_owned(),
            countries,
        })
    }
}

fn pick(
    summaries: &[(CheckType, Option<SummarizedResult>)],
    check_type: CheckType,
    country: &str,
) -> Option<Vec<NodeSummary>> {
    summaries
        .iter()
        .find(|(candidate, _)| *candidate == check_type)
        .and_then(|(_, outcome)| outcome.as_ref())
        .and_then(|summarized| summarized.country(country))
        .map(<[NodeSummary]>::to_vec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const LISTING: &str = r#"{
        "nodes": {
            "us1.node.check-host.net": {"ip": "5.253.0.1", "asn": "AS906", "location": ["us", "USA", "Los Angeles"]},
            "de1.node.check-host.net": {"ip": "5.9.22.71", "asn": "AS24940", "location": ["de", "Germany", "Nuremberg"]}
        }
    }"#;

    async fn mock_listing(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/nodes/hosts"))
            .respond_with(ResponseTemplate::new(200).set_body_string(LISTING))
            .mount(server)
            .await;
    }

    async fn client(server: &MockServer) -> CheckHost {
        CheckHost::builder()
            .base_url(format!("{}/", server.uri()))
            .timeout(Duration::from_millis(300))
            .poll_interval(Duration::from_millis(5))
            .connect()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_connect_populates_the_directory() {
        let server = MockServer::start().await;
        mock_listing(&server).await;

        let client = client(&server).await;
        assert_eq!(client.nodes().len(), 2);
        assert!(client.nodes().get("de1.node.check-host.net").is_some());
    }

    #[tokio::test]
    async fn test_set_country_refreshes_with_new_filter() {
        let server = MockServer::start().await;
        mock_listing(&server).await;

        let mut client = client(&server).await;
        client.set_country(NodeFilter::include(["us"])).await.unwrap();
        assert_eq!(client.nodes().len(), 1);
        assert!(client.nodes().get("us1.node.check-host.net").is_some());
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_nodes() {
        let server = MockServer::start().await;
        mock_listing(&server).await;

        let mut client = client(&server).await;
        let error = client.set_country(NodeFilter::include(["jp"])).await.unwrap_err();
        assert!(matches!(error, CheckHostError::NoData));
        // Old directory and filter survive the failed refresh
        assert_eq!(client.nodes().len(), 2);
    }

    #[tokio::test]
    async fn test_send_request_names_every_directory_node() {
        let server = MockServer::start().await;
        mock_listing(&server).await;

        Mock::given(method("GET"))
            .and(path("/check-ping"))
            .and(query_param("host", "example.com"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"ok": 1, "request_id": "7a4bd9c"}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server).await;
        let request_id = client
            .send_request("example.com", CheckType::Ping, None)
            .await
            .unwrap();
        assert_eq!(request_id, "7a4bd9c");

        let requests = server.received_requests().await.unwrap();
        let submit = requests
            .iter()
            .find(|request| request.url.path() == "/check-ping")
            .unwrap();
        let nodes: Vec<_> = submit
            .url
            .query_pairs()
            .filter(|(key, _)| key == "node")
            .map(|(_, value)| value.into_owned())
            .collect();
        assert_eq!(
            nodes,
            ["us1.node.check-host.net", "de1.node.check-host.net"]
        );
    }

    #[tokio::test]
    async fn test_send_request_with_max_nodes_skips_node_list() {
        let server = MockServer::start().await;
        mock_listing(&server).await;

        Mock::given(method("GET"))
            .and(path("/check-dns"))
            .and(query_param("max_nodes", "3"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"ok": 1, "request_id": "dns42"}"#),
            )
            .mount(&server)
            .await;

        let client = client(&server).await;
        let request_id = client
            .send_request("example.com", CheckType::Dns, Some(3))
            .await
            .unwrap();
        assert_eq!(request_id, "dns42");
    }

    #[tokio::test]
    async fn test_send_request_surfaces_service_error() {
        let server = MockServer::start().await;
        mock_listing(&server).await;

        Mock::given(method("GET"))
            .and(path("/check-ping"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"error": "limit_exceeded"}"#),
            )
            .mount(&server)
            .await;

        let client = client(&server).await;
        let error = client
            .send_request("example.com", CheckType::Ping, None)
            .await
            .unwrap_err();
        assert_eq!(error.category(), "SERVICE");
        assert!(error.to_string().contains("limit_exceeded"));
    }

    #[tokio::test]
    async fn test_send_request_without_request_id_is_no_data() {
        let server = MockServer::start().await;
        mock_listing(&server).await;

        Mock::given(method("GET"))
            .and(path("/check-ping"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"ok": 1}"#))
            .mount(&server)
            .await;

        let client = client(&server).await;
        let error = client
            .send_request("example.com", CheckType::Ping, None)
            .await
            .unwrap_err();
        assert!(matches!(error, CheckHostError::NoData));
    }

    #[tokio::test]
    async fn test_send_request_rejects_empty_host() {
        let server = MockServer::start().await;
        mock_listing(&server).await;

        let client = client(&server).await;
        let error = client
            .send_request("", CheckType::Ping, None)
            .await
            .unwrap_err();
        assert_eq!(error.category(), "INPUT");
    }

    #[tokio::test]
    async fn test_node_ips_returns_raw_listing() {
        let server = MockServer::start().await;
        mock_listing(&server).await;
        Mock::given(method("GET"))
            .and(path("/nodes/ips"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"nodes": {"us1.node.check-host.net": "5.253.0.1"}}"#),
            )
            .mount(&server)
            .await;

        let client = client(&server).await;
        let ips = client.node_ips().await.unwrap();
        assert_eq!(ips["us1.node.check-host.net"], "5.253.0.1");
    }
}
