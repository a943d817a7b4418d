//! HTTP transport for talking to the check-host API

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::Client;
use url::Url;

use crate::error::Result;

/// Connect timeout applied to every request
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Overall per-request timeout
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// GET-only transport trait for abstraction and testing
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue a GET request and return the raw response body
    async fn get(&self, url: Url) -> Result<String>;
}

/// reqwest-backed transport with the timeouts the service expects
#[derive(Debug)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Create a new transport, optionally routed through an upstream proxy
    pub fn new(proxy: Option<&str>) -> Result<Self> {
        let mut builder = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ));

        if let Some(proxy) = proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: Url) -> Result<String> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        Ok(response.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_without_proxy() {
        assert!(HttpTransport::new(None).is_ok());
    }

    #[test]
    fn test_transport_with_valid_proxy() {
        assert!(HttpTransport::new(Some("http://127.0.0.1:8080")).is_ok());
    }

    #[test]
    fn test_transport_rejects_malformed_proxy() {
        let error = HttpTransport::new(Some("not a proxy")).unwrap_err();
        assert_eq!(error.category(), "TRANSPORT");
    }

    #[tokio::test]
    async fn test_get_returns_body() {
        use wiremock::matchers::{header, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/nodes/hosts"))
            .and(header("accept", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"nodes\":{}}"))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(None).unwrap();
        let url = Url::parse(&format!("{}/nodes/hosts", server.uri())).unwrap();
        let body = transport.get(url).await.unwrap();
        assert_eq!(body, "{\"nodes\":{}}");
    }

    #[tokio::test]
    async fn test_get_surfaces_connection_failure() {
        let transport = HttpTransport::new(None).unwrap();
        // Unroutable per RFC 5737, connect should fail well within the timeout
        let url = Url::parse("http://192.0.2.1:9/").unwrap();
        let error = transport.get(url).await.unwrap_err();
        assert_eq!(error.category(), "TRANSPORT");
    }
}
