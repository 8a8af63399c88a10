//! HTTP fetch seam.
//!
//! The acquirer only needs "GET this URL within this time"; the [`Fetcher`]
//! trait keeps it independent of the HTTP stack so tests can script responses.

use std::time::Duration;

use async_trait::async_trait;

use crate::types::SourceError;

/// User agent sent to every provider.
pub const USER_AGENT: &str = "QuantumCoinFlip/1.0";

/// Raw response from a GET request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    /// HTTP status code.
    pub status: u16,
    /// `Retry-After` header in seconds, when present and numeric.
    pub retry_after: Option<u64>,
    /// Response body as text.
    pub body: String,
}

impl FetchResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            retry_after: None,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Performs bounded-time GET requests.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// GET `url`, failing with [`SourceError::Timeout`] after `timeout`.
    async fn get(&self, url: &str, timeout: Duration) -> Result<FetchResponse, SourceError>;
}

/// [`Fetcher`] backed by a shared reqwest client.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| SourceError::Network(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn map_reqwest_error(e: reqwest::Error, timeout: Duration) -> SourceError {
    if e.is_timeout() {
        SourceError::Timeout(timeout)
    } else {
        SourceError::Network(e.to_string())
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn get(&self, url: &str, timeout: Duration) -> Result<FetchResponse, SourceError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json, text/plain")
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, timeout))?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok());

        let body = response
            .text()
            .await
            .map_err(|e| map_reqwest_error(e, timeout))?;

        Ok(FetchResponse {
            status,
            retry_after,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_get_returns_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bits"))
            .and(header("user-agent", USER_AGENT))
            .respond_with(ResponseTemplate::new(200).set_body_string("00101010"))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new().unwrap();
        let resp = fetcher
            .get(&format!("{}/bits", server.uri()), Duration::from_secs(2))
            .await
            .unwrap();

        assert!(resp.is_success());
        assert_eq!(resp.body, "00101010");
        assert_eq!(resp.retry_after, None);
    }

    #[tokio::test]
    async fn test_get_reads_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "30"))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new().unwrap();
        let resp = fetcher
            .get(&server.uri(), Duration::from_secs(2))
            .await
            .unwrap();

        assert_eq!(resp.status, 429);
        assert_eq!(resp.retry_after, Some(30));
    }

    #[tokio::test]
    async fn test_get_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("11111111")
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new().unwrap();
        let timeout = Duration::from_millis(200);
        let err = fetcher.get(&server.uri(), timeout).await.unwrap_err();

        assert_eq!(err, SourceError::Timeout(timeout));
    }

    #[tokio::test]
    async fn test_get_connection_refused_is_network_error() {
        let fetcher = HttpFetcher::new().unwrap();
        let err = fetcher
            .get("http://127.0.0.1:1/", Duration::from_secs(2))
            .await
            .unwrap_err();

        assert!(matches!(err, SourceError::Network(_)));
    }
}
