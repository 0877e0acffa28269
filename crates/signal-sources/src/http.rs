//! Shared HTTP plumbing for the provider clients.
//!
//! Every request carries its own timeout. Transport failures, non-2xx
//! statuses and undecodable bodies come back as [`SignalError`] variants so
//! callers can tell "unreachable" from "unexpected shape".

use std::time::Duration;

use bytes::Bytes;
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use signals_common::{SignalError, SignalResult};

/// Per-class request timeouts, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Small metadata lookups (versions, geocoding, indicator feeds)
    pub metadata_secs: u64,
    /// Listings (runs, files, temporary URLs)
    pub listing_secs: u64,
    /// Bulk payload downloads
    pub payload_secs: u64,
    /// Lightweight text feeds (news, calendars)
    pub feed_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            metadata_secs: 10,
            listing_secs: 15,
            payload_secs: 60,
            feed_secs: 6,
        }
    }
}

impl Timeouts {
    pub fn metadata(&self) -> Duration {
        Duration::from_secs(self.metadata_secs)
    }

    pub fn listing(&self) -> Duration {
        Duration::from_secs(self.listing_secs)
    }

    pub fn payload(&self) -> Duration {
        Duration::from_secs(self.payload_secs)
    }

    pub fn feed(&self) -> Duration {
        Duration::from_secs(self.feed_secs)
    }
}

/// Thin wrapper around a shared [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new() -> SignalResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .pool_max_idle_per_host(4)
            .tcp_nodelay(true)
            .user_agent(concat!("store-signals/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SignalError::Transport {
                url: String::new(),
                message: format!("failed to create HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    pub fn get(&self, url: &str, timeout: Duration) -> RequestBuilder {
        self.client.get(url).timeout(timeout)
    }

    /// Send and require a 2xx status.
    pub async fn send(&self, url: &str, request: RequestBuilder) -> SignalResult<Response> {
        let response = request.send().await.map_err(|e| transport(url, e))?;
        let status = response.status();
        debug!(url = %redact(url), status = status.as_u16(), "HTTP response");
        if !status.is_success() {
            return Err(SignalError::HttpStatus {
                url: redact(url),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    pub async fn json(&self, url: &str, request: RequestBuilder) -> SignalResult<Value> {
        let response = self.send(url, request).await?;
        let body = response.bytes().await.map_err(|e| transport(url, e))?;
        serde_json::from_slice(&body).map_err(|e| {
            SignalError::SchemaMismatch(format!("{} did not return JSON: {}", redact(url), e))
        })
    }

    pub async fn text(&self, url: &str, request: RequestBuilder) -> SignalResult<String> {
        let response = self.send(url, request).await?;
        response.text().await.map_err(|e| transport(url, e))
    }

    pub async fn bytes(&self, url: &str, request: RequestBuilder) -> SignalResult<Bytes> {
        let response = self.send(url, request).await?;
        response.bytes().await.map_err(|e| transport(url, e))
    }
}

/// The reqwest message embeds the full request URL, query included, so it
/// is stripped before formatting.
fn transport(url: &str, e: reqwest::Error) -> SignalError {
    let message = if e.is_timeout() {
        "timed out".to_string()
    } else {
        e.without_url().to_string()
    };
    SignalError::Transport {
        url: redact(url),
        message,
    }
}

/// Drop the query string; pre-signed URLs and API keys travel there.
pub fn redact(url: &str) -> String {
    match url.split_once('?') {
        Some((base, _)) => format!("{}?...", base),
        None => url.to_string(),
    }
}

/// Join a base URL and a path without doubling slashes.
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Append path segments to a base URL, percent-encoding each one.
pub fn segments_url(base: &str, segments: &[&str]) -> SignalResult<String> {
    let invalid = || SignalError::Transport {
        url: redact(base),
        message: "invalid base URL".to_string(),
    };
    let mut url = Url::parse(base).map_err(|_| invalid())?;
    url.path_segments_mut()
        .map_err(|_| invalid())?
        .pop_if_empty()
        .extend(segments);
    Ok(url.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_query() {
        assert_eq!(
            redact("https://bucket/file.grib2?X-Amz-Signature=abc"),
            "https://bucket/file.grib2?..."
        );
        assert_eq!(redact("https://host/path"), "https://host/path");
    }

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("https://h/v1/", "/datasets"), "https://h/v1/datasets");
        assert_eq!(join_url("https://h/v1", "datasets"), "https://h/v1/datasets");
    }

    #[test]
    fn test_segments_are_escaped() {
        assert_eq!(
            segments_url(
                "https://h/open-data/v1/",
                &["datasets", "run 01", "files", "a/b?.grib2"]
            )
            .unwrap(),
            "https://h/open-data/v1/datasets/run%2001/files/a%2Fb%3F.grib2"
        );
        assert_eq!(
            segments_url("http://127.0.0.1:8080", &["datasets"]).unwrap(),
            "http://127.0.0.1:8080/datasets"
        );
        assert!(segments_url("not a url", &["x"]).is_err());
    }

    #[tokio::test]
    async fn test_transport_error_hides_query() {
        let http = HttpClient::new().unwrap();
        let url = "http://127.0.0.1:1/geo/1.0/zip";
        let request = http
            .get(url, Duration::from_secs(2))
            .query(&[("zip", "3811,NL"), ("appid", "SECRETKEY123")]);

        let err = http.send(url, request).await.unwrap_err();
        assert!(matches!(err, SignalError::Transport { .. }));
        assert!(!err.to_string().contains("SECRETKEY123"), "{}", err);
        assert!(!format!("{:?}", err).contains("SECRETKEY123"), "{:?}", err);
    }

    #[test]
    fn test_default_timeouts() {
        let t = Timeouts::default();
        assert_eq!(t.payload(), Duration::from_secs(60));
        assert!(t.metadata() < t.payload());
    }
}
