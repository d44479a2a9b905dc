//! Media relay
//!
//! Fetches a remote media URL with caller-supplied headers (the CDN wants a
//! specific origin/referer) so the body can be streamed through to a client
//! that cannot set those headers itself.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

/// Content type reported when the upstream doesn't send one
pub const DEFAULT_CONTENT_TYPE: &str = "video/mp4";

/// Relay errors
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Invalid relay request: {0}")]
    InvalidRequest(String),

    #[error("Stream failed: {0}")]
    Upstream(String),

    #[error("Stream failed: HTTP {0}")]
    UpstreamStatus(u16),
}

/// An upstream response ready to be streamed through
pub struct RelayedMedia {
    pub content_type: String,
    pub content_length: Option<u64>,
    pub response: reqwest::Response,
}

/// HTTP relay for media bodies
#[derive(Clone)]
pub struct MediaRelay {
    client: reqwest::Client,
}

impl MediaRelay {
    /// Bounded connect time, bounded gaps between chunks, no cap on total
    /// transfer time (media bodies are long)
    pub fn new(connect_timeout: Duration, read_timeout: Duration) -> Self {
        Self {
            client: crate::api::build_http_client(
                reqwest::Client::builder()
                    .connect_timeout(connect_timeout)
                    .read_timeout(read_timeout),
            ),
        }
    }

    /// Open the upstream media and return it for streaming
    pub async fn open(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
    ) -> Result<RelayedMedia, RelayError> {
        let url = validate_url(url)?;
        let headers = build_headers(headers)?;
        debug!(%url, "relaying media");

        let response = self
            .client
            .get(url)
            .headers(headers)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "relay upstream request failed");
                RelayError::Upstream(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "relay upstream returned an error");
            return Err(RelayError::UpstreamStatus(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();

        Ok(RelayedMedia {
            content_type,
            content_length: response.content_length(),
            response,
        })
    }
}

impl Default for MediaRelay {
    fn default() -> Self {
        Self::new(Duration::from_secs(15), Duration::from_secs(30))
    }
}

/// Only absolute http(s) URLs are relayed
fn validate_url(raw: &str) -> Result<Url, RelayError> {
    let url = Url::parse(raw.trim()).map_err(|e| RelayError::InvalidRequest(format!("bad url: {}", e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(RelayError::InvalidRequest(format!("unsupported scheme: {}", other))),
    }
}

fn build_headers(headers: &BTreeMap<String, String>) -> Result<HeaderMap, RelayError> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| RelayError::InvalidRequest(format!("bad header name: {}", name)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| RelayError::InvalidRequest(format!("bad value for header {}", name)))?;
        map.insert(name, value);
    }
    Ok(map)
}
