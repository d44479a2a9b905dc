//! Decryption collaborator
//!
//! The source provider answers with opaque ciphertext. A remote third-party
//! service turns it back into JSON. Its internals are unknown and its output
//! is treated as untrusted: the shape is checked before anything is unwrapped.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Errors from the decryption step
#[derive(Debug, Error)]
pub enum DecryptError {
    /// Transport fault, timeout or non-success status
    #[error("Decryption service unavailable: {0}")]
    Unavailable(String),

    /// Response was empty or not the expected shape
    #[error("Malformed decryption response: {0}")]
    Malformed(String),
}

/// Raw stream variant as reported by the decrypted payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawVariant {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub quality: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

/// Decoded payload: the variants plus the provider's title, if any
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DecryptedPayload {
    pub sources: Vec<RawVariant>,
    #[serde(default)]
    pub title: Option<String>,
}

/// Contract with the decryption service
#[async_trait]
pub trait Decryptor: Send + Sync {
    /// Turn provider ciphertext into a payload. `id` is the catalogue id.
    async fn decrypt(&self, ciphertext: &str, id: &str) -> Result<DecryptedPayload, DecryptError>;
}

/// Decryptor backed by the remote HTTP service
pub struct RemoteDecryptor {
    endpoint: String,
    client: reqwest::Client,
}

impl RemoteDecryptor {
    /// Create a decryptor posting to `endpoint` with the given timeout
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: super::build_http_client(reqwest::Client::builder().timeout(timeout)),
        }
    }
}

#[async_trait]
impl Decryptor for RemoteDecryptor {
    async fn decrypt(&self, ciphertext: &str, id: &str) -> Result<DecryptedPayload, DecryptError> {
        debug!(endpoint = %self.endpoint, bytes = ciphertext.len(), "posting ciphertext for decryption");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({ "text": ciphertext, "id": id }))
            .send()
            .await
            .map_err(|e| DecryptError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DecryptError::Unavailable(format!("HTTP {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| DecryptError::Unavailable(e.to_string()))?;

        parse_payload(&body)
    }
}

/// Parse a decryption response body.
///
/// The service sometimes returns a JSON string whose content is the JSON
/// payload. Exactly one such level is unwrapped.
pub fn parse_payload(body: &str) -> Result<DecryptedPayload, DecryptError> {
    if body.trim().is_empty() {
        return Err(DecryptError::Malformed("empty body".into()));
    }

    let value: Value = serde_json::from_str(body)
        .map_err(|e| DecryptError::Malformed(format!("not JSON: {}", e)))?;

    let value = match value {
        Value::String(inner) => serde_json::from_str(&inner)
            .map_err(|e| DecryptError::Malformed(format!("string-encoded payload is not JSON: {}", e)))?,
        other => other,
    };

    let Value::Object(ref map) = value else {
        return Err(DecryptError::Malformed("payload is not an object".into()));
    };

    // Missing sources is treated as "no variants"; a non-array is malformed
    match map.get("sources") {
        None | Some(Value::Null) => {
            let title = map.get("title").and_then(Value::as_str).map(String::from);
            return Ok(DecryptedPayload { sources: Vec::new(), title });
        }
        Some(Value::Array(_)) => {}
        Some(_) => return Err(DecryptError::Malformed("`sources` is not an array".into())),
    }

    serde_json::from_value(value).map_err(|e| DecryptError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_object() {
        let payload = parse_payload(
            r#"{"sources":[{"url":"https://cdn/a.m3u8","quality":"1080p","type":"hls"}],"title":"Dune"}"#,
        )
        .unwrap();
        assert_eq!(payload.sources.len(), 1);
        assert_eq!(payload.sources[0].kind.as_deref(), Some("hls"));
        assert_eq!(payload.title.as_deref(), Some("Dune"));
    }

    #[test]
    fn test_parse_unwraps_one_string_level() {
        let inner = r#"{"sources":[{"url":"u","quality":"720p"}]}"#;
        let body = serde_json::to_string(inner).unwrap();
        let payload = parse_payload(&body).unwrap();
        assert_eq!(payload.sources[0].url.as_deref(), Some("u"));
    }

    #[test]
    fn test_parse_does_not_unwrap_twice() {
        let inner = r#"{"sources":[]}"#;
        let once = serde_json::to_string(inner).unwrap();
        let twice = serde_json::to_string(&once).unwrap();
        assert!(matches!(parse_payload(&twice), Err(DecryptError::Malformed(_))));
    }

    #[test]
    fn test_parse_rejects_bad_shapes() {
        assert!(matches!(parse_payload(""), Err(DecryptError::Malformed(_))));
        assert!(matches!(parse_payload("not json"), Err(DecryptError::Malformed(_))));
        assert!(matches!(parse_payload("[1,2]"), Err(DecryptError::Malformed(_))));
        assert!(matches!(
            parse_payload(r#"{"sources":"nope"}"#),
            Err(DecryptError::Malformed(_))
        ));
    }

    #[test]
    fn test_parse_missing_sources_is_empty() {
        let payload = parse_payload(r#"{"title":"Nothing here"}"#).unwrap();
        assert!(payload.sources.is_empty());
        assert_eq!(payload.title.as_deref(), Some("Nothing here"));
    }
}
