//! Source locator
//!
//! Resolves a [`TitleRef`] to a playable [`ResolvedStream`]:
//!
//! 1. validate the identity (no network call on failure)
//! 2. GET the provider's `sources-with-title` lookup (opaque ciphertext)
//! 3. hand the ciphertext to the [`Decryptor`]
//! 4. rank the decrypted variants and attach the CDN playback headers
//!
//! Each call is exactly one attempt. The two requests are sequential since
//! the second needs the first's body.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::decrypt::{DecryptError, Decryptor, RemoteDecryptor};
use crate::config::Config;
use crate::models::{MediaKind, ResolvedStream, TitleRef};
use crate::stream::ranker;

/// Resolution failures, from the caller's point of view
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Missing or malformed identity fields; user-correctable
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Source provider or transport fault; the caller may try again
    #[error("Source provider unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Decryption produced nothing usable
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    /// No playable variant for this title
    #[error("No stream found")]
    NoStreamFound,
}

impl ResolveError {
    /// True for failures where retrying the same title won't help
    pub fn is_terminal(&self) -> bool {
        matches!(self, ResolveError::DecryptionFailed(_) | ResolveError::NoStreamFound)
    }
}

impl From<DecryptError> for ResolveError {
    fn from(e: DecryptError) -> Self {
        match e {
            DecryptError::Unavailable(msg) => ResolveError::UpstreamUnavailable(msg),
            DecryptError::Malformed(msg) => ResolveError::DecryptionFailed(msg),
        }
    }
}

/// Source locator client
pub struct SourceLocator {
    base_url: String,
    default_server: String,
    user_agent: String,
    origin: String,
    referer: String,
    client: reqwest::Client,
    decryptor: Arc<dyn Decryptor>,
}

impl SourceLocator {
    /// Create a locator from configuration, using the remote decryptor
    pub fn from_config(config: &Config) -> Self {
        let decryptor = RemoteDecryptor::new(&config.decrypt_url, config.request_timeout());
        Self::with_decryptor(config, Arc::new(decryptor))
    }

    /// Create a locator with a custom decryptor (for testing)
    pub fn with_decryptor(config: &Config, decryptor: Arc<dyn Decryptor>) -> Self {
        Self {
            base_url: config.source_base_url.trim_end_matches('/').to_string(),
            default_server: config.default_server.clone(),
            user_agent: config.user_agent.clone(),
            origin: config.playback_origin.clone(),
            referer: config.playback_referer.clone(),
            client: build_client(config.request_timeout()),
            decryptor,
        }
    }

    /// Resolve a title to its best stream plus all ranked alternatives
    pub async fn resolve(
        &self,
        title: &TitleRef,
        server: Option<&str>,
    ) -> Result<ResolvedStream, ResolveError> {
        let server = self.validate(title, server)?;
        info!(title = %title, id = %title.id, server, "resolving stream");

        let ciphertext = self.fetch_ciphertext(title, server).await?;

        let payload = self
            .decryptor
            .decrypt(&ciphertext, &title.id)
            .await
            .inspect_err(|e| warn!(id = %title.id, error = %e, "decryption step failed"))?;

        let ranked = ranker::rank(payload.sources);
        let resolved_title = payload
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| title.display_title.clone());

        let stream = ResolvedStream::new(ranked, self.playback_headers(), resolved_title)
            .ok_or_else(|| {
                warn!(id = %title.id, "no playable variants after decryption");
                ResolveError::NoStreamFound
            })?;

        info!(
            id = %title.id,
            quality = %stream.primary().quality,
            variants = stream.all_candidates().len(),
            "stream resolved"
        );
        Ok(stream)
    }

    /// Check identity fields and pick the server, before any network call
    fn validate<'a>(&'a self, title: &TitleRef, server: Option<&'a str>) -> Result<&'a str, ResolveError> {
        if title.display_title.trim().is_empty() {
            return Err(ResolveError::InvalidRequest("title is required".into()));
        }
        if title.id.trim().is_empty() {
            return Err(ResolveError::InvalidRequest("catalogue id is required".into()));
        }

        let server = server
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.default_server);
        if !is_valid_server(server) {
            return Err(ResolveError::InvalidRequest(format!("invalid server name: {}", server)));
        }
        Ok(server)
    }

    /// GET the provider lookup and return its raw body
    async fn fetch_ciphertext(&self, title: &TitleRef, server: &str) -> Result<String, ResolveError> {
        let url = format!("{}/{}/sources-with-title", self.base_url, server);
        let query = lookup_query(title);
        debug!(%url, ?query, "source lookup");

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .query(&query)
            .send()
            .await
            .map_err(|e| {
                warn!(%url, error = %e, "source provider request failed");
                ResolveError::UpstreamUnavailable(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(%url, status = status.as_u16(), "source provider returned an error");
            return Err(ResolveError::UpstreamUnavailable(format!("HTTP {}", status)));
        }

        response
            .text()
            .await
            .map_err(|e| ResolveError::UpstreamUnavailable(e.to_string()))
    }

    /// Headers the CDN checks when the player fetches the stream
    pub fn playback_headers(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("origin".to_string(), self.origin.clone()),
            ("referer".to_string(), self.referer.clone()),
            ("User-Agent".to_string(), self.user_agent.clone()),
        ])
    }
}

/// Query parameters for the provider lookup.
///
/// Series always carry season/episode; unset values default to 1, so a
/// missing episode silently resolves to episode 1.
pub fn lookup_query(title: &TitleRef) -> Vec<(&'static str, String)> {
    let mut query = vec![
        ("title", title.display_title.trim().to_string()),
        ("mediaType", title.media_kind.as_str().to_string()),
        (
            "year",
            title.release_year.map(|y| y.to_string()).unwrap_or_default(),
        ),
        ("tmdbId", title.id.trim().to_string()),
    ];

    if title.media_kind == MediaKind::Series {
        query.push(("seasonId", title.season_index.unwrap_or(1).to_string()));
        query.push(("episodeId", title.episode_index.unwrap_or(1).to_string()));
    }
    query
}

/// Server names become a URL path segment
fn is_valid_server(server: &str) -> bool {
    static SERVER_RE: OnceLock<Option<Regex>> = OnceLock::new();
    SERVER_RE
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9_\-]+$").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(server))
}

fn build_client(timeout: Duration) -> reqwest::Client {
    crate::api::build_http_client(reqwest::Client::builder().timeout(timeout))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param<'a>(query: &'a [(&'static str, String)], key: &str) -> Option<&'a str> {
        query.iter().find(|(k, _)| *k == key).map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_movie_query_has_no_episode_fields() {
        let title = TitleRef::new("27205", "Inception", MediaKind::Movie).with_year(Some(2010));
        let query = lookup_query(&title);
        assert_eq!(param(&query, "title"), Some("Inception"));
        assert_eq!(param(&query, "mediaType"), Some("movie"));
        assert_eq!(param(&query, "year"), Some("2010"));
        assert_eq!(param(&query, "tmdbId"), Some("27205"));
        assert_eq!(param(&query, "seasonId"), None);
        assert_eq!(param(&query, "episodeId"), None);
    }

    #[test]
    fn test_series_query_defaults_to_s1e1() {
        let title = TitleRef::new("1396", "Breaking Bad", MediaKind::Series);
        let query = lookup_query(&title);
        assert_eq!(param(&query, "mediaType"), Some("tv"));
        assert_eq!(param(&query, "seasonId"), Some("1"));
        assert_eq!(param(&query, "episodeId"), Some("1"));
        assert_eq!(param(&query, "year"), Some(""));
    }

    #[test]
    fn test_series_query_keeps_explicit_episode() {
        let title = TitleRef::new("1396", "Breaking Bad", MediaKind::Series)
            .with_episode(Some(3), Some(7));
        let query = lookup_query(&title);
        assert_eq!(param(&query, "seasonId"), Some("3"));
        assert_eq!(param(&query, "episodeId"), Some("7"));
    }

    #[test]
    fn test_server_validation() {
        assert!(is_valid_server("myflixerzupcloud"));
        assert!(is_valid_server("cdn-2_b"));
        assert!(!is_valid_server("../admin"));
        assert!(!is_valid_server("a/b"));
        assert!(!is_valid_server(""));
    }

    #[test]
    fn test_error_terminality() {
        assert!(ResolveError::NoStreamFound.is_terminal());
        assert!(ResolveError::DecryptionFailed("x".into()).is_terminal());
        assert!(!ResolveError::UpstreamUnavailable("x".into()).is_terminal());
        assert!(!ResolveError::InvalidRequest("x".into()).is_terminal());
    }
}
