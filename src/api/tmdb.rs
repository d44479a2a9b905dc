//! TMDB (The Movie Database) catalogue client
//!
//! Read-through proxy for listings and multi-search. Normalizes the TMDB
//! envelope into [`Page`]. No retries: callers decide what to do on failure.
//! API docs: https://developer.themoviedb.org/docs

use futures::future::join_all;
use regex::Regex;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;
use crate::models::{extract_year, Category, MediaKind, Page, TitleSummary};

/// TMDB API error types
#[derive(Error, Debug)]
pub enum TmdbError {
    /// Non-success status (`Some`) or transport fault (`None`)
    #[error("Catalogue fetch failed{}", .0.map(|s| format!(" (HTTP {})", s)).unwrap_or_default())]
    FetchFailed(Option<u16>),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl TmdbError {
    /// Provider status carried by a fetch failure
    pub fn provider_status(&self) -> Option<u16> {
        match self {
            TmdbError::FetchFailed(status) => *status,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TmdbError {
    fn from(e: reqwest::Error) -> Self {
        TmdbError::FetchFailed(e.status().map(|s| s.as_u16()))
    }
}

/// TMDB catalogue client
#[derive(Clone)]
pub struct TmdbClient {
    api_key: String,
    base_url: String,
    image_base_url: String,
    client: reqwest::Client,
}

impl TmdbClient {
    /// Create a client against the public TMDB API
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, "https://api.themoviedb.org/3")
    }

    /// Create a client with a custom base URL (for testing)
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            image_base_url: "https://image.tmdb.org/t/p".to_string(),
            client: super::build_http_client(
                reqwest::Client::builder().timeout(Duration::from_secs(10)),
            ),
        }
    }

    /// Create a client from loaded configuration
    pub fn from_config(config: &Config) -> Self {
        let mut client = Self::with_base_url(config.tmdb_api_key(), &config.tmdb_base_url);
        client.image_base_url = config.image_base_url.trim_end_matches('/').to_string();
        client
    }

    /// Make an authenticated GET request and decode the JSON body
    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T, TmdbError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        debug!(%url, "catalogue request");

        let mut params: Vec<(&str, String)> = vec![("api_key", self.api_key.clone())];
        params.extend(query.iter().cloned());

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .query(&params)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let body = response.text().await?;
                serde_json::from_str(&body)
                    .map_err(|e| TmdbError::InvalidResponse(format!("JSON parse error: {}", e)))
            }
            status => {
                warn!(endpoint, status = status.as_u16(), "catalogue provider returned an error");
                Err(TmdbError::FetchFailed(Some(status.as_u16())))
            }
        }
    }

    async fn get_page(&self, endpoint: &str, query: &[(&str, String)]) -> Result<RawPage, TmdbError> {
        self.get_json(endpoint, query).await
    }

    /// Fetch one title by id (`movie/{id}` or `tv/{id}`)
    pub async fn details(&self, kind: MediaKind, id: u64) -> Result<TitleSummary, TmdbError> {
        let raw: TitleRaw = self.get_json(&format!("{}/{}", kind.as_str(), id), &[]).await?;
        raw.into_summary(Some(kind))
            .ok_or_else(|| TmdbError::InvalidResponse(format!("no title for id {}", id)))
    }

    /// Fetch one page of a listing endpoint such as `movie/popular`
    pub async fn fetch_listing(&self, endpoint: &str, page: u32) -> Result<Page<TitleSummary>, TmdbError> {
        let endpoint = validate_endpoint(endpoint)?;
        let raw = self.get_page(endpoint, &[("page", page.max(1).to_string())]).await?;
        Ok(raw.into_page(None))
    }

    /// Fetch one page of a home-screen category
    pub async fn category(&self, category: Category, page: u32) -> Result<Page<TitleSummary>, TmdbError> {
        let raw = self
            .get_page(category.endpoint(), &[("page", page.max(1).to_string())])
            .await?;
        Ok(raw.into_page(category.implied_kind()))
    }

    /// Search for movies and TV shows (people are filtered out)
    pub async fn search(&self, query: &str, page: u32) -> Result<Page<TitleSummary>, TmdbError> {
        let raw = self
            .get_page(
                "search/multi",
                &[
                    ("query", query.to_string()),
                    ("page", page.max(1).to_string()),
                ],
            )
            .await?;
        Ok(raw.into_page(None))
    }

    /// Poster URL for a TMDB image path
    pub fn image_url(&self, path: &str, size: &str) -> String {
        format!("{}/{}/{}", self.image_base_url, size, path.trim_start_matches('/'))
    }

    /// Full-size backdrop URL for a TMDB image path
    pub fn backdrop_url(&self, path: &str) -> String {
        self.image_url(path, "original")
    }
}

/// Restrict listing endpoints to path-safe characters
fn validate_endpoint(endpoint: &str) -> Result<&str, TmdbError> {
    static ENDPOINT_RE: OnceLock<Option<Regex>> = OnceLock::new();
    let re = ENDPOINT_RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_\-]+(/[A-Za-z0-9_\-]+)*$").ok());

    let trimmed = endpoint.trim().trim_matches('/');
    match re {
        Some(re) if re.is_match(trimmed) => Ok(trimmed),
        _ => Err(TmdbError::InvalidEndpoint(endpoint.to_string())),
    }
}

// =============================================================================
// Home Feed (concurrent category fetch)
// =============================================================================

/// One home-screen row. A failed category renders empty.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryRow {
    pub category: Category,
    pub label: &'static str,
    pub titles: Vec<TitleSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Fetch every category concurrently; one failure never blocks the others
pub async fn fetch_home(client: &TmdbClient, categories: &[Category]) -> Vec<CategoryRow> {
    let requests = categories.iter().map(|&category| async move {
        let result = client.category(category, 1).await;
        (category, result)
    });

    join_all(requests)
        .await
        .into_iter()
        .map(|(category, result)| match result {
            Ok(page) => CategoryRow {
                category,
                label: category.label(),
                titles: page.results,
                error: None,
            },
            Err(e) => {
                warn!(%category, error = %e, "category fetch failed, rendering empty");
                CategoryRow {
                    category,
                    label: category.label(),
                    titles: Vec::new(),
                    error: Some(e.to_string()),
                }
            }
        })
        .collect()
}

// =============================================================================
// Response Structures (internal deserialization)
// =============================================================================

#[derive(Debug, Deserialize)]
struct RawPage {
    #[serde(default)]
    results: Vec<TitleRaw>,
    #[serde(default = "first_page")]
    page: u32,
    #[serde(default)]
    total_pages: u32,
    #[serde(default)]
    total_results: u32,
}

fn first_page() -> u32 {
    1
}

impl RawPage {
    fn into_page(self, implied: Option<MediaKind>) -> Page<TitleSummary> {
        Page {
            results: self
                .results
                .into_iter()
                .filter_map(|r| r.into_summary(implied))
                .collect(),
            page: self.page,
            total_pages: self.total_pages,
            total_results: self.total_results,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TitleRaw {
    id: u64,
    media_type: Option<String>,
    // Movies use "title", TV uses "name"
    title: Option<String>,
    name: Option<String>,
    // Movies use "release_date", TV uses "first_air_date"
    release_date: Option<String>,
    first_air_date: Option<String>,
    overview: Option<String>,
    poster_path: Option<String>,
    backdrop_path: Option<String>,
    vote_average: Option<f32>,
}

impl TitleRaw {
    fn into_summary(self, implied: Option<MediaKind>) -> Option<TitleSummary> {
        let media_kind = match self.media_type.as_deref() {
            Some(wire) => MediaKind::from_wire(wire)?, // drops "person"
            None => implied.unwrap_or(if self.title.is_some() {
                MediaKind::Movie
            } else {
                MediaKind::Series
            }),
        };

        let title = self.title.or(self.name).unwrap_or_default();
        let release_year = self
            .release_date
            .or(self.first_air_date)
            .and_then(|d| extract_year(&d));

        Some(TitleSummary {
            id: self.id,
            media_kind,
            title,
            release_year,
            overview: self.overview.unwrap_or_default(),
            poster_path: self.poster_path,
            backdrop_path: self.backdrop_path,
            vote_average: self.vote_average.unwrap_or(0.0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(media_type: Option<&str>, title: Option<&str>, name: Option<&str>) -> TitleRaw {
        TitleRaw {
            id: 1,
            media_type: media_type.map(String::from),
            title: title.map(String::from),
            name: name.map(String::from),
            release_date: Some("2022-01-01".to_string()),
            first_air_date: None,
            overview: None,
            poster_path: None,
            backdrop_path: None,
            vote_average: None,
        }
    }

    #[test]
    fn test_media_type_filter() {
        assert!(raw(Some("movie"), Some("Test"), None).into_summary(None).is_some());
        assert!(raw(Some("person"), None, Some("Actor")).into_summary(None).is_none());
    }

    #[test]
    fn test_media_kind_inferred_from_title_field() {
        let movie = raw(None, Some("Movie"), None).into_summary(None).unwrap();
        assert_eq!(movie.media_kind, MediaKind::Movie);

        let show = raw(None, None, Some("Show")).into_summary(None).unwrap();
        assert_eq!(show.media_kind, MediaKind::Series);
        assert_eq!(show.title, "Show");
    }

    #[test]
    fn test_implied_kind_wins_over_inference() {
        let show = raw(None, Some("Oddly titled"), None)
            .into_summary(Some(MediaKind::Series))
            .unwrap();
        assert_eq!(show.media_kind, MediaKind::Series);
    }

    #[test]
    fn test_validate_endpoint() {
        assert_eq!(validate_endpoint("movie/popular").unwrap(), "movie/popular");
        assert_eq!(validate_endpoint("/trending/all/day/").unwrap(), "trending/all/day");
        assert!(validate_endpoint("../secret").is_err());
        assert!(validate_endpoint("movie/popular?x=1").is_err());
        assert!(validate_endpoint("").is_err());
    }

    #[test]
    fn test_image_urls() {
        let client = TmdbClient::new("key");
        assert_eq!(
            client.image_url("/abc.jpg", "w500"),
            "https://image.tmdb.org/t/p/w500/abc.jpg"
        );
        assert_eq!(
            client.backdrop_url("/abc.jpg"),
            "https://image.tmdb.org/t/p/original/abc.jpg"
        );
    }

    #[test]
    fn test_fetch_failed_display() {
        assert_eq!(
            TmdbError::FetchFailed(Some(401)).to_string(),
            "Catalogue fetch failed (HTTP 401)"
        );
        assert_eq!(TmdbError::FetchFailed(None).to_string(), "Catalogue fetch failed");
    }
}
