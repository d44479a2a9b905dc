//! HTTP service
//!
//! JSON entry points for a browser front-end:
//!
//! - `POST /api/stream`: resolve a title to its ranked streams
//! - `POST /api/relay`: stream remote media through with CDN headers
//! - `GET /api/catalogue`: one listing or search page
//! - `GET /api/home`: every home row, fetched concurrently
//! - `GET /health`

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::api::source::{ResolveError, SourceLocator};
use crate::api::tmdb::{fetch_home, TmdbClient, TmdbError};
use crate::config::Config;
use crate::models::{Category, MediaKind, ResolvedStream, TitleRef};
use crate::stream::relay::{MediaRelay, RelayError};

/// Cache policy for relayed media
pub const RELAY_CACHE_CONTROL: &str = "public, max-age=3600";

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub tmdb: TmdbClient,
    pub locator: Arc<SourceLocator>,
    pub relay: MediaRelay,
}

impl AppState {
    pub fn from_config(config: &Config) -> Self {
        Self {
            tmdb: TmdbClient::from_config(config),
            locator: Arc::new(SourceLocator::from_config(config)),
            relay: MediaRelay::default(),
        }
    }
}

/// Build the router with CORS and request tracing
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/stream", post(resolve_stream))
        .route("/api/relay", post(relay_media))
        .route("/api/catalogue", get(catalogue))
        .route("/api/home", get(home))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until Ctrl-C
pub async fn run(config: Config) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    let addr = listener.local_addr()?;
    info!(%addr, "streamflix service listening");

    if !config.has_tmdb_api_key() {
        warn!("no TMDB API key configured; catalogue requests will fail");
    }

    let app = router(AppState::from_config(&config));
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

// =============================================================================
// Stream resolution
// =============================================================================

/// A number or a string; front-ends send ids and years either way
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Number(serde_json::Number),
    Text(String),
}

impl Scalar {
    fn text(&self) -> String {
        match self {
            Scalar::Number(n) => match (n.as_u64(), n.as_f64()) {
                (Some(u), _) => u.to_string(),
                // 2021.0 is still year 2021
                (None, Some(f)) if f >= 0.0 && f.fract() == 0.0 => format!("{:.0}", f),
                _ => n.to_string(),
            },
            Scalar::Text(s) => s.trim().to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub year: Option<Scalar>,
    #[serde(default)]
    pub tmdb_id: Option<Scalar>,
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub season: Option<Scalar>,
    #[serde(default)]
    pub episode: Option<Scalar>,
    #[serde(default)]
    pub server: Option<String>,
}

impl StreamRequest {
    /// Build the title identity; the locator checks title and id
    fn title_ref(&self) -> Result<TitleRef, ResolveError> {
        let kind = match self.media_type.as_deref().map(str::trim) {
            None | Some("") => MediaKind::Movie,
            Some(raw) => MediaKind::from_wire(raw)
                .ok_or_else(|| ResolveError::InvalidRequest(format!("unknown mediaType: {}", raw)))?,
        };

        let id = self.tmdb_id.as_ref().map(Scalar::text).unwrap_or_default();
        let year = self.year.as_ref().and_then(|y| y.text().parse().ok());
        let season = positive(self.season.as_ref(), "season")?;
        let episode = positive(self.episode.as_ref(), "episode")?;

        Ok(TitleRef::new(id, self.title.clone().unwrap_or_default(), kind)
            .with_year(year)
            .with_episode(season, episode))
    }
}

fn positive(value: Option<&Scalar>, field: &str) -> Result<Option<u32>, ResolveError> {
    match value {
        None => Ok(None),
        Some(v) => match v.text().parse::<u32>() {
            Ok(n) if n > 0 => Ok(Some(n)),
            _ => Err(ResolveError::InvalidRequest(format!("{} must be a positive integer", field))),
        },
    }
}

#[derive(Debug, Serialize)]
pub struct QualityEntry {
    pub quality: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamResponse {
    pub success: bool,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub quality: String,
    pub title: String,
    pub all_qualities: Vec<QualityEntry>,
}

impl From<&ResolvedStream> for StreamResponse {
    fn from(stream: &ResolvedStream) -> Self {
        let primary = stream.primary();
        Self {
            success: true,
            url: primary.url.clone(),
            headers: stream.request_headers().clone(),
            kind: primary.container_hint.clone(),
            quality: primary.quality.label().to_string(),
            title: stream.resolved_title().to_string(),
            all_qualities: stream
                .all_candidates()
                .iter()
                .map(|c| QualityEntry {
                    quality: c.quality.label().to_string(),
                    url: c.url.clone(),
                })
                .collect(),
        }
    }
}

/// HTTP status for a resolution failure
pub fn resolve_status(error: &ResolveError) -> StatusCode {
    match error {
        ResolveError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        ResolveError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
        ResolveError::DecryptionFailed(_) | ResolveError::NoStreamFound => StatusCode::NOT_FOUND,
    }
}

fn failure(status: StatusCode, error: impl std::fmt::Display) -> Response {
    (status, Json(json!({ "success": false, "error": error.to_string() }))).into_response()
}

async fn resolve_stream(
    State(state): State<AppState>,
    body: Result<Json<StreamRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => return failure(StatusCode::BAD_REQUEST, rejection.body_text()),
    };

    let title = match request.title_ref() {
        Ok(title) => title,
        Err(e) => return failure(resolve_status(&e), e),
    };

    match state.locator.resolve(&title, request.server.as_deref()).await {
        Ok(stream) => Json(StreamResponse::from(&stream)).into_response(),
        Err(e) => failure(resolve_status(&e), e),
    }
}

// =============================================================================
// Media relay
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct RelayRequest {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub headers: BTreeMap<String, String>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<BTreeMap<String, String>>::deserialize(deserializer)?.unwrap_or_default())
}

fn relay_failure(status: StatusCode, error: impl std::fmt::Display) -> Response {
    (status, Json(json!({ "error": error.to_string() }))).into_response()
}

async fn relay_media(
    State(state): State<AppState>,
    body: Result<Json<RelayRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => return relay_failure(StatusCode::BAD_REQUEST, rejection.body_text()),
    };

    let url = match request.url.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => url,
        _ => return relay_failure(StatusCode::BAD_REQUEST, "URL required"),
    };

    let media = match state.relay.open(url, &request.headers).await {
        Ok(media) => media,
        Err(e @ RelayError::InvalidRequest(_)) => return relay_failure(StatusCode::BAD_REQUEST, e),
        Err(e) => return relay_failure(StatusCode::INTERNAL_SERVER_ERROR, e),
    };

    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, &media.content_type)
        .header(header::CACHE_CONTROL, RELAY_CACHE_CONTROL);
    if let Some(len) = media.content_length {
        response = response.header(header::CONTENT_LENGTH, len);
    }

    response
        .body(Body::from_stream(media.response.bytes_stream()))
        .unwrap_or_else(|e| relay_failure(StatusCode::INTERNAL_SERVER_ERROR, e))
}

// =============================================================================
// Catalogue
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CatalogueQuery {
    pub endpoint: Option<String>,
    pub page: Option<u32>,
    pub query: Option<String>,
}

fn tmdb_status(error: &TmdbError) -> StatusCode {
    match error {
        TmdbError::InvalidEndpoint(_) => StatusCode::BAD_REQUEST,
        TmdbError::FetchFailed(_) | TmdbError::InvalidResponse(_) => StatusCode::BAD_GATEWAY,
    }
}

async fn catalogue(State(state): State<AppState>, Query(params): Query<CatalogueQuery>) -> Response {
    let page = params.page.unwrap_or(1).max(1);
    let search = params.query.as_deref().map(str::trim).filter(|q| !q.is_empty());

    let result = match (search, params.endpoint.as_deref()) {
        (Some(query), _) => state.tmdb.search(query, page).await,
        (None, Some(endpoint)) => state.tmdb.fetch_listing(endpoint, page).await,
        (None, None) => return failure(StatusCode::BAD_REQUEST, "endpoint or query required"),
    };

    match result {
        Ok(listing) => Json(json!({
            "success": true,
            "data": listing.results,
            "page": listing.page,
            "total_pages": listing.total_pages,
            "total_results": listing.total_results,
        }))
        .into_response(),
        Err(e) => failure(tmdb_status(&e), e),
    }
}

async fn home(State(state): State<AppState>) -> Json<serde_json::Value> {
    let rows = fetch_home(&state.tmdb, &Category::HOME).await;
    Json(json!({ "success": true, "rows": rows }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(body: serde_json::Value) -> StreamRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_numbers_and_strings_both_accepted() {
        let a = request(json!({"title": "Dune", "year": 2021, "tmdbId": 438631}))
            .title_ref()
            .unwrap();
        let b = request(json!({"title": "Dune", "year": "2021", "tmdbId": "438631"}))
            .title_ref()
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(a.id, "438631");
        assert_eq!(a.release_year, Some(2021));
        assert_eq!(a.media_kind, MediaKind::Movie);
    }

    #[test]
    fn test_whole_float_year_accepted() {
        let title = request(json!({"title": "Dune", "year": 2021.0, "tmdbId": 438631.0}))
            .title_ref()
            .unwrap();
        assert_eq!(title.release_year, Some(2021));
        assert_eq!(title.id, "438631");

        let fractional = request(json!({"title": "Dune", "year": 2021.5, "tmdbId": 1}))
            .title_ref()
            .unwrap();
        assert_eq!(fractional.release_year, None);
    }

    #[test]
    fn test_relay_headers_null_is_empty() {
        let relay: RelayRequest =
            serde_json::from_value(json!({"url": "https://cdn/a.ts", "headers": null})).unwrap();
        assert!(relay.headers.is_empty());

        let relay: RelayRequest = serde_json::from_value(json!({"url": "https://cdn/a.ts"})).unwrap();
        assert!(relay.headers.is_empty());
    }

    #[test]
    fn test_series_request() {
        let title = request(json!({
            "title": "Severance", "tmdbId": 95396, "mediaType": "tv", "season": 2, "episode": "3"
        }))
        .title_ref()
        .unwrap();
        assert_eq!(title.media_kind, MediaKind::Series);
        assert_eq!(title.season_index, Some(2));
        assert_eq!(title.episode_index, Some(3));
    }

    #[test]
    fn test_unknown_media_type_rejected() {
        let err = request(json!({"title": "X", "tmdbId": 1, "mediaType": "person"}))
            .title_ref()
            .unwrap_err();
        assert!(matches!(err, ResolveError::InvalidRequest(_)));
    }

    #[test]
    fn test_zero_episode_rejected() {
        let err = request(json!({"title": "X", "tmdbId": 1, "mediaType": "tv", "episode": 0}))
            .title_ref()
            .unwrap_err();
        assert!(matches!(err, ResolveError::InvalidRequest(_)));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(resolve_status(&ResolveError::InvalidRequest("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(
            resolve_status(&ResolveError::UpstreamUnavailable("x".into())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(resolve_status(&ResolveError::DecryptionFailed("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(resolve_status(&ResolveError::NoStreamFound), StatusCode::NOT_FOUND);
    }
}
