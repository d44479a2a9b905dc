//! TMDB catalogue client tests
//!
//! Tests listings, search, the concurrent home feed and error handling.

use mockito::{Matcher, Server};
use streamflix::api::tmdb::{fetch_home, TmdbClient, TmdbError};
use streamflix::models::{Category, MediaKind};

const SEARCH_BODY: &str = r#"{
    "page": 1,
    "results": [
        {
            "id": 414906,
            "media_type": "movie",
            "title": "The Batman",
            "release_date": "2022-03-01",
            "overview": "Batman ventures into Gotham",
            "poster_path": "/74xTEgt7R36Fpooo50r9T25onhq.jpg",
            "vote_average": 7.8
        },
        {
            "id": 3894,
            "media_type": "person",
            "name": "Robert Pattinson"
        },
        {
            "id": 1396,
            "media_type": "tv",
            "name": "Breaking Bad",
            "first_air_date": "2008-01-20",
            "overview": "A chemistry teacher",
            "vote_average": 8.9
        }
    ],
    "total_results": 3,
    "total_pages": 1
}"#;

fn listing_body(id: u64, title: &str) -> String {
    format!(
        r#"{{"page": 1, "results": [{{"id": {}, "title": "{}", "release_date": "2024-05-01"}}],
            "total_pages": 7, "total_results": 140}}"#,
        id, title
    )
}

// =============================================================================
// Search Tests
// =============================================================================

#[tokio::test]
async fn test_search_sends_key_query_and_page() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", "/search/multi")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("api_key".into(), "test_key".into()),
            Matcher::UrlEncoded("query".into(), "the batman".into()),
            Matcher::UrlEncoded("page".into(), "2".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(SEARCH_BODY)
        .create_async()
        .await;

    let client = TmdbClient::with_base_url("test_key", server.url());
    let page = client.search("the batman", 2).await.unwrap();

    mock.assert_async().await;
    assert_eq!(page.total_results, 3);
}

#[tokio::test]
async fn test_search_filters_people() {
    let mut server = Server::new_async().await;

    server
        .mock("GET", "/search/multi")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(SEARCH_BODY)
        .create_async()
        .await;

    let client = TmdbClient::with_base_url("test_key", server.url());
    let page = client.search("batman", 1).await.unwrap();

    assert_eq!(page.results.len(), 2);
    assert_eq!(page.results[0].title, "The Batman");
    assert_eq!(page.results[0].media_kind, MediaKind::Movie);
    assert_eq!(page.results[0].release_year, Some(2022));
    assert_eq!(page.results[1].title, "Breaking Bad");
    assert_eq!(page.results[1].media_kind, MediaKind::Series);
}

// =============================================================================
// Listing Tests
// =============================================================================

#[tokio::test]
async fn test_fetch_listing_normalizes_page() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", "/movie/popular")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("api_key".into(), "test_key".into()),
            Matcher::UrlEncoded("page".into(), "3".into()),
        ]))
        .with_status(200)
        .with_body(listing_body(693134, "Dune: Part Two"))
        .create_async()
        .await;

    let client = TmdbClient::with_base_url("test_key", server.url());
    let page = client.fetch_listing("movie/popular", 3).await.unwrap();

    mock.assert_async().await;
    assert_eq!(page.results.len(), 1);
    assert_eq!(page.results[0].id, 693134);
    assert_eq!(page.total_pages, 7);
    assert!(page.has_next());
}

#[tokio::test]
async fn test_category_uses_implied_kind() {
    let mut server = Server::new_async().await;

    server
        .mock("GET", "/tv/popular")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"page": 1, "results": [{"id": 95396, "name": "Severance"}]}"#)
        .create_async()
        .await;

    let client = TmdbClient::with_base_url("test_key", server.url());
    let page = client.category(Category::PopularTv, 1).await.unwrap();

    assert_eq!(page.results[0].media_kind, MediaKind::Series);
    assert_eq!(page.results[0].title, "Severance");
}

#[tokio::test]
async fn test_invalid_endpoint_makes_no_request() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let client = TmdbClient::with_base_url("test_key", server.url());
    let result = client.fetch_listing("movie/popular?sort=x", 1).await;

    assert!(matches!(result, Err(TmdbError::InvalidEndpoint(_))));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_details_lookup() {
    let mut server = Server::new_async().await;

    server
        .mock("GET", "/movie/438631")
        .match_query(Matcher::UrlEncoded("api_key".into(), "test_key".into()))
        .with_status(200)
        .with_body(r#"{"id": 438631, "title": "Dune", "release_date": "2021-09-15"}"#)
        .create_async()
        .await;

    let client = TmdbClient::with_base_url("test_key", server.url());
    let title = client.details(MediaKind::Movie, 438631).await.unwrap();

    assert_eq!(title.title, "Dune");
    assert_eq!(title.release_year, Some(2021));
}

// =============================================================================
// Error Handling Tests
// =============================================================================

#[tokio::test]
async fn test_unauthorized_is_fetch_failed() {
    let mut server = Server::new_async().await;

    server
        .mock("GET", "/trending/all/day")
        .match_query(Matcher::Any)
        .with_status(401)
        .with_body(r#"{"status_message": "Invalid API key"}"#)
        .create_async()
        .await;

    let client = TmdbClient::with_base_url("bad_key", server.url());
    let err = client.category(Category::Trending, 1).await.unwrap_err();

    assert!(matches!(err, TmdbError::FetchFailed(Some(401))));
    assert_eq!(err.provider_status(), Some(401));
}

#[tokio::test]
async fn test_garbage_body_is_invalid_response() {
    let mut server = Server::new_async().await;

    server
        .mock("GET", "/movie/upcoming")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("<html>maintenance</html>")
        .create_async()
        .await;

    let client = TmdbClient::with_base_url("test_key", server.url());
    let err = client.category(Category::Upcoming, 1).await.unwrap_err();

    assert!(matches!(err, TmdbError::InvalidResponse(_)));
}

// =============================================================================
// Home Feed Tests
// =============================================================================

#[tokio::test]
async fn test_home_survives_failing_category() {
    let mut server = Server::new_async().await;

    server
        .mock("GET", "/trending/all/day")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"page": 1, "results": [{"id": 1, "media_type": "movie", "title": "A"}]}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/movie/popular")
        .match_query(Matcher::Any)
        .with_status(500)
        .create_async()
        .await;
    server
        .mock("GET", "/tv/popular")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"page": 1, "results": [{"id": 2, "name": "B"}]}"#)
        .create_async()
        .await;

    let client = TmdbClient::with_base_url("test_key", server.url());
    let categories = [Category::Trending, Category::PopularMovies, Category::PopularTv];
    let rows = fetch_home(&client, &categories).await;

    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].category, Category::Trending);
    assert_eq!(rows[0].titles.len(), 1);
    assert!(rows[0].error.is_none());

    assert_eq!(rows[1].category, Category::PopularMovies);
    assert!(rows[1].titles.is_empty());
    assert!(rows[1].error.is_some());

    assert_eq!(rows[2].titles[0].media_kind, MediaKind::Series);
}
