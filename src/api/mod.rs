//! API clients for external services
//!
//! - TMDB: movie/TV catalogue listings and search
//! - Source: stream lookup against the source provider
//! - Decrypt: the remote decryption collaborator

pub mod decrypt;
pub mod source;
pub mod tmdb;

pub use decrypt::{Decryptor, RemoteDecryptor};
pub use source::{ResolveError, SourceLocator};
pub use tmdb::{fetch_home, TmdbClient, TmdbError};

/// Build a configured HTTP client. If the builder fails (TLS backend init),
/// fall back to a default client and say so, since the fallback carries none
/// of the configured timeouts.
pub(crate) fn build_http_client(builder: reqwest::ClientBuilder) -> reqwest::Client {
    match builder.build() {
        Ok(client) => client,
        Err(e) => {
            tracing::warn!(error = %e, "HTTP client build failed; falling back to an unbounded default client");
            reqwest::Client::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_built_client_honours_timeout() {
        // Accepts connections at the TCP level but never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client = build_http_client(reqwest::Client::builder().timeout(Duration::from_millis(100)));
        let err = client.get(format!("http://{}/", addr)).send().await.unwrap_err();

        assert!(err.is_timeout());
        drop(listener);
    }
}
