//! StreamFlix - catalogue browsing and stream resolution
//!
//! Browse the TMDB catalogue, resolve a title to its ranked HLS streams
//! through the source provider and a remote decryption service, then play
//! them in mpv or hand them to a browser through the HTTP service.
//!
//! # Modules
//!
//! - `models` - Titles, pages, quality labels, resolved streams
//! - `api` - Catalogue client, source locator, decryption collaborator
//! - `stream` - Ranker, playback session, mpv backend, media relay
//! - `recent` - Recently picked titles
//! - `server` - HTTP entry points
//! - `cli` / `commands` - Scriptable front-end

pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
pub mod logging;
pub mod models;
pub mod recent;
pub mod server;
pub mod stream;

// Re-export commonly used types
pub use models::{
    Category, MediaKind, Page, Quality, ResolvedStream, StreamCandidate, TitleRef, TitleSummary,
};

pub use api::{Decryptor, RemoteDecryptor, ResolveError, SourceLocator, TmdbClient, TmdbError};
pub use config::Config;
pub use stream::{MediaRelay, PlaybackSession, PlaybackState, SessionSlot, SessionState};
