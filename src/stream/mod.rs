//! Streaming infrastructure
//!
//! - Ranker: best-first ordering of stream variants
//! - Session: playback state machine over a player backend
//! - Player/mpv: the player contract and its mpv implementation
//! - Relay: streams remote media through with CDN headers

pub mod mpv;
pub mod player;
pub mod ranker;
pub mod relay;
pub mod session;

pub use mpv::MpvPlayer;
pub use player::{MediaSource, PlayerBackend, PlayerError, PlayerEvent};
pub use relay::{MediaRelay, RelayError};
pub use session::{PlaybackSession, PlaybackState, SessionSlot, SessionState};
