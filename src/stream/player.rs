//! Player backend contract
//!
//! The playback session drives an embedded adaptive player through
//! [`PlayerBackend`] and learns what the player did through [`PlayerEvent`]s.
//! Adaptive bitrate selection stays inside the player.

use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors from player operations
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("Player '{0}' not found. Install it first.")]
    NotFound(String),
    #[error("Failed to start player: {0}")]
    StartFailed(#[from] std::io::Error),
    #[error("Player control channel failed: {0}")]
    Control(String),
    #[error("Player is not loaded")]
    NotLoaded,
    #[error("Player backend not supported on this platform")]
    Unsupported,
}

/// What to bind the player to
#[derive(Debug, Clone, PartialEq)]
pub struct MediaSource {
    pub url: String,
    /// Headers required by the CDN (origin, referer, user agent)
    pub headers: BTreeMap<String, String>,
    /// Start offset in seconds (used to keep position across quality switches)
    pub start_position: Option<f64>,
    /// Start playing as soon as the first frame is decoded
    pub autoplay: bool,
    /// Volume in [0, 1]
    pub volume: f32,
}

impl MediaSource {
    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Something the player reports
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// First frame decoded (also sent after a rebind finishes buffering)
    FirstFrame { duration: Option<f64> },
    /// Periodic position report
    TimeUpdate { position: f64 },
    /// Media duration became known or changed
    DurationChanged(f64),
    Buffering(bool),
    Played,
    Paused,
    VolumeChanged(f32),
    /// Reached the end of the media
    Ended,
    /// Fatal playback fault with a human-readable message
    Fault(String),
    /// The player process went away
    Exited,
}

/// An embedded player the session can bind and control
#[async_trait]
pub trait PlayerBackend: Send {
    /// Bind to a source, replacing whatever was loaded
    async fn load(&mut self, source: &MediaSource) -> Result<(), PlayerError>;

    async fn play(&mut self) -> Result<(), PlayerError>;

    async fn pause(&mut self) -> Result<(), PlayerError>;

    /// Seek to an absolute position in seconds
    async fn seek(&mut self, position: f64) -> Result<(), PlayerError>;

    /// Volume in [0, 1]
    async fn set_volume(&mut self, volume: f32) -> Result<(), PlayerError>;

    /// Release the player instance and all event bindings
    async fn release(&mut self) -> Result<(), PlayerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lookup_ignores_case() {
        let source = MediaSource {
            url: "https://cdn/x.m3u8".into(),
            headers: BTreeMap::from([("User-Agent".to_string(), "UA".to_string())]),
            start_position: None,
            autoplay: true,
            volume: 1.0,
        };
        assert_eq!(source.header("user-agent"), Some("UA"));
        assert_eq!(source.header("referer"), None);
    }

    #[test]
    fn test_player_error_display() {
        assert_eq!(
            PlayerError::NotFound("mpv".into()).to_string(),
            "Player 'mpv' not found. Install it first."
        );
    }
}
