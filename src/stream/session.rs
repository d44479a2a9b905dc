//! Playback session
//!
//! Owns one resolved stream and one player backend.
//!
//! ```text
//! Idle -> Loading -> Ready <-> Playing <-> Paused
//!   any -> Errored   (player fault, no automatic recovery)
//!   any -> Closed    (terminal)
//! ```
//!
//! User controls call into the backend; player events come back through
//! [`PlaybackSession::handle_event`]. Any backend failure is treated as a
//! player fault.

use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::player::{MediaSource, PlayerBackend, PlayerError, PlayerEvent};
use crate::models::ResolvedStream;

/// Quality selector value meaning "let the player adapt"
pub const AUTO_QUALITY: &str = "auto";

/// Session errors
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Cannot {action} while {state}")]
    InvalidState {
        action: &'static str,
        state: SessionState,
    },
    #[error("Player fault: {0}")]
    Player(#[from] PlayerError),
}

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Loading,
    Ready,
    Playing,
    Paused,
    Errored,
    Closed,
}

impl SessionState {
    /// States in which the player has a decoded stream
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Ready | SessionState::Playing | SessionState::Paused)
    }

    /// States in which a backend is bound
    fn has_player(&self) -> bool {
        self.is_active() || *self == SessionState::Loading
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Idle => "idle",
            SessionState::Loading => "loading",
            SessionState::Ready => "ready",
            SessionState::Playing => "playing",
            SessionState::Paused => "paused",
            SessionState::Errored => "errored",
            SessionState::Closed => "closed",
        };
        write!(f, "{}", s)
    }
}

/// Which source the player is bound to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActiveQuality {
    Auto,
    Fixed(String),
}

impl Serialize for ActiveQuality {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl fmt::Display for ActiveQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActiveQuality::Auto => write!(f, "{}", AUTO_QUALITY),
            ActiveQuality::Fixed(label) => write!(f, "{}", label),
        }
    }
}

/// Observable playback state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackState {
    pub is_playing: bool,
    pub position_seconds: f64,
    pub duration_seconds: f64,
    /// In [0, 1]
    pub volume: f32,
    pub active_quality: ActiveQuality,
    pub is_buffering: bool,
    pub last_error: Option<String>,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            is_playing: false,
            position_seconds: 0.0,
            duration_seconds: 0.0,
            volume: 1.0,
            active_quality: ActiveQuality::Auto,
            is_buffering: false,
            last_error: None,
        }
    }
}

/// Single playback attempt for one resolved stream
pub struct PlaybackSession<P: PlayerBackend> {
    id: Uuid,
    state: SessionState,
    playback: Option<PlaybackState>,
    stream: Option<ResolvedStream>,
    player: P,
}

impl<P: PlayerBackend> PlaybackSession<P> {
    /// Create an idle session around a player backend
    pub fn new(player: P) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: SessionState::Idle,
            playback: Some(PlaybackState::default()),
            stream: None,
            player,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Current playback state; `None` once the session is closed
    pub fn playback(&self) -> Option<&PlaybackState> {
        self.playback.as_ref()
    }

    pub fn stream(&self) -> Option<&ResolvedStream> {
        self.stream.as_ref()
    }

    pub fn player(&self) -> &P {
        &self.player
    }

    /// Bind the player to the stream's primary candidate (Idle -> Loading)
    pub async fn open(&mut self, stream: ResolvedStream) -> Result<(), SessionError> {
        if self.state != SessionState::Idle {
            return Err(SessionError::InvalidState {
                action: "open",
                state: self.state,
            });
        }

        let volume = self.playback.as_ref().map(|p| p.volume).unwrap_or(1.0);
        let source = MediaSource {
            url: stream.primary().url.clone(),
            headers: stream.request_headers().clone(),
            start_position: None,
            autoplay: true,
            volume,
        };

        info!(session = %self.id, title = stream.resolved_title(), quality = %stream.primary().quality, "opening playback");
        self.stream = Some(stream);
        self.state = SessionState::Loading;
        if let Some(playback) = self.playback.as_mut() {
            playback.is_buffering = true;
            playback.active_quality = ActiveQuality::Auto;
        }

        let result = self.player.load(&source).await;
        self.check(result)
    }

    /// Apply a player-reported event
    pub fn handle_event(&mut self, event: PlayerEvent) {
        if self.state == SessionState::Closed {
            return;
        }
        debug!(session = %self.id, ?event, state = %self.state, "player event");

        let state = self.state;
        let Some(playback) = self.playback.as_mut() else {
            return;
        };

        match event {
            PlayerEvent::FirstFrame { duration } => {
                if let Some(d) = duration.filter(|d| d.is_finite() && *d > 0.0) {
                    playback.duration_seconds = d;
                }
                playback.is_buffering = false;
                if state == SessionState::Loading {
                    // Ready, then straight to Playing (autoplay)
                    self.state = SessionState::Ready;
                    self.state = SessionState::Playing;
                    playback.is_playing = true;
                }
            }
            PlayerEvent::TimeUpdate { position } => {
                if position.is_finite() && position >= 0.0 {
                    playback.position_seconds = position;
                }
            }
            PlayerEvent::DurationChanged(d) => {
                if d.is_finite() && d > 0.0 {
                    playback.duration_seconds = d;
                }
            }
            PlayerEvent::Buffering(buffering) => {
                if state != SessionState::Errored {
                    playback.is_buffering = buffering;
                }
            }
            PlayerEvent::Played => {
                if state.is_active() {
                    self.state = SessionState::Playing;
                    playback.is_playing = true;
                }
            }
            PlayerEvent::Paused => {
                if state.is_active() {
                    self.state = SessionState::Paused;
                    playback.is_playing = false;
                }
            }
            PlayerEvent::VolumeChanged(v) => {
                playback.volume = clamp_unit(v);
            }
            PlayerEvent::Ended => {
                if state.is_active() {
                    self.state = SessionState::Paused;
                    playback.is_playing = false;
                    playback.position_seconds = playback.duration_seconds;
                }
            }
            PlayerEvent::Fault(message) => {
                warn!(session = %self.id, error = %message, "playback fault");
                self.state = SessionState::Errored;
                playback.is_playing = false;
                playback.is_buffering = false;
                playback.last_error = Some(message);
            }
            PlayerEvent::Exited => {
                playback.is_playing = false;
                playback.is_buffering = false;
                // No player is bound after this
                if state == SessionState::Loading {
                    self.state = SessionState::Errored;
                    playback.last_error = Some("player exited before playback started".into());
                } else if state.is_active() {
                    self.state = SessionState::Errored;
                    playback.last_error = Some("player exited".into());
                }
            }
        }
    }

    /// Playing <-> Paused. Ready starts playback. No-op elsewhere.
    pub async fn toggle_play(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Playing => {
                let result = self.player.pause().await;
                self.check(result)?;
                self.set_playing(false);
            }
            SessionState::Paused | SessionState::Ready => {
                let result = self.player.play().await;
                self.check(result)?;
                self.set_playing(true);
            }
            _ => debug!(session = %self.id, state = %self.state, "toggle_play ignored"),
        }
        Ok(())
    }

    /// Seek to a fraction of the duration. Out-of-range input is clamped.
    pub async fn seek(&mut self, fraction: f64) -> Result<(), SessionError> {
        if !self.state.is_active() {
            debug!(session = %self.id, state = %self.state, "seek ignored");
            return Ok(());
        }
        let fraction = if fraction.is_nan() { 0.0 } else { fraction.clamp(0.0, 1.0) };
        let duration = self.playback.as_ref().map(|p| p.duration_seconds).unwrap_or(0.0);
        let position = fraction * duration;

        let result = self.player.seek(position).await;
        self.check(result)?;
        if let Some(playback) = self.playback.as_mut() {
            playback.position_seconds = position;
        }
        Ok(())
    }

    /// Rebind to the candidate with the given label, or back to adaptive
    /// selection for `"auto"`. Unknown labels leave the session untouched.
    pub async fn switch_quality(&mut self, selection: &str) -> Result<(), SessionError> {
        if !self.state.is_active() {
            debug!(session = %self.id, state = %self.state, "switch_quality ignored");
            return Ok(());
        }
        let (Some(stream), Some(playback)) = (self.stream.as_ref(), self.playback.as_ref()) else {
            return Ok(());
        };

        let (target, url) = if selection.trim().eq_ignore_ascii_case(AUTO_QUALITY) {
            if playback.active_quality == ActiveQuality::Auto {
                return Ok(());
            }
            (ActiveQuality::Auto, stream.primary().url.clone())
        } else {
            let Some(candidate) = stream.candidate_for(selection) else {
                debug!(session = %self.id, selection, "no candidate with that quality");
                return Ok(());
            };
            let target = ActiveQuality::Fixed(candidate.quality.label().to_string());
            if playback.active_quality == target {
                return Ok(());
            }
            (target, candidate.url.clone())
        };

        let source = MediaSource {
            url,
            headers: stream.request_headers().clone(),
            start_position: Some(playback.position_seconds),
            autoplay: self.state != SessionState::Paused,
            volume: playback.volume,
        };

        info!(session = %self.id, quality = %target, "switching quality");
        let result = self.player.load(&source).await;
        self.check(result)?;
        if let Some(playback) = self.playback.as_mut() {
            playback.active_quality = target;
            playback.is_buffering = true;
        }
        Ok(())
    }

    /// Set volume (clamped to [0, 1]). Recorded even when no player is bound.
    pub async fn set_volume(&mut self, volume: f32) -> Result<(), SessionError> {
        if self.state == SessionState::Closed {
            return Ok(());
        }
        let volume = clamp_unit(volume);

        if self.state.has_player() {
            let result = self.player.set_volume(volume).await;
            self.check(result)?;
        }
        if let Some(playback) = self.playback.as_mut() {
            playback.volume = volume;
        }
        Ok(())
    }

    /// Release the player and drop the stream. Idempotent.
    pub async fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        if let Err(e) = self.player.release().await {
            warn!(session = %self.id, error = %e, "player release failed");
        }
        info!(session = %self.id, "playback closed");
        self.state = SessionState::Closed;
        self.playback = None;
        self.stream = None;
    }

    /// Turn a backend failure into the Errored state
    fn check(&mut self, result: Result<(), PlayerError>) -> Result<(), SessionError> {
        if let Err(e) = result {
            warn!(session = %self.id, error = %e, "player command failed");
            self.state = SessionState::Errored;
            if let Some(playback) = self.playback.as_mut() {
                playback.is_playing = false;
                playback.is_buffering = false;
                playback.last_error = Some(e.to_string());
            }
            return Err(e.into());
        }
        Ok(())
    }

    fn set_playing(&mut self, playing: bool) {
        self.state = if playing {
            SessionState::Playing
        } else {
            SessionState::Paused
        };
        if let Some(playback) = self.playback.as_mut() {
            playback.is_playing = playing;
        }
    }
}

fn clamp_unit(v: f32) -> f32 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

// =============================================================================
// Single Active Session
// =============================================================================

/// Holds at most one live session. Opening a new one closes the old first.
pub struct SessionSlot<P: PlayerBackend> {
    current: Option<PlaybackSession<P>>,
}

impl<P: PlayerBackend> Default for SessionSlot<P> {
    fn default() -> Self {
        Self { current: None }
    }
}

impl<P: PlayerBackend> SessionSlot<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Close any prior session, then open `stream` on a fresh session
    pub async fn open(
        &mut self,
        player: P,
        stream: ResolvedStream,
    ) -> Result<&mut PlaybackSession<P>, SessionError> {
        self.close().await;
        let session = self.current.insert(PlaybackSession::new(player));
        session.open(stream).await?;
        Ok(session)
    }

    pub fn current(&self) -> Option<&PlaybackSession<P>> {
        self.current.as_ref()
    }

    /// Close and drop the current session, if any
    pub async fn close(&mut self) {
        if let Some(mut session) = self.current.take() {
            session.close().await;
        }
    }
}
