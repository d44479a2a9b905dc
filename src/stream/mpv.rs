//! mpv player backend
//!
//! Spawns mpv bound to the stream URL and the CDN headers, then drives it
//! over its JSON IPC socket. A reader task turns mpv's IPC messages into
//! [`PlayerEvent`]s delivered on an unbounded channel.
//!
//! A rebind (quality switch) restarts mpv with `--start` at the current
//! position; the brief rebuffer shows up as `Buffering(true)`.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use super::player::{MediaSource, PlayerBackend, PlayerError, PlayerEvent};

/// Properties observed over IPC, in observe-id order
const OBSERVED: [&str; 5] = ["time-pos", "duration", "pause", "paused-for-cache", "volume"];

/// How long to wait for mpv to open its IPC socket
const CONNECT_ATTEMPTS: u32 = 50;
const CONNECT_INTERVAL: Duration = Duration::from_millis(100);

type IpcWriter = Box<dyn AsyncWrite + Unpin + Send>;

/// mpv driven over JSON IPC
pub struct MpvPlayer {
    binary: String,
    socket_path: PathBuf,
    child: Option<Child>,
    writer: Option<IpcWriter>,
    reader: Option<JoinHandle<()>>,
    events: mpsc::UnboundedSender<PlayerEvent>,
}

impl MpvPlayer {
    /// Create a player and the receiver its events arrive on
    pub fn new(binary: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<PlayerEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let socket_path =
            std::env::temp_dir().join(format!("streamflix-mpv-{}.sock", Uuid::new_v4()));
        let player = Self {
            binary: binary.into(),
            socket_path,
            child: None,
            writer: None,
            reader: None,
            events,
        };
        (player, rx)
    }

    /// Check if mpv is available on the system
    pub async fn is_available(&self) -> bool {
        if self.binary.contains('/') {
            return std::path::Path::new(&self.binary).exists();
        }

        Command::new("which")
            .arg(&self.binary)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Command-line arguments for binding mpv to a source
    pub fn build_args(&self, source: &MediaSource) -> Vec<String> {
        let mut args = vec![
            source.url.clone(),
            format!("--input-ipc-server={}", self.socket_path.display()),
            "--force-window=immediate".to_string(),
            "--no-terminal".to_string(),
            format!("--volume={}", (source.volume.clamp(0.0, 1.0) * 100.0).round()),
        ];

        for (name, value) in &source.headers {
            if name.eq_ignore_ascii_case("user-agent") {
                args.push(format!("--user-agent={}", value));
            } else if name.eq_ignore_ascii_case("referer") {
                args.push(format!("--referrer={}", value));
            } else {
                // -append adds one entry without splitting on commas
                args.push(format!("--http-header-fields-append={}: {}", name, value));
            }
        }

        if let Some(start) = source.start_position.filter(|s| *s > 0.0) {
            args.push(format!("--start=+{:.3}", start));
        }
        if !source.autoplay {
            args.push("--pause".to_string());
        }
        args
    }

    fn spawn(&self, source: &MediaSource) -> Result<Child, PlayerError> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(self.build_args(source))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PlayerError::NotFound(self.binary.clone())
            } else {
                PlayerError::StartFailed(e)
            }
        })
    }

    #[cfg(unix)]
    async fn connect(&mut self) -> Result<(), PlayerError> {
        use tokio::net::UnixStream;

        for _ in 0..CONNECT_ATTEMPTS {
            if let Some(child) = self.child.as_mut() {
                if let Ok(Some(status)) = child.try_wait() {
                    return Err(PlayerError::Control(format!("mpv exited early ({})", status)));
                }
            }

            match UnixStream::connect(&self.socket_path).await {
                Ok(stream) => {
                    let (read_half, write_half) = stream.into_split();
                    self.reader = Some(spawn_reader(read_half, self.events.clone()));
                    self.writer = Some(Box::new(write_half));
                    return Ok(());
                }
                Err(_) => tokio::time::sleep(CONNECT_INTERVAL).await,
            }
        }
        Err(PlayerError::Control("mpv IPC socket never appeared".into()))
    }

    #[cfg(not(unix))]
    async fn connect(&mut self) -> Result<(), PlayerError> {
        Err(PlayerError::Unsupported)
    }

    /// Send one IPC command
    async fn command(&mut self, args: Value) -> Result<(), PlayerError> {
        let writer = self.writer.as_mut().ok_or(PlayerError::NotLoaded)?;
        let mut line = json!({ "command": args }).to_string();
        line.push('\n');
        writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| PlayerError::Control(e.to_string()))
    }

    /// Tear down the current process, socket and reader
    async fn shutdown(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        self.writer = None;
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill().await {
                debug!(error = %e, "mpv already gone");
            }
        }
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

#[async_trait]
impl PlayerBackend for MpvPlayer {
    async fn load(&mut self, source: &MediaSource) -> Result<(), PlayerError> {
        if cfg!(not(unix)) {
            return Err(PlayerError::Unsupported);
        }

        self.shutdown().await;
        self.child = Some(self.spawn(source)?);

        if let Err(e) = self.connect().await {
            self.shutdown().await;
            return Err(e);
        }

        for (id, name) in OBSERVED.iter().enumerate() {
            self.command(json!(["observe_property", id + 1, name])).await?;
        }
        Ok(())
    }

    async fn play(&mut self) -> Result<(), PlayerError> {
        self.command(json!(["set_property", "pause", false])).await
    }

    async fn pause(&mut self) -> Result<(), PlayerError> {
        self.command(json!(["set_property", "pause", true])).await
    }

    async fn seek(&mut self, position: f64) -> Result<(), PlayerError> {
        self.command(json!(["seek", position, "absolute"])).await
    }

    async fn set_volume(&mut self, volume: f32) -> Result<(), PlayerError> {
        let percent = (volume.clamp(0.0, 1.0) * 100.0).round();
        self.command(json!(["set_property", "volume", percent])).await
    }

    async fn release(&mut self) -> Result<(), PlayerError> {
        self.shutdown().await;
        Ok(())
    }
}

fn spawn_reader<R>(read_half: R, events: mpsc::UnboundedSender<PlayerEvent>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(read_half).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if let Some(event) = parse_ipc_line(&line) {
                        if events.send(event).is_err() {
                            return;
                        }
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "mpv IPC read failed");
                    break;
                }
            }
        }
        let _ = events.send(PlayerEvent::Exited);
    })
}

/// Translate one mpv IPC message into a player event.
///
/// Command replies and events the session doesn't care about give `None`.
pub fn parse_ipc_line(line: &str) -> Option<PlayerEvent> {
    let msg: Value = serde_json::from_str(line.trim()).ok()?;
    let event = msg.get("event")?.as_str()?;

    match event {
        "playback-restart" => Some(PlayerEvent::FirstFrame { duration: None }),
        "end-file" => match msg.get("reason").and_then(Value::as_str) {
            Some("eof") => Some(PlayerEvent::Ended),
            Some("error") => {
                let reason = msg
                    .get("file_error")
                    .and_then(Value::as_str)
                    .unwrap_or("playback error");
                Some(PlayerEvent::Fault(reason.to_string()))
            }
            _ => None,
        },
        "property-change" => {
            let data = msg.get("data")?;
            match msg.get("name")?.as_str()? {
                "time-pos" => Some(PlayerEvent::TimeUpdate {
                    position: data.as_f64()?,
                }),
                "duration" => Some(PlayerEvent::DurationChanged(data.as_f64()?)),
                "pause" => Some(if data.as_bool()? {
                    PlayerEvent::Paused
                } else {
                    PlayerEvent::Played
                }),
                "paused-for-cache" => Some(PlayerEvent::Buffering(data.as_bool()?)),
                "volume" => Some(PlayerEvent::VolumeChanged((data.as_f64()? / 100.0) as f32)),
                _ => None,
            }
        }
        _ => None,
    }
}
