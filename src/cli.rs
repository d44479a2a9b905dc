//! CLI - Command Line Interface for StreamFlix
//!
//! Every action is scriptable. All output is JSON-parseable.
//!
//! # Examples
//!
//! ```bash
//! # Browse the catalogue
//! streamflix home --json
//! streamflix browse popular-movies --page 2
//! streamflix search "the batman"
//!
//! # Resolve and play
//! streamflix resolve 438631 --title "Dune" --year 2021
//! streamflix play 95396 --title "Severance" --tv -s 1 -e 3 --quality 720p
//!
//! # Serve the HTTP API
//! streamflix serve --bind 0.0.0.0:3000
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::io::IsTerminal;
use std::path::PathBuf;

use crate::api::source::ResolveError;
use crate::models::{Category, MediaKind};

// =============================================================================
// Exit Codes
// =============================================================================

/// Exit codes for CLI operations (semantic for scripting)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success
    Success = 0,
    /// General error
    Error = 1,
    /// Invalid arguments
    InvalidArgs = 2,
    /// Network error
    NetworkError = 3,
    /// No streams available
    NoStreams = 5,
    /// Player failed
    PlayerFailed = 6,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

impl From<&ResolveError> for ExitCode {
    fn from(e: &ResolveError) -> Self {
        match e {
            ResolveError::InvalidRequest(_) => ExitCode::InvalidArgs,
            ResolveError::UpstreamUnavailable(_) => ExitCode::NetworkError,
            ResolveError::DecryptionFailed(_) | ResolveError::NoStreamFound => ExitCode::NoStreams,
        }
    }
}

// =============================================================================
// Main CLI Structure
// =============================================================================

/// StreamFlix - browse movies and TV, resolve streams, play them in mpv
#[derive(Parser, Debug)]
#[command(
    name = "streamflix",
    version,
    about = "Movie/TV catalogue browser with stream resolution",
    long_about = "Browse the TMDB catalogue, resolve a title to its ranked \
                  HLS streams and play them in mpv.\n\n\
                  Use `serve` to expose the same pipeline over HTTP.",
    after_help = "EXAMPLES:\n\
                  streamflix home                          Home rows\n\
                  streamflix search \"blade runner\"         Search titles\n\
                  streamflix resolve 78 -t \"Blade Runner\"  Resolve streams\n\
                  streamflix serve                         Run the HTTP API"
)]
pub struct Cli {
    /// Output format as JSON (default for non-TTY)
    #[arg(long, short = 'j', global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Path to config file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Check if JSON output should be used
    pub fn should_json(&self) -> bool {
        self.json || !std::io::stdout().is_terminal()
    }
}

// =============================================================================
// Subcommands
// =============================================================================

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP API
    Serve(ServeCmd),

    /// Show every home row (fetched concurrently)
    Home,

    /// Browse one catalogue category
    #[command(visible_alias = "b")]
    Browse(BrowseCmd),

    /// Search movies and TV shows
    #[command(visible_alias = "s")]
    Search(SearchCmd),

    /// Resolve a title to its ranked streams
    #[command(visible_alias = "r")]
    Resolve(ResolveCmd),

    /// Resolve a title and play it in mpv
    #[command(visible_alias = "p")]
    Play(PlayCmd),

    /// Show or clear recently picked titles
    Recent(RecentCmd),
}

/// Run the HTTP API
#[derive(Args, Debug)]
pub struct ServeCmd {
    /// Listen address (overrides config)
    #[arg(long, short = 'b')]
    pub bind: Option<String>,
}

/// Category names accepted on the command line
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryArg {
    Trending,
    PopularMovies,
    PopularTv,
    TopRated,
    Upcoming,
    NowPlaying,
}

impl From<CategoryArg> for Category {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::Trending => Category::Trending,
            CategoryArg::PopularMovies => Category::PopularMovies,
            CategoryArg::PopularTv => Category::PopularTv,
            CategoryArg::TopRated => Category::TopRated,
            CategoryArg::Upcoming => Category::Upcoming,
            CategoryArg::NowPlaying => Category::NowPlaying,
        }
    }
}

/// Browse one catalogue category
#[derive(Args, Debug)]
pub struct BrowseCmd {
    #[arg(value_enum)]
    pub category: CategoryArg,

    /// Page number (1-based)
    #[arg(long, default_value = "1")]
    pub page: u32,

    /// Maximum number of results
    #[arg(long, short = 'l', default_value = "20")]
    pub limit: usize,
}

/// Search by title or keywords
#[derive(Args, Debug)]
pub struct SearchCmd {
    #[arg(required = true)]
    pub query: String,

    /// Page number (1-based)
    #[arg(long, default_value = "1")]
    pub page: u32,

    /// Maximum number of results
    #[arg(long, short = 'l', default_value = "20")]
    pub limit: usize,
}

/// Identity of the title to resolve
#[derive(Args, Debug, Clone)]
pub struct TitleArgs {
    /// TMDB ID
    #[arg(required = true)]
    pub tmdb_id: u64,

    /// Display title (looked up on TMDB when omitted)
    #[arg(long, short = 't')]
    pub title: Option<String>,

    /// Release year
    #[arg(long, short = 'y')]
    pub year: Option<u16>,

    /// Treat the ID as a TV show
    #[arg(long)]
    pub tv: bool,

    /// Season number (TV only, default 1)
    #[arg(long, short = 's', requires = "tv")]
    pub season: Option<u32>,

    /// Episode number (TV only, default 1)
    #[arg(long, short = 'e', requires = "tv")]
    pub episode: Option<u32>,

    /// Source server (overrides config)
    #[arg(long)]
    pub server: Option<String>,
}

impl TitleArgs {
    pub fn media_kind(&self) -> MediaKind {
        if self.tv {
            MediaKind::Series
        } else {
            MediaKind::Movie
        }
    }
}

/// Resolve a title to its ranked streams
#[derive(Args, Debug)]
pub struct ResolveCmd {
    #[command(flatten)]
    pub title: TitleArgs,
}

/// Resolve and play in mpv
#[derive(Args, Debug)]
pub struct PlayCmd {
    #[command(flatten)]
    pub title: TitleArgs,

    /// Switch to this quality once playback starts (e.g. 720p, auto)
    #[arg(long, short = 'Q')]
    pub quality: Option<String>,

    /// Volume 0-100
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub volume: Option<u8>,
}

/// Show or clear recent titles
#[derive(Args, Debug)]
pub struct RecentCmd {
    /// Forget all recent titles
    #[arg(long)]
    pub clear: bool,
}

// =============================================================================
// JSON Output Types
// =============================================================================

/// Generic JSON output wrapper with status
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonOutput<T: Serialize> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "is_zero")]
    pub exit_code: i32,
}

fn is_zero(n: &i32) -> bool {
    *n == 0
}

impl<T: Serialize> JsonOutput<T> {
    pub fn success(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
            exit_code: 0,
        }
    }

    pub fn error_msg(msg: impl Into<String>, code: ExitCode) -> JsonOutput<()> {
        JsonOutput::<()> {
            data: None,
            error: Some(msg.into()),
            exit_code: code.into(),
        }
    }
}

// =============================================================================
// Output Helpers
// =============================================================================

/// Output handler for consistent formatting
pub struct Output {
    pub json: bool,
    pub quiet: bool,
}

impl Output {
    pub fn new(cli: &Cli) -> Self {
        Self {
            json: cli.should_json(),
            quiet: cli.quiet,
        }
    }

    /// Print success data as the JSON envelope
    pub fn print<T: Serialize>(&self, data: T) -> anyhow::Result<()> {
        let output = JsonOutput::success(data);
        println!("{}", serde_json::to_string_pretty(&output)?);
        Ok(())
    }

    /// Print a plain line (human mode only)
    pub fn line(&self, msg: impl std::fmt::Display) {
        if !self.json {
            println!("{}", msg);
        }
    }

    /// Print error and return exit code
    pub fn error(&self, msg: impl Into<String>, code: ExitCode) -> ExitCode {
        let msg = msg.into();
        if self.json {
            let output = JsonOutput::<()>::error_msg(&msg, code);
            if let Ok(json) = serde_json::to_string_pretty(&output) {
                eprintln!("{}", json);
            }
        } else if !self.quiet {
            eprintln!("Error: {}", msg);
        }
        code
    }

    /// Print info message (suppressed in quiet mode)
    pub fn info(&self, msg: impl std::fmt::Display) {
        if !self.quiet && !self.json {
            eprintln!("{}", msg);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_search_command() {
        let cli = Cli::parse_from(["streamflix", "search", "batman"]);
        if let Command::Search(cmd) = cli.command {
            assert_eq!(cmd.query, "batman");
            assert_eq!(cmd.page, 1);
        } else {
            panic!("Expected Search command");
        }
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::parse_from(["streamflix", "--json", "--quiet", "-vv", "home"]);
        assert!(cli.json);
        assert!(cli.quiet);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Command::Home));
    }

    #[test]
    fn test_browse_category() {
        let cli = Cli::parse_from(["streamflix", "browse", "popular-tv", "--page", "3"]);
        if let Command::Browse(cmd) = cli.command {
            assert_eq!(Category::from(cmd.category), Category::PopularTv);
            assert_eq!(cmd.page, 3);
        } else {
            panic!("Expected Browse command");
        }
    }

    #[test]
    fn test_play_with_options() {
        let cli = Cli::parse_from([
            "streamflix", "play", "95396", "-t", "Severance", "--tv", "-s", "1", "-e", "3", "-Q",
            "720p", "--volume", "40",
        ]);
        if let Command::Play(cmd) = cli.command {
            assert_eq!(cmd.title.tmdb_id, 95396);
            assert_eq!(cmd.title.media_kind(), MediaKind::Series);
            assert_eq!(cmd.title.season, Some(1));
            assert_eq!(cmd.title.episode, Some(3));
            assert_eq!(cmd.quality.as_deref(), Some("720p"));
            assert_eq!(cmd.volume, Some(40));
        } else {
            panic!("Expected Play command");
        }
    }

    #[test]
    fn test_season_requires_tv() {
        let result = Cli::try_parse_from(["streamflix", "resolve", "78", "-s", "1"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_volume_out_of_range() {
        let result = Cli::try_parse_from(["streamflix", "play", "78", "--volume", "150"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_resolve_error_exit_codes() {
        assert_eq!(ExitCode::from(&ResolveError::InvalidRequest("x".into())), ExitCode::InvalidArgs);
        assert_eq!(
            ExitCode::from(&ResolveError::UpstreamUnavailable("x".into())),
            ExitCode::NetworkError
        );
        assert_eq!(ExitCode::from(&ResolveError::NoStreamFound), ExitCode::NoStreams);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(i32::from(ExitCode::Success), 0);
        assert_eq!(i32::from(ExitCode::Error), 1);
        assert_eq!(i32::from(ExitCode::InvalidArgs), 2);
        assert_eq!(i32::from(ExitCode::NetworkError), 3);
        assert_eq!(i32::from(ExitCode::NoStreams), 5);
        assert_eq!(i32::from(ExitCode::PlayerFailed), 6);
    }
}
