//! CLI Command Handlers
//!
//! Implements all CLI commands by calling the appropriate backend services.
//! Each handler takes CLI args, the loaded config and Output, returns ExitCode.

use anyhow::{anyhow, Context};
use serde::Serialize;
use tracing::{debug, warn};

use crate::api::source::SourceLocator;
use crate::api::tmdb::{fetch_home, TmdbClient, TmdbError};
use crate::cli::{
    BrowseCmd, ExitCode, Output, PlayCmd, RecentCmd, ResolveCmd, SearchCmd, ServeCmd, TitleArgs,
};
use crate::config::Config;
use crate::models::{Category, Page, ResolvedStream, TitleRef, TitleSummary};
use crate::recent::{FileStore, RecentSearches};
use crate::server;
use crate::stream::session::{SessionSlot, SessionState};
use crate::stream::{MpvPlayer, PlayerEvent};

// =============================================================================
// Serve Command
// =============================================================================

pub async fn serve_cmd(cmd: ServeCmd, mut config: Config, output: &Output) -> ExitCode {
    if let Some(bind) = cmd.bind {
        config.bind = bind;
    }
    output.info(format!("Serving on http://{}", config.bind));

    match server::run(config).await {
        Ok(()) => ExitCode::Success,
        Err(e) => output.error(format!("Server failed: {}", e), ExitCode::NetworkError),
    }
}

// =============================================================================
// Catalogue Commands
// =============================================================================

pub async fn home_cmd(config: &Config, output: &Output) -> ExitCode {
    let client = TmdbClient::from_config(config);
    output.info("Fetching home rows...");

    let rows = fetch_home(&client, &Category::HOME).await;
    if rows.iter().all(|r| r.error.is_some()) {
        let first = rows.iter().find_map(|r| r.error.clone()).unwrap_or_default();
        return output.error(format!("Catalogue unavailable: {}", first), ExitCode::NetworkError);
    }

    if output.json {
        return print_or_fail(output, &rows);
    }
    for row in &rows {
        output.line(format!("== {} ==", row.label));
        if let Some(error) = &row.error {
            output.line(format!("  (unavailable: {})", error));
        }
        for title in row.titles.iter().take(10) {
            output.line(format!("  {}", summary_line(title)));
        }
    }
    ExitCode::Success
}

pub async fn browse_cmd(cmd: BrowseCmd, config: &Config, output: &Output) -> ExitCode {
    let client = TmdbClient::from_config(config);
    let category = Category::from(cmd.category);
    output.info(format!("Fetching {} (page {})...", category, cmd.page));

    let result = client.category(category, cmd.page).await;
    page_result(result, cmd.limit, output)
}

pub async fn search_cmd(cmd: SearchCmd, config: &Config, output: &Output) -> ExitCode {
    if cmd.query.trim().is_empty() {
        return output.error("Search query is empty", ExitCode::InvalidArgs);
    }
    let client = TmdbClient::from_config(config);
    output.info(format!("Searching for: {}", cmd.query));

    let result = client.search(cmd.query.trim(), cmd.page).await;
    page_result(result, cmd.limit, output)
}

fn page_result(result: Result<Page<TitleSummary>, TmdbError>, limit: usize, output: &Output) -> ExitCode {
    match result {
        Ok(mut page) => {
            page.results.truncate(limit);
            if output.json {
                return print_or_fail(output, &page);
            }
            for title in &page.results {
                output.line(summary_line(title));
            }
            output.info(format!("Page {} of {}", page.page, page.total_pages));
            ExitCode::Success
        }
        Err(TmdbError::InvalidEndpoint(e)) => output.error(format!("Invalid endpoint: {}", e), ExitCode::InvalidArgs),
        Err(e) => output.error(e.to_string(), ExitCode::NetworkError),
    }
}

fn summary_line(title: &TitleSummary) -> String {
    format!("{:>8}  {}  [{}]  ★ {:.1}", title.id, title, title.media_kind, title.vote_average)
}

// =============================================================================
// Resolve Command
// =============================================================================

/// Resolved stream plus the title it was resolved for
#[derive(Debug, Serialize)]
struct ResolveOutput<'a> {
    title: &'a TitleRef,
    stream: &'a ResolvedStream,
}

pub async fn resolve_cmd(cmd: ResolveCmd, config: &Config, output: &Output) -> ExitCode {
    let title = match title_ref(&cmd.title, config, output).await {
        Ok(title) => title,
        Err(code) => return code,
    };

    let stream = match resolve(&title, cmd.title.server.as_deref(), config, output).await {
        Ok(stream) => stream,
        Err(code) => return code,
    };

    if output.json {
        return print_or_fail(output, &ResolveOutput { title: &title, stream: &stream });
    }
    output.line(format!("{}", stream));
    for candidate in stream.all_candidates() {
        output.line(format!("  {}", candidate));
    }
    ExitCode::Success
}

/// Build the title identity, looking the display title up on TMDB when the
/// caller didn't pass one. Picked titles go to the recent list.
async fn title_ref(args: &TitleArgs, config: &Config, output: &Output) -> Result<TitleRef, ExitCode> {
    let kind = args.media_kind();

    let summary = match &args.title {
        Some(title) if !title.trim().is_empty() => TitleSummary {
            id: args.tmdb_id,
            media_kind: kind,
            title: title.trim().to_string(),
            release_year: args.year,
            overview: String::new(),
            poster_path: None,
            backdrop_path: None,
            vote_average: 0.0,
        },
        _ => {
            output.info(format!("Looking up {} {} on TMDB...", kind, args.tmdb_id));
            TmdbClient::from_config(config)
                .details(kind, args.tmdb_id)
                .await
                .map_err(|e| output.error(format!("Title lookup failed: {}", e), ExitCode::NetworkError))?
        }
    };

    let mut title = summary.to_title_ref(args.season, args.episode);
    if args.year.is_some() {
        title = title.with_year(args.year);
    }

    if let Err(e) = remember(summary) {
        warn!(error = %e, "could not update recent titles");
    }
    Ok(title)
}

fn remember(summary: TitleSummary) -> anyhow::Result<()> {
    let mut recent = open_recent()?;
    recent.record(summary).context("saving recent titles")?;
    Ok(())
}

async fn resolve(
    title: &TitleRef,
    server: Option<&str>,
    config: &Config,
    output: &Output,
) -> Result<ResolvedStream, ExitCode> {
    output.info(format!("Resolving streams for {}...", title));
    SourceLocator::from_config(config)
        .resolve(title, server)
        .await
        .map_err(|e| output.error(e.to_string(), ExitCode::from(&e)))
}

// =============================================================================
// Play Command
// =============================================================================

pub async fn play_cmd(cmd: PlayCmd, config: &Config, output: &Output) -> ExitCode {
    let (player, mut events) = MpvPlayer::new(&config.mpv_path);
    if !player.is_available().await {
        return output.error(
            format!("{} not found. Install mpv or set mpv_path in the config.", config.mpv_path),
            ExitCode::PlayerFailed,
        );
    }

    let title = match title_ref(&cmd.title, config, output).await {
        Ok(title) => title,
        Err(code) => return code,
    };
    let stream = match resolve(&title, cmd.title.server.as_deref(), config, output).await {
        Ok(stream) => stream,
        Err(code) => return code,
    };
    output.info(format!("Playing {}", stream));

    let mut slot = SessionSlot::new();
    let session = match slot.open(player, stream).await {
        Ok(session) => session,
        Err(e) => return output.error(format!("Player failed to start: {}", e), ExitCode::PlayerFailed),
    };

    if let Some(volume) = cmd.volume {
        if let Err(e) = session.set_volume(f32::from(volume) / 100.0).await {
            warn!(error = %e, "could not apply volume");
        }
    }

    let mut quality = cmd.quality.clone();
    let result = loop {
        let event = tokio::select! {
            event = events.recv() => event,
            _ = tokio::signal::ctrl_c() => break Ok(()),
        };
        let Some(event) = event else {
            break Ok(());
        };
        debug!(?event, "player event");

        let first_frame = matches!(event, PlayerEvent::FirstFrame { .. });
        // Quitting mpv once playback started is a normal way to stop
        let finished = match event {
            PlayerEvent::Ended => true,
            PlayerEvent::Exited => session.state().is_active(),
            _ => false,
        };
        session.handle_event(event);
        if finished {
            break Ok(());
        }

        if first_frame {
            if let Some(label) = quality.take() {
                if let Err(e) = session.switch_quality(&label).await {
                    break Err(anyhow!(e));
                }
            }
        }

        if session.state() == SessionState::Errored {
            let reason = session
                .playback()
                .and_then(|p| p.last_error.clone())
                .unwrap_or_else(|| "player fault".to_string());
            break Err(anyhow!(reason));
        }
    };

    slot.close().await;
    match result {
        Ok(()) => {
            output.info("Playback finished");
            ExitCode::Success
        }
        Err(e) => output.error(format!("Playback failed: {}", e), ExitCode::PlayerFailed),
    }
}

// =============================================================================
// Recent Command
// =============================================================================

pub async fn recent_cmd(cmd: RecentCmd, output: &Output) -> ExitCode {
    let mut recent = match open_recent() {
        Ok(recent) => recent,
        Err(e) => return output.error(format!("{:#}", e), ExitCode::Error),
    };

    if cmd.clear {
        if let Err(e) = recent.clear() {
            return output.error(format!("Could not clear recent titles: {}", e), ExitCode::Error);
        }
        output.info("Recent titles cleared");
        return ExitCode::Success;
    }

    if output.json {
        return print_or_fail(output, recent.items());
    }
    if recent.is_empty() {
        output.info("No recent titles");
    }
    for title in recent.items() {
        output.line(summary_line(title));
    }
    ExitCode::Success
}

fn open_recent() -> anyhow::Result<RecentSearches<FileStore>> {
    let store = FileStore::default_location().context("no user data directory")?;
    Ok(RecentSearches::load(store))
}

fn print_or_fail<T: Serialize>(output: &Output, data: T) -> ExitCode {
    match output.print(data) {
        Ok(()) => ExitCode::Success,
        Err(e) => output.error(format!("Failed to serialize: {}", e), ExitCode::Error),
    }
}
