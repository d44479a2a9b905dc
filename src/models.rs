//! Data structures and types for StreamFlix
//!
//! Contains the shared models used across the application organized by domain:
//! - **Catalogue**: TMDB listings, search results and pagination
//! - **Titles**: what the user picked and wants resolved
//! - **Streams**: ranked stream variants and the resolved playback bundle

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// =============================================================================
// Catalogue Models (TMDB)
// =============================================================================

/// Media kind discriminator. Series serialize as `"tv"` to match the providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MediaKind {
    #[serde(rename = "movie")]
    Movie,
    #[serde(rename = "tv")]
    Series,
}

impl MediaKind {
    /// Wire name used by TMDB and the source provider
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::Series => "tv",
        }
    }

    /// Parse a provider media type; `None` for people and anything else
    pub fn from_wire(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "movie" => Some(MediaKind::Movie),
            "tv" | "series" => Some(MediaKind::Series),
            _ => None,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Movie => write!(f, "Movie"),
            MediaKind::Series => write!(f, "TV Show"),
        }
    }
}

/// One catalogue entry (listing row item or search hit)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TitleSummary {
    pub id: u64,
    pub media_kind: MediaKind,
    pub title: String,
    pub release_year: Option<u16>,
    pub overview: String,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub vote_average: f32,
}

impl TitleSummary {
    /// Build the identity needed to resolve this entry.
    ///
    /// Season/episode are dropped for movies.
    pub fn to_title_ref(&self, season: Option<u32>, episode: Option<u32>) -> TitleRef {
        let mut title_ref = TitleRef::new(self.id.to_string(), &self.title, self.media_kind);
        title_ref.release_year = self.release_year;
        if self.media_kind == MediaKind::Series {
            title_ref.season_index = season;
            title_ref.episode_index = episode;
        }
        title_ref
    }
}

impl fmt::Display for TitleSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let year_str = self
            .release_year
            .map(|y| format!(" ({})", y))
            .unwrap_or_default();
        write!(f, "{}{} [{}]", self.title, year_str, self.media_kind)
    }
}

/// Normalized paginated envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub results: Vec<T>,
    pub page: u32,
    pub total_pages: u32,
    pub total_results: u32,
}

impl<T> Page<T> {
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

/// Home-screen catalogue rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Trending,
    PopularMovies,
    PopularTv,
    TopRated,
    Upcoming,
    NowPlaying,
}

impl Category {
    /// Rows shown on the home screen, in display order
    pub const HOME: [Category; 5] = [
        Category::Trending,
        Category::PopularMovies,
        Category::PopularTv,
        Category::TopRated,
        Category::Upcoming,
    ];

    /// Provider endpoint path for this category
    pub fn endpoint(&self) -> &'static str {
        match self {
            Category::Trending => "trending/all/day",
            Category::PopularMovies => "movie/popular",
            Category::PopularTv => "tv/popular",
            Category::TopRated => "movie/top_rated",
            Category::Upcoming => "movie/upcoming",
            Category::NowPlaying => "movie/now_playing",
        }
    }

    /// Row heading
    pub fn label(&self) -> &'static str {
        match self {
            Category::Trending => "Trending Now",
            Category::PopularMovies => "Popular Movies",
            Category::PopularTv => "Popular TV Shows",
            Category::TopRated => "Top Rated",
            Category::Upcoming => "Coming Soon",
            Category::NowPlaying => "Now Playing",
        }
    }

    /// Movie-only endpoints don't tag their results with a media type
    pub fn implied_kind(&self) -> Option<MediaKind> {
        match self {
            Category::Trending => None,
            Category::PopularTv => Some(MediaKind::Series),
            _ => Some(MediaKind::Movie),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

// =============================================================================
// Title Identity
// =============================================================================

/// Identifies what to resolve. Built when a user selects a catalogue entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleRef {
    pub id: String,
    pub display_title: String,
    pub release_year: Option<u16>,
    pub media_kind: MediaKind,
    /// Series only
    pub season_index: Option<u32>,
    /// Series only
    pub episode_index: Option<u32>,
}

impl TitleRef {
    pub fn new(id: impl Into<String>, display_title: impl Into<String>, kind: MediaKind) -> Self {
        Self {
            id: id.into(),
            display_title: display_title.into(),
            release_year: None,
            media_kind: kind,
            season_index: None,
            episode_index: None,
        }
    }

    pub fn with_year(mut self, year: Option<u16>) -> Self {
        self.release_year = year;
        self
    }

    pub fn with_episode(mut self, season: Option<u32>, episode: Option<u32>) -> Self {
        self.season_index = season;
        self.episode_index = episode;
        self
    }
}

impl fmt::Display for TitleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_title)?;
        if let Some(year) = self.release_year {
            write!(f, " ({})", year)?;
        }
        if self.media_kind == MediaKind::Series {
            write!(
                f,
                " S{:02}E{:02}",
                self.season_index.unwrap_or(1),
                self.episode_index.unwrap_or(1)
            )?;
        }
        Ok(())
    }
}

// =============================================================================
// Stream Models
// =============================================================================

/// Quality label of a stream variant
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Quality {
    FHD1080p,
    HD720p,
    SD480p,
    LD360p,
    /// Anything the ranking table doesn't know (e.g. "4K", "auto", "")
    Other(String),
}

impl Quality {
    /// Parse a provider label, case-insensitive and trimmed
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "1080p" => Quality::FHD1080p,
            "720p" => Quality::HD720p,
            "480p" => Quality::SD480p,
            "360p" => Quality::LD360p,
            _ => Quality::Other(label.to_string()),
        }
    }

    /// Ranking for sorting (higher = better). Unknown labels rank with 360p.
    pub fn rank(&self) -> u8 {
        match self {
            Quality::FHD1080p => 3,
            Quality::HD720p => 2,
            Quality::SD480p => 1,
            Quality::LD360p | Quality::Other(_) => 0,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Quality::FHD1080p => "1080p",
            Quality::HD720p => "720p",
            Quality::SD480p => "480p",
            Quality::LD360p => "360p",
            Quality::Other(label) => label,
        }
    }

    /// Label comparison as used for manual quality switching
    pub fn matches(&self, label: &str) -> bool {
        self.label().eq_ignore_ascii_case(label.trim())
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl Serialize for Quality {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for Quality {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(Quality::from_label(&label))
    }
}

/// One playable variant. Produced only by the source locator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamCandidate {
    pub url: String,
    pub quality: Quality,
    /// "hls" unless the provider says otherwise
    pub container_hint: String,
}

impl fmt::Display for StreamCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} ({})", self.quality, self.url, self.container_hint)
    }
}

/// Playable stream bundle handed to the display layer.
///
/// Candidates are kept best-first and are never empty, so `primary()` is
/// always the first candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedStream {
    all_candidates: Vec<StreamCandidate>,
    request_headers: BTreeMap<String, String>,
    resolved_title: String,
}

impl ResolvedStream {
    /// Returns `None` when there is nothing to play
    pub fn new(
        ranked: Vec<StreamCandidate>,
        request_headers: BTreeMap<String, String>,
        resolved_title: impl Into<String>,
    ) -> Option<Self> {
        if ranked.is_empty() {
            return None;
        }
        Some(Self {
            all_candidates: ranked,
            request_headers,
            resolved_title: resolved_title.into(),
        })
    }

    pub fn primary(&self) -> &StreamCandidate {
        &self.all_candidates[0]
    }

    pub fn all_candidates(&self) -> &[StreamCandidate] {
        &self.all_candidates
    }

    /// Headers the CDN expects when fetching any candidate URL
    pub fn request_headers(&self) -> &BTreeMap<String, String> {
        &self.request_headers
    }

    pub fn resolved_title(&self) -> &str {
        &self.resolved_title
    }

    /// First candidate carrying the given quality label
    pub fn candidate_for(&self, label: &str) -> Option<&StreamCandidate> {
        self.all_candidates.iter().find(|c| c.quality.matches(label))
    }
}

impl fmt::Display for ResolvedStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {} ({} variants)",
            self.resolved_title,
            self.primary().quality,
            self.all_candidates.len()
        )
    }
}

/// Extract year from a date string like "2022-03-04"
pub fn extract_year(date: &str) -> Option<u16> {
    if date.len() >= 4 {
        date.get(..4)?.parse().ok()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(url: &str, quality: &str) -> StreamCandidate {
        StreamCandidate {
            url: url.to_string(),
            quality: Quality::from_label(quality),
            container_hint: "hls".to_string(),
        }
    }

    #[test]
    fn test_extract_year() {
        assert_eq!(extract_year("2022-03-04"), Some(2022));
        assert_eq!(extract_year("2019"), Some(2019));
        assert_eq!(extract_year(""), None);
        assert_eq!(extract_year("abc"), None);
    }

    #[test]
    fn test_quality_rank_table() {
        assert_eq!(Quality::from_label("1080p").rank(), 3);
        assert_eq!(Quality::from_label("720P").rank(), 2);
        assert_eq!(Quality::from_label(" 480p ").rank(), 1);
        assert_eq!(Quality::from_label("360p").rank(), 0);
        assert_eq!(Quality::from_label("4K").rank(), 0);
        assert_eq!(Quality::from_label("4K").label(), "4K");
    }

    #[test]
    fn test_media_kind_wire_names() {
        assert_eq!(MediaKind::from_wire("movie"), Some(MediaKind::Movie));
        assert_eq!(MediaKind::from_wire("tv"), Some(MediaKind::Series));
        assert_eq!(MediaKind::from_wire("person"), None);
        assert_eq!(
            serde_json::to_string(&MediaKind::Series).unwrap(),
            "\"tv\""
        );
    }

    #[test]
    fn test_resolved_stream_rejects_empty() {
        assert!(ResolvedStream::new(vec![], BTreeMap::new(), "x").is_none());
    }

    #[test]
    fn test_resolved_stream_primary_is_first() {
        let stream = ResolvedStream::new(
            vec![candidate("B", "1080p"), candidate("A", "720p")],
            BTreeMap::new(),
            "Title",
        )
        .unwrap();
        assert_eq!(stream.primary().url, "B");
        assert_eq!(stream.candidate_for("720p").map(|c| c.url.as_str()), Some("A"));
        assert!(stream.candidate_for("480p").is_none());
    }

    #[test]
    fn test_title_ref_from_summary_drops_episode_for_movies() {
        let summary = TitleSummary {
            id: 550,
            media_kind: MediaKind::Movie,
            title: "Fight Club".to_string(),
            release_year: Some(1999),
            overview: String::new(),
            poster_path: None,
            backdrop_path: None,
            vote_average: 8.4,
        };
        let title_ref = summary.to_title_ref(Some(2), Some(3));
        assert_eq!(title_ref.id, "550");
        assert_eq!(title_ref.release_year, Some(1999));
        assert_eq!(title_ref.season_index, None);
        assert_eq!(title_ref.episode_index, None);
    }

    #[test]
    fn test_title_ref_display() {
        let title_ref = TitleRef::new("1396", "Breaking Bad", MediaKind::Series)
            .with_year(Some(2008))
            .with_episode(Some(2), None);
        assert_eq!(title_ref.to_string(), "Breaking Bad (2008) S02E01");
    }
}
