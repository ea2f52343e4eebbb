use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use tabled::Tabled;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    pub refresh_token: String,
    pub scope: String,
    pub expires_in: u64,
    pub obtained_at: u64,
}

impl Token {
    /// Returns true when the token is expired or expires within `buffer_secs`.
    pub fn expires_within(&self, buffer_secs: u64, now: u64) -> bool {
        now + buffer_secs >= self.obtained_at + self.expires_in
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
    pub expires_in: u64,
}

// ---------------------------------------------------------------------------
// Spotify wire types
// ---------------------------------------------------------------------------

/// Offset based page as returned by most Spotify collection endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub offset: u32,
    #[serde(default)]
    pub limit: u32,
    pub next: Option<String>,
}

/// Item of `/me/tracks` and `/playlists/{id}/tracks`.
///
/// Playlist items can hold `null` tracks (removed or unavailable content).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackItem {
    pub track: Option<TrackObject>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackObject {
    /// `None` for local files.
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub artists: Vec<SimplifiedArtist>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimplifiedArtist {
    pub id: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub genres: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeveralArtistsResponse {
    pub artists: Vec<Option<Artist>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExternalUrls {
    pub spotify: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistTracksRef {
    pub total: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub public: Option<bool>,
    #[serde(default)]
    pub collaborative: bool,
    pub tracks: Option<PlaylistTracksRef>,
    #[serde(default)]
    pub external_urls: ExternalUrls,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePlaylistRequest {
    pub name: String,
    pub description: String,
    pub public: bool,
    pub collaborative: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePlaylistResponse {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub external_urls: ExternalUrls,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddTrackToPlaylistRequest {
    pub uris: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddTrackToPlaylistResponse {
    pub snapshot_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub status: u16,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Pipeline types
// ---------------------------------------------------------------------------

/// A cached genre lookup for one artist. Replaced as a whole on refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtistGenreCacheEntry {
    pub artist_id: String,
    pub genres: Vec<String>,
    /// Unix timestamp in seconds.
    pub cached_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum SourceTag {
    Liked,
    Playlist(String),
}

impl std::fmt::Display for SourceTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceTag::Liked => write!(f, "liked"),
            SourceTag::Playlist(id) => write!(f, "playlist:{}", id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRecord {
    pub id: String,
    pub name: String,
    pub artist_ids: Vec<String>,
    pub source: SourceTag,
}

/// Insertion-ordered set of track ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct TrackIdSet {
    ids: Vec<String>,
    seen: HashSet<String>,
}

impl TrackIdSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `id` unless already present. Returns whether it was added.
    pub fn insert(&mut self, id: &str) -> bool {
        if self.seen.contains(id) {
            return false;
        }
        self.seen.insert(id.to_string());
        self.ids.push(id.to_string());
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.ids
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.ids.iter()
    }
}

impl From<Vec<String>> for TrackIdSet {
    fn from(ids: Vec<String>) -> Self {
        let mut set = TrackIdSet::new();
        for id in &ids {
            set.insert(id);
        }
        set
    }
}

impl From<TrackIdSet> for Vec<String> {
    fn from(set: TrackIdSet) -> Self {
        set.ids
    }
}

/// Genre name to track ids. Genre keys are normalised on insert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenreBuckets(BTreeMap<String, TrackIdSet>);

impl GenreBuckets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, genre: &str, track_id: &str) -> bool {
        let key = crate::utils::normalize_genre(genre);
        if key.is_empty() {
            return false;
        }
        self.0.entry(key).or_default().insert(track_id)
    }

    pub fn get(&self, genre: &str) -> Option<&TrackIdSet> {
        self.0.get(&crate::utils::normalize_genre(genre))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn genres(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &TrackIdSet)> {
        self.0.iter()
    }

    /// Drops every genre with fewer than `min` tracks.
    pub fn retain_min_tracks(&mut self, min: usize) {
        self.0.retain(|_, ids| ids.len() >= min);
    }

    /// Keeps only the listed genres (compared after normalisation).
    pub fn retain_genres(&mut self, genres: &[String]) {
        let wanted: HashSet<String> = genres
            .iter()
            .map(|g| crate::utils::normalize_genre(g))
            .collect();
        self.0.retain(|genre, _| wanted.contains(genre));
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationResult {
    pub buckets: GenreBuckets,
    /// Deduplicated tracks in source priority order.
    pub tracks: Vec<TrackRecord>,
    /// Tracks that did not end up in any bucket.
    pub untagged: usize,
    /// Sum of the totals Spotify reported for every selected source.
    pub library_size: u64,
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkCreationResult {
    pub genre: String,
    pub success: bool,
    pub skipped: bool,
    pub playlist_id: Option<String>,
    pub playlist_url: Option<String>,
    pub error: Option<String>,
}

impl BulkCreationResult {
    pub fn succeeded(genre: &str, playlist: &CreatePlaylistResponse) -> Self {
        Self {
            genre: genre.to_string(),
            success: true,
            skipped: false,
            playlist_id: Some(playlist.id.clone()),
            playlist_url: playlist.external_urls.spotify.clone(),
            error: None,
        }
    }

    pub fn skipped(genre: &str) -> Self {
        Self {
            genre: genre.to_string(),
            success: false,
            skipped: true,
            playlist_id: None,
            playlist_url: None,
            error: None,
        }
    }

    pub fn failed(genre: &str, error: impl Into<String>) -> Self {
        Self {
            genre: genre.to_string(),
            success: false,
            skipped: false,
            playlist_id: None,
            playlist_url: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl BulkSummary {
    pub fn from_results(results: &[BulkCreationResult]) -> Self {
        results.iter().fold(
            BulkSummary {
                total: results.len(),
                ..Default::default()
            },
            |mut summary, r| {
                if r.success {
                    summary.successful += 1;
                } else if r.skipped {
                    summary.skipped += 1;
                } else {
                    summary.failed += 1;
                }
                summary
            },
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkCreationReport {
    pub results: Vec<BulkCreationResult>,
    pub summary: BulkSummary,
}

#[derive(Tabled)]
pub struct GenreTableRow {
    pub genre: String,
    pub tracks: usize,
}

#[derive(Tabled)]
pub struct BulkResultTableRow {
    pub genre: String,
    pub status: String,
    pub details: String,
}

#[derive(Tabled)]
pub struct PlaylistTableRow {
    pub name: String,
    pub id: String,
    pub tracks: String,
}
