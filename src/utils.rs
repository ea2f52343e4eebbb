use std::{cmp::Ordering, collections::HashSet, time::Duration};

use indicatif::{ProgressBar, ProgressStyle};

use crate::types::{GenreTableRow, TrackRecord};

/// Suffix appended to every playlist created from a genre bucket.
pub const PLAYLIST_NAME_SUFFIX: &str = " (from Likes)";

/// Canonical form of a genre name: trimmed, lower-cased, inner whitespace collapsed.
pub fn normalize_genre(genre: &str) -> String {
    genre
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Playlist name derived from a genre, e.g. `rock (from Likes)`.
pub fn playlist_name_for(genre: &str) -> String {
    format!("{}{}", genre, PLAYLIST_NAME_SUFFIX)
}

pub fn track_uri(track_id: &str) -> String {
    format!("spotify:track:{}", track_id)
}

/// Collects the artist ids of all tracks, first occurrence wins.
pub fn unique_artist_ids(tracks: &[TrackRecord]) -> Vec<String> {
    let mut seen = HashSet::new();
    tracks
        .iter()
        .flat_map(|t| t.artist_ids.iter())
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}

/// Merges genre lists preserving first-seen order and dropping duplicates.
pub fn merge_genres<'a, I>(lists: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a Vec<String>>,
{
    let mut seen = HashSet::new();
    let mut merged = Vec::new();
    for genre in lists.into_iter().flatten() {
        let normalized = normalize_genre(genre);
        if !normalized.is_empty() && seen.insert(normalized.clone()) {
            merged.push(normalized);
        }
    }
    merged
}

pub fn sort_genre_table_rows(rows: &mut [GenreTableRow]) {
    rows.sort_by(|a, b| {
        match b.tracks.cmp(&a.tracks) {
            Ordering::Equal => a.genre.cmp(&b.genre), // secondary sort: name ascending
            other => other,
        }
    });
}

pub fn days(days: u64) -> Duration {
    Duration::from_secs(days * 24 * 60 * 60)
}

pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    if let Ok(style) = ProgressStyle::with_template("{spinner:.blue} {msg}") {
        pb.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
    }
    pb
}
