//! Configuration management for genrefy.
//!
//! Values come from environment variables and a `.env` file in the local data
//! directory. The process environment always wins over the file, and every
//! setting has a default so the pipeline can be built without any file at all.
//!
//! The configuration system follows a hierarchical approach:
//! 1. Environment variables (highest priority)
//! 2. `.env` file in the local data directory
//! 3. Application defaults

use std::{env, path::PathBuf, str::FromStr, time::Duration};

use crate::{pipeline::AggregatorOptions, spotify::RetryPolicy, utils};

pub const DEFAULT_SPOTIFY_API_URL: &str = "https://api.spotify.com/v1";
pub const DEFAULT_SPOTIFY_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

/// Spotify caps `/me/tracks` pages at 50 items.
pub const LIKED_PAGE_SIZE: u32 = 50;
/// Spotify caps `/playlists/{id}/tracks` pages at 100 items.
pub const PLAYLIST_PAGE_SIZE: u32 = 100;
/// Spotify caps `/artists?ids=` at 50 ids.
pub const ARTIST_BATCH_SIZE: usize = 50;
/// Spotify caps `/me/playlists` pages at 50 items.
pub const USER_PLAYLISTS_PAGE_SIZE: u32 = 50;
/// Spotify caps `POST /playlists/{id}/tracks` at 100 uris.
pub const ADD_TRACKS_CHUNK_SIZE: usize = 100;

pub const DEFAULT_MAX_TRACKS: usize = 10_000;
pub const DEFAULT_CACHE_TTL_DAYS: u64 = 30;
pub const DEFAULT_CACHE_HARD_EXPIRY_DAYS: u64 = 90;

/// Loads environment variables from `<data_local_dir>/genrefy/.env`.
///
/// Creates the directory if needed. A missing file is not an error, the
/// process environment and the built-in defaults are used instead.
///
/// The function looks for the `.env` file in:
/// - Linux: `~/.local/share/genrefy/.env`
/// - macOS: `~/Library/Application Support/genrefy/.env`
/// - Windows: `%LOCALAPPDATA%/genrefy/.env`
pub async fn load_env() -> Result<(), String> {
    let path = data_dir().join(".env");
    if let Some(parent) = path.parent() {
        async_fs::create_dir_all(parent)
            .await
            .map_err(|e| e.to_string())?;
    }

    if path.is_file() {
        dotenv::from_path(&path).map_err(|e| e.to_string())?;
    }
    Ok(())
}

/// Root of everything genrefy stores locally.
pub fn data_dir() -> PathBuf {
    let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("genrefy");
    path
}

pub fn token_path() -> PathBuf {
    data_dir().join("cache/token.json")
}

pub fn genre_cache_path() -> PathBuf {
    data_dir().join("cache/artist-genres.json")
}

/// Returns the Spotify Web API base URL (`SPOTIFY_API_URL`).
pub fn spotify_apiurl() -> String {
    env::var("SPOTIFY_API_URL").unwrap_or_else(|_| DEFAULT_SPOTIFY_API_URL.to_string())
}

/// Returns the OAuth token endpoint used for refreshing (`SPOTIFY_API_TOKEN_URL`).
pub fn spotify_apitoken_url() -> String {
    env::var("SPOTIFY_API_TOKEN_URL").unwrap_or_else(|_| DEFAULT_SPOTIFY_TOKEN_URL.to_string())
}

/// Returns the application client id (`SPOTIFY_API_AUTH_CLIENT_ID`).
///
/// Empty when unset, in which case refreshing a token will be rejected by
/// Spotify and surface as an auth error.
pub fn spotify_client_id() -> String {
    env::var("SPOTIFY_API_AUTH_CLIENT_ID").unwrap_or_default()
}

/// Access token handed over by the login collaborator (`SPOTIFY_ACCESS_TOKEN`).
pub fn spotify_access_token() -> Option<String> {
    env::var("SPOTIFY_ACCESS_TOKEN").ok().filter(|t| !t.is_empty())
}

/// Refresh token handed over by the login collaborator (`SPOTIFY_REFRESH_TOKEN`).
pub fn spotify_refresh_token() -> Option<String> {
    env::var("SPOTIFY_REFRESH_TOKEN").ok().filter(|t| !t.is_empty())
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Tunables of the ingestion and creation pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
    pub liked_page_size: u32,
    pub playlist_page_size: u32,
    pub artist_batch_size: usize,
    pub user_playlists_page_size: u32,
    pub add_tracks_chunk_size: usize,
    pub max_tracks: usize,
    pub cache_ttl: Duration,
    pub cache_hard_expiry: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            jitter: true,
            liked_page_size: LIKED_PAGE_SIZE,
            playlist_page_size: PLAYLIST_PAGE_SIZE,
            artist_batch_size: ARTIST_BATCH_SIZE,
            user_playlists_page_size: USER_PLAYLISTS_PAGE_SIZE,
            add_tracks_chunk_size: ADD_TRACKS_CHUNK_SIZE,
            max_tracks: DEFAULT_MAX_TRACKS,
            cache_ttl: utils::days(DEFAULT_CACHE_TTL_DAYS),
            cache_hard_expiry: utils::days(DEFAULT_CACHE_HARD_EXPIRY_DAYS),
        }
    }
}

impl PipelineConfig {
    /// Reads `GENREFY_*` overrides on top of the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_retries: env_or("GENREFY_MAX_RETRIES", defaults.max_retries),
            base_delay: Duration::from_millis(env_or(
                "GENREFY_BASE_DELAY_MS",
                defaults.base_delay.as_millis() as u64,
            )),
            max_delay: Duration::from_millis(env_or(
                "GENREFY_MAX_DELAY_MS",
                defaults.max_delay.as_millis() as u64,
            )),
            max_tracks: env_or("GENREFY_MAX_TRACKS", defaults.max_tracks),
            cache_ttl: utils::days(env_or("GENREFY_CACHE_TTL_DAYS", DEFAULT_CACHE_TTL_DAYS)),
            ..defaults
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: self.base_delay,
            max_delay: self.max_delay,
            jitter: self.jitter,
        }
    }

    pub fn aggregator_options(&self) -> AggregatorOptions {
        AggregatorOptions {
            liked_page_size: self.liked_page_size,
            playlist_page_size: self.playlist_page_size,
            max_tracks: self.max_tracks,
        }
    }
}
