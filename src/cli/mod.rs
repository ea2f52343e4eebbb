//! # CLI Module
//!
//! User-facing commands of genrefy. Each command is a plain async function
//! that prints its results and exits the process with an error message when
//! something unrecoverable happens.
//!
//! ## Commands
//!
//! - [`genres`] - aggregate the selected sources and print the genre table
//! - [`create`] - aggregate, then create one playlist per genre
//! - [`playlists`] - list the playlists of the current user
//! - [`cache_stats`] / [`cache_compact`] - inspect and prune the artist genre cache
//!
//! ## Flow
//!
//! ```text
//! CLI Layer (spinners, tables, messages)
//!     ↓
//! Pipeline (Aggregator, BulkCreator)
//!     ↓
//! Management (tokens, genre cache)
//!     ↓
//! Spotify client + RequestExecutor
//! ```
//!
//! Retry waits done by the executor are shown in the running spinner, so a
//! long rate limit pause does not look like a hang.

mod cache;
mod create;
mod genres;
mod playlists;

use std::sync::Arc;

use indicatif::ProgressBar;

pub use cache::{cache_compact, cache_stats};
pub use create::create;
pub use genres::genres;
pub use playlists::playlists;

use crate::{
    config::{self, PipelineConfig},
    error,
    error::PipelineError,
    info,
    management::{ArtistGenreCache, FileStore, TokenManager},
    pipeline::{Aggregator, TrackSources},
    spotify::{RequestExecutor, RetryEvent, SpotifyClient},
    types::AggregationResult,
    warning,
};

/// Source and filter flags shared by `genres` and `create`.
#[derive(Debug, Clone, Default)]
pub struct SourceSelection {
    pub liked: bool,
    pub playlists: Vec<String>,
    pub include_unknown: bool,
    pub min_tracks: Option<usize>,
    pub max_tracks: Option<usize>,
    /// Keep only these genres. Empty keeps all.
    pub genres: Vec<String>,
}

impl SourceSelection {
    fn sources(&self) -> TrackSources {
        TrackSources {
            include_liked: self.liked,
            playlist_ids: self.playlists.clone(),
            include_unknown: self.include_unknown,
        }
    }

    fn apply_filters(&self, result: &mut AggregationResult) {
        if let Some(min) = self.min_tracks {
            result.buckets.retain_min_tracks(min);
        }
        if !self.genres.is_empty() {
            result.buckets.retain_genres(&self.genres);
        }
    }
}

pub(crate) struct Session {
    config: PipelineConfig,
    client: SpotifyClient<TokenManager>,
    store: Arc<FileStore>,
    cache: ArtistGenreCache<FileStore>,
}

pub(crate) async fn open_store() -> Arc<FileStore> {
    let path = config::genre_cache_path();
    match FileStore::open(path.clone()).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warning!(
                "Genre cache at {} is unreadable, starting with an empty one. Err: {}",
                path.display(),
                e
            );
            Arc::new(FileStore::new(path))
        }
    }
}

/// Loads the token and wires the client, the executor and the cache.
pub(crate) async fn open_session(pb: &ProgressBar) -> Session {
    let config = PipelineConfig::from_env();

    let tokens = match TokenManager::load().await {
        Ok(tokens) => Arc::new(tokens),
        Err(e) => {
            pb.finish_and_clear();
            error!(
                "No usable Spotify token found. Set SPOTIFY_ACCESS_TOKEN or place a token in {}.\n Error: {}",
                config::token_path().display(),
                e
            );
        }
    };

    let retry_pb = pb.clone();
    let executor = RequestExecutor::new(config.retry_policy()).with_observer(Arc::new(
        move |event: &RetryEvent| {
            retry_pb.set_message(format!(
                "Spotify is busy ({}), retrying in {:.1}s (attempt {}/{})...",
                event.reason,
                event.delay.as_secs_f64(),
                event.attempt + 1,
                event.max_attempts
            ));
        },
    ));

    let client = SpotifyClient::new(config::spotify_apiurl(), tokens, executor);
    let store = open_store().await;
    let cache = ArtistGenreCache::from_config(Arc::clone(&store), &config);

    Session {
        config,
        client,
        store,
        cache,
    }
}

/// Runs the aggregation, persists the cache and applies the CLI filters.
pub(crate) async fn aggregate(
    session: &Session,
    selection: &SourceSelection,
    pb: &ProgressBar,
) -> AggregationResult {
    let mut options = session.config.aggregator_options();
    if let Some(max) = selection.max_tracks {
        options.max_tracks = max;
    }

    pb.set_message("Collecting tracks from your library...");
    let aggregator = Aggregator::new(&session.client, &session.cache, options);
    let outcome = aggregator.aggregate(&selection.sources()).await;

    // Genres resolved before a failure are still worth keeping.
    if let Err(e) = session.store.flush().await {
        warning!("Cannot save genre cache. Err: {}", e);
    }

    let mut result = match outcome {
        Ok(result) => result,
        Err(e) => {
            pb.finish_and_clear();
            fail(e);
        }
    };

    selection.apply_filters(&mut result);
    result
}

pub(crate) fn print_aggregation_notes(session: &Session, result: &AggregationResult) {
    if result.truncated {
        warning!(
            "Library holds {} tracks, only the first {} unique tracks were sorted.",
            result.library_size,
            result.tracks.len()
        );
    }
    if result.untagged > 0 {
        warning!(
            "{} tracks have no genre. Use --include-unknown to collect them.",
            result.untagged
        );
    }

    let stats = session.cache.stats().snapshot();
    info!(
        "{} tracks, {} genres. Genre cache: {} hits, {} misses ({:.0}% hit rate).",
        result.tracks.len(),
        result.buckets.len(),
        stats.hits,
        stats.misses,
        stats.hit_rate() * 100.0
    );
}

pub(crate) fn fail(e: PipelineError) -> ! {
    if e.is_auth() {
        error!(
            "Spotify rejected the session. Refresh your token and try again.\n Error: {}",
            e
        );
    }

    match &e {
        PipelineError::Validation(message) => error!("{}", message),
        PipelineError::RateLimited { .. } => error!(
            "Spotify kept rate limiting the requests. Try again later.\n Error: {}",
            e
        ),
        _ => error!("{}", e),
    }
}
