use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    config,
    error::PipelineError,
    management::KeyValueStore,
    spotify::SpotifyApi,
    types::ArtistGenreCacheEntry,
    utils,
};

/// Namespace of cache entries inside the key-value store.
pub const CACHE_KEY_PREFIX: &str = "artist_genres:";

/// 30 days.
pub const DEFAULT_TTL_SECS: i64 = 2_592_000;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CacheBody {
    genres: Vec<String>,
    cached_at: i64,
}

/// Running counters of a cache instance.
#[derive(Debug, Default)]
pub struct CacheStats {
    lookups: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    stale: AtomicU64,
    saves: AtomicU64,
    evictions: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStatsSnapshot {
    pub lookups: u64,
    pub hits: u64,
    pub misses: u64,
    /// Misses caused by an entry older than the TTL.
    pub stale: u64,
    pub saves: u64,
    pub evictions: u64,
}

impl CacheStatsSnapshot {
    pub fn hit_rate(&self) -> f64 {
        if self.lookups == 0 {
            0.0
        } else {
            self.hits as f64 / self.lookups as f64
        }
    }
}

impl CacheStats {
    pub fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            lookups: self.lookups.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            stale: self.stale.load(Ordering::Relaxed),
            saves: self.saves.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Result of [`ArtistGenreCache::get_batch`].
#[derive(Debug, Clone, Default)]
pub struct BatchLookup {
    pub hits: HashMap<String, Vec<String>>,
    /// Deduplicated, in request order.
    pub misses: Vec<String>,
}

/// Artist id to genre list cache on top of a [`KeyValueStore`].
///
/// An entry older than the TTL is treated as a miss, so callers always refetch
/// before answering. Old entries stay in the store until [`compact`] removes
/// them.
///
/// [`compact`]: ArtistGenreCache::compact
pub struct ArtistGenreCache<S: ?Sized> {
    store: Arc<S>,
    ttl_secs: i64,
    hard_expiry: Option<Duration>,
    batch_size: usize,
    stats: Arc<CacheStats>,
}

impl<S: KeyValueStore + ?Sized> ArtistGenreCache<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            ttl_secs: DEFAULT_TTL_SECS,
            hard_expiry: None,
            batch_size: config::ARTIST_BATCH_SIZE,
            stats: Arc::new(CacheStats::default()),
        }
    }

    pub fn from_config(store: Arc<S>, config: &config::PipelineConfig) -> Self {
        Self::new(store)
            .with_ttl(config.cache_ttl)
            .with_hard_expiry(config.cache_hard_expiry)
            .with_batch_size(config.artist_batch_size)
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl_secs = ttl.as_secs() as i64;
        self
    }

    /// Passed to the store as per-key TTL so it can drop entries on its own.
    pub fn with_hard_expiry(mut self, hard_expiry: Duration) -> Self {
        self.hard_expiry = Some(hard_expiry);
        self
    }

    /// Maximum number of artist ids per upstream lookup.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_stats(mut self, stats: Arc<CacheStats>) -> Self {
        self.stats = stats;
        self
    }

    pub fn stats(&self) -> &Arc<CacheStats> {
        &self.stats
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn is_expired(&self, entry: &ArtistGenreCacheEntry) -> bool {
        self.is_expired_at(entry, Utc::now().timestamp())
    }

    /// Expired strictly after the TTL; an entry exactly TTL seconds old is fresh.
    pub fn is_expired_at(&self, entry: &ArtistGenreCacheEntry, now: i64) -> bool {
        now - entry.cached_at > self.ttl_secs
    }

    fn key(artist_id: &str) -> String {
        format!("{}{}", CACHE_KEY_PREFIX, artist_id)
    }

    /// Reads the raw entry, stale or not. Does not touch the counters.
    pub async fn entry(
        &self,
        artist_id: &str,
    ) -> Result<Option<ArtistGenreCacheEntry>, PipelineError> {
        let Some(raw) = self.store.get(&Self::key(artist_id)).await? else {
            return Ok(None);
        };
        match serde_json::from_str::<CacheBody>(&raw) {
            Ok(body) => Ok(Some(ArtistGenreCacheEntry {
                artist_id: artist_id.to_string(),
                genres: body.genres,
                cached_at: body.cached_at,
            })),
            Err(e) => {
                warn!(artist_id, error = %e, "ignoring unreadable cache entry");
                Ok(None)
            }
        }
    }

    /// Genres of a fresh entry, or `None` for a missing or stale one.
    pub async fn get(&self, artist_id: &str) -> Result<Option<Vec<String>>, PipelineError> {
        CacheStats::bump(&self.stats.lookups);
        match self.entry(artist_id).await? {
            Some(entry) if !self.is_expired(&entry) => {
                CacheStats::bump(&self.stats.hits);
                Ok(Some(entry.genres))
            }
            Some(_) => {
                CacheStats::bump(&self.stats.stale);
                CacheStats::bump(&self.stats.misses);
                Ok(None)
            }
            None => {
                CacheStats::bump(&self.stats.misses);
                Ok(None)
            }
        }
    }

    /// Splits `artist_ids` into hits and misses. Duplicate ids are looked up once.
    pub async fn get_batch(&self, artist_ids: &[String]) -> Result<BatchLookup, PipelineError> {
        let mut lookup = BatchLookup::default();
        let mut seen = HashSet::with_capacity(artist_ids.len());

        for id in artist_ids {
            if !seen.insert(id.as_str()) {
                continue;
            }
            match self.get(id).await? {
                Some(genres) => {
                    lookup.hits.insert(id.clone(), genres);
                }
                None => lookup.misses.push(id.clone()),
            }
        }

        Ok(lookup)
    }

    /// Replaces the entry of `artist_id` with a new one stamped now.
    pub async fn put(&self, artist_id: &str, genres: Vec<String>) -> Result<(), PipelineError> {
        self.put_entry(ArtistGenreCacheEntry {
            artist_id: artist_id.to_string(),
            genres,
            cached_at: Utc::now().timestamp(),
        })
        .await
    }

    pub async fn put_entry(&self, entry: ArtistGenreCacheEntry) -> Result<(), PipelineError> {
        let body = serde_json::to_string(&CacheBody {
            genres: entry.genres,
            cached_at: entry.cached_at,
        })?;
        self.store
            .put(&Self::key(&entry.artist_id), body, self.hard_expiry)
            .await?;
        CacheStats::bump(&self.stats.saves);
        Ok(())
    }

    /// Genres for every id in `artist_ids`, fetching misses from Spotify.
    ///
    /// Misses are requested in chunks of the configured batch size and written
    /// back one entry per artist. Artists Spotify does not know are stored with
    /// an empty genre list.
    pub async fn resolve<A>(
        &self,
        artist_ids: &[String],
        api: &A,
    ) -> Result<HashMap<String, Vec<String>>, PipelineError>
    where
        A: SpotifyApi + ?Sized,
    {
        let BatchLookup {
            hits: mut resolved,
            misses,
        } = self.get_batch(artist_ids).await?;

        debug!(
            hits = resolved.len(),
            misses = misses.len(),
            "artist genre cache lookup"
        );

        for chunk in misses.chunks(self.batch_size) {
            let mut fetched: HashMap<String, Vec<String>> = api
                .artists(chunk)
                .await?
                .into_iter()
                .map(|artist| (artist.id, artist.genres))
                .collect();

            for id in chunk {
                let genres = fetched.remove(id).unwrap_or_default();
                self.put(id, genres.clone()).await?;
                resolved.insert(id.clone(), genres);
            }
        }

        Ok(resolved)
    }

    /// Removes entries older than `max_age` and unreadable ones. Returns the count.
    pub async fn compact(&self, max_age: Duration) -> Result<usize, PipelineError> {
        let now = Utc::now().timestamp();
        let max_age = max_age.as_secs() as i64;
        let mut removed = 0;

        for key in self.store.keys(CACHE_KEY_PREFIX).await? {
            let artist_id = key.strip_prefix(CACHE_KEY_PREFIX).unwrap_or(&key);
            let evict = match self.entry(artist_id).await? {
                Some(entry) => now - entry.cached_at > max_age,
                None => true,
            };
            if evict && self.store.delete(&key).await? {
                CacheStats::bump(&self.stats.evictions);
                removed += 1;
            }
        }

        if removed > 0 {
            debug!(removed, "compacted artist genre cache");
        }
        Ok(removed)
    }

    /// Number of entries currently stored, stale ones included.
    pub async fn count(&self) -> Result<usize, PipelineError> {
        Ok(self.store.keys(CACHE_KEY_PREFIX).await?.len())
    }

    /// Number of stored entries older than the TTL.
    pub async fn count_stale(&self) -> Result<usize, PipelineError> {
        let mut stale = 0;
        for key in self.store.keys(CACHE_KEY_PREFIX).await? {
            let artist_id = key.strip_prefix(CACHE_KEY_PREFIX).unwrap_or(&key);
            if let Some(entry) = self.entry(artist_id).await? {
                if self.is_expired(&entry) {
                    stale += 1;
                }
            }
        }
        Ok(stale)
    }
}

/// Normalised union of the genres of `artist_ids`, in artist order.
pub fn genres_for_artists(
    artist_ids: &[String],
    resolved: &HashMap<String, Vec<String>>,
) -> Vec<String> {
    utils::merge_genres(artist_ids.iter().filter_map(|id| resolved.get(id)))
}
