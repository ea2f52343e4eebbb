use std::collections::HashSet;

use tracing::{debug, info};

use crate::{
    config,
    error::PipelineError,
    management::{ArtistGenreCache, KeyValueStore, genres_for_artists},
    spotify::SpotifyApi,
    types::{AggregationResult, GenreBuckets, Page, SourceTag, TrackItem, TrackRecord},
    utils,
};

/// Bucket for tracks none of whose artists carry a genre tag.
pub const UNKNOWN_GENRE: &str = "unknown";

/// Which parts of the library to aggregate.
#[derive(Debug, Clone, Default)]
pub struct TrackSources {
    pub include_liked: bool,
    /// Processed in the given order, after liked songs.
    pub playlist_ids: Vec<String>,
    /// Collect genre-less tracks under [`UNKNOWN_GENRE`] instead of dropping them.
    pub include_unknown: bool,
}

impl TrackSources {
    pub fn liked() -> Self {
        Self {
            include_liked: true,
            ..Default::default()
        }
    }

    pub fn with_playlists(mut self, playlist_ids: Vec<String>) -> Self {
        self.playlist_ids = playlist_ids;
        self
    }

    /// Sources in deduplication priority order.
    pub fn ordered(&self) -> Vec<SourceTag> {
        let liked = self.include_liked.then_some(SourceTag::Liked);
        liked
            .into_iter()
            .chain(self.playlist_ids.iter().cloned().map(SourceTag::Playlist))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        !self.include_liked && self.playlist_ids.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct AggregatorOptions {
    pub liked_page_size: u32,
    pub playlist_page_size: u32,
    /// Maximum number of unique tracks to bucket.
    pub max_tracks: usize,
}

impl Default for AggregatorOptions {
    fn default() -> Self {
        Self {
            liked_page_size: config::LIKED_PAGE_SIZE,
            playlist_page_size: config::PLAYLIST_PAGE_SIZE,
            max_tracks: config::DEFAULT_MAX_TRACKS,
        }
    }
}

/// Deduplicating track collector with a hard ceiling.
struct TrackCollector {
    seen: HashSet<String>,
    tracks: Vec<TrackRecord>,
    ceiling: usize,
    truncated: bool,
}

impl TrackCollector {
    fn new(ceiling: usize) -> Self {
        Self {
            seen: HashSet::new(),
            tracks: Vec::new(),
            ceiling,
            truncated: false,
        }
    }

    /// Adds the record unless its id was already collected. Returns false
    /// once a new track arrives with the ceiling reached.
    fn push(&mut self, record: TrackRecord) -> bool {
        if self.seen.contains(&record.id) {
            return true;
        }
        if self.tracks.len() >= self.ceiling {
            self.truncated = true;
            return false;
        }
        self.seen.insert(record.id.clone());
        self.tracks.push(record);
        true
    }
}

fn to_record(item: TrackItem, source: &SourceTag) -> Option<TrackRecord> {
    let track = item.track?;
    if track.kind.as_deref().is_some_and(|kind| kind != "track") {
        return None;
    }
    let id = track.id?;
    Some(TrackRecord {
        id,
        name: track.name,
        artist_ids: track.artists.into_iter().filter_map(|a| a.id).collect(),
        source: source.clone(),
    })
}

/// Builds genre buckets out of the user's library.
pub struct Aggregator<'a, A: ?Sized, S: ?Sized> {
    api: &'a A,
    cache: &'a ArtistGenreCache<S>,
    options: AggregatorOptions,
}

impl<'a, A, S> Aggregator<'a, A, S>
where
    A: SpotifyApi + ?Sized,
    S: KeyValueStore + ?Sized,
{
    pub fn new(api: &'a A, cache: &'a ArtistGenreCache<S>, options: AggregatorOptions) -> Self {
        Self {
            api,
            cache,
            options,
        }
    }

    /// Pulls every selected source, deduplicates and buckets tracks by genre.
    ///
    /// Fails with a validation error before touching Spotify when no source is
    /// selected. Any upstream failure fails the whole aggregation.
    pub async fn aggregate(&self, sources: &TrackSources) -> Result<AggregationResult, PipelineError> {
        if sources.is_empty() {
            return Err(PipelineError::validation(
                "select liked songs or at least one playlist",
            ));
        }

        let mut collector = TrackCollector::new(self.options.max_tracks);
        let mut library_size: u64 = 0;

        for source in sources.ordered() {
            if collector.truncated {
                // Only the size is needed from sources past the ceiling.
                library_size += u64::from(self.fetch_page(&source, 0, 1).await?.total);
                continue;
            }
            library_size += self.collect_source(&source, &mut collector).await?;
        }

        let TrackCollector {
            tracks, truncated, ..
        } = collector;

        info!(
            unique = tracks.len(),
            library_size, truncated, "collected library tracks"
        );

        let artist_ids = utils::unique_artist_ids(&tracks);
        let resolved = self.cache.resolve(&artist_ids, self.api).await?;

        let mut buckets = GenreBuckets::new();
        let mut untagged = 0;
        for track in &tracks {
            let genres = genres_for_artists(&track.artist_ids, &resolved);
            if genres.is_empty() {
                if sources.include_unknown {
                    buckets.insert(UNKNOWN_GENRE, &track.id);
                } else {
                    untagged += 1;
                }
                continue;
            }
            for genre in &genres {
                buckets.insert(genre, &track.id);
            }
        }

        Ok(AggregationResult {
            buckets,
            tracks,
            untagged,
            library_size,
            truncated,
        })
    }

    /// Pages through one source. Returns the size Spotify reports for it.
    async fn collect_source(
        &self,
        source: &SourceTag,
        collector: &mut TrackCollector,
    ) -> Result<u64, PipelineError> {
        let limit = self.page_size(source);
        let mut offset: u32 = 0;
        let mut total: u64 = 0;

        loop {
            let page = self.fetch_page(source, offset, limit).await?;
            if offset == 0 {
                total = u64::from(page.total);
            }

            let fetched = page.items.len() as u32;
            debug!(source = %source, offset, fetched, "processing page");

            for item in page.items {
                let Some(record) = to_record(item, source) else {
                    continue;
                };
                if !collector.push(record) {
                    return Ok(total);
                }
            }

            if page.next.is_none() || fetched == 0 {
                return Ok(total);
            }
            offset += fetched;
        }
    }

    async fn fetch_page(
        &self,
        source: &SourceTag,
        offset: u32,
        limit: u32,
    ) -> Result<Page<TrackItem>, PipelineError> {
        match source {
            SourceTag::Liked => self.api.liked_tracks(offset, limit).await,
            SourceTag::Playlist(id) => self.api.playlist_tracks(id, offset, limit).await,
        }
    }

    fn page_size(&self, source: &SourceTag) -> u32 {
        match source {
            SourceTag::Liked => self.options.liked_page_size,
            SourceTag::Playlist(_) => self.options.playlist_page_size,
        }
        .max(1)
    }
}
