use std::collections::HashSet;

use tracing::{info, warn};

use crate::{
    config,
    error::PipelineError,
    spotify::SpotifyApi,
    types::{
        BulkCreationReport, BulkCreationResult, BulkSummary, CreatePlaylistRequest,
        CreatePlaylistResponse, GenreBuckets, TrackIdSet,
    },
    utils,
};

#[derive(Debug, Clone)]
pub struct BulkOptions {
    /// Skip genres whose derived playlist name already exists.
    pub skip_duplicates: bool,
    pub public: bool,
    /// `{genre}` is replaced by the genre name.
    pub description_template: String,
    pub user_playlists_page_size: u32,
    pub add_tracks_chunk_size: usize,
}

impl Default for BulkOptions {
    fn default() -> Self {
        Self {
            skip_duplicates: false,
            public: false,
            description_template: "{genre} tracks from your Spotify library, sorted by genrefy."
                .to_string(),
            user_playlists_page_size: config::USER_PLAYLISTS_PAGE_SIZE,
            add_tracks_chunk_size: config::ADD_TRACKS_CHUNK_SIZE,
        }
    }
}

pub type ProgressCallback<'a> = &'a (dyn Fn(&BulkCreationResult) + Send + Sync);

/// Creates one playlist per genre, one genre at a time.
///
/// A failing genre is recorded and the run moves on to the next one. An auth
/// failure stops the run with [`PipelineError::BulkAborted`], which still
/// carries the results gathered so far. Untried genres are left out of it.
pub struct BulkCreator<'a, A: ?Sized> {
    api: &'a A,
    options: BulkOptions,
    progress: Option<ProgressCallback<'a>>,
}

impl<'a, A: SpotifyApi + ?Sized> BulkCreator<'a, A> {
    pub fn new(api: &'a A, options: BulkOptions) -> Self {
        Self {
            api,
            options,
            progress: None,
        }
    }

    /// Called after each genre is resolved.
    pub fn on_progress(mut self, callback: ProgressCallback<'a>) -> Self {
        self.progress = Some(callback);
        self
    }

    pub async fn create_bulk(
        &self,
        buckets: &GenreBuckets,
    ) -> Result<BulkCreationReport, PipelineError> {
        let mut existing = if self.options.skip_duplicates {
            self.existing_playlist_names().await?
        } else {
            HashSet::new()
        };

        let mut results = Vec::with_capacity(buckets.len());
        let mut aborted = None;
        for (genre, track_ids) in buckets.iter() {
            let name = utils::playlist_name_for(genre);
            let key = name.to_lowercase();

            let result = if self.options.skip_duplicates && existing.contains(&key) {
                info!(genre = %genre, "playlist already exists, skipping");
                BulkCreationResult::skipped(genre)
            } else {
                match self.create_one(genre, &name, track_ids).await {
                    Ok(created) => {
                        existing.insert(key);
                        BulkCreationResult::succeeded(genre, &created)
                    }
                    Err(PipelineError::Auth(source)) => {
                        warn!(genre = %genre, error = %source, "session rejected, stopping bulk run");
                        let result = BulkCreationResult::failed(genre, source.to_string());
                        aborted = Some(source);
                        result
                    }
                    Err(e) => {
                        warn!(genre = %genre, error = %e, "failed to create genre playlist");
                        BulkCreationResult::failed(genre, e.to_string())
                    }
                }
            };

            if let Some(progress) = self.progress {
                progress(&result);
            }
            results.push(result);
            if aborted.is_some() {
                break;
            }
        }

        let summary = BulkSummary::from_results(&results);
        info!(
            total = summary.total,
            successful = summary.successful,
            failed = summary.failed,
            skipped = summary.skipped,
            "bulk playlist creation finished"
        );
        let report = BulkCreationReport { results, summary };
        match aborted {
            Some(source) => Err(PipelineError::BulkAborted {
                source,
                partial: Box::new(report),
            }),
            None => Ok(report),
        }
    }

    async fn create_one(
        &self,
        genre: &str,
        name: &str,
        track_ids: &TrackIdSet,
    ) -> Result<CreatePlaylistResponse, PipelineError> {
        let request = CreatePlaylistRequest {
            name: name.to_string(),
            description: self.options.description_template.replace("{genre}", genre),
            public: self.options.public,
            collaborative: false,
        };
        let created = self.api.create_playlist(&request).await?;
        info!(genre, playlist_id = %created.id, tracks = track_ids.len(), "created playlist");

        let uris: Vec<String> = track_ids.iter().map(|id| utils::track_uri(id)).collect();
        for chunk in uris.chunks(self.options.add_tracks_chunk_size.max(1)) {
            self.api
                .add_tracks(&created.id, chunk)
                .await
                .map_err(|e| match e {
                    PipelineError::Auth(_) => e,
                    other => PipelineError::upstream(
                        other.status(),
                        format!(
                            "playlist {} created but adding tracks failed: {}",
                            created.id, other
                        ),
                    ),
                })?;
        }

        Ok(created)
    }

    /// Lower-cased names of all the user's playlists.
    async fn existing_playlist_names(&self) -> Result<HashSet<String>, PipelineError> {
        let limit = self.options.user_playlists_page_size.max(1);
        let mut names = HashSet::new();
        let mut offset = 0;

        loop {
            let page = self.api.user_playlists(offset, limit).await?;
            let fetched = page.items.len() as u32;
            names.extend(page.items.into_iter().map(|p| p.name.to_lowercase()));

            if page.next.is_none() || fetched == 0 {
                break;
            }
            offset += fetched;
        }

        Ok(names)
    }
}
