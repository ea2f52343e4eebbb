//! # Spotify Integration Module
//!
//! This module is the integration layer between genrefy and the Spotify Web
//! API. It owns all HTTP communication, maps failing responses onto the error
//! taxonomy in [`crate::error`], and routes every request through the
//! [`RequestExecutor`] so rate limits and flaky gateways are absorbed in one
//! place.
//!
//! ## Architecture
//!
//! ```text
//! Pipeline (Aggregator, Bulk Creator)
//!          ↓
//!     SpotifyApi trait
//!          ↓
//! SpotifyClient (reqwest)
//!     ├── Tracks   (liked songs, playlist items)
//!     ├── Artists  (batched genre lookups)
//!     └── Playlist (listing, creation, adding tracks)
//!          ↓
//! RequestExecutor (retry, backoff, Retry-After)
//!          ↓
//! Spotify Web API
//! ```
//!
//! The pipeline only depends on the [`SpotifyApi`] trait, which lets tests run
//! against an in-memory fake.
//!
//! ## API Coverage
//!
//! - `GET /me/tracks` - liked songs, offset pagination, 50 per page
//! - `GET /playlists/{id}/tracks` - playlist items, 100 per page
//! - `GET /artists?ids=` - up to 50 artists with their genre tags
//! - `GET /me/playlists` - the user's playlists, for duplicate detection
//! - `POST /me/playlists` - create a playlist
//! - `POST /playlists/{id}/tracks` - add up to 100 track uris
//!
//! ## Error Mapping
//!
//! - `401` becomes [`AuthError::Unauthorized`] and is never retried
//! - `429` / `5xx` still failing after the last attempt becomes
//!   [`PipelineError::RateLimited`]
//! - any other non-success status, and bodies that do not parse, become
//!   [`PipelineError::Upstream`]
//! - transport failures surviving all attempts become [`PipelineError::Network`]

mod artists;
mod executor;
mod playlist;
mod tracks;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Serialize, de::DeserializeOwned};

pub use executor::{
    RequestExecutor, RetryEvent, RetryObserver, RetryPolicy, RetryReason, Retryable,
    RetryableResponse, is_retryable_status,
};

use crate::{
    error::{AuthError, PipelineError},
    management::AccessTokenProvider,
    types::{
        Artist, CreatePlaylistRequest, CreatePlaylistResponse, ErrorResponse, Page, Playlist,
        TrackItem,
    },
};

/// Upstream operations the pipeline relies on.
#[async_trait]
pub trait SpotifyApi: Send + Sync {
    async fn liked_tracks(&self, offset: u32, limit: u32)
    -> Result<Page<TrackItem>, PipelineError>;

    async fn playlist_tracks(
        &self,
        playlist_id: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Page<TrackItem>, PipelineError>;

    /// Looks up at most 50 artists. Unknown ids are left out of the result.
    async fn artists(&self, ids: &[String]) -> Result<Vec<Artist>, PipelineError>;

    async fn user_playlists(&self, offset: u32, limit: u32)
    -> Result<Page<Playlist>, PipelineError>;

    async fn create_playlist(
        &self,
        request: &CreatePlaylistRequest,
    ) -> Result<CreatePlaylistResponse, PipelineError>;

    async fn add_tracks(&self, playlist_id: &str, uris: &[String]) -> Result<(), PipelineError>;
}

pub struct SpotifyClient<P: ?Sized> {
    http: Client,
    base_url: String,
    tokens: Arc<P>,
    executor: RequestExecutor,
}

impl<P: AccessTokenProvider + ?Sized> SpotifyClient<P> {
    pub fn new(base_url: impl Into<String>, tokens: Arc<P>, executor: RequestExecutor) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens,
            executor,
        }
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub(crate) async fn get_json<D: DeserializeOwned>(&self, url: &str) -> Result<D, PipelineError> {
        let response = self
            .executor
            .execute(move || async move {
                // Token is fetched per attempt so long backoffs still send a fresh one.
                let token = self.tokens.valid_access_token().await?;
                Ok::<_, PipelineError>(self.http.get(url).bearer_auth(token).send().await?)
            })
            .await?;

        self.read_json(response).await
    }

    pub(crate) async fn post_json<B, D>(&self, url: &str, body: &B) -> Result<D, PipelineError>
    where
        B: Serialize + Sync + ?Sized,
        D: DeserializeOwned,
    {
        let response = self
            .executor
            .execute(move || async move {
                let token = self.tokens.valid_access_token().await?;
                Ok::<_, PipelineError>(
                    self.http
                        .post(url)
                        .bearer_auth(token)
                        .json(body)
                        .send()
                        .await?,
                )
            })
            .await?;

        self.read_json(response).await
    }

    async fn read_json<D: DeserializeOwned>(&self, response: Response) -> Result<D, PipelineError> {
        let response = self.check_status(response).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            PipelineError::upstream(None, format!("malformed response from Spotify: {}", e))
        })
    }

    async fn check_status(&self, response: Response) -> Result<Response, PipelineError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let code = status.as_u16();
        if status == StatusCode::UNAUTHORIZED {
            return Err(AuthError::Unauthorized(code).into());
        }
        if is_retryable_status(code) {
            return Err(PipelineError::RateLimited {
                status: code,
                attempts: self.executor.policy().max_retries.max(1),
            });
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .map(|e| e.error.message)
            .unwrap_or(body);
        Err(PipelineError::upstream(
            Some(code),
            format!("Spotify answered with status {}: {}", code, message),
        ))
    }
}

#[async_trait]
impl<P: AccessTokenProvider + ?Sized> SpotifyApi for SpotifyClient<P> {
    async fn liked_tracks(
        &self,
        offset: u32,
        limit: u32,
    ) -> Result<Page<TrackItem>, PipelineError> {
        self.get_liked_tracks(offset, limit).await
    }

    async fn playlist_tracks(
        &self,
        playlist_id: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Page<TrackItem>, PipelineError> {
        self.get_playlist_tracks(playlist_id, offset, limit).await
    }

    async fn artists(&self, ids: &[String]) -> Result<Vec<Artist>, PipelineError> {
        self.get_several_artists(ids).await
    }

    async fn user_playlists(
        &self,
        offset: u32,
        limit: u32,
    ) -> Result<Page<Playlist>, PipelineError> {
        self.get_user_playlists(offset, limit).await
    }

    async fn create_playlist(
        &self,
        request: &CreatePlaylistRequest,
    ) -> Result<CreatePlaylistResponse, PipelineError> {
        self.create(request).await
    }

    async fn add_tracks(&self, playlist_id: &str, uris: &[String]) -> Result<(), PipelineError> {
        self.add_track_uris(playlist_id, uris).await
    }
}
