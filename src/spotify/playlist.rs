use tracing::debug;

use crate::{
    error::PipelineError,
    management::AccessTokenProvider,
    spotify::SpotifyClient,
    types::{
        AddTrackToPlaylistRequest, AddTrackToPlaylistResponse, CreatePlaylistRequest,
        CreatePlaylistResponse, Page, Playlist,
    },
};

impl<P: AccessTokenProvider + ?Sized> SpotifyClient<P> {
    /// Retrieves one page of the current user's playlists (`GET /me/playlists`).
    pub async fn get_user_playlists(
        &self,
        offset: u32,
        limit: u32,
    ) -> Result<Page<Playlist>, PipelineError> {
        let api_url = self.url(&format!(
            "/me/playlists?limit={limit}&offset={offset}",
            limit = limit,
            offset = offset
        ));
        self.get_json(&api_url).await
    }

    /// Creates a playlist owned by the current user (`POST /me/playlists`).
    pub async fn create(
        &self,
        request: &CreatePlaylistRequest,
    ) -> Result<CreatePlaylistResponse, PipelineError> {
        let api_url = self.url("/me/playlists");
        debug!(name = %request.name, "creating playlist");
        self.post_json(&api_url, request).await
    }

    /// Appends track uris to a playlist. Spotify accepts at most 100 per call.
    pub async fn add_track_uris(
        &self,
        playlist_id: &str,
        uris: &[String],
    ) -> Result<(), PipelineError> {
        if uris.is_empty() {
            return Ok(());
        }

        let api_url = self.url(&format!("/playlists/{id}/tracks", id = playlist_id));
        let body = AddTrackToPlaylistRequest {
            uris: uris.to_vec(),
        };
        let res: AddTrackToPlaylistResponse = self.post_json(&api_url, &body).await?;
        debug!(playlist_id, snapshot = %res.snapshot_id, added = uris.len(), "added tracks");
        Ok(())
    }
}
