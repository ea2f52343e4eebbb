use tracing::debug;

use crate::{
    error::PipelineError,
    management::AccessTokenProvider,
    spotify::SpotifyClient,
    types::{Page, TrackItem},
};

impl<P: AccessTokenProvider + ?Sized> SpotifyClient<P> {
    /// Retrieves one page of the user's liked songs (`GET /me/tracks`).
    ///
    /// Spotify accepts a `limit` between 1 and 50. Pages are addressed by
    /// `offset`; the response carries the library `total` on every page.
    pub async fn get_liked_tracks(
        &self,
        offset: u32,
        limit: u32,
    ) -> Result<Page<TrackItem>, PipelineError> {
        let api_url = self.url(&format!(
            "/me/tracks?limit={limit}&offset={offset}",
            limit = limit,
            offset = offset
        ));
        debug!(offset, limit, "fetching liked tracks page");
        self.get_json(&api_url).await
    }

    /// Retrieves one page of a playlist's items (`GET /playlists/{id}/tracks`).
    ///
    /// Items whose track was removed come back as `null` and are kept as
    /// `TrackItem { track: None }` for the caller to skip.
    pub async fn get_playlist_tracks(
        &self,
        playlist_id: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Page<TrackItem>, PipelineError> {
        let api_url = self.url(&format!(
            "/playlists/{id}/tracks?limit={limit}&offset={offset}&additional_types=track",
            id = playlist_id,
            limit = limit,
            offset = offset
        ));
        debug!(playlist_id, offset, limit, "fetching playlist tracks page");
        self.get_json(&api_url).await
    }
}
