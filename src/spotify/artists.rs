use tracing::debug;

use crate::{
    config,
    error::PipelineError,
    management::AccessTokenProvider,
    spotify::SpotifyClient,
    types::{Artist, SeveralArtistsResponse},
};

impl<P: AccessTokenProvider + ?Sized> SpotifyClient<P> {
    /// Retrieves several artists with their genre tags in one request.
    ///
    /// Spotify rejects more than 50 ids per call, so larger inputs are an
    /// input error rather than a silent truncation. Ids Spotify does not know
    /// come back as `null` and are dropped.
    pub async fn get_several_artists(&self, ids: &[String]) -> Result<Vec<Artist>, PipelineError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        if ids.len() > config::ARTIST_BATCH_SIZE {
            return Err(PipelineError::validation(format!(
                "at most {} artist ids per lookup, got {}",
                config::ARTIST_BATCH_SIZE,
                ids.len()
            )));
        }

        let api_url = self.url(&format!("/artists?ids={ids}", ids = ids.join(",")));
        debug!(count = ids.len(), "fetching artists");

        let res: SeveralArtistsResponse = self.get_json(&api_url).await?;
        Ok(res.artists.into_iter().flatten().collect())
    }
}
