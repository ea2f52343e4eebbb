use crate::{
    cli::{fail, open_store},
    config::{DEFAULT_CACHE_HARD_EXPIRY_DAYS, PipelineConfig},
    info,
    management::ArtistGenreCache,
    success, utils, warning,
};

pub async fn cache_stats() {
    let config = PipelineConfig::from_env();
    let store = open_store().await;
    let cache = ArtistGenreCache::from_config(store.clone(), &config);

    let (total, stale) = match (cache.count().await, cache.count_stale().await) {
        (Ok(total), Ok(stale)) => (total, stale),
        (Err(e), _) | (_, Err(e)) => fail(e),
    };

    info!("Genre cache: {}", store.path().display());
    info!(
        "{} artists cached, {} fresh, {} older than {} days.",
        total,
        total.saturating_sub(stale),
        stale,
        config.cache_ttl.as_secs() / 86_400
    );
}

pub async fn cache_compact(days: Option<u64>) {
    let config = PipelineConfig::from_env();
    let store = open_store().await;
    let cache = ArtistGenreCache::from_config(store.clone(), &config);

    let days = days.unwrap_or(DEFAULT_CACHE_HARD_EXPIRY_DAYS);
    let removed = match cache.compact(utils::days(days)).await {
        Ok(removed) => removed,
        Err(e) => fail(e),
    };

    if removed == 0 {
        info!("Nothing older than {} days in the genre cache.", days);
        return;
    }

    if let Err(e) = store.flush().await {
        warning!("Cannot save genre cache. Err: {}", e);
        return;
    }
    success!("Removed {} genre cache entries older than {} days.", removed, days);
}
