mod auth;
mod genre_cache;
mod store;

pub use auth::AccessTokenProvider;
pub use auth::REFRESH_BUFFER_SECS;
pub use auth::TokenManager;
pub use genre_cache::ArtistGenreCache;
pub use genre_cache::BatchLookup;
pub use genre_cache::CACHE_KEY_PREFIX;
pub use genre_cache::CacheStats;
pub use genre_cache::CacheStatsSnapshot;
pub use genre_cache::DEFAULT_TTL_SECS;
pub use genre_cache::genres_for_artists;
pub use store::FileStore;
pub use store::KeyValueStore;
pub use store::MemoryStore;
