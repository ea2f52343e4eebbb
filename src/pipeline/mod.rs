//! # Genre Pipeline
//!
//! The two operations genrefy exposes on top of the Spotify client:
//!
//! - [`Aggregator::aggregate`] - pull liked songs and playlists, deduplicate
//!   them in source order and bucket the tracks by their artists' genres
//! - [`BulkCreator::create_bulk`] - turn each genre bucket into a playlist and
//!   report the outcome of every genre separately
//!
//! Both run as one sequential chain of requests. Spotify limits requests per
//! rolling window, and parallel fan-out would only produce more `429`s.

mod aggregator;
mod bulk;

pub use aggregator::AggregatorOptions;
pub use aggregator::Aggregator;
pub use aggregator::TrackSources;
pub use aggregator::UNKNOWN_GENRE;
pub use bulk::BulkCreator;
pub use bulk::BulkOptions;
pub use bulk::ProgressCallback;
