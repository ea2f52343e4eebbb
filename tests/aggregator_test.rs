mod common;

use std::sync::Arc;

use common::{Call, FakeSpotify, episode, removed_track, track, tracks_by};
use genrefy::{
    error::PipelineError,
    management::{ArtistGenreCache, MemoryStore},
    pipeline::{Aggregator, AggregatorOptions, TrackSources, UNKNOWN_GENRE},
    types::{SourceTag, TrackItem, TrackObject},
};

fn cache() -> ArtistGenreCache<MemoryStore> {
    ArtistGenreCache::new(Arc::new(MemoryStore::new()))
}

fn options(max_tracks: usize) -> AggregatorOptions {
    AggregatorOptions {
        liked_page_size: 10,
        playlist_page_size: 10,
        max_tracks,
    }
}

fn ids(set: Option<&genrefy::types::TrackIdSet>) -> Vec<String> {
    set.map(|s| s.as_slice().to_vec()).unwrap_or_default()
}

#[tokio::test]
async fn test_no_source_is_rejected_without_calls() {
    let api = FakeSpotify::new();
    let cache = cache();
    let aggregator = Aggregator::new(&api, &cache, AggregatorOptions::default());

    let res = aggregator.aggregate(&TrackSources::default()).await;

    assert!(matches!(res, Err(PipelineError::Validation(_))));
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn test_duplicates_are_attributed_to_the_first_source() {
    let api = FakeSpotify::new()
        .with_liked(vec![track("t1", &["a"]), track("t2", &["b"])])
        .with_playlist("p", vec![track("t2", &["b"]), track("t3", &["c"])])
        .with_artist("a", &["rock", "indie"])
        .with_artist("b", &["rock"])
        .with_artist("c", &["jazz"]);
    let cache = cache();
    let aggregator = Aggregator::new(&api, &cache, options(100));

    let sources = TrackSources::liked().with_playlists(vec!["p".to_string()]);
    let result = aggregator.aggregate(&sources).await.unwrap();

    let tracks: Vec<(&str, &SourceTag)> = result
        .tracks
        .iter()
        .map(|t| (t.id.as_str(), &t.source))
        .collect();
    assert_eq!(
        tracks,
        vec![
            ("t1", &SourceTag::Liked),
            ("t2", &SourceTag::Liked),
            ("t3", &SourceTag::Playlist("p".to_string())),
        ]
    );

    assert_eq!(ids(result.buckets.get("rock")), vec!["t1", "t2"]);
    assert_eq!(ids(result.buckets.get("indie")), vec!["t1"]);
    assert_eq!(ids(result.buckets.get("jazz")), vec!["t3"]);
    assert_eq!(result.buckets.len(), 3);
    assert_eq!(result.library_size, 4);
    assert!(!result.truncated);
}

#[tokio::test]
async fn test_track_lands_in_union_of_artist_genres() {
    let api = FakeSpotify::new()
        .with_liked(vec![track("t1", &["a", "b"])])
        .with_artist("a", &["Synth Pop", "electronic"])
        .with_artist("b", &["synth  pop", "new wave"]);
    let cache = cache();
    let aggregator = Aggregator::new(&api, &cache, options(100));

    let result = aggregator.aggregate(&TrackSources::liked()).await.unwrap();

    let genres: Vec<&String> = result.buckets.genres().collect();
    assert_eq!(genres, vec!["electronic", "new wave", "synth pop"]);
    for genre in genres {
        assert_eq!(ids(result.buckets.get(genre)), vec!["t1"]);
    }
}

#[tokio::test]
async fn test_genreless_tracks_are_dropped_or_bucketed() {
    let api = FakeSpotify::new()
        .with_liked(vec![track("t1", &["a"]), track("t2", &["nobody"])])
        .with_artist("a", &["folk"])
        .with_artist("nobody", &[]);
    let cache = cache();
    let aggregator = Aggregator::new(&api, &cache, options(100));

    let dropped = aggregator.aggregate(&TrackSources::liked()).await.unwrap();
    assert_eq!(dropped.untagged, 1);
    assert!(dropped.buckets.get(UNKNOWN_GENRE).is_none());

    let sources = TrackSources {
        include_unknown: true,
        ..TrackSources::liked()
    };
    let kept = aggregator.aggregate(&sources).await.unwrap();
    assert_eq!(kept.untagged, 0);
    assert_eq!(ids(kept.buckets.get(UNKNOWN_GENRE)), vec!["t2"]);
}

#[tokio::test]
async fn test_unusable_items_are_skipped() {
    let local_file = TrackItem {
        track: Some(TrackObject {
            id: None,
            name: "local.mp3".to_string(),
            artists: vec![],
            kind: Some("track".to_string()),
        }),
    };
    let api = FakeSpotify::new()
        .with_playlist(
            "p",
            vec![removed_track(), episode("e1"), local_file, track("t1", &["a"])],
        )
        .with_artist("a", &["soul"]);
    let cache = cache();
    let aggregator = Aggregator::new(&api, &cache, options(100));

    let sources = TrackSources::default().with_playlists(vec!["p".to_string()]);
    let result = aggregator.aggregate(&sources).await.unwrap();

    assert_eq!(result.tracks.len(), 1);
    assert_eq!(result.tracks[0].id, "t1");
    assert_eq!(result.library_size, 4);
}

#[tokio::test]
async fn test_pages_are_walked_in_order() {
    let api = FakeSpotify::new()
        .with_liked(tracks_by("t", 25, "a"))
        .with_artist("a", &["house"]);
    let cache = cache();
    let aggregator = Aggregator::new(&api, &cache, options(100));

    let result = aggregator.aggregate(&TrackSources::liked()).await.unwrap();

    let pages: Vec<Call> = api
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::Liked { .. }))
        .collect();
    assert_eq!(
        pages,
        vec![
            Call::Liked { offset: 0, limit: 10 },
            Call::Liked { offset: 10, limit: 10 },
            Call::Liked { offset: 20, limit: 10 },
        ]
    );

    let expected: Vec<String> = (0..25).map(|i| format!("t{}", i)).collect();
    assert_eq!(ids(result.buckets.get("house")), expected);
}

#[tokio::test]
async fn test_truncation_keeps_a_deterministic_prefix() {
    let api = FakeSpotify::new()
        .with_liked(tracks_by("l", 30, "a"))
        .with_playlist("p", tracks_by("p", 20, "a"))
        .with_artist("a", &["metal"]);
    let cache = cache();
    let aggregator = Aggregator::new(&api, &cache, options(25));

    let sources = TrackSources::liked().with_playlists(vec!["p".to_string()]);
    let result = aggregator.aggregate(&sources).await.unwrap();

    assert!(result.truncated);
    assert_eq!(result.tracks.len(), 25);
    assert_eq!(result.library_size, 50);

    let expected: Vec<String> = (0..25).map(|i| format!("l{}", i)).collect();
    assert_eq!(ids(result.buckets.get("metal")), expected);

    // the playlist past the ceiling is only probed for its size
    assert_eq!(
        api.count(|c| matches!(c, Call::PlaylistTracks { .. })),
        1
    );
    assert!(api.calls().contains(&Call::PlaylistTracks {
        id: "p".to_string(),
        offset: 0,
        limit: 1
    }));
}

#[tokio::test]
async fn test_exact_ceiling_is_not_truncation() {
    let api = FakeSpotify::new()
        .with_liked(tracks_by("t", 10, "a"))
        .with_artist("a", &["pop"]);
    let cache = cache();
    let aggregator = Aggregator::new(&api, &cache, options(10));

    let result = aggregator.aggregate(&TrackSources::liked()).await.unwrap();

    assert!(!result.truncated);
    assert_eq!(result.tracks.len(), 10);
}

#[tokio::test]
async fn test_upstream_failure_fails_the_aggregation() {
    let api = FakeSpotify::new().with_liked(vec![track("t1", &["a"])]);
    let cache = cache();
    let aggregator = Aggregator::new(&api, &cache, options(100));

    let sources = TrackSources::liked().with_playlists(vec!["missing".to_string()]);
    let res = aggregator.aggregate(&sources).await;

    assert!(matches!(
        res,
        Err(PipelineError::Upstream {
            status: Some(404),
            ..
        })
    ));
    assert_eq!(api.count(|c| matches!(c, Call::Artists(_))), 0);
}

#[tokio::test]
async fn test_second_run_uses_the_genre_cache() {
    let api = FakeSpotify::new()
        .with_liked(vec![track("t1", &["a"]), track("t2", &["b"])])
        .with_artist("a", &["trip hop"])
        .with_artist("b", &["dub"]);
    let cache = cache();
    let aggregator = Aggregator::new(&api, &cache, options(100));

    let first = aggregator.aggregate(&TrackSources::liked()).await.unwrap();
    let second = aggregator.aggregate(&TrackSources::liked()).await.unwrap();

    assert_eq!(first.buckets, second.buckets);
    assert_eq!(api.count(|c| matches!(c, Call::Artists(_))), 1);
    assert_eq!(cache.stats().snapshot().hits, 2);
}
