use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use genrefy::{
    error::{AuthError, PipelineError},
    spotify::{RequestExecutor, RetryPolicy, SpotifyApi, SpotifyClient},
    types::CreatePlaylistRequest,
};
use serde_json::{Value, json};

#[derive(Default)]
struct ServerState {
    flaky_calls: AtomicU32,
    limited_calls: AtomicU32,
    added: Mutex<Vec<(String, Vec<String>)>>,
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        == Some("Bearer good")
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": {"status": 401, "message": "The access token expired"}})),
    )
        .into_response()
}

fn track_page(ids: &[&str]) -> Value {
    let items: Vec<Value> = ids
        .iter()
        .map(|id| {
            json!({"track": {"id": id, "name": format!("Track {}", id), "type": "track",
                "artists": [{"id": "a1", "name": "Artist"}]}})
        })
        .chain(std::iter::once(json!({"track": null})))
        .collect();
    let total = items.len();
    json!({"items": items, "total": total, "offset": 0, "limit": 50, "next": null})
}

async fn liked(headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    Json(track_page(&["t1", "t2"])).into_response()
}

async fn playlist_tracks(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> Response {
    match id.as_str() {
        "flaky" => {
            if state.flaky_calls.fetch_add(1, Ordering::SeqCst) < 2 {
                StatusCode::SERVICE_UNAVAILABLE.into_response()
            } else {
                Json(track_page(&["t9"])).into_response()
            }
        }
        "limited" => {
            state.limited_calls.fetch_add(1, Ordering::SeqCst);
            (StatusCode::TOO_MANY_REQUESTS, [(header::RETRY_AFTER, "0")]).into_response()
        }
        _ => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": {"status": 404, "message": "Resource not found"}})),
        )
            .into_response(),
    }
}

async fn add_tracks(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let uris = body["uris"]
        .as_array()
        .map(|a| a.iter().filter_map(|u| u.as_str().map(String::from)).collect())
        .unwrap_or_default();
    state.added.lock().unwrap().push((id, uris));
    (StatusCode::CREATED, Json(json!({"snapshot_id": "snap1"}))).into_response()
}

async fn artists(Query(query): Query<HashMap<String, String>>) -> Response {
    let artists: Vec<Value> = query
        .get("ids")
        .map(|ids| ids.split(',').collect::<Vec<_>>())
        .unwrap_or_default()
        .into_iter()
        .map(|id| match id {
            "ghost" => Value::Null,
            id => json!({"id": id, "name": format!("Artist {}", id), "genres": ["dub", "reggae"]}),
        })
        .collect();
    Json(json!({ "artists": artists })).into_response()
}

async fn user_playlists(headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    Json(json!({
        "items": [{"id": "p1", "name": "rock (from Likes)", "public": false,
            "tracks": {"total": 3}, "external_urls": {"spotify": "https://open.spotify.com/playlist/p1"}}],
        "total": 1, "offset": 0, "limit": 50, "next": null
    }))
    .into_response()
}

async fn create_playlist(Json(body): Json<Value>) -> Response {
    (
        StatusCode::CREATED,
        Json(json!({
            "id": "new1",
            "name": body["name"],
            "external_urls": {"spotify": "https://open.spotify.com/playlist/new1"}
        })),
    )
        .into_response()
}

async fn serve(state: Arc<ServerState>) -> String {
    let app = Router::new()
        .route("/me/tracks", get(liked))
        .route("/me/playlists", get(user_playlists).post(create_playlist))
        .route("/artists", get(artists))
        .route(
            "/playlists/{id}/tracks",
            get(playlist_tracks).post(add_tracks),
        )
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn client(base_url: &str, token: &str) -> SpotifyClient<String> {
    let executor = RequestExecutor::new(RetryPolicy {
        max_retries: 3,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(20),
        jitter: false,
    });
    SpotifyClient::new(base_url, Arc::new(token.to_string()), executor)
}

#[tokio::test]
async fn test_liked_tracks_keep_null_items() {
    let base = serve(Arc::default()).await;
    let api = client(&base, "good");

    let page = api.liked_tracks(0, 50).await.unwrap();

    assert_eq!(page.total, 3);
    assert_eq!(page.items.len(), 3);
    assert_eq!(
        page.items[0].track.as_ref().unwrap().id.as_deref(),
        Some("t1")
    );
    assert!(page.items[2].track.is_none());
}

#[tokio::test]
async fn test_unauthorized_maps_to_auth_error() {
    let base = serve(Arc::default()).await;
    let api = client(&base, "expired");

    let err = api.liked_tracks(0, 50).await.unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Auth(AuthError::Unauthorized(401))
    ));
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let state = Arc::new(ServerState::default());
    let base = serve(Arc::clone(&state)).await;
    let api = client(&base, "good");

    let page = api.playlist_tracks("flaky", 0, 100).await.unwrap();

    assert_eq!(page.items.len(), 2);
    assert_eq!(state.flaky_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_exhausted_rate_limit_is_reported() {
    let state = Arc::new(ServerState::default());
    let base = serve(Arc::clone(&state)).await;
    let api = client(&base, "good");

    let err = api.playlist_tracks("limited", 0, 100).await.unwrap_err();

    assert!(matches!(
        err,
        PipelineError::RateLimited {
            status: 429,
            attempts: 3
        }
    ));
    assert_eq!(state.limited_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_other_statuses_carry_spotify_message() {
    let base = serve(Arc::default()).await;
    let api = client(&base, "good");

    let err = api.playlist_tracks("gone", 0, 100).await.unwrap_err();

    assert_eq!(err.status(), Some(404));
    assert!(err.to_string().contains("Resource not found"));
}

#[tokio::test]
async fn test_artists_drop_unknown_ids() {
    let base = serve(Arc::default()).await;
    let api = client(&base, "good");

    let artists = api
        .artists(&["a1".to_string(), "ghost".to_string(), "a2".to_string()])
        .await
        .unwrap();

    let ids: Vec<&str> = artists.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec!["a1", "a2"]);
    assert_eq!(artists[0].genres, vec!["dub", "reggae"]);
}

#[tokio::test]
async fn test_artist_lookup_rejects_oversized_batches() {
    let api = client("http://127.0.0.1:9", "good");
    let ids: Vec<String> = (0..51).map(|i| format!("a{}", i)).collect();

    let err = api.artists(&ids).await.unwrap_err();

    assert!(matches!(err, PipelineError::Validation(_)));
    assert!(api.artists(&[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_create_playlist_and_add_tracks() {
    let state = Arc::new(ServerState::default());
    let base = serve(Arc::clone(&state)).await;
    let api = client(&base, "good");

    let created = api
        .create_playlist(&CreatePlaylistRequest {
            name: "jazz (from Likes)".to_string(),
            description: "jazz".to_string(),
            public: false,
            collaborative: false,
        })
        .await
        .unwrap();
    assert_eq!(created.id, "new1");
    assert_eq!(created.name, "jazz (from Likes)");

    let uris = vec!["spotify:track:t1".to_string()];
    api.add_tracks(&created.id, &uris).await.unwrap();

    let added = state.added.lock().unwrap().clone();
    assert_eq!(added, vec![("new1".to_string(), uris)]);
}

#[tokio::test]
async fn test_user_playlists_parse() {
    let base = serve(Arc::default()).await;
    let api = client(&base, "good");

    let page = api.user_playlists(0, 50).await.unwrap();

    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].name, "rock (from Likes)");
    assert_eq!(page.items[0].tracks.as_ref().map(|t| t.total), Some(3));
}
