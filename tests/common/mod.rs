#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
    sync::atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use genrefy::{
    error::{AuthError, PipelineError},
    spotify::SpotifyApi,
    types::{
        Artist, CreatePlaylistRequest, CreatePlaylistResponse, ExternalUrls, Page, Playlist,
        PlaylistTracksRef, SimplifiedArtist, TrackItem, TrackObject,
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Liked { offset: u32, limit: u32 },
    PlaylistTracks { id: String, offset: u32, limit: u32 },
    Artists(Vec<String>),
    UserPlaylists { offset: u32, limit: u32 },
    CreatePlaylist(String),
    AddTracks { playlist_id: String, uris: Vec<String> },
}

/// In-memory stand-in for the Spotify Web API.
#[derive(Default)]
pub struct FakeSpotify {
    pub liked: Vec<TrackItem>,
    pub playlists: HashMap<String, Vec<TrackItem>>,
    /// Artist id to genres. Ids missing here are unknown to the fake.
    pub artists: HashMap<String, Vec<String>>,
    pub user_playlists: Mutex<Vec<Playlist>>,
    /// Playlist names whose creation fails with a 500.
    pub fail_create: HashSet<String>,
    /// Playlist names whose track upload fails with a 403.
    pub fail_add_tracks: HashSet<String>,
    pub fail_user_playlists: bool,
    /// Every create call after this many answers 401.
    pub unauthorized_after: Option<usize>,
    pub calls: Mutex<Vec<Call>>,
    pub created: AtomicUsize,
}

impl FakeSpotify {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_liked(mut self, items: Vec<TrackItem>) -> Self {
        self.liked = items;
        self
    }

    pub fn with_playlist(mut self, id: &str, items: Vec<TrackItem>) -> Self {
        self.playlists.insert(id.to_string(), items);
        self
    }

    pub fn with_artist(mut self, id: &str, genres: &[&str]) -> Self {
        self.artists
            .insert(id.to_string(), genres.iter().map(|g| g.to_string()).collect());
        self
    }

    pub fn with_existing_playlist(self, name: &str) -> Self {
        let id = format!("existing{}", self.user_playlists.lock().unwrap().len());
        self.user_playlists.lock().unwrap().push(playlist(&id, name));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|&c| matches(c)).count()
    }

    pub fn created_names(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::CreatePlaylist(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

fn paginate<T: Clone>(all: &[T], offset: u32, limit: u32) -> Page<T> {
    let start = (offset as usize).min(all.len());
    let end = (start + limit as usize).min(all.len());
    Page {
        items: all[start..end].to_vec(),
        total: all.len() as u32,
        offset,
        limit,
        next: (end < all.len()).then(|| format!("next?offset={}", end)),
    }
}

#[async_trait]
impl SpotifyApi for FakeSpotify {
    async fn liked_tracks(
        &self,
        offset: u32,
        limit: u32,
    ) -> Result<Page<TrackItem>, PipelineError> {
        self.record(Call::Liked { offset, limit });
        Ok(paginate(&self.liked, offset, limit))
    }

    async fn playlist_tracks(
        &self,
        playlist_id: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Page<TrackItem>, PipelineError> {
        self.record(Call::PlaylistTracks {
            id: playlist_id.to_string(),
            offset,
            limit,
        });
        match self.playlists.get(playlist_id) {
            Some(items) => Ok(paginate(items, offset, limit)),
            None => Err(PipelineError::upstream(Some(404), "Resource not found")),
        }
    }

    async fn artists(&self, ids: &[String]) -> Result<Vec<Artist>, PipelineError> {
        self.record(Call::Artists(ids.to_vec()));
        if ids.len() > 50 {
            return Err(PipelineError::validation("too many ids"));
        }
        Ok(ids
            .iter()
            .filter_map(|id| {
                self.artists.get(id).map(|genres| Artist {
                    id: id.clone(),
                    name: format!("Artist {}", id),
                    genres: genres.clone(),
                })
            })
            .collect())
    }

    async fn user_playlists(
        &self,
        offset: u32,
        limit: u32,
    ) -> Result<Page<Playlist>, PipelineError> {
        self.record(Call::UserPlaylists { offset, limit });
        if self.fail_user_playlists {
            return Err(PipelineError::upstream(Some(500), "listing failed"));
        }
        let all = self.user_playlists.lock().unwrap().clone();
        Ok(paginate(&all, offset, limit))
    }

    async fn create_playlist(
        &self,
        request: &CreatePlaylistRequest,
    ) -> Result<CreatePlaylistResponse, PipelineError> {
        self.record(Call::CreatePlaylist(request.name.clone()));

        let n = self.created.fetch_add(1, Ordering::SeqCst);
        if self.unauthorized_after.is_some_and(|limit| n >= limit) {
            return Err(AuthError::Unauthorized(401).into());
        }
        if self.fail_create.contains(&request.name) {
            return Err(PipelineError::upstream(Some(500), "server error"));
        }

        let id = format!("pl{}", n);
        self.user_playlists
            .lock()
            .unwrap()
            .push(playlist(&id, &request.name));
        Ok(CreatePlaylistResponse {
            id: id.clone(),
            name: request.name.clone(),
            external_urls: ExternalUrls {
                spotify: Some(format!("https://open.spotify.com/playlist/{}", id)),
            },
        })
    }

    async fn add_tracks(&self, playlist_id: &str, uris: &[String]) -> Result<(), PipelineError> {
        self.record(Call::AddTracks {
            playlist_id: playlist_id.to_string(),
            uris: uris.to_vec(),
        });
        let name = self
            .user_playlists
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == playlist_id)
            .map(|p| p.name.clone())
            .unwrap_or_default();
        if self.fail_add_tracks.contains(&name) {
            return Err(PipelineError::upstream(Some(403), "forbidden"));
        }
        Ok(())
    }
}

pub fn track(id: &str, artist_ids: &[&str]) -> TrackItem {
    TrackItem {
        track: Some(TrackObject {
            id: Some(id.to_string()),
            name: format!("Track {}", id),
            artists: artist_ids
                .iter()
                .map(|a| SimplifiedArtist {
                    id: Some(a.to_string()),
                    name: format!("Artist {}", a),
                })
                .collect(),
            kind: Some("track".to_string()),
        }),
    }
}

pub fn episode(id: &str) -> TrackItem {
    let mut item = track(id, &[]);
    if let Some(t) = item.track.as_mut() {
        t.kind = Some("episode".to_string());
    }
    item
}

pub fn removed_track() -> TrackItem {
    TrackItem { track: None }
}

pub fn playlist(id: &str, name: &str) -> Playlist {
    Playlist {
        id: id.to_string(),
        name: name.to_string(),
        description: None,
        public: Some(false),
        collaborative: false,
        tracks: Some(PlaylistTracksRef { total: 0 }),
        external_urls: ExternalUrls::default(),
    }
}

/// `n` tracks `prefix0..prefix{n-1}`, all by `artist`.
pub fn tracks_by(prefix: &str, n: usize, artist: &str) -> Vec<TrackItem> {
    (0..n)
        .map(|i| track(&format!("{}{}", prefix, i), &[artist]))
        .collect()
}
