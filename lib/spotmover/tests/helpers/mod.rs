//! Shared fixtures for the engine integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use shared::{
    catalog::{AlbumCandidate, PlaylistSummary, TrackCandidate},
    dump::{Album, Song},
};
use spotmover::{error::Result, CatalogProvider, Confirm, SpotmoverError};
use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

/// In-memory catalog that records every call made against it.
#[derive(Default)]
pub struct MockCatalog {
    albums: HashMap<(String, String), Vec<AlbumCandidate>>,
    tracks: HashMap<(String, String, String), Vec<TrackCandidate>>,
    saved: Vec<Album>,
    playlists: Mutex<Vec<PlaylistSummary>>,
    search_failure: Option<u16>,
    listing_failure: Option<u16>,

    pub album_searches: AtomicUsize,
    pub track_searches: AtomicUsize,
    pub playlist_listings: AtomicUsize,
    pub saved_batches: Mutex<Vec<Vec<String>>>,
    pub track_batches: Mutex<Vec<(String, Vec<String>)>>,
    pub created: Mutex<Vec<(String, String, bool)>>,
}

pub fn album_candidate(id: &str, name: &str) -> AlbumCandidate {
    AlbumCandidate {
        id: id.to_string(),
        name: name.to_string(),
    }
}

pub fn track_candidate(id: &str, artist: &str, album: &str, title: &str) -> TrackCandidate {
    TrackCandidate {
        id: Some(id.to_string()),
        track_name: title.to_string(),
        album_name: album.to_string(),
        artist_names: vec![artist.to_string()],
    }
}

impl MockCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_album(mut self, artist: &str, album: &str, candidates: Vec<AlbumCandidate>) -> Self {
        self.albums
            .insert((artist.to_string(), album.to_string()), candidates);
        self
    }

    /// Registers an exact single hit for `song`, with id `id`.
    pub fn with_song(self, song: &Song, id: &str) -> Self {
        let candidate = track_candidate(id, &song.artist, &song.album, &song.title);
        self.with_track(song, vec![candidate])
    }

    pub fn with_track(mut self, song: &Song, candidates: Vec<TrackCandidate>) -> Self {
        self.tracks.insert(
            (song.artist.clone(), song.album.clone(), song.title.clone()),
            candidates,
        );
        self
    }

    pub fn with_saved(mut self, artist: &str, album: &str) -> Self {
        self.saved.push(Album::new(artist, album));
        self
    }

    pub fn with_playlist(self, id: &str, name: &str) -> Self {
        self.playlists.lock().unwrap().push(PlaylistSummary {
            id: id.to_string(),
            name: name.to_string(),
        });
        self
    }

    pub fn failing_searches(mut self, status: u16) -> Self {
        self.search_failure = Some(status);
        self
    }

    pub fn failing_listings(mut self, status: u16) -> Self {
        self.listing_failure = Some(status);
        self
    }

    pub fn album_search_count(&self) -> usize {
        self.album_searches.load(Ordering::SeqCst)
    }

    pub fn track_search_count(&self) -> usize {
        self.track_searches.load(Ordering::SeqCst)
    }

    pub fn saved_batch_sizes(&self) -> Vec<usize> {
        self.saved_batches.lock().unwrap().iter().map(Vec::len).collect()
    }

    pub fn track_batch_sizes(&self) -> Vec<usize> {
        self.track_batches
            .lock()
            .unwrap()
            .iter()
            .map(|(_, ids)| ids.len())
            .collect()
    }

    pub fn created_names(&self) -> Vec<String> {
        self.created
            .lock()
            .unwrap()
            .iter()
            .map(|(_, name, _)| name.clone())
            .collect()
    }

    fn api_error(status: u16) -> SpotmoverError {
        SpotmoverError::Api {
            status,
            message: "mock failure".to_string(),
        }
    }
}

#[async_trait]
impl CatalogProvider for MockCatalog {
    fn id(&self) -> &'static str {
        "mock"
    }

    fn name(&self) -> &'static str {
        "Mock"
    }

    async fn search_albums(&self, artist: &str, album: &str) -> Result<Vec<AlbumCandidate>> {
        self.album_searches.fetch_add(1, Ordering::SeqCst);
        if let Some(status) = self.search_failure {
            return Err(Self::api_error(status));
        }
        Ok(self
            .albums
            .get(&(artist.to_string(), album.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn search_tracks(
        &self,
        artist: &str,
        album: &str,
        title: &str,
    ) -> Result<Vec<TrackCandidate>> {
        self.track_searches.fetch_add(1, Ordering::SeqCst);
        if let Some(status) = self.search_failure {
            return Err(Self::api_error(status));
        }
        Ok(self
            .tracks
            .get(&(artist.to_string(), album.to_string(), title.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn list_saved_albums(&self) -> Result<Vec<Album>> {
        if let Some(status) = self.listing_failure {
            return Err(Self::api_error(status));
        }
        Ok(self.saved.clone())
    }

    async fn add_saved_albums(&self, ids: &[String]) -> Result<()> {
        self.saved_batches.lock().unwrap().push(ids.to_vec());
        Ok(())
    }

    async fn list_playlists(&self) -> Result<Vec<PlaylistSummary>> {
        self.playlist_listings.fetch_add(1, Ordering::SeqCst);
        if let Some(status) = self.listing_failure {
            return Err(Self::api_error(status));
        }
        Ok(self.playlists.lock().unwrap().clone())
    }

    async fn create_playlist(&self, owner: &str, name: &str, public: bool) -> Result<PlaylistSummary> {
        let mut created = self.created.lock().unwrap();
        created.push((owner.to_string(), name.to_string(), public));
        let summary = PlaylistSummary {
            id: format!("pl-{}", created.len()),
            name: name.to_string(),
        };
        self.playlists.lock().unwrap().push(summary.clone());
        Ok(summary)
    }

    async fn add_playlist_tracks(
        &self,
        _owner: &str,
        playlist_id: &str,
        track_ids: &[String],
    ) -> Result<()> {
        self.track_batches
            .lock()
            .unwrap()
            .push((playlist_id.to_string(), track_ids.to_vec()));
        Ok(())
    }
}

/// Answers prompts from a fixed script and records what was asked.
/// Once the script runs out every answer is the fallback.
pub struct ScriptedConfirm {
    answers: Mutex<VecDeque<bool>>,
    fallback: bool,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedConfirm {
    /// Falls back to "no".
    pub fn new(answers: &[bool]) -> Self {
        Self {
            answers: Mutex::new(answers.iter().copied().collect()),
            fallback: false,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Says "yes" to everything, like an unattended run.
    pub fn yes() -> Self {
        Self {
            fallback: true,
            ..Self::new(&[])
        }
    }

    pub fn asked(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl Confirm for ScriptedConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.answers.lock().unwrap().pop_front().unwrap_or(self.fallback)
    }
}
