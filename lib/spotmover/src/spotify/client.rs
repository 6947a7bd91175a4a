use async_trait::async_trait;
use reqwest::{header::RETRY_AFTER, Client, Method, Response, StatusCode};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde_json::{json, Value};
use shared::{
    catalog::{AlbumCandidate, PlaylistSummary, TrackCandidate},
    dump::{Album, Dump, Playlist, Song},
};
use std::{sync::Arc, time::Duration};
use tokio::{sync::RwLock, time::sleep};
use tracing::{debug, info, warn};
use url::Url;

use super::models::{
    AlbumSearch, FullTrack, PlaylistItem, SavedAlbum, SavedTrack, SimplifiedPlaylist, TrackSearch,
};
use crate::{
    error::{Result, SpotmoverError},
    paginate::{self, Page},
    Authenticator, CatalogProvider, LibrarySource, Session,
};

pub const API_BASE_URL: &str = "https://api.spotify.com/v1";

/// Largest page the listing endpoints hand out.
const PAGE_LIMIT: u32 = 50;
const PLAYLIST_ITEMS_LIMIT: u32 = 100;
const SEARCH_LIMIT: u32 = 20;

/// Maximum attempts for transient errors
const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff (milliseconds)
const BASE_DELAY_MS: u64 = 500;

/// Maximum backoff delay cap (milliseconds)
const MAX_BACKOFF_MS: u64 = 5000;

pub(crate) fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(std::cmp::min(
        BASE_DELAY_MS.saturating_mul(2u64.saturating_pow(attempt)),
        MAX_BACKOFF_MS,
    ))
}

fn retry_after(response: &Response) -> Option<Duration> {
    if response.status() != StatusCode::TOO_MANY_REQUESTS {
        return None;
    }
    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn track_uri(id: &str) -> String {
    format!("spotify:track:{id}")
}

fn artist_names(track: &FullTrack) -> Vec<String> {
    track.artists.iter().map(|artist| artist.name.clone()).collect()
}

/// The album artist when the catalog has one, the track artist otherwise.
fn song_from_track(track: &FullTrack) -> Song {
    let artist = track
        .album
        .artists
        .first()
        .or_else(|| track.artists.first())
        .map(|artist| artist.name.as_str())
        .unwrap_or("Unknown Artist");
    Song::new(artist, &track.album.name, &track.name)
}

/// Local files come back without an id; they stay in the list so the
/// matcher sees every result the search produced.
fn track_candidates(search: TrackSearch) -> Vec<TrackCandidate> {
    search
        .tracks
        .items
        .into_iter()
        .map(|track| TrackCandidate {
            artist_names: artist_names(&track),
            id: track.id,
            track_name: track.name,
            album_name: track.album.name,
        })
        .collect()
}

pub struct SpotifyClient {
    base_url: Url,
    client: Client,
    user_id: String,
    session: RwLock<Session>,
    /// Renews the session once it expires or is rejected.
    authenticator: Option<Arc<dyn Authenticator>>,
    max_retries: u32,
}

#[derive(Default)]
pub struct SpotifyClientBuilder {
    base_url: Option<String>,
    session: Option<Session>,
    authenticator: Option<Arc<dyn Authenticator>>,
    max_retries: Option<u32>,
}

impl SpotifyClientBuilder {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn base_url(mut self, url: &str) -> Self {
        self.base_url = Some(url.to_string());
        self
    }

    pub fn session(mut self, session: Session) -> Self {
        self.session = Some(session);
        self
    }

    pub fn authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn build(self) -> Result<SpotifyClient> {
        let session = self.session.ok_or(SpotmoverError::NotConfigured)?;
        let base_url_str = self.base_url.unwrap_or_else(|| API_BASE_URL.to_string());
        let base_url = Url::parse(&format!("{}/", base_url_str.trim_end_matches('/')))?;
        if base_url.cannot_be_a_base() {
            return Err(SpotmoverError::NotConfigured);
        }

        Ok(SpotifyClient {
            base_url,
            client: Client::new(),
            user_id: session.user_id.clone(),
            session: RwLock::new(session),
            authenticator: self.authenticator,
            max_retries: self.max_retries.unwrap_or(MAX_RETRIES).max(1),
        })
    }
}

impl SpotifyClient {
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Current access token, renewed first when the session has expired.
    pub(crate) async fn access_token(&self) -> Result<String> {
        let token = {
            let session = self.session.read().await;
            if !session.is_expired() {
                return Ok(session.access_token.clone());
            }
            session.access_token.clone()
        };
        self.renew_session(&token).await
    }

    /// Replaces the session `stale_token` belongs to. Concurrent callers
    /// holding the same stale token share one renewal.
    async fn renew_session(&self, stale_token: &str) -> Result<String> {
        let Some(authenticator) = &self.authenticator else {
            return Err(SpotmoverError::Auth("session has expired".to_string()));
        };

        let mut session = self.session.write().await;
        if session.access_token != stale_token && !session.is_expired() {
            return Ok(session.access_token.clone());
        }

        info!("Renewing the Spotify session");
        let renewed = authenticator.authenticate().await?;
        if renewed.user_id != self.user_id {
            return Err(SpotmoverError::Auth(format!(
                "renewed session belongs to {} instead of {}",
                renewed.user_id, self.user_id
            )));
        }
        *session = renewed;
        Ok(session.access_token.clone())
    }

    pub(crate) fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SpotmoverError::NotConfigured)?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn listing_url(&self, segments: &[&str], limit: u32) -> Result<Url> {
        let mut url = self.endpoint(segments)?;
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string());
        Ok(url)
    }

    pub(crate) fn search_url(&self, query: &str, kind: &str) -> Result<Url> {
        let mut url = self.endpoint(&["search"])?;
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("type", kind)
            .append_pair("limit", &SEARCH_LIMIT.to_string());
        Ok(url)
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<Value>,
    ) -> Result<T> {
        let mut attempt = 0;
        let mut renewed = false;
        loop {
            let token = self.access_token().await?;
            debug!("Request: {} {}", method, url);
            let mut request = self
                .client
                .request(method.clone(), url.clone())
                .bearer_auth(&token);
            if let Some(b) = &body {
                request = request.json(b);
            }

            let (result, wait) = match request.send().await {
                Ok(response) => {
                    let wait = retry_after(&response);
                    (Self::handle_response(response).await, wait)
                }
                Err(e) => (Err(e.into()), None),
            };

            match result {
                Err(SpotmoverError::Auth(message)) if !renewed && self.authenticator.is_some() => {
                    warn!("{} {} was rejected, renewing the session: {}", method, url, message);
                    self.renew_session(&token).await?;
                    renewed = true;
                }
                Err(e) if e.is_transient() && attempt + 1 < self.max_retries => {
                    let delay = wait.unwrap_or_else(|| backoff_delay(attempt));
                    warn!(
                        "{} {} failed (attempt {}/{}), retrying in {}ms: {}",
                        method,
                        url,
                        attempt + 1,
                        self.max_retries,
                        delay.as_millis(),
                        e
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn handle_response<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            let text = response.text().await?;
            let text = if text.trim().is_empty() { "null" } else { text.as_str() };
            serde_json::from_str(text).map_err(|e| SpotmoverError::Api {
                status: status.as_u16(),
                message: format!("JSON parse error: {e}"),
            })
        } else {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error body".to_string());
            if status == StatusCode::UNAUTHORIZED {
                return Err(SpotmoverError::Auth(text));
            }
            Err(SpotmoverError::Api {
                status: status.as_u16(),
                message: text,
            })
        }
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        self.execute(Method::GET, url, None).await
    }

    async fn get_page<T: DeserializeOwned>(&self, next: String) -> Result<Page<T>> {
        self.get(Url::parse(&next)?).await
    }

    async fn get_all<T: DeserializeOwned>(&self, url: Url) -> Result<Vec<T>> {
        let first: Page<T> = self.get(url).await?;
        paginate::fetch_all(first, |next| self.get_page(next)).await
    }

    async fn saved_tracks(&self) -> Result<Vec<Song>> {
        let saved: Vec<SavedTrack> = self
            .get_all(self.listing_url(&["me", "tracks"], PAGE_LIMIT)?)
            .await?;
        Ok(saved.iter().map(|item| song_from_track(&item.track)).collect())
    }

    async fn playlist_tracks(&self, playlist_id: &str) -> Result<Vec<Song>> {
        let items: Vec<PlaylistItem> = self
            .get_all(self.listing_url(&["playlists", playlist_id, "tracks"], PLAYLIST_ITEMS_LIMIT)?)
            .await?;
        Ok(items
            .iter()
            .filter_map(|item| item.track.as_ref())
            .map(song_from_track)
            .collect())
    }
}

#[async_trait]
impl CatalogProvider for SpotifyClient {
    fn id(&self) -> &'static str {
        "spotify"
    }

    fn name(&self) -> &'static str {
        "Spotify"
    }

    async fn search_albums(&self, artist: &str, album: &str) -> Result<Vec<AlbumCandidate>> {
        let url = self.search_url(&format!("artist:{artist} album:{album}"), "album")?;
        let result: AlbumSearch = self.get(url).await?;
        Ok(result
            .albums
            .items
            .into_iter()
            .filter_map(|album| {
                album.id.map(|id| AlbumCandidate {
                    id,
                    name: album.name,
                })
            })
            .collect())
    }

    async fn search_tracks(
        &self,
        artist: &str,
        album: &str,
        title: &str,
    ) -> Result<Vec<TrackCandidate>> {
        let url = self.search_url(&format!("artist:{artist} album:{album} track:{title}"), "track")?;
        let result: TrackSearch = self.get(url).await?;
        Ok(track_candidates(result))
    }

    async fn list_saved_albums(&self) -> Result<Vec<Album>> {
        let saved: Vec<SavedAlbum> = self
            .get_all(self.listing_url(&["me", "albums"], PAGE_LIMIT)?)
            .await?;
        Ok(saved
            .iter()
            .flat_map(|item| {
                item.album
                    .artists
                    .iter()
                    .map(|artist| Album::new(&artist.name, &item.album.name))
            })
            .collect())
    }

    async fn add_saved_albums(&self, ids: &[String]) -> Result<()> {
        let _: IgnoredAny = self
            .execute(
                Method::PUT,
                self.endpoint(&["me", "albums"])?,
                Some(json!({ "ids": ids })),
            )
            .await?;
        Ok(())
    }

    async fn list_playlists(&self) -> Result<Vec<PlaylistSummary>> {
        let playlists: Vec<SimplifiedPlaylist> = self
            .get_all(self.listing_url(&["me", "playlists"], PAGE_LIMIT)?)
            .await?;
        Ok(playlists
            .into_iter()
            .map(|playlist| PlaylistSummary {
                id: playlist.id,
                name: playlist.name,
            })
            .collect())
    }

    async fn create_playlist(
        &self,
        owner: &str,
        name: &str,
        public: bool,
    ) -> Result<PlaylistSummary> {
        let created: SimplifiedPlaylist = self
            .execute(
                Method::POST,
                self.endpoint(&["users", owner, "playlists"])?,
                Some(json!({ "name": name, "public": public })),
            )
            .await?;
        info!("Created playlist '{}' ({})", created.name, created.id);
        Ok(PlaylistSummary {
            id: created.id,
            name: created.name,
        })
    }

    async fn add_playlist_tracks(
        &self,
        _owner: &str,
        playlist_id: &str,
        track_ids: &[String],
    ) -> Result<()> {
        let uris: Vec<String> = track_ids.iter().map(|id| track_uri(id)).collect();
        let _: IgnoredAny = self
            .execute(
                Method::POST,
                self.endpoint(&["playlists", playlist_id, "tracks"])?,
                Some(json!({ "uris": uris })),
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl LibrarySource for SpotifyClient {
    fn id(&self) -> &'static str {
        "spotify"
    }

    async fn dump(&self) -> Result<Dump> {
        info!("Fetching songs");
        let songs = self.saved_tracks().await?;
        info!("Number of songs: {}", songs.len());

        info!("Fetching playlists");
        let mut playlists = Vec::new();
        for summary in self.list_playlists().await? {
            let tracks = self.playlist_tracks(&summary.id).await?;
            info!("Playlist: {} ({} tracks)", summary.name, tracks.len());
            playlists.push(Playlist {
                name: summary.name,
                tracks,
            });
        }

        Ok(Dump::new("spotify", songs, playlists))
    }
}
