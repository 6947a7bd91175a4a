//! Resolves source albums and songs to catalog ids.
//!
//! Every lookup goes through the cache, including the ones that found
//! nothing, so a second run only asks the catalog about new entries.

use futures::{stream, StreamExt};
use itertools::{Either, Itertools};
use serde::{de::DeserializeOwned, Serialize};
use shared::{
    catalog::{AlbumCandidate, RemoteAlbumMatch, RemoteTrackMatch, TrackCandidate},
    dump::{Album, Song},
};
use std::{future::Future, sync::Arc};
use tracing::{debug, info, warn};

use crate::{
    cache::{self, Cache},
    error::{Result, SpotmoverError},
    CatalogProvider,
};

const KEY_SEPARATOR: char = '\u{1f}';

/// Items split by whether the catalog had them, both in input order.
#[derive(Debug, Clone)]
pub struct Resolution<S, M> {
    pub found: Vec<(S, M)>,
    pub not_found: Vec<S>,
}

impl<S, M> Resolution<S, M> {
    pub fn is_complete(&self) -> bool {
        self.not_found.is_empty()
    }
}

/// Callers pass fields already trimmed, the same ones they search and pick
/// with. Case is folded here only: catalog search and picking ignore it too.
fn cache_key(kind: &str, parts: &[&str]) -> String {
    let normalized = parts
        .iter()
        .map(|part| part.to_lowercase())
        .join(&KEY_SEPARATOR.to_string());
    format!("{kind}:{normalized}")
}

/// First candidate named exactly `album`, ignoring case.
pub fn pick_album(candidates: Vec<AlbumCandidate>, album: &str) -> Result<AlbumCandidate> {
    if candidates.is_empty() {
        return Err(SpotmoverError::NotFound(format!("No such album: {album}")));
    }

    let album_l = album.to_lowercase();
    candidates
        .into_iter()
        .find(|candidate| candidate.name.to_lowercase() == album_l)
        .ok_or_else(|| SpotmoverError::NotFound(format!("No exact match for the album: {album}")))
}

/// A lone candidate is taken as is: the search already filtered on artist,
/// album and title. With several, the first whose album, title and one of
/// its artists all equal the query (ignoring case) wins. Candidates without
/// an id still count towards that choice, so a local file next to a single
/// catalog track does not trigger the shortcut; picking one is a not-found.
pub fn pick_track(
    mut candidates: Vec<TrackCandidate>,
    artist: &str,
    album: &str,
    title: &str,
) -> Result<RemoteTrackMatch> {
    let picked = match candidates.len() {
        0 => return Err(SpotmoverError::NotFound(format!("Song not found: {title}"))),
        1 => candidates.remove(0),
        _ => {
            let (artist_l, album_l, title_l) =
                (artist.to_lowercase(), album.to_lowercase(), title.to_lowercase());
            candidates
                .into_iter()
                .find(|candidate| {
                    candidate.album_name.to_lowercase() == album_l
                        && candidate.track_name.to_lowercase() == title_l
                        && candidate
                            .artist_names
                            .iter()
                            .any(|name| name.to_lowercase() == artist_l)
                })
                .ok_or_else(|| {
                    SpotmoverError::NotFound(format!("No exact match for song: {title}"))
                })?
        }
    };

    picked
        .id
        .map(|id| RemoteTrackMatch { id })
        .ok_or_else(|| SpotmoverError::NotFound(format!("Song only available locally: {title}")))
}

pub struct Matcher {
    catalog: Arc<dyn CatalogProvider>,
    cache: Arc<dyn Cache>,
    concurrency: usize,
}

impl Matcher {
    pub fn new(catalog: Arc<dyn CatalogProvider>, cache: Arc<dyn Cache>) -> Self {
        Self {
            catalog,
            cache,
            concurrency: 1,
        }
    }

    /// Number of lookups allowed in flight at once when resolving lists.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    async fn memoized<T, F, Fut>(&self, key: String, lookup: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Clone,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(cached) = cache::recall(self.cache.as_ref(), &key)? {
            debug!("Cache hit for {}", key);
            return cached;
        }

        let result = lookup().await;
        cache::remember(self.cache.as_ref(), &key, &result)?;
        result
    }

    pub async fn resolve_album(&self, artist: &str, album: &str) -> Result<RemoteAlbumMatch> {
        let (artist, album) = (artist.trim(), album.trim());
        let key = cache_key("album", &[artist, album]);
        self.memoized(key, || async {
            let candidates = self.catalog.search_albums(artist, album).await?;
            pick_album(candidates, album).map(RemoteAlbumMatch::from)
        })
        .await
    }

    pub async fn resolve_track(
        &self,
        artist: &str,
        album: &str,
        title: &str,
    ) -> Result<RemoteTrackMatch> {
        let (artist, album, title) = (artist.trim(), album.trim(), title.trim());
        let key = cache_key("track", &[artist, album, title]);
        self.memoized(key, || async {
            let candidates = self.catalog.search_tracks(artist, album, title).await?;
            pick_track(candidates, artist, album, title)
        })
        .await
    }

    /// Resolves every album. Not-found albums are collected; any other error
    /// aborts.
    pub async fn resolve_albums(
        &self,
        albums: &[Album],
    ) -> Result<Resolution<Album, RemoteAlbumMatch>> {
        let outcomes: Vec<(Album, Result<RemoteAlbumMatch>)> = stream::iter(albums.iter().cloned())
            .map(|album| async move {
                let result = self.resolve_album(&album.artist, &album.album).await;
                match &result {
                    Ok(_) => info!("Album found; {}: {}", album.artist, album.album),
                    Err(SpotmoverError::NotFound(_)) => {
                        warn!("Not found; {}: {}", album.artist, album.album)
                    }
                    Err(_) => {}
                }
                (album, result)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        partition(outcomes)
    }

    /// Resolves every song. Not-found songs are collected; any other error
    /// aborts.
    pub async fn resolve_tracks(&self, songs: &[Song]) -> Result<Resolution<Song, RemoteTrackMatch>> {
        let outcomes: Vec<(Song, Result<RemoteTrackMatch>)> = stream::iter(songs.iter().cloned())
            .map(|song| async move {
                let result = self.resolve_track(&song.artist, &song.album, &song.title).await;
                match &result {
                    Ok(_) => info!("find_song {}/{} {}: FOUND", song.artist, song.album, song.title),
                    Err(SpotmoverError::NotFound(_)) => warn!(
                        "find_song {}/{} {}: NOT FOUND",
                        song.artist, song.album, song.title
                    ),
                    Err(_) => {}
                }
                (song, result)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        partition(outcomes)
    }
}

fn partition<S, M>(outcomes: Vec<(S, Result<M>)>) -> Result<Resolution<S, M>> {
    let mut failures = Vec::new();
    let (found, not_found): (Vec<(S, M)>, Vec<S>) =
        outcomes
            .into_iter()
            .filter_map(|(item, result)| match result {
                Ok(matched) => Some(Either::Left((item, matched))),
                Err(SpotmoverError::NotFound(_)) => Some(Either::Right(item)),
                Err(e) => {
                    failures.push(e);
                    None
                }
            })
            .partition_map(|either| either);

    match failures.into_iter().next() {
        Some(e) => Err(e),
        None => Ok(Resolution { found, not_found }),
    }
}
