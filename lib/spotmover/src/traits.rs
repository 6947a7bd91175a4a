use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{
    catalog::{AlbumCandidate, PlaylistSummary, TrackCandidate},
    dump::{Album, Dump},
};

use crate::error::Result;

/// An authenticated user of a catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user_id: String,
    pub access_token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Utc::now())
    }
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self) -> Result<Session>;
}

/// The target side of a migration: search plus the user's saved albums and
/// playlists. Listings return every item; implementations page internally.
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    fn id(&self) -> &'static str;
    fn name(&self) -> &'static str;

    async fn search_albums(&self, artist: &str, album: &str) -> Result<Vec<AlbumCandidate>>;

    async fn search_tracks(
        &self,
        artist: &str,
        album: &str,
        title: &str,
    ) -> Result<Vec<TrackCandidate>>;

    /// One entry per credited artist of every saved album.
    async fn list_saved_albums(&self) -> Result<Vec<Album>>;

    /// Saves one batch of albums. Callers keep batches within the catalog's cap.
    async fn add_saved_albums(&self, ids: &[String]) -> Result<()>;

    async fn list_playlists(&self) -> Result<Vec<PlaylistSummary>>;

    async fn create_playlist(&self, owner: &str, name: &str, public: bool)
        -> Result<PlaylistSummary>;

    /// Appends one batch of tracks. Callers keep batches within the catalog's cap.
    async fn add_playlist_tracks(
        &self,
        owner: &str,
        playlist_id: &str,
        track_ids: &[String],
    ) -> Result<()>;
}

/// The source side of a migration.
#[async_trait]
pub trait LibrarySource: Send + Sync {
    fn id(&self) -> &'static str;

    async fn dump(&self) -> Result<Dump>;
}

/// Asks the operator a yes/no question.
pub trait Confirm: Send + Sync {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}
