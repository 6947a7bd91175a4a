//! Loads a dump into a target catalog.
//!
//! Albums missing from the user's saved albums are looked up and saved in
//! batches; playlists are created once per name and filled in batches.
//! Entries the catalog does not have are reported and skipped. Listing,
//! authentication and transport errors end the run.

use shared::dump::{Album, Dump, Playlist, Song};
use std::{collections::HashSet, sync::Arc};
use tracing::{error, info, warn};

use crate::{error::Result, CatalogProvider, Confirm, Matcher};

/// Most albums the catalog accepts in one save request.
pub const ALBUM_BATCH_SIZE: usize = 50;
/// Most tracks the catalog accepts in one playlist add request.
pub const TRACK_BATCH_SIZE: usize = 100;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Create partially resolved playlists without asking. Whether a
    /// playlist is imported at all is still up to the `Confirm` collaborator.
    pub force: bool,
    /// Create playlists even when one with the same name exists.
    pub force_playlists: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlbumSyncReport {
    pub already_saved: Vec<Album>,
    pub added: Vec<String>,
    pub not_found: Vec<Album>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlaylistOutcome {
    Created {
        name: String,
        playlist_id: String,
        tracks: usize,
        missing: Vec<Song>,
    },
    Declined {
        name: String,
    },
    AlreadyExists {
        name: String,
    },
    NoTracksFound {
        name: String,
    },
    PartialDeclined {
        name: String,
        missing: Vec<Song>,
    },
}

impl PlaylistOutcome {
    pub fn name(&self) -> &str {
        match self {
            PlaylistOutcome::Created { name, .. }
            | PlaylistOutcome::Declined { name }
            | PlaylistOutcome::AlreadyExists { name }
            | PlaylistOutcome::NoTracksFound { name }
            | PlaylistOutcome::PartialDeclined { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MigrationReport {
    pub albums: AlbumSyncReport,
    pub playlists: Vec<PlaylistOutcome>,
}

pub struct Reconciler {
    catalog: Arc<dyn CatalogProvider>,
    matcher: Matcher,
    confirm: Arc<dyn Confirm>,
    owner: String,
    options: ReconcileOptions,
}

impl Reconciler {
    pub fn new(
        catalog: Arc<dyn CatalogProvider>,
        matcher: Matcher,
        confirm: Arc<dyn Confirm>,
        owner: &str,
        options: ReconcileOptions,
    ) -> Self {
        Self {
            catalog,
            matcher,
            confirm,
            owner: owner.to_string(),
            options,
        }
    }

    /// Albums first, then playlists.
    pub async fn run(&self, dump: &Dump) -> Result<MigrationReport> {
        let albums = self.sync_albums(&dump.albums).await?;
        let playlists = self.sync_playlists(&dump.playlists).await?;
        Ok(MigrationReport { albums, playlists })
    }

    pub async fn sync_albums(&self, albums: &[Album]) -> Result<AlbumSyncReport> {
        let current: HashSet<(String, String)> = self
            .catalog
            .list_saved_albums()
            .await?
            .iter()
            .map(Album::folded)
            .collect();
        info!("{} albums already saved in {}", current.len(), self.catalog.name());

        let mut report = AlbumSyncReport::default();
        let mut pending = Vec::new();
        for album in albums {
            if current.contains(&album.folded()) {
                info!("Already added; {}: {}", album.artist, album.album);
                report.already_saved.push(album.clone());
            } else {
                pending.push(album.clone());
            }
        }

        let resolution = self.matcher.resolve_albums(&pending).await?;

        if !resolution.not_found.is_empty() {
            info!("Albums not found in {}:", self.catalog.name());
            for album in &resolution.not_found {
                info!("    {}: {}", album.artist, album.album);
            }
        }

        let ids: Vec<String> = resolution
            .found
            .into_iter()
            .map(|(_, matched)| matched.id)
            .collect();
        info!("Found {} albums, saving...", ids.len());

        for batch in ids.chunks(ALBUM_BATCH_SIZE) {
            self.catalog.add_saved_albums(batch).await?;
        }
        info!("Done.");

        report.added = ids;
        report.not_found = resolution.not_found;
        Ok(report)
    }

    pub async fn sync_playlists(&self, playlists: &[Playlist]) -> Result<Vec<PlaylistOutcome>> {
        let mut existing: Option<HashSet<String>> = None;
        let mut outcomes = Vec::with_capacity(playlists.len());

        for playlist in playlists {
            let name = playlist.name.clone();

            if !self
                .confirm
                .confirm(&format!("Do you want to import playlist '{name}'? (y/n)"))
            {
                info!("Skipping...");
                outcomes.push(PlaylistOutcome::Declined { name });
                continue;
            }

            if existing.is_none() {
                existing = Some(self.playlist_names().await?);
            }
            let names = existing.get_or_insert_with(HashSet::new);
            if names.contains(&name) && !self.options.force_playlists {
                info!("Playlist {} already exists, skipping", name);
                outcomes.push(PlaylistOutcome::AlreadyExists { name });
                continue;
            }

            let outcome = self.load_playlist(playlist).await?;
            if let PlaylistOutcome::Created { name, .. } = &outcome {
                names.insert(name.clone());
            }
            outcomes.push(outcome);
        }

        Ok(outcomes)
    }

    async fn playlist_names(&self) -> Result<HashSet<String>> {
        Ok(self
            .catalog
            .list_playlists()
            .await?
            .into_iter()
            .map(|playlist| playlist.name)
            .collect())
    }

    async fn load_playlist(&self, playlist: &Playlist) -> Result<PlaylistOutcome> {
        let name = playlist.name.clone();
        let resolution = self.matcher.resolve_tracks(&playlist.tracks).await?;

        if resolution.found.is_empty() {
            error!("No songs found for playlist '{}'", name);
            return Ok(PlaylistOutcome::NoTracksFound { name });
        }

        if !resolution.is_complete() {
            warn!("Some songs were not found");
            if !self.options.force {
                for song in &resolution.not_found {
                    info!("- {}/{}: {}", song.artist, song.album, song.title);
                }
                if !self.confirm.confirm("Are you sure to create the playlist? (y/n)") {
                    info!("Skipping...");
                    return Ok(PlaylistOutcome::PartialDeclined {
                        name,
                        missing: resolution.not_found,
                    });
                }
            }
        }

        let track_ids: Vec<String> = resolution
            .found
            .into_iter()
            .map(|(_, matched)| matched.id)
            .collect();

        info!("Creating playlist '{}' with {} tracks", name, track_ids.len());
        let created = self.catalog.create_playlist(&self.owner, &name, false).await?;
        for batch in track_ids.chunks(TRACK_BATCH_SIZE) {
            self.catalog
                .add_playlist_tracks(&self.owner, &created.id, batch)
                .await?;
        }

        Ok(PlaylistOutcome::Created {
            name,
            playlist_id: created.id,
            tracks: track_ids.len(),
            missing: resolution.not_found,
        })
    }
}
