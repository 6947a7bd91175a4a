//! The work behind each subcommand.

use anyhow::{Context, Result};
use shared::dump::{Album, Dump};
use spotmover::{
    reconcile::PlaylistOutcome,
    spotify::{SpotifyAuthenticator, SpotifyClient, SpotifyClientBuilder},
    Authenticator, Cache, Confirm, DiskCache, LibrarySource, Matcher, MemoryCache,
    ReconcileOptions, Reconciler,
};
use std::{path::Path, sync::Arc};
use tracing::{info, warn};

use crate::{
    config::{AppConfig, EngineConfig},
    prompt::{AssumeYes, TerminalConfirm},
};

#[derive(Debug, Clone, Default)]
pub struct LoadArgs {
    pub options: ReconcileOptions,
    pub no_cache: bool,
    pub skip_albums: bool,
    pub skip_playlists: bool,
}

async fn connect(config: &AppConfig) -> Result<SpotifyClient> {
    let credentials = config.spotify()?.credentials()?;
    let authenticator = Arc::new(SpotifyAuthenticator::new(credentials)?);
    let session = authenticator
        .authenticate()
        .await
        .context("Unable to log in to Spotify")?;
    Ok(SpotifyClientBuilder::new()
        .session(session)
        .authenticator(authenticator)
        .build()?)
}

pub fn open_disk_cache(engine: &EngineConfig, id: Option<&str>) -> Result<DiskCache> {
    let id = id.unwrap_or(engine.cache_id.as_str());
    let cache = match &engine.cache_root {
        Some(root) => DiskCache::in_dir(root, id),
        None => DiskCache::new(id),
    };
    cache.with_context(|| format!("Unable to open cache {id}"))
}

/// `-f` answers every prompt itself.
fn confirmer(options: &ReconcileOptions) -> Arc<dyn Confirm> {
    if options.force {
        Arc::new(AssumeYes)
    } else {
        Arc::new(TerminalConfirm)
    }
}

fn open_cache(engine: &EngineConfig, no_cache: bool) -> Result<Arc<dyn Cache>> {
    if no_cache {
        info!("Lookups will not be cached between runs");
        return Ok(Arc::new(MemoryCache::new()));
    }
    Ok(Arc::new(open_disk_cache(engine, None)?))
}

/// Album plan for `source`: its own album list when it has one, otherwise the
/// sorted albums of its songs. Songs covered by the plan are dropped.
pub fn plan(source: &Dump) -> Dump {
    let albums: Vec<Album> = if source.albums.is_empty() {
        let mut albums: Vec<Album> = source.song_albums().collect();
        albums.sort();
        albums
    } else {
        source.albums.clone()
    };

    let mut planned = source.with_albums(albums);
    planned.remove_songs_by_albums();
    planned
}

pub async fn dump(config: &AppConfig, output: &Path) -> Result<()> {
    let client = connect(config).await?;
    let dump = client.dump().await.context("Unable to read the Spotify library")?;
    dump.write_to_path(output)
        .with_context(|| format!("Unable to write {}", output.display()))?;
    info!(
        "Wrote {} songs and {} playlists to {}",
        dump.songs.len(),
        dump.playlists.len(),
        output.display()
    );
    Ok(())
}

pub async fn load(config: &AppConfig, input: &Path, args: LoadArgs) -> Result<()> {
    let source =
        Dump::from_path(input).with_context(|| format!("Unable to read {}", input.display()))?;
    info!(
        "Loaded a {} dump with {} songs and {} playlists",
        source.origin,
        source.songs.len(),
        source.playlists.len()
    );
    let plan = plan(&source);
    info!("{} albums to load", plan.albums.len());
    if !plan.songs.is_empty() {
        warn!("{} songs are not covered by any album", plan.songs.len());
    }

    let client = Arc::new(connect(config).await?);
    let owner = client.user_id().to_string();
    let cache = open_cache(&config.engine, args.no_cache)?;
    let matcher = Matcher::new(client.clone(), cache).with_concurrency(config.engine.concurrency);
    let reconciler = Reconciler::new(
        client,
        matcher,
        confirmer(&args.options),
        &owner,
        args.options,
    );

    if args.skip_albums {
        info!("Skipping albums");
    } else {
        let report = reconciler.sync_albums(&plan.albums).await?;
        info!(
            "Albums: {} already saved, {} added, {} not found",
            report.already_saved.len(),
            report.added.len(),
            report.not_found.len()
        );
    }

    if args.skip_playlists {
        info!("Skipping playlists");
    } else {
        for outcome in reconciler.sync_playlists(&plan.playlists).await? {
            match &outcome {
                PlaylistOutcome::Created {
                    tracks, missing, ..
                } => info!(
                    "Playlist '{}': created with {} tracks, {} missing",
                    outcome.name(),
                    tracks,
                    missing.len()
                ),
                PlaylistOutcome::Declined { .. } | PlaylistOutcome::PartialDeclined { .. } => {
                    info!("Playlist '{}': skipped", outcome.name())
                }
                PlaylistOutcome::AlreadyExists { .. } => {
                    info!("Playlist '{}': already exists", outcome.name())
                }
                PlaylistOutcome::NoTracksFound { .. } => {
                    warn!("Playlist '{}': no tracks found", outcome.name())
                }
            }
        }
    }

    Ok(())
}

pub fn list_cache(engine: &EngineConfig, id: Option<&str>) -> Result<()> {
    let cache = open_disk_cache(engine, id)?;
    for key in cache.keys()? {
        println!("{key}");
    }
    Ok(())
}

pub fn clear_cache(engine: &EngineConfig, id: Option<&str>) -> Result<()> {
    let cache = open_disk_cache(engine, id)?;
    cache.clear()?;
    info!("Cleared {}", cache.cache_dir().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared::dump::{Playlist, Song};

    #[test]
    fn test_plan_from_songs_is_sorted() {
        let source = Dump::new(
            "google",
            vec![
                Song::new("B", "Y", "one"),
                Song::new("A", "X", "two"),
                Song::new("B", "Y", "three"),
            ],
            vec![Playlist {
                name: "Mix".to_string(),
                tracks: vec![Song::new("B", "Y", "one")],
            }],
        );

        let planned = plan(&source);
        assert_eq!(planned.albums, vec![Album::new("A", "X"), Album::new("B", "Y")]);
        assert!(planned.songs.is_empty());
        assert_eq!(planned.playlists, source.playlists);
    }

    #[test]
    fn test_plan_keeps_explicit_albums() {
        let mut source = Dump::new(
            "google",
            vec![Song::new("B", "Y", "one"), Song::new("A", "X", "two")],
            vec![],
        );
        source.albums = vec![Album::new("B", "Y")];

        let planned = plan(&source);
        assert_eq!(planned.albums, vec![Album::new("B", "Y")]);
        assert_eq!(planned.songs, vec![Song::new("A", "X", "two")]);
    }

    #[test]
    fn test_cache_commands_use_configured_root() {
        let dir = tempfile::tempdir().unwrap();
        let engine = EngineConfig {
            cache_root: Some(dir.path().to_path_buf()),
            ..EngineConfig::default()
        };

        let cache = open_disk_cache(&engine, Some("other")).unwrap();
        cache.set("album:a\u{1f}b", json!({"status": "ok"})).unwrap();
        assert_eq!(cache.cache_dir(), dir.path().join("other"));

        list_cache(&engine, Some("other")).unwrap();
        clear_cache(&engine, Some("other")).unwrap();
        assert_eq!(cache.keys().unwrap().count(), 0);
    }

    #[test]
    fn test_force_answers_prompts() {
        let forced = ReconcileOptions {
            force: true,
            force_playlists: false,
        };
        assert!(confirmer(&forced).confirm("Do you want to import playlist 'Mix'? (y/n)"));
    }

    #[test]
    fn test_bad_cache_id() {
        let dir = tempfile::tempdir().unwrap();
        let engine = EngineConfig {
            cache_root: Some(dir.path().to_path_buf()),
            ..EngineConfig::default()
        };
        assert!(open_disk_cache(&engine, Some("../escape")).is_err());
    }
}
