use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

/// A single song as captured from a source catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Song {
    pub artist: String,
    pub album: String,
    pub title: String,
}

impl Song {
    pub fn new(artist: &str, album: &str, title: &str) -> Self {
        Self {
            artist: artist.to_string(),
            album: album.to_string(),
            title: title.to_string(),
        }
    }

    /// The (artist, album) pair this song belongs to.
    pub fn album_ref(&self) -> Album {
        Album::new(&self.artist, &self.album)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Album {
    pub artist: String,
    pub album: String,
}

impl Album {
    pub fn new(artist: &str, album: &str) -> Self {
        Self {
            artist: artist.to_string(),
            album: album.to_string(),
        }
    }

    /// Lowercased (artist, album) pair used for case-insensitive membership tests.
    pub fn folded(&self) -> (String, String) {
        (self.artist.to_lowercase(), self.album.to_lowercase())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    pub name: String,
    pub tracks: Vec<Song>,
}

/// Normalized snapshot of a library, exchanged between extraction and loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dump {
    pub origin: String,
    pub songs: Vec<Song>,
    #[serde(default)]
    pub albums: Vec<Album>,
    pub playlists: Vec<Playlist>,
}

impl Dump {
    pub fn new(origin: &str, songs: Vec<Song>, playlists: Vec<Playlist>) -> Self {
        Self {
            origin: origin.to_string(),
            songs,
            albums: Vec::new(),
            playlists,
        }
    }

    pub fn from_reader<R: Read>(reader: R) -> io::Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn from_path(path: &Path) -> io::Result<Self> {
        Self::from_reader(BufReader::new(File::open(path)?))
    }

    pub fn to_writer_pretty<W: Write>(&self, writer: W) -> io::Result<()> {
        Ok(serde_json::to_writer_pretty(writer, self)?)
    }

    pub fn write_to_path(&self, path: &Path) -> io::Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.to_writer_pretty(&mut writer)?;
        writer.flush()
    }

    /// Unique (artist, album) pairs of this dump's songs, in first-seen order.
    pub fn song_albums(&self) -> impl Iterator<Item = Album> + '_ {
        group_by_album(&self.songs)
    }

    /// Derived dump carrying `albums` as its album plan.
    pub fn with_albums(&self, albums: Vec<Album>) -> Self {
        Self {
            origin: self.origin.clone(),
            songs: self.songs.clone(),
            albums,
            playlists: self.playlists.clone(),
        }
    }

    /// Drops every song whose album is already part of the album plan.
    pub fn remove_songs_by_albums(&mut self) {
        let planned: HashSet<&Album> = self.albums.iter().collect();
        let songs = std::mem::take(&mut self.songs);
        self.songs = songs
            .into_iter()
            .filter(|song| !planned.contains(&song.album_ref()))
            .collect();
    }
}

/// Lazily yields each distinct (artist, album) pair of `songs` once, keeping
/// the order in which pairs were first seen. Call again to restart.
pub fn group_by_album(songs: &[Song]) -> impl Iterator<Item = Album> + '_ {
    let mut seen = HashSet::new();
    songs.iter().filter_map(move |song| {
        let key = song.album_ref();
        if seen.insert(key.clone()) {
            Some(key)
        } else {
            None
        }
    })
}
