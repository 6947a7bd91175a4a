use serde::{Deserialize, Serialize};

/// An album as returned by a catalog search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlbumCandidate {
    pub id: String,
    pub name: String,
}

/// A track as returned by a catalog search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackCandidate {
    /// `None` for entries the catalog lists but cannot serve, such as local files.
    pub id: Option<String>,
    pub track_name: String,
    pub album_name: String,
    /// Every artist credited on the track, in catalog order.
    pub artist_names: Vec<String>,
}

/// The album chosen for an (artist, album) lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteAlbumMatch {
    pub id: String,
    pub name: String,
}

impl From<AlbumCandidate> for RemoteAlbumMatch {
    fn from(candidate: AlbumCandidate) -> Self {
        Self {
            id: candidate.id,
            name: candidate.name,
        }
    }
}

/// The track chosen for an (artist, album, title) lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteTrackMatch {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistSummary {
    pub id: String,
    pub name: String,
}
