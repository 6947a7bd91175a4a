use serde::Deserialize;

use crate::paginate::Page;

// Internal structs for deserializing raw Web API responses
#[derive(Deserialize, Debug, Clone)]
pub(crate) struct ArtistRef {
    pub name: String,
}

#[derive(Deserialize, Debug, Clone)]
pub(crate) struct SimplifiedAlbum {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<ArtistRef>,
}

#[derive(Deserialize, Debug, Clone)]
pub(crate) struct FullTrack {
    /// Absent for local files.
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub album: SimplifiedAlbum,
    #[serde(default)]
    pub artists: Vec<ArtistRef>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct SavedAlbum {
    pub album: SimplifiedAlbum,
}

#[derive(Deserialize, Debug)]
pub(crate) struct SavedTrack {
    pub track: FullTrack,
}

#[derive(Deserialize, Debug)]
pub(crate) struct PlaylistItem {
    /// Null when the track was removed from the catalog.
    pub track: Option<FullTrack>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct SimplifiedPlaylist {
    pub id: String,
    pub name: String,
}

#[derive(Deserialize, Debug)]
pub(crate) struct AlbumSearch {
    pub albums: Page<SimplifiedAlbum>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct TrackSearch {
    pub tracks: Page<FullTrack>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct CurrentUser {
    pub id: String,
}

#[derive(Deserialize, Debug)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
}
