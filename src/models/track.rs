use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Platform-native track identifier (Spotify URI, YouTube video id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub String);

impl TrackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TrackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifiedSong {
    pub artist: String,
    pub title: String,
}

impl IdentifiedSong {
    pub fn new(artist: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            artist: artist.into(),
            title: title.into(),
        }
    }
}

impl std::fmt::Display for IdentifiedSong {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}", self.artist, self.title)
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PlayRecord {
    pub station: String,
    pub artist: String,
    pub title: String,
    /// UTC, `YYYY-MM-DD HH:MM:SS`
    pub played_at: String,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SongCount {
    pub artist: String,
    pub title: String,
    pub count: i64,
    pub external_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ArtistCount {
    pub artist: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ArtistSongCount {
    pub title: String,
    pub count: i64,
    pub external_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct DayCount {
    pub day: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HourCount {
    pub hour: u32,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DowCount {
    /// 0 = Sunday .. 6 = Saturday
    pub dow: u32,
    pub label: &'static str,
    pub count: i64,
}
