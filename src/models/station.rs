use super::{IdentifiedSong, SkipRange};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Where new tracks go in a playlist; the opposite end is trimmed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum PlaylistMode {
    /// "normal": newest on top.
    #[default]
    #[serde(rename = "normal")]
    InsertAtFront,
    /// "reverse": newest at the bottom.
    #[serde(rename = "reverse")]
    InsertAtBack,
}

impl FromStr for PlaylistMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "normal" => Ok(PlaylistMode::InsertAtFront),
            "reverse" => Ok(PlaylistMode::InsertAtBack),
            other => Err(format!("playlist mode must be 'normal' or 'reverse', got '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum PlatformKind {
    Spotify,
    #[serde(rename = "youtube")]
    YouTube,
}

impl std::fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlatformKind::Spotify => write!(f, "Spotify"),
            PlatformKind::YouTube => write!(f, "YouTube"),
        }
    }
}

impl FromStr for PlatformKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "spotify" => Ok(PlatformKind::Spotify),
            "youtube" => Ok(PlatformKind::YouTube),
            other => Err(format!("unknown platform '{}'", other)),
        }
    }
}

/// Per-station identity, fixed for the lifetime of its worker.
#[derive(Debug, Clone)]
pub struct StationContext {
    pub name: String,
    pub stream_url: String,
    pub skip_ranges: Vec<SkipRange>,
    /// Target playlist id per platform, in configuration order.
    pub playlists: Vec<(PlatformKind, String)>,
    pub log_file: Option<PathBuf>,
    pub analytics: bool,
}

impl StationContext {
    #[cfg(test)]
    pub fn playlist_for(&self, kind: PlatformKind) -> Option<&str> {
        self.playlists
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, id)| id.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkerPhase {
    Idle,
    Skipping,
    Sampling,
    Identifying,
    Searching,
    Deduping,
    Publishing,
}

/// Live view of a worker, published for the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct StationStatus {
    pub name: String,
    pub phase: WorkerPhase,
    pub skipping: bool,
    pub last_song: Option<IdentifiedSong>,
    pub last_outcome: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl StationStatus {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phase: WorkerPhase::Idle,
            skipping: false,
            last_song: None,
            last_outcome: None,
            updated_at: Utc::now(),
        }
    }
}
