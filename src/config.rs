use crate::error::{AppError, Result as AppResult};
use crate::models::{parse_skip_hours, PlatformKind, PlaylistMode, StationContext};
use crate::services::oauth::OAuthCredentials;
use crate::services::station_worker::WorkerTimings;
use serde::Deserialize;
use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub stations_file: PathBuf,
    pub sample_duration: Duration,
    pub poll_interval: Duration,
    pub same_song_retry: Duration,
    pub error_retry: Duration,
    pub playlist_max_size: usize,
    pub playlist_mode: PlaylistMode,
    /// Leader for stations with exactly two platforms; `None` runs them
    /// independently.
    pub leader_platform: Option<PlatformKind>,
    pub spotify: Option<OAuthCredentials>,
    pub spotify_market: String,
    pub youtube: Option<OAuthCredentials>,
    pub audd_api_token: Option<String>,
    pub ffmpeg_path: String,
    pub analytics_db: String,
    pub analytics_retention_days: u32,
    pub dashboard_enabled: bool,
    pub dashboard_host: String,
    pub dashboard_port: u16,
    pub log_format: LogFormat,
    /// Per-station log file size before rotation.
    pub log_max_bytes: u64,
    pub log_backup_count: usize,
}

impl Config {
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let poll_interval = seconds(&var, "POLL_INTERVAL", 300)?;

        let playlist_mode = match var("PLAYLIST_MODE") {
            Some(raw) => raw.parse().map_err(AppError::Config)?,
            None => PlaylistMode::default(),
        };

        let leader_platform = match var("LEADER_PLATFORM").as_deref() {
            None => Some(PlatformKind::Spotify),
            Some(raw) if raw.eq_ignore_ascii_case("none") => None,
            Some(raw) => Some(raw.parse().map_err(AppError::Config)?),
        };

        let log_format = match var("LOG_FORMAT").as_deref() {
            None | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(AppError::Config(format!(
                    "LOG_FORMAT must be 'text' or 'json', got '{}'",
                    other
                )))
            }
        };

        Ok(Config {
            stations_file: PathBuf::from(var("STATIONS_FILE").unwrap_or_else(|| "stations.yaml".to_string())),
            sample_duration: seconds(&var, "SAMPLE_DURATION", 12)?,
            poll_interval,
            same_song_retry: seconds(&var, "SAME_SONG_RETRY", 120)?,
            error_retry: seconds(&var, "ERROR_RETRY", poll_interval.as_secs())?,
            playlist_max_size: number(&var, "PLAYLIST_MAX_SIZE", 100)?,
            playlist_mode,
            leader_platform,
            spotify: credentials(&var, "SPOTIFY")?,
            spotify_market: var("SPOTIFY_MARKET").unwrap_or_else(|| "IL".to_string()),
            youtube: credentials(&var, "YOUTUBE")?,
            audd_api_token: var("AUDD_API_TOKEN"),
            ffmpeg_path: var("FFMPEG_PATH").unwrap_or_else(|| "ffmpeg".to_string()),
            analytics_db: var("ANALYTICS_DB").unwrap_or_else(|| "sqlite://radio_analytics.db".to_string()),
            analytics_retention_days: number(&var, "ANALYTICS_RETENTION_DAYS", 30)?,
            dashboard_enabled: var("DASHBOARD_ENABLED")
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            dashboard_host: var("DASHBOARD_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            dashboard_port: number(&var, "DASHBOARD_PORT", 8080)?,
            log_format,
            log_max_bytes: number(&var, "LOG_MAX_BYTES", 5_242_880)?,
            log_backup_count: number(&var, "LOG_BACKUP_COUNT", 3)?,
        })
    }

    pub fn timings(&self) -> WorkerTimings {
        WorkerTimings {
            sample_duration: self.sample_duration,
            poll_interval: self.poll_interval,
            same_song_retry: self.same_song_retry,
            error_retry: self.error_retry,
        }
    }

    pub fn credentials_for(&self, kind: PlatformKind) -> Option<&OAuthCredentials> {
        match kind {
            PlatformKind::Spotify => self.spotify.as_ref(),
            PlatformKind::YouTube => self.youtube.as_ref(),
        }
    }

    /// Fails if any station needs a platform or identifier without credentials.
    pub fn check_credentials(&self, stations: &[StationContext]) -> AppResult<()> {
        if self.audd_api_token.is_none() {
            return Err(AppError::Config("AUDD_API_TOKEN must be set".to_string()));
        }

        for station in stations {
            for (kind, _) in &station.playlists {
                if self.credentials_for(*kind).is_none() {
                    let prefix = match kind {
                        PlatformKind::Spotify => "SPOTIFY",
                        PlatformKind::YouTube => "YOUTUBE",
                    };
                    return Err(AppError::Config(format!(
                        "Station '{}' uses {} but {}_CLIENT_ID, {}_CLIENT_SECRET and {}_REFRESH_TOKEN are not set",
                        station.name, kind, prefix, prefix, prefix
                    )));
                }
            }
        }

        Ok(())
    }
}

fn number<T: std::str::FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> AppResult<T> {
    match var(key) {
        Some(raw) => raw
            .parse()
            .map_err(|_| AppError::Config(format!("{} must be a non-negative integer, got '{}'", key, raw))),
        None => Ok(default),
    }
}

fn seconds(var: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> AppResult<Duration> {
    let secs: u64 = number(var, key, default)?;
    if secs == 0 {
        return Err(AppError::Config(format!("{} must be at least 1 second", key)));
    }
    Ok(Duration::from_secs(secs))
}

/// All three variables or none; a partial set is a configuration error.
fn credentials(var: &impl Fn(&str) -> Option<String>, prefix: &str) -> AppResult<Option<OAuthCredentials>> {
    let id = var(&format!("{}_CLIENT_ID", prefix));
    let secret = var(&format!("{}_CLIENT_SECRET", prefix));
    let refresh = var(&format!("{}_REFRESH_TOKEN", prefix));

    match (id, secret, refresh) {
        (Some(client_id), Some(client_secret), Some(refresh_token)) => Ok(Some(OAuthCredentials {
            client_id,
            client_secret,
            refresh_token,
        })),
        (None, None, None) => Ok(None),
        _ => Err(AppError::Config(format!(
            "{0}_CLIENT_ID, {0}_CLIENT_SECRET and {0}_REFRESH_TOKEN must be set together",
            prefix
        ))),
    }
}

#[derive(Debug, Deserialize)]
struct StationsFile {
    #[serde(default)]
    stations: Vec<StationEntry>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct StationEntry {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(url)]
    pub stream_url: String,
    pub spotify_playlist_id: Option<String>,
    pub youtube_playlist_id: Option<String>,
    #[serde(default)]
    pub skip_hours: Option<String>,
    pub log_file: Option<PathBuf>,
    #[serde(default)]
    pub analytics: bool,
}

impl StationEntry {
    fn into_context(self) -> AppResult<StationContext> {
        self.validate()
            .map_err(|e| AppError::Validation(format!("Station '{}': {}", self.name, e)))?;

        let playlists: Vec<(PlatformKind, String)> = [
            (PlatformKind::Spotify, self.spotify_playlist_id),
            (PlatformKind::YouTube, self.youtube_playlist_id),
        ]
        .into_iter()
        .filter_map(|(kind, id)| id.filter(|id| !id.trim().is_empty()).map(|id| (kind, id)))
        .collect();

        if playlists.is_empty() {
            return Err(AppError::Validation(format!(
                "Station '{}' needs spotify_playlist_id or youtube_playlist_id",
                self.name
            )));
        }

        let skip_ranges = parse_skip_hours(self.skip_hours.as_deref().unwrap_or(""))
            .map_err(|e| AppError::Config(format!("Station '{}' skip_hours: {}", self.name, e)))?;

        let log_file = self
            .log_file
            .unwrap_or_else(|| PathBuf::from(format!("{}.log", self.name)));

        Ok(StationContext {
            name: self.name,
            stream_url: self.stream_url,
            skip_ranges,
            playlists,
            log_file: Some(log_file),
            analytics: self.analytics,
        })
    }
}

pub fn load_stations(path: &Path) -> AppResult<Vec<StationContext>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("Cannot read stations file {}: {}", path.display(), e)))?;
    parse_stations(&raw)
}

pub fn parse_stations(raw: &str) -> AppResult<Vec<StationContext>> {
    let file: StationsFile =
        serde_yaml::from_str(raw).map_err(|e| AppError::Config(format!("Invalid stations file: {}", e)))?;

    if file.stations.is_empty() {
        return Err(AppError::Config("No stations defined".to_string()));
    }

    let stations = file
        .stations
        .into_iter()
        .map(StationEntry::into_context)
        .collect::<AppResult<Vec<_>>>()?;

    let mut seen = HashSet::new();
    for station in &stations {
        if !seen.insert(station.name.as_str()) {
            return Err(AppError::Config(format!("Duplicate station name '{}'", station.name)));
        }
    }

    Ok(stations)
}
