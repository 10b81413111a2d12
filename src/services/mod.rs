pub mod analytics;
pub mod coordinator;
pub mod dedup;
pub mod identifier;
pub mod oauth;
pub mod platform;
pub mod playlist_maintainer;
pub mod recorder;
pub mod skip_scheduler;
pub mod spotify;
pub mod station_manager;
pub mod station_worker;
pub mod youtube;

#[cfg(test)]
pub mod testing;

pub use analytics::{AnalyticsSink, AnalyticsStore};
pub use coordinator::PlatformCoordinator;
pub use identifier::{AuddIdentifier, Identifier};
pub use platform::PlaylistPlatform;
pub use recorder::{FfmpegRecorder, Recorder};
pub use spotify::SpotifyPlatform;
pub use station_manager::StationManager;
pub use station_worker::{StationWorker, WorkerTimings};
pub use youtube::YouTubePlatform;
