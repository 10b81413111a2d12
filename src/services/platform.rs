use crate::error::Result;
use crate::models::{PlatformKind, TrackId};
use crate::services::playlist_maintainer::{InsertPosition, Removal};
use async_trait::async_trait;

/// Capability object bound to one remote playlist.
///
/// Each station owns its handles exclusively; implementations never need
/// to coordinate with other stations.
#[async_trait]
pub trait PlaylistPlatform: Send + Sync {
    fn kind(&self) -> PlatformKind;

    fn playlist_id(&self) -> &str;

    /// Startup-time authentication and playlist access check.
    async fn verify(&self) -> Result<()>;

    async fn search(&self, artist: &str, title: &str) -> Result<Option<TrackId>>;

    /// Id at the "newest" end of the playlist for the configured mode.
    async fn last_inserted_track_id(&self) -> Result<Option<TrackId>>;

    /// All ids in the platform's native order.
    async fn current_track_ids(&self) -> Result<Vec<TrackId>>;

    async fn insert_at(&self, track_id: &TrackId, position: InsertPosition) -> Result<()>;

    /// Remove items by their post-insert positions.
    async fn remove_at(&self, removals: &[Removal]) -> Result<()>;
}
