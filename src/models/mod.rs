pub mod schedule;
pub mod station;
pub mod track;

pub use schedule::{parse_day_set, parse_skip_hours, SkipRange};
pub use station::{PlatformKind, PlaylistMode, StationContext, StationStatus, WorkerPhase};
pub use track::{
    ArtistCount, ArtistSongCount, DayCount, DowCount, HourCount, IdentifiedSong, PlayRecord, SongCount,
    TrackId,
};
