use crate::models::TrackId;

/// Decides whether the broadcast is still playing the song most recently
/// inserted into the target playlists.
pub struct DedupGate;

impl DedupGate {
    /// Same song only when both ids are present and equal.
    pub fn is_same_song(candidate: Option<&TrackId>, last_inserted: Option<&TrackId>) -> bool {
        match (candidate, last_inserted) {
            (Some(candidate), Some(last)) => candidate == last,
            _ => false,
        }
    }

    /// Same song across platforms: every platform that found a candidate must
    /// agree with its own last-inserted id. No candidates at all is never
    /// "same song".
    pub fn is_same_song_across<'a, I>(pairs: I) -> bool
    where
        I: IntoIterator<Item = (Option<&'a TrackId>, Option<&'a TrackId>)>,
    {
        let mut any_candidate = false;

        for (candidate, last_inserted) in pairs {
            if candidate.is_none() {
                continue;
            }
            any_candidate = true;
            if !Self::is_same_song(candidate, last_inserted) {
                return false;
            }
        }

        any_candidate
    }
}
