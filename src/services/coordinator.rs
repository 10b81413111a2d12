use crate::error::Result;
use crate::models::{IdentifiedSong, PlatformKind, PlaylistMode, TrackId};
use crate::services::dedup::DedupGate;
use crate::services::platform::PlaylistPlatform;
use crate::services::playlist_maintainer;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PlatformOutcome {
    Added { track_id: TrackId, trimmed: usize },
    AlreadyPresent { track_id: TrackId },
    NotFound,
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformReport {
    pub platform: PlatformKind,
    pub outcome: PlatformOutcome,
}

/// Per-platform result of the search step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidate {
    Found {
        track_id: TrackId,
        last_inserted: Option<TrackId>,
    },
    NotFound,
    Failed(String),
    /// Follower in leader mode: searched only after the leader publishes.
    Deferred,
}

impl Candidate {
    fn track_id(&self) -> Option<&TrackId> {
        match self {
            Candidate::Found { track_id, .. } => Some(track_id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchRound {
    candidates: Vec<Candidate>,
}

impl SearchRound {
    #[cfg(test)]
    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn any_found(&self) -> bool {
        self.candidates.iter().any(|c| c.track_id().is_some())
    }

    pub fn first_found(&self) -> Option<&TrackId> {
        self.candidates.iter().find_map(Candidate::track_id)
    }

    /// Error from the first platform whose search or playlist read failed.
    pub fn first_failure(&self) -> Option<&str> {
        self.candidates.iter().find_map(|c| match c {
            Candidate::Failed(message) => Some(message.as_str()),
            _ => None,
        })
    }
}

/// Drives search, dedup and playlist maintenance across one station's
/// platforms.
pub struct PlatformCoordinator {
    platforms: Vec<Arc<dyn PlaylistPlatform>>,
    leader: Option<usize>,
    max_size: usize,
    mode: PlaylistMode,
}

impl PlatformCoordinator {
    /// With exactly two platforms and `leader` among them, that platform
    /// is searched and published first and gates the other.
    pub fn new(
        platforms: Vec<Arc<dyn PlaylistPlatform>>,
        leader: Option<PlatformKind>,
        max_size: usize,
        mode: PlaylistMode,
    ) -> Self {
        let leader = match (platforms.len(), leader) {
            (2, Some(kind)) => platforms.iter().position(|p| p.kind() == kind),
            _ => None,
        };

        Self {
            platforms,
            leader,
            max_size,
            mode,
        }
    }

    pub fn leader(&self) -> Option<PlatformKind> {
        self.leader.map(|i| self.platforms[i].kind())
    }

    pub fn platforms(&self) -> &[Arc<dyn PlaylistPlatform>] {
        &self.platforms
    }

    /// Search each platform (only the leader in leader mode) and read its
    /// last inserted id. Failures stay confined to their platform.
    pub async fn search(&self, song: &IdentifiedSong) -> SearchRound {
        let mut candidates = Vec::with_capacity(self.platforms.len());

        for (index, platform) in self.platforms.iter().enumerate() {
            if self.leader.is_some_and(|leader| leader != index) {
                candidates.push(Candidate::Deferred);
                continue;
            }
            candidates.push(resolve(platform.as_ref(), song).await);
        }

        SearchRound { candidates }
    }

    /// Same song only if every platform with a match agrees with its own
    /// most recent entry.
    pub fn is_same_song(&self, round: &SearchRound) -> bool {
        DedupGate::is_same_song_across(round.candidates.iter().map(|c| match c {
            Candidate::Found {
                track_id,
                last_inserted,
            } => (Some(track_id), last_inserted.as_ref()),
            _ => (None, None),
        }))
    }

    /// Insert and trim on every platform of a round judged to be a new song.
    pub async fn publish(&self, song: &IdentifiedSong, round: SearchRound) -> Vec<PlatformReport> {
        let mut reports = Vec::with_capacity(self.platforms.len());
        let mut leader_added = false;

        // Deferred followers go after the leader whatever the configured order.
        let mut entries: Vec<_> = self.platforms.iter().zip(round.candidates).collect();
        entries.sort_by_key(|(_, candidate)| matches!(candidate, Candidate::Deferred));

        for (platform, candidate) in entries {
            let outcome = match candidate {
                Candidate::Found { track_id, .. } => {
                    let outcome = self.maintain(platform.as_ref(), track_id).await;
                    leader_added |= matches!(outcome, PlatformOutcome::Added { .. });
                    outcome
                }
                Candidate::NotFound => PlatformOutcome::NotFound,
                Candidate::Failed(message) => PlatformOutcome::Error { message },
                Candidate::Deferred => {
                    if !leader_added {
                        tracing::info!(
                            "Leader did not publish '{}', leaving {} untouched",
                            song,
                            platform.kind()
                        );
                        continue;
                    }
                    self.publish_follower(platform.as_ref(), song).await
                }
            };

            log_outcome(platform.kind(), song, &outcome);
            reports.push(PlatformReport {
                platform: platform.kind(),
                outcome,
            });
        }

        reports
    }

    async fn publish_follower(&self, platform: &dyn PlaylistPlatform, song: &IdentifiedSong) -> PlatformOutcome {
        match resolve(platform, song).await {
            Candidate::Found {
                track_id,
                last_inserted,
            } => {
                if DedupGate::is_same_song(Some(&track_id), last_inserted.as_ref()) {
                    PlatformOutcome::AlreadyPresent { track_id }
                } else {
                    self.maintain(platform, track_id).await
                }
            }
            Candidate::NotFound => PlatformOutcome::NotFound,
            Candidate::Failed(message) => PlatformOutcome::Error { message },
            Candidate::Deferred => PlatformOutcome::NotFound,
        }
    }

    async fn maintain(&self, platform: &dyn PlaylistPlatform, track_id: TrackId) -> PlatformOutcome {
        match apply_plan(platform, &track_id, self.max_size, self.mode).await {
            Ok(trimmed) => PlatformOutcome::Added { track_id, trimmed },
            Err(e) => PlatformOutcome::Error {
                message: e.to_string(),
            },
        }
    }
}

async fn resolve(platform: &dyn PlaylistPlatform, song: &IdentifiedSong) -> Candidate {
    let found = match platform.search(&song.artist, &song.title).await {
        Ok(Some(track_id)) => track_id,
        Ok(None) => return Candidate::NotFound,
        Err(e) => {
            tracing::error!("{} search failed for '{}': {}", platform.kind(), song, e);
            return Candidate::Failed(e.to_string());
        }
    };

    match platform.last_inserted_track_id().await {
        Ok(last_inserted) => Candidate::Found {
            track_id: found,
            last_inserted,
        },
        Err(e) => {
            tracing::error!("{} playlist read failed: {}", platform.kind(), e);
            Candidate::Failed(e.to_string())
        }
    }
}

/// Read, insert, then trim. Returns the number of trimmed entries. Once the
/// insert lands a failed trim only costs the removal; the next insert on this
/// platform retries it.
async fn apply_plan(
    platform: &dyn PlaylistPlatform,
    track_id: &TrackId,
    max_size: usize,
    mode: PlaylistMode,
) -> Result<usize> {
    let current = platform.current_track_ids().await?;
    let plan = playlist_maintainer::plan(&current, track_id, max_size, mode);

    platform.insert_at(track_id, plan.insert_position).await?;

    if !plan.trims() {
        return Ok(0);
    }

    match platform.remove_at(&plan.removals).await {
        Ok(()) => {
            tracing::info!(
                "Trimmed {} old track(s) from {} playlist {}",
                plan.removals.len(),
                platform.kind(),
                platform.playlist_id()
            );
            Ok(plan.removals.len())
        }
        Err(e) => {
            tracing::warn!(
                "Inserted into {} playlist {} but trimming failed: {}",
                platform.kind(),
                platform.playlist_id(),
                e
            );
            Ok(0)
        }
    }
}

fn log_outcome(platform: PlatformKind, song: &IdentifiedSong, outcome: &PlatformOutcome) {
    match outcome {
        PlatformOutcome::Added { trimmed, .. } => {
            tracing::info!("Added to {} playlist: {} (trimmed {})", platform, song, trimmed)
        }
        PlatformOutcome::AlreadyPresent { .. } => {
            tracing::info!("Already in {} playlist: {}", platform, song)
        }
        PlatformOutcome::NotFound => tracing::warn!("Song not found on {}: {}", platform, song),
        PlatformOutcome::Error { message } => {
            tracing::error!("{} update failed for {}: {}", platform, song, message)
        }
    }
}
