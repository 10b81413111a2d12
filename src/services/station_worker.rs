use crate::error::Result;
use crate::models::{IdentifiedSong, StationContext, StationStatus, WorkerPhase};
use crate::services::analytics::AnalyticsSink;
use crate::services::coordinator::{PlatformCoordinator, PlatformOutcome, PlatformReport};
use crate::services::identifier::Identifier;
use crate::services::recorder::Recorder;
use crate::logging::STATION_SPAN;
use crate::services::skip_scheduler::{self, Clock, SystemClock};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::Instrument;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerTimings {
    pub sample_duration: Duration,
    pub poll_interval: Duration,
    /// Shorter recheck delay while the previous song is still on air.
    pub same_song_retry: Duration,
    pub error_retry: Duration,
}

/// How one pass through the state machine ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Skipping,
    SampleFailed(String),
    Unrecognized,
    NotFound(IdentifiedSong),
    SameSong(IdentifiedSong),
    Published {
        song: IdentifiedSong,
        reports: Vec<PlatformReport>,
    },
    Failed(String),
}

impl CycleOutcome {
    pub fn describe(&self) -> String {
        match self {
            CycleOutcome::Skipping => "skip window active".to_string(),
            CycleOutcome::SampleFailed(e) => format!("sample failed: {}", e),
            CycleOutcome::Unrecognized => "no song recognized".to_string(),
            CycleOutcome::NotFound(song) => format!("not found on any platform: {}", song),
            CycleOutcome::SameSong(song) => format!("same song still playing: {}", song),
            CycleOutcome::Published { song, reports } => {
                let summary: Vec<String> = reports
                    .iter()
                    .map(|r| {
                        let status = match &r.outcome {
                            PlatformOutcome::Added { .. } => "added",
                            PlatformOutcome::AlreadyPresent { .. } => "already present",
                            PlatformOutcome::NotFound => "not found",
                            PlatformOutcome::Error { .. } => "error",
                        };
                        format!("{} {}", r.platform, status)
                    })
                    .collect();
                format!("{} ({})", song, summary.join(", "))
            }
            CycleOutcome::Failed(e) => format!("cycle failed: {}", e),
        }
    }

    fn song(&self) -> Option<&IdentifiedSong> {
        match self {
            CycleOutcome::NotFound(song) | CycleOutcome::SameSong(song) | CycleOutcome::Published { song, .. } => {
                Some(song)
            }
            _ => None,
        }
    }
}

/// The per-station control loop.
///
/// All collaborators are injected; the worker owns its skip flag and
/// status channel, so nothing is shared with other stations except the
/// analytics sink.
pub struct StationWorker {
    station: StationContext,
    timings: WorkerTimings,
    clock: Arc<dyn Clock>,
    recorder: Arc<dyn Recorder>,
    identifier: Arc<dyn Identifier>,
    coordinator: PlatformCoordinator,
    analytics: Option<Arc<dyn AnalyticsSink>>,
    status: watch::Sender<StationStatus>,
    in_skip: bool,
}

impl StationWorker {
    pub fn new(
        station: StationContext,
        timings: WorkerTimings,
        recorder: Arc<dyn Recorder>,
        identifier: Arc<dyn Identifier>,
        coordinator: PlatformCoordinator,
    ) -> Self {
        let (status, _) = watch::channel(StationStatus::new(station.name.clone()));

        Self {
            station,
            timings,
            clock: Arc::new(SystemClock),
            recorder,
            identifier,
            coordinator,
            analytics: None,
            status,
            in_skip: false,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_analytics(mut self, analytics: Arc<dyn AnalyticsSink>) -> Self {
        self.analytics = Some(analytics);
        self
    }

    pub fn name(&self) -> &str {
        &self.station.name
    }

    pub fn subscribe(&self) -> watch::Receiver<StationStatus> {
        self.status.subscribe()
    }

    /// Loop until the task is aborted. Per-cycle failures never end it.
    pub async fn run(mut self) {
        let span = tracing::info_span!(STATION_SPAN, name = %self.station.name);

        async move {
            tracing::info!(
                "Worker started ({} platform(s), leader: {})",
                self.coordinator.platforms().len(),
                self.coordinator
                    .leader()
                    .map(|kind| kind.to_string())
                    .unwrap_or_else(|| "none".to_string())
            );

            loop {
                let outcome = self.run_cycle().await;
                let delay = self.delay_after(&outcome);

                tracing::debug!("Cycle finished: {}; next in {}s", outcome.describe(), delay.as_secs());
                tokio::time::sleep(delay).await;
            }
        }
        .instrument(span)
        .await
    }

    /// One pass through the state machine. A same-song recheck is an
    /// ordinary pass, so the skip schedule is consulted before sampling.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        let outcome = match self.try_cycle().await {
            Ok(outcome) => outcome,
            Err(e) if e.is_transient() => {
                tracing::warn!("Station cycle failed, retrying: {}", e);
                CycleOutcome::Failed(e.to_string())
            }
            Err(e) => {
                tracing::error!("Station cycle failed unexpectedly: {}", e);
                CycleOutcome::Failed(e.to_string())
            }
        };

        let phase = if matches!(outcome, CycleOutcome::Skipping) {
            WorkerPhase::Skipping
        } else {
            WorkerPhase::Idle
        };
        let song = outcome.song().cloned();
        let description = outcome.describe();
        self.status.send_modify(|status| {
            status.phase = phase;
            if song.is_some() {
                status.last_song = song;
            }
            status.last_outcome = Some(description);
            status.updated_at = Utc::now();
        });

        outcome
    }

    pub fn delay_after(&self, outcome: &CycleOutcome) -> Duration {
        match outcome {
            CycleOutcome::SameSong(_) => self.timings.same_song_retry,
            CycleOutcome::SampleFailed(_) | CycleOutcome::Failed(_) => self.timings.error_retry,
            _ => self.timings.poll_interval,
        }
    }

    async fn try_cycle(&mut self) -> Result<CycleOutcome> {
        let skipping = skip_scheduler::is_skipping(&self.station.skip_ranges, self.clock.now());
        self.note_skip_transition(skipping);
        if skipping {
            return Ok(CycleOutcome::Skipping);
        }

        self.set_phase(WorkerPhase::Sampling);
        let sample = match self
            .recorder
            .sample(&self.station.stream_url, self.timings.sample_duration)
            .await
        {
            Ok(sample) => sample,
            Err(e) => {
                tracing::warn!("Failed to record sample, retrying next cycle: {}", e);
                return Ok(CycleOutcome::SampleFailed(e.to_string()));
            }
        };

        self.set_phase(WorkerPhase::Identifying);
        let identified = self.identifier.identify(&sample).await;
        drop(sample);

        let Some(song) = identified? else {
            tracing::info!("Could not identify song (jingle/ad/talk?)");
            return Ok(CycleOutcome::Unrecognized);
        };

        self.set_phase(WorkerPhase::Searching);
        let round = self.coordinator.search(&song).await;

        self.set_phase(WorkerPhase::Deduping);
        if self.coordinator.is_same_song(&round) {
            tracing::info!(
                "Same song still playing: {}, retrying in {}s",
                song,
                self.timings.same_song_retry.as_secs()
            );
            return Ok(CycleOutcome::SameSong(song));
        }

        if !round.any_found() {
            if let Some(error) = round.first_failure() {
                tracing::warn!("Search failed for {}, retrying: {}", song, error);
                return Ok(CycleOutcome::Failed(error.to_string()));
            }
            self.record_play(&song, None);
            tracing::warn!("Song not found on any platform: {}", song);
            return Ok(CycleOutcome::NotFound(song));
        }

        self.record_play(&song, round.first_found().map(|id| id.as_str().to_string()));

        self.set_phase(WorkerPhase::Publishing);
        let reports = self.coordinator.publish(&song, round).await;

        Ok(CycleOutcome::Published { song, reports })
    }

    fn note_skip_transition(&mut self, skipping: bool) {
        if skipping == self.in_skip {
            return;
        }
        self.in_skip = skipping;

        if skipping {
            tracing::info!("Entered skip hours, pausing until window ends");
        } else {
            tracing::info!("Ended skip hours, resuming");
        }
        self.status.send_modify(|status| status.skipping = skipping);
    }

    fn set_phase(&self, phase: WorkerPhase) {
        self.status.send_modify(|status| {
            status.phase = phase;
            status.updated_at = Utc::now();
        });
    }

    fn record_play(&self, song: &IdentifiedSong, external_id: Option<String>) {
        if !self.station.analytics {
            return;
        }
        let Some(sink) = self.analytics.clone() else {
            return;
        };

        let station = self.station.name.clone();
        let song = song.clone();
        let played_at = Utc::now();

        tokio::spawn(
            async move {
                if let Err(e) = sink
                    .record_play(&station, &song, played_at, external_id.as_deref())
                    .await
                {
                    tracing::warn!("Failed to record play for analytics: {}", e);
                }
            }
            .in_current_span(),
        );
    }
}
