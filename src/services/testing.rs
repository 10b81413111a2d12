//! In-memory stand-ins for the external collaborators of a station worker.

use crate::error::{AppError, Result};
use crate::models::{IdentifiedSong, PlatformKind, PlaylistMode, TrackId};
use crate::services::analytics::AnalyticsSink;
use crate::services::identifier::Identifier;
use crate::services::platform::PlaylistPlatform;
use crate::services::playlist_maintainer::{InsertPosition, Removal};
use crate::services::recorder::{AudioSample, Recorder};
use crate::services::skip_scheduler::Clock;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    Search,
    LastInserted,
    Current,
    Insert(TrackId, InsertPosition),
    Remove(Vec<Removal>),
}

pub struct FakePlatform {
    kind: PlatformKind,
    mode: PlaylistMode,
    playlist: Mutex<Vec<TrackId>>,
    search_match: Mutex<Option<TrackId>>,
    fail_search: bool,
    fail_inserts: bool,
    fail_removes: bool,
    calls: Mutex<Vec<PlatformCall>>,
}

impl FakePlatform {
    pub fn new(kind: PlatformKind, playlist: &[&str]) -> Self {
        Self {
            kind,
            mode: PlaylistMode::InsertAtFront,
            playlist: Mutex::new(playlist.iter().map(|id| TrackId::from(*id)).collect()),
            search_match: Mutex::new(None),
            fail_search: false,
            fail_inserts: false,
            fail_removes: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_match(self, id: &str) -> Self {
        self.set_match(Some(id));
        self
    }

    pub fn with_mode(mut self, mode: PlaylistMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn failing_search(mut self) -> Self {
        self.fail_search = true;
        self
    }

    pub fn failing_inserts(mut self) -> Self {
        self.fail_inserts = true;
        self
    }

    pub fn failing_removes(mut self) -> Self {
        self.fail_removes = true;
        self
    }

    pub fn set_match(&self, id: Option<&str>) {
        *self.search_match.lock().unwrap() = id.map(TrackId::from);
    }

    pub fn playlist(&self) -> Vec<String> {
        self.playlist
            .lock()
            .unwrap()
            .iter()
            .map(|id| id.as_str().to_string())
            .collect()
    }

    pub fn calls(&self) -> Vec<PlatformCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn inserts(&self) -> Vec<TrackId> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PlatformCall::Insert(id, _) => Some(id),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: PlatformCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl PlaylistPlatform for FakePlatform {
    fn kind(&self) -> PlatformKind {
        self.kind
    }

    fn playlist_id(&self) -> &str {
        "fake-playlist"
    }

    async fn verify(&self) -> Result<()> {
        Ok(())
    }

    async fn search(&self, _artist: &str, _title: &str) -> Result<Option<TrackId>> {
        self.record(PlatformCall::Search);
        if self.fail_search {
            return Err(AppError::platform(self.kind.to_string(), "search unavailable"));
        }
        Ok(self.search_match.lock().unwrap().clone())
    }

    async fn last_inserted_track_id(&self) -> Result<Option<TrackId>> {
        self.record(PlatformCall::LastInserted);
        let playlist = self.playlist.lock().unwrap();
        Ok(match self.mode {
            PlaylistMode::InsertAtFront => playlist.first().cloned(),
            PlaylistMode::InsertAtBack => playlist.last().cloned(),
        })
    }

    async fn current_track_ids(&self) -> Result<Vec<TrackId>> {
        self.record(PlatformCall::Current);
        Ok(self.playlist.lock().unwrap().clone())
    }

    async fn insert_at(&self, track_id: &TrackId, position: InsertPosition) -> Result<()> {
        self.record(PlatformCall::Insert(track_id.clone(), position));
        if self.fail_inserts {
            return Err(AppError::platform(self.kind.to_string(), "insert rejected"));
        }

        let mut playlist = self.playlist.lock().unwrap();
        match position {
            InsertPosition::At(index) => {
                let index = index.min(playlist.len());
                playlist.insert(index, track_id.clone());
            }
            InsertPosition::Append => playlist.push(track_id.clone()),
        }
        Ok(())
    }

    async fn remove_at(&self, removals: &[Removal]) -> Result<()> {
        self.record(PlatformCall::Remove(removals.to_vec()));
        if self.fail_removes {
            return Err(AppError::platform(self.kind.to_string(), "503"));
        }

        let mut playlist = self.playlist.lock().unwrap();
        let mut positions: Vec<usize> = removals.iter().map(|r| r.position).collect();
        positions.sort_unstable_by(|a, b| b.cmp(a));
        for position in positions {
            if position < playlist.len() {
                playlist.remove(position);
            }
        }
        Ok(())
    }
}

/// Writes a real file per sample so deletion can be observed.
pub struct FakeRecorder {
    dir: tempfile::TempDir,
    fail: Mutex<bool>,
    samples: Mutex<Vec<PathBuf>>,
}

impl FakeRecorder {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            fail: Mutex::new(false),
            samples: Mutex::new(Vec::new()),
        }
    }

    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    pub fn sample_paths(&self) -> Vec<PathBuf> {
        self.samples.lock().unwrap().clone()
    }
}

#[async_trait]
impl Recorder for FakeRecorder {
    async fn sample(&self, _stream_url: &str, _duration: Duration) -> Result<AudioSample> {
        if *self.fail.lock().unwrap() {
            return Err(AppError::Recorder("stream unreachable".to_string()));
        }

        let mut samples = self.samples.lock().unwrap();
        let path = self.dir.path().join(format!("sample-{}.mp3", samples.len()));
        std::fs::write(&path, b"ID3")?;
        samples.push(path.clone());
        Ok(AudioSample::new(path))
    }
}

/// Returns scripted results in order, then `None` forever.
pub struct FakeIdentifier {
    results: Mutex<VecDeque<Result<Option<IdentifiedSong>>>>,
    seen_paths: Mutex<Vec<PathBuf>>,
}

impl FakeIdentifier {
    pub fn new(results: Vec<Result<Option<IdentifiedSong>>>) -> Self {
        Self {
            results: Mutex::new(results.into()),
            seen_paths: Mutex::new(Vec::new()),
        }
    }

    pub fn seen_paths(&self) -> Vec<PathBuf> {
        self.seen_paths.lock().unwrap().clone()
    }
}

#[async_trait]
impl Identifier for FakeIdentifier {
    async fn identify(&self, sample: &AudioSample) -> Result<Option<IdentifiedSong>> {
        assert!(sample.path().exists(), "sample must exist while identifying");
        self.seen_paths.lock().unwrap().push(sample.path().to_path_buf());
        self.results.lock().unwrap().pop_front().unwrap_or(Ok(None))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedPlay {
    pub station: String,
    pub song: IdentifiedSong,
    pub external_id: Option<String>,
}

#[derive(Default)]
pub struct FakeAnalytics {
    plays: Mutex<Vec<RecordedPlay>>,
}

impl FakeAnalytics {
    pub fn plays(&self) -> Vec<RecordedPlay> {
        self.plays.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnalyticsSink for FakeAnalytics {
    async fn record_play(
        &self,
        station: &str,
        song: &IdentifiedSong,
        _played_at: DateTime<Utc>,
        external_id: Option<&str>,
    ) -> Result<()> {
        self.plays.lock().unwrap().push(RecordedPlay {
            station: station.to_string(),
            song: song.clone(),
            external_id: external_id.map(str::to_string),
        });
        Ok(())
    }
}

pub struct FixedClock(pub Mutex<NaiveDateTime>);

impl FixedClock {
    pub fn at(now: NaiveDateTime) -> Self {
        Self(Mutex::new(now))
    }

    pub fn set(&self, now: NaiveDateTime) {
        *self.0.lock().unwrap() = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        *self.0.lock().unwrap()
    }
}
