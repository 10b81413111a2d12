use crate::error::{AppError, Result};
use crate::models::StationStatus;
use crate::services::station_worker::StationWorker;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;

struct ActiveStation {
    status: watch::Receiver<StationStatus>,
    task: JoinHandle<()>,
}

/// Owns the running station workers. Holds only status receivers, so it
/// never touches a worker's state directly.
#[derive(Clone, Default)]
pub struct StationManager {
    active_stations: Arc<RwLock<HashMap<String, ActiveStation>>>,
}

impl StationManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn spawn(&self, worker: StationWorker) -> Result<()> {
        let name = worker.name().to_string();

        let mut stations = self.active_stations.write().await;
        if stations.contains_key(&name) {
            return Err(AppError::Validation(format!("Station '{}' is already running", name)));
        }

        let status = worker.subscribe();
        let task = tokio::spawn(worker.run());
        stations.insert(name.clone(), ActiveStation { status, task });

        tracing::info!("Started station: {}", name);
        Ok(())
    }

    /// Latest status of every station, ordered by name.
    pub async fn statuses(&self) -> Vec<StationStatus> {
        let stations = self.active_stations.read().await;
        let mut statuses: Vec<StationStatus> = stations
            .values()
            .map(|active| {
                let mut status = active.status.borrow().clone();
                if active.task.is_finished() {
                    status.last_outcome = Some("worker stopped".to_string());
                }
                status
            })
            .collect();
        statuses.sort_by(|a, b| a.name.cmp(&b.name));
        statuses
    }

    pub async fn status(&self, name: &str) -> Result<StationStatus> {
        let stations = self.active_stations.read().await;
        stations
            .get(name)
            .map(|active| active.status.borrow().clone())
            .ok_or_else(|| AppError::NotFound(format!("Station '{}' not found", name)))
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.active_stations.read().await.len()
    }

    /// Abort every worker and wait for the tasks to wind down.
    pub async fn shutdown(&self) {
        let mut stations = self.active_stations.write().await;
        for (name, active) in stations.drain() {
            active.task.abort();
            if let Err(e) = active.task.await {
                if !e.is_cancelled() {
                    tracing::error!("Station {} worker ended abnormally: {}", name, e);
                }
            }
            tracing::info!("Stopped station: {}", name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PlatformKind, PlaylistMode, StationContext};
    use crate::services::coordinator::PlatformCoordinator;
    use crate::services::platform::PlaylistPlatform;
    use crate::services::station_worker::WorkerTimings;
    use crate::services::testing::{FakeIdentifier, FakePlatform, FakeRecorder};
    use std::time::Duration;

    fn worker(name: &str) -> StationWorker {
        let station = StationContext {
            name: name.to_string(),
            stream_url: "http://stream.example/live".to_string(),
            skip_ranges: Vec::new(),
            playlists: vec![(PlatformKind::Spotify, "fake-playlist".to_string())],
            log_file: None,
            analytics: false,
        };
        let platform: Arc<dyn PlaylistPlatform> = Arc::new(FakePlatform::new(PlatformKind::Spotify, &[]));
        let coordinator = PlatformCoordinator::new(vec![platform], None, 100, PlaylistMode::InsertAtFront);
        let timings = WorkerTimings {
            sample_duration: Duration::from_secs(1),
            poll_interval: Duration::from_secs(3600),
            same_song_retry: Duration::from_secs(3600),
            error_retry: Duration::from_secs(3600),
        };

        StationWorker::new(
            station,
            timings,
            Arc::new(FakeRecorder::new()),
            Arc::new(FakeIdentifier::new(Vec::new())),
            coordinator,
        )
    }

    #[tokio::test]
    async fn test_spawn_and_report_statuses() {
        let manager = StationManager::new();
        manager.spawn(worker("kan88")).await.unwrap();
        manager.spawn(worker("glz")).await.unwrap();

        let names: Vec<String> = manager.statuses().await.into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["glz", "kan88"]);
        assert!(manager.status("kan88").await.is_ok());
        assert!(matches!(manager.status("eco99").await, Err(AppError::NotFound(_))));

        manager.shutdown().await;
        assert_eq!(manager.len().await, 0);
    }

    #[tokio::test]
    async fn test_duplicate_station_rejected() {
        let manager = StationManager::new();
        manager.spawn(worker("kan88")).await.unwrap();
        assert!(manager.spawn(worker("kan88")).await.is_err());
        manager.shutdown().await;
    }
}
