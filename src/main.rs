mod api;
mod config;
mod error;
mod frontend;
mod logging;
mod models;
mod services;

use crate::api::AppState;
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::logging::StationFileLayer;
use crate::models::{PlatformKind, StationContext};
use crate::services::{
    AnalyticsSink, AnalyticsStore, AuddIdentifier, FfmpegRecorder, Identifier, PlatformCoordinator,
    PlaylistPlatform, Recorder, SpotifyPlatform, StationManager, StationWorker, YouTubePlatform,
};
use axum::{http::Method, routing::get, Router};
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    run().await.map_err(|e| {
        let context = exit_context(&e);
        tracing::error!("{}: {}", context, e);
        anyhow::Error::from(e).context(context)
    })
}

fn exit_context(error: &AppError) -> &'static str {
    if error.is_fatal() {
        "Refusing to start with invalid configuration or credentials"
    } else {
        "Radio monitor stopped"
    }
}

async fn run() -> Result<()> {
    // Configuration problems are fatal before any worker starts
    let config = Config::from_env()?;
    let stations = config::load_stations(&config.stations_file)?;
    config.check_credentials(&stations)?;

    logging::init(
        config.log_format,
        StationFileLayer::new(&stations, config.log_max_bytes, config.log_backup_count)?,
    );
    tracing::info!(
        "Loaded {} station(s) from {}",
        stations.len(),
        config.stations_file.display()
    );

    // One handle per station playlist, each verified up front
    let mut station_platforms = Vec::with_capacity(stations.len());
    for station in &stations {
        let platforms = build_platforms(&config, station)?;
        for platform in &platforms {
            platform.verify().await.map_err(|e| {
                AppError::Auth(format!(
                    "Station '{}': {} verification failed: {}",
                    station.name,
                    platform.kind(),
                    e
                ))
            })?;
        }
        station_platforms.push(platforms);
    }
    tracing::info!("All platform credentials verified");

    let analytics = if stations.iter().any(|s| s.analytics) {
        let store = AnalyticsStore::connect(&config.analytics_db, config.analytics_retention_days).await?;
        Some(Arc::new(store))
    } else {
        None
    };

    let recorder: Arc<dyn Recorder> = Arc::new(FfmpegRecorder::new(config.ffmpeg_path.clone()));
    let identifier: Arc<dyn Identifier> = Arc::new(AuddIdentifier::new(
        config.audd_api_token.clone().unwrap_or_default(),
    ));

    let station_manager = StationManager::new();
    for (station, platforms) in stations.into_iter().zip(station_platforms) {
        let coordinator = PlatformCoordinator::new(
            platforms,
            config.leader_platform,
            config.playlist_max_size,
            config.playlist_mode,
        );
        let mut worker = StationWorker::new(
            station,
            config.timings(),
            recorder.clone(),
            identifier.clone(),
            coordinator,
        );
        if let Some(store) = &analytics {
            worker = worker.with_analytics(store.clone() as Arc<dyn AnalyticsSink>);
        }
        station_manager.spawn(worker).await?;
    }

    if config.dashboard_enabled {
        let app_state = Arc::new(AppState {
            station_manager: station_manager.clone(),
            analytics: analytics.clone(),
        });
        let addr = format!("{}:{}", config.dashboard_host, config.dashboard_port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        tracing::info!("Dashboard listening on http://{}", addr);

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router(app_state)).await {
                tracing::error!("Dashboard server stopped: {}", e);
            }
        });
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    station_manager.shutdown().await;

    Ok(())
}

fn build_platforms(config: &Config, station: &StationContext) -> Result<Vec<Arc<dyn PlaylistPlatform>>> {
    station
        .playlists
        .iter()
        .map(|(kind, playlist_id)| {
            let credentials = config
                .credentials_for(*kind)
                .cloned()
                .ok_or_else(|| AppError::Config(format!("No credentials for {}", kind)))?;

            let platform: Arc<dyn PlaylistPlatform> = match kind {
                PlatformKind::Spotify => Arc::new(SpotifyPlatform::new(
                    credentials,
                    playlist_id.clone(),
                    config.spotify_market.clone(),
                    config.playlist_mode,
                )),
                PlatformKind::YouTube => Arc::new(YouTubePlatform::new(
                    credentials,
                    playlist_id.clone(),
                    config.playlist_mode,
                )),
            };
            Ok(platform)
        })
        .collect()
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest(
            "/api/v1",
            Router::new()
                .merge(api::station_routes())
                .merge(api::analytics_routes())
                .with_state(state),
        )
        .fallback(get(frontend::serve_dashboard))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods([Method::GET]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    #[test]
    fn test_exit_context_separates_fatal_errors() {
        assert_eq!(
            exit_context(&AppError::Auth("spotify verification failed".to_string())),
            "Refusing to start with invalid configuration or credentials"
        );
        assert_eq!(
            exit_context(&AppError::Io(std::io::Error::other("address in use"))),
            "Radio monitor stopped"
        );
    }

    #[tokio::test]
    async fn test_stations_endpoint_lists_statuses() {
        let state = Arc::new(AppState {
            station_manager: StationManager::new(),
            analytics: None,
        });

        let response = router(state)
            .oneshot(Request::builder().uri("/api/v1/stations").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"[]");
    }

    #[tokio::test]
    async fn test_unknown_station_is_not_found() {
        let state = Arc::new(AppState {
            station_manager: StationManager::new(),
            analytics: None,
        });

        let response = router(state)
            .oneshot(Request::builder().uri("/api/v1/stations/kan88").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
