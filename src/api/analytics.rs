use crate::api::AppState;
use crate::error::{AppError, Result};
use crate::models::{ArtistCount, ArtistSongCount, DayCount, DowCount, HourCount, PlayRecord, SongCount};
use crate::services::analytics::PlayFilter;
use crate::services::AnalyticsStore;
use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

const DEFAULT_LIMIT: i64 = 20;
const MAX_LIMIT: i64 = 500;

#[derive(Debug, Default, Deserialize)]
pub struct AnalyticsQuery {
    pub station: Option<String>,
    pub days: Option<u32>,
    pub limit: Option<i64>,
    pub artist: Option<String>,
}

impl AnalyticsQuery {
    fn filter(&self) -> PlayFilter {
        PlayFilter {
            station: self.station.clone().filter(|s| !s.is_empty()),
            days: self.days.filter(|d| *d > 0),
        }
    }

    fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    fn artist(&self) -> Option<&str> {
        self.artist.as_deref().map(str::trim).filter(|a| !a.is_empty())
    }
}

pub fn analytics_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/analytics/top-songs", get(top_songs))
        .route("/analytics/top-artists", get(top_artists))
        .route("/analytics/by-hour", get(by_hour))
        .route("/analytics/by-dow", get(by_dow))
        .route("/analytics/by-day", get(by_day))
        .route("/analytics/recent", get(recent))
        .route("/analytics/artist-songs", get(artist_songs))
}

fn store(state: &AppState) -> Result<&AnalyticsStore> {
    state
        .analytics
        .as_deref()
        .ok_or_else(|| AppError::NotFound("Analytics is not enabled for any station".to_string()))
}

async fn top_songs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<Vec<SongCount>>> {
    Ok(Json(store(&state)?.top_songs(&query.filter(), query.limit()).await?))
}

async fn top_artists(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<Vec<ArtistCount>>> {
    Ok(Json(store(&state)?.top_artists(&query.filter(), query.limit()).await?))
}

async fn by_hour(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<Vec<HourCount>>> {
    Ok(Json(store(&state)?.plays_by_hour(&query.filter()).await?))
}

async fn by_dow(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<Vec<DowCount>>> {
    Ok(Json(store(&state)?.plays_by_dow(&query.filter()).await?))
}

async fn by_day(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<Vec<DayCount>>> {
    Ok(Json(store(&state)?.plays_by_day(&query.filter(), query.artist()).await?))
}

async fn recent(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<Vec<PlayRecord>>> {
    let filter = query.filter();
    Ok(Json(
        store(&state)?
            .recent_plays(filter.station.as_deref(), query.limit())
            .await?,
    ))
}

async fn artist_songs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<Vec<ArtistSongCount>>> {
    let artist = query
        .artist()
        .ok_or_else(|| AppError::Validation("artist is required".to_string()))?;

    Ok(Json(
        store(&state)?
            .songs_by_artist(artist, &query.filter(), query.limit())
            .await?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IdentifiedSong;
    use crate::services::analytics::AnalyticsSink;
    use crate::services::StationManager;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::Utc;
    use http_body_util::BodyExt;
    use sqlx::sqlite::SqlitePoolOptions;
    use tower::ServiceExt;

    async fn app(analytics: Option<Arc<AnalyticsStore>>) -> Router {
        let state = Arc::new(AppState {
            station_manager: StationManager::new(),
            analytics,
        });
        Router::new().nest("/api/v1", analytics_routes()).with_state(state)
    }

    async fn seeded_store() -> Arc<AnalyticsStore> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = AnalyticsStore::with_pool(pool, 30).await.unwrap();

        let now = Utc::now();
        for (artist, title) in [("Omer Adam", "Tel Aviv"), ("Omer Adam", "Tel Aviv"), ("Noa Kirel", "Unicorn")] {
            store
                .record_play("kan88", &IdentifiedSong::new(artist, title), now, None)
                .await
                .unwrap();
        }
        Arc::new(store)
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_top_songs_endpoint() {
        let app = app(Some(seeded_store().await)).await;
        let (status, body) = get_json(app, "/api/v1/analytics/top-songs?station=kan88&days=7&limit=5").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["title"], "Tel Aviv");
        assert_eq!(body[0]["count"], 2);
        assert_eq!(body.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_by_hour_has_24_buckets() {
        let app = app(Some(seeded_store().await)).await;
        let (status, body) = get_json(app, "/api/v1/analytics/by-hour").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 24);
    }

    #[tokio::test]
    async fn test_artist_songs_requires_artist() {
        let app = app(Some(seeded_store().await)).await;
        let (status, body) = get_json(app, "/api/v1/analytics/artist-songs").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "artist is required");
    }

    #[tokio::test]
    async fn test_disabled_analytics_is_not_found() {
        let app = app(None).await;
        let (status, _) = get_json(app, "/api/v1/analytics/recent").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
