use crate::api::AppState;
use crate::error::Result;
use crate::models::StationStatus;
use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use std::sync::Arc;

pub fn station_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/stations", get(list_stations))
        .route("/stations/:name", get(get_station))
}

async fn list_stations(State(state): State<Arc<AppState>>) -> Json<Vec<StationStatus>> {
    Json(state.station_manager.statuses().await)
}

async fn get_station(State(state): State<Arc<AppState>>, Path(name): Path<String>) -> Result<Json<StationStatus>> {
    Ok(Json(state.station_manager.status(&name).await?))
}
