pub mod analytics;
pub mod stations;

use crate::services::{AnalyticsStore, StationManager};
use std::sync::Arc;

pub use analytics::analytics_routes;
pub use stations::station_routes;

pub struct AppState {
    pub station_manager: StationManager,
    /// Absent when no station records plays.
    pub analytics: Option<Arc<AnalyticsStore>>,
}
