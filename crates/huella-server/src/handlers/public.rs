//! Public read endpoints.

use axum::extract::{Path, State};
use axum::Json;
use chrono::Local;
use huella_core::report::ReportState;
use huella_core::stats::Dashboard;
use huella_storage::Summary;
use tracing::debug;

use crate::error::{ApiError, Result};
use crate::models::{HealthResponse, MapEntry, PublicReport};
use crate::state::AppState;

/// GET /api/health - Liveness check.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /api/summary - Landing page counts.
pub async fn summary(State(state): State<AppState>) -> Result<Json<Summary>> {
    let summary = state.db.summary(Local::now().date_naive())?;
    Ok(Json(summary))
}

/// GET /api/reports/{id} - Public detail of an approved report.
pub async fn report_detail(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<PublicReport>> {
    let report = state
        .db
        .get_report(id)?
        .filter(|r| r.state == ReportState::Approved)
        .ok_or_else(|| ApiError::NotFound("Report".to_string()))?;

    let photos = state.db.get_report_photos(id)?;
    Ok(Json(PublicReport::new(report, photos)))
}

/// GET /api/map - Approved reports as map pins.
pub async fn map(State(state): State<AppState>) -> Result<Json<Vec<MapEntry>>> {
    let pins = state.db.map_pins()?;
    debug!(count = pins.len(), "Serving map pins");
    Ok(Json(pins.into_iter().map(MapEntry::from).collect()))
}

/// GET /api/stats - Statistics dashboard.
pub async fn stats(State(state): State<AppState>) -> Result<Json<Dashboard>> {
    let dashboard = state.db.dashboard(Local::now().date_naive())?;
    Ok(Json(dashboard))
}
