//! Moderation endpoints.

use axum::extract::{FromRequest, Path, Query, Request, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::IntoResponse;
use axum::{Form, Json};
use chrono::Local;
use huella_core::moderation::{apply, Effect, QueueFilter, Transition};
use huella_core::report::ANONYMOUS_LABEL;
use huella_storage::{Account, PhotoUpdate, Report};
use tracing::{debug, info};

use crate::error::{ApiError, Result};
use crate::extractors::{RequireAdmin, RequireModerator, RequireSuperuser};
use crate::models::{
    display_time, BulkRejectRequest, LogEntryResponse, MessageResponse, ModerationResponse,
    ModeratorReport, PhotoResponse, QueueItem, QueueQuery, QueueResponse, ReasonBody, ResetRequest,
    ResetResponse,
};
use crate::state::AppState;

/// Column headers of the CSV export.
pub const CSV_HEADER: [&str; 17] = [
    "ID",
    "Title",
    "Description",
    "State",
    "Severity",
    "Animal type",
    "Aggressor count",
    "Address",
    "Latitude",
    "Longitude",
    "Date",
    "Time",
    "User",
    "Email",
    "Phone",
    "Moderator",
    "Moderation comment",
];

/// GET /api/moderation/queue - Filtered, paginated report queue.
pub async fn queue(
    State(state): State<AppState>,
    RequireModerator(_): RequireModerator,
    Query(query): Query<QueueQuery>,
) -> Result<Json<QueueResponse>> {
    let filter = QueueFilter::from_query(
        query.state.as_deref(),
        query.severity.as_deref(),
        query.animal.as_deref(),
        query.anonymous.as_deref(),
    );

    let page = state.db.moderation_queue(&filter, query.page.as_deref())?;

    let ids: Vec<i64> = page.reports.iter().map(|r| r.id).collect();
    let photo_counts = state.db.photo_counts(&ids)?;
    let reports = page
        .reports
        .into_iter()
        .map(|report| {
            let photo_count = photo_counts.get(&report.id).copied().unwrap_or(0);
            QueueItem::new(report, photo_count)
        })
        .collect();

    Ok(Json(QueueResponse {
        reports,
        has_next: page.page.has_next(),
        has_previous: page.page.has_previous(),
        page: page.page,
        counts: page.counts,
        filtered_total: page.filtered_total,
    }))
}

/// POST /api/moderation/reports/{id}/approve
pub async fn approve(
    State(state): State<AppState>,
    RequireModerator(moderator): RequireModerator,
    Path(id): Path<i64>,
) -> Result<Json<ModerationResponse>> {
    let report = transition(&state, &moderator, id, Transition::Approve)?;
    Ok(Json(ModerationResponse {
        success: true,
        message: "Report approved.".to_string(),
        state: report.state,
    }))
}

/// POST /api/moderation/reports/{id}/reject - Requires `motivo`.
pub async fn reject(
    State(state): State<AppState>,
    RequireModerator(moderator): RequireModerator,
    Path(id): Path<i64>,
    request: Request,
) -> Result<Json<ModerationResponse>> {
    let reason = read_reason(request).await?;
    let report = transition(&state, &moderator, id, Transition::Reject { reason })?;
    Ok(Json(ModerationResponse {
        success: true,
        message: "Report rejected.".to_string(),
        state: report.state,
    }))
}

/// POST /api/moderation/reports/{id}/comment - Internal note.
pub async fn comment(
    State(state): State<AppState>,
    RequireModerator(moderator): RequireModerator,
    Path(id): Path<i64>,
    request: Request,
) -> Result<Json<ModerationResponse>> {
    let reason = read_reason(request).await?;
    let report = transition(&state, &moderator, id, Transition::Comment { reason })?;
    Ok(Json(ModerationResponse {
        success: true,
        message: "Comment added.".to_string(),
        state: report.state,
    }))
}

fn transition(
    state: &AppState,
    moderator: &Account,
    id: i64,
    transition: Transition,
) -> Result<Report> {
    let effect = apply(&transition)?;
    let report = state.db.moderate_report(id, Some(moderator.id), &effect)?;
    debug!(report_id = id, moderator = %moderator.username, ?transition, "Transition applied");
    Ok(report)
}

/// Read the reason from a form or JSON body. Other bodies read as empty.
async fn read_reason(request: Request) -> Result<String> {
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let body = if content_type.starts_with("application/json") {
        Json::<ReasonBody>::from_request(request, &())
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?
            .0
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        Form::<ReasonBody>::from_request(request, &())
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?
            .0
    } else {
        ReasonBody::default()
    };

    Ok(body.reason)
}

/// GET /api/moderation/reports/{id} - Full detail for moderators.
pub async fn detail(
    State(state): State<AppState>,
    RequireModerator(_): RequireModerator,
    Path(id): Path<i64>,
) -> Result<Json<ModeratorReport>> {
    let report = state.db.require_report(id)?;
    let photos = state.db.get_report_photos(id)?;
    Ok(Json(ModeratorReport::new(report, photos)))
}

/// GET /api/moderation/reports/{id}/log - Audit trail.
pub async fn log(
    State(state): State<AppState>,
    RequireModerator(_): RequireModerator,
    Path(id): Path<i64>,
) -> Result<Json<Vec<LogEntryResponse>>> {
    let entries = state.db.moderation_log(id)?;
    Ok(Json(entries.into_iter().map(LogEntryResponse::from).collect()))
}

/// DELETE /api/moderation/log/{id} - Superuser only.
pub async fn delete_log_entry(
    State(state): State<AppState>,
    RequireSuperuser(superuser): RequireSuperuser,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>> {
    state.db.delete_log_entry(id)?;
    info!(log_entry_id = id, by = %superuser.username, "Audit entry removed");
    Ok(Json(MessageResponse::ok("Log entry deleted.")))
}

/// POST /api/moderation/reset - Send reports back to pending.
pub async fn reset(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(req): Json<ResetRequest>,
) -> Result<Json<ResetResponse>> {
    let effect = apply(&Transition::ResetToPending)?;
    let updated = state.db.moderate_reports(&req.ids, Some(admin.id), &effect)?;

    Ok(Json(ResetResponse {
        success: true,
        message: format!("{} report(s) moved back to pending.", updated),
        updated,
    }))
}

/// POST /api/moderation/approve - Approve reports in bulk.
pub async fn bulk_approve(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(req): Json<ResetRequest>,
) -> Result<Json<ResetResponse>> {
    let updated = bulk_transition(&state, &admin, &req.ids, Transition::Approve)?;
    Ok(Json(ResetResponse {
        success: true,
        message: format!("{} report(s) approved.", updated),
        updated,
    }))
}

/// POST /api/moderation/reject - Reject reports in bulk. Requires `motivo`.
pub async fn bulk_reject(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(req): Json<BulkRejectRequest>,
) -> Result<Json<ResetResponse>> {
    let transition = Transition::Reject { reason: req.reason };
    let updated = bulk_transition(&state, &admin, &req.ids, transition)?;
    Ok(Json(ResetResponse {
        success: true,
        message: format!("{} report(s) rejected.", updated),
        updated,
    }))
}

/// Bulk actions stamp the reports but leave the audit trail alone.
fn bulk_transition(
    state: &AppState,
    admin: &Account,
    ids: &[i64],
    transition: Transition,
) -> Result<usize> {
    let effect = Effect {
        log: None,
        ..apply(&transition)?
    };
    let updated = state.db.moderate_reports(ids, Some(admin.id), &effect)?;
    info!(
        requested = ids.len(),
        updated,
        admin = %admin.username,
        ?transition,
        "Bulk moderation"
    );
    Ok(updated)
}

/// PATCH /api/moderation/photos/{id} - Photo state and flags.
pub async fn update_photo(
    State(state): State<AppState>,
    RequireModerator(moderator): RequireModerator,
    Path(id): Path<i64>,
    Json(update): Json<PhotoUpdate>,
) -> Result<Json<PhotoResponse>> {
    let photo = state.db.update_photo(id, &update)?;
    info!(photo_id = id, moderator = %moderator.username, ?update, "Photo updated");
    Ok(Json(photo.into()))
}

/// GET /api/moderation/export.csv - All reports as CSV.
pub async fn export_csv(
    State(state): State<AppState>,
    RequireModerator(moderator): RequireModerator,
) -> Result<impl IntoResponse> {
    let reports = state.db.all_reports()?;

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER).map_err(csv_error)?;
    for report in &reports {
        writer.write_record(csv_row(report)).map_err(csv_error)?;
    }
    let data = writer
        .into_inner()
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let filename = format!("reports_{}.csv", Local::now().format("%Y-%m-%d_%H-%M"));
    info!(rows = reports.len(), moderator = %moderator.username, "Reports exported");

    Ok((
        [
            (CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        data,
    ))
}

fn csv_row(report: &Report) -> [String; 17] {
    [
        report.id.to_string(),
        report.title.clone(),
        report.description.clone(),
        report.state.as_str().to_string(),
        report.severity.as_str().to_string(),
        report.animal_type.as_str().to_string(),
        report.aggressor_count.to_string(),
        report.address.clone(),
        report.location.latitude.to_string(),
        report.location.longitude.to_string(),
        report.incident_date.format("%d-%m-%Y").to_string(),
        display_time(report.incident_time),
        report
            .username
            .clone()
            .unwrap_or_else(|| ANONYMOUS_LABEL.to_string()),
        report.reporter.email().unwrap_or_default().to_string(),
        report.reporter.phone().unwrap_or_default().to_string(),
        report.moderator_username.clone().unwrap_or_default(),
        report.moderation_comment.clone().unwrap_or_default(),
    ]
}

fn csv_error(err: csv::Error) -> ApiError {
    ApiError::Internal(format!("csv export failed: {}", err))
}

