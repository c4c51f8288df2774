//! Report submission and deletion.

use axum::body::Bytes;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use huella_core::validation::{
    validate_photos, validate_submission, PhotoUpload, RawSubmission, ValidationErrors,
};
use huella_storage::NewPhoto;
use tracing::{debug, info, warn};

use crate::error::{ApiError, Result};
use crate::extractors::{MaybeAccount, RequireAdmin};
use crate::models::{MessageResponse, SubmitResponse};
use crate::state::AppState;

/// Multipart field carrying photo files.
pub const PHOTOS_FIELD: &str = "photos";

/// POST /api/reports - Submit a report with photos.
///
/// Photo rules are checked before the text fields; a rejected batch fails
/// the whole submission. Nothing is stored unless everything is valid.
pub async fn submit(
    State(state): State<AppState>,
    MaybeAccount(account): MaybeAccount,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<SubmitResponse>)> {
    let mut raw = RawSubmission::default();
    let mut uploads: Vec<(PhotoUpload, Bytes)> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if name == PHOTOS_FIELD {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let content_type = field.content_type().unwrap_or_default().to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()))?;

            // Empty file input
            if file_name.is_empty() && bytes.is_empty() {
                continue;
            }

            uploads.push((
                PhotoUpload {
                    file_name,
                    content_type,
                    size: bytes.len(),
                },
                bytes,
            ));
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()))?;
            if !raw.set_field(&name, value) {
                debug!(field = %name, "Ignoring unknown submission field");
            }
        }
    }

    let metas: Vec<PhotoUpload> = uploads.iter().map(|(meta, _)| meta.clone()).collect();
    let photo_errors = validate_photos(&metas);
    if !photo_errors.is_empty() {
        let mut errors = ValidationErrors::new();
        for message in photo_errors {
            errors.add(PHOTOS_FIELD, message);
        }
        return Err(ApiError::Validation(errors));
    }

    let report = validate_submission(&raw).map_err(ApiError::Validation)?;

    // URLs of files this request put on disk; shared content is left alone
    let mut created = Vec::new();
    let mut photos = Vec::with_capacity(uploads.len());
    for (order, (meta, bytes)) in uploads.iter().enumerate() {
        let stored = match state
            .images
            .store(&meta.file_name, &meta.content_type, bytes)
            .await
        {
            Ok(stored) => stored,
            Err(e) => {
                discard_images(&state, &created).await;
                return Err(e.into());
            }
        };
        if stored.created {
            created.push(stored.url.clone());
        }
        photos.push(NewPhoto {
            url: stored.url,
            display_order: order as i32 + 1,
        });
    }

    let id = match state
        .db
        .submit_report(&report, account.as_ref().map(|a| a.id), &photos)
    {
        Ok(id) => id,
        Err(e) => {
            discard_images(&state, &created).await;
            return Err(e.into());
        }
    };

    info!(
        report_id = id,
        anonymous = report.reporter.is_anonymous(),
        photos = photos.len(),
        "New report received"
    );

    Ok((
        StatusCode::CREATED,
        Json(SubmitResponse {
            success: true,
            message: "Report submitted. It will be published once a moderator reviews it."
                .to_string(),
            id,
        }),
    ))
}

async fn discard_images(state: &AppState, urls: &[String]) {
    for url in urls {
        if let Err(e) = state.images.remove(url).await {
            warn!(url = %url, "Failed to remove orphaned image: {}", e);
        }
    }
}

/// DELETE /api/reports/{id} - Delete a report with its photos and log.
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>> {
    state.db.delete_report(id)?;
    info!(report_id = id, admin = %admin.username, "Report deleted by admin");
    Ok(Json(MessageResponse::ok("Report deleted.")))
}
