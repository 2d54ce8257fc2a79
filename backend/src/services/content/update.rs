use crate::publish::DeployStatus;
use crate::services::{published, HandlerError};
use crate::site::error::SiteError;
use crate::site::patcher;
use crate::state::AppState;
use actix_web::{web, HttpResponse, Responder};
use cms_common::requests::UpdateContentRequest;
use cms_common::responses::ApiResponse;
use log::{error, info};

/// HTTP handler wrapper that converts the internal result to an `HttpResponse`.
///
/// - On success: `200 OK` with the publish outcome.
/// - On failure: the status chosen by `HandlerError`, with the error message.
pub async fn process(
    state: web::Data<AppState>,
    payload: web::Json<UpdateContentRequest>,
) -> impl Responder {
    let request = payload.into_inner();
    let section = request.section.clone().unwrap_or_default();
    match update_content(&state, request).await {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => {
            error!("Error updating '{section}' content: {e}");
            e.into_response("Error updating content")
        }
    }
}

/// Patches one section of the document and publishes it.
///
/// The repository lock is held from the read until the push has finished, so
/// concurrent edits are applied one after the other and each commit contains
/// exactly one edit.
pub(crate) async fn update_content(
    state: &AppState,
    request: UpdateContentRequest,
) -> Result<ApiResponse, HandlerError> {
    let section = request
        .section
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| SiteError::Validation("Missing section or content".to_string()))?;
    let content = request
        .content
        .ok_or_else(|| SiteError::Validation("Missing section or content".to_string()))?;

    let session = state.site.edit().await;
    let document = session.read_document().await?;
    let outcome = patcher::patch(&document, &section, &content).map_err(SiteError::from)?;

    let changed = outcome.document != document;
    if changed {
        session.write_document(&outcome.document).await?;
        info!("Updated {section}: {}", outcome.applied.join(", "));
    }

    let report = state
        .pipeline
        .publish(&format!("Update {section} section content"))
        .await
        .map_err(|source| HandlerError::Publish {
            source,
            staged: changed,
            image_path: None,
        })?;
    drop(session);

    let message = if !report.pushed {
        "No changes to publish"
    } else if !report.committed {
        "Pending changes pushed"
    } else if matches!(report.deploy, DeployStatus::Triggered(_)) {
        "Content updated and deployed successfully"
    } else {
        "Content updated and pushed"
    };
    let mut response = published(message, &report);
    response.skipped = outcome.skipped;
    response.ignored = outcome.ignored;
    Ok(response)
}
