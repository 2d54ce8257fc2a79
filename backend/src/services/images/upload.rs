use crate::services::{published, HandlerError};
use crate::site::error::SiteError;
use crate::site::images;
use crate::state::AppState;
use actix_multipart::{Multipart, MultipartError};
use actix_web::{web, HttpResponse, Responder};
use cms_common::responses::ApiResponse;
use futures_util::StreamExt;
use log::{error, info, warn};

/// Longest accepted `section` form value.
const MAX_SECTION_BYTES: usize = 256;

#[derive(Default)]
struct UploadForm {
    /// Client filename and content of the `image` part.
    image: Option<(String, Vec<u8>)>,
    section: Option<String>,
}

/// HTTP handler wrapper that converts the internal result to an `HttpResponse`.
///
/// - No `image` part: `400 Bad Request` with "No file uploaded".
/// - On success: `200 OK` with the stored `imagePath` and the publish outcome.
/// - On failure: the status chosen by `HandlerError`, with the error message.
pub async fn process(state: web::Data<AppState>, payload: Multipart) -> impl Responder {
    let form = match read_form(payload, state.max_upload_bytes).await {
        Ok(form) => form,
        Err(e) => {
            warn!("Rejected upload: {e}");
            return HandlerError::from(e).into_response("Error uploading image");
        }
    };
    let Some((filename, bytes)) = form.image else {
        return HttpResponse::BadRequest().json(ApiResponse {
            success: false,
            message: "No file uploaded".to_string(),
            ..Default::default()
        });
    };

    match upload_image(&state, &filename, bytes, form.section.as_deref()).await {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => {
            error!("Error uploading '{filename}': {e}");
            e.into_response("Error uploading image")
        }
    }
}

fn invalid_form(e: MultipartError) -> SiteError {
    SiteError::Validation(format!("invalid multipart body: {e}"))
}

/// Reads the `image` and `section` parts, ignoring anything else.
async fn read_form(mut payload: Multipart, max_bytes: usize) -> Result<UploadForm, SiteError> {
    let mut form = UploadForm::default();

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(invalid_form)?;
        let name = field
            .content_disposition()
            .and_then(|cd| cd.get_name().map(|n| n.to_string()));

        match name.as_deref() {
            Some("image") => {
                let filename = field
                    .content_disposition()
                    .and_then(|cd| cd.get_filename().map(|f| f.to_string()))
                    .unwrap_or_default();

                let mut bytes = Vec::new();
                while let Some(chunk) = field.next().await {
                    let chunk = chunk.map_err(invalid_form)?;
                    if bytes.len() + chunk.len() > max_bytes {
                        return Err(SiteError::Validation(format!(
                            "image exceeds the {max_bytes} byte upload limit"
                        )));
                    }
                    bytes.extend_from_slice(&chunk);
                }

                // An empty file input still sends a part, with no name and no data.
                if filename.is_empty() && bytes.is_empty() {
                    continue;
                }
                form.image = Some((filename, bytes));
            }

            Some("section") => {
                let mut bytes = Vec::new();
                while let Some(chunk) = field.next().await {
                    let chunk = chunk.map_err(invalid_form)?;
                    if bytes.len() + chunk.len() > MAX_SECTION_BYTES {
                        return Err(SiteError::Validation("section name too long".to_string()));
                    }
                    bytes.extend_from_slice(&chunk);
                }
                let section = String::from_utf8(bytes)
                    .map_err(|_| SiteError::Validation("section is not valid UTF-8".to_string()))?;
                let section = section.trim();
                form.section = (!section.is_empty()).then(|| section.to_string());
            }

            _ => {
                while let Some(chunk) = field.next().await {
                    chunk.map_err(invalid_form)?;
                }
            }
        }
    }

    Ok(form)
}

/// Stores the image, retargets the section if asked to, and publishes.
pub(crate) async fn upload_image(
    state: &AppState,
    filename: &str,
    bytes: Vec<u8>,
    section: Option<&str>,
) -> Result<ApiResponse, HandlerError> {
    let session = state.site.edit().await;
    let outcome = images::ingest(&session, bytes, filename, section)
        .await
        .map_err(|e| match e.stored {
            Some(image_path) => HandlerError::Staged {
                source: e.source,
                image_path,
            },
            None => HandlerError::Site(e.source),
        })?;
    if let (Some(section), true) = (section, outcome.retargeted) {
        info!("{section} image now points at {}", outcome.image_path);
    }

    let message = match section {
        Some(section) => format!("Update {section} image"),
        None => format!("Upload image {}", outcome.image_path),
    };
    let report = state
        .pipeline
        .publish(&message)
        .await
        .map_err(|source| HandlerError::Publish {
            source,
            staged: true,
            image_path: Some(outcome.image_path.clone()),
        })?;
    drop(session);

    let mut response = published("Image uploaded successfully", &report);
    response.image_path = Some(outcome.image_path);
    Ok(response)
}
