//! HTTP endpoints of the content server.
//!
//! Every resource lives in one `/api` scope. Each sub-module exposes a
//! `process` handler that delegates to an inner function returning a
//! `Result`. Handlers translate that result into the shared `ApiResponse`
//! envelope:
//!
//! - `200 OK` on success,
//! - `400 Bad Request` for missing or unusable input,
//! - `500 Internal Server Error` for everything else, with `staged: true` when
//!   the document or an asset changed on disk but could not be published.

pub mod content;
pub mod health;
pub mod images;

use crate::publish::{DeployStatus, PublishError, PublishReport};
use crate::site::error::SiteError;
use actix_web::http::StatusCode;
use actix_web::web::{get, post, scope};
use actix_web::{error, web, HttpResponse, Scope};
use cms_common::responses::ApiResponse;

/// The base path for all API endpoints.
const API_PATH: &str = "/api";

/// Configures and returns the Actix `Scope` for all routes under `/api`.
///
/// # Registered Routes:
///
/// *   **`POST /update-content`**:
///     - **Handler**: `content::update::process`
///     - **Description**: Patches one section of the page. The body is
///       `{ "section": "<name>", "content": { "<key>": <value>, ... } }`; list
///       sections (`services`, `testimonials`) take their entries under `items`.
///
/// *   **`POST /upload-image`**:
///     - **Handler**: `images::upload::process`
///     - **Description**: Multipart form with an `image` file part and an
///       optional `section` text part naming the section whose image should
///       reference the upload.
///
/// *   **`GET /health`**:
///     - **Handler**: `health::process`
///     - **Description**: Liveness probe, always `{ "status": "ok" }`.
pub fn configure_routes() -> Scope {
    scope(API_PATH)
        .route("/update-content", post().to(content::update::process))
        .route("/upload-image", post().to(images::upload::process))
        .route("/health", get().to(health::process))
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum HandlerError {
    #[error(transparent)]
    Site(#[from] SiteError),

    /// A site operation failed after an asset was already written.
    #[error("{source}")]
    Staged {
        source: SiteError,
        image_path: String,
    },

    #[error("{source}")]
    Publish {
        source: PublishError,
        /// Local state changed before the failure.
        staged: bool,
        image_path: Option<String>,
    },
}

impl HandlerError {
    pub(crate) fn status(&self) -> StatusCode {
        match self {
            HandlerError::Site(e) if e.is_validation() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub(crate) fn into_response(self, message: &str) -> HttpResponse {
        let status = self.status();
        let mut body = ApiResponse::failure(message, self.to_string());
        match self {
            HandlerError::Site(_) => {}
            HandlerError::Staged { image_path, .. } => {
                body.staged = Some(true);
                body.image_path = Some(image_path);
            }
            HandlerError::Publish {
                source,
                staged,
                image_path,
            } => {
                body.image_path = image_path;
                match source {
                    // The push went through, only the deploy hook failed.
                    PublishError::Deploy(_) => {
                        body.committed = Some(true);
                        body.pushed = Some(true);
                        body.deployed = Some(false);
                    }
                    _ => body.staged = Some(staged),
                }
            }
        }
        HttpResponse::build(status).json(body)
    }
}

/// Success envelope carrying the publish outcome.
pub(crate) fn published(message: &str, report: &PublishReport) -> ApiResponse {
    let mut response = ApiResponse::ok(message);
    response.committed = Some(report.committed);
    response.pushed = Some(report.pushed);
    match &report.deploy {
        DeployStatus::Skipped => {}
        DeployStatus::Triggered(id) => {
            response.deployed = Some(true);
            response.deploy_id = Some(id.clone());
        }
        DeployStatus::Failed(e) => {
            response.deployed = Some(false);
            response.deploy_error = Some(e.clone());
        }
    }
    response
}

/// JSON extractor settings: 10 MB body limit and malformed bodies answered
/// with the failure envelope instead of a plain-text 400.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(10 * 1024 * 1024)
        .error_handler(|err, _req| {
            let body = ApiResponse::failure("Invalid request body", err.to_string());
            error::InternalError::from_response(err, HttpResponse::BadRequest().json(body)).into()
        })
}
