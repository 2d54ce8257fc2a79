//! Stores uploaded images in the asset directory.
//!
//! The stored name is the uploaded filename reduced to its last path
//! component. Names that reduce to nothing (`""`, `.`, `..`) are rejected, so
//! an upload can no longer escape the asset directory. Collisions are not
//! handled: an upload with the name of an existing asset replaces it, and
//! uploaded files are never deleted by this server.

use crate::site::error::SiteError;
use crate::site::locators::{self, IMAGE_KEY};
use crate::site::patcher::{self, PatchOutcome};
use crate::site::store::EditSession;
use cms_common::model::section::Section;
use log::{info, warn};
use serde_json::{Map, Value};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOutcome {
    /// Path relative to the repository root, as referenced by the page.
    pub image_path: String,
    /// Whether the page now points at the new image.
    pub retargeted: bool,
}

/// Reduces an uploaded filename to a single, safe path component.
pub fn storage_name(original: &str) -> Result<String, SiteError> {
    // Browsers on Windows may send the full client path.
    let last = original.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    let valid = Path::new(last)
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| *name == last);
    match valid {
        Some(name) if !name.is_empty() => Ok(name.to_string()),
        _ => Err(SiteError::Validation(format!(
            "invalid image filename '{original}'"
        ))),
    }
}

/// Failure of `ingest`, with the asset path when the file was already
/// written before the failure.
#[derive(Debug, thiserror::Error)]
#[error("{source}")]
pub struct IngestError {
    pub source: SiteError,
    pub stored: Option<String>,
}

impl From<SiteError> for IngestError {
    fn from(source: SiteError) -> Self {
        IngestError {
            source,
            stored: None,
        }
    }
}

/// Writes the image and, when `target_section` has an image locator, points
/// the page's reference at it.
///
/// The retargeted document is computed before anything is written, so a
/// section that cannot be patched leaves the disk untouched.
pub async fn ingest(
    session: &EditSession<'_>,
    bytes: Vec<u8>,
    original_filename: &str,
    target_section: Option<&str>,
) -> Result<IngestOutcome, IngestError> {
    let file_name = storage_name(original_filename)?;
    let assets_dir = session
        .repository()
        .assets_dir()
        .strip_prefix(session.repository().root())
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .unwrap_or_else(|_| "images".to_string());
    let image_path = format!("{assets_dir}/{file_name}");

    let retarget = retargeted_document(session, target_section, &image_path).await?;

    let size = bytes.len();
    session.write_asset(&file_name, bytes).await?;
    info!("Stored {image_path} ({size} bytes)");

    let mut outcome = IngestOutcome {
        image_path,
        retargeted: false,
    };
    if let Some((document, patched)) = retarget {
        if patched.document != document {
            session
                .write_document(&patched.document)
                .await
                .map_err(|source| IngestError {
                    source,
                    stored: Some(outcome.image_path.clone()),
                })?;
        }
        outcome.retargeted = patched.applied.iter().any(|key| key == IMAGE_KEY);
    }
    Ok(outcome)
}

/// Current document and its patched form, or `None` when the upload does not
/// touch the document.
async fn retargeted_document(
    session: &EditSession<'_>,
    target_section: Option<&str>,
    image_path: &str,
) -> Result<Option<(String, PatchOutcome)>, SiteError> {
    let Some(section) = target_section.and_then(|s| s.parse::<Section>().ok()) else {
        return Ok(None);
    };
    if locators::image_locator(section).is_none() {
        return Ok(None);
    }
    if !session.document_exists() {
        warn!("Document missing, {section} image reference not updated");
        return Ok(None);
    }

    let document = session.read_document().await?;
    let mut payload = Map::new();
    payload.insert(IMAGE_KEY.to_string(), Value::String(image_path.to_string()));
    let patched = patcher::patch_section(&document, section, &payload)?;
    Ok(Some((document, patched)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::site::markup::Markup;
    use crate::testing::{fixture_site as site, FIXTURE};

    fn hero_src(document: &str) -> String {
        let markup = Markup::parse(document);
        let img = markup
            .select_first(None, &"#trainer-image".parse().unwrap())
            .unwrap();
        markup.element(img).attribute("src").unwrap().value.clone().unwrap()
    }

    #[test]
    fn storage_name_keeps_plain_names() {
        assert_eq!(storage_name("logo.png").unwrap(), "logo.png");
        assert_eq!(storage_name("my photo (1).JPG").unwrap(), "my photo (1).JPG");
    }

    #[test]
    fn storage_name_strips_directories() {
        assert_eq!(storage_name("../../etc/passwd").unwrap(), "passwd");
        assert_eq!(storage_name("C:\\Users\\me\\hero.jpg").unwrap(), "hero.jpg");
    }

    #[test]
    fn storage_name_rejects_empty_and_dot_names() {
        for bad in ["", "..", ".", "images/", "  "] {
            let err = storage_name(bad).unwrap_err();
            assert!(err.is_validation(), "{bad:?} accepted");
        }
    }

    #[actix_web::test]
    async fn hero_upload_retargets_the_trainer_image() {
        let (dir, repo) = site();
        let session = repo.edit().await;
        let outcome = ingest(&session, b"png".to_vec(), "logo.png", Some("hero"))
            .await
            .unwrap();
        drop(session);

        assert_eq!(outcome.image_path, "images/logo.png");
        assert!(outcome.retargeted);
        assert_eq!(std::fs::read(dir.path().join("images/logo.png")).unwrap(), b"png");
        let document = std::fs::read_to_string(dir.path().join("index.html")).unwrap();
        assert_eq!(hero_src(&document), "images/logo.png");
        assert_eq!(
            document.replace("images/logo.png", "images/trainer.jpg"),
            FIXTURE
        );
    }

    #[actix_web::test]
    async fn upload_without_section_leaves_the_document_alone() {
        let (dir, repo) = site();
        let session = repo.edit().await;
        let outcome = ingest(&session, vec![0; 4], "logo.png", None).await.unwrap();
        drop(session);

        assert!(!outcome.retargeted);
        assert!(dir.path().join("images/logo.png").is_file());
        let document = std::fs::read_to_string(dir.path().join("index.html")).unwrap();
        assert_eq!(document, FIXTURE);
    }

    #[actix_web::test]
    async fn sections_without_image_locator_only_store_the_file() {
        let (dir, repo) = site();
        let session = repo.edit().await;
        for section in ["services", "favicon"] {
            let outcome = ingest(&session, vec![1], "card.png", Some(section)).await.unwrap();
            assert!(!outcome.retargeted);
        }
        drop(session);
        let document = std::fs::read_to_string(dir.path().join("index.html")).unwrap();
        assert_eq!(document, FIXTURE);
    }

    #[actix_web::test]
    async fn unpatchable_section_stores_nothing() {
        let (dir, repo) = site();
        let stripped = FIXTURE.replace("id=\"hero\"", "id=\"banner\"");
        std::fs::write(dir.path().join("index.html"), &stripped).unwrap();

        let session = repo.edit().await;
        let err = ingest(&session, b"png".to_vec(), "logo.png", Some("hero"))
            .await
            .unwrap_err();
        drop(session);

        assert!(matches!(err.source, SiteError::Patch(_)));
        assert_eq!(err.stored, None);
        assert!(!dir.path().join("images/logo.png").exists());
        assert_eq!(
            std::fs::read_to_string(dir.path().join("index.html")).unwrap(),
            stripped
        );
    }

    #[actix_web::test]
    async fn traversal_names_stay_inside_the_asset_directory() {
        let (dir, repo) = site();
        let session = repo.edit().await;
        let outcome = ingest(&session, vec![1], "../index.html", None).await.unwrap();
        drop(session);
        assert_eq!(outcome.image_path, "images/index.html");
        assert_eq!(
            std::fs::read_to_string(dir.path().join("index.html")).unwrap(),
            FIXTURE
        );
    }
}
