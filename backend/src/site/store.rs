//! On-disk layout of the published site and the lock that guards it.
//!
//! A `SiteRepository` is created once per repository root. Every mutation of
//! the document, the asset directory or the git working tree happens inside
//! an `EditSession`, which holds the repository's mutex for its lifetime, so
//! overlapping requests queue instead of interleaving reads and writes.

use crate::site::error::SiteError;
use log::info;
use std::fs::Permissions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::sync::{Mutex, MutexGuard};

#[derive(Debug)]
pub struct SiteRepository {
    root: PathBuf,
    document: PathBuf,
    assets: PathBuf,
    lock: Mutex<()>,
}

impl SiteRepository {
    /// Resolves the document and asset paths under `root`.
    ///
    /// Fails when the root is not an existing directory. The asset directory
    /// is created if missing; the document is not, it is checked per request.
    pub fn open(root: &Path, document_name: &str, assets_dir: &str) -> Result<Self, SiteError> {
        if !root.is_dir() {
            return Err(SiteError::NotConfigured(root.to_path_buf()));
        }
        let assets = root.join(assets_dir);
        if !assets.is_dir() {
            std::fs::create_dir_all(&assets).map_err(|e| SiteError::io(&assets, e))?;
            info!("Created asset directory {}", assets.display());
        }
        Ok(SiteRepository {
            root: root.to_path_buf(),
            document: root.join(document_name),
            assets,
            lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn document_path(&self) -> &Path {
        &self.document
    }

    pub fn assets_dir(&self) -> &Path {
        &self.assets
    }

    /// Waits for exclusive access to the repository.
    pub async fn edit(&self) -> EditSession<'_> {
        EditSession {
            repo: self,
            _guard: self.lock.lock().await,
        }
    }

    #[cfg(test)]
    pub fn is_locked(&self) -> bool {
        self.lock.try_lock().is_err()
    }
}

/// Exclusive access to one repository.
pub struct EditSession<'a> {
    repo: &'a SiteRepository,
    _guard: MutexGuard<'a, ()>,
}

impl EditSession<'_> {
    pub fn repository(&self) -> &SiteRepository {
        self.repo
    }

    pub fn document_exists(&self) -> bool {
        self.repo.document.is_file()
    }

    pub async fn read_document(&self) -> Result<String, SiteError> {
        let path = &self.repo.document;
        match tokio::fs::read_to_string(path).await {
            Ok(contents) => Ok(contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(SiteError::NotFound(path.clone()))
            }
            Err(e) => Err(SiteError::io(path, e)),
        }
    }

    /// Replaces the document in one rename so readers never see a partial file.
    pub async fn write_document(&self, contents: &str) -> Result<(), SiteError> {
        write_atomic(self.repo.document.clone(), contents.as_bytes().to_vec()).await
    }

    /// Writes `bytes` to `<assets>/<file_name>`, overwriting any existing file.
    /// `file_name` must already be a single path component.
    pub async fn write_asset(&self, file_name: &str, bytes: Vec<u8>) -> Result<PathBuf, SiteError> {
        let path = self.repo.assets.join(file_name);
        write_atomic(path.clone(), bytes).await?;
        Ok(path)
    }
}

async fn write_atomic(path: PathBuf, bytes: Vec<u8>) -> Result<(), SiteError> {
    let target = path.clone();
    tokio::task::spawn_blocking(move || {
        let dir = target.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&bytes)?;
        // Temporary files are created 0600.
        if let Some(permissions) = target_permissions(&target)? {
            tmp.as_file().set_permissions(permissions)?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&target).map_err(|e| e.error)?;
        Ok::<_, std::io::Error>(())
    })
    .await
    .map_err(|e| SiteError::io(&path, std::io::Error::other(e.to_string())))?
    .map_err(|e| SiteError::io(&path, e))
}

/// Permissions the written file should end up with: those of the file it
/// replaces, or 0644 for a new file on unix.
fn target_permissions(target: &Path) -> std::io::Result<Option<Permissions>> {
    match std::fs::metadata(target) {
        Ok(meta) => Ok(Some(meta.permissions())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(new_file_permissions()),
        Err(e) => Err(e),
    }
}

#[cfg(unix)]
fn new_file_permissions() -> Option<Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn new_file_permissions() -> Option<Permissions> {
    None
}
