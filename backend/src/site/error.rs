use std::path::PathBuf;

/// Failures while applying a payload to the page.
///
/// Every variant aborts the whole section: the document text handed to the
/// patcher is never modified, so the caller can report the error and leave
/// the file on disk as it was.
#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    #[error("section '{section}' not found in document (expected '{selector}')")]
    SectionMissing {
        section: String,
        selector: &'static str,
    },

    #[error("list container '{selector}' of section '{section}' not found")]
    ListContainerMissing {
        section: String,
        selector: &'static str,
    },

    #[error("invalid {section} entry at position {index}: {reason}")]
    InvalidItem {
        section: String,
        index: usize,
        reason: String,
    },

    #[error("'{0}' must be a list")]
    NotAList(String),

    #[error("locator error: {0}")]
    Locator(#[from] crate::site::markup::SelectorError),

    #[error("overlapping edits for keys '{0}' and '{1}'")]
    OverlappingEdits(String, String),
}

#[derive(Debug, thiserror::Error)]
pub enum SiteError {
    /// Missing or unusable request input. The only variant answered with 400.
    #[error("{0}")]
    Validation(String),

    #[error("{} not found", .0.display())]
    NotFound(PathBuf),

    #[error("repository root {} is not a directory", .0.display())]
    NotConfigured(PathBuf),

    #[error(transparent)]
    Patch(#[from] PatchError),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SiteError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SiteError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, SiteError::Validation(_))
    }
}
