use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StencilError>;

#[derive(Debug, Error)]
pub enum StencilError {
    #[error("template parse error: {0}")]
    TemplateParse(String),
    #[error("invalid directive `{entry}`: {reason}")]
    Directive { entry: String, reason: String },
    #[error("asset not found: {}", .0.display())]
    MissingAsset(PathBuf),
    #[error("unresolved template variable: {0}")]
    UnresolvedVariable(String),
    #[error("cannot enumerate mark images in {}: {reason}", .dir.display())]
    AssetEnumeration { dir: PathBuf, reason: String },
    #[error("image error: {0}")]
    Image(String),
    #[error("font error: {0}")]
    Font(String),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("pdf error: {0}")]
    Pdf(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StencilError {
    pub(crate) fn directive(entry: &str, reason: impl Into<String>) -> Self {
        StencilError::Directive {
            entry: entry.to_string(),
            reason: reason.into(),
        }
    }

    /// Fatal errors abort the document; everything else may be downgraded
    /// to a warning by a lenient policy.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            StencilError::MissingAsset(_) | StencilError::UnresolvedVariable(_)
        )
    }
}

/// How non-fatal conditions (missing assets, unresolved variables) are
/// treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LeniencyPolicy {
    /// Skip or blank, and record a warning.
    #[default]
    Lenient,
    /// Fail the document.
    Strict,
}

impl LeniencyPolicy {
    pub fn is_strict(self) -> bool {
        self == LeniencyPolicy::Strict
    }
}

impl From<lopdf::Error> for StencilError {
    fn from(value: lopdf::Error) -> Self {
        match value {
            lopdf::Error::IO(err) => StencilError::Io(err),
            other => StencilError::Pdf(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for StencilError {
    fn from(value: serde_json::Error) -> Self {
        StencilError::TemplateParse(value.to_string())
    }
}
