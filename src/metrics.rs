use crate::background::BackgroundKind;
use serde::Serialize;
use std::fmt;

/// A condition the lenient policy turned into a warning instead of an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RenderWarning {
    MissingAsset { page: usize, asset: String },
    UnsupportedAsset { page: usize, asset: String },
    UnresolvedVariables { page: usize, names: Vec<String> },
    FontFallback { page: usize, family: String },
}

impl fmt::Display for RenderWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderWarning::MissingAsset { page, asset } => {
                write!(f, "page {page}: asset not found: {asset}")
            }
            RenderWarning::UnsupportedAsset { page, asset } => {
                write!(f, "page {page}: asset is neither a PDF nor an image: {asset}")
            }
            RenderWarning::UnresolvedVariables { page, names } => {
                write!(f, "page {page}: unresolved variables: {}", names.join(", "))
            }
            RenderWarning::FontFallback { page, family } => {
                write!(f, "page {page}: unknown font `{family}`, using Helvetica")
            }
        }
    }
}

/// Counters for one template page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageReport {
    /// 1-based index of the template page.
    pub page_number: usize,
    pub background: Option<BackgroundKind>,
    pub directive_count: usize,
    /// Output pages this template page produced, auto breaks included.
    pub output_pages: usize,
    pub render_ms: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderReport {
    pub pages: Vec<PageReport>,
    pub warnings: Vec<RenderWarning>,
    pub output_pages: usize,
    pub command_count: usize,
    pub total_render_ms: f64,
    pub total_bytes: usize,
}

impl RenderReport {
    pub fn warn(&mut self, warning: RenderWarning) {
        log::warn!("{warning}");
        self.warnings.push(warning);
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}
