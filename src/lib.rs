//! Template-driven PDF generation.
//!
//! A JSON template names a document setup and a list of pages. Each page has
//! an optional background (a raster image or a page of another PDF) and a
//! list of directives that place text, inline markup, images, rules and
//! boxes. Directive text may carry `{path.to.field}` placeholders that are
//! filled from a JSON data payload.

mod assets;
mod background;
mod canvas;
mod compositor;
mod debug;
mod directive;
mod doc_context;
mod document;
mod error;
mod finalize;
mod font;
mod hooks;
mod html;
mod marks;
mod metrics;
mod output;
mod pdf;
mod template;
mod types;
mod variables;
mod wrap;

pub use background::BackgroundKind;
pub use canvas::{Canvas, Command, Document, Page, PageBreak};
pub use directive::Directive;
pub use doc_context::DocContext;
pub use document::{DocumentMetadata, DocumentSetup, RenderContext};
pub use error::{LeniencyPolicy, Result, StencilError};
pub use font::{FontFace, FontRegistry, FontStyle, TextMeasure};
pub use hooks::{FnPageHooks, OnPageCallback, PageHooks};
pub use metrics::{PageReport, RenderReport, RenderWarning};
pub use output::{Delivery, OutputMode};
pub use template::{
    ContentEntry, DirectiveSpec, DocumentInfo, PageSpec, TemplateSettings, TemplateSource,
};
pub use types::{Color, Margins, Orientation, PageFormat, Pt, Size, Units};
pub use variables::{DottedPathEngine, Substitute};

use compositor::Compositor;
use debug::DebugLogger;
use marks::MarkResolver;
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use variables::VariableRenderer;

const DEFAULT_CREATOR: &str = "pdf-stencil";

/// A finished document and what happened while producing it.
#[derive(Debug, Clone)]
pub struct GeneratedPdf {
    pub bytes: Vec<u8>,
    pub report: RenderReport,
}

/// Renders templates against data payloads. Immutable after
/// [`PdfGeneratorBuilder::build`]; share it freely between threads.
pub struct PdfGenerator {
    fonts: Arc<FontRegistry>,
    variables: VariableRenderer,
    marks: MarkResolver,
    asset_policy: LeniencyPolicy,
    hooks: Option<Arc<dyn PageHooks>>,
    creator: String,
    debug: Option<DebugLogger>,
}

impl std::fmt::Debug for PdfGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfGenerator")
            .field("fonts", &self.fonts)
            .field("variable_policy", &self.variables.policy())
            .field("mark_dir", &self.marks.dir())
            .field("asset_policy", &self.asset_policy)
            .field("hooks", &self.hooks.is_some())
            .field("creator", &self.creator)
            .field("debug", &self.debug.is_some())
            .finish()
    }
}

impl PdfGenerator {
    pub fn builder() -> PdfGeneratorBuilder {
        PdfGeneratorBuilder::new()
    }

    pub fn fonts(&self) -> &FontRegistry {
        &self.fonts
    }

    pub fn render(&self, source: impl Into<TemplateSource>, data: &Value) -> Result<GeneratedPdf> {
        let started = Instant::now();
        let template = template::load(source.into())?;
        let setup = DocumentSetup::from_info(&template.settings.info, Some(self.creator.as_str()))?;
        let compositor = Compositor {
            setup: &setup,
            template_dir: template.template_dir.as_deref(),
            fonts: &self.fonts,
            variables: &self.variables,
            marks: &self.marks,
            asset_policy: self.asset_policy,
            debug: self.debug.as_ref(),
        };
        let composition = compositor.compose(&template.settings.pages, data, self.hooks.clone())?;

        let bytes = pdf::document_to_pdf(
            &composition.document,
            &composition.images,
            &self.fonts,
            &setup.metadata,
        )?;
        let (bytes, imported) = finalize::import_background_pages(bytes, &composition.document)?;

        let mut report = composition.report;
        report.total_bytes = bytes.len();
        log::debug!(
            "rendered {} pages ({} bytes, {} imported backgrounds) in {:.1}ms",
            report.output_pages,
            report.total_bytes,
            imported.pages_stamped,
            started.elapsed().as_secs_f64() * 1000.0
        );
        self.emit_debug_summary(&report, imported.forms_created);
        Ok(GeneratedPdf { bytes, report })
    }

    /// Renders, then hands the bytes over as `mode` asks. `name` is the
    /// download file name and, for the saving modes, the destination path.
    pub fn generate(
        &self,
        source: impl Into<TemplateSource>,
        data: &Value,
        name: &str,
        mode: OutputMode,
    ) -> Result<Delivery> {
        let generated = self.render(source, data)?;
        output::deliver(generated.bytes, name, mode)
    }

    fn emit_debug_summary(&self, report: &RenderReport, forms_created: usize) {
        let Some(logger) = &self.debug else {
            return;
        };
        logger.log_event(
            "document.finish",
            json!({
                "output_pages": report.output_pages,
                "commands": report.command_count,
                "warnings": report.warnings.len(),
                "bytes": report.total_bytes,
                "imported_forms": forms_created,
                "render_ms": report.total_render_ms,
            }),
        );
        logger.increment("documents", 1);
        logger.increment("bytes", report.total_bytes as u64);
        logger.emit_summary("render");
        logger.flush();
    }
}

/// Configuration for a [`PdfGenerator`].
#[derive(Clone)]
pub struct PdfGeneratorBuilder {
    font_files: Vec<PathBuf>,
    font_dirs: Vec<PathBuf>,
    mark_dir: Option<PathBuf>,
    variable_policy: LeniencyPolicy,
    asset_policy: LeniencyPolicy,
    engine: Arc<dyn Substitute>,
    hooks: Option<Arc<dyn PageHooks>>,
    creator: String,
    debug_log: Option<PathBuf>,
}

impl Default for PdfGeneratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PdfGeneratorBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfGeneratorBuilder")
            .field("font_files", &self.font_files)
            .field("font_dirs", &self.font_dirs)
            .field("mark_dir", &self.mark_dir)
            .field("variable_policy", &self.variable_policy)
            .field("asset_policy", &self.asset_policy)
            .field("hooks", &self.hooks.is_some())
            .field("creator", &self.creator)
            .field("debug_log", &self.debug_log)
            .finish()
    }
}

impl PdfGeneratorBuilder {
    pub fn new() -> Self {
        Self {
            font_files: Vec::new(),
            font_dirs: Vec::new(),
            mark_dir: None,
            variable_policy: LeniencyPolicy::Lenient,
            asset_policy: LeniencyPolicy::Lenient,
            engine: Arc::new(DottedPathEngine),
            hooks: None,
            creator: DEFAULT_CREATOR.to_string(),
            debug_log: None,
        }
    }

    /// Registers a TrueType/OpenType face under its family name.
    pub fn font_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.font_files.push(path.into());
        self
    }

    /// Registers every `.ttf`/`.otf` file directly inside `path`.
    pub fn font_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.font_dirs.push(path.into());
        self
    }

    /// Directory of images `box_x` cells draw from.
    pub fn mark_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.mark_dir = Some(path.into());
        self
    }

    pub fn variable_policy(mut self, policy: LeniencyPolicy) -> Self {
        self.variable_policy = policy;
        self
    }

    /// Applies to backgrounds and images.
    pub fn asset_policy(mut self, policy: LeniencyPolicy) -> Self {
        self.asset_policy = policy;
        self
    }

    pub fn substitution_engine(mut self, engine: impl Substitute + 'static) -> Self {
        self.engine = Arc::new(engine);
        self
    }

    pub fn page_hooks(mut self, hooks: impl PageHooks + 'static) -> Self {
        self.hooks = Some(Arc::new(hooks));
        self
    }

    pub fn creator(mut self, creator: impl Into<String>) -> Self {
        self.creator = creator.into();
        self
    }

    /// Writes JSONL debug events to `path`.
    pub fn debug_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.debug_log = Some(path.into());
        self
    }

    pub fn build(self) -> Result<PdfGenerator> {
        let mut fonts = FontRegistry::new();
        for dir in &self.font_dirs {
            let count = fonts.register_dir(dir)?;
            log::debug!("registered {count} fonts from {}", dir.display());
        }
        for file in &self.font_files {
            let family = fonts.register_file(file)?;
            log::debug!("registered font {family} from {}", file.display());
        }
        if let Some(dir) = &self.mark_dir {
            if !dir.is_dir() {
                return Err(StencilError::InvalidConfiguration(format!(
                    "mark directory {} is not a directory",
                    dir.display()
                )));
            }
        }
        let debug = match &self.debug_log {
            Some(path) => Some(DebugLogger::new(path)?),
            None => None,
        };
        Ok(PdfGenerator {
            fonts: Arc::new(fonts),
            variables: VariableRenderer::new(self.engine, self.variable_policy),
            marks: MarkResolver::new(self.mark_dir),
            asset_policy: self.asset_policy,
            hooks: self.hooks,
            creator: self.creator,
            debug,
        })
    }
}
