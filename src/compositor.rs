use crate::assets::{self, AssetKind, ImageStore};
use crate::background::{BackgroundOutcome, BackgroundResolver};
use crate::canvas::{Canvas, Document};
use crate::debug::DebugLogger;
use crate::directive::{Directive, parse_entry};
use crate::document::DocumentSetup;
use crate::error::{LeniencyPolicy, Result, StencilError};
use crate::font::{FontFace, FontRegistry};
use crate::hooks::PageHooks;
use crate::html::{LINE_HEIGHT_RATIO, draw_decorations, draw_html};
use crate::marks::MarkResolver;
use crate::metrics::{PageReport, RenderReport, RenderWarning};
use crate::template::PageSpec;
use crate::types::Pt;
use crate::variables::VariableRenderer;
use crate::wrap::wrap;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Points per millimetre, the divisor of the text line-advance rule.
const LINE_ADVANCE_DIVISOR: f32 = 2.834;
/// Line advance in user units when the font size is zero.
const DEFAULT_LINE_ADVANCE: f32 = 4.0;
/// Pixels per point when an image box is derived from the pixel size.
const IMAGE_SCALE_RATIO: f32 = 1.25;
/// Side of `box`/`box_x` cells, in user units.
const BOX_SIDE: f32 = 3.0;
const BOX_FONT_SIZE: f32 = 8.0;
/// 0.2 mm.
const RULE_WIDTH: f32 = 0.567;

/// Everything the page loop produced, ready for serialization.
#[derive(Debug)]
pub struct Composition {
    pub document: Document,
    pub images: ImageStore,
    pub report: RenderReport,
}

/// Draws template pages onto a canvas. Holds only borrowed, read-only
/// collaborators; all per-document state lives in [`Compose`].
pub struct Compositor<'a> {
    pub(crate) setup: &'a DocumentSetup,
    pub(crate) template_dir: Option<&'a Path>,
    pub(crate) fonts: &'a FontRegistry,
    pub(crate) variables: &'a VariableRenderer,
    pub(crate) marks: &'a MarkResolver,
    pub(crate) asset_policy: LeniencyPolicy,
    pub(crate) debug: Option<&'a DebugLogger>,
}

impl<'a> Compositor<'a> {
    pub fn compose(
        &self,
        pages: &[PageSpec],
        data: &Value,
        hooks: Option<Arc<dyn PageHooks>>,
    ) -> Result<Composition> {
        let mut state = Compose {
            canvas: self.setup.open_canvas(hooks),
            images: ImageStore::new(),
            report: RenderReport::default(),
            page: 0,
        };
        for (index, page) in pages.iter().enumerate() {
            let started = Instant::now();
            state.page = index + 1;
            let pages_before = state.canvas.page_number();
            state.canvas.add_page();
            self.log_event("page.start", json!({ "page": state.page }));

            let outcome = BackgroundResolver::new(self.template_dir, self.asset_policy).place(
                &mut state.canvas,
                page,
                &mut state.images,
            )?;
            self.record_background(&mut state, &outcome);

            let mut directive_count = 0usize;
            for entry in &page.data {
                for directive in parse_entry(entry, &self.setup.context)? {
                    log::debug!("page {}: {} directive", state.page, directive.kind());
                    self.log_event(
                        "directive",
                        json!({ "page": state.page, "kind": directive.kind() }),
                    );
                    self.draw(&mut state, &directive, data)?;
                    directive_count += 1;
                }
            }

            let render_ms = started.elapsed().as_secs_f64() * 1000.0;
            state.report.pages.push(PageReport {
                page_number: state.page,
                background: outcome.kind(),
                directive_count,
                output_pages: state.canvas.page_number() - pages_before,
                render_ms,
            });
            if let Some(debug) = self.debug {
                debug.increment("pages", 1);
                debug.increment("directives", directive_count as u64);
            }
        }

        let document = state.canvas.finish();
        let mut report = state.report;
        report.output_pages = document.pages.len();
        report.command_count = document.pages.iter().map(|page| page.commands.len()).sum();
        report.total_render_ms = report.pages.iter().map(|page| page.render_ms).sum();
        Ok(Composition {
            document,
            images: state.images,
            report,
        })
    }

    fn record_background(&self, state: &mut Compose, outcome: &BackgroundOutcome) {
        let warning = match outcome {
            BackgroundOutcome::Absent => return,
            BackgroundOutcome::Placed(kind) => {
                self.log_event("page.background", json!({ "page": state.page, "background": kind }));
                return;
            }
            BackgroundOutcome::Missing(asset) => RenderWarning::MissingAsset {
                page: state.page,
                asset: asset.clone(),
            },
            BackgroundOutcome::Unsupported(asset) => RenderWarning::UnsupportedAsset {
                page: state.page,
                asset: asset.clone(),
            },
        };
        self.warn(state, warning);
    }

    fn draw(&self, state: &mut Compose, directive: &Directive, data: &Value) -> Result<()> {
        match directive {
            Directive::Text {
                x,
                y,
                text,
                face,
                max_width,
            } => self.draw_text(state, *x, *y, text, face, *max_width, data),
            Directive::Image { x, y, path, w, h } => self.draw_image(state, *x, *y, path, *w, *h, data),
            Directive::Html {
                x,
                y,
                markup,
                face,
                w,
                h,
            } => self.draw_markup(state, *x, *y, markup, face, *w, *h, data),
            Directive::Line { x1, y1, x2, y2 } => {
                let canvas = &mut state.canvas;
                canvas.set_line_width(Pt::from_f32(RULE_WIDTH));
                canvas.draw_line(
                    self.setup.to_pt(*x1),
                    self.setup.to_pt(*y1),
                    self.setup.to_pt(*x2),
                    self.setup.to_pt(*y2),
                );
                Ok(())
            }
            Directive::Box { x, y } => {
                self.draw_box(state, *x, *y);
                Ok(())
            }
            Directive::BoxMark { x, y, position } => {
                let mark = self.marks.pick(*position)?;
                let (left, top, side) = self.draw_box(state, *x, *y);
                let data = std::fs::read(&mark)?;
                let (id, _, _) = state.images.insert(&data)?;
                state.canvas.draw_image(left, top, side, side, id);
                Ok(())
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_text(
        &self,
        state: &mut Compose,
        x: f32,
        y: f32,
        text: &str,
        face: &FontFace,
        max_width: Option<f32>,
        data: &Value,
    ) -> Result<()> {
        let rendered = self.render_variables(state, text, data)?;
        let font = self.resolve_font(state, face);
        let size = face.size_pt();

        // The whole-text fallback of `wrap` may still hold newlines.
        let lines: Vec<String> = match max_width.map(|w| self.setup.to_pt(w)) {
            Some(limit) if self.fonts.measure(&font, size, &rendered) > limit => {
                wrap(&rendered, face, limit, self.fonts)
                    .iter()
                    .flat_map(|line| split_lines(line))
                    .collect()
            }
            _ => split_lines(&rendered).collect(),
        };

        let advance = if face.size > 0.0 {
            (face.size / LINE_ADVANCE_DIVISOR).ceil()
        } else {
            DEFAULT_LINE_ADVANCE
        };
        let advance = self.setup.to_pt(advance);
        let left = self.setup.to_pt(x);
        let mut top = self.setup.to_pt(y);
        for line in lines {
            top = state.canvas.ensure_room(top, size * LINE_HEIGHT_RATIO);
            state.canvas.set_font_name(&font);
            state.canvas.set_font_size(size);
            if face.style.underline || face.style.strikethrough {
                let width = self.fonts.measure(&font, size, &line);
                draw_decorations(&mut state.canvas, self.fonts, &font, size, face.style, left, top, width);
            }
            state.canvas.draw_string(left, top, line);
            top += advance;
        }
        state.canvas.set_xy(left, top);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_image(
        &self,
        state: &mut Compose,
        x: f32,
        y: f32,
        path: &str,
        w: f32,
        h: f32,
        data: &Value,
    ) -> Result<()> {
        let name = self.render_variables(state, path, data)?;
        let asset = match assets::load(self.template_dir, &name) {
            Ok(asset) => asset,
            Err(StencilError::MissingAsset(_)) if !self.asset_policy.is_strict() => {
                let warning = RenderWarning::MissingAsset {
                    page: state.page,
                    asset: name,
                };
                self.warn(state, warning);
                return Ok(());
            }
            Err(err) => return Err(err),
        };
        if !matches!(asset.kind, AssetKind::Image(_)) {
            if self.asset_policy.is_strict() {
                return Err(StencilError::MissingAsset(PathBuf::from(&name)));
            }
            let warning = RenderWarning::UnsupportedAsset {
                page: state.page,
                asset: asset.name,
            };
            self.warn(state, warning);
            return Ok(());
        }

        let (id, pixel_width, pixel_height) = state.images.insert(&asset.data)?;
        let (width, height) = image_box(
            self.setup.to_pt(w),
            self.setup.to_pt(h),
            pixel_width,
            pixel_height,
        );
        let left = self.setup.to_pt(x);
        let top = state
            .canvas
            .place_image(left, self.setup.to_pt(y), width, height, id);
        state.canvas.set_xy(left, top + height);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_markup(
        &self,
        state: &mut Compose,
        x: f32,
        y: f32,
        markup: &str,
        face: &FontFace,
        w: f32,
        h: f32,
        data: &Value,
    ) -> Result<()> {
        let rendered = self.render_variables(state, markup, data)?;
        let markup = rendered.replace('\n', "<br/>");
        let left = self.setup.to_pt(x);
        let top = self.setup.to_pt(y);
        let page_width = state.canvas.page_size().width;
        let right_edge = page_width - state.canvas.margins().right;
        let width = if w > 0.0 {
            self.setup.to_pt(w)
        } else {
            right_edge - left
        };
        let width = width.max(Pt::from_f32(1.0));

        let layout = draw_html(&mut state.canvas, self.fonts, &markup, face, left, top, width);
        for family in layout.fallback_families {
            let warning = RenderWarning::FontFallback {
                page: state.page,
                family,
            };
            self.warn(state, warning);
        }
        let bottom = layout.bottom.max(top + self.setup.to_pt(h));
        state.canvas.set_xy(left, bottom);
        Ok(())
    }

    /// Bordered `box`/`box_x` cell one unit right of and below (`x`, `y`).
    /// Returns its top-left corner and side in points.
    fn draw_box(&self, state: &mut Compose, x: f32, y: f32) -> (Pt, Pt, Pt) {
        let left = self.setup.to_pt(x + 1.0);
        let top = self.setup.to_pt(y + 1.0);
        let side = self.setup.to_pt(BOX_SIDE);
        let canvas = &mut state.canvas;
        canvas.set_xy(left, top);
        canvas.set_font_size(Pt::from_f32(BOX_FONT_SIZE));
        canvas.set_line_width(Pt::from_f32(RULE_WIDTH));
        canvas.stroke_rect(left, top, side, side);
        (left, top, side)
    }

    fn render_variables(&self, state: &mut Compose, template: &str, data: &Value) -> Result<String> {
        let rendered = self.variables.render(template, data)?;
        if !rendered.unresolved.is_empty() {
            let warning = RenderWarning::UnresolvedVariables {
                page: state.page,
                names: rendered.unresolved,
            };
            state.report.warnings.push(warning.clone());
            self.log_warning(&warning);
        }
        Ok(rendered.text)
    }

    fn resolve_font(&self, state: &mut Compose, face: &FontFace) -> String {
        let resolved = self.fonts.resolve(&face.family, face.style);
        if resolved.fallback {
            let warning = RenderWarning::FontFallback {
                page: state.page,
                family: face.family.clone(),
            };
            self.warn(state, warning);
        }
        resolved.name
    }

    fn warn(&self, state: &mut Compose, warning: RenderWarning) {
        self.log_warning(&warning);
        state.report.warn(warning);
    }

    fn log_warning(&self, warning: &RenderWarning) {
        if let Some(debug) = self.debug {
            debug.increment("warnings", 1);
            debug.log_event("warning", json!(warning));
        }
    }

    fn log_event(&self, event: &str, fields: Value) {
        if let Some(debug) = self.debug {
            debug.log_event(event, fields);
        }
    }
}

/// Per-document mutable state of one `compose` run.
struct Compose {
    canvas: Canvas,
    images: ImageStore,
    report: RenderReport,
    /// 1-based template page being drawn.
    page: usize,
}

/// Fills in a zero width or height from the pixel size: both zero gives
/// the pixel size at the image scale ratio, one zero keeps the aspect
/// ratio.
fn split_lines(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split('\n')
        .map(|line| line.trim_end_matches('\r').to_string())
}

fn image_box(width: Pt, height: Pt, pixel_width: u32, pixel_height: u32) -> (Pt, Pt) {
    let natural_w = Pt::from_f32(pixel_width as f32 / IMAGE_SCALE_RATIO);
    let natural_h = Pt::from_f32(pixel_height as f32 / IMAGE_SCALE_RATIO);
    let px_w = pixel_width.max(1) as f32;
    let px_h = pixel_height.max(1) as f32;
    match (width == Pt::ZERO, height == Pt::ZERO) {
        (true, true) => (natural_w, natural_h),
        (true, false) => (height * (px_w / px_h), height),
        (false, true) => (width, width * (px_h / px_w)),
        (false, false) => (width, height),
    }
}
