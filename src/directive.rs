use crate::document::RenderContext;
use crate::error::{Result, StencilError};
use crate::font::{FontFace, FontStyle};
use crate::template::{ContentEntry, DirectiveSpec};

/// A parsed content entry. Coordinates and sizes are in the template's user
/// units, font sizes in points.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    Text {
        x: f32,
        y: f32,
        text: String,
        face: FontFace,
        max_width: Option<f32>,
    },
    Image {
        x: f32,
        y: f32,
        path: String,
        w: f32,
        h: f32,
    },
    Html {
        x: f32,
        y: f32,
        markup: String,
        face: FontFace,
        w: f32,
        h: f32,
    },
    Line {
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
    },
    /// An empty bordered cell.
    Box { x: f32, y: f32 },
    /// A bordered cell holding a mark image; `position` picks the image.
    BoxMark {
        x: f32,
        y: f32,
        position: Option<usize>,
    },
}

impl Directive {
    pub fn kind(&self) -> &'static str {
        match self {
            Directive::Text { .. } => "text",
            Directive::Image { .. } => "image",
            Directive::Html { .. } => "html",
            Directive::Line { .. } => "line",
            Directive::Box { .. } => "box",
            Directive::BoxMark { .. } => "box_x",
        }
    }
}

pub fn parse_entry(entry: &ContentEntry, ctx: &RenderContext) -> Result<Vec<Directive>> {
    match entry {
        ContentEntry::Shorthand(raw) => parse_shorthand(raw, ctx).map(|directive| vec![directive]),
        ContentEntry::Spec(spec) => parse_spec(spec, ctx),
    }
}

/// Parses a pipe-delimited entry:
///
/// * `text` – text at the origin
/// * `line|x1|y1|x2|y2`
/// * `box|x|y` and `box_x|x|y[|position]`
/// * `x|y|text[|style[|size[|maxWidth]]]`
pub fn parse_shorthand(raw: &str, ctx: &RenderContext) -> Result<Directive> {
    let fields: Vec<&str> = raw.split('|').collect();
    match fields[0] {
        "line" => {
            if fields.len() != 5 {
                return Err(StencilError::directive(raw, "line expects x1|y1|x2|y2"));
            }
            return Ok(Directive::Line {
                x1: number(raw, "x1", fields[1])?,
                y1: number(raw, "y1", fields[2])?,
                x2: number(raw, "x2", fields[3])?,
                y2: number(raw, "y2", fields[4])?,
            });
        }
        "box" => {
            if fields.len() != 3 {
                return Err(StencilError::directive(raw, "box expects x|y"));
            }
            return Ok(Directive::Box {
                x: number(raw, "x", fields[1])?,
                y: number(raw, "y", fields[2])?,
            });
        }
        "box_x" => {
            if !(3..=4).contains(&fields.len()) {
                return Err(StencilError::directive(raw, "box_x expects x|y[|position]"));
            }
            let position = match fields.get(3).map(|v| v.trim()) {
                None | Some("") => None,
                Some(value) => Some(value.parse::<usize>().map_err(|_| {
                    StencilError::directive(raw, format!("invalid mark position `{value}`"))
                })?),
            };
            return Ok(Directive::BoxMark {
                x: number(raw, "x", fields[1])?,
                y: number(raw, "y", fields[2])?,
                position,
            });
        }
        _ => {}
    }

    match fields.len() {
        1 => Ok(Directive::Text {
            x: 0.0,
            y: 0.0,
            text: fields[0].to_string(),
            face: ctx.default_face(),
            max_width: None,
        }),
        3..=6 => {
            let mut face = ctx.default_face();
            if let Some(style) = fields.get(3).filter(|v| !v.trim().is_empty()) {
                face.style = FontStyle::parse(style);
            }
            if let Some(size) = fields.get(4).filter(|v| !v.trim().is_empty()) {
                if let Some(size) = font_size(raw, number(raw, "size", size)?)? {
                    face.size = size;
                }
            }
            let max_width = match fields.get(5).filter(|v| !v.trim().is_empty()) {
                Some(width) => Some(max_width(raw, number(raw, "maxWidth", width)?)?),
                None => None,
            };
            Ok(Directive::Text {
                x: number(raw, "x", fields[0])?,
                y: number(raw, "y", fields[1])?,
                text: fields[2].to_string(),
                face,
                max_width,
            })
        }
        count => Err(StencilError::directive(
            raw,
            format!("expected 1 or 3 to 6 fields, found {count}"),
        )),
    }
}

/// Object entries yield their text, image and html parts in that order.
pub fn parse_spec(spec: &DirectiveSpec, ctx: &RenderContext) -> Result<Vec<Directive>> {
    let label = spec_label(spec);
    let mut face = ctx.default_face();
    if let Some(family) = &spec.font {
        face.family = family.clone();
    }
    if let Some(style) = &spec.font_style {
        face.style = FontStyle::parse(style);
    }
    if let Some(size) = spec.font_size {
        if let Some(size) = font_size(&label, size)? {
            face.size = size;
        }
    }
    let max_width = match spec.max_width {
        Some(width) => Some(max_width(&label, width)?),
        None => None,
    };

    let mut out = Vec::new();
    if let Some(text) = &spec.text {
        out.push(Directive::Text {
            x: spec.x,
            y: spec.y,
            text: text.clone(),
            face: face.clone(),
            max_width,
        });
    }
    if let Some(path) = &spec.image {
        out.push(Directive::Image {
            x: spec.x,
            y: spec.y,
            path: path.clone(),
            w: spec.w.unwrap_or(0.0),
            h: spec.h.unwrap_or(0.0),
        });
    }
    if let Some(markup) = &spec.html {
        out.push(Directive::Html {
            x: spec.x,
            y: spec.y,
            markup: markup.clone(),
            face,
            w: spec.w.unwrap_or(0.0),
            h: spec.h.unwrap_or(0.0),
        });
    }
    if out.is_empty() {
        log::debug!("entry {label} has no text, image or html");
    }
    Ok(out)
}

fn number(entry: &str, field: &str, raw: &str) -> Result<f32> {
    let raw = raw.trim();
    match raw.parse::<f32>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(StencilError::directive(
            entry,
            format!("{field} must be a number, found `{raw}`"),
        )),
    }
}

/// Zero means "not set".
fn font_size(entry: &str, size: f32) -> Result<Option<f32>> {
    if size < 0.0 {
        return Err(StencilError::directive(
            entry,
            format!("font size must be positive, found {size}"),
        ));
    }
    Ok((size > 0.0).then_some(size))
}

fn max_width(entry: &str, width: f32) -> Result<f32> {
    if width <= 0.0 {
        return Err(StencilError::directive(
            entry,
            format!("max width must be positive, found {width}"),
        ));
    }
    Ok(width)
}

fn spec_label(spec: &DirectiveSpec) -> String {
    format!("{{x: {}, y: {}}}", spec.x, spec.y)
}
