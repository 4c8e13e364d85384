use crate::canvas::{Canvas, PageBreak};
use crate::error::{Result, StencilError};
use crate::font::{FontFace, FontStyle};
use crate::hooks::PageHooks;
use crate::template::DocumentInfo;
use crate::types::{Margins, Orientation, Pt, Size, Units};
use std::sync::Arc;

/// Per-call font defaults threaded through parsing and compositing.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderContext {
    pub default_font: String,
    pub default_size: f32,
    pub default_style: FontStyle,
}

impl RenderContext {
    pub fn new(default_font: impl Into<String>, default_size: f32, default_style: FontStyle) -> Self {
        Self {
            default_font: default_font.into(),
            default_size,
            default_style,
        }
    }

    pub fn from_info(info: &DocumentInfo) -> Self {
        Self::new(
            info.default_font(),
            info.default_font_size(),
            FontStyle::parse(info.default_font_style()),
        )
    }

    pub fn default_face(&self) -> FontFace {
        FontFace::new(self.default_font.clone(), self.default_style, self.default_size)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<String>,
    pub creator: Option<String>,
}

/// Page geometry, break policy and metadata derived from a template's
/// `info` block.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSetup {
    pub units: Units,
    pub page_size: Size,
    pub margins: Margins,
    pub page_break: PageBreak,
    pub metadata: DocumentMetadata,
    pub context: RenderContext,
}

impl DocumentSetup {
    pub fn from_info(info: &DocumentInfo, creator: Option<&str>) -> Result<Self> {
        let units = info.page_units;
        let format_size = info.page_format.size();
        let page_size = match info.page_orientation {
            Orientation::Portrait => format_size.portrait(),
            Orientation::Landscape => format_size.landscape(),
        };

        let lengths = [
            ("left-margin", info.left_margin()),
            ("top-margin", info.top_margin()),
            ("right-margin", info.right_margin()),
            ("bottom-margin", info.bottom_margin()),
        ];
        for (name, value) in lengths {
            if !value.is_finite() || value < 0.0 {
                return Err(StencilError::InvalidConfiguration(format!(
                    "{name} must be a non-negative number, found {value}"
                )));
            }
        }
        let margins = Margins {
            top: units.to_pt(info.top_margin()),
            right: units.to_pt(info.right_margin()),
            bottom: units.to_pt(info.bottom_margin()),
            left: units.to_pt(info.left_margin()),
        };
        if margins.left + margins.right >= page_size.width {
            return Err(StencilError::InvalidConfiguration(
                "horizontal margins leave no room on the page".to_string(),
            ));
        }

        Ok(Self {
            units,
            page_size,
            margins,
            page_break: PageBreak {
                auto: info.auto_page_break(),
                margin: margins.bottom,
            },
            metadata: DocumentMetadata {
                title: info.title.clone(),
                author: info.author.clone(),
                subject: info.subject.clone(),
                keywords: info.keywords.clone(),
                creator: creator.map(str::to_string),
            },
            context: RenderContext::from_info(info),
        })
    }

    /// Converts a template length to points.
    pub fn to_pt(&self, value: f32) -> Pt {
        self.units.to_pt(value)
    }

    pub fn open_canvas(&self, hooks: Option<Arc<dyn PageHooks>>) -> Canvas {
        let canvas = Canvas::new(self.page_size, self.margins, self.page_break)
            .with_title(self.metadata.title.clone());
        match hooks {
            Some(hooks) => canvas.with_hooks(hooks),
            None => canvas,
        }
    }
}
