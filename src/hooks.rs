use crate::canvas::Canvas;
use crate::doc_context::DocContext;
use std::sync::Arc;

/// Header and footer decoration run by the canvas at every page start and
/// end. Auto page breaks are suspended while a hook runs, and the cursor and
/// graphics state are restored afterwards.
pub trait PageHooks: Send + Sync {
    fn on_header(&self, _canvas: &mut Canvas, _ctx: &DocContext) {}
    fn on_footer(&self, _canvas: &mut Canvas, _ctx: &DocContext) {}
}

pub type OnPageCallback = Arc<dyn Fn(&mut Canvas, &DocContext) + Send + Sync>;

/// Closure-backed [`PageHooks`].
#[derive(Clone, Default)]
pub struct FnPageHooks {
    header: Option<OnPageCallback>,
    footer: Option<OnPageCallback>,
}

impl FnPageHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header<F>(mut self, callback: F) -> Self
    where
        F: Fn(&mut Canvas, &DocContext) + Send + Sync + 'static,
    {
        self.header = Some(Arc::new(callback));
        self
    }

    pub fn with_footer<F>(mut self, callback: F) -> Self
    where
        F: Fn(&mut Canvas, &DocContext) + Send + Sync + 'static,
    {
        self.footer = Some(Arc::new(callback));
        self
    }
}

impl PageHooks for FnPageHooks {
    fn on_header(&self, canvas: &mut Canvas, ctx: &DocContext) {
        if let Some(header) = &self.header {
            header(canvas, ctx);
        }
    }

    fn on_footer(&self, canvas: &mut Canvas, ctx: &DocContext) {
        if let Some(footer) = &self.footer {
            footer(canvas, ctx);
        }
    }
}

impl std::fmt::Debug for FnPageHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnPageHooks")
            .field("header", &self.header.is_some())
            .field("footer", &self.footer.is_some())
            .finish()
    }
}
