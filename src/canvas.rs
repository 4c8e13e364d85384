use crate::doc_context::DocContext;
use crate::hooks::PageHooks;
use crate::types::{Color, Margins, Pt, Size};
use std::path::PathBuf;
use std::sync::Arc;

/// Draw commands in top-left-origin page space, in points.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SaveState,
    RestoreState,
    SetFillColor(Color),
    SetStrokeColor(Color),
    SetLineWidth(Pt),
    SetFontName(String),
    SetFontSize(Pt),
    MoveTo {
        x: Pt,
        y: Pt,
    },
    LineTo {
        x: Pt,
        y: Pt,
    },
    Stroke,
    DrawString {
        x: Pt,
        y: Pt,
        text: String,
    },
    // Filled rectangle.
    DrawRect {
        x: Pt,
        y: Pt,
        width: Pt,
        height: Pt,
    },
    StrokeRect {
        x: Pt,
        y: Pt,
        width: Pt,
        height: Pt,
    },
    DrawImage {
        x: Pt,
        y: Pt,
        width: Pt,
        height: Pt,
        resource_id: String,
    },
    // A page of another PDF, scaled to `width` and drawn beneath the page
    // content. Resolved by the finalize pass, ignored by the writer.
    ImportPage {
        source: PathBuf,
        page_number: u32,
        x: Pt,
        y: Pt,
        width: Pt,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub commands: Vec<Command>,
    mark: usize,
}

impl Page {
    /// Index of the first command after the page background.
    pub fn content_start(&self) -> usize {
        self.mark
    }

    pub fn imported_pages(&self) -> impl Iterator<Item = &Command> {
        self.commands
            .iter()
            .filter(|cmd| matches!(cmd, Command::ImportPage { .. }))
    }
}

#[derive(Debug, Clone)]
pub struct Document {
    pub page_size: Size,
    pub pages: Vec<Page>,
}

/// Auto page-break configuration: when `auto` is set, content that would
/// end below `page height - margin` starts a new page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBreak {
    pub auto: bool,
    pub margin: Pt,
}

#[derive(Debug, Clone, PartialEq)]
struct GraphicsState {
    fill_color: Color,
    stroke_color: Color,
    line_width: Pt,
    font_size: Pt,
    font_name: String,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            fill_color: Color::BLACK,
            stroke_color: Color::BLACK,
            line_width: Pt::from_f32(1.0),
            font_size: Pt::from_f32(12.0),
            font_name: "Helvetica".to_string(),
        }
    }
}

pub struct Canvas {
    page_size: Size,
    margins: Margins,
    page_break: PageBreak,
    pages: Vec<Page>,
    current: Option<Page>,
    state_stack: Vec<GraphicsState>,
    current_state: GraphicsState,
    cursor: (Pt, Pt),
    hooks: Option<Arc<dyn PageHooks>>,
    in_hook: bool,
    title: Option<String>,
}

impl Canvas {
    pub fn new(page_size: Size, margins: Margins, page_break: PageBreak) -> Self {
        Self {
            page_size,
            margins,
            page_break,
            pages: Vec::new(),
            current: None,
            state_stack: Vec::new(),
            current_state: GraphicsState::default(),
            cursor: (margins.left, margins.top),
            hooks: None,
            in_hook: false,
            title: None,
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn PageHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.title = title;
        self
    }

    pub fn page_size(&self) -> Size {
        self.page_size
    }

    pub fn margins(&self) -> Margins {
        self.margins
    }

    pub fn page_break(&self) -> PageBreak {
        self.page_break
    }

    pub fn set_page_break(&mut self, page_break: PageBreak) {
        self.page_break = page_break;
    }

    pub fn set_auto_page_break(&mut self, auto: bool, margin: Pt) {
        self.page_break = PageBreak { auto, margin };
    }

    /// Number of pages started so far; the open page is the last of them.
    pub fn page_number(&self) -> usize {
        self.pages.len() + usize::from(self.current.is_some())
    }

    pub fn cursor(&self) -> (Pt, Pt) {
        self.cursor
    }

    pub fn set_xy(&mut self, x: Pt, y: Pt) {
        self.cursor = (x, y);
    }

    /// Closes the open page (running the footer hook) and starts a new one
    /// (running the header hook).
    pub fn add_page(&mut self) {
        self.end_page();
        self.current = Some(Page::default());
        self.state_stack.clear();
        self.current_state = GraphicsState::default();
        self.cursor = (self.margins.left, self.margins.top);
        self.run_hook(false);
    }

    fn end_page(&mut self) {
        if self.current.is_none() {
            return;
        }
        self.run_hook(true);
        if let Some(page) = self.current.take() {
            self.pages.push(page);
        }
    }

    fn run_hook(&mut self, footer: bool) {
        let Some(hooks) = self.hooks.clone() else {
            return;
        };
        let ctx = DocContext::new(self.page_number(), self.title.clone());
        let cursor = self.cursor;
        self.in_hook = true;
        self.save_state();
        if footer {
            hooks.on_footer(self, &ctx);
        } else {
            hooks.on_header(self, &ctx);
        }
        // Unbalanced saves inside a hook are closed here.
        while !self.state_stack.is_empty() {
            self.restore_state();
        }
        self.in_hook = false;
        self.cursor = cursor;
    }

    /// Marks the start of the page content; everything drawn before belongs
    /// to the background.
    pub fn set_page_mark(&mut self) {
        let page = self.page_mut();
        page.mark = page.commands.len();
    }

    /// Applies the auto page-break rule to content of `height` starting at
    /// `y`. Returns the y to draw at, which is the top margin of a fresh
    /// page when a break happened.
    pub fn ensure_room(&mut self, y: Pt, height: Pt) -> Pt {
        let trigger = self.page_size.height - self.page_break.margin;
        if !self.page_break.auto || self.in_hook || y + height <= trigger {
            return y;
        }
        log::debug!(
            "auto page break at y={} on page {}",
            y.to_f32(),
            self.page_number()
        );
        self.add_page();
        self.margins.top
    }

    fn page_mut(&mut self) -> &mut Page {
        self.current.get_or_insert_with(Page::default)
    }

    fn push(&mut self, command: Command) {
        self.page_mut().commands.push(command);
    }

    pub fn save_state(&mut self) {
        self.state_stack.push(self.current_state.clone());
        self.push(Command::SaveState);
    }

    pub fn restore_state(&mut self) {
        if let Some(state) = self.state_stack.pop() {
            self.current_state = state;
            self.push(Command::RestoreState);
        }
    }

    pub fn set_fill_color(&mut self, color: Color) {
        if self.current_state.fill_color == color {
            return;
        }
        self.current_state.fill_color = color;
        self.push(Command::SetFillColor(color));
    }

    pub fn set_stroke_color(&mut self, color: Color) {
        if self.current_state.stroke_color == color {
            return;
        }
        self.current_state.stroke_color = color;
        self.push(Command::SetStrokeColor(color));
    }

    pub fn set_line_width(&mut self, width: Pt) {
        let width = width.max(Pt::ZERO);
        if self.current_state.line_width == width {
            return;
        }
        self.current_state.line_width = width;
        self.push(Command::SetLineWidth(width));
    }

    pub fn set_font_name(&mut self, name: &str) {
        if self.current_state.font_name == name {
            return;
        }
        self.current_state.font_name = name.to_string();
        self.push(Command::SetFontName(name.to_string()));
    }

    pub fn set_font_size(&mut self, size: Pt) {
        if self.current_state.font_size == size {
            return;
        }
        self.current_state.font_size = size;
        self.push(Command::SetFontSize(size));
    }

    pub fn font_name(&self) -> &str {
        &self.current_state.font_name
    }

    pub fn font_size(&self) -> Pt {
        self.current_state.font_size
    }

    pub fn move_to(&mut self, x: Pt, y: Pt) {
        self.push(Command::MoveTo { x, y });
    }

    pub fn line_to(&mut self, x: Pt, y: Pt) {
        self.push(Command::LineTo { x, y });
    }

    pub fn stroke(&mut self) {
        self.push(Command::Stroke);
    }

    pub fn draw_line(&mut self, x1: Pt, y1: Pt, x2: Pt, y2: Pt) {
        self.move_to(x1, y1);
        self.line_to(x2, y2);
        self.stroke();
    }

    /// Draws `text` with its top edge at `y` in the current font.
    pub fn draw_string(&mut self, x: Pt, y: Pt, text: impl Into<String>) {
        self.push(Command::DrawString {
            x,
            y,
            text: text.into(),
        });
    }

    pub fn draw_rect(&mut self, x: Pt, y: Pt, width: Pt, height: Pt) {
        self.push(Command::DrawRect {
            x,
            y,
            width,
            height,
        });
    }

    pub fn stroke_rect(&mut self, x: Pt, y: Pt, width: Pt, height: Pt) {
        self.push(Command::StrokeRect {
            x,
            y,
            width,
            height,
        });
    }

    pub fn draw_image(
        &mut self,
        x: Pt,
        y: Pt,
        width: Pt,
        height: Pt,
        resource_id: impl Into<String>,
    ) {
        self.push(Command::DrawImage {
            x,
            y,
            width,
            height,
            resource_id: resource_id.into(),
        });
    }

    /// Draws an image after applying the auto page-break rule to its box.
    /// Returns the y it was placed at.
    pub fn place_image(
        &mut self,
        x: Pt,
        y: Pt,
        width: Pt,
        height: Pt,
        resource_id: impl Into<String>,
    ) -> Pt {
        let y = self.ensure_room(y, height);
        self.draw_image(x, y, width, height, resource_id);
        y
    }

    pub fn import_page(
        &mut self,
        source: impl Into<PathBuf>,
        page_number: u32,
        x: Pt,
        y: Pt,
        width: Pt,
    ) {
        self.push(Command::ImportPage {
            source: source.into(),
            page_number,
            x,
            y,
            width,
        });
    }

    pub fn current_command_count(&self) -> usize {
        self.current
            .as_ref()
            .map(|page| page.commands.len())
            .unwrap_or(0)
    }

    pub fn finish(mut self) -> Document {
        self.end_page();
        if self.pages.is_empty() {
            self.pages.push(Page::default());
        }
        Document {
            page_size: self.page_size,
            pages: self.pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::FnPageHooks;
    use std::sync::Mutex;

    fn canvas() -> Canvas {
        let margins = Margins {
            top: Pt::from_f32(20.0),
            right: Pt::from_f32(10.0),
            bottom: Pt::from_f32(30.0),
            left: Pt::from_f32(10.0),
        };
        let page_break = PageBreak {
            auto: true,
            margin: Pt::from_f32(30.0),
        };
        Canvas::new(
            Size {
                width: Pt::from_f32(200.0),
                height: Pt::from_f32(300.0),
            },
            margins,
            page_break,
        )
    }

    #[test]
    fn state_changes_are_deduplicated() {
        let mut canvas = canvas();
        canvas.add_page();
        canvas.set_font_name("Helvetica");
        canvas.set_font_size(Pt::from_f32(10.0));
        canvas.set_font_size(Pt::from_f32(10.0));
        assert_eq!(canvas.current_command_count(), 1);

        canvas.set_fill_color(Color::BLACK);
        canvas.set_stroke_color(Color::rgb(1.0, 0.0, 0.0));
        canvas.set_stroke_color(Color::rgb(1.0, 0.0, 0.0));
        assert_eq!(canvas.current_command_count(), 2);
    }

    #[test]
    fn add_page_resets_cursor_and_state() {
        let mut canvas = canvas();
        canvas.add_page();
        canvas.set_xy(Pt::from_f32(50.0), Pt::from_f32(60.0));
        canvas.set_font_size(Pt::from_f32(8.0));
        canvas.add_page();
        assert_eq!(canvas.cursor(), (Pt::from_f32(10.0), Pt::from_f32(20.0)));
        assert_eq!(canvas.font_size(), Pt::from_f32(12.0));
        assert_eq!(canvas.page_number(), 2);
        assert_eq!(canvas.finish().pages.len(), 2);
    }

    #[test]
    fn ensure_room_breaks_below_the_trigger() {
        let mut canvas = canvas();
        canvas.add_page();
        let y = canvas.ensure_room(Pt::from_f32(100.0), Pt::from_f32(20.0));
        assert_eq!(y, Pt::from_f32(100.0));
        assert_eq!(canvas.page_number(), 1);

        let y = canvas.ensure_room(Pt::from_f32(260.0), Pt::from_f32(20.0));
        assert_eq!(y, Pt::from_f32(20.0));
        assert_eq!(canvas.page_number(), 2);
    }

    #[test]
    fn disabled_auto_break_never_adds_pages() {
        let mut canvas = canvas();
        canvas.add_page();
        canvas.set_auto_page_break(false, Pt::ZERO);
        let y = canvas.place_image(
            Pt::ZERO,
            Pt::ZERO,
            Pt::from_f32(200.0),
            Pt::from_f32(300.0),
            "bg",
        );
        assert_eq!(y, Pt::ZERO);
        assert_eq!(canvas.page_number(), 1);
    }

    #[test]
    fn page_mark_records_the_content_start() {
        let mut canvas = canvas();
        canvas.add_page();
        canvas.draw_image(Pt::ZERO, Pt::ZERO, Pt::ZERO, Pt::ZERO, "bg");
        canvas.set_page_mark();
        canvas.draw_string(Pt::ZERO, Pt::ZERO, "hi");
        let document = canvas.finish();
        assert_eq!(document.pages[0].content_start(), 1);
    }

    #[test]
    fn finish_always_yields_a_page() {
        let document = canvas().finish();
        assert_eq!(document.pages.len(), 1);
        assert!(document.pages[0].commands.is_empty());
    }

    #[test]
    fn hooks_run_per_page_with_breaks_suspended() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let header_calls = calls.clone();
        let footer_calls = calls.clone();
        let hooks = FnPageHooks::new()
            .with_header(move |canvas, ctx| {
                header_calls.lock().unwrap().push(format!("h{}", ctx.page_number));
                // Would break the page outside a hook.
                let y = canvas.ensure_room(Pt::from_f32(290.0), Pt::from_f32(50.0));
                canvas.draw_string(Pt::ZERO, y, "header");
                canvas.set_xy(Pt::from_f32(99.0), Pt::from_f32(99.0));
            })
            .with_footer(move |_canvas, ctx| {
                footer_calls.lock().unwrap().push(format!("f{}", ctx.page_number));
            });
        let mut canvas = canvas().with_hooks(Arc::new(hooks));
        canvas.add_page();
        assert_eq!(canvas.cursor(), (Pt::from_f32(10.0), Pt::from_f32(20.0)));
        canvas.add_page();
        let document = canvas.finish();

        assert_eq!(document.pages.len(), 2);
        assert_eq!(*calls.lock().unwrap(), vec!["h1", "f1", "h2", "f2"]);
        assert!(document.pages[0].commands.contains(&Command::DrawString {
            x: Pt::ZERO,
            y: Pt::from_f32(290.0),
            text: "header".to_string(),
        }));
    }
}
