use crate::canvas::Canvas;
use crate::font::{FontFace, FontRegistry, FontStyle};
use crate::types::Pt;
use kuchiki::traits::TendrilSink;
use kuchiki::{NodeData, NodeRef};

/// Line height as a multiple of the font size.
pub(crate) const LINE_HEIGHT_RATIO: f32 = 1.25;

const HEADING_SCALE: [f32; 6] = [2.0, 1.5, 1.17, 1.0, 0.83, 0.67];

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word { text: String, face: FontFace },
    Space,
    Break,
}

#[derive(Debug, Clone, PartialEq)]
struct Fragment {
    offset: Pt,
    width: Pt,
    text: String,
    font: String,
    face: FontFace,
}

#[derive(Debug, Default)]
struct Line {
    fragments: Vec<Fragment>,
    width: Pt,
    height: Pt,
}

/// Where an HTML cell ended up after drawing.
#[derive(Debug, Clone, PartialEq)]
pub struct HtmlLayout {
    pub lines: usize,
    /// Top of the line after the cell, on the page the cell ended on.
    pub bottom: Pt,
    /// Families that were not known and fell back to Helvetica.
    pub fallback_families: Vec<String>,
}

/// Lays out inline markup into a cell of `width` starting at (`x`, `y`) and
/// draws it. Words wrap greedily; `b/strong`, `i/em`, `u`, `s/strike/del`
/// change the face, `br` and block elements break lines. Other elements
/// are transparent.
pub fn draw_html(
    canvas: &mut Canvas,
    registry: &FontRegistry,
    markup: &str,
    base: &FontFace,
    x: Pt,
    y: Pt,
    width: Pt,
) -> HtmlLayout {
    let tokens = tokenize(markup, base);
    let mut fallback_families = Vec::new();
    let lines = layout(&tokens, base, width, registry, &mut fallback_families);

    let mut top = y;
    for line in &lines {
        top = canvas.ensure_room(top, line.height);
        for fragment in &line.fragments {
            canvas.set_font_name(&fragment.font);
            canvas.set_font_size(fragment.face.size_pt());
            let left = x + fragment.offset;
            canvas.draw_string(left, top, fragment.text.clone());
            draw_decorations(
                canvas,
                registry,
                &fragment.font,
                fragment.face.size_pt(),
                fragment.face.style,
                left,
                top,
                fragment.width,
            );
        }
        top += line.height;
    }
    log::debug!("html cell: {} line(s) within {}pt", lines.len(), width.to_f32());
    HtmlLayout {
        lines: lines.len(),
        bottom: top,
        fallback_families,
    }
}

/// Underline and line-through rules for a run of text whose top edge is at
/// `y`.
#[allow(clippy::too_many_arguments)]
pub(crate) fn draw_decorations(
    canvas: &mut Canvas,
    registry: &FontRegistry,
    font: &str,
    size: Pt,
    style: FontStyle,
    x: Pt,
    y: Pt,
    width: Pt,
) {
    if !style.underline && !style.strikethrough {
        return;
    }
    let (position, thickness) = registry.underline_metrics(font);
    let thickness = size.mul_ratio(i32::from(thickness.max(1)), 1000);
    let baseline = y + size;
    if style.underline {
        let center = baseline + size.mul_ratio(-i32::from(position), 1000);
        canvas.draw_rect(x, center - thickness / 2.0, width, thickness);
    }
    if style.strikethrough {
        let center = baseline - size * 0.3;
        canvas.draw_rect(x, center - thickness / 2.0, width, thickness);
    }
}

fn tokenize(markup: &str, base: &FontFace) -> Vec<Token> {
    let document = kuchiki::parse_html().one(markup);
    let root = match document.select_first("body") {
        Ok(body) => body.as_node().clone(),
        Err(()) => document,
    };
    let mut tokens = Vec::new();
    for child in root.children() {
        walk(&child, base, &mut tokens);
    }
    while matches!(tokens.last(), Some(Token::Space)) {
        tokens.pop();
    }
    tokens
}

fn walk(node: &NodeRef, face: &FontFace, tokens: &mut Vec<Token>) {
    match node.data() {
        NodeData::Text(text) => push_text(&text.borrow(), face, tokens),
        NodeData::Element(element) => {
            let tag = element.name.local.as_ref().to_ascii_lowercase();
            if tag == "br" {
                tokens.push(Token::Break);
                return;
            }
            let mut inner = face.clone();
            match tag.as_str() {
                "b" | "strong" => inner.style.bold = true,
                "i" | "em" => inner.style.italic = true,
                "u" | "ins" => inner.style.underline = true,
                "s" | "strike" | "del" => inner.style.strikethrough = true,
                _ => {}
            }
            if let Some(level) = heading_level(&tag) {
                inner.style.bold = true;
                inner.size = face.size * HEADING_SCALE[level - 1];
            }
            let block = is_block(&tag);
            if block {
                start_block(tokens);
            }
            for child in node.children() {
                walk(&child, &inner, tokens);
            }
            if block {
                start_block(tokens);
            }
        }
        _ => {}
    }
}

fn push_text(text: &str, face: &FontFace, tokens: &mut Vec<Token>) {
    let mut word = String::new();
    for ch in text.chars() {
        if ch.is_whitespace() && ch != '\u{00A0}' {
            if !word.is_empty() {
                tokens.push(Token::Word {
                    text: std::mem::take(&mut word),
                    face: face.clone(),
                });
            }
            if !matches!(tokens.last(), None | Some(Token::Space) | Some(Token::Break)) {
                tokens.push(Token::Space);
            }
        } else {
            word.push(ch);
        }
    }
    if !word.is_empty() {
        tokens.push(Token::Word {
            text: word,
            face: face.clone(),
        });
    }
}

fn start_block(tokens: &mut Vec<Token>) {
    while matches!(tokens.last(), Some(Token::Space)) {
        tokens.pop();
    }
    if !matches!(tokens.last(), None | Some(Token::Break)) {
        tokens.push(Token::Break);
    }
}

fn heading_level(tag: &str) -> Option<usize> {
    match tag {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

fn is_block(tag: &str) -> bool {
    matches!(tag, "p" | "div" | "li" | "ul" | "ol" | "blockquote") || heading_level(tag).is_some()
}

fn layout(
    tokens: &[Token],
    base: &FontFace,
    width: Pt,
    registry: &FontRegistry,
    fallbacks: &mut Vec<String>,
) -> Vec<Line> {
    let base_height = base.size_pt() * LINE_HEIGHT_RATIO;
    let mut lines = Vec::new();
    let mut line = Line::default();
    let mut pending_space = false;

    for token in tokens {
        match token {
            Token::Space => pending_space = !line.fragments.is_empty(),
            Token::Break => {
                if line.height == Pt::ZERO {
                    line.height = base_height;
                }
                lines.push(std::mem::take(&mut line));
                pending_space = false;
            }
            Token::Word { text, face } => {
                let resolved = registry.resolve(&face.family, face.style);
                if resolved.fallback && !fallbacks.contains(&face.family) {
                    fallbacks.push(face.family.clone());
                }
                let size = face.size_pt();
                let word_width = registry.measure(&resolved.name, size, text);
                let mut space_width = if pending_space {
                    registry.measure(&resolved.name, size, " ")
                } else {
                    Pt::ZERO
                };
                if !line.fragments.is_empty() && line.width + space_width + word_width > width {
                    lines.push(std::mem::take(&mut line));
                    pending_space = false;
                    space_width = Pt::ZERO;
                }
                let height = size * LINE_HEIGHT_RATIO;
                line.height = line.height.max(height);

                let joins_last = pending_space
                    && line
                        .fragments
                        .last()
                        .is_some_and(|last| last.font == resolved.name && last.face == *face);
                if joins_last {
                    if let Some(last) = line.fragments.last_mut() {
                        last.text.push(' ');
                        last.text.push_str(text);
                        last.width += space_width + word_width;
                    }
                } else {
                    line.fragments.push(Fragment {
                        offset: line.width + space_width,
                        width: word_width,
                        text: text.clone(),
                        font: resolved.name,
                        face: face.clone(),
                    });
                }
                line.width += space_width + word_width;
                pending_space = false;
            }
        }
    }
    if !line.fragments.is_empty() {
        lines.push(line);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{Command, PageBreak};
    use crate::types::{Margins, Size};

    fn base() -> FontFace {
        FontFace::new("helvetica", FontStyle::default(), 10.0)
    }

    fn canvas() -> Canvas {
        let margins = Margins {
            top: Pt::from_f32(20.0),
            right: Pt::from_f32(20.0),
            bottom: Pt::from_f32(20.0),
            left: Pt::from_f32(20.0),
        };
        let mut canvas = Canvas::new(
            Size::a4(),
            margins,
            PageBreak {
                auto: true,
                margin: Pt::from_f32(20.0),
            },
        );
        canvas.add_page();
        canvas
    }

    fn words(tokens: &[Token]) -> Vec<String> {
        tokens
            .iter()
            .map(|token| match token {
                Token::Word { text, face } => {
                    let mut marks = String::new();
                    if face.style.bold {
                        marks.push('B');
                    }
                    if face.style.italic {
                        marks.push('I');
                    }
                    if face.style.underline {
                        marks.push('U');
                    }
                    if face.style.strikethrough {
                        marks.push('D');
                    }
                    if marks.is_empty() {
                        text.clone()
                    } else {
                        format!("{text}:{marks}")
                    }
                }
                Token::Space => "_".to_string(),
                Token::Break => "|".to_string(),
            })
            .collect()
    }

    #[test]
    fn inline_markup_changes_the_face() {
        let tokens = tokenize("Hi <b>bold <i>both</i></b> <u>under</u><del>gone</del>", &base());
        assert_eq!(
            words(&tokens),
            ["Hi", "_", "bold:B", "_", "both:BI", "_", "under:U", "gone:D"]
        );
    }

    #[test]
    fn tag_names_match_regardless_of_case() {
        let tokens = tokenize("<B>loud</B><BR>quiet<STRONG>x</STRONG>", &base());
        assert_eq!(words(&tokens), ["loud:B", "|", "quiet", "x:B"]);
    }

    #[test]
    fn breaks_and_blocks_split_lines() {
        let tokens = tokenize("one<br/>two<p>three</p>four", &base());
        assert_eq!(words(&tokens), ["one", "|", "two", "|", "three", "|", "four"]);
    }

    #[test]
    fn whitespace_collapses() {
        let tokens = tokenize("  a \n\t b  ", &base());
        assert_eq!(words(&tokens), ["a", "_", "b"]);
    }

    #[test]
    fn headings_are_bold_and_larger() {
        let tokens = tokenize("<h1>Title</h1>", &base());
        let Some(Token::Word { face, .. }) = tokens.first() else {
            panic!("expected a word");
        };
        assert!(face.style.bold);
        assert_eq!(face.size, 20.0);
    }

    #[test]
    fn words_wrap_within_the_cell_width() {
        let registry = FontRegistry::new();
        let width = registry.measure("Helvetica", Pt::from_f32(10.0), "alpha beta");
        let tokens = tokenize("alpha beta gamma delta", &base());
        let mut fallbacks = Vec::new();
        let lines = layout(&tokens, &base(), width, &registry, &mut fallbacks);
        let texts: Vec<Vec<&str>> = lines
            .iter()
            .map(|line| line.fragments.iter().map(|f| f.text.as_str()).collect())
            .collect();
        assert_eq!(texts, vec![vec!["alpha beta"], vec!["gamma"], vec!["delta"]]);
        assert!(lines.iter().all(|line| line.width <= width));
        assert!(fallbacks.is_empty());
    }

    #[test]
    fn draws_fragments_and_decorations() {
        let registry = FontRegistry::new();
        let mut canvas = canvas();
        let layout = draw_html(
            &mut canvas,
            &registry,
            "plain <b>bold</b><br/><u>under</u>",
            &base(),
            Pt::from_f32(30.0),
            Pt::from_f32(40.0),
            Pt::from_f32(300.0),
        );
        assert_eq!(layout.lines, 2);
        assert_eq!(layout.bottom, Pt::from_f32(65.0));
        let document = canvas.finish();
        let commands = &document.pages[0].commands;
        assert!(commands.contains(&Command::SetFontName("Helvetica-Bold".to_string())));
        assert!(commands.contains(&Command::DrawString {
            x: Pt::from_f32(30.0),
            y: Pt::from_f32(52.5),
            text: "under".to_string(),
        }));
        assert!(
            commands
                .iter()
                .any(|cmd| matches!(cmd, Command::DrawRect { x, .. } if *x == Pt::from_f32(30.0)))
        );
    }

    #[test]
    fn unknown_families_are_reported() {
        let registry = FontRegistry::new();
        let mut canvas = canvas();
        let face = FontFace::new("no-such-font", FontStyle::default(), 10.0);
        let layout = draw_html(
            &mut canvas,
            &registry,
            "x y",
            &face,
            Pt::ZERO,
            Pt::ZERO,
            Pt::from_f32(100.0),
        );
        assert_eq!(layout.fallback_families, ["no-such-font"]);
    }
}
