use crate::font::{FontFace, TextMeasure};
use crate::types::Pt;

/// Greedy word wrap against measured widths.
///
/// Paragraphs split on any newline flavour and words on single spaces. When
/// the first word of a paragraph alone is wider than `max_width` the whole
/// input comes back unsplit as the only line.
pub fn wrap<M>(text: &str, face: &FontFace, max_width: Pt, measure: &M) -> Vec<String>
where
    M: TextMeasure + ?Sized,
{
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut lines = Vec::new();
    for paragraph in normalized.split('\n') {
        let mut buffer = String::new();
        for word in paragraph.split(' ') {
            let tentative = format!("{buffer}{word} ");
            if measure.text_width(face, tentative.trim_end()) <= max_width {
                buffer = tentative;
                continue;
            }
            if buffer.is_empty() {
                return vec![text.to_string()];
            }
            lines.push(buffer.trim_end().to_string());
            buffer = format!("{word} ");
        }
        let rest = buffer.trim_end();
        if !rest.is_empty() {
            lines.push(rest.to_string());
        }
    }
    lines
}

/// [`wrap`], with the lines joined by CRLF.
pub fn wrap_joined<M>(text: &str, face: &FontFace, max_width: Pt, measure: &M) -> String
where
    M: TextMeasure + ?Sized,
{
    wrap(text, face, max_width, measure).join("\r\n")
}
