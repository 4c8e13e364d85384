use crate::assets::{ImageData, ImageStore};
use crate::canvas::{Command, Document, Page};
use crate::document::DocumentMetadata;
use crate::error::Result;
use crate::font::{Base14, FontProgramKind, FontRegistry, RegisteredFont, winansi_code};
use crate::types::{Color, Pt, Size};
use fixed::types::I32F32;
use std::collections::{BTreeMap, BTreeSet};

const PDF_CATALOG_ID: usize = 1;
const PDF_PAGES_ID: usize = 2;
const PDF_RESOURCES_ID: usize = 3;
const PRODUCER: &str = concat!("pdf-stencil ", env!("CARGO_PKG_VERSION"));

/// Serializes a finished document. Every page shares one resource
/// dictionary holding the fonts and images the document uses.
/// `ImportPage` commands are left to the finalize pass.
pub fn document_to_pdf(
    document: &Document,
    images: &ImageStore,
    fonts: &FontRegistry,
    metadata: &DocumentMetadata,
) -> Result<Vec<u8>> {
    // Catalog, page tree and shared resources are filled in last.
    let mut objects: Vec<String> = vec![String::new(); PDF_RESOURCES_ID];

    let font_names = collect_font_names(document);
    let mut font_map: BTreeMap<String, String> = BTreeMap::new();
    let mut font_resources = Vec::new();
    for (index, name) in font_names.iter().enumerate() {
        let resource = format!("F{}", index + 1);
        let font_id = match fonts.registered(name) {
            Some(font) => {
                objects.push(font_file_object(&font.data, font.program_kind));
                let file_id = objects.len();
                objects.push(font_descriptor_object(font, file_id));
                let descriptor_id = objects.len();
                objects.push(truetype_font_object(font, descriptor_id));
                objects.len()
            }
            None => {
                objects.push(font_object(name));
                objects.len()
            }
        };
        font_map.insert(name.clone(), resource.clone());
        font_resources.push((resource, font_id));
    }

    let used_images = collect_image_ids(document);
    let mut image_resources = Vec::new();
    for (id, image) in images.iter().filter(|(id, _)| used_images.contains(*id)) {
        let smask_id = match image.alpha.as_deref() {
            Some(alpha) => {
                objects.push(image_smask_object(image, alpha));
                Some(objects.len())
            }
            None => None,
        };
        objects.push(image_object(image, smask_id));
        image_resources.push((id.to_string(), objects.len()));
    }

    let mut unencodable = 0usize;
    let mut page_ids = Vec::with_capacity(document.pages.len());
    for page in &document.pages {
        let content = render_page(page, document.page_size.height, &font_map, &mut unencodable);
        objects.push(stream_object(&content));
        let content_id = objects.len();
        objects.push(page_object(document.page_size, content_id));
        page_ids.push(objects.len());
    }
    if unencodable > 0 {
        log::warn!("{unencodable} character(s) outside WinAnsi were replaced with '?'");
    }

    objects[PDF_CATALOG_ID - 1] = format!("<< /Type /Catalog /Pages {PDF_PAGES_ID} 0 R >>");
    objects[PDF_PAGES_ID - 1] = format!(
        "<< /Type /Pages /Kids [{}] /Count {} >>",
        page_ids
            .iter()
            .map(|id| format!("{id} 0 R"))
            .collect::<Vec<_>>()
            .join(" "),
        page_ids.len()
    );
    objects[PDF_RESOURCES_ID - 1] = resources_object(&font_resources, &image_resources);

    objects.push(info_object(metadata));
    let info_id = objects.len();
    log::debug!(
        "writing {} page(s), {} font(s), {} image(s)",
        page_ids.len(),
        font_resources.len(),
        image_resources.len()
    );
    Ok(build_pdf(objects, PDF_CATALOG_ID, Some(info_id)))
}

fn collect_font_names(document: &Document) -> Vec<String> {
    let mut names = BTreeSet::new();
    for page in &document.pages {
        // Text drawn before any explicit font uses the canvas default.
        let mut current = "Helvetica";
        for cmd in &page.commands {
            match cmd {
                Command::SetFontName(name) => current = name,
                Command::DrawString { .. } => {
                    names.insert(current.to_string());
                }
                _ => {}
            }
        }
    }
    names.into_iter().collect()
}

fn collect_image_ids(document: &Document) -> BTreeSet<&str> {
    document
        .pages
        .iter()
        .flat_map(|page| page.commands.iter())
        .filter_map(|cmd| match cmd {
            Command::DrawImage { resource_id, .. } => Some(resource_id.as_str()),
            _ => None,
        })
        .collect()
}

fn render_page(
    page: &Page,
    page_height: Pt,
    font_map: &BTreeMap<String, String>,
    unencodable: &mut usize,
) -> String {
    let mut out = String::new();
    let mut current_font_size = Pt::from_f32(12.0);
    let mut current_font_name = "Helvetica".to_string();

    for cmd in &page.commands {
        match cmd {
            Command::SaveState => out.push_str("q\n"),
            Command::RestoreState => out.push_str("Q\n"),
            Command::SetFillColor(color) => out.push_str(&color_to_pdf(*color, "rg")),
            Command::SetStrokeColor(color) => out.push_str(&color_to_pdf(*color, "RG")),
            Command::SetLineWidth(width) => {
                out.push_str(&format!("{} w\n", fmt_pt(*width)));
            }
            Command::SetFontName(name) => {
                current_font_name = name.clone();
            }
            Command::SetFontSize(size) => {
                current_font_size = *size;
            }
            Command::MoveTo { x, y } => {
                out.push_str(&format!("{} {} m\n", fmt_pt(*x), fmt_pt(page_height - *y)));
            }
            Command::LineTo { x, y } => {
                out.push_str(&format!("{} {} l\n", fmt_pt(*x), fmt_pt(page_height - *y)));
            }
            Command::Stroke => out.push_str("S\n"),
            Command::DrawString { x, y, text } => {
                let resource = font_map
                    .get(&current_font_name)
                    .map(String::as_str)
                    .unwrap_or("F1");
                let encoded = encode_winansi_pdf_string(text);
                *unencodable += encoded.replaced;
                out.push_str("BT\n");
                out.push_str(&format!("/{} {} Tf\n", resource, fmt_pt(current_font_size)));
                out.push_str(&format!(
                    "{} {} Td\n",
                    fmt_pt(*x),
                    fmt_pt(page_height - *y - current_font_size)
                ));
                out.push_str(&format!("({}) Tj\n", encoded.text));
                out.push_str("ET\n");
            }
            Command::DrawRect {
                x,
                y,
                width,
                height,
            } => {
                out.push_str(&format!(
                    "{} {} {} {} re\nf\n",
                    fmt_pt(*x),
                    fmt_pt(page_height - *y - *height),
                    fmt_pt(*width),
                    fmt_pt(*height)
                ));
            }
            Command::StrokeRect {
                x,
                y,
                width,
                height,
            } => {
                out.push_str(&format!(
                    "{} {} {} {} re\nS\n",
                    fmt_pt(*x),
                    fmt_pt(page_height - *y - *height),
                    fmt_pt(*width),
                    fmt_pt(*height)
                ));
            }
            Command::DrawImage {
                x,
                y,
                width,
                height,
                resource_id,
            } => {
                let draw_y = page_height - *y - *height;
                out.push_str("q\n");
                out.push_str(&format!(
                    "{} 0 0 {} {} {} cm\n",
                    fmt_pt(*width),
                    fmt_pt(*height),
                    fmt_pt(*x),
                    fmt_pt(draw_y)
                ));
                out.push_str(&format!("/{} Do\n", resource_id));
                out.push_str("Q\n");
            }
            Command::ImportPage { .. } => {}
        }
    }

    out
}

fn page_object(size: Size, content_id: usize) -> String {
    format!(
        "<< /Type /Page /Parent {} 0 R /MediaBox [0 0 {} {}] /Resources {} 0 R /Contents {} 0 R >>",
        PDF_PAGES_ID,
        fmt_pt(size.width),
        fmt_pt(size.height),
        PDF_RESOURCES_ID,
        content_id
    )
}

fn resources_object(fonts: &[(String, usize)], images: &[(String, usize)]) -> String {
    let mut dict = String::from("<< /ProcSet [/PDF /Text /ImageB /ImageC /ImageI]");
    if !fonts.is_empty() {
        dict.push_str(&format!(" /Font {}", named_references(fonts)));
    }
    if !images.is_empty() {
        dict.push_str(&format!(" /XObject {}", named_references(images)));
    }
    dict.push_str(" >>");
    dict
}

fn named_references(entries: &[(String, usize)]) -> String {
    let entries: Vec<String> = entries
        .iter()
        .map(|(resource, id)| format!("/{} {} 0 R", resource, id))
        .collect();
    format!("<< {} >>", entries.join(" "))
}

fn image_object(image: &ImageData, smask_id: Option<usize>) -> String {
    let stream_data = encode_stream_data(&image.data);
    let smask = smask_id
        .map(|id| format!(" /SMask {} 0 R", id))
        .unwrap_or_default();
    format!(
        "<< /Type /XObject /Subtype /Image /Width {} /Height {} /ColorSpace {} /BitsPerComponent {} /Length {} /Filter [/ASCIIHexDecode {}]{} >>\nstream\n{}\nendstream",
        image.width,
        image.height,
        image.color_space,
        image.bits_per_component,
        stream_data.len(),
        image.filter,
        smask,
        stream_data
    )
}

fn image_smask_object(image: &ImageData, alpha: &[u8]) -> String {
    let stream_data = encode_stream_data(alpha);
    format!(
        "<< /Type /XObject /Subtype /Image /Width {} /Height {} /ColorSpace /DeviceGray /BitsPerComponent 8 /Length {} /Filter [/ASCIIHexDecode /FlateDecode] >>\nstream\n{}\nendstream",
        image.width,
        image.height,
        stream_data.len(),
        stream_data
    )
}

fn encode_stream_data(data: &[u8]) -> String {
    let mut hex = ascii_hex_encode(data);
    hex.push('>');
    hex
}

fn truetype_font_object(font: &RegisteredFont, descriptor_id: usize) -> String {
    let base = sanitize_font_name(&font.name);
    let metrics = &font.metrics;
    let subtype = match font.program_kind {
        FontProgramKind::OpenTypeCff => "Type1",
        FontProgramKind::TrueType => "TrueType",
    };
    let widths = metrics
        .widths
        .iter()
        .map(|value| value.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "<< /Type /Font /Subtype /{} /BaseFont /{} /FirstChar {} /LastChar {} /Widths [{}] /FontDescriptor {} 0 R /Encoding /WinAnsiEncoding >>",
        subtype, base, metrics.first_char, metrics.last_char, widths, descriptor_id
    )
}

fn font_descriptor_object(font: &RegisteredFont, font_file_id: usize) -> String {
    let base = sanitize_font_name(&font.name);
    let metrics = &font.metrics;
    // Nonsymbolic, plus FixedPitch.
    let mut flags = 32;
    if metrics.is_fixed_pitch {
        flags |= 1;
    }
    let font_file_entry = match font.program_kind {
        FontProgramKind::OpenTypeCff => "FontFile3",
        FontProgramKind::TrueType => "FontFile2",
    };
    format!(
        "<< /Type /FontDescriptor /FontName /{} /Flags {} /FontBBox [{} {} {} {}] /ItalicAngle {} /Ascent {} /Descent {} /CapHeight {} /StemV {} /MissingWidth {} /{} {} 0 R >>",
        base,
        flags,
        metrics.bbox.0,
        metrics.bbox.1,
        metrics.bbox.2,
        metrics.bbox.3,
        metrics.italic_angle,
        metrics.ascent,
        metrics.descent,
        metrics.cap_height,
        metrics.stem_v,
        metrics.missing_width,
        font_file_entry,
        font_file_id
    )
}

fn font_file_object(data: &[u8], kind: FontProgramKind) -> String {
    let mut stream_data = encode_stream_data(data);
    stream_data.push('\n');
    let mut dict = format!(
        "<< /Length {} /Length1 {} /Filter /ASCIIHexDecode",
        stream_data.len(),
        data.len()
    );
    if matches!(kind, FontProgramKind::OpenTypeCff) {
        dict.push_str(" /Subtype /OpenType");
    }
    dict.push_str(" >>\nstream\n");
    format!("{}{}endstream", dict, stream_data)
}

fn ascii_hex_encode(data: &[u8]) -> String {
    use std::fmt::Write;

    let mut out = String::with_capacity(data.len() * 2 + data.len() / 32);
    for (index, byte) in data.iter().enumerate() {
        let _ = write!(&mut out, "{:02X}", byte);
        if index % 32 == 31 {
            out.push('\n');
        }
    }
    out
}

/// Core font with WinAnsi encoding. Names that are not core fonts become
/// Helvetica.
fn font_object(name: &str) -> String {
    let base = Base14::from_pdf_name(name)
        .map(Base14::pdf_name)
        .unwrap_or("Helvetica");
    format!(
        "<< /Type /Font /Subtype /Type1 /BaseFont /{} /Encoding /WinAnsiEncoding >>",
        base
    )
}

fn sanitize_font_name(name: &str) -> String {
    let mut out = String::new();
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() || ch == '-' {
            out.push(ch);
        } else if ch == ' ' {
            out.push('-');
        }
    }
    if out.is_empty() {
        "Helvetica".to_string()
    } else {
        out
    }
}

fn stream_object(content: &str) -> String {
    format!("<< /Length {} >>\nstream\n{}\nendstream", content.len(), content)
}

fn info_object(metadata: &DocumentMetadata) -> String {
    let mut entries: Vec<String> = Vec::new();
    let fields = [
        ("Title", metadata.title.as_deref()),
        ("Author", metadata.author.as_deref()),
        ("Subject", metadata.subject.as_deref()),
        ("Keywords", metadata.keywords.as_deref()),
        ("Creator", metadata.creator.as_deref()),
    ];
    for (key, value) in fields {
        if let Some(value) = value {
            entries.push(format!("/{} ({})", key, encode_winansi_pdf_string(value).text));
        }
    }
    entries.push(format!("/Producer ({})", PRODUCER));
    format!("<< {} >>", entries.join(" "))
}

fn build_pdf(objects: Vec<String>, catalog_id: usize, info_id: Option<usize>) -> Vec<u8> {
    let mut out: Vec<u8> = Vec::new();
    out.extend_from_slice(b"%PDF-1.7\n");
    out.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");

    let mut offsets = Vec::with_capacity(objects.len());
    for (index, obj) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n", index + 1).as_bytes());
        out.extend_from_slice(obj.as_bytes());
        out.extend_from_slice(b"\nendobj\n");
    }

    let xref_start = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for offset in offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }

    let mut trailer = format!(
        "trailer\n<< /Size {} /Root {} 0 R",
        objects.len() + 1,
        catalog_id
    );
    if let Some(info_id) = info_id {
        trailer.push_str(&format!(" /Info {} 0 R", info_id));
    }
    trailer.push_str(&format!(" >>\nstartxref\n{}\n%%EOF", xref_start));
    out.extend_from_slice(trailer.as_bytes());

    out
}

struct WinAnsiEncoded {
    text: String,
    replaced: usize,
}

/// Encodes `input` as a WinAnsi literal string body, escaping delimiters
/// and writing non-printable bytes as octal.
fn encode_winansi_pdf_string(input: &str) -> WinAnsiEncoded {
    let mut out = String::new();
    let mut replaced = 0usize;
    for ch in input.chars() {
        let byte = match winansi_code(ch) {
            Some(byte) => byte,
            None => {
                replaced += 1;
                b'?'
            }
        };
        match byte {
            b'\\' => out.push_str("\\\\"),
            b'(' => out.push_str("\\("),
            b')' => out.push_str("\\)"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b if !(0x20..0x7f).contains(&b) => out.push_str(&format!("\\{:03o}", b)),
            b => out.push(b as char),
        }
    }
    WinAnsiEncoded {
        text: out,
        replaced,
    }
}

pub(crate) fn fmt(value: f32) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let fixed = I32F32::from_num(value);
    let scaled = (fixed * I32F32::from_num(1000)).round();
    let milli: i64 = scaled.to_num();
    format_milli(milli)
}

fn format_milli(milli: i64) -> String {
    if milli == 0 {
        return "0".to_string();
    }
    let sign = if milli < 0 { "-" } else { "" };
    let abs = milli.abs();
    let int_part = abs / 1000;
    let frac_part = abs % 1000;
    if frac_part == 0 {
        return format!("{}{}", sign, int_part);
    }
    let mut s = format!("{}{}.{:03}", sign, int_part, frac_part);
    while s.ends_with('0') {
        s.pop();
    }
    s
}

fn fmt_pt(value: Pt) -> String {
    format_milli(value.to_milli_i64())
}

fn color_to_pdf(color: Color, operator: &str) -> String {
    let clamp = |v: f32| if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) };
    format!(
        "{} {} {} {}\n",
        fmt(clamp(color.r)),
        fmt(clamp(color.g)),
        fmt(clamp(color.b)),
        operator
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::test_support::png_bytes;
    use crate::canvas::{Canvas, PageBreak};
    use crate::types::Margins;
    use std::collections::HashMap;

    fn resource_names(pdf: &[u8]) -> HashMap<String, lopdf::ObjectId> {
        let doc = lopdf::Document::load_mem(pdf).unwrap();
        let mut names = HashMap::new();
        for page_id in doc.get_pages().values() {
            let page = doc.get_dictionary(*page_id).unwrap();
            let resources_id = page.get(b"Resources").unwrap().as_reference().unwrap();
            let resources = doc.get_dictionary(resources_id).unwrap();
            for key in [b"Font".as_slice(), b"XObject".as_slice()] {
                if let Ok(dict) = resources.get(key).and_then(lopdf::Object::as_dict) {
                    for (name, value) in dict.iter() {
                        names.insert(
                            String::from_utf8_lossy(name).into_owned(),
                            value.as_reference().unwrap(),
                        );
                    }
                }
            }
        }
        names
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
                auto: false,
                margin: Pt::ZERO,
            },
        );
        canvas.add_page();
        canvas
    }

    #[test]
    fn format_milli_trims_trailing_zeros() {
        assert_eq!(format_milli(0), "0");
        assert_eq!(format_milli(12_000), "12");
        assert_eq!(format_milli(12_500), "12.5");
        assert_eq!(format_milli(-1_005), "-1.005");
        assert_eq!(fmt(0.25), "0.25");
    }

    #[test]
    fn winansi_encoding_escapes_and_replaces() {
        let encoded = encode_winansi_pdf_string("a(b)\\ é € \u{4e2d}");
        assert_eq!(encoded.text, "a\\(b\\)\\\\ \\351 \\200 ?");
        assert_eq!(encoded.replaced, 1);
    }

    #[test]
    fn text_baseline_is_flipped_from_the_top_edge() {
        let mut canvas = canvas();
        canvas.set_font_name("Times-Bold");
        canvas.set_font_size(Pt::from_f32(10.0));
        canvas.draw_string(Pt::from_f32(30.0), Pt::from_f32(40.0), "Hi");
        let document = canvas.finish();
        let mut font_map = BTreeMap::new();
        font_map.insert("Times-Bold".to_string(), "F1".to_string());
        let mut replaced = 0;
        let content = render_page(&document.pages[0], Pt::from_f32(842.0), &font_map, &mut replaced);
        assert!(content.contains("/F1 10 Tf\n30 792 Td\n(Hi) Tj\n"));
    }

    #[test]
    fn writes_a_loadable_document_with_shared_resources() {
        let mut images = ImageStore::new();
        let (id, _, _) = images.insert(&png_bytes(2, 2, 128)).unwrap();
        // Stored but never drawn, so never written.
        images.insert(&png_bytes(3, 3, 255)).unwrap();

        let mut canvas = canvas();
        canvas.draw_image(Pt::ZERO, Pt::ZERO, Pt::from_f32(10.0), Pt::from_f32(10.0), id);
        canvas.draw_string(Pt::from_f32(10.0), Pt::from_f32(10.0), "default font");
        canvas.add_page();
        canvas.set_font_name("Courier");
        canvas.draw_string(Pt::from_f32(10.0), Pt::from_f32(10.0), "page two");
        let document = canvas.finish();

        let metadata = DocumentMetadata {
            title: Some("Invoice (draft)".to_string()),
            author: Some("Ops".to_string()),
            ..DocumentMetadata::default()
        };
        let bytes =
            document_to_pdf(&document, &images, &FontRegistry::new(), &metadata).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.7"));

        let loaded = lopdf::Document::load_mem(&bytes).unwrap();
        assert_eq!(loaded.get_pages().len(), 2);
        let names = resource_names(&bytes);
        assert!(names.contains_key("F1"));
        assert!(names.contains_key("F2"));
        assert!(names.contains_key("Im1"));
        assert!(!names.contains_key("Im2"));

        let info_id = loaded.trailer.get(b"Info").unwrap().as_reference().unwrap();
        let info = loaded.get_dictionary(info_id).unwrap();
        assert_eq!(info.get(b"Title").unwrap().as_str().unwrap(), b"Invoice (draft)");
        assert!(info.get(b"Producer").is_ok());
    }

    #[test]
    fn import_commands_emit_nothing() {
        let mut canvas = canvas();
        canvas.import_page("bg.pdf", 1, Pt::ZERO, Pt::ZERO, Pt::from_f32(595.0));
        let document = canvas.finish();
        let mut replaced = 0;
        let content = render_page(&document.pages[0], Pt::from_f32(842.0), &BTreeMap::new(), &mut replaced);
        assert!(content.is_empty());
    }
}
