use crate::error::{Result, StencilError};
use crate::types::Pt;
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::Path;
use std::sync::Mutex;

/// Style flags of a directive's font, parsed from TCPDF-style letters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FontStyle {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
}

impl FontStyle {
    /// `B` bold, `I` italic, `U` underline, `D` line-through. Case-insensitive;
    /// anything else is ignored.
    pub fn parse(letters: &str) -> Self {
        let mut style = FontStyle::default();
        for ch in letters.chars() {
            match ch.to_ascii_uppercase() {
                'B' => style.bold = true,
                'I' => style.italic = true,
                'U' => style.underline = true,
                'D' => style.strikethrough = true,
                ' ' => {}
                other => log::debug!("ignoring unknown font style letter `{other}`"),
            }
        }
        style
    }
}

/// Font selection for one directive. The size is in points.
#[derive(Debug, Clone, PartialEq)]
pub struct FontFace {
    pub family: String,
    pub style: FontStyle,
    pub size: f32,
}

impl FontFace {
    pub fn new(family: impl Into<String>, style: FontStyle, size: f32) -> Self {
        Self {
            family: family.into(),
            style,
            size,
        }
    }

    pub fn size_pt(&self) -> Pt {
        Pt::from_f32(self.size)
    }
}

/// Font-metric collaborator of the word wrapper and the compositor.
pub trait TextMeasure {
    fn text_width(&self, face: &FontFace, text: &str) -> Pt;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Base14 {
    Helvetica,
    HelveticaBold,
    HelveticaOblique,
    HelveticaBoldOblique,
    TimesRoman,
    TimesBold,
    TimesItalic,
    TimesBoldItalic,
    Courier,
    CourierBold,
    CourierOblique,
    CourierBoldOblique,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BaseFamily {
    Helvetica,
    Times,
    Courier,
}

const ALL_BASE14: [Base14; 12] = [
    Base14::Helvetica,
    Base14::HelveticaBold,
    Base14::HelveticaOblique,
    Base14::HelveticaBoldOblique,
    Base14::TimesRoman,
    Base14::TimesBold,
    Base14::TimesItalic,
    Base14::TimesBoldItalic,
    Base14::Courier,
    Base14::CourierBold,
    Base14::CourierOblique,
    Base14::CourierBoldOblique,
];

impl Base14 {
    pub(crate) fn pdf_name(self) -> &'static str {
        match self {
            Base14::Helvetica => "Helvetica",
            Base14::HelveticaBold => "Helvetica-Bold",
            Base14::HelveticaOblique => "Helvetica-Oblique",
            Base14::HelveticaBoldOblique => "Helvetica-BoldOblique",
            Base14::TimesRoman => "Times-Roman",
            Base14::TimesBold => "Times-Bold",
            Base14::TimesItalic => "Times-Italic",
            Base14::TimesBoldItalic => "Times-BoldItalic",
            Base14::Courier => "Courier",
            Base14::CourierBold => "Courier-Bold",
            Base14::CourierOblique => "Courier-Oblique",
            Base14::CourierBoldOblique => "Courier-BoldOblique",
        }
    }

    pub(crate) fn from_pdf_name(name: &str) -> Option<Self> {
        ALL_BASE14.into_iter().find(|font| font.pdf_name() == name)
    }

    fn select(family: BaseFamily, bold: bool, italic: bool) -> Self {
        match (family, bold, italic) {
            (BaseFamily::Helvetica, false, false) => Base14::Helvetica,
            (BaseFamily::Helvetica, true, false) => Base14::HelveticaBold,
            (BaseFamily::Helvetica, false, true) => Base14::HelveticaOblique,
            (BaseFamily::Helvetica, true, true) => Base14::HelveticaBoldOblique,
            (BaseFamily::Times, false, false) => Base14::TimesRoman,
            (BaseFamily::Times, true, false) => Base14::TimesBold,
            (BaseFamily::Times, false, true) => Base14::TimesItalic,
            (BaseFamily::Times, true, true) => Base14::TimesBoldItalic,
            (BaseFamily::Courier, false, false) => Base14::Courier,
            (BaseFamily::Courier, true, false) => Base14::CourierBold,
            (BaseFamily::Courier, false, true) => Base14::CourierOblique,
            (BaseFamily::Courier, true, true) => Base14::CourierBoldOblique,
        }
    }

    /// Advance width in 1/1000 em for a character of the WinAnsi range.
    fn advance(self, ch: char) -> u16 {
        let (table, average) = match self {
            Base14::Helvetica | Base14::HelveticaOblique => (&HELVETICA_WIDTHS, 556),
            Base14::HelveticaBold | Base14::HelveticaBoldOblique => (&HELVETICA_BOLD_WIDTHS, 611),
            Base14::TimesRoman
            | Base14::TimesBold
            | Base14::TimesItalic
            | Base14::TimesBoldItalic => (&TIMES_ROMAN_WIDTHS, 500),
            _ => return 600,
        };
        let code = ch as u32;
        if (32..=126).contains(&code) {
            table[(code - 32) as usize]
        } else {
            average
        }
    }
}

fn base_family(key: &str) -> Option<(BaseFamily, bool, bool)> {
    let family = |name: &str| match name {
        "helvetica" | "arial" | "sans-serif" | "sans" => Some(BaseFamily::Helvetica),
        "times" | "timesroman" | "times-roman" | "times new roman" | "serif" => {
            Some(BaseFamily::Times)
        }
        "courier" | "courier new" | "monospace" => Some(BaseFamily::Courier),
        _ => None,
    };
    if let Some(found) = family(key) {
        return Some((found, false, false));
    }
    // Core font names with a style suffix: helveticab, timesi, courierbi.
    for (suffix, bold, italic) in [("bi", true, true), ("b", true, false), ("i", false, true)] {
        if let Some(stem) = key.strip_suffix(suffix) {
            if let Some(found) = family(stem) {
                return Some((found, bold, italic));
            }
        }
    }
    None
}

// Adobe core font metrics for codes 32..=126.
#[rustfmt::skip]
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

#[rustfmt::skip]
const TIMES_ROMAN_WIDTHS: [u16; 95] = [
    250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 278, 278, 564, 564, 564, 444,
    921, 722, 667, 667, 722, 611, 556, 722, 722, 333, 389, 722, 611, 889, 722, 722,
    556, 722, 667, 556, 611, 722, 722, 944, 722, 722, 611, 333, 278, 333, 469, 500,
    333, 444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500, 278, 778, 500, 500,
    500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444, 480, 200, 480, 541,
];

/// Outcome of resolving a family/style pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFont {
    /// Name the canvas and the PDF writer know the font by.
    pub name: String,
    /// True when the requested family was unknown and Helvetica stood in.
    pub fallback: bool,
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct TextWidthKey {
    font: String,
    size_milli: i64,
    text: String,
}

#[derive(Debug)]
struct TextWidthCache {
    map: HashMap<TextWidthKey, Pt>,
    order: VecDeque<TextWidthKey>,
    max_entries: usize,
}

impl TextWidthCache {
    fn new(max_entries: usize) -> Self {
        Self {
            map: HashMap::new(),
            order: VecDeque::new(),
            max_entries,
        }
    }

    fn get(&self, key: &TextWidthKey) -> Option<Pt> {
        self.map.get(key).copied()
    }

    fn insert(&mut self, key: TextWidthKey, value: Pt) {
        if self.map.insert(key.clone(), value).is_some() {
            return;
        }
        self.order.push_back(key);
        while self.map.len() > self.max_entries {
            let Some(old) = self.order.pop_front() else {
                break;
            };
            self.map.remove(&old);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FontProgramKind {
    TrueType,
    OpenTypeCff,
}

#[derive(Debug)]
pub(crate) struct RegisteredFont {
    pub(crate) name: String,
    pub(crate) data: Vec<u8>,
    pub(crate) metrics: FontMetrics,
    pub(crate) program_kind: FontProgramKind,
}

/// WinAnsi-range metrics of an embedded face, in 1/1000 em.
#[derive(Debug)]
pub(crate) struct FontMetrics {
    pub(crate) first_char: u8,
    pub(crate) last_char: u8,
    pub(crate) widths: Vec<u16>,
    pub(crate) ascent: i16,
    pub(crate) descent: i16,
    pub(crate) cap_height: i16,
    pub(crate) italic_angle: i16,
    pub(crate) stem_v: i16,
    pub(crate) bbox: (i16, i16, i16, i16),
    pub(crate) missing_width: u16,
    pub(crate) is_fixed_pitch: bool,
    pub(crate) underline: (i16, i16),
}

impl FontMetrics {
    fn from_face(face: &ttf_parser::Face<'_>) -> Self {
        let scale = 1000.0 / face.units_per_em().max(1) as f32;
        let first_char = 32u8;
        let last_char = 255u8;
        let widths: Vec<u16> = (first_char..=last_char)
            .map(|code| {
                let advance = winansi_char(code)
                    .and_then(|ch| face.glyph_index(ch))
                    .and_then(|id| face.glyph_hor_advance(id))
                    .unwrap_or(0);
                (advance as f32 * scale).round().clamp(0.0, u16::MAX as f32) as u16
            })
            .collect();
        let missing_width = widths.first().copied().unwrap_or(0);
        let ascent = scale_i16(face.ascender(), scale);
        let bbox = face.global_bounding_box();
        let underline = face
            .underline_metrics()
            .map(|m| (scale_i16(m.position, scale), scale_i16(m.thickness, scale)))
            .unwrap_or((-100, 50));
        Self {
            first_char,
            last_char,
            widths,
            ascent,
            descent: scale_i16(face.descender(), scale),
            cap_height: face
                .capital_height()
                .map(|value| scale_i16(value, scale))
                .unwrap_or(ascent),
            italic_angle: face.italic_angle().map(|v| v.round() as i16).unwrap_or(0),
            stem_v: 80,
            bbox: (
                scale_i16(bbox.x_min, scale),
                scale_i16(bbox.y_min, scale),
                scale_i16(bbox.x_max, scale),
                scale_i16(bbox.y_max, scale),
            ),
            missing_width,
            is_fixed_pitch: face.is_monospaced(),
            underline,
        }
    }

    fn advance_for_char(&self, ch: char) -> u16 {
        let Some(code) = winansi_code(ch) else {
            return self.missing_width;
        };
        if code < self.first_char {
            return self.missing_width;
        }
        self.widths
            .get((code - self.first_char) as usize)
            .copied()
            .unwrap_or(self.missing_width)
    }
}

#[derive(Debug)]
pub struct FontRegistry {
    fonts: Vec<RegisteredFont>,
    lookup: HashMap<String, usize>,
    text_width_cache: Mutex<TextWidthCache>,
}

impl Default for FontRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FontRegistry {
    pub fn new() -> Self {
        Self {
            fonts: Vec::new(),
            lookup: HashMap::new(),
            text_width_cache: Mutex::new(TextWidthCache::new(20_000)),
        }
    }

    /// Registers every `.ttf`/`.otf` file of a directory. Returns how many
    /// faces were added.
    pub fn register_dir(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let mut files: Vec<_> = fs::read_dir(path)?
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && is_font_file(path))
            .collect();
        files.sort();
        for file in &files {
            self.register_file(file)?;
        }
        Ok(files.len())
    }

    pub fn register_file(&mut self, path: impl AsRef<Path>) -> Result<String> {
        let path = path.as_ref();
        let data = fs::read(path)?;
        self.register_bytes(data, path.to_str())
    }

    pub fn register_bytes(&mut self, data: Vec<u8>, source_name: Option<&str>) -> Result<String> {
        let source = source_name.unwrap_or("EmbeddedFont");
        let face = ttf_parser::Face::parse(&data, 0)
            .map_err(|err| StencilError::Font(format!("invalid font data for {source}: {err}")))?;
        let (name, aliases) = font_names(&face, Path::new(source));
        let metrics = FontMetrics::from_face(&face);
        let program_kind = if face.tables().cff.is_some() {
            FontProgramKind::OpenTypeCff
        } else {
            FontProgramKind::TrueType
        };

        let index = self.fonts.len();
        for alias in std::iter::once(name.clone()).chain(aliases) {
            let key = normalize_name(&alias);
            if !key.is_empty() {
                self.lookup.entry(key).or_insert(index);
            }
        }
        log::debug!("registered font {name} from {source}");
        self.fonts.push(RegisteredFont {
            name: name.clone(),
            data,
            metrics,
            program_kind,
        });
        Ok(name)
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }

    pub(crate) fn registered(&self, name: &str) -> Option<&RegisteredFont> {
        self.lookup
            .get(&normalize_name(name))
            .and_then(|index| self.fonts.get(*index))
    }

    /// Maps a template family and style onto a concrete font. Registered
    /// faces win over the core fonts; style variants of a registered family
    /// are looked up by their usual name suffixes.
    pub fn resolve(&self, family: &str, style: FontStyle) -> ResolvedFont {
        let key = normalize_name(family);
        for candidate in style_candidates(&key, style) {
            if let Some(font) = self.registered(&candidate) {
                return ResolvedFont {
                    name: font.name.clone(),
                    fallback: false,
                };
            }
        }
        if let Some(font) = self.registered(&key) {
            return ResolvedFont {
                name: font.name.clone(),
                fallback: false,
            };
        }
        match base_family(&key) {
            Some((base, bold, italic)) => ResolvedFont {
                name: Base14::select(base, bold || style.bold, italic || style.italic)
                    .pdf_name()
                    .to_string(),
                fallback: false,
            },
            None => ResolvedFont {
                name: Base14::select(BaseFamily::Helvetica, style.bold, style.italic)
                    .pdf_name()
                    .to_string(),
                fallback: true,
            },
        }
    }

    /// Width of `text` set in the resolved font `name`.
    pub fn measure(&self, name: &str, font_size: Pt, text: &str) -> Pt {
        let key = TextWidthKey {
            font: name.to_string(),
            size_milli: font_size.to_milli_i64(),
            text: text.to_string(),
        };
        if let Ok(cache) = self.text_width_cache.lock() {
            if let Some(value) = cache.get(&key) {
                return value;
            }
        }
        let units: i64 = if let Some(core) = Base14::from_pdf_name(name) {
            text.chars().map(|ch| core.advance(ch) as i64).sum()
        } else if let Some(font) = self.registered(name) {
            text.chars()
                .map(|ch| font.metrics.advance_for_char(ch) as i64)
                .sum()
        } else {
            let char_width = (font_size * 0.6).max(Pt::from_f32(1.0));
            return char_width * (text.chars().count() as f32);
        };
        let units = units.clamp(0, i32::MAX as i64) as i32;
        let value = font_size.mul_ratio(units, 1000);
        if let Ok(mut cache) = self.text_width_cache.lock() {
            cache.insert(key, value);
        }
        value
    }

    /// Underline position and thickness in 1/1000 em.
    pub(crate) fn underline_metrics(&self, name: &str) -> (i16, i16) {
        self.registered(name)
            .map(|font| font.metrics.underline)
            .unwrap_or((-100, 50))
    }
}

impl TextMeasure for FontRegistry {
    fn text_width(&self, face: &FontFace, text: &str) -> Pt {
        let resolved = self.resolve(&face.family, face.style);
        self.measure(&resolved.name, face.size_pt(), text)
    }
}

fn style_candidates(key: &str, style: FontStyle) -> Vec<String> {
    let suffixes: &[&str] = match (style.bold, style.italic) {
        (false, false) => &[" regular", "-regular"],
        (true, false) => &[" bold", "-bold", "bold", "b"],
        (false, true) => &[" italic", "-italic", "italic", "i", " oblique", "-oblique"],
        (true, true) => &[
            " bold italic",
            "-bolditalic",
            "bolditalic",
            "bi",
            " bold oblique",
            "-boldoblique",
        ],
    };
    suffixes
        .iter()
        .map(|suffix| format!("{key}{suffix}"))
        .collect()
}

fn is_font_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "ttf" | "otf"))
        .unwrap_or(false)
}

fn scale_i16(value: i16, scale: f32) -> i16 {
    let scaled = (value as f32 * scale).round() as i32;
    scaled.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

/// Unicode character for a WinAnsi code.
pub(crate) fn winansi_char(code: u8) -> Option<char> {
    let ch = match code {
        0x80 => '\u{20AC}',
        0x82 => '\u{201A}',
        0x83 => '\u{0192}',
        0x84 => '\u{201E}',
        0x85 => '\u{2026}',
        0x86 => '\u{2020}',
        0x87 => '\u{2021}',
        0x88 => '\u{02C6}',
        0x89 => '\u{2030}',
        0x8A => '\u{0160}',
        0x8B => '\u{2039}',
        0x8C => '\u{0152}',
        0x8E => '\u{017D}',
        0x91 => '\u{2018}',
        0x92 => '\u{2019}',
        0x93 => '\u{201C}',
        0x94 => '\u{201D}',
        0x95 => '\u{2022}',
        0x96 => '\u{2013}',
        0x97 => '\u{2014}',
        0x98 => '\u{02DC}',
        0x99 => '\u{2122}',
        0x9A => '\u{0161}',
        0x9B => '\u{203A}',
        0x9C => '\u{0153}',
        0x9E => '\u{017E}',
        0x9F => '\u{0178}',
        0x81 | 0x8D | 0x8F | 0x90 | 0x9D => return None,
        other => other as char,
    };
    Some(ch)
}

/// WinAnsi code for a Unicode character, if it has one.
pub(crate) fn winansi_code(ch: char) -> Option<u8> {
    let code = ch as u32;
    if code < 0x80 || (0xA0..=0xFF).contains(&code) {
        return Some(code as u8);
    }
    (0x80u8..=0x9F).find(|&byte| winansi_char(byte) == Some(ch))
}

fn font_names(face: &ttf_parser::Face<'_>, path: &Path) -> (String, Vec<String>) {
    use ttf_parser::name::name_id;

    let mut family = None;
    let mut full = None;
    let mut post = None;
    for entry in face.names() {
        let Some(name) = entry.to_string() else {
            continue;
        };
        let slot = match entry.name_id {
            name_id::TYPOGRAPHIC_FAMILY | name_id::FAMILY => &mut family,
            name_id::FULL_NAME => &mut full,
            name_id::POST_SCRIPT_NAME => &mut post,
            _ => continue,
        };
        slot.get_or_insert(name);
    }
    let stem = path
        .file_stem()
        .and_then(|v| v.to_str())
        .map(str::to_string);
    let primary = post
        .clone()
        .or_else(|| full.clone())
        .or_else(|| stem.clone())
        .or_else(|| family.clone())
        .unwrap_or_else(|| "EmbeddedFont".to_string());
    // The bare family name is only an alias when the face is the regular one;
    // registering it for a bold face would shadow the regular style.
    let is_regular = !face.is_bold() && !face.is_italic();
    let aliases = [full, post, stem]
        .into_iter()
        .flatten()
        .chain(family.filter(|_| is_regular))
        .filter(|candidate| *candidate != primary)
        .collect();
    (primary, aliases)
}

fn normalize_name(name: &str) -> String {
    name.trim()
        .trim_matches('"')
        .trim_matches('\'')
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn style_letters_parse_case_insensitively() {
        let style = FontStyle::parse("bIuD");
        assert!(style.bold && style.italic && style.underline && style.strikethrough);
        assert_eq!(FontStyle::parse("xz"), FontStyle::default());
    }

    #[test]
    fn core_families_resolve_with_style() {
        let registry = FontRegistry::new();
        let bold = FontStyle::parse("B");
        assert_eq!(registry.resolve("helvetica", bold).name, "Helvetica-Bold");
        assert_eq!(registry.resolve("Arial", FontStyle::default()).name, "Helvetica");
        assert_eq!(registry.resolve("timesbi", FontStyle::default()).name, "Times-BoldItalic");
        assert_eq!(registry.resolve("courier", FontStyle::parse("I")).name, "Courier-Oblique");
    }

    #[test]
    fn unknown_family_falls_back_to_helvetica() {
        let registry = FontRegistry::new();
        let resolved = registry.resolve("cid0jp", FontStyle::default());
        assert_eq!(resolved.name, "Helvetica");
        assert!(resolved.fallback);
    }

    #[test]
    fn core_widths_follow_the_afm_tables() {
        let registry = FontRegistry::new();
        let size = Pt::from_f32(10.0);
        // "Hi": H 722 + i 222 = 944/1000 * 10pt
        assert_eq!(registry.measure("Helvetica", size, "Hi").to_milli_i64(), 9_440);
        assert_eq!(registry.measure("Courier", size, "abc").to_milli_i64(), 18_000);
        let regular = registry.measure("Helvetica", size, "bold");
        let bold = registry.measure("Helvetica-Bold", size, "bold");
        assert!(bold > regular);
    }

    #[test]
    fn text_measure_resolves_the_face() {
        let registry = FontRegistry::new();
        let face = FontFace::new("times", FontStyle::default(), 20.0);
        // W 944 / 1000 * 20pt
        assert_eq!(registry.text_width(&face, "W").to_milli_i64(), 18_880);
    }

    #[test]
    fn unregistered_names_use_the_average_width() {
        let registry = FontRegistry::new();
        let width = registry.measure("Nope", Pt::from_f32(10.0), "abcd");
        assert_eq!(width.to_milli_i64(), 24_000);
    }

    #[test]
    fn invalid_font_bytes_are_rejected() {
        let mut registry = FontRegistry::new();
        let err = registry
            .register_bytes(b"not a font".to_vec(), Some("broken.ttf"))
            .unwrap_err();
        assert!(matches!(err, StencilError::Font(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn winansi_round_trips_extension_characters() {
        assert_eq!(winansi_code('\u{20AC}'), Some(0x80));
        assert_eq!(winansi_char(0x80), Some('\u{20AC}'));
        assert_eq!(winansi_code('\u{4E2D}'), None);
        assert_eq!(winansi_code('é'), Some(0xE9));
    }
}
