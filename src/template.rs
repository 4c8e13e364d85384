use crate::error::{Result, StencilError};
use crate::types::{Orientation, PageFormat, Units};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_LEFT_MARGIN: f32 = 15.0;
pub const DEFAULT_TOP_MARGIN: f32 = 27.0;
pub const DEFAULT_RIGHT_MARGIN: f32 = 15.0;
pub const DEFAULT_BOTTOM_MARGIN: f32 = 25.0;
pub const DEFAULT_FONT: &str = "helvetica";
pub const DEFAULT_FONT_SIZE: f32 = 16.0;

/// Where a template comes from.
#[derive(Debug, Clone)]
pub enum TemplateSource {
    /// A JSON file on disk. Relative asset paths resolve against its directory.
    Path(PathBuf),
    /// JSON text.
    Json(String),
    Value(Value),
    Settings(TemplateSettings),
}

impl From<&str> for TemplateSource {
    /// A string naming an existing file is a path, anything else is JSON text.
    fn from(raw: &str) -> Self {
        if Path::new(raw).is_file() {
            TemplateSource::Path(PathBuf::from(raw))
        } else {
            TemplateSource::Json(raw.to_string())
        }
    }
}

impl From<String> for TemplateSource {
    fn from(raw: String) -> Self {
        TemplateSource::from(raw.as_str())
    }
}

impl From<&Path> for TemplateSource {
    fn from(path: &Path) -> Self {
        TemplateSource::Path(path.to_path_buf())
    }
}

impl From<PathBuf> for TemplateSource {
    fn from(path: PathBuf) -> Self {
        TemplateSource::Path(path)
    }
}

impl From<Value> for TemplateSource {
    fn from(value: Value) -> Self {
        TemplateSource::Value(value)
    }
}

impl From<TemplateSettings> for TemplateSource {
    fn from(settings: TemplateSettings) -> Self {
        TemplateSource::Settings(settings)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateSettings {
    #[serde(default, deserialize_with = "info_or_default")]
    pub info: DocumentInfo,
    pub pages: Vec<PageSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentInfo {
    pub page_orientation: Orientation,
    pub page_units: Units,
    pub page_format: PageFormat,
    #[serde(deserialize_with = "opt_string")]
    pub author: Option<String>,
    #[serde(deserialize_with = "opt_string")]
    pub title: Option<String>,
    #[serde(deserialize_with = "opt_string")]
    pub subject: Option<String>,
    #[serde(deserialize_with = "opt_string")]
    pub keywords: Option<String>,
    #[serde(rename = "left-margin", deserialize_with = "opt_number")]
    pub left_margin: Option<f32>,
    #[serde(rename = "top-margin", deserialize_with = "opt_number")]
    pub top_margin: Option<f32>,
    #[serde(rename = "right-margin", deserialize_with = "opt_number")]
    pub right_margin: Option<f32>,
    #[serde(rename = "bottom-margin", deserialize_with = "opt_number")]
    pub bottom_margin: Option<f32>,
    #[serde(rename = "auto-page-break")]
    pub auto_page_break: Option<bool>,
    #[serde(rename = "default-font", deserialize_with = "opt_string")]
    pub default_font: Option<String>,
    #[serde(rename = "default-font-size", deserialize_with = "opt_number")]
    pub default_font_size: Option<f32>,
    #[serde(rename = "default-font-style", deserialize_with = "opt_string")]
    pub default_font_style: Option<String>,
}

impl DocumentInfo {
    pub fn left_margin(&self) -> f32 {
        self.left_margin.unwrap_or(DEFAULT_LEFT_MARGIN)
    }

    pub fn top_margin(&self) -> f32 {
        self.top_margin.unwrap_or(DEFAULT_TOP_MARGIN)
    }

    pub fn right_margin(&self) -> f32 {
        self.right_margin.unwrap_or(DEFAULT_RIGHT_MARGIN)
    }

    pub fn bottom_margin(&self) -> f32 {
        self.bottom_margin.unwrap_or(DEFAULT_BOTTOM_MARGIN)
    }

    pub fn auto_page_break(&self) -> bool {
        self.auto_page_break.unwrap_or(true)
    }

    pub fn default_font(&self) -> &str {
        self.default_font.as_deref().unwrap_or(DEFAULT_FONT)
    }

    pub fn default_font_size(&self) -> f32 {
        match self.default_font_size {
            Some(size) if size > 0.0 => size,
            _ => DEFAULT_FONT_SIZE,
        }
    }

    pub fn default_font_style(&self) -> &str {
        self.default_font_style.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageSpec {
    #[serde(default, deserialize_with = "opt_string")]
    pub background: Option<String>,
    #[serde(default, deserialize_with = "opt_number")]
    pub background_page: Option<f32>,
    #[serde(default, deserialize_with = "entries_or_empty")]
    pub data: Vec<ContentEntry>,
}

impl PageSpec {
    /// 1-based page of a PDF background to import.
    pub fn background_page(&self) -> u32 {
        match self.background_page {
            Some(page) if page >= 1.0 => page as u32,
            _ => 1,
        }
    }
}

/// One element of a page's `data` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentEntry {
    Shorthand(String),
    Spec(DirectiveSpec),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectiveSpec {
    #[serde(deserialize_with = "number_or_zero")]
    pub x: f32,
    #[serde(deserialize_with = "number_or_zero")]
    pub y: f32,
    #[serde(deserialize_with = "opt_string")]
    pub text: Option<String>,
    #[serde(deserialize_with = "opt_string")]
    pub image: Option<String>,
    #[serde(deserialize_with = "opt_string")]
    pub html: Option<String>,
    #[serde(deserialize_with = "opt_string")]
    pub font: Option<String>,
    #[serde(rename = "font-style", deserialize_with = "opt_string")]
    pub font_style: Option<String>,
    #[serde(rename = "font-size", deserialize_with = "opt_number")]
    pub font_size: Option<f32>,
    #[serde(deserialize_with = "opt_number")]
    pub w: Option<f32>,
    #[serde(deserialize_with = "opt_number")]
    pub h: Option<f32>,
    #[serde(rename = "max-width", deserialize_with = "opt_number")]
    pub max_width: Option<f32>,
}

/// A template ready for rendering, plus the directory relative assets
/// resolve against when it was loaded from a file.
#[derive(Debug, Clone)]
pub struct LoadedTemplate {
    pub settings: TemplateSettings,
    pub template_dir: Option<PathBuf>,
}

pub fn load(source: TemplateSource) -> Result<LoadedTemplate> {
    match source {
        TemplateSource::Path(path) => {
            let raw = fs::read_to_string(&path)?;
            let settings = parse_json(&raw)?;
            let template_dir = path
                .parent()
                .map(Path::to_path_buf)
                .filter(|dir| !dir.as_os_str().is_empty());
            log::debug!(
                "loaded template {} ({} pages)",
                path.display(),
                settings.pages.len()
            );
            Ok(LoadedTemplate {
                settings,
                template_dir,
            })
        }
        TemplateSource::Json(raw) => Ok(LoadedTemplate {
            settings: parse_json(&raw)?,
            template_dir: None,
        }),
        TemplateSource::Value(value) => Ok(LoadedTemplate {
            settings: serde_json::from_value(value)?,
            template_dir: None,
        }),
        TemplateSource::Settings(settings) => Ok(LoadedTemplate {
            settings,
            template_dir: None,
        }),
    }
}

fn parse_json(raw: &str) -> Result<TemplateSettings> {
    if raw.trim().is_empty() {
        return Err(StencilError::TemplateParse("template is empty".to_string()));
    }
    Ok(serde_json::from_str(raw)?)
}

fn info_or_default<'de, D>(deserializer: D) -> std::result::Result<DocumentInfo, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<DocumentInfo>::deserialize(deserializer)?.unwrap_or_default())
}

fn entries_or_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<ContentEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<ContentEntry>>::deserialize(deserializer)?.unwrap_or_default())
}

// Template authors write numbers as JSON numbers or numeric strings; empty
// strings and null mean "not set".
fn opt_number<'de, D>(deserializer: D) -> std::result::Result<Option<f32>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(number)) => number
            .as_f64()
            .map(|value| Some(value as f32))
            .ok_or_else(|| D::Error::custom(format!("number out of range: {number}"))),
        Some(Value::String(raw)) => {
            let raw = raw.trim();
            if raw.is_empty() {
                return Ok(None);
            }
            raw.parse::<f32>()
                .map(Some)
                .map_err(|_| D::Error::custom(format!("expected a number, found `{raw}`")))
        }
        Some(other) => Err(D::Error::custom(format!("expected a number, found {other}"))),
    }
}

fn number_or_zero<'de, D>(deserializer: D) -> std::result::Result<f32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(opt_number(deserializer)?.unwrap_or(0.0))
}

fn opt_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(raw)) if raw.is_empty() => Ok(None),
        Some(Value::String(raw)) => Ok(Some(raw)),
        Some(Value::Number(number)) => Ok(Some(number.to_string())),
        Some(Value::Bool(flag)) => Ok(Some(flag.to_string())),
        Some(other) => Err(D::Error::custom(format!("expected a string, found {other}"))),
    }
}
