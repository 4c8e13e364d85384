use crate::error::{Result, StencilError};
use base64::Engine;
use image::GenericImageView;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

/// What an asset's bytes turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Pdf,
    Image(image::ImageFormat),
    Other,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Pdf => "pdf",
            AssetKind::Image(_) => "image",
            AssetKind::Other => "other",
        }
    }
}

/// Classifies by content, not by file extension.
pub fn sniff(data: &[u8]) -> AssetKind {
    if data.starts_with(b"%PDF-") {
        return AssetKind::Pdf;
    }
    match image::guess_format(data) {
        Ok(format) => AssetKind::Image(format),
        Err(_) => AssetKind::Other,
    }
}

#[derive(Debug, Clone)]
pub struct Asset {
    /// The reference as written in the template.
    pub name: String,
    pub kind: AssetKind,
    pub data: Vec<u8>,
    /// File the bytes were read from; `None` for `data:` URIs.
    pub path: Option<PathBuf>,
}

/// Finds a template-relative asset: `template_dir/name` first, then `name`
/// itself.
pub fn resolve_path(template_dir: Option<&Path>, name: &str) -> Option<PathBuf> {
    if let Some(dir) = template_dir {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    let literal = PathBuf::from(name);
    literal.is_file().then_some(literal)
}

/// Loads an asset from a `data:` URI or a template-relative path.
pub fn load(template_dir: Option<&Path>, name: &str) -> Result<Asset> {
    if let Some((_mime, data)) = parse_data_uri(name) {
        return Ok(Asset {
            name: truncate(name, 48),
            kind: sniff(&data),
            data,
            path: None,
        });
    }
    let path = resolve_path(template_dir, name)
        .ok_or_else(|| StencilError::MissingAsset(PathBuf::from(name)))?;
    let data = std::fs::read(&path)?;
    Ok(Asset {
        name: name.to_string(),
        kind: sniff(&data),
        data,
        path: Some(path),
    })
}

pub fn parse_data_uri(uri: &str) -> Option<(String, Vec<u8>)> {
    let rest = uri.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    let mime = header
        .split(';')
        .next()
        .filter(|mime| !mime.is_empty())
        .unwrap_or("application/octet-stream")
        .to_string();
    let data = if header.split(';').any(|part| part == "base64") {
        base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .ok()?
    } else {
        payload.as_bytes().to_vec()
    };
    Some((mime, data))
}

fn truncate(raw: &str, max_chars: usize) -> String {
    if raw.chars().count() <= max_chars {
        return raw.to_string();
    }
    let mut out: String = raw.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

/// A raster image ready to become a PDF image XObject.
#[derive(Debug, Clone)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub(crate) color_space: &'static str,
    pub(crate) bits_per_component: u8,
    pub(crate) filter: &'static str,
    pub(crate) data: Vec<u8>,
    pub(crate) alpha: Option<Vec<u8>>,
}

/// JPEG data passes through as DCT; everything else is decoded to RGB with
/// a flate-compressed soft mask when any pixel is translucent.
pub fn decode_image(data: &[u8]) -> Result<ImageData> {
    let format = image::guess_format(data).map_err(|err| StencilError::Image(err.to_string()))?;
    let decoded =
        image::load_from_memory(data).map_err(|err| StencilError::Image(err.to_string()))?;
    let (width, height) = decoded.dimensions();

    if format == image::ImageFormat::Jpeg {
        let color_space = match decoded.color() {
            image::ColorType::L8 | image::ColorType::La8 => "/DeviceGray",
            _ => "/DeviceRGB",
        };
        return Ok(ImageData {
            width,
            height,
            color_space,
            bits_per_component: 8,
            filter: "/DCTDecode",
            data: data.to_vec(),
            alpha: None,
        });
    }

    let rgba = decoded.to_rgba8();
    let mut rgb = Vec::with_capacity((width as usize) * (height as usize) * 3);
    let mut alpha = Vec::with_capacity((width as usize) * (height as usize));
    for pixel in rgba.pixels() {
        let [r, g, b, a] = pixel.0;
        rgb.extend_from_slice(&[r, g, b]);
        alpha.push(a);
    }
    let alpha = if alpha.iter().any(|a| *a != 255) {
        Some(flate_compress(&alpha)?)
    } else {
        None
    };
    Ok(ImageData {
        width,
        height,
        color_space: "/DeviceRGB",
        bits_per_component: 8,
        filter: "/FlateDecode",
        data: flate_compress(&rgb)?,
        alpha,
    })
}

fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&hasher.finalize());
    digest
}

pub(crate) fn flate_compress(data: &[u8]) -> Result<Vec<u8>> {
    use flate2::Compression;
    use flate2::write::ZlibEncoder;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Decoded images of one document, keyed by resource id. Identical images
/// share one entry.
#[derive(Debug, Default)]
pub struct ImageStore {
    images: Vec<(String, ImageData)>,
    by_digest: HashMap<[u8; 32], usize>,
}

impl ImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes and stores an image, returning its resource id and pixel
    /// size.
    pub fn insert(&mut self, data: &[u8]) -> Result<(String, u32, u32)> {
        let digest = sha256(data);
        if let Some(index) = self.by_digest.get(&digest) {
            if let Some((id, image)) = self.images.get(*index) {
                return Ok((id.clone(), image.width, image.height));
            }
        }
        let image = decode_image(data)?;
        let id = format!("Im{}", self.images.len() + 1);
        let size = (image.width, image.height);
        self.by_digest.insert(digest, self.images.len());
        self.images.push((id.clone(), image));
        Ok((id, size.0, size.1))
    }

    pub fn get(&self, id: &str) -> Option<&ImageData> {
        self.images
            .iter()
            .find(|(key, _)| key == id)
            .map(|(_, image)| image)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ImageData)> {
        self.images.iter().map(|(id, image)| (id.as_str(), image))
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}
