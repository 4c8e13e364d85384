use crate::error::{Result, StencilError};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_NAME: &str = "doc.pdf";

/// How a finished document is handed over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputMode {
    /// `I`: bytes for inline display.
    #[default]
    Inline,
    /// `D`: bytes as a download.
    Download,
    /// `F`: written to the path given as the name, nothing sent.
    SaveToPath,
    /// `FI`
    SaveThenInline,
    /// `FD`
    SaveThenDownload,
}

impl OutputMode {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputMode::Inline => "I",
            OutputMode::Download => "D",
            OutputMode::SaveToPath => "F",
            OutputMode::SaveThenInline => "FI",
            OutputMode::SaveThenDownload => "FD",
        }
    }

    pub fn saves(self) -> bool {
        matches!(
            self,
            OutputMode::SaveToPath | OutputMode::SaveThenInline | OutputMode::SaveThenDownload
        )
    }

    fn disposition(self) -> Option<&'static str> {
        match self {
            OutputMode::Inline | OutputMode::SaveThenInline => Some("inline"),
            OutputMode::Download | OutputMode::SaveThenDownload => Some("attachment"),
            OutputMode::SaveToPath => None,
        }
    }
}

impl FromStr for OutputMode {
    type Err = StencilError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "" | "I" => Ok(OutputMode::Inline),
            "D" => Ok(OutputMode::Download),
            "F" => Ok(OutputMode::SaveToPath),
            "FI" => Ok(OutputMode::SaveThenInline),
            "FD" => Ok(OutputMode::SaveThenDownload),
            other => Err(StencilError::InvalidConfiguration(format!(
                "unknown output mode `{other}` (expected I, D, F, FI or FD)"
            ))),
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the caller should send and what was written. Transport is up to the
/// caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub bytes: Option<Vec<u8>>,
    /// `Content-Disposition` header value for the bytes.
    pub content_disposition: Option<String>,
    pub saved_to: Option<PathBuf>,
}

/// Applies `mode` to finished bytes. `name` is the download file name and,
/// for the saving modes, the destination path; empty means `doc.pdf`.
pub fn deliver(bytes: Vec<u8>, name: &str, mode: OutputMode) -> Result<Delivery> {
    let name = if name.trim().is_empty() {
        DEFAULT_NAME
    } else {
        name.trim()
    };
    let saved_to = if mode.saves() {
        let path = PathBuf::from(name);
        std::fs::write(&path, &bytes)?;
        log::debug!("saved {} bytes to {}", bytes.len(), path.display());
        Some(path)
    } else {
        None
    };
    let content_disposition = mode
        .disposition()
        .map(|kind| format!("{kind}; filename=\"{}\"", file_name(name)));
    Ok(Delivery {
        bytes: content_disposition.is_some().then_some(bytes),
        content_disposition,
        saved_to,
    })
}

fn file_name(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(DEFAULT_NAME);
    base.chars()
        .filter(|ch| *ch != '"' && !ch.is_control())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_single_letter_selectors() {
        for (raw, mode) in [
            ("I", OutputMode::Inline),
            ("d", OutputMode::Download),
            ("F", OutputMode::SaveToPath),
            ("fi", OutputMode::SaveThenInline),
            ("FD", OutputMode::SaveThenDownload),
            ("", OutputMode::Inline),
        ] {
            assert_eq!(raw.parse::<OutputMode>().unwrap(), mode);
        }
        assert!(matches!(
            "X".parse::<OutputMode>(),
            Err(StencilError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn inline_and_download_only_return_bytes() {
        let inline = deliver(b"%PDF".to_vec(), "", OutputMode::Inline).unwrap();
        assert_eq!(inline.bytes.as_deref(), Some(b"%PDF".as_slice()));
        assert_eq!(
            inline.content_disposition.as_deref(),
            Some("inline; filename=\"doc.pdf\"")
        );
        assert_eq!(inline.saved_to, None);

        let download = deliver(b"%PDF".to_vec(), "reports/q1.pdf", OutputMode::Download).unwrap();
        assert_eq!(
            download.content_disposition.as_deref(),
            Some("attachment; filename=\"q1.pdf\"")
        );
    }

    #[test]
    fn saving_modes_write_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.pdf");
        let name = target.to_str().unwrap();

        let saved = deliver(b"%PDF-1".to_vec(), name, OutputMode::SaveToPath).unwrap();
        assert_eq!(saved.bytes, None);
        assert_eq!(saved.content_disposition, None);
        assert_eq!(saved.saved_to.as_deref(), Some(target.as_path()));
        assert_eq!(std::fs::read(&target).unwrap(), b"%PDF-1");

        let both = deliver(b"%PDF-2".to_vec(), name, OutputMode::SaveThenDownload).unwrap();
        assert_eq!(both.bytes.as_deref(), Some(b"%PDF-2".as_slice()));
        assert_eq!(
            both.content_disposition.as_deref(),
            Some("attachment; filename=\"out.pdf\"")
        );
        assert_eq!(std::fs::read(&target).unwrap(), b"%PDF-2");
    }
}
