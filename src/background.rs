use crate::assets::{self, AssetKind, ImageStore};
use crate::canvas::Canvas;
use crate::error::{LeniencyPolicy, Result, StencilError};
use crate::template::PageSpec;
use crate::types::Pt;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackgroundKind {
    /// A raster image drawn full-bleed.
    Raster,
    /// A page of another PDF, imported beneath the content.
    Document { page: u32 },
}

/// Result of placing one page's background.
#[derive(Debug, Clone, PartialEq)]
pub enum BackgroundOutcome {
    Absent,
    Placed(BackgroundKind),
    /// The lenient policy skipped a background that does not exist.
    Missing(String),
    /// The lenient policy skipped a file that is neither a PDF nor an image.
    Unsupported(String),
}

impl BackgroundOutcome {
    pub fn kind(&self) -> Option<BackgroundKind> {
        match self {
            BackgroundOutcome::Placed(kind) => Some(*kind),
            _ => None,
        }
    }
}

/// Locates, classifies and draws page backgrounds.
#[derive(Debug, Clone, Copy)]
pub struct BackgroundResolver<'a> {
    template_dir: Option<&'a Path>,
    policy: LeniencyPolicy,
}

impl<'a> BackgroundResolver<'a> {
    pub fn new(template_dir: Option<&'a Path>, policy: LeniencyPolicy) -> Self {
        Self {
            template_dir,
            policy,
        }
    }

    /// Places `page.background` on the open canvas page. The canvas
    /// page-break configuration is the same after the call as before it, on
    /// every path.
    pub fn place(
        &self,
        canvas: &mut Canvas,
        page: &PageSpec,
        images: &mut ImageStore,
    ) -> Result<BackgroundOutcome> {
        let Some(name) = page.background.as_deref() else {
            return Ok(BackgroundOutcome::Absent);
        };
        let Some(path) = assets::resolve_path(self.template_dir, name) else {
            return self.skip(BackgroundOutcome::Missing(name.to_string()), name);
        };
        let data = std::fs::read(&path)?;
        match assets::sniff(&data) {
            AssetKind::Pdf => {
                let page_number = page.background_page();
                check_page_exists(&data, page_number, &path)?;
                let width = canvas.page_size().width;
                canvas.import_page(path, page_number, Pt::ZERO, Pt::ZERO, width);
                log::debug!("background {name}: page {page_number} of a PDF");
                Ok(BackgroundOutcome::Placed(BackgroundKind::Document {
                    page: page_number,
                }))
            }
            AssetKind::Image(_) => {
                place_raster(canvas, &data, images)?;
                log::debug!("background {name}: raster image");
                Ok(BackgroundOutcome::Placed(BackgroundKind::Raster))
            }
            AssetKind::Other => self.skip(BackgroundOutcome::Unsupported(name.to_string()), name),
        }
    }

    fn skip(&self, outcome: BackgroundOutcome, name: &str) -> Result<BackgroundOutcome> {
        if self.policy.is_strict() {
            return Err(StencilError::MissingAsset(PathBuf::from(name)));
        }
        Ok(outcome)
    }
}

/// Full-bleed image with auto page breaks off; the previous break mode and
/// margin come back before the page mark is set.
fn place_raster(canvas: &mut Canvas, data: &[u8], images: &mut ImageStore) -> Result<()> {
    let saved = canvas.page_break();
    canvas.set_auto_page_break(false, Pt::ZERO);
    let placed = images.insert(data).map(|(id, _, _)| {
        let size = canvas.page_size();
        canvas.place_image(Pt::ZERO, Pt::ZERO, size.width, size.height, id);
    });
    canvas.set_page_break(saved);
    placed?;
    canvas.set_page_mark();
    Ok(())
}

fn check_page_exists(data: &[u8], page_number: u32, path: &Path) -> Result<()> {
    let source = lopdf::Document::load_mem(data)?;
    let count = source.get_pages().len();
    if page_number as usize > count {
        return Err(StencilError::Pdf(format!(
            "{} has {count} page(s), cannot import page {page_number}",
            path.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::test_support::png_bytes;
    use crate::canvas::{Command, PageBreak};
    use crate::finalize::test_support::pdf_with_pages;
    use crate::types::{Margins, Size};
    use std::fs;

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
                margin: Pt::from_f32(42.0),
            },
        );
        canvas.add_page();
        canvas
    }

    fn page(background: &str, background_page: Option<f32>) -> PageSpec {
        PageSpec {
            background: Some(background.to_string()),
            background_page,
            data: Vec::new(),
        }
    }

    fn fixtures() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bg.png"), png_bytes(4, 6, 255)).unwrap();
        fs::write(dir.path().join("corrupt.png"), b"\x89PNG\r\n\x1a\nbroken").unwrap();
        fs::write(dir.path().join("notes.txt"), b"hello").unwrap();
        fs::write(dir.path().join("letterhead.pdf"), pdf_with_pages(2)).unwrap();
        dir
    }

    #[test]
    fn raster_background_is_full_bleed_and_marks_the_page() {
        let dir = fixtures();
        let resolver = BackgroundResolver::new(Some(dir.path()), LeniencyPolicy::Lenient);
        let mut canvas = canvas();
        let before = canvas.page_break();
        let mut images = ImageStore::new();

        let outcome = resolver.place(&mut canvas, &page("bg.png", None), &mut images).unwrap();
        assert_eq!(outcome, BackgroundOutcome::Placed(BackgroundKind::Raster));
        assert_eq!(canvas.page_break(), before);
        assert_eq!(images.len(), 1);

        let document = canvas.finish();
        let size = Size::a4();
        assert_eq!(
            document.pages[0].commands,
            vec![Command::DrawImage {
                x: Pt::ZERO,
                y: Pt::ZERO,
                width: size.width,
                height: size.height,
                resource_id: "Im1".to_string(),
            }]
        );
        assert_eq!(document.pages[0].content_start(), 1);
    }

    #[test]
    fn page_break_state_survives_every_path() {
        let dir = fixtures();
        let mut images = ImageStore::new();
        for (name, policy) in [
            ("bg.png", LeniencyPolicy::Lenient),
            ("corrupt.png", LeniencyPolicy::Lenient),
            ("notes.txt", LeniencyPolicy::Lenient),
            ("notes.txt", LeniencyPolicy::Strict),
            ("missing.png", LeniencyPolicy::Lenient),
            ("missing.png", LeniencyPolicy::Strict),
            ("letterhead.pdf", LeniencyPolicy::Lenient),
        ] {
            let resolver = BackgroundResolver::new(Some(dir.path()), policy);
            let mut canvas = canvas();
            canvas.set_auto_page_break(true, Pt::from_f32(17.0));
            let before = canvas.page_break();
            let _ = resolver.place(&mut canvas, &page(name, None), &mut images);
            assert_eq!(canvas.page_break(), before, "{name} {policy:?}");
            assert_eq!(canvas.page_number(), 1, "{name}");
        }
    }

    #[test]
    fn corrupt_image_is_an_error() {
        let dir = fixtures();
        let resolver = BackgroundResolver::new(Some(dir.path()), LeniencyPolicy::Lenient);
        let err = resolver
            .place(&mut canvas(), &page("corrupt.png", None), &mut ImageStore::new())
            .unwrap_err();
        assert!(matches!(err, StencilError::Image(_)));
    }

    #[test]
    fn missing_background_follows_the_policy() {
        let dir = fixtures();
        let lenient = BackgroundResolver::new(Some(dir.path()), LeniencyPolicy::Lenient);
        let outcome = lenient
            .place(&mut canvas(), &page("missing.png", None), &mut ImageStore::new())
            .unwrap();
        assert_eq!(outcome, BackgroundOutcome::Missing("missing.png".to_string()));

        let strict = BackgroundResolver::new(Some(dir.path()), LeniencyPolicy::Strict);
        let err = strict
            .place(&mut canvas(), &page("missing.png", None), &mut ImageStore::new())
            .unwrap_err();
        assert!(matches!(err, StencilError::MissingAsset(_)));
    }

    #[test]
    fn unsupported_files_count_as_missing() {
        let dir = fixtures();
        let resolver = BackgroundResolver::new(Some(dir.path()), LeniencyPolicy::Lenient);
        let mut canvas = canvas();
        let outcome = resolver
            .place(&mut canvas, &page("notes.txt", None), &mut ImageStore::new())
            .unwrap();
        assert_eq!(outcome, BackgroundOutcome::Unsupported("notes.txt".to_string()));
        assert_eq!(canvas.current_command_count(), 0);
    }

    #[test]
    fn pdf_background_records_the_requested_page() {
        let dir = fixtures();
        let resolver = BackgroundResolver::new(Some(dir.path()), LeniencyPolicy::Lenient);
        let mut canvas = canvas();
        let outcome = resolver
            .place(&mut canvas, &page("letterhead.pdf", Some(2.0)), &mut ImageStore::new())
            .unwrap();
        assert_eq!(outcome.kind(), Some(BackgroundKind::Document { page: 2 }));
        let document = canvas.finish();
        assert_eq!(
            document.pages[0].commands,
            vec![Command::ImportPage {
                source: dir.path().join("letterhead.pdf"),
                page_number: 2,
                x: Pt::ZERO,
                y: Pt::ZERO,
                width: Size::a4().width,
            }]
        );
    }

    #[test]
    fn pdf_page_out_of_range_is_fatal() {
        let dir = fixtures();
        let resolver = BackgroundResolver::new(Some(dir.path()), LeniencyPolicy::Lenient);
        let err = resolver
            .place(&mut canvas(), &page("letterhead.pdf", Some(3.0)), &mut ImageStore::new())
            .unwrap_err();
        assert!(matches!(err, StencilError::Pdf(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn no_background_is_absent() {
        let resolver = BackgroundResolver::new(None, LeniencyPolicy::Strict);
        let outcome = resolver
            .place(&mut canvas(), &PageSpec::default(), &mut ImageStore::new())
            .unwrap();
        assert_eq!(outcome, BackgroundOutcome::Absent);
    }
}
