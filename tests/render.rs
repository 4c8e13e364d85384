use image::{ImageFormat, Rgba, RgbaImage};
use lopdf::{Document as LoDocument, Object, Stream, dictionary};
use pdf_stencil::{
    BackgroundKind, FnPageHooks, LeniencyPolicy, OutputMode, PdfGenerator, RenderWarning,
    StencilError,
};
use serde_json::{Value, json};
use std::io::Cursor;
use std::path::Path;

fn png(width: u32, height: u32) -> Vec<u8> {
    let image = RgbaImage::from_pixel(width, height, Rgba([20, 120, 200, 255]));
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

fn pdf_with_pages(count: usize) -> Vec<u8> {
    let mut doc = LoDocument::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });
    let mut kids = Vec::new();
    for number in 1..=count {
        let content = format!("BT /F1 24 Tf 72 700 Td (Source {number}) Tj ET").into_bytes();
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        kids.push(page_id.into());
    }
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

fn write_template(dir: &Path, template: &Value) -> std::path::PathBuf {
    let path = dir.join("template.json");
    std::fs::write(&path, serde_json::to_vec_pretty(template).unwrap()).unwrap();
    path
}

fn first_page_content(bytes: &[u8]) -> String {
    let doc = LoDocument::load_mem(bytes).unwrap();
    let page_id = *doc.get_pages().get(&1).unwrap();
    String::from_utf8_lossy(&doc.get_page_content(page_id).unwrap()).into_owned()
}

fn streams_with_subtype(doc: &LoDocument, subtype: &[u8]) -> Vec<Vec<u8>> {
    doc.objects
        .values()
        .filter_map(|object| match object {
            Object::Stream(stream) => Some(stream),
            _ => None,
        })
        .filter(|stream| {
            stream
                .dict
                .get(b"Subtype")
                .and_then(Object::as_name)
                .map(|name| name == subtype)
                .unwrap_or(false)
        })
        .map(|stream| {
            stream
                .decompressed_content()
                .unwrap_or_else(|_| stream.content.clone())
        })
        .collect()
}

#[test]
fn shorthand_text_wraps_inside_its_width() {
    let generator = PdfGenerator::builder().build().unwrap();
    let template = json!({
        "info": { "page_units": "pt" },
        "pages": [ { "data": ["10|20|Hello {name}|B|12|50"] } ]
    });
    let out = generator
        .render(template, &json!({ "name": "World" }))
        .unwrap();

    let raw = String::from_utf8_lossy(&out.bytes).into_owned();
    assert!(raw.contains("/BaseFont /Helvetica-Bold"));
    let content = first_page_content(&out.bytes);
    assert!(content.contains("(Hello) Tj"));
    assert!(content.contains("(World) Tj"));
    assert!(!content.contains("(Hello World) Tj"));
    assert!(out.report.warnings.is_empty());
}

#[test]
fn line_shorthand_strokes_a_thin_rule() {
    let generator = PdfGenerator::builder().build().unwrap();
    let template = json!({
        "info": { "page_units": "pt" },
        "pages": [ { "data": ["line|10|10|100|10"] } ]
    });
    let out = generator.render(template, &json!({})).unwrap();
    let content = first_page_content(&out.bytes);
    assert!(content.contains("0.567 w"));
    assert!(content.contains(" m\n"));
    assert!(content.contains(" l\nS\n"));
    assert_eq!(out.report.pages[0].directive_count, 1);
}

#[test]
fn unresolved_placeholders_are_blanked_with_a_warning() {
    let generator = PdfGenerator::builder().build().unwrap();
    let template = json!({
        "info": { "page_units": "pt" },
        "pages": [ { "data": ["10|20|Dear {customer.name}!"] } ]
    });
    let out = generator.render(template.clone(), &json!({})).unwrap();
    assert!(first_page_content(&out.bytes).contains("(Dear !) Tj"));
    assert!(matches!(
        out.report.warnings.as_slice(),
        [RenderWarning::UnresolvedVariables { page: 1, .. }]
    ));

    let strict = PdfGenerator::builder()
        .variable_policy(LeniencyPolicy::Strict)
        .build()
        .unwrap();
    let err = strict.render(template, &json!({})).unwrap_err();
    assert!(matches!(err, StencilError::UnresolvedVariable(_)));
}

#[test]
fn raster_background_resolves_next_to_the_template() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("paper.png"), png(40, 60)).unwrap();
    let path = write_template(
        dir.path(),
        &json!({
            "pages": [ { "background": "paper.png", "data": ["20|30|On top"] } ]
        }),
    );

    let generator = PdfGenerator::builder().build().unwrap();
    let out = generator.render(path.as_path(), &json!({})).unwrap();

    assert_eq!(out.report.pages[0].background, Some(BackgroundKind::Raster));
    assert_eq!(out.report.output_pages, 1);
    let doc = LoDocument::load_mem(&out.bytes).unwrap();
    assert_eq!(doc.get_pages().len(), 1);
    assert!(!streams_with_subtype(&doc, b"Image").is_empty());
    let content = first_page_content(&out.bytes);
    let image_at = content.find(" Do").unwrap();
    let text_at = content.find("(On top) Tj").unwrap();
    assert!(image_at < text_at);
}

#[test]
fn pdf_background_imports_the_requested_page() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("letterhead.pdf"), pdf_with_pages(3)).unwrap();
    let path = write_template(
        dir.path(),
        &json!({
            "info": { "page_units": "pt" },
            "pages": [ {
                "background": "letterhead.pdf",
                "background_page": 2,
                "data": ["100|100|Stamped"]
            } ]
        }),
    );

    let generator = PdfGenerator::builder().build().unwrap();
    let out = generator.render(path.as_path(), &json!({})).unwrap();

    assert_eq!(
        out.report.pages[0].background,
        Some(BackgroundKind::Document { page: 2 })
    );
    let doc = LoDocument::load_mem(&out.bytes).unwrap();
    assert_eq!(doc.get_pages().len(), 1);
    let forms = streams_with_subtype(&doc, b"Form");
    assert_eq!(forms.len(), 1);
    let form = String::from_utf8_lossy(&forms[0]);
    assert!(form.contains("(Source 2)"));
    assert!(!form.contains("(Source 1)"));

    let content = first_page_content(&out.bytes);
    let form_at = content.find("/Bg1 Do").unwrap();
    let text_at = content.find("(Stamped) Tj").unwrap();
    assert!(form_at < text_at);
}

#[test]
fn missing_background_follows_the_asset_policy() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_template(
        dir.path(),
        &json!({ "pages": [ { "background": "nowhere.png", "data": ["x"] } ] }),
    );

    let lenient = PdfGenerator::builder().build().unwrap();
    let out = lenient.render(path.as_path(), &json!({})).unwrap();
    assert_eq!(out.report.pages[0].background, None);
    assert!(matches!(
        out.report.warnings.as_slice(),
        [RenderWarning::MissingAsset { page: 1, .. }]
    ));

    let strict = PdfGenerator::builder()
        .asset_policy(LeniencyPolicy::Strict)
        .build()
        .unwrap();
    let err = strict.render(path.as_path(), &json!({})).unwrap_err();
    assert!(matches!(err, StencilError::MissingAsset(_)));
}

#[test]
fn box_x_draws_a_mark_from_the_mark_directory() {
    let marks = tempfile::tempdir().unwrap();
    std::fs::write(marks.path().join("a.png"), png(8, 8)).unwrap();
    let generator = PdfGenerator::builder()
        .mark_dir(marks.path())
        .build()
        .unwrap();
    let out = generator
        .render(
            json!({ "pages": [ { "data": ["box_x|20|20|0", "box|40|20"] } ] }),
            &json!({}),
        )
        .unwrap();
    let doc = LoDocument::load_mem(&out.bytes).unwrap();
    assert_eq!(streams_with_subtype(&doc, b"Image").len(), 1);
    let content = first_page_content(&out.bytes);
    assert_eq!(content.matches(" re\nS\n").count(), 2);
}

#[test]
fn footer_hooks_run_on_every_page() {
    let generator = PdfGenerator::builder()
        .page_hooks(FnPageHooks::new().with_footer(|canvas, ctx| {
            canvas.draw_string(
                pdf_stencil::Pt::from_f32(20.0),
                pdf_stencil::Pt::from_f32(800.0),
                format!("Page {}", ctx.page_number),
            );
        }))
        .build()
        .unwrap();
    let out = generator
        .render(
            json!({ "pages": [ { "data": ["a"] }, { "data": ["b"] } ] }),
            &json!({}),
        )
        .unwrap();
    let doc = LoDocument::load_mem(&out.bytes).unwrap();
    let pages = doc.get_pages();
    assert_eq!(pages.len(), 2);
    for (number, page_id) in pages {
        let content = String::from_utf8_lossy(&doc.get_page_content(page_id).unwrap()).into_owned();
        assert!(content.contains(&format!("(Page {number}) Tj")));
    }
}

#[test]
fn generate_saves_and_returns_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("invoice.pdf");
    let generator = PdfGenerator::builder().build().unwrap();
    let delivery = generator
        .generate(
            json!({ "pages": [ { "data": ["Invoice"] } ] }),
            &json!({}),
            target.to_str().unwrap(),
            "FI".parse::<OutputMode>().unwrap(),
        )
        .unwrap();

    let written = std::fs::read(&target).unwrap();
    assert_eq!(delivery.bytes.as_deref(), Some(written.as_slice()));
    assert_eq!(
        delivery.content_disposition.as_deref(),
        Some("inline; filename=\"invoice.pdf\"")
    );
    assert_eq!(delivery.saved_to.as_deref(), Some(target.as_path()));
}

#[test]
fn malformed_templates_are_rejected() {
    let generator = PdfGenerator::builder().build().unwrap();
    let err = generator.render("{ not json", &json!({})).unwrap_err();
    assert!(matches!(err, StencilError::TemplateParse(_)));
}
