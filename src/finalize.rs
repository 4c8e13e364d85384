use crate::canvas::{Command, Document};
use crate::error::{Result, StencilError};
use crate::pdf::fmt;
use crate::types::Pt;
use lopdf::{Document as LoDocument, Object as LoObject, ObjectId as LoObjectId, Stream as LoStream, dictionary};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    pub pages_stamped: usize,
    pub forms_created: usize,
}

/// Resolves the `ImportPage` commands of `document` against the PDF the
/// writer produced: each referenced source page becomes a Form XObject
/// drawn beneath the page content. Returns the input unchanged when
/// nothing is imported.
pub fn import_background_pages(pdf: Vec<u8>, document: &Document) -> Result<(Vec<u8>, ImportSummary)> {
    let mut summary = ImportSummary {
        pages_stamped: 0,
        forms_created: 0,
    };
    if document.pages.iter().all(|page| page.imported_pages().next().is_none()) {
        return Ok((pdf, summary));
    }

    let mut out = LoDocument::load_mem(&pdf)?;
    let page_ids: Vec<LoObjectId> = out.get_pages().values().copied().collect();
    let page_height = document.page_size.height;
    let mut sources: HashMap<PathBuf, Vec<LoObjectId>> = HashMap::new();
    let mut forms: HashMap<(PathBuf, u32), (LoObjectId, Vec<LoObject>)> = HashMap::new();

    for (page_index, page) in document.pages.iter().enumerate() {
        let Some(&page_id) = page_ids.get(page_index) else {
            return Err(StencilError::Pdf(format!(
                "written document has no page {}",
                page_index + 1
            )));
        };
        let mut content = String::new();
        let mut xobjects = Vec::new();
        for cmd in page.imported_pages() {
            let Command::ImportPage {
                source,
                page_number,
                x,
                y,
                width,
            } = cmd
            else {
                continue;
            };
            let key = (source.clone(), *page_number);
            if !forms.contains_key(&key) {
                let source_pages = match sources.get(source) {
                    Some(ids) => ids.clone(),
                    None => {
                        let ids = import_document_objects(&mut out, LoDocument::load(source)?)?;
                        sources.insert(source.clone(), ids.clone());
                        ids
                    }
                };
                let form = page_form(&mut out, &source_pages, *page_number, source)?;
                forms.insert(key.clone(), form);
                summary.forms_created += 1;
            }
            let Some((form_id, bbox)) = forms.get(&key) else {
                continue;
            };
            let name = format!("Bg{}", xobjects.len() + 1);
            content.push_str(&placement(bbox, *x, *y, *width, page_height, &name));
            xobjects.push((name, *form_id));
        }
        if xobjects.is_empty() {
            continue;
        }
        add_page_xobjects(&mut out, page_id, &xobjects)?;
        prepend_page_content(&mut out, page_id, content.into_bytes())?;
        summary.pages_stamped += 1;
    }

    out.prune_objects();
    out.renumber_objects();
    out.compress();
    let mut bytes = Vec::new();
    out.save_to(&mut bytes)?;
    log::debug!(
        "imported {} background form(s) onto {} page(s)",
        summary.forms_created,
        summary.pages_stamped
    );
    Ok((bytes, summary))
}

fn page_box(page: &lopdf::Dictionary) -> Vec<LoObject> {
    if let Ok(arr) = page.get(b"CropBox").and_then(LoObject::as_array) {
        return arr.clone();
    }
    if let Ok(arr) = page.get(b"MediaBox").and_then(LoObject::as_array) {
        return arr.clone();
    }
    vec![0.into(), 0.into(), 612.into(), 792.into()]
}

fn box_number(value: &LoObject) -> f32 {
    match value {
        LoObject::Integer(v) => *v as f32,
        LoObject::Real(v) => *v,
        _ => 0.0,
    }
}

fn page_resources_object(doc: &LoDocument, page: &lopdf::Dictionary) -> LoObject {
    match page.get(b"Resources") {
        Ok(LoObject::Reference(id)) => doc
            .get_object(*id)
            .map(|o| o.clone())
            .unwrap_or_else(|_| LoObject::Dictionary(lopdf::Dictionary::new())),
        Ok(LoObject::Dictionary(d)) => LoObject::Dictionary(d.clone()),
        _ => LoObject::Dictionary(lopdf::Dictionary::new()),
    }
}

fn page_resources_dict(page: &lopdf::Dictionary, doc: &LoDocument) -> lopdf::Dictionary {
    match page.get(b"Resources") {
        Ok(LoObject::Dictionary(d)) => d.clone(),
        Ok(LoObject::Reference(id)) => doc
            .get_object(*id)
            .ok()
            .and_then(|o| o.as_dict().ok())
            .cloned()
            .unwrap_or_default(),
        _ => lopdf::Dictionary::new(),
    }
}

fn page_xobject_dict(resources: &lopdf::Dictionary, doc: &LoDocument) -> lopdf::Dictionary {
    match resources.get(b"XObject") {
        Ok(LoObject::Dictionary(d)) => d.clone(),
        Ok(LoObject::Reference(id)) => doc
            .get_object(*id)
            .ok()
            .and_then(|o| o.as_dict().ok())
            .cloned()
            .unwrap_or_default(),
        _ => lopdf::Dictionary::new(),
    }
}

/// Moves every object of `src` into `dst` under fresh ids and returns the
/// source page ids in page order.
fn import_document_objects(dst: &mut LoDocument, mut src: LoDocument) -> Result<Vec<LoObjectId>> {
    if src.is_encrypted() {
        return Err(StencilError::Pdf("background PDF is encrypted".to_string()));
    }
    let start_id = dst.max_id + 1;
    src.renumber_objects_with(start_id);
    let page_ids: Vec<LoObjectId> = src.get_pages().values().copied().collect();
    if src.max_id > dst.max_id {
        dst.max_id = src.max_id;
    }
    dst.objects.extend(src.objects);
    Ok(page_ids)
}

/// Wraps an imported page as a Form XObject. Returns the form id and the
/// page box it was cut from.
fn page_form(
    doc: &mut LoDocument,
    source_pages: &[LoObjectId],
    page_number: u32,
    source: &Path,
) -> Result<(LoObjectId, Vec<LoObject>)> {
    let Some(&page_id) = (page_number as usize)
        .checked_sub(1)
        .and_then(|index| source_pages.get(index))
    else {
        return Err(StencilError::Pdf(format!(
            "{} has {} page(s), cannot import page {page_number}",
            source.display(),
            source_pages.len()
        )));
    };
    let page = doc
        .get_object(page_id)
        .and_then(LoObject::as_dict)?
        .clone();
    let content = doc.get_page_content(page_id)?;
    let bbox = page_box(&page);
    let resources = page_resources_object(doc, &page);
    let form = LoStream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "FormType" => 1,
            "BBox" => LoObject::Array(bbox.clone()),
            "Resources" => resources,
        },
        content,
    );
    Ok((doc.add_object(form), bbox))
}

/// `cm` that scales the form to `width` and puts its top-left corner at
/// (`x`, `y`) in top-left page space.
fn placement(bbox: &[LoObject], x: Pt, y: Pt, width: Pt, page_height: Pt, name: &str) -> String {
    let coords: Vec<f32> = bbox.iter().map(box_number).collect();
    let (llx, urx, ury) = match coords.as_slice() {
        [a, b, c, d] => (a.min(*c), a.max(*c), b.max(*d)),
        _ => (0.0, 612.0, 792.0),
    };
    let box_width = urx - llx;
    let scale = if box_width > 0.0 {
        width.to_f32() / box_width
    } else {
        1.0
    };
    let tx = x.to_f32() - llx * scale;
    let ty = (page_height - y).to_f32() - ury * scale;
    format!(
        "q {} 0 0 {} {} {} cm /{} Do Q\n",
        fmt(scale),
        fmt(scale),
        fmt(tx),
        fmt(ty),
        name
    )
}

fn add_page_xobjects(doc: &mut LoDocument, page_id: LoObjectId, entries: &[(String, LoObjectId)]) -> Result<()> {
    let page = doc
        .get_object(page_id)
        .and_then(LoObject::as_dict)?
        .clone();
    let mut resources = page_resources_dict(&page, doc);
    let mut xobjects = page_xobject_dict(&resources, doc);
    for (name, form_id) in entries {
        xobjects.set(name.as_bytes().to_vec(), LoObject::Reference(*form_id));
    }
    resources.set("XObject", LoObject::Dictionary(xobjects));
    let page_mut = doc.get_object_mut(page_id).and_then(LoObject::as_dict_mut)?;
    page_mut.set("Resources", LoObject::Dictionary(resources));
    Ok(())
}

/// Inserts a content stream ahead of the existing ones so it paints first.
fn prepend_page_content(doc: &mut LoDocument, page_id: LoObjectId, content: Vec<u8>) -> Result<()> {
    let stream_id = doc.add_object(LoStream::new(dictionary! {}, content));
    let page_mut = doc.get_object_mut(page_id).and_then(LoObject::as_dict_mut)?;
    let contents = match page_mut.get(b"Contents") {
        Ok(LoObject::Array(existing)) => {
            let mut all = vec![LoObject::Reference(stream_id)];
            all.extend(existing.iter().cloned());
            all
        }
        Ok(LoObject::Reference(id)) => vec![LoObject::Reference(stream_id), LoObject::Reference(*id)],
        _ => vec![LoObject::Reference(stream_id)],
    };
    page_mut.set("Contents", LoObject::Array(contents));
    Ok(())
}
