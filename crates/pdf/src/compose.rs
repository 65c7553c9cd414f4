//! Template page composition.
//!
//! The compositor holds the template PDF's original bytes for the whole
//! run and re-parses them for every record, so no mutable page object is
//! ever shared between records. Each record's overlay is merged onto a
//! fresh copy of the reference page (page 2), reduced to a single-page
//! document, and the collected pages are combined once at the end behind
//! the template's unmodified cover page (page 1).

use std::collections::BTreeMap;

use inserts_core::{Error, Result};
use lopdf::{dictionary, Document, Object, ObjectId};

/// Template page number of the static cover page.
const COVER_PAGE: u32 = 1;

/// Template page number of the reference page that every record stamps.
const REFERENCE_PAGE: u32 = 2;

/// How far up the page tree inherited attributes are searched for.
const INHERIT_DEPTH: usize = 10;

/// Accumulates the output document: one cover page plus one stamped page
/// per record, in record order.
#[derive(Debug)]
pub struct PageCompositor {
    template: Vec<u8>,
    reference_size: (f32, f32),
    pages: Vec<Vec<u8>>,
}

impl PageCompositor {
    /// Parse and validate the template, extract the cover page, and record
    /// the reference page's dimensions.
    pub fn new(template: Vec<u8>) -> Result<Self> {
        let doc = load_document(&template)?;
        let pages = doc.get_pages();
        if pages.len() < 2 {
            return Err(Error::TemplateTooShort(pages.len()));
        }

        let reference_id = page_id(&pages, REFERENCE_PAGE)?;
        let media_box = resolved_media_box(&doc, reference_id)?;
        let reference_size = (media_box[2] - media_box[0], media_box[3] - media_box[1]);

        let cover = extract_single_page(&template, COVER_PAGE)?;

        log::debug!(
            "template: {} page(s), reference page {:.1}x{:.1}",
            pages.len(),
            reference_size.0,
            reference_size.1
        );

        Ok(Self {
            template,
            reference_size,
            pages: vec![cover],
        })
    }

    /// Width and height of the reference page, sizing every overlay.
    pub fn reference_size(&self) -> (f32, f32) {
        self.reference_size
    }

    /// Pages appended so far, including the cover page.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Stamp one record's overlay onto a fresh copy of the reference page
    /// and append the result to the output sequence.
    pub fn push_overlay(&mut self, overlay: &[u8]) -> Result<()> {
        let mut doc = load_document(&self.template)?;
        let target = page_id(&doc.get_pages(), REFERENCE_PAGE)?;

        stamp_page(&mut doc, target, overlay)?;
        inline_inherited_attributes(&mut doc, target)?;
        keep_single_page(&mut doc, target)?;

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes)
            .map_err(|e| Error::PdfError(format!("Failed to save stamped page: {}", e)))?;
        self.pages.push(bytes);
        Ok(())
    }

    /// Combine the accumulated pages into the final document.
    pub fn finish(self) -> Result<Vec<u8>> {
        combine_pages(&self.pages)
    }
}

fn load_document(bytes: &[u8]) -> Result<Document> {
    Document::load_mem(bytes).map_err(|e| Error::PdfError(format!("Failed to load PDF: {}", e)))
}

fn page_id(pages: &BTreeMap<u32, ObjectId>, number: u32) -> Result<ObjectId> {
    pages
        .get(&number)
        .copied()
        .ok_or_else(|| Error::PdfError(format!("Document has no page {}", number)))
}

/// Append the overlay's content and font resources to a page.
///
/// The overlay document's objects are renumbered past the target
/// document's ids and imported wholesale (minus its page-tree scaffolding),
/// so every indirect object the overlay page references stays reachable.
fn stamp_page(doc: &mut Document, target: ObjectId, overlay: &[u8]) -> Result<()> {
    let mut overlay_doc = load_document(overlay)?;
    overlay_doc.renumber_objects_with(doc.max_id + 1);
    doc.max_id = overlay_doc.max_id;

    let overlay_page_id = page_id(&overlay_doc.get_pages(), 1)?;
    let overlay_page = overlay_doc
        .get_object(overlay_page_id)
        .and_then(Object::as_dict)
        .map_err(|e| Error::PdfError(format!("Invalid overlay page: {}", e)))?
        .clone();

    for (id, object) in std::mem::take(&mut overlay_doc.objects) {
        if !is_page_tree_object(&object) {
            doc.objects.insert(id, object);
        }
    }

    // Base resources are resolved (inherited ones included) before the
    // overlay's font entries are merged in, then written inline so the
    // page no longer depends on tree inheritance.
    let mut resources = resolved_resources(doc, target);
    merge_font_resources(doc, &mut resources, &overlay_page)?;

    let overlay_contents = content_references(&overlay_page);

    let page = doc
        .get_object_mut(target)
        .map_err(|e| Error::PdfError(format!("Failed to get page: {}", e)))?;
    let Object::Dictionary(dict) = page else {
        return Err(Error::PdfError("Page object is not a dictionary".to_string()));
    };

    dict.set("Resources", Object::Dictionary(resources));

    let mut contents = match dict.get(b"Contents").ok().cloned() {
        Some(Object::Reference(existing)) => vec![Object::Reference(existing)],
        Some(Object::Array(existing)) => existing,
        _ => Vec::new(),
    };
    contents.extend(overlay_contents);
    dict.set("Contents", Object::Array(contents));

    Ok(())
}

/// The overlay page's content stream references, in order.
fn content_references(page: &lopdf::Dictionary) -> Vec<Object> {
    match page.get(b"Contents") {
        Ok(Object::Reference(id)) => vec![Object::Reference(*id)],
        Ok(Object::Array(refs)) => refs.clone(),
        _ => Vec::new(),
    }
}

/// Merge the overlay page's Font resource entries into `resources`.
fn merge_font_resources(
    doc: &Document,
    resources: &mut lopdf::Dictionary,
    overlay_page: &lopdf::Dictionary,
) -> Result<()> {
    let overlay_resources = match overlay_page.get(b"Resources") {
        Ok(object) => resolve_dictionary(doc, object)
            .ok_or_else(|| Error::PdfError("Overlay resources are not a dictionary".to_string()))?,
        Err(_) => return Ok(()),
    };

    let overlay_fonts = match overlay_resources.get(b"Font") {
        Ok(object) => resolve_dictionary(doc, object)
            .ok_or_else(|| Error::PdfError("Overlay font resources are malformed".to_string()))?,
        Err(_) => return Ok(()),
    };

    let mut fonts = match resources.get(b"Font").ok() {
        Some(object) => resolve_dictionary(doc, object).unwrap_or_default(),
        None => lopdf::Dictionary::new(),
    };
    for (name, object) in overlay_fonts.iter() {
        fonts.set(name.clone(), object.clone());
    }
    resources.set("Font", Object::Dictionary(fonts));

    Ok(())
}

/// Resolve an object that should be a dictionary, following one level of
/// indirection.
fn resolve_dictionary(doc: &Document, object: &Object) -> Option<lopdf::Dictionary> {
    match object {
        Object::Dictionary(dict) => Some(dict.clone()),
        Object::Reference(id) => match doc.get_object(*id) {
            Ok(Object::Dictionary(dict)) => Some(dict.clone()),
            _ => None,
        },
        _ => None,
    }
}

/// Look up a page attribute, walking up the Pages tree for inherited
/// values, with a depth limit against malformed parent cycles.
fn resolve_inherited(doc: &Document, page: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = page;
    for _ in 0..INHERIT_DEPTH {
        let dict = match doc.get_object(current) {
            Ok(Object::Dictionary(dict)) => dict,
            _ => return None,
        };

        if let Ok(value) = dict.get(key) {
            let resolved = match value {
                Object::Reference(id) => doc.get_object(*id).ok()?.clone(),
                other => other.clone(),
            };
            return Some(resolved);
        }

        match dict.get(b"Parent") {
            Ok(Object::Reference(parent)) => current = *parent,
            _ => return None,
        }
    }
    None
}

/// The page's media box, inherited values resolved.
fn resolved_media_box(doc: &Document, page: ObjectId) -> Result<[f32; 4]> {
    let Some(Object::Array(values)) = resolve_inherited(doc, page, b"MediaBox") else {
        return Err(Error::PdfError("Page has no MediaBox".to_string()));
    };

    let values: Vec<f32> = values
        .iter()
        .filter_map(|object| match object {
            Object::Integer(i) => Some(*i as f32),
            Object::Real(r) => Some(*r),
            _ => None,
        })
        .collect();

    if values.len() != 4 {
        return Err(Error::PdfError("Page MediaBox is malformed".to_string()));
    }
    Ok([values[0], values[1], values[2], values[3]])
}

/// The page's resources, inherited values resolved; empty when absent.
fn resolved_resources(doc: &Document, page: ObjectId) -> lopdf::Dictionary {
    match resolve_inherited(doc, page, b"Resources") {
        Some(Object::Dictionary(dict)) => dict,
        _ => lopdf::Dictionary::new(),
    }
}

/// Write inheritable attributes directly onto the page so it survives
/// being detached from its original position in the page tree.
fn inline_inherited_attributes(doc: &mut Document, page: ObjectId) -> Result<()> {
    let media_box = resolved_media_box(doc, page)?;
    let resources = resolved_resources(doc, page);
    let rotate = resolve_inherited(doc, page, b"Rotate");

    let dict = doc
        .get_object_mut(page)
        .map_err(|e| Error::PdfError(format!("Failed to get page: {}", e)))?
        .as_dict_mut()
        .map_err(|e| Error::PdfError(format!("Page object is not a dictionary: {}", e)))?;

    dict.set(
        "MediaBox",
        Object::Array(media_box.iter().map(|&v| Object::Real(v)).collect()),
    );
    dict.set("Resources", Object::Dictionary(resources));
    if let Some(rotate) = rotate {
        dict.set("Rotate", rotate);
    }

    Ok(())
}

/// Restructure a document to contain only a single page.
///
/// The Pages tree is rewritten to reference only the target page, and the
/// page's Parent is pointed at the tree root.
fn keep_single_page(doc: &mut Document, target: ObjectId) -> Result<()> {
    let root = doc
        .trailer
        .get(b"Root")
        .map_err(|e| Error::PdfError(format!("No Root in trailer: {}", e)))?;
    let Object::Reference(catalog_id) = root else {
        return Err(Error::PdfError("Root is not a reference".to_string()));
    };
    let catalog_id = *catalog_id;

    let pages_id = {
        let catalog = doc
            .get_object(catalog_id)
            .and_then(Object::as_dict)
            .map_err(|e| Error::PdfError(format!("Failed to get catalog: {}", e)))?;
        match catalog.get(b"Pages") {
            Ok(Object::Reference(id)) => *id,
            _ => return Err(Error::PdfError("Catalog has no Pages reference".to_string())),
        }
    };

    if let Ok(Object::Dictionary(pages)) = doc.get_object_mut(pages_id) {
        pages.set("Kids", Object::Array(vec![Object::Reference(target)]));
        pages.set("Count", Object::Integer(1));
    }

    if let Ok(Object::Dictionary(page)) = doc.get_object_mut(target) {
        page.set("Parent", Object::Reference(pages_id));
    }

    Ok(())
}

/// Extract one page of a document as a standalone single-page PDF.
fn extract_single_page(bytes: &[u8], number: u32) -> Result<Vec<u8>> {
    let mut doc = load_document(bytes)?;
    let target = page_id(&doc.get_pages(), number)?;

    inline_inherited_attributes(&mut doc, target)?;
    keep_single_page(&mut doc, target)?;

    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|e| Error::PdfError(format!("Failed to save page {}: {}", number, e)))?;
    Ok(out)
}

/// True for page-tree scaffolding that must not be imported when merging
/// documents.
fn is_page_tree_object(object: &Object) -> bool {
    let Object::Dictionary(dict) = object else {
        return false;
    };
    match dict.get(b"Type") {
        Ok(Object::Name(name)) => matches!(
            name.as_slice(),
            b"Catalog" | b"Pages" | b"Page" | b"Outlines" | b"Outline"
        ),
        _ => false,
    }
}

/// Combine single-page PDFs into one document, in order.
fn combine_pages(pages: &[Vec<u8>]) -> Result<Vec<u8>> {
    if pages.is_empty() {
        return Err(Error::PdfError("No pages to combine".to_string()));
    }

    let mut max_id = 1u32;
    let mut collected_pages: Vec<(ObjectId, Object)> = Vec::new();
    let mut collected_objects: BTreeMap<ObjectId, Object> = BTreeMap::new();
    let mut document = Document::with_version("1.5");

    for (index, bytes) in pages.iter().enumerate() {
        let mut doc = Document::load_mem(bytes)
            .map_err(|e| Error::PdfError(format!("Failed to load page {}: {}", index + 1, e)))?;

        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;

        for page_id in doc.get_pages().into_values() {
            if let Ok(page) = doc.get_object(page_id) {
                collected_pages.push((page_id, page.clone()));
            }
        }

        for (object_id, object) in std::mem::take(&mut doc.objects) {
            if !is_page_tree_object(&object) {
                collected_objects.insert(object_id, object);
            }
        }
    }

    for (object_id, object) in collected_objects {
        document.objects.insert(object_id, object);
    }

    // Fresh ids must start past every imported id; the document does not
    // track ids inserted directly into its object map.
    document.max_id = max_id;
    let pages_id = document.new_object_id();

    let kids: Vec<Object> = collected_pages
        .iter()
        .map(|(id, _)| Object::Reference(*id))
        .collect();
    let count = collected_pages.len() as i64;

    for (object_id, object) in collected_pages {
        if let Object::Dictionary(mut dict) = object {
            dict.set("Parent", Object::Reference(pages_id));
            document.objects.insert(object_id, Object::Dictionary(dict));
        }
    }

    document.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => Object::Name(b"Pages".to_vec()),
            "Kids" => Object::Array(kids),
            "Count" => Object::Integer(count),
        }),
    );

    let catalog_id = document.add_object(dictionary! {
        "Type" => Object::Name(b"Catalog".to_vec()),
        "Pages" => Object::Reference(pages_id),
    });
    document.trailer.set("Root", Object::Reference(catalog_id));
    document.max_id = document.objects.len() as u32;

    document.renumber_objects();
    document.compress();

    let mut out = Vec::new();
    document
        .save_to(&mut out)
        .map_err(|e| Error::PdfError(format!("Failed to save combined PDF: {}", e)))?;
    Ok(out)
}
