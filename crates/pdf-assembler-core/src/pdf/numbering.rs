//! Page number overlay.
//!
//! # Coordinate System
//!
//! PDF uses a bottom-left origin, so the label sits `BOTTOM_OFFSET` points
//! above the bottom edge of the media box and starts at its horizontal
//! middle.
//!
//! # Overlay Strategy
//!
//! Existing content streams are never rewritten. Each page gets two new
//! streams: a leading `q` and a trailing stream that restores the graphics
//! state left by the original content before drawing the label. The label
//! uses the standard Helvetica font, so nothing has to be embedded.

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, warn};

use super::document::{PdfDocument, inherited_attribute, media_box, resolve, resolve_dict};
use crate::error::{Error, Result};

/// Label font size (in points).
pub const FONT_SIZE: f32 = 12.0;

/// Distance of the label baseline from the bottom of the page (in points).
pub const BOTTOM_OFFSET: f32 = 30.0;

/// Preferred resource name for the label font.
const FONT_RESOURCE_NAME: &str = "FPgNum";

/// The label drawn on one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageNumberOverlay {
    /// 0-based page index
    pub index: usize,
    /// Total number of pages in the document
    pub total: usize,
}

impl PageNumberOverlay {
    pub const fn new(index: usize, total: usize) -> Self {
        Self { index, total }
    }

    /// Display label, e.g. `"3 / 5"`.
    pub fn label(&self) -> String {
        format!("{} / {}", self.index + 1, self.total)
    }

    /// Baseline start of the label within `media_box`.
    pub fn position(media_box: [f32; 4]) -> (f32, f32) {
        let width = media_box[2] - media_box[0];
        (media_box[0] + width / 2.0, media_box[1] + BOTTOM_OFFSET)
    }

    /// Content stream operations drawing the label in black.
    fn operations(&self, font_name: &str, media_box: [f32; 4]) -> Vec<Operation> {
        let (x, y) = Self::position(media_box);

        vec![
            // Closes the `q` placed before the original content
            Operation::new("Q", vec![]),
            Operation::new("q", vec![]),
            Operation::new("BT", vec![]),
            Operation::new(
                "Tf",
                vec![Object::Name(font_name.as_bytes().to_vec()), Object::Real(FONT_SIZE)],
            ),
            Operation::new(
                "rg",
                vec![Object::Integer(0), Object::Integer(0), Object::Integer(0)],
            ),
            Operation::new("Td", vec![Object::Real(x), Object::Real(y)]),
            Operation::new("Tj", vec![Object::string_literal(self.label())]),
            Operation::new("ET", vec![]),
            Operation::new("Q", vec![]),
        ]
    }
}

/// Add page numbers to every page of a PDF.
///
/// A document without pages is re-serialized unchanged.
pub fn number_pages(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut doc = PdfDocument::from_bytes(bytes)?;
    let page_ids = doc.page_ids();
    let total = page_ids.len();

    if total == 0 {
        debug!("Document has no pages, nothing to number");
        return doc.to_bytes();
    }

    let inner = doc.inner_mut();
    let font_id = add_label_font(inner);
    for (index, page_id) in page_ids.into_iter().enumerate() {
        stamp_page(inner, page_id, font_id, PageNumberOverlay::new(index, total))?;
    }

    debug!("Numbered {} pages", total);
    doc.to_bytes()
}

/// Draw the page number on the page at `page_index`, returning the new
/// document.
pub fn apply_overlay(mut doc: PdfDocument, page_index: usize) -> Result<PdfDocument> {
    let page_ids = doc.page_ids();
    let total = page_ids.len();
    let page_id = *page_ids.get(page_index).ok_or_else(|| {
        Error::InvalidInput(format!(
            "page {page_index} out of range (document has {total} pages)"
        ))
    })?;

    let inner = doc.inner_mut();
    let font_id = add_label_font(inner);
    stamp_page(inner, page_id, font_id, PageNumberOverlay::new(page_index, total))?;

    Ok(doc)
}

/// Add a standard Type1 Helvetica font object.
fn add_label_font(doc: &mut Document) -> ObjectId {
    doc.add_object(Dictionary::from_iter([
        ("Type", Object::Name(b"Font".to_vec())),
        ("Subtype", Object::Name(b"Type1".to_vec())),
        ("BaseFont", Object::Name(b"Helvetica".to_vec())),
        ("Encoding", Object::Name(b"WinAnsiEncoding".to_vec())),
    ]))
}

fn stamp_page(
    doc: &mut Document,
    page_id: ObjectId,
    font_id: ObjectId,
    overlay: PageNumberOverlay,
) -> Result<()> {
    let font_name = add_font_to_page(doc, page_id, font_id)?;
    let media_box = media_box(doc, page_id);

    let mut overlay_bytes = b"\n".to_vec();
    overlay_bytes.extend(
        Content {
            operations: overlay.operations(&font_name, media_box),
        }
        .encode()
        .map_err(|e| Error::MalformedDocument(format!("Failed to encode overlay: {e}")))?,
    );

    let push_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let overlay_id = doc.add_object(Stream::new(Dictionary::new(), overlay_bytes));

    let existing = doc
        .get_dictionary(page_id)
        .map_err(|e| Error::MalformedDocument(format!("Failed to get page: {e}")))?
        .get(b"Contents")
        .ok()
        .cloned();

    let mut contents = vec![Object::Reference(push_id)];
    match existing {
        // Contents may be an indirect array of streams
        Some(Object::Reference(existing_id)) => match doc.get_object(existing_id) {
            Ok(Object::Array(arr)) => contents.extend(arr.iter().cloned()),
            _ => contents.push(Object::Reference(existing_id)),
        },
        Some(Object::Array(arr)) => contents.extend(arr),
        Some(_) => warn!("Ignoring unexpected Contents entry on page {:?}", page_id),
        None => {}
    }
    contents.push(Object::Reference(overlay_id));

    let page = doc
        .get_object_mut(page_id)
        .map_err(|e| Error::MalformedDocument(format!("Failed to get page: {e}")))?;

    if let Object::Dictionary(dict) = page {
        dict.set("Contents", Object::Array(contents));
    }

    Ok(())
}

/// Register the label font in the page's Resources, returning the resource
/// name it was given.
///
/// Resources may be inline, indirect or inherited; the result is always
/// written back onto the page as an inline dictionary.
fn add_font_to_page(doc: &mut Document, page_id: ObjectId, font_id: ObjectId) -> Result<String> {
    let mut resources = inherited_attribute(doc, page_id, b"Resources")
        .and_then(|obj| resolve_dict(doc, &obj))
        .unwrap_or_else(Dictionary::new);

    let mut fonts = resources
        .get(b"Font")
        .ok()
        .and_then(|obj| resolve(doc, obj))
        .and_then(|obj| match obj {
            Object::Dictionary(d) => Some(d.clone()),
            _ => None,
        })
        .unwrap_or_else(Dictionary::new);

    let font_name = unused_name(&fonts);
    fonts.set(font_name.as_str(), Object::Reference(font_id));
    resources.set("Font", Object::Dictionary(fonts));

    let page = doc
        .get_object_mut(page_id)
        .map_err(|e| Error::MalformedDocument(format!("Failed to get page: {e}")))?;

    if let Object::Dictionary(page_dict) = page {
        page_dict.set("Resources", Object::Dictionary(resources));
    }

    Ok(font_name)
}

fn unused_name(fonts: &Dictionary) -> String {
    if !fonts.has(FONT_RESOURCE_NAME.as_bytes()) {
        return FONT_RESOURCE_NAME.to_string();
    }
    (1..)
        .map(|n| format!("{FONT_RESOURCE_NAME}{n}"))
        .find(|name| !fonts.has(name.as_bytes()))
        .unwrap_or_else(|| FONT_RESOURCE_NAME.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::pdf::test_support::{create_test_pdf, page_strings};

    #[test]
    fn test_label() {
        assert_eq!(PageNumberOverlay::new(0, 1).label(), "1 / 1");
        assert_eq!(PageNumberOverlay::new(2, 5).label(), "3 / 5");
    }

    #[test]
    fn test_position_is_bottom_center() {
        assert_eq!(PageNumberOverlay::position([0.0, 0.0, 612.0, 792.0]), (306.0, 30.0));
        assert_eq!(PageNumberOverlay::position([10.0, 20.0, 210.0, 320.0]), (110.0, 50.0));
    }

    #[test]
    fn test_number_pages_adds_one_label_per_page() {
        let numbered = number_pages(&create_test_pdf(&["a", "b", "c"])).unwrap();
        assert_eq!(
            page_strings(&numbered),
            vec![
                vec!["a", "1 / 3"],
                vec!["b", "2 / 3"],
                vec!["c", "3 / 3"],
            ]
        );
    }

    #[test]
    fn test_original_content_kept_first() {
        let source = create_test_pdf(&["body"]);
        let original = PdfDocument::from_bytes(&source).unwrap();
        let original_content = original.page_content(original.page_ids()[0]).unwrap();

        let numbered = PdfDocument::from_bytes(&number_pages(&source).unwrap()).unwrap();
        let content = numbered.page_content(numbered.page_ids()[0]).unwrap();

        assert!(content.starts_with(b"q\n"));
        assert_eq!(&content[2..2 + original_content.len()], original_content.as_slice());
    }

    #[test]
    fn test_indirect_contents_array_kept() {
        let mut doc = Document::load_mem(&create_test_pdf(&["body"])).unwrap();
        let page_id = *doc.get_pages().values().next().unwrap();
        let content_ref = doc.get_dictionary(page_id).unwrap().get(b"Contents").unwrap().clone();
        let array_id = doc.add_object(Object::Array(vec![content_ref]));
        doc.get_dictionary_mut(page_id)
            .unwrap()
            .set("Contents", Object::Reference(array_id));

        let mut source = Vec::new();
        doc.save_to(&mut source).unwrap();

        let numbered = number_pages(&source).unwrap();
        assert_eq!(page_strings(&numbered), vec![vec!["body", "1 / 1"]]);
    }

    #[test]
    fn test_font_registered_on_page() {
        let numbered = PdfDocument::from_bytes(&number_pages(&create_test_pdf(&["a"])).unwrap()).unwrap();
        let page = numbered.page_ids()[0];
        let resources = inherited_attribute(numbered.inner(), page, b"Resources").unwrap();
        let resources = resolve_dict(numbered.inner(), &resources).unwrap();
        let fonts = resources.get(b"Font").unwrap().as_dict().unwrap();

        // The inherited F1 font must survive next to the label font
        assert!(fonts.has(b"F1"));
        assert!(fonts.has(FONT_RESOURCE_NAME.as_bytes()));
    }

    #[test]
    fn test_unused_name_avoids_collisions() {
        let mut fonts = Dictionary::new();
        assert_eq!(unused_name(&fonts), "FPgNum");
        fonts.set("FPgNum", Object::Null);
        fonts.set("FPgNum1", Object::Null);
        assert_eq!(unused_name(&fonts), "FPgNum2");
    }

    #[test]
    fn test_apply_overlay_single_page() {
        let doc = PdfDocument::from_bytes(&create_test_pdf(&["a", "b"])).unwrap();
        let mut stamped = apply_overlay(doc, 1).unwrap();
        let bytes = stamped.to_bytes().unwrap();
        assert_eq!(page_strings(&bytes), vec![vec!["a"], vec!["b", "2 / 2"]]);
    }

    #[test]
    fn test_apply_overlay_out_of_range() {
        let doc = PdfDocument::from_bytes(&create_test_pdf(&["a"])).unwrap();
        assert!(matches!(apply_overlay(doc, 1), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_zero_pages() {
        let empty = create_test_pdf(&[]);
        let numbered = number_pages(&empty).unwrap();
        assert_eq!(PdfDocument::from_bytes(&numbered).unwrap().page_count(), 0);
    }

    #[test]
    fn test_garbage_is_malformed() {
        assert!(matches!(number_pages(b"%PDF-garbage"), Err(Error::MalformedDocument(_))));
    }
}
