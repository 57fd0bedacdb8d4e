//! Page concatenation across documents.
//!
//! Every source is renumbered past the highest object id accumulated so far,
//! its non-tree objects are copied over verbatim, and its pages are recorded
//! in native order. The output gets a fresh single-level page tree, so
//! attributes a page used to inherit from its old tree are copied onto the
//! page first.

use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::debug;

use super::document::{PdfDocument, inherited_attribute};
use crate::error::{Error, Result};

/// Page attributes that may be inherited from the page tree.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Accumulates pages from several documents into one output document.
pub struct PageCollection {
    document: Document,
    /// Page ids in output order
    pages: Vec<ObjectId>,
    /// Next free object number
    next_id: u32,
}

impl Default for PageCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl PageCollection {
    pub fn new() -> Self {
        Self {
            document: Document::with_version("1.5"),
            pages: Vec::new(),
            next_id: 1,
        }
    }

    /// Number of pages accumulated so far
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Append all pages of `source` after the pages already collected.
    pub fn append(&mut self, source: PdfDocument) {
        let mut doc = source.into_inner();

        doc.renumber_objects_with(self.next_id);
        self.next_id = doc.max_id + 1;

        let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();

        for &page_id in &page_ids {
            materialize_inherited(&mut doc, page_id);
        }

        for (object_id, object) in doc.objects {
            match object.type_name().unwrap_or(b"") {
                b"Catalog" | b"Pages" | b"Outlines" | b"Outline" | b"XRef" => {}
                _ => {
                    self.document.objects.insert(object_id, object);
                }
            }
        }

        debug!(
            "Collected {} pages (total {})",
            page_ids.len(),
            self.pages.len() + page_ids.len()
        );
        self.pages.extend(page_ids);
    }

    /// Build the output document: one `Pages` node over all collected pages.
    pub fn into_document(self) -> PdfDocument {
        let mut document = self.document;
        document.max_id = self.next_id - 1;

        let pages_id = document.new_object_id();

        for &page_id in &self.pages {
            if let Ok(Object::Dictionary(dict)) = document.get_object_mut(page_id) {
                dict.set("Parent", Object::Reference(pages_id));
            }
        }

        let kids: Vec<Object> = self.pages.iter().map(|&id| Object::Reference(id)).collect();

        #[allow(clippy::cast_possible_wrap)]
        let count = self.pages.len() as i64;

        let pages_dict = Dictionary::from_iter([
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Kids", Object::Array(kids)),
            ("Count", Object::Integer(count)),
        ]);
        document.objects.insert(pages_id, Object::Dictionary(pages_dict));

        let catalog_id = document.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(pages_id)),
        ]));
        document.trailer.set("Root", Object::Reference(catalog_id));

        document.compress();

        PdfDocument::from_document(document)
    }
}

/// Copy inheritable attributes from ancestors onto the page itself.
fn materialize_inherited(doc: &mut Document, page_id: ObjectId) {
    let missing: Vec<(&[u8], Object)> = {
        let Ok(page) = doc.get_dictionary(page_id) else {
            return;
        };
        INHERITABLE
            .iter()
            .filter(|key| !page.has(key))
            .filter_map(|&key| inherited_attribute(doc, page_id, key).map(|value| (key, value)))
            .collect()
    };

    if let Ok(Object::Dictionary(page)) = doc.get_object_mut(page_id) {
        for (key, value) in missing {
            page.set(key, value);
        }
    }
}

/// Concatenate the pages of `sources`, in order, into a single PDF.
///
/// Every source is parsed before anything is assembled; the first one that
/// fails aborts the merge with `MalformedDocument` naming it.
pub fn merge_pdfs(sources: &[(&str, &[u8])]) -> Result<Vec<u8>> {
    if sources.is_empty() {
        return Err(Error::InvalidInput("No documents to merge".to_string()));
    }

    let documents = sources
        .iter()
        .map(|(name, bytes)| {
            PdfDocument::from_bytes(bytes)
                .map_err(|e| Error::MalformedDocument(format!("{name}: {e}")))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut collection = PageCollection::new();
    for doc in documents {
        collection.append(doc);
    }

    debug!(
        "Merging {} documents into {} pages",
        sources.len(),
        collection.page_count()
    );

    collection.into_document().to_bytes()
}
