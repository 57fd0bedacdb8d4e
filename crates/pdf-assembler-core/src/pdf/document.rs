use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::error::{Error, Result};

/// US Letter, used when a page and its ancestors carry no MediaBox.
pub const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// Bound on `Parent` hops, protects against cyclic page trees.
const MAX_TREE_DEPTH: usize = 32;

/// A parsed PDF document.
pub struct PdfDocument {
    inner: Document,
}

impl PdfDocument {
    /// Parse a PDF from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let inner = Document::load_mem(bytes)
            .map_err(|e| Error::MalformedDocument(format!("Failed to parse PDF: {e}")))?;
        Ok(Self { inner })
    }

    pub(crate) const fn from_document(inner: Document) -> Self {
        Self { inner }
    }

    /// Get number of pages
    pub fn page_count(&self) -> usize {
        self.inner.get_pages().len()
    }

    /// Page object ids in native page order.
    pub fn page_ids(&self) -> Vec<ObjectId> {
        self.inner.get_pages().into_values().collect()
    }

    /// Media box of a page as `[x0, y0, x1, y1]`, following inheritance.
    pub fn media_box(&self, page_id: ObjectId) -> [f32; 4] {
        media_box(&self.inner, page_id)
    }

    /// Decoded content of a page (all content streams concatenated).
    pub fn page_content(&self, page_id: ObjectId) -> Result<Vec<u8>> {
        Ok(self.inner.get_page_content(page_id)?)
    }

    /// Serialize the document.
    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        self.inner
            .save_to(&mut output)
            .map_err(|e| Error::MalformedDocument(format!("Failed to save PDF: {e}")))?;
        Ok(output)
    }

    #[cfg(test)]
    pub(crate) const fn inner(&self) -> &Document {
        &self.inner
    }

    pub(crate) const fn inner_mut(&mut self) -> &mut Document {
        &mut self.inner
    }

    pub(crate) fn into_inner(self) -> Document {
        self.inner
    }
}

impl std::fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfDocument")
            .field("version", &self.inner.version)
            .field("page_count", &self.page_count())
            .field("objects", &self.inner.objects.len())
            .finish()
    }
}

// =============================================================================
// Page tree helpers
// =============================================================================

/// Follow a reference to the object it points at.
pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

/// Resolve an object that should be a Dictionary (handles References).
pub(crate) fn resolve_dict(doc: &Document, obj: &Object) -> Option<Dictionary> {
    match resolve(doc, obj)? {
        Object::Dictionary(d) => Some(d.clone()),
        _ => None,
    }
}

/// Look up a page attribute on the page itself or the nearest ancestor that
/// defines it (Resources, MediaBox, CropBox and Rotate are inheritable).
pub(crate) fn inherited_attribute(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut node = doc.get_dictionary(page_id).ok()?;

    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = node.get(key) {
            return Some(value.clone());
        }

        let parent_id = match node.get(b"Parent") {
            Ok(Object::Reference(id)) => *id,
            _ => return None,
        };
        node = doc.get_dictionary(parent_id).ok()?;
    }

    None
}

pub(crate) fn media_box(doc: &Document, page_id: ObjectId) -> [f32; 4] {
    let Some(value) = inherited_attribute(doc, page_id, b"MediaBox") else {
        return DEFAULT_MEDIA_BOX;
    };

    if let Some(Object::Array(arr)) = resolve(doc, &value)
        && arr.len() == 4
    {
        let values: Vec<f32> = arr
            .iter()
            .filter_map(|o| match resolve(doc, o)? {
                #[allow(clippy::cast_precision_loss)]
                Object::Integer(i) => Some(*i as f32),
                Object::Real(r) => Some(*r),
                _ => None,
            })
            .collect();

        if values.len() == 4 {
            return [values[0], values[1], values[2], values[3]];
        }
    }

    DEFAULT_MEDIA_BOX
}
