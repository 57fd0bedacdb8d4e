mod document;
pub mod merge;
pub mod numbering;

pub use document::{DEFAULT_MEDIA_BOX, PdfDocument};
pub use merge::{PageCollection, merge_pdfs};
pub use numbering::{PageNumberOverlay, apply_overlay, number_pages};
