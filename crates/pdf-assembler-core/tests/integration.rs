//! Integration tests for pdf-assembler-core
//!
//! These tests verify the end-to-end workflow:
//! - Upload, merge and numbering through the processor
//! - Merge order resolution
//! - Store lookups with hostile identifiers
//! - Failure paths that must not leave artifacts behind

use async_trait::async_trait;
use bytes::Bytes;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, Stream};
use pdf_assembler_core::{
    DiskStore, DocumentId, DocumentProcessor, DocumentRef, DocumentStore, Error, MemoryStore,
    PDF_MEDIA_TYPE, PdfDocument, Result, StoredDocument,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

// =============================================================================
// Counting Store for Testing
// =============================================================================

/// Wraps a memory store and counts successful writes, so tests can assert
/// that failed operations never reach the store.
struct CountingStore {
    inner: MemoryStore,
    puts: AtomicUsize,
}

impl CountingStore {
    fn new() -> Self {
        Self {
            inner: MemoryStore::new(64),
            puts: AtomicUsize::new(0),
        }
    }

    fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for CountingStore {
    fn name(&self) -> &'static str {
        "counting"
    }

    async fn put(&self, bytes: Bytes, original_name: &str) -> Result<StoredDocument> {
        let doc = self.inner.put(bytes, original_name).await?;
        self.puts.fetch_add(1, Ordering::SeqCst);
        Ok(doc)
    }

    async fn get(&self, id: &DocumentId) -> Result<StoredDocument> {
        self.inner.get(id).await
    }

    async fn purge_older_than(&self, max_age: Duration) -> Result<usize> {
        self.inner.purge_older_than(max_age).await
    }
}

// =============================================================================
// Test Fixtures
// =============================================================================

/// Build a US Letter PDF whose pages each draw their label with `Tj`.
fn create_pdf(labels: &[&str]) -> Bytes {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(Dictionary::from_iter([
        ("Type", Object::Name(b"Font".to_vec())),
        ("Subtype", Object::Name(b"Type1".to_vec())),
        ("BaseFont", Object::Name(b"Courier".to_vec())),
    ]));

    let kids: Vec<Object> = labels
        .iter()
        .map(|label| {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec![Object::Name(b"F1".to_vec()), Object::Integer(18)]),
                    Operation::new("Td", vec![Object::Integer(72), Object::Integer(720)]),
                    Operation::new("Tj", vec![Object::string_literal(*label)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(
                Dictionary::new(),
                content.encode().expect("Failed to encode content"),
            ));
            let resources = Dictionary::from_iter([(
                "Font",
                Object::Dictionary(Dictionary::from_iter([("F1", Object::Reference(font_id))])),
            )]);
            let page_id = doc.add_object(Dictionary::from_iter([
                ("Type", Object::Name(b"Page".to_vec())),
                ("Parent", Object::Reference(pages_id)),
                ("Contents", Object::Reference(content_id)),
                ("Resources", Object::Dictionary(resources)),
                (
                    "MediaBox",
                    Object::Array(vec![
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Integer(612),
                        Object::Integer(792),
                    ]),
                ),
            ]));
            Object::Reference(page_id)
        })
        .collect();

    let count = i64::try_from(kids.len()).expect("page count fits i64");
    doc.objects.insert(
        pages_id,
        Object::Dictionary(Dictionary::from_iter([
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Kids", Object::Array(kids)),
            ("Count", Object::Integer(count)),
        ])),
    );

    let catalog_id = doc.add_object(Dictionary::from_iter([
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut output = Vec::new();
    doc.save_to(&mut output).expect("Failed to save fixture");
    Bytes::from(output)
}

/// Strings drawn with `Tj` on each page, in page order.
fn page_strings(bytes: &[u8]) -> Vec<Vec<String>> {
    let doc = PdfDocument::from_bytes(bytes).expect("Output should parse");
    doc.page_ids()
        .into_iter()
        .map(|page_id| {
            let content = doc.page_content(page_id).expect("Page content should decode");
            Content::decode(&content)
                .expect("Content stream should parse")
                .operations
                .into_iter()
                .filter(|op| op.operator == "Tj")
                .filter_map(|op| match op.operands.first() {
                    Some(Object::String(s, _)) => Some(String::from_utf8_lossy(s).into_owned()),
                    _ => None,
                })
                .collect()
        })
        .collect()
}

/// Position operands of every `Td` on a page.
fn text_positions(bytes: &[u8], page_index: usize) -> Vec<(f32, f32)> {
    let doc = PdfDocument::from_bytes(bytes).expect("Output should parse");
    let page_id = doc.page_ids()[page_index];
    let content = doc.page_content(page_id).expect("Page content should decode");
    Content::decode(&content)
        .expect("Content stream should parse")
        .operations
        .into_iter()
        .filter(|op| op.operator == "Td")
        .filter_map(|op| match op.operands.as_slice() {
            [x, y] => Some((x.as_float().ok()?, y.as_float().ok()?)),
            _ => None,
        })
        .collect()
}

fn memory_processor() -> DocumentProcessor {
    DocumentProcessor::new(Arc::new(MemoryStore::new(64)))
}

fn refs(docs: &[&StoredDocument]) -> Vec<DocumentRef> {
    docs.iter()
        .map(|doc| DocumentRef {
            id: doc.id.to_string(),
            filename: Some(doc.original_name.clone()),
            path: None,
        })
        .collect()
}

fn order(docs: &[&StoredDocument]) -> Vec<String> {
    docs.iter().map(|doc| doc.id.to_string()).collect()
}

// =============================================================================
// End-to-End Workflow
// =============================================================================

#[tokio::test]
async fn test_upload_merge_number_workflow() {
    let processor = memory_processor();

    let a = processor
        .ingest(create_pdf(&["a1", "a2"]), "a.pdf", PDF_MEDIA_TYPE)
        .await
        .expect("Upload a");
    let b = processor
        .ingest(create_pdf(&["b1", "b2", "b3"]), "b.pdf", PDF_MEDIA_TYPE)
        .await
        .expect("Upload b");

    let merged = processor
        .merge(&refs(&[&a, &b]), Some(order(&[&b, &a]).as_slice()))
        .await
        .expect("Merge should succeed");

    assert_eq!(merged.original_name, "merged.pdf");
    assert_eq!(
        page_strings(&merged.bytes),
        vec![vec!["b1"], vec!["b2"], vec!["b3"], vec!["a1"], vec!["a2"]]
    );

    let numbered = processor
        .number_pages(merged.id.as_str())
        .await
        .expect("Numbering should succeed");

    assert_eq!(numbered.original_name, "numbered-merged.pdf");
    let pages = page_strings(&numbered.bytes);
    assert_eq!(pages.len(), 5);
    assert_eq!(pages[2], vec!["b3", "3 / 5"]);

    // Label anchored at the horizontal middle, 30pt above the bottom edge
    let positions = text_positions(&numbered.bytes, 2);
    assert_eq!(positions.last().copied(), Some((306.0, 30.0)));

    // Every step produced a new document; sources are untouched
    let fetched = processor.fetch(merged.id.as_str()).await.expect("Merged still stored");
    assert_eq!(fetched.bytes, merged.bytes);
    assert_ne!(numbered.id, merged.id);
}

#[tokio::test]
async fn test_merge_without_order_uses_file_order() {
    let processor = memory_processor();
    let a = processor.ingest(create_pdf(&["a"]), "a.pdf", PDF_MEDIA_TYPE).await.expect("a");
    let b = processor.ingest(create_pdf(&["b"]), "b.pdf", PDF_MEDIA_TYPE).await.expect("b");

    let merged = processor.merge(&refs(&[&b, &a]), None).await.expect("Merge");
    assert_eq!(page_strings(&merged.bytes), vec![vec!["b"], vec!["a"]]);
}

#[tokio::test]
async fn test_merge_drops_unknown_order_ids() {
    let processor = memory_processor();
    let a = processor.ingest(create_pdf(&["a"]), "a.pdf", PDF_MEDIA_TYPE).await.expect("a");
    let b = processor.ingest(create_pdf(&["b"]), "b.pdf", PDF_MEDIA_TYPE).await.expect("b");

    let order = vec!["ghost".to_string(), a.id.to_string()];
    let merged = processor
        .merge(&refs(&[&a, &b]), Some(order.as_slice()))
        .await
        .expect("Merge");

    assert_eq!(page_strings(&merged.bytes), vec![vec!["a"]]);
}

#[tokio::test]
async fn test_merge_with_nothing_selected_is_invalid() {
    let processor = memory_processor();
    let a = processor.ingest(create_pdf(&["a"]), "a.pdf", PDF_MEDIA_TYPE).await.expect("a");

    let empty = processor.merge(&[], None).await;
    assert!(matches!(empty, Err(Error::InvalidInput(_))));

    let order = vec!["ghost".to_string()];
    let unmatched = processor.merge(&refs(&[&a]), Some(order.as_slice())).await;
    assert!(matches!(unmatched, Err(Error::InvalidInput(_))));
}

#[tokio::test]
async fn test_merge_with_unstored_id_is_not_found() {
    let processor = memory_processor();
    let files = vec![DocumentRef::new("1700000000000-deadbeef-missing")];
    let result = processor.merge(&files, None).await;
    assert!(matches!(result, Err(Error::NotFound(_))));
}

// =============================================================================
// Store Tests
// =============================================================================

#[tokio::test]
async fn test_store_round_trip() {
    let processor = memory_processor();
    let bytes = create_pdf(&["x"]);
    let doc = processor.ingest(bytes.clone(), "x.pdf", PDF_MEDIA_TYPE).await.expect("Upload");

    let fetched = processor.fetch(doc.id.as_str()).await.expect("Fetch");
    assert_eq!(fetched.bytes, bytes);
    assert_eq!(fetched.original_name, "x.pdf");
    assert_eq!(fetched.checksum, doc.checksum);
}

#[tokio::test]
async fn test_traversal_ids_are_not_found() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store_dir = dir.path().join("store");
    let processor =
        DocumentProcessor::new(Arc::new(DiskStore::new(&store_dir).expect("Disk store")));

    // A file outside the store root that a traversal id would reach
    std::fs::write(dir.path().join("secret.pdf"), create_pdf(&["secret"])).expect("write");

    for id in ["../secret", "..%2Fsecret", "/etc/passwd", "a/b", "", ".."] {
        let result = processor.fetch(id).await;
        assert!(
            matches!(result, Err(Error::NotFound(_))),
            "id {id:?} should be not found, got {result:?}"
        );
    }
}

#[tokio::test]
async fn test_non_pdf_rejected_before_store() {
    let store = Arc::new(CountingStore::new());
    let processor = DocumentProcessor::new(store.clone());

    let result = processor
        .ingest(Bytes::from_static(b"hello"), "notes.txt", "text/plain")
        .await;

    assert!(matches!(result, Err(Error::InvalidInput(_))));
    assert_eq!(store.puts(), 0);
}

#[tokio::test]
async fn test_malformed_source_stores_nothing() {
    let store = Arc::new(CountingStore::new());
    let processor = DocumentProcessor::new(store.clone());

    // Declared as PDF but not parseable; ingestion does not inspect content
    let good = processor.ingest(create_pdf(&["ok"]), "ok.pdf", PDF_MEDIA_TYPE).await.expect("ok");
    let bad = processor
        .ingest(Bytes::from_static(b"%PDF-1.4 nonsense"), "bad.pdf", PDF_MEDIA_TYPE)
        .await
        .expect("Upload accepts any declared PDF");
    assert_eq!(store.puts(), 2);

    let merged = processor.merge(&refs(&[&good, &bad]), None).await;
    assert!(matches!(merged, Err(Error::MalformedDocument(_))));

    let numbered = processor.number_pages(bad.id.as_str()).await;
    assert!(matches!(numbered, Err(Error::MalformedDocument(_))));

    assert_eq!(store.puts(), 2, "Failed operations must not store output");
}

// =============================================================================
// Numbering Tests
// =============================================================================

#[tokio::test]
async fn test_one_label_per_page() {
    let processor = memory_processor();
    let doc = processor
        .ingest(create_pdf(&["p1", "p2", "p3", "p4"]), "four.pdf", PDF_MEDIA_TYPE)
        .await
        .expect("Upload");

    let numbered = processor.number_pages(doc.id.as_str()).await.expect("Number");
    let pages = page_strings(&numbered.bytes);

    for (i, page) in pages.iter().enumerate() {
        let labels: Vec<&String> = page.iter().filter(|s| s.contains(" / ")).collect();
        assert_eq!(labels, vec![&format!("{} / 4", i + 1)]);
    }
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_merges_on_disk_store() {
    let dir = tempfile::tempdir().expect("tempdir");
    let processor = Arc::new(DocumentProcessor::new(Arc::new(
        DiskStore::new(dir.path()).expect("Disk store"),
    )));

    let a = processor.ingest(create_pdf(&["a"]), "a.pdf", PDF_MEDIA_TYPE).await.expect("a");
    let b = processor.ingest(create_pdf(&["b"]), "b.pdf", PDF_MEDIA_TYPE).await.expect("b");
    let files = refs(&[&a, &b]);

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let processor = Arc::clone(&processor);
            let files = files.clone();
            tokio::spawn(async move { processor.merge(&files, None).await })
        })
        .collect();

    let mut ids = Vec::new();
    for task in tasks {
        let merged = task.await.expect("Task joined").expect("Merge succeeded");
        assert_eq!(page_strings(&merged.bytes), vec![vec!["a"], vec!["b"]]);
        ids.push(merged.id);
    }

    ids.sort_by(|x, y| x.as_str().cmp(y.as_str()));
    ids.dedup();
    assert_eq!(ids.len(), 8, "Every merge gets its own id");

    for id in &ids {
        let stored = processor.fetch(id.as_str()).await.expect("Stored on disk");
        assert_eq!(page_strings(&stored.bytes).len(), 2);
    }
}
