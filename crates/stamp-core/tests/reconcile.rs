//! End-to-end reconciliation against real lopdf documents

mod common;

use common::{create_test_pdf, drawn, page_count, texts, Drawn};
use pretty_assertions::assert_eq;
use stamp_core::{
    AnnotationSession, Draft, EngineConfig, Entry, LopdfBackend, MemoryStore,
    ReconciliationEngine, SessionOptions, StampError,
};

fn entry(id: &str, text: &str, x: i32, y: i32, size: u32, page: u32) -> Entry {
    Entry {
        id: id.to_string(),
        text: text.to_string(),
        key_name: String::new(),
        x,
        y,
        size,
        page,
    }
}

fn draft(text: &str, page: u32) -> Draft {
    Draft {
        text: text.to_string(),
        key_name: String::new(),
        x: 40,
        y: 60,
        size: 14,
        page,
    }
}

fn engine() -> ReconciliationEngine<LopdfBackend> {
    ReconciliationEngine::new(LopdfBackend, EngineConfig::default())
}

#[test]
fn rebuild_is_idempotent() {
    let original = create_test_pdf(2, 600, 800);
    let entries = vec![
        entry("1", "Hello", 50, 100, 12, 1),
        entry("2", "true", 20, 30, 16, 2),
    ];

    let mut engine = engine();
    let first = engine.rebuild(&original, &entries).unwrap();
    let second = engine.rebuild(&original, &entries).unwrap();

    assert_eq!(drawn(&first.bytes), drawn(&second.bytes));
    assert_eq!(drawn(&first.bytes).len(), 2);
}

#[test]
fn coordinates_are_inverted_against_page_height() {
    let original = create_test_pdf(1, 600, 800);
    let rendered = engine()
        .rebuild(
            &original,
            &[
                entry("1", "Hello", 50, 100, 12, 1),
                entry("2", "true", 50, 100, 12, 1),
            ],
        )
        .unwrap();

    assert_eq!(
        drawn(&rendered.bytes),
        vec![
            Drawn::Text {
                page: 1,
                text: "Hello".to_string(),
                x: 50.0,
                y: 700.0,
                size: 12.0,
            },
            Drawn::Marker {
                page: 1,
                x: 50.0,
                y: 688.0,
                size: 12.0,
            },
        ]
    );
}

#[test]
fn stale_pages_do_not_block_other_entries() {
    let original = create_test_pdf(3, 600, 800);
    let rendered = engine()
        .rebuild(
            &original,
            &[
                entry("1", "on one", 10, 10, 12, 1),
                entry("2", "on five", 10, 10, 12, 5),
                entry("3", "on three", 10, 10, 12, 3),
            ],
        )
        .unwrap();

    assert_eq!(rendered.stats.skipped, 1);
    let pages: Vec<u32> = drawn(&rendered.bytes).iter().map(Drawn::page).collect();
    assert_eq!(pages, vec![1, 3]);
    assert_eq!(page_count(&rendered.bytes), 3);
}

#[test]
fn marker_directive_is_exact_and_case_insensitive() {
    let original = create_test_pdf(1, 600, 800);
    let rendered = engine()
        .rebuild(
            &original,
            &[
                entry("1", "TRUE", 10, 10, 12, 1),
                entry("2", "true story", 10, 40, 12, 1),
            ],
        )
        .unwrap();

    let found = drawn(&rendered.bytes);
    assert!(matches!(found[0], Drawn::Marker { .. }));
    assert_eq!(texts(&rendered.bytes), vec!["true story".to_string()]);
}

#[test]
fn non_ascii_text_is_sanitized_in_output() {
    let original = create_test_pdf(1, 600, 800);
    let rendered = engine()
        .rebuild(&original, &[entry("1", "Done ✓ → next…", 10, 10, 12, 1)])
        .unwrap();
    assert_eq!(texts(&rendered.bytes), vec!["Done v -> next...".to_string()]);
}

#[test]
fn original_content_is_preserved() {
    let original = create_test_pdf(1, 600, 800);
    let rendered = engine()
        .rebuild(&original, &[entry("1", "stamp", 10, 10, 12, 1)])
        .unwrap();

    let doc = lopdf::Document::load_mem(&rendered.bytes).unwrap();
    let page_id = doc.get_pages()[&1];
    let text = String::from_utf8_lossy(&doc.get_page_content(page_id).unwrap()).to_string();
    assert!(text.contains("Page 1"));
    assert!(text.contains("stamp"));
}

#[test]
fn unloadable_original_is_a_document_error() {
    let err = engine().rebuild(b"not a pdf at all", &[]).unwrap_err();
    assert!(matches!(err, StampError::Document(_)));
}

#[test]
fn delete_goes_through_full_rebuild() {
    let original = create_test_pdf(1, 600, 800);

    let (mut incremental, _) = AnnotationSession::new(
        LopdfBackend,
        MemoryStore::new(),
        EngineConfig::default(),
        SessionOptions::default(),
    );
    incremental.load_document(original.clone()).unwrap();
    let e1 = incremental.add_entry(draft("E1", 1)).unwrap();
    incremental.add_entry(draft("E2", 1)).unwrap();
    incremental.delete_entry(&e1.id).unwrap();

    let (mut direct, _) = AnnotationSession::new(
        LopdfBackend,
        MemoryStore::new(),
        EngineConfig::default(),
        SessionOptions::default(),
    );
    direct.load_document(original).unwrap();
    direct.add_entry(draft("E2", 1)).unwrap();

    let left = incremental.rendered_bytes().unwrap();
    let right = direct.rendered_bytes().unwrap();
    assert_eq!(drawn(left), drawn(right));
    assert_eq!(texts(left), vec!["E2".to_string()]);
}

#[test]
fn preview_page_extraction_yields_single_page() {
    use stamp_core::{DocumentBackend, PdfDocument};

    let original = create_test_pdf(3, 600, 800);
    let rendered = engine()
        .rebuild(&original, &[entry("1", "second", 10, 10, 12, 2)])
        .unwrap();
    let doc = LopdfBackend.load(&rendered.bytes).unwrap();
    let single = doc.extract_page(1).unwrap();

    assert_eq!(page_count(&single), 1);
    assert_eq!(texts(&single), vec!["second".to_string()]);
}
