//! Property-based tests for the entry store and text handling

use proptest::prelude::*;
use stamp_core::entry::{deserialize_entries, serialize_entries};
use stamp_core::{sanitize_text, Draft, Entry, EntryStore, MemoryStore};
use std::collections::HashSet;

fn arb_entry() -> impl Strategy<Value = Entry> {
    (
        "[0-9]{1,13}",
        "\\PC{0,40}",
        "[a-zA-Z_ ]{0,12}",
        -2000i32..2000,
        -2000i32..2000,
        1u32..200,
        1u32..50,
    )
        .prop_map(|(id, text, key_name, x, y, size, page)| Entry {
            id,
            text,
            key_name,
            x,
            y,
            size,
            page,
        })
}

/// Non-empty entry lists with unique ids.
fn arb_entries() -> impl Strategy<Value = Vec<Entry>> {
    prop::collection::vec(arb_entry(), 1..20).prop_map(|entries| {
        let mut seen = HashSet::new();
        entries
            .into_iter()
            .filter(|e| seen.insert(e.id.clone()))
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn serialize_then_deserialize_is_identity(entries in arb_entries()) {
        let blob = serialize_entries(&entries);
        let parsed = deserialize_entries(&blob).unwrap();
        prop_assert_eq!(parsed, entries);
    }

    #[test]
    fn replace_all_after_round_trip_is_observably_identical(entries in arb_entries()) {
        let (mut store, _) = EntryStore::open(MemoryStore::new());
        let value = serde_json::to_value(&entries).unwrap();
        store.replace_all(value).unwrap();
        let before = store.serialize();

        let value: serde_json::Value = serde_json::from_str(&before).unwrap();
        store.replace_all(value).unwrap();

        prop_assert_eq!(store.serialize(), before);
        prop_assert_eq!(store.entries(), entries.as_slice());
    }

    #[test]
    fn sanitized_text_is_printable_ascii(text in "\\PC{0,64}") {
        let clean = sanitize_text(&text);
        prop_assert!(clean.chars().all(|c| (' '..='~').contains(&c)));
    }

    #[test]
    fn sanitizing_printable_ascii_is_a_no_op(text in "[ -~]{0,64}") {
        let clean = sanitize_text(&text);
        prop_assert_eq!(clean.as_ref(), text.as_str());
    }
}

#[test]
fn thousand_rapid_adds_have_unique_ids() {
    let (mut store, _) = EntryStore::open(MemoryStore::new());
    for i in 0..1000 {
        store
            .add(Draft {
                text: format!("entry {}", i),
                key_name: String::new(),
                x: i,
                y: i,
                size: 10,
                page: 1,
            })
            .unwrap();
    }
    let ids: HashSet<&str> = store.entries().iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids.len(), 1000);
}
