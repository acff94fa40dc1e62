//! Annotation entries and their canonical JSON form
//!
//! An entry is one positioned instruction: literal text, or the marker
//! directive `"true"` which renders a check image instead of text.

use crate::error::StampError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

pub type EntryId = String;

/// Size used for a marker whose entry carries no usable size.
pub const DEFAULT_MARKER_SIZE: u32 = 12;

/// Fields every imported record must carry.
const REQUIRED_FIELDS: [&str; 5] = ["text", "x", "y", "size", "page"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub id: EntryId,
    pub text: String,
    /// Descriptive label only. Never affects placement or rendering.
    #[serde(default)]
    pub key_name: String,
    /// Document-space x, origin at the left page edge.
    pub x: i32,
    /// Document-space y, measured downward from the page top.
    pub y: i32,
    pub size: u32,
    /// 1-based page number.
    pub page: u32,
}

impl Entry {
    /// Whether the text is the marker directive (`"true"`, any case, exact).
    pub fn is_marker(&self) -> bool {
        is_marker_text(&self.text)
    }

    pub fn marker_size(&self) -> u32 {
        if self.size == 0 {
            DEFAULT_MARKER_SIZE
        } else {
            self.size
        }
    }

    /// One-line summary shown in the history list.
    pub fn describe(&self) -> String {
        let key = if self.key_name.is_empty() {
            String::new()
        } else {
            format!("Key: {} | ", self.key_name)
        };
        format!(
            "{} {}Page {} | Position: ({}, {}) | Size: {}px",
            self.text, key, self.page, self.x, self.y, self.size
        )
    }

    /// The form values that recreate this entry (used by edit).
    pub fn to_draft(&self) -> Draft {
        Draft {
            text: self.text.clone(),
            key_name: self.key_name.clone(),
            x: self.x,
            y: self.y,
            size: self.size,
            page: self.page,
        }
    }
}

pub fn is_marker_text(text: &str) -> bool {
    text.eq_ignore_ascii_case("true")
}

/// A validated entry that has not been assigned an id yet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    pub text: String,
    #[serde(default)]
    pub key_name: String,
    pub x: i32,
    pub y: i32,
    pub size: u32,
    pub page: u32,
}

impl Draft {
    pub fn into_entry(self, id: EntryId) -> Entry {
        Entry {
            id,
            text: self.text,
            key_name: self.key_name,
            x: self.x,
            y: self.y,
            size: self.size,
            page: self.page,
        }
    }
}

/// Raw form values as typed by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DraftInput {
    pub text: String,
    pub key_name: String,
    pub x: String,
    pub y: String,
    pub size: String,
    pub page: String,
}

impl DraftInput {
    /// Validate the form. Text must be non-blank; coordinates must be
    /// integers; size and page must be positive integers.
    pub fn parse(&self) -> Result<Draft, StampError> {
        if self.text.trim().is_empty() {
            return Err(StampError::Input(
                "Please enter some text to add.".to_string(),
            ));
        }

        let x = parse_field::<i32>("x", &self.x)?;
        let y = parse_field::<i32>("y", &self.y)?;
        let size = parse_field::<u32>("size", &self.size)?;
        let page = parse_field::<u32>("page", &self.page)?;

        if size == 0 {
            return Err(StampError::Input("size must be at least 1".to_string()));
        }
        if page == 0 {
            return Err(StampError::Input("page numbers start at 1".to_string()));
        }

        Ok(Draft {
            text: self.text.clone(),
            key_name: self.key_name.trim().to_string(),
            x,
            y,
            size,
            page,
        })
    }
}

impl From<&Draft> for DraftInput {
    fn from(draft: &Draft) -> Self {
        Self {
            text: draft.text.clone(),
            key_name: draft.key_name.clone(),
            x: draft.x.to_string(),
            y: draft.y.to_string(),
            size: draft.size.to_string(),
            page: draft.page.to_string(),
        }
    }
}

fn parse_field<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, StampError> {
    raw.trim()
        .parse()
        .map_err(|_| StampError::Input(format!("{} must be a whole number, got {:?}", name, raw)))
}

/// Generates timestamp-based ids that never repeat within one generator
/// and skip ids that are already taken.
#[derive(Debug, Default)]
pub struct IdGenerator {
    last: i64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self, taken: impl Fn(&str) -> bool) -> EntryId {
        let now = chrono::Utc::now().timestamp_millis();
        let mut candidate = now.max(self.last + 1);
        while taken(&candidate.to_string()) {
            candidate += 1;
        }
        self.last = candidate;
        candidate.to_string()
    }
}

/// Imported record shape. `id` and `keyName` are optional; ids written as
/// numbers by older exports are accepted.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EntryRecord {
    #[serde(default)]
    id: Option<Value>,
    text: String,
    #[serde(default)]
    key_name: Option<String>,
    x: i32,
    y: i32,
    size: u32,
    page: u32,
}

/// Validate a JSON value as an entry sequence.
///
/// Missing, empty or duplicate ids are replaced with fresh ones so the
/// resulting list always has unique ids.
pub fn parse_entries(value: Value, ids: &mut IdGenerator) -> Result<Vec<Entry>, StampError> {
    let items = match value {
        Value::Array(items) => items,
        other => {
            return Err(StampError::Validation(format!(
                "expected a JSON array of entries, found {}",
                json_kind(&other)
            )))
        }
    };

    let mut records = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        let Value::Object(map) = &item else {
            return Err(StampError::Validation(format!(
                "entry {} is {}, expected an object",
                index,
                json_kind(&item)
            )));
        };
        if let Some(missing) = REQUIRED_FIELDS.iter().find(|f| !map.contains_key(**f)) {
            return Err(StampError::Validation(format!(
                "entry {} is missing required field `{}`",
                index, missing
            )));
        }
        let record: EntryRecord = serde_json::from_value(item)
            .map_err(|e| StampError::Validation(format!("entry {}: {}", index, e)))?;
        records.push(record);
    }

    let mut seen: HashSet<String> = HashSet::new();
    let mut entries = Vec::with_capacity(records.len());
    for record in records {
        let proposed = match record.id {
            Some(Value::String(s)) if !s.is_empty() => Some(s),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };
        let id = match proposed {
            Some(id) if !seen.contains(&id) => id,
            _ => ids.next_id(|candidate| seen.contains(candidate)),
        };
        seen.insert(id.clone());
        entries.push(Entry {
            id,
            text: record.text,
            key_name: record.key_name.unwrap_or_default(),
            x: record.x,
            y: record.y,
            size: record.size,
            page: record.page,
        });
    }
    Ok(entries)
}

/// Parse the canonical JSON text of an entry list.
pub fn deserialize_entries(blob: &str) -> Result<Vec<Entry>, StampError> {
    let value: Value = serde_json::from_str(blob)
        .map_err(|e| StampError::Validation(format!("not valid JSON: {}", e)))?;
    parse_entries(value, &mut IdGenerator::new())
}

pub fn serialize_entries(entries: &[Entry]) -> String {
    // Plain structs of strings and integers always serialize.
    serde_json::to_string(entries).unwrap_or_else(|_| "[]".to_string())
}

pub fn serialize_entries_pretty(entries: &[Entry]) -> String {
    serde_json::to_string_pretty(entries).unwrap_or_else(|_| "[]".to_string())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(id: &str, text: &str) -> Entry {
        Entry {
            id: id.to_string(),
            text: text.to_string(),
            key_name: String::new(),
            x: 50,
            y: 100,
            size: 12,
            page: 1,
        }
    }

    #[test]
    fn test_marker_directive_is_exact_and_case_insensitive() {
        assert!(entry("1", "true").is_marker());
        assert!(entry("1", "TRUE").is_marker());
        assert!(entry("1", "True").is_marker());
        assert!(!entry("1", "true story").is_marker());
        assert!(!entry("1", " true").is_marker());
        assert!(!entry("1", "truthy").is_marker());
    }

    #[test]
    fn test_marker_size_defaults_when_zero() {
        let mut e = entry("1", "true");
        e.size = 0;
        assert_eq!(e.marker_size(), DEFAULT_MARKER_SIZE);
        e.size = 20;
        assert_eq!(e.marker_size(), 20);
    }

    #[test]
    fn test_describe_includes_key_only_when_present() {
        let mut e = entry("1", "Hello");
        assert_eq!(e.describe(), "Hello Page 1 | Position: (50, 100) | Size: 12px");
        e.key_name = "name".to_string();
        assert_eq!(
            e.describe(),
            "Hello Key: name | Page 1 | Position: (50, 100) | Size: 12px"
        );
    }

    #[test]
    fn test_serialized_field_names_are_canonical() {
        let mut e = entry("42", "Hi");
        e.key_name = "k".to_string();
        let value: Value = serde_json::from_str(&serialize_entries(&[e])).unwrap();
        assert_eq!(
            value,
            json!([{ "id": "42", "text": "Hi", "keyName": "k", "x": 50, "y": 100, "size": 12, "page": 1 }])
        );
    }

    #[test]
    fn test_draft_input_rejects_blank_text() {
        let input = DraftInput {
            text: "   ".to_string(),
            x: "1".to_string(),
            y: "1".to_string(),
            size: "12".to_string(),
            page: "1".to_string(),
            ..Default::default()
        };
        assert!(matches!(input.parse(), Err(StampError::Input(_))));
    }

    #[test]
    fn test_draft_input_rejects_non_numeric_values() {
        let base = DraftInput {
            text: "Hello".to_string(),
            key_name: String::new(),
            x: "10".to_string(),
            y: "20".to_string(),
            size: "12".to_string(),
            page: "1".to_string(),
        };
        assert!(base.parse().is_ok());

        let bad_x = DraftInput { x: "ten".to_string(), ..base.clone() };
        assert!(matches!(bad_x.parse(), Err(StampError::Input(_))));

        let bad_page = DraftInput { page: "".to_string(), ..base.clone() };
        assert!(matches!(bad_page.parse(), Err(StampError::Input(_))));

        let zero_size = DraftInput { size: "0".to_string(), ..base.clone() };
        assert!(matches!(zero_size.parse(), Err(StampError::Input(_))));

        let negative_size = DraftInput { size: "-4".to_string(), ..base };
        assert!(matches!(negative_size.parse(), Err(StampError::Input(_))));
    }

    #[test]
    fn test_draft_input_trims_key_and_numbers() {
        let input = DraftInput {
            text: "Hello".to_string(),
            key_name: "  owner ".to_string(),
            x: " 10 ".to_string(),
            y: "20".to_string(),
            size: "12".to_string(),
            page: "2".to_string(),
        };
        let draft = input.parse().unwrap();
        assert_eq!(draft.key_name, "owner");
        assert_eq!(draft.x, 10);
        assert_eq!(draft.page, 2);
    }

    #[test]
    fn test_parse_entries_rejects_non_array() {
        let err = parse_entries(json!({"a": 1}), &mut IdGenerator::new()).unwrap_err();
        assert!(matches!(err, StampError::Validation(_)));
    }

    #[test]
    fn test_parse_entries_reports_missing_field() {
        let err = parse_entries(
            json!([{ "text": "a", "x": 1, "y": 2, "page": 1 }]),
            &mut IdGenerator::new(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            StampError::Validation("entry 0 is missing required field `size`".to_string())
        );
    }

    #[test]
    fn test_parse_entries_regenerates_missing_and_duplicate_ids() {
        let entries = parse_entries(
            json!([
                { "id": "7", "text": "a", "x": 1, "y": 2, "size": 3, "page": 1 },
                { "id": "7", "text": "b", "x": 1, "y": 2, "size": 3, "page": 1 },
                { "text": "c", "x": 1, "y": 2, "size": 3, "page": 1 },
                { "id": 99, "text": "d", "x": 1, "y": 2, "size": 3, "page": 1 }
            ]),
            &mut IdGenerator::new(),
        )
        .unwrap();

        assert_eq!(entries[0].id, "7");
        assert_ne!(entries[1].id, "7");
        assert!(!entries[2].id.is_empty());
        assert_eq!(entries[3].id, "99");
        let unique: HashSet<_> = entries.iter().map(|e| e.id.clone()).collect();
        assert_eq!(unique.len(), 4);
        assert_eq!(entries[2].key_name, "");
    }

    #[test]
    fn test_id_generator_skips_taken_ids() {
        let mut ids = IdGenerator::new();
        let first = ids.next_id(|_| false);
        let blocked = (first.parse::<i64>().unwrap() + 1).to_string();
        let second = ids.next_id(|candidate| candidate == blocked);
        assert_ne!(second, first);
        assert_ne!(second, blocked);
    }
}
