//! Entry Store: the authoritative entry list with write-through persistence

use crate::entry::{
    parse_entries, serialize_entries, Draft, Entry, EntryId, IdGenerator,
};
use crate::error::StampError;
use crate::kv::KeyValueStore;
use serde_json::Value;
use tracing::{debug, info, warn};

/// Key the entry list is persisted under.
pub const HISTORY_KEY: &str = "pdfTextHistory";

/// Outcome of loading persisted history at startup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub loaded: usize,
    /// Set when persisted data existed but could not be used.
    pub warning: Option<String>,
}

pub struct EntryStore<K: KeyValueStore> {
    kv: K,
    key: String,
    entries: Vec<Entry>,
    ids: IdGenerator,
}

impl<K: KeyValueStore> EntryStore<K> {
    pub fn open(kv: K) -> (Self, LoadReport) {
        Self::open_with_key(kv, HISTORY_KEY)
    }

    /// Load the list persisted under `key`.
    ///
    /// Never fails: unreadable or malformed history starts an empty store
    /// and is reported through [`LoadReport::warning`].
    pub fn open_with_key(kv: K, key: &str) -> (Self, LoadReport) {
        let mut ids = IdGenerator::new();
        let mut report = LoadReport::default();

        let entries = match kv.get(key) {
            Ok(Some(blob)) => match serde_json::from_str::<Value>(&blob)
                .map_err(|e| StampError::Validation(format!("not valid JSON: {}", e)))
                .and_then(|value| parse_entries(value, &mut ids))
            {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(key, error = %e, "Ignoring malformed entry history");
                    report.warning = Some(format!("Saved history could not be read: {}", e));
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(key, error = %e, "Entry history unavailable");
                report.warning = Some(format!("Saved history could not be read: {}", e));
                Vec::new()
            }
        };

        report.loaded = entries.len();
        info!(key, loaded = report.loaded, "Entry store opened");

        (
            Self {
                kv,
                key: key.to_string(),
                entries,
                ids,
            },
            report,
        )
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn get(&self, id: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn kv(&self) -> &K {
        &self.kv
    }

    /// Append `draft` under a fresh id and persist.
    pub fn add(&mut self, draft: Draft) -> Result<Entry, StampError> {
        let entries = &self.entries;
        let id: EntryId = self
            .ids
            .next_id(|candidate| entries.iter().any(|e| e.id == candidate));
        let entry = draft.into_entry(id);

        let mut next = self.entries.clone();
        next.push(entry.clone());
        self.commit(next)?;
        debug!(id = %entry.id, page = entry.page, "Entry added");
        Ok(entry)
    }

    /// Remove the entry with `id`. Returns false (and writes nothing) when
    /// no entry matches.
    pub fn remove(&mut self, id: &str) -> Result<bool, StampError> {
        let Some(index) = self.entries.iter().position(|e| e.id == id) else {
            return Ok(false);
        };
        let mut next = self.entries.clone();
        next.remove(index);
        self.commit(next)?;
        debug!(id, "Entry removed");
        Ok(true)
    }

    pub fn clear(&mut self) -> Result<(), StampError> {
        self.commit(Vec::new())
    }

    /// Replace the whole list with a validated import.
    ///
    /// On any validation failure the current list is left untouched.
    pub fn replace_all(&mut self, value: Value) -> Result<usize, StampError> {
        let entries = parse_entries(value, &mut self.ids)?;
        let count = entries.len();
        self.commit(entries)?;
        info!(count, "Entry list replaced");
        Ok(count)
    }

    /// Canonical JSON of the current list.
    pub fn serialize(&self) -> String {
        serialize_entries(&self.entries)
    }

    /// Persist `next` and only then make it current, so a failed write
    /// leaves both memory and storage at the previous list.
    fn commit(&mut self, next: Vec<Entry>) -> Result<(), StampError> {
        self.kv.set(&self.key, &serialize_entries(&next))?;
        self.entries = next;
        Ok(())
    }
}
