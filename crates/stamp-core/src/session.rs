//! Annotation session: one loaded document, its entry store and the
//! engine that renders them together.
//!
//! Every mutation goes through [`AnnotationSession::refresh`], the single
//! rebuild path.

use crate::backend::{DocumentBackend, PageSize, PdfDocument, DEFAULT_PAGE_SIZE};
use crate::engine::{EngineConfig, RebuildStats, ReconciliationEngine};
use crate::entry::{serialize_entries_pretty, Draft, DraftInput, Entry};
use crate::error::StampError;
use crate::kv::KeyValueStore;
use crate::store::{EntryStore, LoadReport, HISTORY_KEY};
use serde_json::Value;
use tracing::{info, warn};

pub const DEFAULT_PDF_FILENAME: &str = "edited-document.pdf";
pub const DEFAULT_HISTORY_FILENAME: &str = "pdf_text_history.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub history_key: String,
    pub pdf_filename: String,
    pub history_filename: String,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            history_key: HISTORY_KEY.to_string(),
            pdf_filename: DEFAULT_PDF_FILENAME.to_string(),
            history_filename: DEFAULT_HISTORY_FILENAME.to_string(),
        }
    }
}

/// Bytes the host should offer for download under `filename`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub filename: String,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

struct LoadedDocument {
    original: Vec<u8>,
    rendered: Vec<u8>,
    pages: Vec<PageSize>,
}

pub struct AnnotationSession<B: DocumentBackend, K: KeyValueStore> {
    store: EntryStore<K>,
    engine: ReconciliationEngine<B>,
    document: Option<LoadedDocument>,
    options: SessionOptions,
    last_stats: Option<RebuildStats>,
}

impl<B: DocumentBackend, K: KeyValueStore> AnnotationSession<B, K> {
    /// Open the persisted history. Unreadable history never fails here; it
    /// is reported through the returned [`LoadReport`].
    pub fn new(
        backend: B,
        kv: K,
        config: EngineConfig,
        options: SessionOptions,
    ) -> (Self, LoadReport) {
        let (store, report) = EntryStore::open_with_key(kv, &options.history_key);
        let session = Self {
            store,
            engine: ReconciliationEngine::new(backend, config),
            document: None,
            options,
            last_stats: None,
        };
        (session, report)
    }

    pub fn entries(&self) -> &[Entry] {
        self.store.entries()
    }

    pub fn store(&self) -> &EntryStore<K> {
        &self.store
    }

    pub fn is_loaded(&self) -> bool {
        self.document.is_some()
    }

    pub fn page_count(&self) -> u32 {
        self.document
            .as_ref()
            .map(|doc| doc.pages.len() as u32)
            .unwrap_or(0)
    }

    /// Size of 1-based `page` of the loaded document.
    pub fn page_size(&self, page: u32) -> Option<PageSize> {
        let doc = self.document.as_ref()?;
        doc.pages.get(page.checked_sub(1)? as usize).copied()
    }

    pub fn original_bytes(&self) -> Option<&[u8]> {
        self.document.as_ref().map(|doc| doc.original.as_slice())
    }

    /// The latest successfully rebuilt document.
    pub fn rendered_bytes(&self) -> Option<&[u8]> {
        self.document.as_ref().map(|doc| doc.rendered.as_slice())
    }

    pub fn last_stats(&self) -> Option<&RebuildStats> {
        self.last_stats.as_ref()
    }

    /// Capture `bytes` as the pristine original and render the persisted
    /// entries onto it.
    ///
    /// If the first rebuild fails the document stays loaded and the
    /// unannotated original is shown.
    pub fn load_document(&mut self, bytes: Vec<u8>) -> Result<u32, StampError> {
        let probe = self.engine.backend().load(&bytes)?;
        let count = probe.page_count();
        let pages = (0..count)
            .map(|index| probe.page_size(index).unwrap_or(DEFAULT_PAGE_SIZE))
            .collect::<Vec<_>>();
        drop(probe);

        self.engine.reset_resources();
        self.document = Some(LoadedDocument {
            rendered: bytes.clone(),
            original: bytes,
            pages,
        });
        info!(pages = count, "Document loaded");
        self.refresh()?;
        Ok(count)
    }

    /// Rebuild from the original bytes and the current entry list. On
    /// failure the previously rendered bytes stay current.
    pub fn refresh(&mut self) -> Result<(), StampError> {
        let Some(doc) = self.document.as_mut() else {
            return Ok(());
        };
        match self.engine.rebuild(&doc.original, self.store.entries()) {
            Ok(rendered) => {
                doc.rendered = rendered.bytes;
                self.last_stats = Some(rendered.stats);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Rebuild failed, keeping previous render");
                Err(e)
            }
        }
    }

    pub fn add_input(&mut self, input: &DraftInput) -> Result<Entry, StampError> {
        let draft = input.parse()?;
        self.add_entry(draft)
    }

    /// Add `draft` under a fresh id and re-render.
    pub fn add_entry(&mut self, draft: Draft) -> Result<Entry, StampError> {
        if self.document.is_none() {
            return Err(StampError::NoDocument);
        }
        if draft.text.trim().is_empty() {
            return Err(StampError::Input(
                "Please enter some text to add.".to_string(),
            ));
        }
        let pages = self.page_count();
        if draft.page == 0 || draft.page > pages {
            return Err(StampError::Input(format!(
                "Page {} does not exist (document has {} pages)",
                draft.page, pages
            )));
        }

        let entry = self.store.add(draft)?;
        self.refresh()?;
        Ok(entry)
    }

    /// Delete entry `id`. Returns false when no entry matched.
    pub fn delete_entry(&mut self, id: &str) -> Result<bool, StampError> {
        let removed = self.store.remove(id)?;
        if removed {
            self.refresh()?;
        }
        Ok(removed)
    }

    pub fn clear_entries(&mut self) -> Result<(), StampError> {
        self.store.clear()?;
        self.refresh()
    }

    /// Replace the entry list with the JSON array in `text`.
    pub fn import_json(&mut self, text: &str) -> Result<usize, StampError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| StampError::Validation(format!("invalid JSON format: {}", e)))?;
        let count = self.store.replace_all(value)?;
        self.refresh()?;
        Ok(count)
    }

    /// Re-render the loaded document from its original bytes.
    pub fn reload(&mut self) -> Result<(), StampError> {
        if self.document.is_none() {
            return Err(StampError::NoDocument);
        }
        self.refresh()
    }

    /// Remove entry `id` and hand back its values so the user can adjust
    /// and re-add them. The re-added entry gets a new id.
    pub fn begin_edit(&mut self, id: &str) -> Result<Option<Draft>, StampError> {
        let Some(draft) = self.store.get(id).map(Entry::to_draft) else {
            return Ok(None);
        };
        self.delete_entry(id)?;
        Ok(Some(draft))
    }

    pub fn export_pdf(&self) -> Result<Download, StampError> {
        let bytes = self.rendered_bytes().ok_or(StampError::NoDocument)?;
        Ok(Download {
            filename: self.options.pdf_filename.clone(),
            mime: "application/pdf",
            bytes: bytes.to_vec(),
        })
    }

    pub fn export_history(&self) -> Download {
        Download {
            filename: self.options.history_filename.clone(),
            mime: "application/json",
            bytes: serialize_entries_pretty(self.store.entries()).into_bytes(),
        }
    }
}
