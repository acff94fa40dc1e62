//! PDF text and marker stamping
//!
//! Entries (positioned text or check markers) are kept in a persisted
//! store and reconciled onto an immutable original document with lopdf.
//!
//! - `store::EntryStore`: ordered entries with write-through persistence
//! - `engine::ReconciliationEngine`: rebuilds the annotated document from the
//!   original bytes on every change
//! - `preview::PreviewCoordinator`: single-page rendering and the live draft
//!   overlay
//! - `session::AnnotationSession`: ties the three together for a host

pub mod backend;
pub mod engine;
pub mod entry;
pub mod error;
pub mod font;
pub mod kv;
pub mod marker;
pub mod notice;
pub mod preview;
pub mod sanitize;
pub mod session;
pub mod store;

pub use backend::{DocumentBackend, LopdfBackend, PageSize, PdfDocument};
pub use engine::{EngineConfig, RebuildStats, ReconciliationEngine, Rendered};
pub use entry::{Draft, DraftInput, Entry, EntryId};
pub use error::{BackendError, StampError};
pub use kv::{FileStore, KeyValueStore, MemoryStore};
pub use notice::{Notice, NoticeKind};
pub use preview::{
    overlay_for_draft, Overlay, PreviewCoordinator, RasterizedPage, Rasterizer, RenderOutcome,
    ViewState,
};
pub use sanitize::sanitize_text;
pub use session::{AnnotationSession, Download, SessionOptions};
pub use store::{EntryStore, LoadReport, HISTORY_KEY};

/// Parse PDF bytes and return page count
pub fn get_page_count(bytes: &[u8]) -> Result<u32, StampError> {
    Ok(LopdfBackend.load(bytes)?.page_count())
}
