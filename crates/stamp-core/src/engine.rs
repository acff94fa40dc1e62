//! Reconciliation Engine
//!
//! Every rebuild starts from the pristine original bytes and redraws the
//! whole entry list. Nothing rendered is ever used as the base of a later
//! rebuild, so deleted entries cannot leave ghosts behind.

use crate::backend::{
    DocumentBackend, FontSource, ImagePlacement, PageSize, PdfDocument, TextPlacement,
    DEFAULT_PAGE_SIZE,
};
use crate::entry::Entry;
use crate::error::StampError;
use crate::font::{FontProgram, StandardFont};
use crate::marker::MarkerImage;
use crate::sanitize::sanitize_text;
use std::sync::Arc;
use tracing::{debug, info, warn};

type Doc<B> = <B as DocumentBackend>::Document;
type FontOf<B> = <Doc<B> as PdfDocument>::Font;
type ImageOf<B> = <Doc<B> as PdfDocument>::Image;

/// Resources the engine draws with.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// TrueType program to embed; the standard font is used without it.
    pub preferred_font: Option<Vec<u8>>,
    /// PNG drawn for marker entries; a built-in check mark otherwise.
    pub marker_png: Option<Vec<u8>>,
    pub fallback_font: StandardFont,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebuildStats {
    pub text: usize,
    pub markers: usize,
    /// Entries whose page does not exist in the document.
    pub skipped: usize,
    /// Marker entries drawn as literal text after the image failed.
    pub marker_fallbacks: usize,
}

#[derive(Debug, Clone)]
pub struct Rendered {
    pub bytes: Vec<u8>,
    pub stats: RebuildStats,
}

#[derive(Debug, Clone)]
enum Resolved<T> {
    Unresolved,
    Ready(Arc<T>),
    Failed(String),
}

pub struct ReconciliationEngine<B: DocumentBackend> {
    backend: B,
    config: EngineConfig,
    font: Resolved<FontProgram>,
    marker: Resolved<MarkerImage>,
}

impl<B: DocumentBackend> ReconciliationEngine<B> {
    pub fn new(backend: B, config: EngineConfig) -> Self {
        Self {
            backend,
            config,
            font: Resolved::Unresolved,
            marker: Resolved::Unresolved,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Drop cached font and marker resources. Called when a new document
    /// is loaded.
    pub fn reset_resources(&mut self) {
        self.font = Resolved::Unresolved;
        self.marker = Resolved::Unresolved;
    }

    pub fn has_cached_marker(&self) -> bool {
        matches!(self.marker, Resolved::Ready(_))
    }

    /// Produce the fully annotated document for `entries` on top of
    /// `original`.
    pub fn rebuild(&mut self, original: &[u8], entries: &[Entry]) -> Result<Rendered, StampError> {
        let mut doc = self.backend.load(original)?;
        let font = self.embed_font(&mut doc)?;
        let page_count = doc.page_count();

        let mut stats = RebuildStats::default();
        let mut marker: Option<ImageOf<B>> = None;

        for entry in entries {
            let Some(page) = page_for(&doc, page_count, entry.page) else {
                debug!(id = %entry.id, page = entry.page, page_count, "Skipping entry for missing page");
                stats.skipped += 1;
                continue;
            };
            let index = entry.page - 1;

            if entry.is_marker() {
                match self.draw_marker(&mut doc, &mut marker, index, entry, page) {
                    Ok(()) => {
                        stats.markers += 1;
                        continue;
                    }
                    Err(e) => {
                        warn!(id = %entry.id, error = %e, "Marker failed, drawing text instead");
                        stats.marker_fallbacks += 1;
                    }
                }
            }

            let placement = TextPlacement {
                x: entry.x as f32,
                y: page.height - entry.y as f32,
                size: entry.size as f32,
            };
            match doc.draw_text(index, &sanitize_text(&entry.text), placement, &font) {
                Ok(()) => stats.text += 1,
                Err(e) => {
                    warn!(id = %entry.id, error = %e, "Text could not be drawn");
                    stats.skipped += 1;
                }
            }
        }

        let bytes = doc.save()?;
        info!(
            entries = entries.len(),
            text = stats.text,
            markers = stats.markers,
            skipped = stats.skipped,
            bytes = bytes.len(),
            "Rebuilt document"
        );
        Ok(Rendered { bytes, stats })
    }

    fn embed_font(&mut self, doc: &mut Doc<B>) -> Result<FontOf<B>, StampError> {
        if let Some(program) = self.preferred_font() {
            match doc.embed_font(FontSource::TrueType(&program)) {
                Ok(font) => return Ok(font),
                Err(e) => warn!(error = %e, "Preferred font could not be embedded, using standard font"),
            }
        }
        doc.embed_font(FontSource::Standard(self.config.fallback_font))
            .map_err(|e| StampError::RenderResource(e.to_string()))
    }

    fn preferred_font(&mut self) -> Option<Arc<FontProgram>> {
        match &self.font {
            Resolved::Ready(program) => return Some(program.clone()),
            Resolved::Failed(_) => return None,
            Resolved::Unresolved => {}
        }
        let data = self.config.preferred_font.clone()?;
        match FontProgram::parse(data) {
            Ok(program) => {
                let program = Arc::new(program);
                self.font = Resolved::Ready(program.clone());
                Some(program)
            }
            Err(e) => {
                warn!(error = %e, "Preferred font unusable, using standard font");
                self.font = Resolved::Failed(e.to_string());
                None
            }
        }
    }

    fn marker_image(&mut self) -> Result<Arc<MarkerImage>, StampError> {
        match &self.marker {
            Resolved::Ready(image) => {
                debug!("Marker image cache hit");
                return Ok(image.clone());
            }
            Resolved::Failed(reason) => return Err(StampError::RenderResource(reason.clone())),
            Resolved::Unresolved => {}
        }
        let decoded = match &self.config.marker_png {
            Some(bytes) => MarkerImage::from_png(bytes),
            None => Ok(MarkerImage::check_mark()),
        };
        match decoded {
            Ok(image) => {
                let image = Arc::new(image);
                self.marker = Resolved::Ready(image.clone());
                Ok(image)
            }
            Err(e) => {
                self.marker = Resolved::Failed(e.to_string());
                Err(e)
            }
        }
    }

    fn draw_marker(
        &mut self,
        doc: &mut Doc<B>,
        handle: &mut Option<ImageOf<B>>,
        index: u32,
        entry: &Entry,
        page: PageSize,
    ) -> Result<(), StampError> {
        if handle.is_none() {
            let image = self.marker_image()?;
            *handle = Some(doc.embed_image(&image)?);
        }
        let Some(image) = handle.as_ref() else {
            return Err(StampError::RenderResource("marker image unavailable".to_string()));
        };

        let size = entry.marker_size() as f32;
        let placement = ImagePlacement {
            x: entry.x as f32,
            y: page.height - entry.y as f32 - size,
            width: size,
            height: size,
        };
        doc.draw_image(index, image, placement)?;
        Ok(())
    }
}

fn page_for<D: PdfDocument>(doc: &D, page_count: u32, page: u32) -> Option<PageSize> {
    if page == 0 || page > page_count {
        return None;
    }
    Some(doc.page_size(page - 1).unwrap_or(DEFAULT_PAGE_SIZE))
}
