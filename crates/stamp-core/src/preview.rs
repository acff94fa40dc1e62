//! Preview Coordinator
//!
//! Keeps the single-page view in step with the latest rendered bytes and
//! positions the live overlay for a draft entry. Holds no annotation logic:
//! committed output always comes from the reconciliation engine.

use crate::backend::{DocumentBackend, PageSize, PdfDocument, DEFAULT_PAGE_SIZE};
use crate::error::StampError;
use async_trait::async_trait;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

pub const MIN_ZOOM: f64 = 0.1;
pub const MAX_ZOOM: f64 = 3.0;
pub const ZOOM_STEP: f64 = 0.1;

/// Pixel dimensions of a rasterized page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterizedPage {
    pub width: u32,
    pub height: u32,
}

/// Turns PDF bytes into pixels. The host owns the actual canvas.
#[async_trait(?Send)]
pub trait Rasterizer {
    async fn render_page(
        &self,
        pdf: &[u8],
        page_number: u32,
        scale: f64,
    ) -> Result<RasterizedPage, StampError>;
}

/// Cooperative cancellation flag shared between a render request and the
/// request that supersedes it.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// What the host should currently be showing.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub page: u32,
    pub page_count: u32,
    pub scale: f64,
    pub page_size: PageSize,
    pub canvas_width: u32,
    pub canvas_height: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderOutcome {
    Applied(ViewState),
    /// A newer request started before this one finished; its output was
    /// discarded.
    Superseded,
}

/// Transient overlay for an uncommitted draft, in view pixels relative to
/// the canvas top-left.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Overlay {
    pub visible: bool,
    pub text: String,
    pub left: f64,
    pub top: f64,
    pub font_size: f64,
}

/// Position a draft overlay.
///
/// Uses `y - size` as a cheap baseline correction; the committed render
/// places text exactly at `pageHeight - y`.
pub fn overlay_for_draft(
    page_width: f32,
    view_width: f64,
    x: i32,
    y: i32,
    size: u32,
    text: &str,
) -> Overlay {
    if text.trim().is_empty() || page_width <= 0.0 {
        return Overlay::default();
    }
    let scale = view_width / page_width as f64;
    Overlay {
        visible: true,
        text: text.to_string(),
        left: x as f64 * scale,
        top: (y as f64 - size as f64) * scale,
        font_size: size as f64 * scale,
    }
}

pub fn clamp_zoom(factor: f64) -> f64 {
    if factor.is_nan() {
        return 1.0;
    }
    factor.clamp(MIN_ZOOM, MAX_ZOOM)
}

pub fn zoom_label(scale: f64) -> String {
    format!("{}%", (scale * 100.0).round() as i64)
}

pub struct PreviewCoordinator<B: DocumentBackend, R: Rasterizer> {
    backend: B,
    rasterizer: R,
    document: RefCell<Option<Rc<Vec<u8>>>>,
    page_count: Cell<u32>,
    current_page: Cell<u32>,
    scale: Cell<f64>,
    in_flight: RefCell<Option<CancellationToken>>,
    view: RefCell<Option<ViewState>>,
}

impl<B: DocumentBackend, R: Rasterizer> PreviewCoordinator<B, R> {
    pub fn new(backend: B, rasterizer: R) -> Self {
        Self {
            backend,
            rasterizer,
            document: RefCell::new(None),
            page_count: Cell::new(0),
            current_page: Cell::new(1),
            scale: Cell::new(1.0),
            in_flight: RefCell::new(None),
            view: RefCell::new(None),
        }
    }

    /// Show `bytes` from now on. Any render still running for the previous
    /// bytes is superseded.
    pub fn set_document(&self, bytes: Vec<u8>) -> Result<u32, StampError> {
        let count = self.backend.load(&bytes)?.page_count();
        self.supersede();
        self.document.replace(Some(Rc::new(bytes)));
        self.page_count.set(count);
        let page = self.current_page.get().clamp(1, count.max(1));
        self.current_page.set(page);
        Ok(count)
    }

    pub fn page_count(&self) -> u32 {
        self.page_count.get()
    }

    pub fn current_page(&self) -> u32 {
        self.current_page.get()
    }

    pub fn scale(&self) -> f64 {
        self.scale.get()
    }

    pub fn zoom_label(&self) -> String {
        zoom_label(self.scale.get())
    }

    /// The last applied view, if any render has completed.
    pub fn view(&self) -> Option<ViewState> {
        self.view.borrow().clone()
    }

    fn supersede(&self) -> CancellationToken {
        let token = CancellationToken::new();
        if let Some(previous) = self.in_flight.replace(Some(token.clone())) {
            previous.cancel();
        }
        token
    }

    /// Rasterize `page` (1-based) of the current bytes at the current zoom.
    ///
    /// The page is first copied into a standalone one-page document so the
    /// rasterizer never sees the rest of the file. If another request starts
    /// before this one finishes, this one returns `Superseded` and leaves
    /// the view alone. A request rejected up front (no document, page out of
    /// range) does not supersede anything.
    pub async fn render_page(&self, page: u32) -> Result<RenderOutcome, StampError> {
        let bytes = self.document.borrow().clone().ok_or(StampError::NoDocument)?;

        let page_count = self.page_count.get();
        if page == 0 || page > page_count {
            return Err(StampError::Input(format!(
                "page {} is out of range (document has {} pages)",
                page, page_count
            )));
        }
        let token = self.supersede();
        self.current_page.set(page);
        let scale = self.scale.get();

        let doc = self.backend.load(&bytes)?;
        let page_size = doc.page_size(page - 1).unwrap_or(DEFAULT_PAGE_SIZE);
        let single = doc.extract_page(page - 1)?;
        drop(doc);

        let result = self.rasterizer.render_page(&single, 1, scale).await;
        if token.is_cancelled() {
            debug!(page, "Discarding superseded page render");
            return Ok(RenderOutcome::Superseded);
        }
        let raster = result?;

        let view = ViewState {
            page,
            page_count,
            scale,
            page_size,
            canvas_width: raster.width,
            canvas_height: raster.height,
        };
        self.view.replace(Some(view.clone()));
        debug!(page, scale, "Applied page render");
        Ok(RenderOutcome::Applied(view))
    }

    /// Navigate to `page`. Out-of-range targets are ignored (`Ok(None)`).
    pub async fn go_to_page(&self, page: u32) -> Result<Option<RenderOutcome>, StampError> {
        if page == 0 || page > self.page_count.get() {
            return Ok(None);
        }
        self.render_page(page).await.map(Some)
    }

    pub async fn next_page(&self) -> Result<Option<RenderOutcome>, StampError> {
        self.go_to_page(self.current_page.get().saturating_add(1)).await
    }

    pub async fn prev_page(&self) -> Result<Option<RenderOutcome>, StampError> {
        self.go_to_page(self.current_page.get().saturating_sub(1)).await
    }

    /// Clamp and apply `factor`, re-rendering the current page when a
    /// document is loaded.
    pub async fn set_zoom(&self, factor: f64) -> Result<Option<RenderOutcome>, StampError> {
        self.scale.set(clamp_zoom(factor));
        if self.document.borrow().is_none() {
            return Ok(None);
        }
        self.render_page(self.current_page.get()).await.map(Some)
    }

    pub async fn zoom_in(&self) -> Result<Option<RenderOutcome>, StampError> {
        self.set_zoom(self.scale.get() + ZOOM_STEP).await
    }

    pub async fn zoom_out(&self) -> Result<Option<RenderOutcome>, StampError> {
        self.set_zoom(self.scale.get() - ZOOM_STEP).await
    }

    /// Overlay for a draft on the currently shown page. Hidden until a page
    /// has been rendered.
    pub fn preview_draft(&self, x: i32, y: i32, size: u32, text: &str) -> Overlay {
        match self.view.borrow().as_ref() {
            Some(view) => overlay_for_draft(
                view.page_size.width,
                view.canvas_width as f64,
                x,
                y,
                size,
                text,
            ),
            None => Overlay::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::tests::RecordingBackend;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;
    use tokio::sync::oneshot;

    /// Rasterizer whose calls block until the matching gate is released.
    #[derive(Default)]
    struct GatedRasterizer {
        gates: RefCell<VecDeque<oneshot::Receiver<()>>>,
        calls: RefCell<Vec<(Vec<u8>, u32, f64)>>,
    }

    #[async_trait(?Send)]
    impl Rasterizer for GatedRasterizer {
        async fn render_page(
            &self,
            pdf: &[u8],
            page_number: u32,
            scale: f64,
        ) -> Result<RasterizedPage, StampError> {
            self.calls
                .borrow_mut()
                .push((pdf.to_vec(), page_number, scale));
            let gate = self.gates.borrow_mut().pop_front();
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            Ok(RasterizedPage {
                width: (600.0 * scale).round() as u32,
                height: (800.0 * scale).round() as u32,
            })
        }
    }

    fn coordinator(pages: usize) -> PreviewCoordinator<RecordingBackend, GatedRasterizer> {
        let coordinator = PreviewCoordinator::new(
            RecordingBackend::with_pages(pages, 800.0),
            GatedRasterizer::default(),
        );
        coordinator.set_document(b"rendered".to_vec()).unwrap();
        coordinator
    }

    #[test]
    fn test_overlay_scales_into_view_space() {
        let overlay = overlay_for_draft(600.0, 900.0, 100, 200, 12, "Hi");
        assert_eq!(
            overlay,
            Overlay {
                visible: true,
                text: "Hi".to_string(),
                left: 150.0,
                top: 282.0,
                font_size: 18.0,
            }
        );
    }

    #[test]
    fn test_overlay_hidden_for_blank_text() {
        assert!(!overlay_for_draft(600.0, 600.0, 1, 1, 12, "   ").visible);
    }

    #[test]
    fn test_zoom_is_clamped_and_labelled() {
        assert_eq!(clamp_zoom(5.0), MAX_ZOOM);
        assert_eq!(clamp_zoom(0.0), MIN_ZOOM);
        assert_eq!(zoom_label(1.0), "100%");
        assert_eq!(zoom_label(0.1 + 0.2), "30%");
    }

    #[tokio::test]
    async fn test_render_extracts_single_page_at_current_scale() {
        let coordinator = coordinator(3);
        let outcome = coordinator.render_page(2).await.unwrap();

        let RenderOutcome::Applied(view) = outcome else {
            panic!("render was not applied");
        };
        assert_eq!(view.page, 2);
        assert_eq!(view.page_count, 3);
        assert_eq!(view.canvas_width, 600);
        assert_eq!(
            coordinator.rasterizer.calls.borrow()[0],
            (b"page-2".to_vec(), 1, 1.0)
        );
    }

    #[tokio::test]
    async fn test_render_without_document_fails() {
        let coordinator = PreviewCoordinator::new(
            RecordingBackend::with_pages(1, 800.0),
            GatedRasterizer::default(),
        );
        assert_eq!(
            coordinator.render_page(1).await,
            Err(StampError::NoDocument)
        );
    }

    #[tokio::test]
    async fn test_last_request_wins() {
        let coordinator = coordinator(3);
        let (release_first, first_gate) = oneshot::channel();
        let (release_second, second_gate) = oneshot::channel();
        coordinator
            .rasterizer
            .gates
            .borrow_mut()
            .extend([first_gate, second_gate]);

        let first = coordinator.render_page(1);
        let second = coordinator.render_page(2);
        let driver = async {
            // The newer request finishes first, then the stale one.
            release_second.send(()).unwrap();
            tokio::task::yield_now().await;
            release_first.send(()).unwrap();
        };
        let (first, second, ()) = tokio::join!(first, second, driver);

        assert_eq!(first.unwrap(), RenderOutcome::Superseded);
        assert!(matches!(second.unwrap(), RenderOutcome::Applied(ref v) if v.page == 2));
        assert_eq!(coordinator.view().unwrap().page, 2);
        assert_eq!(coordinator.current_page(), 2);
    }

    #[tokio::test]
    async fn test_rejected_request_keeps_in_flight_render() {
        let coordinator = coordinator(2);
        let (release, gate) = oneshot::channel();
        coordinator.rasterizer.gates.borrow_mut().push_back(gate);

        let pending = coordinator.render_page(2);
        let rejected = coordinator.render_page(9);
        let driver = async {
            tokio::task::yield_now().await;
            release.send(()).unwrap();
        };
        let (pending, rejected, ()) = tokio::join!(pending, rejected, driver);

        assert!(matches!(rejected, Err(StampError::Input(_))));
        assert!(matches!(pending.unwrap(), RenderOutcome::Applied(ref v) if v.page == 2));
        assert_eq!(coordinator.view().unwrap().page, 2);
        assert_eq!(coordinator.current_page(), 2);
        assert_eq!(coordinator.rasterizer.calls.borrow().len(), 1);
    }

    #[tokio::test]
    async fn test_navigation_ignores_out_of_range_targets() {
        let coordinator = coordinator(2);
        assert_eq!(coordinator.prev_page().await.unwrap(), None);

        let next = coordinator.next_page().await.unwrap();
        assert!(matches!(next, Some(RenderOutcome::Applied(ref v)) if v.page == 2));
        assert_eq!(coordinator.next_page().await.unwrap(), None);
        assert_eq!(coordinator.current_page(), 2);
        assert_eq!(coordinator.go_to_page(9).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_zoom_rerenders_current_page() {
        let coordinator = coordinator(1);
        coordinator.set_zoom(2.0).await.unwrap();
        assert_eq!(coordinator.zoom_label(), "200%");
        assert_eq!(coordinator.view().unwrap().canvas_width, 1200);

        coordinator.set_zoom(10.0).await.unwrap();
        assert_eq!(coordinator.scale(), MAX_ZOOM);

        coordinator.zoom_out().await.unwrap();
        assert_eq!(coordinator.zoom_label(), "290%");
    }

    #[tokio::test]
    async fn test_preview_draft_uses_rendered_view_width() {
        let coordinator = coordinator(1);
        assert!(!coordinator.preview_draft(10, 20, 12, "x").visible);

        coordinator.set_zoom(1.5).await.unwrap();
        let overlay = coordinator.preview_draft(100, 112, 12, "Draft");
        assert_eq!(overlay.left, 150.0);
        assert_eq!(overlay.top, 150.0);
        assert_eq!(overlay.font_size, 18.0);
    }

    #[test]
    fn test_new_document_clamps_current_page() {
        let short = PreviewCoordinator::new(
            RecordingBackend::with_pages(2, 800.0),
            GatedRasterizer::default(),
        );
        short.current_page.set(5);
        assert_eq!(short.set_document(b"x".to_vec()).unwrap(), 2);
        assert_eq!(short.current_page(), 2);
    }
}
