//! Stateful stamping session exposed to JavaScript
//!
//! Entries, the pristine document and the rendered bytes all live in Rust.
//! JavaScript forwards form values and file bytes, shows the returned
//! notices and awaits page renders.

use crate::bridge::PdfJsRasterizer;
use crate::storage::LocalStorage;
use crate::view::{NoticeView, OverlayView, PageView};
use js_sys::{Object, Promise, Reflect, Uint8Array};
use serde::Serialize;
use stamp_core::{
    AnnotationSession, Download, DraftInput, EngineConfig, LopdfBackend, Notice, Overlay,
    PreviewCoordinator, RenderOutcome, SessionOptions, StampError,
};
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;
use web_sys::HtmlCanvasElement;

type Preview = PreviewCoordinator<LopdfBackend, PdfJsRasterizer>;

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value)
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

fn notice_value(notice: &Notice) -> JsValue {
    to_js(&NoticeView::from(notice)).unwrap_or_else(|_| JsValue::from_str(&notice.message))
}

/// Ok and Err both carry a notice object for the page to display.
fn settle<T>(result: Result<T, StampError>, success: &str) -> Result<JsValue, JsValue> {
    let notice = Notice::for_result(&result, success);
    match result {
        Ok(_) => Ok(notice_value(&notice)),
        Err(_) => Err(notice_value(&notice)),
    }
}

fn download_value(download: Download) -> Result<JsValue, JsValue> {
    let obj = Object::new();
    Reflect::set(&obj, &"filename".into(), &download.filename.into())?;
    Reflect::set(&obj, &"mime".into(), &download.mime.into())?;
    let bytes = Uint8Array::new_with_length(download.bytes.len() as u32);
    bytes.copy_from(&download.bytes);
    Reflect::set(&obj, &"bytes".into(), &bytes)?;
    Ok(obj.into())
}

fn page_promise<F>(preview: Rc<Preview>, render: F) -> Promise
where
    F: for<'a> FnOnce(
            &'a Preview,
        ) -> std::pin::Pin<
            Box<dyn std::future::Future<Output = Result<Option<RenderOutcome>, StampError>> + 'a>,
        > + 'static,
{
    future_to_promise(async move {
        let outcome = render(&preview).await;
        match outcome {
            Ok(Some(outcome)) => to_js(&PageView::from_outcome(&outcome, preview.zoom_label())),
            Ok(None) => Ok(JsValue::NULL),
            Err(e) => Err(notice_value(&Notice::from_error(&e))),
        }
    })
}

#[wasm_bindgen]
pub struct StampSession {
    session: AnnotationSession<LopdfBackend, LocalStorage>,
    preview: Rc<Preview>,
    load_warning: Option<String>,
}

#[wasm_bindgen]
impl StampSession {
    /// Open the history saved in `localStorage` and draw previews onto
    /// `canvas`. `font` (TrueType) and `marker` (PNG) are optional.
    #[wasm_bindgen(constructor)]
    pub fn new(
        canvas: HtmlCanvasElement,
        font: Option<Vec<u8>>,
        marker: Option<Vec<u8>>,
    ) -> Result<StampSession, JsValue> {
        let config = EngineConfig {
            preferred_font: font,
            marker_png: marker,
            ..EngineConfig::default()
        };
        let (session, report) = AnnotationSession::new(
            LopdfBackend,
            LocalStorage::open()?,
            config,
            SessionOptions::default(),
        );
        if let Some(warning) = &report.warning {
            web_sys::console::warn_1(&warning.into());
        }
        Ok(Self {
            session,
            preview: Rc::new(PreviewCoordinator::new(
                LopdfBackend,
                PdfJsRasterizer::new(canvas),
            )),
            load_warning: report.warning,
        })
    }

    /// Set when saved history existed but could not be read
    #[wasm_bindgen(getter, js_name = loadWarning)]
    pub fn load_warning(&self) -> Option<String> {
        self.load_warning.clone()
    }

    #[wasm_bindgen(getter, js_name = isLoaded)]
    pub fn is_loaded(&self) -> bool {
        self.session.is_loaded()
    }

    #[wasm_bindgen(getter, js_name = pageCount)]
    pub fn page_count(&self) -> u32 {
        self.session.page_count()
    }

    #[wasm_bindgen(getter, js_name = currentPage)]
    pub fn current_page(&self) -> u32 {
        self.preview.current_page()
    }

    #[wasm_bindgen(getter, js_name = zoomLabel)]
    pub fn zoom_label(&self) -> String {
        self.preview.zoom_label()
    }

    /// Entries as an array of `{id, text, keyName, x, y, size, page}`
    #[wasm_bindgen(js_name = getEntries)]
    pub fn get_entries(&self) -> Result<JsValue, JsValue> {
        to_js(&self.session.entries())
    }

    /// History list lines, in entry order
    #[wasm_bindgen(js_name = getHistoryLines)]
    pub fn get_history_lines(&self) -> Vec<String> {
        self.session.entries().iter().map(|e| e.describe()).collect()
    }

    fn sync_preview(&self) -> Result<(), StampError> {
        if let Some(bytes) = self.session.rendered_bytes() {
            self.preview.set_document(bytes.to_vec())?;
        }
        Ok(())
    }

    /// Capture `bytes` as the original document and render saved entries
    /// onto it. Call `renderPage` afterwards to show it.
    #[wasm_bindgen(js_name = loadDocument)]
    pub fn load_document(&mut self, bytes: Vec<u8>) -> Result<JsValue, JsValue> {
        let result = self.session.load_document(bytes);
        // A failed first rebuild still leaves the original on screen.
        let synced = self.sync_preview();
        settle(result.and(synced), "PDF loaded.")
    }

    /// Validate the form values, add the entry and re-render
    #[wasm_bindgen(js_name = addEntry)]
    pub fn add_entry(
        &mut self,
        text: String,
        key_name: String,
        x: String,
        y: String,
        size: String,
        page: String,
    ) -> Result<JsValue, JsValue> {
        let input = DraftInput {
            text,
            key_name,
            x,
            y,
            size,
            page,
        };
        let result = self.session.add_input(&input).and_then(|entry| {
            self.sync_preview()?;
            Ok(entry)
        });
        settle(result, "Text added successfully!")
    }

    #[wasm_bindgen(js_name = deleteEntry)]
    pub fn delete_entry(&mut self, id: &str) -> Result<JsValue, JsValue> {
        let result = self.session.delete_entry(id).and_then(|removed| {
            self.sync_preview()?;
            Ok(removed)
        });
        settle(result, "Entry deleted.")
    }

    /// Remove entry `id` and return its form values
    /// (`{text, keyName, x, y, size, page}`), or null if it does not exist.
    #[wasm_bindgen(js_name = beginEdit)]
    pub fn begin_edit(&mut self, id: &str) -> Result<JsValue, JsValue> {
        let draft = self
            .session
            .begin_edit(id)
            .and_then(|draft| {
                self.sync_preview()?;
                Ok(draft)
            })
            .map_err(|e| notice_value(&Notice::from_error(&e)))?;
        match draft {
            Some(draft) => to_js(&draft),
            None => Ok(JsValue::NULL),
        }
    }

    #[wasm_bindgen(js_name = clearEntries)]
    pub fn clear_entries(&mut self) -> Result<JsValue, JsValue> {
        let result = self.session.clear_entries().and_then(|()| self.sync_preview());
        settle(result, "Text history cleared.")
    }

    /// Replace the history with the JSON array in `text`
    #[wasm_bindgen(js_name = importHistory)]
    pub fn import_history(&mut self, text: &str) -> Result<JsValue, JsValue> {
        let result = self.session.import_json(text).and_then(|count| {
            self.sync_preview()?;
            Ok(count)
        });
        settle(result, "Text history imported successfully!")
    }

    /// Re-render from the original bytes
    #[wasm_bindgen]
    pub fn reload(&mut self) -> Result<JsValue, JsValue> {
        let result = self.session.reload().and_then(|()| self.sync_preview());
        settle(result, "PDF reloaded.")
    }

    /// `{filename, mime, bytes}` of the annotated document
    #[wasm_bindgen(js_name = exportPdf)]
    pub fn export_pdf(&self) -> Result<JsValue, JsValue> {
        let download = self
            .session
            .export_pdf()
            .map_err(|e| notice_value(&Notice::from_error(&e)))?;
        download_value(download)
    }

    /// `{filename, mime, bytes}` of the pretty-printed history
    #[wasm_bindgen(js_name = exportHistory)]
    pub fn export_history(&self) -> Result<JsValue, JsValue> {
        download_value(self.session.export_history())
    }

    /// Resolves to the applied view, or `{superseded: true}` when a newer
    /// render took over.
    #[wasm_bindgen(js_name = renderPage)]
    pub fn render_page(&self, page: u32) -> Promise {
        page_promise(Rc::clone(&self.preview), move |preview| {
            Box::pin(async move { preview.render_page(page).await.map(Some) })
        })
    }

    #[wasm_bindgen(js_name = nextPage)]
    pub fn next_page(&self) -> Promise {
        page_promise(Rc::clone(&self.preview), |preview| Box::pin(preview.next_page()))
    }

    #[wasm_bindgen(js_name = prevPage)]
    pub fn prev_page(&self) -> Promise {
        page_promise(Rc::clone(&self.preview), |preview| Box::pin(preview.prev_page()))
    }

    #[wasm_bindgen(js_name = goToPage)]
    pub fn go_to_page(&self, page: u32) -> Promise {
        page_promise(Rc::clone(&self.preview), move |preview| {
            Box::pin(preview.go_to_page(page))
        })
    }

    #[wasm_bindgen(js_name = zoomIn)]
    pub fn zoom_in(&self) -> Promise {
        page_promise(Rc::clone(&self.preview), |preview| Box::pin(preview.zoom_in()))
    }

    #[wasm_bindgen(js_name = zoomOut)]
    pub fn zoom_out(&self) -> Promise {
        page_promise(Rc::clone(&self.preview), |preview| Box::pin(preview.zoom_out()))
    }

    #[wasm_bindgen(js_name = setZoom)]
    pub fn set_zoom(&self, factor: f64) -> Promise {
        page_promise(Rc::clone(&self.preview), move |preview| {
            Box::pin(preview.set_zoom(factor))
        })
    }

    /// Overlay for the form values as typed. Hidden when the values do not
    /// form a valid entry yet.
    #[wasm_bindgen(js_name = previewDraft)]
    pub fn preview_draft(
        &self,
        text: String,
        x: String,
        y: String,
        size: String,
    ) -> Result<JsValue, JsValue> {
        let input = DraftInput {
            text,
            x,
            y,
            size,
            page: self.preview.current_page().to_string(),
            ..DraftInput::default()
        };
        let overlay = match input.parse() {
            Ok(draft) => self
                .preview
                .preview_draft(draft.x, draft.y, draft.size, &draft.text),
            Err(_) => Overlay::default(),
        };
        to_js(&OverlayView::from(overlay))
    }
}
