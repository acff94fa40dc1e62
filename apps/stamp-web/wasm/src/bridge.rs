//! pdf.js rasterizer behind the preview coordinator

use async_trait::async_trait;
use js_sys::{Reflect, Uint8Array};
use stamp_core::{RasterizedPage, Rasterizer, StampError};
use wasm_bindgen::prelude::*;
use web_sys::HtmlCanvasElement;

// External JavaScript functions from pdf-bridge.js
#[wasm_bindgen(module = "/www/js/pdf-bridge.js")]
extern "C" {
    #[wasm_bindgen(js_name = initPdfJs)]
    async fn init_pdf_js_internal(worker_src: &str) -> JsValue;

    /// Resolves to `{ width, height }` once the page is on the canvas, or
    /// `{ width, height, superseded: true }` with the canvas untouched when a
    /// newer call started first.
    #[wasm_bindgen(js_name = renderPdfPage, catch)]
    async fn render_pdf_page_internal(
        data: Uint8Array,
        page_num: u32,
        canvas: &HtmlCanvasElement,
        scale: f64,
    ) -> Result<JsValue, JsValue>;
}

const DEFAULT_WORKER_SRC: &str =
    "https://cdn.jsdelivr.net/npm/pdfjs-dist@3.11.174/build/pdf.worker.min.js";

/// Draws pages onto one canvas owned by the page.
pub struct PdfJsRasterizer {
    canvas: HtmlCanvasElement,
}

impl PdfJsRasterizer {
    pub fn new(canvas: HtmlCanvasElement) -> Self {
        Self { canvas }
    }
}

#[async_trait(?Send)]
impl Rasterizer for PdfJsRasterizer {
    async fn render_page(
        &self,
        pdf: &[u8],
        page_number: u32,
        scale: f64,
    ) -> Result<RasterizedPage, StampError> {
        let data = Uint8Array::new_with_length(pdf.len() as u32);
        data.copy_from(pdf);

        let result = render_pdf_page_internal(data, page_number, &self.canvas, scale)
            .await
            .map_err(|e| StampError::Raster(describe(&e)))?;

        Ok(RasterizedPage {
            width: dimension(&result, "width")?,
            height: dimension(&result, "height")?,
        })
    }
}

fn dimension(result: &JsValue, field: &str) -> Result<u32, StampError> {
    Reflect::get(result, &JsValue::from_str(field))
        .ok()
        .and_then(|value| value.as_f64())
        .map(|value| value.round() as u32)
        .ok_or_else(|| StampError::Raster(format!("renderer reported no {}", field)))
}

fn describe(err: &JsValue) -> String {
    err.as_string().unwrap_or_else(|| format!("{:?}", err))
}

/// Initialize PDF.js with the default worker
#[wasm_bindgen]
pub async fn init_pdf_js() -> Result<(), JsValue> {
    init_pdf_js_internal(DEFAULT_WORKER_SRC).await;
    Ok(())
}

/// Initialize PDF.js with a custom worker URL
#[wasm_bindgen]
pub async fn init_pdf_js_with_worker(worker_src: &str) -> Result<(), JsValue> {
    init_pdf_js_internal(worker_src).await;
    Ok(())
}
