//! WASM bindings for the PDF stamping editor
//!
//! State lives in Rust via `StampSession`; JavaScript only handles DOM
//! events, file I/O and downloads.
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { StampSession, init_pdf_js } from './pkg/stamp_wasm.js';
//!
//! await init();
//! await init_pdf_js();
//!
//! const session = new StampSession(canvas);
//! session.loadDocument(bytes);
//! await session.renderPage(1);
//! session.addEntry("Approved", "", "50", "100", "12", "1");
//! await session.renderPage(session.currentPage);
//! const { filename, bytes: pdf } = session.exportPdf();
//! ```

pub mod bridge;
pub mod session;
pub mod storage;
pub mod view;

use wasm_bindgen::prelude::*;

pub use session::StampSession;

#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// Get the library version
#[wasm_bindgen]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Get page count from PDF bytes
#[wasm_bindgen]
pub fn get_page_count(bytes: &[u8]) -> Result<u32, JsValue> {
    stamp_core::get_page_count(bytes).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Strip characters the standard PDF fonts cannot show
#[wasm_bindgen]
pub fn sanitize_text(text: &str) -> String {
    stamp_core::sanitize_text(text).into_owned()
}
