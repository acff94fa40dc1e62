//! Document backend abstraction
//!
//! The reconciliation engine only talks to these traits, so it can be
//! exercised against a recording fake in tests and against `lopdf` for real
//! documents.

mod pdf;

pub use self::pdf::{LopdfBackend, LopdfDocument, LopdfFont, LopdfImage};

use crate::error::BackendError;
use crate::font::{FontProgram, StandardFont};
use crate::marker::MarkerImage;

/// Page dimensions in PDF user-space units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

/// Default page size when a page declares no usable MediaBox (US Letter).
pub const DEFAULT_PAGE_SIZE: PageSize = PageSize {
    width: 612.0,
    height: 792.0,
};

#[derive(Debug, Clone, Copy)]
pub enum FontSource<'a> {
    Standard(StandardFont),
    TrueType(&'a FontProgram),
}

/// Baseline origin of a text run, in bottom-up page coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextPlacement {
    pub x: f32,
    pub y: f32,
    pub size: f32,
}

/// Lower-left corner and extent of a drawn image, bottom-up page coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImagePlacement {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

pub trait DocumentBackend {
    type Document: PdfDocument;

    /// Parse `bytes` into a fresh, independent document instance.
    fn load(&self, bytes: &[u8]) -> Result<Self::Document, BackendError>;
}

/// A loaded document. Page indices are 0-based.
pub trait PdfDocument {
    type Font: Clone;
    type Image: Clone;

    fn page_count(&self) -> u32;

    fn page_size(&self, index: u32) -> Option<PageSize>;

    fn embed_font(&mut self, source: FontSource<'_>) -> Result<Self::Font, BackendError>;

    fn embed_image(&mut self, image: &MarkerImage) -> Result<Self::Image, BackendError>;

    fn draw_text(
        &mut self,
        index: u32,
        text: &str,
        placement: TextPlacement,
        font: &Self::Font,
    ) -> Result<(), BackendError>;

    fn draw_image(
        &mut self,
        index: u32,
        image: &Self::Image,
        placement: ImagePlacement,
    ) -> Result<(), BackendError>;

    fn save(&mut self) -> Result<Vec<u8>, BackendError>;

    /// Serialize a standalone one-page document holding page `index`.
    fn extract_page(&self, index: u32) -> Result<Vec<u8>, BackendError>;
}
