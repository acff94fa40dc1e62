//! Headless stand-in for a canvas: reports the pixel size a page would
//! occupy at a given zoom without drawing anything.

use async_trait::async_trait;
use stamp_core::{DocumentBackend, LopdfBackend, PdfDocument, RasterizedPage, Rasterizer, StampError};

#[derive(Debug, Clone, Copy, Default)]
pub struct MeasuringRasterizer;

#[async_trait(?Send)]
impl Rasterizer for MeasuringRasterizer {
    async fn render_page(
        &self,
        pdf: &[u8],
        page_number: u32,
        scale: f64,
    ) -> Result<RasterizedPage, StampError> {
        let doc = LopdfBackend.load(pdf)?;
        let size = page_number
            .checked_sub(1)
            .and_then(|index| doc.page_size(index))
            .ok_or_else(|| StampError::Raster(format!("no page {} to measure", page_number)))?;

        Ok(RasterizedPage {
            width: (size.width as f64 * scale).round() as u32,
            height: (size.height as f64 * scale).round() as u32,
        })
    }
}
