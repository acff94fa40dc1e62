//! Marker images drawn for the `"true"` directive

use crate::error::StampError;
use std::io::Cursor;

/// A decoded raster image ready for embedding: 8-bit RGB samples plus an
/// optional 8-bit alpha plane.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerImage {
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
    pub alpha: Option<Vec<u8>>,
}

impl MarkerImage {
    pub fn from_png(bytes: &[u8]) -> Result<Self, StampError> {
        decode_png(bytes)
    }

    /// The built-in check mark, used when no marker PNG is configured.
    pub fn check_mark() -> Self {
        const SIZE: u32 = 32;
        const STROKE: f32 = 3.2;
        const COLOR: [u8; 3] = [0x1b, 0x8a, 0x3c];
        let segments = [((5.0, 17.0), (13.0, 25.0)), ((13.0, 25.0), (27.0, 7.0))];

        let mut rgb = Vec::with_capacity((SIZE * SIZE * 3) as usize);
        let mut alpha = Vec::with_capacity((SIZE * SIZE) as usize);
        for row in 0..SIZE {
            for col in 0..SIZE {
                let p = (col as f32 + 0.5, row as f32 + 0.5);
                let d = segments
                    .iter()
                    .map(|(a, b)| distance_to_segment(p, *a, *b))
                    .fold(f32::MAX, f32::min);
                // One pixel of anti-aliasing at the stroke edge.
                let coverage = (STROKE - d + 0.5).clamp(0.0, 1.0);
                rgb.extend_from_slice(&COLOR);
                alpha.push((coverage * 255.0).round() as u8);
            }
        }

        Self {
            width: SIZE,
            height: SIZE,
            rgb,
            alpha: Some(alpha),
        }
    }
}

fn distance_to_segment(p: (f32, f32), a: (f32, f32), b: (f32, f32)) -> f32 {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len2 = dx * dx + dy * dy;
    let t = if len2 == 0.0 {
        0.0
    } else {
        (((p.0 - a.0) * dx + (p.1 - a.1) * dy) / len2).clamp(0.0, 1.0)
    };
    let (cx, cy) = (a.0 + t * dx, a.1 + t * dy);
    ((p.0 - cx).powi(2) + (p.1 - cy).powi(2)).sqrt()
}

/// Decode any PNG into 8-bit RGB with an optional alpha plane.
pub fn decode_png(bytes: &[u8]) -> Result<MarkerImage, StampError> {
    let mut decoder = png::Decoder::new(Cursor::new(bytes));
    decoder.set_transformations(png::Transformations::normalize_to_color8());
    let mut reader = decoder
        .read_info()
        .map_err(|e| StampError::RenderResource(format!("invalid marker PNG: {}", e)))?;

    let mut buf = vec![0u8; reader.output_buffer_size()];
    let info = reader
        .next_frame(&mut buf)
        .map_err(|e| StampError::RenderResource(format!("invalid marker PNG: {}", e)))?;
    let data = &buf[..info.buffer_size()];
    let pixels = (info.width * info.height) as usize;

    let (rgb, alpha) = match info.color_type {
        png::ColorType::Rgb => (data.to_vec(), None),
        png::ColorType::Rgba => {
            let mut rgb = Vec::with_capacity(pixels * 3);
            let mut alpha = Vec::with_capacity(pixels);
            for px in data.chunks_exact(4) {
                rgb.extend_from_slice(&px[..3]);
                alpha.push(px[3]);
            }
            (rgb, Some(alpha))
        }
        png::ColorType::Grayscale => (data.iter().flat_map(|g| [*g, *g, *g]).collect(), None),
        png::ColorType::GrayscaleAlpha => {
            let mut rgb = Vec::with_capacity(pixels * 3);
            let mut alpha = Vec::with_capacity(pixels);
            for px in data.chunks_exact(2) {
                rgb.extend_from_slice(&[px[0], px[0], px[0]]);
                alpha.push(px[1]);
            }
            (rgb, Some(alpha))
        }
        png::ColorType::Indexed => {
            return Err(StampError::RenderResource(
                "indexed PNG was not expanded".to_string(),
            ))
        }
    };

    if rgb.len() != pixels * 3 {
        return Err(StampError::RenderResource(format!(
            "marker PNG has {} samples for a {}x{} image",
            rgb.len(),
            info.width,
            info.height
        )));
    }

    // Fully opaque alpha carries no information.
    let alpha = alpha.filter(|a| a.iter().any(|v| *v != 255));

    Ok(MarkerImage {
        width: info.width,
        height: info.height,
        rgb,
        alpha,
    })
}
