//! Font resources: built-in standard fonts and parsed TrueType programs

use crate::error::StampError;

/// The PDF base-14 fonts used for annotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StandardFont {
    #[default]
    Helvetica,
    TimesRoman,
    Courier,
}

impl StandardFont {
    /// Map a CSS-like family name onto a base font.
    pub fn from_family(family: &str) -> Self {
        let lower = family.to_lowercase();
        if lower.contains("times") || (lower.contains("serif") && !lower.contains("sans")) {
            StandardFont::TimesRoman
        } else if lower.contains("courier") || lower.contains("mono") {
            StandardFont::Courier
        } else {
            StandardFont::Helvetica
        }
    }

    pub fn base_font(&self) -> &'static str {
        match self {
            StandardFont::Helvetica => "Helvetica",
            StandardFont::TimesRoman => "Times-Roman",
            StandardFont::Courier => "Courier",
        }
    }
}

/// First and last character codes a TrueType program is embedded for.
pub const FIRST_CHAR: u8 = 32;
pub const LAST_CHAR: u8 = 126;

/// A TrueType font program with the metrics needed to embed it.
///
/// Parsed once when a preferred font is configured, then embedded into each
/// freshly loaded document.
#[derive(Debug, Clone, PartialEq)]
pub struct FontProgram {
    pub name: String,
    pub data: Vec<u8>,
    pub units_per_em: u16,
    pub ascent: i16,
    pub descent: i16,
    pub cap_height: i16,
    pub bbox: [i16; 4],
    /// Advance widths for `FIRST_CHAR..=LAST_CHAR`, in font units.
    pub advances: Vec<u16>,
}

impl FontProgram {
    pub fn parse(data: Vec<u8>) -> Result<Self, StampError> {
        Self::parse_named(data, "EmbeddedSans")
    }

    pub fn parse_named(data: Vec<u8>, name: &str) -> Result<Self, StampError> {
        if data.len() < 12 {
            return Err(StampError::RenderResource(
                "font data is too short".to_string(),
            ));
        }
        match &data[0..4] {
            [0x00, 0x01, 0x00, 0x00] | b"true" => {}
            b"OTTO" => {
                return Err(StampError::RenderResource(
                    "CFF-flavoured OpenType fonts cannot be embedded".to_string(),
                ))
            }
            b"wOFF" | b"wOF2" => {
                return Err(StampError::RenderResource(
                    "WOFF fonts must be decompressed first".to_string(),
                ))
            }
            _ => {
                return Err(StampError::RenderResource(
                    "not a TrueType font".to_string(),
                ))
            }
        }

        let face = ttf_parser::Face::parse(&data, 0)
            .map_err(|e| StampError::RenderResource(format!("invalid TrueType font: {}", e)))?;

        let units_per_em = face.units_per_em();
        let ascent = face.ascender();
        let descent = face.descender();
        let cap_height = face.capital_height().unwrap_or(ascent);
        let rect = face.global_bounding_box();
        let bbox = [rect.x_min, rect.y_min, rect.x_max, rect.y_max];

        let fallback = face
            .glyph_index(' ')
            .and_then(|g| face.glyph_hor_advance(g))
            .unwrap_or(units_per_em / 2);
        let advances = (FIRST_CHAR..=LAST_CHAR)
            .map(|code| {
                face.glyph_index(code as char)
                    .and_then(|g| face.glyph_hor_advance(g))
                    .unwrap_or(fallback)
            })
            .collect();

        Ok(Self {
            name: sanitize_font_name(name),
            units_per_em,
            ascent,
            descent,
            cap_height,
            bbox,
            advances,
            data,
        })
    }

    /// Scale a value in font units into PDF glyph space (1000 per em).
    pub fn to_glyph_space(&self, value: i32) -> i32 {
        if self.units_per_em == 0 {
            return value;
        }
        (value as i64 * 1000 / self.units_per_em as i64) as i32
    }

    pub fn pdf_widths(&self) -> Vec<i32> {
        self.advances
            .iter()
            .map(|a| self.to_glyph_space(*a as i32))
            .collect()
    }
}

/// PDF names must not contain whitespace or delimiters.
fn sanitize_font_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if cleaned.is_empty() {
        "EmbeddedSans".to_string()
    } else {
        cleaned
    }
}
