//! `lopdf` implementation of the document backend
//!
//! Draw calls are buffered per page and written on `save` as one extra
//! content stream per page. The original content is wrapped in `q`/`Q` so
//! whatever graphics state it leaves behind cannot move the annotations.

use super::{
    DocumentBackend, FontSource, ImagePlacement, PageSize, PdfDocument, TextPlacement,
    DEFAULT_PAGE_SIZE,
};
use crate::error::BackendError;
use crate::font::{FontProgram, StandardFont, FIRST_CHAR, LAST_CHAR};
use crate::marker::MarkerImage;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use std::collections::BTreeMap;
use std::io::Write;
use tracing::debug;

/// Guards page-tree walks against malformed `Parent` cycles.
const MAX_TREE_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfBackend;

impl DocumentBackend for LopdfBackend {
    type Document = LopdfDocument;

    fn load(&self, bytes: &[u8]) -> Result<LopdfDocument, BackendError> {
        let doc = Document::load_mem(bytes).map_err(|e| BackendError::Parse(e.to_string()))?;
        if doc.is_encrypted() {
            return Err(BackendError::Parse(
                "encrypted documents are not supported".to_string(),
            ));
        }
        Ok(LopdfDocument::new(doc))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LopdfFont {
    name: String,
    id: ObjectId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LopdfImage {
    name: String,
    id: ObjectId,
}

#[derive(Debug, Default)]
struct PagePatch {
    operations: Vec<Operation>,
    fonts: BTreeMap<String, ObjectId>,
    images: BTreeMap<String, ObjectId>,
}

pub struct LopdfDocument {
    doc: Document,
    pages: Vec<ObjectId>,
    patches: BTreeMap<u32, PagePatch>,
    font_count: u32,
    image_count: u32,
}

impl LopdfDocument {
    fn new(doc: Document) -> Self {
        let pages = doc.get_pages().into_values().collect();
        Self {
            doc,
            pages,
            patches: BTreeMap::new(),
            font_count: 0,
            image_count: 0,
        }
    }

    pub fn inner(&self) -> &Document {
        &self.doc
    }

    fn page_id(&self, index: u32) -> Result<ObjectId, BackendError> {
        self.pages
            .get(index as usize)
            .copied()
            .ok_or(BackendError::MissingPage(index))
    }

    fn embed_standard(&mut self, font: StandardFont) -> ObjectId {
        self.doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => Object::Name(font.base_font().as_bytes().to_vec()),
            "Encoding" => "WinAnsiEncoding",
        })
    }

    fn embed_truetype(&mut self, program: &FontProgram) -> Result<ObjectId, BackendError> {
        let file = Stream::new(
            dictionary! {
                "Length1" => Object::Integer(program.data.len() as i64),
                "Filter" => "FlateDecode",
            },
            deflate(&program.data)?,
        );
        let file_id = self.doc.add_object(file);

        let bbox = program
            .bbox
            .iter()
            .map(|v| Object::Integer(program.to_glyph_space(*v as i32) as i64))
            .collect::<Vec<_>>();
        let base_font = Object::Name(program.name.as_bytes().to_vec());

        let descriptor_id = self.doc.add_object(dictionary! {
            "Type" => "FontDescriptor",
            "FontName" => base_font.clone(),
            "Flags" => Object::Integer(32),
            "FontBBox" => Object::Array(bbox),
            "ItalicAngle" => Object::Integer(0),
            "Ascent" => Object::Integer(program.to_glyph_space(program.ascent as i32) as i64),
            "Descent" => Object::Integer(program.to_glyph_space(program.descent as i32) as i64),
            "CapHeight" => Object::Integer(program.to_glyph_space(program.cap_height as i32) as i64),
            "StemV" => Object::Integer(80),
            "FontFile2" => Object::Reference(file_id),
        });

        let widths = program
            .pdf_widths()
            .into_iter()
            .map(|w| Object::Integer(w as i64))
            .collect::<Vec<_>>();

        Ok(self.doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "TrueType",
            "BaseFont" => base_font,
            "FirstChar" => Object::Integer(FIRST_CHAR as i64),
            "LastChar" => Object::Integer(LAST_CHAR as i64),
            "Widths" => Object::Array(widths),
            "FontDescriptor" => Object::Reference(descriptor_id),
            "Encoding" => "WinAnsiEncoding",
        }))
    }

    fn media_box(&self, page_id: ObjectId) -> Option<[f32; 4]> {
        let value = inherited_attribute(&self.doc, page_id, b"MediaBox")?;
        let array = match value {
            Object::Array(items) => items,
            Object::Reference(id) => self.doc.get_object(*id).ok()?.as_array().ok()?,
            _ => return None,
        };
        if array.len() != 4 {
            return None;
        }
        let mut rect = [0.0f32; 4];
        for (slot, item) in rect.iter_mut().zip(array) {
            *slot = number(item)?;
        }
        Some(rect)
    }

    fn patch_mut(&mut self, index: u32) -> Result<&mut PagePatch, BackendError> {
        self.page_id(index)?;
        Ok(self.patches.entry(index).or_default())
    }

    fn apply_patches(&mut self) -> Result<(), BackendError> {
        let patches = std::mem::take(&mut self.patches);
        for (index, patch) in patches {
            if patch.operations.is_empty() {
                continue;
            }
            let page_id = self.page_id(index)?;
            merge_resources(&mut self.doc, page_id, b"Font", &patch.fonts)?;
            merge_resources(&mut self.doc, page_id, b"XObject", &patch.images)?;
            append_content(&mut self.doc, page_id, patch.operations)?;
            debug!(page = index + 1, "Wrote annotation content stream");
        }
        Ok(())
    }
}

impl PdfDocument for LopdfDocument {
    type Font = LopdfFont;
    type Image = LopdfImage;

    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page_size(&self, index: u32) -> Option<PageSize> {
        let page_id = self.page_id(index).ok()?;
        let size = match self.media_box(page_id) {
            Some([x0, y0, x1, y1]) => PageSize {
                width: (x1 - x0).abs(),
                height: (y1 - y0).abs(),
            },
            None => DEFAULT_PAGE_SIZE,
        };
        Some(size)
    }

    fn embed_font(&mut self, source: FontSource<'_>) -> Result<LopdfFont, BackendError> {
        let id = match source {
            FontSource::Standard(font) => self.embed_standard(font),
            FontSource::TrueType(program) => self.embed_truetype(program)?,
        };
        self.font_count += 1;
        Ok(LopdfFont {
            name: format!("StampF{}", self.font_count),
            id,
        })
    }

    fn embed_image(&mut self, image: &MarkerImage) -> Result<LopdfImage, BackendError> {
        let pixels = (image.width * image.height) as usize;
        if image.width == 0 || image.height == 0 || image.rgb.len() != pixels * 3 {
            return Err(BackendError::Resource(format!(
                "image data does not match {}x{}",
                image.width, image.height
            )));
        }

        let mut dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => Object::Integer(image.width as i64),
            "Height" => Object::Integer(image.height as i64),
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => Object::Integer(8),
            "Filter" => "FlateDecode",
        };

        if let Some(alpha) = &image.alpha {
            if alpha.len() != pixels {
                return Err(BackendError::Resource(
                    "alpha plane does not match image size".to_string(),
                ));
            }
            let mask = Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => Object::Integer(image.width as i64),
                    "Height" => Object::Integer(image.height as i64),
                    "ColorSpace" => "DeviceGray",
                    "BitsPerComponent" => Object::Integer(8),
                    "Filter" => "FlateDecode",
                },
                deflate(alpha)?,
            );
            let mask_id = self.doc.add_object(mask);
            dict.set("SMask", Object::Reference(mask_id));
        }

        let id = self.doc.add_object(Stream::new(dict, deflate(&image.rgb)?));
        self.image_count += 1;
        Ok(LopdfImage {
            name: format!("StampIm{}", self.image_count),
            id,
        })
    }

    fn draw_text(
        &mut self,
        index: u32,
        text: &str,
        placement: TextPlacement,
        font: &LopdfFont,
    ) -> Result<(), BackendError> {
        let patch = self.patch_mut(index)?;
        patch.fonts.insert(font.name.clone(), font.id);
        patch.operations.extend([
            Operation::new("BT", vec![]),
            Operation::new(
                "Tf",
                vec![
                    Object::Name(font.name.as_bytes().to_vec()),
                    Object::Real(placement.size),
                ],
            ),
            Operation::new("Td", vec![Object::Real(placement.x), Object::Real(placement.y)]),
            Operation::new(
                "Tj",
                vec![Object::String(
                    text.as_bytes().to_vec(),
                    lopdf::StringFormat::Literal,
                )],
            ),
            Operation::new("ET", vec![]),
        ]);
        Ok(())
    }

    fn draw_image(
        &mut self,
        index: u32,
        image: &LopdfImage,
        placement: ImagePlacement,
    ) -> Result<(), BackendError> {
        let patch = self.patch_mut(index)?;
        patch.images.insert(image.name.clone(), image.id);
        patch.operations.extend([
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    Object::Real(placement.width),
                    Object::Real(0.0),
                    Object::Real(0.0),
                    Object::Real(placement.height),
                    Object::Real(placement.x),
                    Object::Real(placement.y),
                ],
            ),
            Operation::new("Do", vec![Object::Name(image.name.as_bytes().to_vec())]),
            Operation::new("Q", vec![]),
        ]);
        Ok(())
    }

    fn save(&mut self) -> Result<Vec<u8>, BackendError> {
        self.apply_patches()?;
        let mut buffer = Vec::new();
        self.doc
            .save_to(&mut buffer)
            .map_err(|e| BackendError::Operation(format!("Save failed: {}", e)))?;
        Ok(buffer)
    }

    fn extract_page(&self, index: u32) -> Result<Vec<u8>, BackendError> {
        self.page_id(index)?;
        let page_number = index + 1;
        let mut single = self.doc.clone();

        let mut pages_to_delete: Vec<u32> = (1..=self.page_count())
            .filter(|p| *p != page_number)
            .collect();
        // Delete in reverse to keep the remaining page numbers stable.
        pages_to_delete.reverse();
        for page in pages_to_delete {
            single.delete_pages(&[page]);
        }
        single.prune_objects();

        let mut buffer = Vec::new();
        single
            .save_to(&mut buffer)
            .map_err(|e| BackendError::Operation(format!("Save failed: {}", e)))?;
        Ok(buffer)
    }
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Look `key` up on the page, then up its `Parent` chain.
fn inherited_attribute<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Option<&'a Object> {
    let mut current = dict(doc, page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = current.get(key) {
            return Some(value);
        }
        let parent = current.get(b"Parent").and_then(Object::as_reference).ok()?;
        current = dict(doc, parent).ok()?;
    }
    None
}

/// Make sure the page has its own `Resources` entry and report where the
/// dictionary lives: `Some(id)` when indirect, `None` when inline.
fn ensure_resources(
    doc: &mut Document,
    page_id: ObjectId,
) -> Result<Option<ObjectId>, BackendError> {
    match dict(doc, page_id)?.get(b"Resources") {
        Ok(Object::Reference(id)) => return Ok(Some(*id)),
        Ok(Object::Dictionary(_)) => return Ok(None),
        _ => {}
    }

    // Inherited resources are copied onto the page so sibling pages keep
    // their own view of the shared dictionary.
    let shared: &Document = doc;
    let inherited = inherited_attribute(shared, page_id, b"Resources")
        .and_then(|obj| match obj {
            Object::Dictionary(inline) => Some(inline.clone()),
            Object::Reference(id) => dict(shared, *id).ok().cloned(),
            _ => None,
        })
        .unwrap_or_else(Dictionary::new);

    dict_mut(doc, page_id)?.set("Resources", Object::Dictionary(inherited));
    Ok(None)
}

fn resources_mut(
    doc: &mut Document,
    page_id: ObjectId,
    indirect: Option<ObjectId>,
) -> Result<&mut Dictionary, BackendError> {
    match indirect {
        Some(id) => dict_mut(doc, id),
        None => dict_mut(doc, page_id)?
            .get_mut(b"Resources")
            .and_then(Object::as_dict_mut)
            .map_err(op_err),
    }
}

fn merge_resources(
    doc: &mut Document,
    page_id: ObjectId,
    category: &[u8],
    entries: &BTreeMap<String, ObjectId>,
) -> Result<(), BackendError> {
    if entries.is_empty() {
        return Ok(());
    }
    let indirect = ensure_resources(doc, page_id)?;

    let existing = resources_mut(doc, page_id, indirect)?
        .get(category)
        .ok()
        .cloned();
    let mut merged = match existing {
        Some(Object::Dictionary(inline)) => inline,
        Some(Object::Reference(id)) => dict(doc, id)
            .ok()
            .cloned()
            .unwrap_or_else(Dictionary::new),
        _ => Dictionary::new(),
    };
    for (name, id) in entries {
        merged.set(name.as_bytes().to_vec(), Object::Reference(*id));
    }

    resources_mut(doc, page_id, indirect)?.set(category.to_vec(), Object::Dictionary(merged));
    Ok(())
}

/// Wrap the existing page content in `q`/`Q` and append `operations` after it.
fn append_content(
    doc: &mut Document,
    page_id: ObjectId,
    operations: Vec<Operation>,
) -> Result<(), BackendError> {
    let existing: Vec<Object> = match dict(doc, page_id)?.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        Ok(Object::Array(items)) => items.clone(),
        _ => Vec::new(),
    };

    let encoded = Content { operations }
        .encode()
        .map_err(|e| BackendError::Operation(format!("Failed to encode content: {}", e)))?;
    let mut body = b"Q\n".to_vec();
    body.extend(encoded);

    let save_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let patch_id = doc.add_object(Stream::new(Dictionary::new(), body));

    let mut contents = Vec::with_capacity(existing.len() + 2);
    contents.push(Object::Reference(save_id));
    contents.extend(existing);
    contents.push(Object::Reference(patch_id));

    dict_mut(doc, page_id)?.set("Contents", Object::Array(contents));
    Ok(())
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, BackendError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| BackendError::Resource(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| BackendError::Resource(e.to_string()))
}

fn dict(doc: &Document, id: ObjectId) -> Result<&Dictionary, BackendError> {
    doc.get_object(id)
        .and_then(Object::as_dict)
        .map_err(op_err)
}

fn dict_mut(doc: &mut Document, id: ObjectId) -> Result<&mut Dictionary, BackendError> {
    doc.get_object_mut(id)
        .and_then(Object::as_dict_mut)
        .map_err(op_err)
}

fn op_err(e: lopdf::Error) -> BackendError {
    BackendError::Operation(e.to_string())
}
