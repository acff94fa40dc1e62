//! Shared fixtures for stamp-core integration tests

#![allow(dead_code)]

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream};

/// A document with `num_pages` pages of `width` x `height`, each showing
/// "Page N" in its own font.
pub fn create_test_pdf(num_pages: u32, width: i64, height: i64) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Times-Roman",
    });

    let mut page_ids = Vec::new();
    for i in 0..num_pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec![Object::Name(b"F1".to_vec()), Object::Integer(12)]),
                Operation::new("Td", vec![Object::Integer(72), Object::Integer(72)]),
                Operation::new(
                    "Tj",
                    vec![Object::String(
                        format!("Page {}", i + 1).into_bytes(),
                        lopdf::StringFormat::Literal,
                    )],
                ),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
            "Contents" => Object::Reference(content_id),
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => Object::Reference(font_id) },
            },
        });
        page_ids.push(page_id);
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => page_ids.iter().map(|id| Object::Reference(*id)).collect::<Vec<_>>(),
            "Count" => num_pages as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

/// Something the stamping engine drew, recovered from a saved document.
#[derive(Debug, Clone, PartialEq)]
pub enum Drawn {
    Text {
        page: u32,
        text: String,
        x: f32,
        y: f32,
        size: f32,
    },
    Marker {
        page: u32,
        x: f32,
        y: f32,
        size: f32,
    },
}

impl Drawn {
    pub fn page(&self) -> u32 {
        match self {
            Drawn::Text { page, .. } | Drawn::Marker { page, .. } => *page,
        }
    }
}

fn number(obj: &Object) -> f32 {
    match obj {
        Object::Integer(i) => *i as f32,
        Object::Real(r) => *r,
        other => panic!("expected a number, got {:?}", other),
    }
}

fn name(obj: &Object) -> String {
    match obj {
        Object::Name(n) => String::from_utf8_lossy(n).to_string(),
        other => panic!("expected a name, got {:?}", other),
    }
}

/// Walk every page's content streams and collect the text runs and images
/// placed with stamp resources (`StampF*` fonts and `StampIm*` images).
pub fn drawn(bytes: &[u8]) -> Vec<Drawn> {
    let doc = Document::load_mem(bytes).unwrap();
    let mut found = Vec::new();

    for (page, page_id) in doc.get_pages() {
        let mut operations: Vec<Operation> = Vec::new();
        for content_id in doc.get_page_contents(page_id) {
            let stream = doc.get_object(content_id).unwrap().as_stream().unwrap();
            let data = stream
                .decompressed_content()
                .unwrap_or_else(|_| stream.content.clone());
            operations.extend(Content::decode(&data).unwrap().operations);
        }

        let mut font: Option<(String, f32)> = None;
        let mut origin = (0.0, 0.0);
        let mut matrix: Option<[f32; 6]> = None;
        for op in operations {
            match op.operator.as_str() {
                "Tf" => font = Some((name(&op.operands[0]), number(&op.operands[1]))),
                "Td" => origin = (number(&op.operands[0]), number(&op.operands[1])),
                "Tj" => {
                    if let Some((font_name, size)) = &font {
                        if font_name.starts_with("StampF") {
                            let text = match &op.operands[0] {
                                Object::String(s, _) => String::from_utf8_lossy(s).to_string(),
                                other => panic!("expected a string, got {:?}", other),
                            };
                            found.push(Drawn::Text {
                                page,
                                text,
                                x: origin.0,
                                y: origin.1,
                                size: *size,
                            });
                        }
                    }
                }
                "cm" => {
                    let values: Vec<f32> = op.operands.iter().map(number).collect();
                    matrix = Some([
                        values[0], values[1], values[2], values[3], values[4], values[5],
                    ]);
                }
                "Do" => {
                    if name(&op.operands[0]).starts_with("StampIm") {
                        let m = matrix.expect("image drawn without a placement matrix");
                        found.push(Drawn::Marker {
                            page,
                            x: m[4],
                            y: m[5],
                            size: m[0],
                        });
                    }
                }
                _ => {}
            }
        }
    }
    found
}

pub fn texts(bytes: &[u8]) -> Vec<String> {
    drawn(bytes)
        .into_iter()
        .filter_map(|d| match d {
            Drawn::Text { text, .. } => Some(text),
            Drawn::Marker { .. } => None,
        })
        .collect()
}

pub fn page_count(bytes: &[u8]) -> usize {
    Document::load_mem(bytes).unwrap().get_pages().len()
}
