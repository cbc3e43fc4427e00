use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use std::path::Path;
use tracing::debug;

use crate::FixtureError;

const MM: f32 = 72.0 / 25.4;
/// A4 in points.
const PAGE_WIDTH: f32 = 210.0 * MM;
const PAGE_HEIGHT: f32 = 297.0 * MM;
const LEFT_MARGIN: f32 = 10.0 * MM;
const TOP_MARGIN: f32 = 10.0 * MM;
const BOTTOM_MARGIN: f32 = 20.0 * MM;
const ROW_HEIGHT: f32 = 10.0 * MM;
const FONT_SIZE: i64 = 12;

/// Rows that fit between the top margin and the page-break margin.
pub fn rows_per_page() -> usize {
    ((PAGE_HEIGHT - TOP_MARGIN - BOTTOM_MARGIN) / ROW_HEIGHT).floor() as usize
}

/// Write each line of a text file as one Helvetica row, breaking onto new
/// A4 pages as needed.
pub fn text_to_pdf(input: &Path, output: &Path) -> Result<(), FixtureError> {
    let text = std::fs::read_to_string(input)?;
    let mut doc = build_document(&text)?;
    doc.save(output)?;
    debug!("wrote {} -> {}", input.display(), output.display());
    Ok(())
}

pub fn build_document(text: &str) -> Result<Document, FixtureError> {
    let lines: Vec<String> = text.lines().map(|l| latin_only(l.trim())).collect();

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    // An empty file still yields one blank page.
    let mut kids: Vec<Object> = Vec::new();
    let chunks: Vec<&[String]> = if lines.is_empty() {
        vec![&lines[..]]
    } else {
        lines.chunks(rows_per_page()).collect()
    };
    for chunk in chunks {
        let page_id = add_page(&mut doc, pages_id, chunk)?;
        kids.push(page_id.into());
    }

    let page_count = kids.len() as i64;
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => page_count,
        "Resources" => resources_id,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(PAGE_WIDTH.round() as i64),
            Object::Integer(PAGE_HEIGHT.round() as i64),
        ],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();
    Ok(doc)
}

fn add_page(doc: &mut Document, parent: ObjectId, rows: &[String]) -> Result<ObjectId, FixtureError> {
    let mut operations = Vec::with_capacity(rows.len() * 5);
    for (i, row) in rows.iter().enumerate() {
        if row.is_empty() {
            continue;
        }
        // Baseline sits near the bottom of the row cell.
        let baseline = PAGE_HEIGHT - TOP_MARGIN - ROW_HEIGHT * i as f32 - ROW_HEIGHT * 0.35;
        operations.extend([
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), FONT_SIZE.into()]),
            Operation::new("Td", vec![(LEFT_MARGIN.round() as i64).into(), (baseline.round() as i64).into()]),
            Operation::new("Tj", vec![Object::string_literal(latin1_bytes(row))]),
            Operation::new("ET", vec![]),
        ]);
    }
    let content = Content { operations }.encode()?;
    let content_id = doc.add_object(Stream::new(dictionary! {}, content));
    Ok(doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => parent,
        "Contents" => content_id,
    }))
}

/// The standard fonts only cover Latin-1; anything else becomes `?`.
fn latin_only(line: &str) -> String {
    line.chars()
        .map(|c| match c {
            '\t' => ' ',
            c if (c as u32) < 0x100 && !c.is_control() => c,
            _ => '?',
        })
        .collect()
}

fn latin1_bytes(line: &str) -> Vec<u8> {
    line.chars().map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?')).collect()
}
