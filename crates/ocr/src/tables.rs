use image::DynamicImage;
use loandoc_core::ProcessingSettings;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

use crate::preprocess::{self, PreprocessError};
use crate::recognizer::{OcrBackend, OcrError};

/// Words at or below this Tesseract confidence are discarded.
const MIN_CONFIDENCE: f32 = 50.0;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("Image preprocessing failed: {0}")]
    Preprocess(#[from] PreprocessError),
    #[error("OCR recognition failed: {0}")]
    Ocr(#[from] OcrError),
    #[error("Malformed OCR word data: {0}")]
    MalformedTsv(String),
}

/// Pixel rectangle of the page holding the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableArea {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl FromStr for TableArea {
    type Err = String;

    /// `x,y,width,height`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<u32> = s
            .split(',')
            .map(|p| p.trim().parse::<u32>())
            .collect::<Result<_, _>>()
            .map_err(|e| format!("Invalid table area '{s}': {e}"))?;
        match parts.as_slice() {
            [x, y, width, height] if *width > 0 && *height > 0 => Ok(TableArea {
                x: *x,
                y: *y,
                width: *width,
                height: *height,
            }),
            _ => Err(format!("Table area must be x,y,width,height with non-zero size, got '{s}'")),
        }
    }
}

/// Rows of recognized words; every row has the same number of cells.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableData {
    pub rows: Vec<Vec<String>>,
}

impl TableData {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_count(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }
}

/// Crop, enhance and OCR a table region, grouping words by text block.
pub fn extract_table<R: OcrBackend + ?Sized>(
    backend: &R,
    image: &DynamicImage,
    area: Option<TableArea>,
    settings: &ProcessingSettings,
) -> Result<TableData, TableError> {
    let region = match area {
        Some(area) => crop(image, area),
        None => image.clone(),
    };
    let processed = preprocess::prepare_for_ocr_from_image(&region, settings)?;
    let png = preprocess::encode_png(&processed)?;
    let tsv = backend.recognize_tsv(&png)?;
    parse_tsv(&tsv)
}

/// Cut `area` out of `image`, clamped to the image bounds.
pub fn crop(image: &DynamicImage, area: TableArea) -> DynamicImage {
    let x = area.x.min(image.width());
    let y = area.y.min(image.height());
    let width = area.width.min(image.width() - x);
    let height = area.height.min(image.height() - y);
    image.crop_imm(x, y, width, height)
}

/// Parse Tesseract TSV output into table rows.
pub fn parse_tsv(tsv: &str) -> Result<TableData, TableError> {
    let mut lines = tsv.lines();
    let header: Vec<&str> = match lines.next() {
        Some(h) => h.split('\t').collect(),
        None => return Ok(TableData::default()),
    };
    let column = |name: &str| {
        header
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| TableError::MalformedTsv(format!("missing '{name}' column")))
    };
    let block_col = column("block_num")?;
    let conf_col = column("conf")?;
    let text_col = column("text")?;

    // Blocks keep the order in which they first appear.
    let mut blocks: Vec<(String, Vec<String>)> = Vec::new();
    for line in lines.filter(|l| !l.trim().is_empty()) {
        let cells: Vec<&str> = line.split('\t').collect();
        let text = cells.get(text_col).map_or("", |t| t.trim());
        if text.is_empty() {
            continue;
        }
        let conf: f32 = cells
            .get(conf_col)
            .and_then(|c| c.trim().parse().ok())
            .ok_or_else(|| TableError::MalformedTsv(format!("bad confidence in '{line}'")))?;
        if conf <= MIN_CONFIDENCE {
            continue;
        }
        let block = cells.get(block_col).map_or("", |b| b.trim()).to_string();
        match blocks.iter_mut().find(|(b, _)| *b == block) {
            Some((_, words)) => words.push(text.to_string()),
            None => blocks.push((block, vec![text.to_string()])),
        }
    }

    let mut rows: Vec<Vec<String>> = blocks.into_iter().map(|(_, words)| words).collect();
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    for row in &mut rows {
        row.resize(width, String::new());
    }
    Ok(TableData { rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognizer::MockRecognizer;

    const HEADER: &str = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext";

    fn word(block: u32, conf: &str, text: &str) -> String {
        format!("5\t1\t{block}\t1\t1\t1\t0\t0\t10\t10\t{conf}\t{text}")
    }

    fn tsv(rows: &[String]) -> String {
        let mut out = vec![HEADER.to_string()];
        out.extend_from_slice(rows);
        out.join("\n")
    }

    #[test]
    fn groups_words_by_block_and_pads_rows() {
        let data = parse_tsv(&tsv(&[
            word(1, "96", "Payment"),
            word(1, "95.5", "Amount"),
            word(1, "91", "Due"),
            word(2, "90", "1"),
            word(2, "88", "$1,200"),
        ]))
        .unwrap();
        assert_eq!(
            data.rows,
            vec![
                vec!["Payment".to_string(), "Amount".into(), "Due".into()],
                vec!["1".to_string(), "$1,200".into(), String::new()],
            ]
        );
        assert_eq!(data.column_count(), 3);
    }

    #[test]
    fn drops_low_confidence_and_blank_words() {
        let data = parse_tsv(&tsv(&[
            "1\t1\t0\t0\t0\t0\t0\t0\t100\t100\t-1\t".to_string(),
            word(1, "50", "smudge"),
            word(1, "97", "  "),
            word(1, "97", "Term"),
        ]))
        .unwrap();
        assert_eq!(data.rows, vec![vec!["Term".to_string()]]);
    }

    #[test]
    fn block_order_follows_first_appearance() {
        let data = parse_tsv(&tsv(&[word(3, "90", "c"), word(1, "90", "a"), word(3, "90", "d")])).unwrap();
        assert_eq!(data.rows[0], vec!["c".to_string(), "d".into()]);
        assert_eq!(data.rows[1], vec!["a".to_string(), String::new()]);
    }

    #[test]
    fn empty_or_missing_columns() {
        assert!(parse_tsv("").unwrap().is_empty());
        assert!(matches!(parse_tsv("level\ttext\nfoo\tbar"), Err(TableError::MalformedTsv(_))));
    }

    #[test]
    fn table_area_parses() {
        assert_eq!(
            "10, 20,300,40".parse::<TableArea>().unwrap(),
            TableArea { x: 10, y: 20, width: 300, height: 40 }
        );
        assert!("1,2,3".parse::<TableArea>().is_err());
        assert!("1,2,0,4".parse::<TableArea>().is_err());
    }

    #[test]
    fn crop_is_clamped_to_image() {
        let img = DynamicImage::new_luma8(100, 50);
        let out = crop(&img, TableArea { x: 80, y: 40, width: 100, height: 100 });
        assert_eq!((out.width(), out.height()), (20, 10));
    }

    #[test]
    fn extract_table_uses_word_data() {
        let backend = MockRecognizer::new("").with_tsv(tsv(&[word(1, "93", "Rate"), word(1, "92", "4.5%")]));
        let img = DynamicImage::new_luma8(200, 100);
        let area = Some(TableArea { x: 0, y: 0, width: 100, height: 50 });
        let data = extract_table(&backend, &img, area, &ProcessingSettings::default()).unwrap();
        assert_eq!(data.rows, vec![vec!["Rate".to_string(), "4.5%".into()]]);
    }

    #[test]
    fn extract_table_without_word_support_fails() {
        let backend = MockRecognizer::new("text only");
        let img = DynamicImage::new_luma8(20, 20);
        let err = extract_table(&backend, &img, None, &ProcessingSettings::default()).unwrap_err();
        assert!(matches!(err, TableError::Ocr(OcrError::Unsupported)));
    }
}
