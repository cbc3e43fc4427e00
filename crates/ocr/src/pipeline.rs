use image::DynamicImage;
use loandoc_core::{DocumentError, DocumentKind, LoanDetails, ProcessingSettings};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::extract::Extractor;
use crate::preprocess::{self, PreprocessError};
use crate::rasterize::{self, PdfRasterizer, RasterizeError};
use crate::recognizer::{OcrBackend, OcrError};
use crate::tables::{self, TableArea, TableData, TableError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Error reading text file: {0}")]
    TextDecode(String),
    #[error("Image preprocessing failed: {0}")]
    Preprocess(#[from] PreprocessError),
    #[error("PDF rasterization failed: {0}")]
    Rasterize(#[from] RasterizeError),
    #[error("OCR recognition failed: {0}")]
    Ocr(#[from] OcrError),
    #[error("Table extraction failed: {0}")]
    Table(#[from] TableError),
    #[error("Table extraction needs an image or PDF, got a {0} document")]
    NotRasterizable(DocumentKind),
}

/// Everything produced for one document.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedDocument {
    pub file_name: String,
    pub kind: DocumentKind,
    pub size_bytes: u64,
    /// Number of OCR'd pages; 0 for plain text.
    pub pages: usize,
    /// Raw text (file content or OCR output).
    pub text: String,
    pub details: LoanDetails,
}

/// What to show as the document preview.
#[derive(Debug, Clone)]
pub enum Preview {
    /// The image itself, or the first page of a PDF.
    Image(DynamicImage),
    Text(String),
}

const SPOOL_PREFIX: &str = "loandoc-upload-";

/// Orchestrates: type check -> (rasterize) -> preprocess -> OCR -> extract.
pub struct DocumentPipeline<R: OcrBackend, P: PdfRasterizer> {
    recognizer: R,
    rasterizer: P,
    settings: ProcessingSettings,
    /// Where `process_bytes` spools uploads; the system temp dir when unset.
    spool_dir: Option<PathBuf>,
}

impl<R: OcrBackend, P: PdfRasterizer> DocumentPipeline<R, P> {
    pub fn new(recognizer: R, rasterizer: P, settings: ProcessingSettings) -> Self {
        Self { recognizer, rasterizer, settings, spool_dir: None }
    }

    pub fn with_spool_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.spool_dir = Some(dir.into());
        self
    }

    pub fn settings(&self) -> &ProcessingSettings {
        &self.settings
    }

    /// Process a file on disk.
    pub async fn process_file(&self, path: &Path) -> Result<ProcessedDocument, PipelineError> {
        let kind = DocumentKind::from_path(path)?;
        let size_bytes = tokio::fs::metadata(path).await?.len();
        info!(kind = %kind, size_bytes, ocr = kind.needs_ocr(), "processing {}", path.display());

        let (text, pages) = self.read_text(path, kind).await?;
        let details = Extractor::extract(&text);
        debug!(fields = details.len(), "extracted loan details");

        Ok(ProcessedDocument {
            file_name: file_name(path),
            kind,
            size_bytes,
            pages,
            text,
            details,
        })
    }

    /// Process uploaded bytes. They are spooled to a temporary file carrying the
    /// original extension, which is removed once processing finishes.
    pub async fn process_bytes(
        &self,
        data: &[u8],
        original_name: &str,
    ) -> Result<ProcessedDocument, PipelineError> {
        let kind = DocumentKind::from_path(Path::new(original_name))?;
        let suffix = Path::new(original_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{e}"))
            .unwrap_or_default();

        let mut builder = tempfile::Builder::new();
        builder.prefix(SPOOL_PREFIX).suffix(&suffix);
        let mut spool = match &self.spool_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        spool.write_all(data)?;
        spool.flush()?;
        debug!(kind = %kind, "spooled upload to {}", spool.path().display());

        let mut doc = self.process_file(spool.path()).await?;
        doc.file_name = original_name.to_string();
        Ok(doc)
    }

    /// Text only, without field extraction.
    pub async fn extract_text(&self, path: &Path) -> Result<String, PipelineError> {
        let kind = DocumentKind::from_path(path)?;
        Ok(self.read_text(path, kind).await?.0)
    }

    pub async fn preview(&self, path: &Path) -> Result<Preview, PipelineError> {
        match DocumentKind::from_path(path)? {
            DocumentKind::Text => Ok(Preview::Text(read_utf8(path).await?)),
            DocumentKind::Image => Ok(Preview::Image(open_image(path)?)),
            DocumentKind::Pdf => Ok(Preview::Image(rasterize::first_page(&self.rasterizer, path)?)),
        }
    }

    /// Word table from an image, or from the first page of a PDF.
    pub async fn extract_table(
        &self,
        path: &Path,
        area: Option<TableArea>,
    ) -> Result<TableData, PipelineError> {
        let image = match DocumentKind::from_path(path)? {
            DocumentKind::Text => return Err(PipelineError::NotRasterizable(DocumentKind::Text)),
            DocumentKind::Image => open_image(path)?,
            DocumentKind::Pdf => rasterize::first_page(&self.rasterizer, path)?,
        };
        Ok(tables::extract_table(&self.recognizer, &image, area, &self.settings)?)
    }

    async fn read_text(&self, path: &Path, kind: DocumentKind) -> Result<(String, usize), PipelineError> {
        match kind {
            DocumentKind::Text => Ok((read_utf8(path).await?, 0)),
            DocumentKind::Image => {
                let processed = preprocess::prepare_for_ocr(path, &self.settings)?;
                Ok((self.ocr(&processed)?, 1))
            }
            DocumentKind::Pdf => {
                let pages = self.rasterizer.rasterize(path)?;
                let mut texts = Vec::with_capacity(pages.len());
                for (i, page) in pages.iter().enumerate() {
                    debug!(page = i + 1, "running OCR on PDF page");
                    let processed = preprocess::prepare_for_ocr_from_image(page, &self.settings)?;
                    texts.push(self.ocr(&processed)?);
                }
                Ok((texts.join("\n\n"), pages.len()))
            }
        }
    }

    fn ocr(&self, processed: &image::GrayImage) -> Result<String, PipelineError> {
        let png = preprocess::encode_png(processed)?;
        Ok(self.recognizer.recognize(&png)?)
    }
}

async fn read_utf8(path: &Path) -> Result<String, PipelineError> {
    let bytes = tokio::fs::read(path).await?;
    String::from_utf8(bytes).map_err(|e| PipelineError::TextDecode(e.to_string()))
}

fn open_image(path: &Path) -> Result<DynamicImage, PipelineError> {
    image::open(path).map_err(|source| {
        PipelineError::Preprocess(PreprocessError::Load {
            path: path.display().to_string(),
            source,
        })
    })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
