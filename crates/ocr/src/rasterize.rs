use image::DynamicImage;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum RasterizeError {
    #[error("{0} is not installed or not on PATH")]
    ToolUnavailable(String),
    #[error("PDF rasterization failed: {0}")]
    Failed(String),
    #[error("PDF produced no pages: {0}")]
    NoPages(String),
    #[error("Failed to load rendered page {path}: {source}")]
    Page {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Turns every page of a PDF into a raster image, in page order.
pub trait PdfRasterizer: Send + Sync {
    fn rasterize(&self, pdf: &Path) -> Result<Vec<DynamicImage>, RasterizeError>;
}

/// First page only, for previews.
pub fn first_page<P: PdfRasterizer + ?Sized>(rasterizer: &P, pdf: &Path) -> Result<DynamicImage, RasterizeError> {
    rasterizer
        .rasterize(pdf)?
        .into_iter()
        .next()
        .ok_or_else(|| RasterizeError::NoPages(pdf.display().to_string()))
}

// ── Page cache ────────────────────────────────────────────────────────────────

/// Keeps the pages of the last PDF rendered, so repeated requests for the
/// same document share one rasterization.
pub struct CachedRasterizer<P> {
    inner: P,
    last: Mutex<Option<(PathBuf, Vec<DynamicImage>)>>,
}

impl<P: PdfRasterizer> CachedRasterizer<P> {
    pub fn new(inner: P) -> Self {
        Self { inner, last: Mutex::new(None) }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

impl<P: PdfRasterizer> PdfRasterizer for CachedRasterizer<P> {
    fn rasterize(&self, pdf: &Path) -> Result<Vec<DynamicImage>, RasterizeError> {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((cached, pages)) = last.as_ref() {
            if cached == pdf {
                debug!(pages = pages.len(), "reusing rendered pages of {}", pdf.display());
                return Ok(pages.clone());
            }
        }
        let pages = self.inner.rasterize(pdf)?;
        *last = Some((pdf.to_path_buf(), pages.clone()));
        Ok(pages)
    }
}

// ── Poppler backend ───────────────────────────────────────────────────────────

/// Shells out to Poppler's `pdftoppm`, rendering into a scratch directory
/// that is removed when rasterization finishes.
#[derive(Debug, Clone)]
pub struct Pdftoppm {
    pub binary: PathBuf,
    pub dpi: u32,
}

impl Pdftoppm {
    pub fn new(dpi: u32) -> Self {
        Self { binary: PathBuf::from("pdftoppm"), dpi }
    }
}

impl Default for Pdftoppm {
    fn default() -> Self {
        Self::new(300)
    }
}

impl PdfRasterizer for Pdftoppm {
    fn rasterize(&self, pdf: &Path) -> Result<Vec<DynamicImage>, RasterizeError> {
        let scratch = tempfile::tempdir()?;
        let prefix = scratch.path().join("page");

        let output = Command::new(&self.binary)
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg("-png")
            .arg(pdf)
            .arg(&prefix)
            .output()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => {
                    RasterizeError::ToolUnavailable(self.binary.display().to_string())
                }
                _ => RasterizeError::Io(e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RasterizeError::Failed(format!(
                "{}: {}",
                pdf.display(),
                stderr.trim()
            )));
        }

        let pages = rendered_pages(scratch.path())?;
        if pages.is_empty() {
            return Err(RasterizeError::NoPages(pdf.display().to_string()));
        }
        debug!(pages = pages.len(), dpi = self.dpi, "rasterized {}", pdf.display());

        pages
            .into_iter()
            .map(|path| {
                image::open(&path).map_err(|source| RasterizeError::Page {
                    path: path.display().to_string(),
                    source,
                })
            })
            .collect()
    }
}

/// `page-1.png`, `page-02.png`, ... sorted by page number. pdftoppm zero-pads
/// the number to the width of the page count, so lexical order is not enough.
fn rendered_pages(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut numbered: Vec<(u32, PathBuf)> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter_map(|path| {
            let n = page_number(&path)?;
            Some((n, path))
        })
        .collect();
    numbered.sort_by_key(|(n, _)| *n);
    Ok(numbered.into_iter().map(|(_, p)| p).collect())
}

fn page_number(path: &Path) -> Option<u32> {
    if path.extension()?.to_str()? != "png" {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    stem.strip_prefix("page-")?.parse().ok()
}
