use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Extensions accepted by the pipeline, lower-case, without the dot.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "png", "jpg", "jpeg", "tiff", "tif", "txt", "text"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Text,
    Image,
    Pdf,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    #[error("Unsupported file type: '{0}'")]
    UnsupportedFileType(String),
    #[error("File has no extension: {0}")]
    MissingExtension(String),
}

impl DocumentKind {
    pub fn from_extension(ext: &str) -> Result<Self, DocumentError> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "txt" | "text" => Ok(DocumentKind::Text),
            "png" | "jpg" | "jpeg" | "tiff" | "tif" => Ok(DocumentKind::Image),
            "pdf" => Ok(DocumentKind::Pdf),
            other => Err(DocumentError::UnsupportedFileType(other.to_string())),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, DocumentError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| DocumentError::MissingExtension(path.display().to_string()))?;
        Self::from_extension(ext)
    }

    /// Whether the document has to go through OCR to yield text.
    pub fn needs_ocr(self) -> bool {
        !matches!(self, DocumentKind::Text)
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentKind::Text => write!(f, "text"),
            DocumentKind::Image => write!(f, "image"),
            DocumentKind::Pdf => write!(f, "pdf"),
        }
    }
}
