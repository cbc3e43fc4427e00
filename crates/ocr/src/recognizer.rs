use loandoc_core::{OcrEngineMode, ProcessingSettings};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::Command;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Image decode error: {0}")]
    ImageDecode(String),
    #[error("OCR engine error: {0}")]
    Engine(String),
    #[error("Tesseract not available: {0}")]
    NotAvailable(String),
    #[error("This OCR backend cannot produce word-level data")]
    Unsupported,
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Abstraction over an OCR backend.
/// Implementations accept PNG image bytes and return the recognized text.
pub trait OcrBackend: Send + Sync {
    fn recognize(&self, image_bytes: &[u8]) -> Result<String, OcrError>;

    /// Word-level output in Tesseract's TSV layout (used for tables).
    fn recognize_tsv(&self, _image_bytes: &[u8]) -> Result<String, OcrError> {
        Err(OcrError::Unsupported)
    }
}

impl<T: OcrBackend + ?Sized> OcrBackend for Box<T> {
    fn recognize(&self, image_bytes: &[u8]) -> Result<String, OcrError> {
        (**self).recognize(image_bytes)
    }

    fn recognize_tsv(&self, image_bytes: &[u8]) -> Result<String, OcrError> {
        (**self).recognize_tsv(image_bytes)
    }
}

// ── Mock backend (always available, used for tests) ───────────────────────────

/// Returns pre-set output, for exercising the extraction pipeline
/// without requiring Tesseract to be installed.
pub struct MockRecognizer {
    pub text: String,
    pub tsv: Option<String>,
}

impl MockRecognizer {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), tsv: None }
    }

    pub fn with_tsv(mut self, tsv: impl Into<String>) -> Self {
        self.tsv = Some(tsv.into());
        self
    }
}

impl OcrBackend for MockRecognizer {
    fn recognize(&self, _image_bytes: &[u8]) -> Result<String, OcrError> {
        Ok(self.text.clone())
    }

    fn recognize_tsv(&self, _image_bytes: &[u8]) -> Result<String, OcrError> {
        self.tsv.clone().ok_or(OcrError::Unsupported)
    }
}

// ── Tesseract command-line backend ────────────────────────────────────────────

/// Runs the `tesseract` executable on a scratch PNG.
#[derive(Debug, Clone)]
pub struct TesseractCli {
    pub binary: PathBuf,
    pub language: String,
    pub engine_mode: u8,
    pub page_seg_mode: u8,
}

impl TesseractCli {
    pub fn from_settings(settings: &ProcessingSettings) -> Self {
        Self {
            binary: PathBuf::from("tesseract"),
            language: settings.language.clone(),
            engine_mode: settings.ocr_engine_mode.code(),
            page_seg_mode: settings.page_seg_mode,
        }
    }

    /// `--oem 3 --psm 6 -l eng` with the default settings.
    fn args(&self) -> Vec<String> {
        vec![
            "--oem".into(),
            self.engine_mode.to_string(),
            "--psm".into(),
            self.page_seg_mode.to_string(),
            "-l".into(),
            self.language.clone(),
        ]
    }

    fn run(&self, image_bytes: &[u8], config: Option<&str>) -> Result<String, OcrError> {
        let mut input = tempfile::Builder::new().prefix("loandoc-ocr-").suffix(".png").tempfile()?;
        input.write_all(image_bytes)?;
        input.flush()?;

        let mut cmd = Command::new(&self.binary);
        cmd.arg(input.path()).arg("stdout").args(self.args());
        if let Some(config) = config {
            cmd.arg(config);
        }

        let output = cmd.output().map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => OcrError::NotAvailable(self.binary.display().to_string()),
            _ => OcrError::Io(e),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::Engine(stderr.trim().to_string()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for TesseractCli {
    fn default() -> Self {
        Self::from_settings(&ProcessingSettings::default())
    }
}

impl OcrBackend for TesseractCli {
    fn recognize(&self, image_bytes: &[u8]) -> Result<String, OcrError> {
        self.run(image_bytes, None)
    }

    fn recognize_tsv(&self, image_bytes: &[u8]) -> Result<String, OcrError> {
        self.run(image_bytes, Some("tsv"))
    }
}

// ── Tesseract library backend (optional, gated behind `tesseract` feature) ────

/// leptess initialises libtesseract without an engine mode, so anything other
/// than the default cannot be honoured by the library backend.
#[cfg_attr(not(feature = "tesseract"), allow(dead_code))]
fn ignored_engine_mode(settings: &ProcessingSettings) -> Option<OcrEngineMode> {
    (settings.ocr_engine_mode != OcrEngineMode::Default).then_some(settings.ocr_engine_mode)
}

#[cfg(feature = "tesseract")]
pub mod tesseract_backend {
    use super::{ignored_engine_mode, OcrBackend, OcrError};
    use leptess::{LepTess, Variable};
    use loandoc_core::ProcessingSettings;
    use tracing::warn;

    pub struct TesseractRecognizer {
        data_path: Option<String>,
        lang: String,
        page_seg_mode: u8,
    }

    impl TesseractRecognizer {
        pub fn new(data_path: Option<String>, settings: &ProcessingSettings) -> Self {
            if let Some(mode) = ignored_engine_mode(settings) {
                warn!(oem = mode.code(), "libtesseract backend ignores the OCR engine mode; using the default");
            }
            Self {
                data_path,
                lang: settings.language.clone(),
                page_seg_mode: settings.page_seg_mode,
            }
        }

        fn load(&self, image_bytes: &[u8]) -> Result<LepTess, OcrError> {
            let mut lt = LepTess::new(self.data_path.as_deref(), &self.lang)
                .map_err(|e| OcrError::NotAvailable(e.to_string()))?;
            lt.set_variable(Variable::TesseditPagesegMode, &self.page_seg_mode.to_string())
                .map_err(|e| OcrError::Engine(e.to_string()))?;
            lt.set_image_from_mem(image_bytes)
                .map_err(|e| OcrError::ImageDecode(e.to_string()))?;
            Ok(lt)
        }
    }

    impl OcrBackend for TesseractRecognizer {
        fn recognize(&self, image_bytes: &[u8]) -> Result<String, OcrError> {
            self.load(image_bytes)?
                .get_utf8_text()
                .map_err(|e| OcrError::Engine(e.to_string()))
        }

        fn recognize_tsv(&self, image_bytes: &[u8]) -> Result<String, OcrError> {
            self.load(image_bytes)?
                .get_tsv_text(0)
                .map_err(|e| OcrError::Engine(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_returns_preset_text() {
        let r = MockRecognizer::new("LOAN AMOUNT: $250,000");
        assert_eq!(r.recognize(b"fake image data").unwrap(), "LOAN AMOUNT: $250,000");
        assert_eq!(r.recognize(b"").unwrap(), "LOAN AMOUNT: $250,000");
    }

    #[test]
    fn mock_without_tsv_is_unsupported() {
        let r = MockRecognizer::new("x");
        assert!(matches!(r.recognize_tsv(b""), Err(OcrError::Unsupported)));
        let r = r.with_tsv("level\tpage_num");
        assert_eq!(r.recognize_tsv(b"").unwrap(), "level\tpage_num");
    }

    #[test]
    fn cli_args_follow_settings() {
        let settings = ProcessingSettings {
            ocr_engine_mode: OcrEngineMode::Lstm,
            page_seg_mode: 4,
            language: "eng+spa".into(),
            ..Default::default()
        };
        let cli = TesseractCli::from_settings(&settings);
        assert_eq!(cli.args(), vec!["--oem", "2", "--psm", "4", "-l", "eng+spa"]);
        assert_eq!(TesseractCli::default().args(), vec!["--oem", "3", "--psm", "6", "-l", "eng"]);
    }

    #[test]
    fn only_non_default_engine_mode_is_flagged() {
        assert_eq!(ignored_engine_mode(&ProcessingSettings::default()), None);
        let legacy = ProcessingSettings { ocr_engine_mode: OcrEngineMode::Legacy, ..Default::default() };
        assert_eq!(ignored_engine_mode(&legacy), Some(OcrEngineMode::Legacy));
    }

    #[test]
    fn failing_engine_is_engine_error() {
        let cli = TesseractCli { binary: PathBuf::from("false"), ..Default::default() };
        assert!(matches!(cli.recognize(b"png"), Err(OcrError::Engine(_))));
        assert!(matches!(cli.recognize_tsv(b"png"), Err(OcrError::Engine(_))));
    }

    #[test]
    fn missing_binary_is_not_available() {
        let cli = TesseractCli { binary: PathBuf::from("/nonexistent/tesseract-xyz"), ..Default::default() };
        assert!(matches!(cli.recognize(b"png"), Err(OcrError::NotAvailable(_))));
    }
}
