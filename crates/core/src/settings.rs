use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

pub const DENOISE_STRENGTH_RANGE: (u8, u8) = (1, 20);
pub const RESIZE_WIDTH_RANGE: (u32, u32) = (800, 3000);
pub const PDF_DPI_RANGE: (u32, u32) = (72, 600);

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange { field: &'static str, min: i64, max: i64, value: i64 },
    #[error("Invalid setting: {0}")]
    Invalid(String),
    #[error("Failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Settings I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdMethod {
    #[default]
    Adaptive,
    Otsu,
    Binary,
}

impl fmt::Display for ThresholdMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThresholdMethod::Adaptive => write!(f, "adaptive"),
            ThresholdMethod::Otsu => write!(f, "otsu"),
            ThresholdMethod::Binary => write!(f, "binary"),
        }
    }
}

impl FromStr for ThresholdMethod {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "adaptive" => Ok(ThresholdMethod::Adaptive),
            "otsu" => Ok(ThresholdMethod::Otsu),
            "binary" => Ok(ThresholdMethod::Binary),
            other => Err(format!("Unknown threshold method: '{other}'")),
        }
    }
}

/// Tesseract `--oem` values exposed to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrEngineMode {
    Legacy,
    Lstm,
    #[default]
    Default,
}

impl OcrEngineMode {
    pub fn code(self) -> u8 {
        match self {
            OcrEngineMode::Legacy => 1,
            OcrEngineMode::Lstm => 2,
            OcrEngineMode::Default => 3,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            OcrEngineMode::Legacy => "Legacy engine only",
            OcrEngineMode::Lstm => "Neural nets LSTM engine only",
            OcrEngineMode::Default => "Default, based on what is available",
        }
    }
}

impl fmt::Display for OcrEngineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.code(), self.description())
    }
}

impl FromStr for OcrEngineMode {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "1" | "legacy" => Ok(OcrEngineMode::Legacy),
            "2" | "lstm" => Ok(OcrEngineMode::Lstm),
            "3" | "default" => Ok(OcrEngineMode::Default),
            other => Err(format!("Unknown OCR engine mode: '{other}'")),
        }
    }
}

/// Knobs for the preprocessing and OCR stages, persisted as TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingSettings {
    pub threshold_method: ThresholdMethod,
    pub denoise_strength: u8,
    /// Target page width in pixels before filtering.
    pub resize_width: u32,
    pub ocr_engine_mode: OcrEngineMode,
    /// Tesseract `--psm`; 6 assumes a single uniform block of text.
    pub page_seg_mode: u8,
    pub language: String,
    pub pdf_dpi: u32,
}

impl Default for ProcessingSettings {
    fn default() -> Self {
        Self {
            threshold_method: ThresholdMethod::Adaptive,
            denoise_strength: 10,
            resize_width: 1700,
            ocr_engine_mode: OcrEngineMode::Default,
            page_seg_mode: 6,
            language: "eng".to_string(),
            pdf_dpi: 300,
        }
    }
}

impl ProcessingSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        check_range(
            "denoise_strength",
            self.denoise_strength as i64,
            DENOISE_STRENGTH_RANGE.0 as i64,
            DENOISE_STRENGTH_RANGE.1 as i64,
        )?;
        check_range(
            "resize_width",
            self.resize_width as i64,
            RESIZE_WIDTH_RANGE.0 as i64,
            RESIZE_WIDTH_RANGE.1 as i64,
        )?;
        check_range("page_seg_mode", self.page_seg_mode as i64, 0, 13)?;
        check_range(
            "pdf_dpi",
            self.pdf_dpi as i64,
            PDF_DPI_RANGE.0 as i64,
            PDF_DPI_RANGE.1 as i64,
        )?;
        if self.language.trim().is_empty()
            || !self.language.chars().all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '_')
        {
            return Err(SettingsError::Invalid(format!("language '{}'", self.language)));
        }
        Ok(())
    }

    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let settings: ProcessingSettings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_toml(&self) -> Result<String, SettingsError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Read settings from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let settings = Self::load_unvalidated(path)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Like [`load`](Self::load) but without range checks, so a stored value
    /// that is out of range can still be shown and corrected.
    pub fn load_unvalidated(path: &Path) -> Result<Self, SettingsError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(toml::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }
}

fn check_range(field: &'static str, value: i64, min: i64, max: i64) -> Result<(), SettingsError> {
    if value < min || value > max {
        return Err(SettingsError::OutOfRange { field, min, max, value });
    }
    Ok(())
}
