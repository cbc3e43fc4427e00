pub mod document;
pub mod fields;
pub mod settings;

pub use document::{DocumentError, DocumentKind, SUPPORTED_EXTENSIONS};
pub use fields::{FieldGroup, LoanDetails, LoanField};
pub use settings::{OcrEngineMode, ProcessingSettings, SettingsError, ThresholdMethod};
