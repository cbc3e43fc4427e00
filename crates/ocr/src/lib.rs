pub mod extract;
pub mod pipeline;
pub mod preprocess;
pub mod rasterize;
pub mod recognizer;
pub mod tables;

pub use extract::Extractor;
pub use pipeline::{DocumentPipeline, PipelineError, Preview, ProcessedDocument};
pub use preprocess::{prepare_for_ocr, PreprocessError};
pub use rasterize::{CachedRasterizer, Pdftoppm, PdfRasterizer, RasterizeError};
pub use recognizer::{MockRecognizer, OcrBackend, OcrError, TesseractCli};
pub use tables::{TableArea, TableData, TableError};

#[cfg(feature = "tesseract")]
pub use recognizer::tesseract_backend::TesseractRecognizer;
