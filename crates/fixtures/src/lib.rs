pub mod pdf;
pub mod render;

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

pub use pdf::text_to_pdf;
pub use render::{load_font, text_to_image, wrap_text};

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("No usable system font found; pass a TrueType font explicitly")]
    NoFont,
    #[error("Not a TrueType/OpenType font: {0}")]
    BadFont(String),
    #[error("Sample directory does not exist: {0}")]
    MissingDirectory(String),
}

/// What `convert_directory` produces from each text file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixtureTarget {
    Image,
    Pdf,
}

impl FixtureTarget {
    pub fn subdir(self) -> &'static str {
        match self {
            FixtureTarget::Image => "images",
            FixtureTarget::Pdf => "pdfs",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            FixtureTarget::Image => "png",
            FixtureTarget::Pdf => "pdf",
        }
    }
}

#[derive(Debug, Default)]
pub struct ConversionReport {
    pub written: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

/// Convert every `*.txt` directly inside `dir` into `dir/images/<stem>.png`
/// or `dir/pdfs/<stem>.pdf`. A file that fails is logged and skipped.
pub fn convert_directory(
    dir: &Path,
    target: FixtureTarget,
    font: Option<&Path>,
) -> Result<ConversionReport, FixtureError> {
    if !dir.is_dir() {
        return Err(FixtureError::MissingDirectory(dir.display().to_string()));
    }
    let out_dir = dir.join(target.subdir());
    std::fs::create_dir_all(&out_dir)?;

    let mut inputs: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|e| e == "txt"))
        .collect();
    inputs.sort();

    let mut report = ConversionReport::default();
    for input in inputs {
        let Some(stem) = input.file_stem() else { continue };
        let output = out_dir.join(format!("{}.{}", stem.to_string_lossy(), target.extension()));
        let result = match target {
            FixtureTarget::Image => text_to_image(&input, &output, font),
            FixtureTarget::Pdf => text_to_pdf(&input, &output),
        };
        match result {
            Ok(()) => {
                info!("created {}", output.display());
                report.written.push(output);
            }
            Err(e) => {
                warn!("error converting {}: {e}", input.display());
                report.failed.push((input, e.to_string()));
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_text_files_to_pdfs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b_statement.txt"), "Lender: Acme").unwrap();
        std::fs::write(dir.path().join("a_application.txt"), "Loan Amount: $1,000").unwrap();
        std::fs::write(dir.path().join("scan.png"), b"").unwrap();

        let report = convert_directory(dir.path(), FixtureTarget::Pdf, None).unwrap();
        assert!(report.failed.is_empty());
        let names: Vec<_> = report
            .written
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            names,
            vec![PathBuf::from("pdfs/a_application.pdf"), PathBuf::from("pdfs/b_statement.pdf")]
        );
        assert!(dir.path().join("pdfs/a_application.pdf").is_file());
    }

    #[test]
    fn bad_input_is_counted_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("good.txt"), "ok").unwrap();
        std::fs::write(dir.path().join("binary.txt"), [0xffu8, 0xfe]).unwrap();

        let report = convert_directory(dir.path(), FixtureTarget::Pdf, None).unwrap();
        assert_eq!(report.written.len(), 1);
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].0.ends_with("binary.txt"));
    }

    #[test]
    fn image_target_fails_per_file_with_bad_font() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("loan.txt"), "Loan Type: Auto").unwrap();
        let font = dir.path().join("font.ttf");
        std::fs::write(&font, b"junk").unwrap();

        let report = convert_directory(dir.path(), FixtureTarget::Image, Some(&font)).unwrap();
        assert!(report.written.is_empty());
        assert_eq!(report.failed.len(), 1);
        assert!(dir.path().join("images").is_dir());
    }

    #[test]
    fn missing_directory_is_an_error() {
        let err = convert_directory(Path::new("/nonexistent/sample_docs"), FixtureTarget::Pdf, None)
            .unwrap_err();
        assert!(matches!(err, FixtureError::MissingDirectory(_)));
    }
}
