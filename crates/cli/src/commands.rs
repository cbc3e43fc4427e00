use anyhow::{bail, Context, Result};
use loandoc_core::{DocumentKind, ProcessingSettings, SUPPORTED_EXTENSIONS};
use loandoc_fixtures::{convert_directory, FixtureTarget};
use loandoc_ocr::{CachedRasterizer, DocumentPipeline, OcrBackend, Pdftoppm, Preview, ProcessedDocument, TableData};
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;
use tracing::{info, warn};

use crate::display;
use crate::{Cli, Command, FixtureKind, FixturesArgs, ProcessArgs, SamplesArgs, SettingsCommand, SettingsSetArgs};

type Pipeline = DocumentPipeline<Box<dyn OcrBackend>, CachedRasterizer<Pdftoppm>>;

pub async fn run(cli: Cli) -> Result<()> {
    let config_path = settings_path(cli.config)?;
    match cli.command {
        Command::Process(args) => process(args, load_settings(&config_path)?).await,
        Command::Samples(args) => samples(args, load_settings(&config_path)?).await,
        Command::Settings(cmd) => settings(cmd, &config_path),
        Command::Fixtures(args) => fixtures(args),
    }
}

fn settings_path(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path);
    }
    let dirs = directories::ProjectDirs::from("com", "loandoc", "Loandoc")
        .context("Could not determine the user config directory")?;
    Ok(dirs.config_dir().join("settings.toml"))
}

fn load_settings(path: &Path) -> Result<ProcessingSettings> {
    ProcessingSettings::load(path).with_context(|| format!("Failed to load settings from {}", path.display()))
}

fn build_pipeline(settings: ProcessingSettings) -> Pipeline {
    let rasterizer = CachedRasterizer::new(Pdftoppm::new(settings.pdf_dpi));
    DocumentPipeline::new(recognizer(&settings), rasterizer, settings)
}

#[cfg(feature = "tesseract")]
fn recognizer(settings: &ProcessingSettings) -> Box<dyn OcrBackend> {
    Box::new(loandoc_ocr::TesseractRecognizer::new(None, settings))
}

#[cfg(not(feature = "tesseract"))]
fn recognizer(settings: &ProcessingSettings) -> Box<dyn OcrBackend> {
    Box::new(loandoc_ocr::TesseractCli::from_settings(settings))
}

// ── process ───────────────────────────────────────────────────────────────────

async fn process(args: ProcessArgs, settings: ProcessingSettings) -> Result<()> {
    let pipeline = build_pipeline(settings);
    let from_stdin = args.file.as_os_str() == "-";
    let wants_table = args.table || args.table_area.is_some();
    if from_stdin && (wants_table || args.preview.is_some()) {
        bail!("--preview and --table need a document path, not stdin");
    }

    let result = if from_stdin {
        let name = args.name.as_deref().context("--name is required when reading from stdin")?;
        let mut data = Vec::new();
        tokio::io::stdin()
            .read_to_end(&mut data)
            .await
            .context("Failed to read document from stdin")?;
        pipeline.process_bytes(&data, name).await
    } else {
        pipeline.process_file(&args.file).await
    };
    let mut doc = result.context("Error processing document")?;

    for (field, value) in &args.edits {
        info!(field = %field, "manual correction");
        doc.details.set(*field, value);
    }

    let table = if wants_table {
        let data = pipeline
            .extract_table(&args.file, args.table_area)
            .await
            .context("Error extracting table")?;
        Some(data)
    } else {
        None
    };

    if let Some(out) = &args.preview {
        write_preview(&pipeline, &args.file, out).await?;
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&document_json(&doc, table.as_ref()))?);
    } else {
        print!("{}", report(&doc, args.raw, table.as_ref()));
    }
    Ok(())
}

fn document_json(doc: &ProcessedDocument, table: Option<&TableData>) -> serde_json::Value {
    serde_json::json!({
        "file": doc.file_name,
        "kind": doc.kind,
        "size_bytes": doc.size_bytes,
        "pages": doc.pages,
        "text": doc.text,
        "fields": doc.details,
        "parsed": {
            "loan_amount": doc.details.loan_amount_decimal(),
            "interest_rate": doc.details.interest_rate_decimal(),
            "application_date": doc.details.application_date(),
        },
        "table": table,
    })
}

fn report(doc: &ProcessedDocument, raw: bool, table: Option<&TableData>) -> String {
    let mut out = display::file_details(doc);
    out.push('\n');
    out.push_str(&display::extracted_information(&doc.details));
    if raw {
        out.push_str(&display::raw_text(&doc.text));
    }
    if let Some(table) = table {
        out.push_str(&display::table(table));
    }
    out
}

async fn write_preview(pipeline: &Pipeline, file: &Path, out: &Path) -> Result<()> {
    match pipeline.preview(file).await.context("Error loading document preview")? {
        Preview::Image(img) => {
            img.save_with_format(out, image::ImageFormat::Png)
                .with_context(|| format!("Failed to write preview to {}", out.display()))?;
            info!("wrote preview to {}", out.display());
        }
        Preview::Text(_) => warn!("text documents have no image preview; nothing written"),
    }
    Ok(())
}

// ── samples ───────────────────────────────────────────────────────────────────

async fn samples(args: SamplesArgs, settings: ProcessingSettings) -> Result<()> {
    if !args.dir.is_dir() {
        if args.create {
            std::fs::create_dir_all(&args.dir)
                .with_context(|| format!("Failed to create {}", args.dir.display()))?;
            println!("Created directory: {}", args.dir.display());
            println!("Please add sample documents to this directory.");
        } else {
            warn!("sample documents directory ({}) not found", args.dir.display());
            println!(
                "Sample documents directory ({}) not found. Re-run with --create to create it.",
                args.dir.display()
            );
        }
        return Ok(());
    }

    if let Some(name) = args.process {
        let path = args.dir.join(&name);
        if !path.is_file() {
            bail!("No sample document named '{name}' in {}", args.dir.display());
        }
        let process_args = ProcessArgs {
            file: path,
            name: None,
            json: false,
            raw: true,
            preview: None,
            edits: Vec::new(),
            table: false,
            table_area: None,
        };
        return process(process_args, settings).await;
    }

    let files = list_samples(&args.dir)?;
    if files.is_empty() {
        println!(
            "No sample documents found. Please add some documents to the {} directory.",
            args.dir.display()
        );
        return Ok(());
    }
    let mut any_unsupported = false;
    for (i, path) in files.iter().enumerate() {
        let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        let kind = DocumentKind::from_path(path).map_or_else(
            |_| {
                any_unsupported = true;
                "unsupported".to_string()
            },
            |k| k.to_string(),
        );
        println!("{:>3}. {name} ({kind})", i + 1);
    }
    if any_unsupported {
        println!("\nSupported types: {}", SUPPORTED_EXTENSIONS.join(", "));
    }
    Ok(())
}

/// Files (not directories) directly inside `dir` that have an extension, by name.
fn list_samples(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read {}", dir.display()))?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some())
        .collect();
    files.sort();
    Ok(files)
}

// ── settings ──────────────────────────────────────────────────────────────────

fn settings(cmd: SettingsCommand, path: &Path) -> Result<()> {
    match cmd {
        SettingsCommand::Show => {
            let current = load_settings_for_edit(path)?;
            println!("Settings file: {}\n", path.display());
            print!("{}", display::settings(&current));
            if let Err(e) = current.validate() {
                println!("\nwarning: {e}; fix it with `loandoc settings set`");
            }
        }
        SettingsCommand::Set(args) => {
            let mut current = load_settings_for_edit(path)?;
            apply_settings(&mut current, args);
            current
                .save(path)
                .with_context(|| format!("Failed to save settings to {}", path.display()))?;
            println!("Settings saved to {}", path.display());
        }
    }
    Ok(())
}

/// Stored values are range-checked only when saving, so a bad file can be repaired.
fn load_settings_for_edit(path: &Path) -> Result<ProcessingSettings> {
    let settings = ProcessingSettings::load_unvalidated(path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;
    if let Err(e) = settings.validate() {
        warn!("stored settings are invalid: {e}");
    }
    Ok(settings)
}

fn apply_settings(settings: &mut ProcessingSettings, args: SettingsSetArgs) {
    if let Some(v) = args.threshold {
        settings.threshold_method = v;
    }
    if let Some(v) = args.denoise {
        settings.denoise_strength = v;
    }
    if let Some(v) = args.resize_width {
        settings.resize_width = v;
    }
    if let Some(v) = args.oem {
        settings.ocr_engine_mode = v;
    }
    if let Some(v) = args.psm {
        settings.page_seg_mode = v;
    }
    if let Some(v) = args.lang {
        settings.language = v;
    }
    if let Some(v) = args.dpi {
        settings.pdf_dpi = v;
    }
}

// ── fixtures ──────────────────────────────────────────────────────────────────

fn fixtures(args: FixturesArgs) -> Result<()> {
    let (target, noun) = match args.kind {
        FixtureKind::Image => (FixtureTarget::Image, "image"),
        FixtureKind::Pdf => (FixtureTarget::Pdf, "PDF"),
    };
    let report = convert_directory(&args.dir, target, args.font.as_deref())
        .with_context(|| format!("Failed to convert text files in {}", args.dir.display()))?;

    for path in &report.written {
        println!("Created {noun}: {}", path.display());
    }
    for (path, err) in &report.failed {
        let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        eprintln!("Error converting {name}: {err}");
    }
    if report.written.is_empty() && report.failed.is_empty() {
        println!("No .txt files found in {}", args.dir.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use loandoc_core::{LoanDetails, LoanField, OcrEngineMode, ThresholdMethod};

    fn text_args(file: PathBuf) -> ProcessArgs {
        ProcessArgs {
            file,
            name: None,
            json: false,
            raw: false,
            preview: None,
            edits: Vec::new(),
            table: false,
            table_area: None,
        }
    }

    #[test]
    fn explicit_config_path_wins() {
        let path = settings_path(Some(PathBuf::from("/tmp/custom.toml"))).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/custom.toml"));
    }

    #[test]
    fn apply_only_given_settings() {
        let mut s = ProcessingSettings::default();
        apply_settings(
            &mut s,
            SettingsSetArgs {
                threshold: Some(ThresholdMethod::Binary),
                denoise: None,
                resize_width: Some(2400),
                oem: Some(OcrEngineMode::Lstm),
                psm: None,
                lang: None,
                dpi: None,
            },
        );
        assert_eq!(s.threshold_method, ThresholdMethod::Binary);
        assert_eq!(s.resize_width, 2400);
        assert_eq!(s.ocr_engine_mode, OcrEngineMode::Lstm);
        assert_eq!(s.denoise_strength, 10);
        assert_eq!(s.language, "eng");
    }

    #[test]
    fn settings_set_persists_and_rejects_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf/settings.toml");
        let set = |dpi| SettingsSetArgs {
            threshold: None,
            denoise: None,
            resize_width: None,
            oem: None,
            psm: None,
            lang: None,
            dpi: Some(dpi),
        };

        settings(SettingsCommand::Set(set(150)), &path).unwrap();
        assert_eq!(ProcessingSettings::load(&path).unwrap().pdf_dpi, 150);

        assert!(settings(SettingsCommand::Set(set(5000)), &path).is_err());
        assert_eq!(ProcessingSettings::load(&path).unwrap().pdf_dpi, 150);
    }

    #[test]
    fn settings_set_repairs_out_of_range_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "denoise_strength = 50\nresize_width = 2000\n").unwrap();

        settings(SettingsCommand::Show, &path).unwrap();
        let fix = SettingsSetArgs {
            threshold: None,
            denoise: Some(5),
            resize_width: None,
            oem: None,
            psm: None,
            lang: None,
            dpi: None,
        };
        settings(SettingsCommand::Set(fix), &path).unwrap();

        let repaired = ProcessingSettings::load(&path).unwrap();
        assert_eq!(repaired.denoise_strength, 5);
        assert_eq!(repaired.resize_width, 2000);
    }

    #[test]
    fn settings_set_keeps_bad_file_when_still_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "denoise_strength = 50\n").unwrap();
        let unrelated = SettingsSetArgs {
            threshold: None,
            denoise: None,
            resize_width: None,
            oem: None,
            psm: Some(4),
            lang: None,
            dpi: None,
        };
        assert!(settings(SettingsCommand::Set(unrelated), &path).is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "denoise_strength = 50\n");
    }

    #[test]
    fn samples_listed_by_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.pdf"), b"").unwrap();
        std::fs::write(dir.path().join("a.txt"), b"").unwrap();
        std::fs::write(dir.path().join("README"), b"").unwrap();
        std::fs::create_dir(dir.path().join("images")).unwrap();

        let names: Vec<_> = list_samples(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.txt", "b.pdf"]);
    }

    #[tokio::test]
    async fn samples_create_makes_directory() {
        let dir = tempfile::tempdir().unwrap();
        let samples_dir = dir.path().join("sample_docs");
        let args = SamplesArgs { dir: samples_dir.clone(), create: true, process: None };
        samples(args, ProcessingSettings::default()).await.unwrap();
        assert!(samples_dir.is_dir());
    }

    #[tokio::test]
    async fn process_text_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loan.txt");
        std::fs::write(&path, "Loan Amount: $9,500\nLoan Term: 5 years").unwrap();
        process(text_args(path), ProcessingSettings::default()).await.unwrap();
    }

    #[tokio::test]
    async fn process_reports_unsupported_type() {
        let err = process(text_args(PathBuf::from("contract.docx")), ProcessingSettings::default())
            .await
            .unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.starts_with("Error processing document"), "{msg}");
        assert!(msg.contains("Unsupported file type: 'docx'"), "{msg}");
    }

    #[tokio::test]
    async fn stdin_cannot_preview() {
        let mut args = text_args(PathBuf::from("-"));
        args.name = Some("loan.txt".into());
        args.preview = Some(PathBuf::from("out.png"));
        assert!(process(args, ProcessingSettings::default()).await.is_err());
    }

    #[test]
    fn report_and_json_include_edits() {
        let mut details = LoanDetails::new();
        details.insert(LoanField::LoanAmount, "1,250.50");
        details.set(LoanField::LenderName, "Acme Bank");
        let doc = ProcessedDocument {
            file_name: "loan.txt".into(),
            kind: DocumentKind::Text,
            size_bytes: 512,
            pages: 0,
            text: "raw body".into(),
            details,
        };

        let text = report(&doc, true, None);
        assert!(text.contains("File size: 0.50 KB"));
        assert!(text.contains("$1,250.50"));
        assert!(text.contains("Acme Bank"));
        assert!(text.contains("raw body"));

        let json = document_json(&doc, None);
        assert_eq!(json["file"], "loan.txt");
        assert_eq!(json["fields"]["lender_name"], "Acme Bank");
        assert_eq!(json["parsed"]["loan_amount"], "1250.50");
        assert!(json["parsed"]["application_date"].is_null());
        assert!(json["table"].is_null());
    }
}
