use clap::{Args, Parser, Subcommand, ValueEnum};
use loandoc_core::{LoanField, OcrEngineMode, ThresholdMethod};
use loandoc_ocr::TableArea;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod commands;
mod display;

#[derive(Debug, Parser)]
#[command(
    name = "loandoc",
    version,
    about = "Extract key information from personal loan documents using OCR"
)]
pub struct Cli {
    /// Settings file (default: settings.toml in the user config directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Extract loan details from a PDF, image, or text file
    Process(ProcessArgs),
    /// List or process the bundled sample documents
    Samples(SamplesArgs),
    /// Show or change processing settings
    #[command(subcommand)]
    Settings(SettingsCommand),
    /// Build image or PDF fixtures from the sample text files
    Fixtures(FixturesArgs),
}

#[derive(Debug, Args)]
pub struct ProcessArgs {
    /// Document to process; `-` reads it from stdin (requires --name)
    pub file: PathBuf,

    /// File name (with extension) for a document read from stdin
    #[arg(long, value_name = "NAME")]
    pub name: Option<String>,

    /// Print one JSON object instead of the report
    #[arg(long)]
    pub json: bool,

    /// Also print the raw extracted text
    #[arg(long)]
    pub raw: bool,

    /// Write the document preview (first page for PDFs) to this PNG
    #[arg(long, value_name = "PNG")]
    pub preview: Option<PathBuf>,

    /// Correct a field by hand, e.g. --set lender_name="Acme Bank"
    #[arg(long = "set", value_name = "FIELD=VALUE", value_parser = parse_edit)]
    pub edits: Vec<(LoanField, String)>,

    /// Also extract a word table from the page
    #[arg(long)]
    pub table: bool,

    /// Restrict table extraction to x,y,width,height (implies --table)
    #[arg(long, value_name = "X,Y,W,H")]
    pub table_area: Option<TableArea>,
}

#[derive(Debug, Args)]
pub struct SamplesArgs {
    #[arg(long, default_value = "sample_docs")]
    pub dir: PathBuf,

    /// Create the directory if it does not exist
    #[arg(long)]
    pub create: bool,

    /// Process the named sample document
    #[arg(long, value_name = "NAME")]
    pub process: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum SettingsCommand {
    /// Print the current settings
    Show,
    /// Change one or more settings and save them
    Set(SettingsSetArgs),
}

#[derive(Debug, Args)]
pub struct SettingsSetArgs {
    /// adaptive, otsu or binary
    #[arg(long)]
    pub threshold: Option<ThresholdMethod>,
    /// 1-20
    #[arg(long)]
    pub denoise: Option<u8>,
    /// 800-3000 pixels
    #[arg(long)]
    pub resize_width: Option<u32>,
    /// OCR engine mode: 1 (legacy), 2 (lstm) or 3 (default)
    #[arg(long)]
    pub oem: Option<OcrEngineMode>,
    /// Tesseract page segmentation mode, 0-13
    #[arg(long)]
    pub psm: Option<u8>,
    /// Tesseract language, e.g. eng or eng+spa
    #[arg(long)]
    pub lang: Option<String>,
    /// PDF rasterization resolution, 72-600
    #[arg(long)]
    pub dpi: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FixtureKind {
    Image,
    Pdf,
}

#[derive(Debug, Args)]
pub struct FixturesArgs {
    #[arg(value_enum)]
    pub kind: FixtureKind,

    #[arg(long, default_value = "sample_docs")]
    pub dir: PathBuf,

    /// TrueType font for image fixtures (default: first system font found)
    #[arg(long, value_name = "TTF")]
    pub font: Option<PathBuf>,
}

fn parse_edit(s: &str) -> Result<(LoanField, String), String> {
    let (field, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=VALUE, got '{s}'"))?;
    Ok((field.parse()?, value.to_string()))
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,loandoc=info")),
        )
        .init();

    let cli = Cli::parse();
    match commands::run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
