//! PDF Assembler CLI - Merge PDF files and stamp page numbers from the command line.

use anyhow::{Context, Result};
use bytes::Bytes;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pdf_assembler_core::{
    AppConfig, DocumentProcessor, DocumentRef, MemoryStore, PdfDocument, StoredDocument,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "pdf-assemble")]
#[command(author, version, about = "Merge PDF documents and add page numbers", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Merge PDF files in the order given
    Merge {
        /// Input PDF files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output PDF file
        #[arg(short, long)]
        output: PathBuf,

        /// Add "n / total" page numbers to the result
        #[arg(long)]
        number: bool,
    },

    /// Add "n / total" page numbers to a PDF file
    Number {
        /// Input PDF file
        input: PathBuf,

        /// Output PDF file (default: <input>-numbered.pdf)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show page counts
    Info {
        /// Input PDF files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (before parsing args so env vars are available)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let log_level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    let config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path).context("Failed to load config file")?
    } else {
        AppConfig::load()
    };

    // Documents only live for the duration of the command
    let processor = DocumentProcessor::new(Arc::new(MemoryStore::new(config.store.memory_max_mb)));

    match args.command {
        Command::Merge {
            inputs,
            output,
            number,
        } => merge(&processor, &inputs, &output, number).await,
        Command::Number { input, output } => {
            let output = output.unwrap_or_else(|| default_number_output(&input));
            let source = load(&processor, &input).await?;
            let numbered = processor
                .number_pages(source.id.as_str())
                .await
                .with_context(|| format!("Failed to number pages of {}", input.display()))?;
            save(&numbered, &output).await
        }
        Command::Info { inputs } => show_info(&inputs).await,
    }
}

async fn merge(
    processor: &DocumentProcessor,
    inputs: &[PathBuf],
    output: &Path,
    number: bool,
) -> Result<()> {
    let pb = ProgressBar::new(u64::try_from(inputs.len()).unwrap_or(u64::MAX));
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .context("Invalid progress template")?
            .progress_chars("#>-"),
    );

    let mut files = Vec::with_capacity(inputs.len());
    for input in inputs {
        pb.set_message(input.display().to_string());
        let doc = load(processor, input).await?;
        files.push(DocumentRef {
            id: doc.id.to_string(),
            filename: Some(doc.original_name.clone()),
            path: Some(input.display().to_string()),
        });
        pb.inc(1);
    }
    pb.finish_with_message("Loaded");

    info!("Merging {} files", files.len());
    let mut result = processor
        .merge(&files, None)
        .await
        .context("Failed to merge PDFs")?;

    if number {
        result = processor
            .number_pages(result.id.as_str())
            .await
            .context("Failed to number merged pages")?;
    }

    save(&result, output).await
}

async fn show_info(inputs: &[PathBuf]) -> Result<()> {
    for input in inputs {
        let bytes = tokio::fs::read(input)
            .await
            .with_context(|| format!("Failed to read {}", input.display()))?;
        let doc = PdfDocument::from_bytes(&bytes)
            .with_context(|| format!("Failed to load PDF: {}", input.display()))?;

        // CLI output is intentional
        #[allow(clippy::print_stdout)]
        {
            println!("{}: {} pages", input.display(), doc.page_count());
        }
    }

    Ok(())
}

/// Read a file and hand it to the processor like an upload.
async fn load(processor: &DocumentProcessor, path: &Path) -> Result<StoredDocument> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("document.pdf");
    let media_type = mime_guess::from_path(path)
        .first_raw()
        .unwrap_or("application/octet-stream");

    processor
        .ingest(Bytes::from(bytes), name, media_type)
        .await
        .with_context(|| format!("Failed to load {}", path.display()))
}

async fn save(doc: &StoredDocument, output: &Path) -> Result<()> {
    tokio::fs::write(output, &doc.bytes)
        .await
        .with_context(|| format!("Failed to write output: {}", output.display()))?;

    // CLI output is intentional
    #[allow(clippy::print_stdout)]
    {
        println!("Saved {} to: {}", doc.original_name, output.display());
    }

    Ok(())
}

fn default_number_output(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    input.with_file_name(format!("{stem}-numbered.pdf"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_default_number_output() {
        assert_eq!(
            default_number_output(Path::new("/tmp/report.pdf")),
            PathBuf::from("/tmp/report-numbered.pdf")
        );
        assert_eq!(
            default_number_output(Path::new("scan")),
            PathBuf::from("scan-numbered.pdf")
        );
    }

    #[test]
    fn test_merge_args_keep_input_order() {
        let args =
            Args::try_parse_from(["pdf-assemble", "merge", "b.pdf", "a.pdf", "-o", "out.pdf", "--number"])
                .unwrap();

        match args.command {
            Command::Merge {
                inputs,
                output,
                number,
            } => {
                assert_eq!(inputs, vec![PathBuf::from("b.pdf"), PathBuf::from("a.pdf")]);
                assert_eq!(output, PathBuf::from("out.pdf"));
                assert!(number);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_merge_requires_output() {
        assert!(Args::try_parse_from(["pdf-assemble", "merge", "a.pdf"]).is_err());
    }
}
