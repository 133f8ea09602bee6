//! Batch processing command for multiple invoice files.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Instant;

use anyhow::Context;
use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error, warn};

use hinv_core::{HinvConfig, InvoiceRecord, SourceDocument};

use super::process::{OutputFormat, format_record};
use super::{build_processor, load_config};

const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "png", "jpg", "jpeg", "tif", "tiff", "bmp", "webp"];

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Input glob pattern
    #[arg(required = true)]
    input: String,

    /// Output directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output format for each file
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Also generate a summary CSV
    #[arg(long)]
    summary: bool,

    /// Number of parallel workers
    #[arg(short = 'j', long, default_value = "4")]
    jobs: usize,

    /// Continue on error
    #[arg(long)]
    continue_on_error: bool,

    /// Use `<stem>.txt` next to each input as its plain text
    #[arg(long)]
    text_sidecar: bool,

    /// Model directory
    #[arg(short, long)]
    model_dir: Option<PathBuf>,
}

/// Result of processing a single file.
struct ProcessResult {
    path: PathBuf,
    record: Option<InvoiceRecord>,
    error: Option<String>,
    processing_time_ms: u64,
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;

    let files = matching_files(&args.input)?;
    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    println!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        files.len()
    );

    if let Some(ref output_dir) = args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")?
            .progress_chars("=>-"),
    );

    let results = process_all(&files, &args, &config, &pb);
    pb.finish_and_clear();

    if !args.continue_on_error {
        if let Some(failed) = results.iter().find(|r| r.error.is_some()) {
            anyhow::bail!(
                "Processing failed for {}: {}",
                failed.path.display(),
                failed.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    let successful: Vec<_> = results.iter().filter(|r| r.record.is_some()).collect();
    let failed: Vec<_> = results.iter().filter(|r| r.error.is_some()).collect();

    if let Some(output_dir) = &args.output_dir {
        for result in &successful {
            if let Some(record) = &result.record {
                let output_name = result.path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("invoice");
                let output_path = output_dir.join(format!("{}.{}", output_name, args.format.extension()));

                fs::write(&output_path, format_record(record, args.format, true)?)?;
                debug!("Wrote output to {}", output_path.display());
            }
        }
    }

    if args.summary {
        let summary_path = args.output_dir
            .as_ref()
            .map(|d| d.join("summary.csv"))
            .unwrap_or_else(|| PathBuf::from("summary.csv"));

        write_summary(&summary_path, &results)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    println!();
    println!(
        "{} Processed {} files in {:?}",
        style("✓").green(),
        results.len(),
        start.elapsed()
    );
    println!(
        "   {} successful, {} failed",
        style(successful.len()).green(),
        style(failed.len()).red()
    );

    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed files:").red());
        for result in &failed {
            println!(
                "  - {}: {}",
                result.path.display(),
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    Ok(())
}

/// Supported documents matching `pattern`, in path order.
fn matching_files(pattern: &str) -> anyhow::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = glob(pattern)
        .with_context(|| format!("Invalid glob pattern: {}", pattern))?
        .filter_map(|r| r.ok())
        .filter(|p| {
            let ext = p.extension().and_then(|e| e.to_str()).unwrap_or("");
            SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str())
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Run `jobs` workers, each with its own processor, over a shared queue.
///
/// Without `--continue-on-error` the workers stop picking up new files after
/// the first failure.
fn process_all(files: &[PathBuf], args: &BatchArgs, config: &HinvConfig, pb: &ProgressBar) -> Vec<ProcessResult> {
    let next = AtomicUsize::new(0);
    let abort = AtomicBool::new(false);
    let workers = args.jobs.clamp(1, files.len().max(1));
    let (tx, rx) = mpsc::channel::<(usize, ProcessResult)>();

    thread::scope(|scope| {
        for worker in 0..workers {
            let tx = tx.clone();
            let (next, abort) = (&next, &abort);
            scope.spawn(move || {
                let processor = build_processor(config.clone(), args.model_dir.as_deref());
                debug!("Worker {} ready", worker);

                loop {
                    if abort.load(Ordering::Relaxed) {
                        break;
                    }
                    let i = next.fetch_add(1, Ordering::Relaxed);
                    let Some(path) = files.get(i) else {
                        break;
                    };

                    let file_start = Instant::now();
                    let outcome = load_input(path, args.text_sidecar)
                        .map(|(document, text)| processor.process(&document, text.as_deref()));
                    let processing_time_ms = file_start.elapsed().as_millis() as u64;

                    let result = match outcome {
                        Ok(record) => ProcessResult {
                            path: path.clone(),
                            record: Some(record),
                            error: None,
                            processing_time_ms,
                        },
                        Err(e) => {
                            if args.continue_on_error {
                                warn!("Failed to process {}: {:#}", path.display(), e);
                            } else {
                                error!("Failed to process {}: {:#}", path.display(), e);
                                abort.store(true, Ordering::Relaxed);
                            }
                            ProcessResult {
                                path: path.clone(),
                                record: None,
                                error: Some(format!("{:#}", e)),
                                processing_time_ms,
                            }
                        }
                    };

                    pb.inc(1);
                    if tx.send((i, result)).is_err() {
                        break;
                    }
                }
            });
        }
    });
    drop(tx);

    let mut results: Vec<(usize, ProcessResult)> = rx.into_iter().collect();
    results.sort_by_key(|(i, _)| *i);
    results.into_iter().map(|(_, r)| r).collect()
}

/// The document and, with sidecars enabled, the text in `<stem>.txt` beside it.
fn load_input(path: &Path, text_sidecar: bool) -> anyhow::Result<(SourceDocument, Option<String>)> {
    let document = SourceDocument::from_path(path)?;

    let sidecar = path.with_extension("txt");
    let text = if text_sidecar && sidecar.is_file() {
        debug!("Using text sidecar {}", sidecar.display());
        Some(
            fs::read_to_string(&sidecar)
                .with_context(|| format!("Cannot read text sidecar {}", sidecar.display()))?,
        )
    } else {
        None
    };

    Ok((document, text))
}

fn write_summary(path: &Path, results: &[ProcessResult]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "filename",
        "status",
        "supplier_name",
        "invoice_number",
        "invoice_date",
        "line_items",
        "total",
        "currency",
        "confidence",
        "mode",
        "processing_time_ms",
        "error",
    ])?;

    for result in results {
        let filename = result.path.file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("");

        if let Some(record) = &result.record {
            let data = &record.extracted_data;
            let mode = if record.processing_info.hybrid_processing { "hybrid" } else { "fallback" };
            wtr.write_record([
                filename,
                "success",
                &data.supplier_name,
                &data.invoice_number,
                &data.invoice_date,
                &data.line_items.len().to_string(),
                &data.totals.total.map(|t| t.to_string()).unwrap_or_default(),
                &data.currency,
                &format!("{:.2}", record.confidence_score),
                mode,
                &result.processing_time_ms.to_string(),
                "",
            ])?;
        } else {
            wtr.write_record([
                filename,
                "error",
                "",
                "",
                "",
                "",
                "",
                "",
                "",
                "",
                &result.processing_time_ms.to_string(),
                result.error.as_deref().unwrap_or(""),
            ])?;
        }
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matching_files_filters_extensions() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.pdf", "a.PNG", "notes.txt", "c.jpg"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        let pattern = format!("{}/*", dir.path().display());
        let names: Vec<String> = matching_files(&pattern)
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.PNG", "b.pdf", "c.jpg"]);
    }

    #[test]
    fn test_sidecar_text_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("invoice.pdf");
        fs::write(&pdf, b"%PDF-1.4\n").unwrap();
        fs::write(dir.path().join("invoice.txt"), "Factuurnummer: V000123").unwrap();

        let (document, text) = load_input(&pdf, true).unwrap();
        assert!(document.is_pdf());
        assert_eq!(text.as_deref(), Some("Factuurnummer: V000123"));

        let (_, text) = load_input(&pdf, false).unwrap();
        assert!(text.is_none());
    }
}
