//! Process command - extract data from a single invoice file.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use hinv_core::{InvoiceRecord, SourceDocument};

use super::{build_processor, load_config};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input file (PDF or image)
    #[arg(required = true)]
    input: PathBuf,

    /// Plain text of the document, used alongside OCR
    #[arg(long, conflicts_with = "text_file")]
    text: Option<String>,

    /// Read the plain text from a file
    #[arg(long)]
    text_file: Option<PathBuf>,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,

    /// Model directory
    #[arg(short, long)]
    model_dir: Option<PathBuf>,

    /// Show extraction confidence scores
    #[arg(long)]
    show_confidence: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output
    Csv,
    /// Plain text summary
    Text,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Text => "txt",
        }
    }
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;

    let document = SourceDocument::from_path(&args.input)
        .with_context(|| format!("Cannot process {}", args.input.display()))?;

    let text = match (&args.text, &args.text_file) {
        (Some(text), _) => Some(text.clone()),
        (None, Some(path)) => Some(
            fs::read_to_string(path)
                .with_context(|| format!("Cannot read text file {}", path.display()))?,
        ),
        (None, None) => None,
    };

    info!("Processing file: {}", args.input.display());

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.set_message("Loading OCR models...");

    let processor = build_processor(config, args.model_dir.as_deref());

    pb.set_message("Extracting invoice data...");
    let record = processor.process(&document, text.as_deref());
    pb.finish_and_clear();

    let output = format_record(&record, args.format, args.pretty)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    if args.show_confidence {
        let info = &record.processing_info;
        eprintln!();
        eprintln!(
            "{} Extraction confidence: {:.1}%",
            style("ℹ").blue(),
            record.confidence_score * 100.0
        );
        eprintln!(
            "{} Mode: {}",
            style("ℹ").blue(),
            if info.hybrid_processing { "hybrid" } else { "text fallback" }
        );
        for (field, source) in &record.field_sources {
            eprintln!("    {:<16} {:?}", field, source);
        }
        if let Some(time_ms) = info.processing_time_ms {
            eprintln!("{} Processing time: {}ms", style("ℹ").blue(), time_ms);
        }
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

pub fn format_record(record: &InvoiceRecord, format: OutputFormat, pretty: bool) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json if pretty => Ok(serde_json::to_string_pretty(record)?),
        OutputFormat::Json => Ok(serde_json::to_string(record)?),
        OutputFormat::Csv => format_csv(record),
        OutputFormat::Text => Ok(format_text(record)),
    }
}

fn amount(value: Option<impl ToString>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// One row per line item; header-only documents get a single row.
fn format_csv(record: &InvoiceRecord) -> anyhow::Result<String> {
    let data = &record.extracted_data;
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "supplier_name",
        "invoice_number",
        "invoice_date",
        "currency",
        "item_description",
        "item_amount",
        "subtotal",
        "vat_amount",
        "total",
        "confidence",
    ])?;

    let subtotal = amount(data.totals.subtotal);
    let vat = amount(data.totals.vat_amount);
    let total = amount(data.totals.total);
    let confidence = format!("{:.2}", record.confidence_score);

    let items: Vec<(String, String)> = if data.line_items.is_empty() {
        vec![(String::new(), String::new())]
    } else {
        data.line_items
            .iter()
            .map(|item| (item.description.clone(), item.amount.to_string()))
            .collect()
    };

    for (description, item_amount) in &items {
        wtr.write_record([
            &data.supplier_name,
            &data.invoice_number,
            &data.invoice_date,
            &data.currency,
            description,
            item_amount,
            &subtotal,
            &vat,
            &total,
            &confidence,
        ])?;
    }

    Ok(String::from_utf8(wtr.into_inner()?)?)
}

fn format_text(record: &InvoiceRecord) -> String {
    let data = &record.extracted_data;
    let mut output = String::new();

    output.push_str(&format!("Supplier: {}\n", data.supplier_name));
    output.push_str(&format!("Invoice:  {}\n", data.invoice_number));
    output.push_str(&format!("Date:     {}\n", data.invoice_date));

    if !data.line_items.is_empty() {
        output.push_str("\nLine items:\n");
        for item in &data.line_items {
            output.push_str(&format!("  {:<40} {:>10} {}\n", item.description, item.amount, data.currency));
        }
    }

    if !data.totals.is_empty() {
        output.push_str("\nTotals:\n");
        if let Some(subtotal) = data.totals.subtotal {
            output.push_str(&format!("  Subtotal: {} {}\n", subtotal, data.currency));
        }
        if let Some(vat) = data.totals.vat_amount {
            output.push_str(&format!("  VAT:      {} {}\n", vat, data.currency));
        }
        if let Some(total) = data.totals.total {
            output.push_str(&format!("  Total:    {} {}\n", total, data.currency));
        }
    }

    output.push_str(&format!("\nConfidence: {:.2}\n", record.confidence_score));
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use hinv_core::{ExtractedData, ProcessingInfo};

    fn record() -> InvoiceRecord {
        InvoiceRecord {
            extracted_data: ExtractedData {
                supplier_name: "Acme B.V.".to_string(),
                invoice_number: "V000123".to_string(),
                invoice_date: "2024-02-01".to_string(),
                currency: "EUR".to_string(),
                ..Default::default()
            },
            processing_info: ProcessingInfo::default(),
            confidence_score: 0.3,
            field_sources: Default::default(),
        }
    }

    #[test]
    fn test_csv_without_items_has_one_row() {
        let csv = format_record(&record(), OutputFormat::Csv, false).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("Acme B.V.,V000123,2024-02-01,EUR"));
    }

    #[test]
    fn test_text_summary() {
        let text = format_record(&record(), OutputFormat::Text, false).unwrap();
        assert!(text.contains("Supplier: Acme B.V."));
        assert!(text.contains("Confidence: 0.30"));
        assert!(!text.contains("Totals:"));
    }
}
