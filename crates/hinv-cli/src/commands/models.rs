//! Models command - download and inspect OCR model files.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Subcommand};
use console::style;
use futures_util::StreamExt;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use hinv_core::models::config::ModelConfig;

use super::load_config;

/// Arguments for the models command.
#[derive(Args)]
pub struct ModelsArgs {
    #[command(subcommand)]
    command: ModelsCommand,
}

#[derive(Subcommand)]
enum ModelsCommand {
    /// List the model files the OCR engine needs
    List,

    /// Download model files
    Download(DownloadArgs),

    /// Check which model files are present
    Status(DirArgs),

    /// Print the default model directory
    Path,
}

#[derive(Args)]
struct DownloadArgs {
    /// Base URL the model files are served from
    #[arg(long, env = "HINV_MODEL_BASE_URL")]
    base_url: String,

    /// Output directory
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Force re-download even if files exist
    #[arg(long)]
    force: bool,
}

#[derive(Args)]
struct DirArgs {
    /// Model directory to check
    #[arg(short, long)]
    dir: Option<PathBuf>,
}

/// One file of the model set.
struct ModelFile {
    filename: String,
    description: &'static str,
    min_bytes: u64,
}

fn model_files(config: &ModelConfig) -> [ModelFile; 3] {
    [
        ModelFile {
            filename: config.detection_model.clone(),
            description: "Text detection (ONNX)",
            min_bytes: 1_000_000,
        },
        ModelFile {
            filename: config.recognition_model.clone(),
            description: "Text recognition (ONNX)",
            min_bytes: 1_000_000,
        },
        ModelFile {
            filename: config.dictionary.clone(),
            description: "Character dictionary",
            min_bytes: 100,
        },
    ]
}

/// Per-user model directory.
pub fn get_model_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("hinv")
        .join("models")
}

pub async fn run(args: ModelsArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    match args.command {
        ModelsCommand::List => list_models(&config.models),
        ModelsCommand::Download(download_args) => download_models(download_args, &config.models).await,
        ModelsCommand::Status(dir_args) => {
            check_status(&dir_args.dir.unwrap_or_else(get_model_dir), &config.models).map(|_| ())
        }
        ModelsCommand::Path => {
            println!("{}", get_model_dir().display());
            Ok(())
        }
    }
}

fn list_models(config: &ModelConfig) -> anyhow::Result<()> {
    println!("{}", style("OCR Model Files").bold());
    println!();

    for model in model_files(config) {
        println!("    {:<20} {}", model.filename, model.description);
    }

    println!();
    println!("Commands:");
    println!("  hinv models download --base-url <URL>   Download into {}", get_model_dir().display());
    println!("  hinv models status                      Check installed files");

    Ok(())
}

/// `base_url` joined with `filename`, with exactly one slash between them.
fn file_url(base_url: &str, filename: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), filename)
}

async fn download_models(args: DownloadArgs, config: &ModelConfig) -> anyhow::Result<()> {
    let output_dir = args.output.unwrap_or_else(get_model_dir);
    fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    println!(
        "{} Downloading models to {}",
        style("ℹ").blue(),
        output_dir.display()
    );
    println!();

    let client = reqwest::Client::builder()
        .user_agent(concat!("hinv/", env!("CARGO_PKG_VERSION")))
        .timeout(std::time::Duration::from_secs(300))
        .build()?;

    let multi_progress = MultiProgress::new();
    let style_template = ProgressStyle::default_bar()
        .template("  {spinner:.green} {msg:<30} [{bar:25.cyan/blue}] {bytes}/{total_bytes}")?
        .progress_chars("=>-");

    let mut success_count = 0;
    let mut skip_count = 0;
    let mut error_count = 0;

    for model in model_files(config) {
        let path = output_dir.join(&model.filename);

        if path.exists() && !args.force {
            let size = fs::metadata(&path)?.len();
            if size >= model.min_bytes {
                println!(
                    "  {} {} (already exists, {})",
                    style("✓").green(),
                    model.filename,
                    format_size(size)
                );
                skip_count += 1;
                continue;
            }
        }

        let pb = multi_progress.add(ProgressBar::new(0));
        pb.set_style(style_template.clone());
        pb.set_message(model.filename.clone());

        let url = file_url(&args.base_url, &model.filename);
        match download_file(&client, &url, &path, &pb).await {
            Ok(()) => {
                pb.finish_with_message(format!("{} {}", style("✓").green(), model.filename));
                success_count += 1;
            }
            Err(e) => {
                pb.finish_with_message(format!("{} {} - {}", style("✗").red(), model.filename, e));
                error_count += 1;
            }
        }
    }

    println!();

    if error_count == 0 {
        println!("{} Models ready", style("✓").green().bold());
        if skip_count > 0 {
            println!(
                "   {} downloaded, {} already present",
                success_count, skip_count
            );
        }
    } else {
        println!(
            "{} Download completed with errors",
            style("⚠").yellow().bold()
        );
        println!(
            "   {} downloaded, {} skipped, {} failed",
            success_count, skip_count, error_count
        );
    }

    println!();
    let ready = check_status(&output_dir, config)?;
    if !ready {
        anyhow::bail!("Model set in {} is incomplete", output_dir.display());
    }

    Ok(())
}

async fn download_file(
    client: &reqwest::Client,
    url: &str,
    path: &Path,
    pb: &ProgressBar,
) -> anyhow::Result<()> {
    let response = client.get(url).send().await?;

    if !response.status().is_success() {
        anyhow::bail!("HTTP {}", response.status());
    }

    if let Some(content_length) = response.content_length() {
        pb.set_length(content_length);
    }

    let temp_path = path.with_extension("tmp");
    let mut file = File::create(&temp_path)?;

    let mut stream = response.bytes_stream();
    let mut downloaded: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk)?;
        downloaded += chunk.len() as u64;
        pb.set_position(downloaded);
    }

    file.flush()?;
    drop(file);

    fs::rename(&temp_path, path)?;

    Ok(())
}

/// Print the state of each model file; returns whether the set is complete.
fn check_status(model_dir: &Path, config: &ModelConfig) -> anyhow::Result<bool> {
    println!("{}", style("Model Status").bold());
    println!("Directory: {}", model_dir.display());
    println!();

    let mut all_present = true;
    let mut total_size: u64 = 0;

    for model in model_files(config) {
        let path = model_dir.join(&model.filename);
        let (status, size_str) = if path.exists() {
            let size = fs::metadata(&path)?.len();
            total_size += size;
            if size >= model.min_bytes {
                (style("✓").green(), format_size(size))
            } else {
                all_present = false;
                (style("⚠").yellow(), format!("{} (incomplete?)", format_size(size)))
            }
        } else {
            all_present = false;
            (style("✗").red(), "missing".to_string())
        };

        println!("    {} {:<25} {:>10}", status, model.filename, size_str);
    }

    if all_present {
        println!(
            "    {} Ready ({} total)",
            style("✓").green(),
            format_size(total_size)
        );
    } else {
        println!(
            "    {} Run 'hinv models download --base-url <URL>' to download",
            style("⚠").yellow()
        );
    }

    Ok(all_present)
}

fn format_size(bytes: u64) -> String {
    if bytes >= 1_000_000_000 {
        format!("{:.1}GB", bytes as f64 / 1_000_000_000.0)
    } else if bytes >= 1_000_000 {
        format!("{:.1}MB", bytes as f64 / 1_000_000.0)
    } else if bytes >= 1_000 {
        format!("{:.1}KB", bytes as f64 / 1_000.0)
    } else {
        format!("{}B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_url_joins_with_one_slash() {
        assert_eq!(file_url("https://host/models/", "det.onnx"), "https://host/models/det.onnx");
        assert_eq!(file_url("https://host/models", "det.onnx"), "https://host/models/det.onnx");
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512B");
        assert_eq!(format_size(4_500_000), "4.5MB");
    }

    #[test]
    fn test_status_reports_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = ModelConfig::default();
        assert!(!check_status(dir.path(), &config).unwrap());

        fs::write(dir.path().join(&config.dictionary), vec![b'a'; 200]).unwrap();
        assert!(!check_status(dir.path(), &config).unwrap());
    }
}
