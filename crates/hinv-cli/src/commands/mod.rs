//! Subcommand implementations.

pub mod batch;
pub mod config;
pub mod models;
pub mod process;
pub mod serve;

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{info, warn};

use hinv_core::{HinvConfig, InvoiceProcessor};

/// Load the config from `path`, else the default config file, else defaults.
pub fn load_config(path: Option<&str>) -> anyhow::Result<HinvConfig> {
    if let Some(path) = path {
        return HinvConfig::from_file(Path::new(path))
            .with_context(|| format!("Failed to load config from {}", path));
    }

    let default_path = config::default_config_path();
    if default_path.exists() {
        return HinvConfig::from_file(&default_path)
            .with_context(|| format!("Failed to load config from {}", default_path.display()));
    }

    Ok(HinvConfig::default())
}

/// First directory holding every model file: the explicit one, the configured
/// one, then the per-user data directory.
pub fn resolve_model_dir(config: &HinvConfig, explicit: Option<&Path>) -> Option<PathBuf> {
    let candidates = [
        explicit.map(Path::to_path_buf),
        Some(config.models.model_dir.clone()),
        Some(models::get_model_dir()),
    ];

    candidates
        .into_iter()
        .flatten()
        .find(|dir| config.models.available_in(dir))
}

/// Build a processor, attaching the native recognizer when models are present.
///
/// Missing or broken models are not an error: documents then go straight to
/// the text-only fallback.
pub fn build_processor(config: HinvConfig, model_dir: Option<&Path>) -> InvoiceProcessor {
    let Some(dir) = resolve_model_dir(&config, model_dir) else {
        warn!("OCR models not found; run 'hinv models download' to enable hybrid extraction");
        return InvoiceProcessor::new(config);
    };

    match InvoiceProcessor::new(config.clone()).with_model_dir(&dir) {
        Ok(processor) => {
            info!("Loaded OCR models from {}", dir.display());
            processor
        }
        Err(e) => {
            warn!("Failed to load OCR models from {}: {}", dir.display(), e);
            InvoiceProcessor::new(config)
        }
    }
}
