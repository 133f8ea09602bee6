//! Serve command - HTTP extraction service.

use std::io::Write;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, anyhow};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Args;
use serde::Serialize;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use hinv_core::{HinvError, InvoiceProcessor, InvoiceRecord, SourceDocument};

use super::{build_processor, load_config};

/// Multipart part names accepted for the document.
const DOCUMENT_FIELDS: &[&str] = &["pdf_file", "document", "file"];
const TEXT_FIELD: &str = "extracted_text";

/// Arguments for the serve command.
#[derive(Args)]
pub struct ServeArgs {
    /// Address to bind (host:port); defaults to the configured address
    #[arg(short, long, env = "HINV_BIND")]
    bind: Option<String>,

    /// Model directory
    #[arg(short, long)]
    model_dir: Option<PathBuf>,
}

#[derive(Clone)]
pub struct AppState {
    processor: Arc<InvoiceProcessor>,
    temp_dir: Option<PathBuf>,
}

impl AppState {
    pub fn new(processor: InvoiceProcessor, temp_dir: Option<PathBuf>) -> Self {
        Self {
            processor: Arc::new(processor),
            temp_dir,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct HealthBody {
    status: &'static str,
    service: &'static str,
}

type ApiError = (StatusCode, Json<ErrorBody>);

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/process-invoice", post(process_invoice))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run(args: ServeArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let bind = args.bind.unwrap_or_else(|| config.server.bind.clone());
    let addr: SocketAddr = bind
        .parse()
        .with_context(|| format!("invalid bind address {}", bind))?;

    let max_upload_bytes = config.server.max_upload_bytes;
    let temp_dir = config.server.temp_dir.clone();
    if let Some(dir) = &temp_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create temp dir {}", dir.display()))?;
    }

    let processor = build_processor(config, args.model_dir.as_deref());
    if !processor.has_recognizer() {
        warn!("Serving without OCR models; every request uses text fallback");
    }

    let app = router(AppState::new(processor, temp_dir), max_upload_bytes);

    println!("hinv listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server shutdown")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

async fn health() -> Json<HealthBody> {
    Json(HealthBody {
        status: "healthy",
        service: "hybrid-invoice-ocr",
    })
}

async fn process_invoice(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<InvoiceRecord>, ApiError> {
    let mut document = None;
    let mut text = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("Invalid multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if DOCUMENT_FIELDS.contains(&name.as_str()) && document.is_none() {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| bad_request(format!("Failed to read {}: {}", name, e)))?;
            document = Some(bytes);
        } else if name == TEXT_FIELD {
            let value = field
                .text()
                .await
                .map_err(|e| bad_request(format!("Failed to read {}: {}", name, e)))?;
            text = Some(value);
        }
    }

    let Some(bytes) = document else {
        return Err(bad_request("No PDF file provided"));
    };

    let processor = Arc::clone(&state.processor);
    let temp_dir = state.temp_dir.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        process_upload(&processor, temp_dir.as_deref(), &bytes, text.as_deref())
    })
    .await
    .map_err(|e| internal_error(anyhow!(e)))?;

    match outcome {
        Ok(record) => Ok(Json(record)),
        Err(HinvError::Input(message)) => Err(bad_request(message)),
        Err(e) => Err(internal_error(e.into())),
    }
}

/// Stage the upload in a temp file and process it. The file is removed when
/// it goes out of scope, whatever the outcome.
fn process_upload(
    processor: &InvoiceProcessor,
    temp_dir: Option<&Path>,
    bytes: &[u8],
    text: Option<&str>,
) -> Result<InvoiceRecord, HinvError> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("hinv-upload-");
    let mut upload = match temp_dir {
        Some(dir) => builder.tempfile_in(dir)?,
        None => builder.tempfile()?,
    };
    upload.write_all(bytes)?;
    upload.flush()?;

    let document = SourceDocument::from_path(upload.path())?;
    Ok(processor.process(&document, text))
}

fn bad_request(message: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
}

fn internal_error(err: anyhow::Error) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody {
            error: format!("Processing failed: {}", err),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use image::DynamicImage;
    use std::io::Cursor;
    use tower::ServiceExt;

    const BOUNDARY: &str = "hinv-test-boundary";

    fn png() -> Vec<u8> {
        let mut bytes = Vec::new();
        DynamicImage::new_rgb8(32, 32)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn multipart(parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, filename, content) in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match filename {
                Some(filename) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                        name, filename
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                ),
            }
            body.extend_from_slice(content);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn upload_request(body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/process-invoice")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn app(temp_dir: &Path) -> Router {
        let state = AppState::new(InvoiceProcessor::default(), Some(temp_dir.to_path_buf()));
        router(state, 1024 * 1024)
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(dir.path())
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], "hybrid-invoice-ocr");
    }

    #[tokio::test]
    async fn test_missing_file_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let body = multipart(&[("extracted_text", None, b"Factuurnummer: V000123".as_slice())]);
        let response = app(dir.path()).oneshot(upload_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "No PDF file provided");
    }

    #[tokio::test]
    async fn test_undecodable_document_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let body = multipart(&[("pdf_file", Some("invoice.pdf"), b"not a document".as_slice())]);
        let response = app(dir.path()).oneshot(upload_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_process_invoice_without_models_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let png = png();
        let body = multipart(&[
            ("pdf_file", Some("invoice.png"), png.as_slice()),
            (
                "extracted_text",
                None,
                b"FACTUUR\nAcme B.V.\nFactuurnummer: V000123\nDatum: 01-02-2024".as_slice(),
            ),
        ]);
        let response = app(dir.path()).oneshot(upload_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["extracted_data"]["invoice_number"], "V000123");
        assert_eq!(body["extracted_data"]["invoice_date"], "2024-02-01");
        assert_eq!(body["processing_info"]["fallback_mode"], true);
        assert_eq!(body["processing_info"]["hybrid_processing"], false);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
