//! Core library for hybrid invoice field extraction.
//!
//! This crate provides:
//! - Source document loading and PDF page rasterization
//! - The OCR recognizer boundary and a spatial token index
//! - Header field, line item and totals extraction over tokens and text
//! - Reconciliation, confidence scoring and the text-only fallback

pub mod error;
pub mod invoice;
pub mod models;
pub mod ocr;
pub mod pdf;
pub mod pipeline;

pub use error::{HinvError, PipelineError, Result, Stage};
pub use invoice::{FieldCandidate, FieldKind, HybridInvoiceParser, InvoiceParser};
pub use models::config::HinvConfig;
pub use models::invoice::{ExtractedData, InvoiceRecord, LineItem, ProcessingInfo, Provenance, Totals};
pub use ocr::{BoundingBox, OcrPage, Recognizer, Token, TokenIndex};
#[cfg(feature = "native")]
pub use ocr::PureOcrEngine;
pub use pdf::{PdfRasterizer, Rasterizer, SourceDocument};
pub use pipeline::InvoiceProcessor;
