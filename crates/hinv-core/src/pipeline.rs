//! Document orchestrator: rasterize, recognize, index, extract, score.
//!
//! The hybrid path moves through [`Stage`]s in order. A failure at any stage
//! sends the document to fallback mode, which extracts from plain text only
//! and reports a fixed confidence.

use std::borrow::Cow;
use std::time::Instant;

use image::DynamicImage;
use tracing::{debug, info, warn};

use crate::error::{OcrError, PdfError, PipelineError, Stage};
use crate::invoice::{ConfidenceBreakdown, ExtractionResult, HybridInvoiceParser, InvoiceParser};
use crate::models::config::{FALLBACK_CONFIDENCE, HinvConfig};
use crate::models::invoice::{ExtractedData, InvoiceRecord, ProcessingInfo, Totals};
use crate::ocr::{OcrPage, Recognizer, TokenIndex};
use crate::pdf::{PdfExtractor, PdfRasterizer, Rasterizer, SourceDocument};

fn enter(stage: Stage) -> Stage {
    debug!(%stage, "pipeline stage");
    stage
}

/// Turns source documents into invoice records.
///
/// The processor holds no per-document state; one instance can serve many
/// documents, including concurrently from several threads.
pub struct InvoiceProcessor {
    config: HinvConfig,
    parser: HybridInvoiceParser,
    rasterizer: Box<dyn Rasterizer + Send + Sync>,
    recognizer: Option<Box<dyn Recognizer + Send + Sync>>,
}

impl InvoiceProcessor {
    /// Create a processor with the default PDF rasterizer and no recognizer.
    pub fn new(config: HinvConfig) -> Self {
        let rasterizer = PdfRasterizer::new(&config.pdf).with_max_image_size(config.ocr.max_image_size);
        Self {
            parser: HybridInvoiceParser::new().with_config(config.extraction.clone()),
            rasterizer: Box::new(rasterizer),
            recognizer: None,
            config,
        }
    }

    pub fn with_rasterizer(mut self, rasterizer: impl Rasterizer + Send + Sync + 'static) -> Self {
        self.rasterizer = Box::new(rasterizer);
        self
    }

    pub fn with_recognizer(mut self, recognizer: impl Recognizer + Send + Sync + 'static) -> Self {
        self.recognizer = Some(Box::new(recognizer));
        self
    }

    /// Load the native recognizer from model files in `model_dir`.
    #[cfg(feature = "native")]
    pub fn with_model_dir(self, model_dir: &std::path::Path) -> crate::Result<Self> {
        let engine =
            crate::ocr::PureOcrEngine::from_dir(model_dir, &self.config.models, self.config.ocr.clone())?;
        Ok(self.with_recognizer(engine))
    }

    pub fn config(&self) -> &HinvConfig {
        &self.config
    }

    pub fn has_recognizer(&self) -> bool {
        self.recognizer.is_some()
    }

    /// Process one document. Never fails: errors on the hybrid path produce
    /// a fallback record.
    pub fn process(&self, document: &SourceDocument, text: Option<&str>) -> InvoiceRecord {
        let start = Instant::now();
        let text = self.resolve_text(document, text);

        let mut record = match self.process_hybrid(document, &text) {
            Ok(record) => record,
            Err(e) => {
                warn!(stage = %e.stage, "Hybrid processing failed, using text fallback: {}", e);
                self.fallback(&text)
            }
        };

        let elapsed = start.elapsed().as_millis() as u64;
        record.processing_info.processing_time_ms = Some(elapsed);
        info!(
            "Processed document in {}ms (confidence {:.2}, hybrid {})",
            elapsed, record.confidence_score, record.processing_info.hybrid_processing
        );
        record
    }

    /// Caller text wins; otherwise the PDF text layer when enabled.
    fn resolve_text(&self, document: &SourceDocument, text: Option<&str>) -> String {
        if let Some(text) = text.filter(|t| !t.trim().is_empty()) {
            return text.to_string();
        }

        match document {
            SourceDocument::Pdf(bytes) if self.config.pdf.extract_embedded_text => {
                match PdfExtractor::load(bytes).and_then(|pdf| pdf.extract_text()) {
                    Ok(text) => {
                        debug!("Using embedded PDF text ({} chars)", text.len());
                        text
                    }
                    Err(e) => {
                        warn!("No embedded text available: {}", e);
                        String::new()
                    }
                }
            }
            _ => String::new(),
        }
    }

    fn page_images<'a>(
        &self,
        document: &'a SourceDocument,
    ) -> Result<Vec<Cow<'a, DynamicImage>>, PdfError> {
        let pages: Vec<Cow<'a, DynamicImage>> = match document {
            SourceDocument::Pdf(bytes) => self
                .rasterizer
                .rasterize(bytes)?
                .into_iter()
                .map(Cow::Owned)
                .collect(),
            SourceDocument::Images(images) => images.iter().map(Cow::Borrowed).collect(),
        };

        if pages.is_empty() {
            return Err(PdfError::NoPages);
        }

        let limit = match self.config.pdf.max_pages {
            0 => pages.len(),
            n => n,
        };
        Ok(pages.into_iter().take(limit).collect())
    }

    /// Run the hybrid path, reporting the stage at which it failed.
    pub fn process_hybrid(
        &self,
        document: &SourceDocument,
        text: &str,
    ) -> Result<InvoiceRecord, PipelineError> {
        let stage = enter(Stage::Start);
        let pages = self
            .page_images(document)
            .map_err(|e| PipelineError::new(stage, e))?;

        let stage = enter(Stage::Rasterized);
        let recognizer = self
            .recognizer
            .as_deref()
            .ok_or_else(|| PipelineError::new(stage, OcrError::NoRecognizer))?;
        let ocr_pages = pages
            .iter()
            .enumerate()
            .map(|(page, image)| recognizer.recognize(image, page))
            .collect::<Result<Vec<OcrPage>, OcrError>>()
            .map_err(|e| PipelineError::new(stage, e))?;

        enter(Stage::Recognized);
        let index = TokenIndex::build(&ocr_pages);

        enter(Stage::Indexed);
        let fields = self.parser.parse_fields(&index, text);

        enter(Stage::FieldsExtracted);
        let (line_items, totals) = self.parser.parse_amounts(&index, text);

        enter(Stage::ItemsExtracted);
        let text_available = !text.trim().is_empty();
        let ocr_confidence = index.mean_confidence();
        let confidence =
            ConfidenceBreakdown::new(&fields.to_array(), &line_items, ocr_confidence, text_available);

        enter(Stage::Scored);
        let field_sources = fields.sources();
        let result = ExtractionResult {
            fields,
            line_items,
            totals,
        };
        let record = InvoiceRecord {
            extracted_data: result.to_extracted_data(&self.config.extraction.currency),
            processing_info: ProcessingInfo {
                ocr_confidence,
                text_extraction_available: text_available,
                hybrid_processing: true,
                pages_processed: Some(ocr_pages.len()),
                fallback_mode: None,
                page_confidence: ocr_pages.iter().map(OcrPage::mean_confidence).collect(),
                processing_time_ms: None,
            },
            confidence_score: confidence.score(),
            field_sources,
        };

        enter(Stage::Done);
        Ok(record)
    }

    /// Text-only record with the fixed fallback confidence. Only the header
    /// fields are extracted; line items and totals stay empty.
    pub fn fallback(&self, text: &str) -> InvoiceRecord {
        let fields = self.parser.parse_text(text);
        InvoiceRecord {
            extracted_data: ExtractedData {
                supplier_name: fields.supplier.value.clone(),
                invoice_number: fields.invoice_number.value.clone(),
                invoice_date: fields.date.value.clone(),
                currency: self.config.extraction.currency.clone(),
                line_items: Vec::new(),
                totals: Totals::default(),
            },
            processing_info: ProcessingInfo {
                ocr_confidence: 0.0,
                text_extraction_available: !text.trim().is_empty(),
                hybrid_processing: false,
                pages_processed: None,
                fallback_mode: Some(true),
                page_confidence: Vec::new(),
                processing_time_ms: None,
            },
            confidence_score: FALLBACK_CONFIDENCE,
            field_sources: fields.sources(),
        }
    }
}

impl Default for InvoiceProcessor {
    fn default() -> Self {
        Self::new(HinvConfig::default())
    }
}
