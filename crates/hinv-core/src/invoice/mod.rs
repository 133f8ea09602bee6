//! Invoice field extraction module.

mod candidate;
pub mod confidence;
mod parser;
pub mod reconcile;
pub mod rules;
pub mod table;
pub mod totals;

pub use candidate::{FieldCandidate, FieldKind};
pub use confidence::ConfidenceBreakdown;
pub use parser::{ExtractionResult, HeaderFields, HybridInvoiceParser, InvoiceParser};
pub use reconcile::reconcile;
pub use rules::{FieldExtractor, normalize_date};
