//! Core library for progressive multi-stage invoice extraction.
//!
//! This crate provides:
//! - Document text rendering (PDF via lopdf/pdf-extract, plain text)
//! - JSON recovery from free-form model answers
//! - Invoice number discovery with a regex fallback
//! - The staged extraction pipeline (identify, basic, detailed, line items)
//! - Completeness scoring of the results

pub mod document;
pub mod error;
pub mod extraction;
pub mod models;
pub mod pdf;
pub mod validation;

pub use document::{DocumentSource, FileDocumentSource, PdfTextSource, PlainTextSource};
pub use error::{DocumentError, InvexError, ParseError, PipelineError, Result, StageError};
pub use extraction::{
    CancelFlag, ExtractionPipeline, NoProgress, ProgressSink, find_candidate_keys, parse_response,
    progress_channel,
};
pub use models::{EntityRecord, InvexConfig, LineItem, NullPolicy, PipelineResult, RunMetadata};
pub use validation::{QualityBand, ValidationReport, ValidationWarning, Validator};

/// Re-export generation types.
pub use invex_llm::{FnBackend, GenerationBackend, GenerationError, ScriptedBackend};

#[cfg(feature = "ollama")]
pub use invex_llm::OllamaBackend;
