//! Multi-stage extraction pipeline.
//!
//! A run renders the document to text, identifies the invoices in it and
//! then walks every invoice through the basic, detailed and line item
//! stages, one generation call at a time. Stage failures degrade the
//! affected record; only document and internal failures end the run.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, info_span, warn};

use invex_llm::GenerationBackend;

use super::progress::{CancelFlag, ProgressSink};
use super::stages::StageRunner;
use crate::document::{DocumentSource, FileDocumentSource};
use crate::error::{DocumentError, InvexError, PipelineError};
use crate::models::config::{InvexConfig, PipelineConfig};
use crate::models::record::EntityRecord;
use crate::models::result::{
    EntityProgress, Extraction, FailedRun, IdentificationReport, PipelineResult, RunMetadata,
    Stage, StageReport,
};

/// Orchestrates the extraction stages for whole documents.
pub struct ExtractionPipeline<B: GenerationBackend> {
    backend: B,
    source: Box<dyn DocumentSource>,
    config: PipelineConfig,
    cancel: CancelFlag,
}

impl<B: GenerationBackend> ExtractionPipeline<B> {
    /// Create a pipeline reading files with the configured document settings.
    pub fn new(backend: B, config: &InvexConfig) -> Self {
        Self {
            backend,
            source: Box::new(FileDocumentSource::new(config.document.clone())),
            config: config.pipeline.clone(),
            cancel: CancelFlag::new(),
        }
    }

    /// Replace the document source.
    pub fn with_source(mut self, source: Box<dyn DocumentSource>) -> Self {
        self.source = source;
        self
    }

    /// Share a cancellation flag with the host.
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Handle that cancels runs of this pipeline.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Extract every invoice in the document at `path`.
    pub fn run(&self, path: &Path, progress: &dyn ProgressSink) -> PipelineResult {
        let started = Instant::now();
        let source = path.display().to_string();
        let metadata = RunMetadata::new(&source, self.backend.name());

        info!("Starting extraction of {}", source);
        progress.report("Converting PDF to text...");

        match self.source.render_text(path) {
            Ok(text) => self.process(text, metadata, started, progress),
            Err(e) => fail(e.into(), String::new(), metadata, started),
        }
    }

    /// Extract every invoice in already rendered text.
    pub fn run_text(&self, text: &str, source: &str, progress: &dyn ProgressSink) -> PipelineResult {
        let started = Instant::now();
        let metadata = RunMetadata::new(source, self.backend.name());
        self.process(text.to_string(), metadata, started, progress)
    }

    fn process(
        &self,
        text: String,
        mut metadata: RunMetadata,
        started: Instant,
        progress: &dyn ProgressSink,
    ) -> PipelineResult {
        if text.trim().is_empty() {
            warn!("No text in {}", metadata.source_file);
            let err = DocumentError::EmptyDocument(metadata.source_file.clone());
            return fail(err.into(), text, metadata, started);
        }

        metadata.document_length = text.chars().count();
        let mut invoices = Vec::new();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.extract(&text, &mut metadata, &mut invoices, progress)
        }))
        .unwrap_or_else(|payload| {
            Err(PipelineError::Internal {
                kind: "Panic".to_string(),
                message: panic_message(&*payload),
            }
            .into())
        });

        match outcome {
            Ok(()) => {
                finish(&mut metadata, started);
                info!(
                    "Extracted {} invoices in {} ms",
                    invoices.len(),
                    metadata.processing_time_ms.unwrap_or_default()
                );
                PipelineResult::Extracted(Extraction {
                    error: false,
                    invoices,
                    metadata,
                    raw_text: text,
                })
            }
            Err(e) => fail(e, text, metadata, started),
        }
    }

    fn extract(
        &self,
        text: &str,
        metadata: &mut RunMetadata,
        invoices: &mut Vec<EntityRecord>,
        progress: &dyn ProgressSink,
    ) -> Result<(), InvexError> {
        let runner = StageRunner::new(&self.backend, self.config.null_policy);

        if self.cancel.is_cancelled() {
            info!("Run cancelled before identification");
            metadata.cancelled = true;
            progress.report("Extraction cancelled");
            return Ok(());
        }

        progress.report("Step 1: Finding invoice numbers...");
        let clock = Instant::now();
        let found = runner.identify(text, &self.config.sentinel_key);
        let elapsed = elapsed_ms(clock);

        metadata.identification = Some(IdentificationReport {
            source: found.source,
            report: match &found.error {
                Some(e) => StageReport::failed(e.clone(), elapsed),
                None => StageReport::completed(elapsed),
            },
        });
        metadata.invoice_count = found.keys.len();
        metadata.invoice_numbers = found.keys.clone();

        info!("Found {} invoices ({:?})", found.keys.len(), found.source);
        progress.report(&format!(
            "Found {} invoice(s): {}",
            found.keys.len(),
            found.keys.join(", ")
        ));

        let total = found.keys.len();
        for (index, key) in found.keys.iter().enumerate() {
            let span = info_span!("invoice", key = %key);
            let _enter = span.enter();

            progress.report(&format!("Processing invoice {}/{}: {}", index + 1, total, key));

            let mut record = EntityRecord::for_key(key);
            let mut tracking = EntityProgress::new(key);

            for stage in Stage::ENTITY_STAGES {
                if self.cancel.is_cancelled() {
                    tracking.record(stage, StageReport::skipped());
                    continue;
                }

                progress.report(&format!("  - Extracting {} for {}", stage.label(), key));
                let clock = Instant::now();

                match runner.run(stage, text, key, &mut record) {
                    Ok(_) => {
                        tracking.record(stage, StageReport::completed(elapsed_ms(clock)));
                        progress.report(&format!("  - Completed {} for {}", stage.label(), key));
                    }
                    Err(e) if e.is_recoverable() => {
                        warn!("Stage {:?} failed for {}: {}", stage, key, e);
                        tracking.record(stage, StageReport::failed(e.to_string(), elapsed_ms(clock)));
                        progress.report(&format!("  - Failed {} for {}: {}", stage.label(), key, e));
                    }
                    Err(e) => {
                        invoices.push(record);
                        metadata.extraction_stages.push(tracking);
                        return Err(e.into());
                    }
                }
            }

            debug!("Invoice {} reached {:?}", key, tracking.state);
            invoices.push(record);
            metadata.extraction_stages.push(tracking);
        }

        if self.cancel.is_cancelled() {
            info!("Run cancelled");
            metadata.cancelled = true;
            progress.report("Extraction cancelled");
        } else {
            progress.report("Multi-stage extraction completed!");
        }
        Ok(())
    }
}

fn fail(error: InvexError, raw_text: String, mut metadata: RunMetadata, started: Instant) -> PipelineResult {
    warn!("Extraction of {} failed: {}", metadata.source_file, error);
    finish(&mut metadata, started);
    metadata.failed = true;

    PipelineResult::Failed(FailedRun {
        error: true,
        error_type: error.kind(),
        error_message: error.to_string(),
        raw_text,
        metadata,
    })
}

fn finish(metadata: &mut RunMetadata, started: Instant) {
    metadata.finished_at = Some(Utc::now());
    metadata.processing_time_ms = Some(elapsed_ms(started));
}

fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
