//! Pipeline output and run metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::record::EntityRecord;

/// Name recorded as the extraction method of every run.
pub const EXTRACTION_METHOD: &str = "multi_stage_extractor";

/// Ordered extraction stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Identify,
    Basic,
    Detailed,
    LineItems,
}

impl Stage {
    /// The per-entity stages, in execution order.
    pub const ENTITY_STAGES: [Stage; 3] = [Stage::Basic, Stage::Detailed, Stage::LineItems];

    /// Human-readable label used in progress messages.
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Identify => "invoice identification",
            Stage::Basic => "basic data",
            Stage::Detailed => "detailed data",
            Stage::LineItems => "line items",
        }
    }
}

/// Outcome of one stage for one entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Not reached yet.
    #[default]
    Pending,
    Completed,
    /// Generation or parsing failed; the record kept its prior data.
    Failed,
    /// Not attempted because the run was cancelled.
    Skipped,
}

/// Furthest point an entity has been processed to.
///
/// A failed stage still advances the state: failure only means the stage
/// added no fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityState {
    #[default]
    Discovered,
    BasicDone,
    DetailedDone,
    LineItemsDone,
}

impl EntityState {
    /// State reached once `stage` has run.
    pub fn after(stage: Stage) -> Self {
        match stage {
            Stage::Identify => EntityState::Discovered,
            Stage::Basic => EntityState::BasicDone,
            Stage::Detailed => EntityState::DetailedDone,
            Stage::LineItems => EntityState::LineItemsDone,
        }
    }
}

/// Status and diagnostics of a single stage invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageReport {
    pub status: StageStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
}

impl StageReport {
    pub fn completed(elapsed_ms: u64) -> Self {
        Self {
            status: StageStatus::Completed,
            error: None,
            elapsed_ms: Some(elapsed_ms),
        }
    }

    pub fn failed(error: impl Into<String>, elapsed_ms: u64) -> Self {
        Self {
            status: StageStatus::Failed,
            error: Some(error.into()),
            elapsed_ms: Some(elapsed_ms),
        }
    }

    pub fn skipped() -> Self {
        Self {
            status: StageStatus::Skipped,
            ..Self::default()
        }
    }
}

/// Stage tracking for one entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityProgress {
    pub invoice_number: String,
    pub state: EntityState,
    pub basic: StageReport,
    pub detailed: StageReport,
    pub line_items: StageReport,
}

impl EntityProgress {
    pub fn new(key: &str) -> Self {
        Self {
            invoice_number: key.to_string(),
            ..Self::default()
        }
    }

    /// Report for an entity stage.
    pub fn report(&self, stage: Stage) -> Option<&StageReport> {
        match stage {
            Stage::Basic => Some(&self.basic),
            Stage::Detailed => Some(&self.detailed),
            Stage::LineItems => Some(&self.line_items),
            Stage::Identify => None,
        }
    }

    /// Record the outcome of an entity stage and advance the state.
    pub fn record(&mut self, stage: Stage, report: StageReport) {
        let advances = report.status != StageStatus::Skipped;
        match stage {
            Stage::Basic => self.basic = report,
            Stage::Detailed => self.detailed = report,
            Stage::LineItems => self.line_items = report,
            Stage::Identify => return,
        }
        if advances {
            self.state = self.state.max(EntityState::after(stage));
        }
    }

    /// Stages that failed for this entity.
    pub fn failed_stages(&self) -> Vec<Stage> {
        Stage::ENTITY_STAGES
            .into_iter()
            .filter(|s| self.report(*s).is_some_and(|r| r.status == StageStatus::Failed))
            .collect()
    }

    /// Whether every entity stage completed.
    pub fn is_complete(&self) -> bool {
        Stage::ENTITY_STAGES
            .into_iter()
            .all(|s| self.report(s).is_some_and(|r| r.status == StageStatus::Completed))
    }
}

/// Where the entity keys of a run came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeySource {
    #[default]
    Model,
    /// Label patterns matched directly in the document text.
    Regex,
    /// Nothing found; the whole document is one entity.
    Sentinel,
}

/// Outcome of the identification stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentificationReport {
    pub source: KeySource,
    pub report: StageReport,
}

/// Metadata describing one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub source_file: String,
    pub extraction_method: String,

    /// Model or backend that answered the prompts.
    #[serde(default)]
    pub backend: String,

    #[serde(default)]
    pub invoice_count: usize,

    /// Entity keys in discovery order.
    #[serde(default)]
    pub invoice_numbers: Vec<String>,

    #[serde(default)]
    pub document_length: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identification: Option<IdentificationReport>,

    /// Per-entity stage tracking, parallel to `invoice_numbers`.
    #[serde(default)]
    pub extraction_stages: Vec<EntityProgress>,

    pub started_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<u64>,

    #[serde(default)]
    pub cancelled: bool,

    /// Set on failed runs.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub failed: bool,
}

impl RunMetadata {
    pub fn new(source_file: impl Into<String>, backend: impl Into<String>) -> Self {
        Self {
            source_file: source_file.into(),
            extraction_method: EXTRACTION_METHOD.to_string(),
            backend: backend.into(),
            invoice_count: 0,
            invoice_numbers: Vec::new(),
            document_length: 0,
            identification: None,
            extraction_stages: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
            processing_time_ms: None,
            cancelled: false,
            failed: false,
        }
    }

    /// Stage tracking for an entity key.
    pub fn progress(&self, key: &str) -> Option<&EntityProgress> {
        self.extraction_stages.iter().find(|p| p.invoice_number == key)
    }

    /// Whether any stage of any entity failed.
    pub fn is_degraded(&self) -> bool {
        self.extraction_stages.iter().any(|p| !p.failed_stages().is_empty())
    }
}

/// A successful (possibly degraded) run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    /// Always false; mirrors [`FailedRun::error`] for consumers that
    /// branch on the flag.
    #[serde(default)]
    pub error: bool,

    /// One record per entity key, in discovery order.
    pub invoices: Vec<EntityRecord>,

    #[serde(rename = "_metadata")]
    pub metadata: RunMetadata,

    /// Document text the prompts were built from.
    pub raw_text: String,
}

/// A run that could not produce records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedRun {
    /// Always true.
    pub error: bool,
    pub error_type: String,
    pub error_message: String,

    /// Whatever text had been rendered before the failure.
    #[serde(default)]
    pub raw_text: String,

    #[serde(rename = "_metadata")]
    pub metadata: RunMetadata,
}

/// Top-level pipeline output: records or an error, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PipelineResult {
    Extracted(Extraction),
    Failed(FailedRun),
}

impl PipelineResult {
    pub fn is_error(&self) -> bool {
        matches!(self, PipelineResult::Failed(_))
    }

    pub fn metadata(&self) -> &RunMetadata {
        match self {
            PipelineResult::Extracted(e) => &e.metadata,
            PipelineResult::Failed(f) => &f.metadata,
        }
    }

    /// Extracted records; empty for failed runs.
    pub fn invoices(&self) -> &[EntityRecord] {
        match self {
            PipelineResult::Extracted(e) => &e.invoices,
            PipelineResult::Failed(_) => &[],
        }
    }

    pub fn raw_text(&self) -> &str {
        match self {
            PipelineResult::Extracted(e) => &e.raw_text,
            PipelineResult::Failed(f) => &f.raw_text,
        }
    }

    /// Error kind and message of a failed run.
    pub fn error(&self) -> Option<(&str, &str)> {
        match self {
            PipelineResult::Extracted(_) => None,
            PipelineResult::Failed(f) => Some((&f.error_type, &f.error_message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_progress_state_advances_on_failure() {
        let mut progress = EntityProgress::new("INV-1");
        progress.record(Stage::Basic, StageReport::completed(3));
        progress.record(Stage::Detailed, StageReport::failed("down", 1));

        assert_eq!(progress.state, EntityState::DetailedDone);
        assert_eq!(progress.failed_stages(), vec![Stage::Detailed]);
        assert!(!progress.is_complete());
    }

    #[test]
    fn test_skipped_stage_does_not_advance() {
        let mut progress = EntityProgress::new("INV-1");
        progress.record(Stage::Basic, StageReport::completed(0));
        progress.record(Stage::Detailed, StageReport::skipped());
        assert_eq!(progress.state, EntityState::BasicDone);
    }

    #[test]
    fn test_failed_run_serialization() {
        let mut metadata = RunMetadata::new("a.pdf", "scripted");
        metadata.failed = true;
        let result = PipelineResult::Failed(FailedRun {
            error: true,
            error_type: "EmptyDocument".to_string(),
            error_message: "no text".to_string(),
            raw_text: String::new(),
            metadata,
        });

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["error"], serde_json::json!(true));
        assert_eq!(json["error_type"], serde_json::json!("EmptyDocument"));
        assert_eq!(json["_metadata"]["failed"], serde_json::json!(true));
        assert!(json.get("invoices").is_none());

        let back: PipelineResult = serde_json::from_value(json).unwrap();
        assert!(back.is_error());
    }

    #[test]
    fn test_extraction_round_trips_as_extracted() {
        let result = PipelineResult::Extracted(Extraction {
            error: false,
            invoices: vec![EntityRecord::for_key("INV-1")],
            metadata: RunMetadata::new("a.txt", "scripted"),
            raw_text: "Invoice No: INV-1".to_string(),
        });

        let json = serde_json::to_string(&result).unwrap();
        let back: PipelineResult = serde_json::from_str(&json).unwrap();
        assert!(!back.is_error());
        assert_eq!(back.invoices().len(), 1);
    }
}
