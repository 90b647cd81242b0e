//! Data models for records, run results and configuration.

pub mod config;
pub mod record;
pub mod result;

pub use config::InvexConfig;
pub use record::{EntityRecord, LineItem, MergeOutcome, NullPolicy};
pub use result::{
    EntityProgress, EntityState, Extraction, FailedRun, IdentificationReport, KeySource,
    PipelineResult, RunMetadata, Stage, StageReport, StageStatus,
};
