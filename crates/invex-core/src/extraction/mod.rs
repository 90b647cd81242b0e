//! Staged extraction: response parsing, key discovery, stage functions
//! and the orchestrating pipeline.

pub mod fallback;
mod pipeline;
mod progress;
pub mod prompts;
pub mod response;
mod stages;

pub use fallback::find_candidate_keys;
pub use pipeline::ExtractionPipeline;
pub use progress::{CancelFlag, NoProgress, ProgressSink, progress_channel};
pub use response::{parse_array, parse_object, parse_response};
pub use stages::{Identification, StageRunner};
