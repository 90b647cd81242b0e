//! Text generation abstraction layer for invex.
//!
//! This crate provides a unified interface for calling a generative model
//! from the extraction pipeline:
//! - `ollama` backend talking to a local Ollama server over HTTP
//! - `scripted` backends that answer from a queue or a closure, used for
//!   tests and offline runs

mod backend;
mod error;

pub use backend::GenerationBackend;
pub use backend::scripted::{FnBackend, ScriptedBackend};
pub use error::GenerationError;

#[cfg(feature = "ollama")]
pub use backend::ollama::OllamaBackend;

/// Result type for generation operations.
pub type Result<T> = std::result::Result<T, GenerationError>;
