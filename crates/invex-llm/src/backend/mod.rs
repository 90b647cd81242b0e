//! Generation backend implementations.

#[cfg(feature = "ollama")]
pub mod ollama;

pub mod scripted;

use std::sync::Arc;

use crate::Result;

/// Trait for text generation backends.
///
/// The pipeline holds exactly one backend and never issues two calls at
/// once, but backends must still be shareable so a host can run the
/// pipeline on a worker thread.
pub trait GenerationBackend: Send + Sync {
    /// Generate a completion for the given prompt.
    ///
    /// # Arguments
    /// * `prompt` - Full prompt text
    ///
    /// # Returns
    /// The raw model answer. Blank answers are reported as
    /// [`GenerationError::EmptyResponse`](crate::GenerationError::EmptyResponse).
    fn generate(&self, prompt: &str) -> Result<String>;

    /// Identifier of the model or backend, recorded in run metadata.
    fn name(&self) -> &str;
}

impl<T: GenerationBackend + ?Sized> GenerationBackend for Arc<T> {
    fn generate(&self, prompt: &str) -> Result<String> {
        (**self).generate(prompt)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<T: GenerationBackend + ?Sized> GenerationBackend for Box<T> {
    fn generate(&self, prompt: &str) -> Result<String> {
        (**self).generate(prompt)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
