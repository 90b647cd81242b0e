//! Backends that answer without a model server.

use std::collections::VecDeque;
use std::sync::Mutex;

use tracing::trace;

use crate::error::GenerationError;
use crate::{GenerationBackend, Result};

/// Backend replaying a fixed queue of answers, one per call.
///
/// Once the queue is exhausted every call fails with
/// [`GenerationError::EmptyResponse`]. All prompts are recorded so callers
/// can inspect what was asked.
pub struct ScriptedBackend {
    name: String,
    answers: Mutex<VecDeque<Result<String>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    /// Create an empty script.
    pub fn new() -> Self {
        Self {
            name: "scripted".to_string(),
            answers: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful answer.
    pub fn then_answer(self, answer: impl Into<String>) -> Self {
        self.push(Ok(answer.into()));
        self
    }

    /// Queue a failure.
    pub fn then_fail(self, error: GenerationError) -> Self {
        self.push(Err(error));
        self
    }

    /// Override the name recorded in run metadata.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    /// Number of queued answers not yet consumed.
    pub fn remaining(&self) -> usize {
        self.answers.lock().map(|a| a.len()).unwrap_or(0)
    }

    fn push(&self, answer: Result<String>) {
        if let Ok(mut answers) = self.answers.lock() {
            answers.push_back(answer);
        }
    }
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl GenerationBackend for ScriptedBackend {
    fn generate(&self, prompt: &str) -> Result<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }

        let next = self
            .answers
            .lock()
            .ok()
            .and_then(|mut answers| answers.pop_front());

        trace!("Scripted backend call, answer queued: {}", next.is_some());

        match next {
            Some(Ok(answer)) if answer.trim().is_empty() => Err(GenerationError::EmptyResponse),
            Some(answer) => answer,
            None => Err(GenerationError::EmptyResponse),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Backend delegating each prompt to a closure.
pub struct FnBackend<F> {
    name: String,
    respond: F,
}

impl<F> FnBackend<F>
where
    F: Fn(&str) -> Result<String> + Send + Sync,
{
    pub fn new(name: impl Into<String>, respond: F) -> Self {
        Self {
            name: name.into(),
            respond,
        }
    }
}

impl<F> GenerationBackend for FnBackend<F>
where
    F: Fn(&str) -> Result<String> + Send + Sync,
{
    fn generate(&self, prompt: &str) -> Result<String> {
        (self.respond)(prompt)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
