//! Error types for the invex-core library.

use std::path::PathBuf;

use thiserror::Error;

pub use invex_llm::GenerationError;

/// Main error type for the invex library.
#[derive(Error, Debug)]
pub enum InvexError {
    /// Document text could not be produced.
    #[error("document error: {0}")]
    Document(#[from] DocumentError),

    /// Model output could not be turned into JSON.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Generation backend error.
    #[error("generation error: {0}")]
    Generation(#[from] GenerationError),

    /// Unclassified pipeline failure.
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl InvexError {
    /// Kind name reported as `error_type` in failed run results.
    pub fn kind(&self) -> String {
        match self {
            InvexError::Document(e) => e.kind().to_string(),
            InvexError::Parse(_) => "ParseError".to_string(),
            InvexError::Generation(_) => "GenerationError".to_string(),
            InvexError::Pipeline(PipelineError::Internal { kind, .. }) => kind.clone(),
            InvexError::Io(_) => "IoError".to_string(),
            InvexError::Config(_) => "ConfigError".to_string(),
        }
    }
}

/// Errors that make a run impossible. Always fatal.
#[derive(Error, Debug)]
pub enum DocumentError {
    /// The source path does not exist.
    #[error("document not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The source rendered to blank text.
    #[error("no text content extracted from {0}")]
    EmptyDocument(String),

    /// The source exists but could not be read.
    #[error("failed to read {}: {reason}", .path.display())]
    Unreadable { path: PathBuf, reason: String },

    /// No renderer handles this file type.
    #[error("unsupported document type: {0}")]
    Unsupported(String),

    /// PDF rendering failed.
    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),
}

impl DocumentError {
    /// Stable kind name reported in failed run results.
    pub fn kind(&self) -> &'static str {
        match self {
            DocumentError::NotFound(_) => "NotFound",
            DocumentError::EmptyDocument(_) => "EmptyDocument",
            DocumentError::Unreadable { .. } => "Unreadable",
            DocumentError::Unsupported(_) => "Unsupported",
            DocumentError::Pdf(_) => "PdfError",
        }
    }
}

/// Errors related to PDF processing.
#[derive(Error, Debug)]
pub enum PdfError {
    /// Failed to open/parse the PDF file.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// Failed to extract text from PDF.
    #[error("failed to extract text: {0}")]
    TextExtraction(String),

    /// The PDF is encrypted and cannot be processed.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF is empty or has no pages.
    #[error("PDF has no pages")]
    NoPages,

    /// Invalid page number requested.
    #[error("invalid page number: {0}")]
    InvalidPage(u32),
}

/// Errors turning raw model text into JSON.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// Nothing JSON-shaped in the text.
    #[error("no JSON found in response")]
    NoJsonFound,

    /// A JSON-shaped span was found but does not decode.
    #[error("malformed JSON: {reason}")]
    MalformedJson { reason: String },

    /// Valid JSON of the wrong kind for the caller.
    #[error("expected JSON {expected}, found {found}")]
    UnexpectedShape {
        expected: &'static str,
        found: &'static str,
    },
}

/// Failure of a single stage invocation.
///
/// Generation and parse failures degrade the stage; anything else is
/// fatal for the run.
#[derive(Error, Debug)]
pub enum StageError {
    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("{kind}: {message}")]
    Internal { kind: String, message: String },
}

impl StageError {
    /// Whether the stage may be recorded as failed and the run continued.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, StageError::Internal { .. })
    }
}

impl From<StageError> for InvexError {
    fn from(err: StageError) -> Self {
        match err {
            StageError::Generation(e) => InvexError::Generation(e),
            StageError::Parse(e) => InvexError::Parse(e),
            StageError::Internal { kind, message } => {
                InvexError::Pipeline(PipelineError::Internal { kind, message })
            }
        }
    }
}

/// Unclassified failures that abort a run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{kind}: {message}")]
    Internal { kind: String, message: String },
}

/// Result type for the invex library.
pub type Result<T> = std::result::Result<T, InvexError>;
