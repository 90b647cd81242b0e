//! Document text sources.
//!
//! A source turns a file into the text the prompts are built from. PDF
//! output is shaped as light markdown (page headers and separators) so the
//! model can tell pages apart.

use std::fs;
use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info};

use crate::error::DocumentError;
use crate::models::config::DocumentConfig;
use crate::pdf::{PdfExtractor, PdfProcessor};

lazy_static! {
    static ref BLANK_RUN: Regex = Regex::new(r"\n[ \t]*\n").unwrap();
    static ref EXCESS_BREAKS: Regex = Regex::new(r"\n{3,}").unwrap();
}

/// Result type for document operations.
pub type Result<T> = std::result::Result<T, DocumentError>;

/// Something that renders a document path to text.
pub trait DocumentSource: Send + Sync {
    /// Render the document at `path`. Blank output is an error.
    fn render_text(&self, path: &Path) -> Result<String>;
}

/// Source dispatching on file extension: PDFs through [`PdfTextSource`],
/// `.txt`/`.md` files read verbatim.
#[derive(Debug, Clone, Default)]
pub struct FileDocumentSource {
    pdf: PdfTextSource,
}

impl FileDocumentSource {
    pub fn new(config: DocumentConfig) -> Self {
        Self {
            pdf: PdfTextSource::new(config),
        }
    }
}

impl DocumentSource for FileDocumentSource {
    fn render_text(&self, path: &Path) -> Result<String> {
        if !path.exists() {
            return Err(DocumentError::NotFound(path.to_path_buf()));
        }

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match extension.as_str() {
            "pdf" => self.pdf.render_text(path),
            "txt" | "text" | "md" | "markdown" => PlainTextSource.render_text(path),
            other => Err(DocumentError::Unsupported(other.to_string())),
        }
    }
}

/// Reads UTF-8 text files as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextSource;

impl DocumentSource for PlainTextSource {
    fn render_text(&self, path: &Path) -> Result<String> {
        let text = fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => DocumentError::NotFound(path.to_path_buf()),
            _ => DocumentError::Unreadable {
                path: path.to_path_buf(),
                reason: e.to_string(),
            },
        })?;

        if text.trim().is_empty() {
            return Err(DocumentError::EmptyDocument(path.display().to_string()));
        }

        debug!("Read {} chars from {}", text.len(), path.display());
        Ok(text)
    }
}

/// Renders PDF text as page-delimited markdown.
#[derive(Debug, Clone, Default)]
pub struct PdfTextSource {
    config: DocumentConfig,
}

impl PdfTextSource {
    pub fn new(config: DocumentConfig) -> Self {
        Self { config }
    }

    /// Render already-loaded PDF bytes.
    pub fn render_bytes(&self, data: &[u8], label: &str) -> Result<String> {
        let mut extractor = PdfExtractor::new();
        extractor.load(data)?;

        let content = extractor.extract_all()?;
        let pages = content
            .pages
            .iter()
            .take(match self.config.max_pages {
                0 => usize::MAX,
                n => n,
            })
            .map(|p| (p.number, p.text.as_str()));

        let markdown = pages_to_markdown(pages, self.config.page_headers);
        if markdown.trim().is_empty() {
            return Err(DocumentError::EmptyDocument(label.to_string()));
        }

        info!("Rendered {} pages of {} to {} chars", content.pages.len(), label, markdown.len());
        Ok(markdown)
    }
}

impl DocumentSource for PdfTextSource {
    fn render_text(&self, path: &Path) -> Result<String> {
        let data = fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => DocumentError::NotFound(path.to_path_buf()),
            _ => DocumentError::Unreadable {
                path: path.to_path_buf(),
                reason: e.to_string(),
            },
        })?;
        self.render_bytes(&data, &path.display().to_string())
    }
}

/// Join page texts into markdown, dropping pages without text.
///
/// NUL characters are removed, whitespace-only lines collapse into a single
/// blank line, and pages are separated by `---`.
pub fn pages_to_markdown<'a>(
    pages: impl IntoIterator<Item = (u32, &'a str)>,
    page_headers: bool,
) -> String {
    let mut parts = Vec::new();

    for (number, text) in pages {
        let cleaned = text.replace('\0', "");
        if cleaned.trim().is_empty() {
            continue;
        }
        let cleaned = BLANK_RUN.replace_all(&cleaned, "\n\n");

        let mut part = String::new();
        if page_headers {
            part.push_str(&format!("# Page {}\n\n", number));
        }
        part.push_str(cleaned.trim());
        parts.push(part);
    }

    let joined = parts.join("\n\n---\n\n");
    EXCESS_BREAKS.replace_all(&joined, "\n\n").trim().to_string()
}
