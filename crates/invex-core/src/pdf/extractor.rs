//! PDF text extraction using lopdf and pdf-extract.

use lopdf::Document;
use tracing::{debug, trace};

use super::{PdfProcessor, Result};
use crate::error::PdfError;

/// PDF text extractor using lopdf for structure and pdf-extract for text.
pub struct PdfExtractor {
    document: Option<Document>,
    raw_data: Vec<u8>,
}

/// Extracted text content of a PDF.
#[derive(Debug, Clone)]
pub struct PdfContent {
    /// Text of all pages joined with blank lines.
    pub text: String,
    /// Pages with their text.
    pub pages: Vec<PdfPage>,
}

/// Text of a single PDF page.
#[derive(Debug, Clone)]
pub struct PdfPage {
    /// Page number (1-indexed).
    pub number: u32,
    /// Extracted text from this page.
    pub text: String,
}

impl PdfExtractor {
    /// Create a new PDF extractor.
    pub fn new() -> Self {
        Self {
            document: None,
            raw_data: Vec::new(),
        }
    }

    /// Extract the text of every page.
    pub fn extract_all(&self) -> Result<PdfContent> {
        let page_count = self.page_count();
        if page_count == 0 {
            return Err(PdfError::NoPages);
        }

        let full_text = self.extract_text()?;
        let pages: Vec<PdfPage> = split_pages(&full_text, page_count)
            .into_iter()
            .zip(1..)
            .map(|(text, number)| PdfPage { number, text })
            .collect();

        let text = pages
            .iter()
            .map(|p| p.text.as_str())
            .filter(|t| !t.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");

        debug!("PDF text: {} pages, {} chars", page_count, text.len());

        Ok(PdfContent { text, pages })
    }
}

/// Split extracted text into `page_count` pages.
///
/// Form feeds are used as page breaks when they line up with the page
/// count; otherwise lines are divided evenly.
fn split_pages(full_text: &str, page_count: u32) -> Vec<String> {
    let page_count = page_count as usize;

    let by_feed: Vec<&str> = full_text.split('\x0c').collect();
    if by_feed.len() == page_count {
        return by_feed.into_iter().map(str::to_string).collect();
    }
    if by_feed.len() == page_count + 1 && by_feed.last().is_some_and(|t| t.trim().is_empty()) {
        return by_feed[..page_count].iter().map(|s| s.to_string()).collect();
    }

    trace!("No usable page breaks, dividing {} pages by line count", page_count);
    let lines: Vec<&str> = full_text.lines().collect();
    let lines_per_page = lines.len().div_ceil(page_count).max(1);

    (0..page_count)
        .map(|i| {
            let start = (i * lines_per_page).min(lines.len());
            let end = ((i + 1) * lines_per_page).min(lines.len());
            lines[start..end].join("\n")
        })
        .collect()
}

impl Default for PdfExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfProcessor for PdfExtractor {
    fn load(&mut self, data: &[u8]) -> Result<()> {
        let mut doc = Document::load_mem(data).map_err(|e| PdfError::Parse(e.to_string()))?;

        // Handle PDFs with empty password encryption
        if doc.is_encrypted() {
            if doc.decrypt("").is_err() {
                return Err(PdfError::Encrypted);
            }
            debug!("Decrypted PDF with empty password");

            // pdf-extract needs the decrypted bytes
            let mut decrypted_data = Vec::new();
            doc.save_to(&mut decrypted_data)
                .map_err(|e| PdfError::Parse(format!("Failed to save decrypted PDF: {}", e)))?;
            self.raw_data = decrypted_data;
        } else {
            self.raw_data = data.to_vec();
        }

        let page_count = doc.get_pages().len();
        if page_count == 0 {
            return Err(PdfError::NoPages);
        }

        debug!("Loaded PDF with {} pages", page_count);
        self.document = Some(doc);
        Ok(())
    }

    fn page_count(&self) -> u32 {
        self.document
            .as_ref()
            .map(|doc| doc.get_pages().len() as u32)
            .unwrap_or(0)
    }

    fn extract_text(&self) -> Result<String> {
        if self.document.is_none() {
            return Err(PdfError::Parse("No document loaded".to_string()));
        }
        pdf_extract::extract_text_from_mem(&self.raw_data)
            .map_err(|e| PdfError::TextExtraction(e.to_string()))
    }

    fn extract_page_text(&self, page: u32) -> Result<String> {
        let page_count = self.page_count();
        if page == 0 || page > page_count {
            return Err(PdfError::InvalidPage(page));
        }

        let full_text = self.extract_text()?;
        Ok(split_pages(&full_text, page_count)
            .into_iter()
            .nth((page - 1) as usize)
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pdf_extractor_new() {
        let extractor = PdfExtractor::new();
        assert!(extractor.document.is_none());
        assert_eq!(extractor.page_count(), 0);
    }

    #[test]
    fn test_load_rejects_garbage() {
        let mut extractor = PdfExtractor::new();
        assert!(matches!(
            extractor.load(b"not a pdf"),
            Err(PdfError::Parse(_))
        ));
    }

    #[test]
    fn test_extract_without_document() {
        let extractor = PdfExtractor::new();
        assert!(matches!(extractor.extract_all(), Err(PdfError::NoPages)));
        assert!(matches!(extractor.extract_page_text(1), Err(PdfError::InvalidPage(1))));
    }

    #[test]
    fn test_split_pages_on_form_feed() {
        let pages = split_pages("one\x0ctwo\x0c", 2);
        assert_eq!(pages, vec!["one".to_string(), "two".to_string()]);
    }

    #[test]
    fn test_split_pages_by_lines() {
        let pages = split_pages("a\nb\nc\nd\ne", 2);
        assert_eq!(pages, vec!["a\nb\nc".to_string(), "d\ne".to_string()]);
    }
}
