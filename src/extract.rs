//! Text extraction for uploaded documents.
//!
//! PDFs are converted with poppler's `pdftotext`, which separates pages with form feeds; that
//! separator is what gives every chunk its page number. Plain-text formats are read as a single
//! page without a number.

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;
use tokio::process::Command;

const PAGE_SEPARATOR: char = '\u{000C}';
const PDF_MAGIC: &[u8] = b"%PDF-";

/// Errors raised while turning an uploaded file into text.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The file type is not one we can read.
    #[error("unsupported document type: {0}")]
    UnsupportedFormat(String),
    /// The external converter could not be started.
    #[error("failed to launch {tool}: {source}")]
    ToolUnavailable {
        /// Executable that failed to start.
        tool: String,
        /// Underlying spawn error.
        #[source]
        source: std::io::Error,
    },
    /// The external converter exited unsuccessfully.
    #[error("{tool} failed: {stderr}")]
    ToolFailed {
        /// Executable that failed.
        tool: String,
        /// Captured standard error.
        stderr: String,
    },
    /// Reading the transient file failed.
    #[error("failed to read document: {0}")]
    Io(#[from] std::io::Error),
}

/// Text of one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    /// 1-based page number, `None` for formats without pages.
    pub page_number: Option<u32>,
    /// Raw extracted text.
    pub text: String,
}

/// Kinds of documents the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// Portable Document Format.
    Pdf,
    /// UTF-8 text (`.txt`, `.md`).
    PlainText,
}

impl DocumentKind {
    /// Classify a document by extension, falling back to the PDF magic bytes.
    pub fn detect(filename: &str, head: &[u8]) -> Option<Self> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase);
        match extension.as_deref() {
            Some("pdf") => Some(Self::Pdf),
            Some("txt" | "text" | "md" | "markdown") => Some(Self::PlainText),
            _ if head.starts_with(PDF_MAGIC) => Some(Self::Pdf),
            _ => None,
        }
    }
}

/// Converts a stored document into page texts.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Extract the text of `path`, interpreted as `kind`.
    async fn extract(&self, path: &Path, kind: DocumentKind) -> Result<Vec<PageText>, ExtractionError>;
}

/// Default extractor: `pdftotext` for PDFs, direct reads for text files.
pub struct DocumentExtractor {
    pdftotext: String,
}

impl DocumentExtractor {
    /// Build an extractor invoking the given `pdftotext` executable.
    pub fn new(pdftotext: impl Into<String>) -> Self {
        Self {
            pdftotext: pdftotext.into(),
        }
    }

    async fn extract_pdf(&self, path: &Path) -> Result<Vec<PageText>, ExtractionError> {
        tracing::debug!(tool = %self.pdftotext, "Extracting PDF text");
        let output = Command::new(&self.pdftotext)
            .arg("-enc")
            .arg("UTF-8")
            .arg(path)
            .arg("-")
            .output()
            .await
            .map_err(|source| ExtractionError::ToolUnavailable {
                tool: self.pdftotext.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ExtractionError::ToolFailed {
                tool: self.pdftotext.clone(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(split_pages(&String::from_utf8_lossy(&output.stdout)))
    }
}

#[async_trait]
impl TextExtractor for DocumentExtractor {
    async fn extract(&self, path: &Path, kind: DocumentKind) -> Result<Vec<PageText>, ExtractionError> {
        match kind {
            DocumentKind::Pdf => self.extract_pdf(path).await,
            DocumentKind::PlainText => {
                let bytes = tokio::fs::read(path).await?;
                Ok(vec![PageText {
                    page_number: None,
                    text: String::from_utf8_lossy(&bytes).into_owned(),
                }])
            }
        }
    }
}

/// Split `pdftotext` output into numbered pages.
///
/// The converter terminates every page with a form feed, so the piece after the last separator
/// is empty and dropped. Blank pages keep their number but are skipped.
pub(crate) fn split_pages(output: &str) -> Vec<PageText> {
    output
        .split(PAGE_SEPARATOR)
        .enumerate()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(index, text)| PageText {
            page_number: u32::try_from(index + 1).ok(),
            text: text.to_string(),
        })
        .collect()
}
