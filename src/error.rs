//! Error types for the pdf-convertor library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ConvertorError`]: a local operation failed: the picked file is not a
//!   PDF, pdfium could not parse it, a page could not be rendered, the output
//!   preview could not be fetched, or the print surface could not be opened.
//!   Returned as `Err(ConvertorError)` from the operation that failed; the
//!   rest of the application state is untouched.
//!
//! * [`ConversionError`]: the classified outcome of one round-trip to the
//!   conversion service. It carries a [`ConversionErrorKind`] plus a message
//!   meant for the user, and [`ConversionError::hint`] suggests what to try
//!   next. It is stored in [`crate::session::Session`] until the next attempt.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from local operations (file selection, parsing, rendering,
/// preview fetch, printing).
#[derive(Debug, Error)]
pub enum ConvertorError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The selected file does not declare the PDF media type.
    #[error("'{name}' is not a PDF (declared type: {media_type})\nOnly PDF files can be converted.")]
    InvalidFileType { name: String, media_type: String },

    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Input file exists but may not be read.
    #[error("Permission denied reading '{path}'\nCheck the file's permissions.")]
    PermissionDenied { path: PathBuf },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// The PDF engine could not open the document.
    #[error("Could not parse '{name}': {detail}")]
    ParseFailed { name: String, detail: String },

    /// Requested page is outside the document.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    /// The engine returned an error for a specific page.
    #[error("Rendering failed for page {page}: {detail}")]
    RenderFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium (or pass --pdfium-lib) to point at an existing copy."
    )]
    EngineBindingFailed(String),

    // ── Output preview errors ─────────────────────────────────────────────
    /// The preview endpoint answered with a non-success status.
    #[error("Failed to fetch preview (Status: {status})")]
    PreviewFetch { status: u16 },

    /// The preview request never produced a response.
    #[error("Failed to fetch preview: {0}")]
    PreviewNetwork(String),

    /// The platform refused to open a print surface.
    #[error("Could not open a print window: {0}\nAllow pop-ups (or set a default browser) to print.")]
    PopupBlocked(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Downloading the converted artifact failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Class of a failed conversion attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConversionErrorKind {
    /// The service could not handle this input (e.g. no extractable tables).
    Validation,
    /// The upload exceeded the service's size limit (HTTP 413).
    SizeLimit,
    /// Any other non-success response.
    Server,
    /// The request budget elapsed or the request was cancelled.
    Timeout,
    /// No response was received at all.
    Network,
    /// A response arrived but its body was not the expected JSON.
    MalformedResponse,
}

impl fmt::Display for ConversionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Validation => "validation",
            Self::SizeLimit => "size-limit",
            Self::Server => "server",
            Self::Timeout => "timeout",
            Self::Network => "network",
            Self::MalformedResponse => "malformed-response",
        };
        f.write_str(s)
    }
}

/// The classified failure of one conversion attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
#[error("{message}")]
pub struct ConversionError {
    pub kind: ConversionErrorKind,
    pub message: String,
}

impl ConversionError {
    pub fn new(kind: ConversionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// What the user should try next.
    pub fn hint(&self) -> &'static str {
        match self.kind {
            ConversionErrorKind::Validation => {
                "This PDF doesn't contain extractable tables. Try converting to DOCX format instead."
            }
            ConversionErrorKind::SizeLimit => {
                "Try splitting your PDF into smaller files before uploading."
            }
            ConversionErrorKind::Timeout => "Try a smaller or less complex PDF file.",
            ConversionErrorKind::Network => {
                "Check your connection and that the conversion service is reachable."
            }
            ConversionErrorKind::MalformedResponse | ConversionErrorKind::Server => {
                "Please try again or choose a different format."
            }
        }
    }
}
