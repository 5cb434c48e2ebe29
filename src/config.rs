//! Configuration types for the conversion client and the PDF engine.
//!
//! Network behaviour is controlled through [`ClientConfig`], built via its
//! [`ClientConfigBuilder`]. The pdfium binding is configured separately via
//! [`EngineConfig`] because it is a one-time, process-wide step that happens
//! before the first document is opened.

use crate::error::ConvertorError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default base URL of the conversion service.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:5000";

/// Configuration for talking to the conversion service.
///
/// Built via [`ClientConfig::builder()`] or using [`ClientConfig::default()`].
///
/// # Example
/// ```rust
/// use pdf_convertor::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .endpoint("https://convert.example.com")
///     .timeout_secs(90)
///     .build()
///     .unwrap();
/// assert_eq!(config.convert_url(), "https://convert.example.com/convert");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the conversion service, without a trailing slash.
    /// Default: [`DEFAULT_ENDPOINT`].
    pub endpoint: String,

    /// Wall-clock budget for one conversion request in seconds. Default: 60.
    ///
    /// When it elapses the in-flight request is dropped, which closes the
    /// connection, and the attempt resolves to a timeout error.
    pub timeout_secs: u64,

    /// Budget for fetching the output preview or downloading the artifact.
    /// Default: 30.
    pub preview_timeout_secs: u64,

    /// Upload limit enforced by the service, in megabytes. Default: 16.
    ///
    /// Only used to word the size-limit message; the service is the one
    /// that enforces it.
    pub max_upload_mb: u64,

    /// Horizontal padding subtracted from the container before computing
    /// fit-to-width, in pixels. Default: 40.
    pub fit_padding: f32,

    /// User-Agent header sent with every request.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: 60,
            preview_timeout_secs: 30,
            max_upload_mb: 16,
            fit_padding: 40.0,
            user_agent: concat!("pdf-convertor/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ClientConfig {
    /// Create a new builder for `ClientConfig`.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: Self::default(),
        }
    }

    /// Full URL of the conversion endpoint.
    pub fn convert_url(&self) -> String {
        format!("{}/convert", self.endpoint)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn preview_timeout(&self) -> Duration {
        Duration::from_secs(self.preview_timeout_secs)
    }

    /// Resolve a URL returned by the service against the endpoint.
    ///
    /// Absolute URLs are returned unchanged; paths such as `/download/x.docx`
    /// are joined onto the endpoint.
    pub fn resolve_url(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else if url.starts_with('/') {
            format!("{}{}", self.endpoint, url)
        } else {
            format!("{}/{}", self.endpoint, url)
        }
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout_secs = secs.max(1);
        self
    }

    pub fn preview_timeout_secs(mut self, secs: u64) -> Self {
        self.config.preview_timeout_secs = secs.max(1);
        self
    }

    pub fn max_upload_mb(mut self, mb: u64) -> Self {
        self.config.max_upload_mb = mb;
        self
    }

    pub fn fit_padding(mut self, px: f32) -> Self {
        self.config.fit_padding = px.max(0.0);
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config.user_agent = ua.into();
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ClientConfig, ConvertorError> {
        let c = &self.config;
        if !(c.endpoint.starts_with("http://") || c.endpoint.starts_with("https://")) {
            return Err(ConvertorError::InvalidConfig(format!(
                "endpoint must be an HTTP/HTTPS URL, got '{}'",
                c.endpoint
            )));
        }
        if c.max_upload_mb == 0 {
            return Err(ConvertorError::InvalidConfig(
                "max_upload_mb must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

/// How to locate the pdfium shared library.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Path to the pdfium library file, or to a directory containing it.
    /// `None` binds to the system library.
    pub library_path: Option<PathBuf>,
}

impl EngineConfig {
    /// Read `PDFIUM_LIB_PATH` if set.
    pub fn from_env() -> Self {
        Self {
            library_path: std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from),
        }
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Output format requested from the conversion service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    /// Word document, keeps text formatting.
    Docx,
    /// Tables only, as comma-separated values.
    Csv,
    /// Tables only, as an Excel workbook.
    Xlsx,
}

impl TargetFormat {
    pub const ALL: [TargetFormat; 3] = [TargetFormat::Docx, TargetFormat::Csv, TargetFormat::Xlsx];

    /// Identifier sent in the multipart `format` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetFormat::Docx => "docx",
            TargetFormat::Csv => "csv",
            TargetFormat::Xlsx => "xlsx",
        }
    }

    pub fn info(&self) -> FormatInfo {
        match self {
            TargetFormat::Docx => FormatInfo {
                label: "DOCX",
                name: "Word Document",
                description: "Best for text documents with formatting",
            },
            TargetFormat::Csv => FormatInfo {
                label: "CSV",
                name: "CSV Spreadsheet",
                description: "Simple tabular data format",
            },
            TargetFormat::Xlsx => FormatInfo {
                label: "XLSX",
                name: "Excel Spreadsheet",
                description: "Excel spreadsheet with multiple sheets",
            },
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetFormat {
    type Err = ConvertorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "docx" => Ok(TargetFormat::Docx),
            "csv" => Ok(TargetFormat::Csv),
            "xlsx" => Ok(TargetFormat::Xlsx),
            other => Err(ConvertorError::InvalidConfig(format!(
                "unknown format '{other}' (expected docx, csv or xlsx)"
            ))),
        }
    }
}

/// Display metadata for an output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatInfo {
    pub label: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

impl FormatInfo {
    /// Used when the service reports a format this client does not know.
    pub const FALLBACK: FormatInfo = FormatInfo {
        label: "DOCUMENT",
        name: "Document",
        description: "Converted document",
    };

    /// Look up display metadata for a format string as reported by the service.
    pub fn for_format(format: &str) -> FormatInfo {
        format
            .parse::<TargetFormat>()
            .map(|f| f.info())
            .unwrap_or(Self::FALLBACK)
    }
}
