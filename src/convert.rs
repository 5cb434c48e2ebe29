//! Conversion request pipeline.
//!
//! [`ConversionClient::convert`] uploads the selected PDF to the conversion
//! service as a multipart form (`file` + `format`) and classifies whatever
//! comes back into either a [`ConversionResult`] or a [`ConversionError`].
//!
//! ## Why classification is a free function
//!
//! [`classify_response`] takes a status code and the raw body and nothing
//! else. Every rule (413, table-extraction 500, missing fields…) can then be
//! unit-tested without a socket, and the HTTP layer only has to deal with
//! transport failures and the wall-clock budget.
//!
//! ## Cancellation
//!
//! The whole exchange runs under `tokio::time::timeout`. When the budget
//! elapses the request future is dropped, which closes the connection; the
//! service sees the client go away. [`ConversionClient::convert_cancellable`]
//! additionally accepts an [`AbortRegistration`] so a caller can cut the
//! request short the same way.

use crate::config::{ClientConfig, TargetFormat};
use crate::error::{ConversionError, ConversionErrorKind, ConvertorError};
use crate::output::ConversionResult;
use crate::progress::{NoopProgressCallback, ProgressCallback};
use crate::source::{SourceDocument, PDF_MEDIA_TYPE};
use futures::future::{AbortHandle, AbortRegistration, Abortable};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

static TABLE_EXTRACTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)table extraction failed").unwrap());

const MSG_TIMEOUT: &str = "Conversion timed out. The file may be too large or complex.";
const MSG_CANCELLED: &str = "Conversion cancelled.";
const MSG_MALFORMED: &str = "Server returned an invalid response. Please try again.";
const MSG_TABLES: &str = "Could not extract tables from this PDF. Try a different format or file.";
const MSG_SERVER: &str = "Server error occurred. Please try again later.";
const MSG_FAILED: &str = "Conversion failed. Please try again.";

/// Client for the conversion service.
#[derive(Clone)]
pub struct ConversionClient {
    http: reqwest::Client,
    config: ClientConfig,
    progress: ProgressCallback,
}

impl ConversionClient {
    pub fn new(config: ClientConfig) -> Result<Self, ConvertorError> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ConvertorError::InvalidConfig(format!("HTTP client: {e}")))?;
        Ok(Self {
            http,
            config,
            progress: Arc::new(NoopProgressCallback),
        })
    }

    /// Attach a progress callback.
    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Convert `source` to `format`.
    pub async fn convert(
        &self,
        source: &SourceDocument,
        format: TargetFormat,
    ) -> Result<ConversionResult, ConversionError> {
        // The handle is dropped here, so this registration never fires.
        let (_handle, registration) = AbortHandle::new_pair();
        self.convert_cancellable(source, format, registration).await
    }

    /// Like [`convert`](Self::convert), but aborted early when the
    /// [`AbortHandle`] paired with `registration` is triggered.
    pub async fn convert_cancellable(
        &self,
        source: &SourceDocument,
        format: TargetFormat,
        registration: AbortRegistration,
    ) -> Result<ConversionResult, ConversionError> {
        self.progress
            .on_upload_start(source.display_name(), source.bytes().len(), format);
        info!(
            "Converting '{}' ({} bytes) to {}",
            source.display_name(),
            source.bytes().len(),
            format
        );

        let outcome = self.exchange(source, format, registration).await;
        match &outcome {
            Ok(result) => {
                info!("Conversion succeeded: {}", result.filename);
                self.progress.on_conversion_complete(result);
            }
            Err(e) => {
                warn!("Conversion failed ({}): {}", e.kind, e.message);
                self.progress.on_conversion_error(e);
            }
        }
        outcome
    }

    async fn exchange(
        &self,
        source: &SourceDocument,
        format: TargetFormat,
        registration: AbortRegistration,
    ) -> Result<ConversionResult, ConversionError> {
        let form = build_form(source, format);
        let url = self.config.convert_url();
        debug!("POST {}", url);

        let request = async {
            let response = self.http.post(&url).multipart(form).send().await?;
            let status = response.status();
            let body = response.text().await?;
            Ok::<_, reqwest::Error>((status, body))
        };

        let budget = self.config.timeout();
        let (status, body) =
            match tokio::time::timeout(budget, Abortable::new(request, registration)).await {
                Err(_elapsed) => {
                    return Err(ConversionError::new(ConversionErrorKind::Timeout, MSG_TIMEOUT))
                }
                Ok(Err(_aborted)) => {
                    return Err(ConversionError::new(
                        ConversionErrorKind::Timeout,
                        MSG_CANCELLED,
                    ))
                }
                Ok(Ok(Err(e))) => return Err(transport_error(e)),
                Ok(Ok(Ok(pair))) => pair,
            };

        debug!("Service answered {} ({} bytes)", status, body.len());
        classify_response(status.as_u16(), &body, self.config.max_upload_mb)
    }

    /// Download the artifact of a successful conversion into `dir`.
    ///
    /// The whole fetch, body included, runs under the preview budget. Writes
    /// to a temporary name first and renames into place, so `dir` never holds
    /// a half-written file. Returns the final path.
    pub async fn download(
        &self,
        result: &ConversionResult,
        dir: impl AsRef<Path>,
    ) -> Result<PathBuf, ConvertorError> {
        let url = self.config.resolve_url(&result.download_url);
        let dir = dir.as_ref();
        info!("Downloading {}", url);

        let fetch = async {
            let response = self.http.get(&url).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Ok(Err(status));
            }
            let bytes = response.bytes().await?;
            Ok::<_, reqwest::Error>(Ok(bytes))
        };

        let outcome = tokio::time::timeout(self.config.preview_timeout(), fetch).await;
        let bytes = match outcome {
            Err(_elapsed) => {
                return Err(ConvertorError::DownloadFailed {
                    url,
                    reason: format!("timed out after {}s", self.config.preview_timeout_secs),
                })
            }
            Ok(Err(e)) => {
                return Err(ConvertorError::DownloadFailed {
                    url,
                    reason: e.to_string(),
                })
            }
            Ok(Ok(Err(status))) => {
                return Err(ConvertorError::DownloadFailed {
                    url,
                    reason: format!("HTTP {}", status),
                })
            }
            Ok(Ok(Ok(bytes))) => bytes,
        };

        let path = dir.join(artifact_name(result));
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| ConvertorError::OutputWriteFailed {
                path: dir.to_path_buf(),
                source: e,
            })?;

        let tmp_path = path.with_extension("part");
        tokio::fs::write(&tmp_path, &bytes)
            .await
            .map_err(|e| ConvertorError::OutputWriteFailed {
                path: path.clone(),
                source: e,
            })?;
        tokio::fs::rename(&tmp_path, &path)
            .await
            .map_err(|e| ConvertorError::OutputWriteFailed {
                path: path.clone(),
                source: e,
            })?;

        info!("Wrote {} ({} bytes)", path.display(), bytes.len());
        self.progress.on_download_complete(&path, bytes.len());
        Ok(path)
    }
}

fn build_form(source: &SourceDocument, format: TargetFormat) -> Form {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(PDF_MEDIA_TYPE));
    let part = Part::bytes(source.bytes().to_vec())
        .file_name(source.display_name().to_string())
        .headers(headers);
    Form::new()
        .part("file", part)
        .text("format", format.as_str())
}

fn transport_error(e: reqwest::Error) -> ConversionError {
    if e.is_timeout() {
        ConversionError::new(ConversionErrorKind::Timeout, MSG_TIMEOUT)
    } else {
        ConversionError::new(
            ConversionErrorKind::Network,
            format!("Could not reach the conversion service: {e}"),
        )
    }
}

/// Classify one response from the conversion service.
///
/// Rules apply in order: a body that is not JSON is malformed whatever the
/// status; then 413, 500 and other non-success statuses; then a 2xx body
/// must decode into a [`ConversionResult`].
pub fn classify_response(
    status: u16,
    body: &str,
    max_upload_mb: u64,
) -> Result<ConversionResult, ConversionError> {
    let json: Value = serde_json::from_str(body)
        .map_err(|_| ConversionError::new(ConversionErrorKind::MalformedResponse, MSG_MALFORMED))?;

    let service_error = json
        .get("error")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty());

    let status = StatusCode::from_u16(status)
        .map_err(|_| ConversionError::new(ConversionErrorKind::MalformedResponse, MSG_MALFORMED))?;

    if status == StatusCode::PAYLOAD_TOO_LARGE {
        return Err(ConversionError::new(
            ConversionErrorKind::SizeLimit,
            format!("File is too large. Maximum size is {max_upload_mb}MB."),
        ));
    }

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        return Err(match service_error {
            Some(msg) if TABLE_EXTRACTION.is_match(msg) => {
                ConversionError::new(ConversionErrorKind::Validation, MSG_TABLES)
            }
            Some(msg) => ConversionError::new(ConversionErrorKind::Server, msg),
            None => ConversionError::new(ConversionErrorKind::Server, MSG_SERVER),
        });
    }

    if !status.is_success() {
        return Err(ConversionError::new(
            ConversionErrorKind::Server,
            service_error.unwrap_or(MSG_FAILED),
        ));
    }

    serde_json::from_value(json)
        .map_err(|_| ConversionError::new(ConversionErrorKind::MalformedResponse, MSG_MALFORMED))
}

/// File name to store a downloaded artifact under.
///
/// Only the last path component of the service's suggestion is kept; an
/// empty suggestion falls back to `converted.<format>`.
fn artifact_name(result: &ConversionResult) -> String {
    let suggested = result
        .filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if suggested.is_empty() || suggested == "." || suggested == ".." {
        format!("converted.{}", result.format)
    } else {
        suggested.to_string()
    }
}
