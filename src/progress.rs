//! Progress-callback trait for conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::convert::ConversionClient::with_progress`] to receive events while
//! a file is uploaded, converted and downloaded. The CLI uses it to drive a
//! spinner; a GUI would use it to show its loading indicator.
//!
//! # Example
//!
//! ```rust
//! use pdf_convertor::{ConversionProgressCallback, ConversionResult};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_conversion_complete(&self, result: &ConversionResult) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("converted → {}", result.filename);
//!     }
//! }
//!
//! let cb: Arc<dyn ConversionProgressCallback> =
//!     Arc::new(CountingCallback { completed: AtomicUsize::new(0) });
//! ```

use crate::config::TargetFormat;
use crate::error::ConversionError;
use crate::output::ConversionResult;
use std::path::Path;
use std::sync::Arc;

/// Called by the conversion client as an attempt progresses.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called just before the upload starts.
    ///
    /// # Arguments
    /// * `file_name`: display name of the uploaded PDF
    /// * `bytes`: upload size
    /// * `format`: requested output format
    fn on_upload_start(&self, file_name: &str, bytes: usize, format: TargetFormat) {
        let _ = (file_name, bytes, format);
    }

    /// Called once the service answered successfully.
    fn on_conversion_complete(&self, result: &ConversionResult) {
        let _ = result;
    }

    /// Called when the attempt failed, whatever the cause.
    fn on_conversion_error(&self, error: &ConversionError) {
        let _ = error;
    }

    /// Called after the converted artifact was written to disk.
    fn on_download_complete(&self, path: &Path, bytes: usize) {
        let _ = (path, bytes);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias for the type held by the client.
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
