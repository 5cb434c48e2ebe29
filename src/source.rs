//! Document source: accept a picked or dropped file and hold its bytes.
//!
//! A selected PDF is kept in memory and also exposed through a
//! [`LocalReference`]: a temp file that downstream consumers (an external
//! viewer, the pdfium engine when it needs a path) can address by URI without
//! the bytes ever being copied to persistent storage. A reference is released
//! exactly once: when a newer selection replaces it, on [`DocumentSource::clear`],
//! or when the owning [`DocumentSource`] is dropped.

use crate::error::ConvertorError;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempPath;
use tracing::{debug, info};

/// The only media type accepted for conversion.
pub const PDF_MEDIA_TYPE: &str = "application/pdf";

/// A file handed to the application by the picker or a drop target.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub name: String,
    /// Declared media type, if the source supplied one.
    pub media_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, media_type: Option<&str>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.map(str::to_string),
            bytes,
        }
    }

    /// Read a file from disk, declaring `application/pdf` only when the name
    /// ends in `.pdf` and the content starts with the `%PDF` magic bytes.
    pub fn from_path(path: &Path) -> Result<Self, ConvertorError> {
        let bytes = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ConvertorError::FileNotFound {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::PermissionDenied => ConvertorError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => ConvertorError::Internal(format!("reading {}: {e}", path.display())),
        })?;

        let pdf_extension = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        let media_type = if pdf_extension && bytes.starts_with(b"%PDF") {
            PDF_MEDIA_TYPE
        } else {
            "application/octet-stream"
        };
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.pdf".to_string());

        Ok(Self::new(name, Some(media_type), bytes))
    }

    fn is_pdf(&self) -> bool {
        self.media_type
            .as_deref()
            .map(|t| t.eq_ignore_ascii_case(PDF_MEDIA_TYPE))
            .unwrap_or(false)
    }
}

/// A revocable, URI-addressable handle onto in-memory file bytes.
///
/// Dropping the reference revokes it: the backing temp file is deleted and
/// the owning source's live-reference count goes down by one.
#[derive(Debug)]
pub struct LocalReference {
    path: TempPath,
    live: Arc<AtomicUsize>,
}

impl LocalReference {
    fn create(bytes: &[u8], live: Arc<AtomicUsize>) -> Result<Self, ConvertorError> {
        let mut tmp = tempfile::Builder::new()
            .prefix("pdfconv-")
            .suffix(".pdf")
            .tempfile()
            .map_err(|e| ConvertorError::Internal(format!("tempfile: {e}")))?;
        tmp.write_all(bytes)
            .map_err(|e| ConvertorError::Internal(format!("tempfile write: {e}")))?;
        live.fetch_add(1, Ordering::SeqCst);
        Ok(Self {
            path: tmp.into_temp_path(),
            live,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Percent-encoded `file://` URI of the backing file.
    pub fn uri(&self) -> String {
        file_uri(&self.path)
    }

    /// Release the reference now instead of waiting for drop.
    pub fn revoke(self) {
        drop(self);
    }
}

fn file_uri(path: &Path) -> String {
    // Temp paths are absolute, so `from_file_path` only fails on exotic input.
    reqwest::Url::from_file_path(path)
        .map(String::from)
        .unwrap_or_else(|()| format!("file://{}", path.display()))
}

impl Drop for LocalReference {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
        debug!("Revoked local reference {}", self.path.display());
    }
}

/// A PDF the user has selected for preview and conversion.
#[derive(Debug)]
pub struct SourceDocument {
    raw_bytes: Arc<Vec<u8>>,
    display_name: String,
    local_reference: LocalReference,
}

impl SourceDocument {
    pub fn bytes(&self) -> &[u8] {
        &self.raw_bytes
    }

    /// Shared handle to the bytes, for consumers that outlive a borrow
    /// (e.g. a render running on a blocking thread).
    pub fn shared_bytes(&self) -> Arc<Vec<u8>> {
        Arc::clone(&self.raw_bytes)
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn local_reference(&self) -> &LocalReference {
        &self.local_reference
    }

    pub fn local_path(&self) -> PathBuf {
        self.local_reference.path().to_path_buf()
    }
}

/// Owns the current selection and its local reference.
#[derive(Debug, Default)]
pub struct DocumentSource {
    current: Option<SourceDocument>,
    live: Arc<AtomicUsize>,
}

impl DocumentSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept a new file, replacing (and revoking) any previous selection.
    ///
    /// A rejected file leaves the current selection untouched.
    pub fn select(&mut self, file: SelectedFile) -> Result<&SourceDocument, ConvertorError> {
        if !file.is_pdf() {
            return Err(ConvertorError::InvalidFileType {
                media_type: file.media_type.unwrap_or_else(|| "unknown".to_string()),
                name: file.name,
            });
        }

        // Revoke before creating so at most one reference is ever live.
        if let Some(prev) = self.current.take() {
            debug!("Replacing selection '{}'", prev.display_name);
            drop(prev);
        }

        let local_reference = LocalReference::create(&file.bytes, Arc::clone(&self.live))?;
        info!(
            "Selected '{}' ({} bytes) → {}",
            file.name,
            file.bytes.len(),
            local_reference.uri()
        );

        Ok(self.current.insert(SourceDocument {
            raw_bytes: Arc::new(file.bytes),
            display_name: file.name,
            local_reference,
        }))
    }

    /// Revoke the current reference and reset to empty.
    pub fn clear(&mut self) {
        if let Some(doc) = self.current.take() {
            debug!("Cleared selection '{}'", doc.display_name);
        }
    }

    pub fn current(&self) -> Option<&SourceDocument> {
        self.current.as_ref()
    }

    /// Number of local references created by this source that are still live.
    pub fn active_references(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pdf(name: &str) -> SelectedFile {
        SelectedFile::new(name, Some(PDF_MEDIA_TYPE), b"%PDF-1.7\n%%EOF\n".to_vec())
    }

    #[test]
    fn rejects_non_pdf_media_type() {
        let mut source = DocumentSource::new();
        let err = source
            .select(SelectedFile::new("a.png", Some("image/png"), vec![1, 2, 3]))
            .unwrap_err();
        assert!(matches!(err, ConvertorError::InvalidFileType { .. }));
        assert!(source.current().is_none());
        assert_eq!(source.active_references(), 0);
    }

    #[test]
    fn rejects_missing_media_type() {
        let mut source = DocumentSource::new();
        assert!(source.select(SelectedFile::new("a", None, vec![])).is_err());
    }

    #[test]
    fn replacement_keeps_exactly_one_reference() {
        let mut source = DocumentSource::new();
        let first_path = source.select(pdf("one.pdf")).unwrap().local_path();
        assert!(first_path.exists());
        assert_eq!(source.active_references(), 1);

        let second_path = source.select(pdf("two.pdf")).unwrap().local_path();
        assert_eq!(source.active_references(), 1);
        assert!(!first_path.exists(), "superseded reference must be revoked");
        assert!(second_path.exists());
        assert_eq!(source.current().unwrap().display_name(), "two.pdf");
    }

    #[test]
    fn rejected_file_keeps_previous_selection() {
        let mut source = DocumentSource::new();
        source.select(pdf("keep.pdf")).unwrap();
        let _ = source.select(SelectedFile::new("x.txt", Some("text/plain"), vec![]));
        assert_eq!(source.current().unwrap().display_name(), "keep.pdf");
        assert_eq!(source.active_references(), 1);
    }

    #[test]
    fn clear_and_drop_release_reference() {
        let mut source = DocumentSource::new();
        let path = source.select(pdf("a.pdf")).unwrap().local_path();
        source.clear();
        assert_eq!(source.active_references(), 0);
        assert!(!path.exists());

        let path = source.select(pdf("b.pdf")).unwrap().local_path();
        drop(source);
        assert!(!path.exists());
    }

    #[test]
    fn uri_points_at_backing_file() {
        let mut source = DocumentSource::new();
        let doc = source.select(pdf("a.pdf")).unwrap();
        let uri = doc.local_reference().uri();
        assert!(uri.starts_with("file://"));
        assert_eq!(std::fs::read(doc.local_path()).unwrap(), doc.bytes());
    }

    #[test]
    fn from_path_sniffs_magic_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.pdf");
        std::fs::write(&good, b"%PDF-1.4 rest").unwrap();
        let bad = dir.path().join("bad.pdf");
        std::fs::write(&bad, b"GIF89a").unwrap();
        let renamed = dir.path().join("report.txt");
        std::fs::write(&renamed, b"%PDF-1.4 rest").unwrap();
        let upper = dir.path().join("SCAN.PDF");
        std::fs::write(&upper, b"%PDF-1.7 rest").unwrap();

        assert_eq!(
            SelectedFile::from_path(&good).unwrap().media_type.as_deref(),
            Some(PDF_MEDIA_TYPE)
        );
        assert_eq!(
            SelectedFile::from_path(&bad).unwrap().media_type.as_deref(),
            Some("application/octet-stream")
        );
        assert_eq!(
            SelectedFile::from_path(&renamed).unwrap().media_type.as_deref(),
            Some("application/octet-stream")
        );
        assert_eq!(
            SelectedFile::from_path(&upper).unwrap().media_type.as_deref(),
            Some(PDF_MEDIA_TYPE)
        );
        assert!(matches!(
            SelectedFile::from_path(&dir.path().join("missing.pdf")),
            Err(ConvertorError::FileNotFound { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn file_uri_percent_encodes_spaces() {
        assert_eq!(
            file_uri(Path::new("/tmp/my scans/q1 report.pdf")),
            "file:///tmp/my%20scans/q1%20report.pdf"
        );
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_file_is_permission_denied() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let locked = dir.path().join("locked.pdf");
        std::fs::write(&locked, b"%PDF-1.4").unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();

        // Root ignores file modes; nothing to check there.
        if std::fs::read(&locked).is_ok() {
            return;
        }
        assert!(matches!(
            SelectedFile::from_path(&locked),
            Err(ConvertorError::PermissionDenied { .. })
        ));
    }
}
