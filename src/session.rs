//! Application state for one conversion workflow.
//!
//! A [`Session`] holds the selected source document, the chosen output
//! format, and the outcome of the most recent conversion attempt. At most one
//! conversion is pending at a time: [`Session::begin`] refuses while one is in
//! flight, and [`Session::finish`] replaces the previous outcome wholesale.

use crate::config::TargetFormat;
use crate::convert::ConversionClient;
use crate::error::{ConversionError, ConvertorError};
use crate::output::ConversionResult;
use crate::source::{DocumentSource, SelectedFile, SourceDocument};
use tracing::debug;

/// Where the current conversion attempt stands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConversionState {
    #[default]
    Idle,
    Converting,
    Succeeded(ConversionResult),
    Failed(ConversionError),
}

#[derive(Default)]
pub struct Session {
    source: DocumentSource,
    format: Option<TargetFormat>,
    state: ConversionState,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select a new source file.
    ///
    /// A rejected file leaves the previous selection and outcome untouched.
    /// An accepted one clears any previous result or error.
    pub fn select_file(&mut self, file: SelectedFile) -> Result<&SourceDocument, ConvertorError> {
        self.source.select(file)?;
        self.clear_outcome();
        self.source
            .current()
            .ok_or_else(|| ConvertorError::Internal("selection vanished".into()))
    }

    pub fn clear_file(&mut self) {
        self.source.clear();
        self.clear_outcome();
    }

    pub fn select_format(&mut self, format: TargetFormat) {
        self.format = Some(format);
        self.clear_outcome();
    }

    pub fn source(&self) -> Option<&SourceDocument> {
        self.source.current()
    }

    /// Number of live local references (0 or 1).
    pub fn active_references(&self) -> usize {
        self.source.active_references()
    }

    pub fn format(&self) -> Option<TargetFormat> {
        self.format
    }

    pub fn state(&self) -> &ConversionState {
        &self.state
    }

    pub fn is_converting(&self) -> bool {
        self.state == ConversionState::Converting
    }

    pub fn result(&self) -> Option<&ConversionResult> {
        match &self.state {
            ConversionState::Succeeded(r) => Some(r),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ConversionError> {
        match &self.state {
            ConversionState::Failed(e) => Some(e),
            _ => None,
        }
    }

    /// Whether the convert action is available.
    pub fn can_convert(&self) -> bool {
        self.source.current().is_some() && self.format.is_some() && !self.is_converting()
    }

    /// Mark a conversion as pending and return the format to convert to.
    ///
    /// Returns `None` (and changes nothing) when a file or format is missing
    /// or a conversion is already pending.
    pub fn begin(&mut self) -> Option<TargetFormat> {
        if !self.can_convert() {
            debug!("Conversion not started (converting: {})", self.is_converting());
            return None;
        }
        self.state = ConversionState::Converting;
        self.format
    }

    /// Record the outcome of the pending conversion.
    pub fn finish(&mut self, outcome: Result<ConversionResult, ConversionError>) {
        self.state = match outcome {
            Ok(result) => ConversionState::Succeeded(result),
            Err(error) => ConversionState::Failed(error),
        };
    }

    /// Run one conversion with `client`, if one can start.
    ///
    /// Returns `false` when nothing was started.
    pub async fn convert_with(&mut self, client: &ConversionClient) -> bool {
        let Some(format) = self.begin() else {
            return false;
        };
        let Some(source) = self.source.current() else {
            self.state = ConversionState::Idle;
            return false;
        };
        let outcome = client.convert(source, format).await;
        self.finish(outcome);
        true
    }

    fn clear_outcome(&mut self) {
        if !self.is_converting() {
            self.state = ConversionState::Idle;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConversionErrorKind;
    use crate::source::PDF_MEDIA_TYPE;

    fn pdf(name: &str) -> SelectedFile {
        SelectedFile::new(name, Some(PDF_MEDIA_TYPE), b"%PDF-1.7\n".to_vec())
    }

    fn result() -> ConversionResult {
        ConversionResult {
            format: "csv".into(),
            download_url: "/d".into(),
            preview_url: "/p".into(),
            filename: "a.csv".into(),
        }
    }

    #[test]
    fn begin_requires_file_and_format() {
        let mut s = Session::new();
        assert_eq!(s.begin(), None);
        s.select_format(TargetFormat::Csv);
        assert_eq!(s.begin(), None);
        s.select_file(pdf("a.pdf")).unwrap();
        assert_eq!(s.begin(), Some(TargetFormat::Csv));
        assert!(s.is_converting());
    }

    #[test]
    fn begin_refuses_while_converting() {
        let mut s = Session::new();
        s.select_file(pdf("a.pdf")).unwrap();
        s.select_format(TargetFormat::Docx);
        assert!(s.begin().is_some());
        assert_eq!(s.begin(), None);
        s.finish(Ok(result()));
        assert!(s.begin().is_some());
    }

    #[test]
    fn finish_replaces_previous_outcome() {
        let mut s = Session::new();
        s.select_file(pdf("a.pdf")).unwrap();
        s.select_format(TargetFormat::Csv);

        s.begin();
        s.finish(Err(ConversionError::new(ConversionErrorKind::Timeout, "slow")));
        assert!(s.error().is_some());
        assert!(s.result().is_none());

        s.begin();
        s.finish(Ok(result()));
        assert!(s.error().is_none());
        assert_eq!(s.result(), Some(&result()));
    }

    #[test]
    fn selecting_clears_outcome_but_not_pending_conversion() {
        let mut s = Session::new();
        s.select_file(pdf("a.pdf")).unwrap();
        s.select_format(TargetFormat::Csv);
        s.begin();
        s.finish(Ok(result()));

        s.select_format(TargetFormat::Xlsx);
        assert_eq!(s.state(), &ConversionState::Idle);

        s.begin();
        s.select_file(pdf("b.pdf")).unwrap();
        assert!(s.is_converting());
    }

    #[test]
    fn rejected_file_keeps_previous_state() {
        let mut s = Session::new();
        s.select_file(pdf("a.pdf")).unwrap();
        s.select_format(TargetFormat::Csv);
        s.begin();
        s.finish(Ok(result()));

        let bad = SelectedFile::new("notes.txt", Some("text/plain"), b"hi".to_vec());
        assert!(s.select_file(bad).is_err());
        assert_eq!(s.source().map(|d| d.display_name()), Some("a.pdf"));
        assert!(s.result().is_some());
        assert_eq!(s.active_references(), 1);
    }

    #[test]
    fn clear_file_releases_reference() {
        let mut s = Session::new();
        s.select_file(pdf("a.pdf")).unwrap();
        assert_eq!(s.active_references(), 1);
        s.clear_file();
        assert_eq!(s.active_references(), 0);
        assert!(!s.can_convert());
    }
}
