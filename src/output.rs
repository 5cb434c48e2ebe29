//! Values produced by the conversion service.

use crate::config::{FormatInfo, TargetFormat};
use serde::{Deserialize, Serialize};

/// A successful conversion, as reported by the service.
///
/// Immutable once received; the next attempt replaces it entirely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionResult {
    /// Format identifier echoed by the service (`docx`, `csv`, `xlsx`).
    pub format: String,
    pub download_url: String,
    pub preview_url: String,
    /// Suggested file name of the artifact.
    pub filename: String,
}

impl ConversionResult {
    /// The format as a known [`TargetFormat`], if it is one.
    pub fn target_format(&self) -> Option<TargetFormat> {
        self.format.parse().ok()
    }

    pub fn format_info(&self) -> FormatInfo {
        FormatInfo::for_format(&self.format)
    }
}

/// HTML preview of a converted artifact, ready to embed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HtmlFragment(pub String);

impl HtmlFragment {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when there is nothing worth showing.
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialises_service_payload() {
        let json = r#"{"format":"xlsx","download_url":"/d/1","preview_url":"/p/1","filename":"t.xlsx","extra":1}"#;
        let r: ConversionResult = serde_json::from_str(json).unwrap();
        assert_eq!(r.target_format(), Some(TargetFormat::Xlsx));
        assert_eq!(r.format_info().name, "Excel Spreadsheet");
    }

    #[test]
    fn whitespace_fragment_is_empty() {
        assert!(HtmlFragment(" \n ".into()).is_empty());
        assert!(!HtmlFragment("<table></table>".into()).is_empty());
    }
}
