//! Output preview: fetch, zoom and print the converted artifact's HTML.
//!
//! The service renders every artifact (DOCX, CSV, XLSX) to an HTML fragment
//! reachable at the result's `preview_url`. [`PreviewClient`] fetches it with
//! caching defeated, [`OutputViewer`] keeps its own zoom state independent of
//! the source-page viewer, and [`print_document`] wraps the fragment into a
//! standalone printable page handed to a [`PrintSurface`].

use crate::config::{ClientConfig, FormatInfo};
use crate::convert::ConversionClient;
use crate::error::ConvertorError;
use crate::output::{ConversionResult, HtmlFragment};
use crate::viewer::{ScaleRange, Transition, ViewerAction, ViewerState};
use reqwest::header::{CACHE_CONTROL, PRAGMA};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Delay between the print page loading and the print dialog opening.
pub const PRINT_SETTLE_MS: u32 = 200;

// ── Fetch ────────────────────────────────────────────────────────────────────

/// Append a `t=<millis>` query parameter so no cache can answer the request.
pub fn cache_busted_url(url: &str, millis: u128) -> String {
    let sep = if url.contains('?') { '&' } else { '?' };
    format!("{url}{sep}t={millis}")
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

/// Fetches preview fragments from the conversion service.
#[derive(Clone)]
pub struct PreviewClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl PreviewClient {
    pub fn new(config: ClientConfig) -> Result<Self, ConvertorError> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.preview_timeout())
            .build()
            .map_err(|e| ConvertorError::InvalidConfig(format!("HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    /// Share the connection pool of an existing conversion client.
    pub fn from_client(client: &ConversionClient) -> Self {
        Self {
            http: client.http().clone(),
            config: client.config().clone(),
        }
    }

    /// Fetch the HTML fragment at `preview_url`.
    pub async fn load(&self, preview_url: &str) -> Result<HtmlFragment, ConvertorError> {
        let url = cache_busted_url(&self.config.resolve_url(preview_url), now_millis());
        debug!("GET {}", url);

        let fetch = async {
            let response = self
                .http
                .get(&url)
                .header(CACHE_CONTROL, "no-cache, no-store, must-revalidate")
                .header(PRAGMA, "no-cache")
                .send()
                .await
                .map_err(|e| ConvertorError::PreviewNetwork(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                warn!("Preview fetch failed with {}", status);
                return Err(ConvertorError::PreviewFetch {
                    status: status.as_u16(),
                });
            }

            response
                .text()
                .await
                .map_err(|e| ConvertorError::PreviewNetwork(e.to_string()))
        };

        // The budget covers the body as well as the headers.
        let html = tokio::time::timeout(self.config.preview_timeout(), fetch)
            .await
            .map_err(|_| {
                ConvertorError::PreviewNetwork(format!(
                    "timed out after {}s",
                    self.config.preview_timeout_secs
                ))
            })??;
        info!("Preview loaded ({} bytes)", html.len());
        Ok(HtmlFragment(html))
    }

    /// Fetch the preview of a successful conversion.
    pub async fn load_result(
        &self,
        result: &ConversionResult,
    ) -> Result<HtmlFragment, ConvertorError> {
        self.load(&result.preview_url).await
    }
}

// ── Viewer ───────────────────────────────────────────────────────────────────

/// Zoom state for the output preview.
///
/// Independent of the source-page viewer and bounded by
/// [`ScaleRange::OUTPUT`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutputViewer {
    state: ViewerState,
    padding: f32,
}

impl OutputViewer {
    pub fn new(padding: f32) -> Self {
        Self {
            state: ViewerState::new(ScaleRange::OUTPUT),
            padding,
        }
    }

    pub fn scale(&self) -> f32 {
        self.state.scale
    }

    pub fn zoom_percent(&self) -> u32 {
        self.state.zoom_percent()
    }

    pub fn zoom_in(&mut self) -> Transition {
        self.state.apply(ViewerAction::ZoomIn, 1)
    }

    pub fn zoom_out(&mut self) -> Transition {
        self.state.apply(ViewerAction::ZoomOut, 1)
    }

    pub fn reset(&mut self) -> Transition {
        self.state.apply(ViewerAction::ResetZoom, 1)
    }

    /// Scale the content to the container; zero widths leave it unchanged.
    pub fn fit_to_width(&mut self, container_width: f32, content_width: f32) -> Transition {
        self.state.apply(
            ViewerAction::FitToWidth {
                container_width,
                content_width,
                padding: self.padding,
            },
            1,
        )
    }
}

// ── Print ────────────────────────────────────────────────────────────────────

/// Something that can show a printable HTML page to the user.
pub trait PrintSurface {
    /// Present `html`; fails with [`ConvertorError::PopupBlocked`] when no
    /// surface could be opened.
    fn present(&self, html: &str) -> Result<(), ConvertorError>;
}

/// Writes the page to a kept temp file and opens it with the platform's
/// default handler.
#[derive(Debug, Default)]
pub struct SystemPrintSurface {
    /// Override the opener program (`xdg-open`, `open`, …).
    pub opener: Option<PathBuf>,
}

impl SystemPrintSurface {
    fn command(&self, path: &Path) -> Command {
        if let Some(opener) = &self.opener {
            let mut cmd = Command::new(opener);
            cmd.arg(path);
            return cmd;
        }
        if cfg!(target_os = "macos") {
            let mut cmd = Command::new("open");
            cmd.arg(path);
            cmd
        } else if cfg!(target_os = "windows") {
            let mut cmd = Command::new("cmd");
            cmd.args(["/C", "start", ""]).arg(path);
            cmd
        } else {
            let mut cmd = Command::new("xdg-open");
            cmd.arg(path);
            cmd
        }
    }
}

impl PrintSurface for SystemPrintSurface {
    fn present(&self, html: &str) -> Result<(), ConvertorError> {
        let mut file = tempfile::Builder::new()
            .prefix("pdfconv-print-")
            .suffix(".html")
            .tempfile()
            .map_err(|e| ConvertorError::PopupBlocked(format!("temp file: {e}")))?;
        std::io::Write::write_all(&mut file, html.as_bytes())
            .map_err(|e| ConvertorError::PopupBlocked(format!("temp file: {e}")))?;
        // The opener reads the file after we return.
        let path = file
            .into_temp_path()
            .keep()
            .map_err(|e| ConvertorError::PopupBlocked(format!("temp file: {e}")))?;

        self.command(&path)
            .spawn()
            .map_err(|e| ConvertorError::PopupBlocked(e.to_string()))?;
        info!("Print page opened: {}", path.display());
        Ok(())
    }
}

/// Build the standalone print page for `fragment`.
pub fn print_page(fragment: &HtmlFragment, format: &str) -> String {
    let title = if format.trim().is_empty() {
        FormatInfo::FALLBACK.name.to_string()
    } else {
        format.trim().to_uppercase()
    };
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Print {title}</title>
    <style>
      body {{ font-family: Arial, sans-serif; margin: 0; padding: 20px; }}
      table {{ border-collapse: collapse; width: 100%; }}
      table, th, td {{ border: 1px solid #ddd; }}
      th, td {{ padding: 8px; text-align: left; }}
      th {{ background-color: #f2f2f2; }}
      img {{ max-width: 100%; height: auto; }}
      @media print {{
        body {{ margin: 0; padding: 15px; }}
      }}
    </style>
  </head>
  <body>
{content}
    <script>
      window.onload = function() {{
        setTimeout(function() {{ window.print(); }}, {delay});
      }}
    </script>
  </body>
</html>
"#,
        title = escape_html(&title),
        content = fragment.as_str(),
        delay = PRINT_SETTLE_MS,
    )
}

/// Print `fragment` through `surface`.
///
/// An empty fragment is not printable and yields
/// [`ConvertorError::InvalidConfig`] without touching the surface.
pub fn print_document(
    fragment: &HtmlFragment,
    format: &str,
    surface: &dyn PrintSurface,
) -> Result<(), ConvertorError> {
    if fragment.is_empty() {
        return Err(ConvertorError::InvalidConfig(
            "nothing to print: the preview is empty".into(),
        ));
    }
    surface.present(&print_page(fragment, format))
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
