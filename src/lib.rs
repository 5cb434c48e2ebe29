//! # pdf-convertor
//!
//! Preview a PDF locally, then convert it to DOCX, CSV or XLSX through a
//! remote conversion service and preview the result.
//!
//! ## Why this crate?
//!
//! The conversion itself happens on a server. What a client has to get right
//! is everything around it: reject non-PDF input before uploading, show the
//! document page by page while the user decides on a format, never let a slow
//! render of an old page overwrite the page the user is looking at, give up
//! on a stuck request after a fixed budget, and turn every way the service
//! can fail into a message the user can act on.
//!
//! ## Overview
//!
//! ```text
//! file ──▶ source::DocumentSource ──┬─▶ viewer::ViewerController ──▶ render::RenderScheduler
//!                                   │        (page, zoom, mode)         (last request wins)
//!                                   │
//!                                   └─▶ session::Session ──▶ convert::ConversionClient
//!                                                                  │  POST /convert
//!                                                                  ▼
//!                                                    output::ConversionResult
//!                                                                  │
//!                                       preview::PreviewClient ◀───┘  GET preview_url
//!                                       preview::OutputViewer / print_document
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf_convertor::{ClientConfig, ConversionClient, SelectedFile, Session, TargetFormat};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ConversionClient::new(ClientConfig::default())?;
//!     let mut session = Session::new();
//!     session.select_file(SelectedFile::from_path(Path::new("invoice.pdf"))?)?;
//!     session.select_format(TargetFormat::Xlsx);
//!     session.convert_with(&client).await;
//!     match (session.result(), session.error()) {
//!         (Some(result), _) => println!("download: {}", result.download_url),
//!         (_, Some(error)) => eprintln!("{} ({})", error, error.hint()),
//!         _ => {}
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfconv` binary (clap + anyhow + indicatif + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
pub mod output;
pub mod preview;
pub mod progress;
pub mod render;
pub mod session;
pub mod source;
pub mod viewer;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ClientConfig, ClientConfigBuilder, EngineConfig, FormatInfo, TargetFormat};
pub use convert::{classify_response, ConversionClient};
pub use engine::{DocumentHandle, PdfEngine, RenderMode};
pub use error::{ConversionError, ConversionErrorKind, ConvertorError};
pub use output::{ConversionResult, HtmlFragment};
pub use preview::{print_document, OutputViewer, PreviewClient, PrintSurface, SystemPrintSurface};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use render::{PageRenderer, RenderRequest, RenderScheduler, RenderedPage};
pub use session::{ConversionState, Session};
pub use source::{DocumentSource, SelectedFile, SourceDocument};
pub use viewer::{ScaleRange, ViewerAction, ViewerController, ViewerState};
