//! pdfium-backed [`PdfEngine`].
//!
//! ## Binding
//!
//! The pdfium shared library is located once per process by [`init`], from
//! an explicit [`EngineConfig::library_path`] (a file or a directory holding
//! the platform library) or, failing that, the system library path. Later
//! calls return the engine bound by the first successful call, whatever
//! config they pass.
//!
//! ## Threading
//!
//! `pdfium-render` wraps a C++ library with thread-local state. Every call
//! here is blocking and is expected to run inside `spawn_blocking`. A
//! [`Pdfium`] instance and the documents it loads are created per call and
//! dropped before returning, so handles stay `Send + Sync` and only keep
//! the raw bytes.

use super::{
    check_page, DocumentHandle, PageSize, PdfEngine, RasterSurface, TextItem, Transform, Viewport,
};
use crate::config::EngineConfig;
use crate::error::ConvertorError;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

static ENGINE: Mutex<Option<Arc<PdfiumEngine>>> = Mutex::new(None);

/// Bind pdfium for this process, or return the engine bound earlier.
pub fn init(config: &EngineConfig) -> Result<Arc<PdfiumEngine>, ConvertorError> {
    let mut slot = ENGINE
        .lock()
        .map_err(|_| ConvertorError::Internal("pdfium engine lock poisoned".into()))?;

    if let Some(engine) = slot.as_ref() {
        return Ok(Arc::clone(engine));
    }

    let library = resolve_library(config);
    let engine = Arc::new(PdfiumEngine { library });
    // Bind once up front so a missing library is reported at startup rather
    // than on the first page render.
    engine.bind()?;
    info!("PDF engine ready ({})", engine.describe());

    *slot = Some(Arc::clone(&engine));
    Ok(engine)
}

fn resolve_library(config: &EngineConfig) -> Option<PathBuf> {
    config.library_path.as_ref().map(|p| {
        if p.is_dir() {
            Pdfium::pdfium_platform_library_name_at_path(p)
        } else {
            p.clone()
        }
    })
}

/// Engine that opens documents with pdfium.
#[derive(Debug)]
pub struct PdfiumEngine {
    /// Library file; `None` means the system library.
    library: Option<PathBuf>,
}

impl PdfiumEngine {
    fn bind(&self) -> Result<Pdfium, ConvertorError> {
        let bindings = match &self.library {
            Some(path) => Pdfium::bind_to_library(path),
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| ConvertorError::EngineBindingFailed(format!("{} ({e:?})", self.describe())))?;
        Ok(Pdfium::new(bindings))
    }

    fn describe(&self) -> String {
        match &self.library {
            Some(path) => path.display().to_string(),
            None => "system library".to_string(),
        }
    }
}

impl PdfEngine for PdfiumEngine {
    fn open(
        &self,
        name: &str,
        bytes: Arc<Vec<u8>>,
    ) -> Result<Arc<dyn DocumentHandle>, ConvertorError> {
        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_byte_slice(&bytes, None)
            .map_err(|e| ConvertorError::ParseFailed {
                name: name.to_string(),
                detail: format!("{e:?}"),
            })?;

        let page_sizes: Vec<PageSize> = document
            .pages()
            .iter()
            .map(|page| PageSize {
                width: page.width().value,
                height: page.height().value,
            })
            .collect();
        info!("PDF loaded: '{}' with {} pages", name, page_sizes.len());

        drop(document);
        Ok(Arc::new(PdfiumDocument {
            library: self.library.clone(),
            name: name.to_string(),
            bytes,
            page_sizes,
        }))
    }
}

/// A document parsed once for its page sizes and reloaded from its bytes
/// for each render.
struct PdfiumDocument {
    library: Option<PathBuf>,
    name: String,
    bytes: Arc<Vec<u8>>,
    page_sizes: Vec<PageSize>,
}

impl PdfiumDocument {
    fn with_page<T>(
        &self,
        page: usize,
        f: impl FnOnce(&PdfPage<'_>) -> Result<T, ConvertorError>,
    ) -> Result<T, ConvertorError> {
        check_page(page, self.page_sizes.len())?;

        let engine = PdfiumEngine {
            library: self.library.clone(),
        };
        let pdfium = engine.bind()?;
        let document = pdfium
            .load_pdf_from_byte_slice(&self.bytes, None)
            .map_err(|e| ConvertorError::ParseFailed {
                name: self.name.clone(),
                detail: format!("{e:?}"),
            })?;
        let pdf_page = document
            .pages()
            .get((page - 1) as u16)
            .map_err(|e| ConvertorError::RenderFailed {
                page,
                detail: format!("{e:?}"),
            })?;
        f(&pdf_page)
    }
}

impl DocumentHandle for PdfiumDocument {
    fn page_count(&self) -> usize {
        self.page_sizes.len()
    }

    fn page_size(&self, page: usize) -> Result<PageSize, ConvertorError> {
        check_page(page, self.page_sizes.len())?;
        Ok(self.page_sizes[page - 1])
    }

    fn render_raster(
        &self,
        page: usize,
        viewport: &Viewport,
    ) -> Result<RasterSurface, ConvertorError> {
        let (width, height) = viewport.pixel_size();
        self.with_page(page, |pdf_page| {
            let render_config = PdfRenderConfig::new()
                .set_target_width(width as i32)
                .set_maximum_height(height as i32);

            let bitmap = pdf_page
                .render_with_config(&render_config)
                .map_err(|e| ConvertorError::RenderFailed {
                    page,
                    detail: format!("{e:?}"),
                })?;
            let image = bitmap.as_image().to_rgba8();
            debug!(
                "Rendered page {} at {:.2}× → {}x{} px",
                page,
                viewport.scale,
                image.width(),
                image.height()
            );
            Ok(RasterSurface { image })
        })
    }

    fn text_items(&self, page: usize) -> Result<Vec<TextItem>, ConvertorError> {
        self.with_page(page, |pdf_page| {
            let text = pdf_page.text().map_err(|e| ConvertorError::RenderFailed {
                page,
                detail: format!("text extraction: {e:?}"),
            })?;

            let items: Vec<TextItem> = text
                .segments()
                .iter()
                .filter_map(|segment| {
                    let content = segment.text();
                    if content.trim().is_empty() {
                        return None;
                    }
                    let bounds = segment.bounds();
                    let size = bounds.height().value;
                    Some(TextItem {
                        text: content,
                        transform: Transform::scale_translate(
                            size,
                            bounds.left().value,
                            bounds.bottom().value,
                        ),
                        width: bounds.width().value,
                        height: size,
                    })
                })
                .collect();
            debug!("Page {}: {} text segments", page, items.len());
            Ok(items)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_library_keeps_file_paths() {
        let config = EngineConfig {
            library_path: Some(PathBuf::from("/nonexistent/libpdfium.so")),
        };
        assert_eq!(
            resolve_library(&config),
            Some(PathBuf::from("/nonexistent/libpdfium.so"))
        );
        assert_eq!(resolve_library(&EngineConfig::default()), None);
    }

    #[test]
    fn resolve_library_expands_directories() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig {
            library_path: Some(dir.path().to_path_buf()),
        };
        let resolved = resolve_library(&config).unwrap();
        assert!(resolved.starts_with(dir.path()));
        assert_ne!(resolved, dir.path());
    }
}
