//! PDF engine boundary.
//!
//! Parsing and rasterising PDFs is delegated to an external library. The rest
//! of the crate only sees the two traits below, so the backend can be
//! swapped (pdfium in production, an in-memory fake in tests) without
//! touching the viewer or the renderer.
//!
//! ```text
//! PdfEngine::open(bytes) ──▶ DocumentHandle ──▶ page_count / page_size
//!                                           ├─▶ render_raster(page, viewport)
//!                                           └─▶ text_items(page)
//! ```
//!
//! All methods are blocking; [`crate::render::PageRenderer`] moves them onto
//! `spawn_blocking`.

pub mod geometry;
pub mod pdfium;

pub use geometry::{PageSize, Transform, Viewport};

use crate::error::ConvertorError;
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::sync::Arc;

/// Opens documents.
pub trait PdfEngine: Send + Sync {
    /// Parse `bytes` into a document handle.
    ///
    /// `name` is only used for error messages.
    fn open(&self, name: &str, bytes: Arc<Vec<u8>>)
        -> Result<Arc<dyn DocumentHandle>, ConvertorError>;
}

/// An opened document. Page numbers are 1-indexed.
pub trait DocumentHandle: Send + Sync {
    fn page_count(&self) -> usize;

    /// Page size at scale 1.0.
    fn page_size(&self, page: usize) -> Result<PageSize, ConvertorError>;

    /// Rasterise a page into a surface sized to `viewport`.
    fn render_raster(&self, page: usize, viewport: &Viewport)
        -> Result<RasterSurface, ConvertorError>;

    /// Text items in page space, in content order.
    fn text_items(&self, page: usize) -> Result<Vec<TextItem>, ConvertorError>;
}

/// Check a 1-indexed page number against a document's page count.
pub fn check_page(page: usize, total: usize) -> Result<(), ConvertorError> {
    if page == 0 || page > total {
        Err(ConvertorError::PageOutOfRange { page, total })
    } else {
        Ok(())
    }
}

/// Raster vs. positioned-text presentation of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    #[default]
    Raster,
    Text,
}

impl RenderMode {
    pub fn toggled(self) -> Self {
        match self {
            RenderMode::Raster => RenderMode::Text,
            RenderMode::Text => RenderMode::Raster,
        }
    }
}

/// A rendered page bitmap.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterSurface {
    pub image: RgbaImage,
}

impl RasterSurface {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Lossless PNG encoding of the surface.
    pub fn to_png(&self) -> Result<Vec<u8>, image::ImageError> {
        let mut buf = Vec::new();
        self.image
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
        Ok(buf)
    }
}

/// A run of text as reported by the engine, in page space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextItem {
    pub text: String,
    /// Font matrix + baseline origin in page space.
    pub transform: Transform,
    pub width: f32,
    pub height: f32,
}

/// A text run placed in viewport space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionedTextRun {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub font_size: f32,
}

impl PositionedTextRun {
    /// Place a page-space item into `viewport`.
    pub fn place(item: &TextItem, viewport: &Viewport) -> Self {
        let (x, y) = viewport.transform.multiply(&item.transform).translation();
        Self {
            text: item.text.clone(),
            x,
            y,
            width: item.width * viewport.scale,
            font_size: item.height * viewport.scale,
        }
    }
}

/// The text overlay for one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextLayer {
    pub width: f32,
    pub height: f32,
    pub runs: Vec<PositionedTextRun>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn check_page_bounds() {
        assert!(check_page(1, 3).is_ok());
        assert!(check_page(3, 3).is_ok());
        assert!(matches!(
            check_page(0, 3),
            Err(ConvertorError::PageOutOfRange { page: 0, total: 3 })
        ));
        assert!(check_page(4, 3).is_err());
    }

    #[test]
    fn mode_toggles_both_ways() {
        assert_eq!(RenderMode::Raster.toggled(), RenderMode::Text);
        assert_eq!(RenderMode::Text.toggled(), RenderMode::Raster);
    }

    #[test]
    fn place_item_at_half_scale() {
        let page = PageSize { width: 612.0, height: 792.0 };
        let item = TextItem {
            text: "Invoice".into(),
            transform: Transform::scale_translate(10.0, 72.0, 720.0),
            width: 40.0,
            height: 10.0,
        };
        let run = PositionedTextRun::place(&item, &Viewport::new(page, 0.5));
        assert_eq!(run.text, "Invoice");
        assert_eq!(run.x, 36.0);
        assert_eq!(run.y, 36.0);
        assert_eq!(run.width, 20.0);
        assert_eq!(run.font_size, 5.0);
    }

    #[test]
    fn surface_encodes_png() {
        let surface = RasterSurface {
            image: RgbaImage::from_pixel(4, 3, Rgba([255, 255, 255, 255])),
        };
        let png = surface.to_png().expect("encode should succeed");
        assert_eq!(&png[1..4], b"PNG");
        assert_eq!((surface.width(), surface.height()), (4, 3));
    }
}
