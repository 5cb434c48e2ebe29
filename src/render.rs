//! Async page rendering and last-request-wins scheduling.
//!
//! [`PageRenderer`] adapts the blocking [`PdfEngine`] to async callers by
//! running every engine call on `tokio::task::spawn_blocking`.
//!
//! [`RenderScheduler`] sits on top and owns the "displayed" frame. It keeps
//! at most one engine render in flight per scheduler: the blocking render
//! holds a single slot until it returns, and a request that is superseded
//! while waiting for that slot never reaches the engine. A finished render is
//! only published if its generation is still the latest, so a slow render for
//! page 3 can never overwrite a newer render for page 5.

use crate::engine::{
    DocumentHandle, PdfEngine, PositionedTextRun, RasterSurface, RenderMode, TextLayer, Viewport,
};
use crate::error::ConvertorError;
use crate::source::SourceDocument;
use std::sync::{Arc, Mutex};
use tokio::sync::{watch, Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, warn};

/// What to render.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderRequest {
    /// 1-indexed page number.
    pub page: usize,
    pub scale: f32,
    pub mode: RenderMode,
}

/// Output of one page render.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderedPage {
    Raster(RasterSurface),
    Text(TextLayer),
}

/// Opens documents and renders pages off the async executor.
#[derive(Clone)]
pub struct PageRenderer {
    engine: Arc<dyn PdfEngine>,
}

impl PageRenderer {
    pub fn new(engine: Arc<dyn PdfEngine>) -> Self {
        Self { engine }
    }

    /// Parse the selected document.
    pub async fn open(
        &self,
        source: &SourceDocument,
    ) -> Result<Arc<dyn DocumentHandle>, ConvertorError> {
        let engine = Arc::clone(&self.engine);
        let name = source.display_name().to_string();
        let bytes = source.shared_bytes();

        tokio::task::spawn_blocking(move || engine.open(&name, bytes))
            .await
            .map_err(|e| ConvertorError::Internal(format!("Open task panicked: {}", e)))?
    }

    /// Render one page at `request.scale` in `request.mode`.
    ///
    /// `slot` stays held until the engine call returns, even if the awaiting
    /// task is aborted, so no two renders overlap on the engine.
    pub(crate) async fn render_page(
        &self,
        handle: Arc<dyn DocumentHandle>,
        request: RenderRequest,
        slot: OwnedMutexGuard<()>,
    ) -> Result<RenderedPage, ConvertorError> {
        tokio::task::spawn_blocking(move || {
            let _slot = slot;
            render_blocking(handle.as_ref(), request)
        })
        .await
        .map_err(|e| ConvertorError::Internal(format!("Render task panicked: {}", e)))?
    }
}

fn render_blocking(
    handle: &dyn DocumentHandle,
    request: RenderRequest,
) -> Result<RenderedPage, ConvertorError> {
    let viewport = Viewport::new(handle.page_size(request.page)?, request.scale);
    match request.mode {
        RenderMode::Raster => handle
            .render_raster(request.page, &viewport)
            .map(RenderedPage::Raster),
        RenderMode::Text => {
            let runs = handle
                .text_items(request.page)?
                .iter()
                .map(|item| PositionedTextRun::place(item, &viewport))
                .collect();
            Ok(RenderedPage::Text(TextLayer {
                width: viewport.width,
                height: viewport.height,
                runs,
            }))
        }
    }
}

/// A published render.
#[derive(Debug, Clone)]
pub struct Frame {
    pub generation: u64,
    pub request: RenderRequest,
    pub page: RenderedPage,
}

/// Render progress, for loading indicators and error banners.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderStatus {
    Idle,
    Rendering { generation: u64 },
    Failed { generation: u64, message: String },
}

/// Serialises renders so that only the latest request is ever displayed.
pub struct RenderScheduler {
    renderer: PageRenderer,
    latest: Arc<Mutex<u64>>,
    slot: Arc<AsyncMutex<()>>,
    in_flight: Mutex<Option<JoinHandle<()>>>,
    frame_tx: watch::Sender<Option<Arc<Frame>>>,
    status_tx: watch::Sender<RenderStatus>,
}

impl RenderScheduler {
    pub fn new(renderer: PageRenderer) -> Self {
        let (frame_tx, _) = watch::channel(None);
        let (status_tx, _) = watch::channel(RenderStatus::Idle);
        Self {
            renderer,
            latest: Arc::new(Mutex::new(0)),
            slot: Arc::new(AsyncMutex::new(())),
            in_flight: Mutex::new(None),
            frame_tx,
            status_tx,
        }
    }

    pub fn renderer(&self) -> &PageRenderer {
        &self.renderer
    }

    /// Start rendering `request`, superseding anything still in flight.
    ///
    /// Returns the generation assigned to this request. Must be called from
    /// within a Tokio runtime.
    pub fn request(&self, handle: Arc<dyn DocumentHandle>, request: RenderRequest) -> u64 {
        let generation = {
            let mut latest = lock(&self.latest);
            *latest += 1;
            *latest
        };

        if let Some(previous) = lock(&self.in_flight).take() {
            if !previous.is_finished() {
                debug!("Render {} supersedes an in-flight render", generation);
                previous.abort();
            }
        }

        self.status_tx
            .send_replace(RenderStatus::Rendering { generation });

        let renderer = self.renderer.clone();
        let latest = Arc::clone(&self.latest);
        let slot = Arc::clone(&self.slot);
        let frame_tx = self.frame_tx.clone();
        let status_tx = self.status_tx.clone();

        let task = tokio::spawn(async move {
            let slot = slot.lock_owned().await;
            if *lock(&latest) != generation {
                debug!("Skipping superseded render {}", generation);
                return;
            }
            let result = renderer.render_page(handle, request, slot).await;

            // Compare and publish under the same lock that assigns
            // generations, so a stale frame cannot slip in after a newer one.
            let latest = lock(&latest);
            if *latest != generation {
                debug!(
                    "Discarding stale render {} (latest is {})",
                    generation, *latest
                );
                return;
            }
            match result {
                Ok(page) => {
                    frame_tx.send_replace(Some(Arc::new(Frame {
                        generation,
                        request,
                        page,
                    })));
                    status_tx.send_replace(RenderStatus::Idle);
                }
                Err(e) => {
                    warn!("Render {} failed: {}", generation, e);
                    status_tx.send_replace(RenderStatus::Failed {
                        generation,
                        message: e.to_string(),
                    });
                }
            }
        });
        *lock(&self.in_flight) = Some(task);

        generation
    }

    /// Forget the current document: abort any render and clear the frame.
    pub fn reset(&self) {
        *lock(&self.latest) += 1;
        if let Some(task) = lock(&self.in_flight).take() {
            task.abort();
        }
        self.frame_tx.send_replace(None);
        self.status_tx.send_replace(RenderStatus::Idle);
    }

    /// The frame currently on display.
    pub fn displayed(&self) -> Option<Arc<Frame>> {
        self.frame_tx.borrow().clone()
    }

    pub fn status(&self) -> RenderStatus {
        self.status_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<Frame>>> {
        self.frame_tx.subscribe()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<RenderStatus> {
        self.status_tx.subscribe()
    }

    /// Displayed frames as a stream (starts with the current value).
    pub fn frames(&self) -> WatchStream<Option<Arc<Frame>>> {
        WatchStream::new(self.subscribe())
    }
}

impl Drop for RenderScheduler {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.in_flight.lock() {
            if let Some(task) = slot.take() {
                task.abort();
            }
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    // A panic while holding these locks cannot leave the data half-written.
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{PageSize, TextItem, Transform};
    use image::{Rgba, RgbaImage};

    struct OnePage;

    impl DocumentHandle for OnePage {
        fn page_count(&self) -> usize {
            1
        }
        fn page_size(&self, page: usize) -> Result<PageSize, ConvertorError> {
            crate::engine::check_page(page, 1)?;
            Ok(PageSize {
                width: 100.0,
                height: 200.0,
            })
        }
        fn render_raster(
            &self,
            _page: usize,
            viewport: &Viewport,
        ) -> Result<RasterSurface, ConvertorError> {
            let (w, h) = viewport.pixel_size();
            Ok(RasterSurface {
                image: RgbaImage::from_pixel(w, h, Rgba([255, 255, 255, 255])),
            })
        }
        fn text_items(&self, _page: usize) -> Result<Vec<TextItem>, ConvertorError> {
            Ok(vec![TextItem {
                text: "Total".into(),
                transform: Transform::scale_translate(10.0, 10.0, 190.0),
                width: 30.0,
                height: 10.0,
            }])
        }
    }

    #[test]
    fn raster_surface_sized_to_viewport() {
        let request = RenderRequest {
            page: 1,
            scale: 1.5,
            mode: RenderMode::Raster,
        };
        match render_blocking(&OnePage, request).unwrap() {
            RenderedPage::Raster(s) => assert_eq!((s.width(), s.height()), (150, 300)),
            other => panic!("expected raster, got {other:?}"),
        }
    }

    #[test]
    fn text_layer_positions_runs_in_viewport_space() {
        let request = RenderRequest {
            page: 1,
            scale: 2.0,
            mode: RenderMode::Text,
        };
        match render_blocking(&OnePage, request).unwrap() {
            RenderedPage::Text(layer) => {
                assert_eq!((layer.width, layer.height), (200.0, 400.0));
                assert_eq!(layer.runs.len(), 1);
                let run = &layer.runs[0];
                assert_eq!((run.x, run.y), (20.0, 20.0));
                assert_eq!(run.font_size, 20.0);
            }
            other => panic!("expected text, got {other:?}"),
        }
    }

    #[test]
    fn out_of_range_page_is_an_error() {
        let request = RenderRequest {
            page: 2,
            scale: 1.0,
            mode: RenderMode::Raster,
        };
        assert!(matches!(
            render_blocking(&OnePage, request),
            Err(ConvertorError::PageOutOfRange { page: 2, total: 1 })
        ));
    }
}
