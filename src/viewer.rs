//! Viewer state machine: page navigation, zoom, fit-to-width, render mode.
//!
//! [`ViewerState::apply`] is a pure transition function: it takes an action
//! and the document's page count and reports whether anything changed. Only
//! a changed state needs a re-render; boundary navigation, out-of-range page
//! jumps and fit-to-width on an unmeasured layout are silent no-ops.
//!
//! [`ViewerController`] couples that state with a [`RenderScheduler`] so every
//! state change issues exactly one render request.

use crate::engine::{DocumentHandle, RenderMode};
use crate::error::ConvertorError;
use crate::render::{PageRenderer, RenderRequest, RenderScheduler};
use crate::source::SourceDocument;
use std::sync::Arc;
use tracing::{debug, info};

/// Allowed zoom range and step for one kind of viewer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleRange {
    pub min: f32,
    pub max: f32,
    pub step: f32,
}

impl ScaleRange {
    /// Local PDF preview.
    pub const PAGE: ScaleRange = ScaleRange {
        min: 0.5,
        max: 3.0,
        step: 0.25,
    };

    /// Converted-output preview.
    pub const OUTPUT: ScaleRange = ScaleRange {
        min: 0.5,
        max: 2.0,
        step: 0.1,
    };

    /// Clamp into range. NaN maps to `min`.
    pub fn clamp(&self, scale: f32) -> f32 {
        if scale.is_nan() {
            self.min
        } else {
            scale.clamp(self.min, self.max)
        }
    }

    /// Scale that makes content of `content_width` (at 1.0) fill
    /// `container_width` minus `padding`, or `None` if the layout has not been
    /// measured yet or the result would not be a positive finite number.
    pub fn fit(&self, container_width: f32, content_width: f32, padding: f32) -> Option<f32> {
        if !(container_width.is_finite() && content_width.is_finite()) {
            return None;
        }
        if container_width <= 0.0 || content_width <= 0.0 {
            return None;
        }
        let scale = (container_width - padding) / content_width;
        if scale.is_finite() && scale > 0.0 {
            Some(self.clamp(scale))
        } else {
            None
        }
    }
}

/// User or layout driven viewer events.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewerAction {
    NextPage,
    PrevPage,
    /// Direct page jump; out-of-range values are ignored, never clamped.
    JumpTo(usize),
    SetScale(f32),
    ZoomIn,
    ZoomOut,
    ResetZoom,
    FitToWidth {
        container_width: f32,
        content_width: f32,
        padding: f32,
    },
    ToggleMode,
}

/// Whether a transition changed the state.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Unchanged,
    Changed,
}

impl Transition {
    pub fn needs_render(self) -> bool {
        self == Transition::Changed
    }
}

/// Current page, zoom and render mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewerState {
    pub current_page: usize,
    pub scale: f32,
    pub mode: RenderMode,
    pub range: ScaleRange,
}

impl ViewerState {
    pub fn new(range: ScaleRange) -> Self {
        Self {
            current_page: 1,
            scale: range.clamp(1.0),
            mode: RenderMode::Raster,
            range,
        }
    }

    pub fn apply(&mut self, action: ViewerAction, page_count: usize) -> Transition {
        let before = *self;
        match action {
            ViewerAction::NextPage => {
                if self.current_page < page_count {
                    self.current_page += 1;
                }
            }
            ViewerAction::PrevPage => {
                if self.current_page > 1 {
                    self.current_page -= 1;
                }
            }
            ViewerAction::JumpTo(page) => {
                if (1..=page_count).contains(&page) {
                    self.current_page = page;
                } else {
                    debug!("Ignoring jump to page {} of {}", page, page_count);
                }
            }
            ViewerAction::SetScale(scale) => {
                if !scale.is_nan() {
                    self.scale = self.range.clamp(scale);
                }
            }
            ViewerAction::ZoomIn => self.scale = self.range.clamp(self.scale + self.range.step),
            ViewerAction::ZoomOut => self.scale = self.range.clamp(self.scale - self.range.step),
            ViewerAction::ResetZoom => self.scale = self.range.clamp(1.0),
            ViewerAction::FitToWidth {
                container_width,
                content_width,
                padding,
            } => match self.range.fit(container_width, content_width, padding) {
                Some(scale) => self.scale = scale,
                None => debug!(
                    "Fit-to-width skipped (container {}, content {})",
                    container_width, content_width
                ),
            },
            ViewerAction::ToggleMode => self.mode = self.mode.toggled(),
        }

        if *self == before {
            Transition::Unchanged
        } else {
            Transition::Changed
        }
    }

    /// Reset for a newly opened document: back to page 1, keep zoom and mode.
    pub fn reset_page(&mut self) {
        self.current_page = 1;
    }

    /// Zoom as a whole percentage, as shown on the zoom button.
    pub fn zoom_percent(&self) -> u32 {
        (self.scale * 100.0).round() as u32
    }

    pub fn render_request(&self) -> RenderRequest {
        RenderRequest {
            page: self.current_page,
            scale: self.scale,
            mode: self.mode,
        }
    }
}

/// Pending contents of the page-number field.
///
/// Typing only edits the pending text; Enter ([`PageInput::confirm`]) turns
/// it into a [`ViewerAction::JumpTo`] if it is a page that exists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageInput {
    pending: String,
}

impl PageInput {
    pub fn set(&mut self, text: impl Into<String>) {
        self.pending = text.into();
    }

    pub fn pending(&self) -> &str {
        &self.pending
    }

    /// Show the current page in the field again.
    pub fn sync(&mut self, current_page: usize) {
        self.pending = current_page.to_string();
    }

    pub fn confirm(&self, page_count: usize) -> Option<ViewerAction> {
        let page: usize = self.pending.trim().parse().ok()?;
        (1..=page_count)
            .contains(&page)
            .then_some(ViewerAction::JumpTo(page))
    }
}

/// Drives a [`ViewerState`] and issues one render per state change.
pub struct ViewerController {
    state: ViewerState,
    page_input: PageInput,
    handle: Option<Arc<dyn DocumentHandle>>,
    scheduler: RenderScheduler,
    container_width: Option<f32>,
    fit_padding: f32,
}

impl ViewerController {
    pub fn new(renderer: PageRenderer, fit_padding: f32) -> Self {
        Self {
            state: ViewerState::new(ScaleRange::PAGE),
            page_input: PageInput::default(),
            handle: None,
            scheduler: RenderScheduler::new(renderer),
            container_width: None,
            fit_padding,
        }
    }

    pub fn state(&self) -> &ViewerState {
        &self.state
    }

    pub fn scheduler(&self) -> &RenderScheduler {
        &self.scheduler
    }

    pub fn page_input(&self) -> &PageInput {
        &self.page_input
    }

    pub fn page_count(&self) -> usize {
        self.handle.as_ref().map(|h| h.page_count()).unwrap_or(0)
    }

    pub fn has_document(&self) -> bool {
        self.handle.is_some()
    }

    /// Record the measured width of the viewing area.
    pub fn set_container_width(&mut self, width: f32) {
        self.container_width = Some(width);
    }

    /// Open `source` and render its first page.
    ///
    /// On a parse failure the previously loaded document and its displayed
    /// frame stay as they were.
    pub async fn load(&mut self, source: &SourceDocument) -> Result<usize, ConvertorError> {
        let handle = self.scheduler.renderer().open(source).await?;
        let pages = handle.page_count();
        info!("Viewer loaded '{}' ({} pages)", source.display_name(), pages);

        self.scheduler.reset();
        self.handle = Some(handle);
        self.state.reset_page();
        self.page_input.sync(self.state.current_page);

        // Fit on first load when the container is known; otherwise render as is.
        if self.fit_to_width().is_none() {
            self.render();
        }
        Ok(pages)
    }

    /// Drop the current document (its handle is invalid once the source changes).
    pub fn unload(&mut self) {
        self.handle = None;
        self.scheduler.reset();
        self.state.reset_page();
        self.page_input.set("");
    }

    /// Apply an action; returns the render generation if one was issued.
    pub fn dispatch(&mut self, action: ViewerAction) -> Option<u64> {
        let transition = self.state.apply(action, self.page_count());
        self.page_input.sync(self.state.current_page);
        if transition.needs_render() {
            self.render()
        } else {
            None
        }
    }

    /// Edit the pending page-number text.
    pub fn type_page(&mut self, text: impl Into<String>) {
        self.page_input.set(text);
    }

    /// Enter in the page field: jump if the pending value is a valid page.
    pub fn confirm_page(&mut self) -> Option<u64> {
        match self.page_input.confirm(self.page_count()) {
            Some(action) => self.dispatch(action),
            None => None,
        }
    }

    /// Fit the current page to the recorded container width.
    pub fn fit_to_width(&mut self) -> Option<u64> {
        let container_width = self.container_width?;
        let page = self.state.current_page;
        let content_width = self.handle.as_ref()?.page_size(page).ok()?.width;
        self.dispatch(ViewerAction::FitToWidth {
            container_width,
            content_width,
            padding: self.fit_padding,
        })
    }

    fn render(&self) -> Option<u64> {
        let handle = self.handle.as_ref()?;
        Some(
            self.scheduler
                .request(Arc::clone(handle), self.state.render_request()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_state() -> ViewerState {
        ViewerState::new(ScaleRange::PAGE)
    }

    #[test]
    fn next_and_prev_stop_at_bounds() {
        let mut s = page_state();
        assert_eq!(s.apply(ViewerAction::PrevPage, 3), Transition::Unchanged);
        assert_eq!(s.current_page, 1);

        assert!(s.apply(ViewerAction::NextPage, 3).needs_render());
        assert!(s.apply(ViewerAction::NextPage, 3).needs_render());
        assert_eq!(s.current_page, 3);
        assert_eq!(s.apply(ViewerAction::NextPage, 3), Transition::Unchanged);
        assert_eq!(s.current_page, 3);
    }

    #[test]
    fn navigation_without_document_is_noop() {
        let mut s = page_state();
        assert_eq!(s.apply(ViewerAction::NextPage, 0), Transition::Unchanged);
        assert_eq!(s.current_page, 1);
    }

    #[test]
    fn set_scale_clamps_any_input() {
        let mut s = page_state();
        for (input, expected) in [
            (10.0, 3.0),
            (-4.0, 0.5),
            (0.0, 0.5),
            (f32::INFINITY, 3.0),
            (f32::NEG_INFINITY, 0.5),
            (1.75, 1.75),
        ] {
            let _ = s.apply(ViewerAction::SetScale(input), 1);
            assert_eq!(s.scale, expected, "input {input}");
        }
        let before = s.scale;
        assert_eq!(s.apply(ViewerAction::SetScale(f32::NAN), 1), Transition::Unchanged);
        assert_eq!(s.scale, before);
    }

    #[test]
    fn output_range_is_narrower() {
        let mut s = ViewerState::new(ScaleRange::OUTPUT);
        let _ = s.apply(ViewerAction::SetScale(2.9), 1);
        assert_eq!(s.scale, 2.0);
    }

    #[test]
    fn zoom_steps_and_reset() {
        let mut s = page_state();
        let _ = s.apply(ViewerAction::ZoomIn, 1);
        assert_eq!(s.scale, 1.25);
        let _ = s.apply(ViewerAction::ZoomOut, 1);
        let _ = s.apply(ViewerAction::ZoomOut, 1);
        assert_eq!(s.scale, 0.75);
        let _ = s.apply(ViewerAction::ResetZoom, 1);
        assert_eq!(s.scale, 1.0);
        for _ in 0..20 {
            let _ = s.apply(ViewerAction::ZoomIn, 1);
        }
        assert_eq!(s.scale, 3.0);
        assert_eq!(s.apply(ViewerAction::ZoomIn, 1), Transition::Unchanged);
    }

    #[test]
    fn fit_to_width_computes_and_clamps() {
        let mut s = page_state();
        let t = s.apply(
            ViewerAction::FitToWidth {
                container_width: 958.0,
                content_width: 612.0,
                padding: 40.0,
            },
            1,
        );
        assert!(t.needs_render());
        assert_eq!(s.scale, 1.5);

        let _ = s.apply(
            ViewerAction::FitToWidth {
                container_width: 1264.0,
                content_width: 612.0,
                padding: 40.0,
            },
            1,
        );
        assert_eq!(s.scale, 2.0);

        let _ = s.apply(
            ViewerAction::FitToWidth {
                container_width: 10_000.0,
                content_width: 100.0,
                padding: 40.0,
            },
            1,
        );
        assert_eq!(s.scale, 3.0);
    }

    #[test]
    fn fit_to_width_tolerates_unmeasured_layout() {
        let mut s = page_state();
        let _ = s.apply(ViewerAction::SetScale(1.5), 1);
        for (container, content) in [
            (0.0, 612.0),
            (800.0, 0.0),
            (0.0, 0.0),
            (f32::NAN, 612.0),
            (800.0, f32::INFINITY),
            (30.0, 612.0),
        ] {
            let t = s.apply(
                ViewerAction::FitToWidth {
                    container_width: container,
                    content_width: content,
                    padding: 40.0,
                },
                1,
            );
            assert_eq!(t, Transition::Unchanged, "{container}/{content}");
            assert_eq!(s.scale, 1.5);
            assert!(s.scale.is_finite());
        }
    }

    #[test]
    fn jump_rejects_out_of_range_without_clamping() {
        let mut s = page_state();
        assert_eq!(s.apply(ViewerAction::JumpTo(9), 5), Transition::Unchanged);
        assert_eq!(s.apply(ViewerAction::JumpTo(0), 5), Transition::Unchanged);
        assert_eq!(s.current_page, 1);
        assert!(s.apply(ViewerAction::JumpTo(5), 5).needs_render());
        assert_eq!(s.current_page, 5);
    }

    #[test]
    fn toggle_mode_always_changes() {
        let mut s = page_state();
        assert!(s.apply(ViewerAction::ToggleMode, 1).needs_render());
        assert_eq!(s.mode, RenderMode::Text);
        assert!(s.apply(ViewerAction::ToggleMode, 1).needs_render());
        assert_eq!(s.mode, RenderMode::Raster);
    }

    #[test]
    fn page_input_confirms_only_valid_pages() {
        let mut input = PageInput::default();
        input.set("4");
        assert_eq!(input.confirm(5), Some(ViewerAction::JumpTo(4)));
        input.set(" 2 ");
        assert_eq!(input.confirm(5), Some(ViewerAction::JumpTo(2)));
        input.set("6");
        assert_eq!(input.confirm(5), None);
        input.set("0");
        assert_eq!(input.confirm(5), None);
        input.set("abc");
        assert_eq!(input.confirm(5), None);
        input.set("-1");
        assert_eq!(input.confirm(5), None);
    }

    #[test]
    fn zoom_percent_rounds() {
        let mut s = page_state();
        let _ = s.apply(ViewerAction::SetScale(1.234), 1);
        assert_eq!(s.zoom_percent(), 123);
    }
}
