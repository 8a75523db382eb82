//! Pointer input routing.
//!
//! The windowing layer reports pointer events in window space. The router
//! converts them through the coordinate pipeline into page space and
//! feeds the document session's tool state machine. Conversion happens
//! per event against the current viewport, so drags stay correct while
//! the user scrolls or zooms mid-gesture.

use pdf_reader_core::{DocumentBackend, DocumentSession, EngineEvent, TextMeasurer, TextProvider};
use tracing::trace;
use viewer_core::{page_to_surface, window_to_page, SurfacePoint, ViewportState, WindowPoint};

/// Routes window-space pointer events into a document session.
#[derive(Debug, Default)]
pub struct PointerRouter {
    viewport: ViewportState,
}

impl PointerRouter {
    pub fn new(viewport: ViewportState) -> Self {
        Self { viewport }
    }

    pub fn viewport(&self) -> &ViewportState {
        &self.viewport
    }

    /// Adopt the latest viewport. Call from the viewport-change observer.
    pub fn set_viewport(&mut self, viewport: ViewportState) {
        self.viewport = viewport;
    }

    pub fn pointer_down<B>(
        &self,
        session: &mut DocumentSession<B>,
        at: WindowPoint,
    ) -> Vec<EngineEvent>
    where
        B: DocumentBackend + TextProvider + TextMeasurer,
    {
        let Some((page_index, point)) = window_to_page(&self.viewport, at) else {
            return Vec::new();
        };
        trace!(page_index, x = point.x, y = point.y, "pointer down");
        session.pointer_down(page_index, point)
    }

    pub fn pointer_moved<B>(
        &self,
        session: &mut DocumentSession<B>,
        at: WindowPoint,
    ) -> Vec<EngineEvent>
    where
        B: DocumentBackend + TextProvider + TextMeasurer,
    {
        let Some((page_index, point)) = window_to_page(&self.viewport, at) else {
            return Vec::new();
        };
        session.pointer_moved(page_index, point)
    }

    pub fn pointer_up<B>(
        &self,
        session: &mut DocumentSession<B>,
        at: WindowPoint,
    ) -> Vec<EngineEvent>
    where
        B: DocumentBackend + TextProvider + TextMeasurer,
    {
        let Some((page_index, point)) = window_to_page(&self.viewport, at) else {
            return Vec::new();
        };
        session.pointer_up(page_index, point)
    }

    /// The in-progress freehand stroke projected onto the rendering
    /// surface, for the live preview layer.
    pub fn stroke_preview_surface<B>(
        &self,
        session: &DocumentSession<B>,
    ) -> Option<Vec<SurfacePoint>>
    where
        B: DocumentBackend + TextProvider + TextMeasurer,
    {
        let (page_index, stroke) = session.stroke_preview()?;
        stroke
            .iter()
            .map(|point| page_to_surface(&self.viewport, page_index, *point))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdf_reader_core::{AnnotationTool, MemoryBackend, SessionConfig};
    use storage::AnnotationCache;

    fn session(cache: &AnnotationCache) -> DocumentSession<MemoryBackend> {
        DocumentSession::open(
            "/papers/router.pdf",
            MemoryBackend::with_pages(1),
            cache.clone(),
            SessionConfig::default(),
        )
    }

    #[test]
    fn click_lands_in_page_space() {
        let temp = tempfile::tempdir().unwrap();
        let cache = AnnotationCache::with_root(temp.path());
        let mut session = session(&cache);
        session.set_tool(AnnotationTool::Note);

        // One 612x792 page centered in a 1280px viewport at 100%: the
        // page's left edge sits at window x = 334 and its top at y = 0.
        let router = PointerRouter::new(ViewportState::default());
        router.pointer_down(&mut session, WindowPoint::new(406.0, 78.0));
        let events = router.pointer_up(&mut session, WindowPoint::new(406.0, 78.0));
        assert!(!events.is_empty());

        // Window (406, 78) is page point (72, 714); the note icon's
        // 12pt square starts there.
        let native = session.backend().annotations(0).remove(0);
        assert!((native.bounds.x - 72.0).abs() < 1e-3);
        assert!((native.bounds.y - 714.0).abs() < 1e-3);
    }

    #[test]
    fn scrolling_mid_gesture_keeps_page_coordinates_stable() {
        let temp = tempfile::tempdir().unwrap();
        let cache = AnnotationCache::with_root(temp.path());
        let mut session = session(&cache);
        session.set_tool(AnnotationTool::Freehand);

        let mut router = PointerRouter::new(ViewportState::default());
        router.pointer_down(&mut session, WindowPoint::new(406.0, 78.0));

        // The surface scrolls down 50px; the same page point now appears
        // 50px higher in the window.
        let mut scrolled = ViewportState::default();
        scrolled.scroll_offset_px = 50.0;
        router.set_viewport(scrolled);
        router.pointer_moved(&mut session, WindowPoint::new(426.0, 48.0));

        let (page, stroke) = session.stroke_preview().unwrap();
        assert_eq!(page, 0);
        assert_eq!(stroke.len(), 2);
        assert!((stroke[0].x - 72.0).abs() < 1e-3);
        assert!((stroke[0].y - 714.0).abs() < 1e-3);
        assert!((stroke[1].x - 92.0).abs() < 1e-3);
        assert!((stroke[1].y - 694.0).abs() < 1e-3);

        // The preview projects onto the surface plane, where points do
        // not move as the window scrolls.
        let preview = router.stroke_preview_surface(&session).unwrap();
        assert_eq!(preview.len(), 2);
        assert!((preview[0].x - 406.0).abs() < 1e-3);
        assert!((preview[0].y - 78.0).abs() < 1e-3);
        assert!((preview[1].x - 426.0).abs() < 1e-3);
        assert!((preview[1].y - 98.0).abs() < 1e-3);
    }
}
