//! Viewport model and coordinate pipeline.
//!
//! Three coordinate spaces flow through the reader:
//!
//! - **page space**: per-page, origin bottom-left, y up, in points;
//! - **surface space**: the scrollable document surface, origin top-left,
//!   y down, in device pixels, pages stacked vertically with spacing and
//!   centered horizontally;
//! - **window space**: surface space translated by the scroll offset.
//!
//! All conversions are stateless functions over a [`ViewportState`]
//! snapshot. Interested parties subscribe to viewport changes through
//! [`ViewportObservers`] instead of polling.

use doc_model::{PagePoint, PageRect};
use std::ops::RangeInclusive;

/// Size of one page in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSizePt {
    pub width_pt: f32,
    pub height_pt: f32,
}

impl PageSizePt {
    pub fn new(width_pt: f32, height_pt: f32) -> Self {
        Self { width_pt, height_pt }
    }
}

impl Default for PageSizePt {
    fn default() -> Self {
        // US Letter.
        Self { width_pt: 612.0, height_pt: 792.0 }
    }
}

/// Point on the document surface, device pixels, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfacePoint {
    pub x: f32,
    pub y: f32,
}

impl SurfacePoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Rectangle on the document surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl SurfaceRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn contains(&self, p: SurfacePoint) -> bool {
        p.x >= self.x
            && p.x <= self.x + self.width
            && p.y >= self.y
            && p.y <= self.y + self.height
    }
}

/// Point in the visible window, device pixels, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowPoint {
    pub x: f32,
    pub y: f32,
}

impl WindowPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Rectangle in the visible window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl WindowRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()
    }

    pub fn has_area(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x <= self.x + self.width && y >= self.y && y <= self.y + self.height
    }
}

/// Snapshot of the viewport.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewportState {
    pub zoom_percent: u16,
    pub dpr: f32,
    pub viewport_width_px: f32,
    pub viewport_height_px: f32,
    pub scroll_offset_px: f32,
    pub page_sizes_pt: Vec<PageSizePt>,
    pub page_spacing_px: f32,
}

impl Default for ViewportState {
    fn default() -> Self {
        Self {
            zoom_percent: 100,
            dpr: 1.0,
            viewport_width_px: 1280.0,
            viewport_height_px: 800.0,
            scroll_offset_px: 0.0,
            page_sizes_pt: vec![PageSizePt::default()],
            page_spacing_px: 16.0,
        }
    }
}

impl ViewportState {
    /// Device pixels per page point at the current zoom.
    pub fn scale(&self) -> f32 {
        (self.zoom_percent as f32 / 100.0) * self.dpr
    }

    pub fn page_count(&self) -> u16 {
        self.page_sizes_pt.len() as u16
    }
}

/// Width of the surface in device pixels: the widest page at current zoom,
/// never narrower than the viewport.
pub fn surface_width_px(state: &ViewportState) -> f32 {
    let scale = state.scale();
    let widest = state
        .page_sizes_pt
        .iter()
        .map(|s| s.width_pt * scale)
        .fold(0.0_f32, f32::max);
    widest.max(state.viewport_width_px)
}

/// Top edge of a page on the surface, in device pixels.
pub fn page_top_px(state: &ViewportState, page_index: u16) -> Option<f32> {
    if (page_index as usize) >= state.page_sizes_pt.len() {
        return None;
    }
    let scale = state.scale();
    let mut cursor = 0.0;
    for size in state.page_sizes_pt.iter().take(page_index as usize) {
        cursor += size.height_pt * scale + state.page_spacing_px;
    }
    Some(cursor)
}

/// Frame of a page on the surface.
pub fn page_frame_px(state: &ViewportState, page_index: u16) -> Option<SurfaceRect> {
    let size = *state.page_sizes_pt.get(page_index as usize)?;
    let top = page_top_px(state, page_index)?;
    let scale = state.scale();
    let width = size.width_pt * scale;
    let left = (surface_width_px(state) - width) / 2.0;
    Some(SurfaceRect::new(left, top, width, size.height_pt * scale))
}

/// Page point to surface point. Flips the y axis and applies zoom.
pub fn page_to_surface(
    state: &ViewportState,
    page_index: u16,
    point: PagePoint,
) -> Option<SurfacePoint> {
    let size = *state.page_sizes_pt.get(page_index as usize)?;
    let frame = page_frame_px(state, page_index)?;
    let scale = state.scale();
    Some(SurfacePoint::new(
        frame.x + point.x * scale,
        frame.y + (size.height_pt - point.y) * scale,
    ))
}

/// Page rect to surface rect.
pub fn page_rect_to_surface(
    state: &ViewportState,
    page_index: u16,
    rect: PageRect,
) -> Option<SurfaceRect> {
    // The rect's top edge in page space is its max y.
    let top_left = page_to_surface(state, page_index, PagePoint::new(rect.min_x(), rect.max_y()))?;
    let scale = state.scale();
    Some(SurfaceRect::new(top_left.x, top_left.y, rect.width * scale, rect.height * scale))
}

/// Surface point to the page under it and the page-space point.
///
/// Points between pages or outside a page's horizontal extent resolve to
/// the nearest page and are clamped onto it.
pub fn surface_to_page(state: &ViewportState, point: SurfacePoint) -> Option<(u16, PagePoint)> {
    if state.page_sizes_pt.is_empty() {
        return None;
    }
    let scale = state.scale();
    if scale <= 0.0 || !point.x.is_finite() || !point.y.is_finite() {
        return None;
    }

    let mut page_index = state.page_sizes_pt.len() - 1;
    let mut cursor = 0.0;
    for (index, size) in state.page_sizes_pt.iter().enumerate() {
        let bottom = cursor + size.height_pt * scale;
        if point.y <= bottom + state.page_spacing_px / 2.0 {
            page_index = index;
            break;
        }
        cursor = bottom + state.page_spacing_px;
    }

    let frame = page_frame_px(state, page_index as u16)?;
    let size = state.page_sizes_pt[page_index];
    let x = ((point.x - frame.x) / scale).clamp(0.0, size.width_pt);
    let y = (size.height_pt - (point.y - frame.y) / scale).clamp(0.0, size.height_pt);
    Some((page_index as u16, PagePoint::new(x, y)))
}

pub fn surface_to_window(state: &ViewportState, point: SurfacePoint) -> WindowPoint {
    WindowPoint::new(point.x, point.y - state.scroll_offset_px)
}

pub fn window_to_surface(state: &ViewportState, point: WindowPoint) -> SurfacePoint {
    SurfacePoint::new(point.x, point.y + state.scroll_offset_px)
}

pub fn surface_rect_to_window(state: &ViewportState, rect: SurfaceRect) -> WindowRect {
    WindowRect::new(rect.x, rect.y - state.scroll_offset_px, rect.width, rect.height)
}

/// Full pipeline: page rect to window rect.
pub fn page_rect_to_window(
    state: &ViewportState,
    page_index: u16,
    rect: PageRect,
) -> Option<WindowRect> {
    Some(surface_rect_to_window(state, page_rect_to_surface(state, page_index, rect)?))
}

/// Full pipeline: window point to page point.
pub fn window_to_page(state: &ViewportState, point: WindowPoint) -> Option<(u16, PagePoint)> {
    surface_to_page(state, window_to_surface(state, point))
}

/// Pages intersecting the visible window.
pub fn visible_pages(state: &ViewportState) -> RangeInclusive<u16> {
    if state.page_sizes_pt.is_empty() {
        return 0..=0;
    }

    let top = SurfacePoint::new(surface_width_px(state) / 2.0, state.scroll_offset_px.max(0.0));
    let bottom = SurfacePoint::new(
        top.x,
        (state.scroll_offset_px + state.viewport_height_px).max(0.0),
    );
    let start = surface_to_page(state, top).map(|(p, _)| p).unwrap_or(0);
    let end = surface_to_page(state, bottom)
        .map(|(p, _)| p)
        .unwrap_or_else(|| state.page_count().saturating_sub(1));
    start..=end
}

/// Handle for a registered viewport observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Registry of viewport-change callbacks.
///
/// The owner of the viewport calls [`ViewportObservers::notify`] after every
/// scroll, zoom, resize, or layout change; subscribers reproject whatever
/// geometry they cache. There is no polling anywhere.
#[derive(Default)]
pub struct ViewportObservers {
    next_id: u64,
    observers: Vec<(ObserverId, Box<dyn FnMut(&ViewportState)>)>,
}

impl ViewportObservers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, callback: impl FnMut(&ViewportState) + 'static) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.observers.push((id, Box::new(callback)));
        id
    }

    pub fn unregister(&mut self, id: ObserverId) {
        self.observers.retain(|(existing, _)| *existing != id);
    }

    pub fn notify(&mut self, state: &ViewportState) {
        for (_, callback) in &mut self.observers {
            callback(state);
        }
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl std::fmt::Debug for ViewportObservers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewportObservers")
            .field("count", &self.observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn two_page_state() -> ViewportState {
        ViewportState {
            zoom_percent: 200,
            dpr: 1.0,
            viewport_width_px: 1224.0,
            viewport_height_px: 800.0,
            scroll_offset_px: 0.0,
            page_sizes_pt: vec![PageSizePt::new(612.0, 792.0), PageSizePt::new(612.0, 792.0)],
            page_spacing_px: 16.0,
        }
    }

    #[test]
    fn page_origin_maps_to_surface_bottom_left() {
        let state = two_page_state();
        // Page-space origin is the bottom-left corner, so it lands at the
        // bottom edge of the first page frame.
        let p = page_to_surface(&state, 0, PagePoint::new(0.0, 0.0)).unwrap();
        assert_eq!(p.x, 0.0);
        assert_eq!(p.y, 792.0 * 2.0);
    }

    #[test]
    fn second_page_offsets_by_height_and_spacing() {
        let state = two_page_state();
        let top = page_top_px(&state, 1).unwrap();
        assert_eq!(top, 792.0 * 2.0 + 16.0);
    }

    #[test]
    fn surface_to_page_inverts_page_to_surface() {
        let state = two_page_state();
        let original = PagePoint::new(123.0, 456.0);
        let surface = page_to_surface(&state, 1, original).unwrap();
        let (page, back) = surface_to_page(&state, surface).unwrap();
        assert_eq!(page, 1);
        assert!((back.x - original.x).abs() < 1e-3);
        assert!((back.y - original.y).abs() < 1e-3);
    }

    #[test]
    fn gap_point_clamps_onto_nearest_page() {
        let state = two_page_state();
        // Just inside the first half of the inter-page gap.
        let in_gap = SurfacePoint::new(100.0, 792.0 * 2.0 + 4.0);
        let (page, point) = surface_to_page(&state, in_gap).unwrap();
        assert_eq!(page, 0);
        assert_eq!(point.y, 0.0);
    }

    #[test]
    fn window_conversion_applies_scroll_offset() {
        let mut state = two_page_state();
        state.scroll_offset_px = 300.0;
        let rect = page_rect_to_window(&state, 0, PageRect::new(0.0, 792.0 - 10.0, 50.0, 10.0))
            .unwrap();
        // The rect touches the top of page 0, which is scrolled up by 300.
        assert_eq!(rect.y, -300.0);
        assert_eq!(rect.width, 100.0);
        assert_eq!(rect.height, 20.0);
    }

    #[test]
    fn visible_pages_tracks_scroll_window() {
        let mut state = two_page_state();
        assert_eq!(visible_pages(&state), 0..=0);
        state.scroll_offset_px = 792.0 * 2.0 - 100.0;
        assert_eq!(visible_pages(&state), 0..=1);
    }

    #[test]
    fn observers_fire_on_notify_and_stop_after_unregister() {
        let mut observers = ViewportObservers::new();
        let seen = Rc::new(RefCell::new(0_u32));
        let seen_cb = Rc::clone(&seen);
        let id = observers.register(move |_| *seen_cb.borrow_mut() += 1);

        observers.notify(&ViewportState::default());
        observers.notify(&ViewportState::default());
        assert_eq!(*seen.borrow(), 2);

        observers.unregister(id);
        observers.notify(&ViewportState::default());
        assert_eq!(*seen.borrow(), 2);
        assert!(observers.is_empty());
    }
}
