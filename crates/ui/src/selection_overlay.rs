//! Rubber-band overlay for multi-region selections.
//!
//! Regions are held in page space, the only durable coordinate system.
//! Every viewport change reprojects all of them through the coordinate
//! pipeline; nothing caches window coordinates between frames, because
//! the pipeline already reflects the current scroll and zoom and a full
//! reprojection is cheap. The overlay registers for viewport changes
//! rather than polling on a timer.

use doc_model::PageRect;
use std::cell::RefCell;
use std::rc::Rc;
use viewer_core::{
    page_rect_to_window, ObserverId, ViewportObservers, ViewportState, WindowPoint, WindowRect,
};

/// Overlay fill, RGBA normalized.
pub const SELECTION_FILL: (f32, f32, f32, f32) = (0.2, 0.6, 1.0, 0.3);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegionId(u64);

/// One selected region, in page space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionRegion {
    pub id: RegionId,
    pub page_index: u16,
    pub rect: PageRect,
}

/// A region projected into window space for this frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectedRegion {
    pub id: RegionId,
    pub window: WindowRect,
}

/// The set of selected regions and their current window-space frames.
#[derive(Debug, Default)]
pub struct SelectionOverlay {
    regions: Vec<SelectionRegion>,
    projected: Vec<ProjectedRegion>,
    next_id: u64,
}

impl SelectionOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn regions(&self) -> &[SelectionRegion] {
        &self.regions
    }

    /// Window-space frames from the last reprojection, for rendering.
    pub fn projected(&self) -> &[ProjectedRegion] {
        &self.projected
    }

    /// Add a region in page space. It becomes visible on the next
    /// reprojection.
    pub fn add_region(&mut self, page_index: u16, rect: PageRect) -> RegionId {
        let id = RegionId(self.next_id);
        self.next_id += 1;
        self.regions.push(SelectionRegion { id, page_index, rect });
        id
    }

    /// Remove a region by id. Ok to call with a stale id.
    pub fn remove_region(&mut self, id: RegionId) -> bool {
        let before = self.regions.len();
        self.regions.retain(|r| r.id != id);
        self.projected.retain(|r| r.id != id);
        self.regions.len() != before
    }

    pub fn clear(&mut self) {
        self.regions.clear();
        self.projected.clear();
    }

    /// Recompute every region's window frame from the current viewport.
    ///
    /// Regions whose projection comes out non-finite or without area are
    /// skipped for this frame; they stay in the set and may reappear
    /// after the next viewport change.
    pub fn reproject(&mut self, state: &ViewportState) {
        self.projected.clear();
        for region in &self.regions {
            let Some(window) = page_rect_to_window(state, region.page_index, region.rect) else {
                continue;
            };
            if !window.is_finite() || !window.has_area() {
                continue;
            }
            self.projected.push(ProjectedRegion { id: region.id, window });
        }
    }

    /// The topmost region under a window point, if any.
    pub fn region_at(&self, point: WindowPoint) -> Option<RegionId> {
        self.projected
            .iter()
            .rev()
            .find(|r| contains(r.window, point))
            .map(|r| r.id)
    }

    /// Click-to-remove: drop the topmost region under the point.
    pub fn remove_at(&mut self, point: WindowPoint) -> Option<RegionId> {
        let id = self.region_at(point)?;
        self.remove_region(id);
        Some(id)
    }
}

/// Register a shared overlay with the viewport observer registry so every
/// viewport change reprojects it.
pub fn attach_overlay(
    overlay: Rc<RefCell<SelectionOverlay>>,
    observers: &mut ViewportObservers,
) -> ObserverId {
    observers.register(move |state| overlay.borrow_mut().reproject(state))
}

fn contains(rect: WindowRect, point: WindowPoint) -> bool {
    point.x >= rect.x
        && point.x <= rect.x + rect.width
        && point.y >= rect.y
        && point.y <= rect.y + rect.height
}
