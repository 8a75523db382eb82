//! Reader shell glue: selection overlay and pointer routing.

pub mod input;
pub mod selection_overlay;

pub use input::PointerRouter;
pub use selection_overlay::{
    attach_overlay, ProjectedRegion, RegionId, SelectionOverlay, SelectionRegion, SELECTION_FILL,
};
