//! Hit testing and annotation geometry.
//!
//! All functions work in page space and are pure; callers convert from
//! window coordinates first.

use crate::enrichment::TextMeasurer;
use crate::native::{type_tag, InkPayload, NativeAnnotation};
use doc_model::{PagePoint, PageRect};

/// Eraser cursor radius in page points.
pub const ERASER_RADIUS: f32 = 10.0;

/// Side of a note annotation's icon.
pub const NOTE_ICON_SIZE: f32 = 12.0;

/// Side of the expanded hit square around a note icon.
pub const NOTE_HIT_SIZE: f32 = 24.0;

/// Icon bounds for a note placed at `point`.
pub fn note_icon_bounds(point: PagePoint) -> PageRect {
    PageRect::new(point.x, point.y, NOTE_ICON_SIZE, NOTE_ICON_SIZE)
}

/// Hit-test bounds for a native annotation.
///
/// Note icons get a fixed square around their center so the 12 pt icon is
/// clickable. Free text is hit on the text that actually rendered, not the
/// stored box, which carries layout padding and a minimum width; the
/// measurer re-runs the layout from the contents and font size. Everything
/// else gets the stored box plus a small margin.
pub fn hit_test_bounds(annotation: &NativeAnnotation, measurer: &impl TextMeasurer) -> PageRect {
    let bounds = annotation.bounds;
    match annotation.normalized_tag() {
        type_tag::TEXT => {
            let center = bounds.center();
            PageRect::new(
                center.x - NOTE_HIT_SIZE / 2.0,
                center.y - NOTE_HIT_SIZE / 2.0,
                NOTE_HIT_SIZE,
                NOTE_HIT_SIZE,
            )
        }
        type_tag::FREE_TEXT => {
            let laid_out = annotation
                .contents
                .as_deref()
                .filter(|text| !text.is_empty())
                .zip(annotation.font_size)
                .map(|(text, font_size)| {
                    let measured = measurer.measure(text, font_size, bounds.width);
                    // Text starts 0.4 line heights below the stored top.
                    let top = bounds.max_y() - measured.line_height * 0.4;
                    PageRect::new(bounds.min_x(), top - measured.height, measured.width, measured.height)
                })
                .unwrap_or(bounds);
            laid_out.inset_by(-10.0, -10.0)
        }
        _ => bounds.inset_by(-5.0, -5.0),
    }
}

/// Distance from `point` to the segment `a`..`b`.
///
/// Degenerate segments collapse to a point-distance check.
pub fn distance_to_segment(point: PagePoint, a: PagePoint, b: PagePoint) -> f32 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len_sq = dx * dx + dy * dy;
    if len_sq < 1e-4 {
        return point.distance_to(&a);
    }

    let t = (((point.x - a.x) * dx + (point.y - a.y) * dy) / len_sq).clamp(0.0, 1.0);
    let nearest = PagePoint::new(a.x + t * dx, a.y + t * dy);
    point.distance_to(&nearest)
}

/// Whether a circle touches a polyline drawn with `stroke_width`.
///
/// The stroke's own thickness widens the effective radius by half the
/// stroke width.
pub fn circle_hits_stroke(
    path: &[PagePoint],
    stroke_width: f32,
    center: PagePoint,
    radius: f32,
) -> bool {
    let effective = radius + stroke_width / 2.0;
    match path {
        [] => false,
        [only] => center.distance_to(only) <= effective,
        _ => path
            .windows(2)
            .any(|pair| distance_to_segment(center, pair[0], pair[1]) <= effective),
    }
}

/// Whether the eraser circle touches an ink annotation.
///
/// The annotation's bounds, grown by twice the radius, gate the per-segment
/// work; ink paths are stored relative to the bounds origin.
pub fn eraser_hits_ink(
    bounds: PageRect,
    ink: &InkPayload,
    center: PagePoint,
    radius: f32,
) -> bool {
    if !bounds.inset_by(-radius * 2.0, -radius * 2.0).contains(center) {
        return false;
    }

    let origin = bounds.origin();
    ink.paths.iter().any(|path| {
        let absolute: Vec<PagePoint> =
            path.iter().map(|p| PagePoint::new(p.x + origin.x, p.y + origin.y)).collect();
        circle_hits_stroke(&absolute, ink.stroke_width, center, radius)
    })
}

/// Bounds for a freehand annotation: the stroke bounding box padded by the
/// line width on every side, with a minimum body of 1 pt per axis.
pub fn freehand_bounds(paths: &[Vec<PagePoint>], line_width: f32) -> Option<PageRect> {
    let mut min_x = f32::INFINITY;
    let mut min_y = f32::INFINITY;
    let mut max_x = f32::NEG_INFINITY;
    let mut max_y = f32::NEG_INFINITY;

    for point in paths.iter().flatten() {
        min_x = min_x.min(point.x);
        min_y = min_y.min(point.y);
        max_x = max_x.max(point.x);
        max_y = max_y.max(point.y);
    }

    if !min_x.is_finite() {
        return None;
    }

    let padding = line_width;
    let width = (max_x - min_x).max(1.0) + padding * 2.0;
    let height = (max_y - min_y).max(1.0) + padding * 2.0;
    Some(PageRect::new(min_x - padding, min_y - padding, width, height))
}

/// Translate page-space stroke paths to be relative to `origin`.
pub fn paths_relative_to(paths: &[Vec<PagePoint>], origin: PagePoint) -> Vec<Vec<PagePoint>> {
    paths
        .iter()
        .map(|path| {
            path.iter().map(|p| PagePoint::new(p.x - origin.x, p.y - origin.y)).collect()
        })
        .collect()
}

/// Quad corners for markup annotations, four per line rect, ordered
/// bottom-left, bottom-right, top-right, top-left.
pub fn quad_points_for_lines(line_rects: &[PageRect]) -> Vec<PagePoint> {
    let mut points = Vec::with_capacity(line_rects.len() * 4);
    for rect in line_rects {
        points.push(PagePoint::new(rect.min_x(), rect.min_y()));
        points.push(PagePoint::new(rect.max_x(), rect.min_y()));
        points.push(PagePoint::new(rect.max_x(), rect.max_y()));
        points.push(PagePoint::new(rect.min_x(), rect.max_y()));
    }
    points
}
