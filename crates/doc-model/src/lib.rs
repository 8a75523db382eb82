//! Shared annotation model types.
//!
//! Everything here is plain serializable data: page-space geometry
//! primitives, the annotation taxonomy, the named color palette with its
//! RGB classifier, and the record type persisted in the annotation cache.
//! Behavior lives in `pdf-reader-core`; this crate has no policy.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an annotation record.
///
/// Stable across the document lifetime and across cache reloads.
pub type AnnotationId = Uuid;

/// Point in page space.
///
/// Page space has its origin at the bottom-left corner of the page,
/// x increasing right, y increasing upward, in points (1/72 inch).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PagePoint {
    pub x: f32,
    pub y: f32,
}

impl PagePoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance_to(&self, other: &PagePoint) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Axis-aligned rectangle in page space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PageRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Normalized rectangle spanning two corner points.
    pub fn from_points(a: PagePoint, b: PagePoint) -> Self {
        let x = a.x.min(b.x);
        let y = a.y.min(b.y);
        Self { x, y, width: (a.x - b.x).abs(), height: (a.y - b.y).abs() }
    }

    pub fn min_x(&self) -> f32 {
        self.x
    }

    pub fn max_x(&self) -> f32 {
        self.x + self.width
    }

    pub fn min_y(&self) -> f32 {
        self.y
    }

    pub fn max_y(&self) -> f32 {
        self.y + self.height
    }

    pub fn mid_x(&self) -> f32 {
        self.x + self.width / 2.0
    }

    pub fn mid_y(&self) -> f32 {
        self.y + self.height / 2.0
    }

    pub fn origin(&self) -> PagePoint {
        PagePoint::new(self.x, self.y)
    }

    pub fn center(&self) -> PagePoint {
        PagePoint::new(self.mid_x(), self.mid_y())
    }

    pub fn contains(&self, p: PagePoint) -> bool {
        p.x >= self.min_x() && p.x <= self.max_x() && p.y >= self.min_y() && p.y <= self.max_y()
    }

    /// Shrink by (dx, dy) on each side. Negative values grow the rect.
    pub fn inset_by(&self, dx: f32, dy: f32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            width: self.width - dx * 2.0,
            height: self.height - dy * 2.0,
        }
    }

    pub fn intersects(&self, other: &PageRect) -> bool {
        self.min_x() <= other.max_x()
            && other.min_x() <= self.max_x()
            && self.min_y() <= other.max_y()
            && other.min_y() <= self.max_y()
    }

    pub fn union(&self, other: &PageRect) -> Self {
        let min_x = self.min_x().min(other.min_x());
        let min_y = self.min_y().min(other.min_y());
        let max_x = self.max_x().max(other.max_x());
        let max_y = self.max_y().max(other.max_y());
        Self { x: min_x, y: min_y, width: max_x - min_x, height: max_y - min_y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()
    }

    /// True when both dimensions are strictly positive.
    pub fn has_area(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }
}

/// Annotation taxonomy.
///
/// Serialized names use camelCase to stay compatible with caches written
/// by earlier releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AnnotationType {
    Highlight,
    Underline,
    Strikeout,
    TextNote,
    Line,
    Arrow,
    Rectangle,
    Circle,
    Freehand,
    AgentNote,
}

impl AnnotationType {
    /// Text markup families that carry selected source text.
    pub fn is_markup(&self) -> bool {
        matches!(self, Self::Highlight | Self::Underline | Self::Strikeout)
    }
}

/// Normalized RGB triple, components in 0.0..=1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }
}

/// Named annotation colors.
///
/// Annotations round-trip through the host document library as raw RGB, so
/// the palette is paired with a classifier that maps arbitrary RGB values
/// back onto the nearest name. Classification is intentionally lossy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AnnotationColor {
    Yellow,
    Green,
    Blue,
    Red,
    Orange,
    Purple,
    Pink,
    Gray,
}

impl Default for AnnotationColor {
    fn default() -> Self {
        Self::Yellow
    }
}

impl AnnotationColor {
    pub const ALL: [AnnotationColor; 8] = [
        Self::Yellow,
        Self::Green,
        Self::Blue,
        Self::Red,
        Self::Orange,
        Self::Purple,
        Self::Pink,
        Self::Gray,
    ];

    /// Canonical RGB value for the name.
    ///
    /// Every entry classifies back to its own name via [`Self::from_rgb`].
    pub fn rgb(&self) -> Rgb {
        match self {
            Self::Yellow => Rgb::new(1.0, 0.8, 0.0),
            Self::Green => Rgb::new(0.2, 0.78, 0.35),
            Self::Blue => Rgb::new(0.0, 0.48, 1.0),
            Self::Red => Rgb::new(1.0, 0.23, 0.19),
            Self::Orange => Rgb::new(0.85, 0.65, 0.1),
            Self::Purple => Rgb::new(0.69, 0.32, 0.87),
            Self::Pink => Rgb::new(0.85, 0.5, 0.66),
            Self::Gray => Rgb::new(0.56, 0.56, 0.58),
        }
    }

    /// Classify an RGB triple onto the nearest named color.
    ///
    /// Rules are checked in a fixed priority order; the first match wins.
    /// Values that match no rule fall back to the strictly dominant
    /// channel; ties read as yellow.
    pub fn from_rgb(rgb: Rgb) -> Self {
        let Rgb { r, g, b } = rgb;

        if b > 0.6 && b > r + 0.2 && b > g + 0.2 {
            return Self::Blue;
        }
        if g > 0.6 && g > r + 0.2 && g > b + 0.2 {
            return Self::Green;
        }
        if r > 0.6 && r > g + 0.2 && r > b + 0.2 {
            return Self::Red;
        }
        if r > 0.7 && g > 0.7 && b < 0.4 {
            return Self::Yellow;
        }
        if r > 0.7 && g > 0.4 && g < 0.7 && b < 0.4 {
            return Self::Orange;
        }
        if r > 0.5 && b > 0.5 && g < 0.4 {
            return Self::Purple;
        }
        if r > 0.8 && g > 0.4 && g < 0.7 && b > 0.4 && b < 0.7 {
            return Self::Pink;
        }
        if (r - g).abs() < 0.2 && (g - b).abs() < 0.2 && (r - b).abs() < 0.2 {
            return Self::Gray;
        }
        if b > r && b > g {
            Self::Blue
        } else if g > r && g > b {
            Self::Green
        } else if r > g && r > b {
            Self::Red
        } else {
            Self::Yellow
        }
    }
}

/// One annotation as stored in the per-document cache and shown in the
/// annotation list.
///
/// `rect` is always in page space. Markup records keep the selected text in
/// `source_text` and any user note in `content`; agent notes additionally
/// carry enrichment results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationRecord {
    pub id: AnnotationId,
    #[serde(rename = "type")]
    pub kind: AnnotationType,
    pub page_index: u16,
    pub rect: PageRect,
    pub color: AnnotationColor,
    #[serde(default)]
    pub content: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default)]
    pub source_text: Option<String>,
    #[serde(default)]
    pub translation: Option<String>,
    #[serde(default)]
    pub qa_result: Option<String>,
    #[serde(default)]
    pub start_point: Option<PagePoint>,
    #[serde(default)]
    pub end_point: Option<PagePoint>,
    #[serde(default)]
    pub path: Option<Vec<PagePoint>>,
}

impl AnnotationRecord {
    /// New record with a fresh id and current timestamps.
    pub fn new(
        kind: AnnotationType,
        page_index: u16,
        rect: PageRect,
        color: AnnotationColor,
    ) -> Self {
        let now = now_unix();
        Self {
            id: Uuid::new_v4(),
            kind,
            page_index,
            rect,
            color,
            content: None,
            created_at: now,
            updated_at: now,
            source_text: None,
            translation: None,
            qa_result: None,
            start_point: None,
            end_point: None,
            path: None,
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_source_text(mut self, text: impl Into<String>) -> Self {
        self.source_text = Some(text.into());
        self
    }

    pub fn with_endpoints(mut self, start: PagePoint, end: PagePoint) -> Self {
        self.start_point = Some(start);
        self.end_point = Some(end);
        self
    }

    pub fn with_path(mut self, path: Vec<PagePoint>) -> Self {
        self.path = Some(path);
        self
    }

    /// Replace the note content and bump the modification timestamp.
    pub fn set_content(&mut self, content: Option<String>) {
        self.content = content;
        self.updated_at = now_unix();
    }

    pub fn set_color(&mut self, color: AnnotationColor) {
        self.color = color;
        self.updated_at = now_unix();
    }

    pub fn set_translation(&mut self, translation: Option<String>) {
        self.translation = translation;
        self.updated_at = now_unix();
    }

    pub fn set_qa_result(&mut self, qa_result: Option<String>) {
        self.qa_result = qa_result;
        self.updated_at = now_unix();
    }
}

/// Seconds since the Unix epoch; 0 if the system clock is before it.
pub fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_from_points_normalizes() {
        let r = PageRect::from_points(PagePoint::new(10.0, 20.0), PagePoint::new(4.0, 5.0));
        assert_eq!(r, PageRect::new(4.0, 5.0, 6.0, 15.0));
    }

    #[test]
    fn rect_inset_negative_grows() {
        let r = PageRect::new(10.0, 10.0, 20.0, 20.0).inset_by(-5.0, -5.0);
        assert_eq!(r, PageRect::new(5.0, 5.0, 30.0, 30.0));
    }

    #[test]
    fn rect_intersects_is_symmetric() {
        let a = PageRect::new(0.0, 0.0, 10.0, 10.0);
        let b = PageRect::new(9.0, 9.0, 10.0, 10.0);
        let c = PageRect::new(30.0, 30.0, 5.0, 5.0);
        assert!(a.intersects(&b) && b.intersects(&a));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn every_named_color_roundtrips_through_classifier() {
        for color in AnnotationColor::ALL {
            assert_eq!(AnnotationColor::from_rgb(color.rgb()), color, "{color:?}");
        }
    }

    #[test]
    fn classifier_prefers_blue_rule() {
        // Satisfies the blue rule even though green is also high.
        let c = AnnotationColor::from_rgb(Rgb::new(0.1, 0.5, 0.9));
        assert_eq!(c, AnnotationColor::Blue);
    }

    #[test]
    fn classifier_maps_mid_gray_to_gray() {
        assert_eq!(AnnotationColor::from_rgb(Rgb::new(0.5, 0.5, 0.5)), AnnotationColor::Gray);
    }

    #[test]
    fn classifier_fallback_uses_dominant_channel() {
        // No threshold rule matches; red dominates.
        assert_eq!(AnnotationColor::from_rgb(Rgb::new(0.55, 0.3, 0.1)), AnnotationColor::Red);
    }

    #[test]
    fn classifier_fallback_ties_read_as_yellow() {
        // Red and green tie; neither strictly dominates.
        assert_eq!(
            AnnotationColor::from_rgb(Rgb::new(0.55, 0.55, 0.3)),
            AnnotationColor::Yellow
        );
        assert_eq!(
            AnnotationColor::from_rgb(Rgb::new(0.4, 0.65, 0.65)),
            AnnotationColor::Yellow
        );
    }

    #[test]
    fn record_serializes_with_legacy_field_names() {
        let rec = AnnotationRecord::new(
            AnnotationType::AgentNote,
            3,
            PageRect::new(1.0, 2.0, 12.0, 12.0),
            AnnotationColor::Blue,
        )
        .with_source_text("lorem");
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["type"], "agentNote");
        assert_eq!(json["pageIndex"], 3);
        assert_eq!(json["sourceText"], "lorem");
        assert!(json.get("qaResult").is_some());
        let back: AnnotationRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, rec);
    }

    #[test]
    fn set_content_bumps_updated_at() {
        let mut rec = AnnotationRecord::new(
            AnnotationType::TextNote,
            0,
            PageRect::new(0.0, 0.0, 12.0, 12.0),
            AnnotationColor::Yellow,
        );
        rec.updated_at = 0;
        rec.set_content(Some("note".into()));
        assert!(rec.updated_at > 0);
        assert_eq!(rec.content.as_deref(), Some("note"));
    }
}
