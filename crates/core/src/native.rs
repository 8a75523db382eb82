//! Boundary to the host document library.
//!
//! The engine never talks to a PDF library directly; everything it needs
//! from the document goes through [`DocumentBackend`] and [`TextProvider`].
//! Capabilities are part of the trait surface, so a backend that cannot do
//! something fails to compile instead of failing at runtime.

use crate::enrichment::{MeasuredText, TextMeasurer};
use doc_model::{PagePoint, PageRect, Rgb};
use std::collections::BTreeMap;

/// Raw annotation type tags as they appear in the document.
pub mod type_tag {
    pub const TEXT: &str = "Text";
    pub const HIGHLIGHT: &str = "Highlight";
    pub const UNDERLINE: &str = "Underline";
    pub const STRIKEOUT: &str = "StrikeOut";
    pub const INK: &str = "Ink";
    pub const FREE_TEXT: &str = "FreeText";
}

/// Strip the PDF name prefix from a type tag.
///
/// Depending on how the document was produced, tags arrive as `Highlight`
/// or `/Highlight`; both mean the same annotation kind.
pub fn normalize_type_tag(tag: &str) -> &str {
    tag.strip_prefix('/').unwrap_or(tag)
}

/// Identity of an annotation inside the backend.
///
/// Valid for the lifetime of the loaded document only; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NativeId(pub u64);

/// Freehand stroke data carried by ink annotations.
///
/// Points are relative to the annotation's bounds origin so the annotation
/// can be moved without rewriting every point.
#[derive(Debug, Clone, PartialEq)]
pub struct InkPayload {
    pub paths: Vec<Vec<PagePoint>>,
    pub stroke_width: f32,
}

/// One annotation as the document holds it.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeAnnotation {
    pub id: NativeId,
    pub page_index: u16,
    pub type_tag: String,
    pub bounds: PageRect,
    pub contents: Option<String>,
    pub color: Rgb,
    /// Flat list of quad corners, four per marked line rect.
    pub quad_points: Vec<PagePoint>,
    pub ink: Option<InkPayload>,
    /// Text size for free-text annotations, from the appearance string.
    pub font_size: Option<f32>,
}

impl NativeAnnotation {
    pub fn normalized_tag(&self) -> &str {
        normalize_type_tag(&self.type_tag)
    }
}

/// Parameters for creating a native annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNativeAnnotation {
    pub type_tag: String,
    pub bounds: PageRect,
    pub contents: Option<String>,
    pub color: Rgb,
    pub quad_points: Vec<PagePoint>,
    pub ink: Option<InkPayload>,
    pub font_size: Option<f32>,
}

impl NewNativeAnnotation {
    pub fn new(type_tag: impl Into<String>, bounds: PageRect, color: Rgb) -> Self {
        Self {
            type_tag: type_tag.into(),
            bounds,
            contents: None,
            color,
            quad_points: Vec::new(),
            ink: None,
            font_size: None,
        }
    }

    pub fn with_contents(mut self, contents: impl Into<String>) -> Self {
        self.contents = Some(contents.into());
        self
    }

    pub fn with_quad_points(mut self, quad_points: Vec<PagePoint>) -> Self {
        self.quad_points = quad_points;
        self
    }

    pub fn with_ink(mut self, ink: InkPayload) -> Self {
        self.ink = Some(ink);
        self
    }

    pub fn with_font_size(mut self, font_size: f32) -> Self {
        self.font_size = Some(font_size);
        self
    }
}

/// A text selection resolved by the text layer.
///
/// `line_rects` holds one rect per selected line, in page space, and is
/// what markup quad points are derived from.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub page_index: u16,
    pub bounds: PageRect,
    pub line_rects: Vec<PageRect>,
    pub text: String,
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("page index {0} out of range")]
    PageOutOfRange(u16),
    #[error("no annotation with backend id {0:?}")]
    UnknownAnnotation(NativeId),
    #[error("document write failed: {0}")]
    WriteFailed(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Mutable access to the document's native annotation set.
pub trait DocumentBackend {
    fn page_count(&self) -> u16;

    /// Media box of a page, in page space.
    fn page_bounds(&self, page_index: u16) -> Option<PageRect>;

    /// All annotations on a page, in document order.
    fn annotations(&self, page_index: u16) -> Vec<NativeAnnotation>;

    fn annotation(&self, id: NativeId) -> Option<NativeAnnotation>;

    fn add_annotation(
        &mut self,
        page_index: u16,
        annotation: NewNativeAnnotation,
    ) -> Result<NativeAnnotation, BackendError>;

    /// Remove an annotation. Ok(false) when it was already gone.
    fn remove_annotation(&mut self, id: NativeId) -> Result<bool, BackendError>;

    fn set_contents(&mut self, id: NativeId, contents: Option<String>) -> Result<(), BackendError>;

    fn set_color(&mut self, id: NativeId, color: Rgb) -> Result<(), BackendError>;

    fn set_bounds(&mut self, id: NativeId, bounds: PageRect) -> Result<(), BackendError>;

    /// Write the document back to its file.
    fn write(&mut self) -> Result<(), BackendError>;

    /// Serialize-and-replace fallback, tried once when [`Self::write`]
    /// fails.
    fn write_fallback(&mut self) -> Result<(), BackendError>;
}

/// Read access to the document's text layer.
pub trait TextProvider {
    /// The text a selection over `rect` would cover, if any.
    fn text_in_rect(&self, page_index: u16, rect: PageRect) -> Option<String>;
}

/// In-memory backend.
///
/// Backs unit tests and the preview shell: pages are plain media boxes,
/// text regions are registered rects, and writes count invocations instead
/// of touching disk.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    pages: Vec<PageRect>,
    annotations: BTreeMap<NativeId, NativeAnnotation>,
    text_regions: Vec<(u16, PageRect, String)>,
    next_id: u64,
    fail_primary_write: bool,
    write_count: usize,
    fallback_write_count: usize,
}

impl MemoryBackend {
    /// Backend with `page_count` US Letter pages.
    pub fn with_pages(page_count: u16) -> Self {
        Self {
            pages: (0..page_count).map(|_| PageRect::new(0.0, 0.0, 612.0, 792.0)).collect(),
            ..Self::default()
        }
    }

    /// Register a rect of text on a page for [`TextProvider`] lookups.
    pub fn add_text_region(&mut self, page_index: u16, rect: PageRect, text: impl Into<String>) {
        self.text_regions.push((page_index, rect, text.into()));
    }

    /// Make [`DocumentBackend::write`] fail so the fallback path runs.
    pub fn fail_primary_write(&mut self, fail: bool) {
        self.fail_primary_write = fail;
    }

    pub fn write_count(&self) -> usize {
        self.write_count
    }

    pub fn fallback_write_count(&self) -> usize {
        self.fallback_write_count
    }

    pub fn annotation_count(&self) -> usize {
        self.annotations.len()
    }
}

impl DocumentBackend for MemoryBackend {
    fn page_count(&self) -> u16 {
        self.pages.len() as u16
    }

    fn page_bounds(&self, page_index: u16) -> Option<PageRect> {
        self.pages.get(page_index as usize).copied()
    }

    fn annotations(&self, page_index: u16) -> Vec<NativeAnnotation> {
        self.annotations
            .values()
            .filter(|a| a.page_index == page_index)
            .cloned()
            .collect()
    }

    fn annotation(&self, id: NativeId) -> Option<NativeAnnotation> {
        self.annotations.get(&id).cloned()
    }

    fn add_annotation(
        &mut self,
        page_index: u16,
        annotation: NewNativeAnnotation,
    ) -> Result<NativeAnnotation, BackendError> {
        if page_index as usize >= self.pages.len() {
            return Err(BackendError::PageOutOfRange(page_index));
        }

        let id = NativeId(self.next_id);
        self.next_id += 1;
        let native = NativeAnnotation {
            id,
            page_index,
            type_tag: annotation.type_tag,
            bounds: annotation.bounds,
            contents: annotation.contents,
            color: annotation.color,
            quad_points: annotation.quad_points,
            ink: annotation.ink,
            font_size: annotation.font_size,
        };
        self.annotations.insert(id, native.clone());
        Ok(native)
    }

    fn remove_annotation(&mut self, id: NativeId) -> Result<bool, BackendError> {
        Ok(self.annotations.remove(&id).is_some())
    }

    fn set_contents(&mut self, id: NativeId, contents: Option<String>) -> Result<(), BackendError> {
        let annotation =
            self.annotations.get_mut(&id).ok_or(BackendError::UnknownAnnotation(id))?;
        annotation.contents = contents;
        Ok(())
    }

    fn set_color(&mut self, id: NativeId, color: Rgb) -> Result<(), BackendError> {
        let annotation =
            self.annotations.get_mut(&id).ok_or(BackendError::UnknownAnnotation(id))?;
        annotation.color = color;
        Ok(())
    }

    fn set_bounds(&mut self, id: NativeId, bounds: PageRect) -> Result<(), BackendError> {
        let annotation =
            self.annotations.get_mut(&id).ok_or(BackendError::UnknownAnnotation(id))?;
        annotation.bounds = bounds;
        Ok(())
    }

    fn write(&mut self) -> Result<(), BackendError> {
        if self.fail_primary_write {
            return Err(BackendError::WriteFailed("primary write disabled".into()));
        }
        self.write_count += 1;
        Ok(())
    }

    fn write_fallback(&mut self) -> Result<(), BackendError> {
        self.fallback_write_count += 1;
        Ok(())
    }
}

impl TextMeasurer for MemoryBackend {
    /// Character-cell layout model: half an em per character, wrapped at
    /// `max_width`.
    fn measure(&self, text: &str, font_size: f32, max_width: f32) -> MeasuredText {
        let raw_width = text.chars().count() as f32 * font_size * 0.5;
        let line_height = font_size * 1.2;
        let lines = (raw_width / max_width).ceil().max(1.0);
        MeasuredText {
            width: raw_width.min(max_width),
            height: lines * line_height,
            line_height,
        }
    }
}

impl TextProvider for MemoryBackend {
    fn text_in_rect(&self, page_index: u16, rect: PageRect) -> Option<String> {
        let mut parts: Vec<&str> = Vec::new();
        for (page, region, text) in &self.text_regions {
            if *page == page_index && region.intersects(&rect) {
                parts.push(text);
            }
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_leading_slash_only() {
        assert_eq!(normalize_type_tag("/Highlight"), "Highlight");
        assert_eq!(normalize_type_tag("Highlight"), "Highlight");
        assert_eq!(normalize_type_tag(""), "");
    }

    #[test]
    fn memory_backend_adds_and_removes() {
        let mut backend = MemoryBackend::with_pages(2);
        let created = backend
            .add_annotation(
                1,
                NewNativeAnnotation::new(
                    type_tag::HIGHLIGHT,
                    PageRect::new(10.0, 10.0, 50.0, 12.0),
                    Rgb::new(1.0, 0.8, 0.0),
                ),
            )
            .unwrap();

        assert_eq!(backend.annotations(1).len(), 1);
        assert!(backend.annotations(0).is_empty());
        assert!(backend.remove_annotation(created.id).unwrap());
        assert!(!backend.remove_annotation(created.id).unwrap());
    }

    #[test]
    fn memory_backend_rejects_out_of_range_page() {
        let mut backend = MemoryBackend::with_pages(1);
        let result = backend.add_annotation(
            3,
            NewNativeAnnotation::new(
                type_tag::TEXT,
                PageRect::new(0.0, 0.0, 12.0, 12.0),
                Rgb::new(1.0, 0.8, 0.0),
            ),
        );
        assert!(matches!(result, Err(BackendError::PageOutOfRange(3))));
    }

    #[test]
    fn text_provider_joins_intersecting_regions() {
        let mut backend = MemoryBackend::with_pages(1);
        backend.add_text_region(0, PageRect::new(0.0, 700.0, 100.0, 14.0), "first line");
        backend.add_text_region(0, PageRect::new(0.0, 680.0, 100.0, 14.0), "second line");
        backend.add_text_region(0, PageRect::new(0.0, 100.0, 100.0, 14.0), "far away");

        let text = backend.text_in_rect(0, PageRect::new(0.0, 678.0, 100.0, 40.0));
        assert_eq!(text.as_deref(), Some("first line second line"));
        assert!(backend.text_in_rect(0, PageRect::new(200.0, 400.0, 10.0, 10.0)).is_none());
    }
}
