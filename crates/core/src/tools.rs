//! Tool state machine for pointer-driven annotation editing.
//!
//! The controller owns the active tool, the in-progress freehand stroke,
//! and the per-gesture eraser state. Pointer handlers return typed
//! [`EngineEvent`]s; nothing here reaches for a global notification bus,
//! the caller routes events wherever they need to go.

use crate::enrichment::{EditSource, TextMeasurer};
use crate::geometry;
use crate::native::{
    type_tag, DocumentBackend, InkPayload, NativeId, NewNativeAnnotation, Selection, TextProvider,
};
use crate::store::AnnotationStore;
use crate::sync;
use doc_model::{AnnotationColor, AnnotationId, AnnotationRecord, AnnotationType, PagePoint};
use std::collections::HashSet;
use tracing::{debug, warn};

/// The active annotation tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnnotationTool {
    #[default]
    None,
    Freehand,
    Eraser,
    Highlight,
    Underline,
    Strikeout,
    Note,
    Text,
}

impl AnnotationTool {
    /// Tools that act on a text selection rather than pointer geometry.
    pub fn is_text_markup(&self) -> bool {
        matches!(self, Self::Highlight | Self::Underline | Self::Strikeout)
    }

    pub fn is_drawing(&self) -> bool {
        matches!(self, Self::Freehand)
    }

    pub fn is_eraser(&self) -> bool {
        matches!(self, Self::Eraser)
    }

    /// Tools that add an annotation on a single click.
    pub fn is_click_to_add(&self) -> bool {
        matches!(self, Self::Note | Self::Text)
    }

    fn markup_kind(&self) -> Option<AnnotationType> {
        match self {
            Self::Highlight => Some(AnnotationType::Highlight),
            Self::Underline => Some(AnnotationType::Underline),
            Self::Strikeout => Some(AnnotationType::Strikeout),
            _ => None,
        }
    }

    fn markup_tag(&self) -> Option<&'static str> {
        match self {
            Self::Highlight => Some(type_tag::HIGHLIGHT),
            Self::Underline => Some(type_tag::UNDERLINE),
            Self::Strikeout => Some(type_tag::STRIKEOUT),
            _ => None,
        }
    }
}

/// What a pointer interaction or edit changed.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    AnnotationAdded { id: AnnotationId },
    AnnotationRemoved { id: AnnotationId },
    AnnotationUpdated { id: AnnotationId, source: EditSource },
    ToolChanged { tool: AnnotationTool },
    /// The in-progress freehand stroke changed; repaint the preview.
    StrokePreviewChanged,
    /// The user clicked where a note can be edited.
    NoteEditRequested { id: AnnotationId },
    /// The user clicked where free text is entered or edited.
    TextEditRequested { page_index: u16, at: PagePoint, existing: Option<NativeId> },
    /// A mutation batch finished; schedule persistence.
    SaveRequested,
}

/// Pointer state machine over the active tool.
#[derive(Debug)]
pub struct ToolController {
    tool: AnnotationTool,
    color: AnnotationColor,
    stroke_width: f32,
    /// One-shot guard against duplicate click-to-add creation.
    creating: bool,
    stroke_page: Option<u16>,
    stroke: Vec<PagePoint>,
    /// Whether an eraser gesture is in progress; hover moves never erase.
    erasing: bool,
    erased: HashSet<NativeId>,
    erased_any: bool,
}

impl Default for ToolController {
    fn default() -> Self {
        Self {
            tool: AnnotationTool::None,
            color: AnnotationColor::default(),
            stroke_width: 2.0,
            creating: false,
            stroke_page: None,
            stroke: Vec::new(),
            erasing: false,
            erased: HashSet::new(),
            erased_any: false,
        }
    }
}

impl ToolController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tool(&self) -> AnnotationTool {
        self.tool
    }

    pub fn color(&self) -> AnnotationColor {
        self.color
    }

    pub fn set_color(&mut self, color: AnnotationColor) {
        self.color = color;
    }

    pub fn stroke_width(&self) -> f32 {
        self.stroke_width
    }

    pub fn set_stroke_width(&mut self, width: f32) {
        self.stroke_width = width.max(0.1);
    }

    pub fn is_creating(&self) -> bool {
        self.creating
    }

    /// Switch tools, abandoning any in-progress gesture.
    pub fn set_tool(&mut self, tool: AnnotationTool) -> EngineEvent {
        self.tool = tool;
        self.reset_gesture();
        EngineEvent::ToolChanged { tool }
    }

    /// The freehand stroke being drawn, for preview rendering.
    pub fn stroke_preview(&self) -> Option<(u16, &[PagePoint])> {
        let page = self.stroke_page?;
        (!self.stroke.is_empty()).then_some((page, self.stroke.as_slice()))
    }

    pub fn pointer_down<B>(
        &mut self,
        backend: &mut B,
        store: &mut AnnotationStore,
        page_index: u16,
        point: PagePoint,
    ) -> Vec<EngineEvent>
    where
        B: DocumentBackend + TextProvider + TextMeasurer,
    {
        match self.tool {
            AnnotationTool::Freehand => {
                self.stroke_page = Some(page_index);
                self.stroke = vec![point];
                vec![EngineEvent::StrokePreviewChanged]
            }
            AnnotationTool::Eraser => {
                self.erasing = true;
                self.erased.clear();
                self.erased_any = false;
                self.erase_at(backend, store, page_index, point)
            }
            AnnotationTool::None => self.open_annotation_at(backend, store, page_index, point),
            // Click-to-add tools act on release.
            _ => Vec::new(),
        }
    }

    pub fn pointer_moved<B>(
        &mut self,
        backend: &mut B,
        store: &mut AnnotationStore,
        page_index: u16,
        point: PagePoint,
    ) -> Vec<EngineEvent>
    where
        B: DocumentBackend + TextProvider + TextMeasurer,
    {
        match self.tool {
            AnnotationTool::Freehand => {
                // Strokes stay on the page they started on.
                if self.stroke_page == Some(page_index) {
                    self.stroke.push(point);
                    vec![EngineEvent::StrokePreviewChanged]
                } else {
                    Vec::new()
                }
            }
            AnnotationTool::Eraser if self.erasing => {
                self.erase_at(backend, store, page_index, point)
            }
            _ => Vec::new(),
        }
    }

    pub fn pointer_up<B>(
        &mut self,
        backend: &mut B,
        store: &mut AnnotationStore,
        page_index: u16,
        point: PagePoint,
    ) -> Vec<EngineEvent>
    where
        B: DocumentBackend + TextProvider + TextMeasurer,
    {
        match self.tool {
            AnnotationTool::Freehand => {
                if self.stroke_page == Some(page_index) && point != *self.stroke.last().unwrap_or(&point)
                {
                    self.stroke.push(point);
                }
                self.finish_stroke(backend, store)
            }
            AnnotationTool::Eraser if self.erasing => {
                let mut events = self.erase_at(backend, store, page_index, point);
                if self.erased_any {
                    events.push(EngineEvent::SaveRequested);
                }
                self.erasing = false;
                self.erased.clear();
                self.erased_any = false;
                events
            }
            AnnotationTool::Note => self.create_note(backend, store, page_index, point),
            AnnotationTool::Text => {
                let existing = hit_annotation(backend, page_index, point, type_tag::FREE_TEXT);
                vec![EngineEvent::TextEditRequested {
                    page_index,
                    at: point,
                    existing: existing.map(|a| a.id),
                }]
            }
            _ => Vec::new(),
        }
    }

    /// Apply the active markup tool to a finished text selection.
    pub fn apply_selection<B>(
        &mut self,
        backend: &mut B,
        store: &mut AnnotationStore,
        selection: &Selection,
    ) -> Vec<EngineEvent>
    where
        B: DocumentBackend + TextProvider,
    {
        let (Some(tag), Some(_kind)) = (self.tool.markup_tag(), self.tool.markup_kind()) else {
            return Vec::new();
        };
        // Collapsed or zero-area selections never become annotations.
        if selection.line_rects.is_empty()
            || selection.text.is_empty()
            || !selection.bounds.has_area()
        {
            return Vec::new();
        }
        if self.creating {
            return Vec::new();
        }
        self.creating = true;

        let spec = NewNativeAnnotation::new(tag, selection.bounds, self.color.rgb())
            .with_quad_points(geometry::quad_points_for_lines(&selection.line_rects));

        let result = backend.add_annotation(selection.page_index, spec);
        self.creating = false;

        let native = match result {
            Ok(native) => native,
            Err(err) => {
                warn!(%err, "markup creation failed");
                return Vec::new();
            }
        };

        let Some(id) = sync::sync_one(&native, Some(self.color), backend, store) else {
            return Vec::new();
        };
        debug!(?id, tag, "markup annotation created");
        vec![EngineEvent::AnnotationAdded { id }, EngineEvent::SaveRequested]
    }

    fn create_note<B>(
        &mut self,
        backend: &mut B,
        store: &mut AnnotationStore,
        page_index: u16,
        point: PagePoint,
    ) -> Vec<EngineEvent>
    where
        B: DocumentBackend + TextProvider + TextMeasurer,
    {
        if self.creating {
            return Vec::new();
        }

        // Clicking an existing note edits it instead of stacking another
        // icon on top.
        if let Some(existing) = hit_annotation(backend, page_index, point, type_tag::TEXT) {
            if let Some(record) = store.find_match(
                AnnotationType::TextNote,
                page_index,
                existing.bounds.origin(),
                sync::MATCH_TOLERANCE,
            ) {
                return vec![EngineEvent::NoteEditRequested { id: record.id }];
            }
        }

        self.creating = true;
        let spec = NewNativeAnnotation::new(
            type_tag::TEXT,
            geometry::note_icon_bounds(point),
            self.color.rgb(),
        )
        .with_contents("");
        let result = backend.add_annotation(page_index, spec);
        self.creating = false;

        let native = match result {
            Ok(native) => native,
            Err(err) => {
                warn!(%err, "note creation failed");
                return Vec::new();
            }
        };

        let Some(id) = sync::sync_one(&native, Some(self.color), backend, store) else {
            return Vec::new();
        };
        vec![EngineEvent::AnnotationAdded { id }, EngineEvent::SaveRequested]
    }

    fn finish_stroke<B>(
        &mut self,
        backend: &mut B,
        store: &mut AnnotationStore,
    ) -> Vec<EngineEvent>
    where
        B: DocumentBackend + TextProvider,
    {
        let Some(page_index) = self.stroke_page.take() else {
            return Vec::new();
        };
        let stroke = std::mem::take(&mut self.stroke);
        if stroke.len() < 2 {
            return vec![EngineEvent::StrokePreviewChanged];
        }

        let paths = vec![stroke.clone()];
        let Some(bounds) = geometry::freehand_bounds(&paths, self.stroke_width) else {
            return vec![EngineEvent::StrokePreviewChanged];
        };

        let ink = InkPayload {
            paths: geometry::paths_relative_to(&paths, bounds.origin()),
            stroke_width: self.stroke_width,
        };
        let spec = NewNativeAnnotation::new(type_tag::INK, bounds, self.color.rgb()).with_ink(ink);

        match backend.add_annotation(page_index, spec) {
            Ok(_) => {
                let record =
                    AnnotationRecord::new(AnnotationType::Freehand, page_index, bounds, self.color)
                        .with_path(stroke);
                let id = store.add(record);
                vec![
                    EngineEvent::StrokePreviewChanged,
                    EngineEvent::AnnotationAdded { id },
                    EngineEvent::SaveRequested,
                ]
            }
            Err(err) => {
                warn!(%err, "freehand creation failed");
                vec![EngineEvent::StrokePreviewChanged]
            }
        }
    }

    fn erase_at<B>(
        &mut self,
        backend: &mut B,
        store: &mut AnnotationStore,
        page_index: u16,
        point: PagePoint,
    ) -> Vec<EngineEvent>
    where
        B: DocumentBackend + TextProvider,
    {
        let mut events = Vec::new();
        for native in backend.annotations(page_index) {
            if native.normalized_tag() != type_tag::INK || self.erased.contains(&native.id) {
                continue;
            }
            let Some(ink) = native.ink.as_ref() else {
                continue;
            };
            if !geometry::eraser_hits_ink(native.bounds, ink, point, geometry::ERASER_RADIUS) {
                continue;
            }

            match backend.remove_annotation(native.id) {
                Ok(true) => {
                    self.erased.insert(native.id);
                    self.erased_any = true;
                    if let Some(record) = sync::remove_matching(&native, store) {
                        events.push(EngineEvent::AnnotationRemoved { id: record.id });
                    }
                }
                Ok(false) => {}
                Err(err) => warn!(%err, "eraser removal failed"),
            }
        }
        events
    }

    fn open_annotation_at<B>(
        &mut self,
        backend: &mut B,
        store: &mut AnnotationStore,
        page_index: u16,
        point: PagePoint,
    ) -> Vec<EngineEvent>
    where
        B: DocumentBackend + TextProvider + TextMeasurer,
    {
        if let Some(note) = hit_annotation(backend, page_index, point, type_tag::TEXT) {
            if let Some(record) = store.find_match(
                AnnotationType::TextNote,
                page_index,
                note.bounds.origin(),
                sync::MATCH_TOLERANCE,
            ) {
                return vec![EngineEvent::NoteEditRequested { id: record.id }];
            }
        }
        if let Some(text) = hit_annotation(backend, page_index, point, type_tag::FREE_TEXT) {
            return vec![EngineEvent::TextEditRequested {
                page_index,
                at: point,
                existing: Some(text.id),
            }];
        }
        Vec::new()
    }

    fn reset_gesture(&mut self) {
        self.creating = false;
        self.stroke_page = None;
        self.stroke.clear();
        self.erasing = false;
        self.erased.clear();
        self.erased_any = false;
    }
}

fn hit_annotation<B>(
    backend: &B,
    page_index: u16,
    point: PagePoint,
    tag: &str,
) -> Option<crate::native::NativeAnnotation>
where
    B: DocumentBackend + TextMeasurer,
{
    backend
        .annotations(page_index)
        .into_iter()
        .find(|a| {
            a.normalized_tag() == tag && geometry::hit_test_bounds(a, backend).contains(point)
        })
}
