//! Document session lifecycle.
//!
//! One session per open document. Opening preloads the annotation cache,
//! then reconciles against the document's native annotation set, which
//! always wins. Edits flow through the tool controller or the list-panel
//! methods here; every mutation batch marks both the cache snapshot and
//! the document write dirty. The cache writes from a background thread;
//! the document writes on this thread when [`DocumentSession::pump`] finds
//! the debounce window closed, so a burst of edits costs one write.

use crate::enrichment::{EditSource, TaskSlot, TaskToken, TextMeasurer};
use crate::native::{
    type_tag, DocumentBackend, NativeId, NewNativeAnnotation, Selection, TextProvider,
};
use crate::store::AnnotationStore;
use crate::sync::{self, SyncReport};
use crate::tools::{AnnotationTool, EngineEvent, ToolController};
use crate::write_coordinator::{PendingWrite, WriteCoordinator, WriteCoordinatorConfig};
use crate::EngineError;
use doc_model::{AnnotationColor, AnnotationId, AnnotationRecord, PagePoint, PageRect};
use std::path::{Path, PathBuf};
use storage::AnnotationCache;
use tracing::{debug, warn};

/// Maximum layout width for free text, in points.
const FREE_TEXT_MAX_WIDTH: f32 = 400.0;

/// Minimum free-text body width, in points.
const FREE_TEXT_MIN_WIDTH: f32 = 100.0;

#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub write: WriteCoordinatorConfig,
}

/// An open document with live annotation editing.
///
/// The backend doubles as the text measurer: the library that renders
/// free text is the one that knows how it lays out.
pub struct DocumentSession<B: DocumentBackend + TextProvider + TextMeasurer> {
    path: PathBuf,
    backend: B,
    store: AnnotationStore,
    tools: ToolController,
    coordinator: WriteCoordinator<Vec<AnnotationRecord>>,
    document_write: PendingWrite,
    translation: TaskSlot,
    qa: TaskSlot,
    ocr: TaskSlot,
    load_report: SyncReport,
}

impl<B: DocumentBackend + TextProvider + TextMeasurer> DocumentSession<B> {
    /// Open a document: preload cached records, then reconcile them
    /// against the native annotation set.
    pub fn open(
        path: impl Into<PathBuf>,
        backend: B,
        cache: AnnotationCache,
        config: SessionConfig,
    ) -> Self {
        let path = path.into();
        let mut store = AnnotationStore::new();
        store.replace_all(cache.load(&path));

        let load_report = sync::load_from_document(&backend, &backend, &mut store);
        debug!(
            path = %path.display(),
            records = store.len(),
            inserted = load_report.inserted,
            updated = load_report.updated,
            "document session opened"
        );

        let sink_cache = cache.clone();
        let sink_path = path.clone();
        let coordinator =
            WriteCoordinator::with_config(config.write, move |records: &Vec<AnnotationRecord>| {
                match sink_cache.save(&sink_path, records) {
                    Ok(()) => true,
                    Err(err) => {
                        warn!(%err, "annotation cache snapshot failed");
                        false
                    }
                }
            });

        Self {
            path,
            backend,
            store,
            tools: ToolController::new(),
            coordinator,
            document_write: PendingWrite::new(),
            translation: TaskSlot::new(),
            qa: TaskSlot::new(),
            ocr: TaskSlot::new(),
            load_report,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn store(&self) -> &AnnotationStore {
        &self.store
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// What the opening reconciliation changed.
    pub fn load_report(&self) -> SyncReport {
        self.load_report
    }

    pub fn tool(&self) -> AnnotationTool {
        self.tools.tool()
    }

    pub fn set_tool(&mut self, tool: AnnotationTool) -> EngineEvent {
        self.tools.set_tool(tool)
    }

    pub fn set_color(&mut self, color: AnnotationColor) {
        self.tools.set_color(color);
    }

    pub fn set_stroke_width(&mut self, width: f32) {
        self.tools.set_stroke_width(width);
    }

    /// The freehand stroke being drawn, for preview rendering.
    pub fn stroke_preview(&self) -> Option<(u16, &[PagePoint])> {
        self.tools.stroke_preview()
    }

    /// Records in display order for the annotation list panel.
    pub fn sorted_annotations(&self) -> Vec<&AnnotationRecord> {
        self.store.sorted()
    }

    pub fn pointer_down(&mut self, page_index: u16, point: PagePoint) -> Vec<EngineEvent> {
        let events =
            self.tools.pointer_down(&mut self.backend, &mut self.store, page_index, point);
        self.process(events)
    }

    pub fn pointer_moved(&mut self, page_index: u16, point: PagePoint) -> Vec<EngineEvent> {
        let events =
            self.tools.pointer_moved(&mut self.backend, &mut self.store, page_index, point);
        self.process(events)
    }

    pub fn pointer_up(&mut self, page_index: u16, point: PagePoint) -> Vec<EngineEvent> {
        let events = self.tools.pointer_up(&mut self.backend, &mut self.store, page_index, point);
        self.process(events)
    }

    /// Apply the active markup tool to a finished text selection.
    pub fn apply_selection(&mut self, selection: &Selection) -> Vec<EngineEvent> {
        let events = self.tools.apply_selection(&mut self.backend, &mut self.store, selection);
        self.process(events)
    }

    /// Place a free-text annotation at `at`.
    ///
    /// Bounds extend downward from the click point, sized by the backend's
    /// layout with line padding above and below so ascenders and
    /// descenders survive rendering.
    pub fn create_free_text(
        &mut self,
        page_index: u16,
        at: PagePoint,
        text: &str,
        font_size: f32,
        color: AnnotationColor,
    ) -> Result<Vec<EngineEvent>, EngineError> {
        let bounds = free_text_bounds(at, text, font_size, &self.backend);
        let spec = NewNativeAnnotation::new(type_tag::FREE_TEXT, bounds, color.rgb())
            .with_contents(text)
            .with_font_size(font_size);
        self.backend.add_annotation(page_index, spec)?;
        Ok(self.process(vec![EngineEvent::SaveRequested]))
    }

    /// Replace the text of an existing free-text annotation. The origin
    /// stays put; only the body is re-measured.
    pub fn edit_free_text(
        &mut self,
        id: NativeId,
        text: &str,
        font_size: f32,
    ) -> Result<Vec<EngineEvent>, EngineError> {
        let native = self.backend.annotation(id).ok_or_else(|| {
            EngineError::Backend(crate::native::BackendError::UnknownAnnotation(id))
        })?;
        self.backend.set_contents(id, Some(text.to_string()))?;

        let origin = native.bounds.origin();
        let sized = free_text_bounds(origin, text, font_size, &self.backend);
        self.backend.set_bounds(id, PageRect::new(origin.x, origin.y, sized.width, sized.height))?;
        Ok(self.process(vec![EngineEvent::SaveRequested]))
    }

    /// Edit the note content of a record, from the user or from OCR.
    pub fn edit_content(
        &mut self,
        id: AnnotationId,
        content: Option<String>,
        source: EditSource,
    ) -> Result<Vec<EngineEvent>, EngineError> {
        let record = self.store.get(id).ok_or(EngineError::UnknownAnnotation(id))?.clone();

        if let Some(native) = sync::find_native_for_record(&self.backend, &record) {
            self.backend.set_contents(native.id, content.clone())?;
        }

        if self.store.update_content(id, content) {
            Ok(self.process(vec![
                EngineEvent::AnnotationUpdated { id, source },
                EngineEvent::SaveRequested,
            ]))
        } else {
            Ok(Vec::new())
        }
    }

    /// Recolor an annotation in both the document and the store.
    pub fn set_annotation_color(
        &mut self,
        id: AnnotationId,
        color: AnnotationColor,
    ) -> Result<Vec<EngineEvent>, EngineError> {
        let record = self.store.get(id).ok_or(EngineError::UnknownAnnotation(id))?.clone();

        if let Some(native) = sync::find_native_for_record(&self.backend, &record) {
            self.backend.set_color(native.id, color.rgb())?;
        }

        if self.store.update_color(id, color) {
            Ok(self.process(vec![
                EngineEvent::AnnotationUpdated { id, source: EditSource::User },
                EngineEvent::SaveRequested,
            ]))
        } else {
            Ok(Vec::new())
        }
    }

    /// Delete an annotation from the document and the store together.
    pub fn delete_annotation(&mut self, id: AnnotationId) -> Result<Vec<EngineEvent>, EngineError> {
        let record = self.store.get(id).ok_or(EngineError::UnknownAnnotation(id))?.clone();

        if let Some(native) = sync::find_native_for_record(&self.backend, &record) {
            self.backend.remove_annotation(native.id)?;
        }
        self.store.remove(id);

        Ok(self.process(vec![EngineEvent::AnnotationRemoved { id }, EngineEvent::SaveRequested]))
    }

    /// Start translating a record's source text.
    ///
    /// Returns the work token and the text to translate, cancelling any
    /// outstanding translation. Records without source text yield None.
    pub fn begin_translation(&mut self, id: AnnotationId) -> Option<(TaskToken, String)> {
        let text = self.store.get(id)?.source_text.clone()?;
        Some((self.translation.begin(), text))
    }

    /// Apply a finished translation if it is still the current request.
    pub fn apply_translation(&mut self, token: TaskToken, id: AnnotationId, text: String) -> bool {
        if !self.translation.accepts(token) {
            debug!(?id, "dropping stale translation result");
            return false;
        }
        let Some(record) = self.store.get_mut(id) else {
            return false;
        };
        record.set_translation(Some(text));
        self.request_save();
        true
    }

    /// Start answering a question against a record's source text.
    pub fn begin_question(&mut self, id: AnnotationId) -> Option<(TaskToken, String)> {
        let text = self.store.get(id)?.source_text.clone()?;
        Some((self.qa.begin(), text))
    }

    pub fn apply_answer(&mut self, token: TaskToken, id: AnnotationId, answer: String) -> bool {
        if !self.qa.accepts(token) {
            debug!(?id, "dropping stale answer");
            return false;
        }
        let Some(record) = self.store.get_mut(id) else {
            return false;
        };
        record.set_qa_result(Some(answer));
        self.request_save();
        true
    }

    /// Start OCR over a record's page region, for annotations whose text
    /// layer yielded nothing selectable.
    pub fn begin_ocr(&mut self, id: AnnotationId) -> Option<(TaskToken, u16, PageRect)> {
        let record = self.store.get(id)?;
        Some((self.ocr.begin(), record.page_index, record.rect))
    }

    /// Fold an OCR result in as a content edit tagged [`EditSource::Ocr`].
    pub fn apply_ocr_result(
        &mut self,
        token: TaskToken,
        id: AnnotationId,
        text: String,
    ) -> Result<Vec<EngineEvent>, EngineError> {
        if !self.ocr.accepts(token) {
            debug!(?id, "dropping stale OCR result");
            return Ok(Vec::new());
        }
        self.edit_content(id, Some(text), EditSource::Ocr)
    }

    /// Write the document through if the debounce window has closed.
    ///
    /// The shell calls this from its timer callback. Mutations only mark
    /// the document dirty, so editing never blocks on a write and a burst
    /// of edits costs one.
    pub fn pump(&mut self) {
        if self.document_write.should_write(self.coordinator.config()) {
            self.write_document();
        }
    }

    /// Flush pending persistence and close the session.
    pub fn close(mut self) {
        self.request_save();
        self.write_document();
        self.coordinator.flush();
    }

    /// Snapshot the store for the cache and mark the document dirty for
    /// the next [`Self::pump`].
    fn request_save(&mut self) {
        self.coordinator.mark_dirty(self.store.to_vec());
        self.document_write.mark_dirty();
    }

    /// Write the document through, falling back to the secondary write
    /// path once. A write that fails both ways stays dirty and is retried
    /// on the next pump; failures are logged, never fatal.
    fn write_document(&mut self) {
        if !self.document_write.is_dirty() {
            return;
        }
        if let Err(err) = self.backend.write() {
            warn!(%err, "document write failed, trying fallback");
            if let Err(err) = self.backend.write_fallback() {
                warn!(%err, "fallback document write failed");
                return;
            }
        }
        self.document_write.clear();
    }

    fn process(&mut self, events: Vec<EngineEvent>) -> Vec<EngineEvent> {
        if events.iter().any(|e| matches!(e, EngineEvent::SaveRequested)) {
            self.request_save();
        }
        events
    }
}

/// Bounds for free text placed at `at`, extending downward.
fn free_text_bounds(
    at: PagePoint,
    text: &str,
    font_size: f32,
    measurer: &impl TextMeasurer,
) -> PageRect {
    let measured = measurer.measure(text, font_size, FREE_TEXT_MAX_WIDTH);
    let width = measured.width.ceil().max(FREE_TEXT_MIN_WIDTH);
    let height = measured.height.ceil() + measured.line_height * 0.4 + measured.line_height * 0.8;
    PageRect::new(at.x, at.y - height, width, height)
}
