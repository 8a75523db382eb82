//! Reconciliation between the native annotation set and the store.
//!
//! The document always wins: loading walks every page and folds what it
//! finds into the store, and single-annotation syncs run after each edit.
//! Matching uses the identity triple (kind, page, bounds origin within
//! [`MATCH_TOLERANCE`]).

use crate::native::{type_tag, DocumentBackend, NativeAnnotation, TextProvider};
use crate::store::AnnotationStore;
use doc_model::{AnnotationColor, AnnotationId, AnnotationRecord, AnnotationType};
use tracing::debug;

/// Per-axis tolerance for matching a native annotation to a store record.
pub const MATCH_TOLERANCE: f32 = 1.0;

/// Counts of what a reconciliation pass changed.
///
/// A second pass over unchanged input reports all zeros.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub inserted: usize,
    pub updated: usize,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.inserted == 0 && self.updated == 0
    }
}

/// Store record kind for a native annotation, if the kind participates in
/// sync. Ink and free text are managed by the tool layer directly.
pub fn record_kind(native: &NativeAnnotation) -> Option<AnnotationType> {
    match native.normalized_tag() {
        type_tag::TEXT => Some(AnnotationType::TextNote),
        type_tag::HIGHLIGHT => Some(AnnotationType::Highlight),
        type_tag::UNDERLINE => Some(AnnotationType::Underline),
        type_tag::STRIKEOUT => Some(AnnotationType::Strikeout),
        _ => None,
    }
}

/// Split a native annotation into record content fields.
///
/// Markup kinds re-select their bounds through the text layer for the
/// source text and keep `contents` as the user's note; notes use
/// `contents` as the note itself. Empty strings collapse to `None`.
fn content_fields(
    native: &NativeAnnotation,
    kind: AnnotationType,
    text: &impl TextProvider,
) -> (Option<String>, Option<String>) {
    let contents = native.contents.clone().filter(|c| !c.is_empty());
    if kind.is_markup() {
        let source_text = text.text_in_rect(native.page_index, native.bounds);
        (contents, source_text)
    } else {
        (contents, None)
    }
}

/// Fold every supported native annotation into the store.
///
/// Existing records keep their id and content; only a color drift is
/// folded in. Unknown annotations become new records with their color
/// classified from raw RGB. Running this twice in a row reports zeros the
/// second time.
pub fn load_from_document(
    backend: &impl DocumentBackend,
    text: &impl TextProvider,
    store: &mut AnnotationStore,
) -> SyncReport {
    let mut report = SyncReport::default();

    for page_index in 0..backend.page_count() {
        for native in backend.annotations(page_index) {
            let Some(kind) = record_kind(&native) else {
                continue;
            };

            let detected = AnnotationColor::from_rgb(native.color);
            let existing = store
                .find_match(kind, native.page_index, native.bounds.origin(), MATCH_TOLERANCE)
                .map(|r| r.id);

            match existing {
                Some(id) => {
                    if store.update_color(id, detected) {
                        report.updated += 1;
                    }
                }
                None => {
                    let (content, source_text) = content_fields(&native, kind, text);
                    let mut record =
                        AnnotationRecord::new(kind, native.page_index, native.bounds, detected);
                    record.content = content;
                    record.source_text = source_text;
                    store.add(record);
                    report.inserted += 1;
                }
            }
        }
    }

    debug!(inserted = report.inserted, updated = report.updated, "document load reconciled");
    report
}

/// Reconcile one native annotation into the store after an edit.
///
/// A caller that just created the annotation passes the color it used, so
/// the record keeps the exact named color instead of a lossy classification
/// of the raw RGB. Returns the record's id, or None for kinds that do not
/// sync.
pub fn sync_one(
    native: &NativeAnnotation,
    provided_color: Option<AnnotationColor>,
    text: &impl TextProvider,
    store: &mut AnnotationStore,
) -> Option<AnnotationId> {
    let kind = record_kind(native)?;
    let color = provided_color.unwrap_or_else(|| AnnotationColor::from_rgb(native.color));
    let (content, source_text) = content_fields(native, kind, text);

    let existing = store
        .find_match(kind, native.page_index, native.bounds.origin(), MATCH_TOLERANCE)
        .map(|r| r.id);

    match existing {
        Some(id) => {
            store.update_content(id, content);
            store.update_color(id, color);
            if let Some(record) = store.get_mut(id) {
                if source_text.is_some() && record.source_text != source_text {
                    record.source_text = source_text;
                }
            }
            Some(id)
        }
        None => {
            let mut record = AnnotationRecord::new(kind, native.page_index, native.bounds, color);
            record.content = content;
            record.source_text = source_text;
            Some(store.add(record))
        }
    }
}

/// Remove the record matching a native annotation, if any.
///
/// This is the store half of deletion symmetry; the caller removes the
/// native annotation itself.
pub fn remove_matching(
    native: &NativeAnnotation,
    store: &mut AnnotationStore,
) -> Option<AnnotationRecord> {
    let kind = record_kind(native).or_else(|| {
        // Ink annotations keep freehand records even though they do not
        // participate in load reconciliation.
        (native.normalized_tag() == type_tag::INK).then_some(AnnotationType::Freehand)
    })?;
    let id = store
        .find_match(kind, native.page_index, native.bounds.origin(), MATCH_TOLERANCE)?
        .id;
    store.remove(id)
}

/// Find the native annotation matching a store record, by the same
/// identity triple in the opposite direction.
pub fn find_native_for_record(
    backend: &impl DocumentBackend,
    record: &AnnotationRecord,
) -> Option<NativeAnnotation> {
    backend.annotations(record.page_index).into_iter().find(|native| {
        let kind = record_kind(native).or_else(|| {
            (native.normalized_tag() == type_tag::INK).then_some(AnnotationType::Freehand)
        });
        kind == Some(record.kind)
            && (native.bounds.x - record.rect.x).abs() < MATCH_TOLERANCE
            && (native.bounds.y - record.rect.y).abs() < MATCH_TOLERANCE
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::{MemoryBackend, NewNativeAnnotation};
    use doc_model::{PagePoint, PageRect, Rgb};

    fn markup_backend() -> MemoryBackend {
        let mut backend = MemoryBackend::with_pages(2);
        backend.add_text_region(0, PageRect::new(72.0, 700.0, 200.0, 14.0), "selected words");
        backend
            .add_annotation(
                0,
                NewNativeAnnotation::new(
                    type_tag::HIGHLIGHT,
                    PageRect::new(72.0, 700.0, 120.0, 14.0),
                    AnnotationColor::Yellow.rgb(),
                ),
            )
            .unwrap();
        backend
            .add_annotation(
                1,
                NewNativeAnnotation::new(
                    "/Text",
                    PageRect::new(40.0, 500.0, 12.0, 12.0),
                    AnnotationColor::Blue.rgb(),
                )
                .with_contents("remember this"),
            )
            .unwrap();
        backend
    }

    #[test]
    fn load_inserts_records_with_split_content() {
        let backend = markup_backend();
        let mut store = AnnotationStore::new();

        let report = load_from_document(&backend, &backend, &mut store);
        assert_eq!(report, SyncReport { inserted: 2, updated: 0 });

        let highlight = store
            .iter()
            .find(|r| r.kind == AnnotationType::Highlight)
            .expect("highlight record");
        assert_eq!(highlight.source_text.as_deref(), Some("selected words"));
        assert_eq!(highlight.content, None);
        assert_eq!(highlight.color, AnnotationColor::Yellow);

        let note = store
            .iter()
            .find(|r| r.kind == AnnotationType::TextNote)
            .expect("note record");
        assert_eq!(note.content.as_deref(), Some("remember this"));
        assert_eq!(note.source_text, None);
        assert_eq!(note.color, AnnotationColor::Blue);
    }

    #[test]
    fn load_is_idempotent() {
        let backend = markup_backend();
        let mut store = AnnotationStore::new();

        let first = load_from_document(&backend, &backend, &mut store);
        assert!(!first.is_clean());
        let second = load_from_document(&backend, &backend, &mut store);
        assert!(second.is_clean());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn load_folds_in_color_drift() {
        let backend = markup_backend();
        let mut store = AnnotationStore::new();
        load_from_document(&backend, &backend, &mut store);

        // Recolor the native highlight out from under the store.
        let mut backend = backend;
        let native = backend.annotations(0).remove(0);
        backend.set_color(native.id, AnnotationColor::Green.rgb()).unwrap();

        let report = load_from_document(&backend, &backend, &mut store);
        assert_eq!(report, SyncReport { inserted: 0, updated: 1 });
        let highlight =
            store.iter().find(|r| r.kind == AnnotationType::Highlight).unwrap();
        assert_eq!(highlight.color, AnnotationColor::Green);
    }

    #[test]
    fn matching_tolerates_sub_point_drift_only() {
        let mut store = AnnotationStore::new();
        let backend = markup_backend();
        load_from_document(&backend, &backend, &mut store);

        let mut drifted = backend.annotations(0).remove(0);
        drifted.bounds.x += 0.9;
        drifted.bounds.y -= 0.9;
        assert!(sync_one(&drifted, None, &backend, &mut store).is_some());
        assert_eq!(store.len(), 2);

        drifted.bounds.x = 72.0 + 1.1;
        drifted.bounds.y = 700.0;
        sync_one(&drifted, None, &backend, &mut store);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn sync_one_prefers_provided_color() {
        let backend = markup_backend();
        let mut store = AnnotationStore::new();

        let native = backend.annotations(0).remove(0);
        let id = sync_one(&native, Some(AnnotationColor::Purple), &backend, &mut store)
            .expect("record id");
        assert_eq!(store.get(id).unwrap().color, AnnotationColor::Purple);
    }

    #[test]
    fn sync_one_updates_content_in_place() {
        let backend = markup_backend();
        let mut store = AnnotationStore::new();
        load_from_document(&backend, &backend, &mut store);

        let mut native = backend.annotations(0).remove(0);
        native.contents = Some("margin note".into());
        let id = sync_one(&native, None, &backend, &mut store).expect("record id");

        assert_eq!(store.len(), 2);
        let record = store.get(id).unwrap();
        assert_eq!(record.content.as_deref(), Some("margin note"));
        assert_eq!(record.source_text.as_deref(), Some("selected words"));
    }

    #[test]
    fn remove_matching_is_symmetric_with_load() {
        let backend = markup_backend();
        let mut store = AnnotationStore::new();
        load_from_document(&backend, &backend, &mut store);

        let native = backend.annotations(0).remove(0);
        let removed = remove_matching(&native, &mut store).expect("record removed");
        assert_eq!(removed.kind, AnnotationType::Highlight);
        assert_eq!(store.len(), 1);
        assert!(remove_matching(&native, &mut store).is_none());
    }

    #[test]
    fn reverse_lookup_finds_native_for_record() {
        let backend = markup_backend();
        let mut store = AnnotationStore::new();
        load_from_document(&backend, &backend, &mut store);

        let record =
            store.iter().find(|r| r.kind == AnnotationType::TextNote).unwrap().clone();
        let native = find_native_for_record(&backend, &record).expect("native annotation");
        assert_eq!(native.normalized_tag(), type_tag::TEXT);
        assert_eq!(native.bounds.origin(), PagePoint::new(40.0, 500.0));
    }

    #[test]
    fn unsupported_kinds_are_skipped() {
        let mut backend = MemoryBackend::with_pages(1);
        backend
            .add_annotation(
                0,
                NewNativeAnnotation::new(
                    "Squiggly",
                    PageRect::new(0.0, 0.0, 10.0, 10.0),
                    Rgb::new(1.0, 0.0, 0.0),
                ),
            )
            .unwrap();
        let mut store = AnnotationStore::new();
        assert!(load_from_document(&backend, &backend, &mut store).is_clean());
        assert!(store.is_empty());
    }
}
