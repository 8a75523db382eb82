//! Document-scoped annotation store.
//!
//! A derived view over the document's native annotation set. The list
//! panel reads from here; reconciliation against the document itself is
//! the sync module's job.

use doc_model::{AnnotationColor, AnnotationId, AnnotationRecord, AnnotationType, PagePoint};
use std::cmp::Ordering;

/// Vertical tolerance when grouping records into the same visual line for
/// display ordering.
const LINE_TOLERANCE: f32 = 1.0;

#[derive(Debug, Default)]
pub struct AnnotationStore {
    records: Vec<AnnotationRecord>,
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AnnotationRecord> {
        self.records.iter()
    }

    pub fn get(&self, id: AnnotationId) -> Option<&AnnotationRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn get_mut(&mut self, id: AnnotationId) -> Option<&mut AnnotationRecord> {
        self.records.iter_mut().find(|r| r.id == id)
    }

    pub fn add(&mut self, record: AnnotationRecord) -> AnnotationId {
        let id = record.id;
        self.records.push(record);
        id
    }

    pub fn remove(&mut self, id: AnnotationId) -> Option<AnnotationRecord> {
        let index = self.records.iter().position(|r| r.id == id)?;
        Some(self.records.remove(index))
    }

    /// Replace the whole record set, e.g. from a cache preload.
    pub fn replace_all(&mut self, records: Vec<AnnotationRecord>) {
        self.records = records;
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn to_vec(&self) -> Vec<AnnotationRecord> {
        self.records.clone()
    }

    /// Update a record's content, skipping the write when nothing changes.
    ///
    /// Returns true when the record was actually modified.
    pub fn update_content(&mut self, id: AnnotationId, content: Option<String>) -> bool {
        let Some(record) = self.get_mut(id) else {
            return false;
        };
        if record.content == content {
            return false;
        }
        record.set_content(content);
        true
    }

    /// Update a record's color; no-op updates are skipped.
    pub fn update_color(&mut self, id: AnnotationId, color: AnnotationColor) -> bool {
        let Some(record) = self.get_mut(id) else {
            return false;
        };
        if record.color == color {
            return false;
        }
        record.set_color(color);
        true
    }

    /// Find the record matching a native annotation's identity triple:
    /// same kind, same page, bounds origin within `tolerance` on each axis.
    pub fn find_match(
        &self,
        kind: AnnotationType,
        page_index: u16,
        origin: PagePoint,
        tolerance: f32,
    ) -> Option<&AnnotationRecord> {
        self.records.iter().find(|record| {
            record.kind == kind
                && record.page_index == page_index
                && (record.rect.x - origin.x).abs() < tolerance
                && (record.rect.y - origin.y).abs() < tolerance
        })
    }

    /// Records in display order: page ascending, then top to bottom
    /// (y descending, with a small tolerance), then left to right.
    pub fn sorted(&self) -> Vec<&AnnotationRecord> {
        let mut sorted: Vec<&AnnotationRecord> = self.records.iter().collect();
        sorted.sort_by(|a, b| {
            match a.page_index.cmp(&b.page_index) {
                Ordering::Equal => {}
                other => return other,
            }
            if (a.rect.y - b.rect.y).abs() <= LINE_TOLERANCE {
                a.rect.x.partial_cmp(&b.rect.x).unwrap_or(Ordering::Equal)
            } else {
                b.rect.y.partial_cmp(&a.rect.y).unwrap_or(Ordering::Equal)
            }
        });
        sorted
    }
}
