//! Annotation engine for the reader.
//!
//! The document file is the single source of truth: every annotation lives
//! in the document's native annotation set, reached through the
//! [`native::DocumentBackend`] trait. The [`store::AnnotationStore`] is a
//! derived view that feeds the annotation list panel, reconciled against
//! the native set by [`sync`] and snapshotted to disk through the
//! [`write_coordinator::WriteCoordinator`].

pub mod document;
pub mod enrichment;
pub mod geometry;
pub mod native;
pub mod store;
pub mod sync;
pub mod tools;
pub mod write_coordinator;

pub use document::{DocumentSession, SessionConfig};
pub use enrichment::{
    EditSource, EnrichmentError, MeasuredText, OcrEngine, QuestionAnswerer, TaskSlot, TaskToken,
    TextMeasurer, Translator,
};
pub use native::{
    normalize_type_tag, BackendError, DocumentBackend, MemoryBackend, NativeAnnotation, NativeId,
    NewNativeAnnotation, Selection, TextProvider,
};
pub use store::AnnotationStore;
pub use sync::{SyncReport, MATCH_TOLERANCE};
pub use tools::{AnnotationTool, EngineEvent, ToolController};
pub use write_coordinator::{WriteCoordinator, WriteCoordinatorConfig};

/// Engine-level failure.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("document backend error: {0}")]
    Backend(#[from] native::BackendError),
    #[error("unknown annotation {0}")]
    UnknownAnnotation(doc_model::AnnotationId),
}
