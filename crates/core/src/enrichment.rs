//! Enrichment collaborators and stale-result handling.
//!
//! Translation, question answering, and OCR run outside the engine; the
//! engine only hands out work and takes results back. Each concern gets a
//! [`TaskSlot`] with a generation counter: starting new work invalidates
//! every token handed out before, so a slow result that arrives after the
//! user moved on is dropped instead of clobbering fresh state.

use doc_model::PageRect;

/// Who produced a content edit.
///
/// OCR results flow through the same content-edit path as typed text; the
/// tag is how listeners tell them apart. No timing heuristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditSource {
    User,
    Ocr,
}

#[derive(Debug, thiserror::Error)]
pub enum EnrichmentError {
    #[error("enrichment backend unavailable")]
    Unavailable,
    #[error("enrichment failed: {0}")]
    Failed(String),
}

/// Translates annotation source text.
pub trait Translator {
    fn translate(&self, text: &str) -> Result<String, EnrichmentError>;
}

/// Answers a question against annotation source text.
pub trait QuestionAnswerer {
    fn answer(&self, context: &str, question: &str) -> Result<String, EnrichmentError>;
}

/// Recognizes text in a page region, for documents without a text layer.
pub trait OcrEngine {
    fn recognize_region(&self, page_index: u16, rect: PageRect) -> Result<String, EnrichmentError>;
}

/// Measures text layout for free-text annotation bounds.
pub trait TextMeasurer {
    fn measure(&self, text: &str, font_size: f32, max_width: f32) -> MeasuredText;
}

/// Layout result for a block of text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasuredText {
    pub width: f32,
    pub height: f32,
    pub line_height: f32,
}

/// Token for one unit of enrichment work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskToken(u64);

/// Cancel-and-replace slot for one enrichment concern.
///
/// `begin` invalidates every outstanding token; `accepts` tells a
/// completion whether its result is still wanted.
#[derive(Debug, Default)]
pub struct TaskSlot {
    generation: u64,
}

impl TaskSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new unit of work, cancelling any outstanding one.
    pub fn begin(&mut self) -> TaskToken {
        self.generation += 1;
        TaskToken(self.generation)
    }

    /// Invalidate outstanding work without starting new work.
    pub fn cancel(&mut self) {
        self.generation += 1;
    }

    /// Whether a completion carrying this token should be applied.
    pub fn accepts(&self, token: TaskToken) -> bool {
        token.0 == self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replacing_work_invalidates_older_token() {
        let mut slot = TaskSlot::new();
        let first = slot.begin();
        assert!(slot.accepts(first));

        let second = slot.begin();
        assert!(!slot.accepts(first));
        assert!(slot.accepts(second));
    }

    #[test]
    fn cancel_invalidates_without_new_token() {
        let mut slot = TaskSlot::new();
        let token = slot.begin();
        slot.cancel();
        assert!(!slot.accepts(token));
    }
}
