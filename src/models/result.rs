//! Recognized text per page or frame.

/// Text recognized for one page or frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrResult {
    pub number: u32,
    pub text: String,
    /// Per-item error reported by the backend, if recognition failed for it.
    pub error: Option<String>,
}

impl OcrResult {
    pub fn new(number: u32, text: impl Into<String>) -> Self {
        Self {
            number,
            text: text.into(),
            error: None,
        }
    }
}
