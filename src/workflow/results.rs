//! Accumulated OCR text.

use std::collections::BTreeSet;

use crate::models::OcrResult;
use crate::utils::ArtifactNaming;

/// Outcome flags shown alongside the results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultFlags {
    pub complete: bool,
    pub error: Option<String>,
}

/// Per-page text in arrival order.
#[derive(Debug, Clone, Default)]
pub struct ResultAggregator {
    items: Vec<OcrResult>,
    seen: BTreeSet<u32>,
    flags: ResultFlags,
}

impl ResultAggregator {
    /// Append text for a page or frame. Returns false if it was already recorded.
    pub fn append(&mut self, number: u32, text: impl Into<String>, error: Option<String>) -> bool {
        if !self.seen.insert(number) {
            return false;
        }
        self.items.push(OcrResult {
            number,
            text: text.into(),
            error,
        });
        true
    }

    pub fn items(&self) -> &[OcrResult] {
        &self.items
    }

    pub fn contains(&self, number: u32) -> bool {
        self.seen.contains(&number)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn flags(&self) -> &ResultFlags {
        &self.flags
    }

    pub fn mark_complete(&mut self) {
        self.flags.complete = true;
        self.flags.error = None;
    }

    pub fn record_error(&mut self, message: impl Into<String>) {
        self.flags.error = Some(message.into());
    }

    /// Render all text with a header per item.
    pub fn export(&self, naming: ArtifactNaming) -> String {
        self.items
            .iter()
            .map(|item| {
                let body = match (&item.error, item.text.is_empty()) {
                    (Some(error), true) => format!("[recognition failed: {}]", error),
                    _ => item.text.clone(),
                };
                format!("=== {} {} ===\n{}", naming.label(), item.number, body)
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Drop all results and flags.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
