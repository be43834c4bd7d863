//! MIME type detection and input categorization.

use std::path::Path;

/// Video container extensions accepted by the frame extractor.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "webm"];

/// What an input file can be used as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputCategory {
    /// PNG or JPEG still image.
    Image,
    /// Multi-page PDF document.
    Pdf,
    /// Video container suitable for frame extraction.
    Video,
    /// Anything else.
    Unsupported,
}

/// Detect the MIME type of a file from its magic bytes, falling back to its name.
pub fn detect_mime(bytes: &[u8], name: &str) -> String {
    if let Some(detected) = infer::get(bytes) {
        return detected.mime_type().to_string();
    }

    mime_guess::from_path(Path::new(name))
        .first_or_octet_stream()
        .to_string()
}

/// Categorize a MIME type for ingestion.
pub fn classify_mime(mime: &str) -> InputCategory {
    let normalized = mime
        .split(';')
        .next()
        .unwrap_or(mime)
        .trim()
        .to_lowercase();

    match normalized.as_str() {
        "image/png" | "image/jpeg" | "image/jpg" => InputCategory::Image,
        "application/pdf" => InputCategory::Pdf,
        m if m.starts_with("video/") => InputCategory::Video,
        // mime_guess reports .mkv as this
        "application/x-matroska" => InputCategory::Video,
        _ => InputCategory::Unsupported,
    }
}
