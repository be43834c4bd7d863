//! Recovering page/frame ordinals from artifact filenames.
//!
//! The backend names rasterized pages `page_<n>.png` and extracted frames
//! `frame_<n>.jpg`, and echoes those names back from preprocessing. Every
//! place that maps a returned item onto a page or frame goes through here.

use std::sync::LazyLock;

use regex::Regex;

static PAGE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"page_(\d+)").expect("valid page pattern"));

static FRAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"frame_(\d+)").expect("valid frame pattern"));

/// Naming scheme used for the items of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactNaming {
    /// PDF pages and single images: `page_<n>.png`.
    Page,
    /// Video frames: `frame_<n>.jpg`.
    Frame,
}

impl ArtifactNaming {
    fn pattern(&self) -> &'static Regex {
        match self {
            Self::Page => &PAGE_PATTERN,
            Self::Frame => &FRAME_PATTERN,
        }
    }

    /// Filename under which the item with this ordinal is uploaded.
    pub fn file_name(&self, ordinal: u32) -> String {
        match self {
            Self::Page => format!("page_{}.png", ordinal),
            Self::Frame => format!("frame_{}.jpg", ordinal),
        }
    }

    /// Header label used when exporting text.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Page => "Page",
            Self::Frame => "Frame",
        }
    }
}

/// Extract the first embedded ordinal matching `naming` from a filename.
///
/// Only the final path component is inspected. Returns `None` when the name
/// does not follow the pattern or the number does not fit in a `u32`.
pub fn parse_ordinal(naming: ArtifactNaming, filename: &str) -> Option<u32> {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    naming
        .pattern()
        .captures(name)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}
