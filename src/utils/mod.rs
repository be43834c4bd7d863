//! Shared utility functions.
//!
//! - `mime`: content-type detection and input classification
//! - `ordinal`: recovering page/frame ordinals from artifact filenames
//! - `paths`: mapping backend file paths to fetchable routes

mod mime;
mod ordinal;
mod paths;

pub use mime::{classify_mime, detect_mime, InputCategory, VIDEO_EXTENSIONS};
pub use ordinal::{parse_ordinal, ArtifactNaming};
pub use paths::{decode_data_uri, server_file_route};
