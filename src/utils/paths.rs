//! Backend file path and inline image helpers.

use base64::{engine::general_purpose::STANDARD, Engine};

const FILES_ROUTE: &str = "/api/files/";

/// Map a backend file path onto the route that serves it.
///
/// The backend reports absolute paths inside its upload folder. Preprocessed
/// outputs live under `<task dir>/processed/`, extracted frames under
/// `video_<task>/frames/`. Paths that are already routes pass through.
pub fn server_file_route(path: &str) -> String {
    let path = path.replace('\\', "/");

    if path.starts_with(FILES_ROUTE) {
        return path;
    }

    if let Some(processed_at) = path.find("/processed/") {
        let task_dir = path[..processed_at].rsplit('/').next().unwrap_or_default();
        let rest = &path[processed_at + 1..];
        return if task_dir.is_empty() {
            format!("{}{}", FILES_ROUTE, rest)
        } else {
            format!("{}{}/{}", FILES_ROUTE, task_dir, rest)
        };
    }

    if let Some(video_at) = path.find("video_") {
        return format!("{}{}", FILES_ROUTE, &path[video_at..]);
    }

    if let Some(uploads_at) = path.rfind("uploads/") {
        return format!("{}{}", FILES_ROUTE, &path[uploads_at + "uploads/".len()..]);
    }

    let relative = path.strip_prefix("/tmp/").unwrap_or(&path);
    format!("{}{}", FILES_ROUTE, relative.trim_start_matches('/'))
}

/// Decode a `data:<mime>;base64,<payload>` URI (or a bare base64 payload).
pub fn decode_data_uri(uri: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let payload = match uri.split_once(";base64,") {
        Some((_, payload)) => payload,
        None => uri,
    };
    STANDARD.decode(payload.trim())
}
