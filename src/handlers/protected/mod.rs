// handlers/protected/mod.rs - Protected handlers
//
// Every route here needs a valid auth token. The gate resolves it into a
// `CallerIdentity` which each handler takes as an extractor and passes on
// to the services explicitly.

pub mod account;
pub mod feeds;
pub mod pets;

use axum::http::{header::CONTENT_TYPE, HeaderMap};

/// Content type of an uploaded photo, defaulting to raw bytes.
pub(crate) fn upload_content_type(headers: &HeaderMap) -> String {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .unwrap_or("application/octet-stream")
        .to_string()
}
