mod auth;
mod forms;
mod middleware;
mod public;

pub use auth::{CurrentUser, Viewer, login_redirect};
pub use public::{HttpState, build_router};

use crate::application::error::HttpError;
use crate::application::repos::RepoError;
use axum::http::StatusCode;

/// Extra room granted to multipart bodies on top of the image limit.
const FORM_OVERHEAD_BYTES: u64 = 64 * 1024;

/// Map a repository error to a consistent HTTP error response.
pub fn repo_error_to_http(source: &'static str, err: RepoError) -> HttpError {
    match err {
        RepoError::Duplicate { constraint } => {
            HttpError::new(source, StatusCode::CONFLICT, "Duplicate record", constraint)
        }
        RepoError::NotFound => HttpError::new(
            source,
            StatusCode::NOT_FOUND,
            "Resource not found",
            "resource not found",
        ),
        RepoError::InvalidInput { message } => {
            HttpError::new(source, StatusCode::BAD_REQUEST, "Invalid input", message)
        }
        RepoError::Integrity { message } => HttpError::new(
            source,
            StatusCode::CONFLICT,
            "Integrity constraint violated",
            message,
        ),
        RepoError::Timeout => HttpError::new(
            source,
            StatusCode::SERVICE_UNAVAILABLE,
            "Database timeout",
            "Database timeout",
        ),
        RepoError::Persistence(message) => HttpError::new(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Persistence error",
            message,
        ),
    }
}

/// Request body limit for routes that accept an image upload.
fn upload_body_limit(max_image_bytes: u64) -> usize {
    usize::try_from(max_image_bytes.saturating_add(FORM_OVERHEAD_BYTES)).unwrap_or(usize::MAX)
}
