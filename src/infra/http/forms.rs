use axum::extract::{Multipart, multipart::MultipartError};
use serde::Deserialize;

use crate::application::error::HttpError;
use crate::application::posts::{CommentSubmission, ImageUpload, PostSubmission};

const SOURCE: &str = "infra::http::forms";

/// Urlencoded body of the comment form.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct CommentForm {
    text: String,
}

impl From<CommentForm> for CommentSubmission {
    fn from(form: CommentForm) -> Self {
        Self { text: form.text }
    }
}

/// Collect the post form fields from a multipart body. Unknown fields are
/// skipped; an empty file input counts as no image.
pub(super) async fn read_post_submission(
    mut multipart: Multipart,
) -> Result<PostSubmission, HttpError> {
    let mut submission = PostSubmission::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "text" => submission.text = field.text().await.map_err(multipart_error)?,
            "group" => {
                let value = field.text().await.map_err(multipart_error)?;
                submission.group = (!value.trim().is_empty()).then_some(value);
            }
            "image" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                if !bytes.is_empty() {
                    submission.image = Some(ImageUpload { filename, bytes });
                }
            }
            _ => {}
        }
    }

    Ok(submission)
}

fn multipart_error(err: MultipartError) -> HttpError {
    HttpError::from_error(SOURCE, err.status(), "Invalid form submission", &err)
}
