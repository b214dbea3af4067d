//! Post authoring: creating and editing posts, and commenting on them.

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tracing::{info, instrument};

use crate::application::repos::{
    CommentsRepo, CreateCommentParams, CreatePostParams, GroupsRepo, PostsRepo, PostsWriteRepo,
    RepoError, UpdatePostParams,
};
use crate::domain::entities::{CommentRecord, GroupRecord, PostRecord, UserRecord};
use crate::domain::forms::{COMMENT_FORM, FieldValue, FormErrors, POST_FORM};

const UNKNOWN_GROUP_MESSAGE: &str =
    "Select a valid choice. That choice is not one of the available choices.";

#[derive(Debug, Error)]
#[error("failed to store image: {message}")]
pub struct StorageError {
    message: String,
}

impl StorageError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Blob storage for post images.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Persist the image and return its storage path relative to the media
    /// root (for example `posts/2023/01/08/<uuid>-cat.gif`).
    async fn store_image(&self, filename: &str, bytes: Bytes) -> Result<String, StorageError>;
}

#[derive(Debug, Error)]
pub enum PostError {
    #[error("unknown post {0}")]
    UnknownPost(i64),
    #[error("only the author may edit post {post_id}")]
    Forbidden { post_id: i64 },
    #[error("submitted form is invalid")]
    Validation(FormErrors),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub filename: String,
    pub bytes: Bytes,
}

/// Raw values of a submitted post form.
#[derive(Debug, Clone, Default)]
pub struct PostSubmission {
    pub text: String,
    pub group: Option<String>,
    pub image: Option<ImageUpload>,
}

impl PostSubmission {
    fn field_values(&self) -> BTreeMap<&str, FieldValue<'_>> {
        let mut values = BTreeMap::new();
        values.insert("text", FieldValue::Text(&self.text));
        if let Some(group) = self.group.as_deref() {
            values.insert("group", FieldValue::Choice(group));
        }
        if let Some(image) = self.image.as_ref() {
            values.insert("image", FieldValue::Image(&image.bytes));
        }
        values
    }

    fn group_id(&self) -> Option<i64> {
        self.group
            .as_deref()
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .and_then(|raw| raw.parse().ok())
    }

    fn image(&self) -> Option<&ImageUpload> {
        self.image.as_ref().filter(|image| !image.bytes.is_empty())
    }
}

#[derive(Debug, Clone, Default)]
pub struct CommentSubmission {
    pub text: String,
}

#[derive(Clone)]
pub struct PostService {
    posts: Arc<dyn PostsRepo>,
    writer: Arc<dyn PostsWriteRepo>,
    groups: Arc<dyn GroupsRepo>,
    comments: Arc<dyn CommentsRepo>,
    images: Arc<dyn ImageStore>,
    max_image_bytes: u64,
}

impl PostService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        writer: Arc<dyn PostsWriteRepo>,
        groups: Arc<dyn GroupsRepo>,
        comments: Arc<dyn CommentsRepo>,
        images: Arc<dyn ImageStore>,
        max_image_bytes: u64,
    ) -> Self {
        Self {
            posts,
            writer,
            groups,
            comments,
            images,
            max_image_bytes,
        }
    }

    /// Groups offered by the post form's `group` choice.
    pub async fn group_choices(&self) -> Result<Vec<GroupRecord>, PostError> {
        Ok(self.groups.list_groups().await?)
    }

    #[instrument(skip(self, author, submission), fields(author = %author.username))]
    pub async fn create_post(
        &self,
        author: &UserRecord,
        submission: PostSubmission,
    ) -> Result<PostRecord, PostError> {
        let group_id = self.validate_post(&submission).await?;
        let image = self.store_image(&submission).await?;

        let post = self
            .writer
            .create_post(CreatePostParams {
                author_id: author.id,
                text: submission.text.trim().to_string(),
                group_id,
                image,
            })
            .await?;

        info!(post_id = post.id, "post created");
        Ok(post)
    }

    /// Load a post for editing, enforcing authorship.
    pub async fn editable_post(&self, viewer: &UserRecord, id: i64) -> Result<PostRecord, PostError> {
        let post = self
            .posts
            .find_post(id)
            .await?
            .ok_or(PostError::UnknownPost(id))?;

        if post.author_id != viewer.id {
            return Err(PostError::Forbidden { post_id: id });
        }
        Ok(post)
    }

    /// Update text, group and image. The stored image is kept when the
    /// submission carries none.
    #[instrument(skip(self, viewer, submission), fields(viewer = %viewer.username))]
    pub async fn edit_post(
        &self,
        viewer: &UserRecord,
        id: i64,
        submission: PostSubmission,
    ) -> Result<PostRecord, PostError> {
        let existing = self.editable_post(viewer, id).await?;
        let group_id = self.validate_post(&submission).await?;
        let image = match self.store_image(&submission).await? {
            Some(path) => Some(path),
            None => existing.image,
        };

        let post = self
            .writer
            .update_post(UpdatePostParams {
                id,
                text: submission.text.trim().to_string(),
                group_id,
                image,
            })
            .await?;

        info!(post_id = post.id, "post updated");
        Ok(post)
    }

    /// Add a comment to a post. Invalid submissions are dropped and reported
    /// as `Ok(None)`.
    #[instrument(skip(self, viewer, submission), fields(viewer = %viewer.username))]
    pub async fn add_comment(
        &self,
        viewer: &UserRecord,
        post_id: i64,
        submission: CommentSubmission,
    ) -> Result<Option<CommentRecord>, PostError> {
        let post = self
            .posts
            .find_post(post_id)
            .await?
            .ok_or(PostError::UnknownPost(post_id))?;

        let values = BTreeMap::from([("text", FieldValue::Text(&submission.text))]);
        if COMMENT_FORM.validate(&values).is_err() {
            return Ok(None);
        }

        let comment = self
            .comments
            .create_comment(CreateCommentParams {
                post_id: post.id,
                author_id: viewer.id,
                text: submission.text.trim().to_string(),
            })
            .await?;
        Ok(Some(comment))
    }

    async fn validate_post(&self, submission: &PostSubmission) -> Result<Option<i64>, PostError> {
        let mut errors = POST_FORM
            .validate(&submission.field_values())
            .err()
            .unwrap_or_default();

        if let Some(image) = submission.image() {
            if image.bytes.len() as u64 > self.max_image_bytes {
                errors.add(
                    "image",
                    format!(
                        "Ensure the image is at most {} bytes (it has {}).",
                        self.max_image_bytes,
                        image.bytes.len()
                    ),
                );
            }
        }

        let group_id = submission.group_id();
        if let Some(id) = group_id {
            if errors.for_field("group").is_empty() && self.groups.find_group(id).await?.is_none() {
                errors.add("group", UNKNOWN_GROUP_MESSAGE);
            }
        }

        if errors.is_empty() {
            Ok(group_id)
        } else {
            Err(PostError::Validation(errors))
        }
    }

    async fn store_image(&self, submission: &PostSubmission) -> Result<Option<String>, PostError> {
        match submission.image() {
            Some(image) => {
                let path = self
                    .images
                    .store_image(&image.filename, image.bytes.clone())
                    .await?;
                Ok(Some(path))
            }
            None => Ok(None),
        }
    }
}
