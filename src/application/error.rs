use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    application::{
        feed::FeedError, follows::FollowError, groups::GroupError, posts::PostError,
        users::UserError,
    },
    config::LoadError,
    infra::error::InfraError,
};

/// Diagnostic details attached to a response for the response-logging layer.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = vec![error.to_string()];
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    public_message: &'static str,
    report: ErrorReport,
}

impl HttpError {
    pub fn new(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        detail: impl Into<String>,
    ) -> Self {
        let report = ErrorReport::from_message(source, status, detail);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn from_error(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        error: &dyn StdError,
    ) -> Self {
        let report = ErrorReport::from_error(source, status, error);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn report(&self) -> &ErrorReport {
        &self.report
    }

    fn not_found(source: &'static str, detail: impl Into<String>) -> Self {
        Self::new(source, StatusCode::NOT_FOUND, "Page not found", detail)
    }

    fn internal(source: &'static str, error: &dyn StdError) -> Self {
        Self::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
            error,
        )
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.public_message).into_response();
        self.report.attach(&mut response);
        response
    }
}

impl From<FeedError> for HttpError {
    fn from(error: FeedError) -> Self {
        const SOURCE: &str = "application::feed::FeedError";
        match error {
            FeedError::UnknownGroup(slug) => {
                HttpError::not_found(SOURCE, format!("group `{slug}` does not exist"))
            }
            FeedError::UnknownAuthor(username) => {
                HttpError::not_found(SOURCE, format!("user `{username}` does not exist"))
            }
            FeedError::UnknownPost(id) => {
                HttpError::not_found(SOURCE, format!("post {id} does not exist"))
            }
            FeedError::Unauthorized => HttpError::new(
                SOURCE,
                StatusCode::UNAUTHORIZED,
                "Authentication required",
                "followed feed requested without a viewer",
            ),
            FeedError::Repo(err) => HttpError::internal(SOURCE, &err),
        }
    }
}

impl From<FollowError> for HttpError {
    fn from(error: FollowError) -> Self {
        const SOURCE: &str = "application::follows::FollowError";
        match error {
            FollowError::UnknownAuthor(username) => {
                HttpError::not_found(SOURCE, format!("user `{username}` does not exist"))
            }
            FollowError::NotFollowing(username) => {
                HttpError::not_found(SOURCE, format!("no follow relation for `{username}`"))
            }
            FollowError::Repo(err) => HttpError::internal(SOURCE, &err),
        }
    }
}

impl From<PostError> for HttpError {
    fn from(error: PostError) -> Self {
        const SOURCE: &str = "application::posts::PostError";
        match error {
            PostError::UnknownPost(id) => {
                HttpError::not_found(SOURCE, format!("post {id} does not exist"))
            }
            PostError::Forbidden { post_id } => HttpError::new(
                SOURCE,
                StatusCode::FORBIDDEN,
                "Forbidden",
                format!("viewer is not the author of post {post_id}"),
            ),
            PostError::Validation(errors) => HttpError::new(
                SOURCE,
                StatusCode::BAD_REQUEST,
                "Request could not be processed",
                format!(
                    "invalid fields: {}",
                    errors
                        .fields()
                        .map(|(name, _)| name)
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            ),
            PostError::Storage(err) => HttpError::internal(SOURCE, &err),
            PostError::Repo(err) => HttpError::internal(SOURCE, &err),
        }
    }
}

/// Failures surfaced by the binary entry points.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] LoadError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Group(#[from] GroupError),
    #[error(transparent)]
    User(#[from] UserError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}
