//! Provisioning of identity rows for externally authenticated users.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, instrument};

use crate::application::repos::{CreateUserParams, RepoError, UsersWriteRepo};
use crate::domain::entities::UserRecord;
use crate::domain::slug::{UsernameError, validate_username};

#[derive(Debug, Error)]
pub enum UserError {
    #[error("invalid username: {0}")]
    InvalidUsername(#[from] UsernameError),
    #[error("user `{0}` already exists")]
    Conflict(String),
    #[error(transparent)]
    Repo(RepoError),
}

#[derive(Clone)]
pub struct UserService {
    writer: Arc<dyn UsersWriteRepo>,
}

impl UserService {
    pub fn new(writer: Arc<dyn UsersWriteRepo>) -> Self {
        Self { writer }
    }

    #[instrument(skip(self))]
    pub async fn create_user(&self, username: &str) -> Result<UserRecord, UserError> {
        validate_username(username)?;

        let user = self
            .writer
            .create_user(CreateUserParams {
                username: username.to_string(),
            })
            .await
            .map_err(|err| match err {
                RepoError::Duplicate { .. } => UserError::Conflict(username.to_string()),
                other => UserError::Repo(other),
            })?;

        info!(user_id = user.id, "user created");
        Ok(user)
    }
}
