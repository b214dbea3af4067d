use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, instrument};

use crate::application::repos::{FollowsRepo, RepoError, UsersRepo};
use crate::domain::entities::UserRecord;

#[derive(Debug, Error)]
pub enum FollowError {
    #[error("unknown author `{0}`")]
    UnknownAuthor(String),
    #[error("not following `{0}`")]
    NotFollowing(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Result of a follow request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    Followed,
    AlreadyFollowing,
    SelfFollow,
}

#[derive(Clone)]
pub struct FollowService {
    users: Arc<dyn UsersRepo>,
    follows: Arc<dyn FollowsRepo>,
}

impl FollowService {
    pub fn new(users: Arc<dyn UsersRepo>, follows: Arc<dyn FollowsRepo>) -> Self {
        Self { users, follows }
    }

    #[instrument(skip(self, user), fields(user = %user.username))]
    pub async fn follow(
        &self,
        user: &UserRecord,
        author_username: &str,
    ) -> Result<FollowOutcome, FollowError> {
        let author = self.find_author(author_username).await?;

        if author.id == user.id {
            return Ok(FollowOutcome::SelfFollow);
        }

        if self.follows.is_following(user.id, author.id).await? {
            return Ok(FollowOutcome::AlreadyFollowing);
        }

        match self.follows.create_follow(user.id, author.id).await {
            Ok(()) => Ok(FollowOutcome::Followed),
            // A concurrent request inserted the same relation first.
            Err(RepoError::Duplicate { constraint }) => {
                debug!(constraint = %constraint, "follow relation already present");
                Ok(FollowOutcome::AlreadyFollowing)
            }
            Err(err) => Err(err.into()),
        }
    }

    #[instrument(skip(self, user), fields(user = %user.username))]
    pub async fn unfollow(&self, user: &UserRecord, author_username: &str) -> Result<(), FollowError> {
        let author = self.find_author(author_username).await?;

        if self.follows.delete_follow(user.id, author.id).await? {
            Ok(())
        } else {
            Err(FollowError::NotFollowing(author.username))
        }
    }

    async fn find_author(&self, username: &str) -> Result<UserRecord, FollowError> {
        self.users
            .find_by_username(username)
            .await?
            .ok_or_else(|| FollowError::UnknownAuthor(username.to_string()))
    }
}
