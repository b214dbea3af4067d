//! Identity resolved from a header set by a trusted reverse proxy.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderName};
use tracing::debug;

use crate::application::identity::IdentityProvider;
use crate::application::repos::{RepoError, UsersRepo};
use crate::domain::entities::UserRecord;

pub struct HeaderIdentityProvider {
    header: HeaderName,
    users: Arc<dyn UsersRepo>,
}

impl HeaderIdentityProvider {
    pub fn new(header: HeaderName, users: Arc<dyn UsersRepo>) -> Self {
        Self { header, users }
    }
}

#[async_trait]
impl IdentityProvider for HeaderIdentityProvider {
    async fn identify(&self, headers: &HeaderMap) -> Result<Option<UserRecord>, RepoError> {
        let Some(username) = headers
            .get(&self.header)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
        else {
            return Ok(None);
        };

        let user = self.users.find_by_username(username).await?;
        if user.is_none() {
            debug!(username, "identity header names an unprovisioned user");
        }
        Ok(user)
    }
}
