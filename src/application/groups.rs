//! Group administration, driven from the command line.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, instrument};

use crate::application::repos::{CreateGroupParams, GroupsRepo, GroupsWriteRepo, RepoError};
use crate::domain::entities::GroupRecord;
use crate::domain::slug::{SlugError, derive_slug, validate_slug};

/// Longest title a group can carry.
pub const MAX_TITLE_LEN: usize = 200;

#[derive(Debug, Error)]
pub enum GroupError {
    #[error("invalid group slug: {0}")]
    InvalidSlug(#[from] SlugError),
    #[error("invalid group title: {0}")]
    InvalidTitle(String),
    #[error("group with slug `{0}` already exists")]
    Conflict(String),
    #[error("unknown group `{0}`")]
    UnknownGroup(String),
    #[error(transparent)]
    Repo(RepoError),
}

impl From<RepoError> for GroupError {
    fn from(error: RepoError) -> Self {
        Self::Repo(error)
    }
}

#[derive(Debug, Clone)]
pub struct NewGroup {
    pub title: String,
    pub slug: Option<String>,
    pub description: String,
}

#[derive(Clone)]
pub struct GroupService {
    reader: Arc<dyn GroupsRepo>,
    writer: Arc<dyn GroupsWriteRepo>,
}

impl GroupService {
    pub fn new(reader: Arc<dyn GroupsRepo>, writer: Arc<dyn GroupsWriteRepo>) -> Self {
        Self { reader, writer }
    }

    pub async fn list_groups(&self) -> Result<Vec<GroupRecord>, GroupError> {
        Ok(self.reader.list_groups().await?)
    }

    /// Create a group. A missing slug is derived from the title.
    #[instrument(skip(self, group), fields(title = %group.title))]
    pub async fn create_group(&self, group: NewGroup) -> Result<GroupRecord, GroupError> {
        let title = group.title.trim().to_string();
        if title.is_empty() {
            return Err(GroupError::InvalidTitle("title must not be empty".to_string()));
        }
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(GroupError::InvalidTitle(format!(
                "title must be at most {MAX_TITLE_LEN} characters"
            )));
        }

        let slug = match group.slug.map(|slug| slug.trim().to_string()) {
            Some(slug) if !slug.is_empty() => slug,
            _ => derive_slug(&title)?,
        };
        validate_slug(&slug)?;

        if self.reader.find_group_by_slug(&slug).await?.is_some() {
            return Err(GroupError::Conflict(slug));
        }

        let created = self
            .writer
            .create_group(CreateGroupParams {
                title,
                slug: slug.clone(),
                description: group.description.trim().to_string(),
            })
            .await
            .map_err(|err| match err {
                RepoError::Duplicate { .. } => GroupError::Conflict(slug),
                other => GroupError::Repo(other),
            })?;

        info!(group_id = created.id, slug = %created.slug, "group created");
        Ok(created)
    }

    /// Delete a group by slug. Its posts stay, detached from any group.
    #[instrument(skip(self))]
    pub async fn delete_group(&self, slug: &str) -> Result<GroupRecord, GroupError> {
        let group = self
            .reader
            .find_group_by_slug(slug)
            .await?
            .ok_or_else(|| GroupError::UnknownGroup(slug.to_string()))?;

        self.writer.delete_group(group.id).await.map_err(|err| match err {
            RepoError::NotFound => GroupError::UnknownGroup(slug.to_string()),
            other => GroupError::Repo(other),
        })?;

        info!(group_id = group.id, "group deleted");
        Ok(group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::memory::MemoryRepositories;

    fn service() -> GroupService {
        let repos = Arc::new(MemoryRepositories::new());
        GroupService::new(repos.clone(), repos)
    }

    fn new_group(title: &str, slug: Option<&str>) -> NewGroup {
        NewGroup {
            title: title.to_string(),
            slug: slug.map(str::to_string),
            description: String::new(),
        }
    }

    #[tokio::test]
    async fn missing_slug_is_derived_from_title() {
        let group = service()
            .create_group(new_group("Rust Lovers", None))
            .await
            .expect("create group");
        assert_eq!(group.slug, "rust-lovers");
        assert_eq!(group.title, "Rust Lovers");
    }

    #[tokio::test]
    async fn duplicate_slug_conflicts() {
        let groups = service();
        groups
            .create_group(new_group("Cats", Some("cats")))
            .await
            .expect("first group");

        let err = groups
            .create_group(new_group("Other cats", Some("cats")))
            .await
            .expect_err("duplicate slug");
        assert!(matches!(err, GroupError::Conflict(slug) if slug == "cats"));
    }

    #[tokio::test]
    async fn invalid_slug_and_blank_title_are_rejected() {
        let groups = service();
        assert!(matches!(
            groups.create_group(new_group("Cats", Some("no spaces"))).await,
            Err(GroupError::InvalidSlug(_))
        ));
        assert!(matches!(
            groups.create_group(new_group("   ", None)).await,
            Err(GroupError::InvalidTitle(_))
        ));
    }

    #[tokio::test]
    async fn listing_is_ordered_by_title() {
        let groups = service();
        for title in ["Zebras", "Ants", "Moles"] {
            groups
                .create_group(new_group(title, None))
                .await
                .expect("create group");
        }

        let titles: Vec<String> = groups
            .list_groups()
            .await
            .expect("list groups")
            .into_iter()
            .map(|group| group.title)
            .collect();
        assert_eq!(titles, ["Ants", "Moles", "Zebras"]);
    }

    #[tokio::test]
    async fn deleting_unknown_group_fails() {
        let err = service()
            .delete_group("missing")
            .await
            .expect_err("unknown group");
        assert!(matches!(err, GroupError::UnknownGroup(_)));
    }
}
