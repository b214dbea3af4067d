//! In-process repository backend.
//!
//! Mirrors the Postgres schema closely enough for development servers and
//! tests: unique usernames and group slugs, one follow row per pair, no
//! self-follows, `ON DELETE SET NULL` for a post's group. All tables live
//! behind a single lock, so check-then-insert sequences are atomic.

use std::collections::BTreeMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::application::repos::{
    CommentsRepo, CreateCommentParams, CreateGroupParams, CreatePostParams, CreateUserParams,
    FollowsRepo, GroupsRepo, GroupsWriteRepo, PostScope, PostSlice, PostsRepo, PostsWriteRepo,
    RepoError, UpdatePostParams, UsersRepo, UsersWriteRepo,
};
use crate::domain::entities::{
    CommentRecord, FollowRecord, GroupRecord, GroupRef, PostRecord, UserRecord,
};

#[derive(Debug, Clone)]
struct StoredPost {
    id: i64,
    text: String,
    created_at: OffsetDateTime,
    author_id: i64,
    group_id: Option<i64>,
    image: Option<String>,
}

#[derive(Debug, Clone)]
struct StoredComment {
    id: i64,
    post_id: i64,
    author_id: i64,
    text: String,
    created_at: OffsetDateTime,
}

#[derive(Debug, Default)]
struct MemoryState {
    users: BTreeMap<i64, UserRecord>,
    groups: BTreeMap<i64, GroupRecord>,
    posts: BTreeMap<i64, StoredPost>,
    comments: BTreeMap<i64, StoredComment>,
    follows: BTreeMap<i64, FollowRecord>,
    last_id: i64,
    last_created_at: Option<OffsetDateTime>,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    /// Wall-clock time, never earlier than the previous insertion.
    fn next_timestamp(&mut self) -> OffsetDateTime {
        let now = OffsetDateTime::now_utc();
        let timestamp = match self.last_created_at {
            Some(last) if last > now => last,
            _ => now,
        };
        self.last_created_at = Some(timestamp);
        timestamp
    }

    fn user_by_name(&self, username: &str) -> Option<&UserRecord> {
        self.users.values().find(|user| user.username == username)
    }

    fn follow_between(&self, user_id: i64, author_id: i64) -> Option<&FollowRecord> {
        self.follows
            .values()
            .find(|follow| follow.user_id == user_id && follow.author_id == author_id)
    }

    fn in_scope(&self, scope: PostScope, post: &StoredPost) -> bool {
        match scope {
            PostScope::All => true,
            PostScope::Group(group_id) => post.group_id == Some(group_id),
            PostScope::Author(author_id) => post.author_id == author_id,
            PostScope::FollowedBy(user_id) => self.follow_between(user_id, post.author_id).is_some(),
        }
    }

    fn post_record(&self, post: &StoredPost) -> Result<PostRecord, RepoError> {
        let author = self.users.get(&post.author_id).ok_or_else(|| RepoError::Integrity {
            message: format!("post {} references missing author {}", post.id, post.author_id),
        })?;
        let group = post
            .group_id
            .and_then(|id| self.groups.get(&id))
            .map(|group| GroupRef {
                id: group.id,
                slug: group.slug.clone(),
                title: group.title.clone(),
            });

        Ok(PostRecord {
            id: post.id,
            text: post.text.clone(),
            created_at: post.created_at,
            author_id: post.author_id,
            author_username: author.username.clone(),
            group,
            image: post.image.clone(),
        })
    }

    fn comment_record(&self, comment: &StoredComment) -> Result<CommentRecord, RepoError> {
        let author = self
            .users
            .get(&comment.author_id)
            .ok_or_else(|| RepoError::Integrity {
                message: format!("comment {} references missing author", comment.id),
            })?;
        Ok(CommentRecord {
            id: comment.id,
            post_id: comment.post_id,
            author_id: comment.author_id,
            author_username: author.username.clone(),
            text: comment.text.clone(),
            created_at: comment.created_at,
        })
    }

    fn ensure_user(&self, id: i64) -> Result<(), RepoError> {
        if self.users.contains_key(&id) {
            Ok(())
        } else {
            Err(RepoError::InvalidInput {
                message: format!("user {id} does not exist"),
            })
        }
    }

    fn ensure_group(&self, id: Option<i64>) -> Result<(), RepoError> {
        match id {
            Some(id) if !self.groups.contains_key(&id) => Err(RepoError::InvalidInput {
                message: format!("group {id} does not exist"),
            }),
            _ => Ok(()),
        }
    }
}

/// Every repository trait over one shared in-memory state.
#[derive(Debug, Default)]
pub struct MemoryRepositories {
    state: RwLock<MemoryState>,
}

impl MemoryRepositories {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UsersRepo for MemoryRepositories {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, RepoError> {
        Ok(self.state.read().await.user_by_name(username).cloned())
    }
}

#[async_trait]
impl UsersWriteRepo for MemoryRepositories {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        let mut state = self.state.write().await;
        if state.user_by_name(&params.username).is_some() {
            return Err(RepoError::Duplicate {
                constraint: "users_username_key".to_string(),
            });
        }

        let user = UserRecord {
            id: state.next_id(),
            username: params.username,
            created_at: state.next_timestamp(),
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }
}

#[async_trait]
impl PostsRepo for MemoryRepositories {
    async fn list_posts(
        &self,
        scope: PostScope,
        slice: PostSlice,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let state = self.state.read().await;
        let mut posts: Vec<&StoredPost> = state
            .posts
            .values()
            .filter(|post| state.in_scope(scope, post))
            .collect();
        posts.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        let offset = usize::try_from(slice.offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(slice.limit).unwrap_or(usize::MAX);
        posts
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|post| state.post_record(post))
            .collect()
    }

    async fn count_posts(&self, scope: PostScope) -> Result<u64, RepoError> {
        let state = self.state.read().await;
        let count = state
            .posts
            .values()
            .filter(|post| state.in_scope(scope, post))
            .count();
        Ok(count as u64)
    }

    async fn find_post(&self, id: i64) -> Result<Option<PostRecord>, RepoError> {
        let state = self.state.read().await;
        state
            .posts
            .get(&id)
            .map(|post| state.post_record(post))
            .transpose()
    }
}

#[async_trait]
impl PostsWriteRepo for MemoryRepositories {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let mut state = self.state.write().await;
        state.ensure_user(params.author_id)?;
        state.ensure_group(params.group_id)?;

        let post = StoredPost {
            id: state.next_id(),
            text: params.text,
            created_at: state.next_timestamp(),
            author_id: params.author_id,
            group_id: params.group_id,
            image: params.image,
        };
        state.posts.insert(post.id, post.clone());
        state.post_record(&post)
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let mut state = self.state.write().await;
        state.ensure_group(params.group_id)?;

        let post = state.posts.get_mut(&params.id).ok_or(RepoError::NotFound)?;
        post.text = params.text;
        post.group_id = params.group_id;
        post.image = params.image;
        let post = post.clone();
        state.post_record(&post)
    }
}

#[async_trait]
impl GroupsRepo for MemoryRepositories {
    async fn list_groups(&self) -> Result<Vec<GroupRecord>, RepoError> {
        let state = self.state.read().await;
        let mut groups: Vec<GroupRecord> = state.groups.values().cloned().collect();
        groups.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.id.cmp(&b.id)));
        Ok(groups)
    }

    async fn find_group_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>, RepoError> {
        let state = self.state.read().await;
        Ok(state.groups.values().find(|group| group.slug == slug).cloned())
    }

    async fn find_group(&self, id: i64) -> Result<Option<GroupRecord>, RepoError> {
        Ok(self.state.read().await.groups.get(&id).cloned())
    }
}

#[async_trait]
impl GroupsWriteRepo for MemoryRepositories {
    async fn create_group(&self, params: CreateGroupParams) -> Result<GroupRecord, RepoError> {
        let mut state = self.state.write().await;
        if state.groups.values().any(|group| group.slug == params.slug) {
            return Err(RepoError::Duplicate {
                constraint: "groups_slug_key".to_string(),
            });
        }

        let group = GroupRecord {
            id: state.next_id(),
            title: params.title,
            slug: params.slug,
            description: params.description,
        };
        state.groups.insert(group.id, group.clone());
        Ok(group)
    }

    async fn delete_group(&self, id: i64) -> Result<(), RepoError> {
        let mut state = self.state.write().await;
        state.groups.remove(&id).ok_or(RepoError::NotFound)?;
        for post in state.posts.values_mut() {
            if post.group_id == Some(id) {
                post.group_id = None;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CommentsRepo for MemoryRepositories {
    async fn list_comments(&self, post_id: i64) -> Result<Vec<CommentRecord>, RepoError> {
        let state = self.state.read().await;
        let mut comments: Vec<&StoredComment> = state
            .comments
            .values()
            .filter(|comment| comment.post_id == post_id)
            .collect();
        comments.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        comments
            .into_iter()
            .map(|comment| state.comment_record(comment))
            .collect()
    }

    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let mut state = self.state.write().await;
        state.ensure_user(params.author_id)?;
        if !state.posts.contains_key(&params.post_id) {
            return Err(RepoError::InvalidInput {
                message: format!("post {} does not exist", params.post_id),
            });
        }

        let comment = StoredComment {
            id: state.next_id(),
            post_id: params.post_id,
            author_id: params.author_id,
            text: params.text,
            created_at: state.next_timestamp(),
        };
        state.comments.insert(comment.id, comment.clone());
        state.comment_record(&comment)
    }
}

#[async_trait]
impl FollowsRepo for MemoryRepositories {
    async fn is_following(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError> {
        let state = self.state.read().await;
        Ok(state.follow_between(user_id, author_id).is_some())
    }

    async fn count_followers(&self, author_id: i64) -> Result<u64, RepoError> {
        let state = self.state.read().await;
        let count = state
            .follows
            .values()
            .filter(|follow| follow.author_id == author_id)
            .count();
        Ok(count as u64)
    }

    async fn create_follow(&self, user_id: i64, author_id: i64) -> Result<(), RepoError> {
        let mut state = self.state.write().await;
        if user_id == author_id {
            return Err(RepoError::Integrity {
                message: "follows_no_self_follow".to_string(),
            });
        }
        state.ensure_user(user_id)?;
        state.ensure_user(author_id)?;
        if state.follow_between(user_id, author_id).is_some() {
            return Err(RepoError::Duplicate {
                constraint: "follows_user_author_key".to_string(),
            });
        }

        let follow = FollowRecord {
            id: state.next_id(),
            user_id,
            author_id,
        };
        state.follows.insert(follow.id, follow);
        Ok(())
    }

    async fn delete_follow(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError> {
        let mut state = self.state.write().await;
        let id = state.follow_between(user_id, author_id).map(|follow| follow.id);
        Ok(id.and_then(|id| state.follows.remove(&id)).is_some())
    }
}
