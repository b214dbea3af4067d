use std::{num::NonZeroU32, sync::Arc};

use thiserror::Error;
use tracing::instrument;

use crate::application::pagination::{Page, PageWindow};
use crate::application::repos::{
    CommentsRepo, FollowsRepo, GroupsRepo, PostScope, PostSlice, PostsRepo, RepoError, UsersRepo,
};
use crate::domain::entities::{CommentRecord, GroupRecord, PostRecord, UserRecord};

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("unknown group `{0}`")]
    UnknownGroup(String),
    #[error("unknown author `{0}`")]
    UnknownAuthor(String),
    #[error("unknown post {0}")]
    UnknownPost(i64),
    #[error("authentication required")]
    Unauthorized,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone)]
pub struct GroupFeed {
    pub group: GroupRecord,
    pub page: Page<PostRecord>,
}

/// An author's profile: their posts plus the counters shown beside them.
#[derive(Debug, Clone)]
pub struct AuthorFeed {
    pub author: UserRecord,
    pub page: Page<PostRecord>,
    pub post_count: u64,
    pub follower_count: u64,
    pub following: bool,
}

#[derive(Debug, Clone)]
pub struct PostDetail {
    pub post: PostRecord,
    pub comments: Vec<CommentRecord>,
    pub author_post_count: u64,
    pub author_follower_count: u64,
}

#[derive(Clone)]
pub struct FeedService {
    posts: Arc<dyn PostsRepo>,
    groups: Arc<dyn GroupsRepo>,
    users: Arc<dyn UsersRepo>,
    follows: Arc<dyn FollowsRepo>,
    comments: Arc<dyn CommentsRepo>,
    page_size: NonZeroU32,
}

impl FeedService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        groups: Arc<dyn GroupsRepo>,
        users: Arc<dyn UsersRepo>,
        follows: Arc<dyn FollowsRepo>,
        comments: Arc<dyn CommentsRepo>,
        page_size: NonZeroU32,
    ) -> Self {
        Self {
            posts,
            groups,
            users,
            follows,
            comments,
            page_size,
        }
    }

    pub fn page_size(&self) -> NonZeroU32 {
        self.page_size
    }

    /// Every post, newest first.
    #[instrument(skip(self))]
    pub async fn global_feed(&self, page: Option<&str>) -> Result<Page<PostRecord>, FeedError> {
        self.paginate(PostScope::All, page).await
    }

    #[instrument(skip(self))]
    pub async fn group_feed(&self, slug: &str, page: Option<&str>) -> Result<GroupFeed, FeedError> {
        let group = self
            .groups
            .find_group_by_slug(slug)
            .await?
            .ok_or_else(|| FeedError::UnknownGroup(slug.to_string()))?;

        let page = self.paginate(PostScope::Group(group.id), page).await?;
        Ok(GroupFeed { group, page })
    }

    #[instrument(skip(self, viewer))]
    pub async fn author_feed(
        &self,
        username: &str,
        viewer: Option<&UserRecord>,
        page: Option<&str>,
    ) -> Result<AuthorFeed, FeedError> {
        let author = self
            .users
            .find_by_username(username)
            .await?
            .ok_or_else(|| FeedError::UnknownAuthor(username.to_string()))?;

        let page = self.paginate(PostScope::Author(author.id), page).await?;
        let follower_count = self.follows.count_followers(author.id).await?;
        let following = match viewer {
            Some(viewer) if viewer.id != author.id => {
                self.follows.is_following(viewer.id, author.id).await?
            }
            _ => false,
        };

        Ok(AuthorFeed {
            post_count: page.window.total(),
            author,
            page,
            follower_count,
            following,
        })
    }

    /// Posts by every author the viewer follows. Following nobody yields an
    /// empty first page.
    #[instrument(skip(self, viewer))]
    pub async fn followed_feed(
        &self,
        viewer: Option<&UserRecord>,
        page: Option<&str>,
    ) -> Result<Page<PostRecord>, FeedError> {
        let viewer = viewer.ok_or(FeedError::Unauthorized)?;
        self.paginate(PostScope::FollowedBy(viewer.id), page).await
    }

    #[instrument(skip(self))]
    pub async fn post_detail(&self, id: i64) -> Result<PostDetail, FeedError> {
        let post = self
            .posts
            .find_post(id)
            .await?
            .ok_or(FeedError::UnknownPost(id))?;

        let comments = self.comments.list_comments(post.id).await?;
        let author_post_count = self
            .posts
            .count_posts(PostScope::Author(post.author_id))
            .await?;
        let author_follower_count = self.follows.count_followers(post.author_id).await?;

        Ok(PostDetail {
            post,
            comments,
            author_post_count,
            author_follower_count,
        })
    }

    async fn paginate(
        &self,
        scope: PostScope,
        requested: Option<&str>,
    ) -> Result<Page<PostRecord>, FeedError> {
        let total = self.posts.count_posts(scope).await?;
        let window = PageWindow::resolve(total, self.page_size, requested);

        let items = if window.is_empty() {
            Vec::new()
        } else {
            self.posts
                .list_posts(
                    scope,
                    PostSlice {
                        offset: window.offset(),
                        limit: window.per_page(),
                    },
                )
                .await?
        };

        Ok(Page::new(items, window))
    }
}
