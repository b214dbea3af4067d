#![allow(dead_code)]

use std::{num::NonZeroU32, sync::Arc, time::Duration};

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{
        HeaderName, Request, StatusCode,
        header::{CONTENT_TYPE, LOCATION},
    },
    response::Response,
};
use tempfile::TempDir;
use tower::ServiceExt;

use yatube::application::{
    feed::FeedService,
    follows::FollowService,
    groups::{GroupService, NewGroup},
    identity::IdentityProvider,
    posts::{ImageStore, PostService},
    repos::{CommentsRepo, CreateCommentParams, CreatePostParams, PostsWriteRepo},
    users::UserService,
};
use yatube::cache::{CacheConfig, CacheState, INDEX_PAGE_PREFIX};
use yatube::domain::entities::{GroupRecord, PostRecord, UserRecord};
use yatube::infra::{
    http::{HttpState, build_router},
    identity::HeaderIdentityProvider,
    memory::MemoryRepositories,
    uploads::UploadStorage,
};

pub const USER_HEADER: &str = "x-remote-user";
pub const LOGIN_URL: &str = "/auth/login/";
pub const PAGE_SIZE: u32 = 10;
pub const MAX_IMAGE_BYTES: u64 = 1024 * 1024;

pub const SMALL_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x02, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00,
    0xFF, 0xFF, 0xFF, 0x21, 0xF9, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2C, 0x00, 0x00, 0x00, 0x00,
    0x02, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x0C, 0x0A, 0x00, 0x3B,
];

const BOUNDARY: &str = "yatube-test-boundary";

/// A router over the in-memory backend with its own upload directory.
pub struct TestApp {
    pub router: Router,
    pub repos: Arc<MemoryRepositories>,
    pub users: UserService,
    pub groups: GroupService,
    pub cache: Option<CacheState>,
    pub uploads: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::build(None)
    }

    pub fn with_cache(ttl: Duration) -> Self {
        Self::build(Some(CacheConfig {
            enabled: true,
            ttl,
            max_entries: 16,
        }))
    }

    fn build(cache: Option<CacheConfig>) -> Self {
        let repos = Arc::new(MemoryRepositories::new());
        let uploads = tempfile::tempdir().expect("create upload dir");
        let storage =
            Arc::new(UploadStorage::new(uploads.path().to_path_buf()).expect("upload storage"));
        let image_store: Arc<dyn ImageStore> = storage.clone();

        let feed = Arc::new(FeedService::new(
            repos.clone(),
            repos.clone(),
            repos.clone(),
            repos.clone(),
            repos.clone(),
            NonZeroU32::new(PAGE_SIZE).expect("non-zero page size"),
        ));
        let posts = Arc::new(PostService::new(
            repos.clone(),
            repos.clone(),
            repos.clone(),
            repos.clone(),
            image_store,
            MAX_IMAGE_BYTES,
        ));
        let follows = Arc::new(FollowService::new(repos.clone(), repos.clone()));
        let identity: Arc<dyn IdentityProvider> = Arc::new(HeaderIdentityProvider::new(
            HeaderName::from_static(USER_HEADER),
            repos.clone(),
        ));
        let cache = cache.map(|config| CacheState::new(config, INDEX_PAGE_PREFIX));

        let router = build_router(HttpState {
            feed,
            posts,
            follows,
            identity,
            upload_storage: storage,
            login_url: LOGIN_URL.to_string(),
            max_image_bytes: MAX_IMAGE_BYTES,
            cache: cache.clone(),
        });

        Self {
            router,
            users: UserService::new(repos.clone()),
            groups: GroupService::new(repos.clone(), repos.clone()),
            repos,
            cache,
            uploads,
        }
    }

    pub async fn user(&self, username: &str) -> UserRecord {
        self.users.create_user(username).await.expect("create user")
    }

    pub async fn group(&self, title: &str, slug: &str) -> GroupRecord {
        self.groups
            .create_group(NewGroup {
                title: title.to_string(),
                slug: Some(slug.to_string()),
                description: format!("{title} description"),
            })
            .await
            .expect("create group")
    }

    pub async fn post(
        &self,
        author: &UserRecord,
        text: &str,
        group: Option<&GroupRecord>,
    ) -> PostRecord {
        self.repos
            .create_post(CreatePostParams {
                author_id: author.id,
                text: text.to_string(),
                group_id: group.map(|group| group.id),
                image: None,
            })
            .await
            .expect("create post")
    }

    pub async fn comment(&self, author: &UserRecord, post: &PostRecord, text: &str) {
        self.repos
            .create_comment(CreateCommentParams {
                post_id: post.id,
                author_id: author.id,
                text: text.to_string(),
            })
            .await
            .expect("create comment");
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    pub async fn get(&self, uri: &str, viewer: Option<&str>) -> Response {
        self.send(get_request(uri, viewer)).await
    }

    pub async fn get_page(&self, uri: &str, viewer: Option<&str>) -> (StatusCode, String) {
        let response = self.get(uri, viewer).await;
        let status = response.status();
        (status, body_text(response).await)
    }
}

pub fn get_request(uri: &str, viewer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(username) = viewer {
        builder = builder.header(USER_HEADER, username);
    }
    builder.body(Body::empty()).expect("request")
}

pub fn form_request(uri: &str, viewer: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(username) = viewer {
        builder = builder.header(USER_HEADER, username);
    }
    builder.body(Body::from(body.to_string())).expect("request")
}

/// One multipart part: `(name, filename, bytes)`.
pub type Part<'a> = (&'a str, Option<&'a str>, &'a [u8]);

pub fn multipart_request(uri: &str, viewer: Option<&str>, parts: &[Part<'_>]) -> Request<Body> {
    let mut body = Vec::new();
    for (name, filename, bytes) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match filename {
            Some(filename) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                );
            }
            None => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
            }
        }
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    let mut builder = Request::builder().method("POST").uri(uri).header(
        CONTENT_TYPE,
        format!("multipart/form-data; boundary={BOUNDARY}"),
    );
    if let Some(username) = viewer {
        builder = builder.header(USER_HEADER, username);
    }
    builder.body(Body::from(body)).expect("request")
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body")
        .to_vec()
}

pub async fn body_text(response: Response) -> String {
    String::from_utf8(body_bytes(response).await).expect("utf-8 body")
}

pub fn location(response: &Response) -> String {
    response
        .headers()
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
        .expect("location header")
        .to_string()
}

/// Number of post cards rendered on a page.
pub fn post_cards(html: &str) -> usize {
    html.matches("<article class=\"post\"").count()
}
