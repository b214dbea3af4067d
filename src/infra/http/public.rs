use std::{io::ErrorKind, sync::Arc};

use axum::{
    Form, Router,
    body::Body,
    extract::{DefaultBodyLimit, Multipart, Path, RawQuery, State},
    http::{
        HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE},
    },
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use bytes::Bytes;
use tracing::error;

use crate::{
    application::{
        error::{ErrorReport, HttpError},
        feed::{FeedError, FeedService},
        follows::{FollowError, FollowService},
        identity::IdentityProvider,
        pagination::requested_page,
        posts::{PostError, PostService, PostSubmission},
    },
    cache::{CacheState, response_cache_layer},
    domain::forms::FormErrors,
    infra::uploads::{UploadStorage, UploadStorageError},
    presentation::views::{
        AboutAuthorTemplate, AboutTechTemplate, CommentView, FeedPageView, FeedView, FollowTemplate,
        FormView, GroupPageView, GroupTemplate, IndexTemplate, LayoutChrome, LayoutContext,
        PostCard, PostDetailTemplate, PostDetailView, PostFormTemplate, PostFormView,
        ProfileTemplate, ProfileView, group_href, media_href, post_href, profile_href,
        render_not_found_response, render_template_response,
    },
};

use super::{
    CurrentUser, Viewer,
    forms::{CommentForm, read_post_submission},
    middleware::{log_responses, require_user, resolve_identity, set_request_context},
    upload_body_limit,
};

const CREATE_PATH: &str = "/create/";

#[derive(Clone)]
pub struct HttpState {
    pub feed: Arc<FeedService>,
    pub posts: Arc<PostService>,
    pub follows: Arc<FollowService>,
    pub identity: Arc<dyn IdentityProvider>,
    pub upload_storage: Arc<UploadStorage>,
    pub login_url: String,
    pub max_image_bytes: u64,
    pub cache: Option<CacheState>,
}

pub fn build_router(state: HttpState) -> Router {
    // Only the global feed is memoized; its key ignores the viewer.
    let cached_routes = Router::new().route("/", get(index));
    let cached_routes = if let Some(cache_state) = state.cache.clone() {
        cached_routes.layer(middleware::from_fn_with_state(
            cache_state,
            response_cache_layer,
        ))
    } else {
        cached_routes
    };

    let public_routes = Router::new()
        .route("/group/{slug}/", get(group_posts))
        .route("/profile/{username}/", get(profile))
        .route("/posts/{id}/", get(post_detail))
        .route("/about/author/", get(about_author))
        .route("/about/tech/", get(about_tech))
        .route("/media/{*path}", get(serve_media));

    let protected_routes = Router::new()
        .route(CREATE_PATH, get(create_post_form).post(create_post))
        .route("/posts/{id}/edit/", get(edit_post_form).post(edit_post))
        .route("/posts/{id}/comment", post(add_comment))
        .route("/follow/", get(follow_index))
        .route("/profile/{username}/follow", get(profile_follow))
        .route("/profile/{username}/unfollow", get(profile_unfollow))
        .layer(DefaultBodyLimit::max(upload_body_limit(state.max_image_bytes)))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_user));

    cached_routes
        .merge(public_routes)
        .merge(protected_routes)
        .fallback(fallback_router)
        .with_state(state.clone())
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn_with_state(state, resolve_identity))
        .layer(middleware::from_fn(set_request_context))
}

async fn index(State(state): State<HttpState>, RawQuery(query): RawQuery) -> Response {
    let chrome = LayoutChrome::standard();
    let page = requested_page(query.as_deref());

    match state.feed.global_feed(page.as_deref()).await {
        Ok(page) => {
            let feed = FeedView::new(&page, "/", query.as_deref());
            let view = LayoutContext::new(
                chrome.with_title("Latest updates on the site"),
                FeedPageView { feed },
            );
            render_template_response(IndexTemplate { view }, StatusCode::OK)
        }
        Err(err) => feed_error_to_response(err, chrome),
    }
}

async fn group_posts(
    State(state): State<HttpState>,
    Path(slug): Path<String>,
    RawQuery(query): RawQuery,
) -> Response {
    let chrome = LayoutChrome::standard();
    let page = requested_page(query.as_deref());

    match state.feed.group_feed(&slug, page.as_deref()).await {
        Ok(group_feed) => {
            let feed = FeedView::new(&group_feed.page, &group_href(&slug), query.as_deref());
            let title = format!("Posts of the group {}", group_feed.group.title);
            let view = LayoutContext::new(
                chrome.with_title(title),
                GroupPageView::new(&group_feed.group, feed),
            );
            render_template_response(GroupTemplate { view }, StatusCode::OK)
        }
        Err(err) => feed_error_to_response(err, chrome),
    }
}

async fn profile(
    State(state): State<HttpState>,
    Path(username): Path<String>,
    viewer: Viewer,
    RawQuery(query): RawQuery,
) -> Response {
    let chrome = LayoutChrome::standard();
    let page = requested_page(query.as_deref());

    match state
        .feed
        .author_feed(&username, viewer.user(), page.as_deref())
        .await
    {
        Ok(author_feed) => {
            let path = profile_href(&author_feed.author.username);
            let feed = FeedView::new(&author_feed.page, &path, query.as_deref());
            let title = format!("Profile of {}", author_feed.author.username);
            let content = ProfileView::new(
                &author_feed.author,
                viewer.user(),
                author_feed.post_count,
                author_feed.follower_count,
                author_feed.following,
                feed,
            );
            let view = LayoutContext::new(chrome.with_title(title), content);
            render_template_response(ProfileTemplate { view }, StatusCode::OK)
        }
        Err(err) => feed_error_to_response(err, chrome),
    }
}

async fn post_detail(
    State(state): State<HttpState>,
    Path(raw_id): Path<String>,
    viewer: Viewer,
) -> Response {
    let chrome = LayoutChrome::standard();
    let Some(id) = parse_post_id(&raw_id) else {
        return render_not_found_response(chrome);
    };

    match state.feed.post_detail(id).await {
        Ok(detail) => {
            let can_edit = viewer
                .user()
                .is_some_and(|user| user.id == detail.post.author_id);
            let title = format!("Post {}", detail.post.label());
            let content = PostDetailView {
                post: PostCard::from(&detail.post),
                author_post_count: detail.author_post_count,
                author_follower_count: detail.author_follower_count,
                comments: detail.comments.iter().map(CommentView::from).collect(),
                can_edit,
                edit_href: format!("/posts/{id}/edit/"),
                can_comment: viewer.user().is_some(),
                comment_action: format!("/posts/{id}/comment"),
                form: FormView::comment(),
            };
            let view = LayoutContext::new(chrome.with_title(title), content);
            render_template_response(PostDetailTemplate { view }, StatusCode::OK)
        }
        Err(err) => feed_error_to_response(err, chrome),
    }
}

async fn create_post_form(
    State(state): State<HttpState>,
    CurrentUser(_user): CurrentUser,
) -> Response {
    render_post_form(&state, None, &PostSubmission::default(), None, None).await
}

async fn create_post(
    State(state): State<HttpState>,
    CurrentUser(user): CurrentUser,
    multipart: Multipart,
) -> Response {
    let submission = match read_post_submission(multipart).await {
        Ok(submission) => submission,
        Err(err) => return err.into_response(),
    };

    match state.posts.create_post(&user, submission.clone()).await {
        Ok(_) => Redirect::to(&profile_href(&user.username)).into_response(),
        Err(PostError::Validation(errors)) => {
            render_post_form(&state, None, &submission, None, Some(&errors)).await
        }
        Err(err) => post_error_to_response(err),
    }
}

async fn edit_post_form(
    State(state): State<HttpState>,
    CurrentUser(user): CurrentUser,
    Path(raw_id): Path<String>,
) -> Response {
    let Some(id) = parse_post_id(&raw_id) else {
        return render_not_found_response(LayoutChrome::standard());
    };

    match state.posts.editable_post(&user, id).await {
        Ok(post) => {
            let submission = PostSubmission {
                text: post.text.clone(),
                group: post.group.as_ref().map(|group| group.id.to_string()),
                image: None,
            };
            render_post_form(&state, Some(id), &submission, post.image.as_deref(), None).await
        }
        Err(err) => post_error_to_response(err),
    }
}

async fn edit_post(
    State(state): State<HttpState>,
    CurrentUser(user): CurrentUser,
    Path(raw_id): Path<String>,
    multipart: Multipart,
) -> Response {
    let Some(id) = parse_post_id(&raw_id) else {
        return render_not_found_response(LayoutChrome::standard());
    };
    let submission = match read_post_submission(multipart).await {
        Ok(submission) => submission,
        Err(err) => return err.into_response(),
    };

    match state.posts.edit_post(&user, id, submission.clone()).await {
        Ok(post) => Redirect::to(&post_href(post.id)).into_response(),
        Err(PostError::Validation(errors)) => {
            let current_image = match state.posts.editable_post(&user, id).await {
                Ok(post) => post.image,
                Err(err) => return post_error_to_response(err),
            };
            render_post_form(
                &state,
                Some(id),
                &submission,
                current_image.as_deref(),
                Some(&errors),
            )
            .await
        }
        Err(err) => post_error_to_response(err),
    }
}

async fn add_comment(
    State(state): State<HttpState>,
    CurrentUser(user): CurrentUser,
    Path(raw_id): Path<String>,
    Form(form): Form<CommentForm>,
) -> Response {
    let Some(id) = parse_post_id(&raw_id) else {
        return render_not_found_response(LayoutChrome::standard());
    };

    match state.posts.add_comment(&user, id, form.into()).await {
        Ok(_) => Redirect::to(&post_href(id)).into_response(),
        Err(err) => post_error_to_response(err),
    }
}

async fn follow_index(
    State(state): State<HttpState>,
    CurrentUser(user): CurrentUser,
    RawQuery(query): RawQuery,
) -> Response {
    let chrome = LayoutChrome::standard();
    let page = requested_page(query.as_deref());

    match state.feed.followed_feed(Some(&user), page.as_deref()).await {
        Ok(page) => {
            let feed = FeedView::new(&page, "/follow/", query.as_deref());
            let view = LayoutContext::new(
                chrome.with_title("Posts of the authors you follow"),
                FeedPageView { feed },
            );
            render_template_response(FollowTemplate { view }, StatusCode::OK)
        }
        Err(err) => feed_error_to_response(err, chrome),
    }
}

async fn profile_follow(
    State(state): State<HttpState>,
    CurrentUser(user): CurrentUser,
    Path(username): Path<String>,
) -> Response {
    match state.follows.follow(&user, &username).await {
        Ok(_) => Redirect::to(&profile_href(&username)).into_response(),
        Err(err) => follow_error_to_response(err),
    }
}

async fn profile_unfollow(
    State(state): State<HttpState>,
    CurrentUser(user): CurrentUser,
    Path(username): Path<String>,
) -> Response {
    match state.follows.unfollow(&user, &username).await {
        Ok(()) => Redirect::to(&profile_href(&username)).into_response(),
        Err(err) => follow_error_to_response(err),
    }
}

async fn about_author() -> Response {
    let view = LayoutContext::new(LayoutChrome::standard().with_title("About the author"), ());
    render_template_response(AboutAuthorTemplate { view }, StatusCode::OK)
}

async fn about_tech() -> Response {
    let view = LayoutContext::new(LayoutChrome::standard().with_title("Technologies"), ());
    render_template_response(AboutTechTemplate { view }, StatusCode::OK)
}

async fn serve_media(State(state): State<HttpState>, Path(path): Path<String>) -> Response {
    const SOURCE: &str = "infra::http::public::serve_media";

    match state.upload_storage.read(&path).await {
        Ok(bytes) => build_media_response(&path, bytes),
        Err(UploadStorageError::InvalidPath) => HttpError::new(
            SOURCE,
            StatusCode::NOT_FOUND,
            "File not found",
            "The requested file is not available",
        )
        .into_response(),
        Err(UploadStorageError::Io(err)) if err.kind() == ErrorKind::NotFound => HttpError::new(
            SOURCE,
            StatusCode::NOT_FOUND,
            "File not found",
            "The requested file is not available",
        )
        .into_response(),
        Err(err) => {
            error!(
                target = SOURCE,
                path = %path,
                error = %err,
                "failed to read stored media"
            );
            HttpError::new(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read stored file",
                err.to_string(),
            )
            .into_response()
        }
    }
}

async fn fallback_router() -> Response {
    render_not_found_response(LayoutChrome::standard())
}

async fn render_post_form(
    state: &HttpState,
    editing: Option<i64>,
    submission: &PostSubmission,
    current_image: Option<&str>,
    errors: Option<&FormErrors>,
) -> Response {
    let groups = match state.posts.group_choices().await {
        Ok(groups) => groups,
        Err(err) => return post_error_to_response(err),
    };

    let (title, action) = match editing {
        Some(id) => ("Edit post", format!("/posts/{id}/edit/")),
        None => ("New post", CREATE_PATH.to_string()),
    };
    let content = PostFormView {
        is_edit: editing.is_some(),
        action,
        current_image: current_image.map(media_href),
        form: FormView::post(
            &groups,
            &submission.text,
            submission.group.as_deref(),
            errors,
        ),
    };
    let view = LayoutContext::new(LayoutChrome::standard().with_title(title), content);
    render_template_response(PostFormTemplate { view }, StatusCode::OK)
}

/// Positive decimal post ids only; anything else is treated as an unknown page.
fn parse_post_id(raw: &str) -> Option<i64> {
    if raw.is_empty() || !raw.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    raw.parse::<i64>().ok().filter(|id| *id > 0)
}

fn not_found_with_report(source: &'static str, err: &dyn std::error::Error) -> Response {
    let mut response = render_not_found_response(LayoutChrome::standard());
    ErrorReport::from_error(source, StatusCode::NOT_FOUND, err).attach(&mut response);
    response
}

fn feed_error_to_response(err: FeedError, chrome: LayoutChrome) -> Response {
    match err {
        FeedError::UnknownGroup(_) | FeedError::UnknownAuthor(_) | FeedError::UnknownPost(_) => {
            let mut response = render_not_found_response(chrome);
            ErrorReport::from_error(
                "infra::http::feed_error_to_response",
                StatusCode::NOT_FOUND,
                &err,
            )
            .attach(&mut response);
            response
        }
        err => HttpError::from(err).into_response(),
    }
}

fn post_error_to_response(err: PostError) -> Response {
    match err {
        PostError::UnknownPost(_) => {
            not_found_with_report("infra::http::post_error_to_response", &err)
        }
        // Non-authors are sent back to the post instead of seeing an error.
        PostError::Forbidden { post_id } => Redirect::to(&post_href(post_id)).into_response(),
        err => HttpError::from(err).into_response(),
    }
}

fn follow_error_to_response(err: FollowError) -> Response {
    match err {
        FollowError::UnknownAuthor(_) | FollowError::NotFollowing(_) => {
            not_found_with_report("infra::http::follow_error_to_response", &err)
        }
        err => HttpError::from(err).into_response(),
    }
}

fn build_media_response(path: &str, bytes: Bytes) -> Response {
    let length = bytes.len();
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&length.to_string()) {
        headers.insert(CONTENT_LENGTH, value);
    }
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=31536000, immutable"),
    );

    response
}
