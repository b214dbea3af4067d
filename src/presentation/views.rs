use crate::application::error::{ErrorReport, HttpError};
use crate::application::pagination::{Page, PageWindow, page_link};
use crate::domain::entities::{CommentRecord, GroupRecord, PostRecord, UserRecord};
use crate::domain::forms::{COMMENT_FORM, FieldKind, FormErrors, FormSchema, POST_FORM};
use crate::domain::posts::format_pub_date;
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use time::format_description::well_known::Rfc3339;

const SITE_TITLE: &str = "Yatube";

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn render_not_found_response(chrome: LayoutChrome) -> Response {
    let content = ErrorPageView::not_found();
    let view = LayoutContext::new(chrome.with_title("Page not found"), content);
    let mut response = render_template_response(ErrorTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

#[derive(Clone)]
pub struct NavigationLinkView {
    pub label: String,
    pub href: String,
}

#[derive(Clone)]
pub struct BrandView {
    pub title: String,
    pub href: String,
}

#[derive(Clone)]
pub struct PageMetaView {
    pub title: String,
}

/// Site-wide layout pieces. They never depend on the viewer, so a cached
/// page renders the same for everyone.
#[derive(Clone)]
pub struct LayoutChrome {
    pub brand: BrandView,
    pub navigation: Vec<NavigationLinkView>,
    pub footer: String,
    pub meta: PageMetaView,
}

impl LayoutChrome {
    pub fn standard() -> Self {
        let link = |label: &str, href: &str| NavigationLinkView {
            label: label.to_string(),
            href: href.to_string(),
        };

        Self {
            brand: BrandView {
                title: SITE_TITLE.to_string(),
                href: "/".to_string(),
            },
            navigation: vec![
                link("Home", "/"),
                link("Following", "/follow/"),
                link("New post", "/create/"),
                link("About the author", "/about/author/"),
                link("Technologies", "/about/tech/"),
            ],
            footer: format!("© {SITE_TITLE}"),
            meta: PageMetaView {
                title: SITE_TITLE.to_string(),
            },
        }
    }

    pub fn with_title(self, title: impl Into<String>) -> Self {
        Self {
            meta: PageMetaView {
                title: title.into(),
            },
            ..self
        }
    }
}

#[derive(Clone)]
pub struct LayoutContext<T> {
    pub brand: BrandView,
    pub navigation: Vec<NavigationLinkView>,
    pub footer: String,
    pub meta: PageMetaView,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(chrome: LayoutChrome, content: T) -> Self {
        Self {
            brand: chrome.brand,
            navigation: chrome.navigation,
            footer: chrome.footer,
            meta: chrome.meta,
            content,
        }
    }
}

#[derive(Clone)]
pub struct GroupLinkView {
    pub title: String,
    pub href: String,
}

#[derive(Clone)]
pub struct PostCard {
    pub id: i64,
    pub text: String,
    pub label: String,
    pub author_username: String,
    pub author_href: String,
    pub published: String,
    pub iso_date: String,
    pub group: Option<GroupLinkView>,
    pub image_url: Option<String>,
    pub detail_href: String,
}

impl From<&PostRecord> for PostCard {
    fn from(post: &PostRecord) -> Self {
        Self {
            id: post.id,
            text: post.text.clone(),
            label: post.label().to_string(),
            author_username: post.author_username.clone(),
            author_href: profile_href(&post.author_username),
            published: format_pub_date(post.created_at),
            iso_date: post.created_at.format(&Rfc3339).unwrap_or_default(),
            group: post.group.as_ref().map(|group| GroupLinkView {
                title: group.title.clone(),
                href: group_href(&group.slug),
            }),
            image_url: post.image.as_deref().map(media_href),
            detail_href: post_href(post.id),
        }
    }
}

#[derive(Clone)]
pub struct PaginationView {
    pub number: u64,
    pub num_pages: u64,
    pub first_href: Option<String>,
    pub previous_href: Option<String>,
    pub next_href: Option<String>,
    pub last_href: Option<String>,
}

impl PaginationView {
    pub fn new(window: &PageWindow, path: &str, query: Option<&str>) -> Self {
        let link = |page: u64| page_link(path, query, page);
        Self {
            number: window.number(),
            num_pages: window.num_pages(),
            first_href: window.has_previous().then(|| link(1)),
            previous_href: window.previous_number().map(link),
            next_href: window.next_number().map(link),
            last_href: window.has_next().then(|| link(window.num_pages())),
        }
    }

    pub fn is_paginated(&self) -> bool {
        self.num_pages > 1
    }
}

#[derive(Clone)]
pub struct FeedView {
    pub posts: Vec<PostCard>,
    pub total: u64,
    pub pagination: PaginationView,
}

impl FeedView {
    pub fn new(page: &Page<PostRecord>, path: &str, query: Option<&str>) -> Self {
        Self {
            posts: page.items.iter().map(PostCard::from).collect(),
            total: page.window.total(),
            pagination: PaginationView::new(&page.window, path, query),
        }
    }

    pub fn has_results(&self) -> bool {
        !self.posts.is_empty()
    }
}

/// A page whose only content is a feed.
pub struct FeedPageView {
    pub feed: FeedView,
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub view: LayoutContext<FeedPageView>,
}

pub struct GroupPageView {
    pub title: String,
    pub description: String,
    pub feed: FeedView,
}

impl GroupPageView {
    pub fn new(group: &GroupRecord, feed: FeedView) -> Self {
        Self {
            title: group.title.clone(),
            description: group.description.clone(),
            feed,
        }
    }
}

#[derive(Template)]
#[template(path = "group_list.html")]
pub struct GroupTemplate {
    pub view: LayoutContext<GroupPageView>,
}

pub struct ProfileView {
    pub username: String,
    pub post_count: u64,
    pub follower_count: u64,
    /// The viewer is signed in and looking at someone else's profile.
    pub can_follow: bool,
    pub following: bool,
    pub follow_href: String,
    pub unfollow_href: String,
    pub feed: FeedView,
}

impl ProfileView {
    pub fn new(
        author: &UserRecord,
        viewer: Option<&UserRecord>,
        post_count: u64,
        follower_count: u64,
        following: bool,
        feed: FeedView,
    ) -> Self {
        let base = profile_href(&author.username);
        Self {
            username: author.username.clone(),
            post_count,
            follower_count,
            can_follow: viewer.is_some_and(|viewer| viewer.id != author.id),
            following,
            follow_href: format!("{base}follow"),
            unfollow_href: format!("{base}unfollow"),
            feed,
        }
    }
}

#[derive(Template)]
#[template(path = "profile.html")]
pub struct ProfileTemplate {
    pub view: LayoutContext<ProfileView>,
}

#[derive(Template)]
#[template(path = "follow.html")]
pub struct FollowTemplate {
    pub view: LayoutContext<FeedPageView>,
}

pub struct CommentView {
    pub author_username: String,
    pub author_href: String,
    pub text: String,
    pub published: String,
}

impl From<&CommentRecord> for CommentView {
    fn from(comment: &CommentRecord) -> Self {
        Self {
            author_username: comment.author_username.clone(),
            author_href: profile_href(&comment.author_username),
            text: comment.text.clone(),
            published: format_pub_date(comment.created_at),
        }
    }
}

pub struct PostDetailView {
    pub post: PostCard,
    pub author_post_count: u64,
    pub author_follower_count: u64,
    pub comments: Vec<CommentView>,
    pub can_edit: bool,
    pub edit_href: String,
    pub can_comment: bool,
    pub comment_action: String,
    pub form: FormView,
}

#[derive(Template)]
#[template(path = "post_detail.html")]
pub struct PostDetailTemplate {
    pub view: LayoutContext<PostDetailView>,
}

/// A selectable option of a choice field.
pub struct ChoiceView {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

/// One field of a rendered form, derived from its schema.
pub struct FieldView {
    pub name: &'static str,
    pub label: &'static str,
    pub help_text: &'static str,
    pub required: bool,
    pub is_text: bool,
    pub is_choice: bool,
    pub is_image: bool,
    pub value: String,
    pub choices: Vec<ChoiceView>,
    pub errors: Vec<String>,
}

pub struct FormView {
    pub name: &'static str,
    pub fields: Vec<FieldView>,
}

impl FormView {
    fn from_schema(schema: &FormSchema, errors: Option<&FormErrors>) -> Self {
        let fields = schema
            .fields
            .iter()
            .map(|field| FieldView {
                name: field.name,
                label: field.label,
                help_text: field.help_text,
                required: field.required,
                is_text: field.kind == FieldKind::Text,
                is_choice: field.kind == FieldKind::Choice,
                is_image: field.kind == FieldKind::Image,
                value: String::new(),
                choices: Vec::new(),
                errors: errors
                    .map(|errors| errors.for_field(field.name).to_vec())
                    .unwrap_or_default(),
            })
            .collect();

        Self {
            name: schema.name,
            fields,
        }
    }

    fn field_mut(&mut self, name: &str) -> Option<&mut FieldView> {
        self.fields.iter_mut().find(|field| field.name == name)
    }

    pub fn comment() -> Self {
        Self::from_schema(&COMMENT_FORM, None)
    }

    /// The post form, pre-filled with `text` and the selected `group`.
    pub fn post(
        groups: &[GroupRecord],
        text: &str,
        group: Option<&str>,
        errors: Option<&FormErrors>,
    ) -> Self {
        let mut form = Self::from_schema(&POST_FORM, errors);
        if let Some(field) = form.field_mut("text") {
            field.value = text.to_string();
        }
        if let Some(field) = form.field_mut("group") {
            let selected = group.map(str::trim).unwrap_or_default();
            field.value = selected.to_string();
            field.choices = groups
                .iter()
                .map(|candidate| {
                    let value = candidate.id.to_string();
                    ChoiceView {
                        selected: value == selected,
                        value,
                        label: candidate.title.clone(),
                    }
                })
                .collect();
        }
        form
    }

    pub fn has_errors(&self) -> bool {
        self.fields.iter().any(|field| !field.errors.is_empty())
    }
}

pub struct PostFormView {
    pub is_edit: bool,
    pub action: String,
    pub current_image: Option<String>,
    pub form: FormView,
}

#[derive(Template)]
#[template(path = "create_post.html")]
pub struct PostFormTemplate {
    pub view: LayoutContext<PostFormView>,
}

#[derive(Template)]
#[template(path = "about/author.html")]
pub struct AboutAuthorTemplate {
    pub view: LayoutContext<()>,
}

#[derive(Template)]
#[template(path = "about/tech.html")]
pub struct AboutTechTemplate {
    pub view: LayoutContext<()>,
}

pub struct ErrorPageView {
    pub title: String,
    pub message: String,
    pub primary_action: Option<ErrorAction>,
}

impl ErrorPageView {
    pub fn not_found() -> Self {
        Self {
            title: "Page not found".to_string(),
            message: "The page you requested does not exist.".to_string(),
            primary_action: Some(ErrorAction::home()),
        }
    }
}

pub struct ErrorAction {
    pub href: String,
    pub label: String,
}

impl ErrorAction {
    pub fn home() -> Self {
        Self {
            href: "/".to_string(),
            label: "Back to home".to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "core/404.html")]
pub struct ErrorTemplate {
    pub view: LayoutContext<ErrorPageView>,
}

pub fn profile_href(username: &str) -> String {
    format!("/profile/{username}/")
}

pub fn group_href(slug: &str) -> String {
    format!("/group/{slug}/")
}

pub fn post_href(id: i64) -> String {
    format!("/posts/{id}/")
}

pub fn media_href(path: &str) -> String {
    format!("/media/{path}")
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU32;

    use time::macros::datetime;

    use super::*;
    use crate::domain::entities::GroupRef;

    fn post(text: &str) -> PostRecord {
        PostRecord {
            id: 7,
            text: text.to_string(),
            created_at: datetime!(2023-01-08 12:00 UTC),
            author_id: 1,
            author_username: "leo".to_string(),
            group: Some(GroupRef {
                id: 3,
                slug: "cats".to_string(),
                title: "Cats".to_string(),
            }),
            image: Some("posts/2023/01/08/a-cat.gif".to_string()),
        }
    }

    #[test]
    fn post_card_links_author_group_and_image() {
        let card = PostCard::from(&post("A very long post about cats"));

        assert_eq!(card.label, "A very long pos");
        assert_eq!(card.author_href, "/profile/leo/");
        assert_eq!(card.detail_href, "/posts/7/");
        assert_eq!(card.published, "8 January 2023");
        let group = card.group.expect("group link");
        assert_eq!(group.href, "/group/cats/");
        assert_eq!(
            card.image_url.as_deref(),
            Some("/media/posts/2023/01/08/a-cat.gif")
        );
    }

    #[test]
    fn pagination_links_keep_other_query_pairs() {
        let window = PageWindow::resolve(25, NonZeroU32::new(10).expect("size"), Some("2"));
        let view = PaginationView::new(&window, "/", Some("page=2&sort=new"));

        assert!(view.is_paginated());
        assert_eq!(view.previous_href.as_deref(), Some("/?sort=new&page=1"));
        assert_eq!(view.next_href.as_deref(), Some("/?sort=new&page=3"));
        assert_eq!(view.last_href.as_deref(), Some("/?sort=new&page=3"));
    }

    #[test]
    fn post_form_follows_schema_order_and_marks_selection() {
        let groups = vec![GroupRecord {
            id: 3,
            title: "Cats".to_string(),
            slug: "cats".to_string(),
            description: String::new(),
        }];

        let mut errors = FormErrors::new();
        errors.add("text", "This field is required.");
        let form = FormView::post(&groups, "", Some("3"), Some(&errors));

        let names: Vec<_> = form.fields.iter().map(|field| field.name).collect();
        assert_eq!(names, vec!["text", "group", "image"]);
        assert!(form.has_errors());
        assert!(form.fields[1].choices[0].selected);
        assert!(form.fields[2].is_image);
    }
}
