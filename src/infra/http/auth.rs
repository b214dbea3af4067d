//! Viewer extraction and the login redirect used by the `require_user` guard.

use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, Uri, request::Parts},
    response::Redirect,
};
use url::form_urlencoded;

use crate::application::error::HttpError;
use crate::domain::entities::UserRecord;

const NEXT_PARAM: &str = "next";

/// The user resolved for this request, if any.
#[derive(Debug, Clone, Default)]
pub struct Viewer(pub Option<UserRecord>);

impl Viewer {
    pub fn user(&self) -> Option<&UserRecord> {
        self.0.as_ref()
    }
}

impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Viewer>().cloned().unwrap_or_default())
    }
}

/// A signed-in user. Only used behind the `require_user` guard, so a missing
/// viewer is an internal routing mistake.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserRecord);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = HttpError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Viewer>()
            .and_then(|viewer| viewer.0.clone())
            .map(CurrentUser)
            .ok_or_else(|| {
                HttpError::new(
                    "infra::http::auth::CurrentUser",
                    StatusCode::UNAUTHORIZED,
                    "Authentication required",
                    format!("no viewer resolved for {}", parts.uri.path()),
                )
            })
    }
}

/// `303 See Other` to the login page, carrying the original path and query.
pub fn login_redirect(login_url: &str, original: &Uri) -> Redirect {
    let next = original
        .path_and_query()
        .map(|value| value.as_str())
        .unwrap_or_else(|| original.path());

    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair(NEXT_PARAM, next)
        .finish();
    let separator = if login_url.contains('?') { '&' } else { '?' };

    Redirect::to(&format!("{login_url}{separator}{query}"))
}

#[cfg(test)]
mod tests {
    use axum::{http::header::LOCATION, response::IntoResponse};

    use super::*;

    fn location(redirect: Redirect) -> String {
        let response = redirect.into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .expect("location header")
            .to_string()
    }

    #[test]
    fn redirect_carries_path_and_query() {
        let uri: Uri = "/follow/?page=2".parse().expect("uri");
        assert_eq!(
            location(login_redirect("/auth/login/", &uri)),
            "/auth/login/?next=%2Ffollow%2F%3Fpage%3D2"
        );
    }

    #[test]
    fn redirect_appends_to_existing_login_query() {
        let uri: Uri = "/create/".parse().expect("uri");
        assert_eq!(
            location(login_redirect("https://sso.example/login?app=yatube", &uri)),
            "https://sso.example/login?app=yatube&next=%2Fcreate%2F"
        );
    }
}
