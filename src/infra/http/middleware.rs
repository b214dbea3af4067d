use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{error, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;

use super::{HttpState, Viewer, login_redirect, repo_error_to_http};

#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let ctx = RequestContext {
        request_id: request_id.clone(),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(ctx);
    response
}

pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();

    let viewer = request
        .extensions()
        .get::<Viewer>()
        .and_then(|viewer| viewer.0.as_ref())
        .map(|user| user.username.clone());

    let mut response = next.run(request).await;
    let status = response.status();

    if status.is_client_error() || status.is_server_error() {
        let elapsed_ms = start.elapsed().as_millis();
        let report = response.extensions_mut().remove::<ErrorReport>();
        let (source, messages) = match report {
            Some(report) => (report.source, report.messages),
            None => ("unknown", Vec::new()),
        };
        let detail = messages
            .first()
            .cloned()
            .unwrap_or_else(|| "no diagnostic available".to_string());

        if status.is_server_error() {
            error!(
                target = "yatube::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                viewer = viewer.as_deref().unwrap_or(""),
                "request failed",
            );
        } else {
            warn!(
                target = "yatube::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                viewer = viewer.as_deref().unwrap_or(""),
                "client request error",
            );
        }
    }

    response
}

/// Resolve the viewer through the identity collaborator and stash it in the
/// request extensions. Anonymous requests carry `Viewer(None)`.
pub async fn resolve_identity(
    State(state): State<HttpState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    match state.identity.identify(request.headers()).await {
        Ok(user) => {
            request.extensions_mut().insert(Viewer(user));
            next.run(request).await
        }
        Err(err) => {
            error!(
                target = "yatube::http::identity",
                error = %err,
                path = %request.uri().path(),
                "failed to resolve viewer",
            );
            repo_error_to_http("infra::http::middleware::resolve_identity", err).into_response()
        }
    }
}

/// Guard for routes that need a signed-in user: anonymous requests are sent
/// to the login page with `next` pointing back here.
pub async fn require_user(
    State(state): State<HttpState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let signed_in = request
        .extensions()
        .get::<Viewer>()
        .is_some_and(|viewer| viewer.0.is_some());

    if signed_in {
        next.run(request).await
    } else {
        login_redirect(&state.login_url, request.uri()).into_response()
    }
}
