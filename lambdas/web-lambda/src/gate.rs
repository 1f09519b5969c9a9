//! Session gate: the one place that decides whether a request may reach a
//! page.
//!
//! The session is resolved once per request from the cookies. Protected
//! paths without a session go to `/login`; the login and signup pages with a
//! session go to `/dashboard`. Handlers read the result through
//! [`CurrentSession`] or [`RequireSession`] and never check cookies
//! themselves.

use adbrief_shared::session::{Resolved, Session, SessionCookies};
use adbrief_shared::AppState;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use std::sync::Arc;

pub const LOGIN_PATH: &str = "/login";
pub const DASHBOARD_PATH: &str = "/dashboard";

const PROTECTED_PREFIXES: [&str; 2] = ["/dashboard", "/brands"];
const AUTH_PAGES: [&str; 2] = ["/login", "/signup"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Requires a session.
    Protected,
    /// Only for visitors without a session.
    AuthPage,
    Public,
}

/// `path` is `prefix` itself or lies below it. `/dashboard-test` is not
/// under `/dashboard`.
fn is_under(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

pub fn classify(path: &str) -> Access {
    if PROTECTED_PREFIXES.iter().any(|prefix| is_under(path, prefix)) {
        Access::Protected
    } else if AUTH_PAGES
        .iter()
        .any(|page| path == *page || path.strip_suffix('/') == Some(page))
    {
        Access::AuthPage
    } else {
        Access::Public
    }
}

/// Gate decision handed to the handlers.
#[derive(Debug, Clone, Default)]
pub struct CurrentSession(pub Option<Session>);

impl CurrentSession {
    pub fn email(&self) -> Option<&str> {
        self.0.as_ref().map(|s| s.user.email.as_str())
    }
}

impl<S: Send + Sync> FromRequestParts<S> for CurrentSession {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<CurrentSession>()
            .cloned()
            .unwrap_or_default())
    }
}

/// Extractor for handlers that only make sense with a session.
pub struct RequireSession(pub Session);

impl<S: Send + Sync> FromRequestParts<S> for RequireSession {
    type Rejection = Redirect;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentSession>()
            .and_then(|current| current.0.clone())
            .map(RequireSession)
            .ok_or_else(|| Redirect::to(LOGIN_PATH))
    }
}

/// Add `Set-Cookie` headers to a response. Values that are not valid header
/// text are skipped.
pub fn append_set_cookies(response: &mut Response, cookies: &[String]) {
    for cookie in cookies {
        match HeaderValue::from_str(cookie) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => tracing::error!("Dropping invalid Set-Cookie value: {}", e),
        }
    }
}

pub fn redirect_with_cookies(to: &str, cookies: &[String]) -> Response {
    let mut response = Redirect::to(to).into_response();
    append_set_cookies(&mut response, cookies);
    response
}

/// Middleware: resolve the session, redirect mismatched routes, pass the
/// decision on.
pub async fn session_gate(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let presented =
        SessionCookies::from_lookup(|name| jar.get(name).map(|c| c.value().to_string()));

    let resolved = match state.sessions.resolve(&presented).await {
        Ok(resolved) => resolved,
        Err(e) => {
            tracing::warn!("Session check failed on {}: {}; continuing signed out", path, e);
            Resolved::default()
        }
    };

    let access = classify(&path);
    let mut response = match (access, resolved.session) {
        (Access::Protected, None) => {
            tracing::info!("No session on {}; redirecting to {}", path, LOGIN_PATH);
            Redirect::to(LOGIN_PATH).into_response()
        }
        (Access::AuthPage, Some(session)) => {
            tracing::info!(
                "User {} already signed in on {}; redirecting to {}",
                session.user.id,
                path,
                DASHBOARD_PATH
            );
            Redirect::to(DASHBOARD_PATH).into_response()
        }
        (_, session) => {
            request.extensions_mut().insert(CurrentSession(session));
            next.run(request).await
        }
    };

    // Cookies written by the handler (sign-in, sign-out) take precedence.
    if !response.headers().contains_key(header::SET_COOKIE) {
        append_set_cookies(&mut response, &resolved.set_cookies);
    }
    response
}
