use crate::gate::{redirect_with_cookies, CurrentSession, DASHBOARD_PATH};
use crate::templates::{render_page, BaseContext, LoginTemplate, SignupTemplate};
use adbrief_shared::error::AuthError;
use adbrief_shared::session::SignUpResult;
use adbrief_shared::AppState;
use axum::{extract::State, http::StatusCode, response::Response, Form};
use serde::Deserialize;
use std::sync::Arc;

/// Login and signup form data.
#[derive(Deserialize)]
pub struct CredentialsForm {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

impl CredentialsForm {
    fn email(&self) -> &str {
        self.email.trim()
    }

    fn is_complete(&self) -> bool {
        !self.email().is_empty() && !self.password.is_empty()
    }
}

const MISSING_CREDENTIALS: &str = "Email and password are required";

fn status_for(err: &AuthError) -> StatusCode {
    match err {
        AuthError::InvalidCredentials
        | AuthError::UserNotConfirmed
        | AuthError::UserNotFound
        | AuthError::PasswordResetRequired
        | AuthError::SessionExpired => StatusCode::UNAUTHORIZED,
        AuthError::UserExists | AuthError::InvalidPassword | AuthError::InvalidParameter => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        AuthError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
        AuthError::MissingResult | AuthError::Service(_) => StatusCode::BAD_GATEWAY,
    }
}

fn login_form(status: StatusCode, error: Option<&str>, email: &str) -> Response {
    let template = LoginTemplate {
        base: BaseContext::new(&CurrentSession::default(), None),
        error: error.map(str::to_string),
        email: email.to_string(),
    };
    render_page(status, &template)
}

fn signup_form(status: StatusCode, error: Option<&str>, email: &str) -> Response {
    let template = SignupTemplate {
        base: BaseContext::new(&CurrentSession::default(), None),
        error: error.map(str::to_string),
        email: email.to_string(),
        confirmation_pending: false,
    };
    render_page(status, &template)
}

/// Login page handler.
pub async fn login_page() -> Response {
    login_form(StatusCode::OK, None, "")
}

/// Login form submission handler.
pub async fn login_submit(
    State(state): State<Arc<AppState>>,
    Form(form): Form<CredentialsForm>,
) -> Response {
    if !form.is_complete() {
        return login_form(StatusCode::UNPROCESSABLE_ENTITY, Some(MISSING_CREDENTIALS), form.email());
    }

    match state.sessions.sign_in(form.email(), &form.password).await {
        Ok(signed_in) => redirect_with_cookies(DASHBOARD_PATH, &signed_in.set_cookies),
        Err(e) => {
            tracing::info!("Login failed for {}: {}", form.email(), e);
            login_form(status_for(&e), Some(e.user_message()), form.email())
        }
    }
}

pub async fn signup_page() -> Response {
    signup_form(StatusCode::OK, None, "")
}

pub async fn signup_submit(
    State(state): State<Arc<AppState>>,
    Form(form): Form<CredentialsForm>,
) -> Response {
    if !form.is_complete() {
        return signup_form(StatusCode::UNPROCESSABLE_ENTITY, Some(MISSING_CREDENTIALS), form.email());
    }

    match state.sessions.sign_up(form.email(), &form.password).await {
        Ok(SignUpResult::SignedIn(signed_in)) => {
            redirect_with_cookies(DASHBOARD_PATH, &signed_in.set_cookies)
        }
        Ok(SignUpResult::PendingConfirmation) => {
            let template = SignupTemplate {
                base: BaseContext::new(&CurrentSession::default(), None),
                error: None,
                email: form.email().to_string(),
                confirmation_pending: true,
            };
            render_page(StatusCode::OK, &template)
        }
        Err(e) => {
            tracing::info!("Signup failed for {}: {}", form.email(), e);
            signup_form(status_for(&e), Some(e.user_message()), form.email())
        }
    }
}

/// Logout handler.
pub async fn logout(State(state): State<Arc<AppState>>, current: CurrentSession) -> Response {
    let cleared = state.sessions.sign_out(current.0.as_ref()).await;
    redirect_with_cookies("/", &cleared)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn credential_failures_are_unauthorized() {
        assert_eq!(status_for(&AuthError::InvalidCredentials), StatusCode::UNAUTHORIZED);
        assert_eq!(status_for(&AuthError::UserExists), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(status_for(&AuthError::TooManyRequests), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(status_for(&AuthError::Service("boom".into())), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn blank_fields_are_incomplete() {
        let form = CredentialsForm {
            email: "  ".into(),
            password: "secret".into(),
        };
        assert!(!form.is_complete());
    }
}
