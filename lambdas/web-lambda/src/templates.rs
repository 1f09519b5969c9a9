//! Askama templates for the pages.

use crate::flash::Flash;
use crate::gate::CurrentSession;
use adbrief_shared::types::Brand;
use askama::Template;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

/// Base data available to all templates
pub struct BaseContext {
    pub email: Option<String>,
    pub flash: Option<Flash>,
}

impl BaseContext {
    pub fn new(current: &CurrentSession, flash: Option<Flash>) -> Self {
        Self {
            email: current.email().map(str::to_string),
            flash,
        }
    }

    pub fn signed_in(&self) -> bool {
        self.email.is_some()
    }

    pub fn email_or_empty(&self) -> &str {
        self.email.as_deref().unwrap_or_default()
    }
}

pub fn render_page<T: Template>(status: StatusCode, template: &T) -> Response {
    match template.render() {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            tracing::error!("Template error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
        }
    }
}

#[derive(Template)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub base: BaseContext,
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub base: BaseContext,
    pub error: Option<String>,
    pub email: String,
}

#[derive(Template)]
#[template(path = "signup.html")]
pub struct SignupTemplate {
    pub base: BaseContext,
    pub error: Option<String>,
    pub email: String,
    /// Account created; waiting for email confirmation.
    pub confirmation_pending: bool,
}

/// Brand list entry
pub struct BrandRow {
    pub id: String,
    pub name: String,
    pub logo_url: Option<String>,
    pub created: String,
}

impl From<&Brand> for BrandRow {
    fn from(brand: &Brand) -> Self {
        Self {
            id: brand.id.clone(),
            name: brand.name.clone(),
            logo_url: brand.logo_url.clone(),
            created: brand.created_at.format("%b %-d, %Y").to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub base: BaseContext,
    pub brands: Vec<BrandRow>,
    pub form_error: Option<String>,
    pub form_name: String,
    pub form_logo_url: String,
}

#[derive(Template)]
#[template(path = "brand.html")]
pub struct BrandTemplate {
    pub base: BaseContext,
    pub brand: BrandRow,
    /// Widget settings as JSON.
    pub editor_config: String,
    /// Stored document as JSON, empty when there is none.
    pub document_json: String,
    /// Textarea value for browsers without scripts.
    pub content_text: String,
    /// Escaped HTML of the saved document.
    pub preview_html: String,
    pub last_saved: Option<String>,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "dashboard_test.html")]
pub struct DashboardTestTemplate {
    pub base: BaseContext,
    pub info_json: String,
}

#[derive(Template)]
#[template(path = "dashboard_simple.html")]
pub struct DashboardSimpleTemplate {
    pub base: BaseContext,
    pub status: String,
    pub redirect_after_secs: Option<u32>,
}

#[derive(Template)]
#[template(path = "not_found.html")]
pub struct NotFoundTemplate {
    pub base: BaseContext,
    pub path: String,
}
