use crate::gate::{self, CurrentSession};
use crate::templates::{render_page, BaseContext, HomeTemplate, NotFoundTemplate};
use crate::{auth_pages, brand_page, dashboard, diagnostics};
use adbrief_shared::AppState;
use axum::{
    http::{StatusCode, Uri},
    middleware,
    response::Response,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Build the page router with the session gate in front of every route.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/login", get(auth_pages::login_page).post(auth_pages::login_submit))
        .route("/signup", get(auth_pages::signup_page).post(auth_pages::signup_submit))
        .route("/logout", post(auth_pages::logout))
        .route("/dashboard", get(dashboard::show))
        .route("/dashboard/", get(dashboard::show))
        .route("/dashboard/brands", post(dashboard::create_brand))
        .route("/brands/{brand_id}", get(brand_page::show))
        .route("/brands/{brand_id}/positioning", post(brand_page::save_positioning))
        .route("/dashboard-test", get(diagnostics::request_info))
        .route("/dashboard-simple", get(diagnostics::auth_status))
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(state.clone(), gate::session_gate))
        .with_state(state)
}

async fn home(current: CurrentSession) -> Response {
    let template = HomeTemplate {
        base: BaseContext::new(&current, None),
    };
    render_page(StatusCode::OK, &template)
}

async fn not_found(current: CurrentSession, uri: Uri) -> Response {
    tracing::info!("No route for {}", uri.path());
    let template = NotFoundTemplate {
        base: BaseContext::new(&current, None),
        path: uri.path().to_string(),
    };
    render_page(StatusCode::NOT_FOUND, &template)
}
