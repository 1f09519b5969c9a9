use crate::flash::{Flash, FlashQuery};
use crate::gate::{CurrentSession, RequireSession, DASHBOARD_PATH};
use crate::templates::{render_page, BaseContext, BrandRow, DashboardTemplate};
use adbrief_shared::brands;
use adbrief_shared::session::Session;
use adbrief_shared::types::CreateBrandRequest;
use adbrief_shared::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use std::sync::Arc;

/// Create-form state to echo back after a rejected submission.
#[derive(Default)]
struct BrandForm {
    error: Option<String>,
    name: String,
    logo_url: String,
}

async fn render_dashboard(
    state: &AppState,
    session: Session,
    mut flash: Option<Flash>,
    form: BrandForm,
    status: StatusCode,
) -> Response {
    let brands = match brands::list_brands(state.store.as_ref(), &session.user.id).await {
        Ok(brands) => brands.iter().map(BrandRow::from).collect(),
        Err(e) => {
            tracing::error!("Failed to list brands for {}: {}", session.user.id, e);
            flash = Some(Flash::BrandsLoadFailed);
            Vec::new()
        }
    };

    let template = DashboardTemplate {
        base: BaseContext::new(&CurrentSession(Some(session)), flash),
        brands,
        form_error: form.error,
        form_name: form.name,
        form_logo_url: form.logo_url,
    };
    render_page(status, &template)
}

/// Dashboard handler.
pub async fn show(
    State(state): State<Arc<AppState>>,
    RequireSession(session): RequireSession,
    Query(query): Query<FlashQuery>,
) -> Response {
    render_dashboard(&state, session, query.flash(), BrandForm::default(), StatusCode::OK).await
}

/// Brand creation form handler. Nothing is written unless the form is valid.
pub async fn create_brand(
    State(state): State<Arc<AppState>>,
    RequireSession(session): RequireSession,
    Form(req): Form<CreateBrandRequest>,
) -> Response {
    let new_brand = match brands::validate_brand_form(&req) {
        Ok(new_brand) => new_brand,
        Err(e) => {
            let form = BrandForm {
                error: Some(e.to_string()),
                name: req.name.clone(),
                logo_url: req.logo_url.clone().unwrap_or_default(),
            };
            return render_dashboard(&state, session, None, form, StatusCode::UNPROCESSABLE_ENTITY)
                .await;
        }
    };

    let flash = match brands::create_brand(state.store.as_ref(), &session.user.id, new_brand).await {
        Ok(_) => Flash::BrandCreated,
        Err(e) => {
            tracing::error!("Failed to create brand for {}: {}", session.user.id, e);
            Flash::BrandCreateFailed
        }
    };
    Redirect::to(&flash.redirect_target(DASHBOARD_PATH)).into_response()
}
