use crate::flash::{Flash, FlashQuery};
use crate::gate::{CurrentSession, RequireSession, DASHBOARD_PATH};
use crate::templates::{render_page, BaseContext, BrandRow, BrandTemplate};
use adbrief_shared::editor::Document;
use adbrief_shared::positioning::{self, SaveOutcome};
use adbrief_shared::session::Session;
use adbrief_shared::types::{Brand, Positioning};
use adbrief_shared::{brands, AppState};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Deserialize)]
pub struct PositioningForm {
    /// Editor JSON, or plain text when scripts are off.
    #[serde(default)]
    content: String,
}

fn back_to_dashboard() -> Response {
    Redirect::to(&Flash::BrandLoadFailed.redirect_target(DASHBOARD_PATH)).into_response()
}

/// The brand if the session owns it; otherwise the redirect to send.
async fn owned_brand(state: &AppState, session: &Session, brand_id: &str) -> Result<Brand, Response> {
    match brands::get_brand(state.store.as_ref(), &session.user.id, brand_id).await {
        Ok(Some(brand)) => Ok(brand),
        Ok(None) => {
            tracing::info!("Brand {} not found for user {}", brand_id, session.user.id);
            Err(back_to_dashboard())
        }
        Err(e) => {
            tracing::error!("Failed to load brand {}: {}", brand_id, e);
            Err(back_to_dashboard())
        }
    }
}

struct Editing {
    content_text: String,
    error: Option<String>,
}

fn render_brand(
    state: &AppState,
    session: Session,
    brand: &Brand,
    saved: Option<&Positioning>,
    editing: Option<Editing>,
    flash: Option<Flash>,
    status: StatusCode,
) -> Response {
    let document = saved.and_then(positioning::stored_document);
    // A rejected edit that still parses goes back into the widget.
    let edited = editing
        .as_ref()
        .and_then(|e| serde_json::from_str::<Document>(e.content_text.trim()).ok());
    let document_json = edited
        .as_ref()
        .or(document.as_ref())
        .and_then(|d| serde_json::to_string(d).ok())
        .unwrap_or_default();
    let preview_html = document.as_ref().map(Document::to_html).unwrap_or_default();
    let (content_text, error) = match editing {
        Some(editing) => (editing.content_text, editing.error),
        None => (document.as_ref().map(Document::plain_text).unwrap_or_default(), None),
    };

    let template = BrandTemplate {
        base: BaseContext::new(&CurrentSession(Some(session)), flash),
        brand: BrandRow::from(brand),
        editor_config: state.editor.to_json(),
        document_json,
        content_text,
        preview_html,
        last_saved: saved.map(|p| p.updated_at.format("%Y-%m-%d %H:%M UTC").to_string()),
        error,
    };
    render_page(status, &template)
}

/// Brand detail handler.
pub async fn show(
    State(state): State<Arc<AppState>>,
    RequireSession(session): RequireSession,
    Path(brand_id): Path<String>,
    Query(query): Query<FlashQuery>,
) -> Response {
    let brand = match owned_brand(&state, &session, &brand_id).await {
        Ok(brand) => brand,
        Err(redirect) => return redirect,
    };

    let (saved, flash) = match positioning::load_positioning(state.store.as_ref(), &brand.id).await {
        Ok(saved) => (saved, query.flash()),
        Err(e) => {
            tracing::error!("Failed to load positioning for brand {}: {}", brand.id, e);
            (None, Some(Flash::PositioningLoadFailed))
        }
    };

    render_brand(&state, session, &brand, saved.as_ref(), None, flash, StatusCode::OK)
}

/// Positioning save handler. Invalid documents are returned to the form
/// without a write.
pub async fn save_positioning(
    State(state): State<Arc<AppState>>,
    RequireSession(session): RequireSession,
    Path(brand_id): Path<String>,
    Form(form): Form<PositioningForm>,
) -> Response {
    let brand = match owned_brand(&state, &session, &brand_id).await {
        Ok(brand) => brand,
        Err(redirect) => return redirect,
    };

    let document = match Document::parse_submission(&form.content, &state.editor) {
        Ok(document) => document,
        Err(e) => {
            tracing::info!("Rejected positioning for brand {}: {}", brand.id, e);
            let saved = match positioning::load_positioning(state.store.as_ref(), &brand.id).await {
                Ok(saved) => saved,
                Err(e) => {
                    tracing::error!("Failed to load positioning for brand {}: {}", brand.id, e);
                    None
                }
            };
            let editing = Editing {
                content_text: form.content,
                error: Some(format!("Positioning could not be saved: {}", e)),
            };
            return render_brand(
                &state,
                session,
                &brand,
                saved.as_ref(),
                Some(editing),
                None,
                StatusCode::UNPROCESSABLE_ENTITY,
            );
        }
    };

    let flash = match positioning::save_positioning(state.store.as_ref(), &brand.id, &document).await {
        Ok(SaveOutcome::Inserted(_)) | Ok(SaveOutcome::Updated(_)) => Flash::PositioningSaved,
        Err(e) => {
            tracing::error!("Failed to save positioning for brand {}: {}", brand.id, e);
            Flash::PositioningSaveFailed
        }
    };
    Redirect::to(&flash.redirect_target(&format!("/brands/{}", brand.id))).into_response()
}
