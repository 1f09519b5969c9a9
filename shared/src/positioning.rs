use crate::editor::Document;
use crate::error::StoreError;
use crate::store::RecordStore;
use crate::types::Positioning;
use chrono::Utc;

#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    Inserted(Positioning),
    Updated(Positioning),
}

impl SaveOutcome {
    pub fn positioning(&self) -> &Positioning {
        match self {
            Self::Inserted(p) | Self::Updated(p) => p,
        }
    }
}

/// The brand's positioning row, if any.
///
/// Uniqueness per brand is not enforced by the table; when several rows exist
/// the oldest one is used so reads and writes keep hitting the same record.
pub async fn load_positioning(
    store: &dyn RecordStore,
    brand_id: &str,
) -> Result<Option<Positioning>, StoreError> {
    let rows = store.list_positioning(brand_id).await?;
    if rows.len() > 1 {
        tracing::warn!(
            "Brand {} has {} positioning rows; using the oldest",
            brand_id,
            rows.len()
        );
    }
    Ok(rows
        .into_iter()
        .min_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id))))
}

/// Upsert: update the existing row in place, insert only when none exists.
pub async fn save_positioning(
    store: &dyn RecordStore,
    brand_id: &str,
    document: &Document,
) -> Result<SaveOutcome, StoreError> {
    let content = serde_json::to_value(document)?;
    let now = Utc::now();

    match load_positioning(store, brand_id).await? {
        Some(mut existing) => {
            existing.content = Some(content);
            existing.updated_at = now;
            store.update_positioning(&existing).await?;
            tracing::info!("Updated positioning {} for brand {}", existing.id, brand_id);
            Ok(SaveOutcome::Updated(existing))
        }
        None => {
            let positioning = Positioning {
                id: uuid::Uuid::new_v4().to_string(),
                brand_id: brand_id.to_string(),
                content: Some(content),
                created_at: now,
                updated_at: now,
            };
            store.insert_positioning(&positioning).await?;
            tracing::info!("Inserted positioning {} for brand {}", positioning.id, brand_id);
            Ok(SaveOutcome::Inserted(positioning))
        }
    }
}

/// Parse stored content back into an editor document. Unreadable content is
/// logged and shown as empty.
pub fn stored_document(positioning: &Positioning) -> Option<Document> {
    let value = positioning.content.as_ref()?;
    match Document::from_value(value) {
        Ok(document) => Some(document),
        Err(e) => {
            tracing::warn!("Positioning {} has unreadable content: {}", positioning.id, e);
            None
        }
    }
}
