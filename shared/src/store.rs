//! Table access for `profiles`, `brands` and `brand_positioning`.
//!
//! Key layout:
//! - `profiles`: partition key `id`
//! - `brands`: partition key `user_id`, sort key `id`
//! - `brand_positioning`: partition key `brand_id`, sort key `id`
//!
//! Keying brands by owner makes every brand read owner-scoped.

use crate::config::Config;
use crate::error::StoreError;
use crate::types::{Brand, Positioning, Profile};
use async_trait::async_trait;
use aws_sdk_dynamodb::{
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
    types::AttributeValue,
    Client as DynamoClient,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

type Item = HashMap<String, AttributeValue>;

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get_profile(&self, id: &str) -> Result<Option<Profile>, StoreError>;

    async fn insert_profile(&self, profile: &Profile) -> Result<(), StoreError>;

    async fn insert_brand(&self, brand: &Brand) -> Result<(), StoreError>;

    /// All brands where `user_id` equals the given id, in store order.
    async fn list_brands(&self, user_id: &str) -> Result<Vec<Brand>, StoreError>;

    async fn get_brand(&self, user_id: &str, brand_id: &str) -> Result<Option<Brand>, StoreError>;

    /// Positioning rows where `brand_id` equals the given id.
    async fn list_positioning(&self, brand_id: &str) -> Result<Vec<Positioning>, StoreError>;

    async fn insert_positioning(&self, positioning: &Positioning) -> Result<(), StoreError>;

    /// Replace `content` and `updated_at` of an existing row.
    async fn update_positioning(&self, positioning: &Positioning) -> Result<(), StoreError>;
}

/// [`RecordStore`] over three DynamoDB tables.
pub struct DynamoStore {
    client: DynamoClient,
    profiles_table: String,
    brands_table: String,
    positioning_table: String,
}

impl DynamoStore {
    pub fn new(client: DynamoClient, config: &Config) -> Self {
        Self {
            client,
            profiles_table: config.profiles_table.clone(),
            brands_table: config.brands_table.clone(),
            positioning_table: config.positioning_table.clone(),
        }
    }

    /// Query every item under one partition key, following pagination.
    async fn query_partition(
        &self,
        table: &str,
        key: &str,
        value: &str,
    ) -> Result<Vec<Item>, StoreError> {
        let mut items = Vec::new();
        let mut start_key: Option<Item> = None;
        loop {
            let resp = self
                .client
                .query()
                .table_name(table)
                .key_condition_expression("#pk = :pk")
                .expression_attribute_names("#pk", key)
                .expression_attribute_values(":pk", AttributeValue::S(value.to_string()))
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| service_error("query", table, e))?;

            items.extend(resp.items().iter().cloned());
            match resp.last_evaluated_key() {
                Some(last) if !last.is_empty() => start_key = Some(last.clone()),
                _ => break,
            }
        }
        Ok(items)
    }

    /// Put an item that must not exist yet.
    async fn put_new(&self, table: &str, id: &str, item: Item) -> Result<(), StoreError> {
        self.client
            .put_item()
            .table_name(table)
            .set_item(Some(item))
            .condition_expression("attribute_not_exists(id)")
            .send()
            .await
            .map_err(|e| {
                if e.code() == Some("ConditionalCheckFailedException") {
                    StoreError::Conflict {
                        table: table.to_string(),
                        id: id.to_string(),
                    }
                } else {
                    service_error("put_item", table, e)
                }
            })?;
        Ok(())
    }
}

fn service_error<E>(operation: &'static str, table: &str, err: SdkError<E>) -> StoreError
where
    E: std::error::Error + 'static,
{
    let message = format!("{}", DisplayErrorContext(&err));
    tracing::error!("DynamoDB {} on {} failed: {}", operation, table, message);
    StoreError::Service {
        operation,
        table: table.to_string(),
        message,
    }
}

// ----- item mapping -----

fn s(value: impl Into<String>) -> AttributeValue {
    AttributeValue::S(value.into())
}

fn time(value: &DateTime<Utc>) -> AttributeValue {
    AttributeValue::S(value.to_rfc3339())
}

fn opt_string(item: &Item, field: &str) -> Option<String> {
    item.get(field)
        .and_then(|v| v.as_s().ok())
        .map(|s| s.to_string())
}

fn req_string(item: &Item, table: &str, field: &'static str) -> Result<String, StoreError> {
    opt_string(item, field).ok_or_else(|| StoreError::Corrupt {
        table: table.to_string(),
        field,
    })
}

fn req_time(item: &Item, table: &str, field: &'static str) -> Result<DateTime<Utc>, StoreError> {
    let raw = req_string(item, table, field)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| StoreError::Corrupt {
            table: table.to_string(),
            field,
        })
}

fn profile_item(profile: &Profile) -> Item {
    let mut item = HashMap::new();
    item.insert("id".to_string(), s(&profile.id));
    if let Some(full_name) = &profile.full_name {
        item.insert("full_name".to_string(), s(full_name));
    }
    if let Some(avatar_url) = &profile.avatar_url {
        item.insert("avatar_url".to_string(), s(avatar_url));
    }
    item.insert("created_at".to_string(), time(&profile.created_at));
    item.insert("updated_at".to_string(), time(&profile.updated_at));
    item
}

fn profile_from(item: &Item, table: &str) -> Result<Profile, StoreError> {
    Ok(Profile {
        id: req_string(item, table, "id")?,
        full_name: opt_string(item, "full_name"),
        avatar_url: opt_string(item, "avatar_url"),
        created_at: req_time(item, table, "created_at")?,
        updated_at: req_time(item, table, "updated_at")?,
    })
}

fn brand_item(brand: &Brand) -> Item {
    let mut item = HashMap::new();
    item.insert("user_id".to_string(), s(&brand.user_id));
    item.insert("id".to_string(), s(&brand.id));
    item.insert("name".to_string(), s(&brand.name));
    if let Some(logo_url) = &brand.logo_url {
        item.insert("logo_url".to_string(), s(logo_url));
    }
    item.insert("created_at".to_string(), time(&brand.created_at));
    item.insert("updated_at".to_string(), time(&brand.updated_at));
    item
}

fn brand_from(item: &Item, table: &str) -> Result<Brand, StoreError> {
    Ok(Brand {
        id: req_string(item, table, "id")?,
        user_id: req_string(item, table, "user_id")?,
        name: req_string(item, table, "name")?,
        logo_url: opt_string(item, "logo_url"),
        created_at: req_time(item, table, "created_at")?,
        updated_at: req_time(item, table, "updated_at")?,
    })
}

// The document is stored as its JSON text, like any other opaque blob.
fn content_attr(content: &Option<serde_json::Value>) -> Result<AttributeValue, StoreError> {
    Ok(match content {
        Some(doc) => AttributeValue::S(serde_json::to_string(doc)?),
        None => AttributeValue::Null(true),
    })
}

fn positioning_item(positioning: &Positioning) -> Result<Item, StoreError> {
    let mut item = HashMap::new();
    item.insert("brand_id".to_string(), s(&positioning.brand_id));
    item.insert("id".to_string(), s(&positioning.id));
    item.insert("content".to_string(), content_attr(&positioning.content)?);
    item.insert("created_at".to_string(), time(&positioning.created_at));
    item.insert("updated_at".to_string(), time(&positioning.updated_at));
    Ok(item)
}

fn positioning_from(item: &Item, table: &str) -> Result<Positioning, StoreError> {
    let content = match opt_string(item, "content") {
        Some(raw) => Some(serde_json::from_str(&raw).map_err(|_| StoreError::Corrupt {
            table: table.to_string(),
            field: "content",
        })?),
        None => None,
    };
    Ok(Positioning {
        id: req_string(item, table, "id")?,
        brand_id: req_string(item, table, "brand_id")?,
        content,
        created_at: req_time(item, table, "created_at")?,
        updated_at: req_time(item, table, "updated_at")?,
    })
}

#[async_trait]
impl RecordStore for DynamoStore {
    async fn get_profile(&self, id: &str) -> Result<Option<Profile>, StoreError> {
        let table = &self.profiles_table;
        let result = self
            .client
            .get_item()
            .table_name(table)
            .key("id", s(id))
            .send()
            .await
            .map_err(|e| service_error("get_item", table, e))?;

        result.item().map(|item| profile_from(item, table)).transpose()
    }

    async fn insert_profile(&self, profile: &Profile) -> Result<(), StoreError> {
        self.put_new(&self.profiles_table, &profile.id, profile_item(profile))
            .await
    }

    async fn insert_brand(&self, brand: &Brand) -> Result<(), StoreError> {
        self.put_new(&self.brands_table, &brand.id, brand_item(brand))
            .await
    }

    async fn list_brands(&self, user_id: &str) -> Result<Vec<Brand>, StoreError> {
        let table = &self.brands_table;
        self.query_partition(table, "user_id", user_id)
            .await?
            .iter()
            .map(|item| brand_from(item, table))
            .collect()
    }

    async fn get_brand(&self, user_id: &str, brand_id: &str) -> Result<Option<Brand>, StoreError> {
        let table = &self.brands_table;
        let result = self
            .client
            .get_item()
            .table_name(table)
            .key("user_id", s(user_id))
            .key("id", s(brand_id))
            .send()
            .await
            .map_err(|e| service_error("get_item", table, e))?;

        result.item().map(|item| brand_from(item, table)).transpose()
    }

    async fn list_positioning(&self, brand_id: &str) -> Result<Vec<Positioning>, StoreError> {
        let table = &self.positioning_table;
        self.query_partition(table, "brand_id", brand_id)
            .await?
            .iter()
            .map(|item| positioning_from(item, table))
            .collect()
    }

    async fn insert_positioning(&self, positioning: &Positioning) -> Result<(), StoreError> {
        self.put_new(
            &self.positioning_table,
            &positioning.id,
            positioning_item(positioning)?,
        )
        .await
    }

    async fn update_positioning(&self, positioning: &Positioning) -> Result<(), StoreError> {
        let table = &self.positioning_table;
        self.client
            .update_item()
            .table_name(table)
            .key("brand_id", s(&positioning.brand_id))
            .key("id", s(&positioning.id))
            .update_expression("SET #content = :content, updated_at = :updated_at")
            .condition_expression("attribute_exists(id)")
            .expression_attribute_names("#content", "content")
            .expression_attribute_values(":content", content_attr(&positioning.content)?)
            .expression_attribute_values(":updated_at", time(&positioning.updated_at))
            .send()
            .await
            .map_err(|e| {
                if e.code() == Some("ConditionalCheckFailedException") {
                    StoreError::NotFound {
                        table: table.to_string(),
                        id: positioning.id.clone(),
                    }
                } else {
                    service_error("update_item", table, e)
                }
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn brand_item_omits_missing_logo() {
        let brand = Brand {
            id: "b1".into(),
            user_id: "u1".into(),
            name: "Acme".into(),
            logo_url: None,
            created_at: at(1_700_000_000),
            updated_at: at(1_700_000_000),
        };
        let item = brand_item(&brand);
        assert!(!item.contains_key("logo_url"));
        assert_eq!(brand_from(&item, "brands").unwrap(), brand);
    }

    #[test]
    fn brand_without_name_is_corrupt() {
        let mut item = brand_item(&Brand {
            id: "b1".into(),
            user_id: "u1".into(),
            name: "Acme".into(),
            logo_url: Some("https://acme.test/logo.png".into()),
            created_at: at(0),
            updated_at: at(0),
        });
        item.remove("name");
        let err = brand_from(&item, "brands").unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { field: "name", .. }));
    }

    #[test]
    fn positioning_content_survives_the_string_attribute() {
        let positioning = Positioning {
            id: "p1".into(),
            brand_id: "b1".into(),
            content: Some(serde_json::json!({"type": "doc", "content": []})),
            created_at: at(10),
            updated_at: at(20),
        };
        let item = positioning_item(&positioning).unwrap();
        assert!(item.get("content").unwrap().is_s());
        assert_eq!(positioning_from(&item, "brand_positioning").unwrap(), positioning);
    }

    #[test]
    fn null_content_reads_back_as_none() {
        let positioning = Positioning {
            id: "p1".into(),
            brand_id: "b1".into(),
            content: None,
            created_at: at(10),
            updated_at: at(10),
        };
        let item = positioning_item(&positioning).unwrap();
        assert_eq!(positioning_from(&item, "brand_positioning").unwrap().content, None);
    }
}
