use crate::error::{BrandFormError, StoreError};
use crate::store::RecordStore;
use crate::types::{Brand, CreateBrandRequest};
use chrono::Utc;

/// Brand form after trimming and checks.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBrand {
    pub name: String,
    pub logo_url: Option<String>,
}

/// Validate the create form before anything is written.
pub fn validate_brand_form(req: &CreateBrandRequest) -> Result<NewBrand, BrandFormError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(BrandFormError::NameRequired);
    }

    let logo_url = req
        .logo_url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty());
    if let Some(url) = logo_url {
        let lower = url.to_ascii_lowercase();
        let rest = lower
            .strip_prefix("https://")
            .or_else(|| lower.strip_prefix("http://"));
        if rest.map_or(true, str::is_empty) {
            return Err(BrandFormError::InvalidLogoUrl);
        }
    }

    Ok(NewBrand {
        name: name.to_string(),
        logo_url: logo_url.map(str::to_string),
    })
}

pub async fn create_brand(
    store: &dyn RecordStore,
    user_id: &str,
    new_brand: NewBrand,
) -> Result<Brand, StoreError> {
    let now = Utc::now();
    let brand = Brand {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        name: new_brand.name,
        logo_url: new_brand.logo_url,
        created_at: now,
        updated_at: now,
    };

    store.insert_brand(&brand).await?;
    tracing::info!("Created brand {} for user {}", brand.id, user_id);
    Ok(brand)
}

/// Brands owned by the user, newest first.
pub async fn list_brands(store: &dyn RecordStore, user_id: &str) -> Result<Vec<Brand>, StoreError> {
    let mut brands = store.list_brands(user_id).await?;
    brands.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
    Ok(brands)
}

/// `None` both for unknown ids and for brands owned by someone else.
pub async fn get_brand(
    store: &dyn RecordStore,
    user_id: &str,
    brand_id: &str,
) -> Result<Option<Brand>, StoreError> {
    store.get_brand(user_id, brand_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryStore;
    use chrono::Duration;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn form(name: &str, logo_url: Option<&str>) -> CreateBrandRequest {
        CreateBrandRequest {
            name: name.to_string(),
            logo_url: logo_url.map(str::to_string),
        }
    }

    #[rstest]
    #[case("", None)]
    #[case("   ", None)]
    #[case("\t\n", Some("https://acme.test/logo.png"))]
    fn blank_name_is_rejected(#[case] name: &str, #[case] logo: Option<&str>) {
        assert_eq!(
            validate_brand_form(&form(name, logo)),
            Err(BrandFormError::NameRequired)
        );
    }

    #[rstest]
    #[case("ftp://acme.test/logo.png")]
    #[case("acme.test/logo.png")]
    #[case("https://")]
    fn bad_logo_url_is_rejected(#[case] logo: &str) {
        assert_eq!(
            validate_brand_form(&form("Acme", Some(logo))),
            Err(BrandFormError::InvalidLogoUrl)
        );
    }

    #[test]
    fn trims_name_and_drops_blank_logo() {
        let brand = validate_brand_form(&form("  Acme  ", Some("  "))).unwrap();
        assert_eq!(
            brand,
            NewBrand {
                name: "Acme".into(),
                logo_url: None
            }
        );
    }

    #[tokio::test]
    async fn created_brand_is_listed_first() {
        let store = MemoryStore::default();
        let mut older = MemoryStore::brand("user-1", "Older");
        older.created_at -= Duration::days(1);
        store.seed_brand(older);

        let created = create_brand(&store, "user-1", validate_brand_form(&form("Acme", None)).unwrap())
            .await
            .unwrap();

        let listed = list_brands(&store, "user-1").await.unwrap();
        assert_eq!(store.counts().brand_inserts, 1);
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0], created);
        assert_eq!(listed[0].name, "Acme");
    }

    #[tokio::test]
    async fn brands_of_other_users_are_invisible() {
        let store = MemoryStore::default();
        let foreign = MemoryStore::brand("user-2", "Theirs");
        store.seed_brand(foreign.clone());

        assert!(list_brands(&store, "user-1").await.unwrap().is_empty());
        assert_eq!(get_brand(&store, "user-1", &foreign.id).await.unwrap(), None);
        assert_eq!(
            get_brand(&store, "user-2", &foreign.id).await.unwrap(),
            Some(foreign)
        );
    }
}
