use crate::error::StoreError;
use crate::store::RecordStore;
use crate::types::Profile;
use chrono::Utc;

/// Make sure a `profiles` row exists for the auth user.
///
/// Called after every sign-in and sign-up. A concurrent insert that wins the
/// race is not an error: the existing row is returned.
pub async fn ensure_profile(store: &dyn RecordStore, user_id: &str) -> Result<Profile, StoreError> {
    if let Some(profile) = store.get_profile(user_id).await? {
        return Ok(profile);
    }

    let now = Utc::now();
    let profile = Profile {
        id: user_id.to_string(),
        full_name: None,
        avatar_url: None,
        created_at: now,
        updated_at: now,
    };

    match store.insert_profile(&profile).await {
        Ok(()) => {
            tracing::info!("Created profile for user {}", user_id);
            Ok(profile)
        }
        Err(StoreError::Conflict { table, id }) => store
            .get_profile(user_id)
            .await?
            .ok_or(StoreError::NotFound { table, id }),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryStore;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn inserts_missing_profile_once() {
        let store = MemoryStore::default();

        let first = ensure_profile(&store, "user-1").await.unwrap();
        let second = ensure_profile(&store, "user-1").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.counts().profile_inserts, 1);
    }

    #[tokio::test]
    async fn store_failure_is_reported() {
        let store = MemoryStore::default();
        store.fail_all(true);
        assert!(ensure_profile(&store, "user-1").await.is_err());
    }
}
