//! In-memory [`AuthProvider`] and [`RecordStore`] used by unit and router tests.

use crate::auth::AuthProvider;
use crate::error::{AuthError, StoreError};
use crate::store::RecordStore;
use crate::types::{AuthTokens, Brand, Positioning, Profile, SessionUser, SignUpOutcome};
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Successful writes seen by a [`MemoryStore`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WriteCounts {
    pub profile_inserts: usize,
    pub brand_inserts: usize,
    pub positioning_inserts: usize,
    pub positioning_updates: usize,
}

impl WriteCounts {
    pub fn total(&self) -> usize {
        self.profile_inserts + self.brand_inserts + self.positioning_inserts + self.positioning_updates
    }
}

#[derive(Default)]
pub struct MemoryStore {
    profiles: Mutex<Vec<Profile>>,
    brands: Mutex<Vec<Brand>>,
    positioning: Mutex<Vec<Positioning>>,
    counts: Mutex<WriteCounts>,
    failing: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryStore {
    pub fn brand(user_id: &str, name: &str) -> Brand {
        let now = Utc::now();
        Brand {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            name: name.to_string(),
            logo_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn positioning(brand_id: &str, content: Option<serde_json::Value>) -> Positioning {
        let now = Utc::now();
        Positioning {
            id: uuid::Uuid::new_v4().to_string(),
            brand_id: brand_id.to_string(),
            content,
            created_at: now,
            updated_at: now,
        }
    }

    /// Add a row without counting it as a write.
    pub fn seed_brand(&self, brand: Brand) {
        lock(&self.brands).push(brand);
    }

    pub fn seed_positioning(&self, positioning: Positioning) {
        lock(&self.positioning).push(positioning);
    }

    /// Make every subsequent call fail with a service error.
    pub fn fail_all(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn counts(&self) -> WriteCounts {
        *lock(&self.counts)
    }

    pub fn profiles(&self) -> Vec<Profile> {
        lock(&self.profiles).clone()
    }

    pub fn positioning_rows(&self, brand_id: &str) -> Vec<Positioning> {
        lock(&self.positioning)
            .iter()
            .filter(|p| p.brand_id == brand_id)
            .cloned()
            .collect()
    }

    fn check(&self, operation: &'static str, table: &str) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Service {
                operation,
                table: table.to_string(),
                message: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get_profile(&self, id: &str) -> Result<Option<Profile>, StoreError> {
        self.check("get_item", "profiles")?;
        Ok(lock(&self.profiles).iter().find(|p| p.id == id).cloned())
    }

    async fn insert_profile(&self, profile: &Profile) -> Result<(), StoreError> {
        self.check("put_item", "profiles")?;
        let mut profiles = lock(&self.profiles);
        if profiles.iter().any(|p| p.id == profile.id) {
            return Err(StoreError::Conflict {
                table: "profiles".into(),
                id: profile.id.clone(),
            });
        }
        profiles.push(profile.clone());
        lock(&self.counts).profile_inserts += 1;
        Ok(())
    }

    async fn insert_brand(&self, brand: &Brand) -> Result<(), StoreError> {
        self.check("put_item", "brands")?;
        lock(&self.brands).push(brand.clone());
        lock(&self.counts).brand_inserts += 1;
        Ok(())
    }

    async fn list_brands(&self, user_id: &str) -> Result<Vec<Brand>, StoreError> {
        self.check("query", "brands")?;
        Ok(lock(&self.brands)
            .iter()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn get_brand(&self, user_id: &str, brand_id: &str) -> Result<Option<Brand>, StoreError> {
        self.check("get_item", "brands")?;
        Ok(lock(&self.brands)
            .iter()
            .find(|b| b.user_id == user_id && b.id == brand_id)
            .cloned())
    }

    async fn list_positioning(&self, brand_id: &str) -> Result<Vec<Positioning>, StoreError> {
        self.check("query", "brand_positioning")?;
        Ok(self.positioning_rows(brand_id))
    }

    async fn insert_positioning(&self, positioning: &Positioning) -> Result<(), StoreError> {
        self.check("put_item", "brand_positioning")?;
        lock(&self.positioning).push(positioning.clone());
        lock(&self.counts).positioning_inserts += 1;
        Ok(())
    }

    async fn update_positioning(&self, positioning: &Positioning) -> Result<(), StoreError> {
        self.check("update_item", "brand_positioning")?;
        let mut rows = lock(&self.positioning);
        let row = rows
            .iter_mut()
            .find(|p| p.brand_id == positioning.brand_id && p.id == positioning.id)
            .ok_or_else(|| StoreError::NotFound {
                table: "brand_positioning".into(),
                id: positioning.id.clone(),
            })?;
        row.content = positioning.content.clone();
        row.updated_at = positioning.updated_at;
        lock(&self.counts).positioning_updates += 1;
        Ok(())
    }
}

/// Unsigned token with the JWT shape the session cache reads `exp` from.
pub fn fake_jwt(sub: &str, exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
    let claims = serde_json::json!({ "sub": sub, "exp": exp });
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string().as_bytes());
    format!("{}.{}.sig", header, payload)
}

struct FakeUser {
    id: String,
    password: String,
    confirmed: bool,
}

struct IssuedToken {
    email: String,
    expired: bool,
}

/// Auth service fake. Usernames are the account emails.
pub struct MemoryAuth {
    users: Mutex<HashMap<String, FakeUser>>,
    access_tokens: Mutex<HashMap<String, IssuedToken>>,
    refresh_tokens: Mutex<HashMap<String, String>>,
    auto_confirm: bool,
    serial: AtomicU64,
    get_user_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    sign_out_calls: AtomicUsize,
    failing_sign_out: AtomicBool,
}

impl Default for MemoryAuth {
    fn default() -> Self {
        Self::new(true)
    }
}

impl MemoryAuth {
    /// `auto_confirm` decides whether sign-ups are usable right away.
    pub fn new(auto_confirm: bool) -> Self {
        Self {
            users: Mutex::new(HashMap::new()),
            access_tokens: Mutex::new(HashMap::new()),
            refresh_tokens: Mutex::new(HashMap::new()),
            auto_confirm,
            serial: AtomicU64::new(0),
            get_user_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            sign_out_calls: AtomicUsize::new(0),
            failing_sign_out: AtomicBool::new(false),
        }
    }

    /// Register a confirmed account and return its user id.
    pub fn add_user(&self, email: &str, password: &str) -> String {
        let id = format!("user-{}", self.serial.fetch_add(1, Ordering::SeqCst));
        lock(&self.users).insert(
            email.to_string(),
            FakeUser {
                id: id.clone(),
                password: password.to_string(),
                confirmed: true,
            },
        );
        id
    }

    pub fn user_id(&self, email: &str) -> Option<String> {
        lock(&self.users).get(email).map(|u| u.id.clone())
    }

    /// Mint tokens for an existing account without a password check.
    pub fn issue(&self, email: &str) -> AuthTokens {
        let n = self.serial.fetch_add(1, Ordering::SeqCst);
        let sub = self.user_id(email).unwrap_or_default();
        let access_token = fake_jwt(&sub, Utc::now().timestamp() + 3600);
        // The serial keeps tokens minted in the same second distinct.
        let access_token = format!("{}{}", access_token, n);
        let refresh_token = format!("refresh-{}", n);
        lock(&self.access_tokens).insert(
            access_token.clone(),
            IssuedToken {
                email: email.to_string(),
                expired: false,
            },
        );
        lock(&self.refresh_tokens).insert(refresh_token.clone(), email.to_string());
        AuthTokens {
            access_token,
            id_token: format!("id-{}", n),
            refresh_token: Some(refresh_token),
            expires_in: 3600,
        }
    }

    /// Make the auth service reject this access token as expired.
    pub fn expire(&self, access_token: &str) {
        if let Some(token) = lock(&self.access_tokens).get_mut(access_token) {
            token.expired = true;
        }
    }

    pub fn is_active(&self, access_token: &str) -> bool {
        lock(&self.access_tokens)
            .get(access_token)
            .is_some_and(|t| !t.expired)
    }

    pub fn fail_sign_out(&self, failing: bool) {
        self.failing_sign_out.store(failing, Ordering::SeqCst);
    }

    pub fn get_user_calls(&self) -> usize {
        self.get_user_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn sign_out_calls(&self) -> usize {
        self.sign_out_calls.load(Ordering::SeqCst)
    }

    fn active_email(&self, access_token: &str) -> Result<String, AuthError> {
        match lock(&self.access_tokens).get(access_token) {
            Some(token) if !token.expired => Ok(token.email.clone()),
            _ => Err(AuthError::SessionExpired),
        }
    }
}

#[async_trait]
impl AuthProvider for MemoryAuth {
    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, AuthError> {
        if !email.contains('@') {
            return Err(AuthError::InvalidParameter);
        }
        if password.len() < 8 {
            return Err(AuthError::InvalidPassword);
        }
        let mut users = lock(&self.users);
        if users.contains_key(email) {
            return Err(AuthError::UserExists);
        }
        let id = format!("user-{}", self.serial.fetch_add(1, Ordering::SeqCst));
        users.insert(
            email.to_string(),
            FakeUser {
                id: id.clone(),
                password: password.to_string(),
                confirmed: self.auto_confirm,
            },
        );
        Ok(if self.auto_confirm {
            SignUpOutcome::Confirmed { user_id: id }
        } else {
            SignUpOutcome::PendingConfirmation { user_id: id }
        })
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthTokens, AuthError> {
        {
            let users = lock(&self.users);
            let user = users.get(email).ok_or(AuthError::UserNotFound)?;
            if user.password != password {
                return Err(AuthError::InvalidCredentials);
            }
            if !user.confirmed {
                return Err(AuthError::UserNotConfirmed);
            }
        }
        Ok(self.issue(email))
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_sign_out.load(Ordering::SeqCst) {
            return Err(AuthError::Service("injected failure".into()));
        }
        let email = self.active_email(access_token)?;
        lock(&self.access_tokens).retain(|_, t| t.email != email);
        lock(&self.refresh_tokens).retain(|_, e| *e != email);
        Ok(())
    }

    async fn get_user(&self, access_token: &str) -> Result<SessionUser, AuthError> {
        self.get_user_calls.fetch_add(1, Ordering::SeqCst);
        let email = self.active_email(access_token)?;
        let id = self.user_id(&email).ok_or(AuthError::UserNotFound)?;
        Ok(SessionUser {
            id,
            username: email.clone(),
            email,
        })
    }

    async fn refresh(&self, username: &str, refresh_token: &str) -> Result<AuthTokens, AuthError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        let owner = lock(&self.refresh_tokens).get(refresh_token).cloned();
        match owner {
            Some(email) if email == username => {
                // Like the real service, a refresh keeps the existing refresh token.
                let mut tokens = self.issue(&email);
                if let Some(minted) = tokens.refresh_token.take() {
                    lock(&self.refresh_tokens).remove(&minted);
                }
                Ok(tokens)
            }
            _ => Err(AuthError::SessionExpired),
        }
    }
}
