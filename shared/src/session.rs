//! Session provider: resolves the auth session carried by cookies.
//!
//! Resolved users are cached in memory, keyed by a SHA-256 digest of the
//! access token, until the earlier of the configured TTL and the token's own
//! `exp` claim. Sign-in, sign-out and token refresh are broadcast as
//! [`SessionEvent`]s.

use crate::auth::AuthProvider;
use crate::config::Config;
use crate::cookies::{self, CookieSettings};
use crate::error::AuthError;
use crate::profiles;
use crate::store::RecordStore;
use crate::types::{AuthTokens, SessionUser, SignUpOutcome};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

const EVENT_CAPACITY: usize = 64;
const MAX_CACHE_TTL_SECS: u64 = 24 * 60 * 60;

/// An authenticated request's identity and the token that proved it.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user: SessionUser,
    pub access_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn { user_id: String },
    SignedOut { user_id: String },
    TokenRefreshed { user_id: String },
}

/// Session cookie values presented by the browser.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SessionCookies {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub username: Option<String>,
}

impl SessionCookies {
    /// Collect the session cookies through a name lookup. Empty values count
    /// as absent.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |name: &str| lookup(name).filter(|v| !v.is_empty());
        Self {
            access_token: value(cookies::ACCESS_TOKEN_COOKIE),
            refresh_token: value(cookies::REFRESH_TOKEN_COOKIE),
            username: value(cookies::USER_COOKIE).and_then(|v| cookies::decode_username(&v)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none()
    }
}

/// Outcome of resolving cookies: the session, if any, and the `Set-Cookie`
/// values the response must carry (re-issued or cleared cookies).
#[derive(Debug, Default, Clone)]
pub struct Resolved {
    pub session: Option<Session>,
    pub set_cookies: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SignedIn {
    pub session: Session,
    pub set_cookies: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum SignUpResult {
    SignedIn(SignedIn),
    PendingConfirmation,
}

/// Read the `exp` claim of a JWT without verifying it. Only used to bound
/// cache lifetime; the auth service stays the authority on validity.
pub fn token_expiry(token: &str) -> Option<DateTime<Utc>> {
    #[derive(Deserialize)]
    struct Claims {
        exp: i64,
    }

    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: Claims = serde_json::from_slice(&bytes).ok()?;
    DateTime::from_timestamp(claims.exp, 0)
}

fn cache_key(access_token: &str) -> String {
    format!("{:x}", Sha256::digest(access_token.as_bytes()))
}

struct CacheEntry {
    user: SessionUser,
    expires_at: DateTime<Utc>,
}

pub struct SessionCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl SessionCache {
    pub fn new(ttl_secs: u64) -> Self {
        let secs = ttl_secs.min(MAX_CACHE_TTL_SECS) as i64;
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl: Duration::seconds(secs),
        }
    }

    pub async fn get(&self, access_token: &str) -> Option<SessionUser> {
        let key = cache_key(access_token);
        let now = Utc::now();
        {
            let entries = self.entries.read().await;
            match entries.get(&key) {
                Some(entry) if entry.expires_at > now => return Some(entry.user.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        self.entries.write().await.remove(&key);
        None
    }

    pub async fn insert(&self, access_token: &str, user: SessionUser) {
        let now = Utc::now();
        let mut expires_at = now + self.ttl;
        if let Some(exp) = token_expiry(access_token) {
            expires_at = expires_at.min(exp);
        }
        if expires_at <= now {
            return;
        }

        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| entry.expires_at > now);
        entries.insert(cache_key(access_token), CacheEntry { user, expires_at });
    }

    pub async fn evict(&self, access_token: &str) -> Option<SessionUser> {
        self.entries
            .write()
            .await
            .remove(&cache_key(access_token))
            .map(|entry| entry.user)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

pub struct SessionService {
    auth: Arc<dyn AuthProvider>,
    store: Arc<dyn RecordStore>,
    cache: SessionCache,
    events: broadcast::Sender<SessionEvent>,
    cookie_settings: CookieSettings,
}

impl SessionService {
    pub fn new(auth: Arc<dyn AuthProvider>, store: Arc<dyn RecordStore>, config: &Config) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            auth,
            store,
            cache: SessionCache::new(config.session_cache_ttl_secs),
            events,
            cookie_settings: CookieSettings {
                secure: config.secure_cookies,
                refresh_max_age_secs: config.refresh_cookie_max_age_secs,
            },
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn cache(&self) -> &SessionCache {
        &self.cache
    }

    pub fn cookie_settings(&self) -> CookieSettings {
        self.cookie_settings
    }

    fn emit(&self, event: SessionEvent) {
        tracing::debug!("Session event: {:?}", event);
        // No receivers is fine.
        let _ = self.events.send(event);
    }

    async fn ensure_profile(&self, user_id: &str) {
        if let Err(e) = profiles::ensure_profile(self.store.as_ref(), user_id).await {
            tracing::warn!("Could not ensure profile for {}: {}", user_id, e);
        }
    }

    /// Resolve and cache the user for a fresh token set, then build its cookies.
    async fn establish(&self, tokens: &AuthTokens) -> Result<(SessionUser, Vec<String>), AuthError> {
        let user = self.auth.get_user(&tokens.access_token).await?;
        self.cache.insert(&tokens.access_token, user.clone()).await;
        let set_cookies = cookies::session_cookie_headers(tokens, &user.username, self.cookie_settings);
        Ok((user, set_cookies))
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<SignedIn, AuthError> {
        let tokens = self.auth.sign_in(email, password).await?;
        let (user, set_cookies) = self.establish(&tokens).await?;
        self.ensure_profile(&user.id).await;

        tracing::info!("User {} signed in", user.id);
        self.emit(SessionEvent::SignedIn {
            user_id: user.id.clone(),
        });

        Ok(SignedIn {
            session: Session {
                user,
                access_token: tokens.access_token,
            },
            set_cookies,
        })
    }

    /// Register, then sign in straight away when the account is already
    /// confirmed.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpResult, AuthError> {
        match self.auth.sign_up(email, password).await? {
            SignUpOutcome::Confirmed { .. } => {
                Ok(SignUpResult::SignedIn(self.sign_in(email, password).await?))
            }
            SignUpOutcome::PendingConfirmation { user_id } => {
                tracing::info!("User {} signed up; confirmation pending", user_id);
                self.ensure_profile(&user_id).await;
                Ok(SignUpResult::PendingConfirmation)
            }
        }
    }

    /// Revoke the session and return the cookie-clearing headers. Failures of
    /// the auth service are logged; the local session is dropped regardless.
    pub async fn sign_out(&self, session: Option<&Session>) -> Vec<String> {
        if let Some(session) = session {
            if let Err(e) = self.auth.sign_out(&session.access_token).await {
                tracing::warn!("Sign out for {} failed at the auth service: {}", session.user.id, e);
            }
            self.cache.evict(&session.access_token).await;

            tracing::info!("User {} signed out", session.user.id);
            self.emit(SessionEvent::SignedOut {
                user_id: session.user.id.clone(),
            });
        }
        cookies::clear_cookie_headers(self.cookie_settings.secure)
    }

    async fn user_for(&self, access_token: &str) -> Result<SessionUser, AuthError> {
        if let Some(user) = self.cache.get(access_token).await {
            return Ok(user);
        }
        let user = self.auth.get_user(access_token).await?;
        self.cache.insert(access_token, user.clone()).await;
        Ok(user)
    }

    /// Resolve the session behind the cookies.
    ///
    /// An expired or missing access token is refreshed once when a refresh
    /// token and username are present. Cookies that can no longer produce a
    /// session are cleared. Errors other than an expired session are returned
    /// for the caller to log.
    pub async fn resolve(&self, presented: &SessionCookies) -> Result<Resolved, AuthError> {
        if presented.is_empty() {
            return Ok(Resolved::default());
        }

        if let Some(access_token) = &presented.access_token {
            match self.user_for(access_token).await {
                Ok(user) => {
                    return Ok(Resolved {
                        session: Some(Session {
                            user,
                            access_token: access_token.clone(),
                        }),
                        set_cookies: Vec::new(),
                    })
                }
                Err(e) if e.is_session_expired() => {
                    tracing::debug!("Access token rejected: {}", e);
                    self.cache.evict(access_token).await;
                }
                Err(e) => return Err(e),
            }
        }

        self.refresh(presented).await
    }

    async fn refresh(&self, presented: &SessionCookies) -> Result<Resolved, AuthError> {
        let stale = || Resolved {
            session: None,
            set_cookies: cookies::clear_cookie_headers(self.cookie_settings.secure),
        };

        let (Some(refresh_token), Some(username)) = (&presented.refresh_token, &presented.username)
        else {
            return Ok(stale());
        };

        let tokens = match self.auth.refresh(username, refresh_token).await {
            Ok(tokens) => tokens,
            Err(e) if e.is_session_expired() => {
                tracing::info!("Refresh token rejected: {}", e);
                return Ok(stale());
            }
            Err(e) => return Err(e),
        };

        let (user, set_cookies) = self.establish(&tokens).await?;
        tracing::info!("Refreshed session for {}", user.id);
        self.emit(SessionEvent::TokenRefreshed {
            user_id: user.id.clone(),
        });

        Ok(Resolved {
            session: Some(Session {
                user,
                access_token: tokens.access_token,
            }),
            set_cookies,
        })
    }
}

/// Log every session event until the channel closes.
pub async fn log_session_events(mut events: broadcast::Receiver<SessionEvent>) {
    loop {
        match events.recv().await {
            Ok(SessionEvent::SignedIn { user_id }) => tracing::info!(user_id = %user_id, "session: signed in"),
            Ok(SessionEvent::SignedOut { user_id }) => tracing::info!(user_id = %user_id, "session: signed out"),
            Ok(SessionEvent::TokenRefreshed { user_id }) => {
                tracing::info!(user_id = %user_id, "session: token refreshed")
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!("Session event logger skipped {} events", skipped)
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fake_jwt, MemoryAuth, MemoryStore};
    use pretty_assertions::assert_eq;

    fn config() -> Config {
        Config {
            cognito_client_id: "client".into(),
            cognito_client_secret: "secret".into(),
            secure_cookies: false,
            ..Config::default()
        }
    }

    fn service(auth: &Arc<MemoryAuth>, store: &Arc<MemoryStore>) -> SessionService {
        SessionService::new(auth.clone(), store.clone(), &config())
    }

    fn cookies_for(tokens: &AuthTokens, username: &str) -> SessionCookies {
        SessionCookies {
            access_token: Some(tokens.access_token.clone()),
            refresh_token: tokens.refresh_token.clone(),
            username: Some(username.to_string()),
        }
    }

    fn user(id: &str) -> SessionUser {
        SessionUser {
            id: id.into(),
            username: format!("{id}@example.com"),
            email: format!("{id}@example.com"),
        }
    }

    #[test]
    fn reads_exp_claim() {
        let token = fake_jwt("sub", 1_700_000_000);
        assert_eq!(token_expiry(&token).map(|t| t.timestamp()), Some(1_700_000_000));
        assert_eq!(token_expiry("opaque-token"), None);
    }

    #[tokio::test]
    async fn cache_honours_token_expiry() {
        let cache = SessionCache::new(300);
        let expired = fake_jwt("a", Utc::now().timestamp() - 10);
        let live = fake_jwt("b", Utc::now().timestamp() + 600);

        cache.insert(&expired, user("a")).await;
        cache.insert(&live, user("b")).await;

        assert_eq!(cache.get(&expired).await, None);
        assert_eq!(cache.get(&live).await, Some(user("b")));
        assert_eq!(cache.evict(&live).await, Some(user("b")));
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn zero_ttl_disables_caching() {
        let cache = SessionCache::new(0);
        cache.insert("opaque", user("a")).await;
        assert_eq!(cache.get("opaque").await, None);
    }

    #[test]
    fn cookie_lookup_drops_empty_values() {
        let cookies = SessionCookies::from_lookup(|name| match name {
            cookies::ACCESS_TOKEN_COOKIE => Some(String::new()),
            cookies::REFRESH_TOKEN_COOKIE => Some("refresh".into()),
            cookies::USER_COOKIE => Some(cookies::encode_username("ada@example.com")),
            _ => None,
        });
        assert_eq!(
            cookies,
            SessionCookies {
                access_token: None,
                refresh_token: Some("refresh".into()),
                username: Some("ada@example.com".into()),
            }
        );
    }

    #[tokio::test]
    async fn sign_in_caches_user_and_creates_profile() {
        let auth = Arc::new(MemoryAuth::default());
        let store = Arc::new(MemoryStore::default());
        let user_id = auth.add_user("ada@example.com", "Password1!");
        let sessions = service(&auth, &store);
        let mut events = sessions.subscribe();

        let signed_in = sessions.sign_in("ada@example.com", "Password1!").await.unwrap();

        assert_eq!(signed_in.session.user.id, user_id);
        assert_eq!(signed_in.set_cookies.len(), 3);
        assert_eq!(store.profiles().len(), 1);
        assert_eq!(events.recv().await.unwrap(), SessionEvent::SignedIn { user_id });

        // Served from cache: no further auth service lookups.
        let calls = auth.get_user_calls();
        let resolved = sessions
            .resolve(&SessionCookies {
                access_token: Some(signed_in.session.access_token.clone()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(resolved.session, Some(signed_in.session));
        assert_eq!(auth.get_user_calls(), calls);
    }

    #[tokio::test]
    async fn wrong_password_is_reported() {
        let auth = Arc::new(MemoryAuth::default());
        let store = Arc::new(MemoryStore::default());
        auth.add_user("ada@example.com", "Password1!");

        let err = service(&auth, &store)
            .sign_in("ada@example.com", "nope")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
        assert!(store.profiles().is_empty());
    }

    #[tokio::test]
    async fn sign_up_pending_confirmation_does_not_sign_in() {
        let auth = Arc::new(MemoryAuth::new(false));
        let store = Arc::new(MemoryStore::default());

        let result = service(&auth, &store)
            .sign_up("new@example.com", "Password1!")
            .await
            .unwrap();
        assert!(matches!(result, SignUpResult::PendingConfirmation));
        assert_eq!(store.profiles().len(), 1);
    }

    #[tokio::test]
    async fn expired_access_token_is_refreshed_once() {
        let auth = Arc::new(MemoryAuth::default());
        let store = Arc::new(MemoryStore::default());
        auth.add_user("ada@example.com", "Password1!");
        let tokens = auth.issue("ada@example.com");
        auth.expire(&tokens.access_token);
        let sessions = service(&auth, &store);
        let mut events = sessions.subscribe();

        let resolved = sessions
            .resolve(&cookies_for(&tokens, "ada@example.com"))
            .await
            .unwrap();

        let session = resolved.session.unwrap();
        assert_ne!(session.access_token, tokens.access_token);
        assert_eq!(auth.refresh_calls(), 1);
        // Only the access cookie is rewritten; the refresh token is kept.
        assert_eq!(resolved.set_cookies.len(), 1);
        assert!(resolved.set_cookies[0].starts_with(&format!(
            "{}={}",
            cookies::ACCESS_TOKEN_COOKIE,
            session.access_token
        )));
        assert!(matches!(
            events.recv().await.unwrap(),
            SessionEvent::TokenRefreshed { .. }
        ));
    }

    #[tokio::test]
    async fn rejected_refresh_clears_cookies() {
        let auth = Arc::new(MemoryAuth::default());
        let store = Arc::new(MemoryStore::default());
        let presented = SessionCookies {
            access_token: Some("unknown".into()),
            refresh_token: Some("unknown".into()),
            username: Some("ada@example.com".into()),
        };

        let resolved = service(&auth, &store).resolve(&presented).await.unwrap();
        assert_eq!(resolved.session, None);
        assert_eq!(resolved.set_cookies.len(), 3);
        assert_eq!(auth.refresh_calls(), 1);
    }

    #[tokio::test]
    async fn no_cookies_is_anonymous_without_auth_calls() {
        let auth = Arc::new(MemoryAuth::default());
        let store = Arc::new(MemoryStore::default());

        let resolved = service(&auth, &store)
            .resolve(&SessionCookies::default())
            .await
            .unwrap();
        assert_eq!(resolved.session, None);
        assert!(resolved.set_cookies.is_empty());
        assert_eq!(auth.get_user_calls(), 0);
    }

    #[tokio::test]
    async fn sign_out_revokes_and_evicts_even_if_service_fails() {
        let auth = Arc::new(MemoryAuth::default());
        let store = Arc::new(MemoryStore::default());
        auth.add_user("ada@example.com", "Password1!");
        let sessions = service(&auth, &store);
        let signed_in = sessions.sign_in("ada@example.com", "Password1!").await.unwrap();
        assert_eq!(sessions.cache().len().await, 1);

        auth.fail_sign_out(true);
        let mut events = sessions.subscribe();
        let cleared = sessions.sign_out(Some(&signed_in.session)).await;

        assert_eq!(cleared.len(), 3);
        assert!(sessions.cache().is_empty().await);
        assert_eq!(auth.sign_out_calls(), 1);
        assert!(matches!(
            events.recv().await.unwrap(),
            SessionEvent::SignedOut { .. }
        ));
    }
}
