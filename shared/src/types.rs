use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ========== PROFILE ==========
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Profile {
    pub id: String, // auth service user id (sub)
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ========== BRAND ==========
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Brand {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub logo_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw brand form as posted by the dashboard.
#[derive(Debug, Deserialize, Default)]
pub struct CreateBrandRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub logo_url: Option<String>,
}

// ========== POSITIONING ==========
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Positioning {
    pub id: String,
    pub brand_id: String,
    pub content: Option<serde_json::Value>, // editor JSON document
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ========== AUTH ==========
/// Tokens handed out by the auth service on sign-in or refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthTokens {
    pub access_token: String,
    pub id_token: String,
    /// Absent on refresh: the original refresh token stays valid.
    pub refresh_token: Option<String>,
    pub expires_in: i32,
}

/// Identity behind an access token.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionUser {
    pub id: String,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SignUpOutcome {
    /// Account usable right away.
    Confirmed { user_id: String },
    /// The auth service sent a confirmation email first.
    PendingConfirmation { user_id: String },
}
