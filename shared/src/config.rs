//! Process configuration, read once at start-up.
//!
//! Values come from the raw environment (the same variable names the Lambda
//! deployment already sets, e.g. `COGNITO_CLIENT_ID`) layered over built-in
//! defaults. A `.env` file is honoured for local runs.

use crate::error::ConfigError;
use figment::{
    providers::{Env, Serialized},
    Figment,
};
use serde::{Deserialize, Serialize};

const ENV_KEYS: &[&str] = &[
    "cognito_client_id",
    "cognito_client_secret",
    "cognito_user_pool_id",
    "profiles_table",
    "brands_table",
    "positioning_table",
    "secure_cookies",
    "session_cache_ttl_secs",
    "refresh_cookie_max_age_secs",
    "editor_max_document_bytes",
];

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// App client of the Cognito user pool.
    #[serde(default)]
    pub cognito_client_id: String,

    #[serde(default)]
    pub cognito_client_secret: String,

    /// Enables auto-confirmation of new sign-ups when set.
    #[serde(default)]
    pub cognito_user_pool_id: Option<String>,

    pub profiles_table: String,
    pub brands_table: String,
    pub positioning_table: String,

    /// Adds `Secure` to session cookies. Turn off only for plain-http local runs.
    pub secure_cookies: bool,

    pub session_cache_ttl_secs: u64,
    pub refresh_cookie_max_age_secs: i64,

    /// Upper bound on a serialized positioning document.
    pub editor_max_document_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cognito_client_id: String::new(),
            cognito_client_secret: String::new(),
            cognito_user_pool_id: None,
            profiles_table: "profiles".to_string(),
            brands_table: "brands".to_string(),
            positioning_table: "brand_positioning".to_string(),
            secure_cookies: true,
            session_cache_ttl_secs: 300,
            refresh_cookie_max_age_secs: 30 * 24 * 60 * 60,
            // DynamoDB caps an item at 400 KB; leave room for the other attributes.
            editor_max_document_bytes: 256 * 1024,
        }
    }
}

impl Config {
    /// Load from defaults and the environment, then check required values.
    pub fn load() -> Result<Self, ConfigError> {
        let config: Self = Self::figment().extract().map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    /// Same as [`Config::load`] after reading `.env` from the working directory.
    pub fn load_with_dotenv() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {}", path.display());
        }
        Self::load()
    }

    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Self::default())).merge(Env::raw().only(ENV_KEYS))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.cognito_client_id.trim().is_empty() {
            return Err(ConfigError::Missing("COGNITO_CLIENT_ID"));
        }
        if self.cognito_client_secret.trim().is_empty() {
            return Err(ConfigError::Missing("COGNITO_CLIENT_SECRET"));
        }
        Ok(())
    }

    /// Pool id with blank values treated as unset.
    pub fn user_pool_id(&self) -> Option<&str> {
        self.cognito_user_pool_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_name_the_three_tables() {
        let config = Config::default();
        assert_eq!(config.profiles_table, "profiles");
        assert_eq!(config.brands_table, "brands");
        assert_eq!(config.positioning_table, "brand_positioning");
        assert!(config.secure_cookies);
    }

    #[test]
    fn loads_from_raw_env_names() {
        Jail::expect_with(|jail| {
            jail.set_env("COGNITO_CLIENT_ID", "client-123");
            jail.set_env("COGNITO_CLIENT_SECRET", "s3cret");
            jail.set_env("BRANDS_TABLE", "staging-brands");
            jail.set_env("SECURE_COOKIES", "false");

            let config = Config::load().expect("config loads");
            assert_eq!(config.cognito_client_id, "client-123");
            assert_eq!(config.brands_table, "staging-brands");
            assert_eq!(config.profiles_table, "profiles");
            assert!(!config.secure_cookies);
            assert_eq!(config.user_pool_id(), None);
            Ok(())
        });
    }

    #[test]
    fn missing_client_secret_is_rejected() {
        Jail::expect_with(|jail| {
            jail.set_env("COGNITO_CLIENT_ID", "client-123");
            jail.set_env("COGNITO_CLIENT_SECRET", "");

            let err = Config::load().unwrap_err();
            assert!(matches!(err, ConfigError::Missing("COGNITO_CLIENT_SECRET")));
            Ok(())
        });
    }

    #[test]
    fn blank_pool_id_counts_as_unset() {
        let config = Config {
            cognito_user_pool_id: Some("  ".into()),
            ..Default::default()
        };
        assert_eq!(config.user_pool_id(), None);
    }
}
