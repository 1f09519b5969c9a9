use crate::error::AuthError;
use crate::types::{AuthTokens, SessionUser, SignUpOutcome};
use async_trait::async_trait;
use aws_sdk_cognitoidentityprovider::{
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
    types::{AttributeType, AuthFlowType, AuthenticationResultType},
    Client as CognitoClient,
};
use base64::{engine::general_purpose, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;

/// Auth service operations the pages depend on.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, AuthError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthTokens, AuthError>;

    /// Revoke every token issued for the user behind `access_token`.
    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError>;

    /// Resolve the user an access token belongs to.
    async fn get_user(&self, access_token: &str) -> Result<SessionUser, AuthError>;

    async fn refresh(&self, username: &str, refresh_token: &str) -> Result<AuthTokens, AuthError>;
}

type HmacSha256 = Hmac<Sha256>;

/// Compute the SECRET_HASH for Cognito authentication
pub fn compute_secret_hash(
    username: &str,
    client_id: &str,
    client_secret: &str,
) -> Result<String, AuthError> {
    let message = format!("{}{}", username, client_id);
    let mut mac = HmacSha256::new_from_slice(client_secret.as_bytes())
        .map_err(|e| AuthError::Service(format!("invalid client secret: {}", e)))?;
    mac.update(message.as_bytes());
    let result = mac.finalize();
    Ok(general_purpose::STANDARD.encode(result.into_bytes()))
}

/// Which meaning `NotAuthorizedException` carries for an operation.
#[derive(Clone, Copy)]
enum Credential {
    Password,
    Token,
}

fn classify<E>(operation: &'static str, credential: Credential, err: SdkError<E>) -> AuthError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    let mapped = match (err.code(), credential) {
        (Some("NotAuthorizedException"), Credential::Password) => AuthError::InvalidCredentials,
        (Some("NotAuthorizedException"), Credential::Token) => AuthError::SessionExpired,
        (Some("UserNotConfirmedException"), _) => AuthError::UserNotConfirmed,
        (Some("UserNotFoundException"), _) => AuthError::UserNotFound,
        (Some("UsernameExistsException"), _) => AuthError::UserExists,
        (Some("InvalidPasswordException"), _) => AuthError::InvalidPassword,
        (Some("InvalidParameterException"), _) => AuthError::InvalidParameter,
        (Some("PasswordResetRequiredException"), _) => AuthError::PasswordResetRequired,
        (Some("TooManyRequestsException"), _) => AuthError::TooManyRequests,
        _ => AuthError::Service(format!("{}", DisplayErrorContext(&err))),
    };
    match &mapped {
        AuthError::Service(detail) => tracing::error!("Cognito {} error: {}", operation, detail),
        other => tracing::info!("Cognito {} rejected: {}", operation, other),
    }
    mapped
}

fn tokens_from(result: &AuthenticationResultType) -> AuthTokens {
    AuthTokens {
        access_token: result.access_token().unwrap_or_default().to_string(),
        id_token: result.id_token().unwrap_or_default().to_string(),
        refresh_token: result.refresh_token().map(str::to_string),
        expires_in: result.expires_in(),
    }
}

/// [`AuthProvider`] backed by a Cognito user pool app client with a secret.
pub struct CognitoAuth {
    client: CognitoClient,
    client_id: String,
    client_secret: String,
    user_pool_id: Option<String>,
}

impl CognitoAuth {
    pub fn new(
        client: CognitoClient,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        user_pool_id: Option<String>,
    ) -> Self {
        Self {
            client,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            user_pool_id,
        }
    }

    fn secret_hash(&self, username: &str) -> Result<String, AuthError> {
        compute_secret_hash(username, &self.client_id, &self.client_secret)
    }

    /// Confirm a fresh sign-up without the email round trip. Only possible
    /// when the pool id is configured; failures leave the account pending.
    async fn auto_confirm(&self, email: &str) -> bool {
        let Some(user_pool_id) = self.user_pool_id.as_deref() else {
            tracing::warn!("COGNITO_USER_POOL_ID not set; skipping auto-confirm");
            return false;
        };
        match self
            .client
            .admin_confirm_sign_up()
            .user_pool_id(user_pool_id)
            .username(email)
            .send()
            .await
        {
            Ok(_) => {
                tracing::info!("User auto-confirmed: {}", email);
                true
            }
            Err(e) => {
                tracing::error!("Failed to auto-confirm user: {}", DisplayErrorContext(&e));
                false
            }
        }
    }
}

#[async_trait]
impl AuthProvider for CognitoAuth {
    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, AuthError> {
        tracing::info!("Signing up user: {}", email);

        let email_attribute = AttributeType::builder()
            .name("email")
            .value(email)
            .build()
            .map_err(|e| AuthError::Service(e.to_string()))?;

        let response = self
            .client
            .sign_up()
            .client_id(&self.client_id)
            .username(email)
            .password(password)
            .secret_hash(self.secret_hash(email)?)
            .user_attributes(email_attribute)
            .send()
            .await
            .map_err(|e| classify("sign_up", Credential::Password, e))?;

        let user_id = response.user_sub().to_string();
        if response.user_confirmed() || self.auto_confirm(email).await {
            Ok(SignUpOutcome::Confirmed { user_id })
        } else {
            Ok(SignUpOutcome::PendingConfirmation { user_id })
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthTokens, AuthError> {
        tracing::info!("Authenticating user: {}", email);

        let response = self
            .client
            .initiate_auth()
            .auth_flow(AuthFlowType::UserPasswordAuth)
            .client_id(&self.client_id)
            .auth_parameters("USERNAME", email)
            .auth_parameters("PASSWORD", password)
            .auth_parameters("SECRET_HASH", self.secret_hash(email)?)
            .send()
            .await
            .map_err(|e| classify("initiate_auth", Credential::Password, e))?;

        match response.authentication_result() {
            Some(result) => Ok(tokens_from(result)),
            None => {
                // Challenges (e.g. NEW_PASSWORD_REQUIRED) are not supported by the pages.
                tracing::error!(
                    "No authentication result returned (challenge: {:?})",
                    response.challenge_name()
                );
                Err(AuthError::MissingResult)
            }
        }
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        self.client
            .global_sign_out()
            .access_token(access_token)
            .send()
            .await
            .map_err(|e| classify("global_sign_out", Credential::Token, e))?;
        Ok(())
    }

    async fn get_user(&self, access_token: &str) -> Result<SessionUser, AuthError> {
        let response = self
            .client
            .get_user()
            .access_token(access_token)
            .send()
            .await
            .map_err(|e| classify("get_user", Credential::Token, e))?;

        let attribute = |name: &str| {
            response
                .user_attributes()
                .iter()
                .find(|a| a.name() == name)
                .and_then(|a| a.value())
                .map(str::to_string)
        };

        let username = response.username().to_string();
        Ok(SessionUser {
            id: attribute("sub").unwrap_or_else(|| username.clone()),
            email: attribute("email").unwrap_or_default(),
            username,
        })
    }

    async fn refresh(&self, username: &str, refresh_token: &str) -> Result<AuthTokens, AuthError> {
        let response = self
            .client
            .initiate_auth()
            .auth_flow(AuthFlowType::RefreshTokenAuth)
            .client_id(&self.client_id)
            .auth_parameters("REFRESH_TOKEN", refresh_token)
            .auth_parameters("SECRET_HASH", self.secret_hash(username)?)
            .send()
            .await
            .map_err(|e| classify("refresh", Credential::Token, e))?;

        response
            .authentication_result()
            .map(tokens_from)
            .ok_or(AuthError::MissingResult)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn secret_hash_is_hmac_of_username_and_client_id() {
        let hash = compute_secret_hash("ada@example.com", "client-id", "client-secret").unwrap();
        assert_eq!(hash, "j91lPRnmFiw7H8DcHgy8tnvbdZiQHe1DEUkCVZkHRQM=");
    }

    #[test]
    fn secret_hash_depends_on_username() {
        let a = compute_secret_hash("a@example.com", "client-id", "client-secret").unwrap();
        let b = compute_secret_hash("b@example.com", "client-id", "client-secret").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn tokens_keep_missing_refresh_token_absent() {
        let result = AuthenticationResultType::builder()
            .access_token("access")
            .id_token("id")
            .expires_in(3600)
            .build();
        let tokens = tokens_from(&result);
        assert_eq!(tokens.access_token, "access");
        assert_eq!(tokens.refresh_token, None);
        assert_eq!(tokens.expires_in, 3600);
    }
}
