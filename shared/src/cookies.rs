use crate::types::AuthTokens;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};

pub const ACCESS_TOKEN_COOKIE: &str = "adbrief-access-token";
pub const REFRESH_TOKEN_COOKIE: &str = "adbrief-refresh-token";
/// Username the refresh token was issued to; needed for the refresh SECRET_HASH.
pub const USER_COOKIE: &str = "adbrief-user";

pub const SESSION_COOKIES: [&str; 3] = [ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE, USER_COOKIE];

/// Cookie attributes taken from configuration.
#[derive(Debug, Clone, Copy)]
pub struct CookieSettings {
    pub secure: bool,
    pub refresh_max_age_secs: i64,
}

/// Build `Set-Cookie` header values for HttpOnly, path-wide cookies.
pub fn format_cookie_headers(
    cookies: Vec<(&str, String)>,
    secure: bool,
    max_age_secs: i64,
) -> Vec<String> {
    let secure_flag = if secure { "; Secure" } else { "" };

    cookies
        .into_iter()
        .map(|(name, value)| {
            format!(
                "{}={}; Path=/; Max-Age={}; HttpOnly{}; SameSite=Lax",
                name, value, max_age_secs, secure_flag
            )
        })
        .collect()
}

/// Cookies for a freshly issued or refreshed session.
///
/// The access token lives as long as the token itself. The refresh token and
/// username are only rewritten when the auth service handed out a new refresh
/// token.
pub fn session_cookie_headers(
    tokens: &AuthTokens,
    username: &str,
    settings: CookieSettings,
) -> Vec<String> {
    let mut headers = format_cookie_headers(
        vec![(ACCESS_TOKEN_COOKIE, tokens.access_token.clone())],
        settings.secure,
        i64::from(tokens.expires_in),
    );
    if let Some(refresh_token) = &tokens.refresh_token {
        headers.extend(format_cookie_headers(
            vec![
                (REFRESH_TOKEN_COOKIE, refresh_token.clone()),
                (USER_COOKIE, encode_username(username)),
            ],
            settings.secure,
            settings.refresh_max_age_secs,
        ));
    }
    headers
}

/// Expire every session cookie.
pub fn clear_cookie_headers(secure: bool) -> Vec<String> {
    format_cookie_headers(
        SESSION_COOKIES
            .iter()
            .map(|name| (*name, String::new()))
            .collect(),
        secure,
        0,
    )
}

// Usernames are emails; encode so the value never needs quoting.
pub fn encode_username(username: &str) -> String {
    URL_SAFE_NO_PAD.encode(username.as_bytes())
}

pub fn decode_username(value: &str) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(value).ok()?;
    String::from_utf8(bytes).ok().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tokens(refresh: Option<&str>) -> AuthTokens {
        AuthTokens {
            access_token: "access".into(),
            id_token: "id".into(),
            refresh_token: refresh.map(str::to_string),
            expires_in: 3600,
        }
    }

    #[test]
    fn formats_secure_cookie() {
        let headers = format_cookie_headers(vec![("a", "b".into())], true, 60);
        assert_eq!(headers, vec!["a=b; Path=/; Max-Age=60; HttpOnly; Secure; SameSite=Lax"]);
    }

    #[test]
    fn sign_in_sets_all_three_cookies() {
        let settings = CookieSettings {
            secure: false,
            refresh_max_age_secs: 86400,
        };
        let headers = session_cookie_headers(&tokens(Some("refresh")), "ada@example.com", settings);
        assert_eq!(headers.len(), 3);
        assert!(headers[0].starts_with("adbrief-access-token=access; Path=/; Max-Age=3600"));
        assert!(headers[1].starts_with("adbrief-refresh-token=refresh; Path=/; Max-Age=86400"));
        assert!(headers[2].starts_with(&format!("adbrief-user={};", encode_username("ada@example.com"))));
    }

    #[test]
    fn refresh_without_new_refresh_token_only_rewrites_access_cookie() {
        let settings = CookieSettings {
            secure: true,
            refresh_max_age_secs: 86400,
        };
        let headers = session_cookie_headers(&tokens(None), "ada@example.com", settings);
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn clearing_expires_every_cookie() {
        let headers = clear_cookie_headers(true);
        assert_eq!(headers.len(), 3);
        assert!(headers.iter().all(|h| h.contains("=; Path=/; Max-Age=0")));
    }

    #[test]
    fn username_encoding_round_trips() {
        let encoded = encode_username("a+b@example.com");
        assert!(!encoded.contains('@'));
        assert_eq!(decode_username(&encoded).as_deref(), Some("a+b@example.com"));
        assert_eq!(decode_username("!!"), None);
    }
}
