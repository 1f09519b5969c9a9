//! Public diagnostic pages for checking routing and session state.

use crate::gate::CurrentSession;
use crate::templates::{render_page, BaseContext, DashboardSimpleTemplate, DashboardTestTemplate};
use axum::{
    http::{header, HeaderMap, StatusCode, Uri},
    response::Response,
};
use axum_extra::extract::CookieJar;
use serde::Serialize;

const LOGIN_REDIRECT_SECS: u32 = 3;

#[derive(Debug, Serialize)]
pub struct RequestInfo {
    pub path: String,
    pub host: String,
    pub scheme: String,
    /// Names only; values are session secrets.
    pub cookies: Vec<String>,
    pub user_agent: String,
    pub timestamp: String,
}

fn header_str<'a>(headers: &'a HeaderMap, name: impl header::AsHeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

impl RequestInfo {
    fn gather(uri: &Uri, headers: &HeaderMap, jar: &CookieJar) -> Self {
        let mut cookies: Vec<String> = jar.iter().map(|c| c.name().to_string()).collect();
        cookies.sort();

        Self {
            path: uri.path().to_string(),
            host: header_str(headers, header::HOST)
                .or_else(|| uri.host())
                .unwrap_or_default()
                .to_string(),
            scheme: header_str(headers, "x-forwarded-proto")
                .or_else(|| uri.scheme_str())
                .unwrap_or("http")
                .to_string(),
            cookies,
            user_agent: header_str(headers, header::USER_AGENT)
                .unwrap_or_default()
                .to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// `/dashboard-test`
pub async fn request_info(
    current: CurrentSession,
    uri: Uri,
    headers: HeaderMap,
    jar: CookieJar,
) -> Response {
    let info = RequestInfo::gather(&uri, &headers, &jar);
    let template = DashboardTestTemplate {
        base: BaseContext::new(&current, None),
        info_json: serde_json::to_string_pretty(&info).unwrap_or_default(),
    };
    render_page(StatusCode::OK, &template)
}

/// `/dashboard-simple`
pub async fn auth_status(current: CurrentSession) -> Response {
    let (status, redirect_after_secs) = match current.email() {
        Some(email) => (format!("Authenticated as: {}", email), None),
        None => ("Not authenticated".to_string(), Some(LOGIN_REDIRECT_SECS)),
    };
    let template = DashboardSimpleTemplate {
        base: BaseContext::new(&current, None),
        status,
        redirect_after_secs,
    };
    render_page(StatusCode::OK, &template)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use axum_extra::extract::cookie::Cookie;
    use pretty_assertions::assert_eq;

    #[test]
    fn gathers_cookie_names_without_values() {
        let uri: Uri = "/dashboard-test".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("app.example.com"));
        headers.insert("x-forwarded-proto", HeaderValue::from_static("https"));
        headers.insert(header::USER_AGENT, HeaderValue::from_static("test-agent"));
        let jar = CookieJar::new()
            .add(Cookie::new("b-cookie", "secret-b"))
            .add(Cookie::new("a-cookie", "secret-a"));

        let info = RequestInfo::gather(&uri, &headers, &jar);

        assert_eq!(info.path, "/dashboard-test");
        assert_eq!(info.host, "app.example.com");
        assert_eq!(info.scheme, "https");
        assert_eq!(info.cookies, vec!["a-cookie", "b-cookie"]);
        assert_eq!(info.user_agent, "test-agent");
        let json = serde_json::to_string(&info).unwrap();
        assert!(!json.contains("secret"));
    }
}
