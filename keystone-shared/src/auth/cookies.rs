/// Auth cookie rendering and parsing
///
/// Tokens travel in two cookies, `access_token` and `refresh_token`. Both are
/// `HttpOnly`, scoped to `/`, use `SameSite=Lax`, and are `Secure` unless the
/// deployment explicitly disables it (plain HTTP development setups).
///
/// CSRF double-submit cookies are not issued.
///
/// # Example
///
/// ```
/// use axum::http::{header, HeaderMap, HeaderValue};
/// use keystone_shared::auth::cookies::{read_cookie, ACCESS_COOKIE};
///
/// let mut headers = HeaderMap::new();
/// headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; access_token=abc"));
/// assert_eq!(read_cookie(&headers, ACCESS_COOKIE).as_deref(), Some("abc"));
/// ```

use axum::http::{
    header::{self, InvalidHeaderValue},
    HeaderMap, HeaderValue,
};

use super::jwt::{TokenPair, TokenType};

/// Name of the cookie holding the access token
pub const ACCESS_COOKIE: &str = "access_token";

/// Name of the cookie holding the refresh token
pub const REFRESH_COOKIE: &str = "refresh_token";

/// Attributes shared by every auth cookie
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookieSettings {
    /// Emit the `Secure` attribute
    pub secure: bool,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self { secure: true }
    }
}

impl CookieSettings {
    fn render(&self, name: &str, value: &str, max_age_secs: i64) -> String {
        let mut cookie = format!(
            "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
            name, value, max_age_secs
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    /// Renders the `Set-Cookie` value that stores a token
    pub fn token_cookie(&self, token_type: TokenType, token: &str) -> String {
        let name = match token_type {
            TokenType::Access => ACCESS_COOKIE,
            TokenType::Refresh => REFRESH_COOKIE,
        };
        self.render(name, token, token_type.default_expiration().num_seconds())
    }

    /// Renders the `Set-Cookie` value that makes the browser drop a cookie
    pub fn removal_cookie(&self, name: &str) -> String {
        self.render(name, "", 0)
    }
}

/// Appends `Set-Cookie` headers for both tokens of a pair
pub fn set_token_cookies(
    headers: &mut HeaderMap,
    pair: &TokenPair,
    settings: &CookieSettings,
) -> Result<(), InvalidHeaderValue> {
    let access = settings.token_cookie(TokenType::Access, &pair.access_token);
    let refresh = settings.token_cookie(TokenType::Refresh, &pair.refresh_token);

    headers.append(header::SET_COOKIE, HeaderValue::from_str(&access)?);
    headers.append(header::SET_COOKIE, HeaderValue::from_str(&refresh)?);
    Ok(())
}

/// Appends `Set-Cookie` headers that clear both auth cookies
pub fn unset_token_cookies(
    headers: &mut HeaderMap,
    settings: &CookieSettings,
) -> Result<(), InvalidHeaderValue> {
    for name in [ACCESS_COOKIE, REFRESH_COOKIE] {
        headers.append(
            header::SET_COOKIE,
            HeaderValue::from_str(&settings.removal_cookie(name))?,
        );
    }
    Ok(())
}

/// Reads a cookie value from the request's `Cookie` header(s)
///
/// Returns `None` when the cookie is absent or empty.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}
