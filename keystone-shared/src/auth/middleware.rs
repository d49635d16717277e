/// Cookie authentication for Axum handlers
///
/// Reads the `access_token` cookie, validates it as an access token and
/// produces an [`AuthContext`]. The API server runs [`authenticate`] in a
/// middleware layer and inserts the context into request extensions, where
/// handlers extract it with `Extension<AuthContext>`.
///
/// # Example
///
/// ```
/// use axum::http::{header, HeaderMap, HeaderValue};
/// use keystone_shared::auth::jwt::issue_token_pair;
/// use keystone_shared::auth::middleware::authenticate;
/// use uuid::Uuid;
///
/// let user_id = Uuid::new_v4();
/// let pair = issue_token_pair(user_id, "jwt-secret").unwrap();
///
/// let mut headers = HeaderMap::new();
/// let cookie = format!("access_token={}", pair.access_token);
/// headers.insert(header::COOKIE, HeaderValue::from_str(&cookie).unwrap());
///
/// assert_eq!(authenticate(&headers, "jwt-secret").unwrap().user_id, user_id);
/// ```

use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::cookies::{read_cookie, ACCESS_COOKIE};
use super::jwt::{validate_access_token, Claims, JwtError};

/// Authentication context added to request extensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    /// Authenticated user ID
    pub user_id: Uuid,

    /// Whether the access token came straight from a credential check
    pub fresh: bool,

    /// ID of the token that authenticated the request
    pub token_id: Uuid,
}

impl AuthContext {
    /// Creates auth context from validated access token claims
    pub fn from_claims(claims: &Claims) -> Self {
        Self {
            user_id: claims.sub,
            fresh: claims.fresh,
            token_id: claims.jti,
        }
    }
}

/// Error type for authentication middleware
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// No auth cookie on the request
    #[error("Not authorized.")]
    MissingCredentials,

    /// Token validation failed
    #[error("{0}")]
    InvalidToken(String),
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => AuthError::InvalidToken("Token expired".to_string()),
            JwtError::InvalidIssuer => AuthError::InvalidToken("Invalid token issuer".to_string()),
            other => AuthError::InvalidToken(format!("Invalid token: {}", other)),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (StatusCode::UNAUTHORIZED, self.to_string()).into_response()
    }
}

/// Authenticates a request from its access cookie
///
/// # Errors
///
/// `MissingCredentials` without a cookie; `InvalidToken` if the cookie is
/// malformed, signed with another key, expired or holds a refresh token.
pub fn authenticate(headers: &HeaderMap, secret: &str) -> Result<AuthContext, AuthError> {
    let token = read_cookie(headers, ACCESS_COOKIE).ok_or(AuthError::MissingCredentials)?;
    let claims = validate_access_token(&token, secret)?;
    Ok(AuthContext::from_claims(&claims))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{create_token, issue_token_pair, TokenType};
    use axum::http::{header, HeaderValue};

    const SECRET: &str = "middleware-test-secret-32-bytes-long!";

    fn headers_with_cookie(cookie: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(cookie).unwrap());
        headers
    }

    #[test]
    fn test_auth_context_from_claims() {
        let claims = Claims::new(Uuid::new_v4(), TokenType::Access, true);
        let context = AuthContext::from_claims(&claims);

        assert_eq!(context.user_id, claims.sub);
        assert_eq!(context.token_id, claims.jti);
        assert!(context.fresh);
    }

    #[test]
    fn test_authenticate_with_access_cookie() {
        let user_id = Uuid::new_v4();
        let pair = issue_token_pair(user_id, SECRET).unwrap();
        let headers = headers_with_cookie(&format!("access_token={}", pair.access_token));

        let context = authenticate(&headers, SECRET).unwrap();
        assert_eq!(context.user_id, user_id);
    }

    #[test]
    fn test_authenticate_without_cookie() {
        assert_eq!(
            authenticate(&HeaderMap::new(), SECRET),
            Err(AuthError::MissingCredentials)
        );
    }

    #[test]
    fn test_authenticate_rejects_refresh_token_in_access_cookie() {
        let pair = issue_token_pair(Uuid::new_v4(), SECRET).unwrap();
        let headers = headers_with_cookie(&format!("access_token={}", pair.refresh_token));

        assert!(matches!(
            authenticate(&headers, SECRET),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_authenticate_rejects_expired_token() {
        let claims = Claims::with_expiration(
            Uuid::new_v4(),
            TokenType::Access,
            true,
            chrono::Duration::seconds(-7200),
        );
        let token = create_token(&claims, SECRET).unwrap();
        let headers = headers_with_cookie(&format!("access_token={}", token));

        assert_eq!(
            authenticate(&headers, SECRET),
            Err(AuthError::InvalidToken("Token expired".to_string()))
        );
    }

    #[test]
    fn test_auth_error_into_response() {
        let response = AuthError::MissingCredentials.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = AuthError::InvalidToken("bad".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
