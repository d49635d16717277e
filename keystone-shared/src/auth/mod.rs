/// Authentication and authorization utilities
///
/// This module provides the authentication primitives for Keystone:
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and validation
/// - [`jwt`]: Access/refresh token generation and validation
/// - [`cookies`]: `Set-Cookie` rendering and `Cookie` header parsing
/// - [`middleware`]: Cookie authentication of requests
/// - [`authorization`]: Workspace access and role checks
///
/// # Security Features
///
/// - **Password Hashing**: Argon2id with 64 MB memory, 3 iterations
/// - **JWT Tokens**: HS256, 30 minute access tokens, 15 day refresh tokens
/// - **Cookies**: `HttpOnly`, `SameSite=Lax`, `Secure` unless disabled
///
/// # Example
///
/// ```no_run
/// use keystone_shared::auth::jwt::{issue_token_pair, validate_access_token};
/// use keystone_shared::auth::password::{hash_password, verify_password};
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("user_password")?;
/// assert!(verify_password("user_password", &hash)?);
///
/// let pair = issue_token_pair(Uuid::new_v4(), "jwt-secret")?;
/// let claims = validate_access_token(&pair.access_token, "jwt-secret")?;
/// assert!(claims.fresh);
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod cookies;
pub mod jwt;
pub mod middleware;
pub mod password;
