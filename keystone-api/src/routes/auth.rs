/// Authentication endpoints
///
/// Tokens are never returned in bodies. Login, registration and refresh set
/// the `access_token` and `refresh_token` cookies; logout clears them.
///
/// # Endpoints
///
/// - `POST /auth/register` - Register new user
/// - `POST /auth/login` - Login and receive auth cookies
/// - `POST /auth/refresh` - Rotate both cookies from the refresh cookie
/// - `POST /auth/logout` - Clear auth cookies
/// - `GET /auth/users` - Current user with workspaces

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, NOT_AUTHORIZED},
    routes::Envelope,
};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use keystone_shared::{
    accounts::{create_account, verify_credentials, AccountKind, NewAccount},
    auth::{
        cookies::{read_cookie, set_token_cookies, unset_token_cookies, REFRESH_COOKIE},
        jwt::{issue_token_pair, rotate_token_pair},
        middleware::AuthContext,
        password::validate_password_strength,
    },
    cache::user_profile_entry,
    models::{
        user::{SystemRole, User},
        workspace::{MemberWorkspace, WorkspaceRepository},
    },
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Register request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(
        email(message = "Invalid email format"),
        length(max = 128, message = "Email must be at most 128 characters")
    )]
    pub email: String,

    /// Checked for strength after field validation
    pub password: String,

    #[validate(length(min = 1, max = 48, message = "First name must be 1 to 48 characters"))]
    pub first_name: String,

    #[validate(length(min = 1, max = 48, message = "Last name must be 1 to 48 characters"))]
    pub last_name: String,

    #[validate(length(max = 48, message = "Username must be at most 48 characters"))]
    pub username: Option<String>,
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub password: String,
}

/// Current user with the workspaces they belong to
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub username: Option<String>,
    pub role: SystemRole,
    pub is_superuser: bool,
    pub is_active: bool,
    pub workspaces: Vec<MemberWorkspace>,
}

impl UserProfile {
    fn new(user: User, workspaces: Vec<MemberWorkspace>) -> Self {
        Self {
            id: user.id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            username: user.username,
            role: user.role,
            is_superuser: user.is_superuser,
            is_active: user.is_active,
            workspaces,
        }
    }
}

/// Issues a fresh token pair as cookies on an empty response
fn with_token_cookies(state: &AppState, user_id: Uuid, status: StatusCode) -> ApiResult<(StatusCode, HeaderMap)> {
    let pair = issue_token_pair(user_id, state.jwt_secret())?;
    let mut headers = HeaderMap::new();
    set_token_cookies(&mut headers, &pair, &state.cookie_settings())?;
    Ok((status, headers))
}

/// Register a new user
///
/// Creates an active `free_user` account and logs it in.
///
/// # Endpoint
///
/// ```text
/// POST /auth/register
/// Content-Type: application/json
///
/// {
///   "email": "user@example.com",
///   "password": "SecureP@ss123",
///   "firstName": "Ada",
///   "lastName": "Lovelace"
/// }
/// ```
///
/// # Response
///
/// `201 Created` with both auth cookies set:
///
/// ```json
/// { "data": "uuid", "message": "Success registration.", "errors": [] }
/// ```
///
/// # Errors
///
/// - `409 Conflict`: Email already exists
/// - `422 Unprocessable Entity`: Validation failed
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    req.validate()?;
    validate_password_strength(&req.password)
        .map_err(|message| ApiError::invalid_field("password", message))?;

    let user = create_account(
        &state.db,
        NewAccount {
            email: req.email,
            password: req.password,
            first_name: req.first_name,
            last_name: req.last_name,
            username: req.username,
        },
        AccountKind::Registered,
    )
    .await?;

    let (status, headers) = with_token_cookies(&state, user.id, StatusCode::CREATED)?;
    Ok((status, headers, Json(Envelope::new(user.id, "Success registration."))))
}

/// Login endpoint
///
/// # Response
///
/// `204 No Content` with both auth cookies set.
///
/// # Errors
///
/// - `401 Unauthorized`: Unknown email, wrong password or inactive account
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    // A malformed email can never match an account
    if req.validate().is_err() {
        return Err(ApiError::Unauthorized(NOT_AUTHORIZED.to_string()));
    }

    let user = verify_credentials(&state.db, &req.email, &req.password).await?;
    tracing::info!(user_id = %user.id, "User logged in");

    with_token_cookies(&state, user.id, StatusCode::NO_CONTENT)
}

/// Token refresh endpoint
///
/// Exchanges the refresh cookie for a new access/refresh pair.
///
/// # Errors
///
/// - `401 Unauthorized`: Missing, invalid or expired refresh token, or an
///   access token in the refresh cookie
pub async fn refresh(
    State(state): State<AppState>,
    request_headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    let token = read_cookie(&request_headers, REFRESH_COOKIE)
        .ok_or_else(|| ApiError::Unauthorized(NOT_AUTHORIZED.to_string()))?;

    let pair = rotate_token_pair(&token, state.jwt_secret())?;

    let mut headers = HeaderMap::new();
    set_token_cookies(&mut headers, &pair, &state.cookie_settings())?;
    Ok((StatusCode::NO_CONTENT, headers))
}

/// Logout endpoint
///
/// Clears both cookies. Needs no valid session.
pub async fn logout(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let mut headers = HeaderMap::new();
    unset_token_cookies(&mut headers, &state.cookie_settings())?;
    Ok((StatusCode::NO_CONTENT, headers))
}

/// Current user with their workspaces
///
/// Served from the profile cache when present. Workspace mutations bump the
/// profile generation of every affected user; a profile is only stored under
/// the generation observed before the database read, so a response built
/// from data that changed meanwhile is never served from the cache.
///
/// # Errors
///
/// - `401 Unauthorized`: The token's user no longer exists
pub async fn current_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Envelope<UserProfile>>> {
    let entry = user_profile_entry(auth.user_id);

    let mut generation = None;
    if let Some(cache) = &state.cache {
        if let Some(snapshot) = cache.get_versioned::<UserProfile>(&entry).await {
            if let Some(profile) = snapshot.value {
                tracing::debug!(user_id = %auth.user_id, "Profile served from cache");
                return Ok(Json(Envelope::new(profile, "Success retrieving users.")));
            }
            generation = Some(snapshot.generation);
        }
    }

    let user = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized(NOT_AUTHORIZED.to_string()))?;

    let workspaces = WorkspaceRepository::new(state.db.clone(), user.id)
        .list_memberships()
        .await?;
    let profile = UserProfile::new(user, workspaces);

    if let (Some(cache), Some(generation)) = (&state.cache, generation) {
        cache.save_versioned(&entry, generation, &profile).await;
    }

    Ok(Json(Envelope::new(profile, "Success retrieving users.")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_register_request_validation() {
        let req: RegisterRequest = serde_json::from_value(json!({
            "email": "ada@example.com",
            "password": "MyP@ssw0rd!",
            "firstName": "Ada",
            "lastName": "Lovelace"
        }))
        .unwrap();
        assert!(req.validate().is_ok());

        let req: RegisterRequest = serde_json::from_value(json!({
            "email": "not-an-email",
            "password": "MyP@ssw0rd!",
            "firstName": "",
            "lastName": "x".repeat(49)
        }))
        .unwrap();
        let errors = req.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("first_name"));
        assert!(fields.contains_key("last_name"));
    }

    #[test]
    fn test_register_request_rejects_long_email() {
        let req = RegisterRequest {
            email: format!("{}@example.com", "a".repeat(120)),
            password: "MyP@ssw0rd!".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            username: Some("u".repeat(49)),
        };

        let errors = req.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("username"));
    }

    #[test]
    fn test_user_profile_serializes_camel_case() {
        let profile = UserProfile {
            id: Uuid::nil(),
            email: "ada@example.com".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            username: None,
            role: SystemRole::FreeUser,
            is_superuser: false,
            is_active: true,
            workspaces: Vec::new(),
        };

        let value = serde_json::to_value(&profile).unwrap();
        assert_eq!(value["firstName"], "Ada");
        assert_eq!(value["isSuperuser"], false);
        assert_eq!(value["role"], "free_user");
        assert_eq!(value["workspaces"], json!([]));
    }
}
