/// Workspace endpoints
///
/// Every handler runs behind cookie authentication and works through a
/// [`WorkspaceRepository`] scoped to the caller, so users only ever see
/// workspaces they own or belong to.
///
/// # Endpoints
///
/// - `GET /auth/workspaces` - List accessible workspaces
/// - `POST /auth/workspaces/create` - Create a workspace
/// - `POST /auth/workspaces/search` - Filter, sort and paginate workspaces
/// - `GET /auth/workspaces/:id` - Workspace with owner and members
/// - `PATCH /auth/workspaces/:id` - Update title and/or description
/// - `DELETE /auth/workspaces/:id` - Delete (owner only)
/// - `POST /auth/workspaces/:id/add_user` - Add a member

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::Envelope,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use keystone_shared::{
    auth::middleware::AuthContext,
    models::workspace::{
        CreateWorkspace, UpdateWorkspace, Workspace, WorkspaceDetail, WorkspaceError,
        WorkspaceRepository,
    },
    search::{SearchRequest, SearchResponse},
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

/// Create workspace request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateWorkspaceRequest {
    #[validate(length(min = 1, max = 64, message = "Title must be 1 to 64 characters"))]
    pub title: String,

    #[serde(default)]
    #[validate(length(max = 512, message = "Description must be at most 512 characters"))]
    pub description: String,
}

impl CreateWorkspaceRequest {
    /// Trims the title so length checks see what gets stored
    pub fn normalized(mut self) -> Self {
        self.title = self.title.trim().to_string();
        self
    }
}

/// Partial update request
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateWorkspaceRequest {
    #[validate(length(min = 1, max = 64, message = "Title must be 1 to 64 characters"))]
    pub title: Option<String>,

    #[validate(length(max = 512, message = "Description must be at most 512 characters"))]
    pub description: Option<String>,
}

impl UpdateWorkspaceRequest {
    pub fn normalized(mut self) -> Self {
        self.title = self.title.map(|t| t.trim().to_string());
        self
    }
}

/// Add member request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddWorkspaceMember {
    pub user_id: Uuid,
}

/// Optional paging for the list endpoint
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

fn repository(state: &AppState, auth: &AuthContext) -> WorkspaceRepository {
    WorkspaceRepository::new(state.db.clone(), auth.user_id)
}

/// List accessible workspaces, oldest first
///
/// Without `limit` every workspace is returned.
pub async fn list_workspaces(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Envelope<Vec<Workspace>>>> {
    let repo = repository(&state, &auth);

    let workspaces = match query.limit {
        Some(limit) => {
            repo.get_list(limit.clamp(1, 100), query.offset.unwrap_or(0).max(0))
                .await?
        }
        None => repo.get_all().await?,
    };

    Ok(Json(Envelope::new(workspaces, "Success retrieving workspaces.")))
}

/// Create a workspace owned by the caller
///
/// # Response
///
/// `201 Created`:
///
/// ```json
/// { "data": "Workspace is created with ID 7", "message": "Success creating workspace.", "errors": [] }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: The workspace could not be stored
/// - `422 Unprocessable Entity`: Validation failed
pub async fn create_workspace(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateWorkspaceRequest>,
) -> ApiResult<(StatusCode, Json<Envelope<String>>)> {
    let req = req.normalized();
    req.validate()?;

    let workspace_id = repository(&state, &auth)
        .create(CreateWorkspace {
            title: req.title,
            description: req.description,
        })
        .await
        .map_err(|e| {
            tracing::error!(user_id = %auth.user_id, error = %e, "Failed to create workspace");
            ApiError::BadRequest("Failed to create workspace.".to_string())
        })?;

    state.invalidate_profiles(&[auth.user_id]).await;

    Ok((
        StatusCode::CREATED,
        Json(Envelope::new(
            format!("Workspace is created with ID {}", workspace_id),
            "Success creating workspace.",
        )),
    ))
}

/// Search accessible workspaces
///
/// # Request
///
/// ```json
/// {
///   "search": "plans",
///   "page": 1,
///   "pageSize": 20,
///   "filter": [{"column": "owner_email", "value": "ada@example.com", "operator": "equals"}],
///   "sort": [{"column": "created_at", "direction": "desc"}]
/// }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Unknown column, bad value or unsupported operator
/// - `422 Unprocessable Entity`: Page or page size out of range
pub async fn search_workspaces(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<SearchRequest>,
) -> ApiResult<Json<Envelope<SearchResponse<Workspace>>>> {
    req.validate()?;

    let result = repository(&state, &auth).search(&req).await?;
    Ok(Json(Envelope::new(result, "Success searching workspaces.")))
}

/// Workspace with owner and members
///
/// # Errors
///
/// - `404 Not Found`: Unknown workspace or caller has no access
pub async fn get_workspace(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(workspace_id): Path<i32>,
) -> ApiResult<Json<Envelope<WorkspaceDetail>>> {
    let detail = repository(&state, &auth).get_detail(workspace_id).await?;
    Ok(Json(Envelope::new(detail, "Success retrieving workspace.")))
}

/// Update title and/or description
///
/// Any member may update. An empty body returns the workspace unchanged.
pub async fn update_workspace(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(workspace_id): Path<i32>,
    Json(req): Json<UpdateWorkspaceRequest>,
) -> ApiResult<Json<Envelope<Workspace>>> {
    let req = req.normalized();
    req.validate()?;

    let repo = repository(&state, &auth);
    let workspace = repo
        .update(
            workspace_id,
            UpdateWorkspace {
                title: req.title,
                description: req.description,
            },
        )
        .await?;

    let members = repo.member_ids(workspace_id).await?;
    state.invalidate_profiles(&members).await;

    Ok(Json(Envelope::new(workspace, "Success updating workspace.")))
}

/// Delete a workspace and its memberships
///
/// # Errors
///
/// - `403 Forbidden`: Caller is a member but not the owner
/// - `404 Not Found`: Unknown workspace, no access, or already deleted
pub async fn delete_workspace(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(workspace_id): Path<i32>,
) -> ApiResult<StatusCode> {
    let former_members = repository(&state, &auth)
        .delete(workspace_id)
        .await
        .map_err(|e| match e {
            WorkspaceError::NotFound(_) => {
                ApiError::NotFound("Workspace not found or already deleted".to_string())
            }
            other => other.into(),
        })?;

    tracing::info!(workspace_id, user_id = %auth.user_id, "Workspace deleted");
    state.invalidate_profiles(&former_members).await;

    Ok(StatusCode::NO_CONTENT)
}

/// Add a user to a workspace the caller can access
///
/// # Errors
///
/// - `400 Bad Request`: Caller cannot access the workspace
/// - `404 Not Found`: The user to add does not exist
/// - `409 Conflict`: The user is already a member
pub async fn add_user_to_workspace(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(workspace_id): Path<i32>,
    Json(req): Json<AddWorkspaceMember>,
) -> ApiResult<(StatusCode, Json<Envelope<String>>)> {
    let repo = repository(&state, &auth);

    repo.add_user(workspace_id, req.user_id)
        .await
        .map_err(|e| match e {
            WorkspaceError::NotFound(_) => {
                tracing::warn!(
                    workspace_id,
                    user_id = %auth.user_id,
                    "Attempt to add a user to a workspace without access"
                );
                ApiError::BadRequest("Failed to add user to workspace.".to_string())
            }
            other => other.into(),
        })?;

    let members = repo.member_ids(workspace_id).await?;
    state.invalidate_profiles(&members).await;

    Ok((
        StatusCode::CREATED,
        Json(Envelope::new(
            format!("User {} added to workspace {}", req.user_id, workspace_id),
            "Success adding user to workspace.",
        )),
    ))
}
