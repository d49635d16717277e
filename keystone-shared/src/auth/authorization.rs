/// Workspace authorization checks
///
/// # Permission Model
///
/// 1. **Access**: a user may see a workspace iff they own it or hold a
///    membership in it
/// 2. **Role**: deleting a workspace additionally requires
///    [`WorkspaceRole::Owner`]; every other operation needs access only
///
/// # Example
///
/// ```no_run
/// use keystone_shared::auth::authorization::require_workspace_role;
/// use keystone_shared::models::workspace_user::WorkspaceRole;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// async fn check(pool: &PgPool, workspace_id: i32, user_id: Uuid) -> Result<(), String> {
///     require_workspace_role(pool, workspace_id, user_id, WorkspaceRole::Owner)
///         .await
///         .map_err(|e| e.to_string())?;
///     Ok(())
/// }
/// ```

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::workspace_user::{WorkspaceRole, WorkspaceUser};

/// Error type for authorization checks
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    /// Workspace missing or the user has no access to it
    #[error("No access to workspace {0}")]
    NoAccess(i32),

    /// User doesn't have required role
    #[error("Insufficient permissions: requires {required:?}, has {actual:?}")]
    InsufficientRole {
        required: WorkspaceRole,
        actual: WorkspaceRole,
    },

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Checks that a user may access a workspace and returns their role in it
///
/// # Errors
///
/// Returns `AuthzError::NoAccess` if the workspace does not exist or the user
/// neither owns it nor is a member.
pub async fn require_workspace_access(
    pool: &PgPool,
    workspace_id: i32,
    user_id: Uuid,
) -> Result<WorkspaceRole, AuthzError> {
    WorkspaceUser::effective_role(pool, workspace_id, user_id)
        .await?
        .ok_or(AuthzError::NoAccess(workspace_id))
}

/// Checks that a user holds at least `required_role` in a workspace
///
/// # Errors
///
/// - `AuthzError::NoAccess` if the user cannot access the workspace
/// - `AuthzError::InsufficientRole` if their role is too low
pub async fn require_workspace_role(
    pool: &PgPool,
    workspace_id: i32,
    user_id: Uuid,
    required_role: WorkspaceRole,
) -> Result<WorkspaceRole, AuthzError> {
    let user_role = require_workspace_access(pool, workspace_id, user_id).await?;
    check_role(user_role, required_role)?;
    Ok(user_role)
}

/// Compares an already-known role against a requirement
pub fn check_role(actual: WorkspaceRole, required: WorkspaceRole) -> Result<(), AuthzError> {
    if !actual.has_permission(&required) {
        return Err(AuthzError::InsufficientRole { required, actual });
    }

    Ok(())
}
