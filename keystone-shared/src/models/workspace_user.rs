/// Workspace membership model and database operations
///
/// # Schema
///
/// ```sql
/// CREATE TYPE workspace_role AS ENUM ('owner', 'member', 'guest');
///
/// CREATE TABLE auth.workspace_users (
///     workspace_id INTEGER NOT NULL REFERENCES auth.workspaces(id) ON DELETE CASCADE,
///     user_id UUID NOT NULL REFERENCES auth.users(id) ON DELETE CASCADE,
///     role workspace_role NOT NULL DEFAULT 'member',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     PRIMARY KEY (workspace_id, user_id)
/// );
/// ```
///
/// # Roles
///
/// - **owner**: created with the workspace; may delete it
/// - **member**: may read, update and invite; `add_user` always grants this
/// - **guest**: reserved in the schema, same access as a member

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

/// Roles a user can hold inside a workspace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "workspace_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum WorkspaceRole {
    Owner,
    Member,
    Guest,
}

impl WorkspaceRole {
    /// Converts role to string for display
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkspaceRole::Owner => "owner",
            WorkspaceRole::Member => "member",
            WorkspaceRole::Guest => "guest",
        }
    }

    /// Checks if this role has at least the permission level of `required`
    ///
    /// Hierarchy: Owner > Member > Guest
    pub fn has_permission(&self, required: &WorkspaceRole) -> bool {
        self.permission_level() >= required.permission_level()
    }

    fn permission_level(&self) -> u8 {
        match self {
            WorkspaceRole::Owner => 3,
            WorkspaceRole::Member => 2,
            WorkspaceRole::Guest => 1,
        }
    }
}

/// Membership row linking a user to a workspace
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct WorkspaceUser {
    pub workspace_id: i32,
    pub user_id: Uuid,
    pub role: WorkspaceRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Member of a workspace with public user fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceMember {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub username: Option<String>,
    pub role: WorkspaceRole,
}

impl WorkspaceUser {
    /// Inserts a membership
    ///
    /// Accepts any executor so the owner membership can be written inside the
    /// workspace creation transaction.
    pub async fn create<'e, E>(
        executor: E,
        workspace_id: i32,
        user_id: Uuid,
        role: WorkspaceRole,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, WorkspaceUser>(
            r#"
            INSERT INTO auth.workspace_users (workspace_id, user_id, role)
            VALUES ($1, $2, $3)
            RETURNING workspace_id, user_id, role, created_at, updated_at
            "#,
        )
        .bind(workspace_id)
        .bind(user_id)
        .bind(role)
        .fetch_one(executor)
        .await
    }

    /// Finds a specific membership
    pub async fn find(
        pool: &PgPool,
        workspace_id: i32,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, WorkspaceUser>(
            r#"
            SELECT workspace_id, user_id, role, created_at, updated_at
            FROM auth.workspace_users
            WHERE workspace_id = $1 AND user_id = $2
            "#,
        )
        .bind(workspace_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    /// Effective role of a user in a workspace
    ///
    /// The workspace owner is always `Owner`, even if their membership row is
    /// missing. Returns `None` when the workspace does not exist or the user
    /// has no access to it.
    pub async fn effective_role(
        pool: &PgPool,
        workspace_id: i32,
        user_id: Uuid,
    ) -> Result<Option<WorkspaceRole>, sqlx::Error> {
        sqlx::query_scalar::<_, WorkspaceRole>(
            r#"
            SELECT CASE WHEN w.owner_id = $2 THEN 'owner'::workspace_role ELSE wu.role END
            FROM auth.workspaces w
            LEFT JOIN auth.workspace_users wu
                   ON wu.workspace_id = w.id AND wu.user_id = $2
            WHERE w.id = $1 AND (w.owner_id = $2 OR wu.user_id IS NOT NULL)
            "#,
        )
        .bind(workspace_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    /// Lists the members of a workspace, owner first
    pub async fn list_members(
        pool: &PgPool,
        workspace_id: i32,
    ) -> Result<Vec<WorkspaceMember>, sqlx::Error> {
        sqlx::query_as::<_, WorkspaceMember>(
            r#"
            SELECT u.id, u.email, u.first_name, u.last_name, u.username, wu.role
            FROM auth.workspace_users wu
            JOIN auth.users u ON u.id = wu.user_id
            WHERE wu.workspace_id = $1
            ORDER BY (wu.role = 'owner') DESC, wu.created_at ASC
            "#,
        )
        .bind(workspace_id)
        .fetch_all(pool)
        .await
    }

    /// IDs of every user holding a membership in the workspace
    pub async fn member_ids(pool: &PgPool, workspace_id: i32) -> Result<Vec<Uuid>, sqlx::Error> {
        sqlx::query_scalar("SELECT user_id FROM auth.workspace_users WHERE workspace_id = $1")
            .bind(workspace_id)
            .fetch_all(pool)
            .await
    }

    /// Removes a membership; returns true if one existed
    pub async fn delete(pool: &PgPool, workspace_id: i32, user_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM auth.workspace_users WHERE workspace_id = $1 AND user_id = $2",
        )
        .bind(workspace_id)
        .bind(user_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
