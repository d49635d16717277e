/// Workspace model and the access-scoped repository
///
/// # Schema
///
/// ```sql
/// CREATE TABLE auth.workspaces (
///     id SERIAL PRIMARY KEY,
///     title VARCHAR(64) NOT NULL,
///     description VARCHAR(512) NOT NULL,
///     owner_id UUID NOT NULL REFERENCES auth.users(id) ON DELETE CASCADE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// Every query issued through [`WorkspaceRepository`] is restricted to
/// workspaces the repository's user owns or is a member of.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::user::{User, UserSummary};
use super::workspace_user::{WorkspaceMember, WorkspaceRole, WorkspaceUser};
use crate::auth::authorization::{require_workspace_role, AuthzError};
use crate::search::{
    Column, ColumnKind, ScopedPredicate, SearchConfig, SearchError, SearchQuery, SearchRequest,
    SearchResponse,
};

/// "Owner or member" predicate; the user ID is always `$1`
macro_rules! access_filter {
    () => {
        "(w.owner_id = $1 OR EXISTS (SELECT 1 FROM auth.workspace_users wu \
         WHERE wu.workspace_id = w.id AND wu.user_id = $1))"
    };
}

/// Same predicate for `QueryBuilder`, which numbers parameters itself
const ACCESS_SCOPE: &[&str] = &[
    "(w.owner_id = ",
    " OR EXISTS (SELECT 1 FROM auth.workspace_users wu WHERE wu.workspace_id = w.id AND wu.user_id = ",
    "))",
];

/// Searchable columns of the workspace listing
pub const WORKSPACE_SEARCH: SearchConfig = SearchConfig {
    name: "workspaces",
    select: "w.id, w.title, w.description, w.owner_id, w.created_at, w.updated_at",
    from: "auth.workspaces w JOIN auth.users o ON o.id = w.owner_id",
    columns: &[
        Column::new("id", "w.id", ColumnKind::Integer),
        Column::new("title", "w.title", ColumnKind::Text).searchable(),
        Column::new("description", "w.description", ColumnKind::Text).searchable(),
        Column::new("owner_id", "w.owner_id", ColumnKind::Uuid),
        Column::new("created_at", "w.created_at", ColumnKind::Timestamp),
        Column::new("updated_at", "w.updated_at", ColumnKind::Timestamp),
        Column::new("owner_email", "o.email", ColumnKind::Text),
    ],
    default_sort: "w.id",
};

/// Workspace row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Workspace with its owner and member list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceDetail {
    #[serde(flatten)]
    pub workspace: Workspace,
    pub owner: UserSummary,
    pub members: Vec<WorkspaceMember>,
}

/// Workspace as seen by one of its members, owner embedded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberWorkspace {
    #[serde(flatten)]
    pub workspace: Workspace,
    pub owner: UserSummary,
    /// Caller's role in the workspace
    pub role: WorkspaceRole,
}

#[derive(sqlx::FromRow)]
struct MemberWorkspaceRow {
    id: i32,
    title: String,
    description: String,
    owner_id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    role: WorkspaceRole,
    owner_email: String,
    owner_first_name: String,
    owner_last_name: String,
    owner_username: Option<String>,
}

impl From<MemberWorkspaceRow> for MemberWorkspace {
    fn from(row: MemberWorkspaceRow) -> Self {
        Self {
            owner: UserSummary {
                id: row.owner_id,
                email: row.owner_email,
                first_name: row.owner_first_name,
                last_name: row.owner_last_name,
                username: row.owner_username,
            },
            workspace: Workspace {
                id: row.id,
                title: row.title,
                description: row.description,
                owner_id: row.owner_id,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
            role: row.role,
        }
    }
}

/// Input for creating a workspace
#[derive(Debug, Clone)]
pub struct CreateWorkspace {
    pub title: String,
    pub description: String,
}

/// Partial update; `None` fields are left unchanged
#[derive(Debug, Clone, Default)]
pub struct UpdateWorkspace {
    pub title: Option<String>,
    pub description: Option<String>,
}

impl UpdateWorkspace {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none()
    }
}

/// Errors from workspace operations
#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    /// Workspace missing or not visible to the user
    #[error("Workspace {0} not found")]
    NotFound(i32),

    /// Visible, but the user's role does not allow the operation
    #[error("Insufficient permissions on workspace {0}")]
    Forbidden(i32),

    /// User being added does not exist
    #[error("User {0} not found")]
    UserNotFound(Uuid),

    #[error("User {user_id} is already a member of workspace {workspace_id}")]
    AlreadyMember { workspace_id: i32, user_id: Uuid },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl WorkspaceError {
    fn from_authz(workspace_id: i32, err: AuthzError) -> Self {
        match err {
            AuthzError::NoAccess(_) => WorkspaceError::NotFound(workspace_id),
            AuthzError::InsufficientRole { .. } => WorkspaceError::Forbidden(workspace_id),
            AuthzError::DatabaseError(e) => WorkspaceError::Database(e),
        }
    }
}

/// Workspace queries scoped to one user
///
/// Cheap to construct per request; holds a pool handle and the caller's ID.
#[derive(Debug, Clone)]
pub struct WorkspaceRepository {
    pool: PgPool,
    user_id: Uuid,
}

impl WorkspaceRepository {
    pub fn new(pool: PgPool, user_id: Uuid) -> Self {
        Self { pool, user_id }
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    /// Creates a workspace owned by the user
    ///
    /// The workspace row and the owner membership are written in one
    /// transaction. Returns the new workspace ID.
    pub async fn create(&self, data: CreateWorkspace) -> Result<i32, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO auth.workspaces (title, description, owner_id)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(data.title)
        .bind(data.description)
        .bind(self.user_id)
        .fetch_one(&mut *tx)
        .await?;

        WorkspaceUser::create(&mut *tx, id, self.user_id, WorkspaceRole::Owner).await?;

        tx.commit().await?;

        tracing::info!(workspace_id = id, owner_id = %self.user_id, "Workspace created");
        Ok(id)
    }

    /// Finds a workspace the user can access
    pub async fn get_by_id(&self, id: i32) -> Result<Option<Workspace>, sqlx::Error> {
        sqlx::query_as::<_, Workspace>(concat!(
            "SELECT w.id, w.title, w.description, w.owner_id, w.created_at, w.updated_at \
             FROM auth.workspaces w WHERE w.id = $2 AND ",
            access_filter!()
        ))
        .bind(self.user_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Like [`get_by_id`](Self::get_by_id) but missing means an error
    pub async fn get_by_id_or_404(&self, id: i32) -> Result<Workspace, WorkspaceError> {
        self.get_by_id(id)
            .await?
            .ok_or(WorkspaceError::NotFound(id))
    }

    /// Workspace with owner and members
    pub async fn get_detail(&self, id: i32) -> Result<WorkspaceDetail, WorkspaceError> {
        let workspace = self.get_by_id_or_404(id).await?;

        let owner = User::find_by_id(&self.pool, workspace.owner_id)
            .await?
            .map(|owner| UserSummary::from(&owner))
            .ok_or(WorkspaceError::NotFound(id))?;
        let members = WorkspaceUser::list_members(&self.pool, id).await?;

        Ok(WorkspaceDetail {
            workspace,
            owner,
            members,
        })
    }

    /// One page of accessible workspaces ordered by ID
    pub async fn get_list(&self, limit: i64, offset: i64) -> Result<Vec<Workspace>, sqlx::Error> {
        sqlx::query_as::<_, Workspace>(concat!(
            "SELECT w.id, w.title, w.description, w.owner_id, w.created_at, w.updated_at \
             FROM auth.workspaces w WHERE ",
            access_filter!(),
            " ORDER BY w.id ASC LIMIT $2 OFFSET $3"
        ))
        .bind(self.user_id)
        .bind(limit.max(0))
        .bind(offset.max(0))
        .fetch_all(&self.pool)
        .await
    }

    /// Every accessible workspace ordered by ID
    pub async fn get_all(&self) -> Result<Vec<Workspace>, sqlx::Error> {
        sqlx::query_as::<_, Workspace>(concat!(
            "SELECT w.id, w.title, w.description, w.owner_id, w.created_at, w.updated_at \
             FROM auth.workspaces w WHERE ",
            access_filter!(),
            " ORDER BY w.id ASC"
        ))
        .bind(self.user_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Workspaces the user holds a membership in, with owners, for the profile
    pub async fn list_memberships(&self) -> Result<Vec<MemberWorkspace>, sqlx::Error> {
        let rows = sqlx::query_as::<_, MemberWorkspaceRow>(
            r#"
            SELECT w.id, w.title, w.description, w.owner_id, w.created_at, w.updated_at,
                   wu.role,
                   o.email AS owner_email, o.first_name AS owner_first_name,
                   o.last_name AS owner_last_name, o.username AS owner_username
            FROM auth.workspace_users wu
            JOIN auth.workspaces w ON w.id = wu.workspace_id
            JOIN auth.users o ON o.id = w.owner_id
            WHERE wu.user_id = $1
            ORDER BY w.id ASC
            "#,
        )
        .bind(self.user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(MemberWorkspace::from).collect())
    }

    /// Filtered, sorted and paginated search over accessible workspaces
    pub async fn search(
        &self,
        request: &SearchRequest,
    ) -> Result<SearchResponse<Workspace>, SearchError> {
        let scope = ScopedPredicate {
            parts: ACCESS_SCOPE,
            value: self.user_id,
        };

        SearchQuery::new(&WORKSPACE_SEARCH, request)?
            .fetch_page::<Workspace>(&self.pool, Some(&scope))
            .await
    }

    /// Applies a partial update
    ///
    /// An empty update returns the workspace unchanged.
    pub async fn update(&self, id: i32, data: UpdateWorkspace) -> Result<Workspace, WorkspaceError> {
        if data.is_empty() {
            return self.get_by_id_or_404(id).await;
        }

        sqlx::query_as::<_, Workspace>(concat!(
            "UPDATE auth.workspaces w \
             SET title = COALESCE($3, w.title), \
                 description = COALESCE($4, w.description), \
                 updated_at = NOW() \
             WHERE w.id = $2 AND ",
            access_filter!(),
            " RETURNING w.id, w.title, w.description, w.owner_id, w.created_at, w.updated_at"
        ))
        .bind(self.user_id)
        .bind(id)
        .bind(data.title)
        .bind(data.description)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(WorkspaceError::NotFound(id))
    }

    /// Deletes a workspace; only its owner may do so
    ///
    /// Memberships are removed by the foreign key cascade. Returns the IDs of
    /// users who were members, so callers can invalidate their caches.
    pub async fn delete(&self, id: i32) -> Result<Vec<Uuid>, WorkspaceError> {
        require_workspace_role(&self.pool, id, self.user_id, WorkspaceRole::Owner)
            .await
            .map_err(|e| WorkspaceError::from_authz(id, e))?;

        let mut tx = self.pool.begin().await?;

        let members: Vec<Uuid> =
            sqlx::query_scalar("SELECT user_id FROM auth.workspace_users WHERE workspace_id = $1")
                .bind(id)
                .fetch_all(&mut *tx)
                .await?;

        let result = sqlx::query("DELETE FROM auth.workspaces WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(self.user_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(WorkspaceError::NotFound(id));
        }

        tx.commit().await?;

        tracing::info!(workspace_id = id, owner_id = %self.user_id, "Workspace deleted");
        Ok(members)
    }

    /// Adds another user to a workspace as a member
    ///
    /// # Errors
    ///
    /// - `UserNotFound` if `user_id` does not exist
    /// - `NotFound` if the caller cannot access the workspace
    /// - `AlreadyMember` if the membership exists
    pub async fn add_user(&self, workspace_id: i32, user_id: Uuid) -> Result<WorkspaceUser, WorkspaceError> {
        if !User::exists(&self.pool, user_id).await? {
            return Err(WorkspaceError::UserNotFound(user_id));
        }

        self.get_by_id_or_404(workspace_id).await?;

        if WorkspaceUser::find(&self.pool, workspace_id, user_id)
            .await?
            .is_some()
        {
            return Err(WorkspaceError::AlreadyMember {
                workspace_id,
                user_id,
            });
        }

        let membership = WorkspaceUser::create(&self.pool, workspace_id, user_id, WorkspaceRole::Member)
            .await
            .map_err(|e| {
                // Lost a race with a concurrent insert of the same pair
                if matches!(&e, sqlx::Error::Database(db) if db.is_unique_violation()) {
                    WorkspaceError::AlreadyMember {
                        workspace_id,
                        user_id,
                    }
                } else {
                    WorkspaceError::Database(e)
                }
            })?;

        tracing::info!(workspace_id, user_id = %user_id, added_by = %self.user_id, "User added to workspace");
        Ok(membership)
    }

    /// IDs of all members of a workspace
    pub async fn member_ids(&self, workspace_id: i32) -> Result<Vec<Uuid>, sqlx::Error> {
        WorkspaceUser::member_ids(&self.pool, workspace_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_filter_uses_first_parameter() {
        let filter = access_filter!();
        assert!(filter.contains("w.owner_id = $1"));
        assert!(filter.contains("wu.user_id = $1"));
        assert!(!filter.contains("$2"));
    }

    #[test]
    fn test_update_is_empty() {
        assert!(UpdateWorkspace::default().is_empty());
        assert!(!UpdateWorkspace {
            title: Some("New".to_string()),
            description: None,
        }
        .is_empty());
    }

    #[test]
    fn test_workspace_serializes_camel_case() {
        let workspace = Workspace {
            id: 7,
            title: "Research".to_string(),
            description: String::new(),
            owner_id: Uuid::nil(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let detail = MemberWorkspace {
            owner: UserSummary {
                id: Uuid::nil(),
                email: "o@example.com".to_string(),
                first_name: "O".to_string(),
                last_name: "W".to_string(),
                username: None,
            },
            workspace,
            role: WorkspaceRole::Owner,
        };

        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["id"], 7);
        assert!(json.get("ownerId").is_some());
        assert!(json.get("createdAt").is_some());
        assert_eq!(json["owner"]["email"], "o@example.com");
        assert_eq!(json["role"], "owner");
    }

    #[test]
    fn test_workspace_search_config() {
        let request: SearchRequest = serde_json::from_str(
            r#"{"search": "plan", "filter": [{"column": "owner_email", "value": "a@b.c", "operator": "equals"}]}"#,
        )
        .unwrap();
        let query = SearchQuery::new(&WORKSPACE_SEARCH, &request).unwrap();
        let scope = ScopedPredicate {
            parts: ACCESS_SCOPE,
            value: Uuid::new_v4(),
        };
        let count = query.count_query(Some(&scope));
        let sql = count.sql();

        assert!(sql.starts_with(
            "SELECT COUNT(*) FROM auth.workspaces w JOIN auth.users o ON o.id = w.owner_id WHERE (w.owner_id = $1 OR EXISTS"
        ));
        assert!(sql.contains("wu.user_id = $2))"));
        assert!(sql.contains("w.title ILIKE $3"));
        assert!(sql.contains("w.description ILIKE $4"));
        assert!(sql.ends_with("AND o.email = $5"));
    }
}
