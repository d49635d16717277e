/// Database models for Keystone
///
/// All tables live in the `auth` schema.
///
/// # Models
///
/// - `user`: User accounts, system roles and credentials
/// - `workspace`: Workspaces plus the access-scoped [`workspace::WorkspaceRepository`]
/// - `workspace_user`: User-workspace memberships with workspace roles
///
/// # Example
///
/// ```no_run
/// use keystone_shared::models::workspace::{CreateWorkspace, WorkspaceRepository};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, user_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let repo = WorkspaceRepository::new(pool, user_id);
/// let id = repo
///     .create(CreateWorkspace {
///         title: "Research".to_string(),
///         description: "Shared notes".to_string(),
///     })
///     .await?;
/// let visible = repo.get_all().await?;
/// assert!(visible.iter().any(|w| w.id == id));
/// # Ok(())
/// # }
/// ```

pub mod user;
pub mod workspace;
pub mod workspace_user;
