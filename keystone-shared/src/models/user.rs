/// User model and database operations
///
/// # Schema
///
/// ```sql
/// CREATE TABLE auth.users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     email VARCHAR(128) NOT NULL,          -- unique on LOWER(email)
///     first_name VARCHAR(48) NOT NULL,
///     last_name VARCHAR(48) NOT NULL,
///     username VARCHAR(48),
///     is_superuser BOOLEAN NOT NULL DEFAULT FALSE,
///     is_active BOOLEAN NOT NULL DEFAULT FALSE,
///     password_hash VARCHAR(1024) NOT NULL,
///     role system_role NOT NULL DEFAULT 'free_user',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Platform-wide role of a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "system_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SystemRole {
    /// Platform owner
    Owner,

    /// Administrative account, usually created by the startup bootstrap
    Superuser,

    /// Default role for self-registered users
    FreeUser,

    /// Paying customer
    PaidUser,

    /// Limited account
    Guest,
}

impl SystemRole {
    /// Converts role to string for display
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemRole::Owner => "owner",
            SystemRole::Superuser => "superuser",
            SystemRole::FreeUser => "free_user",
            SystemRole::PaidUser => "paid_user",
            SystemRole::Guest => "guest",
        }
    }

    /// Whether the role grants platform administration
    pub fn is_admin(&self) -> bool {
        matches!(self, SystemRole::Owner | SystemRole::Superuser)
    }
}

/// User account
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Unique user ID
    pub id: Uuid,

    /// Email address, unique case-insensitively
    pub email: String,

    pub first_name: String,

    pub last_name: String,

    pub username: Option<String>,

    /// Administrative flag set by the superuser bootstrap
    pub is_superuser: bool,

    /// Inactive users cannot log in
    pub is_active: bool,

    /// Argon2id password hash
    #[serde(skip_serializing)]
    pub password_hash: String,

    pub role: SystemRole,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Public fields of a user, embedded in workspace payloads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub username: Option<String>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            username: user.username.clone(),
        }
    }
}

/// Input for creating a new user
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub email: String,

    /// Argon2id password hash (NOT plaintext password!)
    pub password_hash: String,

    pub first_name: String,

    pub last_name: String,

    pub username: Option<String>,

    pub role: SystemRole,

    pub is_superuser: bool,

    pub is_active: bool,
}

impl User {
    /// Inserts a new user
    ///
    /// # Errors
    ///
    /// Returns a database error carrying the `users_email_key` constraint when
    /// the email is already registered.
    pub async fn create(pool: &PgPool, data: CreateUser) -> Result<Self, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO auth.users
                (email, password_hash, first_name, last_name, username, role, is_superuser, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, email, first_name, last_name, username, is_superuser, is_active,
                      password_hash, role, created_at, updated_at
            "#,
        )
        .bind(data.email)
        .bind(data.password_hash)
        .bind(data.first_name)
        .bind(data.last_name)
        .bind(data.username)
        .bind(data.role)
        .bind(data.is_superuser)
        .bind(data.is_active)
        .fetch_one(pool)
        .await?;

        Ok(user)
    }

    /// Finds a user by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, first_name, last_name, username, is_superuser, is_active,
                   password_hash, role, created_at, updated_at
            FROM auth.users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Finds a user by email address (case-insensitive)
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, first_name, last_name, username, is_superuser, is_active,
                   password_hash, role, created_at, updated_at
            FROM auth.users
            WHERE LOWER(email) = LOWER($1)
            "#,
        )
        .bind(email)
        .fetch_optional(pool)
        .await
    }

    /// Checks whether an email is already registered
    pub async fn email_exists(pool: &PgPool, email: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM auth.users WHERE LOWER(email) = LOWER($1))")
            .bind(email)
            .fetch_one(pool)
            .await
    }

    /// Checks whether a user ID exists
    pub async fn exists(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM auth.users WHERE id = $1)")
            .bind(id)
            .fetch_one(pool)
            .await
    }

    /// Deletes a user; owned workspaces and memberships cascade
    ///
    /// Returns true if a row was deleted.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM auth.users WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
