/// Account creation, credential checks and the superuser bootstrap
///
/// # Example
///
/// ```no_run
/// use keystone_shared::accounts::{create_account, AccountKind, NewAccount};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let user = create_account(
///     &pool,
///     NewAccount {
///         email: "Ada@Example.com".to_string(),
///         password: "MyP@ssw0rd!".to_string(),
///         first_name: "Ada".to_string(),
///         last_name: "Lovelace".to_string(),
///         username: None,
///     },
///     AccountKind::Registered,
/// )
/// .await?;
/// assert_eq!(user.email, "ada@example.com");
/// # Ok(())
/// # }
/// ```

use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::password::{hash_password_async, verify_password_async, PasswordError};
use crate::models::user::{CreateUser, SystemRole, User};

/// Errors from account operations
#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("Email {0} is already registered")]
    EmailTaken(String),

    /// Unknown email, wrong password or inactive account
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// How an account comes into existence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountKind {
    /// Self-service registration
    Registered,

    /// Created at startup from configuration
    Superuser,
}

impl AccountKind {
    pub fn role(&self) -> SystemRole {
        match self {
            AccountKind::Registered => SystemRole::FreeUser,
            AccountKind::Superuser => SystemRole::Superuser,
        }
    }

    pub fn is_superuser(&self) -> bool {
        matches!(self, AccountKind::Superuser)
    }
}

/// Plaintext account details
#[derive(Clone)]
pub struct NewAccount {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub username: Option<String>,
}

impl std::fmt::Debug for NewAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewAccount")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("username", &self.username)
            .finish()
    }
}

/// Trims and lowercases an email address
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn is_email_conflict(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.constraint() == Some("users_email_key"))
}

/// Creates an active account
///
/// # Errors
///
/// - `AccountError::EmailTaken` if the email is registered (checked up front
///   and again through the unique index)
/// - `AccountError::Password` if hashing fails
pub async fn create_account(
    pool: &PgPool,
    account: NewAccount,
    kind: AccountKind,
) -> Result<User, AccountError> {
    let email = normalize_email(&account.email);

    if User::email_exists(pool, &email).await? {
        return Err(AccountError::EmailTaken(email));
    }

    let password_hash = hash_password_async(account.password).await?;

    let user = User::create(
        pool,
        CreateUser {
            email: email.clone(),
            password_hash,
            first_name: account.first_name.trim().to_string(),
            last_name: account.last_name.trim().to_string(),
            username: account
                .username
                .map(|u| u.trim().to_string())
                .filter(|u| !u.is_empty()),
            role: kind.role(),
            is_superuser: kind.is_superuser(),
            is_active: true,
        },
    )
    .await
    .map_err(|e| {
        if is_email_conflict(&e) {
            AccountError::EmailTaken(email.clone())
        } else {
            AccountError::Database(e)
        }
    })?;

    tracing::info!(user_id = %user.id, role = user.role.as_str(), "Account created");
    Ok(user)
}

/// Checks an email/password pair
///
/// # Errors
///
/// Returns `AccountError::InvalidCredentials` for an unknown email, a wrong
/// password or an inactive account, without saying which.
pub async fn verify_credentials(pool: &PgPool, email: &str, password: &str) -> Result<User, AccountError> {
    let user = User::find_by_email(pool, &normalize_email(email))
        .await?
        .ok_or(AccountError::InvalidCredentials)?;

    let valid = verify_password_async(password.to_string(), user.password_hash.clone()).await?;
    if !valid || !user.is_active {
        tracing::debug!(user_id = %user.id, active = user.is_active, "Credential check failed");
        return Err(AccountError::InvalidCredentials);
    }

    Ok(user)
}

/// Superuser credentials from configuration
#[derive(Clone)]
pub struct SuperuserSettings {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub username: Option<String>,
}

impl std::fmt::Debug for SuperuserSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuperuserSettings")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("username", &self.username)
            .finish()
    }
}

impl From<&SuperuserSettings> for NewAccount {
    fn from(settings: &SuperuserSettings) -> Self {
        Self {
            email: settings.email.clone(),
            password: settings.password.clone(),
            first_name: settings.first_name.clone(),
            last_name: settings.last_name.clone(),
            username: settings.username.clone(),
        }
    }
}

/// What the startup bootstrap did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// `CREATE_SUPERUSER` is off
    Disabled,
    Created(Uuid),
    AlreadyExists,
    /// Logged at `error`; startup continues
    Failed,
}

/// Creates the configured superuser if it does not exist yet
///
/// Never fails: problems are logged and reported as `Failed`.
pub async fn bootstrap_superuser(pool: &PgPool, settings: Option<&SuperuserSettings>) -> BootstrapOutcome {
    let Some(settings) = settings else {
        tracing::debug!("Superuser bootstrap disabled");
        return BootstrapOutcome::Disabled;
    };

    match create_account(pool, settings.into(), AccountKind::Superuser).await {
        Ok(user) => {
            tracing::info!(user_id = %user.id, email = %user.email, "Superuser created");
            BootstrapOutcome::Created(user.id)
        }
        Err(AccountError::EmailTaken(email)) => {
            tracing::info!(email = %email, "Superuser already exists, skipping creation");
            BootstrapOutcome::AlreadyExists
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to create superuser");
            BootstrapOutcome::Failed
        }
    }
}
