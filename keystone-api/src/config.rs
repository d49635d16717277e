/// Configuration management for the API server
///
/// Settings come from the process environment, optionally seeded from dotenv
/// files. `ENVIRONMENT` (default `dev`) selects `env/.env.{ENVIRONMENT}`,
/// then a plain `.env` is read. Neither file overrides variables that are
/// already set.
///
/// # Environment Variables
///
/// - `DEBUG`: Development mode, human-readable logs, no HSTS (default: false)
/// - `DB_HOST`, `DB_PORT`, `DB_NAME`, `DB_USER`, `DB_PASSWORD`: PostgreSQL
/// - `DB_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `SECRET`: Application secret (required)
/// - `JWT_SECRET_KEY`: Token signing key (required)
/// - `COOKIE_SECURE`: Emit `Secure` on auth cookies (default: true)
/// - `CREATE_SUPERUSER` and `SUPERUSER_*`: Superuser bootstrap
/// - `CACHE_ENABLED`, `REDIS_HOST`, `REDIS_PORT`, `REDIS_DB`, `CACHE_TTL`: Cache
/// - `API_HOST`, `API_PORT`, `CORS_ORIGINS`: HTTP server
///
/// # Example
///
/// ```no_run
/// use keystone_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use keystone_shared::accounts::SuperuserSettings;
use keystone_shared::auth::cookies::CookieSettings;
use keystone_shared::cache::CacheConfig;
use keystone_shared::db::pool::DatabaseConfig;
use sqlx::postgres::PgConnectOptions;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("Invalid value {value:?} for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("Failed to read environment: {0}")]
    Source(#[from] config::ConfigError),

    #[error("Failed to load {file}: {source}")]
    EnvFile { file: String, source: dotenvy::Error },
}

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Development mode
    pub debug: bool,

    /// Name of the selected environment (`dev`, `prod`, ...)
    pub environment: String,

    pub api: ApiConfig,
    pub database: DatabaseSettings,
    pub auth: AuthSettings,
    pub cache: CacheSettings,

    /// Set when `CREATE_SUPERUSER` is on
    pub superuser: Option<SuperuserSettings>,
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Allowed CORS origins; `*` allows any origin
    pub cors_origins: Vec<String>,
}

/// PostgreSQL connection settings
#[derive(Clone)]
pub struct DatabaseSettings {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
    pub max_connections: u32,
}

impl std::fmt::Debug for DatabaseSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

/// Secrets and cookie behaviour
#[derive(Clone)]
pub struct AuthSettings {
    /// Application secret
    pub secret: String,

    /// JWT signing key
    ///
    /// Should be at least 32 bytes. Generate with: `openssl rand -hex 32`
    pub jwt_secret: String,

    pub cookie_secure: bool,
}

impl std::fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSettings")
            .field("secret", &"<redacted>")
            .field("jwt_secret", &"<redacted>")
            .field("cookie_secure", &self.cookie_secure)
            .finish()
    }
}

/// Redis cache settings
#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub db: i64,
    pub ttl_secs: u64,
}

/// Parses the boolean spellings accepted in dotenv files
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Every variable the server reads
const VARIABLES: &[&str] = &[
    "ENVIRONMENT",
    "DEBUG",
    "DB_HOST",
    "DB_PORT",
    "DB_NAME",
    "DB_USER",
    "DB_PASSWORD",
    "DB_MAX_CONNECTIONS",
    "CREATE_SUPERUSER",
    "SUPERUSER_EMAIL",
    "SUPERUSER_PASSWORD",
    "SUPERUSER_FIRSTNAME",
    "SUPERUSER_LASTNAME",
    "SUPERUSER_USERNAME",
    "SECRET",
    "JWT_SECRET_KEY",
    "COOKIE_SECURE",
    "REDIS_HOST",
    "REDIS_PORT",
    "REDIS_DB",
    "CACHE_TTL",
    "CACHE_ENABLED",
    "API_HOST",
    "API_PORT",
    "CORS_ORIGINS",
];

/// Typed access to the flattened environment
struct Vars(HashMap<String, String>);

impl Vars {
    fn load(source: HashMap<String, String>) -> Result<Self, ConfigError> {
        let vars = config::Config::builder()
            .add_source(config::Environment::default().source(Some(source)))
            .build()?
            .try_deserialize::<HashMap<String, String>>()?;

        Ok(Self(vars))
    }

    fn get(&self, var: &'static str) -> Option<&str> {
        self.0
            .get(&var.to_ascii_lowercase())
            .or_else(|| self.0.get(var))
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn string_or(&self, var: &'static str, default: &str) -> String {
        self.get(var).unwrap_or(default).to_string()
    }

    fn required(&self, var: &'static str) -> Result<String, ConfigError> {
        self.get(var)
            .map(str::to_string)
            .ok_or(ConfigError::Missing(var))
    }

    fn parse_or<T>(&self, var: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(var) {
            None => Ok(default),
            Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
                var,
                value: value.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    fn bool_or(&self, var: &'static str, default: bool) -> Result<bool, ConfigError> {
        match self.get(var) {
            None => Ok(default),
            Some(value) => parse_bool(value).ok_or_else(|| ConfigError::Invalid {
                var,
                value: value.to_string(),
                reason: "expected true/false, 1/0, yes/no or on/off".to_string(),
            }),
        }
    }
}

/// Loads one dotenv file without overriding set variables
///
/// Returns `Ok(false)` when the file does not exist; unreadable or malformed
/// files are errors.
fn load_env_file(path: &Path) -> Result<bool, ConfigError> {
    match dotenvy::from_path(path) {
        Ok(()) => Ok(true),
        Err(e) if e.not_found() => Ok(false),
        Err(source) => Err(ConfigError::EnvFile {
            file: path.display().to_string(),
            source,
        }),
    }
}

/// Loads `env/.env.{environment}` then `.env`
fn load_dotenv_files(environment: &str) -> Result<(), ConfigError> {
    load_env_file(&Path::new("env").join(format!(".env.{}", environment)))?;
    load_env_file(Path::new(".env"))?;
    Ok(())
}

impl Config {
    /// Loads configuration from dotenv files and the process environment
    ///
    /// # Errors
    ///
    /// Returns an error naming the variable when a required variable is
    /// missing or a value cannot be parsed, or naming the file when a dotenv
    /// file cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        load_dotenv_files(&environment)?;

        let vars = std::env::vars()
            .filter(|(key, _)| VARIABLES.contains(&key.as_str()))
            .collect();
        Self::from_map(vars)
    }

    /// Builds configuration from an explicit variable map instead of the
    /// process environment
    pub fn from_map(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::from_vars(Vars::load(vars)?)
    }

    fn from_vars(vars: Vars) -> Result<Self, ConfigError> {
        let jwt_secret = vars.required("JWT_SECRET_KEY")?;

        let superuser = if vars.bool_or("CREATE_SUPERUSER", false)? {
            Some(SuperuserSettings {
                email: vars.required("SUPERUSER_EMAIL")?,
                password: vars.required("SUPERUSER_PASSWORD")?,
                first_name: vars.required("SUPERUSER_FIRSTNAME")?,
                last_name: vars.required("SUPERUSER_LASTNAME")?,
                username: Some(vars.required("SUPERUSER_USERNAME")?),
            })
        } else {
            None
        };

        let cors_origins = vars
            .string_or("CORS_ORIGINS", "*")
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        Ok(Self {
            debug: vars.bool_or("DEBUG", false)?,
            environment: vars.string_or("ENVIRONMENT", "dev"),
            api: ApiConfig {
                host: vars.string_or("API_HOST", "127.0.0.1"),
                port: vars.parse_or("API_PORT", 8000)?,
                cors_origins,
            },
            database: DatabaseSettings {
                host: vars.required("DB_HOST")?,
                port: vars.parse_or("DB_PORT", 5432)?,
                name: vars.required("DB_NAME")?,
                user: vars.required("DB_USER")?,
                password: vars.required("DB_PASSWORD")?,
                max_connections: vars.parse_or("DB_MAX_CONNECTIONS", 10)?,
            },
            auth: AuthSettings {
                secret: vars.required("SECRET")?,
                jwt_secret,
                cookie_secure: vars.bool_or("COOKIE_SECURE", true)?,
            },
            cache: CacheSettings {
                enabled: vars.bool_or("CACHE_ENABLED", true)?,
                host: vars.string_or("REDIS_HOST", "localhost"),
                port: vars.parse_or("REDIS_PORT", 6379)?,
                db: vars.parse_or("REDIS_DB", 0)?,
                ttl_secs: vars.parse_or("CACHE_TTL", 86400)?,
            },
            superuser,
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    /// Pool settings for the shared database layer
    ///
    /// Connection parameters are passed as-is, so names and credentials need
    /// no URL escaping.
    pub fn database_config(&self) -> DatabaseConfig {
        let db = &self.database;
        DatabaseConfig {
            connect_options: PgConnectOptions::new_without_pgpass()
                .host(&db.host)
                .port(db.port)
                .username(&db.user)
                .password(&db.password)
                .database(&db.name),
            max_connections: db.max_connections,
            ..Default::default()
        }
    }

    /// Redis settings, or `None` when the cache is switched off
    pub fn cache_config(&self) -> Option<CacheConfig> {
        if !self.cache.enabled {
            return None;
        }

        Some(CacheConfig {
            url: CacheConfig::redis_url(&self.cache.host, self.cache.port, self.cache.db),
            ttl_secs: self.cache.ttl_secs,
            ..Default::default()
        })
    }

    pub fn cookie_settings(&self) -> CookieSettings {
        CookieSettings {
            secure: self.auth.cookie_secure,
        }
    }

    pub fn jwt_secret(&self) -> &str {
        &self.auth.jwt_secret
    }

    /// JWT keys under 32 bytes are accepted but should not reach production
    pub fn has_weak_jwt_secret(&self) -> bool {
        self.auth.jwt_secret.len() < 32
    }

    /// Whether CORS should allow any origin
    pub fn cors_allows_any(&self) -> bool {
        self.api.cors_origins.iter().any(|origin| origin == "*")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_vars() -> HashMap<String, String> {
        [
            ("DB_HOST", "db.internal"),
            ("DB_NAME", "keystone"),
            ("DB_USER", "keystone"),
            ("DB_PASSWORD", "p@ss:word/1"),
            ("SECRET", "app-secret"),
            ("JWT_SECRET_KEY", "test-secret-key-at-least-32-bytes-long"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    fn with(mut vars: HashMap<String, String>, key: &str, value: &str) -> HashMap<String, String> {
        vars.insert(key.to_string(), value.to_string());
        vars
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_map(base_vars()).unwrap();

        assert!(!config.debug);
        assert_eq!(config.bind_address(), "127.0.0.1:8000");
        assert_eq!(config.api.cors_origins, vec!["*"]);
        assert!(config.cors_allows_any());
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.database.max_connections, 10);
        assert!(config.auth.cookie_secure);
        assert!(config.cache.enabled);
        assert_eq!(config.cache.ttl_secs, 86400);
        assert!(config.superuser.is_none());
        assert!(!config.has_weak_jwt_secret());
    }

    #[test]
    fn test_short_jwt_secret_is_weak_but_accepted() {
        let config = Config::from_map(with(base_vars(), "JWT_SECRET_KEY", "short")).unwrap();
        assert!(config.has_weak_jwt_secret());

        let err = Config::from_map(with(base_vars(), "JWT_SECRET_KEY", "  ")).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("JWT_SECRET_KEY")));
    }

    #[test]
    fn test_database_config_keeps_values_verbatim() {
        let vars = with(base_vars(), "DB_NAME", "app?sslmode=disable#x");
        let vars = with(vars, "DB_USER", "ops@corp");
        let vars = with(vars, "DB_PORT", "6543");
        let database = Config::from_map(vars).unwrap().database_config();

        let options = &database.connect_options;
        assert_eq!(options.get_host(), "db.internal");
        assert_eq!(options.get_port(), 6543);
        assert_eq!(options.get_username(), "ops@corp");
        assert_eq!(options.get_database(), Some("app?sslmode=disable#x"));
        assert_eq!(database.max_connections, 10);
    }

    #[test]
    fn test_missing_required_variable_is_named() {
        let mut vars = base_vars();
        vars.remove("DB_HOST");

        let err = Config::from_map(vars).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DB_HOST")));
        assert_eq!(err.to_string(), "DB_HOST environment variable is required");
    }

    #[test]
    fn test_invalid_port_is_reported() {
        let err = Config::from_map(with(base_vars(), "API_PORT", "eighty")).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "API_PORT", .. }));
    }

    #[test]
    fn test_parse_bool_spellings() {
        for value in ["true", "True", "1", "yes", "ON"] {
            assert_eq!(parse_bool(value), Some(true), "{}", value);
        }
        for value in ["false", "False", "0", "no", "off"] {
            assert_eq!(parse_bool(value), Some(false), "{}", value);
        }
        assert_eq!(parse_bool("maybe"), None);

        let err = Config::from_map(with(base_vars(), "DEBUG", "maybe")).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "DEBUG", .. }));
    }

    #[test]
    fn test_superuser_requires_credentials() {
        let vars = with(base_vars(), "CREATE_SUPERUSER", "True");
        let err = Config::from_map(vars.clone()).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("SUPERUSER_EMAIL")));

        let vars = with(vars, "SUPERUSER_EMAIL", "root@example.com");
        let vars = with(vars, "SUPERUSER_PASSWORD", "R00t!Passw0rd");
        let vars = with(vars, "SUPERUSER_FIRSTNAME", "Root");
        let vars = with(vars, "SUPERUSER_LASTNAME", "Admin");
        let err = Config::from_map(vars.clone()).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("SUPERUSER_USERNAME")));

        let vars = with(vars, "SUPERUSER_USERNAME", "root");
        let config = Config::from_map(vars).unwrap();

        let superuser = config.superuser.unwrap();
        assert_eq!(superuser.email, "root@example.com");
        assert_eq!(superuser.username.as_deref(), Some("root"));
    }

    #[test]
    fn test_cache_config() {
        let vars = with(base_vars(), "REDIS_HOST", "cache");
        let vars = with(vars, "REDIS_DB", "2");
        let vars = with(vars, "CACHE_TTL", "60");
        let cache = Config::from_map(vars.clone()).unwrap().cache_config().unwrap();
        assert_eq!(cache.url, "redis://cache:6379/2");
        assert_eq!(cache.ttl_secs, 60);

        let vars = with(vars, "CACHE_ENABLED", "off");
        assert!(Config::from_map(vars).unwrap().cache_config().is_none());
    }

    #[test]
    fn test_explicit_cors_origins() {
        let vars = with(
            base_vars(),
            "CORS_ORIGINS",
            "https://app.example.com, https://admin.example.com",
        );
        let config = Config::from_map(vars).unwrap();
        assert_eq!(
            config.api.cors_origins,
            vec!["https://app.example.com", "https://admin.example.com"]
        );
        assert!(!config.cors_allows_any());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = Config::from_map(base_vars()).unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("p@ss"));
        assert!(!rendered.contains("test-secret-key"));
    }

    #[test]
    fn test_missing_env_file_is_skipped() {
        let path = std::env::temp_dir().join(format!("keystone-missing-{}.env", std::process::id()));
        assert!(!load_env_file(&path).unwrap());
    }

    #[test]
    fn test_malformed_env_file_is_an_error() {
        let path = std::env::temp_dir().join(format!("keystone-broken-{}.env", std::process::id()));
        std::fs::write(&path, "KEYSTONE_TEST_BROKEN='unterminated\n").unwrap();

        let err = load_env_file(&path).unwrap_err();
        std::fs::remove_file(&path).ok();

        assert!(matches!(err, ConfigError::EnvFile { .. }));
        assert!(err.to_string().contains("keystone-broken-"));
    }
}
