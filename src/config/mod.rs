use std::env;

/// Configuration that cannot be loaded or would be unsafe to guess.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing or invalid environment variable: {0}")]
    Env(#[from] env::VarError),

    #[error("Unknown CREDENTIAL_SCHEME {0:?}, expected \"plaintext\" or \"argon2\"")]
    UnknownCredentialScheme(String),
}

/// How submitted credentials are checked against the admin table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialScheme {
    /// Legacy equality match on stored plaintext passwords.
    Plaintext,
    /// Argon2 verification against a `password_hash` column.
    Argon2,
}

impl CredentialScheme {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "plaintext" => Some(Self::Plaintext),
            "argon2" => Some(Self::Argon2),
            _ => None,
        }
    }

    /// Scheme for a `CREDENTIAL_SCHEME` value; unset means plaintext.
    fn from_setting(raw: Option<&str>) -> Result<Self, ConfigError> {
        match raw {
            None => Ok(Self::Plaintext),
            Some(raw) => Self::parse(raw)
                .ok_or_else(|| ConfigError::UnknownCredentialScheme(raw.to_string())),
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub host: String,
    pub port: u16,
    pub frontend_url: String,
    pub tables: TableNames,
    pub change_channel: String,
    pub image_base_url: String,
    pub credential_scheme: CredentialScheme,
}

/// Names of the remote tables the dashboard and login gate read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    pub admins: String,
    pub posts: String,
    pub users: String,
    /// Column the recent-posts query orders by.
    pub posts_order_field: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            admins: "admin".to_string(),
            posts: "posts".to_string(),
            users: "users".to_string(),
            posts_order_field: "published_at".to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = TableNames::default();
        Ok(Self {
            database_url: env::var("DATABASE_URL")?,
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
            host: env::var("BACKEND_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("BACKEND_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .unwrap_or(3000),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            tables: TableNames {
                admins: env::var("ADMIN_TABLE").unwrap_or(defaults.admins),
                posts: env::var("POSTS_TABLE").unwrap_or(defaults.posts),
                users: env::var("USERS_TABLE").unwrap_or(defaults.users),
                posts_order_field: env::var("POSTS_ORDER_FIELD")
                    .unwrap_or(defaults.posts_order_field),
            },
            change_channel: env::var("CHANGE_CHANNEL")
                .unwrap_or_else(|_| "table_changes".to_string()),
            image_base_url: env::var("IMAGE_BASE_URL").unwrap_or_default(),
            credential_scheme: CredentialScheme::from_setting(
                env::var("CREDENTIAL_SCHEME").ok().as_deref(),
            )?,
        })
    }
}
