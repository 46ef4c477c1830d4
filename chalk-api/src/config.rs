/// Configuration management for the API server
///
/// Settings are layered: built-in defaults, then an optional config file,
/// then environment variables. A `.env` file is loaded first if present.
///
/// # Sources
///
/// - `CHALK_CONFIG`: path of the config file without extension
///   (default: `config/chalk`, any format the `config` crate reads)
/// - `CHALK__<SECTION>__<KEY>`: overrides a single value, e.g.
///   `CHALK__DATABASE__URL` or `CHALK__API__PORT`
///
/// # Example
///
/// ```no_run
/// use chalk_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::load()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use chalk_shared::auth::AuthSettings;
use chalk_shared::db::pool::PoolSettings;
use chalk_shared::redis::RedisSettings;
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

const CONFIG_PATH_VAR: &str = "CHALK_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/chalk";
const ENV_PREFIX: &str = "CHALK";

/// Upper bound for token lifetimes, ten years
pub const MAX_TOKEN_TTL_SECS: i64 = 10 * 365 * 24 * 60 * 60;

/// Complete application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,

    /// PostgreSQL pool
    pub database: PoolSettings,

    /// Redis, used for verification codes
    pub redis: RedisSettings,

    pub auth: AuthConfig,

    pub storage: StorageConfig,

    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,

    /// Requests still running after this long are aborted (seconds)
    pub request_timeout_secs: u64,

    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout_secs: 30,
            cors_origins: vec!["*".to_string()],
        }
    }
}

/// Verification code and session lifetimes
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub code_ttl_secs: u64,

    pub access_token_ttl_secs: i64,

    pub refresh_token_ttl_secs: i64,

    /// How often sessions with an expired refresh token are purged
    pub purge_interval_secs: u64,

    /// Sender address of verification mails
    pub email_from_addr: String,

    /// Sender display name of verification mails
    pub email_from_name: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            code_ttl_secs: 600,
            access_token_ttl_secs: 900,
            refresh_token_ttl_secs: 2_592_000,
            purge_interval_secs: 3600,
            email_from_addr: "noreply@chalk.local".to_string(),
            email_from_name: "Chalk".to_string(),
        }
    }
}

impl AuthConfig {
    /// Lifetimes and sender identity for the auth services
    pub fn settings(&self) -> AuthSettings {
        AuthSettings {
            code_ttl: Duration::from_secs(self.code_ttl_secs),
            access_token_ttl: chrono::Duration::seconds(self.access_token_ttl_secs),
            refresh_token_ttl: chrono::Duration::seconds(self.refresh_token_ttl_secs),
            email_from_addr: self.email_from_addr.clone(),
            email_from_name: self.email_from_name.clone(),
        }
    }
}

/// Object storage for uploaded files
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the objects
    pub root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./data/objects"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directives; `RUST_LOG` wins if set
    pub filter: String,

    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "chalk_api=info,chalk_shared=info,tower_http=info".to_string(),
            format: LogFormat::Text,
        }
    }
}

impl Config {
    /// Loads configuration from the config file and the environment
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A value has the wrong type
    /// - `database.url` is not set
    pub fn load() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        let path = env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        let config: Config = config::Config::builder()
            .add_source(config::File::with_name(&path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("api.cors_origins")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Checks values the types alone do not constrain
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.database.url.is_empty() {
            anyhow::bail!("database.url is required (set CHALK__DATABASE__URL)");
        }
        for (name, ttl) in [
            ("access_token_ttl_secs", self.auth.access_token_ttl_secs),
            ("refresh_token_ttl_secs", self.auth.refresh_token_ttl_secs),
        ] {
            if !(1..=MAX_TOKEN_TTL_SECS).contains(&ttl) {
                anyhow::bail!("auth.{name} must be between 1 and {MAX_TOKEN_TTL_SECS}");
            }
        }
        if self.auth.code_ttl_secs == 0 {
            anyhow::bail!("auth.code_ttl_secs must be positive");
        }

        Ok(())
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.request_timeout_secs)
    }
}
