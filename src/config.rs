use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub jwt: JwtConfig,
    #[serde(default)]
    pub share: ShareConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

/// Owner sessions are issued elsewhere; we only verify them.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    #[serde(default = "default_jwt_secret")]
    pub secret: String,
    #[serde(default)]
    pub previous_secrets: Vec<String>,
    #[serde(default)]
    pub cookie_secure: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShareConfig {
    #[serde(default = "default_token_length")]
    pub token_length: usize,
    #[serde(default = "default_settings_cache_ttl")]
    pub settings_cache_ttl_secs: u64,
    /// Upper bound on cached folder settings entries
    #[serde(default = "default_settings_cache_capacity")]
    pub settings_cache_capacity: usize,
    /// How many of the newest files the fuzzy lookup scans
    #[serde(default = "default_fuzzy_window")]
    pub fuzzy_window: i64,
    #[serde(default = "default_stats_queue_size")]
    pub stats_queue_size: usize,
    #[serde(default = "default_authenticated_view_base")]
    pub authenticated_view_base: String,
}

// Default values
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    1310
}

fn default_db_path() -> String {
    "data/galleria.db".to_string()
}

fn default_jwt_secret() -> String {
    "change-me-to-the-session-issuer-secret".to_string()
}

fn default_token_length() -> usize {
    12
}

fn default_settings_cache_ttl() -> u64 {
    300 // 5 minutes
}

fn default_settings_cache_capacity() -> usize {
    10_000
}

fn default_fuzzy_window() -> i64 {
    crate::services::file::DEFAULT_FUZZY_WINDOW
}

fn default_stats_queue_size() -> usize {
    1024
}

fn default_authenticated_view_base() -> String {
    "/app/galleries".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: default_jwt_secret(),
            previous_secrets: Vec::new(),
            cookie_secure: false,
        }
    }
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            token_length: default_token_length(),
            settings_cache_ttl_secs: default_settings_cache_ttl(),
            settings_cache_capacity: default_settings_cache_capacity(),
            fuzzy_window: default_fuzzy_window(),
            stats_queue_size: default_stats_queue_size(),
            authenticated_view_base: default_authenticated_view_base(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::load_from_file()?;
        config.apply_env_overrides();
        config.normalize();
        config.ensure_directories()?;
        if config.jwt.secret == default_jwt_secret() {
            tracing::warn!("jwt.secret is the built-in default; owner endpoints will reject real sessions");
        }
        Ok(config)
    }

    /// Load configuration from galleria.toml or config.toml
    fn load_from_file() -> anyhow::Result<Self> {
        let config_paths = [
            "galleria.toml",
            "config.toml",
            "data/galleria.toml",
            "data/config.toml",
        ];

        for path in config_paths {
            if Path::new(path).exists() {
                let content = fs::read_to_string(path)?;
                let config: Config = toml::from_str(&content)?;
                tracing::info!("Loaded configuration from {}", path);
                return Ok(config);
            }
        }

        tracing::info!("No configuration file found, using defaults");
        Ok(Config::default())
    }

    /// Apply environment variable overrides
    /// Format: GA_CONF_<SECTION>_<KEY>
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("GA_CONF_SERVER_HOST") {
            self.server.host = val;
        }
        if let Ok(val) = env::var("GA_CONF_SERVER_PORT") {
            if let Ok(port) = val.parse() {
                self.server.port = port;
            }
        }

        if let Ok(val) = env::var("GA_CONF_DATABASE_PATH") {
            self.database.path = val;
        }

        if let Ok(val) = env::var("GA_CONF_JWT_SECRET") {
            self.jwt.secret = val;
        }
        if let Ok(val) = env::var("GA_CONF_JWT_PREVIOUS_SECRETS") {
            self.jwt.previous_secrets = val
                .split(',')
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string())
                .collect();
        }
        if let Ok(val) = env::var("GA_CONF_JWT_COOKIE_SECURE") {
            if let Ok(v) = val.parse() {
                self.jwt.cookie_secure = v;
            }
        }

        if let Ok(val) = env::var("GA_CONF_SHARE_TOKEN_LENGTH") {
            if let Ok(len) = val.parse() {
                self.share.token_length = len;
            }
        }
        if let Ok(val) = env::var("GA_CONF_SHARE_SETTINGS_CACHE_TTL") {
            if let Ok(secs) = val.parse() {
                self.share.settings_cache_ttl_secs = secs;
            }
        }
        if let Ok(val) = env::var("GA_CONF_SHARE_SETTINGS_CACHE_CAPACITY") {
            if let Ok(capacity) = val.parse() {
                self.share.settings_cache_capacity = capacity;
            }
        }
        if let Ok(val) = env::var("GA_CONF_SHARE_FUZZY_WINDOW") {
            if let Ok(window) = val.parse() {
                self.share.fuzzy_window = window;
            }
        }
        if let Ok(val) = env::var("GA_CONF_SHARE_STATS_QUEUE_SIZE") {
            if let Ok(size) = val.parse() {
                self.share.stats_queue_size = size;
            }
        }
        if let Ok(val) = env::var("GA_CONF_SHARE_AUTHENTICATED_VIEW_BASE") {
            if !val.trim().is_empty() {
                self.share.authenticated_view_base = val;
            }
        }
    }

    /// Clamp values that would break token generation or lookups
    fn normalize(&mut self) {
        // Below 8 characters the token space gets small enough to guess.
        self.share.token_length = self.share.token_length.clamp(8, 64);
        self.share.fuzzy_window = self.share.fuzzy_window.max(1);
        self.share.stats_queue_size = self.share.stats_queue_size.max(1);
        self.share.settings_cache_capacity = self.share.settings_cache_capacity.max(1);
        let base = self.share.authenticated_view_base.trim_end_matches('/');
        self.share.authenticated_view_base = base.to_string();
    }

    /// Ensure required directories exist
    fn ensure_directories(&self) -> anyhow::Result<()> {
        if let Some(parent) = Path::new(&self.database.path).parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}
