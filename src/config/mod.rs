use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Route names that skip authorization unless `SECURITY_BYPASS_METHODS` overrides them.
pub const DEFAULT_BYPASS_METHODS: &[&str] = &[
    "GET /",
    "GET /health",
    "POST /sign/up",
    "POST /sign/in",
    "POST /sign/refresh",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// No URL means the in-memory store.
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// No root means the in-memory media store.
    pub media_root: Option<String>,
    pub public_base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    pub call_timeout_ms: u64,
    pub max_request_size_bytes: usize,
}

impl ApiConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub auth_token_hours: i64,
    pub refresh_token_days: i64,
    pub bypass_methods: Vec<String>,
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = Some(v).filter(|url| !url.is_empty());
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        // Storage overrides
        if let Ok(v) = env::var("MEDIA_ROOT") {
            self.storage.media_root = Some(v).filter(|root| !root.is_empty());
        }
        if let Ok(v) = env::var("MEDIA_PUBLIC_BASE_URL") {
            self.storage.public_base_url = v;
        }

        // API overrides
        if let Ok(v) = env::var("PORT") {
            self.api.port = v.parse().unwrap_or(self.api.port);
        }
        if let Ok(v) = env::var("API_CALL_TIMEOUT_MS") {
            self.api.call_timeout_ms = v.parse().unwrap_or(self.api.call_timeout_ms);
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }

        // Security overrides
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("JWT_ISSUER") {
            self.security.jwt_issuer = v;
        }
        if let Ok(v) = env::var("SECURITY_AUTH_TOKEN_HOURS") {
            self.security.auth_token_hours = v.parse().unwrap_or(self.security.auth_token_hours);
        }
        if let Ok(v) = env::var("SECURITY_REFRESH_TOKEN_DAYS") {
            self.security.refresh_token_days = v.parse().unwrap_or(self.security.refresh_token_days);
        }
        if let Ok(v) = env::var("SECURITY_BYPASS_METHODS") {
            self.security.bypass_methods = split_list(&v);
        }
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = split_list(&v);
        }

        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                connection_timeout: 30,
            },
            storage: StorageConfig {
                media_root: None,
                public_base_url: "http://localhost:8080/media".to_string(),
            },
            api: ApiConfig {
                port: 8080,
                call_timeout_ms: 30_000,
                max_request_size_bytes: 10 * 1024 * 1024, // 10MB
            },
            security: SecurityConfig {
                jwt_secret: "ohmnyom-dev-secret".to_string(),
                jwt_issuer: "ohmnyom".to_string(),
                auth_token_hours: 24,
                refresh_token_days: 30,
                bypass_methods: default_bypass_methods(),
                enable_cors: true,
                cors_origins: vec!["http://localhost:3000".to_string()],
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                url: None,
                max_connections: 20,
                connection_timeout: 10,
            },
            storage: StorageConfig {
                media_root: None,
                public_base_url: "https://staging.ohmnyom.app/media".to_string(),
            },
            api: ApiConfig {
                port: 8080,
                call_timeout_ms: 10_000,
                max_request_size_bytes: 5 * 1024 * 1024, // 5MB
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_issuer: "ohmnyom".to_string(),
                auth_token_hours: 24,
                refresh_token_days: 30,
                bypass_methods: default_bypass_methods(),
                enable_cors: true,
                cors_origins: vec!["https://staging.ohmnyom.app".to_string()],
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                url: None,
                max_connections: 50,
                connection_timeout: 5,
            },
            storage: StorageConfig {
                media_root: None,
                public_base_url: "https://ohmnyom.app/media".to_string(),
            },
            api: ApiConfig {
                port: 8080,
                call_timeout_ms: 5_000,
                max_request_size_bytes: 2 * 1024 * 1024, // 2MB
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_issuer: "ohmnyom".to_string(),
                auth_token_hours: 24,
                refresh_token_days: 30,
                bypass_methods: default_bypass_methods(),
                enable_cors: true,
                cors_origins: vec!["https://ohmnyom.app".to_string()],
            },
        }
    }
}

fn default_bypass_methods() -> Vec<String> {
    DEFAULT_BYPASS_METHODS.iter().map(|m| m.to_string()).collect()
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}
