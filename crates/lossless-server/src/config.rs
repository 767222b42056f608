use std::env;
use std::net::SocketAddr;

use lossless_db::DEFAULT_MAX_UPLOAD_BYTES;

/// Secrets shipped in sample configs; never acceptable in production.
const KNOWN_DEFAULT_SECRETS: &[&str] = &[
    "dev-secret-change-me-in-production",
    "change-me-to-a-secure-random-string",
];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("JWT_SECRET must be set to a secure value in production")]
    InsecureJwtSecret,
    #[error("invalid LISTEN_ADDR: {0}")]
    ListenAddr(String),
}

/// Process-level settings read from the environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub jwt_secret: String,
    pub production: bool,
    pub listen_addr: SocketAddr,
    /// Allowed origins for the JSON API; empty means same-origin only
    pub cors_origins: Vec<String>,
    pub max_upload_bytes: usize,
    /// Rate-limit the public auth routes per client IP
    pub auth_rate_limit: bool,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let jwt_secret = env::var("JWT_SECRET")
            .unwrap_or_else(|_| KNOWN_DEFAULT_SECRETS[0].to_string());
        let production = env::var("LOSSLESS_ENV").unwrap_or_default() == "production";

        if KNOWN_DEFAULT_SECRETS.contains(&jwt_secret.as_str()) {
            tracing::error!(
                "JWT_SECRET is set to a known default value! \
                 Set JWT_SECRET to a strong random string (>= 32 chars) in production."
            );
            if production {
                return Err(ConfigError::InsecureJwtSecret);
            }
        }

        let listen = env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
        let listen_addr = listen
            .parse()
            .map_err(|_| ConfigError::ListenAddr(listen.clone()))?;

        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();

        let max_upload_bytes = env::var("MAX_UPLOAD_BYTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);

        let auth_rate_limit = env::var("AUTH_RATE_LIMIT")
            .map(|v| !matches!(v.to_lowercase().as_str(), "0" | "false" | "off"))
            .unwrap_or(true);

        Ok(Self {
            jwt_secret,
            production,
            listen_addr,
            cors_origins,
            max_upload_bytes,
            auth_rate_limit,
        })
    }

    /// Settings for in-process tests: no rate limiting, permissive defaults.
    pub fn for_tests(jwt_secret: &str) -> Self {
        Self {
            jwt_secret: jwt_secret.to_string(),
            production: false,
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            cors_origins: vec!["http://localhost:3000".to_string()],
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            auth_rate_limit: false,
        }
    }
}
