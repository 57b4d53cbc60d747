//! Dashboard configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `ADUANA_SUPABASE_URL` - Backend project base URL
//! - `ADUANA_SUPABASE_ANON_KEY` - Backend anon key
//!
//! ## Optional
//! - `ADUANA_HOST` - Bind address (default: 127.0.0.1)
//! - `ADUANA_PORT` - Listen port (default: 4000)
//! - `ADUANA_BASE_URL` - Public URL (default: http://localhost:4000)
//! - `ADUANA_LOCAL_STORE` - Path of the local state file
//!   (default: .aduana/local-store.json)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use aduana_identity::{ConfigError, SupabaseConfig};

/// Dashboard application configuration.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the dashboard
    pub base_url: String,
    /// Path of the JSON file backing the local store
    pub local_store_path: PathBuf,
    /// Backend connection settings
    pub supabase: SupabaseConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag
    pub sentry_environment: Option<String>,
}

impl DashboardConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = get_env_or_default("ADUANA_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("ADUANA_HOST".to_owned(), e.to_string()))?;
        let port = get_env_or_default("ADUANA_PORT", "4000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("ADUANA_PORT".to_owned(), e.to_string()))?;
        let base_url = get_env_or_default("ADUANA_BASE_URL", "http://localhost:4000");
        let local_store_path =
            PathBuf::from(get_env_or_default("ADUANA_LOCAL_STORE", ".aduana/local-store.json"));

        let supabase = SupabaseConfig::from_env()?;

        Ok(Self {
            host,
            port,
            base_url,
            local_store_path,
            supabase,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}
