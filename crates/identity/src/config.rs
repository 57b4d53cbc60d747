//! Backend connection configuration.
//!
//! # Environment Variables
//!
//! - `ADUANA_SUPABASE_URL` - Project base URL (e.g. `https://xyz.supabase.co`)
//! - `ADUANA_SUPABASE_ANON_KEY` - Publishable anon key for the project

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_KEY_LENGTH: usize = 20;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "insert",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Connection settings for the hosted backend.
///
/// Implements `Debug` manually to redact the key.
#[derive(Clone)]
pub struct SupabaseConfig {
    /// Project base URL, without a trailing slash.
    pub project_url: String,
    /// Anon key sent as `apikey` on every request.
    pub anon_key: SecretString,
}

impl std::fmt::Debug for SupabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseConfig")
            .field("project_url", &self.project_url)
            .field("anon_key", &"[REDACTED]")
            .finish()
    }
}

impl SupabaseConfig {
    /// Load from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is missing, the URL does not
    /// parse, or the key fails placeholder/length validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        let project_url = get_required_env("ADUANA_SUPABASE_URL")?;
        let parsed = url::Url::parse(&project_url).map_err(|e| {
            ConfigError::InvalidEnvVar("ADUANA_SUPABASE_URL".to_owned(), e.to_string())
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidEnvVar(
                "ADUANA_SUPABASE_URL".to_owned(),
                format!("unsupported scheme '{}'", parsed.scheme()),
            ));
        }

        let anon_key = get_validated_key("ADUANA_SUPABASE_ANON_KEY")?;

        Ok(Self {
            project_url: project_url.trim_end_matches('/').to_owned(),
            anon_key,
        })
    }

    /// Exposed key value for request headers.
    #[must_use]
    pub fn anon_key_value(&self) -> String {
        self.anon_key.expose_secret().to_owned()
    }
}

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_owned()))
}

/// Load a key from environment and reject obvious placeholders.
fn get_validated_key(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_key(&value, key)?;
    Ok(SecretString::from(value))
}

fn validate_key(value: &str, var_name: &str) -> Result<(), ConfigError> {
    if value.len() < MIN_KEY_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_owned(),
            format!("must be at least {MIN_KEY_LENGTH} characters (got {})", value.len()),
        ));
    }

    let lower = value.to_lowercase();
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_owned(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key_rejects_placeholder() {
        let result = validate_key("your-anon-key-here-1234567", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_key_rejects_short() {
        assert!(validate_key("short", "TEST_VAR").is_err());
    }

    #[test]
    fn test_validate_key_accepts_real_looking_key() {
        assert!(validate_key("eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9", "TEST_VAR").is_ok());
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = SupabaseConfig {
            project_url: "https://xyz.supabase.co".to_owned(),
            anon_key: SecretString::from("eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9"),
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("xyz.supabase.co"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("eyJhbGciOiJIUzI1NiI"));
    }
}
