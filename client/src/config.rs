//! Client configuration module.
//!
//! Parses configuration from environment variables for the Guuber client.
//!
//! # Environment Variables
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `GUUBER_FIREBASE_API_KEY` | Yes | - | Web API key of the Firebase project |
//! | `GUUBER_FIREBASE_PROJECT_ID` | Yes | - | Firebase project ID (Firestore database owner) |
//! | `GUUBER_AUTH_URL` | No | `https://identitytoolkit.googleapis.com` | Identity Toolkit base URL |
//! | `GUUBER_FIRESTORE_URL` | No | `https://firestore.googleapis.com` | Firestore base URL |
//! | `GUUBER_REQUEST_TIMEOUT_SECS` | No | 10 | Per-request timeout in seconds |
//! | `GUUBER_LOG_JSON` | No | false | Emit logs as JSON |

use std::env;
use std::time::Duration;

use thiserror::Error;

/// Default Identity Toolkit endpoint.
pub const DEFAULT_AUTH_URL: &str = "https://identitytoolkit.googleapis.com";

/// Default Firestore endpoint.
pub const DEFAULT_FIRESTORE_URL: &str = "https://firestore.googleapis.com";

/// Default request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Errors that can occur when parsing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    /// Environment variable has invalid format.
    #[error("invalid format for {var}: {message}")]
    InvalidFormat { var: String, message: String },
}

/// Client configuration parsed from environment variables.
#[derive(Clone)]
pub struct Config {
    /// Firebase Web API key, sent as the `key` query parameter.
    pub api_key: String,

    /// Firebase project ID.
    pub project_id: String,

    /// Identity Toolkit base URL, without trailing slash.
    pub auth_url: String,

    /// Firestore base URL, without trailing slash.
    pub firestore_url: String,

    /// Timeout applied to every HTTP request.
    pub request_timeout: Duration,

    /// When true, logs are written as JSON lines.
    pub log_json: bool,
}

impl Config {
    /// Parse configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - `GUUBER_FIREBASE_API_KEY` or `GUUBER_FIREBASE_PROJECT_ID` is missing or empty
    /// - `GUUBER_REQUEST_TIMEOUT_SECS` is not a positive integer
    /// - `GUUBER_LOG_JSON` is not a boolean
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = required_var("GUUBER_FIREBASE_API_KEY")?;
        let project_id = required_var("GUUBER_FIREBASE_PROJECT_ID")?;

        let auth_url = url_var("GUUBER_AUTH_URL", DEFAULT_AUTH_URL);
        let firestore_url = url_var("GUUBER_FIRESTORE_URL", DEFAULT_FIRESTORE_URL);

        let request_timeout = match env::var("GUUBER_REQUEST_TIMEOUT_SECS") {
            Ok(value) => {
                let secs: u64 = value.trim().parse().map_err(|e| ConfigError::InvalidFormat {
                    var: "GUUBER_REQUEST_TIMEOUT_SECS".to_string(),
                    message: format!("{e}"),
                })?;
                if secs == 0 {
                    return Err(ConfigError::InvalidFormat {
                        var: "GUUBER_REQUEST_TIMEOUT_SECS".to_string(),
                        message: "must be greater than zero".to_string(),
                    });
                }
                Duration::from_secs(secs)
            }
            Err(_) => Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        };

        let log_json = parse_bool_env("GUUBER_LOG_JSON")?;

        Ok(Self {
            api_key,
            project_id,
            auth_url,
            firestore_url,
            request_timeout,
            log_json,
        })
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &"<redacted>")
            .field("project_id", &self.project_id)
            .field("auth_url", &self.auth_url)
            .field("firestore_url", &self.firestore_url)
            .field("request_timeout", &self.request_timeout)
            .field("log_json", &self.log_json)
            .finish()
    }
}

fn required_var(var: &str) -> Result<String, ConfigError> {
    match env::var(var) {
        Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(ConfigError::MissingEnvVar(var.to_string())),
    }
}

fn url_var(var: &str, default: &str) -> String {
    env::var(var)
        .ok()
        .map(|value| value.trim().trim_end_matches('/').to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Parse a boolean environment variable.
///
/// Accepts "true", "1", "yes" as true and "false", "0", "no", or empty as false.
fn parse_bool_env(var: &str) -> Result<bool, ConfigError> {
    match env::var(var) {
        Ok(value) => match value.to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" | "" => Ok(false),
            _ => Err(ConfigError::InvalidFormat {
                var: var.to_string(),
                message: format!("expected boolean value, got: {value}"),
            }),
        },
        Err(_) => Ok(false),
    }
}
