//! Configuration loading and types for BookSwap.
//!
//! All settings come from environment variables, read once at startup
//! into the [`Settings`] struct and shared read-only through the
//! application state.  Each subsection governs a different part of the
//! system: HTTP serving, the book database, object storage, the
//! identity provider, and remote log shipping.

use crate::errors::ConfigError;

/// Top-level settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// HTTP server settings.
    pub server: ServerSettings,

    /// Book database settings.
    pub database: DatabaseSettings,

    /// Object storage settings.
    pub storage: StorageSettings,

    /// Identity provider settings.
    pub auth: AuthSettings,

    /// Remote log sink settings.
    pub logging: LoggingSettings,
}

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Display name rendered on the index page (`APP_NAME`).
    pub app_name: String,

    /// Externally visible base URL of this service (`BASE_URL`), used
    /// for the OAuth redirect and post-logout targets.  No trailing
    /// slash.
    pub base_url: String,

    /// Debug mode (`DEBUG`): echoes remotely shipped log events to the
    /// console.
    pub debug: bool,

    /// Maximum accepted request body size in bytes (`MAX_UPLOAD_BYTES`).
    pub max_upload_bytes: usize,
}

/// Book database settings.
#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    /// Connection string (`DATABASE_URL`): a SQLite file path or
    /// `:memory:`, optionally prefixed with `sqlite://`.
    pub url: String,
}

impl DatabaseSettings {
    /// Filesystem path (or `:memory:`) for the SQLite database.
    pub fn sqlite_path(&self) -> &str {
        self.url.strip_prefix("sqlite://").unwrap_or(&self.url)
    }
}

/// Object storage settings.
#[derive(Debug, Clone)]
pub struct StorageSettings {
    /// Backend type (`STORAGE_BACKEND`): `s3` or `memory`.
    pub backend: String,

    /// AWS region (`AWS_REGION`).
    pub region: String,

    /// Bucket receiving cover images (`S3_BUCKET_NAME`).
    pub bucket: String,

    /// Static AWS access key (`AWS_ACCESS_KEY_ID`).
    pub access_key_id: String,

    /// Static AWS secret key (`AWS_SECRET_ACCESS_KEY`).
    pub secret_access_key: String,
}

/// Identity provider settings.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    /// OAuth client id (`COGNITO_CLIENT_ID`).
    pub client_id: String,

    /// OAuth client secret (`COGNITO_CLIENT_SECRET`).
    pub client_secret: String,

    /// OpenID Connect discovery document URL (`COGNITO_METADATA_URL`).
    pub metadata_url: String,

    /// Hosted UI domain (`COGNITO_DOMAIN`), e.g.
    /// `https://myapp.auth.us-east-1.amazoncognito.com`.  No trailing
    /// slash.  Used for the provider-side logout redirect.
    pub domain: String,

    /// Whether upload/delete require an authenticated session
    /// (`AUTH_REQUIRED`).
    pub required: bool,
}

/// Remote log sink settings.
#[derive(Debug, Clone)]
pub struct LoggingSettings {
    /// CloudWatch log group name (`CLOUDWATCH_LOG_GROUP`).
    pub group: String,

    /// CloudWatch log stream name (`CLOUDWATCH_LOG_STREAM`).
    pub stream: String,
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Settings, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary lookup function.
    ///
    /// Every required variable is probed before returning, so a single
    /// error names them all.
    pub fn from_lookup<F>(lookup: F) -> Result<Settings, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut missing: Vec<String> = Vec::new();
        let mut require = |key: &str| -> String {
            match lookup(key) {
                Some(value) if !value.is_empty() => value,
                _ => {
                    missing.push(key.to_string());
                    String::new()
                }
            }
        };

        let database_url = require("DATABASE_URL");
        let access_key_id = require("AWS_ACCESS_KEY_ID");
        let secret_access_key = require("AWS_SECRET_ACCESS_KEY");
        let bucket = require("S3_BUCKET_NAME");
        let client_id = require("COGNITO_CLIENT_ID");
        let client_secret = require("COGNITO_CLIENT_SECRET");
        let metadata_url = require("COGNITO_METADATA_URL");
        let domain = require("COGNITO_DOMAIN");

        if !missing.is_empty() {
            return Err(ConfigError::MissingVars { vars: missing });
        }

        let settings = Settings {
            server: ServerSettings {
                app_name: lookup("APP_NAME").unwrap_or_else(default_app_name),
                base_url: lookup("BASE_URL")
                    .map(|url| url.trim_end_matches('/').to_string())
                    .unwrap_or_else(default_base_url),
                debug: parse_bool("DEBUG", lookup("DEBUG"), true)?,
                max_upload_bytes: parse_usize(
                    "MAX_UPLOAD_BYTES",
                    lookup("MAX_UPLOAD_BYTES"),
                    default_max_upload_bytes(),
                )?,
            },
            database: DatabaseSettings { url: database_url },
            storage: StorageSettings {
                backend: lookup("STORAGE_BACKEND").unwrap_or_else(default_storage_backend),
                region: lookup("AWS_REGION").unwrap_or_else(default_region),
                bucket,
                access_key_id,
                secret_access_key,
            },
            auth: AuthSettings {
                client_id,
                client_secret,
                metadata_url,
                domain: domain.trim_end_matches('/').to_string(),
                required: parse_bool("AUTH_REQUIRED", lookup("AUTH_REQUIRED"), true)?,
            },
            logging: LoggingSettings {
                group: lookup("CLOUDWATCH_LOG_GROUP").unwrap_or_else(default_log_group),
                stream: lookup("CLOUDWATCH_LOG_STREAM").unwrap_or_else(default_log_stream),
            },
        };

        Ok(settings)
    }
}

// -- Parsing -----------------------------------------------------------------

fn parse_bool(var: &str, value: Option<String>, default: bool) -> Result<bool, ConfigError> {
    match value {
        None => Ok(default),
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue {
                var: var.to_string(),
                message: format!("expected a boolean, got {raw:?}"),
            }),
        },
    }
}

fn parse_usize(var: &str, value: Option<String>, default: usize) -> Result<usize, ConfigError> {
    match value {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            var: var.to_string(),
            message: format!("expected an integer, got {raw:?}"),
        }),
    }
}

// -- Defaults ----------------------------------------------------------------

fn default_app_name() -> String {
    "BookSwap Cloud".to_string()
}

fn default_base_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_storage_backend() -> String {
    "s3".to_string()
}

fn default_log_group() -> String {
    "/aws/bookswap".to_string()
}

fn default_log_stream() -> String {
    "backend-logs".to_string()
}

fn default_max_upload_bytes() -> usize {
    10_485_760 // 10 MiB
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUIRED: &[(&str, &str)] = &[
        ("DATABASE_URL", ":memory:"),
        ("AWS_ACCESS_KEY_ID", "AKIAEXAMPLE"),
        ("AWS_SECRET_ACCESS_KEY", "secret"),
        ("S3_BUCKET_NAME", "bookswap-covers"),
        ("COGNITO_CLIENT_ID", "client-id"),
        ("COGNITO_CLIENT_SECRET", "client-secret"),
        ("COGNITO_METADATA_URL", "https://cognito-idp.us-east-1.amazonaws.com/pool/.well-known/openid-configuration"),
        ("COGNITO_DOMAIN", "https://bookswap.auth.us-east-1.amazoncognito.com"),
    ];

    fn lookup_in(pairs: Vec<(&'static str, &'static str)>) -> impl Fn(&str) -> Option<String> {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn test_missing_required_lists_every_variable() {
        let err = Settings::from_lookup(|_| None).unwrap_err();
        match err {
            ConfigError::MissingVars { vars } => {
                assert_eq!(vars.len(), REQUIRED.len());
                assert!(vars.iter().any(|v| v == "DATABASE_URL"));
                assert!(vars.iter().any(|v| v == "COGNITO_DOMAIN"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_value_counts_as_missing() {
        let mut pairs = REQUIRED.to_vec();
        pairs.retain(|(k, _)| *k != "S3_BUCKET_NAME");
        pairs.push(("S3_BUCKET_NAME", ""));
        let err = Settings::from_lookup(lookup_in(pairs)).unwrap_err();
        match err {
            ConfigError::MissingVars { vars } => assert_eq!(vars, vec!["S3_BUCKET_NAME"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_lookup(lookup_in(REQUIRED.to_vec())).unwrap();
        assert_eq!(settings.server.app_name, "BookSwap Cloud");
        assert_eq!(settings.server.base_url, "http://localhost:5000");
        assert!(settings.server.debug);
        assert_eq!(settings.server.max_upload_bytes, 10_485_760);
        assert_eq!(settings.storage.backend, "s3");
        assert_eq!(settings.storage.region, "us-east-1");
        assert_eq!(settings.logging.group, "/aws/bookswap");
        assert_eq!(settings.logging.stream, "backend-logs");
        assert!(settings.auth.required);
    }

    #[test]
    fn test_overrides() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("AWS_REGION", "eu-west-1"));
        pairs.push(("STORAGE_BACKEND", "memory"));
        pairs.push(("DEBUG", "false"));
        pairs.push(("AUTH_REQUIRED", "0"));
        pairs.push(("MAX_UPLOAD_BYTES", "1024"));
        pairs.push(("BASE_URL", "https://books.example.com/"));
        let settings = Settings::from_lookup(lookup_in(pairs)).unwrap();
        assert_eq!(settings.storage.region, "eu-west-1");
        assert_eq!(settings.storage.backend, "memory");
        assert!(!settings.server.debug);
        assert!(!settings.auth.required);
        assert_eq!(settings.server.max_upload_bytes, 1024);
        // Trailing slash is trimmed so URL joins stay predictable.
        assert_eq!(settings.server.base_url, "https://books.example.com");
    }

    #[test]
    fn test_invalid_integer_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("MAX_UPLOAD_BYTES", "lots"));
        let err = Settings::from_lookup(lookup_in(pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { var, .. } if var == "MAX_UPLOAD_BYTES"));
    }

    #[test]
    fn test_invalid_bool_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("DEBUG", "maybe"));
        let err = Settings::from_lookup(lookup_in(pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { var, .. } if var == "DEBUG"));
    }

    #[test]
    fn test_sqlite_path_strips_scheme() {
        let database = DatabaseSettings {
            url: "sqlite:///var/lib/bookswap/books.db".to_string(),
        };
        assert_eq!(database.sqlite_path(), "/var/lib/bookswap/books.db");

        let database = DatabaseSettings {
            url: ":memory:".to_string(),
        };
        assert_eq!(database.sqlite_path(), ":memory:");
    }
}
