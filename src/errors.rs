//! Application error types.
//!
//! Domain errors (`AuthError`, `StorageError`, `StoreError`, `ConfigError`)
//! are raised by the individual components; [`ApiError`] wraps them at the
//! request boundary and implements [`axum::response::IntoResponse`] so
//! handlers can simply return `Err(...)`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Generate a 16-character hex request ID.
pub fn generate_request_id() -> String {
    let bytes: [u8; 8] = rand::random();
    hex::encode(bytes).to_uppercase()
}

/// Failures in the login / callback / logout flow.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The callback `state` parameter was absent or did not match the
    /// value issued at login.
    #[error("invalid or missing state")]
    InvalidState,

    /// The provider's discovery document could not be fetched or parsed.
    #[error("provider discovery failed: {message}")]
    Discovery { message: String },

    /// The authorization code could not be exchanged for tokens.
    #[error("code exchange failed: {message}")]
    Exchange { message: String },

    /// The userinfo endpoint rejected the access token.
    #[error("userinfo request failed: {message}")]
    UserInfo { message: String },
}

impl AuthError {
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidState => "InvalidState",
            AuthError::Discovery { .. } => "ProviderDiscoveryFailed",
            AuthError::Exchange { .. } => "CodeExchangeFailed",
            AuthError::UserInfo { .. } => "UserInfoFailed",
        }
    }
}

/// Failures against the object store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The store rejected or failed a cover upload.
    #[error("cover upload failed: {message}")]
    Upload { message: String },

    /// The store rejected or failed a cover delete.  Never surfaced to
    /// handlers; deletes report `false` instead (see `storage`).
    #[error("cover delete failed: {message}")]
    Delete { message: String },
}

/// Failures against the book database.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A row violated a schema constraint.
    #[error("constraint violation: {message}")]
    Constraint { message: String },

    /// Any other database failure.
    #[error("database error: {message}")]
    Database { message: String },
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, _)
                if code.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StoreError::Constraint {
                    message: err.to_string(),
                }
            }
            _ => StoreError::Database {
                message: err.to_string(),
            },
        }
    }
}

/// Fatal configuration problems detected at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// One or more required environment variables were not set.
    #[error("missing required environment variables: {}", vars.join(", "))]
    MissingVars { vars: Vec<String> },

    /// A variable was set but could not be parsed.
    #[error("invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },
}

/// Request-boundary error: everything a handler can fail with.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// A required form field was absent from the request.
    #[error("missing required field: {field}")]
    MissingField { field: String },

    /// A field was present but failed validation.
    #[error("{message}")]
    Validation { message: String },

    /// The request needs an authenticated session.
    #[error("authentication required")]
    Unauthorized,

    /// Catch-all for unexpected internal errors.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<axum::extract::multipart::MultipartError> for ApiError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        ApiError::Validation {
            message: format!("malformed multipart body: {err}"),
        }
    }
}

impl From<tower_sessions::session::Error> for ApiError {
    fn from(err: tower_sessions::session::Error) -> Self {
        ApiError::Internal(anyhow::Error::new(err))
    }
}

impl ApiError {
    /// Return the stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Auth(e) => e.code(),
            ApiError::Storage(StorageError::Upload { .. }) => "UploadFailed",
            ApiError::Storage(StorageError::Delete { .. }) => "DeleteFailed",
            ApiError::Store(StoreError::Constraint { .. }) => "ConstraintViolation",
            ApiError::Store(StoreError::Database { .. }) => "DatabaseError",
            ApiError::MissingField { .. } => "MissingField",
            ApiError::Validation { .. } => "InvalidArgument",
            ApiError::Unauthorized => "Unauthorized",
            ApiError::Internal(_) => "InternalError",
        }
    }

    /// Return the appropriate HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Auth(AuthError::InvalidState) => StatusCode::BAD_REQUEST,
            ApiError::Auth(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::MissingField { .. } => StatusCode::BAD_REQUEST,
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let request_id = generate_request_id();
        let status = self.status_code();
        let date = httpdate::fmt_http_date(std::time::SystemTime::now());

        let body = serde_json::json!({
            "error": self.to_string(),
            "code": self.code(),
        });

        (
            status,
            [
                ("content-type", "application/json".to_string()),
                ("x-request-id", request_id),
                ("date", date),
                ("server", "BookSwap".to_string()),
            ],
            body.to_string(),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_format() {
        let id = generate_request_id();
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(id, id.to_uppercase());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::from(AuthError::InvalidState).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(AuthError::Exchange {
                message: "expired".into()
            })
            .status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::MissingField {
                field: "image".into()
            }
            .status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::from(StorageError::Upload {
                message: "denied".into()
            })
            .status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_store_error_from_rusqlite() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CONSTRAINT),
            Some("NOT NULL constraint failed: books.title".into()),
        );
        assert!(matches!(
            StoreError::from(err),
            StoreError::Constraint { .. }
        ));

        let err = rusqlite::Error::QueryReturnedNoRows;
        assert!(matches!(StoreError::from(err), StoreError::Database { .. }));
    }

    #[test]
    fn test_error_body_shape() {
        let resp = ApiError::Validation {
            message: "title must be 1-255 characters".into(),
        }
        .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            resp.headers().get("content-type").unwrap(),
            "application/json"
        );
        assert!(resp.headers().contains_key("x-request-id"));
    }
}
