//! Error handling for the wardrobe

use std::fmt;
use thiserror::Error;
use wardrobe_auth::AuthError;
use wardrobe_postgrest::PostgrestError;
use wardrobe_storage::StorageError;

pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the wardrobe
#[derive(Error, Debug)]
pub enum Error {
    /// No usable session; raised before any store call
    #[error("not signed in")]
    NotAuthenticated,

    /// Input rejected before reaching the backend
    #[error("{0}")]
    Validation(String),

    #[error("{context}: {}", .source.message())]
    Database {
        context: String,
        #[source]
        source: PostgrestError,
    },

    #[error("{context}: {source}")]
    Storage {
        context: String,
        #[source]
        source: StorageError,
    },

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

impl Error {
    pub fn validation<T: fmt::Display>(msg: T) -> Self {
        Error::Validation(msg.to_string())
    }

    pub fn config<T: fmt::Display>(msg: T) -> Self {
        Error::Config(msg.to_string())
    }

    /// Wrap a store failure with the operation that was attempted
    pub fn database(context: &str, source: PostgrestError) -> Self {
        Error::Database {
            context: context.to_string(),
            source,
        }
    }

    pub fn storage(context: &str, source: StorageError) -> Self {
        Error::Storage {
            context: context.to_string(),
            source,
        }
    }
}

/// `map_err` adapter: `.map_err(db_error("failed to list items"))`
pub(crate) fn db_error(context: &'static str) -> impl FnOnce(PostgrestError) -> Error {
    move |source| Error::database(context, source)
}

pub(crate) fn storage_error(context: &'static str) -> impl FnOnce(StorageError) -> Error {
    move |source| Error::storage(context, source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wardrobe_postgrest::PostgrestApiErrorDetails;

    #[test]
    fn database_error_reads_like_a_sentence() {
        let source = PostgrestError::ApiError {
            details: PostgrestApiErrorDetails {
                code: Some("23514".to_string()),
                message: Some("violates check constraint".to_string()),
                details: None,
                hint: None,
            },
            status: reqwest::StatusCode::BAD_REQUEST,
        };
        let err = Error::database("failed to create item", source);
        assert_eq!(err.to_string(), "failed to create item: violates check constraint");
    }
}
