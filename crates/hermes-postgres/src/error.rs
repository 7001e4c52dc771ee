//! PostgreSQL store errors.

use thiserror::Error;

/// Errors raised while talking to PostgreSQL, before classification into
/// the workspace taxonomy.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum PostgresError {
    /// Connection establishment failed
    #[error("connection error: {0}")]
    Connection(String),

    /// Schema creation failed
    #[error("schema initialization error: {0}")]
    Schema(String),

    /// Query execution failed
    #[error("query error: {0}")]
    Query(String),

    /// A stored value could not be decoded
    #[error("row decode error: {0}")]
    Decode(String),

    /// Invalid SQL identifier
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),
}

impl From<PostgresError> for hermes::Error {
    fn from(err: PostgresError) -> Self {
        match err {
            // Connection and query failures are retryable on the next
            // sweep; the relay never loses an outbox row over them.
            PostgresError::Connection(msg) | PostgresError::Query(msg) => {
                hermes::Error::transient(format!("postgres: {msg}"))
            }
            PostgresError::Decode(msg) => hermes::Error::parse(format!("postgres: {msg}")),
            PostgresError::Schema(msg) | PostgresError::InvalidIdentifier(msg) => {
                hermes::Error::internal(format!("postgres: {msg}"))
            }
        }
    }
}

impl From<tokio_postgres::Error> for PostgresError {
    fn from(err: tokio_postgres::Error) -> Self {
        PostgresError::Query(err.to_string())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_error_classified_transient() {
        let err: hermes::Error = PostgresError::Query("deadlock".to_string()).into();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_decode_error_classified_parse() {
        let err: hermes::Error = PostgresError::Decode("bad jsonb".to_string()).into();
        assert!(matches!(err, hermes::Error::Parse(_)));
    }

    #[test]
    fn test_identifier_error_not_retryable() {
        let err: hermes::Error = PostgresError::InvalidIdentifier("1bad".to_string()).into();
        assert!(!err.is_retryable());
    }
}
