//! Data access for Edu-Desk.
//!
//! Two interchangeable backends implement the repository traits in
//! [`traits`]: [`sqlite`] (the relational store) and [`document`] (the
//! JSON document store). [`backend`] picks one of them once at startup.

pub mod backend;
pub mod document;
pub mod sqlite;
pub mod traits;

pub use backend::{BackendKind, BackendSelector, Repository};
pub use document::{DocumentRepository, DocumentStore};
pub use sqlite::{Database, SqliteRepository};

use std::time::{SystemTime, UNIX_EPOCH};

use crate::model::MAX_COMMENT_LEN;

/// Errors from the persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("SQLite error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Schema migration error: {0}")]
    Migration(String),
    #[error("{0} is not configured")]
    BackendUnavailable(&'static str),
    #[error("{0} not found")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Invalid input: {0}")]
    Invalid(String),
    #[error("Invalid id: {0:?}")]
    InvalidId(String),
}

/// Get the current unix timestamp in seconds.
pub fn now_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Parse a relational primary key from its string form.
pub(crate) fn parse_id(id: &str) -> Result<i64, PersistenceError> {
    id.trim()
        .parse::<i64>()
        .map_err(|_| PersistenceError::InvalidId(id.to_string()))
}

/// Trim a comment and check it is non-empty and within [`MAX_COMMENT_LEN`].
pub(crate) fn validate_comment_text(text: &str) -> Result<String, PersistenceError> {
    let trimmed = text.trim();
    let len = trimmed.chars().count();
    if len == 0 || len > MAX_COMMENT_LEN {
        return Err(PersistenceError::Invalid(format!(
            "comment must be 1-{MAX_COMMENT_LEN} characters, got {len}"
        )));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn validate_rating(value: u8) -> Result<u8, PersistenceError> {
    if (1..=5).contains(&value) {
        Ok(value)
    } else {
        Err(PersistenceError::Invalid(format!(
            "rating must be between 1 and 5, got {value}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_id_accepts_integers_only() {
        assert_eq!(parse_id("42").unwrap(), 42);
        assert!(matches!(parse_id("abc"), Err(PersistenceError::InvalidId(_))));
    }

    #[test]
    fn comment_is_trimmed_and_bounded() {
        assert_eq!(validate_comment_text("  nice notes  ").unwrap(), "nice notes");
        assert!(validate_comment_text("   ").is_err());
        assert!(validate_comment_text(&"x".repeat(501)).is_err());
        assert!(validate_comment_text(&"x".repeat(500)).is_ok());
    }

    #[test]
    fn rating_bounds() {
        assert!(validate_rating(0).is_err());
        assert!(validate_rating(6).is_err());
        assert_eq!(validate_rating(5).unwrap(), 5);
    }
}
