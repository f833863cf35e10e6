//! Shared encode/decode helpers for SQLite ↔ domain type conversions.

use std::collections::BTreeSet;

use crate::model::{
    average_rating, Affiliation, Note, NoteSummary, Role, StorageKind, StoragePointer, User,
};
use crate::persistence::{parse_id, PersistenceError};

// ── Identifiers ────────────────────────────────────────────────────────

pub fn format_id(id: i64) -> String {
    id.to_string()
}

/// Parse an optional reference column value. Empty strings count as unset.
pub fn parse_optional_id(id: Option<&str>) -> Result<Option<i64>, PersistenceError> {
    match id {
        Some(s) if !s.trim().is_empty() => parse_id(s).map(Some),
        _ => Ok(None),
    }
}

/// Parse a reference that the caller will look up. A non-numeric ID cannot
/// name any row, so it maps to `NotFound` rather than a parse failure.
pub fn parse_reference(id: &str, entity: &str) -> Result<i64, PersistenceError> {
    parse_id(id).map_err(|_| PersistenceError::NotFound(format!("{entity} {id}")))
}

// ── Constraint violations ──────────────────────────────────────────────

/// Map UNIQUE and FOREIGN KEY violations onto the domain errors, leaving
/// everything else as a plain SQLite error.
pub fn map_constraint(err: sqlx::Error, what: &str) -> PersistenceError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return PersistenceError::Conflict(format!("{what} already exists"));
        }
        if db_err.is_foreign_key_violation() {
            return PersistenceError::NotFound(format!("{what} references a missing row"));
        }
    }
    PersistenceError::Sqlx(err)
}

// ── Rows ───────────────────────────────────────────────────────────────

#[derive(Debug, sqlx::FromRow)]
pub struct UserRow {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: String,
    pub college_id: Option<i64>,
    pub department_id: Option<i64>,
    pub education_year: Option<i64>,
    pub semester: Option<i64>,
    pub created_at: i64,
}

pub const USER_COLUMNS: &str = "id, email, name, password_hash, role, college_id, \
     department_id, education_year, semester, created_at";

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: format_id(row.id),
            email: row.email,
            name: row.name,
            password_hash: row.password_hash,
            role: Role::parse(&row.role),
            affiliation: Affiliation {
                college_id: row.college_id.map(format_id),
                department_id: row.department_id.map(format_id),
                education_year: row.education_year.and_then(|v| u8::try_from(v).ok()),
                semester: row.semester.and_then(|v| u8::try_from(v).ok()),
            },
            created_at: u64::try_from(row.created_at).unwrap_or(0),
        }
    }
}

/// A note row joined with its subject links and aggregates.
#[derive(Debug, sqlx::FromRow)]
pub struct NoteRow {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub file_url: String,
    pub file_name: String,
    pub storage_kind: String,
    pub uploaded_by: i64,
    pub college_id: Option<i64>,
    pub department_id: Option<i64>,
    pub education_year: Option<i64>,
    pub semester: Option<i64>,
    pub created_at: i64,
    pub subject_ids: Option<String>,
    pub rating_sum: i64,
    pub rating_count: i64,
    pub comment_count: i64,
}

/// SELECT list for [`NoteRow`], with `n` aliasing the notes table.
pub const NOTE_SUMMARY_SELECT: &str = r#"
    SELECT n.id, n.title, n.description, n.file_url, n.file_name, n.storage_kind,
           n.uploaded_by, n.college_id, n.department_id, n.education_year,
           n.semester, n.created_at,
           (SELECT GROUP_CONCAT(ns.subject_id) FROM note_subjects ns
             WHERE ns.note_id = n.id) AS subject_ids,
           (SELECT COALESCE(SUM(r.rating), 0) FROM ratings r
             WHERE r.note_id = n.id) AS rating_sum,
           (SELECT COUNT(*) FROM ratings r WHERE r.note_id = n.id) AS rating_count,
           (SELECT COUNT(*) FROM comments c WHERE c.note_id = n.id) AS comment_count
    FROM notes n
"#;

/// Newest first; ties broken by insertion order.
pub const NOTE_ORDER: &str = " ORDER BY n.created_at DESC, n.id DESC";

fn mean(sum: i64, count: i64) -> f64 {
    if count == 0 {
        return average_rating(&[]);
    }
    sum as f64 / count as f64
}

impl From<NoteRow> for NoteSummary {
    fn from(row: NoteRow) -> Self {
        let subject_ids: BTreeSet<String> = row
            .subject_ids
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        NoteSummary {
            note: Note {
                id: format_id(row.id),
                title: row.title,
                description: row.description,
                file_name: row.file_name,
                storage: StoragePointer {
                    file_url: row.file_url,
                    storage_kind: StorageKind::parse(&row.storage_kind),
                },
                uploaded_by: format_id(row.uploaded_by),
                affiliation: Affiliation {
                    college_id: row.college_id.map(format_id),
                    department_id: row.department_id.map(format_id),
                    education_year: row.education_year.and_then(|v| u8::try_from(v).ok()),
                    semester: row.semester.and_then(|v| u8::try_from(v).ok()),
                },
                subject_ids,
                created_at: u64::try_from(row.created_at).unwrap_or(0),
            },
            average_rating: mean(row.rating_sum, row.rating_count),
            rating_count: row.rating_count as u64,
            comment_count: row.comment_count as u64,
        }
    }
}
