//! Collection names and document shapes of the document backend.
//!
//! Field names are camelCase. Every document imported from the relational
//! store carries `relationalId`, the integer key of its source row, so a
//! later standalone import step can rebuild the ID mapping.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::model::{
    Affiliation, College, Comment, Department, Note, Rating, Role, StorageKind, StoragePointer,
    Subject, User,
};

use super::store::Document;

pub const COLLEGES: &str = "colleges";
pub const DEPARTMENTS: &str = "departments";
pub const SUBJECTS: &str = "subjects";
pub const USERS: &str = "users";
pub const NOTES: &str = "notes";
pub const COMMENTS: &str = "comments";
pub const RATINGS: &str = "ratings";
pub const FAVORITES: &str = "favorites";

/// Field holding the source row's key on imported documents.
pub const RELATIONAL_ID: &str = "relationalId";

/// Insertion counter on notes and comments. Breaks ties between documents
/// created within the same second, newest (highest) first.
pub const SEQUENCE: &str = "sequence";

/// Document ID of the one rating a user holds on a note.
pub fn rating_id(note_id: &str, user_id: &str) -> String {
    format!("{note_id}_{user_id}")
}

/// Document ID of the one favorite a user holds on a note.
pub fn favorite_id(user_id: &str, note_id: &str) -> String {
    format!("{user_id}_{note_id}")
}

/// Document ID of a comment imported from the relational store.
pub fn imported_comment_id(relational_id: i64) -> String {
    format!("comment_{relational_id}")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollegeDoc {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relational_id: Option<i64>,
    #[serde(default)]
    pub created_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentDoc {
    pub name: String,
    pub college_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relational_id: Option<i64>,
    #[serde(default)]
    pub created_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectDoc {
    pub name: String,
    pub department_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relational_id: Option<i64>,
    #[serde(default)]
    pub created_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDoc {
    pub email: String,
    pub name: String,
    pub password: String,
    #[serde(default)]
    pub role: Role,
    pub college_id: Option<String>,
    pub department_id: Option<String>,
    pub education_year: Option<u8>,
    pub semester: Option<u8>,
    #[serde(default)]
    pub created_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteDoc {
    pub title: String,
    pub description: Option<String>,
    pub file_name: String,
    pub file_url: String,
    #[serde(default)]
    pub storage_type: StorageKind,
    pub uploaded_by: String,
    pub college_id: Option<String>,
    pub department_id: Option<String>,
    pub education_year: Option<u8>,
    pub semester: Option<u8>,
    #[serde(default)]
    pub subject_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relational_id: Option<i64>,
    #[serde(default)]
    pub created_at: u64,
    #[serde(default)]
    pub sequence: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentDoc {
    pub note_id: String,
    pub user_id: String,
    pub comment: String,
    #[serde(default)]
    pub created_at: u64,
    #[serde(default)]
    pub sequence: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingDoc {
    pub note_id: String,
    pub user_id: String,
    pub rating: u8,
    #[serde(default)]
    pub created_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteDoc {
    pub user_id: String,
    pub note_id: String,
    #[serde(default)]
    pub created_at: u64,
}

/// Shared accessor for documents that may carry a `relationalId`.
pub trait Imported {
    fn relational_id(&self) -> Option<i64>;
}

impl Imported for CollegeDoc {
    fn relational_id(&self) -> Option<i64> {
        self.relational_id
    }
}

impl Imported for DepartmentDoc {
    fn relational_id(&self) -> Option<i64> {
        self.relational_id
    }
}

impl Imported for SubjectDoc {
    fn relational_id(&self) -> Option<i64> {
        self.relational_id
    }
}

impl Imported for NoteDoc {
    fn relational_id(&self) -> Option<i64> {
        self.relational_id
    }
}

impl From<Document<CollegeDoc>> for College {
    fn from(doc: Document<CollegeDoc>) -> Self {
        College {
            id: doc.id,
            name: doc.data.name,
        }
    }
}

impl From<Document<DepartmentDoc>> for Department {
    fn from(doc: Document<DepartmentDoc>) -> Self {
        Department {
            id: doc.id,
            name: doc.data.name,
            college_id: doc.data.college_id.unwrap_or_default(),
        }
    }
}

impl From<Document<SubjectDoc>> for Subject {
    fn from(doc: Document<SubjectDoc>) -> Self {
        Subject {
            id: doc.id,
            name: doc.data.name,
            department_id: doc.data.department_id.unwrap_or_default(),
        }
    }
}

impl From<Document<UserDoc>> for User {
    fn from(doc: Document<UserDoc>) -> Self {
        let d = doc.data;
        User {
            id: doc.id,
            email: d.email,
            name: d.name,
            password_hash: d.password,
            role: d.role,
            affiliation: Affiliation {
                college_id: d.college_id,
                department_id: d.department_id,
                education_year: d.education_year,
                semester: d.semester,
            },
            created_at: d.created_at,
        }
    }
}

impl From<Document<NoteDoc>> for Note {
    fn from(doc: Document<NoteDoc>) -> Self {
        let d = doc.data;
        Note {
            id: doc.id,
            title: d.title,
            description: d.description,
            file_name: d.file_name,
            storage: StoragePointer {
                file_url: d.file_url,
                storage_kind: d.storage_type,
            },
            uploaded_by: d.uploaded_by,
            affiliation: Affiliation {
                college_id: d.college_id,
                department_id: d.department_id,
                education_year: d.education_year,
                semester: d.semester,
            },
            subject_ids: d.subject_ids.into_iter().collect::<BTreeSet<_>>(),
            created_at: d.created_at,
        }
    }
}

impl From<Document<CommentDoc>> for Comment {
    fn from(doc: Document<CommentDoc>) -> Self {
        Comment {
            id: doc.id,
            note_id: doc.data.note_id,
            user_id: doc.data.user_id,
            text: doc.data.comment,
            created_at: doc.data.created_at,
        }
    }
}

impl From<Document<RatingDoc>> for Rating {
    fn from(doc: Document<RatingDoc>) -> Self {
        Rating {
            id: doc.id,
            note_id: doc.data.note_id,
            user_id: doc.data.user_id,
            value: doc.data.rating,
            created_at: doc.data.created_at,
        }
    }
}
