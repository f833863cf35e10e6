//! Startup-time choice between the relational and the document backend.
//!
//! The document store is initialized at most once. If its directory is not
//! configured, or the health check at open fails, the failure is logged and the
//! process keeps running on the relational backend. Nothing retries later.

use std::path::Path;

use serde::Serialize;
use sqlx::SqlitePool;

use super::document::{DocumentRepository, DocumentStore};
use super::sqlite::SqliteRepository;
use super::traits::{AcademicRepository, InteractionRepository, NoteRepository, UserRepository};
use super::PersistenceError;
use crate::model::{
    College, Comment, Department, NewComment, NewNote, NewUser, Note, NoteDetail, NoteFilter,
    NoteSummary, ProfileUpdate, Rating, StoragePointer, Subject, User, UserAnalytics,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Relational,
    Document,
}

/// Holds the document store handle if initialization succeeded.
#[derive(Debug, Clone, Default)]
pub struct BackendSelector {
    documents: Option<DocumentStore>,
}

impl BackendSelector {
    /// Try to open the document store at `dir`. Never fails; an unusable
    /// store just leaves the selector on the relational backend.
    pub fn initialize(dir: Option<&Path>) -> Self {
        let Some(dir) = dir else {
            tracing::info!("Document store not configured, using relational backend");
            return Self::default();
        };
        match DocumentStore::open(dir) {
            Ok(store) => {
                tracing::info!(dir = %dir.display(), "Document store initialized");
                Self {
                    documents: Some(store),
                }
            }
            Err(e) => {
                tracing::warn!(
                    dir = %dir.display(),
                    error = %e,
                    "Document store unavailable, falling back to relational backend"
                );
                Self::default()
            }
        }
    }

    pub fn document_store_available(&self) -> bool {
        self.documents.is_some()
    }

    pub fn document_store(&self) -> Result<&DocumentStore, PersistenceError> {
        self.documents
            .as_ref()
            .ok_or(PersistenceError::BackendUnavailable("document store"))
    }

    pub fn kind(&self) -> BackendKind {
        if self.documents.is_some() {
            BackendKind::Document
        } else {
            BackendKind::Relational
        }
    }

    /// Repository for the selected backend.
    pub fn repository(&self, pool: &SqlitePool) -> Repository {
        match &self.documents {
            Some(store) => Repository::Document(DocumentRepository::new(store.clone())),
            None => Repository::Sqlite(SqliteRepository::new(pool.clone())),
        }
    }
}

/// Either backend behind the repository traits.
#[derive(Debug, Clone)]
pub enum Repository {
    Sqlite(SqliteRepository),
    Document(DocumentRepository),
}

impl Repository {
    pub fn kind(&self) -> BackendKind {
        match self {
            Repository::Sqlite(_) => BackendKind::Relational,
            Repository::Document(_) => BackendKind::Document,
        }
    }
}

macro_rules! delegate {
    ($self:ident, $method:ident ( $($arg:expr),* )) => {
        match $self {
            Repository::Sqlite(repo) => repo.$method($($arg),*).await,
            Repository::Document(repo) => repo.$method($($arg),*).await,
        }
    };
}

impl AcademicRepository for Repository {
    async fn list_colleges(&self) -> Result<Vec<College>, PersistenceError> {
        delegate!(self, list_colleges())
    }

    async fn list_departments(&self, college_id: &str) -> Result<Vec<Department>, PersistenceError> {
        delegate!(self, list_departments(college_id))
    }

    async fn list_subjects(&self, department_id: &str) -> Result<Vec<Subject>, PersistenceError> {
        delegate!(self, list_subjects(department_id))
    }

    async fn search_subjects(
        &self,
        query: &str,
        department_id: Option<&str>,
    ) -> Result<Vec<Subject>, PersistenceError> {
        delegate!(self, search_subjects(query, department_id))
    }

    async fn create_college(&self, name: &str) -> Result<College, PersistenceError> {
        delegate!(self, create_college(name))
    }

    async fn create_department(
        &self,
        name: &str,
        college_id: &str,
    ) -> Result<Department, PersistenceError> {
        delegate!(self, create_department(name, college_id))
    }

    async fn create_subject(
        &self,
        name: &str,
        department_id: &str,
    ) -> Result<Subject, PersistenceError> {
        delegate!(self, create_subject(name, department_id))
    }
}

impl UserRepository for Repository {
    async fn create_user(&self, user: &NewUser) -> Result<User, PersistenceError> {
        delegate!(self, create_user(user))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, PersistenceError> {
        delegate!(self, find_user_by_email(email))
    }

    async fn load_user(&self, id: &str) -> Result<Option<User>, PersistenceError> {
        delegate!(self, load_user(id))
    }

    async fn update_profile(
        &self,
        id: &str,
        update: &ProfileUpdate,
    ) -> Result<User, PersistenceError> {
        delegate!(self, update_profile(id, update))
    }
}

impl NoteRepository for Repository {
    async fn create_note(&self, note: &NewNote) -> Result<Note, PersistenceError> {
        delegate!(self, create_note(note))
    }

    async fn list_notes(&self, filter: &NoteFilter) -> Result<Vec<NoteSummary>, PersistenceError> {
        delegate!(self, list_notes(filter))
    }

    async fn load_note(&self, id: &str) -> Result<Option<NoteDetail>, PersistenceError> {
        delegate!(self, load_note(id))
    }

    async fn list_uploads(&self, user_id: &str) -> Result<Vec<NoteSummary>, PersistenceError> {
        delegate!(self, list_uploads(user_id))
    }

    async fn list_favorites(&self, user_id: &str) -> Result<Vec<NoteSummary>, PersistenceError> {
        delegate!(self, list_favorites(user_id))
    }

    async fn update_storage(&self, id: &str, storage: &StoragePointer) -> Result<(), PersistenceError> {
        delegate!(self, update_storage(id, storage))
    }
}

impl InteractionRepository for Repository {
    async fn add_comment(&self, comment: &NewComment) -> Result<Comment, PersistenceError> {
        delegate!(self, add_comment(comment))
    }

    async fn upsert_rating(
        &self,
        note_id: &str,
        user_id: &str,
        value: u8,
    ) -> Result<Rating, PersistenceError> {
        delegate!(self, upsert_rating(note_id, user_id, value))
    }

    async fn toggle_favorite(&self, user_id: &str, note_id: &str) -> Result<bool, PersistenceError> {
        delegate!(self, toggle_favorite(user_id, note_id))
    }

    async fn user_analytics(&self, user_id: &str) -> Result<UserAnalytics, PersistenceError> {
        delegate!(self, user_analytics(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::Database;

    #[test]
    fn test_unconfigured_store_selects_relational() {
        let selector = BackendSelector::initialize(None);
        assert!(!selector.document_store_available());
        assert_eq!(selector.kind(), BackendKind::Relational);
        assert!(matches!(
            selector.document_store(),
            Err(PersistenceError::BackendUnavailable(_))
        ));
    }

    #[test]
    fn test_unusable_store_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "file in the way").unwrap();
        let selector = BackendSelector::initialize(Some(&blocker));
        assert_eq!(selector.kind(), BackendKind::Relational);
    }

    #[tokio::test]
    async fn test_repository_follows_selection() {
        let db = Database::new_in_memory().await.unwrap();
        let dir = tempfile::tempdir().unwrap();

        let selector = BackendSelector::initialize(Some(dir.path()));
        assert!(selector.document_store_available());
        assert_eq!(selector.repository(db.pool()).kind(), BackendKind::Document);

        let relational = BackendSelector::default();
        assert_eq!(relational.repository(db.pool()).kind(), BackendKind::Relational);
    }
}
