//! Async repository trait definitions for the persistence layer.
//!
//! Each trait abstracts over one area of the application, so the relational
//! and document backends can be swapped without route code noticing. Both
//! implementations must agree on filtering, ordering (newest first unless
//! stated otherwise) and aggregates (mean rating, `0.0` when unrated).
//!
//! Methods return `impl Future + Send` rather than using `async fn` so that
//! the futures are guaranteed `Send` for axum handlers and `tokio::spawn`.

use std::future::Future;

use super::PersistenceError;
use crate::model::{
    College, Comment, Department, NewComment, NewNote, NewUser, Note, NoteDetail, NoteFilter,
    NoteSummary, ProfileUpdate, Rating, StoragePointer, Subject, User, UserAnalytics,
};

/// Maximum number of hits returned by [`AcademicRepository::search_subjects`].
pub const SUBJECT_SEARCH_LIMIT: usize = 20;

/// Colleges, departments and subjects.
///
/// Names are unique within their parent; creating a duplicate yields
/// [`PersistenceError::Conflict`], an unknown parent yields
/// [`PersistenceError::NotFound`]. Listings are sorted by name.
pub trait AcademicRepository: Send + Sync {
    fn list_colleges(&self) -> impl Future<Output = Result<Vec<College>, PersistenceError>> + Send;
    fn list_departments(
        &self,
        college_id: &str,
    ) -> impl Future<Output = Result<Vec<Department>, PersistenceError>> + Send;
    fn list_subjects(
        &self,
        department_id: &str,
    ) -> impl Future<Output = Result<Vec<Subject>, PersistenceError>> + Send;
    /// Case-insensitive substring match, at most [`SUBJECT_SEARCH_LIMIT`] hits.
    fn search_subjects(
        &self,
        query: &str,
        department_id: Option<&str>,
    ) -> impl Future<Output = Result<Vec<Subject>, PersistenceError>> + Send;
    fn create_college(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<College, PersistenceError>> + Send;
    fn create_department(
        &self,
        name: &str,
        college_id: &str,
    ) -> impl Future<Output = Result<Department, PersistenceError>> + Send;
    fn create_subject(
        &self,
        name: &str,
        department_id: &str,
    ) -> impl Future<Output = Result<Subject, PersistenceError>> + Send;
}

/// Registered accounts. Emails are globally unique.
pub trait UserRepository: Send + Sync {
    fn create_user(
        &self,
        user: &NewUser,
    ) -> impl Future<Output = Result<User, PersistenceError>> + Send;
    fn find_user_by_email(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<Option<User>, PersistenceError>> + Send;
    fn load_user(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<User>, PersistenceError>> + Send;
    fn update_profile(
        &self,
        id: &str,
        update: &ProfileUpdate,
    ) -> impl Future<Output = Result<User, PersistenceError>> + Send;
}

/// Uploaded notes and their subject links.
pub trait NoteRepository: Send + Sync {
    fn create_note(
        &self,
        note: &NewNote,
    ) -> impl Future<Output = Result<Note, PersistenceError>> + Send;
    fn list_notes(
        &self,
        filter: &NoteFilter,
    ) -> impl Future<Output = Result<Vec<NoteSummary>, PersistenceError>> + Send;
    fn load_note(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<NoteDetail>, PersistenceError>> + Send;
    fn list_uploads(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Vec<NoteSummary>, PersistenceError>> + Send;
    fn list_favorites(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Vec<NoteSummary>, PersistenceError>> + Send;
    fn update_storage(
        &self,
        id: &str,
        storage: &StoragePointer,
    ) -> impl Future<Output = Result<(), PersistenceError>> + Send;
}

/// Comments, ratings and favorites.
///
/// Ratings are upserted per (note, user): the last submission wins.
/// Favorites toggle: the returned flag is the state after the call.
pub trait InteractionRepository: Send + Sync {
    fn add_comment(
        &self,
        comment: &NewComment,
    ) -> impl Future<Output = Result<Comment, PersistenceError>> + Send;
    fn upsert_rating(
        &self,
        note_id: &str,
        user_id: &str,
        value: u8,
    ) -> impl Future<Output = Result<Rating, PersistenceError>> + Send;
    fn toggle_favorite(
        &self,
        user_id: &str,
        note_id: &str,
    ) -> impl Future<Output = Result<bool, PersistenceError>> + Send;
    fn user_analytics(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<UserAnalytics, PersistenceError>> + Send;
}
