//! Document-store backend.
//!
//! [`DocumentStore`] is the raw collection/document layer; [`DocumentRepository`]
//! implements the repository traits on top of it. The store has no joins or
//! aggregates, so listings fetch the candidate notes with equality filters and
//! fold ratings and comments in memory.

mod academic_repo;
mod interaction_repo;
mod note_repo;
pub mod schema;
mod store;
mod user_repo;

pub use store::{Document, DocumentStore, Query};

/// Document-backed implementation of all repository traits.
#[derive(Debug, Clone)]
pub struct DocumentRepository {
    store: DocumentStore,
}

impl DocumentRepository {
    pub fn new(store: DocumentStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }
}
