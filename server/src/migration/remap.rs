use std::collections::BTreeMap;

use serde::de::DeserializeOwned;

use crate::persistence::document::schema::{
    CollegeDoc, DepartmentDoc, Imported, NoteDoc, SubjectDoc, COLLEGES, DEPARTMENTS, NOTES,
    SUBJECTS,
};
use crate::persistence::{DocumentStore, PersistenceError};

/// Relational key → document ID tables, filled by the steps that create the
/// documents and read by the steps that reference them.
///
/// Users are absent on purpose: a migrated user keeps its relational key as
/// its document ID, see [`IdRemap::user`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdRemap {
    pub colleges: BTreeMap<i64, String>,
    pub departments: BTreeMap<i64, String>,
    pub subjects: BTreeMap<i64, String>,
    pub notes: BTreeMap<i64, String>,
    academic_loaded: bool,
    notes_loaded: bool,
}

impl IdRemap {
    pub fn user(relational_id: i64) -> String {
        relational_id.to_string()
    }

    /// Mark the academic tables as complete after the academic step filled them.
    pub(crate) fn academic_filled(&mut self) {
        self.academic_loaded = true;
    }

    pub(crate) fn notes_filled(&mut self) {
        self.notes_loaded = true;
    }

    /// Rebuild the college, department and subject tables from the document
    /// store unless a step in this run already filled them.
    pub fn ensure_academic(&mut self, store: &DocumentStore) -> Result<(), PersistenceError> {
        if self.academic_loaded {
            return Ok(());
        }
        self.colleges = imported::<CollegeDoc>(store, COLLEGES)?;
        self.departments = imported::<DepartmentDoc>(store, DEPARTMENTS)?;
        self.subjects = imported::<SubjectDoc>(store, SUBJECTS)?;
        self.academic_loaded = true;
        Ok(())
    }

    pub fn ensure_notes(&mut self, store: &DocumentStore) -> Result<(), PersistenceError> {
        if self.notes_loaded {
            return Ok(());
        }
        self.notes = imported::<NoteDoc>(store, NOTES)?;
        self.notes_loaded = true;
        Ok(())
    }
}

fn imported<T: DeserializeOwned + Imported>(
    store: &DocumentStore,
    collection: &str,
) -> Result<BTreeMap<i64, String>, PersistenceError> {
    Ok(store
        .all::<T>(collection)?
        .into_iter()
        .filter_map(|doc| doc.data.relational_id().map(|rid| (rid, doc.id)))
        .collect())
}
