use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::model::{
    average_rating, Comment, NewNote, Note, NoteDetail, NoteFilter, NoteSummary, StoragePointer,
    Subject,
};
use crate::persistence::traits::NoteRepository;
use crate::persistence::PersistenceError;

use super::schema::{
    CommentDoc, FavoriteDoc, NoteDoc, RatingDoc, SubjectDoc, COMMENTS, FAVORITES, NOTES, RATINGS,
    SEQUENCE, SUBJECTS,
};
use super::{Document, DocumentRepository, Query};

#[derive(Default)]
struct Tally {
    ratings: Vec<u8>,
    comments: u64,
}

impl DocumentRepository {
    /// Attach rating and comment aggregates, newest note first. Notes from the
    /// same second keep insertion order, latest first.
    fn summarize(
        &self,
        mut notes: Vec<Document<NoteDoc>>,
    ) -> Result<Vec<NoteSummary>, PersistenceError> {
        notes.sort_by(|a, b| {
            (b.data.created_at, b.data.sequence).cmp(&(a.data.created_at, a.data.sequence))
        });

        let mut tallies: HashMap<String, Tally> = HashMap::new();
        for rating in self.store.all::<RatingDoc>(RATINGS)? {
            tallies
                .entry(rating.data.note_id)
                .or_default()
                .ratings
                .push(rating.data.rating);
        }
        for comment in self.store.all::<CommentDoc>(COMMENTS)? {
            tallies.entry(comment.data.note_id).or_default().comments += 1;
        }

        Ok(notes
            .into_iter()
            .map(|doc| {
                let note = Note::from(doc);
                let tally = tallies.remove(&note.id).unwrap_or_default();
                NoteSummary {
                    average_rating: average_rating(&tally.ratings),
                    rating_count: tally.ratings.len() as u64,
                    comment_count: tally.comments,
                    note,
                }
            })
            .collect())
    }
}

impl NoteRepository for DocumentRepository {
    async fn create_note(&self, note: &NewNote) -> Result<Note, PersistenceError> {
        let doc = NoteDoc {
            title: note.title.clone(),
            description: note.description.clone(),
            file_name: note.file_name.clone(),
            file_url: note.storage.file_url.clone(),
            storage_type: note.storage.storage_kind,
            uploaded_by: note.uploaded_by.clone(),
            college_id: note.affiliation.college_id.clone(),
            department_id: note.affiliation.department_id.clone(),
            education_year: note.affiliation.education_year,
            semester: note.affiliation.semester,
            subject_ids: note.subject_ids.iter().cloned().collect(),
            relational_id: None,
            created_at: note.created_at,
            sequence: self.store.next_sequence(NOTES, SEQUENCE)?,
        };
        let id = self.store.create(NOTES, &doc)?;
        Ok(Document { id, data: doc }.into())
    }

    async fn list_notes(&self, filter: &NoteFilter) -> Result<Vec<NoteSummary>, PersistenceError> {
        // Equality filters are pushed into the store query; the any-of subject
        // filter needs an array field match, which the query also supports.
        let mut query = Query::new();
        if let Some(college) = &filter.college_id {
            query = query.eq("collegeId", college.as_str());
        }
        if let Some(dept) = &filter.department_id {
            query = query.eq("departmentId", dept.as_str());
        }
        if let Some(year) = filter.education_year {
            query = query.eq("educationYear", year);
        }
        if let Some(semester) = filter.semester {
            query = query.eq("semester", semester);
        }
        if !filter.subject_ids.is_empty() {
            query = query.array_contains_any("subjectIds", filter.subject_ids.iter().map(String::as_str));
        }
        let notes = self.store.find::<NoteDoc>(NOTES, &query)?;
        self.summarize(notes)
    }

    async fn load_note(&self, id: &str) -> Result<Option<NoteDetail>, PersistenceError> {
        let Some(doc) = self.store.get::<NoteDoc>(NOTES, id)? else {
            return Ok(None);
        };
        let note = Note::from(doc);

        let mut subjects = Vec::new();
        for subject_id in &note.subject_ids {
            if let Some(subject) = self.store.get::<SubjectDoc>(SUBJECTS, subject_id)? {
                subjects.push(Subject::from(subject));
            }
        }
        subjects.sort_by(|a, b| a.name.cmp(&b.name));

        let mut comments = self
            .store
            .find::<CommentDoc>(COMMENTS, &Query::new().eq("noteId", id))?;
        comments.sort_by(|a, b| {
            (b.data.created_at, b.data.sequence).cmp(&(a.data.created_at, a.data.sequence))
        });
        let comments: Vec<Comment> = comments.into_iter().map(Comment::from).collect();

        let ratings: Vec<u8> = self
            .store
            .find::<RatingDoc>(RATINGS, &Query::new().eq("noteId", id))?
            .into_iter()
            .map(|r| r.data.rating)
            .collect();

        Ok(Some(NoteDetail {
            summary: NoteSummary {
                average_rating: average_rating(&ratings),
                rating_count: ratings.len() as u64,
                comment_count: comments.len() as u64,
                note,
            },
            subjects,
            comments,
        }))
    }

    async fn list_uploads(&self, user_id: &str) -> Result<Vec<NoteSummary>, PersistenceError> {
        let notes = self
            .store
            .find::<NoteDoc>(NOTES, &Query::new().eq("uploadedBy", user_id))?;
        self.summarize(notes)
    }

    async fn list_favorites(&self, user_id: &str) -> Result<Vec<NoteSummary>, PersistenceError> {
        let favorites = self
            .store
            .find::<FavoriteDoc>(FAVORITES, &Query::new().eq("userId", user_id))?;
        let mut notes = Vec::with_capacity(favorites.len());
        for fav in favorites {
            if let Some(doc) = self.store.get::<NoteDoc>(NOTES, &fav.data.note_id)? {
                notes.push(doc);
            }
        }
        self.summarize(notes)
    }

    async fn update_storage(&self, id: &str, storage: &StoragePointer) -> Result<(), PersistenceError> {
        let mut patch = Map::new();
        patch.insert("fileUrl".into(), Value::from(storage.file_url.clone()));
        patch.insert("storageType".into(), Value::from(storage.storage_kind.as_str()));
        if !self.store.update(NOTES, id, patch)? {
            return Err(PersistenceError::NotFound(format!("note {id}")));
        }
        Ok(())
    }
}
