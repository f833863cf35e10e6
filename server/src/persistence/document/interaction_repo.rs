use serde_json::{Map, Value};

use crate::model::{
    comment_activity_title, latest_activity, ActivityEntry, ActivityKind, Comment, NewComment,
    Rating, UserAnalytics, UserStats,
};
use crate::persistence::traits::InteractionRepository;
use crate::persistence::{now_timestamp, validate_comment_text, validate_rating, PersistenceError};

use super::schema::{
    favorite_id, rating_id, CommentDoc, FavoriteDoc, NoteDoc, RatingDoc, COMMENTS, FAVORITES,
    NOTES, RATINGS, SEQUENCE,
};
use super::{Document, DocumentRepository, Query};

impl InteractionRepository for DocumentRepository {
    async fn add_comment(&self, comment: &NewComment) -> Result<Comment, PersistenceError> {
        let text = validate_comment_text(&comment.text)?;
        if self.store.get::<NoteDoc>(NOTES, &comment.note_id)?.is_none() {
            return Err(PersistenceError::NotFound(format!("note {}", comment.note_id)));
        }
        let doc = CommentDoc {
            note_id: comment.note_id.clone(),
            user_id: comment.user_id.clone(),
            comment: text,
            created_at: comment.created_at,
            sequence: self.store.next_sequence(COMMENTS, SEQUENCE)?,
        };
        let id = self.store.create(COMMENTS, &doc)?;
        Ok(Document { id, data: doc }.into())
    }

    async fn upsert_rating(
        &self,
        note_id: &str,
        user_id: &str,
        value: u8,
    ) -> Result<Rating, PersistenceError> {
        let value = validate_rating(value)?;
        let existing = self.store.find::<RatingDoc>(
            RATINGS,
            &Query::new().eq("noteId", note_id).eq("userId", user_id),
        )?;

        if let Some(current) = existing.into_iter().next() {
            let mut patch = Map::new();
            patch.insert("rating".into(), Value::from(value));
            self.store.update(RATINGS, &current.id, patch)?;
            return Ok(Rating {
                id: current.id,
                note_id: current.data.note_id,
                user_id: current.data.user_id,
                value,
                created_at: current.data.created_at,
            });
        }

        if self.store.get::<NoteDoc>(NOTES, note_id)?.is_none() {
            return Err(PersistenceError::NotFound(format!("note {note_id}")));
        }
        let doc = RatingDoc {
            note_id: note_id.to_string(),
            user_id: user_id.to_string(),
            rating: value,
            created_at: now_timestamp(),
        };
        let id = rating_id(note_id, user_id);
        self.store.set(RATINGS, &id, &doc)?;
        Ok(Document { id, data: doc }.into())
    }

    async fn toggle_favorite(&self, user_id: &str, note_id: &str) -> Result<bool, PersistenceError> {
        let existing = self.store.find::<FavoriteDoc>(
            FAVORITES,
            &Query::new().eq("userId", user_id).eq("noteId", note_id),
        )?;
        if !existing.is_empty() {
            for fav in existing {
                self.store.delete(FAVORITES, &fav.id)?;
            }
            return Ok(false);
        }

        if self.store.get::<NoteDoc>(NOTES, note_id)?.is_none() {
            return Err(PersistenceError::NotFound(format!("note {note_id}")));
        }
        let doc = FavoriteDoc {
            user_id: user_id.to_string(),
            note_id: note_id.to_string(),
            created_at: now_timestamp(),
        };
        self.store.set(FAVORITES, &favorite_id(user_id, note_id), &doc)?;
        Ok(true)
    }

    async fn user_analytics(&self, user_id: &str) -> Result<UserAnalytics, PersistenceError> {
        let total_notes = self.store.count(NOTES)?;
        let uploads = self
            .store
            .find::<NoteDoc>(NOTES, &Query::new().eq("uploadedBy", user_id))?;
        let favorites = self
            .store
            .find::<FavoriteDoc>(FAVORITES, &Query::new().eq("userId", user_id))?;
        let comments = self
            .store
            .find::<CommentDoc>(COMMENTS, &Query::new().eq("userId", user_id))?;

        let mut activity: Vec<ActivityEntry> = uploads
            .iter()
            .map(|n| ActivityEntry {
                kind: ActivityKind::Upload,
                title: n.data.title.clone(),
                date: n.data.created_at,
            })
            .collect();
        for comment in &comments {
            // Comments on deleted notes have nothing to show.
            if let Some(note) = self.store.get::<NoteDoc>(NOTES, &comment.data.note_id)? {
                activity.push(ActivityEntry {
                    kind: ActivityKind::Comment,
                    title: comment_activity_title(&note.data.title),
                    date: comment.data.created_at,
                });
            }
        }

        Ok(UserAnalytics {
            stats: UserStats {
                total_notes,
                user_uploads: uploads.len() as u64,
                user_favorites: favorites.len() as u64,
                user_comments: comments.len() as u64,
            },
            activity: latest_activity(activity),
        })
    }
}
