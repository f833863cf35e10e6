use serde::Serialize;
use tracing::{info, warn};

use super::{unix_seconds, IdRemap, MigrationError, Migrator};
use crate::persistence::document::schema::{
    favorite_id, imported_comment_id, rating_id, CommentDoc, FavoriteDoc, RatingDoc, COMMENTS,
    FAVORITES, RATINGS, SEQUENCE,
};
use crate::persistence::DocumentStore;
use crate::storage::ObjectStorage;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionsReport {
    pub skipped: bool,
    pub comments: u64,
    pub ratings: u64,
    pub favorites: u64,
    /// Records whose note had no migrated counterpart; they point at the
    /// stringified relational key instead.
    pub unmapped_notes: u64,
}

impl InteractionsReport {
    pub(crate) fn resumed() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }
}

impl<O: ObjectStorage> Migrator<O> {
    pub(crate) async fn interactions_step(
        &self,
        store: &DocumentStore,
        remap: &mut IdRemap,
    ) -> Result<InteractionsReport, MigrationError> {
        remap.ensure_notes(store)?;

        let comments: Vec<(i64, i64, i64, String, i64)> = sqlx::query_as(
            "SELECT id, note_id, user_id, text, created_at FROM comments ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        let ratings: Vec<(i64, i64, i64, i64, i64)> = sqlx::query_as(
            "SELECT id, note_id, user_id, rating, created_at FROM ratings ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        let favorites: Vec<(i64, i64, i64)> =
            sqlx::query_as("SELECT note_id, user_id, created_at FROM favorites ORDER BY id")
                .fetch_all(&self.pool)
                .await?;

        info!(
            comments = comments.len(),
            ratings = ratings.len(),
            favorites = favorites.len(),
            "Migrating interactions"
        );

        let mut report = InteractionsReport::default();
        let mut note_id = |relational: i64| match remap.notes.get(&relational) {
            Some(id) => id.clone(),
            None => {
                warn!(note_id = relational, "No migrated note, keeping relational key");
                report.unmapped_notes += 1;
                relational.to_string()
            }
        };

        // Every write lands on an ID derived from the source row or the
        // (note, user) pair, so running the step again overwrites in place.
        let mut next_sequence = store.next_sequence(COMMENTS, SEQUENCE)?;
        let mut written = (0u64, 0u64, 0u64);
        for (id, note, user, text, created_at) in comments {
            let doc_id = imported_comment_id(id);
            let sequence = match store.get::<CommentDoc>(COMMENTS, &doc_id)? {
                Some(existing) => existing.data.sequence,
                None => {
                    next_sequence += 1;
                    next_sequence - 1
                }
            };
            let doc = CommentDoc {
                note_id: note_id(note),
                user_id: IdRemap::user(user),
                comment: text,
                created_at: unix_seconds(created_at),
                sequence,
            };
            store.set(COMMENTS, &doc_id, &doc)?;
            written.0 += 1;
        }
        for (id, note, user, rating, created_at) in ratings {
            let rating = u8::try_from(rating).map_err(|_| MigrationError::OutOfRange {
                entity: "rating",
                relational_id: id,
                field: "rating",
                value: rating,
                max: 5,
            })?;
            let doc = RatingDoc {
                note_id: note_id(note),
                user_id: IdRemap::user(user),
                rating,
                created_at: unix_seconds(created_at),
            };
            store.set(RATINGS, &rating_id(&doc.note_id, &doc.user_id), &doc)?;
            written.1 += 1;
        }
        for (note, user, created_at) in favorites {
            let doc = FavoriteDoc {
                user_id: IdRemap::user(user),
                note_id: note_id(note),
                created_at: unix_seconds(created_at),
            };
            store.set(FAVORITES, &favorite_id(&doc.user_id, &doc.note_id), &doc)?;
            written.2 += 1;
        }

        report.comments = written.0;
        report.ratings = written.1;
        report.favorites = written.2;
        Ok(report)
    }
}
