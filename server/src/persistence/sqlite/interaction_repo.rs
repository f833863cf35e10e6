use crate::model::{
    comment_activity_title, latest_activity, ActivityEntry, ActivityKind, Comment, NewComment,
    Rating, UserAnalytics, UserStats, ACTIVITY_LIMIT,
};
use crate::persistence::traits::InteractionRepository;
use crate::persistence::{now_timestamp, validate_comment_text, validate_rating, PersistenceError};

use super::helpers::{format_id, map_constraint, parse_reference};
use super::SqliteRepository;

impl InteractionRepository for SqliteRepository {
    async fn add_comment(&self, comment: &NewComment) -> Result<Comment, PersistenceError> {
        let text = validate_comment_text(&comment.text)?;
        let note_id = parse_reference(&comment.note_id, "note")?;
        let user_id = parse_reference(&comment.user_id, "user")?;

        let id = sqlx::query(
            "INSERT INTO comments (note_id, user_id, text, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(note_id)
        .bind(user_id)
        .bind(&text)
        .bind(comment.created_at as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| map_constraint(e, &format!("comment on note {note_id}")))?
        .last_insert_rowid();

        Ok(Comment {
            id: format_id(id),
            note_id: format_id(note_id),
            user_id: format_id(user_id),
            text,
            created_at: comment.created_at,
        })
    }

    async fn upsert_rating(
        &self,
        note_id: &str,
        user_id: &str,
        value: u8,
    ) -> Result<Rating, PersistenceError> {
        let value = validate_rating(value)?;
        let note = parse_reference(note_id, "note")?;
        let user = parse_reference(user_id, "user")?;

        let (id, created_at): (i64, i64) = sqlx::query_as(
            r#"
            INSERT INTO ratings (note_id, user_id, rating, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (note_id, user_id) DO UPDATE SET rating = excluded.rating
            RETURNING id, created_at
            "#,
        )
        .bind(note)
        .bind(user)
        .bind(i64::from(value))
        .bind(now_timestamp() as i64)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_constraint(e, &format!("rating on note {note}")))?;

        Ok(Rating {
            id: format_id(id),
            note_id: format_id(note),
            user_id: format_id(user),
            value,
            created_at: created_at as u64,
        })
    }

    async fn toggle_favorite(&self, user_id: &str, note_id: &str) -> Result<bool, PersistenceError> {
        let user = parse_reference(user_id, "user")?;
        let note = parse_reference(note_id, "note")?;

        let mut tx = self.pool.begin().await?;
        let removed = sqlx::query("DELETE FROM favorites WHERE user_id = ? AND note_id = ?")
            .bind(user)
            .bind(note)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let favorited = if removed > 0 {
            false
        } else {
            sqlx::query("INSERT INTO favorites (user_id, note_id, created_at) VALUES (?, ?, ?)")
                .bind(user)
                .bind(note)
                .bind(now_timestamp() as i64)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_constraint(e, &format!("favorite on note {note}")))?;
            true
        };
        tx.commit().await?;
        Ok(favorited)
    }

    async fn user_analytics(&self, user_id: &str) -> Result<UserAnalytics, PersistenceError> {
        let (total_notes,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM notes")
            .fetch_one(&self.pool)
            .await?;
        let Ok(user) = parse_reference(user_id, "user") else {
            return Ok(UserAnalytics {
                stats: UserStats {
                    total_notes: total_notes as u64,
                    ..UserStats::default()
                },
                activity: vec![],
            });
        };

        let (uploads, favorites, comments): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT (SELECT COUNT(*) FROM notes WHERE uploaded_by = ?1),
                   (SELECT COUNT(*) FROM favorites WHERE user_id = ?1),
                   (SELECT COUNT(*) FROM comments WHERE user_id = ?1)
            "#,
        )
        .bind(user)
        .fetch_one(&self.pool)
        .await?;

        let recent_uploads: Vec<(String, i64)> = sqlx::query_as(
            "SELECT title, created_at FROM notes WHERE uploaded_by = ? ORDER BY created_at DESC LIMIT ?",
        )
        .bind(user)
        .bind(ACTIVITY_LIMIT as i64)
        .fetch_all(&self.pool)
        .await?;

        let recent_comments: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT n.title, c.created_at
            FROM comments c
            JOIN notes n ON n.id = c.note_id
            WHERE c.user_id = ?
            ORDER BY c.created_at DESC
            LIMIT ?
            "#,
        )
        .bind(user)
        .bind(ACTIVITY_LIMIT as i64)
        .fetch_all(&self.pool)
        .await?;

        let activity: Vec<ActivityEntry> = recent_uploads
            .into_iter()
            .map(|(title, date)| ActivityEntry {
                kind: ActivityKind::Upload,
                title,
                date: date as u64,
            })
            .chain(recent_comments.into_iter().map(|(title, date)| ActivityEntry {
                kind: ActivityKind::Comment,
                title: comment_activity_title(&title),
                date: date as u64,
            }))
            .collect();

        Ok(UserAnalytics {
            stats: UserStats {
                total_notes: total_notes as u64,
                user_uploads: uploads as u64,
                user_favorites: favorites as u64,
                user_comments: comments as u64,
            },
            activity: latest_activity(activity),
        })
    }
}
