use sqlx::{QueryBuilder, Sqlite};

use crate::model::{
    Comment, NewNote, Note, NoteDetail, NoteFilter, NoteSummary, StoragePointer, Subject,
};
use crate::persistence::traits::NoteRepository;
use crate::persistence::PersistenceError;

use super::helpers::{
    format_id, map_constraint, parse_optional_id, NoteRow, NOTE_ORDER, NOTE_SUMMARY_SELECT,
};
use super::SqliteRepository;

impl SqliteRepository {
    async fn load_summary(&self, id: i64) -> Result<Option<NoteSummary>, PersistenceError> {
        let row: Option<NoteRow> = sqlx::query_as(&format!("{NOTE_SUMMARY_SELECT} WHERE n.id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(NoteSummary::from))
    }
}

/// Push `AND <column> = ?` for a reference filter. Returns false when the
/// value cannot name a row, meaning the whole listing is empty.
fn push_reference(qb: &mut QueryBuilder<'_, Sqlite>, column: &str, value: &Option<String>) -> bool {
    match value.as_deref() {
        None => true,
        Some(raw) => match parse_optional_id(Some(raw)) {
            Ok(Some(id)) => {
                qb.push(format!(" AND {column} = ")).push_bind(id);
                true
            }
            _ => false,
        },
    }
}

impl NoteRepository for SqliteRepository {
    async fn create_note(&self, note: &NewNote) -> Result<Note, PersistenceError> {
        let a = &note.affiliation;
        let uploaded_by = parse_optional_id(Some(&note.uploaded_by))?
            .ok_or_else(|| PersistenceError::InvalidId(note.uploaded_by.clone()))?;
        let subject_ids = note
            .subject_ids
            .iter()
            .map(|s| {
                parse_optional_id(Some(s))?.ok_or_else(|| PersistenceError::InvalidId(s.clone()))
            })
            .collect::<Result<Vec<i64>, _>>()?;

        let mut tx = self.pool.begin().await?;

        let id = sqlx::query(
            r#"
            INSERT INTO notes
                (title, description, file_url, file_name, storage_kind, uploaded_by,
                 college_id, department_id, education_year, semester, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&note.title)
        .bind(&note.description)
        .bind(&note.storage.file_url)
        .bind(&note.file_name)
        .bind(note.storage.storage_kind.as_str())
        .bind(uploaded_by)
        .bind(parse_optional_id(a.college_id.as_deref())?)
        .bind(parse_optional_id(a.department_id.as_deref())?)
        .bind(a.education_year.map(i64::from))
        .bind(a.semester.map(i64::from))
        .bind(note.created_at as i64)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_constraint(e, &format!("note {:?}", note.title)))?
        .last_insert_rowid();

        for subject_id in subject_ids {
            sqlx::query("INSERT OR IGNORE INTO note_subjects (note_id, subject_id) VALUES (?, ?)")
                .bind(id)
                .bind(subject_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_constraint(e, &format!("subject {subject_id}")))?;
        }

        tx.commit().await?;

        Ok(Note {
            id: format_id(id),
            title: note.title.clone(),
            description: note.description.clone(),
            file_name: note.file_name.clone(),
            storage: note.storage.clone(),
            uploaded_by: note.uploaded_by.clone(),
            affiliation: note.affiliation.clone(),
            subject_ids: note.subject_ids.clone(),
            created_at: note.created_at,
        })
    }

    async fn list_notes(&self, filter: &NoteFilter) -> Result<Vec<NoteSummary>, PersistenceError> {
        let mut qb = QueryBuilder::<Sqlite>::new(NOTE_SUMMARY_SELECT);
        qb.push(" WHERE 1 = 1");

        if !push_reference(&mut qb, "n.college_id", &filter.college_id)
            || !push_reference(&mut qb, "n.department_id", &filter.department_id)
        {
            return Ok(vec![]);
        }
        if let Some(year) = filter.education_year {
            qb.push(" AND n.education_year = ").push_bind(i64::from(year));
        }
        if let Some(semester) = filter.semester {
            qb.push(" AND n.semester = ").push_bind(i64::from(semester));
        }
        if !filter.subject_ids.is_empty() {
            let wanted: Vec<i64> = filter
                .subject_ids
                .iter()
                .filter_map(|s| parse_optional_id(Some(s)).ok().flatten())
                .collect();
            if wanted.is_empty() {
                return Ok(vec![]);
            }
            qb.push(
                " AND EXISTS (SELECT 1 FROM note_subjects fs WHERE fs.note_id = n.id AND fs.subject_id IN (",
            );
            let mut separated = qb.separated(", ");
            for id in wanted {
                separated.push_bind(id);
            }
            separated.push_unseparated("))");
        }
        qb.push(NOTE_ORDER);

        let rows: Vec<NoteRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(NoteSummary::from).collect())
    }

    async fn load_note(&self, id: &str) -> Result<Option<NoteDetail>, PersistenceError> {
        let Ok(Some(note_id)) = parse_optional_id(Some(id)) else {
            return Ok(None);
        };
        let Some(summary) = self.load_summary(note_id).await? else {
            return Ok(None);
        };

        let subjects: Vec<(i64, String, i64)> = sqlx::query_as(
            r#"
            SELECT s.id, s.name, s.department_id
            FROM subjects s
            JOIN note_subjects ns ON ns.subject_id = s.id
            WHERE ns.note_id = ?
            ORDER BY s.name ASC
            "#,
        )
        .bind(note_id)
        .fetch_all(&self.pool)
        .await?;

        let comments: Vec<(i64, i64, i64, String, i64)> = sqlx::query_as(
            r#"
            SELECT id, note_id, user_id, text, created_at
            FROM comments
            WHERE note_id = ?
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(note_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(NoteDetail {
            summary,
            subjects: subjects
                .into_iter()
                .map(|(id, name, department_id)| Subject {
                    id: format_id(id),
                    name,
                    department_id: format_id(department_id),
                })
                .collect(),
            comments: comments
                .into_iter()
                .map(|(id, note_id, user_id, text, created_at)| Comment {
                    id: format_id(id),
                    note_id: format_id(note_id),
                    user_id: format_id(user_id),
                    text,
                    created_at: created_at as u64,
                })
                .collect(),
        }))
    }

    async fn list_uploads(&self, user_id: &str) -> Result<Vec<NoteSummary>, PersistenceError> {
        let Ok(Some(user_id)) = parse_optional_id(Some(user_id)) else {
            return Ok(vec![]);
        };
        let rows: Vec<NoteRow> = sqlx::query_as(&format!(
            "{NOTE_SUMMARY_SELECT} WHERE n.uploaded_by = ?{NOTE_ORDER}"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(NoteSummary::from).collect())
    }

    async fn list_favorites(&self, user_id: &str) -> Result<Vec<NoteSummary>, PersistenceError> {
        let Ok(Some(user_id)) = parse_optional_id(Some(user_id)) else {
            return Ok(vec![]);
        };
        let rows: Vec<NoteRow> = sqlx::query_as(&format!(
            "{NOTE_SUMMARY_SELECT} JOIN favorites f ON f.note_id = n.id WHERE f.user_id = ?{NOTE_ORDER}"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(NoteSummary::from).collect())
    }

    async fn update_storage(&self, id: &str, storage: &StoragePointer) -> Result<(), PersistenceError> {
        let Ok(Some(note_id)) = parse_optional_id(Some(id)) else {
            return Err(PersistenceError::NotFound(format!("note {id}")));
        };
        let result = sqlx::query("UPDATE notes SET file_url = ?, storage_kind = ? WHERE id = ?")
            .bind(&storage.file_url)
            .bind(storage.storage_kind.as_str())
            .bind(note_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(PersistenceError::NotFound(format!("note {id}")));
        }
        Ok(())
    }
}
