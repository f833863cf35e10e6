use std::path::PathBuf;

use serde::Serialize;
use tracing::{info, warn};

use super::{unix_seconds, IdRemap, MigrationError, Migrator, Resolver};
use crate::model::{StorageKind, StoragePointer, MAX_EDUCATION_YEAR, MAX_SEMESTER};
use crate::persistence::document::schema::{NoteDoc, NOTES, SEQUENCE};
use crate::persistence::sqlite::helpers::{NoteRow, NOTE_SUMMARY_SELECT};
use crate::persistence::DocumentStore;
use crate::storage::ObjectStorage;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotesReport {
    pub skipped: bool,
    pub migrated_count: u64,
    /// Notes already present from an earlier run, left untouched.
    pub already_migrated: u64,
    #[serde(rename = "filesMigratedToR2")]
    pub files_migrated_to_object_store: u64,
    pub files_kept_local: u64,
    pub dropped_references: u64,
}

impl NotesReport {
    pub(crate) fn resumed() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }
}

enum Relocation {
    /// Uploaded; the local copy at the path is removed once the note is saved.
    Moved(StoragePointer, PathBuf),
    KeptLocal,
    NotApplicable,
}

impl<O: ObjectStorage> Migrator<O> {
    pub(crate) async fn notes_step(
        &self,
        store: &DocumentStore,
        remap: &mut IdRemap,
    ) -> Result<NotesReport, MigrationError> {
        remap.ensure_academic(store)?;
        remap.ensure_notes(store)?;

        let rows: Vec<NoteRow> = sqlx::query_as(&format!("{NOTE_SUMMARY_SELECT} ORDER BY n.id"))
            .fetch_all(&self.pool)
            .await?;
        info!(
            notes = rows.len(),
            object_storage = self.object_storage.is_some(),
            "Migrating notes"
        );

        let mut resolver = Resolver::new(self.policy);
        let mut report = NotesReport::default();
        let mut sequence = store.next_sequence(NOTES, SEQUENCE)?;

        for row in rows {
            if remap.notes.contains_key(&row.id) {
                report.already_migrated += 1;
                continue;
            }
            let new_id = DocumentStore::new_id();

            let college_id =
                resolver.resolve(&remap.colleges, row.college_id, "note", row.id, "collegeId")?;
            let department_id = resolver.resolve(
                &remap.departments,
                row.department_id,
                "note",
                row.id,
                "departmentId",
            )?;
            let mut subject_ids = Vec::new();
            for subject in relational_subject_ids(row.subject_ids.as_deref()) {
                if let Some(id) =
                    resolver.resolve(&remap.subjects, Some(subject), "note", row.id, "subjectIds")?
                {
                    subject_ids.push(id);
                }
            }
            let education_year = resolver.level(
                row.education_year,
                MAX_EDUCATION_YEAR,
                "note",
                row.id,
                "educationYear",
            )?;
            let semester = resolver.level(row.semester, MAX_SEMESTER, "note", row.id, "semester")?;

            let mut pointer = StoragePointer {
                file_url: row.file_url,
                storage_kind: StorageKind::parse(&row.storage_kind),
            };
            let mut relocated = None;
            match self.relocate(&pointer, &new_id, &row.file_name).await {
                Relocation::Moved(moved, local) => {
                    pointer = moved;
                    relocated = Some(local);
                }
                Relocation::KeptLocal => {
                    pointer.storage_kind = StorageKind::Local;
                    report.files_kept_local += 1;
                }
                Relocation::NotApplicable => {}
            }

            let doc = NoteDoc {
                title: row.title,
                description: row.description,
                file_name: row.file_name,
                file_url: pointer.file_url,
                storage_type: pointer.storage_kind,
                uploaded_by: IdRemap::user(row.uploaded_by),
                college_id,
                department_id,
                education_year,
                semester,
                subject_ids,
                relational_id: Some(row.id),
                created_at: unix_seconds(row.created_at),
                sequence,
            };
            if let Err(e) = store.set(NOTES, &new_id, &doc) {
                if relocated.is_some() {
                    self.discard_upload(&new_id).await;
                }
                return Err(e.into());
            }
            if let Some(local) = relocated {
                report.files_migrated_to_object_store += 1;
                if let Err(e) = tokio::fs::remove_file(&local).await {
                    warn!(path = %local.display(), error = %e, "Failed to remove relocated local file");
                }
            }
            sequence += 1;
            remap.notes.insert(row.id, new_id);
            report.migrated_count += 1;
        }
        remap.notes_filled();

        report.dropped_references = resolver.dropped();
        Ok(report)
    }

    /// Copy a local `/uploads/` file into object storage under the new note ID.
    /// Any failure keeps the local pointer. The local file is left in place.
    async fn relocate(&self, pointer: &StoragePointer, note_id: &str, file_name: &str) -> Relocation {
        let Some(file) = pointer.local_file_name() else {
            return Relocation::NotApplicable;
        };
        let Some(storage) = &self.object_storage else {
            return Relocation::KeptLocal;
        };
        let path = self.uploads_dir.join(file);

        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Local file unreadable, keeping local pointer");
                return Relocation::KeptLocal;
            }
        };
        match storage.upload_pdf(&data, note_id, file_name).await {
            Ok(url) => Relocation::Moved(StoragePointer::object_store(url), path),
            Err(e) => {
                warn!(note_id, error = %e, "Object storage upload failed, keeping local pointer");
                Relocation::KeptLocal
            }
        }
    }

    /// Remove an upload whose note document never got written.
    async fn discard_upload(&self, note_id: &str) {
        if let Some(storage) = &self.object_storage {
            if !storage.delete_pdf(note_id).await {
                warn!(note_id, "Could not remove orphaned upload");
            }
        }
    }
}

fn relational_subject_ids(concatenated: Option<&str>) -> Vec<i64> {
    concatenated
        .unwrap_or_default()
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect()
}
