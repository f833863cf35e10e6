use serde::Serialize;
use tracing::warn;

use super::Migrator;
use crate::persistence::document::schema::NOTES;
use crate::storage::{count_local_pdfs, ObjectStorage};

/// Read-only snapshot used by operators to decide when to migrate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationStatus {
    #[serde(rename = "firebaseBackend")]
    pub document_backend: bool,
    pub object_storage: bool,
    pub relational_has_data: bool,
    pub document_has_data: bool,
    pub local_files: u64,
}

impl<O: ObjectStorage> Migrator<O> {
    /// Never fails: anything that cannot be inspected reports `false` / `0`.
    pub async fn status(&self) -> MigrationStatus {
        let relational_has_data =
            match sqlx::query_as::<_, (i64,)>("SELECT EXISTS (SELECT 1 FROM notes)")
                .fetch_one(&self.pool)
                .await
            {
                Ok((found,)) => found != 0,
                Err(e) => {
                    warn!(error = %e, "Could not inspect relational store");
                    false
                }
            };

        let document_has_data = match &self.documents {
            Some(store) => match store.is_empty(NOTES) {
                Ok(empty) => !empty,
                Err(e) => {
                    warn!(error = %e, "Could not inspect document store");
                    false
                }
            },
            None => false,
        };

        let local_files = match count_local_pdfs(&self.uploads_dir).await {
            Ok(n) => n,
            Err(e) => {
                warn!(dir = %self.uploads_dir.display(), error = %e, "Could not count local files");
                0
            }
        };

        MigrationStatus {
            document_backend: self.documents.is_some(),
            object_storage: self.object_storage.is_some(),
            relational_has_data,
            document_has_data,
            local_files,
        }
    }
}
