//! Relational → document migration.
//!
//! Four steps run in dependency order: academic hierarchy, users, notes (with
//! file relocation into object storage) and interactions. [`IdRemap`] carries
//! the relational-key → document-ID tables from one step to the next; a step
//! invoked on its own rebuilds the tables it needs from the `relationalId`
//! field on documents written by earlier runs.
//!
//! Every step needs the document store and refuses to start without it.
//! Per-file relocation failures are recovered (the note keeps its local
//! pointer); any other per-record failure aborts the step, leaving earlier
//! writes in place. Completed steps are recorded in a manifest so that
//! [`Migrator::run_full_migration`] can resume after a failure.

mod academic;
mod interactions;
mod manifest;
mod notes;
mod remap;
mod status;
mod users;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::persistence::{DocumentStore, PersistenceError};
use crate::storage::{FilesystemObjectStorage, ObjectStorage};

pub use academic::AcademicReport;
pub use interactions::InteractionsReport;
pub use manifest::{MigrationManifest, MigrationStep};
pub use notes::NotesReport;
pub use remap::IdRemap;
pub use status::MigrationStatus;
pub use users::UsersReport;

#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("{0} is not configured")]
    BackendUnavailable(&'static str),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error("SQLite error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("{entity} {relational_id}: {field} {target} has no migrated counterpart")]
    UnresolvedReference {
        entity: &'static str,
        relational_id: i64,
        field: &'static str,
        target: i64,
    },
    #[error("{entity} {relational_id}: {field} {value} is outside 1..={max}")]
    OutOfRange {
        entity: &'static str,
        relational_id: i64,
        field: &'static str,
        value: i64,
        max: u8,
    },
}

impl MigrationError {
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            MigrationError::BackendUnavailable(_)
                | MigrationError::Persistence(PersistenceError::BackendUnavailable(_))
        )
    }
}

/// What to do with a reference whose target was never migrated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnresolvedReferencePolicy {
    /// Null the reference (or drop it from a set) and count it.
    #[default]
    Omit,
    /// Fail the step.
    Abort,
}

impl FromStr for UnresolvedReferencePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "omit" => Ok(Self::Omit),
            "abort" => Ok(Self::Abort),
            other => Err(format!("expected `omit` or `abort`, got {other:?}")),
        }
    }
}

/// Applies the [`UnresolvedReferencePolicy`] and counts omitted references.
#[derive(Debug)]
pub(crate) struct Resolver {
    policy: UnresolvedReferencePolicy,
    dropped: u64,
}

impl Resolver {
    pub(crate) fn new(policy: UnresolvedReferencePolicy) -> Self {
        Self { policy, dropped: 0 }
    }

    /// Map `target` through `table`. `None` passes through unchanged.
    pub(crate) fn resolve(
        &mut self,
        table: &BTreeMap<i64, String>,
        target: Option<i64>,
        entity: &'static str,
        relational_id: i64,
        field: &'static str,
    ) -> Result<Option<String>, MigrationError> {
        let Some(target) = target else {
            return Ok(None);
        };
        if let Some(id) = table.get(&target) {
            return Ok(Some(id.clone()));
        }
        match self.policy {
            UnresolvedReferencePolicy::Omit => {
                warn!(entity, relational_id, field, target, "Dropping unresolved reference");
                self.dropped += 1;
                Ok(None)
            }
            UnresolvedReferencePolicy::Abort => Err(MigrationError::UnresolvedReference {
                entity,
                relational_id,
                field,
                target,
            }),
        }
    }

    /// Narrow an academic level (year or semester) to `1..=max`. A value out
    /// of range is handled like an unresolved reference.
    pub(crate) fn level(
        &mut self,
        value: Option<i64>,
        max: u8,
        entity: &'static str,
        relational_id: i64,
        field: &'static str,
    ) -> Result<Option<u8>, MigrationError> {
        let Some(value) = value else {
            return Ok(None);
        };
        if let Some(level) = u8::try_from(value).ok().filter(|v| (1..=max).contains(v)) {
            return Ok(Some(level));
        }
        match self.policy {
            UnresolvedReferencePolicy::Omit => {
                warn!(entity, relational_id, field, value, "Dropping out-of-range value");
                self.dropped += 1;
                Ok(None)
            }
            UnresolvedReferencePolicy::Abort => Err(MigrationError::OutOfRange {
                entity,
                relational_id,
                field,
                value,
                max,
            }),
        }
    }

    pub(crate) fn dropped(&self) -> u64 {
        self.dropped
    }
}

/// Relational timestamps are signed; anything before the epoch becomes 0.
pub(crate) fn unix_seconds(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

/// Result of [`Migrator::run_full_migration`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationSummary {
    pub academic: AcademicReport,
    pub users: UsersReport,
    pub notes: NotesReport,
    pub interactions: InteractionsReport,
    /// Steps skipped because the manifest already recorded them.
    pub resumed: Vec<MigrationStep>,
}

/// Runs migration steps from the relational store into the document store.
#[derive(Debug)]
pub struct Migrator<O = FilesystemObjectStorage> {
    pool: SqlitePool,
    documents: Option<DocumentStore>,
    object_storage: Option<O>,
    uploads_dir: PathBuf,
    policy: UnresolvedReferencePolicy,
}

impl<O: ObjectStorage> Migrator<O> {
    pub fn new(
        pool: SqlitePool,
        documents: Option<DocumentStore>,
        object_storage: Option<O>,
        uploads_dir: impl Into<PathBuf>,
        policy: UnresolvedReferencePolicy,
    ) -> Self {
        Self {
            pool,
            documents,
            object_storage,
            uploads_dir: uploads_dir.into(),
            policy,
        }
    }

    pub fn document_backend_available(&self) -> bool {
        self.documents.is_some()
    }

    pub fn object_storage_available(&self) -> bool {
        self.object_storage.is_some()
    }

    fn documents(&self) -> Result<&DocumentStore, MigrationError> {
        self.documents
            .as_ref()
            .ok_or(MigrationError::BackendUnavailable("document store"))
    }

    /// Migrate colleges, departments and subjects.
    pub async fn migrate_academic(&self) -> Result<AcademicReport, MigrationError> {
        let store = self.documents()?;
        let report = self.academic_step(store, &mut IdRemap::default()).await?;
        manifest::record(store, MigrationStep::Academic)?;
        Ok(report)
    }

    pub async fn migrate_users(&self) -> Result<UsersReport, MigrationError> {
        let store = self.documents()?;
        let report = self.users_step(store, &mut IdRemap::default()).await?;
        manifest::record(store, MigrationStep::Users)?;
        Ok(report)
    }

    pub async fn migrate_notes(&self) -> Result<NotesReport, MigrationError> {
        let store = self.documents()?;
        let report = self.notes_step(store, &mut IdRemap::default()).await?;
        manifest::record(store, MigrationStep::Notes)?;
        Ok(report)
    }

    pub async fn migrate_interactions(&self) -> Result<InteractionsReport, MigrationError> {
        let store = self.documents()?;
        let report = self.interactions_step(store, &mut IdRemap::default()).await?;
        manifest::record(store, MigrationStep::Interactions)?;
        Ok(report)
    }

    /// Run all four steps in order, skipping steps the manifest already lists.
    /// The first failing step aborts the run; earlier steps stay recorded.
    pub async fn run_full_migration(&self) -> Result<MigrationSummary, MigrationError> {
        let store = self.documents()?;
        let manifest = MigrationManifest::load(store)?;
        let mut remap = IdRemap::default();
        let mut resumed = Vec::new();

        info!(completed = manifest.completed.len(), "Starting full migration");

        let academic = if manifest.is_complete(MigrationStep::Academic) {
            resumed.push(MigrationStep::Academic);
            AcademicReport::resumed()
        } else {
            let report = self.academic_step(store, &mut remap).await?;
            manifest::record(store, MigrationStep::Academic)?;
            report
        };

        let users = if manifest.is_complete(MigrationStep::Users) {
            resumed.push(MigrationStep::Users);
            UsersReport::resumed()
        } else {
            let report = self.users_step(store, &mut remap).await?;
            manifest::record(store, MigrationStep::Users)?;
            report
        };

        let notes = if manifest.is_complete(MigrationStep::Notes) {
            resumed.push(MigrationStep::Notes);
            NotesReport::resumed()
        } else {
            let report = self.notes_step(store, &mut remap).await?;
            manifest::record(store, MigrationStep::Notes)?;
            report
        };

        let interactions = if manifest.is_complete(MigrationStep::Interactions) {
            resumed.push(MigrationStep::Interactions);
            InteractionsReport::resumed()
        } else {
            let report = self.interactions_step(store, &mut remap).await?;
            manifest::record(store, MigrationStep::Interactions)?;
            report
        };

        info!(
            notes = notes.migrated_count,
            files_relocated = notes.files_migrated_to_object_store,
            comments = interactions.comments,
            ratings = interactions.ratings,
            favorites = interactions.favorites,
            resumed = resumed.len(),
            "Full migration complete"
        );

        Ok(MigrationSummary {
            academic,
            users,
            notes,
            interactions,
            resumed,
        })
    }

    /// Run one step by name, serialized as JSON.
    pub async fn run_step(&self, step: MigrationTarget) -> Result<serde_json::Value, MigrationError> {
        let value = match step {
            MigrationTarget::Full => serde_json::to_value(self.run_full_migration().await?),
            MigrationTarget::Academic => serde_json::to_value(self.migrate_academic().await?),
            MigrationTarget::Users => serde_json::to_value(self.migrate_users().await?),
            MigrationTarget::Notes => serde_json::to_value(self.migrate_notes().await?),
            MigrationTarget::Interactions => {
                serde_json::to_value(self.migrate_interactions().await?)
            }
        };
        value.map_err(|e| MigrationError::Persistence(PersistenceError::Json(e)))
    }
}

/// A migration entry point: the whole pipeline or a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationTarget {
    Full,
    Academic,
    Users,
    Notes,
    Interactions,
}

impl FromStr for MigrationTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(Self::Full),
            "academic" => Ok(Self::Academic),
            "users" => Ok(Self::Users),
            "notes" => Ok(Self::Notes),
            "interactions" => Ok(Self::Interactions),
            other => Err(format!("unknown migration step {other:?}")),
        }
    }
}
