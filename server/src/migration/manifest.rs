use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::persistence::{now_timestamp, DocumentStore, PersistenceError};

pub const MANIFEST_COLLECTION: &str = "migration_manifest";
pub const MANIFEST_ID: &str = "relational-to-document";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationStep {
    Academic,
    Users,
    Notes,
    Interactions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedStep {
    pub step: MigrationStep,
    pub completed_at: u64,
}

/// Which steps have finished, stored as a single document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationManifest {
    #[serde(default)]
    pub completed: Vec<CompletedStep>,
}

impl MigrationManifest {
    pub fn load(store: &DocumentStore) -> Result<Self, PersistenceError> {
        Ok(store
            .get::<Self>(MANIFEST_COLLECTION, MANIFEST_ID)?
            .map(|doc| doc.data)
            .unwrap_or_default())
    }

    pub fn is_complete(&self, step: MigrationStep) -> bool {
        self.completed.iter().any(|c| c.step == step)
    }
}

/// Record `step` as completed now, replacing any earlier entry for it.
pub(crate) fn record(store: &DocumentStore, step: MigrationStep) -> Result<(), PersistenceError> {
    let mut manifest = MigrationManifest::load(store)?;
    manifest.completed.retain(|c| c.step != step);
    manifest.completed.push(CompletedStep {
        step,
        completed_at: now_timestamp(),
    });
    manifest.completed.sort_by_key(|c| c.step);
    store.set(MANIFEST_COLLECTION, MANIFEST_ID, &manifest)?;
    debug!(?step, "Recorded migration step");
    Ok(())
}
