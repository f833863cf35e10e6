//! Schema-less JSON document store.
//!
//! Layout: `<root>/<collection>/<id>.json`, one document per file. Documents
//! are JSON objects; references between them are plain string fields and
//! nothing checks that the target exists.

use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::persistence::PersistenceError;

const ID_LEN: usize = 20;
const ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
const HEALTH_CHECK_COLLECTION: &str = "_health_check";

/// A stored document together with its ID.
#[derive(Debug, Clone, PartialEq)]
pub struct Document<T> {
    pub id: String,
    pub data: T,
}

#[derive(Debug, Clone, PartialEq)]
enum Condition {
    Eq(Value),
    ArrayContainsAny(Vec<Value>),
}

/// Conjunction of field conditions, evaluated against the raw JSON object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    conditions: Vec<(String, Condition)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// `field == value`.
    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.conditions
            .push((field.to_string(), Condition::Eq(value.into())));
        self
    }

    /// `field` is an array sharing at least one element with `values`.
    pub fn array_contains_any<V: Into<Value>>(
        mut self,
        field: &str,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.conditions
            .push((field.to_string(), Condition::ArrayContainsAny(values)));
        self
    }

    pub fn matches(&self, doc: &Value) -> bool {
        self.conditions.iter().all(|(field, cond)| {
            let actual = doc.get(field);
            match cond {
                Condition::Eq(expected) => actual == Some(expected),
                Condition::ArrayContainsAny(wanted) => match actual {
                    Some(Value::Array(items)) => items.iter().any(|i| wanted.contains(i)),
                    _ => false,
                },
            }
        })
    }
}

/// Handle on a document store rooted at a directory.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
}

impl DocumentStore {
    /// Open the store at `root`, creating it if needed, and verify it accepts
    /// a write/read/delete round trip.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let store = Self { root: root.into() };
        std::fs::create_dir_all(&store.root)?;
        store.health_check()?;
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn health_check(&self) -> Result<(), PersistenceError> {
        let id = Self::new_id();
        let marker = serde_json::json!({ "healthCheck": id });
        self.set(HEALTH_CHECK_COLLECTION, &id, &marker)?;
        let read: Option<Document<Value>> = self.get(HEALTH_CHECK_COLLECTION, &id)?;
        if read.map(|d| d.data) != Some(marker) {
            return Err(PersistenceError::Invalid(
                "document store health check read back a different document".to_string(),
            ));
        }
        self.delete(HEALTH_CHECK_COLLECTION, &id)?;
        let _ = std::fs::remove_dir(self.collection_dir(HEALTH_CHECK_COLLECTION));
        Ok(())
    }

    /// Generate a fresh opaque document ID.
    pub fn new_id() -> String {
        let bytes = [*Uuid::new_v4().as_bytes(), *Uuid::new_v4().as_bytes()].concat();
        bytes
            .iter()
            .take(ID_LEN)
            .map(|b| ID_ALPHABET[*b as usize % ID_ALPHABET.len()] as char)
            .collect()
    }

    fn collection_dir(&self, collection: &str) -> PathBuf {
        self.root.join(collection)
    }

    fn file_path(&self, collection: &str, id: &str) -> Result<PathBuf, PersistenceError> {
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(PersistenceError::InvalidId(id.to_string()));
        }
        Ok(self.collection_dir(collection).join(format!("{id}.json")))
    }

    /// Create a document under a generated ID. Returns the ID.
    pub fn create<T: Serialize>(&self, collection: &str, data: &T) -> Result<String, PersistenceError> {
        let id = Self::new_id();
        self.set(collection, &id, data)?;
        Ok(id)
    }

    /// Write a document at a caller-chosen ID, replacing any existing one.
    pub fn set<T: Serialize>(
        &self,
        collection: &str,
        id: &str,
        data: &T,
    ) -> Result<(), PersistenceError> {
        let path = self.file_path(collection, id)?;
        std::fs::create_dir_all(self.collection_dir(collection))?;
        let json = serde_json::to_string_pretty(data)?;
        std::fs::write(&path, json)?;
        Ok(())
    }

    /// Load a document by ID. Returns None if not found.
    pub fn get<T: DeserializeOwned>(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document<T>>, PersistenceError> {
        let path = self.file_path(collection, id)?;
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)?;
        let data = serde_json::from_str(&contents)?;
        Ok(Some(Document {
            id: id.to_string(),
            data,
        }))
    }

    /// All documents of a collection matching `query`, skipping files that fail to parse.
    pub fn find<T: DeserializeOwned>(
        &self,
        collection: &str,
        query: &Query,
    ) -> Result<Vec<Document<T>>, PersistenceError> {
        let dir = self.collection_dir(collection);
        if !dir.exists() {
            return Ok(vec![]);
        }
        let mut docs = Vec::new();

        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };
            let contents = match std::fs::read_to_string(&path) {
                Ok(contents) => contents,
                Err(e) => {
                    tracing::warn!("Failed to read file {:?}: {}", path, e);
                    continue;
                }
            };
            let Ok(raw) = serde_json::from_str::<Value>(&contents) else {
                tracing::warn!(path = %path.display(), "Skipping unparsable document");
                continue;
            };
            if !query.matches(&raw) {
                continue;
            }
            match serde_json::from_value::<T>(raw) {
                Ok(data) => docs.push(Document { id, data }),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping malformed document")
                }
            }
        }

        Ok(docs)
    }

    pub fn all<T: DeserializeOwned>(&self, collection: &str) -> Result<Vec<Document<T>>, PersistenceError> {
        self.find(collection, &Query::new())
    }

    /// Shallow-merge `patch` into an existing document. Returns false if it does not exist.
    pub fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Map<String, Value>,
    ) -> Result<bool, PersistenceError> {
        let Some(mut doc) = self.get::<Map<String, Value>>(collection, id)? else {
            return Ok(false);
        };
        doc.data.extend(patch);
        self.set(collection, id, &doc.data)?;
        Ok(true)
    }

    /// Delete a document. Returns false if it did not exist.
    pub fn delete(&self, collection: &str, id: &str) -> Result<bool, PersistenceError> {
        let path = self.file_path(collection, id)?;
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&path)?;
        Ok(true)
    }

    /// One past the largest integer `field` in the collection, starting at 1.
    pub fn next_sequence(&self, collection: &str, field: &str) -> Result<u64, PersistenceError> {
        let highest = self
            .all::<Value>(collection)?
            .iter()
            .filter_map(|doc| doc.data.get(field).and_then(Value::as_u64))
            .max()
            .unwrap_or(0);
        Ok(highest + 1)
    }

    pub fn count(&self, collection: &str) -> Result<u64, PersistenceError> {
        let dir = self.collection_dir(collection);
        if !dir.exists() {
            return Ok(0);
        }
        let mut count = 0;
        for entry in std::fs::read_dir(&dir)? {
            if entry?.path().extension().and_then(|e| e.to_str()) == Some("json") {
                count += 1;
            }
        }
        Ok(count)
    }

    pub fn is_empty(&self, collection: &str) -> Result<bool, PersistenceError> {
        Ok(self.count(collection)? == 0)
    }
}
