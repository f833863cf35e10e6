//! Configuration for the Edu-Desk server
//!
//! Values come from `EDU_DESK_*` environment variables. The data directory
//! resolves with the following precedence:
//! 1. EDU_DESK_DATA_DIR environment variable
//! 2. ~/.config/edu-desk/data (production default)
//! 3. ./data (fallback for development)
//!
//! Every other path defaults to a location inside the data directory.

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::migration::UnresolvedReferencePolicy;

const DEFAULT_CONFIG_DIR: &str = ".config/edu-desk/data";
const DEV_DATA_DIR: &str = "./data";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5000";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Bucket directory plus the base URL it is published under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectStoreConfig {
    pub dir: PathBuf,
    pub public_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub database_path: PathBuf,
    pub uploads_dir: PathBuf,
    /// `None` leaves the document backend unavailable.
    pub document_store_dir: Option<PathBuf>,
    /// Only set when both the directory and the public URL are given.
    pub object_store: Option<ObjectStoreConfig>,
    pub bind_addr: SocketAddr,
    pub admin_token: Option<String>,
    pub unresolved_references: UnresolvedReferencePolicy,
    pub log_file: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    /// Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let data_dir = match get("EDU_DESK_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => match get("HOME") {
                Some(home) => PathBuf::from(home).join(DEFAULT_CONFIG_DIR),
                None => PathBuf::from(DEV_DATA_DIR),
            },
        };

        let database_path = get("EDU_DESK_DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("edu-desk.db"));
        let uploads_dir = get("EDU_DESK_UPLOADS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("uploads"));

        let object_store = match (
            get("EDU_DESK_OBJECT_STORE_DIR"),
            get("EDU_DESK_OBJECT_STORE_PUBLIC_URL"),
        ) {
            (Some(dir), Some(public_url)) => Some(ObjectStoreConfig {
                dir: PathBuf::from(dir),
                public_url,
            }),
            _ => None,
        };

        let bind = get("EDU_DESK_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind.parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
            var: "EDU_DESK_BIND_ADDR",
            value: bind.clone(),
            reason: e.to_string(),
        })?;

        let unresolved_references = match get("EDU_DESK_UNRESOLVED_REFERENCES") {
            Some(value) => value.parse().map_err(|reason| ConfigError::Invalid {
                var: "EDU_DESK_UNRESOLVED_REFERENCES",
                value: value.clone(),
                reason,
            })?,
            None => UnresolvedReferencePolicy::default(),
        };

        Ok(Self {
            document_store_dir: get("EDU_DESK_DOCUMENT_STORE_DIR").map(PathBuf::from),
            admin_token: get("EDU_DESK_ADMIN_TOKEN"),
            log_file: get("EDU_DESK_LOG_FILE").map(PathBuf::from),
            data_dir,
            database_path,
            uploads_dir,
            object_store,
            bind_addr,
            unresolved_references,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_under_home() {
        let config = config(&[("HOME", "/home/ada")]).unwrap();
        let data = PathBuf::from("/home/ada/.config/edu-desk/data");
        assert_eq!(config.data_dir, data);
        assert_eq!(config.database_path, data.join("edu-desk.db"));
        assert_eq!(config.uploads_dir, data.join("uploads"));
        assert_eq!(config.bind_addr, "127.0.0.1:5000".parse().unwrap());
        assert_eq!(config.unresolved_references, UnresolvedReferencePolicy::Omit);
        assert!(config.document_store_dir.is_none());
        assert!(config.object_store.is_none());
        assert!(config.admin_token.is_none());
    }

    #[test]
    fn test_dev_fallback_without_home() {
        let config = config(&[]).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("./data"));
    }

    #[test]
    fn test_explicit_data_dir_wins() {
        let config = config(&[("HOME", "/home/ada"), ("EDU_DESK_DATA_DIR", "/srv/edu")]).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/edu"));
        assert_eq!(config.database_path, PathBuf::from("/srv/edu/edu-desk.db"));
    }

    #[test]
    fn test_object_store_needs_both_variables() {
        let partial = config(&[("EDU_DESK_OBJECT_STORE_DIR", "/mnt/bucket")]).unwrap();
        assert!(partial.object_store.is_none());

        let full = config(&[
            ("EDU_DESK_OBJECT_STORE_DIR", "/mnt/bucket"),
            ("EDU_DESK_OBJECT_STORE_PUBLIC_URL", "https://cdn.example.com"),
        ])
        .unwrap();
        assert_eq!(
            full.object_store,
            Some(ObjectStoreConfig {
                dir: PathBuf::from("/mnt/bucket"),
                public_url: "https://cdn.example.com".to_string(),
            })
        );
    }

    #[test]
    fn test_empty_values_count_as_unset() {
        let config = config(&[("EDU_DESK_ADMIN_TOKEN", ""), ("EDU_DESK_DOCUMENT_STORE_DIR", " ")]).unwrap();
        assert!(config.admin_token.is_none());
        assert!(config.document_store_dir.is_none());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = config(&[("EDU_DESK_BIND_ADDR", "not-an-addr")]).unwrap_err();
        assert!(err.to_string().contains("EDU_DESK_BIND_ADDR"));

        let err = config(&[("EDU_DESK_UNRESOLVED_REFERENCES", "ignore")]).unwrap_err();
        assert!(err.to_string().contains("EDU_DESK_UNRESOLVED_REFERENCES"));
    }

    #[test]
    fn test_abort_policy() {
        let config = config(&[("EDU_DESK_UNRESOLVED_REFERENCES", "abort")]).unwrap();
        assert_eq!(config.unresolved_references, UnresolvedReferencePolicy::Abort);
    }
}
