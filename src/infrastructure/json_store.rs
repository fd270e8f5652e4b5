//! JSON file storage for archived messages.
//!
//! One pretty-printed document per source:
//! `{ "last_sync": ..., "list_name": ..., "messages": { id: record } }`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::domain::{AppError, Archive, Message, Result};

/// Loosely typed document, so a bad record can be reported by id.
#[derive(Debug, Deserialize)]
struct RawArchive {
    #[serde(default)]
    last_sync: Option<String>,
    #[serde(default)]
    list_name: Option<String>,
    #[serde(default)]
    messages: BTreeMap<String, serde_json::Value>,
}

/// Repository for a single source's JSON database.
#[derive(Debug, Clone)]
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    /// Create a store backed by `path`. Nothing is read yet.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the single backup generation.
    #[must_use]
    pub fn backup_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".bak");
        PathBuf::from(name)
    }

    /// Load the archive, or an empty one if the file does not exist.
    ///
    /// # Errors
    /// Returns error if the file cannot be read, is not valid JSON, or holds
    /// a record that fails validation.
    pub fn load(&self) -> Result<Archive> {
        if !self.path.exists() {
            tracing::info!(path = %self.path.display(), "No database yet, starting empty");
            return Ok(Archive::default());
        }

        let content = fs::read_to_string(&self.path).map_err(|e| {
            AppError::io(format!("Failed to read {}", self.path.display()), e)
        })?;
        let raw: RawArchive = serde_json::from_str(&content).map_err(AppError::json_parse)?;

        let mut archive = Archive::default();
        if let Some(last_sync) = raw.last_sync {
            archive.last_sync = last_sync;
        }
        if let Some(list_name) = raw.list_name {
            archive.list_name = list_name;
        }

        for (key, value) in raw.messages {
            let message: Message =
                serde_json::from_value(value).map_err(|e| AppError::InvalidData {
                    message: format!(
                        "record {key} in {} is invalid: {e}",
                        self.path.display()
                    ),
                })?;

            if message.id != key {
                tracing::warn!(key = %key, id = %message.id, "Record key differs from its id, keeping id");
            }
            archive.upsert(message);
        }

        tracing::debug!(
            count = archive.len(),
            last_sync = %archive.last_sync,
            "Loaded archive"
        );

        Ok(archive)
    }

    /// Write the whole archive, replacing the previous file.
    ///
    /// # Errors
    /// Returns error if serialization or the write fails.
    pub fn save(&self, archive: &Archive) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| AppError::io("Failed to create database directory", e))?;
        }

        let json = serde_json::to_string_pretty(archive).map_err(AppError::json_parse)?;

        let mut tmp = self.path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, json)
            .map_err(|e| AppError::io(format!("Failed to write {}", tmp.display()), e))?;
        fs::rename(&tmp, &self.path).map_err(|e| {
            AppError::io(format!("Failed to replace {}", self.path.display()), e)
        })?;

        tracing::info!(path = %self.path.display(), count = archive.len(), "Database saved");

        Ok(())
    }

    /// Move the current database aside as `<db>.bak`.
    ///
    /// Returns the backup path, or `None` when there was nothing to back up.
    ///
    /// # Errors
    /// Returns error if the rename fails.
    pub fn backup(&self) -> Result<Option<PathBuf>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let backup = self.backup_path();
        fs::rename(&self.path, &backup).map_err(|e| {
            AppError::io(format!("Failed to back up {}", self.path.display()), e)
        })?;

        tracing::info!(backup = %backup.display(), "Database backed up");

        Ok(Some(backup))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{EPOCH_SYNC, UNKNOWN_LIST};
    use crate::domain::SocialExtension;
    use tempfile::tempdir;

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("db.json"));

        let archive = store.load().unwrap();
        assert_eq!(archive.last_sync, EPOCH_SYNC);
        assert_eq!(archive.list_name, UNKNOWN_LIST);
        assert!(archive.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("db.json"));

        let mut archive = Archive {
            last_sync: "2024-06-01T00:00:00Z".into(),
            list_name: "Weekly".into(),
            ..Default::default()
        };
        archive.upsert(Message::new("A", "2024-01-01", "sent", "zażółć").with_source("aweber", "newsletter"));
        archive.upsert(
            Message::new("B", "2024-02-01", "draft", "hi").with_social(SocialExtension::default()),
        );

        store.save(&archive).unwrap();
        let raw = fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("zażółć"));
        assert!(!dir.path().join("db.json.tmp").exists());

        let loaded = store.load().unwrap();
        assert_eq!(loaded, archive);
    }

    #[test]
    fn test_load_rejects_invalid_record() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.json");
        fs::write(
            &path,
            r#"{"last_sync": "x", "list_name": "y", "messages": {"1": {"id": "1"}}}"#,
        )
        .unwrap();

        let err = JsonStore::new(&path).load().unwrap_err();
        assert!(matches!(err, AppError::InvalidData { .. }));
    }

    #[test]
    fn test_load_keys_by_record_id() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.json");
        fs::write(
            &path,
            r#"{"messages": {"wrong": {"id": "right", "status": "sent"}}}"#,
        )
        .unwrap();

        let archive = JsonStore::new(&path).load().unwrap();
        assert!(archive.messages.contains_key("right"));
        assert!(!archive.messages.contains_key("wrong"));
    }

    #[test]
    fn test_backup_renames_database() {
        let dir = tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("db.json"));

        assert_eq!(store.backup().unwrap(), None);

        let mut archive = Archive::default();
        archive.upsert(Message::new("A", "2024-01-01", "sent", "x"));
        store.save(&archive).unwrap();

        let backup = store.backup().unwrap().unwrap();
        assert_eq!(backup, dir.path().join("db.json.bak"));
        assert!(backup.exists());
        assert!(!store.path().exists());
        assert!(store.load().unwrap().is_empty());
    }
}
