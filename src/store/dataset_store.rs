// file: src/store/dataset_store.rs
// description: durable dataset storage with rotating backups and atomic writes
// reference: backup-before-overwrite persistence

use crate::config::StorageConfig;
use crate::error::{PipelineError, Result};
use crate::models::Dataset;
use chrono::Utc;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{debug, info, warn};

const BACKUP_PREFIX: &str = "stars_data_backup_";

/// Owns the on-disk dataset snapshot. All writes go through `persist`, which
/// backs up the prior snapshot and then replaces the data file atomically, so
/// an interrupted write never leaves the dataset unreadable.
pub struct DatasetStore {
    data_file: PathBuf,
    backup_dir: PathBuf,
    auto_backup: bool,
    max_backups: usize,
    write_lock: Mutex<()>,
}

impl DatasetStore {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            data_file: config.data_file.clone(),
            backup_dir: config.backup_dir.clone(),
            auto_backup: config.auto_backup,
            max_backups: config.max_backups,
            write_lock: Mutex::new(()),
        }
    }

    /// Load the dataset. A missing file yields an empty dataset; a corrupt
    /// file falls back to the newest restorable backup.
    pub fn load(&self) -> Result<Dataset> {
        let content = match fs::read_to_string(&self.data_file) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("Data file not found, starting with an empty dataset");
                return Ok(Dataset::empty());
            }
            Err(e) => return Err(PipelineError::Io(e)),
        };

        match serde_json::from_str::<Dataset>(&content) {
            Ok(mut dataset) => {
                dataset.refresh_counts();
                debug!(
                    "Loaded {} repositories from {}",
                    dataset.repositories.len(),
                    self.data_file.display()
                );
                Ok(dataset)
            }
            Err(e) => {
                warn!(
                    "Data file {} is corrupt ({}), attempting backup restore",
                    self.data_file.display(),
                    e
                );
                self.restore_from_backup()
            }
        }
    }

    fn restore_from_backup(&self) -> Result<Dataset> {
        for backup in self.backups_newest_first()? {
            match fs::read_to_string(&backup)
                .map_err(PipelineError::Io)
                .and_then(|content| Ok(serde_json::from_str::<Dataset>(&content)?))
            {
                Ok(mut dataset) => {
                    dataset.refresh_counts();
                    info!("Restored dataset from backup {}", backup.display());
                    return Ok(dataset);
                }
                Err(e) => warn!("Backup {} unusable: {}", backup.display(), e),
            }
        }

        warn!("No valid backup found, starting with an empty dataset");
        Ok(Dataset::empty())
    }

    /// Write the dataset to disk. The previous snapshot is copied into the
    /// backup directory first; the new snapshot goes to a temp file and is
    /// renamed over the data file. Holding the lock for the whole sequence
    /// keeps backup and write as one unit.
    pub fn persist(&self, dataset: &Dataset) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(parent) = self.data_file.parent() {
            fs::create_dir_all(parent)?;
        }

        if self.auto_backup && self.data_file.exists() {
            self.create_backup()?;
        }

        let content = serde_json::to_string_pretty(dataset)?;
        let tmp_file = self.data_file.with_extension("json.tmp");
        fs::write(&tmp_file, content)?;
        fs::rename(&tmp_file, &self.data_file)?;

        info!(
            "Persisted {} repositories to {}",
            dataset.repositories.len(),
            self.data_file.display()
        );
        Ok(())
    }

    fn create_backup(&self) -> Result<()> {
        fs::create_dir_all(&self.backup_dir)?;

        let name = format!(
            "{}{}.json",
            BACKUP_PREFIX,
            Utc::now().format("%Y%m%d_%H%M%S_%f")
        );
        let backup_path = self.backup_dir.join(name);
        fs::copy(&self.data_file, &backup_path)?;
        debug!("Backup created: {}", backup_path.display());
        Ok(())
    }

    /// Delete all but the newest `max_backups` backups. Returns how many
    /// files were removed.
    pub fn cleanup_old_backups(&self) -> Result<usize> {
        let backups = self.backups_newest_first()?;
        let mut removed = 0;

        for stale in backups.iter().skip(self.max_backups) {
            fs::remove_file(stale)?;
            info!("Removed old backup: {}", stale.display());
            removed += 1;
        }

        Ok(removed)
    }

    fn backups_newest_first(&self) -> Result<Vec<PathBuf>> {
        let entries = match fs::read_dir(&self.backup_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(PipelineError::Io(e)),
        };

        let mut backups: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(BACKUP_PREFIX) && n.ends_with(".json"))
            })
            .collect();

        // timestamped names sort chronologically
        backups.sort();
        backups.reverse();
        Ok(backups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FetchMode;
    use crate::models::repository::test_support::record;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn store_in(temp: &TempDir) -> DatasetStore {
        DatasetStore::new(&StorageConfig {
            data_file: temp.path().join("data/stars_data.json"),
            backup_dir: temp.path().join("data/backups"),
            auto_backup: true,
            max_backups: 2,
            cache_file: None,
        })
    }

    fn sample_dataset(ids: &[u64]) -> Dataset {
        let mut dataset = Dataset::empty();
        let batch = ids
            .iter()
            .map(|id| record(*id, &format!("octocat/repo{id}"), Some("demo")))
            .collect();
        dataset.merge(batch, FetchMode::Full);
        dataset
    }

    #[test]
    fn test_load_missing_file_yields_empty_dataset() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);

        let dataset = store.load().unwrap();
        assert_eq!(dataset.repositories.len(), 0);
    }

    #[test]
    fn test_persist_then_load_round_trips() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);
        let dataset = sample_dataset(&[1, 2, 3]);

        store.persist(&dataset).unwrap();
        let loaded = store.load().unwrap();

        assert_eq!(loaded.repositories, dataset.repositories);
        assert_eq!(loaded.metadata.total_count, 3);
    }

    #[test]
    fn test_persist_backs_up_previous_snapshot() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);

        store.persist(&sample_dataset(&[1])).unwrap();
        // first write had nothing to back up
        assert_eq!(store.backups_newest_first().unwrap().len(), 0);

        store.persist(&sample_dataset(&[1, 2])).unwrap();
        assert_eq!(store.backups_newest_first().unwrap().len(), 1);
    }

    #[test]
    fn test_corrupt_file_restores_from_backup() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);

        store.persist(&sample_dataset(&[1, 2])).unwrap();
        store.persist(&sample_dataset(&[1, 2, 3])).unwrap();

        fs::write(store.data_file.clone(), "{ not json").unwrap();

        let restored = store.load().unwrap();
        assert_eq!(restored.repositories.len(), 2);
    }

    #[test]
    fn test_corrupt_file_without_backups_yields_empty() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);

        fs::create_dir_all(store.data_file.parent().unwrap()).unwrap();
        fs::write(store.data_file.clone(), "garbage").unwrap();

        let dataset = store.load().unwrap();
        assert_eq!(dataset.repositories.len(), 0);
    }

    #[test]
    fn test_cleanup_keeps_newest_backups() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);

        for n in 1..=5 {
            let ids: Vec<u64> = (1..=n).collect();
            store.persist(&sample_dataset(&ids)).unwrap();
        }

        // 4 backups exist (first persist had nothing to back up), keep 2
        let removed = store.cleanup_old_backups().unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.backups_newest_first().unwrap().len(), 2);
    }
}
