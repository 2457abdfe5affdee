// file: src/classify/cache.rs
// description: fingerprint-keyed classification cache with optional disk persistence
// reference: losing the cache only costs repeat AI calls, never correctness

use crate::error::Result;
use crate::models::Classification;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub fingerprint: String,
    pub category: String,
    pub summary: String,
    #[serde(default)]
    pub key_features: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Concurrent-read, exclusive-write cache of classification results keyed by
/// content fingerprint. A record whose fingerprint changed simply misses.
pub struct ClassificationCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    path: Option<PathBuf>,
}

impl ClassificationCache {
    pub fn new(path: Option<PathBuf>) -> Self {
        let entries = path
            .as_deref()
            .map(|p| match fs::read_to_string(p) {
                Ok(content) => match serde_json::from_str::<HashMap<String, CacheEntry>>(&content)
                {
                    Ok(entries) => {
                        info!("Loaded {} cached classifications", entries.len());
                        entries
                    }
                    Err(e) => {
                        warn!("Classification cache unreadable, starting empty: {}", e);
                        HashMap::new()
                    }
                },
                Err(_) => HashMap::new(),
            })
            .unwrap_or_default();

        Self {
            entries: RwLock::new(entries),
            path,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(None)
    }

    pub async fn get(&self, fingerprint: &str) -> Option<Classification> {
        let entries = self.entries.read().await;
        entries.get(fingerprint).map(|entry| {
            debug!("Classification cache hit for {}", &fingerprint[..12.min(fingerprint.len())]);
            Classification {
                category: entry.category.clone(),
                summary: entry.summary.clone(),
                key_features: entry.key_features.clone(),
            }
        })
    }

    pub async fn insert(&self, fingerprint: &str, classification: &Classification) {
        let entry = CacheEntry {
            fingerprint: fingerprint.to_string(),
            category: classification.category.clone(),
            summary: classification.summary.clone(),
            key_features: classification.key_features.clone(),
            created_at: Utc::now(),
        };

        let mut entries = self.entries.write().await;
        entries.insert(fingerprint.to_string(), entry);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Write the cache to its backing file, if one was configured.
    pub async fn persist(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let entries = self.entries.read().await;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(&*entries)?)?;
        debug!("Persisted {} cache entries to {}", entries.len(), path.display());
        Ok(())
    }
}
