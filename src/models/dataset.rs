// file: src/models/dataset.rs
// description: canonical dataset of starred repositories with merge and classification ops
// reference: internal data structures

use crate::config::FetchMode;
use crate::models::repository::{Classification, RepoRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

pub const DATASET_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub metadata: DatasetMetadata,
    pub repositories: Vec<RepoRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetMetadata {
    #[serde(default)]
    pub total_count: usize,
    #[serde(default)]
    pub classified_count: usize,
    #[serde(default)]
    pub unclassified_count: usize,
    #[serde(default)]
    pub last_fetch_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_classification_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default = "default_fetch_mode")]
    pub fetch_mode: FetchMode,
    #[serde(default)]
    pub username: Option<String>,
    /// Most recent starred_at ever merged; the incremental fetch stops here.
    #[serde(default)]
    pub cursor: Option<DateTime<Utc>>,
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_fetch_mode() -> FetchMode {
    FetchMode::Incremental
}

fn default_version() -> String {
    DATASET_VERSION.to_string()
}

impl Default for DatasetMetadata {
    fn default() -> Self {
        Self {
            total_count: 0,
            classified_count: 0,
            unclassified_count: 0,
            last_fetch_time: None,
            last_classification_time: None,
            last_updated: None,
            fetch_mode: FetchMode::Incremental,
            username: None,
            cursor: None,
            version: DATASET_VERSION.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeOutcome {
    pub added: usize,
    pub updated: usize,
    pub unchanged: usize,
}

impl Dataset {
    pub fn empty() -> Self {
        Self {
            metadata: DatasetMetadata::default(),
            repositories: Vec::new(),
        }
    }

    /// Merge a batch of fetched records into the dataset.
    ///
    /// New ids are inserted unclassified; known ids get their mirrored fields
    /// refreshed. A fingerprint change resets the classification state so the
    /// record re-enters the pending queue. Re-merging an identical batch
    /// reports zero added and zero updated.
    pub fn merge(&mut self, fetched: Vec<RepoRecord>, mode: FetchMode) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();
        let mut newest_starred = self.metadata.cursor;

        for mut incoming in fetched {
            incoming.refresh_fingerprint();

            if let Some(starred_at) = incoming.starred_at
                && newest_starred.is_none_or(|cursor| starred_at > cursor)
            {
                newest_starred = Some(starred_at);
            }

            match self.repositories.iter_mut().find(|r| r.id == incoming.id) {
                None => {
                    incoming.is_classified = false;
                    incoming.category = None;
                    incoming.summary = None;
                    incoming.key_features.clear();
                    debug!("New repository: {}", incoming.full_name);
                    self.repositories.push(incoming);
                    outcome.added += 1;
                }
                Some(existing) => {
                    if existing.refresh_from(&incoming) {
                        let fingerprint = RepoRecord::compute_fingerprint(
                            existing.description.as_deref(),
                            existing.language.as_deref(),
                            &existing.topics,
                        );
                        if fingerprint != existing.content_fingerprint {
                            debug!(
                                "Fingerprint changed, re-queueing for classification: {}",
                                existing.full_name
                            );
                            existing.content_fingerprint = fingerprint;
                            existing.is_classified = false;
                            existing.category = None;
                            existing.summary = None;
                            existing.key_features.clear();
                        }
                        outcome.updated += 1;
                    } else {
                        outcome.unchanged += 1;
                    }
                }
            }
        }

        let now = Utc::now();
        self.metadata.cursor = newest_starred;
        self.metadata.fetch_mode = mode;
        self.metadata.last_fetch_time = Some(now);
        self.metadata.last_updated = Some(now);
        self.refresh_counts();

        outcome
    }

    /// Records still waiting for (or re-queued for) classification.
    pub fn pending_classification(&self) -> Vec<RepoRecord> {
        self.repositories
            .iter()
            .filter(|r| !r.is_classified)
            .cloned()
            .collect()
    }

    /// Apply classification results by repository id. Unknown ids are logged
    /// and skipped. Returns how many records were updated.
    pub fn apply_classifications(&mut self, results: &BTreeMap<u64, Classification>) -> usize {
        let mut applied = 0;

        for (id, classification) in results {
            match self.repositories.iter_mut().find(|r| r.id == *id) {
                Some(record) => {
                    record.apply_classification(classification);
                    applied += 1;
                }
                None => {
                    warn!("Ignoring classification for unknown repository id {}", id);
                }
            }
        }

        if applied > 0 {
            let now = Utc::now();
            self.metadata.last_classification_time = Some(now);
            self.metadata.last_updated = Some(now);
        }
        self.refresh_counts();

        applied
    }

    pub fn refresh_counts(&mut self) {
        self.metadata.total_count = self.repositories.len();
        self.metadata.classified_count = self
            .repositories
            .iter()
            .filter(|r| r.is_classified)
            .count();
        self.metadata.unclassified_count =
            self.metadata.total_count - self.metadata.classified_count;
    }
}
