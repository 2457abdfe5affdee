// file: src/models/repository.rs
// description: starred repository record with classification state and fingerprint
// reference: internal data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One starred repository mirrored from the GitHub API.
///
/// The mirrored fields are refreshed on every re-fetch; the classification
/// fields survive refreshes as long as `content_fingerprint` is unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoRecord {
    pub id: u64,
    pub name: String,
    pub full_name: String,
    pub html_url: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    pub stargazers_count: u64,
    pub forks_count: u64,
    #[serde(default)]
    pub topics: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub starred_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub is_classified: bool,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub key_features: Vec<String>,
    #[serde(default)]
    pub content_fingerprint: String,
}

/// Output of the classification engine for a single repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub category: String,
    pub summary: String,
    #[serde(default)]
    pub key_features: Vec<String>,
}

impl RepoRecord {
    /// Fingerprint over the classification-relevant fields. A change here
    /// means the stored category/summary may no longer describe the repo.
    pub fn compute_fingerprint(
        description: Option<&str>,
        language: Option<&str>,
        topics: &[String],
    ) -> String {
        let mut hasher = Sha256::new();
        hasher.update(description.unwrap_or_default().as_bytes());
        hasher.update([0u8]);
        hasher.update(language.unwrap_or_default().as_bytes());
        for topic in topics {
            hasher.update([0u8]);
            hasher.update(topic.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }

    pub fn refresh_fingerprint(&mut self) {
        self.content_fingerprint = Self::compute_fingerprint(
            self.description.as_deref(),
            self.language.as_deref(),
            &self.topics,
        );
    }

    /// Overwrite the mirrored fields from a newly fetched record, leaving the
    /// classification fields alone. Returns true if any mirrored field changed.
    pub fn refresh_from(&mut self, fetched: &RepoRecord) -> bool {
        let mut updated = fetched.clone();

        updated.is_classified = self.is_classified;
        updated.category = self.category.clone();
        updated.summary = self.summary.clone();
        updated.key_features = self.key_features.clone();
        updated.content_fingerprint = self.content_fingerprint.clone();
        // An incremental page only carries starred_at for new stars.
        if updated.starred_at.is_none() {
            updated.starred_at = self.starred_at;
        }

        let changed = *self != updated;
        *self = updated;
        changed
    }

    pub fn apply_classification(&mut self, classification: &Classification) {
        self.category = Some(classification.category.clone());
        self.summary = Some(classification.summary.clone());
        self.key_features = classification.key_features.clone();
        self.is_classified = true;
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use chrono::TimeZone;

    pub fn record(id: u64, full_name: &str, description: Option<&str>) -> RepoRecord {
        let mut record = RepoRecord {
            id,
            name: full_name.rsplit('/').next().unwrap_or(full_name).to_string(),
            full_name: full_name.to_string(),
            html_url: format!("https://github.com/{full_name}"),
            description: description.map(String::from),
            language: Some("Rust".to_string()),
            stargazers_count: 100,
            forks_count: 10,
            topics: vec![],
            created_at: Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            starred_at: Some(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()),
            is_classified: false,
            category: None,
            summary: None,
            key_features: vec![],
            content_fingerprint: String::new(),
        };
        record.refresh_fingerprint();
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_fingerprint_is_deterministic() {
        let a = RepoRecord::compute_fingerprint(Some("a cli tool"), Some("Rust"), &[]);
        let b = RepoRecord::compute_fingerprint(Some("a cli tool"), Some("Rust"), &[]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_fingerprint_changes_with_description() {
        let a = RepoRecord::compute_fingerprint(Some("a cli tool"), Some("Rust"), &[]);
        let b = RepoRecord::compute_fingerprint(Some("a tui tool"), Some("Rust"), &[]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_fingerprint_separates_fields() {
        // "ab" + lang "c" must differ from "a" + lang "bc"
        let a = RepoRecord::compute_fingerprint(Some("ab"), Some("c"), &[]);
        let b = RepoRecord::compute_fingerprint(Some("a"), Some("bc"), &[]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_refresh_from_reports_change() {
        let mut existing = test_support::record(1, "octocat/hello", Some("old"));
        let mut fetched = existing.clone();
        assert!(!existing.refresh_from(&fetched));

        fetched.description = Some("new".to_string());
        assert!(existing.refresh_from(&fetched));
        assert_eq!(existing.description.as_deref(), Some("new"));
    }

    #[test]
    fn test_refresh_from_keeps_classification_fields() {
        let mut existing = test_support::record(1, "octocat/hello", Some("desc"));
        existing.apply_classification(&Classification {
            category: "开发工具".to_string(),
            summary: "一个工具".to_string(),
            key_features: vec!["fast".to_string()],
        });

        let mut fetched = test_support::record(1, "octocat/hello", Some("desc"));
        fetched.stargazers_count = 200;

        existing.refresh_from(&fetched);
        assert!(existing.is_classified);
        assert_eq!(existing.category.as_deref(), Some("开发工具"));
        assert_eq!(existing.stargazers_count, 200);
    }

    #[test]
    fn test_refresh_from_keeps_known_starred_at_when_fetch_lacks_it() {
        let mut existing = test_support::record(1, "octocat/hello", Some("desc"));
        let known = existing.starred_at;

        let mut fetched = existing.clone();
        fetched.starred_at = None;

        existing.refresh_from(&fetched);
        assert_eq!(existing.starred_at, known);
    }
}
