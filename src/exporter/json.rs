// file: src/exporter/json.rs
// description: json export of the dataset and aggregate report for downstream renderers
// reference: plain structured output, no template logic in core

use crate::error::Result;
use crate::models::Dataset;
use crate::stats::{DatasetReport, aggregate, repositories_by_category};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use std::fs;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone)]
pub struct JsonExporter {
    output_dir: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct ExportManifest {
    pub exported_at: String,
    pub files: Vec<String>,
}

impl JsonExporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self> {
        let output_dir = output_dir.into();
        fs::create_dir_all(&output_dir)?;
        Ok(Self { output_dir })
    }

    /// Write the full dataset snapshot.
    pub fn export_dataset(&self, dataset: &Dataset, pretty: bool) -> Result<PathBuf> {
        let path = self.output_dir.join("stars_data.json");
        self.write(&path, dataset, pretty)?;
        Ok(path)
    }

    /// Write one category's classified repositories, star-sorted.
    pub fn export_category(
        &self,
        dataset: &Dataset,
        category: &str,
        pretty: bool,
    ) -> Result<PathBuf> {
        let repos = repositories_by_category(dataset, category);
        let document = json!({
            "category": category,
            "total": repos.len(),
            "repositories": repos,
        });

        let file_name = format!("category_{}.json", category.replace('/', "_"));
        let path = self.output_dir.join(file_name);
        self.write(&path, &document, pretty)?;
        Ok(path)
    }

    /// Write the aggregate report.
    pub fn export_report(&self, report: &DatasetReport, pretty: bool) -> Result<PathBuf> {
        let path = self.output_dir.join("report.json");
        self.write(&path, report, pretty)?;
        Ok(path)
    }

    /// Export the dataset, the aggregate report, and one file per category
    /// that has classified repositories.
    pub fn export_all(
        &self,
        dataset: &Dataset,
        recent_count: usize,
        pretty: bool,
    ) -> Result<ExportManifest> {
        info!("Starting JSON export to {}", self.output_dir.display());

        let report = aggregate(dataset, recent_count);
        let mut files = vec![
            self.export_dataset(dataset, pretty)?,
            self.export_report(&report, pretty)?,
        ];

        for entry in &report.by_category {
            files.push(self.export_category(dataset, &entry.category, pretty)?);
        }

        let manifest = ExportManifest {
            exported_at: Utc::now().to_rfc3339(),
            files: files
                .iter()
                .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
                .collect(),
        };

        let manifest_path = self.output_dir.join("manifest.json");
        self.write(&manifest_path, &manifest, pretty)?;

        info!("Export complete: {} files generated", manifest.files.len());
        Ok(manifest)
    }

    fn write<T: Serialize>(&self, path: &PathBuf, value: &T, pretty: bool) -> Result<()> {
        let content = if pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };
        fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FetchMode;
    use crate::models::Classification;
    use crate::models::repository::test_support::record;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn dataset() -> Dataset {
        let mut dataset = Dataset::empty();
        dataset.merge(
            vec![
                record(1, "a/one", Some("tool")),
                record(2, "a/two", Some("other tool")),
            ],
            FetchMode::Full,
        );
        let mut results = BTreeMap::new();
        results.insert(
            1,
            Classification {
                category: "开发工具".to_string(),
                summary: "工具".to_string(),
                key_features: vec![],
            },
        );
        dataset.apply_classifications(&results);
        dataset
    }

    #[test]
    fn test_export_all_writes_manifest_and_category_files() {
        let dir = tempdir().unwrap();
        let exporter = JsonExporter::new(dir.path()).unwrap();

        let manifest = exporter.export_all(&dataset(), 5, true).unwrap();

        assert!(manifest.files.contains(&"stars_data.json".to_string()));
        assert!(manifest.files.contains(&"report.json".to_string()));
        assert!(manifest.files.contains(&"category_开发工具.json".to_string()));
        assert!(dir.path().join("manifest.json").exists());
    }

    #[test]
    fn test_category_file_name_sanitizes_slash() {
        let dir = tempdir().unwrap();
        let exporter = JsonExporter::new(dir.path()).unwrap();

        let path = exporter
            .export_category(&dataset(), "DevOps/基础设施", false)
            .unwrap();
        assert_eq!(
            path.file_name().unwrap().to_string_lossy(),
            "category_DevOps_基础设施.json"
        );
    }

    #[test]
    fn test_exported_dataset_round_trips() {
        let dir = tempdir().unwrap();
        let exporter = JsonExporter::new(dir.path()).unwrap();
        let original = dataset();

        let path = exporter.export_dataset(&original, false).unwrap();
        let content = fs::read_to_string(path).unwrap();
        let reloaded: Dataset = serde_json::from_str(&content).unwrap();

        assert_eq!(reloaded.repositories, original.repositories);
    }
}
