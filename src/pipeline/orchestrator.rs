// file: src/pipeline/orchestrator.rs
// description: coordinates fetching, merging, classification and persistence
// reference: orchestrates the asynchronous sync workflow

use crate::classify::{ClassificationCache, ClassificationEngine, CompletionApi, GlmClient};
use crate::config::{Config, FetchMode};
use crate::error::{PipelineError, Result};
use crate::github::{GithubClient, RetryPolicy};
use crate::models::{Classification, Dataset};
use crate::pipeline::progress::{PipelineStats, ProgressTracker};
use crate::store::DatasetStore;
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

pub struct PipelineOrchestrator<C> {
    config: Config,
    store: Arc<DatasetStore>,
    fetcher: GithubClient,
    engine: ClassificationEngine<C>,
}

impl PipelineOrchestrator<GlmClient> {
    pub fn new(config: Config) -> Result<Self> {
        let api = GlmClient::from_config(&config.ai)?;
        let cache = ClassificationCache::new(config.storage.cache_file.clone());
        let retry = RetryPolicy::from_config(&config.pipeline);
        let engine = ClassificationEngine::new(api, cache, config.classification.clone(), retry);
        Self::with_classifier(config, engine)
    }
}

impl<C: CompletionApi> PipelineOrchestrator<C> {
    pub fn with_classifier(config: Config, engine: ClassificationEngine<C>) -> Result<Self> {
        let store = Arc::new(DatasetStore::new(&config.storage));
        let fetcher = GithubClient::new(config.github.clone(), &config.pipeline)?;

        Ok(Self {
            config,
            store,
            fetcher,
            engine,
        })
    }

    /// Full pipeline pass: fetch, merge, persist, classify pending records,
    /// persist again. Each persist keeps the prior snapshot as backup, so an
    /// interrupted run can simply be re-run in incremental mode.
    pub async fn run(
        &self,
        mode_override: Option<FetchMode>,
        skip_classification: bool,
    ) -> Result<PipelineStats> {
        let start = Instant::now();
        let mode = mode_override.unwrap_or(self.config.github.fetch_mode);
        info!("Starting sync pipeline ({:?} mode)", mode);

        let mut dataset = self.load_dataset().await?;
        dataset.metadata.username = Some(self.config.github.username.clone());

        let outcome = self.fetcher.fetch(mode, dataset.metadata.cursor).await?;
        let mut stats = PipelineStats {
            fetched: outcome.records.len(),
            ..PipelineStats::new()
        };

        let merge = dataset.merge(outcome.records, mode);
        stats.added = merge.added;
        stats.updated = merge.updated;
        stats.unchanged = merge.unchanged;
        info!(
            "Merge complete: {} added, {} updated, {} unchanged",
            merge.added, merge.updated, merge.unchanged
        );

        self.persist(&dataset).await?;

        if skip_classification {
            info!("Classification skipped by request");
        } else {
            let (classified, failed) = self.classify_pending(&mut dataset).await?;
            stats.classified = classified;
            stats.classification_failures = failed;

            self.persist(&dataset).await?;
            self.engine.cache().persist().await?;
        }

        stats.duration_secs = start.elapsed().as_secs();
        self.log_final_stats(&stats, &dataset);
        Ok(stats)
    }

    /// Classify whatever is pending in the stored dataset, without fetching.
    pub async fn classify_only(&self) -> Result<PipelineStats> {
        let start = Instant::now();
        let mut dataset = self.load_dataset().await?;

        let (classified, failed) = self.classify_pending(&mut dataset).await?;
        self.persist(&dataset).await?;
        self.engine.cache().persist().await?;

        Ok(PipelineStats {
            classified,
            classification_failures: failed,
            duration_secs: start.elapsed().as_secs(),
            ..PipelineStats::new()
        })
    }

    /// Classify pending records with bounded concurrency. One record's
    /// failure is logged and skipped; it stays pending for the next run.
    async fn classify_pending(&self, dataset: &mut Dataset) -> Result<(usize, usize)> {
        let pending = dataset.pending_classification();
        if pending.is_empty() {
            info!("No repositories pending classification");
            return Ok((0, 0));
        }

        let total = pending.len();
        info!(
            "Classifying {} repositories with {} workers",
            total, self.config.pipeline.parallel_workers
        );
        let progress = ProgressTracker::new(total);

        let engine = &self.engine;
        let results: Vec<Option<(u64, Classification)>> =
            stream::iter(pending.into_iter().map(|record| {
                let progress = &progress;
                async move {
                    match engine.classify(&record).await {
                        Ok(classification) => {
                            progress.inc_classified();
                            Some((record.id, classification))
                        }
                        Err(e) => {
                            progress.inc_failed();
                            warn!("Leaving {} unclassified: {}", record.full_name, e);
                            None
                        }
                    }
                }
            }))
            .buffer_unordered(self.config.pipeline.parallel_workers.max(1))
            .collect()
            .await;

        progress.finish();

        let classifications: BTreeMap<u64, Classification> =
            results.into_iter().flatten().collect();
        let classified = classifications.len();
        dataset.apply_classifications(&classifications);

        Ok((classified, total - classified))
    }

    async fn load_dataset(&self) -> Result<Dataset> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.load())
            .await
            .map_err(|e| PipelineError::Validation(format!("load task failed: {e}")))?
    }

    async fn persist(&self, dataset: &Dataset) -> Result<()> {
        let store = self.store.clone();
        let snapshot = dataset.clone();
        tokio::task::spawn_blocking(move || store.persist(&snapshot))
            .await
            .map_err(|e| PipelineError::Validation(format!("persist task failed: {e}")))?
    }

    fn log_final_stats(&self, stats: &PipelineStats, dataset: &Dataset) {
        info!("=== Sync Execution Summary ===");
        info!("Duration: {} seconds", stats.duration_secs);
        info!("Repositories fetched: {}", stats.fetched);
        info!(
            "Merged: {} added, {} updated, {} unchanged",
            stats.added, stats.updated, stats.unchanged
        );
        info!("Classified this run: {}", stats.classified);
        info!("Classification failures: {}", stats.classification_failures);
        info!(
            "Classification success rate: {:.2}%",
            stats.classification_success_rate()
        );
        info!(
            "Dataset now: {} total, {} classified, {} pending",
            dataset.metadata.total_count,
            dataset.metadata.classified_count,
            dataset.metadata.unclassified_count
        );
        info!("==============================");
    }
}
