// file: src/classify/engine.rs
// description: repository classification with caching, retry and heuristic fallback
// reference: cache -> remote model -> validate -> keyword fallback

use crate::classify::cache::ClassificationCache;
use crate::classify::heuristic::HeuristicClassifier;
use crate::classify::response::parse_reply;
use crate::config::ClassificationConfig;
use crate::error::{PipelineError, Result};
use crate::github::retry::{RetryPolicy, with_retry};
use crate::models::{Classification, RepoRecord};
use tracing::{debug, warn};

/// The remote text-completion endpoint. A trait seam so tests can substitute
/// failing or counting endpoints.
pub trait CompletionApi: Send + Sync {
    fn complete(&self, prompt: &str) -> impl Future<Output = Result<String>> + Send;
}

pub struct ClassificationEngine<C> {
    api: Option<C>,
    cache: ClassificationCache,
    heuristic: HeuristicClassifier,
    config: ClassificationConfig,
    retry: RetryPolicy,
}

impl<C: CompletionApi> ClassificationEngine<C> {
    pub fn new(
        api: Option<C>,
        cache: ClassificationCache,
        config: ClassificationConfig,
        retry: RetryPolicy,
    ) -> Self {
        if api.is_none() {
            warn!("No AI endpoint configured, classification uses keyword matching only");
        }

        Self {
            heuristic: HeuristicClassifier::new(&config),
            api,
            cache,
            config,
            retry,
        }
    }

    pub fn cache(&self) -> &ClassificationCache {
        &self.cache
    }

    /// Classify one repository. Never mutates the dataset; the caller applies
    /// results via `Dataset::apply_classifications`.
    pub async fn classify(&self, record: &RepoRecord) -> Result<Classification> {
        let fingerprint = record.content_fingerprint.clone();

        if let Some(cached) = self.cache.get(&fingerprint).await {
            return Ok(cached);
        }

        let classification = match &self.api {
            None => self.heuristic.classify(record),
            Some(api) => match self.classify_remote(api, record).await {
                Ok(classification) => classification,
                Err(PipelineError::Authorization(message)) => {
                    // a revoked token should stay visible, not silently
                    // degrade every record to keyword matching
                    return Err(PipelineError::Classification {
                        repo: record.full_name.clone(),
                        message,
                    });
                }
                Err(err) => {
                    warn!(
                        "Remote classification of {} failed ({}), using keyword fallback",
                        record.full_name, err
                    );
                    self.heuristic.classify(record)
                }
            },
        };

        self.cache.insert(&fingerprint, &classification).await;
        Ok(classification)
    }

    async fn classify_remote(&self, api: &C, record: &RepoRecord) -> Result<Classification> {
        let prompt = self.build_prompt(record);

        let reply = with_retry(&self.retry, |attempt| {
            let prompt = prompt.clone();
            async move {
                debug!(
                    "Requesting classification for {} (attempt {})",
                    record.full_name,
                    attempt + 1
                );
                api.complete(&prompt).await
            }
        })
        .await?;

        let classification = parse_reply(&reply)?;
        Ok(self.validated(classification, record))
    }

    /// Coerce out-of-set categories to the fallback and make sure the summary
    /// is never empty; the dataset invariant requires both once classified.
    fn validated(&self, mut classification: Classification, record: &RepoRecord) -> Classification {
        if !self.config.categories.contains(&classification.category) {
            debug!(
                "Model answered category '{}' outside the set for {}, coercing to '{}'",
                classification.category, record.full_name, self.config.fallback_category
            );
            classification.category = self.config.fallback_category.clone();
        }

        if classification.summary.trim().is_empty() {
            classification.summary = self.heuristic.classify(record).summary;
        }

        classification
    }

    fn build_prompt(&self, record: &RepoRecord) -> String {
        let topics = if record.topics.is_empty() {
            "无".to_string()
        } else {
            record.topics.join(", ")
        };

        format!(
            "请分析以下GitHub项目，并提供分类和摘要：\n\n\
             项目名称: {}\n\
             项目描述: {}\n\
             主要语言: {}\n\
             项目主题: {}\n\
             Star数量: {}\n\
             Fork数量: {}\n\
             项目URL: {}\n\n\
             请从以下类别中选择最合适的一个：{}\n\n\
             请以JSON格式返回以下内容：\n\
             1. category: 从上述类别中选择的最合适分类\n\
             2. summary: 项目的简短摘要（不超过100字）\n\
             3. key_features: 项目的主要特点（列出3-5点）\n\n\
             只返回JSON格式的结果，不要有其他文字。",
            record.name,
            record.description.as_deref().unwrap_or("无描述"),
            record.language.as_deref().unwrap_or("未知"),
            topics,
            record.stargazers_count,
            record.forks_count,
            record.html_url,
            self.config.categories.join(", "),
        )
    }
}
