// file: src/classify/heuristic.rs
// description: keyword-based local classification used when the AI endpoint is unavailable
// reference: ordered first-match-wins rule table

use crate::config::ClassificationConfig;
use crate::models::{Classification, RepoRecord};
use crate::utils::validation::truncate_text;

pub struct HeuristicClassifier {
    rules: Vec<(String, String)>,
    fallback_category: String,
    summary_max_chars: usize,
}

impl HeuristicClassifier {
    pub fn new(config: &ClassificationConfig) -> Self {
        let rules = config
            .keyword_rules
            .iter()
            .map(|rule| (rule.keyword.to_lowercase(), rule.category.clone()))
            .collect();

        Self {
            rules,
            fallback_category: config.fallback_category.clone(),
            summary_max_chars: config.summary_max_chars,
        }
    }

    /// Match the description, language and topics against the rule table in
    /// order. No match assigns the fallback category. The summary is the
    /// (truncated) description, since no better text is available locally.
    pub fn classify(&self, record: &RepoRecord) -> Classification {
        let haystack = format!(
            "{} {} {}",
            record.description.as_deref().unwrap_or_default(),
            record.language.as_deref().unwrap_or_default(),
            record.topics.join(" ")
        )
        .to_lowercase();

        let category = self
            .rules
            .iter()
            .find(|(keyword, _)| haystack.contains(keyword))
            .map(|(_, category)| category.clone())
            .unwrap_or_else(|| self.fallback_category.clone());

        let summary = match record.description.as_deref() {
            Some(description) if !description.trim().is_empty() => {
                truncate_text(description, self.summary_max_chars)
            }
            _ => "暂无描述".to_string(),
        };

        Classification {
            category,
            summary,
            key_features: vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::repository::test_support::record;
    use pretty_assertions::assert_eq;

    fn classifier() -> HeuristicClassifier {
        HeuristicClassifier::new(&Config::default_config().classification)
    }

    #[test]
    fn test_keyword_match_is_deterministic() {
        let mut repo = record(1, "a/kv", Some("A fast key-value cache"));
        repo.language = None;

        let first = classifier().classify(&repo);
        let second = classifier().classify(&repo);
        assert_eq!(first, second);
        assert_eq!(first.category, "开发工具");
        assert_eq!(first.summary, "A fast key-value cache");
    }

    #[test]
    fn test_first_matching_rule_wins() {
        // "machine learning" precedes "tool" in the default table
        let repo = record(1, "a/ml", Some("a machine learning tool"));
        let result = classifier().classify(&repo);
        assert_eq!(result.category, "人工智能/机器学习");
    }

    #[test]
    fn test_language_and_topics_participate() {
        let mut repo = record(1, "a/app", Some("does things"));
        repo.language = None;
        repo.topics = vec!["kubernetes".to_string()];
        assert_eq!(classifier().classify(&repo).category, "DevOps/基础设施");
    }

    #[test]
    fn test_no_match_assigns_fallback() {
        let mut repo = record(1, "a/misc", Some("完全无法匹配的描述文本"));
        repo.language = None;
        let result = classifier().classify(&repo);
        assert_eq!(result.category, "其他");
    }

    #[test]
    fn test_missing_description_gets_placeholder_summary() {
        let mut repo = record(1, "a/bare", None);
        repo.language = None;
        let result = classifier().classify(&repo);
        assert_eq!(result.summary, "暂无描述");
    }

    #[test]
    fn test_long_description_is_truncated() {
        let long = "cache ".repeat(50);
        let repo = record(1, "a/long", Some(long.as_str()));
        let result = classifier().classify(&repo);
        assert!(result.summary.chars().count() <= 103); // 100 chars + "..."
        assert!(result.summary.ends_with("..."));
    }
}
