// file: src/config.rs
// description: application configuration management with toml support
// reference: https://docs.rs/config

use crate::error::{PipelineError, Result};
use crate::utils::validation::Validator;
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub github: GithubConfig,
    pub ai: AiConfig,
    pub storage: StorageConfig,
    pub pipeline: PipelineConfig,
    pub classification: ClassificationConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    Full,
    Incremental,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GithubConfig {
    pub username: String,
    #[serde(default)]
    pub token: Option<String>,
    pub api_base_url: String,
    /// Repositories per page, capped at 100 by the GitHub API.
    pub per_page: u32,
    /// Upper bound on repositories fetched in one run. 0 means unlimited.
    pub max_items: usize,
    pub fetch_mode: FetchMode,
    /// Longest the fetcher will sleep waiting for a rate-limit window reset.
    pub max_rate_limit_wait_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AiConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    pub api_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    pub data_file: PathBuf,
    pub backup_dir: PathBuf,
    pub auto_backup: bool,
    /// Rotating backups retained by `cleanup`.
    pub max_backups: usize,
    #[serde(default)]
    pub cache_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Concurrent classification requests in flight.
    pub parallel_workers: usize,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClassificationConfig {
    /// Closed set of valid category labels.
    pub categories: Vec<String>,
    /// Category assigned when the model answers outside the set or no
    /// keyword rule matches.
    pub fallback_category: String,
    /// Ordered keyword rules for the heuristic fallback; first match wins.
    #[serde(default)]
    pub keyword_rules: Vec<KeywordRule>,
    /// Length cap for fallback summaries derived from the description.
    pub summary_max_chars: usize,
    /// How many entries the recently-starred report lists.
    pub recent_count: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KeywordRule {
    pub keyword: String,
    pub category: String,
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv().ok();

        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        } else {
            builder = builder
                .add_source(config::File::from(Path::new("config/default.toml")).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("STAR_ORGANIZE")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .map_err(|e| PipelineError::Config(e.to_string()))?;

        let mut config: Config = settings
            .try_deserialize()
            .map_err(|e| PipelineError::Config(e.to_string()))?;

        if config.classification.keyword_rules.is_empty() {
            config.classification.keyword_rules = default_keyword_rules();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn default_config() -> Self {
        Self {
            github: GithubConfig {
                username: String::new(),
                token: None,
                api_base_url: "https://api.github.com".to_string(),
                per_page: 100,
                max_items: 0,
                fetch_mode: FetchMode::Incremental,
                max_rate_limit_wait_secs: 900,
            },
            ai: AiConfig {
                api_key: None,
                api_url: "https://open.bigmodel.cn/api/paas/v4/chat/completions".to_string(),
                model: "glm-4.5-flash".to_string(),
                temperature: 0.5,
                max_tokens: 300,
                timeout_secs: 30,
            },
            storage: StorageConfig {
                data_file: PathBuf::from("data/stars_data.json"),
                backup_dir: PathBuf::from("data/backups"),
                auto_backup: true,
                max_backups: 5,
                cache_file: Some(PathBuf::from("data/classification_cache.json")),
            },
            pipeline: PipelineConfig {
                parallel_workers: 4,
                max_retries: 3,
                retry_base_delay_ms: 1_000,
                retry_max_delay_ms: 30_000,
                request_timeout_secs: 30,
            },
            classification: ClassificationConfig {
                categories: default_categories(),
                fallback_category: "其他".to_string(),
                keyword_rules: default_keyword_rules(),
                summary_max_chars: 100,
                recent_count: 10,
            },
        }
    }

    fn validate(&self) -> Result<()> {
        if self.github.username.trim().is_empty() {
            return Err(PipelineError::Config(
                "github.username must be set".to_string(),
            ));
        }
        Validator::validate_username(&self.github.username)?;
        Validator::validate_url(&self.github.api_base_url)?;
        Validator::validate_url(&self.ai.api_url)?;

        if self.github.per_page == 0 || self.github.per_page > 100 {
            return Err(PipelineError::Config(
                "github.per_page must be between 1 and 100".to_string(),
            ));
        }

        if self.pipeline.parallel_workers == 0 {
            return Err(PipelineError::Config(
                "parallel_workers must be greater than 0".to_string(),
            ));
        }

        if self.classification.categories.is_empty() {
            return Err(PipelineError::Config(
                "classification.categories must not be empty".to_string(),
            ));
        }

        if !self
            .classification
            .categories
            .contains(&self.classification.fallback_category)
        {
            return Err(PipelineError::Config(format!(
                "fallback_category '{}' is not in the category set",
                self.classification.fallback_category
            )));
        }

        for rule in &self.classification.keyword_rules {
            if !self.classification.categories.contains(&rule.category) {
                return Err(PipelineError::Config(format!(
                    "keyword rule '{}' maps to unknown category '{}'",
                    rule.keyword, rule.category
                )));
            }
        }

        Ok(())
    }
}

pub fn default_categories() -> Vec<String> {
    [
        "前端开发",
        "后端开发",
        "全栈开发",
        "移动应用开发",
        "人工智能/机器学习",
        "数据科学/分析",
        "DevOps/基础设施",
        "安全工具",
        "开发工具",
        "学习资源",
        "区块链/Web3",
        "游戏开发",
        "物联网",
        "其他",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Ordered first-match-wins table used when the AI endpoint is unavailable.
/// More specific keywords come before generic ones.
pub fn default_keyword_rules() -> Vec<KeywordRule> {
    fn rule(keyword: &str, category: &str) -> KeywordRule {
        KeywordRule {
            keyword: keyword.to_string(),
            category: category.to_string(),
        }
    }

    vec![
        rule("machine learning", "人工智能/机器学习"),
        rule("deep learning", "人工智能/机器学习"),
        rule("neural", "人工智能/机器学习"),
        rule("tensorflow", "人工智能/机器学习"),
        rule("pytorch", "人工智能/机器学习"),
        rule("llm", "人工智能/机器学习"),
        rule("nlp", "人工智能/机器学习"),
        rule("data science", "数据科学/分析"),
        rule("data analysis", "数据科学/分析"),
        rule("analytics", "数据科学/分析"),
        rule("visualization", "数据科学/分析"),
        rule("jupyter", "数据科学/分析"),
        rule("pandas", "数据科学/分析"),
        rule("react native", "移动应用开发"),
        rule("flutter", "移动应用开发"),
        rule("android", "移动应用开发"),
        rule("ios", "移动应用开发"),
        rule("swift", "移动应用开发"),
        rule("kotlin", "移动应用开发"),
        rule("fullstack", "全栈开发"),
        rule("full-stack", "全栈开发"),
        rule("webapp", "全栈开发"),
        rule("web app", "全栈开发"),
        rule("frontend", "前端开发"),
        rule("front-end", "前端开发"),
        rule("react", "前端开发"),
        rule("vue", "前端开发"),
        rule("angular", "前端开发"),
        rule("typescript", "前端开发"),
        rule("javascript", "前端开发"),
        rule("css", "前端开发"),
        rule("backend", "后端开发"),
        rule("back-end", "后端开发"),
        rule("api", "后端开发"),
        rule("server", "后端开发"),
        rule("database", "后端开发"),
        rule("django", "后端开发"),
        rule("flask", "后端开发"),
        rule("spring", "后端开发"),
        rule("kubernetes", "DevOps/基础设施"),
        rule("k8s", "DevOps/基础设施"),
        rule("docker", "DevOps/基础设施"),
        rule("devops", "DevOps/基础设施"),
        rule("ci/cd", "DevOps/基础设施"),
        rule("infrastructure", "DevOps/基础设施"),
        rule("deploy", "DevOps/基础设施"),
        rule("cloud", "DevOps/基础设施"),
        rule("security", "安全工具"),
        rule("pentest", "安全工具"),
        rule("vulnerability", "安全工具"),
        rule("encryption", "安全工具"),
        rule("blockchain", "区块链/Web3"),
        rule("web3", "区块链/Web3"),
        rule("ethereum", "区块链/Web3"),
        rule("solidity", "区块链/Web3"),
        rule("nft", "区块链/Web3"),
        rule("game", "游戏开发"),
        rule("unity", "游戏开发"),
        rule("unreal", "游戏开发"),
        rule("gaming", "游戏开发"),
        rule("iot", "物联网"),
        rule("embedded", "物联网"),
        rule("arduino", "物联网"),
        rule("raspberry pi", "物联网"),
        rule("tutorial", "学习资源"),
        rule("course", "学习资源"),
        rule("learning", "学习资源"),
        rule("awesome", "学习资源"),
        rule("book", "学习资源"),
        rule("guide", "学习资源"),
        rule("cache", "开发工具"),
        rule("cli", "开发工具"),
        rule("terminal", "开发工具"),
        rule("editor", "开发工具"),
        rule("plugin", "开发工具"),
        rule("extension", "开发工具"),
        rule("tool", "开发工具"),
        rule("utility", "开发工具"),
        rule("ai", "人工智能/机器学习"),
    ]
}
