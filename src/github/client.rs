// file: src/github/client.rs
// description: paginated GitHub starred-repositories client with rate-limit handling
// reference: https://docs.github.com/en/rest/activity/starring

use crate::config::{FetchMode, GithubConfig, PipelineConfig};
use crate::error::{PipelineError, Result};
use crate::github::retry::{RetryPolicy, with_retry};
use crate::models::RepoRecord;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

const STAR_MEDIA_TYPE: &str = "application/vnd.github.star+json";
const API_VERSION: &str = "2022-11-28";

/// One item of the starred listing when requested with the star media type:
/// the star timestamp plus the repository itself.
#[derive(Debug, Deserialize)]
struct StarredItem {
    starred_at: DateTime<Utc>,
    repo: ApiRepo,
}

#[derive(Debug, Deserialize)]
struct ApiRepo {
    id: u64,
    name: String,
    full_name: String,
    html_url: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    language: Option<String>,
    stargazers_count: u64,
    forks_count: u64,
    #[serde(default)]
    topics: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl StarredItem {
    fn into_record(self) -> RepoRecord {
        let repo = self.repo;
        let mut record = RepoRecord {
            id: repo.id,
            name: repo.name,
            full_name: repo.full_name,
            html_url: repo.html_url,
            description: repo.description,
            language: repo.language,
            stargazers_count: repo.stargazers_count,
            forks_count: repo.forks_count,
            topics: repo.topics,
            created_at: repo.created_at,
            updated_at: repo.updated_at,
            starred_at: Some(self.starred_at),
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

#[derive(Debug, Clone, Copy, Default)]
struct RateLimit {
    remaining: Option<u64>,
    reset_at: Option<DateTime<Utc>>,
}

impl RateLimit {
    fn from_headers(headers: &HeaderMap) -> Self {
        let parse = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
        };

        Self {
            remaining: parse("x-ratelimit-remaining"),
            reset_at: parse("x-ratelimit-reset")
                .and_then(|secs| Utc.timestamp_opt(secs as i64, 0).single()),
        }
    }
}

/// Result of one fetch pass: records most-recent-first plus the new cursor
/// (the newest starred_at observed, or the prior cursor when nothing new).
#[derive(Debug)]
pub struct FetchOutcome {
    pub records: Vec<RepoRecord>,
    pub cursor: Option<DateTime<Utc>>,
}

pub struct GithubClient {
    client: reqwest::Client,
    config: GithubConfig,
    retry: RetryPolicy,
}

impl GithubClient {
    pub fn new(config: GithubConfig, pipeline: &PipelineConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(pipeline.request_timeout_secs))
            .user_agent(concat!("star_organize/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            config,
            retry: RetryPolicy::from_config(pipeline),
        })
    }

    /// Page through the starred listing. Full mode reads everything up to
    /// `max_items`; incremental mode stops at the first item at or before
    /// `cursor`. The listing is most-recently-starred first, which is what
    /// makes the incremental cutoff sound.
    pub async fn fetch(
        &self,
        mode: FetchMode,
        cursor: Option<DateTime<Utc>>,
    ) -> Result<FetchOutcome> {
        let effective_cursor = match mode {
            FetchMode::Full => None,
            FetchMode::Incremental => cursor,
        };

        if mode == FetchMode::Incremental && effective_cursor.is_none() {
            info!("No sync cursor recorded yet, incremental fetch reads the full list");
        }

        let mut records: Vec<RepoRecord> = Vec::new();
        let mut page = 1u32;

        'pages: loop {
            let items = self.fetch_page(page).await?;
            if items.is_empty() {
                debug!("Page {} empty, pagination complete", page);
                break;
            }

            let item_count = items.len();
            for item in items {
                if already_known(item.starred_at, effective_cursor) {
                    debug!(
                        "Reached sync cursor at {}, stopping incremental fetch",
                        item.starred_at
                    );
                    break 'pages;
                }

                records.push(item.into_record());

                if self.config.max_items > 0 && records.len() >= self.config.max_items {
                    info!("Reached max_items limit of {}", self.config.max_items);
                    break 'pages;
                }
            }

            if (item_count as u32) < self.config.per_page {
                break;
            }
            page += 1;
        }

        let new_cursor = records
            .iter()
            .filter_map(|r| r.starred_at)
            .max()
            .or(cursor);

        info!(
            "Fetched {} starred repositories ({} pages read)",
            records.len(),
            page
        );

        Ok(FetchOutcome {
            records,
            cursor: new_cursor,
        })
    }

    async fn fetch_page(&self, page: u32) -> Result<Vec<StarredItem>> {
        with_retry(&self.retry, |_attempt| async move {
            loop {
                match self.request_page(page).await {
                    Err(PipelineError::RateLimited { reset_at }) => {
                        // pause for the quota window instead of burning retries
                        self.wait_for_quota(reset_at).await?;
                    }
                    other => return other,
                }
            }
        })
        .await
    }

    async fn request_page(&self, page: u32) -> Result<Vec<StarredItem>> {
        let url = format!(
            "{}/users/{}/starred?page={}&per_page={}",
            self.config.api_base_url, self.config.username, page, self.config.per_page
        );

        debug!("Requesting starred page {}", page);

        let mut request = self
            .client
            .get(&url)
            .header("Accept", STAR_MEDIA_TYPE)
            .header("X-GitHub-Api-Version", API_VERSION);

        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        let rate = RateLimit::from_headers(response.headers());

        if status.is_success() {
            if let Some(remaining) = rate.remaining
                && remaining < 10
            {
                warn!("GitHub rate limit nearly exhausted: {} requests left", remaining);
            }
            return response
                .json::<Vec<StarredItem>>()
                .await
                .map_err(|e| PipelineError::MalformedResponse(format!("starred page: {e}")));
        }

        match status {
            StatusCode::UNAUTHORIZED => Err(PipelineError::Authorization(
                "GitHub rejected the token (401)".to_string(),
            )),
            StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS
                if rate.remaining == Some(0) =>
            {
                Err(PipelineError::RateLimited {
                    reset_at: rate.reset_at.unwrap_or_else(|| Utc::now() + chrono::Duration::seconds(60)),
                })
            }
            StatusCode::FORBIDDEN => Err(PipelineError::Authorization(
                "GitHub denied access (403)".to_string(),
            )),
            StatusCode::NOT_FOUND => Err(PipelineError::Validation(format!(
                "user '{}' not found",
                self.config.username
            ))),
            s if s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS => {
                Err(PipelineError::Fetch(format!("GitHub returned {s}")))
            }
            s => Err(PipelineError::MalformedResponse(format!(
                "unexpected status {s} from GitHub"
            ))),
        }
    }

    async fn wait_for_quota(&self, reset_at: DateTime<Utc>) -> Result<()> {
        let wait = (reset_at - Utc::now())
            .to_std()
            .unwrap_or(Duration::from_secs(1));
        let cap = Duration::from_secs(self.config.max_rate_limit_wait_secs);

        if wait > cap {
            warn!(
                "Rate limit reset at {} exceeds the configured wait cap, giving up",
                reset_at
            );
            return Err(PipelineError::RateLimited { reset_at });
        }

        info!("Rate limit exhausted, pausing {:?} until quota reset", wait);
        tokio::time::sleep(wait).await;
        Ok(())
    }
}

/// A record at or before the cursor was seen in a previous run. Ties are
/// treated as known: skipping a tie is self-healing via a full run, while a
/// duplicate would corrupt the dataset counts.
fn already_known(starred_at: DateTime<Utc>, cursor: Option<DateTime<Utc>>) -> bool {
    cursor.is_some_and(|cursor| starred_at <= cursor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, day, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_already_known_without_cursor() {
        assert!(!already_known(ts(1), None));
    }

    #[test]
    fn test_already_known_cutoff_is_inclusive() {
        assert!(already_known(ts(1), Some(ts(1))));
        assert!(already_known(ts(1), Some(ts(2))));
        assert!(!already_known(ts(2), Some(ts(1))));
    }

    #[test]
    fn test_incremental_union_matches_full_fetch() {
        // ten stars at distinct, strictly increasing timestamps
        let all: Vec<DateTime<Utc>> = (1..=10).map(ts).collect();
        let cursor = ts(6);

        // baseline: a full fetch taken when the cursor was recorded
        let baseline: Vec<_> = all.iter().copied().filter(|t| *t <= cursor).collect();
        // incremental: what the most-recent-first scan keeps
        let incremental: Vec<_> = all
            .iter()
            .rev()
            .copied()
            .take_while(|t| !already_known(*t, Some(cursor)))
            .collect();

        let mut union: Vec<_> = baseline.iter().chain(incremental.iter()).copied().collect();
        union.sort();
        assert_eq!(union, all);
    }

    #[test]
    fn test_starred_item_deserializes_star_media_type() {
        let json = r#"{
            "starred_at": "2024-06-01T12:00:00Z",
            "repo": {
                "id": 42,
                "name": "hello",
                "full_name": "octocat/hello",
                "html_url": "https://github.com/octocat/hello",
                "description": "Example repo",
                "language": "Rust",
                "stargazers_count": 7,
                "forks_count": 2,
                "topics": ["demo"],
                "created_at": "2020-01-01T00:00:00Z",
                "updated_at": "2024-05-01T00:00:00Z"
            }
        }"#;

        let item: StarredItem = serde_json::from_str(json).unwrap();
        let record = item.into_record();

        assert_eq!(record.id, 42);
        assert_eq!(record.full_name, "octocat/hello");
        assert_eq!(record.starred_at, Some(ts(1)));
        assert_eq!(record.topics, vec!["demo".to_string()]);
        assert!(!record.content_fingerprint.is_empty());
        assert!(!record.is_classified);
    }

    #[test]
    fn test_starred_item_tolerates_null_description_and_language() {
        let json = r#"{
            "starred_at": "2024-06-01T12:00:00Z",
            "repo": {
                "id": 1,
                "name": "bare",
                "full_name": "octocat/bare",
                "html_url": "https://github.com/octocat/bare",
                "description": null,
                "language": null,
                "stargazers_count": 0,
                "forks_count": 0,
                "created_at": "2020-01-01T00:00:00Z",
                "updated_at": "2024-05-01T00:00:00Z"
            }
        }"#;

        let item: StarredItem = serde_json::from_str(json).unwrap();
        let record = item.into_record();
        assert_eq!(record.description, None);
        assert_eq!(record.language, None);
        assert!(record.topics.is_empty());
    }

    #[test]
    fn test_rate_limit_header_parsing() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-remaining", "0".parse().unwrap());
        headers.insert("x-ratelimit-reset", "1717243200".parse().unwrap());

        let rate = RateLimit::from_headers(&headers);
        assert_eq!(rate.remaining, Some(0));
        assert_eq!(
            rate.reset_at,
            Some(Utc.timestamp_opt(1_717_243_200, 0).single().unwrap())
        );

        let empty = RateLimit::from_headers(&HeaderMap::new());
        assert_eq!(empty.remaining, None);
        assert_eq!(empty.reset_at, None);
    }
}
