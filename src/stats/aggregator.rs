// file: src/stats/aggregator.rs
// description: pure aggregate statistics over a dataset snapshot
// reference: deterministic input for downstream markdown rendering

use crate::models::{Dataset, RepoRecord};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Renderer-facing report. Plain data, stable ordering, no external calls;
/// aggregating the same snapshot twice yields an identical report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetReport {
    pub total: usize,
    pub classified: usize,
    pub unclassified: usize,
    /// Percent of records classified, one decimal.
    pub classification_rate: f64,
    pub by_category: Vec<CategoryCount>,
    pub by_language: Vec<LanguageShare>,
    pub most_recent: Vec<RecentRepo>,
    pub stars: StarSummary,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LanguageShare {
    pub language: String,
    pub count: usize,
    /// Percent of all records, one decimal; the column may miss 100% by
    /// rounding error.
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentRepo {
    pub full_name: String,
    pub html_url: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub stargazers_count: u64,
    pub starred_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StarSummary {
    pub total: u64,
    pub average: f64,
    pub maximum: u64,
    pub minimum: u64,
}

pub fn aggregate(dataset: &Dataset, recent_count: usize) -> DatasetReport {
    let repos = &dataset.repositories;
    let total = repos.len();
    let classified = repos.iter().filter(|r| r.is_classified).count();

    let classification_rate = if total > 0 {
        round1(classified as f64 / total as f64 * 100.0)
    } else {
        0.0
    };

    DatasetReport {
        total,
        classified,
        unclassified: total - classified,
        classification_rate,
        by_category: count_by_category(repos),
        by_language: count_by_language(repos),
        most_recent: most_recent(repos, recent_count),
        stars: star_summary(repos),
        last_updated: dataset.metadata.last_updated,
    }
}

/// Classified records of one category, sorted by star count descending.
/// This is the per-category listing consumed by the document renderer.
pub fn repositories_by_category<'a>(dataset: &'a Dataset, category: &str) -> Vec<&'a RepoRecord> {
    let mut repos: Vec<&RepoRecord> = dataset
        .repositories
        .iter()
        .filter(|r| r.is_classified && r.category.as_deref() == Some(category))
        .collect();
    repos.sort_by(|a, b| {
        b.stargazers_count
            .cmp(&a.stargazers_count)
            .then_with(|| a.full_name.cmp(&b.full_name))
    });
    repos
}

fn count_by_category(repos: &[RepoRecord]) -> Vec<CategoryCount> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for repo in repos.iter().filter(|r| r.is_classified) {
        if let Some(category) = repo.category.as_deref() {
            *counts.entry(category).or_default() += 1;
        }
    }

    let mut table: Vec<CategoryCount> = counts
        .into_iter()
        .map(|(category, count)| CategoryCount {
            category: category.to_string(),
            count,
        })
        .collect();
    // count descending; the BTreeMap already settled name-ascending ties
    table.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.category.cmp(&b.category)));
    table
}

fn count_by_language(repos: &[RepoRecord]) -> Vec<LanguageShare> {
    let total = repos.len();
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for repo in repos {
        *counts.entry(repo.language.as_deref().unwrap_or("未知")).or_default() += 1;
    }

    let mut table: Vec<LanguageShare> = counts
        .into_iter()
        .map(|(language, count)| LanguageShare {
            language: language.to_string(),
            count,
            percentage: round1(count as f64 / total as f64 * 100.0),
        })
        .collect();
    table.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.language.cmp(&b.language)));
    table
}

fn most_recent(repos: &[RepoRecord], n: usize) -> Vec<RecentRepo> {
    let mut ordered: Vec<&RepoRecord> = repos.iter().collect();
    // unknown star times sink to the end; ids break exact ties
    ordered.sort_by(|a, b| {
        b.starred_at
            .cmp(&a.starred_at)
            .then_with(|| b.id.cmp(&a.id))
    });

    ordered
        .into_iter()
        .take(n)
        .map(|r| RecentRepo {
            full_name: r.full_name.clone(),
            html_url: r.html_url.clone(),
            description: r.description.clone(),
            category: r.category.clone(),
            stargazers_count: r.stargazers_count,
            starred_at: r.starred_at,
        })
        .collect()
}

fn star_summary(repos: &[RepoRecord]) -> StarSummary {
    if repos.is_empty() {
        return StarSummary {
            total: 0,
            average: 0.0,
            maximum: 0,
            minimum: 0,
        };
    }

    let counts: Vec<u64> = repos.iter().map(|r| r.stargazers_count).collect();
    let total: u64 = counts.iter().sum();

    StarSummary {
        total,
        average: round1(total as f64 / counts.len() as f64),
        maximum: *counts.iter().max().unwrap_or(&0),
        minimum: *counts.iter().min().unwrap_or(&0),
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
