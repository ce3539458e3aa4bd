use std::time::Duration;

use crate::error::AppError;
use crate::model::TestType;

const DEFAULT_TABLE: &str = "assessments";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8000";
const DEFAULT_CATALOG_JSON: &str = "data/crawled/assessments.json";
const DEFAULT_CANDIDATE_POOL: usize = 30;
const DEFAULT_MAX_RESULTS: usize = 10;
const DEFAULT_FALLBACK_CATEGORIES: &str = "K,P";
const DEFAULT_UNAVAILABLE_CATEGORIES: &str = "K,P,A";

/// How the service is exposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// JSON over HTTP (`/health`, `/recommend`).
    Http,
    /// MCP tool server over stdio.
    Stdio,
}

/// Application configuration loaded explicitly from environment variables.
///
/// Only the LanceDB path is required. Leaving `CLASSIFIER_MODEL` unset runs the service
/// without a classifier; every query then uses the "unavailable" category set.
#[derive(Debug, Clone)]
pub struct Config {
    /// Filesystem path to the LanceDB data directory.
    pub lancedb_path: String,
    /// LanceDB table holding the embedded catalog.
    pub table_name: String,
    /// HTTP listen address.
    pub bind_addr: String,
    pub transport: Transport,
    /// Width of the unfiltered similarity search.
    pub candidate_pool: usize,
    /// Default length of a recommendation list.
    pub max_results: usize,
    /// Chat model used to classify queries into test types.
    pub classifier_model: Option<String>,
    pub classifier_timeout: Duration,
    pub search_timeout: Duration,
    /// Categories used when the classifier errors or replies with garbage.
    pub fallback_categories: Vec<TestType>,
    /// Categories used when no classifier is configured.
    pub unavailable_categories: Vec<TestType>,
    /// Crawled catalog read by the ingester.
    pub catalog_json: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `LANCEDB_PATH`: path to LanceDB data directory
    ///
    /// Optional:
    /// - `CATALOG_TABLE`, `BIND_ADDR`, `RECOMMENDER_TRANSPORT` (`http` | `stdio`)
    /// - `CANDIDATE_POOL`, `MAX_RESULTS`
    /// - `CLASSIFIER_MODEL`, `CLASSIFIER_TIMEOUT_SECS`, `SEARCH_TIMEOUT_SECS`
    /// - `FALLBACK_CATEGORIES`, `UNAVAILABLE_CATEGORIES` (comma-separated codes)
    /// - `CATALOG_JSON`
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let lancedb_path = var("LANCEDB_PATH")
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| {
                AppError::Config("LANCEDB_PATH environment variable is required".to_string())
            })?;

        let transport = match var("RECOMMENDER_TRANSPORT").as_deref().map(str::trim) {
            None | Some("") | Some("http") => Transport::Http,
            Some("stdio") => Transport::Stdio,
            Some(other) => {
                return Err(AppError::Config(format!(
                    "RECOMMENDER_TRANSPORT must be 'http' or 'stdio', got '{other}'"
                )))
            }
        };

        let candidate_pool = parse_positive(&var, "CANDIDATE_POOL", DEFAULT_CANDIDATE_POOL)?;
        let max_results = parse_positive(&var, "MAX_RESULTS", DEFAULT_MAX_RESULTS)?;
        let classifier_timeout =
            Duration::from_secs(parse_positive(&var, "CLASSIFIER_TIMEOUT_SECS", 20)? as u64);
        let search_timeout =
            Duration::from_secs(parse_positive(&var, "SEARCH_TIMEOUT_SECS", 10)? as u64);

        let fallback_categories =
            parse_categories(&var, "FALLBACK_CATEGORIES", DEFAULT_FALLBACK_CATEGORIES)?;
        let unavailable_categories =
            parse_categories(&var, "UNAVAILABLE_CATEGORIES", DEFAULT_UNAVAILABLE_CATEGORIES)?;

        Ok(Self {
            lancedb_path,
            table_name: var("CATALOG_TABLE").unwrap_or_else(|| DEFAULT_TABLE.to_string()),
            bind_addr: var("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            transport,
            candidate_pool,
            max_results,
            classifier_model: var("CLASSIFIER_MODEL").filter(|s| !s.trim().is_empty()),
            classifier_timeout,
            search_timeout,
            fallback_categories,
            unavailable_categories,
            catalog_json: var("CATALOG_JSON").unwrap_or_else(|| DEFAULT_CATALOG_JSON.to_string()),
        })
    }
}

fn parse_positive(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: usize,
) -> Result<usize, AppError> {
    let Some(raw) = var(key) else {
        return Ok(default);
    };
    match raw.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(AppError::Config(format!(
            "{key} must be a positive integer, got '{raw}'"
        ))),
    }
}

fn parse_categories(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: &str,
) -> Result<Vec<TestType>, AppError> {
    let raw = var(key).unwrap_or_else(|| default.to_string());
    let categories = TestType::parse_code_list(&raw);
    if categories.is_empty() {
        return Err(AppError::Config(format!(
            "{key} must name at least one category code (A,B,C,D,E,K,P,S), got '{raw}'"
        )));
    }
    Ok(categories)
}
