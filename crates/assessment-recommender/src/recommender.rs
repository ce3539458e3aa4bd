/// The recommendation pipeline.
///
/// A `RecommenderContext` is built once at startup and shared read-only across requests.
/// Each call to `get_recommendations` classifies the query and runs the broad similarity
/// search concurrently, then hands both to the ranking pass. Failures of the outside
/// services never escape: classification falls back to default categories and a failed
/// search yields an empty list.
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::classifier::{CategoryClassifier, CategoryInference, LlmClassifier};
use crate::config::Config;
use crate::error::AppError;
use crate::index::{CandidateIndex, LanceCatalogIndex, QueryEmbedder};
use crate::model::{AssessmentRecord, CatalogItem};
use crate::ranking;
use recommender_common::embedding::Embedder;
use recommender_common::openai::{OpenAiClient, OpenAiClientConfig, OpenAiClientError};
use recommender_common::vectordb::VectorDb;

/// Upper bound accepted for a caller-supplied result count.
pub const MAX_RESULTS_CAP: usize = 50;

#[derive(Debug, Clone)]
pub struct RecommenderSettings {
    /// Width of the unfiltered similarity search.
    pub candidate_pool: usize,
    /// Result count when the caller does not ask for one.
    pub default_max_results: usize,
    /// Bound on embedding plus search.
    pub search_timeout: Duration,
}

impl RecommenderSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            candidate_pool: config.candidate_pool,
            default_max_results: config.max_results,
            search_timeout: config.search_timeout,
        }
    }
}

pub struct RecommenderContext {
    embedder: Arc<dyn QueryEmbedder>,
    index: Arc<dyn CandidateIndex>,
    inference: CategoryInference,
    settings: RecommenderSettings,
}

impl RecommenderContext {
    pub fn new(
        embedder: Arc<dyn QueryEmbedder>,
        index: Arc<dyn CandidateIndex>,
        inference: CategoryInference,
        settings: RecommenderSettings,
    ) -> Self {
        Self {
            embedder,
            index,
            inference,
            settings,
        }
    }

    /// Load the embedding model, open the catalog table and set up the classifier.
    ///
    /// Any error here means the service cannot answer queries at all.
    pub async fn initialize(config: &Config) -> Result<Self, AppError> {
        info!("initializing embedding model (may download on first run)");
        let embedder = Arc::new(Embedder::new().await?);
        info!(dimensions = embedder.dimensions(), "embedding model ready");

        let vectordb = VectorDb::connect(&config.lancedb_path).await?;
        if !vectordb.has_table(&config.table_name).await? {
            return Err(AppError::Catalog(format!(
                "table '{}' not found in {}; run ingest-catalog first",
                config.table_name, config.lancedb_path
            )));
        }
        let table = vectordb.open_table(&config.table_name).await?;
        let rows = table.row_count().await?;
        if rows == 0 {
            return Err(AppError::Catalog(format!("table '{}' is empty", table.name())));
        }
        info!(table = table.name(), rows, "catalog table opened");

        let classifier = classifier_from_config(config);

        let inference = CategoryInference::new(
            classifier,
            config.classifier_timeout,
            config.fallback_categories.clone(),
            config.unavailable_categories.clone(),
        )?;
        info!(
            classifier = inference.has_classifier(),
            "category inference ready"
        );

        Ok(Self::new(
            embedder,
            Arc::new(LanceCatalogIndex::new(table)),
            inference,
            RecommenderSettings::from_config(config),
        ))
    }

    /// Recommend up to `max_results` assessments for `query` (default from settings,
    /// capped at `MAX_RESULTS_CAP`).
    pub async fn get_recommendations(
        &self,
        query: &str,
        max_results: Option<usize>,
    ) -> Vec<AssessmentRecord> {
        let limit = max_results
            .unwrap_or(self.settings.default_max_results)
            .clamp(1, MAX_RESULTS_CAP);

        let (categories, candidates) = tokio::join!(
            self.inference.infer_categories(query),
            self.broad_search(query),
        );

        let candidates = match candidates {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "candidate retrieval failed, returning no recommendations");
                return Vec::new();
            }
        };
        let candidate_count = candidates.len();

        let ranked = ranking::rank(candidates, &categories, limit);
        info!(
            candidates = candidate_count,
            categories = ?categories.iter().map(|t| t.code()).collect::<Vec<_>>(),
            results = ranked.len(),
            "recommendations ranked"
        );

        ranked.into_iter().map(AssessmentRecord::from).collect()
    }

    async fn broad_search(&self, query: &str) -> Result<Vec<CatalogItem>, AppError> {
        let search = async {
            let embedding = self.embedder.embed_query(query).await?;
            self.index
                .search(&embedding, self.settings.candidate_pool)
                .await
        };
        tokio::time::timeout(self.settings.search_timeout, search)
            .await
            .map_err(|_| AppError::Timeout {
                operation: "candidate search",
                millis: self.settings.search_timeout.as_millis(),
            })?
    }
}

/// Build the query classifier `config` asks for.
///
/// Returns `None` when no model is configured or the client cannot be built. Inference
/// then uses the unavailable-category set and the service stays up.
pub fn classifier_from_config(config: &Config) -> Option<Arc<dyn CategoryClassifier>> {
    let Some(model) = &config.classifier_model else {
        warn!("CLASSIFIER_MODEL not set, every query uses the default categories");
        return None;
    };
    let openai_config = OpenAiClientConfig::from_env();
    info!(
        base_url = %openai_config.base_url,
        model = %model,
        timeout_ms = config.classifier_timeout.as_millis(),
        "query classifier configured"
    );
    llm_classifier(model, OpenAiClient::new(openai_config))
}

fn llm_classifier(
    model: &str,
    client: Result<OpenAiClient, OpenAiClientError>,
) -> Option<Arc<dyn CategoryClassifier>> {
    match client {
        Ok(client) => {
            let classifier = LlmClassifier::new(Arc::new(client), model);
            Some(Arc::new(classifier) as Arc<dyn CategoryClassifier>)
        }
        Err(e) => {
            warn!(error = %e, "classifier client unavailable, using default categories");
            None
        }
    }
}

/// Whether startup produced a usable context. Transports answer "not ready" instead of
/// serving partial results when it did not.
pub enum Readiness {
    Ready(Arc<RecommenderContext>),
    NotReady(String),
}

impl Readiness {
    pub fn context(&self) -> Option<&Arc<RecommenderContext>> {
        match self {
            Readiness::Ready(ctx) => Some(ctx),
            Readiness::NotReady(_) => None,
        }
    }
}


#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::test_support::*;
    use super::*;
    use crate::model::TestType;

    fn mixed_catalog() -> Vec<CatalogItem> {
        let mut items = Vec::new();
        for i in 1..=5 {
            items.push(item(&format!("k{i}"), &[K]));
        }
        for i in 1..=3 {
            items.push(item(&format!("p{i}"), &[P]));
        }
        items
    }

    fn urls(records: &[AssessmentRecord]) -> Vec<&str> {
        records.iter().map(|r| r.url.as_str()).collect()
    }

    #[tokio::test]
    async fn java_team_player_query_alternates_categories() {
        let index = Arc::new(FixedIndex::ok(mixed_catalog()));
        let classifier: Arc<dyn CategoryClassifier> = Arc::new(FixedClassifier(vec![
            TestType::KnowledgeSkills,
            TestType::PersonalityBehavior,
        ]));
        let ctx = context_with(index.clone(), Some(classifier));

        let out = ctx
            .get_recommendations("Java developer who is a good team player", None)
            .await;

        assert_eq!(urls(&out), vec!["k1", "p1", "k2", "p2", "k3", "p3", "k4", "k5"]);
        assert!(out
            .iter()
            .all(|r| r.test_type == vec![K.to_string()] || r.test_type == vec![P.to_string()]));
        assert_eq!(out[0].duration, -1);
        assert_eq!(out[0].remote_support, "Yes");
        assert_eq!(*index.requested.lock().unwrap(), vec![30]);
    }

    #[tokio::test]
    async fn unmatched_candidates_yield_empty_list() {
        let items = (0..30)
            .map(|i| item(&format!("s{i}"), &["Simulations"]))
            .collect();
        let ctx = context_with(Arc::new(FixedIndex::ok(items)), None);
        assert!(ctx.get_recommendations("anything", None).await.is_empty());
    }

    #[tokio::test]
    async fn duplicate_urls_keep_higher_ranked_entry() {
        let mut first = item("dup", &[K]);
        first.description = "first".to_string();
        let mut second = item("dup", &[K]);
        second.description = "second".to_string();
        let ctx = context_with(Arc::new(FixedIndex::ok(vec![first, second])), None);

        let out = ctx.get_recommendations("q", None).await;
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].description, "first");
    }

    #[tokio::test]
    async fn index_failure_yields_empty_list() {
        let ctx = context_with(Arc::new(FixedIndex::failing()), None);
        assert!(ctx.get_recommendations("q", None).await.is_empty());
    }

    #[tokio::test]
    async fn embedding_failure_yields_empty_list() {
        let index = Arc::new(FixedIndex::ok(mixed_catalog()));
        let inference = CategoryInference::new(
            None,
            Duration::from_secs(1),
            vec![TestType::KnowledgeSkills],
            vec![TestType::KnowledgeSkills],
        )
        .unwrap();
        let ctx = RecommenderContext::new(
            Arc::new(FailingEmbedder),
            index.clone(),
            inference,
            settings(),
        );

        assert!(ctx.get_recommendations("java", None).await.is_empty());
        assert!(index.requested.lock().unwrap().is_empty());
    }

    #[test]
    fn classifier_client_failure_degrades_to_no_classifier() {
        let err = serde_json::from_str::<u32>("not json").unwrap_err();
        assert!(llm_classifier("gpt-test", Err(OpenAiClientError::InvalidJson(err))).is_none());

        let client = OpenAiClient::new(OpenAiClientConfig::from_env()).unwrap();
        assert!(llm_classifier("gpt-test", Ok(client)).is_some());
    }

    #[tokio::test]
    async fn unbuildable_classifier_still_serves_with_unavailable_set() {
        let err = serde_json::from_str::<u32>("not json").unwrap_err();
        let inference = CategoryInference::new(
            llm_classifier("gpt-test", Err(OpenAiClientError::InvalidJson(err))),
            Duration::from_secs(1),
            vec![TestType::KnowledgeSkills],
            vec![TestType::KnowledgeSkills, TestType::PersonalityBehavior],
        )
        .unwrap();
        let ctx = RecommenderContext::new(
            Arc::new(FixedEmbedder),
            Arc::new(FixedIndex::ok(mixed_catalog())),
            inference,
            settings(),
        );
        let readiness = Readiness::Ready(Arc::new(ctx));

        let ctx = readiness.context().unwrap();
        let out = ctx.get_recommendations("java", None).await;
        assert_eq!(urls(&out), vec!["k1", "p1", "k2", "p2", "k3", "p3", "k4", "k5"]);
    }

    #[test]
    fn unset_model_means_no_classifier() {
        let config = Config::from_lookup(|key| {
            (key == "LANCEDB_PATH").then(|| "/tmp/db".to_string())
        })
        .unwrap();
        assert!(classifier_from_config(&config).is_none());
    }

    struct HangingIndex;

    #[async_trait]
    impl CandidateIndex for HangingIndex {
        async fn search(&self, _e: &[f32], _l: usize) -> Result<Vec<CatalogItem>, AppError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(vec![item("late", &[K])])
        }
    }

    #[tokio::test]
    async fn slow_index_times_out_to_empty_list() {
        let inference = CategoryInference::new(
            None,
            Duration::from_secs(1),
            vec![TestType::KnowledgeSkills],
            vec![TestType::KnowledgeSkills],
        )
        .unwrap();
        let mut s = settings();
        s.search_timeout = Duration::from_millis(20);
        let ctx = RecommenderContext::new(
            Arc::new(FixedEmbedder),
            Arc::new(HangingIndex),
            inference,
            s,
        );
        assert!(ctx.get_recommendations("q", None).await.is_empty());
    }

    #[tokio::test]
    async fn max_results_is_respected_and_capped() {
        let items: Vec<CatalogItem> = (0..30).map(|i| item(&format!("k{i}"), &[K])).collect();
        let ctx = context_with(Arc::new(FixedIndex::ok(items)), None);

        assert_eq!(ctx.get_recommendations("q", Some(3)).await.len(), 3);
        assert_eq!(ctx.get_recommendations("q", None).await.len(), 10);
        assert_eq!(ctx.get_recommendations("q", Some(0)).await.len(), 1);
        assert_eq!(ctx.get_recommendations("q", Some(500)).await.len(), 30);
    }
}
