/// Query → test type inference.
///
/// The actual classification is delegated to a chat model behind the
/// `CategoryClassifier` trait. `CategoryInference` wraps whichever classifier is
/// configured with a timeout and the fallback policy: it always produces a non-empty,
/// duplicate-free list of categories and never returns an error.
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::model::TestType;
use recommender_common::openai::{ChatCompletionRequest, Message, OpenAiClient};

/// Maps a free-text query to relevant test types, most relevant first.
#[async_trait]
pub trait CategoryClassifier: Send + Sync {
    async fn classify(&self, query: &str) -> Result<Vec<TestType>, AppError>;
}

/// Classifier backed by an OpenAI-compatible chat completion endpoint.
pub struct LlmClassifier {
    client: Arc<OpenAiClient>,
    model: String,
}

impl LlmClassifier {
    pub fn new(client: Arc<OpenAiClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl CategoryClassifier for LlmClassifier {
    async fn classify(&self, query: &str) -> Result<Vec<TestType>, AppError> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                Message::system(SYSTEM_PROMPT),
                Message::user(build_prompt(query)),
            ],
            temperature: Some(0.0),
            max_tokens: Some(64),
        };
        let response = self.client.chat_completions(request, None).await?;
        let text = response
            .first_content()
            .ok_or_else(|| AppError::Classifier("missing choices[0].message.content".to_string()))?;
        debug!(reply = text, "classifier reply");
        parse_category_reply(text)
    }
}

const SYSTEM_PROMPT: &str = "You are an expert recruitment assistant. You map job \
requirements to assessment categories and answer with JSON only.";

fn build_prompt(query: &str) -> String {
    let mut categories = String::new();
    for t in TestType::all() {
        let hint = match t {
            TestType::KnowledgeSkills => " (specific technical skills like Java, Python, SQL)",
            TestType::PersonalityBehavior => {
                " (soft skills like collaboration, leadership, teamwork)"
            }
            _ => "",
        };
        categories.push_str(&format!("- {}: {}{hint}\n", t.code(), t.name()));
    }

    format!(
        "Analyze the following job query and identify the distinct skill domains it requires.\n\n\
         The available test type categories are:\n{categories}\n\
         Query: \"{query}\"\n\n\
         Respond ONLY with a JSON list of the relevant category letters, most relevant first. \
         For example, for \"a Java developer who is a good team player\" respond: [\"K\", \"P\"]"
    )
}

/// Parse a classifier reply into test types.
///
/// Tolerates markdown code fences, a `json` language tag, surrounding whitespace and
/// lower-case codes. Full category names are accepted as well as codes. Unknown entries
/// are dropped; a reply that is not a JSON list, or that names no known category, is
/// an error.
pub fn parse_category_reply(reply: &str) -> Result<Vec<TestType>, AppError> {
    let payload = strip_code_fence(reply);
    let value: serde_json::Value = match serde_json::from_str(payload) {
        Ok(v) => v,
        // Chatty models sometimes wrap the list in prose.
        Err(e) => embedded_list(payload)
            .and_then(|list| serde_json::from_str(list).ok())
            .ok_or_else(|| AppError::Classifier(format!("reply is not valid JSON: {e}")))?,
    };

    let serde_json::Value::Array(entries) = value else {
        return Err(AppError::Classifier(format!(
            "reply is not a list: {payload}"
        )));
    };

    let mut categories = Vec::new();
    for entry in &entries {
        let Some(label) = entry.as_str() else {
            continue;
        };
        match parse_label(label) {
            Some(t) if !categories.contains(&t) => categories.push(t),
            Some(_) => {}
            None => debug!(label, "ignoring unknown category label"),
        }
    }

    if categories.is_empty() {
        return Err(AppError::Classifier(format!(
            "reply names no known category: {payload}"
        )));
    }
    Ok(categories)
}

fn embedded_list(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    (start < end).then(|| &text[start..=end])
}

fn parse_label(label: &str) -> Option<TestType> {
    TestType::from_code(label).or_else(|| {
        let label = label.trim();
        TestType::all().find(|t| t.name().eq_ignore_ascii_case(label))
    })
}

fn strip_code_fence(reply: &str) -> &str {
    let mut s = reply.trim();
    if let Some(rest) = s.strip_prefix("```") {
        s = rest;
        if s.get(..4).is_some_and(|tag| tag.eq_ignore_ascii_case("json")) {
            s = &s[4..];
        }
        s = s.trim_end().strip_suffix("```").unwrap_or(s);
    }
    s.trim()
}

/// Category inference with timeout and fallback.
pub struct CategoryInference {
    classifier: Option<Arc<dyn CategoryClassifier>>,
    timeout: Duration,
    fallback: Vec<TestType>,
    unavailable: Vec<TestType>,
}

impl CategoryInference {
    /// `fallback` is used when the classifier fails; `unavailable` when there is none.
    /// Both must be non-empty.
    pub fn new(
        classifier: Option<Arc<dyn CategoryClassifier>>,
        timeout: Duration,
        fallback: Vec<TestType>,
        unavailable: Vec<TestType>,
    ) -> Result<Self, AppError> {
        if fallback.is_empty() || unavailable.is_empty() {
            return Err(AppError::Config(
                "fallback category sets must not be empty".to_string(),
            ));
        }
        Ok(Self {
            classifier,
            timeout,
            fallback,
            unavailable,
        })
    }

    pub fn has_classifier(&self) -> bool {
        self.classifier.is_some()
    }

    /// Infer the test types relevant to `query`. Never empty.
    pub async fn infer_categories(&self, query: &str) -> Vec<TestType> {
        let Some(classifier) = &self.classifier else {
            debug!("no classifier configured, using unavailable-category set");
            return self.unavailable.clone();
        };

        match tokio::time::timeout(self.timeout, classifier.classify(query)).await {
            Ok(Ok(mut categories)) => {
                let mut seen = Vec::with_capacity(categories.len());
                categories.retain(|t| {
                    let fresh = !seen.contains(t);
                    seen.push(*t);
                    fresh
                });
                if categories.is_empty() {
                    warn!("classifier returned no categories, using fallback");
                    return self.fallback.clone();
                }
                info!(
                    categories = ?categories.iter().map(|t| t.code()).collect::<Vec<_>>(),
                    "classifier identified test types"
                );
                categories
            }
            Ok(Err(e)) => {
                warn!(error = %e, "query classification failed, using fallback");
                self.fallback.clone()
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.timeout.as_millis(),
                    "query classification timed out, using fallback"
                );
                self.fallback.clone()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recommender_common::openai::OpenAiClientConfig;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const K: TestType = TestType::KnowledgeSkills;
    const P: TestType = TestType::PersonalityBehavior;
    const A: TestType = TestType::AbilityAptitude;

    struct Fixed(Result<Vec<TestType>, String>);

    #[async_trait]
    impl CategoryClassifier for Fixed {
        async fn classify(&self, _query: &str) -> Result<Vec<TestType>, AppError> {
            self.0.clone().map_err(AppError::Classifier)
        }
    }

    struct Slow;

    #[async_trait]
    impl CategoryClassifier for Slow {
        async fn classify(&self, _query: &str) -> Result<Vec<TestType>, AppError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(vec![TestType::Simulations])
        }
    }

    fn inference(classifier: Option<Arc<dyn CategoryClassifier>>) -> CategoryInference {
        CategoryInference::new(
            classifier,
            Duration::from_millis(50),
            vec![K, P],
            vec![K, P, A],
        )
        .unwrap()
    }

    #[test]
    fn parses_plain_and_fenced_replies() {
        assert_eq!(parse_category_reply(r#"["K", "P"]"#).unwrap(), vec![K, P]);
        assert_eq!(
            parse_category_reply("```json\n[\"k\", \"a\"]\n```").unwrap(),
            vec![K, A]
        );
        assert_eq!(parse_category_reply("```\n[\"P\"]\n```").unwrap(), vec![P]);
        assert_eq!(
            parse_category_reply(r#"["Knowledge & Skills", "K", "Z"]"#).unwrap(),
            vec![K]
        );
    }

    #[test]
    fn rejects_non_list_and_empty_replies() {
        assert!(parse_category_reply(r#""not a list""#).is_err());
        assert!(parse_category_reply(r#"{"categories": ["K"]}"#).is_err());
        assert!(parse_category_reply("[]").is_err());
        assert!(parse_category_reply(r#"["Q", 7]"#).is_err());
        assert!(parse_category_reply("K and P").is_err());
        assert_eq!(
            parse_category_reply(r#"Relevant categories: ["S"]."#).unwrap(),
            vec![TestType::Simulations]
        );
    }

    #[test]
    fn prompt_lists_every_category() {
        let prompt = build_prompt("java developer");
        for t in TestType::all() {
            assert!(prompt.contains(&format!("- {}: {}", t.code(), t.name())));
        }
        assert!(prompt.contains("\"java developer\""));
    }

    #[tokio::test]
    async fn classifier_result_is_used_in_order() {
        let inf = inference(Some(Arc::new(Fixed(Ok(vec![P, K, P])))));
        assert_eq!(inf.infer_categories("q").await, vec![P, K]);
    }

    #[tokio::test]
    async fn errors_fall_back_to_default_set() {
        let inf = inference(Some(Arc::new(Fixed(Err("boom".to_string())))));
        assert_eq!(inf.infer_categories("q").await, vec![K, P]);

        let inf = inference(Some(Arc::new(Fixed(Ok(vec![])))));
        assert_eq!(inf.infer_categories("q").await, vec![K, P]);
    }

    #[tokio::test]
    async fn timeout_falls_back_to_default_set() {
        let inf = inference(Some(Arc::new(Slow)));
        assert_eq!(inf.infer_categories("q").await, vec![K, P]);
    }

    #[tokio::test]
    async fn missing_classifier_uses_wider_set() {
        let inf = inference(None);
        assert!(!inf.has_classifier());
        assert_eq!(inf.infer_categories("q").await, vec![K, P, A]);
    }

    #[test]
    fn empty_fallback_sets_are_rejected() {
        assert!(CategoryInference::new(None, Duration::from_secs(1), vec![], vec![K]).is_err());
    }

    async fn llm_inference(server: &MockServer) -> CategoryInference {
        let config = OpenAiClientConfig {
            base_url: format!("{}/v1", server.uri()),
            api_key: None,
            default_timeout: Duration::from_secs(5),
            max_retries: 0,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(1),
            max_error_body_bytes: 1024,
        };
        let client = Arc::new(OpenAiClient::new(config).unwrap());
        CategoryInference::new(
            Some(Arc::new(LlmClassifier::new(client, "test-model"))),
            Duration::from_secs(5),
            vec![K, P],
            vec![K, P, A],
        )
        .unwrap()
    }

    fn reply(content: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "id": "cmpl-1",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": content},
                "finish_reason": "stop"
            }]
        }))
    }

    #[tokio::test]
    async fn llm_classifier_reads_fenced_codes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(reply("```json\n[\"K\", \"P\"]\n```"))
            .expect(1)
            .mount(&server)
            .await;

        let inf = llm_inference(&server).await;
        assert_eq!(
            inf.infer_categories("Java developer who is a good team player")
                .await,
            vec![K, P]
        );
    }

    #[tokio::test]
    async fn llm_classifier_non_list_reply_uses_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(reply("\"not a list\""))
            .mount(&server)
            .await;

        let inf = llm_inference(&server).await;
        assert_eq!(inf.infer_categories("anything").await, vec![K, P]);
    }

    #[tokio::test]
    async fn llm_classifier_upstream_error_uses_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("down"))
            .mount(&server)
            .await;

        let inf = llm_inference(&server).await;
        assert_eq!(inf.infer_categories("anything").await, vec![K, P]);
    }
}
