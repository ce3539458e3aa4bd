/// MCP server exposing the recommender as a single tool:
/// - `recommend_assessments`: category-balanced assessment recommendations for a query
use std::sync::Arc;

use rmcp::{
    Json, ServerHandler,
    handler::server::router::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::*,
    tool, tool_handler, tool_router,
};

use crate::model::{RecommendParams, RecommendResponse};
use crate::recommender::{Readiness, MAX_RESULTS_CAP};

#[derive(Clone)]
pub struct RecommenderServer {
    readiness: Arc<Readiness>,
    tool_router: ToolRouter<RecommenderServer>,
}

impl RecommenderServer {
    pub fn new(readiness: Arc<Readiness>) -> Self {
        Self {
            readiness,
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router]
impl RecommenderServer {
    #[tool(description = "Recommend skill assessments for a job description or requirement. Results are balanced across the skill categories the query calls for (e.g. technical knowledge and personality).")]
    async fn recommend_assessments(
        &self,
        Parameters(params): Parameters<RecommendParams>,
    ) -> Result<Json<RecommendResponse>, String> {
        let ctx = match self.readiness.as_ref() {
            Readiness::Ready(ctx) => ctx,
            Readiness::NotReady(reason) => {
                return Err(format!("Recommender model is not loaded: {reason}"))
            }
        };

        let query = params.query.trim();
        if query.is_empty() {
            return Err("query must not be empty".to_string());
        }
        let max_results = params
            .max_results
            .map(|n| (n as usize).clamp(1, MAX_RESULTS_CAP));

        Ok(Json(RecommendResponse {
            recommended_assessments: ctx.get_recommendations(query, max_results).await,
        }))
    }
}

#[tool_handler]
impl ServerHandler for RecommenderServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_06_18,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "assessment-recommender".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Assessment recommendation MCP server. Call recommend_assessments with a \
                 free-text job description to get up to 10 (max 50) assessments, each with \
                 url, name, duration, remote/adaptive support and test types."
                    .to_string(),
            ),
        }
    }
}
