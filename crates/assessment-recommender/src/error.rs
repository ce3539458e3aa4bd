use recommender_common::error::CommonError;
use recommender_common::openai::OpenAiClientError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Common(#[from] CommonError),

    #[error("config error: {0}")]
    Config(String),

    #[error("classifier error: {0}")]
    Classifier(String),

    #[error("llm client error: {0}")]
    Llm(#[from] OpenAiClientError),

    #[error("catalog error: {0}")]
    Catalog(String),

    #[error("{operation} timed out after {millis}ms")]
    Timeout { operation: &'static str, millis: u128 },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
