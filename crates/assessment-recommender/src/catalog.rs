/// Catalog ingestion: crawled JSON → embeddings → LanceDB table.
///
/// The crawler writes an array of assessments. Each one becomes a row whose `text` column
/// is what gets embedded, alongside the metadata the recommender returns. LanceDB stores
/// scalar columns only, so `test_type` is flattened to a comma-joined string and an
/// unknown duration to -1.
use std::path::Path;
use std::sync::Arc;

use arrow_array::{ArrayRef, FixedSizeListArray, Float32Array, Int64Array, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema};
use serde::Deserialize;
use tracing::info;

use crate::error::AppError;
use crate::model::{parse_yes_no, yes_no, UNKNOWN_DURATION};
use recommender_common::embedding::Embedder;
use recommender_common::error::CommonError;
use recommender_common::vectordb::VectorDb;

const EMBED_BATCH_SIZE: usize = 100;

/// One crawled assessment.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub test_type: Vec<String>,
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(default = "default_flag")]
    pub adaptive_support: String,
    #[serde(default = "default_flag")]
    pub remote_support: String,
}

fn default_flag() -> String {
    "No".to_string()
}

impl CatalogEntry {
    fn test_type_joined(&self) -> String {
        self.test_type
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

pub fn load_catalog(path: &Path) -> Result<Vec<CatalogEntry>, AppError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| AppError::Catalog(format!("failed to read {}: {e}", path.display())))?;
    let entries: Vec<CatalogEntry> = serde_json::from_str(&raw)
        .map_err(|e| AppError::Catalog(format!("failed to parse {}: {e}", path.display())))?;
    info!(count = entries.len(), path = %path.display(), "loaded crawled catalog");
    Ok(entries)
}

/// Text embedded for one assessment.
pub fn compose_document_text(entry: &CatalogEntry) -> String {
    format!(
        "Name: {}\nType: {}\nDescription: {}",
        entry.name,
        entry.test_type_joined(),
        entry.description.as_deref().unwrap_or("")
    )
}

/// Embed every entry and replace the catalog table. Returns the number of rows written.
pub async fn ingest(
    entries: &[CatalogEntry],
    embedder: &Embedder,
    vectordb: &VectorDb,
    table_name: &str,
) -> Result<usize, AppError> {
    if entries.is_empty() {
        return Err(AppError::Catalog("catalog is empty, nothing to index".to_string()));
    }

    let texts: Vec<String> = entries.iter().map(compose_document_text).collect();
    let total_batches = texts.len().div_ceil(EMBED_BATCH_SIZE);

    let mut embeddings = Vec::with_capacity(texts.len());
    for (i, chunk) in texts.chunks(EMBED_BATCH_SIZE).enumerate() {
        info!(batch = i + 1, total = total_batches, "embedding catalog batch");
        embeddings.extend(embedder.embed_documents(chunk).await?);
    }

    if embeddings.len() != entries.len() {
        return Err(AppError::Common(CommonError::Embedding(format!(
            "embedding count mismatch: expected {}, got {}",
            entries.len(),
            embeddings.len()
        ))));
    }

    let batch = build_record_batch(entries, &texts, &embeddings, embedder.dimensions())?;
    let schema = batch.schema();
    vectordb
        .create_or_replace_table(table_name, schema, vec![batch])
        .await?;

    info!(rows = entries.len(), table = table_name, "catalog indexed");
    Ok(entries.len())
}

/// Build an Arrow RecordBatch from catalog entries and their embeddings.
pub fn build_record_batch(
    entries: &[CatalogEntry],
    texts: &[String],
    embeddings: &[Vec<f32>],
    embedding_dim: usize,
) -> Result<RecordBatch, AppError> {
    let vector_error =
        |msg: String| AppError::Common(CommonError::VectorDb(msg));

    if let Some(bad) = embeddings.iter().find(|e| e.len() != embedding_dim) {
        return Err(vector_error(format!(
            "embedding has {} dimensions, expected {embedding_dim}",
            bad.len()
        )));
    }
    let dim = i32::try_from(embedding_dim)
        .map_err(|_| vector_error(format!("embedding dimension {embedding_dim} too large")))?;

    let ids: Vec<String> = (0..entries.len()).map(|i| format!("assessment_{i}")).collect();
    let urls: Vec<&str> = entries.iter().map(|e| e.url.as_str()).collect();
    let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
    let descriptions: Vec<&str> = entries
        .iter()
        .map(|e| e.description.as_deref().unwrap_or(""))
        .collect();
    let test_types: Vec<String> = entries.iter().map(CatalogEntry::test_type_joined).collect();
    let durations: Vec<i64> = entries
        .iter()
        .map(|e| e.duration.filter(|d| *d >= 0).unwrap_or(UNKNOWN_DURATION))
        .collect();
    let adaptive: Vec<&str> = entries
        .iter()
        .map(|e| yes_no(parse_yes_no(&e.adaptive_support)))
        .collect();
    let remote: Vec<&str> = entries
        .iter()
        .map(|e| yes_no(parse_yes_no(&e.remote_support)))
        .collect();
    let text_strs: Vec<&str> = texts.iter().map(|t| t.as_str()).collect();

    let item_field = Arc::new(Field::new("item", DataType::Float32, true));
    let flat_values: Vec<f32> = embeddings.iter().flat_map(|e| e.iter().copied()).collect();
    let embedding_array: ArrayRef = Arc::new(
        FixedSizeListArray::try_new(
            Arc::clone(&item_field),
            dim,
            Arc::new(Float32Array::from(flat_values)),
            None,
        )
        .map_err(|e| vector_error(format!("failed to build embedding array: {e}")))?,
    );

    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("url", DataType::Utf8, false),
        Field::new("name", DataType::Utf8, false),
        Field::new("description", DataType::Utf8, false),
        Field::new("test_type", DataType::Utf8, false),
        Field::new("duration", DataType::Int64, false),
        Field::new("adaptive_support", DataType::Utf8, false),
        Field::new("remote_support", DataType::Utf8, false),
        Field::new("text", DataType::Utf8, false),
        Field::new("embedding", DataType::FixedSizeList(item_field, dim), false),
    ]));

    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(StringArray::from(ids)) as ArrayRef,
            Arc::new(StringArray::from(urls)) as ArrayRef,
            Arc::new(StringArray::from(names)) as ArrayRef,
            Arc::new(StringArray::from(descriptions)) as ArrayRef,
            Arc::new(StringArray::from(test_types)) as ArrayRef,
            Arc::new(Int64Array::from(durations)) as ArrayRef,
            Arc::new(StringArray::from(adaptive)) as ArrayRef,
            Arc::new(StringArray::from(remote)) as ArrayRef,
            Arc::new(StringArray::from(text_strs)) as ArrayRef,
            embedding_array,
        ],
    )
    .map_err(|e| vector_error(format!("failed to build record batch: {e}")))
}
