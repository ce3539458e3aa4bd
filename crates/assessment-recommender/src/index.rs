/// Similarity search over the embedded catalog.
///
/// `QueryEmbedder` and `CandidateIndex` are the two seams the recommender reaches the
/// outside world through for retrieval. The production implementations wrap the
/// fastembed model and the LanceDB table written by `ingest-catalog`.
///
/// Table columns: url, name, description, test_type (comma-joined names), duration
/// (Int64, -1 when unknown), adaptive_support, remote_support ("Yes"/"No"), text,
/// embedding (FixedSizeList<Float32>).
use arrow_array::{Array, Int64Array, RecordBatch, StringArray};
use async_trait::async_trait;
use tracing::warn;

use crate::error::AppError;
use crate::model::{parse_yes_no, CatalogItem};
use crate::ranking::split_test_types;
use recommender_common::embedding::Embedder;
use recommender_common::vectordb::VectorTable;

/// Turns query text into a dense vector.
#[async_trait]
pub trait QueryEmbedder: Send + Sync {
    async fn embed_query(&self, query: &str) -> Result<Vec<f32>, AppError>;
}

/// Nearest-neighbour lookup over catalog items, most similar first.
#[async_trait]
pub trait CandidateIndex: Send + Sync {
    async fn search(&self, embedding: &[f32], limit: usize) -> Result<Vec<CatalogItem>, AppError>;
}

#[async_trait]
impl QueryEmbedder for Embedder {
    async fn embed_query(&self, query: &str) -> Result<Vec<f32>, AppError> {
        Ok(Embedder::embed_query(self, query).await?)
    }
}

/// Candidate index over the LanceDB catalog table.
pub struct LanceCatalogIndex {
    table: VectorTable,
}

impl LanceCatalogIndex {
    pub fn new(table: VectorTable) -> Self {
        Self { table }
    }
}

#[async_trait]
impl CandidateIndex for LanceCatalogIndex {
    async fn search(&self, embedding: &[f32], limit: usize) -> Result<Vec<CatalogItem>, AppError> {
        let batches = self.table.nearest(embedding, limit).await?;
        Ok(extract_catalog_items(&batches))
    }
}

/// Decode catalog rows from LanceDB result batches, keeping row order.
///
/// Batches missing a required column are skipped, as are rows without a url.
pub fn extract_catalog_items(batches: &[RecordBatch]) -> Vec<CatalogItem> {
    let mut items = Vec::new();

    for batch in batches {
        let url_col = get_string_column(batch, "url");
        let name_col = get_string_column(batch, "name");
        let description_col = get_string_column(batch, "description");
        let test_type_col = get_string_column(batch, "test_type");
        let adaptive_col = get_string_column(batch, "adaptive_support");
        let remote_col = get_string_column(batch, "remote_support");
        let duration_col = get_int_column(batch, "duration");

        let (Some(url_col), Some(name_col), Some(test_type_col)) =
            (url_col, name_col, test_type_col)
        else {
            warn!("search result batch missing expected columns");
            continue;
        };

        for row in 0..batch.num_rows() {
            if url_col.is_null(row) || url_col.value(row).trim().is_empty() {
                warn!(row, "skipping catalog row without url");
                continue;
            }

            let text = |col: Option<&StringArray>| -> String {
                col.filter(|c| !c.is_null(row))
                    .map(|c| c.value(row).to_string())
                    .unwrap_or_default()
            };

            let duration = duration_col
                .filter(|c| !c.is_null(row))
                .map(|c| c.value(row))
                .and_then(|d| u32::try_from(d).ok());

            items.push(CatalogItem {
                url: url_col.value(row).to_string(),
                name: text(Some(name_col)),
                description: text(description_col),
                duration,
                adaptive_support: parse_yes_no(&text(adaptive_col)),
                remote_support: parse_yes_no(&text(remote_col)),
                test_type: split_test_types(&text(Some(test_type_col))),
            });
        }
    }

    items
}

fn get_string_column<'a>(batch: &'a RecordBatch, name: &str) -> Option<&'a StringArray> {
    batch
        .column_by_name(name)?
        .as_any()
        .downcast_ref::<StringArray>()
}

fn get_int_column<'a>(batch: &'a RecordBatch, name: &str) -> Option<&'a Int64Array> {
    batch
        .column_by_name(name)?
        .as_any()
        .downcast_ref::<Int64Array>()
}
