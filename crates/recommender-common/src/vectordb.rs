/// LanceDB access.
///
/// `VectorDb` owns the connection and handles whole-table operations (replace, exists,
/// open). Query-time work goes through a `VectorTable` opened once at startup, so a
/// request never pays for reopening the dataset.
use std::sync::Arc;

use arrow_array::{RecordBatch, RecordBatchIterator};
use arrow_schema::Schema;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use tracing::info;

use crate::error::CommonError;

fn db_error<E: std::fmt::Display>(context: &str) -> impl Fn(E) -> CommonError + '_ {
    move |e| CommonError::VectorDb(format!("{context}: {e}"))
}

pub struct VectorDb {
    db: lancedb::Connection,
}

impl VectorDb {
    /// Connect to a LanceDB database at the given filesystem path.
    pub async fn connect(path: &str) -> Result<Self, CommonError> {
        let db = lancedb::connect(path)
            .execute()
            .await
            .map_err(db_error("connection failed"))?;
        Ok(Self { db })
    }

    /// Replace `table_name` with a fresh table holding `batches`.
    pub async fn create_or_replace_table(
        &self,
        table_name: &str,
        schema: Arc<Schema>,
        batches: Vec<RecordBatch>,
    ) -> Result<(), CommonError> {
        // first ingest has nothing to drop
        let _ = self.db.drop_table(table_name).await;

        let rows: usize = batches.iter().map(RecordBatch::num_rows).sum();
        let batch_iter = RecordBatchIterator::new(batches.into_iter().map(Ok), schema);
        self.db
            .create_table(table_name, Box::new(batch_iter))
            .execute()
            .await
            .map_err(db_error("create table failed"))?;

        info!(table = table_name, rows, "vector table created");
        Ok(())
    }

    pub async fn has_table(&self, table_name: &str) -> Result<bool, CommonError> {
        let names = self
            .db
            .table_names()
            .execute()
            .await
            .map_err(db_error("listing tables failed"))?;
        Ok(names.iter().any(|n| n == table_name))
    }

    pub async fn open_table(&self, table_name: &str) -> Result<VectorTable, CommonError> {
        let table = self
            .db
            .open_table(table_name)
            .execute()
            .await
            .map_err(db_error("open table failed"))?;
        Ok(VectorTable { table })
    }
}

/// An open table of embedded rows.
pub struct VectorTable {
    table: lancedb::Table,
}

impl VectorTable {
    pub fn name(&self) -> &str {
        self.table.name()
    }

    pub async fn row_count(&self) -> Result<usize, CommonError> {
        self.table
            .count_rows(None)
            .await
            .map_err(db_error("count rows failed"))
    }

    /// Up to `limit` rows nearest to `query_embedding`, nearest first. LanceDB adds a
    /// `_distance` column to the returned batches.
    pub async fn nearest(
        &self,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<RecordBatch>, CommonError> {
        let stream = self
            .table
            .vector_search(query_embedding)
            .map_err(db_error("vector search setup failed"))?
            .limit(limit)
            .execute()
            .await
            .map_err(db_error("vector search failed"))?;

        stream
            .try_collect::<Vec<_>>()
            .await
            .map_err(db_error("collecting search results failed"))
    }
}
