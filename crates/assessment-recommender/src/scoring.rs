/// Batch scoring of a labelled-query CSV into a submission CSV.
///
/// Input is any CSV with a `Query` column. Output has one `Query,Assessment_url` row per
/// recommendation, in rank order.
use std::io::{Read, Write};

use serde::Serialize;
use tracing::warn;

use crate::error::AppError;
use crate::recommender::RecommenderContext;

pub const QUERY_COLUMN: &str = "Query";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    #[serde(rename = "Query")]
    pub query: String,
    #[serde(rename = "Assessment_url")]
    pub assessment_url: String,
}

/// Read the `Query` column, skipping blank cells.
pub fn read_queries<R: Read>(reader: R) -> Result<Vec<String>, AppError> {
    let mut rdr = csv::Reader::from_reader(reader);
    let column = rdr
        .headers()?
        .iter()
        .position(|h| h.trim() == QUERY_COLUMN)
        .ok_or_else(|| {
            AppError::Catalog(format!("test set has no '{QUERY_COLUMN}' column"))
        })?;

    let mut queries = Vec::new();
    for record in rdr.records() {
        let record = record?;
        if let Some(query) = record.get(column).map(str::trim).filter(|q| !q.is_empty()) {
            queries.push(query.to_string());
        }
    }
    Ok(queries)
}

/// Run every query through the recommender. Queries with no recommendations contribute
/// no rows.
pub async fn predict(ctx: &RecommenderContext, queries: &[String]) -> Vec<Prediction> {
    let mut rows = Vec::new();
    for query in queries {
        let recommendations = ctx.get_recommendations(query, None).await;
        if recommendations.is_empty() {
            warn!(query = %query, "no recommendations, skipping");
            continue;
        }
        rows.extend(recommendations.into_iter().map(|r| Prediction {
            query: query.clone(),
            assessment_url: r.url,
        }));
    }
    rows
}

pub fn write_predictions<W: Write>(writer: W, rows: &[Prediction]) -> Result<(), AppError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::recommender::test_support::*;

    #[test]
    fn reads_query_column_by_name() {
        let input = "Id,Query\n1,Java developer\n2,\"Analyst, who \"\"leads\"\" teams\"\n3,  \n";
        let queries = read_queries(input.as_bytes()).unwrap();
        assert_eq!(
            queries,
            vec![
                "Java developer".to_string(),
                "Analyst, who \"leads\" teams".to_string()
            ]
        );
    }

    #[test]
    fn missing_query_column_is_an_error() {
        let err = read_queries("query_text\nhello\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("'Query'"));
    }

    #[test]
    fn writes_submission_header_and_quotes() {
        let rows = vec![
            Prediction {
                query: "Java, SQL".to_string(),
                assessment_url: "https://catalog.example/java".to_string(),
            },
            Prediction {
                query: "Java, SQL".to_string(),
                assessment_url: "https://catalog.example/sql".to_string(),
            },
        ];
        let mut out = Vec::new();
        write_predictions(&mut out, &rows).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Query,Assessment_url\n\
             \"Java, SQL\",https://catalog.example/java\n\
             \"Java, SQL\",https://catalog.example/sql\n"
        );
    }

    #[tokio::test]
    async fn predict_emits_one_row_per_recommendation_in_rank_order() {
        let items = vec![item("k1", &[K]), item("p1", &[P]), item("k2", &[K])];
        let ctx = context_with(Arc::new(FixedIndex::ok(items)), None);

        let rows = predict(&ctx, &["java".to_string()]).await;
        let urls: Vec<&str> = rows.iter().map(|r| r.assessment_url.as_str()).collect();
        assert_eq!(urls, vec!["k1", "p1", "k2"]);
        assert!(rows.iter().all(|r| r.query == "java"));
    }

    #[tokio::test]
    async fn queries_without_results_are_skipped() {
        let ctx = context_with(Arc::new(FixedIndex::failing()), None);
        let rows = predict(&ctx, &["a".to_string(), "b".to_string()]).await;
        assert!(rows.is_empty());
    }
}
