/// Category-balanced ranking of broad search results.
///
/// Candidates arrive most-similar first. They are sorted into one bucket per inferred
/// category, the buckets are merged round-robin so no category crowds out the others,
/// and the merged list is de-duplicated by url and cut to the requested length.
use std::collections::HashSet;

use crate::model::{CatalogItem, TestType};

/// Candidates that matched one inferred category, in similarity order.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedBucket {
    pub category: TestType,
    pub items: Vec<CatalogItem>,
}

/// Full ranking pass: bucket, interleave, then de-duplicate and truncate.
pub fn rank(candidates: Vec<CatalogItem>, categories: &[TestType], limit: usize) -> Vec<CatalogItem> {
    let buckets = bucket_by_category(candidates, categories);
    let merged = interleave(buckets.into_iter().map(|b| b.items).collect());
    finalize(merged, limit)
}

/// Place each candidate into the bucket of the first inferred category it carries.
///
/// Buckets are returned in the order of `categories`. A candidate lands in at most one
/// bucket; candidates carrying none of the categories are dropped.
pub fn bucket_by_category(
    candidates: Vec<CatalogItem>,
    categories: &[TestType],
) -> Vec<RankedBucket> {
    let mut buckets: Vec<RankedBucket> = categories
        .iter()
        .map(|&category| RankedBucket {
            category,
            items: Vec::new(),
        })
        .collect();

    for item in candidates {
        if let Some(bucket) = buckets
            .iter_mut()
            .find(|b| item.has_test_type(b.category.name()))
        {
            bucket.items.push(item);
        }
    }

    buckets
}

/// Round-robin merge: index 0 of every list, then index 1 of every list, and so on.
/// Exhausted lists are skipped without stalling the others.
pub fn interleave<T>(lists: Vec<Vec<T>>) -> Vec<T> {
    let total: usize = lists.iter().map(Vec::len).sum();
    let mut iters: Vec<std::vec::IntoIter<T>> = lists.into_iter().map(Vec::into_iter).collect();
    let mut out = Vec::with_capacity(total);

    while out.len() < total {
        for iter in iters.iter_mut() {
            if let Some(item) = iter.next() {
                out.push(item);
            }
        }
    }

    out
}

/// Keep the first occurrence of each url, preserving order, up to `limit` items.
pub fn finalize(items: Vec<CatalogItem>, limit: usize) -> Vec<CatalogItem> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(limit.min(items.len()));

    for item in items {
        if out.len() >= limit {
            break;
        }
        if seen.insert(item.url.clone()) {
            out.push(item);
        }
    }

    out
}

/// Split the index's comma-joined `test_type` column back into category names.
pub fn split_test_types(stored: &str) -> Vec<String> {
    stored
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
