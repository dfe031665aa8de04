//! Link persistence with a document-store primary and an in-process
//! fallback.
//!
//! The store connects to MongoDB when `MONGODB_URI` is configured and the
//! initial ping succeeds; otherwise it runs on the in-memory collection. A
//! failure on a live collection call latches a one-way degraded flag: that
//! call and every later one are served from memory, so reads never silently
//! alternate between backends. Store operations never raise to callers.

pub mod filter;
pub mod memory;

pub use filter::{Clause, Cmp, FieldValue, LinkField, LinkFilter, SortOrder, SortSpec};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::TryStreamExt;
use mongodb::bson::{doc, Document};
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, Collection, IndexModel};
use tracing::{info, warn};

use crate::core::error::ScoutResult;
use crate::core::types::{DomainCount, LinkRecord};
use memory::MemoryStore;

/// Broad page size used when an operation needs "everything matching".
const SCAN_LIMIT: usize = 99_999;

pub struct LinkStore {
    collection: Option<Collection<LinkRecord>>,
    fallback: MemoryStore,
    degraded: AtomicBool,
}

impl LinkStore {
    /// A store that never touches the network. Also the end state after a
    /// degradation latch.
    pub fn in_memory() -> Self {
        Self {
            collection: None,
            fallback: MemoryStore::new(),
            degraded: AtomicBool::new(true),
        }
    }

    /// Connect to the document store, or fall back to memory when no
    /// connection string is configured or the initial ping/index setup
    /// fails.
    pub async fn connect(uri: Option<String>, db_name: &str, collection_name: &str) -> Self {
        let Some(uri) = uri else {
            warn!("no document-store connection string configured — using the in-memory store");
            return Self::in_memory();
        };

        match Self::try_connect(&uri, db_name, collection_name).await {
            Ok(collection) => {
                info!("connected to document store ({}/{})", db_name, collection_name);
                Self {
                    collection: Some(collection),
                    fallback: MemoryStore::new(),
                    degraded: AtomicBool::new(false),
                }
            }
            Err(e) => {
                warn!(
                    "document store unavailable at startup: {} — using the in-memory store",
                    e
                );
                Self::in_memory()
            }
        }
    }

    async fn try_connect(
        uri: &str,
        db_name: &str,
        collection_name: &str,
    ) -> ScoutResult<Collection<LinkRecord>> {
        let mut options = ClientOptions::parse(uri).await?;
        options.connect_timeout = Some(Duration::from_secs(5));
        options.server_selection_timeout = Some(Duration::from_secs(5));
        options.retry_writes = Some(true);
        options.retry_reads = Some(true);

        let client = Client::with_options(options)?;
        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| crate::core::error::ScoutError::StoreUnavailable(e.to_string()))?;

        let collection = client
            .database(db_name)
            .collection::<LinkRecord>(collection_name);
        Self::create_indexes(&collection).await?;
        Ok(collection)
    }

    async fn create_indexes(collection: &Collection<LinkRecord>) -> ScoutResult<()> {
        let unique_url = IndexModel::builder()
            .keys(doc! { "url": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        collection.create_index(unique_url).await?;

        for field in ["relevance_score", "source_url", "timestamp"] {
            let mut keys = Document::new();
            keys.insert(field, 1);
            collection
                .create_index(IndexModel::builder().keys(keys).build())
                .await?;
        }
        Ok(())
    }

    pub fn backend(&self) -> &'static str {
        if self.is_degraded() {
            "in-memory"
        } else {
            "document-store"
        }
    }

    fn is_degraded(&self) -> bool {
        self.collection.is_none() || self.degraded.load(Ordering::Relaxed)
    }

    fn enter_degraded(&self, operation: &str, error: impl std::fmt::Display) {
        if !self.degraded.swap(true, Ordering::Relaxed) {
            warn!(
                "document store failed during {}: {} — serving from the in-memory store for the rest of this process",
                operation, error
            );
        }
    }

    /// Persist a batch, one upsert per record keyed on `url`. `source_url`
    /// and `timestamp` stick from the first acceptance; every other field
    /// takes the latest write. Returns the number of records written.
    pub async fn save(&self, records: &[LinkRecord], source_url: &str) -> usize {
        if records.is_empty() {
            return 0;
        }
        if !self.is_degraded() {
            if let Some(collection) = &self.collection {
                match Self::save_remote(collection, records, source_url).await {
                    Ok(written) => return written,
                    Err(e) => self.enter_degraded("save", e),
                }
            }
        }
        self.fallback.save(records, source_url)
    }

    async fn save_remote(
        collection: &Collection<LinkRecord>,
        records: &[LinkRecord],
        source_url: &str,
    ) -> ScoutResult<usize> {
        let mut written = 0;
        for record in records {
            let mut set = doc! {
                "text": &record.text,
                "context": &record.context,
                "relevance_score": record.relevance_score,
                "domain": &record.domain,
                "path": &record.path,
                "query": &record.query,
            };
            if let Some(reason) = &record.llm_reason {
                set.insert("llm_reason", reason);
            }
            let update = doc! {
                "$set": set,
                // The first accepting page wins; the filter supplies `url`
                // itself on insert.
                "$setOnInsert": {
                    "source_url": source_url,
                    "timestamp": &record.timestamp,
                },
            };

            let result = collection
                .update_one(doc! { "url": &record.url }, update)
                .upsert(true)
                .await?;
            if result.upserted_id.is_some() || result.modified_count > 0 {
                written += 1;
            }
        }
        Ok(written)
    }

    pub async fn query(
        &self,
        filter: &LinkFilter,
        sort: &SortSpec,
        limit: usize,
        skip: usize,
    ) -> Vec<LinkRecord> {
        if !self.is_degraded() {
            if let Some(collection) = &self.collection {
                match Self::query_remote(collection, filter, sort, limit, skip).await {
                    Ok(records) => return records,
                    Err(e) => self.enter_degraded("query", e),
                }
            }
        }
        self.fallback.query(filter, sort, limit, skip)
    }

    async fn query_remote(
        collection: &Collection<LinkRecord>,
        filter: &LinkFilter,
        sort: &SortSpec,
        limit: usize,
        skip: usize,
    ) -> ScoutResult<Vec<LinkRecord>> {
        let cursor = collection
            .find(filter.to_document())
            .sort(sort.to_document())
            .skip(skip as u64)
            .limit(limit.min(SCAN_LIMIT) as i64)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    pub async fn count(&self, filter: &LinkFilter) -> u64 {
        if !self.is_degraded() {
            if let Some(collection) = &self.collection {
                match collection.count_documents(filter.to_document()).await {
                    Ok(count) => return count,
                    Err(e) => self.enter_degraded("count", e),
                }
            }
        }
        self.fallback.count(filter)
    }

    /// Delete matching records. An empty filter is a no-op in both backings.
    pub async fn delete(&self, filter: &LinkFilter) -> u64 {
        if filter.is_empty() {
            return 0;
        }
        if !self.is_degraded() {
            if let Some(collection) = &self.collection {
                match collection.delete_many(filter.to_document()).await {
                    Ok(result) => return result.deleted_count,
                    Err(e) => self.enter_degraded("delete", e),
                }
            }
        }
        self.fallback.delete(filter)
    }

    /// Distinct domains with their record counts, most-populated first.
    /// Aggregated in-process over a broad query so both backings share the
    /// code path.
    pub async fn list_domains(&self, min_score: Option<f64>) -> Vec<DomainCount> {
        let mut filter = LinkFilter::new();
        if let Some(score) = min_score {
            filter = filter.cmp_number(LinkField::RelevanceScore, Cmp::Gte, score);
        }
        let records = self.query(&filter, &SortSpec::default(), SCAN_LIMIT, 0).await;

        let mut counts: HashMap<String, usize> = HashMap::new();
        for record in records {
            if !record.domain.is_empty() {
                *counts.entry(record.domain).or_insert(0) += 1;
            }
        }

        let mut domains: Vec<DomainCount> = counts
            .into_iter()
            .map(|(domain, count)| DomainCount { domain, count })
            .collect();
        domains.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.domain.cmp(&b.domain)));
        domains
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(url: &str, domain: &str, score: f64) -> LinkRecord {
        LinkRecord {
            url: url.to_string(),
            text: "Budget".to_string(),
            context: String::new(),
            relevance_score: score,
            llm_reason: None,
            source_url: String::new(),
            domain: domain.to_string(),
            path: "/".to_string(),
            query: String::new(),
            timestamp: "2026-01-01T00:00:00+00:00".to_string(),
        }
    }

    #[tokio::test]
    async fn unconfigured_store_round_trips_in_memory() {
        let store = LinkStore::connect(None, "link_scout", "links").await;
        assert_eq!(store.backend(), "in-memory");

        let written = store
            .save(&[record("https://example.gov/budget.pdf", "example.gov", 0.9)], "https://example.gov/")
            .await;
        assert_eq!(written, 1);

        let found = store
            .query(&LinkFilter::new(), &SortSpec::default(), 10, 0)
            .await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].url, "https://example.gov/budget.pdf");
        assert_eq!(found[0].source_url, "https://example.gov/");

        // Guarded delete: empty filter is a no-op, a targeted one removes.
        assert_eq!(store.delete(&LinkFilter::new()).await, 0);
        let targeted = LinkFilter::new().eq(LinkField::Url, "https://example.gov/budget.pdf");
        assert_eq!(store.delete(&targeted).await, 1);
        assert_eq!(store.count(&LinkFilter::new()).await, 0);
    }

    #[tokio::test]
    async fn list_domains_sorts_by_count_descending() {
        let store = LinkStore::in_memory();
        store
            .save(
                &[
                    record("https://a.gov/1", "a.gov", 0.9),
                    record("https://a.gov/2", "a.gov", 0.8),
                    record("https://b.org/1", "b.org", 0.7),
                ],
                "https://seed.gov/",
            )
            .await;

        let domains = store.list_domains(None).await;
        assert_eq!(domains.len(), 2);
        assert_eq!(domains[0].domain, "a.gov");
        assert_eq!(domains[0].count, 2);
        assert_eq!(domains[1].domain, "b.org");

        let high = store.list_domains(Some(0.75)).await;
        assert_eq!(high.len(), 1);
        assert_eq!(high[0].domain, "a.gov");
        assert_eq!(high[0].count, 2);
    }
}
