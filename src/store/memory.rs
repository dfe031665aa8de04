//! In-process fallback collection for the link store.
//!
//! Keeps insertion order, supports the same filter grammar as the document
//! store, and mirrors its upsert semantics: a re-save of a known `url`
//! replaces the record but keeps the first write's `source_url` and
//! `timestamp`.

use std::sync::Mutex;

use super::filter::{LinkFilter, SortSpec};
use crate::core::types::LinkRecord;

#[derive(Default)]
pub struct MemoryStore {
    links: Mutex<Vec<LinkRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save(&self, records: &[LinkRecord], source_url: &str) -> usize {
        let mut links = self.links.lock().unwrap();
        for record in records {
            let mut stamped = record.clone();
            stamped.source_url = source_url.to_string();
            if let Some(existing) = links.iter_mut().find(|l| l.url == stamped.url) {
                stamped.source_url = existing.source_url.clone();
                stamped.timestamp = existing.timestamp.clone();
                *existing = stamped;
            } else {
                links.push(stamped);
            }
        }
        records.len()
    }

    pub fn query(
        &self,
        filter: &LinkFilter,
        sort: &SortSpec,
        limit: usize,
        skip: usize,
    ) -> Vec<LinkRecord> {
        let links = self.links.lock().unwrap();
        let mut matched: Vec<LinkRecord> =
            links.iter().filter(|l| filter.matches(l)).cloned().collect();
        drop(links);

        sort.sort_records(&mut matched);
        matched.into_iter().skip(skip).take(limit).collect()
    }

    pub fn count(&self, filter: &LinkFilter) -> u64 {
        let links = self.links.lock().unwrap();
        links.iter().filter(|l| filter.matches(l)).count() as u64
    }

    /// Deleting with an empty filter is a no-op so a careless call cannot
    /// wipe the collection.
    pub fn delete(&self, filter: &LinkFilter) -> u64 {
        if filter.is_empty() {
            return 0;
        }
        let mut links = self.links.lock().unwrap();
        let before = links.len();
        links.retain(|l| !filter.matches(l));
        (before - links.len()) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::filter::{Cmp, LinkField};

    fn record(url: &str, score: f64) -> LinkRecord {
        LinkRecord {
            url: url.to_string(),
            text: "Budget".to_string(),
            context: String::new(),
            relevance_score: score,
            llm_reason: None,
            source_url: String::new(),
            domain: "example.gov".to_string(),
            path: "/".to_string(),
            query: String::new(),
            timestamp: "2026-01-01T00:00:00+00:00".to_string(),
        }
    }

    #[test]
    fn saving_the_same_url_twice_keeps_one_record() {
        let store = MemoryStore::new();
        store.save(&[record("https://example.gov/a", 0.6)], "https://example.gov/");

        let mut second = record("https://example.gov/a", 0.9);
        second.timestamp = "2026-02-01T00:00:00+00:00".to_string();
        store.save(&[second], "https://example.gov/other");

        let all = store.query(&LinkFilter::new(), &SortSpec::default(), 100, 0);
        assert_eq!(all.len(), 1);
        // Second write's fields win...
        assert!((all[0].relevance_score - 0.9).abs() < 1e-9);
        // ...except the first-acceptance stamps.
        assert_eq!(all[0].source_url, "https://example.gov/");
        assert_eq!(all[0].timestamp, "2026-01-01T00:00:00+00:00");
    }

    #[test]
    fn query_respects_limit_and_skip() {
        let store = MemoryStore::new();
        for i in 0..10 {
            store.save(
                &[record(&format!("https://example.gov/{}", i), i as f64 / 10.0)],
                "https://example.gov/",
            );
        }

        let page = store.query(&LinkFilter::new(), &SortSpec::default(), 3, 2);
        assert_eq!(page.len(), 3);
        let scores: Vec<f64> = page.iter().map(|r| r.relevance_score).collect();
        assert_eq!(scores, vec![0.7, 0.6, 0.5]);
    }

    #[test]
    fn count_matches_unbounded_query_length() {
        let store = MemoryStore::new();
        for i in 0..7 {
            store.save(
                &[record(&format!("https://example.gov/{}", i), i as f64 / 10.0)],
                "https://example.gov/",
            );
        }

        let filter =
            LinkFilter::new().cmp_number(LinkField::RelevanceScore, Cmp::Gte, 0.3);
        let count = store.count(&filter);
        let all = store.query(&filter, &SortSpec::default(), usize::MAX, 0);
        assert_eq!(count, all.len() as u64);
        assert_eq!(count, 4);
    }

    #[test]
    fn delete_with_empty_filter_is_a_noop() {
        let store = MemoryStore::new();
        store.save(&[record("https://example.gov/a", 0.5)], "https://example.gov/");

        assert_eq!(store.delete(&LinkFilter::new()), 0);
        assert_eq!(store.count(&LinkFilter::new()), 1);

        let targeted = LinkFilter::new().eq(LinkField::Url, "https://example.gov/a");
        assert_eq!(store.delete(&targeted), 1);
        assert_eq!(store.count(&LinkFilter::new()), 0);
    }
}
