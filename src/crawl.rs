//! Depth-bounded recursive crawl orchestration.
//!
//! One engine instance drives one run: fetch a page, extract and score its
//! links, optionally refine the scores, persist everything over the
//! acceptance threshold, then recurse into the best of the accepted links.
//! Per-URL failures are logged and treated as zero links found, so a run
//! always makes forward progress and always terminates: the visited set only
//! grows and depth is bounded.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::{info, warn};

use crate::core::config::RefinerSettings;
use crate::core::error::{ScoutError, ScoutResult};
use crate::core::types::{CandidateLink, LinkRecord};
use crate::extract::LinkExtractor;
use crate::fetch::Fetcher;
use crate::refine::RelevanceRefiner;
use crate::runs::CancelToken;
use crate::store::LinkStore;

pub const DEFAULT_KEYWORDS: &[&str] = &[
    "ACFR", "Budget", "Finance", "Contact", "Director", "Annual", "Report",
];

/// Configuration for one crawl run, validated at engine construction.
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub keywords: Vec<String>,
    /// Recursion bound, 0..=5.
    pub max_depth: u32,
    /// Acceptance threshold in [0.0, 1.0].
    pub min_score_threshold: f64,
    pub use_refiner: bool,
    /// Candidate cap applied before refinement; protects against
    /// pathological pages with huge link counts.
    pub max_links_per_page: usize,
    /// How many accepted links may be recursed into per page.
    pub max_follow_per_page: usize,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            keywords: DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            max_depth: 2,
            min_score_threshold: 0.5,
            use_refiner: true,
            max_links_per_page: 100,
            max_follow_per_page: 5,
        }
    }
}

impl CrawlOptions {
    /// Enforce option bounds. An empty keyword list falls back to the
    /// default set.
    pub fn validated(mut self) -> ScoutResult<Self> {
        if self.max_depth > 5 {
            return Err(ScoutError::InvalidOptions(format!(
                "max_depth {} exceeds the allowed range 0..=5",
                self.max_depth
            )));
        }
        if !(0.0..=1.0).contains(&self.min_score_threshold) {
            return Err(ScoutError::InvalidOptions(format!(
                "min_score_threshold {} outside [0.0, 1.0]",
                self.min_score_threshold
            )));
        }
        if self.max_links_per_page == 0 {
            return Err(ScoutError::InvalidOptions(
                "max_links_per_page must be positive".to_string(),
            ));
        }
        self.keywords.retain(|k| !k.trim().is_empty());
        if self.keywords.is_empty() {
            self.keywords = DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect();
        }
        Ok(self)
    }

    /// The higher cutoff deciding which accepted links are recursed into.
    pub fn follow_threshold(&self) -> f64 {
        (self.min_score_threshold + 0.1).max(0.7)
    }
}

/// Traversal state owned by one run, threaded through the recursion.
#[derive(Debug, Default)]
pub struct CrawlState {
    pub visited: HashSet<String>,
    pub accepted_total: usize,
}

pub struct CrawlEngine {
    fetcher: Fetcher,
    extractor: LinkExtractor,
    refiner: RelevanceRefiner,
    store: Arc<LinkStore>,
    options: CrawlOptions,
}

impl CrawlEngine {
    pub fn new(
        http_client: reqwest::Client,
        store: Arc<LinkStore>,
        refiner_settings: RefinerSettings,
        options: CrawlOptions,
    ) -> ScoutResult<Self> {
        let options = options.validated()?;
        Ok(Self {
            fetcher: Fetcher::new(http_client.clone())?,
            extractor: LinkExtractor::new(&options.keywords),
            refiner: RelevanceRefiner::new(http_client, refiner_settings),
            store,
            options,
        })
    }

    /// Crawl from `seed_url` and return the total number of accepted links.
    pub async fn run(&self, seed_url: &str, cancel: &CancelToken) -> ScoutResult<usize> {
        info!(
            "starting crawl from {} (max_depth: {}, min_score: {}, refiner: {})",
            seed_url,
            self.options.max_depth,
            self.options.min_score_threshold,
            self.options.use_refiner && self.refiner.is_enabled()
        );
        let started = Instant::now();

        let mut state = CrawlState::default();
        self.visit(seed_url.to_string(), 0, &mut state, cancel).await;

        info!(
            "crawl finished: {} URLs visited, {} links accepted, {}ms",
            state.visited.len(),
            state.accepted_total,
            started.elapsed().as_millis()
        );
        Ok(state.accepted_total)
    }

    fn visit<'a>(
        &'a self,
        url: String,
        depth: u32,
        state: &'a mut CrawlState,
        cancel: &'a CancelToken,
    ) -> BoxFuture<'a, ()> {
        async move {
            if depth > self.options.max_depth
                || state.visited.contains(&url)
                || cancel.is_cancelled()
            {
                return;
            }
            state.visited.insert(url.clone());

            let accepted = match self.process_page(&url, depth).await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("processing {} failed: {} — treating as zero links", url, e);
                    return;
                }
            };
            state.accepted_total += accepted.len();

            let follow_threshold = self.options.follow_threshold();
            let follow: Vec<String> = accepted
                .iter()
                .filter(|link| link.relevance_score >= follow_threshold)
                .take(self.options.max_follow_per_page)
                .map(|link| link.url.clone())
                .collect();

            for next in follow {
                self.visit(next, depth + 1, &mut *state, cancel).await;
            }
        }
        .boxed()
    }

    /// Fetch + extract + (optionally) refine one page, persist the accepted
    /// links, and return them in score order for follow selection.
    async fn process_page(&self, url: &str, depth: u32) -> ScoutResult<Vec<LinkRecord>> {
        info!("processing {} (depth: {})", url, depth);

        let body = self.fetcher.fetch(url).await?;
        let mut candidates = self.extractor.extract(&body, url)?;

        if candidates.len() > self.options.max_links_per_page {
            info!(
                "capping {} candidates to {} for {}",
                candidates.len(),
                self.options.max_links_per_page,
                url
            );
            candidates.truncate(self.options.max_links_per_page);
        }

        let candidates = if self.options.use_refiner && self.refiner.is_enabled() {
            self.refiner.refine(candidates, &self.options.keywords).await
        } else {
            candidates
        };

        let accepted: Vec<CandidateLink> = candidates
            .into_iter()
            .filter(|c| c.relevance_score >= self.options.min_score_threshold)
            .collect();
        if accepted.is_empty() {
            return Ok(Vec::new());
        }

        // One acceptance timestamp for the whole page.
        let timestamp = Utc::now().to_rfc3339();
        let records: Vec<LinkRecord> = accepted
            .iter()
            .map(|c| LinkRecord::from_candidate(c, &timestamp))
            .collect();

        let written = self.store.save(&records, url).await;
        info!(
            "accepted {} high-value links on {} ({} written)",
            records.len(),
            url,
            written
        );
        Ok(records)
    }
}
