use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A hyperlink discovered during extraction, scored but not yet accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateLink {
    pub url: String,
    /// Anchor display text (may be empty).
    pub text: String,
    /// Text of the enclosing element, used for scoring and display.
    pub context: String,
    /// Heuristic score in [0.0, 1.0], possibly overwritten by the refiner.
    pub relevance_score: f64,
    /// Free-text rationale, present only after LLM refinement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_reason: Option<String>,
}

/// The persisted shape of an accepted high-value link. `url` is the natural
/// key: saving a record with a previously seen `url` upserts it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkRecord {
    pub url: String,
    pub text: String,
    pub context: String,
    pub relevance_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_reason: Option<String>,
    /// The first page from which this link cleared the acceptance threshold.
    #[serde(default)]
    pub source_url: String,
    pub domain: String,
    pub path: String,
    pub query: String,
    /// RFC 3339, assigned once at acceptance time.
    pub timestamp: String,
}

impl LinkRecord {
    /// Stamp an accepted candidate with its acceptance-time metadata.
    /// `source_url` is filled in by the store at persistence time.
    pub fn from_candidate(candidate: &CandidateLink, timestamp: &str) -> Self {
        let (domain, path, query) = match url::Url::parse(&candidate.url) {
            Ok(parsed) => (
                parsed.host_str().unwrap_or("").to_string(),
                parsed.path().to_string(),
                parsed.query().unwrap_or("").to_string(),
            ),
            Err(_) => (String::new(), String::new(), String::new()),
        };

        Self {
            url: candidate.url.clone(),
            text: candidate.text.clone(),
            context: candidate.context.clone(),
            relevance_score: candidate.relevance_score,
            llm_reason: candidate.llm_reason.clone(),
            source_url: String::new(),
            domain,
            path,
            query,
            timestamp: timestamp.to_string(),
        }
    }
}

/// Lifecycle of one crawl run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Running,
    Completed,
    Failed,
}

/// Queryable status of a crawl run, owned by the service layer's registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStatus {
    pub status: RunState,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CrawlJobRequest {
    pub url: String,
    #[serde(default)]
    pub keywords: Option<Vec<String>>,
    #[serde(default)]
    pub max_depth: Option<u32>,
    #[serde(default)]
    pub use_refiner: Option<bool>,
    #[serde(default)]
    pub min_score_threshold: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CrawlJobResponse {
    pub run_id: String,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RunStatusResponse {
    pub run_id: String,
    #[serde(flatten)]
    pub status: RunStatus,
}

/// Query parameters shared by `GET /links` and `GET /links/count`.
#[derive(Debug, Default, Deserialize)]
pub struct LinksQuery {
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub min_score: Option<f64>,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default)]
    pub sort: Option<String>,
    #[serde(default)]
    pub order: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub skip: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct DomainsQuery {
    #[serde(default)]
    pub min_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainCount {
    pub domain: String,
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
