use thiserror::Error;

/// Error taxonomy for the crawl engine and its collaborators.
///
/// Component-local failures (fetch, refine, per-call store access) are
/// recovered inline with a safe default so traversal always makes forward
/// progress; only an error escaping `CrawlEngine::run` marks a run failed.
#[derive(Debug, Error)]
pub enum ScoutError {
    /// Every transport strategy was exhausted for this URL. Non-fatal: the
    /// orchestrator treats the page as yielding zero links.
    #[error("all fetch strategies failed for {url}")]
    FetchFailed { url: String },

    /// A strategy got a response but not a 2xx one.
    #[error("unexpected status {status} for {url}")]
    UnexpectedStatus { url: String, status: u16 },

    /// The relevance-judging service was unreachable or errored. Non-fatal:
    /// the affected batch keeps its heuristic scores.
    #[error("relevance service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Crawl options failed validation at construction.
    #[error("invalid crawl options: {0}")]
    InvalidOptions(String),

    /// The backing store was unreachable. Handled inside `LinkStore` (falls
    /// back to the in-memory collection) and never surfaced to callers.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Low-level transport problem inside a single strategy (unsupported
    /// scheme, malformed response framing, missing host).
    #[error("transport error: {0}")]
    Transport(String),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),
}

pub type ScoutResult<T> = std::result::Result<T, ScoutError>;
