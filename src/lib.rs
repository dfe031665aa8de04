pub mod core;
pub mod crawl;
pub mod extract;
pub mod fetch;
pub mod refine;
pub mod runs;
pub mod store;

// --- Primary core exports ---
pub use crate::core::types;
pub use crate::core::types::*;
pub use crate::core::AppState;
pub use crate::core::{ScoutError, ScoutResult};

pub use crate::crawl::{CrawlEngine, CrawlOptions};
pub use crate::extract::LinkExtractor;
pub use crate::fetch::Fetcher;
pub use crate::refine::RelevanceRefiner;
pub use crate::runs::{CancelToken, RunRegistry};
pub use crate::store::LinkStore;
