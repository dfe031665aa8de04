//! Environment-driven configuration.
//!
//! Every knob resolves from an env var with a trim/non-empty filter and a
//! sensible default, so the binary runs with zero configuration (in-memory
//! store, refiner disabled).

/// Settings for the relevance-judging service (OpenAI-compatible endpoint).
#[derive(Debug, Clone)]
pub struct RefinerSettings {
    /// API key. `None` disables refinement entirely; an explicit empty string
    /// is accepted for key-less local endpoints (Ollama / LM Studio).
    pub api_key: Option<String>,
    /// Endpoint base, e.g. `https://api.openai.com/v1` or
    /// `http://localhost:11434/v1`.
    pub base_url: String,
    /// Model name, e.g. `gpt-4o-mini`, `llama3`.
    pub model: String,
    /// Links per judging request; bounds request payload size.
    pub batch_size: usize,
}

impl RefinerSettings {
    /// Resolve from `OPENAI_API_KEY`, `OPENAI_BASE_URL`, `LINK_SCOUT_LLM_MODEL`.
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var("OPENAI_API_KEY")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            base_url: std::env::var("OPENAI_BASE_URL")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            model: std::env::var("LINK_SCOUT_LLM_MODEL")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| "gpt-4o-mini".to_string()),
            batch_size: 30,
        }
    }

    /// A settings block with refinement switched off, for tests and for
    /// deployments without a judging service.
    pub fn disabled() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            batch_size: 30,
        }
    }
}

/// Document-store connection string: `MONGODB_URI`, unset/blank → `None`
/// (the link store starts in its in-memory fallback).
pub fn mongodb_uri() -> Option<String> {
    std::env::var("MONGODB_URI")
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Database name: `LINK_SCOUT_DB` → `link_scout`.
pub fn database_name() -> String {
    std::env::var("LINK_SCOUT_DB")
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "link_scout".to_string())
}

/// Collection name: `LINK_SCOUT_COLLECTION` → `links`.
pub fn collection_name() -> String {
    std::env::var("LINK_SCOUT_COLLECTION")
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "links".to_string())
}

/// Outbound HTTP timeout in seconds: `HTTP_TIMEOUT_SECS` → 30.
pub fn http_timeout_secs() -> u64 {
    std::env::var("HTTP_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(30)
}

/// Outbound HTTP connect timeout in seconds: `HTTP_CONNECT_TIMEOUT_SECS` → 10.
pub fn http_connect_timeout_secs() -> u64 {
    std::env::var("HTTP_CONNECT_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(10)
}

/// Listen port: `LINK_SCOUT_PORT` → `PORT` → 8000.
pub fn port_from_env() -> Option<u16> {
    for k in ["LINK_SCOUT_PORT", "PORT"] {
        if let Ok(v) = std::env::var(k) {
            if let Ok(p) = v.trim().parse::<u16>() {
                return Some(p);
            }
        }
    }
    None
}
