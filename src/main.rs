use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use uuid::Uuid;

use link_scout::core::config;
use link_scout::store::{Cmp, LinkField, LinkFilter, SortOrder, SortSpec};
use link_scout::types::*;
use link_scout::{AppState, CrawlEngine, CrawlOptions, LinkStore};

fn parse_port_from_args() -> Option<u16> {
    let mut args = std::env::args().peekable();
    while let Some(a) = args.next() {
        if a == "--port" {
            if let Some(v) = args.next() {
                if let Ok(p) = v.parse::<u16>() {
                    return Some(p);
                }
            }
        } else if let Some(rest) = a.strip_prefix("--port=") {
            if let Ok(p) = rest.parse::<u16>() {
                return Some(p);
            }
        }
    }
    None
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=warn"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    info!("Starting link-scout");

    // Shared outbound HTTP client
    let http_client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(config::http_timeout_secs()))
        .connect_timeout(std::time::Duration::from_secs(
            config::http_connect_timeout_secs(),
        ))
        .build()?;

    // Link store: document store when configured, in-memory otherwise
    let store = Arc::new(
        LinkStore::connect(
            config::mongodb_uri(),
            &config::database_name(),
            &config::collection_name(),
        )
        .await,
    );
    info!("link store backend: {}", store.backend());

    let state = Arc::new(AppState::new(http_client, store));

    // Build router
    let app = Router::new()
        .route("/", get(health_check))
        .route("/health", get(health_check))
        .route("/scrape", post(start_crawl_handler))
        .route("/tasks/{run_id}", get(run_status_handler))
        .route("/tasks/{run_id}/cancel", post(cancel_run_handler))
        .route("/links", get(links_handler))
        .route("/links/count", get(count_links_handler))
        .route("/domains", get(domains_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    // Start server
    let port: u16 = parse_port_from_args()
        .or_else(config::port_from_env)
        .unwrap_or(8000);
    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(l) => l,
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
            anyhow::bail!(
                "Address already in use: {}. Stop the existing process or run with --port {} (or set PORT/LINK_SCOUT_PORT).",
                bind_addr,
                port.saturating_add(1)
            )
        }
        Err(e) => return Err(e.into()),
    };
    info!("link-scout listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).ok();

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = async {
                if let Some(ref mut s) = sigterm {
                    s.recv().await;
                } else {
                    futures::future::pending::<()>().await;
                }
            } => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "link-scout",
        "version": env!("CARGO_PKG_VERSION"),
        "store_backend": state.store.backend(),
    }))
}

fn bad_request(message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

async fn start_crawl_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CrawlJobRequest>,
) -> Result<Json<CrawlJobResponse>, (StatusCode, Json<ErrorResponse>)> {
    let seed = url::Url::parse(&request.url)
        .map_err(|e| bad_request(format!("invalid seed url: {}", e)))?;
    if seed.scheme() != "http" && seed.scheme() != "https" {
        return Err(bad_request("seed url must be http or https"));
    }

    let options = CrawlOptions {
        keywords: request.keywords.unwrap_or_default(),
        max_depth: request.max_depth.unwrap_or(2),
        use_refiner: request.use_refiner.unwrap_or(true),
        min_score_threshold: request.min_score_threshold.unwrap_or(0.5),
        ..Default::default()
    };

    let engine = CrawlEngine::new(
        state.http_client.clone(),
        state.store.clone(),
        state.refiner_settings.clone(),
        options,
    )
    .map_err(|e| bad_request(e.to_string()))?;

    let run_id = format!("run_{}", Uuid::new_v4().simple());
    let cancel = state.runs.begin(&run_id, &request.url);

    let runs = state.runs.clone();
    let seed_url = request.url.clone();
    let task_id = run_id.clone();
    tokio::spawn(async move {
        match engine.run(&seed_url, &cancel).await {
            Ok(count) => {
                info!("run {} completed with {} accepted links", task_id, count);
                runs.complete(&task_id, count);
            }
            Err(e) => {
                error!("run {} failed: {}", task_id, e);
                runs.fail(&task_id, e.to_string());
            }
        }
    });

    Ok(Json(CrawlJobResponse {
        run_id,
        status: "started".to_string(),
        message: format!("crawl started for {}", request.url),
    }))
}

async fn run_status_handler(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<String>,
) -> Result<Json<RunStatusResponse>, (StatusCode, Json<ErrorResponse>)> {
    match state.runs.status(&run_id) {
        Some(status) => Ok(Json(RunStatusResponse { run_id, status })),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "run not found".to_string(),
            }),
        )),
    }
}

async fn cancel_run_handler(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<String>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<ErrorResponse>)> {
    if state.runs.cancel(&run_id) {
        Ok(Json(serde_json::json!({
            "run_id": run_id,
            "status": "cancelling",
        })))
    } else {
        Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "run not found".to_string(),
            }),
        ))
    }
}

fn build_filter(query: &LinksQuery) -> LinkFilter {
    let mut filter = LinkFilter::new();
    if let Some(domain) = &query.domain {
        filter = filter.eq(LinkField::Domain, domain.clone());
    }
    if let Some(min_score) = query.min_score {
        filter = filter.cmp_number(LinkField::RelevanceScore, Cmp::Gte, min_score);
    }
    if let Some(source_url) = &query.source_url {
        filter = filter.eq(LinkField::SourceUrl, source_url.clone());
    }
    if let Some(keyword) = &query.keyword {
        filter = filter.keyword(keyword.clone());
    }
    filter
}

fn parse_sort(query: &LinksQuery) -> Result<SortSpec, String> {
    let field = match &query.sort {
        None => LinkField::RelevanceScore,
        Some(name) => {
            LinkField::parse(name).ok_or_else(|| format!("unknown sort field '{}'", name))?
        }
    };
    let order = match &query.order {
        None => SortOrder::Desc,
        Some(name) => {
            SortOrder::parse(name).ok_or_else(|| format!("unknown sort order '{}'", name))?
        }
    };
    Ok(SortSpec { field, order })
}

async fn links_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LinksQuery>,
) -> Result<Json<Vec<LinkRecord>>, (StatusCode, Json<ErrorResponse>)> {
    let limit = query.limit.unwrap_or(100);
    if limit > 500 {
        return Err(bad_request("limit must be at most 500"));
    }
    let sort = parse_sort(&query).map_err(bad_request)?;
    let records = state
        .store
        .query(&build_filter(&query), &sort, limit, query.skip.unwrap_or(0))
        .await;
    Ok(Json(records))
}

async fn count_links_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LinksQuery>,
) -> Json<CountResponse> {
    let count = state.store.count(&build_filter(&query)).await;
    Json(CountResponse { count })
}

async fn domains_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DomainsQuery>,
) -> Json<Vec<DomainCount>> {
    Json(state.store.list_domains(query.min_score).await)
}
