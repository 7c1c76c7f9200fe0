mod cache;
mod config;
mod error;
mod metrics;

use anyhow::{Context, Result};
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use index::{
    ApiProvider, Embedder, EmbeddingClient, GraphStats, GraphStore, Neo4jStore, SimilarityIndex,
};
use query::{
    GraphRag, GroundedAnswerGenerator, HybridRetriever, QueryLLM, RetrieverConfig, RetrieverResult,
    VectorRetriever,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, info_span, Instrument};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::cache::{CacheStats, CachedEmbedder};
use crate::config::{AppConfig, Backend};
use crate::error::ApiError;
use crate::metrics::{Metrics, MetricsSnapshot, QueryMode, TimedOperation};

struct AppState {
    backend: Backend,
    vector: GraphRag,
    hybrid: GraphRag,
    store: Arc<dyn GraphStore>,
    cache: Option<Arc<CachedEmbedder>>,
    metrics: Arc<Metrics>,
    defaults: RetrieverConfig,
    timeout: Duration,
}

#[derive(Serialize)]
struct HealthResponse {
    backend: Backend,
    graph: String,
}

#[derive(Deserialize)]
struct QueryRequest {
    query: String,
    top_k: Option<usize>,
    max_hops: Option<usize>,
    #[serde(default)]
    return_context: bool,
}

#[derive(Serialize)]
struct QueryResponse {
    request_id: String,
    mode: QueryMode,
    answer: String,
    /// Rendered Context Document, as the generator saw it
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    retriever_result: Option<RetrieverResult>,
}

#[derive(Serialize)]
struct MetricsResponse {
    #[serde(flatten)]
    queries: MetricsSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    embedding_cache: Option<CacheStats>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env().context("Failed to load configuration")?;
    let state = build_state(&config).await?;
    let app = router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;

    info!(addr = %config.bind_addr, backend = ?config.backend, "Server listening");

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check).post(health_check))
        .route("/query/vector", post(query_vector))
        .route("/query/hybrid", post(query_hybrid))
        .route("/stats", get(get_stats))
        .route("/metrics", get(get_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn embedding_client(config: &AppConfig) -> EmbeddingClient {
    let embedding = &config.embedding;
    match &embedding.api_key {
        Some(key) => EmbeddingClient::new(
            ApiProvider::OpenAi,
            embedding.base_url.clone().unwrap_or_else(|| "https://api.openai.com".to_string()),
            config.embedding_model().to_string(),
            Some(key.clone()),
        ),
        None => EmbeddingClient::ollama(
            embedding.base_url.clone().unwrap_or_else(|| "http://localhost:11434".to_string()),
            config.embedding_model().to_string(),
        ),
    }
}

fn llm_client(config: &AppConfig) -> QueryLLM {
    let llm = &config.llm;
    let client = match &llm.api_key {
        Some(key) => QueryLLM::new(
            ApiProvider::OpenAi,
            llm.base_url.clone().unwrap_or_else(|| "https://api.openai.com".to_string()),
            llm.model.clone().unwrap_or_else(|| "gpt-4o".to_string()),
            Some(key.clone()),
        ),
        None => QueryLLM::ollama(
            llm.base_url.clone().unwrap_or_else(|| "http://localhost:11434".to_string()),
            llm.model.clone().unwrap_or_else(|| "llama3".to_string()),
        ),
    };
    client.with_temperature(llm.temperature)
}

async fn build_state(config: &AppConfig) -> Result<AppState> {
    let index_config = config.index_config();
    let client: Arc<dyn Embedder> = Arc::new(embedding_client(config));

    let (index, store): (Arc<dyn SimilarityIndex>, Arc<dyn GraphStore>) = match config.backend {
        Backend::Neo4j => {
            let store = Neo4jStore::connect(
                &config.neo4j.uri,
                &config.neo4j.username,
                &config.neo4j.password,
                index_config.clone(),
            )
            .await?;
            store.create_vector_index().await?;
            let store = Arc::new(store);
            (store.clone(), store)
        }
        Backend::Memory => {
            let vocabulary = extract::LabelVocabulary::medical();
            let graph = index::load_snapshot(
                &config.neo4j.data_dir,
                index_config.clone(),
                client.as_ref(),
                Some(&vocabulary),
            )
            .await
            .context("Failed to load graph snapshot")?;
            let graph = Arc::new(graph);
            (graph.clone(), graph)
        }
    };

    let cache = config
        .cache
        .enabled
        .then(|| Arc::new(CachedEmbedder::new(client.clone(), config.cache.max_entries)));
    let embedder: Arc<dyn Embedder> = match &cache {
        Some(cache) => cache.clone(),
        None => client,
    };

    let answerer = GroundedAnswerGenerator::new(Arc::new(llm_client(config)));
    let mut state = assemble_state(embedder, index, store, answerer, &index_config, config);
    state.cache = cache;
    Ok(state)
}

/// Wire both pipelines over the same collaborators
fn assemble_state(
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn SimilarityIndex>,
    store: Arc<dyn GraphStore>,
    answerer: GroundedAnswerGenerator,
    index_config: &index::VectorIndexConfig,
    config: &AppConfig,
) -> AppState {
    let vector = VectorRetriever::new(embedder, index, index_config);
    let hybrid = HybridRetriever::new(vector.clone(), store.clone())
        .with_min_hops(config.retrieval.min_hops)
        .with_max_hops_limit(config.retrieval.max_hops_limit);

    AppState {
        backend: config.backend,
        vector: GraphRag::new(Arc::new(vector), answerer.clone()),
        hybrid: GraphRag::new(Arc::new(hybrid), answerer),
        store,
        cache: None,
        metrics: Metrics::new(),
        defaults: config.retriever_config(),
        timeout: Duration::from_secs(config.concurrency.request_timeout_secs),
    }
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let graph = match state.store.ping().await {
        Ok(_) => "ok".to_string(),
        Err(e) => format!("error: {:#}", e),
    };

    Json(HealthResponse {
        backend: state.backend,
        graph,
    })
}

async fn query_vector(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    run_query(&state, QueryMode::Vector, req).await
}

async fn query_hybrid(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    run_query(&state, QueryMode::Hybrid, req).await
}

async fn run_query(
    state: &AppState,
    mode: QueryMode,
    req: QueryRequest,
) -> Result<Json<QueryResponse>, ApiError> {
    let request_id = Uuid::new_v4().to_string();
    let span = info_span!("query", request_id = %request_id, mode = ?mode);

    async move {
        let config = RetrieverConfig {
            top_k: req.top_k.unwrap_or(state.defaults.top_k),
            max_hops: req.max_hops.unwrap_or(state.defaults.max_hops),
        };
        let rag = match mode {
            QueryMode::Vector => &state.vector,
            QueryMode::Hybrid => &state.hybrid,
        };

        let timer = TimedOperation::start();
        // Dropping the search future on timeout discards any partial context
        let outcome = tokio::time::timeout(
            state.timeout,
            rag.search(&req.query, &config, req.return_context),
        )
        .await;

        let result = match outcome {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(err)) => {
                state.metrics.record_failure(&err);
                Err(ApiError::from(err))
            }
            Err(_) => {
                state.metrics.record_timeout();
                Err(ApiError::Timeout(state.timeout))
            }
        };
        state.metrics.record_query(mode, timer.elapsed(), result.is_ok());
        let result = result?;

        info!(elapsed_ms = timer.elapsed().as_millis() as u64, "Query complete");

        Ok(Json(QueryResponse {
            request_id,
            mode,
            answer: result.answer,
            context: result.retriever_result.as_ref().map(|r| r.context.render()),
            retriever_result: result.retriever_result,
        }))
    }
    .instrument(span)
    .await
}

async fn get_stats(State(state): State<Arc<AppState>>) -> Result<Json<GraphStats>, ApiError> {
    let stats = state.store
        .stats()
        .await
        .map_err(ApiError::Internal)?;

    Ok(Json(stats))
}

async fn get_metrics(State(state): State<Arc<AppState>>) -> Json<MetricsResponse> {
    Json(MetricsResponse {
        queries: state.metrics.snapshot(),
        embedding_cache: state.cache.as_ref().map(|c| c.stats()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use index::{MemoryGraph, TraversalResult, TraversalSpec, VectorIndexConfig};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    struct FixedEmbedder;

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }
    }

    enum Reply {
        Text(&'static str),
        Fail,
        Hang,
    }

    struct ScriptedGenerator(Reply);

    #[async_trait]
    impl query::Generator for ScriptedGenerator {
        async fn generate(&self, _prompt: &str) -> anyhow::Result<String> {
            match self.0 {
                Reply::Text(text) => Ok(text.to_string()),
                Reply::Fail => anyhow::bail!("model returned status 500"),
                Reply::Hang => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok("too late".to_string())
                }
            }
        }
    }

    struct OfflineStore;

    #[async_trait]
    impl GraphStore for OfflineStore {
        async fn traverse(&self, _spec: &TraversalSpec) -> anyhow::Result<TraversalResult> {
            anyhow::bail!("connection refused")
        }

        async fn stats(&self) -> anyhow::Result<GraphStats> {
            anyhow::bail!("connection refused")
        }
    }

    fn graph(config: &VectorIndexConfig) -> MemoryGraph {
        let mut graph = MemoryGraph::new(config.clone());
        let mut chunk = ingest::Chunk::new("doc".into(), "HCQ treats SLE.".into(), "lupus.pdf".into(), 0, (0, 15), 0)
            .with_embedding(vec![1.0, 0.0]);
        chunk.chunk_id = "c1".to_string();
        graph.add_chunk(&chunk);
        graph
            .add_extraction(&extract::ExtractedChunk {
                chunk_id: "c1".to_string(),
                doc_id: "doc".to_string(),
                graph: extract::parse_graph_document(
                    r#"{"nodes": [
                        {"id": "0", "label": "Drug", "properties": {"name": "HCQ"}},
                        {"id": "1", "label": "Disease", "properties": {"name": "SLE"}}],
                       "relationships": [{"type": "TREATS", "start_node_id": "0", "end_node_id": "1"}]}"#,
                )
                .unwrap(),
            })
            .unwrap();
        graph
    }

    fn app(reply: Reply, timeout_secs: u64) -> Router {
        let index_config = VectorIndexConfig {
            dimensions: 2,
            ..VectorIndexConfig::default()
        };
        let graph = Arc::new(graph(&index_config));
        let mut config = AppConfig::default();
        config.backend = Backend::Memory;
        config.concurrency.request_timeout_secs = timeout_secs;

        let state = assemble_state(
            Arc::new(FixedEmbedder),
            graph.clone(),
            graph,
            GroundedAnswerGenerator::new(Arc::new(ScriptedGenerator(reply))),
            &index_config,
            &config,
        );
        router(Arc::new(state))
    }

    async fn post(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn fetch(app: Router, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn hybrid_query_returns_answer_and_context() {
        let (status, body) = post(
            app(Reply::Text("HCQ."), 5),
            "/query/hybrid",
            json!({"query": "What treats SLE?", "return_context": true}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["answer"], "HCQ.");
        assert_eq!(body["mode"], "hybrid");
        let context = body["context"].as_str().unwrap();
        assert!(context.starts_with("=== text ===\nHCQ treats SLE."));
        assert!(context.contains("=== kg_rels ===\nHCQ - TREATS() -> SLE"));
    }

    #[tokio::test]
    async fn vector_query_omits_context_unless_requested() {
        let (status, body) = post(
            app(Reply::Text("HCQ."), 5),
            "/query/vector",
            json!({"query": "What treats SLE?"}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.get("context").is_none());
        assert!(body["request_id"].as_str().is_some());
    }

    #[tokio::test]
    async fn empty_query_is_bad_request() {
        let (status, body) = post(app(Reply::Text("x"), 5), "/query/hybrid", json!({"query": ""})).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["stage"], "request");
    }

    #[tokio::test]
    async fn oversized_hop_count_is_bad_request() {
        let app = app(Reply::Text("x"), 5);
        let (status, body) = post(
            app.clone(),
            "/query/hybrid",
            json!({"query": "SLE", "max_hops": 50}),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["stage"], "request");
        assert!(body["error"].as_str().unwrap().contains("limit of 4"));

        let (status, _) = post(app, "/query/hybrid", json!({"query": "SLE", "max_hops": 4})).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn generator_failure_is_bad_gateway() {
        let (status, body) = post(app(Reply::Fail, 5), "/query/vector", json!({"query": "SLE"})).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["stage"], "generation");
    }

    #[tokio::test]
    async fn slow_generation_times_out() {
        let (status, body) = post(app(Reply::Hang, 1), "/query/hybrid", json!({"query": "SLE"})).await;

        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert!(body.get("stage").is_none());
    }

    #[tokio::test]
    async fn stats_and_health_report_graph() {
        let (status, stats) = fetch(app(Reply::Text("x"), 5), "/stats").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stats["chunk_count"], 1);
        assert_eq!(stats["node_count"], 3);

        let (status, health) = fetch(app(Reply::Text("x"), 5), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(health["graph"], "ok");
        assert_eq!(health["backend"], "memory");
    }

    #[tokio::test]
    async fn health_reports_unreachable_graph() {
        let index_config = VectorIndexConfig {
            dimensions: 2,
            ..VectorIndexConfig::default()
        };
        let state = assemble_state(
            Arc::new(FixedEmbedder),
            Arc::new(graph(&index_config)),
            Arc::new(OfflineStore),
            GroundedAnswerGenerator::new(Arc::new(ScriptedGenerator(Reply::Text("x")))),
            &index_config,
            &AppConfig::default(),
        );

        let (status, health) = fetch(router(Arc::new(state)), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert!(health["graph"].as_str().unwrap().contains("connection refused"));
    }

    #[tokio::test]
    async fn metrics_count_failures_by_stage() {
        let app = app(Reply::Text("x"), 5);
        post(app.clone(), "/query/hybrid", json!({"query": " "})).await;

        let (_, metrics) = fetch(app, "/metrics").await;
        assert_eq!(metrics["hybrid"]["requests"], 1);
        assert_eq!(metrics["failures"]["request"], 1);
    }
}
