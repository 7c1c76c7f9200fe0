use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub bind_addr: String,
    pub backend: Backend,
    pub neo4j: Neo4jConfig,
    pub llm: ModelConfig,
    pub embedding: ModelConfig,
    pub vector_index: VectorIndexSettings,
    pub retrieval: RetrievalDefaults,
    pub concurrency: ConcurrencyConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Neo4j,
    /// Snapshot files under `data_dir`, held in process
    Memory,
}

impl FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "neo4j" => Ok(Backend::Neo4j),
            "memory" => Ok(Backend::Memory),
            other => anyhow::bail!("Unknown backend {:?}, expected neo4j or memory", other),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Neo4jConfig {
    pub uri: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// `None` selects the OpenAI-compatible default endpoint
    pub base_url: Option<String>,
    pub model: Option<String>,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub temperature: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorIndexSettings {
    pub name: String,
    pub dimensions: usize,
    pub min_score: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalDefaults {
    pub top_k: usize,
    pub min_hops: usize,
    pub max_hops: usize,
    /// Largest `max_hops` a request may ask for
    pub max_hops_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_entries: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            backend: Backend::Neo4j,
            neo4j: Neo4jConfig {
                uri: "bolt://localhost:7687".to_string(),
                username: "neo4j".to_string(),
                password: String::new(),
                data_dir: PathBuf::from("data"),
            },
            llm: ModelConfig {
                base_url: None,
                model: None,
                api_key: None,
                temperature: 0.0,
            },
            embedding: ModelConfig {
                base_url: None,
                model: None,
                api_key: None,
                temperature: 0.0,
            },
            vector_index: VectorIndexSettings {
                name: "text_embeddings".to_string(),
                dimensions: 768,
                min_score: None,
            },
            retrieval: RetrievalDefaults {
                top_k: 5,
                min_hops: 1,
                max_hops: 2,
                max_hops_limit: query::DEFAULT_MAX_HOPS_LIMIT,
            },
            concurrency: ConcurrencyConfig {
                request_timeout_secs: 60,
            },
            cache: CacheConfig {
                enabled: true,
                max_entries: 10000,
            },
        }
    }
}

impl AppConfig {
    /// Read `.env` if present, then the process environment
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(addr) = get("BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Some(backend) = get("GRAPHRAG_BACKEND") {
            config.backend = backend.parse()?;
        }

        if let Some(uri) = get("NEO4J_URI") {
            config.neo4j.uri = uri;
        }
        if let Some(username) = get("NEO4J_USERNAME") {
            config.neo4j.username = username;
        }
        if let Some(password) = get("NEO4J_PASSWORD") {
            config.neo4j.password = password;
        }
        if let Some(dir) = get("GRAPHRAG_DATA_DIR") {
            config.neo4j.data_dir = PathBuf::from(dir);
        }

        let api_key = get("OPENAI_API_KEY");
        config.llm.api_key = api_key.clone();
        config.llm.base_url = get("LLM_BASE_URL");
        config.llm.model = get("LLM_MODEL");
        config.llm.temperature = parse_or(&get, "LLM_TEMPERATURE", config.llm.temperature)?;

        config.embedding.api_key = api_key;
        config.embedding.base_url = get("EMBEDDING_BASE_URL");
        config.embedding.model = get("EMBEDDING_MODEL");

        if let Some(name) = get("VECTOR_INDEX_NAME") {
            config.vector_index.name = name;
        }
        let known = model_dimensions(config.embedding_model());
        config.vector_index.dimensions = match (get("VECTOR_DIMENSIONS"), known) {
            (Some(raw), known) => {
                let dimensions: usize = parse_value("VECTOR_DIMENSIONS", &raw)?;
                if let Some(expected) = known.filter(|&k| k != dimensions) {
                    anyhow::bail!(
                        "VECTOR_DIMENSIONS={} but embedding model {} produces {}",
                        dimensions,
                        config.embedding_model(),
                        expected
                    );
                }
                dimensions
            }
            (None, Some(dimensions)) => dimensions,
            (None, None) => anyhow::bail!(
                "Unknown embedding model {}, set VECTOR_DIMENSIONS",
                config.embedding_model()
            ),
        };
        config.vector_index.min_score = get("VECTOR_MIN_SCORE")
            .map(|v| parse_value("VECTOR_MIN_SCORE", &v))
            .transpose()?;

        config.retrieval.top_k = parse_or(&get, "RETRIEVAL_TOP_K", config.retrieval.top_k)?;
        config.retrieval.min_hops = parse_or(&get, "RETRIEVAL_MIN_HOPS", config.retrieval.min_hops)?;
        config.retrieval.max_hops = parse_or(&get, "RETRIEVAL_MAX_HOPS", config.retrieval.max_hops)?;
        config.retrieval.max_hops_limit =
            parse_or(&get, "RETRIEVAL_MAX_HOPS_LIMIT", config.retrieval.max_hops_limit)?;
        index::HopRange::new(config.retrieval.min_hops, config.retrieval.max_hops)
            .context("Invalid RETRIEVAL_MIN_HOPS/RETRIEVAL_MAX_HOPS")?;
        if config.retrieval.max_hops > config.retrieval.max_hops_limit {
            anyhow::bail!(
                "RETRIEVAL_MAX_HOPS={} exceeds RETRIEVAL_MAX_HOPS_LIMIT={}",
                config.retrieval.max_hops,
                config.retrieval.max_hops_limit
            );
        }

        config.concurrency.request_timeout_secs = parse_or(
            &get,
            "REQUEST_TIMEOUT_SECS",
            config.concurrency.request_timeout_secs,
        )?;
        config.cache.enabled = parse_or(&get, "EMBEDDING_CACHE_ENABLED", config.cache.enabled)?;
        config.cache.max_entries =
            parse_or(&get, "EMBEDDING_CACHE_MAX_ENTRIES", config.cache.max_entries)?;

        Ok(config)
    }

    /// Configured embedding model, or the provider default
    pub fn embedding_model(&self) -> &str {
        match (&self.embedding.model, &self.embedding.api_key) {
            (Some(model), _) => model,
            (None, Some(_)) => "text-embedding-ada-002",
            (None, None) => "nomic-embed-text",
        }
    }

    pub fn index_config(&self) -> index::VectorIndexConfig {
        index::VectorIndexConfig {
            name: self.vector_index.name.clone(),
            dimensions: self.vector_index.dimensions,
            min_score: self.vector_index.min_score,
            ..index::VectorIndexConfig::default()
        }
    }

    pub fn retriever_config(&self) -> query::RetrieverConfig {
        query::RetrieverConfig {
            top_k: self.retrieval.top_k,
            max_hops: self.retrieval.max_hops,
        }
    }
}

/// Output width of embedding models we know by name
fn model_dimensions(model: &str) -> Option<usize> {
    match model {
        "text-embedding-ada-002" | "text-embedding-3-small" => Some(1536),
        "text-embedding-3-large" => Some(3072),
        "nomic-embed-text" => Some(768),
        "mxbai-embed-large" => Some(1024),
        "all-minilm" => Some(384),
        _ => None,
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid value for {}: {:?} ({})", key, raw, e))
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}
