use anyhow::{Context, Result};
use async_trait::async_trait;
use neo4rs::{Graph, Query};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::store::{
    ChunkRecord, EdgeRecord, GraphStats, GraphStore, IndexHit, SimilarityIndex, TraversalResult,
    TraversalSpec, VectorIndexConfig,
};

/// Neo4j-backed similarity index and graph store. Read-only apart from
/// `create_vector_index`.
#[derive(Clone)]
pub struct Neo4jStore {
    graph: Graph,
    index: VectorIndexConfig,
}

#[derive(Debug, Deserialize)]
struct TraversedEdge {
    id: String,
    #[serde(rename = "type")]
    rel_type: String,
    source: String,
    target: String,
    details: String,
}

#[derive(Debug, Deserialize)]
struct TraversedChunk {
    id: String,
    text: String,
}

/// Labels, property names and relationship types are spliced into Cypher,
/// so they are restricted to plain identifiers.
fn check_identifier(kind: &str, value: &str) -> Result<()> {
    let valid = !value.is_empty() && value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        anyhow::bail!("Invalid {} for Cypher: {:?}", kind, value);
    }
    Ok(())
}

impl Neo4jStore {
    pub fn new(graph: Graph, index: VectorIndexConfig) -> Self {
        Self { graph, index }
    }

    pub async fn connect(
        uri: &str,
        user: &str,
        password: &str,
        index: VectorIndexConfig,
    ) -> Result<Self> {
        let graph = Graph::new(uri, user, password)
            .await
            .context("Failed to connect to Neo4j")?;
        Ok(Self::new(graph, index))
    }

    /// Create the chunk vector index if it does not exist yet
    pub async fn create_vector_index(&self) -> Result<()> {
        check_identifier("index name", &self.index.name)?;
        check_identifier("label", &self.index.label)?;
        check_identifier("property", &self.index.embedding_property)?;

        info!(
            index = %self.index.name,
            label = %self.index.label,
            dimensions = self.index.dimensions,
            "Creating vector index"
        );

        let query = Query::new(format!(
            "CREATE VECTOR INDEX `{name}` IF NOT EXISTS \
             FOR (n:`{label}`) ON n.`{property}` \
             OPTIONS {{ indexConfig: {{ `vector.dimensions`: {dimensions}, \
             `vector.similarity_function`: '{similarity}' }} }}",
            name = self.index.name,
            label = self.index.label,
            property = self.index.embedding_property,
            dimensions = self.index.dimensions,
            similarity = self.index.similarity.as_str(),
        ));

        self.graph
            .run(query)
            .await
            .context("Failed to create vector index")?;

        Ok(())
    }

    fn traversal_query(&self, spec: &TraversalSpec) -> Result<Query> {
        check_identifier("relationship type", &spec.provenance_type)?;

        let mut excluded = spec.excluded_types.clone();
        if !excluded.contains(&spec.provenance_type) {
            excluded.push(spec.provenance_type.clone());
        }

        let text_property = self
            .index
            .return_properties
            .first()
            .cloned()
            .unwrap_or_else(|| "text".to_string());

        let cypher = format!(
            r#"
            UNWIND range(0, size($seed_ids) - 1) AS seed_idx
            MATCH (chunk) WHERE elementId(chunk) = $seed_ids[seed_idx]
            OPTIONAL MATCH path = (chunk)<-[:`{provenance}`]-(entity)-[rels*{min}..{max}]-(reached)
            WHERE none(r IN rels WHERE type(r) IN $excluded_types)
            RETURN seed_idx,
                   elementId(chunk) AS chunk_id,
                   coalesce(toString(chunk[$text_property]), '') AS chunk_text,
                   [r IN coalesce(rels, []) | {{
                       id: elementId(r),
                       type: type(r),
                       source: coalesce(toString(startNode(r).name), elementId(startNode(r))),
                       target: coalesce(toString(endNode(r).name), elementId(endNode(r))),
                       details: coalesce(toString(r.details), '')
                   }}] AS rels,
                   [n IN coalesce(nodes(path), []) WHERE $chunk_label IN labels(n) AND n <> chunk | {{
                       id: elementId(n),
                       text: coalesce(toString(n[$text_property]), '')
                   }}] AS reached_chunks
            "#,
            provenance = spec.provenance_type,
            min = spec.hops.min(),
            max = spec.hops.max(),
        );

        Ok(Query::new(cypher)
            .param("seed_ids", spec.seed_ids.clone())
            .param("excluded_types", excluded)
            .param("text_property", text_property)
            .param("chunk_label", self.index.label.clone()))
    }

    async fn count(&self, cypher: &str) -> Result<usize> {
        let query = Query::new(cypher.to_string()).param("label", self.index.label.clone());
        let mut result = self.graph.execute(query).await?;
        let count = if let Some(row) = result.next().await? {
            row.get::<i64>("count").unwrap_or(0) as usize
        } else {
            0
        };
        Ok(count)
    }
}

#[async_trait]
impl SimilarityIndex for Neo4jStore {
    async fn search(&self, embedding: &[f32], label: &str, top_k: usize) -> Result<Vec<IndexHit>> {
        let query = Query::new(
            r#"
            CALL db.index.vector.queryNodes($index_name, $top_k, $embedding)
            YIELD node, score
            WHERE $label IN labels(node)
            RETURN elementId(node) AS node_id,
                   score,
                   [p IN $return_properties | coalesce(toString(node[p]), '')] AS property_values
            "#
            .to_string(),
        )
        .param("index_name", self.index.name.clone())
        .param("top_k", top_k as i64)
        .param("embedding", embedding.iter().map(|v| *v as f64).collect::<Vec<f64>>())
        .param("label", label.to_string())
        .param("return_properties", self.index.return_properties.clone());

        let mut result = self.graph
            .execute(query)
            .await
            .context("Vector index query failed")?;

        let mut hits = Vec::new();
        while let Some(row) = result.next().await? {
            let node_id: String = row.get("node_id").context("Missing node_id")?;
            let score = row.get::<f64>("score").context("Missing score")? as f32;
            let values: Vec<String> = row.get("property_values").unwrap_or_default();

            let properties: Map<String, Value> = self.index.return_properties
                .iter()
                .cloned()
                .zip(values.into_iter().map(Value::String))
                .collect();

            hits.push(IndexHit {
                node_id,
                score,
                properties,
            });
        }

        if let Some(floor) = self.index.min_score {
            hits.retain(|hit| hit.score >= floor);
        }
        hits.truncate(top_k);

        debug!(index = %self.index.name, hits = hits.len(), "Vector query complete");
        Ok(hits)
    }

    async fn indexed_count(&self) -> Result<usize> {
        check_identifier("property", &self.index.embedding_property)?;
        let cypher = format!(
            "MATCH (n) WHERE $label IN labels(n) AND n.`{}` IS NOT NULL RETURN count(n) AS count",
            self.index.embedding_property
        );
        self.count(&cypher).await
    }
}

#[async_trait]
impl GraphStore for Neo4jStore {
    async fn traverse(&self, spec: &TraversalSpec) -> Result<TraversalResult> {
        if spec.seed_ids.is_empty() {
            return Ok(TraversalResult::default());
        }

        let query = self.traversal_query(spec)?;
        let mut result = self.graph
            .execute(query)
            .await
            .context("Graph traversal query failed")?;

        let mut rows = Vec::new();
        while let Some(row) = result.next().await? {
            let seed_idx = row.get::<i64>("seed_idx").context("Missing seed_idx")?;
            let chunk = ChunkRecord {
                id: row.get("chunk_id").context("Missing chunk_id")?,
                text: row.get("chunk_text").unwrap_or_default(),
            };
            let rels: Vec<TraversedEdge> = row.get("rels").context("Malformed rels")?;
            let reached: Vec<TraversedChunk> = row.get("reached_chunks").unwrap_or_default();
            rows.push((seed_idx, chunk, rels, reached));
            if rows.len() > spec.max_paths {
                anyhow::bail!(
                    "Traversal exceeded {} paths within {} hops",
                    spec.max_paths,
                    spec.hops.max()
                );
            }
        }

        // Stable: path order within a seed is kept
        rows.sort_by_key(|(seed_idx, ..)| *seed_idx);

        let mut traversal = TraversalResult::default();
        for (_, chunk, rels, reached) in rows {
            traversal.chunks.push(chunk);
            traversal.chunks.extend(reached.into_iter().map(|c| ChunkRecord {
                id: c.id,
                text: c.text,
            }));
            traversal.relationships.extend(rels.into_iter().map(|r| EdgeRecord {
                id: r.id,
                rel_type: r.rel_type,
                source_name: r.source,
                target_name: r.target,
                details: Some(r.details).filter(|d| !d.is_empty()),
            }));
        }

        debug!(
            seeds = spec.seed_ids.len(),
            chunks = traversal.chunks.len(),
            relationships = traversal.relationships.len(),
            "Traversal complete"
        );
        Ok(traversal)
    }

    /// Get graph statistics
    async fn stats(&self) -> Result<GraphStats> {
        let node_count = self.count("MATCH (n) RETURN count(n) AS count").await?;
        let chunk_count = self
            .count("MATCH (n) WHERE $label IN labels(n) RETURN count(n) AS count")
            .await?;
        let relationship_count = self.count("MATCH ()-[r]->() RETURN count(r) AS count").await?;

        Ok(GraphStats {
            node_count,
            chunk_count,
            relationship_count,
        })
    }

    async fn ping(&self) -> Result<()> {
        self.graph
            .run(neo4rs::query("RETURN 1"))
            .await
            .context("Neo4j health query failed")
    }
}
