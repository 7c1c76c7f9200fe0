use anyhow::{Context, Result};
use query::ContextDocument;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;

use crate::test_set::{QAPair, score_answer};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkResults {
    pub vector: MethodResults,
    pub hybrid: MethodResults,
    pub comparison: Comparison,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodResults {
    pub method: String,
    pub total_queries: usize,
    pub failed_queries: usize,
    pub avg_latency_ms: f64,
    pub p50_latency_ms: f64,
    pub p95_latency_ms: f64,
    pub avg_quality_score: f64,
    pub by_category: Vec<CategoryScore>,
    pub answers: Vec<AnswerRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryScore {
    pub category: String,
    pub avg_quality: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question: String,
    pub answer: Option<String>,
    pub error: Option<String>,
    pub score: f64,
    /// Context entries matching the inspection keywords
    pub matching_entries: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comparison {
    pub hybrid_vs_vector_quality_improvement: f64,
    pub hybrid_vs_vector_latency_ratio: f64,
}

struct Sample {
    latency_ms: f64,
    score: f64,
    record: AnswerRecord,
}

/// Runs the question set against both retrieval modes of a running API.
pub struct Benchmarker {
    api_base_url: String,
    top_k: usize,
    max_hops: usize,
    keywords: Vec<String>,
    client: reqwest::Client,
}

impl Benchmarker {
    pub fn new(api_base_url: String) -> Self {
        Self {
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            top_k: 5,
            max_hops: 2,
            keywords: vec!["biomarker".to_string(), "treat".to_string()],
            client: reqwest::Client::new(),
        }
    }

    pub fn with_retrieval(mut self, top_k: usize, max_hops: usize) -> Self {
        self.top_k = top_k;
        self.max_hops = max_hops;
        self
    }

    pub async fn run_benchmark(&self, test_set: &[QAPair]) -> Result<BenchmarkResults> {
        println!("Running comparison with {} questions...", test_set.len());

        println!("Testing vector retrieval...");
        let vector = self.test_mode("vector", test_set).await?;

        println!("Testing vector + graph retrieval...");
        let hybrid = self.test_mode("hybrid", test_set).await?;

        let comparison = Comparison {
            hybrid_vs_vector_quality_improvement: relative_change(
                vector.avg_quality_score,
                hybrid.avg_quality_score,
            ),
            hybrid_vs_vector_latency_ratio: if vector.avg_latency_ms > 0.0 {
                hybrid.avg_latency_ms / vector.avg_latency_ms
            } else {
                0.0
            },
        };

        Ok(BenchmarkResults {
            vector,
            hybrid,
            comparison,
        })
    }

    async fn test_mode(&self, mode: &str, test_set: &[QAPair]) -> Result<MethodResults> {
        let mut samples = Vec::new();
        let mut category_scores: HashMap<String, Vec<f64>> = HashMap::new();

        for qa in test_set {
            let sample = self.ask(mode, qa).await?;
            category_scores
                .entry(format!("{:?}", qa.category))
                .or_default()
                .push(sample.score);
            samples.push(sample);
        }

        Ok(compute_results(mode, samples, category_scores))
    }

    async fn ask(&self, mode: &str, qa: &QAPair) -> Result<Sample> {
        let start = Instant::now();

        let response = self.client
            .post(format!("{}/query/{}", self.api_base_url, mode))
            .json(&serde_json::json!({
                "query": qa.question,
                "top_k": self.top_k,
                "max_hops": self.max_hops,
                "return_context": true
            }))
            .send()
            .await
            .with_context(|| format!("Failed to reach {} endpoint", mode))?;

        let status = response.status();
        let body: serde_json::Value = response
            .json()
            .await
            .context("Failed to parse query response")?;
        let latency_ms = start.elapsed().as_millis() as f64;

        if !status.is_success() {
            let error = body["error"].as_str().unwrap_or("unknown error").to_string();
            return Ok(Sample {
                latency_ms,
                score: 0.0,
                record: AnswerRecord {
                    question: qa.question.clone(),
                    answer: None,
                    error: Some(format!("{}: {}", status, error)),
                    score: 0.0,
                    matching_entries: HashMap::new(),
                },
            });
        }

        let answer = body["answer"].as_str().unwrap_or("").to_string();
        let score = score_answer(&answer, &qa.expected_answer_contains);
        let matching_entries = match body["context"].as_str() {
            Some(rendered) => inspect_context(rendered, &self.keywords)?,
            None => HashMap::new(),
        };

        Ok(Sample {
            latency_ms,
            score,
            record: AnswerRecord {
                question: qa.question.clone(),
                answer: Some(answer),
                error: None,
                score,
                matching_entries,
            },
        })
    }
}

/// Context entries per keyword, read back from a rendered document
pub fn inspect_context(rendered: &str, keywords: &[String]) -> Result<HashMap<String, Vec<String>>> {
    let document = ContextDocument::parse(rendered)?;
    Ok(keywords
        .iter()
        .map(|keyword| {
            let entries = document
                .entries_containing(keyword)
                .into_iter()
                .map(|e| e.to_string())
                .collect();
            (keyword.clone(), entries)
        })
        .collect())
}

fn relative_change(baseline: f64, value: f64) -> f64 {
    if baseline > 0.0 {
        (value - baseline) / baseline * 100.0
    } else {
        0.0
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn compute_results(
    method: &str,
    samples: Vec<Sample>,
    category_scores: HashMap<String, Vec<f64>>,
) -> MethodResults {
    let mut latencies: Vec<f64> = samples.iter().map(|s| s.latency_ms).collect();
    latencies.sort_by(|a, b| a.total_cmp(b));
    let scores: Vec<f64> = samples.iter().map(|s| s.score).collect();

    let mut by_category: Vec<CategoryScore> = category_scores
        .into_iter()
        .map(|(category, scores)| CategoryScore {
            category,
            avg_quality: mean(&scores),
            count: scores.len(),
        })
        .collect();
    by_category.sort_by(|a, b| a.category.cmp(&b.category));

    MethodResults {
        method: method.to_string(),
        total_queries: samples.len(),
        failed_queries: samples.iter().filter(|s| s.record.error.is_some()).count(),
        avg_latency_ms: mean(&latencies),
        p50_latency_ms: percentile(&latencies, 50),
        p95_latency_ms: percentile(&latencies, 95),
        avg_quality_score: mean(&scores),
        by_category,
        answers: samples.into_iter().map(|s| s.record).collect(),
    }
}

fn percentile(sorted_data: &[f64], p: usize) -> f64 {
    if sorted_data.is_empty() {
        return 0.0;
    }
    let index = (p as f64 / 100.0 * sorted_data.len() as f64) as usize;
    sorted_data[index.min(sorted_data.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(latency_ms: f64, score: f64, error: bool) -> Sample {
        Sample {
            latency_ms,
            score,
            record: AnswerRecord {
                question: "q".into(),
                answer: (!error).then(|| "a".to_string()),
                error: error.then(|| "503".to_string()),
                score,
                matching_entries: HashMap::new(),
            },
        }
    }

    #[test]
    fn percentile_picks_from_sorted_data() {
        let data = [10.0, 20.0, 30.0, 40.0];
        assert_eq!(percentile(&data, 50), 30.0);
        assert_eq!(percentile(&data, 95), 40.0);
        assert_eq!(percentile(&[], 50), 0.0);
    }

    #[test]
    fn aggregates_samples() {
        let mut categories = HashMap::new();
        categories.insert("Factual".to_string(), vec![1.0, 0.0]);

        let results = compute_results(
            "hybrid",
            vec![sample(100.0, 1.0, false), sample(300.0, 0.0, true)],
            categories,
        );

        assert_eq!(results.total_queries, 2);
        assert_eq!(results.failed_queries, 1);
        assert_eq!(results.avg_latency_ms, 200.0);
        assert_eq!(results.avg_quality_score, 0.5);
        assert_eq!(results.by_category[0].avg_quality, 0.5);
    }

    #[test]
    fn groups_context_entries_by_keyword() {
        let rendered = "=== text ===\nAnti-dsDNA is a biomarker for SLE.\n---\nRash is common.\n\n=== kg_rels ===\nHCQ - TREATS() -> SLE\n---\nAnti-dsDNA - BIOMARKER_FOR() -> SLE";
        let keywords = vec!["biomarker".to_string(), "treat".to_string()];

        let found = inspect_context(rendered, &keywords).unwrap();
        assert_eq!(found["biomarker"].len(), 2);
        assert_eq!(found["treat"], vec!["HCQ - TREATS() -> SLE"]);
    }

    #[test]
    fn relative_change_handles_zero_baseline() {
        assert_eq!(relative_change(0.0, 0.5), 0.0);
        assert_eq!(relative_change(0.5, 0.75), 50.0);
    }
}
