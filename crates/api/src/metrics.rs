use query::{RagError, Stage};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

#[derive(Default)]
struct ModeCounters {
    requests: AtomicUsize,
    successes: AtomicUsize,
    total_time_us: AtomicU64,
}

impl ModeCounters {
    fn snapshot(&self) -> ModeSnapshot {
        let requests = self.requests.load(Ordering::Relaxed);
        let total_us = self.total_time_us.load(Ordering::Relaxed) as f64;
        ModeSnapshot {
            requests,
            successful: self.successes.load(Ordering::Relaxed),
            avg_query_time_ms: if requests > 0 {
                total_us / requests as f64 / 1000.0 // Convert to ms
            } else {
                0.0
            },
        }
    }
}

#[derive(Default)]
pub struct Metrics {
    vector: ModeCounters,
    hybrid: ModeCounters,

    // Failures by stage
    request_failures: AtomicUsize,
    embedding_failures: AtomicUsize,
    similarity_failures: AtomicUsize,
    traversal_failures: AtomicUsize,
    formatting_failures: AtomicUsize,
    generation_failures: AtomicUsize,
    timeouts: AtomicUsize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    Vector,
    Hybrid,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn mode(&self, mode: QueryMode) -> &ModeCounters {
        match mode {
            QueryMode::Vector => &self.vector,
            QueryMode::Hybrid => &self.hybrid,
        }
    }

    pub fn record_query(&self, mode: QueryMode, duration: Duration, success: bool) {
        let counters = self.mode(mode);
        counters.requests.fetch_add(1, Ordering::Relaxed);
        counters.total_time_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        if success {
            counters.successes.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_failure(&self, err: &RagError) {
        let counter = match err.stage() {
            Stage::Request => &self.request_failures,
            Stage::Embedding => &self.embedding_failures,
            Stage::SimilaritySearch => &self.similarity_failures,
            Stage::Traversal => &self.traversal_failures,
            Stage::Formatting => &self.formatting_failures,
            Stage::Generation => &self.generation_failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            vector: self.vector.snapshot(),
            hybrid: self.hybrid.snapshot(),
            failures: FailureSnapshot {
                request: self.request_failures.load(Ordering::Relaxed),
                embedding: self.embedding_failures.load(Ordering::Relaxed),
                similarity_search: self.similarity_failures.load(Ordering::Relaxed),
                traversal: self.traversal_failures.load(Ordering::Relaxed),
                formatting: self.formatting_failures.load(Ordering::Relaxed),
                generation: self.generation_failures.load(Ordering::Relaxed),
                timeout: self.timeouts.load(Ordering::Relaxed),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ModeSnapshot {
    pub requests: usize,
    pub successful: usize,
    pub avg_query_time_ms: f64,
}

#[derive(Debug, Serialize)]
pub struct FailureSnapshot {
    pub request: usize,
    pub embedding: usize,
    pub similarity_search: usize,
    pub traversal: usize,
    pub formatting: usize,
    pub generation: usize,
    pub timeout: usize,
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub vector: ModeSnapshot,
    pub hybrid: ModeSnapshot,
    pub failures: FailureSnapshot,
}

pub struct TimedOperation {
    start: Instant,
}

impl TimedOperation {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
