use anyhow::Result;
use eval::{Benchmarker, get_test_set};

#[tokio::main]
async fn main() -> Result<()> {
    println!("=== Vector vs Vector + Graph Comparison ===\n");

    let api_base_url = std::env::var("GRAPHRAG_API_URL")
        .unwrap_or_else(|_| "http://localhost:3000".to_string());
    let benchmarker = Benchmarker::new(api_base_url);

    let test_set = get_test_set();
    println!("Test set: {} questions\n", test_set.len());

    let results = benchmarker.run_benchmark(&test_set).await?;

    print_results(&results);

    let results_json = serde_json::to_string_pretty(&results)?;
    std::fs::write("comparison_results.json", results_json)?;
    println!("\nResults saved to comparison_results.json");

    Ok(())
}

fn print_results(results: &eval::BenchmarkResults) {
    println!("\n=== RESULTS ===\n");

    println!("VECTOR:");
    print_method_results(&results.vector);

    println!("\nVECTOR + GRAPH:");
    print_method_results(&results.hybrid);

    println!("\nCOMPARISON:");
    println!("  Quality change: {:+.1}%", results.comparison.hybrid_vs_vector_quality_improvement);
    println!("  Latency ratio: {:.2}x", results.comparison.hybrid_vs_vector_latency_ratio);

    println!("\nGRAPH CONTEXT ENTRIES:");
    for record in &results.hybrid.answers {
        println!("\n  {}", record.question);
        let mut keywords: Vec<_> = record.matching_entries.keys().collect();
        keywords.sort();
        for keyword in keywords {
            for entry in &record.matching_entries[keyword] {
                println!("    [{}] {}", keyword, entry);
            }
        }
    }
}

fn print_method_results(results: &eval::benchmark::MethodResults) {
    println!("  Queries: {} ({} failed)", results.total_queries, results.failed_queries);
    println!("  Avg Latency: {:.0} ms", results.avg_latency_ms);
    println!("  P50 Latency: {:.0} ms", results.p50_latency_ms);
    println!("  P95 Latency: {:.0} ms", results.p95_latency_ms);
    println!("  Avg Quality: {:.2}", results.avg_quality_score);
    for category in &results.by_category {
        println!("    {}: {:.2} over {}", category.category, category.avg_quality, category.count);
    }
}
