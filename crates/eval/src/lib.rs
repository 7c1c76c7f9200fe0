pub mod benchmark;
pub mod test_set;

pub use benchmark::{Benchmarker, BenchmarkResults, inspect_context};
pub use test_set::{QAPair, QuestionType, get_test_set, score_answer};
