use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QAPair {
    pub question: String,
    pub expected_answer_contains: Vec<String>,
    pub category: QuestionType,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum QuestionType {
    Factual,        // Simple fact lookup
    Relational,     // Requires understanding relationships
    MultiHop,       // Requires multiple reasoning steps
    Summary,        // Broad synthesis over the corpus
}

fn pair(question: &str, expected: &[&str], category: QuestionType) -> QAPair {
    QAPair {
        question: question.to_string(),
        expected_answer_contains: expected.iter().map(|s| s.to_string()).collect(),
        category,
    }
}

/// Lupus questions asked of both retrieval modes
pub fn get_test_set() -> Vec<QAPair> {
    vec![
        pair(
            "How is precision medicine applied to Lupus? provide in list format.",
            &["lupus", "biomarker"],
            QuestionType::Relational,
        ),
        pair(
            "Can you summarize systemic lupus erythematosus (SLE)? including common effects, biomarkers, and treatments? Provide in detailed list format.",
            &["sle", "biomarker", "treat"],
            QuestionType::Summary,
        ),
        pair(
            "Can you summarize systemic lupus erythematosus (SLE)? including common effects, biomarkers, treatments, and current challenges faced by Physicians and patients? provide in list format with details for each item.",
            &["sle", "treat", "challenge"],
            QuestionType::Summary,
        ),
        pair(
            "Which drugs are used to treat lupus nephritis?",
            &["nephritis", "treat"],
            QuestionType::Factual,
        ),
        pair(
            "Which biomarkers are associated with disease activity in SLE?",
            &["biomarker", "activity"],
            QuestionType::Factual,
        ),
        pair(
            "Which genes or proteins are linked to lupus, and which drugs act on them?",
            &["gene", "drug"],
            QuestionType::MultiHop,
        ),
    ]
}

/// Fraction of expected keywords found in the answer, case-insensitively
pub fn score_answer(answer: &str, expected: &[String]) -> f64 {
    if expected.is_empty() {
        return 1.0;
    }
    let answer = answer.to_lowercase();
    let found = expected
        .iter()
        .filter(|keyword| answer.contains(&keyword.to_lowercase()))
        .count();
    found as f64 / expected.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scores_keyword_coverage() {
        let expected = vec!["biomarker".to_string(), "treat".to_string()];
        assert_eq!(score_answer("Anti-dsDNA is a Biomarker; HCQ treats SLE.", &expected), 1.0);
        assert_eq!(score_answer("Anti-dsDNA is a biomarker.", &expected), 0.5);
        assert_eq!(score_answer("Nothing relevant.", &expected), 0.0);
    }

    #[test]
    fn test_set_is_well_formed() {
        let set = get_test_set();
        assert!(!set.is_empty());
        assert!(set.iter().all(|qa| !qa.question.is_empty() && !qa.expected_answer_contains.is_empty()));
    }
}
