//! Term-vector similarity over context text renderings.
//!
//! The vocabulary is rebuilt from the full corpus on every query, which is
//! acceptable for the small in-memory logs this agent holds. Query terms
//! absent from the corpus vocabulary carry no weight.

use std::collections::BTreeMap;

/// Splits a context rendering into word tokens. Underscored identifiers
/// stay whole; single-character fragments are dropped as noise.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|ch: char| !(ch.is_alphanumeric() || ch == '_'))
        .filter(|token| token.chars().count() >= 2)
        .map(str::to_string)
        .collect()
}

/// Cosine similarity of the query against every corpus entry, in corpus
/// order. Returns an empty vector for an empty corpus.
#[must_use]
pub fn similarity_scores(corpus: &[String], query: &str) -> Vec<f32> {
    if corpus.is_empty() {
        return Vec::new();
    }

    let mut vocabulary: BTreeMap<String, usize> = BTreeMap::new();
    let corpus_tokens: Vec<Vec<String>> = corpus.iter().map(|text| tokenize(text)).collect();
    for tokens in &corpus_tokens {
        for token in tokens {
            let next_index = vocabulary.len();
            let _ = vocabulary.entry(token.clone()).or_insert(next_index);
        }
    }

    let query_vector = encode(&tokenize(query), &vocabulary);
    corpus_tokens
        .iter()
        .map(|tokens| cosine(&query_vector, &encode(tokens, &vocabulary)))
        .collect()
}

fn encode(tokens: &[String], vocabulary: &BTreeMap<String, usize>) -> Vec<f32> {
    let mut vector = vec![0.0_f32; vocabulary.len()];
    for token in tokens {
        if let Some(&index) = vocabulary.get(token) {
            if let Some(slot) = vector.get_mut(index) {
                *slot += 1.0;
            }
        }
    }
    vector
}

fn cosine(left: &[f32], right: &[f32]) -> f32 {
    let dot: f32 = left.iter().zip(right).map(|(a, b)| a * b).sum();
    let left_norm: f32 = left.iter().map(|a| a * a).sum::<f32>().sqrt();
    let right_norm: f32 = right.iter().map(|b| b * b).sum::<f32>().sqrt();

    if left_norm == 0.0 || right_norm == 0.0 {
        return 0.0;
    }

    dot / (left_norm * right_norm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_keeps_underscored_identifiers() {
        let tokens = tokenize("employee_count: 1792 time_constraint: normal");
        assert!(tokens.contains(&"employee_count".to_string()));
        assert!(tokens.contains(&"1792".to_string()));
        assert!(tokens.contains(&"normal".to_string()));
    }

    #[test]
    fn identical_texts_score_one() {
        let corpus = vec!["employee_count: 500 budget_limit: 100000".to_string()];
        let scores = similarity_scores(&corpus, "employee_count: 500 budget_limit: 100000");
        assert_eq!(scores.len(), 1);
        assert!((scores[0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn disjoint_texts_score_zero() {
        let corpus = vec!["alpha beta gamma".to_string()];
        let scores = similarity_scores(&corpus, "delta epsilon");
        assert_eq!(scores[0], 0.0);
    }

    #[test]
    fn closer_context_ranks_higher() {
        let corpus = vec![
            "employee_count: 1792 time_constraint: normal quality: high".to_string(),
            "employee_count: 40 time_constraint: urgent quality: low".to_string(),
        ];
        let scores =
            similarity_scores(&corpus, "employee_count: 1792 time_constraint: normal quality: high");
        assert!(scores[0] > scores[1]);
    }

    #[test]
    fn empty_corpus_yields_no_scores() {
        assert!(similarity_scores(&[], "anything").is_empty());
    }
}
