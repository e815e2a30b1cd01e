use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};

/// Runs of two or more word characters, matched after lowercasing
static TOKEN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\w\w+\b").expect("token pattern is a valid regex"));

/// Split text into lowercase terms
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    TOKEN_PATTERN
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// A chunk position paired with its cosine similarity to a query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredChunk {
    pub index: usize,
    pub score: f64,
}

/// L2-normalised sparse vector, entries sorted by column
#[derive(Debug, Clone, Default, PartialEq)]
struct SparseVector {
    entries: Vec<(usize, f64)>,
}

impl SparseVector {
    /// Weight raw term counts by idf and normalise to unit length
    fn weighted(counts: BTreeMap<usize, usize>, idf: &[f64]) -> Self {
        let mut entries: Vec<(usize, f64)> = counts
            .into_iter()
            .map(|(column, count)| (column, count as f64 * idf[column]))
            .collect();

        let norm = entries.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, weight) in entries.iter_mut() {
                *weight /= norm;
            }
        }

        SparseVector { entries }
    }

    fn dot(&self, other: &SparseVector) -> f64 {
        let (mut i, mut j) = (0, 0);
        let mut sum = 0.0;

        while i < self.entries.len() && j < other.entries.len() {
            let (a_col, a_w) = self.entries[i];
            let (b_col, b_w) = other.entries[j];
            match a_col.cmp(&b_col) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    sum += a_w * b_w;
                    i += 1;
                    j += 1;
                }
            }
        }

        sum
    }
}

/// Vocabulary, idf weights and one row per chunk, built together
#[derive(Debug, Clone)]
struct TfIdfModel {
    vocabulary: BTreeMap<String, usize>,
    idf: Vec<f64>,
    rows: Vec<SparseVector>,
}

impl TfIdfModel {
    fn fit<S: AsRef<str>>(chunks: &[S]) -> Self {
        let tokenized: Vec<Vec<String>> = chunks.iter().map(|c| tokenize(c.as_ref())).collect();

        // Columns follow lexicographic term order
        let vocabulary: BTreeMap<String, usize> = tokenized
            .iter()
            .flatten()
            .cloned()
            .collect::<BTreeSet<String>>()
            .into_iter()
            .enumerate()
            .map(|(column, term)| (term, column))
            .collect();

        let counts: Vec<BTreeMap<usize, usize>> = tokenized
            .iter()
            .map(|tokens| term_counts(tokens, &vocabulary))
            .collect();

        let mut document_frequency = vec![0usize; vocabulary.len()];
        for row in &counts {
            for column in row.keys() {
                document_frequency[*column] += 1;
            }
        }

        // Smoothed idf: ln((1 + n) / (1 + df)) + 1
        let n = chunks.len() as f64;
        let idf: Vec<f64> = document_frequency
            .iter()
            .map(|&df| ((1.0 + n) / (1.0 + df as f64)).ln() + 1.0)
            .collect();

        let rows = counts
            .into_iter()
            .map(|row| SparseVector::weighted(row, &idf))
            .collect();

        TfIdfModel {
            vocabulary,
            idf,
            rows,
        }
    }

    /// Project text into the vocabulary space; unseen terms are dropped
    fn project(&self, text: &str) -> SparseVector {
        let tokens = tokenize(text);
        SparseVector::weighted(term_counts(&tokens, &self.vocabulary), &self.idf)
    }
}

fn term_counts(tokens: &[String], vocabulary: &BTreeMap<String, usize>) -> BTreeMap<usize, usize> {
    let mut counts = BTreeMap::new();
    for token in tokens {
        if let Some(&column) = vocabulary.get(token) {
            *counts.entry(column).or_insert(0) += 1;
        }
    }
    counts
}

#[derive(Debug, Clone, Default)]
enum IndexState {
    #[default]
    Unset,
    Built(TfIdfModel),
}

/// Sparse TF-IDF index over an ordered chunk sequence, queried by cosine similarity
#[derive(Debug, Clone, Default)]
pub struct RetrievalIndex {
    state: IndexState,
}

impl RetrievalIndex {
    pub fn new() -> Self {
        RetrievalIndex::default()
    }

    /// Build from `chunks`, replacing any previous vocabulary and vectors.
    ///
    /// The new model is computed in full before it is swapped in. An empty
    /// chunk sequence leaves the index unset.
    pub fn build<S: AsRef<str>>(&mut self, chunks: &[S]) {
        if chunks.is_empty() {
            self.state = IndexState::Unset;
            return;
        }

        let model = TfIdfModel::fit(chunks);
        debug!(
            "Built TF-IDF index: {} chunks, {} terms",
            model.rows.len(),
            model.vocabulary.len()
        );
        self.state = IndexState::Built(model);
    }

    /// Top `top_k` chunks by cosine similarity to `text`.
    ///
    /// Ordered by descending score; equal scores put the higher chunk index
    /// first. `top_k` is clamped to the number of chunks, and an unset index
    /// yields no results.
    pub fn query(&self, text: &str, top_k: usize) -> Vec<ScoredChunk> {
        let IndexState::Built(model) = &self.state else {
            return Vec::new();
        };

        let query_vector = model.project(text);

        let mut scored: Vec<ScoredChunk> = model
            .rows
            .iter()
            .enumerate()
            .map(|(index, row)| ScoredChunk {
                index,
                score: query_vector.dot(row).clamp(0.0, 1.0),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| b.index.cmp(&a.index))
        });
        scored.truncate(top_k);

        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    impl RetrievalIndex {
        fn is_built(&self) -> bool {
            matches!(self.state, IndexState::Built(_))
        }

        fn len(&self) -> usize {
            match &self.state {
                IndexState::Unset => 0,
                IndexState::Built(model) => model.rows.len(),
            }
        }

        fn vocabulary_len(&self) -> usize {
            match &self.state {
                IndexState::Unset => 0,
                IndexState::Built(model) => model.vocabulary.len(),
            }
        }
    }

    fn pets() -> Vec<String> {
        vec![
            "The cat sat on the mat.".to_string(),
            "Dogs bark loudly at night.".to_string(),
            "Cats and dogs are common pets.".to_string(),
        ]
    }

    #[test]
    fn test_tokenize_lowercases_and_drops_single_chars() {
        assert_eq!(
            tokenize("A Cat, the MAT; x-ray!"),
            vec!["cat", "the", "mat", "ray"]
        );
        assert!(tokenize("a b c").is_empty());
    }

    #[test]
    fn test_query_before_build_is_empty() {
        let index = RetrievalIndex::new();
        assert!(!index.is_built());
        assert!(index.query("anything", 3).is_empty());
    }

    #[test]
    fn test_build_empty_leaves_index_unset() {
        let mut index = RetrievalIndex::new();
        index.build(&pets());
        assert!(index.is_built());

        let none: Vec<String> = Vec::new();
        index.build(&none);
        assert!(!index.is_built());
        assert!(index.query("cat", 3).is_empty());
    }

    #[test]
    fn test_cat_query_ranks_first_chunk() {
        let mut index = RetrievalIndex::new();
        index.build(&pets());

        let top = index.query("cat", 1);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].index, 0);
        assert!(top[0].score > 0.0);

        let all = index.query("cat", 3);
        let dogs = all.iter().find(|hit| hit.index == 1).unwrap();
        assert_eq!(dogs.score, 0.0);
    }

    #[test]
    fn test_zero_score_ties_break_by_higher_index() {
        let mut index = RetrievalIndex::new();
        index.build(&pets());

        let hits = index.query("cat", 3);
        let order: Vec<usize> = hits.iter().map(|h| h.index).collect();
        assert_eq!(order, vec![0, 2, 1]);
    }

    #[test]
    fn test_equal_scores_break_by_higher_index() {
        let mut index = RetrievalIndex::new();
        index.build(&["alpha beta", "alpha beta", "gamma delta"]);

        let hits = index.query("alpha", 2);
        assert_eq!(hits[0].index, 1);
        assert_eq!(hits[1].index, 0);
        assert_eq!(hits[0].score, hits[1].score);
    }

    #[test]
    fn test_shared_term_prefers_shorter_chunk() {
        let mut index = RetrievalIndex::new();
        index.build(&pets());

        let hits = index.query("dogs", 2);
        assert_eq!(hits[0].index, 1);
        assert_eq!(hits[1].index, 2);
        assert!(hits[0].score > hits[1].score);
        assert!(hits[1].score > 0.0);
    }

    #[test]
    fn test_top_k_clamps_and_sorts_descending() {
        let mut index = RetrievalIndex::new();
        index.build(&pets());

        let hits = index.query("the cat and the dogs", 10);
        assert_eq!(hits.len(), 3);
        for pair in hits.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn test_scores_within_unit_interval() {
        let mut index = RetrievalIndex::new();
        index.build(&["alpha beta", "gamma delta"]);

        let hits = index.query("alpha beta", 2);
        assert_eq!(hits[0].index, 0);
        assert!((hits[0].score - 1.0).abs() < 1e-9);
        assert!(hits[0].score <= 1.0);
        assert_eq!(hits[1].score, 0.0);
    }

    #[test]
    fn test_unknown_terms_score_zero() {
        let mut index = RetrievalIndex::new();
        index.build(&pets());

        for hit in index.query("zebra quantum", 3) {
            assert_eq!(hit.score, 0.0);
        }
    }

    #[test]
    fn test_rebuild_is_deterministic_and_replaces_vocabulary() {
        let mut index = RetrievalIndex::new();
        index.build(&pets());
        let first = index.query("cats dogs", 3);
        index.build(&pets());
        assert_eq!(index.query("cats dogs", 3), first);

        index.build(&["orbital mechanics"]);
        assert_eq!(index.len(), 1);
        assert_eq!(index.vocabulary_len(), 2);
        assert_eq!(index.query("cat", 1)[0].score, 0.0);
    }
}
