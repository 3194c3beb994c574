//! BM25 (Okapi) lexical index over chunk tokens.
//!
//! Tokenization is deliberately simple: lower-case, split on whitespace.
//! Queries are tokenized the same way and each query token contributes once
//! per occurrence.
//!
//! # Scoring
//!
//! ```text
//! idf(t)      = ln((N - n(t) + 0.5) / (n(t) + 0.5))
//! score(d, q) = Σ idf(t) · f(t,d)·(k1 + 1) / (f(t,d) + k1·(1 - b + b·|d|/avgdl))
//! ```
//!
//! Terms present in more than half the chunks get a negative raw IDF; those
//! are floored to `EPSILON × mean IDF` so common terms still count a little.

use std::cmp::Ordering;
use std::collections::HashMap;

const K1: f64 = 1.5;
const B: f64 = 0.75;
const EPSILON: f64 = 0.25;

/// Lower-case whitespace tokenizer shared by indexing and querying.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// In-memory BM25 index. Positions refer to the order chunks were indexed in.
#[derive(Debug, Clone, Default)]
pub struct LexicalIndex {
    term_freqs: Vec<HashMap<String, usize>>,
    doc_lens: Vec<usize>,
    avgdl: f64,
    idf: HashMap<String, f64>,
}

impl LexicalIndex {
    /// Build the index from chunk texts.
    pub fn build<S: AsRef<str>>(texts: &[S]) -> Self {
        let mut term_freqs = Vec::with_capacity(texts.len());
        let mut doc_lens = Vec::with_capacity(texts.len());
        let mut doc_freq: HashMap<String, usize> = HashMap::new();

        for text in texts {
            let tokens = tokenize(text.as_ref());
            doc_lens.push(tokens.len());
            let mut tf: HashMap<String, usize> = HashMap::new();
            for tok in tokens {
                *tf.entry(tok).or_insert(0) += 1;
            }
            for term in tf.keys() {
                *doc_freq.entry(term.clone()).or_insert(0) += 1;
            }
            term_freqs.push(tf);
        }

        let n = texts.len() as f64;
        let total_len: usize = doc_lens.iter().sum();
        let avgdl = if texts.is_empty() {
            0.0
        } else {
            total_len as f64 / n
        };

        let mut idf: HashMap<String, f64> = HashMap::with_capacity(doc_freq.len());
        let mut idf_sum = 0.0;
        let mut negative = Vec::new();
        for (term, freq) in &doc_freq {
            let f = *freq as f64;
            let value = (n - f + 0.5).ln() - (f + 0.5).ln();
            idf_sum += value;
            if value < 0.0 {
                negative.push(term.clone());
            }
            idf.insert(term.clone(), value);
        }
        if !idf.is_empty() {
            let floor = EPSILON * idf_sum / idf.len() as f64;
            for term in negative {
                idf.insert(term, floor);
            }
        }

        Self {
            term_freqs,
            doc_lens,
            avgdl,
            idf,
        }
    }

    pub fn len(&self) -> usize {
        self.doc_lens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc_lens.is_empty()
    }

    /// BM25 score of every indexed chunk for `query`, in index order.
    pub fn scores(&self, query: &str) -> Vec<f64> {
        let mut scores = vec![0.0; self.len()];
        if self.avgdl <= 0.0 {
            return scores;
        }

        for term in tokenize(query) {
            let idf = match self.idf.get(&term) {
                Some(v) => *v,
                None => continue,
            };
            for (i, tf) in self.term_freqs.iter().enumerate() {
                let f = tf.get(&term).copied().unwrap_or(0) as f64;
                if f == 0.0 {
                    continue;
                }
                let norm = 1.0 - B + B * self.doc_lens[i] as f64 / self.avgdl;
                scores[i] += idf * (f * (K1 + 1.0)) / (f + K1 * norm);
            }
        }

        scores
    }

    /// Top `k` chunk positions by score, ties broken by ascending position.
    ///
    /// Every chunk is a candidate, including zero scorers, so the result
    /// length is `min(k, len)`.
    pub fn top_k(&self, query: &str, k: usize) -> Vec<(usize, f64)> {
        let mut ranked: Vec<(usize, f64)> = self.scores(query).into_iter().enumerate().collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        ranked.truncate(k);
        ranked
    }
}
