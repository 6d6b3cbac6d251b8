//! Lexical text-quality measures: ROUGE-1, ROUGE-L and character BLEU
//!
//! ROUGE follows the rouge-score package conventions (lowercase, only
//! `[a-z0-9]` runs survive, tokens longer than three characters are stemmed).
//! The stemmer is Snowball English (Porter2) from `rust-stemmers`, not the
//! original Porter algorithm NLTK ships, so a few stems differ and ROUGE can
//! move slightly on such words.
//! BLEU is sentence BLEU over individual characters with uniform 4-gram
//! weights and epsilon smoothing, matching NLTK's `SmoothingFunction().method1`.

use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::OnceLock;

const BLEU_MAX_N: usize = 4;
const BLEU_EPSILON: f64 = 0.1;

/// Precision, recall and F-measure of one ROUGE variant
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RougeScore {
    pub precision: f64,
    pub recall: f64,
    pub fmeasure: f64,
}

impl RougeScore {
    fn from_counts(overlap: usize, prediction_len: usize, reference_len: usize) -> Self {
        if prediction_len == 0 || reference_len == 0 {
            return Self::default();
        }
        let precision = overlap as f64 / prediction_len as f64;
        let recall = overlap as f64 / reference_len as f64;
        Self {
            precision,
            recall,
            fmeasure: f_measure(precision, recall),
        }
    }
}

fn f_measure(precision: f64, recall: f64) -> f64 {
    if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    }
}

fn non_alphanumeric() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-z0-9]+").expect("static regex"))
}

fn stemmer() -> &'static Stemmer {
    static STEMMER: OnceLock<Stemmer> = OnceLock::new();
    STEMMER.get_or_init(|| Stemmer::create(Algorithm::English))
}

/// Tokenize the way ROUGE expects: lowercase, split on anything outside
/// `[a-z0-9]`, stem tokens longer than three characters
pub fn rouge_tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let cleaned = non_alphanumeric().replace_all(&lowered, " ");

    cleaned
        .split_whitespace()
        .map(|token| {
            if token.len() > 3 {
                stemmer().stem(token).into_owned()
            } else {
                token.to_string()
            }
        })
        .filter(|token| !token.is_empty())
        .collect()
}

/// ROUGE-1: clipped unigram overlap
pub fn rouge_1(reference: &str, prediction: &str) -> RougeScore {
    let reference = rouge_tokenize(reference);
    let prediction = rouge_tokenize(prediction);

    let ref_counts = count_ngrams(&reference, 1);
    let pred_counts = count_ngrams(&prediction, 1);

    let overlap = pred_counts
        .iter()
        .map(|(gram, &count)| count.min(ref_counts.get(gram).copied().unwrap_or(0)))
        .sum();

    RougeScore::from_counts(overlap, prediction.len(), reference.len())
}

/// ROUGE-L: longest common subsequence of tokens
pub fn rouge_l(reference: &str, prediction: &str) -> RougeScore {
    let reference = rouge_tokenize(reference);
    let prediction = rouge_tokenize(prediction);

    let lcs = lcs_length(&reference, &prediction);
    RougeScore::from_counts(lcs, prediction.len(), reference.len())
}

/// Length of the longest common subsequence, two-row dynamic programming
fn lcs_length<T: PartialEq>(a: &[T], b: &[T]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];

    for x in a {
        for (j, y) in b.iter().enumerate() {
            curr[j + 1] = if x == y {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Count n-grams of a token sequence
fn count_ngrams<T: Eq + Hash>(tokens: &[T], n: usize) -> HashMap<&[T], usize> {
    let mut counts = HashMap::new();
    if n > 0 && tokens.len() >= n {
        for window in tokens.windows(n) {
            *counts.entry(window).or_insert(0) += 1;
        }
    }
    counts
}

/// Sentence BLEU over characters.
///
/// Each order's clipped precision whose numerator is zero is replaced by
/// `0.1 / denominator`; a hypothesis with no matching character scores 0.
/// The brevity penalty is `exp(1 - r/c)` when the hypothesis is shorter.
pub fn char_bleu(reference: &str, prediction: &str) -> f64 {
    let reference: Vec<char> = reference.chars().collect();
    let hypothesis: Vec<char> = prediction.chars().collect();

    let mut log_sum = 0.0;
    let weight = 1.0 / BLEU_MAX_N as f64;

    for n in 1..=BLEU_MAX_N {
        let hyp_counts = count_ngrams(&hypothesis, n);
        let ref_counts = count_ngrams(&reference, n);

        let clipped: usize = hyp_counts
            .iter()
            .map(|(gram, &count)| count.min(ref_counts.get(gram).copied().unwrap_or(0)))
            .sum();
        let denominator = hyp_counts.values().sum::<usize>().max(1);

        if n == 1 && clipped == 0 {
            return 0.0;
        }

        let precision = if clipped == 0 {
            BLEU_EPSILON / denominator as f64
        } else {
            clipped as f64 / denominator as f64
        };
        log_sum += weight * precision.ln();
    }

    brevity_penalty(reference.len(), hypothesis.len()) * log_sum.exp()
}

fn brevity_penalty(reference_len: usize, hypothesis_len: usize) -> f64 {
    if hypothesis_len > reference_len {
        1.0
    } else if hypothesis_len == 0 {
        0.0
    } else {
        (1.0 - reference_len as f64 / hypothesis_len as f64).exp()
    }
}
