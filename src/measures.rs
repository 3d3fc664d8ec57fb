// topic quality measures computed from learned embeddings, without ground truth.
// undefined measures are NaN and the aggregates skip NaN inputs

use crate::counts::CorpusCounts;
use crate::vocab::{FrequencyTable, Vocabulary};

use std::collections::HashSet;
use ndarray::prelude::*;
use rand::Rng;
use rand::seq::IteratorRandom;

// Per topic, `(normalized weight, word id)` in descending weight order.
pub type TopicWords = Vec<Vec<(f32, usize)>>;

pub fn l1(x: &ArrayView1<f32>) -> f32 {
    x.iter().map(|v| v.abs()).sum()
}

pub fn l2(x: &ArrayView1<f32>) -> f32 {
    x.iter().map(|v| v * v).sum::<f32>().sqrt()
}

// `None` for a zero vector.
pub fn l1_normalize(x: &ArrayView1<f32>) -> Option<Array1<f32>> {
    let norm = l1(x);
    if norm > 0.0 { Some(x.mapv(|v| v / norm)) } else { None }
}

// Mean of the non-NaN values, NaN when there are none.
pub fn nan_mean(values: impl IntoIterator<Item = f32>) -> f32 {
    let (sum, n) = values.into_iter()
        .filter(|v| !v.is_nan())
        .fold((0.0f64, 0usize), |(s, n), v| (s + v as f64, n + 1));
    if n == 0 { f32::NAN } else { (sum / n as f64) as f32 }
}

// all rows in order when the sample covers the matrix, otherwise a sorted random subset
fn sample_rows<R: Rng>(n_rows: usize, n: usize, rng: &mut R) -> Vec<usize> {
    if n >= n_rows {
        return (0..n_rows).collect();
    }
    let mut rows = (0..n_rows).choose_multiple(rng, n);
    rows.sort_unstable();
    rows
}

// ‖row‖₂ / ‖row‖₁, in (0, 1] for non-zero rows.
pub fn l2_l1_ratio(row: &ArrayView1<f32>) -> f32 {
    let norm1 = l1(row);
    if norm1 > 0.0 { l2(row) / norm1 } else { f32::NAN }
}

// Fraction of dimensions of the L1-normalized row above `threshold / n_dims`.
pub fn peak_fraction(row: &ArrayView1<f32>, threshold: f32) -> f32 {
    let n_dims = row.len();
    match l1_normalize(row) {
        Some(normed) if n_dims > 0 => {
            let cut = threshold / n_dims as f32;
            normed.iter().filter(|v| **v > cut).count() as f32 / n_dims as f32
        },
        _ => f32::NAN
    }
}

// Mean L2/L1 ratio over a sample of `n` document rows. Lower is sparser.
pub fn sparsity<R: Rng>(docvecs: &Array2<f32>, n: usize, rng: &mut R) -> f32 {
    let rows = sample_rows(docvecs.nrows(), n, rng);
    nan_mean(rows.iter().map(|i| l2_l1_ratio(&docvecs.row(*i))))
}

// Mean share of topics receiving more than `threshold` times the uniform
// weight, over a sample of `n` document rows.
pub fn peak_rate<R: Rng>(docvecs: &Array2<f32>, threshold: f32, n: usize, rng: &mut R) -> f32 {
    let rows = sample_rows(docvecs.nrows(), n, rng);
    nan_mean(rows.iter().map(|i| peak_fraction(&docvecs.row(*i), threshold)))
}

// Ranks words within each topic column by L1-normalized weight and keeps
// the `top_n + stop_ids.len()` best, then drops the ids in `stop_ids`.
// Stop ids are removed after ranking, so they still take up ranking slots.
// A topic with zero mass gets no words.
pub fn get_topic_words(wordvecs: &Array2<f32>, top_n: usize, stop_ids: &HashSet<usize>) -> TopicWords {

    let keep = top_n + stop_ids.len();
    wordvecs.axis_iter(Axis(1)).map(|column| {
        let normed = match l1_normalize(&column) {
            Some(normed) => normed,
            None => return Vec::new()
        };
        let mut indexed: Vec<(f32, usize)> = normed.iter().copied().zip(0..).collect();
        // descending score, ties by id
        indexed.sort_by(|(s, i), (t, j)| t.total_cmp(s).then(i.cmp(j)));
        indexed.truncate(keep);
        indexed.retain(|(_, i)| !stop_ids.contains(i));
        indexed
    }).collect()
}

fn word_set(words: &[(f32, usize)]) -> HashSet<usize> {
    words.iter().map(|(_, i)| *i).collect()
}

// Mean Jaccard overlap of the word sets of all topic pairs. Lower means
// more distinct topics.
pub fn topic_overlap(topic_words: &TopicWords) -> f32 {
    let sets: Vec<HashSet<usize>> = topic_words.iter().map(|w| word_set(w)).collect();
    let mut overlaps = Vec::new();
    for (i, a) in sets.iter().enumerate() {
        for b in sets.iter().skip(i + 1) {
            let union = a.union(b).count();
            if union == 0 {
                overlaps.push(f32::NAN);
            } else {
                overlaps.push(a.intersection(b).count() as f32 / union as f32);
            }
        }
    }
    nan_mean(overlaps)
}

// The `n` most frequent vocabulary ids, ties by id, excluding `stop_ids`.
pub fn most_frequent_words(vocab: &Vocabulary, freqs: &FrequencyTable, n: usize, stop_ids: &HashSet<usize>) -> Vec<usize> {
    let mut ids: Vec<(u64, usize)> = vocab.tokens().iter().enumerate()
        .filter(|(i, _)| !stop_ids.contains(i))
        .map(|(i, t)| (freqs.get(t).copied().unwrap_or(0), i))
        .collect();
    ids.sort_by(|(c, i), (d, j)| d.cmp(c).then(i.cmp(j)));
    ids.into_iter().take(n).map(|(_, i)| i).collect()
}

// Precision: mean share of each topic's words found among the
// `n_freq_words` most frequent words. Recall: share of those frequent words
// covered by the union of all topics' words.
pub fn topic_prec_recall(topic_words: &TopicWords, vocab: &Vocabulary, freqs: &FrequencyTable, stop_ids: &HashSet<usize>, n_freq_words: usize) -> (f32, f32) {

    let frequent: HashSet<usize> = most_frequent_words(vocab, freqs, n_freq_words, stop_ids).into_iter().collect();

    let precision = nan_mean(topic_words.iter().map(|words| {
        if words.is_empty() { return f32::NAN }
        words.iter().filter(|(_, i)| frequent.contains(i)).count() as f32 / words.len() as f32
    }));

    let covered: HashSet<usize> = topic_words.iter().flat_map(|w| word_set(w)).collect();
    let recall = if frequent.is_empty() {
        f32::NAN
    } else {
        frequent.intersection(&covered).count() as f32 / frequent.len() as f32
    };

    (precision, recall)
}

fn share_of_topic_words(topic_words: &TopicWords, vocab: &Vocabulary, pred: impl Fn(&str) -> bool) -> f32 {
    let tokens: Vec<&str> = topic_words.iter().flatten().filter_map(|(_, i)| vocab.token(*i)).collect();
    if tokens.is_empty() { return f32::NAN }
    tokens.iter().filter(|t| pred(t)).count() as f32 / tokens.len() as f32
}

// Share of topic words made of alphabetic characters only.
pub fn topic_wordiness(topic_words: &TopicWords, vocab: &Vocabulary) -> f32 {
    share_of_topic_words(topic_words, vocab, |t| !t.is_empty() && t.chars().all(char::is_alphabetic))
}

// Share of topic words found in `stopwords`.
pub fn topic_stopwordiness(topic_words: &TopicWords, vocab: &Vocabulary, stopwords: &HashSet<String>) -> f32 {
    share_of_topic_words(topic_words, vocab, |t| stopwords.contains(t))
}

// log(P(w1, w2) / (P(w1) P(w2))) with corpus-relative frequencies. A pair
// never seen together counts as seen once. `None` when either word is
// unseen or there are no pair statistics.
pub fn pmi(w1: &str, w2: &str, counts: &CorpusCounts) -> Option<f32> {
    let (c1, c2) = (counts.count(w1), counts.count(w2));
    let (n_tokens, n_pairs) = (counts.total_tokens(), counts.total_pairs());
    if c1 == 0 || c2 == 0 || n_tokens == 0 || n_pairs == 0 {
        return None;
    }
    let p1 = c1 as f64 / n_tokens as f64;
    let p2 = c2 as f64 / n_tokens as f64;
    let p12 = counts.cooc(w1, w2).max(1) as f64 / n_pairs as f64;
    Some((p12 / (p1 * p2)).ln() as f32)
}

// Mean PMI over all pairs of the topic's words, leaving out blacklisted and
// unseen words. NaN with fewer than two usable words.
pub fn pmi_coherence(words: &[&str], counts: &CorpusCounts, blacklist: &HashSet<String>) -> f32 {
    let usable: Vec<&str> = words.iter().copied()
        .filter(|w| !blacklist.contains(*w) && counts.count(w) > 0)
        .collect();
    if usable.len() < 2 {
        return f32::NAN;
    }
    let mut scores = Vec::new();
    for (i, w1) in usable.iter().enumerate() {
        for w2 in usable.iter().skip(i + 1) {
            scores.push(pmi(w1, w2, counts).unwrap_or(f32::NAN));
        }
    }
    nan_mean(scores)
}


// Everything the measures read besides the embeddings, passed explicitly.
pub struct Evaluator<'a> {
    pub vocab: &'a Vocabulary,
    pub freqs: &'a FrequencyTable,
    pub counts: &'a CorpusCounts,
    pub stopwords: &'a HashSet<String>,
}

// All measures of one evaluation pass.
#[derive(Clone, Debug, PartialEq)]
pub struct Evaluation {
    pub doc_sparsity: f32,
    pub doc_peakiness: f32,
    pub topic_words: TopicWords,
    pub overlap: f32,
    pub precision: f32,
    pub recall: f32,
    pub wordiness: f32,
    pub stopwordiness: f32,
    pub coherences: Vec<f32>,
    pub mean_coherence: f32,
}

impl<'a> Evaluator<'a> {

    pub fn new(vocab: &'a Vocabulary, freqs: &'a FrequencyTable, counts: &'a CorpusCounts, stopwords: &'a HashSet<String>) -> Self {
        Self { vocab, freqs, counts, stopwords }
    }

    pub fn topic_tokens(&self, words: &[(f32, usize)]) -> Vec<&'a str> {
        words.iter().filter_map(|(_, i)| self.vocab.token(*i)).collect()
    }

    pub fn evaluate<R: Rng>(&self, docvecs: &Array2<f32>, wordvecs: &Array2<f32>, top_n: usize, n_freq_words: usize, sample: usize, peak_threshold: f32, rng: &mut R) -> Evaluation {

        let no_stop_ids = HashSet::new();
        let topic_words = get_topic_words(wordvecs, top_n, &no_stop_ids);
        let (precision, recall) = topic_prec_recall(&topic_words, self.vocab, self.freqs, &no_stop_ids, n_freq_words);
        let coherences: Vec<f32> = topic_words.iter()
            .map(|words| pmi_coherence(&self.topic_tokens(words), self.counts, self.stopwords))
            .collect();

        Evaluation {
            doc_sparsity: sparsity(docvecs, sample, rng),
            doc_peakiness: peak_rate(docvecs, peak_threshold, sample, rng),
            overlap: topic_overlap(&topic_words),
            precision,
            recall,
            wordiness: topic_wordiness(&topic_words, self.vocab),
            stopwordiness: topic_stopwordiness(&topic_words, self.vocab, self.stopwords),
            mean_coherence: nan_mean(coherences.iter().copied()),
            coherences,
            topic_words,
        }
    }
}


#[cfg(test)]
mod tests {

    use super::*;
    use crate::counts::PairCounts;
    use crate::vocab::{Corpus, Tokenizer};
    use ndarray::array;
    use rand::{rngs::StdRng, SeedableRng};

    fn vocab_of(tokens: &[&str]) -> Vocabulary {
        let mut vocab = Vocabulary::new();
        for t in tokens {
            vocab.insert_or_get(t);
        }
        vocab
    }

    #[test]
    fn topic_word_ranking_picks_heaviest_word() {
        let vocab = vocab_of(&["x", "y", "z"]);
        let wordvecs = array![[0.8f32, 0.0], [0.1, 0.5], [0.1, 0.5]];
        let topic_words = get_topic_words(&wordvecs, 1, &HashSet::new());

        assert_eq!(topic_words[0].len(), 1);
        assert_eq!(vocab.token(topic_words[0][0].1), Some("x"));
        assert!((topic_words[0][0].0 - 0.8).abs() < 1e-6);
        // tie broken by id
        assert_eq!(topic_words[1][0].1, 1);
    }

    #[test]
    fn stop_ids_use_ranking_slots() {
        let wordvecs = array![[0.5f32], [0.3], [0.2], [0.0]];
        let stop: HashSet<usize> = [0].into_iter().collect();
        let topic_words = get_topic_words(&wordvecs, 2, &stop);
        // top 3 taken, then id 0 dropped
        assert_eq!(topic_words[0].iter().map(|(_, i)| *i).collect::<Vec<_>>(), vec![1, 2]);

        let stop: HashSet<usize> = [3].into_iter().collect();
        let topic_words = get_topic_words(&wordvecs, 2, &stop);
        assert_eq!(topic_words[0].iter().map(|(_, i)| *i).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn zero_mass_topic_has_no_words() {
        let wordvecs = array![[0.0f32, 1.0], [0.0, 2.0]];
        let topic_words = get_topic_words(&wordvecs, 5, &HashSet::new());
        assert!(topic_words[0].is_empty());
        assert_eq!(topic_words[1].len(), 2);
    }

    #[test]
    fn sparsity_bounds() {
        let mut rng = StdRng::seed_from_u64(0);
        let docvecs = array![[1.0f32, 0.0, 0.0, 0.0], [0.25, 0.25, 0.25, 0.25], [0.0, 0.0, 0.0, 0.0]];

        assert!((l2_l1_ratio(&docvecs.row(0)) - 1.0).abs() < 1e-6);
        assert!((l2_l1_ratio(&docvecs.row(1)) - 0.5).abs() < 1e-6);
        assert!(l2_l1_ratio(&docvecs.row(2)).is_nan());

        // zero row skipped
        assert!((sparsity(&docvecs, 1000, &mut rng) - 0.75).abs() < 1e-6);
    }

    #[test]
    fn peak_rate_counts_dominant_topics() {
        let mut rng = StdRng::seed_from_u64(0);
        let docvecs = array![[0.7f32, 0.1, 0.1, 0.1], [0.25, 0.25, 0.25, 0.25]];

        // cut at 2/4 = 0.5
        assert!((peak_fraction(&docvecs.row(0), 2.0) - 0.25).abs() < 1e-6);
        assert_eq!(peak_fraction(&docvecs.row(1), 2.0), 0.0);
        assert!((peak_rate(&docvecs, 2.0, 10, &mut rng) - 0.125).abs() < 1e-6);
        assert!(peak_fraction(&array![0.0f32, 0.0].view(), 2.0).is_nan());
    }

    #[test]
    fn sampled_rows_are_distinct() {
        let mut rng = StdRng::seed_from_u64(3);
        let rows = sample_rows(50, 10, &mut rng);
        assert_eq!(rows.len(), 10);
        assert_eq!(rows.iter().collect::<HashSet<_>>().len(), 10);
        assert!(rows.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn overlap_of_identical_and_disjoint_topics() {
        let same: TopicWords = vec![vec![(0.5, 0), (0.5, 1)], vec![(0.5, 1), (0.5, 0)]];
        assert!((topic_overlap(&same) - 1.0).abs() < 1e-6);

        let disjoint: TopicWords = vec![vec![(1.0, 0)], vec![(1.0, 1)], vec![(1.0, 2)]];
        assert_eq!(topic_overlap(&disjoint), 0.0);

        let half: TopicWords = vec![vec![(0.5, 0), (0.5, 1)], vec![(0.5, 1), (0.5, 2)]];
        assert!((topic_overlap(&half) - 1.0 / 3.0).abs() < 1e-6);

        assert!(topic_overlap(&vec![vec![(1.0, 0)]]).is_nan());
    }

    #[test]
    fn precision_and_recall() {
        let vocab = vocab_of(&["a", "b", "c", "d"]);
        let freqs: FrequencyTable = [("a", 10), ("b", 8), ("c", 1), ("d", 5)]
            .iter().map(|(t, c)| (t.to_string(), *c)).collect();

        // frequent set: a, b
        let topic_words: TopicWords = vec![vec![(0.5, 0), (0.5, 2)], vec![(1.0, 2)], vec![]];
        let (precision, recall) = topic_prec_recall(&topic_words, &vocab, &freqs, &HashSet::new(), 2);
        assert!((precision - 0.25).abs() < 1e-6);
        assert!((recall - 0.5).abs() < 1e-6);

        assert_eq!(most_frequent_words(&vocab, &freqs, 3, &[0].into_iter().collect()), vec![1, 3, 2]);
    }

    #[test]
    fn wordiness_and_stopwordiness() {
        let vocab = vocab_of(&["talo", "2019", "ja", ",", "äiti"]);
        let topic_words: TopicWords = vec![vec![(0.4, 0), (0.3, 1), (0.3, 2)], vec![(0.5, 3), (0.5, 4)]];
        let stopwords: HashSet<String> = ["ja".to_string()].into_iter().collect();

        assert!((topic_wordiness(&topic_words, &vocab) - 0.6).abs() < 1e-6);
        assert!((topic_stopwordiness(&topic_words, &vocab, &stopwords) - 0.2).abs() < 1e-6);
        assert!(topic_wordiness(&vec![vec![]], &vocab).is_nan());
    }

    // a and b only ever occur together, c and d co-occur exactly at chance rate
    fn synthetic_counts() -> CorpusCounts {
        let freqs: FrequencyTable = [("a", 10), ("b", 10), ("c", 100), ("d", 100), ("x", 390), ("y", 390)]
            .iter().map(|(t, c)| (t.to_string(), *c)).collect();
        let mut pairs = PairCounts::new();
        pairs.add("a", "b", 10);
        pairs.add("c", "d", 10);
        pairs.add("x", "y", 980);
        CorpusCounts::new(freqs, pairs)
    }

    #[test]
    fn pmi_prefers_words_that_always_co_occur() {
        let counts = synthetic_counts();
        let together = pmi("a", "b", &counts).unwrap();
        let chance = pmi("c", "d", &counts).unwrap();

        assert!(together > 0.0);
        assert!(together > chance);
        assert!(chance.abs() < 1e-5);
        assert!((together - 100f32.ln()).abs() < 1e-4);
        assert_eq!(pmi("a", "unseen", &counts), None);
    }

    #[test]
    fn coherence_skips_blacklist_and_needs_two_words() {
        let counts = synthetic_counts();
        let blacklist: HashSet<String> = ["c".to_string()].into_iter().collect();

        let coherent = pmi_coherence(&["a", "b", "c"], &counts, &blacklist);
        assert!((coherent - 100f32.ln()).abs() < 1e-4);
        assert!(pmi_coherence(&["a", "c"], &counts, &blacklist).is_nan());
        assert!(pmi_coherence(&[], &counts, &blacklist).is_nan());
    }

    #[test]
    fn nan_mean_skips_nan() {
        assert_eq!(nan_mean(vec![1.0, f32::NAN, 3.0]), 2.0);
        assert!(nan_mean(vec![f32::NAN]).is_nan());
        assert!(nan_mean(Vec::new()).is_nan());
    }

    #[test]
    fn evaluate_toy_model() {
        let docs: Vec<Vec<String>> = ["kissa koira kissa", "auto tie auto", "kissa koira", "tie auto"]
            .iter().map(|l| Corpus::tokenize(l)).collect();
        let (freqs, vocab) = Corpus::build_vocab(&docs, 0);
        let counts = CorpusCounts::count_words(&docs, 2, 1).unwrap();
        let stopwords = HashSet::new();
        let evaluator = Evaluator::new(&vocab, &freqs, &counts, &stopwords);

        // topic 0 = animals, topic 1 = traffic
        let wordvecs = array![[0.9f32, 0.0], [0.8, 0.0], [0.0, 0.9], [0.0, 0.7]];
        let docvecs = array![[1.0f32, 0.0], [0.0, 1.0], [0.9, 0.1], [0.2, 0.8]];
        let mut rng = StdRng::seed_from_u64(0);
        let eval = evaluator.evaluate(&docvecs, &wordvecs, 2, 4, 100, 2.0, &mut rng);

        assert_eq!(evaluator.topic_tokens(&eval.topic_words[0]), vec!["kissa", "koira"]);
        assert_eq!(evaluator.topic_tokens(&eval.topic_words[1]), vec!["auto", "tie"]);
        assert_eq!(eval.overlap, 0.0);
        assert_eq!(eval.recall, 1.0);
        assert_eq!(eval.wordiness, 1.0);
        assert_eq!(eval.stopwordiness, 0.0);
        assert!(eval.mean_coherence > 0.0);
        assert!(eval.doc_sparsity > 0.0 && eval.doc_sparsity <= 1.0);
        assert!((0.0..=1.0).contains(&eval.doc_peakiness));
    }
}
