// expansion of encoded documents into (document, word, label) training triples

use crate::error::{Doc2TopicError, Result};

use rand::Rng;

// Training examples held as three parallel arrays of equal length.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Examples {
    pub docs: Vec<usize>,
    pub words: Vec<usize>,
    pub labels: Vec<f32>,
}

impl Examples {

    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn n_positive(&self) -> usize {
        self.labels.iter().filter(|l| **l > 0.5).count()
    }

    fn push(&mut self, doc_id: usize, word_id: usize, label: f32) {
        self.docs.push(doc_id);
        self.words.push(word_id);
        self.labels.push(label);
    }

    // Appends one positive example for every token of `token_ids`, each
    // followed by `ns_rate` negatives drawn uniformly from
    // `[1, vocab_size - 1]`. Id 0 is never drawn as a negative, and negatives
    // are not checked against the document, so a sampled word that does occur
    // in it still gets label 0.
    pub fn extend_document<R: Rng>(&mut self, doc_id: usize, token_ids: &[usize], vocab_size: usize, ns_rate: usize, rng: &mut R) -> Result<()> {

        if ns_rate > 0 && vocab_size < 2 && !token_ids.is_empty() {
            return Err(Doc2TopicError::invalid_config(format!(
                "negative sampling needs a vocabulary of at least 2 tokens, got {}", vocab_size)));
        }

        for &idx in token_ids {
            self.push(doc_id, idx, 1.0);
            for _ in 0..ns_rate {
                self.push(doc_id, rng.gen_range(1..vocab_size), 0.0);
            }
        }
        Ok(())
    }
}

// Builds the flat training set for all documents, in document then token
// order. The set is sampled once and reused verbatim for every epoch;
// negatives are not redrawn between epochs.
pub fn build_examples<R: Rng>(encoded_docs: &[Vec<usize>], vocab_size: usize, ns_rate: usize, rng: &mut R) -> Result<Examples> {

    let mut examples = Examples::new();
    for (doc_id, token_ids) in encoded_docs.iter().enumerate() {
        examples.extend_document(doc_id, token_ids, vocab_size, ns_rate, rng)?;
        if doc_id % 100 == 0 {
            log::debug!("preparing data: {}%", (doc_id + 1) * 100 / encoded_docs.len());
        }
    }
    log::info!("prepared {} training examples ({} positive)", examples.len(), examples.n_positive());
    Ok(examples)
}
