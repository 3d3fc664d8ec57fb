
use crate::config::files_handling::{self, ReadFile, SaveFile};
use crate::config::Params;
use crate::error::{Doc2TopicError, Result};

use ndarray::prelude::*;
use ndarray::Array;
use ndarray_rand::RandomExt;
use ndarray_rand::rand_distr::Uniform;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Serialize, Deserialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::ops::{AddAssign, Range};
use std::path::{Path, PathBuf};
use std::time::Instant;
use flate2::{Compression, read::GzDecoder, write::GzEncoder};
use log::{debug, info};


/// Loss and F1 (threshold 0.5) averaged over the last epoch of a `fit` call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrainingStats {
    pub epoch: usize,
    pub loss: f32,
    pub f1: f32,
}

/// A trainable scoring function of (document, word) pairs that exposes one
/// topic vector per document and per word.
pub trait TopicModel {

    /// Trains on the given examples for every epoch in `epochs`, continuing
    /// from the current weights and optimizer state.
    fn fit(&mut self, docs: &[usize], words: &[usize], labels: &[f32], batch_size: usize, epochs: Range<usize>) -> Result<TrainingStats>;

    /// n_docs x n_topics
    fn document_embeddings(&self) -> Array2<f32>;

    /// vocab_size x n_topics, with negative weights floored to zero when `clip_negative` is set
    fn word_embeddings(&self, clip_negative: bool) -> Array2<f32>;

    fn n_topics(&self) -> usize;

    /// Persists the trainable state, returning the written path.
    fn save_checkpoint(&self, output_dir: &str, file_name: &str) -> Result<PathBuf>;
}


/// Document and word topic embeddings scored as `sigmoid(d . w + b)`, trained
/// with binary cross-entropy plus L1 penalties on both embeddings and AdaGrad.
/// Document vectors are projected back onto the non-negative orthant after
/// every update.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Doc2Topic {
    w_docs: Array2<f32>,
    w_words: Array2<f32>,
    bias: f32,
    ag_docs: Array2<f32>,
    ag_words: Array2<f32>,
    ag_bias: f32,
    l1_doc: f32,
    l1_word: f32,
    learning_rate: f32,
    seed: u64,
    epochs_done: usize,
}

struct EpochProgress {
    loss_sum: f64,
    true_pos: usize,
    false_pos: usize,
    false_neg: usize,
    n_examples: usize,
}

impl EpochProgress {

    fn new() -> Self {
        Self { loss_sum: 0.0, true_pos: 0, false_pos: 0, false_neg: 0, n_examples: 0 }
    }

    fn add(&mut self, pred: f32, label: f32) {
        let p = pred.clamp(1e-7, 1.0 - 1e-7);
        self.loss_sum -= (label * p.ln() + (1.0 - label) * (1.0 - p).ln()) as f64;
        self.n_examples += 1;
        match (pred > 0.5, label > 0.5) {
            (true, true) => self.true_pos += 1,
            (true, false) => self.false_pos += 1,
            (false, true) => self.false_neg += 1,
            (false, false) => {}
        }
    }

    fn loss(&self) -> f32 {
        if self.n_examples == 0 { return f32::NAN }
        (self.loss_sum / self.n_examples as f64) as f32
    }

    fn f1(&self) -> f32 {
        let denom = 2 * self.true_pos + self.false_pos + self.false_neg;
        if denom == 0 { return f32::NAN }
        (2 * self.true_pos) as f32 / denom as f32
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

// subgradient of |x|, zero at zero
fn l1_grad(x: f32) -> f32 {
    if x > 0.0 { 1.0 } else if x < 0.0 { -1.0 } else { 0.0 }
}

impl Doc2Topic {

    pub fn new(n_docs: usize, vocab_size: usize, n_topics: usize, l1_doc: f32, l1_word: f32, learning_rate: f32, seed: u64) -> Doc2Topic {

        let mut rng = StdRng::seed_from_u64(seed);
        Self {
            w_docs: Array::random_using((n_docs, n_topics), Uniform::new(0.0, 1.0), &mut rng) / n_topics as f32,
            w_words: Array::random_using((vocab_size, n_topics), Uniform::new(-0.5, 0.5), &mut rng) / n_topics as f32,
            bias: 0.0,
            ag_docs: Array2::from_elem((n_docs, n_topics), 1.0), // init to 1.0 makes the initial eta equal to inital learning rate
            ag_words: Array2::from_elem((vocab_size, n_topics), 1.0),
            ag_bias: 1.0,
            l1_doc,
            l1_word,
            learning_rate,
            seed,
            epochs_done: 0,
        }
    }

    pub fn from_params(n_docs: usize, vocab_size: usize, params: &Params) -> Doc2Topic {
        Doc2Topic::new(n_docs, vocab_size, params.n_topics, params.l1_doc, params.l1_word, params.learning_rate, params.seed)
    }

    pub fn epochs_done(&self) -> usize {
        self.epochs_done
    }

    pub fn n_docs(&self) -> usize {
        self.w_docs.nrows()
    }

    pub fn vocab_size(&self) -> usize {
        self.w_words.nrows()
    }

    /// Predicted probability that `word` occurs in `doc`.
    pub fn predict(&self, doc: usize, word: usize) -> Option<f32> {
        if doc >= self.n_docs() || word >= self.vocab_size() {
            return None;
        }
        Some(sigmoid(self.w_docs.row(doc).dot(&self.w_words.row(word)) + self.bias))
    }

    pub fn load(file_path: &Path) -> Result<Doc2Topic> {
        files_handling::read_input::<Doc2Topic>(file_path)
    }

    fn check_examples(&self, docs: &[usize], words: &[usize], labels: &[f32]) -> Result<()> {
        if docs.len() != words.len() || docs.len() != labels.len() {
            return Err(Doc2TopicError::Shape(format!(
                "example arrays differ in length: {} docs, {} words, {} labels", docs.len(), words.len(), labels.len())));
        }
        if let Some(d) = docs.iter().find(|d| **d >= self.n_docs()) {
            return Err(Doc2TopicError::Shape(format!("document id {} out of range for {} documents", d, self.n_docs())));
        }
        if let Some(w) = words.iter().find(|w| **w >= self.vocab_size()) {
            return Err(Doc2TopicError::Shape(format!("word id {} out of range for vocabulary of {}", w, self.vocab_size())));
        }
        Ok(())
    }

    fn do_training_batch(&mut self,
           ds: &[usize],
           ws: &[usize],
           ys: &[f32],
           progress: &mut EpochProgress,
        ) -> Result<()> {

            let this_batch = ds.len();

            // (this_batch, n_topics)
            let v_doc: Array2<f32> = self.w_docs.select(Axis(0), ds);
            let v_word: Array2<f32> = self.w_words.select(Axis(0), ws);

            // (this_batch,)
            let logits: Array1<f32> = (&v_doc * &v_word).sum_axis(Axis(1)) + self.bias;
            let preds: Array1<f32> = logits.mapv(sigmoid);
            let labels: Array1<f32> = ArrayView1::from(ys).to_owned();

            for (p, y) in preds.iter().zip(ys) {
                progress.add(*p, *y);
            }

            // d(bce)/d(logit) = p - y, broadcast over topics as (this_batch, 1)
            let dl_dlogit: Array2<f32> = (&preds - &labels).into_shape((this_batch, 1))?;
            let dl_dv_doc: Array2<f32> = &v_word * &dl_dlogit + &(v_doc.mapv(l1_grad) * self.l1_doc);
            let dl_dv_word: Array2<f32> = &v_doc * &dl_dlogit + &(v_word.mapv(l1_grad) * self.l1_word);

            let lr = self.learning_rate;

            // update by index,
            // done in a loop since no select_mut by non-consecutive indexes is available
            for (ll, (ii, jj)) in ds.iter().zip(ws).enumerate() {

                let g_doc = dl_dv_doc.row(ll);
                let g_word = dl_dv_word.row(ll);

                self.ag_docs.row_mut(*ii).add_assign(&g_doc.mapv(|g| g * g));
                self.ag_words.row_mut(*jj).add_assign(&g_word.mapv(|g| g * g));

                let doc_update = &g_doc * &self.ag_docs.row(*ii).mapv(|a| lr / a.sqrt());
                let word_update = &g_word * &self.ag_words.row(*jj).mapv(|a| lr / a.sqrt());

                let mut doc_row = self.w_docs.row_mut(*ii);
                doc_row -= &doc_update;
                doc_row.mapv_inplace(|x| x.max(0.0));
                let mut word_row = self.w_words.row_mut(*jj);
                word_row -= &word_update;

                let g_bias = dl_dlogit[[ll, 0]];
                self.ag_bias += g_bias * g_bias;
                self.bias -= lr * g_bias / self.ag_bias.sqrt();
            }

            Ok(())
    }

    fn train_epoch(&mut self, docs: &[usize], words: &[usize], labels: &[f32], batch_size: usize, epoch: usize) -> Result<TrainingStats> {

        let my_time = Instant::now();
        let mut progress = EpochProgress::new();

        // a fresh permutation every epoch, reproducible from the seed alone
        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(1 + epoch as u64));
        let mut order = (0..labels.len()).collect::<Vec<usize>>();
        order.shuffle(&mut rng);

        let n_batches = (order.len() + batch_size - 1) / batch_size.max(1);
        for (pp, chunk) in order.chunks(batch_size.max(1)).enumerate() {

            let ds: Vec<usize> = chunk.iter().map(|i| docs[*i]).collect();
            let ws: Vec<usize> = chunk.iter().map(|i| words[*i]).collect();
            let ys: Vec<f32> = chunk.iter().map(|i| labels[*i]).collect();
            self.do_training_batch(&ds, &ws, &ys, &mut progress)?;

            if pp % 100 == 0 && pp > 0 {
                debug!("epoch {}, batch {} / {}, loss: {}", epoch, pp, n_batches, progress.loss());
            }
        }

        let stats = TrainingStats { epoch, loss: progress.loss(), f1: progress.f1() };
        info!("finished epoch {}, loss is {}, f1 is {}, took: {} seconds...", epoch, stats.loss, stats.f1, my_time.elapsed().as_secs());
        Ok(stats)
    }

}

impl TopicModel for Doc2Topic {

    fn fit(&mut self, docs: &[usize], words: &[usize], labels: &[f32], batch_size: usize, epochs: Range<usize>) -> Result<TrainingStats> {

        self.check_examples(docs, words, labels)?;
        if batch_size == 0 {
            return Err(Doc2TopicError::invalid_config("batch_size must be positive"));
        }

        let mut stats = TrainingStats { epoch: self.epochs_done, loss: f32::NAN, f1: f32::NAN };
        for epoch in epochs {
            stats = self.train_epoch(docs, words, labels, batch_size, epoch)?;
            self.epochs_done = epoch + 1;
        }
        Ok(stats)
    }

    fn document_embeddings(&self) -> Array2<f32> {
        self.w_docs.clone()
    }

    fn word_embeddings(&self, clip_negative: bool) -> Array2<f32> {
        if clip_negative {
            self.w_words.mapv(|x| x.max(0.0))
        } else {
            self.w_words.clone()
        }
    }

    fn n_topics(&self) -> usize {
        self.w_docs.ncols()
    }

    fn save_checkpoint(&self, output_dir: &str, file_name: &str) -> Result<PathBuf> {
        files_handling::save_output::<Doc2Topic>(output_dir, file_name, self)
    }
}


impl SaveFile for Doc2Topic {
    const EXTENSION: &'static str = "model.bin.gz";
    fn save_file(&self, file_path: &Path) -> Result<()> {
        let f = BufWriter::new(File::create(file_path).map_err(|e| Doc2TopicError::io(file_path, e))?);
        let mut writer = GzEncoder::new(f, Compression::default());
        bincode::serialize_into(&mut writer, self)?;
        writer.finish().and_then(|mut f| f.flush()).map_err(|e| Doc2TopicError::io(file_path, e))?;
        Ok(())
    }
}

impl ReadFile for Doc2Topic {
    fn read_file(file_path: &Path) -> Result<Self> {
        let f = BufReader::new(File::open(file_path).map_err(|e| Doc2TopicError::io(file_path, e))?);
        let reader = GzDecoder::new(f);
        Ok(bincode::deserialize_from(reader)?)
    }
}
