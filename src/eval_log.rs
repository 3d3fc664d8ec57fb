// per-epoch evaluation records and their append-only csv log.
// column prefixes: p_ run parameters, a_ bookkeeping, m_ topic measures, z_ training statistics

use crate::config::Params;
use crate::error::{Doc2TopicError, Result};
use crate::measures::Evaluation;
use crate::train::TrainingStats;

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::path::Path;

// f32 -> f64 through the shortest f32 decimal, so 0.015 is logged as 0.015
fn widen(x: f32) -> f64 {
    x.to_string().parse().unwrap_or(x as f64)
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct LogRecord {
    values: BTreeMap<String, f64>,
}

impl LogRecord {

    pub fn new() -> Self {
        Self::default()
    }

    // Run parameters shared by every row of a run.
    pub fn with_params(params: &Params, n_docs: usize) -> Self {
        let mut record = LogRecord::new();
        record.set("p_Ndocs", n_docs as f64);
        record.set("p_BS", params.batch_size as f64);
        record.set("p_NSrate", params.ns_rate as f64);
        record.set("p_Ntopics", params.n_topics as f64);
        record.set("p_L1doc", widen(params.l1_doc));
        record.set("p_L1word", widen(params.l1_word));
        record.set("p_LR", widen(params.learning_rate));
        record
    }

    pub fn set(&mut self, key: &str, value: f64) {
        self.values.insert(key.to_owned(), value);
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }

    pub fn keys(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }

    // Fills in the per-epoch columns.
    pub fn record_epoch(&mut self, epoch: usize, eval: &Evaluation, stats: &TrainingStats) {
        self.set("a_Epoch", epoch as f64);
        self.set("m_DocL2L1", widen(eval.doc_sparsity));
        self.set("m_DocPeak", widen(eval.doc_peakiness));
        self.set("m_tOverlap", widen(eval.overlap));
        self.set("m_tPrec", widen(eval.precision));
        self.set("m_tRecall", widen(eval.recall));
        self.set("m_tWordy", widen(eval.wordiness));
        self.set("m_tStopy", widen(eval.stopwordiness));
        self.set("m_PMI", widen(eval.mean_coherence));
        self.set("z_F1", widen(stats.f1));
        self.set("z_Loss", widen(stats.loss));
    }

    // Parameter columns as a tab separated header line and value line.
    pub fn param_table(&self) -> (String, String) {
        let params: Vec<(&String, &f64)> = self.values.iter().filter(|(k, _)| k.starts_with("p_")).collect();
        let header = params.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>().join("\t");
        let values = params.iter().map(|(_, v)| v.to_string()).collect::<Vec<_>>().join("\t");
        (header, values)
    }

    // Appends the record as one CSV row. The header is written when the file
    // is created; an existing file must have exactly this record's columns.
    pub fn append_to(&self, file_path: impl AsRef<Path>) -> Result<()> {

        let file_path = file_path.as_ref();
        let keys = self.keys();
        let file_exists = file_path.exists();

        if file_exists {
            let mut rdr = csv::Reader::from_path(file_path)?;
            let existing: Vec<String> = rdr.headers()?.iter().map(|h| h.to_owned()).collect();
            if existing != keys {
                return Err(Doc2TopicError::LogSchema { path: file_path.to_owned(), expected: existing, found: keys });
            }
        }

        let f = OpenOptions::new().create(true).append(true).open(file_path)
            .map_err(|e| Doc2TopicError::io(file_path, e))?;
        let mut wrt = csv::WriterBuilder::new().from_writer(f);
        if !file_exists {
            wrt.write_record(&keys)?;
        }
        wrt.write_record(self.values.values().map(|v| v.to_string()))?;
        wrt.flush().map_err(|e| Doc2TopicError::io(file_path, e))?;
        Ok(())
    }
}
