
// imports
use crate::config::files_handling::{ReadFile, SaveFile};
use crate::error::{Doc2TopicError, Result};
use crate::vocab::FrequencyTable;

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use flate2::{Compression, read::GzDecoder, write::GzEncoder};
use log::info;
use rayon::{prelude::*, ThreadPoolBuilder};
use serde::{Serialize, Deserialize, Serializer, Deserializer, ser::SerializeSeq, de::Visitor};


// Co-occurrence counts of unordered token pairs. The smaller token (by
// byte order) is always stored first.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PairCounts {
    pairs: HashMap<(String, String), u64>,
    total: u64,
}

impl PairCounts {

    pub fn new() -> Self {
        Self::default()
    }

    fn key(a: &str, b: &str) -> (String, String) {
        if a <= b { (a.to_owned(), b.to_owned()) } else { (b.to_owned(), a.to_owned()) }
    }

    pub fn add(&mut self, a: &str, b: &str, count: u64) {
        *self.pairs.entry(PairCounts::key(a, b)).or_insert(0) += count;
        self.total += count;
    }

    pub fn get(&self, a: &str, b: &str) -> u64 {
        self.pairs.get(&PairCounts::key(a, b)).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    fn merge(mut self, other: PairCounts) -> PairCounts {
        for ((a, b), c) in other.pairs {
            *self.pairs.entry((a, b)).or_insert(0) += c;
        }
        self.total += other.total;
        self
    }
}

impl Serialize for PairCounts {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer {

            let mut seq = serializer.serialize_seq(Some(self.pairs.len()))?;
            for ((a, b), count) in &self.pairs {
                seq.serialize_element(&(a, b, count))?;
            }
            seq.end()
    }
}

struct PairCountsVisitor;
impl<'de> Visitor<'de> for PairCountsVisitor {

    type Value = PairCounts;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("a sequence of [token, token, count] triples")
    }

    fn visit_seq<A>(self, mut seq: A) -> std::result::Result<Self::Value, A::Error>
        where
            A: serde::de::SeqAccess<'de>, {

                let mut pairs = PairCounts::new();
                while let Some((a, b, count)) = seq.next_element::<(String, String, u64)>()? {
                    pairs.add(&a, &b, count);
                }
                Ok(pairs)
    }
}

impl<'de> Deserialize<'de> for PairCounts {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de> {
            deserializer.deserialize_seq(PairCountsVisitor)
    }
}


// Unigram and pair statistics used for coherence scoring. Independent of
// the training vocabulary.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredCounts")]
pub struct CorpusCounts {
    counts: FrequencyTable,
    cooc: PairCounts,
    #[serde(skip)]
    total_tokens: u64,
}

#[derive(Deserialize)]
struct StoredCounts {
    counts: FrequencyTable,
    cooc: PairCounts,
}

impl From<StoredCounts> for CorpusCounts {
    fn from(stored: StoredCounts) -> Self {
        CorpusCounts::new(stored.counts, stored.cooc)
    }
}

impl CorpusCounts {

    pub fn new(counts: FrequencyTable, cooc: PairCounts) -> Self {
        let total_tokens = counts.values().sum();
        Self { counts, cooc, total_tokens }
    }

    pub fn count(&self, token: &str) -> u64 {
        self.counts.get(token).copied().unwrap_or(0)
    }

    pub fn cooc(&self, a: &str, b: &str) -> u64 {
        self.cooc.get(a, b)
    }

    pub fn total_tokens(&self) -> u64 {
        self.total_tokens
    }

    pub fn total_pairs(&self) -> u64 {
        self.cooc.total()
    }

    fn count_chunk(documents: &[Vec<String>], window_size: usize) -> (FrequencyTable, PairCounts) {

        // pairs of distinct tokens up to `window_size` positions apart, one count per position pair
        let mut token2count: FrequencyTable = HashMap::new();
        let mut pairs = PairCounts::new();

        for sequence in documents {
            let n = sequence.len();
            for i in 0..n {
                let tok = &sequence[i];
                *token2count.entry(tok.to_owned()).or_insert(0) += 1;

                for j in i+1..=window_size+i {
                    if j >= n { break }
                    let context = &sequence[j];
                    if context == tok { continue }
                    pairs.add(tok, context, 1);
                }
            }
        }

        (token2count, pairs)
    }

    // Counts unigrams and windowed pair co-occurrences. Documents are split
    // into chunks counted on `num_threads` workers and merged.
    pub fn count_words(documents: &[Vec<String>], window_size: usize, num_threads: usize) -> Result<CorpusCounts> {

        let pool = ThreadPoolBuilder::new().num_threads(num_threads.max(1)).build()
            .map_err(|e| Doc2TopicError::invalid_config(e.to_string()))?;

        let chunk_size = (documents.len() / num_threads.max(1)).max(1);
        let (counts, pairs) = pool.install(|| {
            documents.par_chunks(chunk_size)
            .map(|chunk| CorpusCounts::count_chunk(chunk, window_size))
            .reduce(|| (HashMap::new(), PairCounts::new()), |(mut c1, p1), (c2, p2)| {
                for (tok, c) in c2 {
                    *c1.entry(tok).or_insert(0) += c;
                }
                (c1, p1.merge(p2))
            })
        });

        info!("counted {} distinct tokens and {} distinct pairs", counts.len(), pairs.len());
        Ok(CorpusCounts::new(counts, pairs))
    }

}


impl SaveFile for CorpusCounts {
    const EXTENSION: &'static str = "counts.json.gz";
    fn save_file(&self, file_path: &Path) -> Result<()> {
        let f = BufWriter::new(File::create(file_path).map_err(|e| Doc2TopicError::io(file_path, e))?);
        let mut writer = GzEncoder::new(f, Compression::default());
        serde_json::to_writer(&mut writer, self)?;
        writer.finish().and_then(|mut f| f.flush()).map_err(|e| Doc2TopicError::io(file_path, e))?;
        Ok(())
    }
}

impl ReadFile for CorpusCounts {
    fn read_file(file_path: &Path) -> Result<Self> {
        let f = BufReader::new(File::open(file_path).map_err(|e| Doc2TopicError::io(file_path, e))?);
        let reader = GzDecoder::new(f);
        Ok(serde_json::from_reader(reader)?)
    }
}


#[cfg(test)]
mod tests {

    use super::*;
    use crate::vocab::{Corpus, Tokenizer};

    fn corpus(lines: &[&str]) -> Vec<Vec<String>> {
        lines.iter().map(|l| Corpus::tokenize(l)).collect()
    }

    // golden pair counts worked out by hand for a window of 2
    #[test]
    fn cooc_test() {
        let docs = corpus(&["a b c a", "b b c"]);
        let counts = CorpusCounts::count_words(&docs, 2, 1).unwrap();

        assert_eq!(counts.count("a"), 2);
        assert_eq!(counts.count("b"), 3);
        assert_eq!(counts.count("c"), 2);
        assert_eq!(counts.total_tokens(), 7);

        // doc 1: (a,b) (a,c) (b,c) (b,a) (c,a); doc 2: (b,c) (b,c), (b,b) skipped
        assert_eq!(counts.cooc("a", "b"), 2);
        assert_eq!(counts.cooc("b", "a"), 2);
        assert_eq!(counts.cooc("a", "c"), 2);
        assert_eq!(counts.cooc("c", "b"), 3);
        assert_eq!(counts.cooc("b", "b"), 0);
        assert_eq!(counts.total_pairs(), 7);
    }

    #[test]
    fn parallel_count_matches_sequential() {
        let docs = corpus(&[
            "the cat sat on the mat",
            "the dog sat on the log",
            "a cat and a dog",
            "mat and log",
            "on on on",
        ]);
        let one = CorpusCounts::count_words(&docs, 3, 1).unwrap();
        let many = CorpusCounts::count_words(&docs, 3, 4).unwrap();
        assert_eq!(one, many);
    }

    #[test]
    fn json_round_trip_keeps_totals() {
        let docs = corpus(&["x y z", "y z"]);
        let counts = CorpusCounts::count_words(&docs, 5, 2).unwrap();

        let encoded = serde_json::to_string(&counts).unwrap();
        let decoded: CorpusCounts = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, counts);
        assert_eq!(decoded.total_tokens(), 5);
        assert_eq!(decoded.cooc("z", "y"), 2);
    }
}
