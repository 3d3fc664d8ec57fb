
// imports
use crate::config::files_handling::{ReadFile, SaveFile};
use crate::error::{Doc2TopicError, Result};

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter};
use std::path::Path;
use log::{debug, info};

// Occurrence count of every token in the corpus, filtered or not.
pub type FrequencyTable = HashMap<String, u64>;

// Bijection between the tokens that survived frequency filtering and dense ids.
// Ids follow first-occurrence order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Vocabulary {
    id2token: Vec<String>,
    token2id: HashMap<String, usize>,
}

impl Vocabulary {

    pub fn new() -> Self {
        Self::default()
    }

    // Returns the id of `token`, assigning the next free id on first sight.
    pub fn insert_or_get(&mut self, token: &str) -> usize {
        if let Some(id) = self.token2id.get(token) {
            return *id;
        }
        let id = self.id2token.len();
        self.id2token.push(token.to_owned());
        self.token2id.insert(token.to_owned(), id);
        id
    }

    pub fn len(&self) -> usize {
        self.id2token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id2token.is_empty()
    }

    pub fn id(&self, token: &str) -> Option<usize> {
        self.token2id.get(token).copied()
    }

    // Like `id`, but an out-of-vocabulary token is an error.
    pub fn id_of(&self, token: &str) -> Result<usize> {
        self.id(token).ok_or_else(|| Doc2TopicError::unknown_token(token))
    }

    pub fn token(&self, id: usize) -> Option<&str> {
        self.id2token.get(id).map(|t| t.as_str())
    }

    pub fn tokens(&self) -> &[String] {
        &self.id2token
    }

    // Maps a document to ids, dropping tokens outside the vocabulary.
    pub fn encode(&self, document: &[String]) -> Vec<usize> {
        document.iter().filter_map(|tok| self.id(tok)).collect()
    }

    // id -> token record as persisted next to a trained model
    pub fn idx2token(&self) -> BTreeMap<usize, String> {
        self.id2token.iter().cloned().enumerate().collect()
    }

    pub fn from_idx2token(idx2token: BTreeMap<usize, String>) -> Result<Self> {
        let mut vocab = Vocabulary::new();
        for (expected, (i, token)) in idx2token.into_iter().enumerate() {
            if i != expected {
                return Err(Doc2TopicError::serialization(format!("vocabulary ids are not dense, missing id {}", expected)));
            }
            if vocab.insert_or_get(&token) != i {
                return Err(Doc2TopicError::serialization(format!("token '{}' appears twice in vocabulary", token)));
            }
        }
        Ok(vocab)
    }
}


// defines the behavior needed for tokenizing a corpus
pub trait Tokenizer {
    fn tokenize(sequence: &str) -> Vec<String>;
}

pub struct Corpus {}

impl Tokenizer for Corpus {
    // lower cased whitespace split
    fn tokenize(sequence: &str) -> Vec<String> {
        sequence.trim().to_lowercase().split_whitespace().map(|x| x.to_string()).collect()
    }
}

impl Corpus {

    // Reads one document per line. Empty lines are kept as empty documents
    // so that document ids match line numbers.
    pub fn read_documents(file_path: impl AsRef<Path>) -> Result<Vec<Vec<String>>> {

        let file_path = file_path.as_ref();
        let f = File::open(file_path).map_err(|e| Doc2TopicError::io(file_path, e))?;

        let mut documents = Vec::new();
        for line in BufReader::new(f).lines() {
            let line = line.map_err(|e| Doc2TopicError::io(file_path, e))?;
            documents.push(Corpus::tokenize(&line));
            if documents.len() % 100 == 0 {
                debug!("reading documents: {}", documents.len());
            }
        }

        info!("read {} documents from {}", documents.len(), file_path.display());
        Ok(documents)
    }

    // Counts every token of the corpus and assigns ids to the tokens
    // occurring more than `min_count` times, scanning documents then
    // tokens left to right.
    pub fn build_vocab(documents: &[Vec<String>], min_count: u64) -> (FrequencyTable, Vocabulary) {

        let mut token2count: FrequencyTable = HashMap::new();
        for tok in documents.iter().flatten() {
            *token2count.entry(tok.to_owned()).or_insert(0) += 1;
        }

        let mut vocab = Vocabulary::new();
        for tok in documents.iter().flatten() {
            if token2count[tok] > min_count {
                vocab.insert_or_get(tok);
            }
        }

        info!("using {} tokens occurring more than {} times, out of {}", vocab.len(), min_count, token2count.len());
        (token2count, vocab)
    }

}


impl SaveFile for Vocabulary {
    const EXTENSION: &'static str = "vocab.json";
    fn save_file(&self, file_path: &Path) -> Result<()> {
        let f = BufWriter::new(File::create(file_path).map_err(|e| Doc2TopicError::io(file_path, e))?);
        serde_json::to_writer(f, &self.idx2token())?;
        Ok(())
    }
}

impl ReadFile for Vocabulary {
    fn read_file(file_path: &Path) -> Result<Self> {
        let f = BufReader::new(File::open(file_path).map_err(|e| Doc2TopicError::io(file_path, e))?);
        let idx2token: BTreeMap<usize, String> = serde_json::from_reader(f)?;
        Vocabulary::from_idx2token(idx2token)
    }
}


#[cfg(test)]
mod tests {

    use super::*;

    fn corpus(lines: &[&str]) -> Vec<Vec<String>> {
        lines.iter().map(|l| Corpus::tokenize(l)).collect()
    }

    #[test]
    fn ids_follow_first_occurrence() {
        let docs = corpus(&["a b c", "a b", "c d"]);
        let (counts, vocab) = Corpus::build_vocab(&docs, 0);

        assert_eq!(vocab.len(), 4);
        assert_eq!(vocab.tokens(), &["a", "b", "c", "d"]);
        assert_eq!(counts["a"], 2);
        assert_eq!(counts["d"], 1);
        assert_eq!(vocab.encode(&docs[2]), vec![2, 3]);
    }

    #[test]
    fn rare_tokens_are_counted_but_not_indexed() {
        let docs = corpus(&["rare common", "common common", "other common"]);
        let (counts, vocab) = Corpus::build_vocab(&docs, 1);

        assert_eq!(vocab.tokens(), &["common"]);
        assert_eq!(counts["rare"], 1);
        assert_eq!(counts["common"], 4);
        for (tok, cnt) in &counts {
            assert_eq!(vocab.id(tok).is_some(), *cnt > 1);
        }
        assert_eq!(vocab.encode(&docs[0]), vec![0]);
    }

    #[test]
    fn tokenizer_lowercases() {
        assert_eq!(Corpus::tokenize("  Kissa  ISTUU\tpuussa "), vec!["kissa", "istuu", "puussa"]);
        assert!(Corpus::tokenize("").is_empty());
    }

    #[test]
    fn insert_or_get_is_stable() {
        let mut vocab = Vocabulary::new();
        assert_eq!(vocab.insert_or_get("x"), 0);
        assert_eq!(vocab.insert_or_get("y"), 1);
        assert_eq!(vocab.insert_or_get("x"), 0);
        assert_eq!(vocab.len(), 2);
    }

    #[test]
    fn unknown_token_is_an_error() {
        let mut vocab = Vocabulary::new();
        vocab.insert_or_get("x");
        assert!(matches!(vocab.id_of("zz"), Err(Doc2TopicError::UnknownToken(_))));
    }

    #[test]
    fn idx2token_round_trip() {
        let docs = corpus(&["one two three two"]);
        let (_, vocab) = Corpus::build_vocab(&docs, 0);
        let restored = Vocabulary::from_idx2token(vocab.idx2token()).unwrap();
        assert_eq!(restored, vocab);
    }

    #[test]
    fn read_documents_keeps_empty_lines() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut f, "Kissa KOIRA\n\nauto tie\n".as_bytes()).unwrap();

        let docs = Corpus::read_documents(f.path()).unwrap();
        let expected: Vec<Vec<String>> = vec![vec!["kissa".into(), "koira".into()], vec![], vec!["auto".into(), "tie".into()]];
        assert_eq!(docs, expected);
    }

    #[test]
    fn missing_corpus_is_io_error() {
        let err = Corpus::read_documents("/nonexistent/doc2topic/corpus.txt").unwrap_err();
        assert!(err.is_io());
    }
}
