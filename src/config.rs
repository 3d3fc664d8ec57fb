
use crate::error::{Doc2TopicError, Result};

use serde::{Serialize, Deserialize};
use serde_json::Value;
use std::{fs::File, fmt::Display, io::BufReader, path::Path};

// stopword list of the lemmatized Finnish news corpus the defaults were tuned on
const DEFAULT_STOPWORDS: &str = "ja tai ei se että olla joka jos mikä mitä tämä kun eli ne hän siis jos#ei mutta kuin";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Params {
    pub n_topics: usize,
    pub l1_doc: f32,
    pub l1_word: f32,
    pub learning_rate: f32,
    pub batch_size: usize,
    pub ns_rate: usize,
    pub n_epochs: usize,
    pub min_count: u64,
    pub top_n: usize,
    pub n_freq_words_per_topic: usize,
    pub sparsity_sample: usize,
    pub peak_threshold: f32,
    pub seed: u64,
    pub num_threads: usize,
    pub cooc_window: usize,
    pub output_dir: String,
    pub counts_file: Option<String>,
    pub log_file: String,
    pub stopwords: Vec<String>,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            n_topics: 200,
            l1_doc: 0.000002,
            l1_word: 0.000000015,
            learning_rate: 0.015,
            batch_size: 10 * 1024,
            ns_rate: 1,
            n_epochs: 20,
            min_count: 10,
            top_n: 10,
            n_freq_words_per_topic: 10,
            sparsity_sample: 1000,
            peak_threshold: 2.0,
            seed: 0,
            num_threads: 4,
            cooc_window: 10,
            output_dir: "output".to_string(),
            counts_file: None,
            log_file: "log.csv".to_string(),
            stopwords: DEFAULT_STOPWORDS.split_whitespace().map(|x| x.to_string()).collect(),
        }
    }
}

impl Display for Params {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "using hyper-params:
        n_topics: {},
        l1_doc: {},
        l1_word: {},
        learning_rate: {},
        batch_size: {},
        ns_rate: {},
        n_epochs: {},
        min_count: {},
        top_n: {},
        seed: {},
        output_dir: {},
        counts_file: {:?},
        log_file: {}",
        self.n_topics, self.l1_doc, self.l1_word, self.learning_rate, self.batch_size, self.ns_rate,
        self.n_epochs, self.min_count, self.top_n, self.seed, self.output_dir, self.counts_file, self.log_file
        )
    }
}

pub struct Config {
    corpus_file: String,
    params: Params
}

impl Config {

    pub fn get_params(&self) -> Params {
        self.params.clone()
    }

    pub fn corpus_file(&self) -> &str {
        &self.corpus_file
    }

    // Builds the run configuration from command line arguments:
    // `<documents file> [params.json]`. Returns `Ok(None)` when the
    // documents file is missing so the caller can print usage.
    pub fn new(args: &[String]) -> Result<Option<Config>> {

        let corpus_file = match args.get(1) {
            Some(corpus_file) => corpus_file.to_owned(),
            None => return Ok(None)
        };

        let params = match args.get(2) {
            Some(json_path) => Params::from_json_file(json_path)?,
            None => Params::default()
        };
        params.validate()?;

        Ok(Some(Self { corpus_file, params }))
    }

}

impl Params {

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Params> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| Doc2TopicError::io(path, e))?;
        let json: Value = serde_json::from_reader(BufReader::new(f))?;
        Params::from_json(&json)
    }

    // Reads parameters from a json object, keys that are not supplied keep their defaults.
    pub fn from_json(json: &Value) -> Result<Params> {

        let defaults = Params::default();

        let get_usize = |key: &str, default: usize| -> Result<usize> {
            match json.get(key) {
                Some(value) => match value.as_i64() {
                    Some(x) if x >= 0 => Ok(x as usize),
                    Some(x) => Err(Doc2TopicError::invalid_config(format!("{} must be non-negative, got {}", key, x))),
                    None => Err(Doc2TopicError::invalid_config(format!("given {} is not an integer", key)))
                },
                None => Ok(default)
            }
        };
        let get_f32 = |key: &str, default: f32| -> Result<f32> {
            match json.get(key) {
                Some(value) => value.as_f64().map(|x| x as f32)
                    .ok_or_else(|| Doc2TopicError::invalid_config(format!("given {} is not numeric", key))),
                None => Ok(default)
            }
        };
        let get_string = |key: &str, default: &str| -> Result<String> {
            match json.get(key) {
                Some(value) => value.as_str().map(|x| x.to_owned())
                    .ok_or_else(|| Doc2TopicError::invalid_config(format!("given {} is not a string", key))),
                None => Ok(default.to_owned())
            }
        };

        let counts_file = match json.get("counts_file") {
            Some(Value::Null) | None => defaults.counts_file.clone(),
            Some(value) => Some(value.as_str()
                .ok_or_else(|| Doc2TopicError::invalid_config("given counts_file is not a string"))?
                .to_owned())
        };
        let stopwords = match json.get("stopwords") {
            Some(Value::Array(words)) => words.iter().map(|w| {
                w.as_str().map(|x| x.to_lowercase())
                    .ok_or_else(|| Doc2TopicError::invalid_config("stopwords must be strings"))
            }).collect::<Result<Vec<String>>>()?,
            Some(_) => return Err(Doc2TopicError::invalid_config("stopwords must be a list of strings")),
            None => defaults.stopwords.clone()
        };

        Ok(Params {
            n_topics: get_usize("n_topics", defaults.n_topics)?,
            l1_doc: get_f32("l1_doc", defaults.l1_doc)?,
            l1_word: get_f32("l1_word", defaults.l1_word)?,
            learning_rate: get_f32("learning_rate", defaults.learning_rate)?,
            batch_size: get_usize("batch_size", defaults.batch_size)?,
            ns_rate: get_usize("ns_rate", defaults.ns_rate)?,
            n_epochs: get_usize("n_epochs", defaults.n_epochs)?,
            min_count: get_usize("min_count", defaults.min_count as usize)? as u64,
            top_n: get_usize("top_n", defaults.top_n)?,
            n_freq_words_per_topic: get_usize("n_freq_words_per_topic", defaults.n_freq_words_per_topic)?,
            sparsity_sample: get_usize("sparsity_sample", defaults.sparsity_sample)?,
            peak_threshold: get_f32("peak_threshold", defaults.peak_threshold)?,
            seed: get_usize("seed", defaults.seed as usize)? as u64,
            num_threads: get_usize("num_threads", defaults.num_threads)?,
            cooc_window: get_usize("cooc_window", defaults.cooc_window)?,
            output_dir: get_string("output_dir", &defaults.output_dir)?,
            counts_file,
            log_file: get_string("log_file", &defaults.log_file)?,
            stopwords,
        })
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("n_topics", self.n_topics),
            ("batch_size", self.batch_size),
            ("n_epochs", self.n_epochs),
            ("top_n", self.top_n),
            ("num_threads", self.num_threads),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(Doc2TopicError::invalid_config(format!("{} must be positive", name)));
            }
        }
        if !(self.learning_rate > 0.0) {
            return Err(Doc2TopicError::invalid_config("learning_rate must be positive"));
        }
        if self.l1_doc < 0.0 || self.l1_word < 0.0 {
            return Err(Doc2TopicError::invalid_config("l1 penalties must be non-negative"));
        }
        Ok(())
    }

}


pub mod files_handling {

    use super::Params;
    use crate::error::{Doc2TopicError, Result};
    use ndarray::Array2;
    use ndarray_npy::{read_npy, write_npy};
    use std::{fs::{self, File}, io::BufWriter, path::{Path, PathBuf}};

    pub fn read_input<R: ReadFile>(file_path: &Path) -> Result<R> {
        R::read_file(file_path)
    }

    pub fn save_output<S: SaveFile>(output_dir: &str, file_name: &str, item: &S) -> Result<PathBuf> {

        // create output folder
        fs::create_dir_all(output_dir).map_err(|e| Doc2TopicError::io(output_dir, e))?;

        let out = Path::new(output_dir).join(format!("{}.{}", file_name, S::EXTENSION));
        item.save_file(&out)?;
        Ok(out)
    }

    pub trait ReadFile: Sized {
        fn read_file(file_path: &Path) -> Result<Self>;
    }

    pub trait SaveFile {
        const EXTENSION: &'static str;
        fn save_file(&self, file_path: &Path) -> Result<()>;
    }

    impl SaveFile for Params {
        const EXTENSION: &'static str = "params.json";
        fn save_file(&self, file_path: &Path) -> Result<()> {
            let f = BufWriter::new(File::create(file_path).map_err(|e| Doc2TopicError::io(file_path, e))?);
            serde_json::to_writer_pretty(f, self)?;
            Ok(())
        }
    }

    impl ReadFile for Params {
        fn read_file(file_path: &Path) -> Result<Self> {
            Params::from_json_file(file_path)
        }
    }

    impl ReadFile for Array2<f32> {
        fn read_file(file_path: &Path) -> Result<Self> {
            Ok(read_npy(file_path)?)
        }
    }

    impl SaveFile for Array2<f32> {
        const EXTENSION: &'static str = "npy";
        fn save_file(&self, file_path: &Path) -> Result<()> {
            write_npy(file_path, self)?;
            Ok(())
        }
    }

}


#[cfg(test)]
mod tests {

    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_are_valid() {
        let params = Params::default();
        assert!(params.validate().is_ok());
        assert_eq!(params.ns_rate, 1);
        assert!(params.stopwords.contains(&"ja".to_string()));
    }

    #[test]
    fn json_overrides_defaults() {
        let params = Params::from_json(&json!({"n_topics": 8, "ns_rate": 0, "learning_rate": 0.1})).unwrap();
        assert_eq!(params.n_topics, 8);
        assert_eq!(params.ns_rate, 0);
        assert!((params.learning_rate - 0.1).abs() < 1e-6);
        assert_eq!(params.min_count, Params::default().min_count);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn negative_ns_rate_is_rejected() {
        let err = Params::from_json(&json!({"ns_rate": -1})).unwrap_err();
        assert!(matches!(err, Doc2TopicError::InvalidConfig(_)));
    }

    #[test]
    fn zero_topics_is_rejected() {
        let params = Params::from_json(&json!({"n_topics": 0})).unwrap();
        assert!(params.validate().is_err());
    }

    #[test]
    fn missing_corpus_argument_gives_none() {
        let args = vec!["doc2topic".to_string()];
        assert!(Config::new(&args).unwrap().is_none());

        let args = vec!["doc2topic".to_string(), "docs.txt".to_string()];
        let config = Config::new(&args).unwrap().unwrap();
        assert_eq!(config.corpus_file(), "docs.txt");
        assert_eq!(config.get_params(), Params::default());
    }

    #[test]
    fn saved_params_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let mut params = Params::default();
        params.n_topics = 12;
        params.counts_file = Some("counts.json.gz".to_string());

        let path = files_handling::save_output(dir.path().to_str().unwrap(), "run", &params).unwrap();
        let restored = files_handling::read_input::<Params>(&path).unwrap();
        assert_eq!(restored, params);
    }
}
