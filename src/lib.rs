mod run;
pub mod config;
pub mod counts;
pub mod error;
pub mod eval_log;
pub mod measures;
pub mod sampling;
pub mod similarity;
pub mod train;
pub mod vocab;

pub use run::Run;
pub use config::{files_handling, Config, Params};
pub use counts::{CorpusCounts, PairCounts};
pub use error::{Doc2TopicError, Result};
pub use eval_log::LogRecord;
pub use measures::{Evaluation, Evaluator, TopicWords};
pub use sampling::{build_examples, Examples};
pub use similarity::Similarity;
pub use train::{Doc2Topic, TopicModel, TrainingStats};
pub use vocab::{Corpus, FrequencyTable, Tokenizer, Vocabulary};
