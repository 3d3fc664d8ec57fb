
use crate::config::{files_handling, Config, Params};
use crate::counts::CorpusCounts;
use crate::error::Result;
use crate::eval_log::LogRecord;
use crate::measures::{Evaluation, Evaluator};
use crate::sampling::build_examples;
use crate::train::{Doc2Topic, TopicModel};
use crate::vocab::Corpus;

use std::collections::HashSet;
use std::path::Path;
use std::time::Instant;
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;

const MODEL_NAME: &str = "current_model";

pub struct Run {}

impl Run {

    // runs the main procedure -
    // -> configuration of arguments
    // -> vocabulary, corpus statistics and training examples
    // -> one fit + evaluation + log row per epoch
    pub fn run(args: &[String]) -> Result<()> {

        let config = match Config::new(args)? {
            Some(config) => config,
            None => {
                println!("Usage: {} <documents file> [params.json]", args.first().map(|a| a.as_str()).unwrap_or("doc2topic"));
                return Ok(())
            }
        };

        let params = config.get_params();
        info!("{}", params);

        let documents = Corpus::read_documents(config.corpus_file())?;
        Run::train_on_documents(documents, &params)?;
        Ok(())
    }

    fn corpus_counts(documents: &[Vec<String>], params: &Params) -> Result<CorpusCounts> {

        if let Some(counts_file) = &params.counts_file {
            let path = Path::new(counts_file);
            if path.exists() {
                info!("loading word count data from {}", path.display());
                return files_handling::read_input::<CorpusCounts>(path);
            }
            info!("{} not found, counting words from the corpus", path.display());
        }

        let counts = CorpusCounts::count_words(documents, params.cooc_window, params.num_threads)?;
        let saved = files_handling::save_output(&params.output_dir, "corpus", &counts)?;
        info!("saved word count data to {}", saved.display());
        Ok(counts)
    }

    // Trains and evaluates on already tokenized documents, returning the
    // log record of every epoch.
    pub fn train_on_documents(documents: Vec<Vec<String>>, params: &Params) -> Result<Vec<LogRecord>> {

        params.validate()?;
        let n_docs = documents.len();

        // prepare data
        let (freqs, vocab) = Corpus::build_vocab(&documents, params.min_count);
        println!("Vocabulary size: {}", vocab.len());

        let counts = Run::corpus_counts(&documents, params)?;

        let mut rng = StdRng::seed_from_u64(params.seed);
        let encoded: Vec<Vec<usize>> = documents.iter().map(|doc| vocab.encode(doc)).collect();
        drop(documents);
        let examples = build_examples(&encoded, vocab.len(), params.ns_rate, &mut rng)?;
        drop(encoded);

        // save token index mapping and the parameters of the run
        files_handling::save_output(&params.output_dir, MODEL_NAME, &vocab)?;
        files_handling::save_output(&params.output_dir, MODEL_NAME, params)?;

        // modeling
        let mut model = Doc2Topic::from_params(n_docs, vocab.len(), params);

        let mut log = LogRecord::with_params(params, n_docs);
        info!("model with {} topics", model.n_topics());
        let (header, values) = log.param_table();
        println!("{}\n{}", header, values);

        let stopwords: HashSet<String> = params.stopwords.iter().cloned().collect();
        let evaluator = Evaluator::new(&vocab, &freqs, &counts, &stopwords);
        let log_path = Path::new(&params.output_dir).join(&params.log_file);

        let mut records = Vec::new();
        let mut last_eval: Option<Evaluation> = None;
        for epoch in 0..params.n_epochs {

            let my_time = Instant::now();
            let stats = model.fit(&examples.docs, &examples.words, &examples.labels, params.batch_size, epoch..epoch + 1)?;
            model.save_checkpoint(&params.output_dir, MODEL_NAME)?;

            let docvecs = model.document_embeddings();
            let wordvecs = model.word_embeddings(true);
            let eval = evaluator.evaluate(&docvecs, &wordvecs, params.top_n, model.n_topics() * params.n_freq_words_per_topic,
                params.sparsity_sample, params.peak_threshold, &mut rng);

            Run::print_epoch(&eval, &evaluator);
            log.record_epoch(epoch, &eval, &stats);
            log.append_to(&log_path)?;
            records.push(log.clone());
            last_eval = Some(eval);

            info!("epoch {} done in {} seconds", epoch, my_time.elapsed().as_secs());
        }

        if let Some(eval) = last_eval {
            Run::print_final(&eval);
        }

        files_handling::save_output(&params.output_dir, "docvecs", &model.document_embeddings())?;
        files_handling::save_output(&params.output_dir, "wordvecs", &model.word_embeddings(false))?;

        Ok(records)
    }

    fn print_epoch(eval: &Evaluation, evaluator: &Evaluator) {

        println!("Doc-topic distribution sparsity");
        println!("\tL2/L1\t>2/N");
        println!("\t{:.3}\t{:.3}", eval.doc_sparsity, eval.doc_peakiness);

        println!("\nTopic words");
        for (topic, (words, coherence)) in eval.topic_words.iter().zip(&eval.coherences).enumerate() {
            println!("{} ({:.3}): {}", topic, coherence, evaluator.topic_tokens(words).join(", "));
        }
        println!("Mean semantic coherence: {:.3}", eval.mean_coherence);
    }

    fn print_final(eval: &Evaluation) {
        println!("Topic overlap: {}", eval.overlap);
        println!("Topic precision: {}", eval.precision);
        println!("Topic recall: {}", eval.recall);
        println!("Topic wordiness: {}", eval.wordiness);
        println!("Topic stop wordiness: {}", eval.stopwordiness);
    }

}
