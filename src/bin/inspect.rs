use std::{env, path::Path, process};
use doc2topic::{files_handling, Result, Similarity, Vocabulary};
use ndarray::Array2;


// this executable inspects a finished training run:
// the most similar words to each given token and the topic it weighs most.
// treated as binary executable so it can be ran independantly from main
//
// arguments: the run's output directory followed by one or more tokens
// example: ... output kissa koira

fn main() {

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        println!("Usage: {} <run output dir> <token>...", args.first().map_or("inspect", String::as_str));
        return;
    }

    if let Err(e) = run_similarity(&args[1], &args[2..], 20) {
        eprintln!("{}", e);
        process::exit(1);
    }
}

fn run_similarity(output_dir: &str, tokens: &[String], k: usize) -> Result<()> {

    // read in trained word vectors and tokens
    let dir = Path::new(output_dir);
    let w = files_handling::read_input::<Array2<f32>>(&dir.join("wordvecs.npy"))?;
    let vocab = files_handling::read_input::<Vocabulary>(&dir.join("current_model.vocab.json"))?;
    let sim_obj = Similarity::new(w, vocab)?;

    for token in tokens {

        // an unknown token is reported and the rest are still inspected
        let similarities = match sim_obj.most_similar_words(token, k) {
            Ok(similarities) => similarities,
            Err(e) => {
                eprintln!("{}", e);
                continue
            }
        };

        println!("searching {} most similar words to {} (topic {})", k, token, sim_obj.dominant_topic(token)?);
        for (i, (similar_token, score)) in similarities.iter().enumerate() {
            println!("{} : {} ? {} = {}", i, token, similar_token, score);
        }
        println!("\n");
    }

    Ok(())
}
