use std::env;
use std::process;
use doc2topic::Run;

fn main() {

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    if let Err(e) = Run::run(&args) {
        eprintln!("{}", e);
        process::exit(1);
    }
}
