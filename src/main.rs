use std::process;

fn main() {
    if let Err(e) = cinematch::cli::run() {
        eprintln!("Error: {e:#}");
        process::exit(cinematch::types::EXIT_ERROR);
    }
}
