use owo_colors::OwoColorize;

/// `Step n: message` progress line on stderr.
pub fn step(quiet: bool, n: usize, message: &str) {
    if !quiet {
        eprintln!("{} {message}", format!("Step {n}:").bold());
    }
}

pub fn success(quiet: bool, message: &str) {
    if !quiet {
        eprintln!("{} {message}", "✓".green());
    }
}

pub fn warn(message: &str) {
    eprintln!("{} {message}", "!".yellow());
}

/// Chunk progress for uploads, matching `Uploaded chunk i / n...`.
pub fn chunk_progress(done: usize, total: usize) {
    eprintln!("Uploaded chunk {done} / {total}...");
}
