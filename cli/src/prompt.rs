use spotmover::Confirm;
use std::io::{self, BufRead, Write};
use tracing::{info, warn};

/// Asks on stdout and reads the answer from stdin.
pub struct TerminalConfirm;

impl Confirm for TerminalConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        let mut stdout = io::stdout().lock();
        if writeln!(stdout, "{prompt}").and_then(|_| stdout.flush()).is_err() {
            return false;
        }
        ask(&mut io::stdin().lock())
    }
}

/// Answers yes to everything, for unattended runs.
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&self, prompt: &str) -> bool {
        info!("{} yes", prompt);
        true
    }
}

fn ask<R: BufRead>(input: &mut R) -> bool {
    let mut answer = String::new();
    match input.read_line(&mut answer) {
        Ok(_) => is_yes(&answer),
        Err(e) => {
            warn!("Unable to read the answer: {}", e);
            false
        }
    }
}

pub fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
