//! Yes/no confirmation before destructive filesystem operations.
//!
//! Stages never read stdin themselves; they ask an injected [`Confirm`]
//! implementation so that non-interactive callers and tests can answer
//! up front.

use std::io::{self, BufRead, Write};

/// Answers a yes/no question.
pub trait Confirm {
    /// Returns true if the operation described by `prompt` may proceed.
    fn confirm(&self, prompt: &str) -> bool;
}

/// Asks on stdout and reads `y`/`n` from stdin until one is given.
///
/// End of input counts as "no".
#[derive(Debug, Default, Clone, Copy)]
pub struct InteractivePrompt;

impl Confirm for InteractivePrompt {
    fn confirm(&self, prompt: &str) -> bool {
        let stdin = io::stdin();
        ask(prompt, &mut stdin.lock(), &mut io::stdout())
    }
}

/// Always answers yes (`--yes` on the command line).
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysYes;

impl Confirm for AlwaysYes {
    fn confirm(&self, _prompt: &str) -> bool {
        true
    }
}

/// Always answers no.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysNo;

impl Confirm for AlwaysNo {
    fn confirm(&self, _prompt: &str) -> bool {
        false
    }
}

fn ask(prompt: &str, input: &mut impl BufRead, output: &mut impl Write) -> bool {
    let mut line = String::new();
    loop {
        // A closed stdout must not turn into a "yes".
        if write!(output, "{} [y/n] ", prompt).and_then(|_| output.flush()).is_err() {
            return false;
        }
        line.clear();
        match input.read_line(&mut line) {
            Ok(0) | Err(_) => return false,
            Ok(_) => {}
        }
        match line.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => return true,
            "n" | "no" => return false,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(input: &str) -> (bool, String) {
        let mut out = Vec::new();
        let result = ask("Delete?", &mut input.as_bytes(), &mut out);
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_accepts_yes() {
        assert!(answer("y\n").0);
        assert!(answer("YES\n").0);
    }

    #[test]
    fn test_rejects_no() {
        assert!(!answer("n\n").0);
    }

    #[test]
    fn test_reprompts_on_garbage() {
        let (result, out) = answer("maybe\n\ny\n");
        assert!(result);
        assert_eq!(out.matches("Delete? [y/n]").count(), 3);
    }

    #[test]
    fn test_eof_is_no() {
        assert!(!answer("").0);
    }

    #[test]
    fn test_fixed_answers() {
        assert!(AlwaysYes.confirm("anything"));
        assert!(!AlwaysNo.confirm("anything"));
    }
}
