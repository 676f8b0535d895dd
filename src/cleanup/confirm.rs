//! Operator confirmation channel

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use tracing::warn;

use super::pattern::SearchField;

/// What the operator is asked to approve
#[derive(Debug, Clone)]
pub struct ConfirmationRequest<'a> {
    pub pattern: &'a str,
    pub field: SearchField,
    pub matched: usize,
}

impl ConfirmationRequest<'_> {
    pub fn prompt(&self) -> String {
        format!(
            "Decline {} approved update(s) whose {} matches '{}'? [y/N] ",
            self.matched, self.field, self.pattern
        )
    }
}

/// Blocking yes/no gate in front of every interactive decline
pub trait Confirm: Send + Sync {
    fn confirm(&self, request: &ConfirmationRequest<'_>) -> bool;
}

/// Asks on stderr and reads the answer from stdin
pub struct ConsolePrompt;

impl Confirm for ConsolePrompt {
    fn confirm(&self, request: &ConfirmationRequest<'_>) -> bool {
        let mut stderr = io::stderr();
        if write!(stderr, "{}", request.prompt()).and_then(|_| stderr.flush()).is_err() {
            return false;
        }

        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(_) => is_yes(&answer),
            Err(e) => {
                warn!(error = %e, "Could not read confirmation, treating as no");
                false
            }
        }
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Answers yes without asking (`--yes`)
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&self, _request: &ConfirmationRequest<'_>) -> bool {
        true
    }
}

/// Replays a fixed list of answers and counts prompts.
///
/// Answers no once the script runs out, unless built with `always`.
#[derive(Default)]
pub struct ScriptedConfirm {
    answers: Mutex<VecDeque<bool>>,
    fallback: bool,
    prompts: AtomicUsize,
}

impl ScriptedConfirm {
    pub fn new(answers: impl IntoIterator<Item = bool>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().collect()),
            fallback: false,
            prompts: AtomicUsize::new(0),
        }
    }

    /// Same answer to every prompt
    pub fn always(answer: bool) -> Self {
        Self {
            fallback: answer,
            ..Self::default()
        }
    }

    pub fn prompt_count(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }
}

impl Confirm for ScriptedConfirm {
    fn confirm(&self, _request: &ConfirmationRequest<'_>) -> bool {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        self.answers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
            .unwrap_or(self.fallback)
    }
}
