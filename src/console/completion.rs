//! Tab completion for the console prompt

use std::sync::Arc;

use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Helper};

use super::command::COMMANDS;
use crate::manager::Controller;
use crate::registry::{StateDescriptor, StateRegistry};

/// Candidates for the word ending at the end of `line`
///
/// Returns the byte offset where the word starts and the matching names.
/// Only the command and its first argument are completed.
pub fn completions(
    line: &str,
    current: &StateDescriptor,
    registry: StateRegistry,
    tests: &[String],
) -> (usize, Vec<String>) {
    let start = line.rfind([' ', '\t']).map_or(0, |i| i + 1);
    let prefix = &line[start..];
    let words: Vec<&str> = line[..start].split_whitespace().collect();

    let candidates: Vec<&str> = match words.as_slice() {
        [] => COMMANDS.to_vec(),
        ["state"] => registry.states().iter().map(|desc| desc.name()).collect(),
        ["value"] => current.master.values.iter().map(|v| v.name()).collect(),
        ["event"] => current.master.events.iter().map(|e| e.name()).collect(),
        ["test"] => tests.iter().map(String::as_str).collect(),
        _ => Vec::new(),
    };

    let matches = candidates
        .into_iter()
        .filter(|c| c.starts_with(prefix))
        .map(str::to_string)
        .collect();
    (start, matches)
}

/// rustyline helper completing against the master's current state
pub struct ConsoleHelper {
    controller: Arc<dyn Controller>,
    registry: StateRegistry,
    tests: Vec<String>,
}

impl ConsoleHelper {
    pub fn new(controller: Arc<dyn Controller>, registry: StateRegistry, tests: Vec<String>) -> Self {
        Self {
            controller,
            registry,
            tests,
        }
    }
}

impl Completer for ConsoleHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let current = self.registry.get(self.controller.current_state());
        let (start, names) = completions(&line[..pos], current, self.registry, &self.tests);

        let pairs = names
            .into_iter()
            .map(|name| Pair {
                display: name.clone(),
                replacement: name,
            })
            .collect();
        Ok((start, pairs))
    }
}

impl Hinter for ConsoleHelper {
    type Hint = String;
}

impl Highlighter for ConsoleHelper {}

impl Validator for ConsoleHelper {}

impl Helper for ConsoleHelper {}
