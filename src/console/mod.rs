//! Interactive debug console for the master board
//!
//! Lines are parsed into [`ConsoleCommand`]s and executed against a
//! [`Controller`]. Execution returns the text to print, so the console can be
//! driven without a terminal. [`run_repl`] wires it to a rustyline prompt and
//! prints value reports from the master as they arrive.

pub mod command;
pub mod completion;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use colored::*;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{Editor, ExternalPrinter};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::{TestSequence, ALL_TESTS};
use crate::link::LinkError;
use crate::manager::{trigger, Controller};
use crate::protocol::{Command, ValueReport};
use crate::registry::{StateId, StateRegistry, ValueError};

pub use command::{ConsoleCommand, COMMANDS, HELP_TEXT};
pub use completion::{completions, ConsoleHelper};

/// Errors shown to the user; none of them end the session
#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("no such command '{0}'")]
    UnknownCommand(String),

    #[error("Usage: {0}")]
    Usage(&'static str),

    #[error("no state named '{0}'")]
    UnknownState(String),

    #[error("no value named '{name}' in state {state}")]
    UnknownValue { name: String, state: StateId },

    #[error("no event named '{name}' in state {state}")]
    UnknownEvent { name: String, state: StateId },

    #[error("No tests have been defined for this console.")]
    NoTests,

    #[error("No test named '{name}'. Options are: {options}")]
    UnknownTest { name: String, options: String },

    #[error("step '{step}' needs argument ${index}")]
    MissingArgument { step: String, index: usize },

    #[error("'{0}' cannot be used inside a test")]
    NotInTest(String),

    #[error("bad wait step '{0}', expected: wait MS")]
    BadWait(String),

    #[error(transparent)]
    Value(#[from] ValueError),

    #[error(transparent)]
    Link(#[from] LinkError),
}

/// Result of executing one line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Continue(String),
    Quit,
}

/// Console state: the controller plus the scripted tests
pub struct Console {
    controller: Arc<dyn Controller>,
    registry: StateRegistry,
    tests: Vec<TestSequence>,
}

impl Console {
    pub fn new(controller: Arc<dyn Controller>, registry: StateRegistry, tests: Vec<TestSequence>) -> Self {
        Self {
            controller,
            registry,
            tests,
        }
    }

    /// Prompt showing the current state
    pub fn prompt(&self) -> String {
        format!("{}> ", self.controller.current_state())
    }

    /// Test names offered by `test`, including `all` when any exist
    pub fn test_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tests.iter().map(|t| t.name.clone()).collect();
        if !names.is_empty() {
            names.push(ALL_TESTS.to_string());
        }
        names
    }

    pub fn helper(&self) -> ConsoleHelper {
        ConsoleHelper::new(self.controller.clone(), self.registry, self.test_names())
    }

    /// Parse and run one line
    pub fn execute(&self, line: &str) -> Result<Outcome, ConsoleError> {
        match ConsoleCommand::parse(line)? {
            ConsoleCommand::Quit => Ok(Outcome::Quit),
            ConsoleCommand::RunTest { name, args } => self.run_tests(&name, &args).map(Outcome::Continue),
            ConsoleCommand::ListTests => self.list_tests().map(Outcome::Continue),
            other => self.apply(other).map(Outcome::Continue),
        }
    }

    /// Commands that are allowed both at the prompt and inside a test
    fn apply(&self, command: ConsoleCommand) -> Result<String, ConsoleError> {
        let current = self.registry.get(self.controller.current_state());

        match command {
            ConsoleCommand::Nothing => Ok(String::new()),
            ConsoleCommand::Help => Ok(HELP_TEXT.to_string()),

            ConsoleCommand::ListStates => Ok(self
                .registry
                .states()
                .iter()
                .map(|desc| desc.name())
                .collect::<Vec<_>>()
                .join("\n")),

            ConsoleCommand::SetState(name) => {
                let desc = self
                    .registry
                    .by_name(&name)
                    .ok_or(ConsoleError::UnknownState(name))?;
                self.controller.set_state(desc.state)?;
                Ok(String::new())
            }

            ConsoleCommand::ListValues => Ok(current
                .master
                .values
                .iter()
                .map(|v| format!("{}: {}", v.name(), v.data_type()))
                .collect::<Vec<_>>()
                .join("\n")),

            ConsoleCommand::SetValue { name, value } => {
                let slot = current.master_value(&name).ok_or(ConsoleError::UnknownValue {
                    name,
                    state: current.state,
                })?;
                self.controller.submit(Command::set_value(slot, &value)?)?;
                Ok(String::new())
            }

            ConsoleCommand::ListEvents => Ok(current
                .master
                .events
                .iter()
                .map(|e| e.name())
                .collect::<Vec<_>>()
                .join("\n")),

            ConsoleCommand::SendEvent(name) => {
                let event = current.master_event(&name).ok_or(ConsoleError::UnknownEvent {
                    name,
                    state: current.state,
                })?;
                trigger(self.controller.as_ref(), event);
                Ok(String::new())
            }

            ConsoleCommand::Quit => Err(ConsoleError::NotInTest("quit".to_string())),
            ConsoleCommand::ListTests | ConsoleCommand::RunTest { .. } => {
                Err(ConsoleError::NotInTest("test".to_string()))
            }
        }
    }

    fn list_tests(&self) -> Result<String, ConsoleError> {
        if self.tests.is_empty() {
            return Err(ConsoleError::NoTests);
        }
        Ok(self
            .test_names()
            .iter()
            .map(|name| format!("  {}", name))
            .collect::<Vec<_>>()
            .join("\n"))
    }

    fn run_tests(&self, name: &str, args: &[String]) -> Result<String, ConsoleError> {
        if self.tests.is_empty() {
            return Err(ConsoleError::NoTests);
        }

        if name == ALL_TESTS {
            let mut report = Vec::new();
            for test in &self.tests {
                let (passed, text) = self.run_test(test, args);
                report.push(text);
                if !passed {
                    break;
                }
            }
            report.push(format!("{} finished", ALL_TESTS));
            return Ok(report.join("\n"));
        }

        let test = self
            .tests
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| ConsoleError::UnknownTest {
                name: name.to_string(),
                options: self.test_names().join(", "),
            })?;
        Ok(self.run_test(test, args).1)
    }

    /// Run one sequence; a failing step stops it and is reported in the text
    fn run_test(&self, test: &TestSequence, args: &[String]) -> (bool, String) {
        info!("Running test '{}'", test.name);
        let mut output = Vec::new();

        for step in &test.steps {
            match self.run_step(step, args) {
                Ok(text) => {
                    if !text.is_empty() {
                        output.push(text);
                    }
                }
                Err(e) => {
                    warn!("Test '{}' failed at '{}': {}", test.name, step, e);
                    output.push(format!("{} failed: {}", test.name, e));
                    return (false, output.join("\n"));
                }
            }
        }

        output.push(format!("{} finished", test.name));
        (true, output.join("\n"))
    }

    fn run_step(&self, step: &str, args: &[String]) -> Result<String, ConsoleError> {
        let line = substitute_args(step, args)?;
        debug!("Test step: {}", line);

        let mut words = line.split_whitespace();
        if words.next() == Some("wait") {
            let ms: u64 = match (words.next().map(str::parse), words.next()) {
                (Some(Ok(ms)), None) => ms,
                _ => return Err(ConsoleError::BadWait(line)),
            };
            std::thread::sleep(Duration::from_millis(ms));
            return Ok(String::new());
        }

        self.apply(ConsoleCommand::parse(&line)?)
    }
}

/// Replace `$1`..`$n` in a step with the test's arguments
fn substitute_args(step: &str, args: &[String]) -> Result<String, ConsoleError> {
    let mut words = Vec::new();
    for word in step.split_whitespace() {
        match word.strip_prefix('$').and_then(|n| n.parse::<usize>().ok()) {
            Some(index) if index >= 1 => {
                let arg = args.get(index - 1).ok_or_else(|| ConsoleError::MissingArgument {
                    step: step.to_string(),
                    index,
                })?;
                words.push(arg.as_str());
            }
            _ => words.push(word),
        }
    }
    Ok(words.join(" "))
}

/// Run the interactive prompt until `quit` or end of input
///
/// The prompt runs on a blocking thread. Value reports are printed above the
/// prompt with a timestamp while the user types.
pub async fn run_repl(console: Console, reports: Option<mpsc::Receiver<ValueReport>>) -> Result<()> {
    tokio::task::spawn_blocking(move || repl_loop(console, reports))
        .await
        .context("Console task panicked")?
}

fn repl_loop(console: Console, reports: Option<mpsc::Receiver<ValueReport>>) -> Result<()> {
    let mut rl: Editor<ConsoleHelper, DefaultHistory> = Editor::new()?;
    rl.set_helper(Some(console.helper()));

    if let Some(mut rx) = reports {
        let mut printer = rl.create_external_printer()?;
        std::thread::spawn(move || {
            while let Some(report) = rx.blocking_recv() {
                let line = format!(
                    "{} {}",
                    chrono::Local::now().format("%H:%M:%S%.3f").to_string().dimmed(),
                    report.to_string().cyan()
                );
                if printer.print(line).is_err() {
                    break;
                }
            }
            debug!("Report printer stopped");
        });
    }

    println!("try \"help\" for help");

    loop {
        match rl.readline(&console.prompt()) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = rl.add_history_entry(line.as_str());
                }

                match console.execute(&line) {
                    Ok(Outcome::Quit) => break,
                    Ok(Outcome::Continue(text)) => {
                        if !text.is_empty() {
                            println!("{}", text);
                        }
                    }
                    Err(e) => println!("{}", e.to_string().red()),
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e).context("Failed to read console input"),
        }
    }

    Ok(())
}
