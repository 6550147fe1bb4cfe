//! Scripts: ordered step sequences run against one remote shell.
//!
//! A [`Script`] is a plain list of [`Step`] descriptors. Building one does no
//! I/O; the [`ScriptRunner`] binds it to a live [`CommandChannel`] and runs
//! the steps strictly in order, stopping at the first failure.
//!
//! # Example
//!
//! ```rust
//! use shellstep::script::{Script, Step};
//!
//! let script = Script::new()
//!     .run("mkdir -p /tmp/release")
//!     .validate()
//!     .run("chmod 777 /tmp/release")
//!     .validate()
//!     .exit();
//!
//! assert_eq!(script.len(), 5);
//! assert!(matches!(script.steps()[4], Step::Exit));
//! ```
//!
//! [`CommandChannel`]: crate::channel::CommandChannel

mod report;
mod runner;

pub use report::{ScriptReport, StepRecord};
pub use runner::{RunnerConfig, ScriptRunner, execute};

use std::fmt;

use secrecy::SecretString;

use crate::channel::Command;

/// One step of a script.
#[derive(Debug)]
pub enum Step {
    /// `su - <user>`, then the password at the `": "` prompt.
    SwitchUser { user: String, password: SecretString },

    /// Check that the previous command exited with status 0.
    Validate,

    /// Run a single command.
    Run(Command),

    /// Leave the current shell level. Ending the session is expected.
    Exit,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::SwitchUser { user, .. } => write!(f, "switch user to {}", user),
            Step::Validate => f.write_str("validate"),
            Step::Run(command) => write!(f, "run `{}`", command),
            Step::Exit => f.write_str("exit"),
        }
    }
}

/// An ordered sequence of steps.
#[derive(Debug, Default)]
pub struct Script {
    steps: Vec<Step>,
}

impl Script {
    /// Create an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step.
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Switch to another user with `su -`.
    pub fn switch_user(self, user: impl Into<String>, password: SecretString) -> Self {
        self.step(Step::SwitchUser {
            user: user.into(),
            password,
        })
    }

    /// Check the previous command's exit status.
    pub fn validate(self) -> Self {
        self.step(Step::Validate)
    }

    /// Run a command.
    pub fn run(self, command: impl Into<Command>) -> Self {
        self.step(Step::Run(command.into()))
    }

    /// Run a command whose text must not be logged.
    pub fn run_hidden(self, text: impl Into<String>) -> Self {
        self.step(Step::Run(Command::hidden(text)))
    }

    /// Leave the current shell level.
    pub fn exit(self) -> Self {
        self.step(Step::Exit)
    }

    /// The steps, in execution order.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl FromIterator<Step> for Script {
    fn from_iter<I: IntoIterator<Item = Step>>(iter: I) -> Self {
        Self {
            steps: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Script {
    type Item = &'a Step;
    type IntoIter = std::slice::Iter<'a, Step>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}

/// Produces the script to run from a set of parameters.
///
/// Any `Fn(&P) -> Script` is a builder. Builders do not fail; problems
/// surface while the script runs.
pub trait ScriptBuilder<P: ?Sized> {
    fn build(&self, params: &P) -> Script;
}

impl<P, F> ScriptBuilder<P> for F
where
    P: ?Sized,
    F: Fn(&P) -> Script,
{
    fn build(&self, params: &P) -> Script {
        self(params)
    }
}
