//! Ready-made scripts for recurring remote chores.
//!
//! Each recipe is a plain [`ScriptBuilder`](crate::script::ScriptBuilder):
//! a function from its parameters to a [`Script`](crate::script::Script).

pub mod changelog_dump;

pub use changelog_dump::{ChangelogDumpParams, changelog_dump};
