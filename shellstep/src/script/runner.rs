//! Script runner: owns one remote shell from PTY allocation to program exit.
//!
//! The session moves through a fixed sequence of stages:
//!
//! 1. allocate a pseudo-terminal (fixed size, echo off);
//! 2. start the shell program and wire its pipes into a [`PtyMultiplexer`];
//! 3. discard the startup banner, so the first scripted command is paired
//!    with its own output rather than the initial prompt;
//! 4. run the script's steps strictly in order;
//! 5. wait for the program to close the terminal.
//!
//! Any failure along the way ends the run. There is no retry and no rollback
//! of steps that already ran.

use std::time::Instant;

use log::{debug, info, trace, warn};
use secrecy::ExposeSecret;
use serde::Deserialize;

use super::report::{ScriptReport, StepRecord};
use super::{Script, ScriptBuilder, Step};
use crate::channel::{
    Command, CommandChannel, MultiplexerConfig, PtyConfig, PtyMultiplexer, Response,
};
use crate::error::{Result, ScriptError};
use crate::transport::RemoteShell;

/// Configuration for script runs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Pseudo-terminal requested for the shell.
    pub pty: PtyConfig,

    /// Program started on the pseudo-terminal.
    pub program: String,

    /// Response buffer settings.
    pub multiplexer: MultiplexerConfig,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            pty: PtyConfig::default(),
            program: "/bin/bash".to_string(),
            multiplexer: MultiplexerConfig::default(),
        }
    }
}

/// Runs scripts against remote shells.
#[derive(Debug, Clone, Default)]
pub struct ScriptRunner {
    config: RunnerConfig,
}

impl ScriptRunner {
    /// Create a runner with the given configuration.
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    /// Get the configuration.
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Prepare `shell` for scripting and return a channel positioned after
    /// the startup banner.
    pub async fn open<S: RemoteShell>(&self, mut shell: S) -> Result<CommandChannel> {
        let pty = &self.config.pty;
        shell.request_pty(pty).await?;
        debug!(
            "pty allocated: {} {}x{}, echo {}",
            pty.term, pty.columns, pty.rows, pty.echo
        );

        shell.start(&self.config.program).await?;
        debug!("started {}", self.config.program);

        let (source, sink) = shell.into_pipes()?;
        let mut mux = PtyMultiplexer::new(source, sink, self.config.multiplexer);

        let banner = mux.receive().await?;
        trace!("discarded banner ({} bytes)", banner.len());

        Ok(CommandChannel::new(mux))
    }

    /// Build a script from `params` and run it on `shell`.
    ///
    /// Returns after the remote program has closed the terminal, so the
    /// script is expected to end by exiting the shell.
    pub async fn run<S, B, P>(&self, shell: S, builder: &B, params: &P) -> Result<ScriptReport>
    where
        S: RemoteShell,
        B: ScriptBuilder<P> + ?Sized,
        P: ?Sized,
    {
        let mut channel = self.open(shell).await?;

        let script = builder.build(params);
        info!("running script of {} steps", script.len());

        let report = execute(&mut channel, &script).await?;

        channel.wait().await;
        info!("script finished in {:?}", report.elapsed);
        Ok(report)
    }
}

/// Run every step of `script` in order on an open channel.
///
/// Stops at the first failing step. An `Exit` step that ends the session is
/// not a failure; any other step that finds the session gone is.
pub async fn execute(channel: &mut CommandChannel, script: &Script) -> Result<ScriptReport> {
    let start = Instant::now();
    let mut report = ScriptReport::default();

    for (index, step) in script.steps().iter().enumerate() {
        debug!("step {}: {}", index, step);
        let step_start = Instant::now();

        let responses = match execute_step(channel, step).await {
            Ok(responses) => responses,
            Err(e) if e.is_closed() => {
                if let Step::Exit = step {
                    debug!("step {}: session ended", index);
                    report.session_closed = true;
                    Vec::new()
                } else {
                    warn!("step {} ({}): session ended", index, step);
                    return Err(ScriptError::SessionEnded { step: index }.into());
                }
            }
            Err(e) => {
                warn!("step {} ({}) failed: {}", index, step, e);
                return Err(e);
            }
        };

        report.steps.push(StepRecord {
            index,
            description: step.to_string(),
            responses,
            elapsed: step_start.elapsed(),
        });
    }

    report.elapsed = start.elapsed();
    Ok(report)
}

async fn execute_step(channel: &mut CommandChannel, step: &Step) -> Result<Vec<Response>> {
    match step {
        Step::SwitchUser { user, password } => {
            let prompt = channel
                .execute(&Command::new(format!("su - {}", user)))
                .await?;
            let shell = channel
                .execute(&Command::hidden(password.expose_secret()))
                .await?;
            Ok(vec![prompt, shell])
        }
        Step::Validate => {
            channel.valid().await?;
            Ok(Vec::new())
        }
        Step::Run(command) => Ok(vec![channel.execute(command).await?]),
        Step::Exit => Ok(vec![channel.execute(&Command::new("exit")).await?]),
    }
}
