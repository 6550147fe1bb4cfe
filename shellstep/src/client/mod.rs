//! Connected client: one SSH connection, many scripted sessions.

use std::path::PathBuf;
use std::time::Duration;

use log::info;
use secrecy::SecretString;

use crate::channel::{MultiplexerConfig, PtyConfig};
use crate::error::{ConfigError, Result, TransportError};
use crate::script::{RunnerConfig, ScriptBuilder, ScriptReport, ScriptRunner};
use crate::transport::config::DEFAULT_TIMEOUT;
use crate::transport::{AuthMethod, SshConfig, SshTransport};

/// Authentication as chosen on the builder, resolved in `build()`.
enum PendingAuth {
    Method(AuthMethod),
    DefaultKey(Option<SecretString>),
}

/// Builder for constructing clients.
///
/// # Example
///
/// ```rust,no_run
/// use shellstep::ClientBuilder;
/// use shellstep::recipes::{ChangelogDumpParams, changelog_dump};
///
/// # async fn example(params: ChangelogDumpParams) -> Result<(), shellstep::Error> {
/// let mut client = ClientBuilder::new("db01.internal")
///     .username("deploy")
///     .password("secret")
///     .build()?;
///
/// client.connect().await?;
/// let report = client.run_script(&changelog_dump, &params).await?;
/// println!("{}", report.full_output());
/// client.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    host: String,
    port: u16,
    username: Option<String>,
    auth: Option<PendingAuth>,
    timeout: Duration,
    runner: RunnerConfig,
}

impl ClientBuilder {
    /// Create a new client builder for the specified host.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 22,
            username: None,
            auth: None,
            timeout: DEFAULT_TIMEOUT,
            runner: RunnerConfig::default(),
        }
    }

    /// Set the SSH port (default: 22).
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the username for authentication.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set password authentication.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        let password = SecretString::from(password.into());
        self.auth = Some(PendingAuth::Method(AuthMethod::Password(password)));
        self
    }

    /// Set private key authentication.
    pub fn private_key(mut self, key_path: impl Into<PathBuf>) -> Self {
        self.auth = Some(PendingAuth::Method(AuthMethod::PrivateKey {
            path: key_path.into(),
            passphrase: None,
        }));
        self
    }

    /// Set private key authentication with passphrase.
    pub fn private_key_with_passphrase(
        mut self,
        key_path: impl Into<PathBuf>,
        passphrase: impl Into<String>,
    ) -> Self {
        self.auth = Some(PendingAuth::Method(AuthMethod::PrivateKey {
            path: key_path.into(),
            passphrase: Some(SecretString::from(passphrase.into())),
        }));
        self
    }

    /// Authenticate with `$HOME/.ssh/id_rsa`, decrypted with `passphrase`
    /// when given.
    pub fn default_key(mut self, passphrase: Option<String>) -> Self {
        self.auth = Some(PendingAuth::DefaultKey(passphrase.map(SecretString::from)));
        self
    }

    /// Set the connection timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the pseudo-terminal requested for each script.
    pub fn pty(mut self, pty: PtyConfig) -> Self {
        self.runner.pty = pty;
        self
    }

    /// Set the program started for each script (default: `/bin/bash`).
    pub fn program(mut self, program: impl Into<String>) -> Self {
        self.runner.program = program.into();
        self
    }

    /// Set the response buffer settings.
    pub fn multiplexer(mut self, multiplexer: MultiplexerConfig) -> Self {
        self.runner.multiplexer = multiplexer;
        self
    }

    /// Replace the whole runner configuration.
    pub fn runner(mut self, runner: RunnerConfig) -> Self {
        self.runner = runner;
        self
    }

    /// Build the client.
    ///
    /// This validates the configuration but does not connect. Call
    /// `connect()` on the returned client to establish the connection.
    pub fn build(self) -> Result<Client> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "host",
                message: "host is empty".to_string(),
            }
            .into());
        }
        if self.port == 0 {
            return Err(ConfigError::Invalid {
                field: "port",
                message: "port 0 is not connectable".to_string(),
            }
            .into());
        }

        let username = self
            .username
            .filter(|u| !u.is_empty())
            .ok_or(ConfigError::Missing { field: "username" })?;

        let auth = match self.auth.ok_or(ConfigError::Missing { field: "auth" })? {
            PendingAuth::Method(method) => method,
            PendingAuth::DefaultKey(passphrase) => {
                AuthMethod::default_key(passphrase).ok_or_else(|| ConfigError::Invalid {
                    field: "auth",
                    message: "HOME is not set, no default key".to_string(),
                })?
            }
        };

        if self.runner.program.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "program",
                message: "program is empty".to_string(),
            }
            .into());
        }

        let ssh = SshConfig {
            host: self.host,
            port: self.port,
            username,
            auth,
            timeout: self.timeout,
        };

        Ok(Client::new(ssh, ScriptRunner::new(self.runner)))
    }
}

/// A client that runs scripts over one SSH connection.
///
/// Each [`run_script`](Client::run_script) call opens a fresh session
/// channel with its own pseudo-terminal and shell.
pub struct Client {
    ssh: SshConfig,
    runner: ScriptRunner,
    transport: Option<SshTransport>,
}

impl Client {
    /// Create an unconnected client.
    pub fn new(ssh: SshConfig, runner: ScriptRunner) -> Self {
        Self {
            ssh,
            runner,
            transport: None,
        }
    }

    /// Connect and authenticate.
    pub async fn connect(&mut self) -> Result<()> {
        if self.transport.is_some() {
            return Err(TransportError::AlreadyConnected.into());
        }

        info!("connecting to {}", self.ssh.socket_addr());
        let transport = SshTransport::connect(&self.ssh).await?;
        self.transport = Some(transport);
        info!("connected to {}", self.ssh.socket_addr());
        Ok(())
    }

    /// Build a script from `params` and run it in a new remote shell.
    pub async fn run_script<B, P>(&self, builder: &B, params: &P) -> Result<ScriptReport>
    where
        B: ScriptBuilder<P> + ?Sized,
        P: ?Sized,
    {
        let transport = self
            .transport
            .as_ref()
            .ok_or(TransportError::NotConnected)?;

        let shell = transport.open_shell().await?;
        self.runner.run(shell, builder, params).await
    }

    /// Disconnect. Closing a client that is not connected does nothing.
    pub async fn close(&mut self) -> Result<()> {
        if let Some(transport) = self.transport.take() {
            transport.close().await?;
            info!("disconnected from {}", self.ssh.socket_addr());
        }
        Ok(())
    }

    /// Whether the client holds a live connection.
    pub fn is_connected(&self) -> bool {
        self.transport.as_ref().is_some_and(|t| !t.is_closed())
    }

    /// Get the SSH configuration.
    pub fn ssh_config(&self) -> &SshConfig {
        &self.ssh
    }

    /// Get the runner.
    pub fn runner(&self) -> &ScriptRunner {
        &self.runner
    }
}
