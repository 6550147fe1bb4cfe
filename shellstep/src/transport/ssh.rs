//! SSH transport implementation using russh.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, trace, warn};
use russh::client::{self, Handle, Msg};
use russh::keys::{PrivateKeyWithHashAlg, PublicKey, load_secret_key};
use russh::{Channel, ChannelMsg, ChannelStream, Pty};
use secrecy::ExposeSecret;
use tokio::io::{AsyncReadExt, Chain, ReadHalf, WriteHalf};

use super::config::{AuthMethod, SshConfig};
use super::shell::RemoteShell;
use crate::channel::PtyConfig;
use crate::error::{ChannelError, Result, TransportError};

/// Interval between keepalive requests on an idle connection.
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// SSH transport wrapping russh client.
pub struct SshTransport {
    /// The russh session handle.
    session: Handle<SshHandler>,
}

impl SshTransport {
    /// Connect to the SSH server and authenticate.
    ///
    /// `config.timeout` bounds the handshake only. A connected session stays
    /// up through silent commands of any length; keepalives detect a dead
    /// peer instead.
    pub async fn connect(config: &SshConfig) -> Result<Self> {
        let ssh_config = Arc::new(client::Config {
            inactivity_timeout: None,
            keepalive_interval: Some(KEEPALIVE_INTERVAL),
            ..Default::default()
        });

        let handler = SshHandler {
            host: config.socket_addr(),
        };

        debug!("connecting to {}", config.socket_addr());
        let mut session = tokio::time::timeout(
            config.timeout,
            client::connect(ssh_config, (config.host.as_str(), config.port), handler),
        )
        .await
        .map_err(|_| TransportError::Timeout(config.timeout))?
        .map_err(|e| match e {
            russh::Error::IO(source) => TransportError::ConnectionFailed {
                host: config.host.clone(),
                port: config.port,
                source,
            },
            other => TransportError::Ssh(other),
        })?;

        Self::authenticate(&mut session, config).await?;
        debug!("authenticated as {}", config.username);

        Ok(Self { session })
    }

    /// Open a session channel, ready for a PTY and a program.
    pub async fn open_shell(&self) -> Result<SshShell> {
        let channel = self
            .session
            .channel_open_session()
            .await
            .map_err(TransportError::Ssh)?;

        Ok(SshShell {
            channel,
            pending: Vec::new(),
        })
    }

    /// Whether the underlying session is still up.
    pub fn is_closed(&self) -> bool {
        self.session.is_closed()
    }

    /// Authenticate with the server.
    async fn authenticate(session: &mut Handle<SshHandler>, config: &SshConfig) -> Result<()> {
        let success = match &config.auth {
            AuthMethod::Password(password) => session
                .authenticate_password(&config.username, password.expose_secret())
                .await
                .map_err(TransportError::Ssh)?
                .success(),
            AuthMethod::PrivateKey { path, passphrase } => {
                let key = load_secret_key(path, passphrase.as_ref().map(|p| p.expose_secret()))
                    .map_err(|e| TransportError::Key(format!("{}: {}", path.display(), e)))?;

                // Get the best RSA hash algorithm supported by the server
                let hash_alg = session
                    .best_supported_rsa_hash()
                    .await
                    .map_err(TransportError::Ssh)?
                    .flatten();

                session
                    .authenticate_publickey(
                        &config.username,
                        PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg),
                    )
                    .await
                    .map_err(TransportError::Ssh)?
                    .success()
            }
        };

        if !success {
            return Err(TransportError::AuthenticationFailed {
                user: config.username.clone(),
            }
            .into());
        }

        Ok(())
    }

    /// Close the connection.
    pub async fn close(self) -> Result<()> {
        self.session
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await
            .map_err(TransportError::Ssh)?;
        Ok(())
    }
}

/// One SSH session channel driven as a [`RemoteShell`].
pub struct SshShell {
    channel: Channel<Msg>,
    /// Terminal output that arrived before the last request was answered.
    pending: Vec<u8>,
}

impl SshShell {
    /// Wait for the server's answer to a request sent with `want_reply`.
    ///
    /// Output the program prints in the meantime is kept for the reader.
    async fn confirmed(&mut self) -> Result<bool> {
        loop {
            match self.channel.wait().await {
                Some(ChannelMsg::Success) => return Ok(true),
                Some(ChannelMsg::Failure) => return Ok(false),
                Some(ChannelMsg::Data { data }) => {
                    trace!("{} bytes before request reply", data.len());
                    self.pending.extend_from_slice(&data);
                }
                Some(_) => continue,
                None => return Err(ChannelError::Closed.into()),
            }
        }
    }
}

impl RemoteShell for SshShell {
    type Reader = Chain<Cursor<Vec<u8>>, ReadHalf<ChannelStream<Msg>>>;
    type Writer = WriteHalf<ChannelStream<Msg>>;

    async fn request_pty(&mut self, pty: &PtyConfig) -> Result<()> {
        let modes = [
            (Pty::ECHO, u32::from(pty.echo)),
            (Pty::TTY_OP_ISPEED, pty.input_speed),
            (Pty::TTY_OP_OSPEED, pty.output_speed),
        ];

        self.channel
            .request_pty(true, &pty.term, pty.columns, pty.rows, 0, 0, &modes)
            .await
            .map_err(|e| {
                warn!("pty request failed: {}", e);
                ChannelError::PtyRequestFailed
            })?;

        if !self.confirmed().await? {
            return Err(ChannelError::PtyRequestFailed.into());
        }
        Ok(())
    }

    async fn start(&mut self, program: &str) -> Result<()> {
        let failed = || ChannelError::ProgramStartFailed {
            program: program.to_string(),
        };

        self.channel.exec(true, program).await.map_err(|e| {
            warn!("exec request failed: {}", e);
            failed()
        })?;

        if !self.confirmed().await? {
            return Err(failed().into());
        }
        Ok(())
    }

    fn into_pipes(self) -> Result<(Self::Reader, Self::Writer)> {
        let (read, write) = tokio::io::split(self.channel.into_stream());
        Ok((Cursor::new(self.pending).chain(read), write))
    }
}

/// SSH client handler for russh.
struct SshHandler {
    host: String,
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        warn!(
            "accepting unverified {} host key for {}",
            server_public_key.algorithm(),
            self.host
        );
        Ok(true)
    }
}
