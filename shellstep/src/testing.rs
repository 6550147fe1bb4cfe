//! In-memory remote shell for tests.
//!
//! [`FakeShell`] plays a small subset of bash behind a duplex stream:
//! `su - <user>` with a password prompt, `echo $?`, nested `exit`, and
//! commands that succeed or fail by configured fragment. Every line the
//! shell receives is recorded.

use std::sync::{Arc, Mutex};

use tokio::io::{
    AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, ReadHalf, WriteHalf, duplex, split,
};

use crate::channel::PtyConfig;
use crate::error::{ChannelError, Result};
use crate::transport::RemoteShell;

pub(crate) type History = Arc<Mutex<Vec<String>>>;

pub(crate) struct FakeShell {
    local: DuplexStream,
    remote: Option<DuplexStream>,
    password: String,
    failing: Vec<String>,
    refuse_pty: bool,
    requested_pty: Arc<Mutex<Option<PtyConfig>>>,
    history: History,
}

impl FakeShell {
    pub(crate) fn new() -> Self {
        let (local, remote) = duplex(4096);
        Self {
            local,
            remote: Some(remote),
            password: "password".to_string(),
            failing: Vec::new(),
            refuse_pty: false,
            requested_pty: Arc::new(Mutex::new(None)),
            history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Password accepted by `su`.
    pub(crate) fn password(mut self, password: &str) -> Self {
        self.password = password.to_string();
        self
    }

    /// Commands containing `fragment` exit with status 1.
    pub(crate) fn failing(mut self, fragment: &str) -> Self {
        self.failing.push(fragment.to_string());
        self
    }

    pub(crate) fn refuse_pty(mut self) -> Self {
        self.refuse_pty = true;
        self
    }

    /// Lines received by the shell, in order.
    pub(crate) fn history(&self) -> History {
        self.history.clone()
    }

    pub(crate) fn requested_pty(&self) -> Arc<Mutex<Option<PtyConfig>>> {
        self.requested_pty.clone()
    }
}

impl RemoteShell for FakeShell {
    type Reader = ReadHalf<DuplexStream>;
    type Writer = WriteHalf<DuplexStream>;

    async fn request_pty(&mut self, pty: &PtyConfig) -> Result<()> {
        if self.refuse_pty {
            return Err(ChannelError::PtyRequestFailed.into());
        }
        *self.requested_pty.lock().unwrap() = Some(pty.clone());
        Ok(())
    }

    async fn start(&mut self, program: &str) -> Result<()> {
        let remote = self
            .remote
            .take()
            .ok_or_else(|| ChannelError::ProgramStartFailed {
                program: program.to_string(),
            })?;

        tokio::spawn(bash(
            remote,
            self.password.clone(),
            self.failing.clone(),
            self.history.clone(),
        ));
        Ok(())
    }

    fn into_pipes(self) -> Result<(Self::Reader, Self::Writer)> {
        Ok(split(self.local))
    }
}

fn prompt(users: &[String]) -> String {
    let user = users.last().map(String::as_str).unwrap_or("root");
    format!("{}@db01:~$ ", user)
}

async fn bash(
    remote: DuplexStream,
    password: String,
    failing: Vec<String>,
    history: History,
) -> std::io::Result<()> {
    let (input, mut output) = split(remote);
    let mut input = BufReader::new(input);

    let mut users = vec!["deploy".to_string()];
    let mut status = 0;
    let mut switching: Option<String> = None;

    output
        .write_all(format!("Last login Mon Oct 12 09:14\r\n{}", prompt(&users)).as_bytes())
        .await?;

    let mut line = String::new();
    loop {
        line.clear();
        if input.read_line(&mut line).await? == 0 {
            return Ok(());
        }
        let command = line.trim_end().to_string();
        history.lock().unwrap().push(command.clone());

        let reply = if let Some(user) = switching.take() {
            if command == password {
                users.push(user);
                status = 0;
                String::new()
            } else {
                status = 1;
                "su Authentication failure\r\n".to_string()
            }
        } else if let Some(user) = command.strip_prefix("su - ") {
            switching = Some(user.to_string());
            output.write_all(b"Password: ").await?;
            continue;
        } else if command == "echo $?" {
            let reply = format!("{}\r\n", status);
            status = 0;
            reply
        } else if command == "exit" {
            if users.len() == 1 {
                output.write_all(b"logout\r\n").await?;
                return Ok(());
            }
            users.pop();
            status = 0;
            "logout\r\n".to_string()
        } else if failing.iter().any(|f| command.contains(f.as_str())) {
            status = 1;
            format!("{} failed\r\n", command)
        } else {
            status = 0;
            format!("{}\r\n", command)
        };

        output
            .write_all(format!("{}{}", reply, prompt(&users)).as_bytes())
            .await?;
    }
}
