//! Optional external display process.
//!
//! The display command is a program plus arguments. `{addr}` is replaced
//! with the bridge's listening address and `{theme}` with the theme name
//! before the process is spawned.

use std::io;
use std::net::SocketAddr;
use std::process::Stdio;

use thiserror::Error;
use tokio::process::{Child, Command};

#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("display command is empty")]
    Empty,

    #[error("failed to start display `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayCommand {
    program: String,
    args: Vec<String>,
}

impl DisplayCommand {
    /// Split a command line on whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`DisplayError::Empty`] for a blank command line.
    pub fn parse(command_line: &str) -> Result<Self, DisplayError> {
        let mut words = command_line.split_whitespace().map(ToOwned::to_owned);
        let program = words.next().ok_or(DisplayError::Empty)?;
        Ok(Self {
            program,
            args: words.collect(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments with placeholders filled in.
    pub fn expand(&self, addr: SocketAddr, theme: &str) -> Vec<String> {
        let addr = addr.to_string();
        self.args
            .iter()
            .map(|arg| arg.replace("{addr}", &addr).replace("{theme}", theme))
            .collect()
    }

    /// Start the display process. It is killed if the handle is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`DisplayError::Spawn`] if the program cannot be started.
    pub fn spawn(&self, addr: SocketAddr, theme: &str) -> Result<DisplayProcess, DisplayError> {
        let args = self.expand(addr, theme);
        tracing::info!(program = %self.program, ?args, "starting display");
        let child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| DisplayError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        Ok(DisplayProcess { child })
    }
}

#[derive(Debug)]
pub struct DisplayProcess {
    child: Child,
}

impl DisplayProcess {
    /// Wait for the process to exit and return its exit code, if any.
    pub async fn wait(&mut self) -> Option<i32> {
        match self.child.wait().await {
            Ok(status) => {
                tracing::debug!(%status, "display exited");
                status.code()
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to wait for display");
                None
            }
        }
    }
}
