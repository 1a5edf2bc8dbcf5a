//! Command dispatch over the framed input stream.
//!
//! Every command is a discriminator frame (`show`, `scroll`, `base`)
//! followed by exactly one payload frame. Unknown discriminators carry no
//! payload and are skipped.

mod base;

use std::str::Utf8Error;

use bytes::Bytes;
use futures_util::Sink;
use serde::Serialize;
use thiserror::Error;
use tokio::io::AsyncRead;
use tokio_tungstenite::tungstenite::Message;

use crate::bridge::{BridgeError, ReplySink};
use crate::frame::{FrameError, FrameReader};
use crate::render::{RenderEngine, RenderError};

pub use base::normalize_base;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Show { content: String },
    Scroll { line: String },
    Base { path: String },
}

impl Command {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Show { .. } => "show",
            Self::Scroll { .. } => "scroll",
            Self::Base { .. } => "base",
        }
    }
}

/// Message sent to the display client, one per command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum Reply {
    Show { html: String, lcount: usize },
    Scroll { line: String },
    Base { base: String },
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("input ended before the `{command}` payload")]
    StreamEnded { command: &'static str },

    #[error("`{frame}` frame is not valid UTF-8: {source}")]
    Decode {
        frame: &'static str,
        #[source]
        source: Utf8Error,
    },

    #[error("failed to render markdown: {0}")]
    Render(#[from] RenderError),

    #[error(transparent)]
    Send(#[from] BridgeError),
}

/// Decodes commands from a frame stream, one at a time.
#[derive(Debug)]
pub struct Dispatcher<R> {
    frames: FrameReader<R>,
}

impl<R: AsyncRead + Unpin> Dispatcher<R> {
    pub const fn new(frames: FrameReader<R>) -> Self {
        Self { frames }
    }

    /// Read frames until a complete command is available.
    ///
    /// Returns `Ok(None)` when the input closes between commands.
    ///
    /// # Errors
    ///
    /// Fails on frame errors, on input ending where a payload is expected,
    /// and on frames that are not UTF-8.
    pub async fn next_command(&mut self) -> Result<Option<Command>, ProtocolError> {
        loop {
            let Some(frame) = self.frames.next_frame().await? else {
                return Ok(None);
            };
            let discriminator = decode(&frame, "command")?;
            let command = match discriminator {
                "show" => Command::Show {
                    content: self.payload("show").await?,
                },
                "scroll" => Command::Scroll {
                    line: self.payload("scroll").await?,
                },
                "base" => Command::Base {
                    path: self.payload("base").await?,
                },
                other => {
                    tracing::debug!(command = other, "ignoring unknown command");
                    continue;
                }
            };
            return Ok(Some(command));
        }
    }

    async fn payload(&mut self, command: &'static str) -> Result<String, ProtocolError> {
        let frame = self
            .frames
            .next_frame()
            .await?
            .ok_or(ProtocolError::StreamEnded { command })?;
        Ok(decode(&frame, command)?.to_owned())
    }
}

fn decode<'f>(frame: &'f Bytes, name: &'static str) -> Result<&'f str, ProtocolError> {
    std::str::from_utf8(frame).map_err(|source| ProtocolError::Decode {
        frame: name,
        source,
    })
}

/// Turn a command into its reply.
///
/// # Errors
///
/// Returns an error if rendering a `show` command fails.
pub fn build_reply(command: Command, engine: &RenderEngine) -> Result<Reply, RenderError> {
    Ok(match command {
        Command::Show { content } => {
            let doc = engine.render(&content)?;
            Reply::Show {
                html: doc.html,
                lcount: doc.line_count,
            }
        }
        Command::Scroll { line } => Reply::Scroll { line },
        Command::Base { path } => Reply::Base {
            base: normalize_base(&path),
        },
    })
}

/// Process commands until the input closes.
///
/// Each reply is sent and flushed before the next frame is read, so replies
/// leave in command order.
///
/// # Errors
///
/// Returns the first decode, render or send failure.
pub async fn run<R, S>(
    mut dispatcher: Dispatcher<R>,
    engine: &RenderEngine,
    sink: &mut ReplySink<S>,
) -> Result<(), ProtocolError>
where
    R: AsyncRead + Unpin,
    S: Sink<Message> + Unpin,
    BridgeError: From<S::Error>,
{
    while let Some(command) = dispatcher.next_command().await? {
        let name = command.name();
        tracing::debug!(command = name, "dispatching");
        let reply = build_reply(command, engine)?;
        sink.send(&reply).await?;
    }
    tracing::info!("input closed");
    Ok(())
}
