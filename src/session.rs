//! Session lifecycle.
//!
//! A session is open from the moment the display client connects until the
//! first terminal event. Whichever event fires first decides how the process
//! exits. Events that arrive after that are ignored.

use std::fmt;
use std::future::Future;
use std::sync::OnceLock;

use crate::bridge::BridgeError;
use crate::protocol::ProtocolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Terminated,
}

/// Why the session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// The editor closed its end of the input stream.
    InputClosed,
    /// The display client went away.
    PeerGone,
    /// The display process exited, with its exit code if it had one.
    DisplayExited(Option<i32>),
    Signal(&'static str),
    Fatal(String),
}

impl Termination {
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Fatal(_) => 1,
            _ => 0,
        }
    }

    /// Classify the outcome of the dispatch loop.
    pub fn from_dispatch(result: Result<(), ProtocolError>) -> Self {
        match result {
            Ok(()) => Self::InputClosed,
            Err(ProtocolError::Send(BridgeError::PeerGone)) => Self::PeerGone,
            Err(err) => Self::Fatal(err.to_string()),
        }
    }

    /// Classify the outcome of [`wait_for_signal`].
    pub fn from_signal(result: std::io::Result<&'static str>) -> Self {
        match result {
            Ok(name) => Self::Signal(name),
            Err(err) => Self::Fatal(format!("failed to listen for signals: {err}")),
        }
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InputClosed => write!(f, "input closed"),
            Self::PeerGone => write!(f, "display client disconnected"),
            Self::DisplayExited(Some(code)) => write!(f, "display exited with status {code}"),
            Self::DisplayExited(None) => write!(f, "display exited"),
            Self::Signal(name) => write!(f, "received {name}"),
            Self::Fatal(message) => write!(f, "fatal: {message}"),
        }
    }
}

/// One-way Open to Terminated transition shared by every shutdown path.
///
/// The first reason recorded decides the exit code.
#[derive(Debug, Default)]
pub struct Lifecycle {
    reason: OnceLock<Termination>,
}

impl Lifecycle {
    pub const fn new() -> Self {
        Self {
            reason: OnceLock::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        if self.reason.get().is_some() {
            SessionState::Terminated
        } else {
            SessionState::Open
        }
    }

    /// The event that ended the session, once there is one.
    pub fn reason(&self) -> Option<&Termination> {
        self.reason.get()
    }

    /// Exit code for the recorded reason; 0 while still open.
    pub fn exit_code(&self) -> i32 {
        self.reason().map_or(0, Termination::exit_code)
    }

    /// Move to Terminated. Only the first caller gets `true`.
    pub fn terminate(&self, reason: Termination) -> bool {
        let summary = reason.to_string();
        let fatal = matches!(reason, Termination::Fatal(_));
        match self.reason.set(reason) {
            Ok(()) if fatal => {
                tracing::error!(reason = %summary, "session terminated");
                true
            }
            Ok(()) => {
                tracing::info!(reason = %summary, "session terminated");
                true
            }
            Err(late) => {
                tracing::debug!(reason = %late, "session already terminated");
                false
            }
        }
    }
}

/// Wait for a termination signal and return its name.
#[cfg(unix)]
pub async fn wait_for_signal() -> std::io::Result<&'static str> {
    use futures_util::future::select_all;
    use tokio::signal::unix::{SignalKind, signal};

    let kinds = [
        (SignalKind::interrupt(), "SIGINT"),
        (SignalKind::user_defined2(), "SIGUSR2"),
        (SignalKind::terminate(), "SIGTERM"),
        (SignalKind::pipe(), "SIGPIPE"),
        (SignalKind::hangup(), "SIGHUP"),
    ];
    let mut streams = Vec::with_capacity(kinds.len());
    for (kind, name) in kinds {
        streams.push((signal(kind)?, name));
    }
    let waits = streams.iter_mut().map(|(stream, name)| {
        let name = *name;
        Box::pin(async move {
            stream.recv().await;
            name
        })
    });
    let (name, _, _) = select_all(waits).await;
    Ok(name)
}

/// Wait for a termination signal and return its name.
#[cfg(not(unix))]
pub async fn wait_for_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("Ctrl-C")
}

/// Race every way a session can end and record the first in `lifecycle`.
pub async fn run_session<D, P, X, S>(
    lifecycle: &Lifecycle,
    dispatch: D,
    peer_closed: P,
    display_exit: X,
    signal: S,
) where
    D: Future<Output = Result<(), ProtocolError>>,
    P: Future<Output = ()>,
    X: Future<Output = Option<i32>>,
    S: Future<Output = std::io::Result<&'static str>>,
{
    let reason = tokio::select! {
        result = dispatch => Termination::from_dispatch(result),
        () = peer_closed => Termination::PeerGone,
        code = display_exit => Termination::DisplayExited(code),
        signal = signal => Termination::from_signal(signal),
    };
    lifecycle.terminate(reason);
}
