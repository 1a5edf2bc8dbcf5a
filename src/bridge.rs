//! WebSocket bridge to the single display client.
//!
//! The bridge accepts exactly one connection. Its write half becomes a
//! [`ReplySink`] owned by the dispatch loop, its read half a [`PeerMonitor`]
//! that only watches for the client going away.

use std::convert::Infallible;
use std::io;
use std::net::SocketAddr;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{Sink, SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{WebSocketStream, accept_async};

use crate::protocol::Reply;

pub type SocketSink = SplitSink<WebSocketStream<TcpStream>, Message>;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("failed to accept connection: {0}")]
    Accept(#[source] io::Error),

    #[error("websocket handshake failed: {0}")]
    Handshake(#[source] tungstenite::Error),

    #[error("display client disconnected")]
    PeerGone,

    #[error("websocket transport error: {0}")]
    Transport(#[source] tungstenite::Error),

    #[error("failed to encode reply: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<tungstenite::Error> for BridgeError {
    fn from(err: tungstenite::Error) -> Self {
        if is_peer_gone(&err) {
            Self::PeerGone
        } else {
            Self::Transport(err)
        }
    }
}

impl From<Infallible> for BridgeError {
    fn from(err: Infallible) -> Self {
        match err {}
    }
}

fn is_peer_gone(err: &tungstenite::Error) -> bool {
    match err {
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => true,
        tungstenite::Error::Protocol(tungstenite::error::ProtocolError::SendAfterClosing) => true,
        tungstenite::Error::Io(io_err) => matches!(
            io_err.kind(),
            io::ErrorKind::BrokenPipe
                | io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::NotConnected
        ),
        _ => false,
    }
}

/// Listening socket waiting for the display client.
#[derive(Debug)]
pub struct Bridge {
    listener: TcpListener,
}

impl Bridge {
    /// Bind the listening socket. Port 0 picks an ephemeral port.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn bind(addr: impl ToSocketAddrs) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener })
    }

    /// # Errors
    ///
    /// Returns an error if the socket has no local address.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept the one display client and complete the WebSocket handshake.
    ///
    /// The listener is dropped afterwards, so later connections are refused.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Accept`] or [`BridgeError::Handshake`].
    pub async fn accept(self) -> Result<(ReplySink<SocketSink>, PeerMonitor), BridgeError> {
        let (stream, peer) = self.listener.accept().await.map_err(BridgeError::Accept)?;
        let socket = accept_async(stream).await.map_err(BridgeError::Handshake)?;
        tracing::info!(%peer, "display client connected");

        let (sink, stream) = socket.split();
        Ok((ReplySink::new(sink), PeerMonitor { stream }))
    }
}

/// Write half of the connection; sends one JSON text message per reply.
#[derive(Debug)]
pub struct ReplySink<S> {
    inner: S,
}

impl<S> ReplySink<S>
where
    S: Sink<Message> + Unpin,
    BridgeError: From<S::Error>,
{
    pub const fn new(inner: S) -> Self {
        Self { inner }
    }

    /// Serialize `reply` and wait until it is flushed to the client.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::PeerGone`] when the client is gone,
    /// [`BridgeError::Encode`] if serialization fails, and
    /// [`BridgeError::Transport`] for anything else.
    pub async fn send(&mut self, reply: &Reply) -> Result<(), BridgeError> {
        let text = serde_json::to_string(reply)?;
        tracing::trace!(bytes = text.len(), "sending reply");
        self.inner.send(Message::Text(text)).await?;
        Ok(())
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

/// Read half of the connection.
#[derive(Debug)]
pub struct PeerMonitor {
    stream: SplitStream<WebSocketStream<TcpStream>>,
}

impl PeerMonitor {
    /// Resolve once the client closes the connection or the stream fails.
    ///
    /// Inbound data messages are ignored. Reading keeps ping/pong handling
    /// alive.
    pub async fn closed(mut self) {
        while let Some(message) = self.stream.next().await {
            match message {
                Ok(Message::Close(frame)) => {
                    tracing::debug!(?frame, "display client sent close");
                    return;
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::debug!(error = %err, "display connection failed");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_connection_is_peer_gone() {
        assert!(matches!(
            BridgeError::from(tungstenite::Error::ConnectionClosed),
            BridgeError::PeerGone
        ));
        assert!(matches!(
            BridgeError::from(tungstenite::Error::AlreadyClosed),
            BridgeError::PeerGone
        ));
    }

    #[test]
    fn test_broken_pipe_is_peer_gone() {
        let err = tungstenite::Error::Io(io::Error::from(io::ErrorKind::BrokenPipe));
        assert!(matches!(BridgeError::from(err), BridgeError::PeerGone));
    }

    #[test]
    fn test_other_io_error_is_transport() {
        let err = tungstenite::Error::Io(io::Error::other("disk on fire"));
        assert!(matches!(BridgeError::from(err), BridgeError::Transport(_)));
    }

    #[tokio::test]
    async fn test_send_writes_compact_json_text() {
        let mut sink = ReplySink::new(Vec::<Message>::new());
        sink.send(&Reply::Scroll {
            line: "12".to_string(),
        })
        .await
        .unwrap();

        assert_eq!(
            sink.into_inner(),
            vec![Message::Text(
                "{\"action\":\"scroll\",\"line\":\"12\"}".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let bridge = Bridge::bind("127.0.0.1:0").await.unwrap();
        assert_ne!(bridge.local_addr().unwrap().port(), 0);
    }
}
