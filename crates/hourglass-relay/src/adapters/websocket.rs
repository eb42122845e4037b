//! axum WebSocket halves as relay connection ports.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tracing::debug;

use crate::ports::connection::{ConnectionError, FrameSink, FrameSource};

/// Split an upgraded socket into relay halves
pub fn split_socket(socket: WebSocket) -> (WsFrameSink, WsFrameSource) {
    let (sink, stream) = socket.split();
    (
        WsFrameSink {
            inner: sink,
            closed: false,
        },
        WsFrameSource { inner: stream },
    )
}

/// Outbound half of an axum WebSocket
pub struct WsFrameSink {
    inner: SplitSink<WebSocket, Message>,
    closed: bool,
}

#[async_trait]
impl FrameSink for WsFrameSink {
    async fn send_text(&mut self, text: String) -> Result<(), ConnectionError> {
        if self.closed {
            return Err(ConnectionError::Closed);
        }
        self.inner
            .send(Message::Text(text))
            .await
            .map_err(|e| ConnectionError::Transport(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), ConnectionError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        // Peer may already be gone; nothing left to do in that case
        if let Err(e) = self.inner.close().await {
            debug!(error = %e, "WebSocket close after peer disconnect");
        }
        Ok(())
    }
}

/// Inbound half of an axum WebSocket
pub struct WsFrameSource {
    inner: SplitStream<WebSocket>,
}

#[async_trait]
impl FrameSource for WsFrameSource {
    async fn next_text(&mut self) -> Option<Result<String, ConnectionError>> {
        loop {
            match self.inner.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Binary(data)) => match String::from_utf8(data) {
                    Ok(text) => return Some(Ok(text)),
                    Err(_) => debug!("Ignoring non-UTF-8 binary frame"),
                },
                // axum answers pings itself
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
                Ok(Message::Close(_)) => return None,
                Err(e) => return Some(Err(ConnectionError::Transport(e.to_string()))),
            }
        }
    }
}
