//! Channel-backed connection halves.
//!
//! Stand in for a WebSocket when driving relay sessions in-process: the client
//! end injects inbound frames and observes outbound ones.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::ports::connection::{ConnectionError, FrameSink, FrameSource};

/// Create a connected pair of server halves and a client end
pub fn duplex(capacity: usize) -> (ChannelFrameSink, ChannelFrameSource, ClientEnd) {
    let (inbound_tx, inbound_rx) = mpsc::channel(capacity);
    let (outbound_tx, outbound_rx) = mpsc::channel(capacity);
    (
        ChannelFrameSink {
            outbound: Some(outbound_tx),
        },
        ChannelFrameSource { inbound: inbound_rx },
        ClientEnd {
            to_server: Some(inbound_tx),
            from_server: outbound_rx,
        },
    )
}

/// Server-side outbound half
pub struct ChannelFrameSink {
    outbound: Option<mpsc::Sender<String>>,
}

#[async_trait]
impl FrameSink for ChannelFrameSink {
    async fn send_text(&mut self, text: String) -> Result<(), ConnectionError> {
        let sender = self.outbound.as_ref().ok_or(ConnectionError::Closed)?;
        sender.send(text).await.map_err(|_| ConnectionError::Closed)
    }

    async fn close(&mut self) -> Result<(), ConnectionError> {
        self.outbound = None;
        Ok(())
    }
}

/// Server-side inbound half
pub struct ChannelFrameSource {
    inbound: mpsc::Receiver<Result<String, ConnectionError>>,
}

#[async_trait]
impl FrameSource for ChannelFrameSource {
    async fn next_text(&mut self) -> Option<Result<String, ConnectionError>> {
        self.inbound.recv().await
    }
}

/// Client side of a `duplex` connection
pub struct ClientEnd {
    to_server: Option<mpsc::Sender<Result<String, ConnectionError>>>,
    from_server: mpsc::Receiver<String>,
}

impl ClientEnd {
    /// Send one text frame to the server
    pub async fn send(&self, text: impl Into<String>) -> Result<(), ConnectionError> {
        let sender = self.to_server.as_ref().ok_or(ConnectionError::Closed)?;
        sender
            .send(Ok(text.into()))
            .await
            .map_err(|_| ConnectionError::Closed)
    }

    /// Deliver a transport error to the server's read side
    pub async fn fail(&self, reason: impl Into<String>) -> Result<(), ConnectionError> {
        let sender = self.to_server.as_ref().ok_or(ConnectionError::Closed)?;
        sender
            .send(Err(ConnectionError::Transport(reason.into())))
            .await
            .map_err(|_| ConnectionError::Closed)
    }

    /// Next frame written by the server, `None` once the server closed
    pub async fn recv(&mut self) -> Option<String> {
        self.from_server.recv().await
    }

    /// Stop sending; the server sees a clean close
    pub fn hang_up(&mut self) {
        self.to_server = None;
    }

    /// Stop reading; further server writes fail
    pub fn stop_reading(&mut self) {
        self.from_server.close();
    }
}
