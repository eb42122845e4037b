//! Real-time connection port.
//!
//! A relay session sees its client connection as two halves so the outbound
//! and inbound pumps can run as separate tasks.

use async_trait::async_trait;

/// Outbound half of a client connection
#[async_trait]
pub trait FrameSink: Send {
    /// Write one text frame
    async fn send_text(&mut self, text: String) -> Result<(), ConnectionError>;

    /// Close the connection. Closing twice is not an error.
    async fn close(&mut self) -> Result<(), ConnectionError>;
}

/// Inbound half of a client connection
#[async_trait]
pub trait FrameSource: Send {
    /// Next application text frame. `None` once the peer has closed.
    async fn next_text(&mut self) -> Option<Result<String, ConnectionError>>;
}

/// Connection I/O errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionError {
    /// The other side is gone
    #[error("connection closed")]
    Closed,
    /// Protocol or socket failure
    #[error("transport error: {0}")]
    Transport(String),
}
