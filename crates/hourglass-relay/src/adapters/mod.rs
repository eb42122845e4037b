//! Adapters for the relay.
//!
//! Infrastructure implementations of the store and connection ports.

pub mod channel;
pub mod error_conversions;
pub mod memory_store;
pub mod redis_store;
pub mod websocket;

pub use channel::{duplex, ChannelFrameSink, ChannelFrameSource, ClientEnd};
pub use memory_store::{MemoryConnector, MemoryStore};
pub use redis_store::{RedisConnector, RedisStore};
pub use websocket::{split_socket, WsFrameSink, WsFrameSource};
