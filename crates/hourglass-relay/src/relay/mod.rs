//! Real-time relay.
//!
//! One [`RelaySession`] per connected client bridges the client connection to
//! the pub/sub channel named after its room.

pub mod session;

pub use session::{
    relay_inbound, serve_connection, DropReason, RelayOutcome, RelaySession, SessionError,
    SessionState, EPHEMERAL_ID_FIELD,
};
