//! Relay session: bridges one client connection to its room's channel.
//!
//! Two pumps run as separate tasks under one cancellation scope:
//!
//! - store to connection: every message published on the room channel is
//!   written verbatim to the client
//! - connection to store: every inbound frame addressed by `ephemeralId` is
//!   resolved to its owner's room and published there unmodified
//!
//! Whichever pump stops first cancels the other. Both are awaited before the
//! connection is closed, and the subscription is released when the outbound
//! pump returns.

use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::domain::hour::HourId;
use crate::domain::session_id::SessionId;
use crate::ports::connection::{ConnectionError, FrameSink, FrameSource};
use crate::ports::store::{ChannelSubscription, SignalStore, StoreError};
use crate::router::DualStoreRouter;

/// JSON field carrying the recipient's pseudonym
pub const EPHEMERAL_ID_FIELD: &str = "ephemeralId";

/// Upper bound on closing a client connection during teardown
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Room known, store resolved, subscription not yet active
    Joining,
    /// Subscribed and pumping in both directions
    Active,
    /// Torn down
    Closed,
}

/// Errors that end a session
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("no room given")]
    MissingRoom,

    #[error("failed to get store client: {0}")]
    StoreUnavailable(StoreError),

    #[error("failed to subscribe to room: {0}")]
    Subscribe(StoreError),

    #[error("room subscription ended")]
    SubscriptionLost,

    #[error("write to client failed: {0}")]
    Write(ConnectionError),

    #[error("read from client failed: {0}")]
    Read(ConnectionError),

    #[error("pump task failed: {0}")]
    Task(String),
}

/// Why an inbound frame was not relayed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Not a JSON object
    Malformed,
    /// No string `ephemeralId` field
    MissingEphemeralId,
    /// Pseudonym not registered in the current store
    UnknownPseudonym,
    /// Lookup or publish failed
    StoreFailure,
}

/// What happened to one inbound frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Published to the owner's room; `receivers` sessions got it
    Delivered { receivers: usize },
    Dropped(DropReason),
}

/// Resolve the pseudonym in `raw` and publish `raw` unmodified to the owner's
/// room. Every failure is a drop; none of them end the session.
pub async fn relay_inbound(store: &dyn SignalStore, raw: &str) -> RelayOutcome {
    let message: serde_json::Value = match serde_json::from_str(raw) {
        Ok(value @ serde_json::Value::Object(_)) => value,
        Ok(_) | Err(_) => {
            debug!("Dropping inbound frame that is not a JSON object");
            return RelayOutcome::Dropped(DropReason::Malformed);
        }
    };

    let Some(pseudonym) = message.get(EPHEMERAL_ID_FIELD).and_then(|v| v.as_str()) else {
        debug!("Dropping inbound frame without ephemeralId");
        return RelayOutcome::Dropped(DropReason::MissingEphemeralId);
    };

    let owner = match store.get(pseudonym).await {
        Ok(Some(owner)) => owner,
        Ok(None) => {
            info!(slot = %store.slot(), "Pseudonym not registered, frame dropped");
            return RelayOutcome::Dropped(DropReason::UnknownPseudonym);
        }
        Err(e) => {
            warn!(slot = %store.slot(), error = %e, "Pseudonym lookup failed, frame dropped");
            return RelayOutcome::Dropped(DropReason::StoreFailure);
        }
    };

    match store.publish(&owner, raw).await {
        Ok(receivers) => {
            debug!(receivers, "Frame relayed");
            RelayOutcome::Delivered { receivers }
        }
        Err(e) => {
            warn!(slot = %store.slot(), error = %e, "Publish failed, frame dropped");
            RelayOutcome::Dropped(DropReason::StoreFailure)
        }
    }
}

/// One client connection joined to a room
pub struct RelaySession {
    id: SessionId,
    room: String,
    hour_id: HourId,
    store: Arc<dyn SignalStore>,
    state: watch::Sender<SessionState>,
}

impl RelaySession {
    /// Join `room` using the current hour's store.
    ///
    /// The store is pinned for the lifetime of the session: subscribe, lookup
    /// and publish all go to the store resolved here.
    pub async fn join(
        router: &DualStoreRouter,
        room: Option<String>,
    ) -> Result<Self, SessionError> {
        let room = match room {
            Some(room) if !room.is_empty() => room,
            _ => return Err(SessionError::MissingRoom),
        };
        let (hour_id, store) = router
            .current()
            .await
            .map_err(SessionError::StoreUnavailable)?;
        let (state, _) = watch::channel(SessionState::Joining);

        Ok(Self {
            id: SessionId::new(),
            room,
            hour_id,
            store,
            state,
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    /// Hour bucket whose store the session is pinned to
    pub fn hour_id(&self) -> HourId {
        self.hour_id
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Watch state transitions, including the final `Closed`
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Subscribe to the room, then pump until either side stops or `shutdown`
    /// fires. Always closes `sink` before returning.
    ///
    /// A client hang-up or shutdown ends the session with `Ok`.
    pub async fn run<S, R>(
        self,
        mut sink: S,
        source: R,
        shutdown: CancellationToken,
    ) -> Result<(), SessionError>
    where
        S: FrameSink + 'static,
        R: FrameSource + 'static,
    {
        let span = info_span!(
            "relay_session",
            session_id = %self.id,
            room = %self.room,
            slot = %self.store.slot()
        );

        let subscription = match self
            .store
            .subscribe(&self.room)
            .instrument(span.clone())
            .await
        {
            Ok(subscription) => subscription,
            Err(e) => {
                span.in_scope(|| warn!(error = %e, "Room subscription failed"));
                close_sink(&mut sink).instrument(span).await;
                self.state.send_replace(SessionState::Closed);
                return Err(SessionError::Subscribe(e));
            }
        };

        self.state.send_replace(SessionState::Active);
        span.in_scope(|| info!(hour_id = self.hour_id, "Session active"));

        // Child scope: a pump stopping must not cancel the caller's token
        let scope = shutdown.child_token();
        let sink = Arc::new(Mutex::new(sink));

        let outbound = tokio::spawn(
            store_to_connection(subscription, Arc::clone(&sink), scope.clone())
                .instrument(span.clone()),
        );
        let inbound = tokio::spawn(
            connection_to_store(source, Arc::clone(&self.store), scope.clone())
                .instrument(span.clone()),
        );

        let (outbound, inbound) = tokio::join!(outbound, inbound);
        let result = settle(outbound).and(settle(inbound));

        close_sink(&mut *sink.lock().await)
            .instrument(span.clone())
            .await;
        self.state.send_replace(SessionState::Closed);

        span.in_scope(|| match &result {
            Ok(()) => info!("Session closed"),
            Err(e) => info!(reason = %e, "Session closed on error"),
        });
        result
    }
}

/// Join `room` and run the session, closing `sink` if joining fails
pub async fn serve_connection<S, R>(
    router: &DualStoreRouter,
    room: Option<String>,
    mut sink: S,
    source: R,
    shutdown: CancellationToken,
) -> Result<(), SessionError>
where
    S: FrameSink + 'static,
    R: FrameSource + 'static,
{
    match RelaySession::join(router, room).await {
        Ok(session) => session.run(sink, source, shutdown).await,
        Err(e) => {
            debug!(error = %e, "Rejecting connection");
            close_sink(&mut sink).await;
            Err(e)
        }
    }
}

async fn store_to_connection<S: FrameSink>(
    mut subscription: ChannelSubscription,
    sink: Arc<Mutex<S>>,
    scope: CancellationToken,
) -> Result<(), SessionError> {
    let result = loop {
        let payload = tokio::select! {
            _ = scope.cancelled() => break Ok(()),
            next = subscription.next() => next,
        };
        match payload {
            Some(payload) if payload.is_empty() => continue,
            Some(payload) => {
                let mut sink = sink.lock().await;
                // A stalled client must not hold teardown hostage
                let written = tokio::select! {
                    _ = scope.cancelled() => break Ok(()),
                    written = sink.send_text(payload) => written,
                };
                if let Err(e) = written {
                    break Err(SessionError::Write(e));
                }
            }
            None => break Err(SessionError::SubscriptionLost),
        }
    };

    drop(subscription);
    debug!("Room subscription released");
    scope.cancel();
    result
}

async fn connection_to_store<R: FrameSource>(
    mut source: R,
    store: Arc<dyn SignalStore>,
    scope: CancellationToken,
) -> Result<(), SessionError> {
    let result = loop {
        let frame = tokio::select! {
            _ = scope.cancelled() => break Ok(()),
            frame = source.next_text() => frame,
        };
        match frame {
            Some(Ok(text)) => {
                relay_inbound(store.as_ref(), &text).await;
            }
            Some(Err(e)) => break Err(SessionError::Read(e)),
            None => {
                debug!("Client disconnected");
                break Ok(());
            }
        }
    };

    scope.cancel();
    result
}

fn settle(joined: Result<Result<(), SessionError>, JoinError>) -> Result<(), SessionError> {
    joined.unwrap_or_else(|e| Err(SessionError::Task(e.to_string())))
}

async fn close_sink<S: FrameSink + ?Sized>(sink: &mut S) {
    match tokio::time::timeout(CLOSE_TIMEOUT, sink.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(error = %e, "Closing client connection failed"),
        Err(_) => debug!("Closing client connection timed out"),
    }
}
