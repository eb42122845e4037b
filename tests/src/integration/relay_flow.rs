//! # Relay Flow
//!
//! Register over HTTP, join rooms as relay sessions over in-process
//! connections, relay by pseudonym, then rotate.
//!
//! ## Flow Tested:
//!
//! 1. **Owner** registers pseudonyms for its room and joins the room
//! 2. **Peer** joins its own room and addresses a frame by pseudonym
//! 3. The frame reaches the owner unmodified; the peer gets nothing back
//! 4. **Rotation** erases the current store; the pseudonym stops resolving

#[cfg(test)]
mod tests {
    use std::time::Duration;
    use tokio::task::JoinHandle;
    use tokio::time::timeout;
    use tokio_util::sync::CancellationToken;

    use crate::fixtures::{key, post_register, register_body, Harness, HOUR};
    use hourglass_relay::adapters::{duplex, ClientEnd};
    use hourglass_relay::relay::serve_connection;
    use hourglass_relay::{
        RelaySession, RotationScheduler, SessionError, SessionState, SignalStore, StoreSlot,
    };

    const WAIT: Duration = Duration::from_secs(2);
    const QUIET: Duration = Duration::from_millis(100);

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    /// Join `room` and wait until the session is subscribed
    async fn connect(
        harness: &Harness,
        room: &str,
        shutdown: &CancellationToken,
    ) -> (ClientEnd, JoinHandle<Result<(), SessionError>>) {
        let router = harness.router();
        let session = RelaySession::join(&router, Some(room.to_string()))
            .await
            .expect("store available");
        let mut state = session.watch_state();
        let (sink, source, client) = duplex(16);
        let task = tokio::spawn(session.run(sink, source, shutdown.clone()));

        timeout(WAIT, state.wait_for(|s| *s == SessionState::Active))
            .await
            .expect("session became active in time")
            .expect("session state still observable");
        (client, task)
    }

    fn offer(pseudonym: &str) -> String {
        format!(r#"{{"ephemeralId":"{}","type":"offer","sdp":"v=0 X"}}"#, pseudonym)
    }

    async fn register_owner(harness: &Harness, pseudonyms: &[String], room: &str) {
        // Owner identity doubles as its room name
        let (status, body) =
            post_register(harness.app(), register_body(pseudonyms, room, HOUR)).await;
        assert!(status.is_success(), "registration failed: {status} {body}");
    }

    // =============================================================================
    // INTEGRATION TESTS: REGISTER → RELAY
    // =============================================================================

    #[tokio::test]
    async fn test_registered_pseudonym_routes_to_owner_room() {
        let harness = Harness::new();
        let owner_room = key(0x10);
        let pseudonym = "ab".repeat(32);
        register_owner(&harness, &[pseudonym.clone()], &owner_room).await;

        let shutdown = CancellationToken::new();
        let (mut owner, owner_task) = connect(&harness, &owner_room, &shutdown).await;
        let (mut peer, peer_task) = connect(&harness, &key(0x20), &shutdown).await;

        let frame = offer(&pseudonym);
        peer.send(frame.clone()).await.unwrap();

        assert_eq!(timeout(WAIT, owner.recv()).await.unwrap(), Some(frame));
        assert!(timeout(QUIET, peer.recv()).await.is_err());

        shutdown.cancel();
        assert!(owner_task.await.unwrap().is_ok());
        assert!(peer_task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_any_registered_pseudonym_reaches_the_same_owner() {
        let harness = Harness::new();
        let owner_room = key(0x11);
        let pseudonyms = vec![key(0x01), key(0x02), key(0x03)];
        register_owner(&harness, &pseudonyms, &owner_room).await;

        let shutdown = CancellationToken::new();
        let (mut owner, _owner_task) = connect(&harness, &owner_room, &shutdown).await;
        let (peer, _peer_task) = connect(&harness, &key(0x21), &shutdown).await;

        for pseudonym in &pseudonyms {
            peer.send(offer(pseudonym)).await.unwrap();
        }
        // Per-channel order is preserved
        for pseudonym in &pseudonyms {
            assert_eq!(
                timeout(WAIT, owner.recv()).await.unwrap(),
                Some(offer(pseudonym))
            );
        }
        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_unregistered_pseudonym_is_dropped_and_sender_stays() {
        let harness = Harness::new();
        let owner_room = key(0x12);
        let shutdown = CancellationToken::new();
        let (mut owner, _owner_task) = connect(&harness, &owner_room, &shutdown).await;
        let (peer, peer_task) = connect(&harness, &key(0x22), &shutdown).await;

        peer.send(offer(&key(0x99))).await.unwrap();
        peer.send(r#"{"sdp":"no pseudonym"}"#).await.unwrap();
        peer.send("not even json").await.unwrap();
        assert!(timeout(QUIET, owner.recv()).await.is_err());
        assert!(!peer_task.is_finished());

        register_owner(&harness, &[key(0x99)], &owner_room).await;
        peer.send(offer(&key(0x99))).await.unwrap();
        assert_eq!(
            timeout(WAIT, owner.recv()).await.unwrap(),
            Some(offer(&key(0x99)))
        );
        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_owner_disconnect_releases_room() {
        let harness = Harness::new();
        let owner_room = key(0x13);
        let store = harness.store(StoreSlot::B);
        let shutdown = CancellationToken::new();

        let (mut owner, owner_task) = connect(&harness, &owner_room, &shutdown).await;
        assert_eq!(store.subscriber_count(&owner_room).await.unwrap(), 1);

        owner.hang_up();
        timeout(WAIT, owner_task).await.unwrap().unwrap().unwrap();
        assert_eq!(store.subscriber_count(&owner_room).await.unwrap(), 0);

        // Nobody left to receive
        register_owner(&harness, &[key(0x42)], &owner_room).await;
        let (peer, _peer_task) = connect(&harness, &key(0x23), &shutdown).await;
        peer.send(offer(&key(0x42))).await.unwrap();
        tokio::time::sleep(QUIET).await;
        assert_eq!(store.subscriber_count(&owner_room).await.unwrap(), 0);
        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_missing_room_closes_connection() {
        let harness = Harness::new();
        let router = harness.router();
        let (sink, source, mut client) = duplex(4);

        let result =
            serve_connection(&router, None, sink, source, CancellationToken::new()).await;
        assert_eq!(result, Err(SessionError::MissingRoom));
        assert_eq!(client.recv().await, None);
    }

    // =============================================================================
    // INTEGRATION TESTS: ROTATION
    // =============================================================================

    #[tokio::test]
    async fn test_rotation_erases_current_store_only() {
        let harness = Harness::new();
        // Previous hour goes to store A, current hour to store B
        let (status, _) = post_register(
            harness.app(),
            register_body(&[key(0x01)], &key(0x0a), HOUR - 1),
        )
        .await;
        assert!(status.is_success());
        register_owner(&harness, &[key(0x02)], &key(0x0b)).await;

        let scheduler = RotationScheduler::new(harness.router());
        assert_eq!(scheduler.erase_current().await.unwrap(), StoreSlot::B);

        assert!(harness.store(StoreSlot::B).is_empty());
        assert_eq!(
            harness.store(StoreSlot::A).get(&key(0x01)).await.unwrap(),
            Some(key(0x0a))
        );

        // Next hour's erase takes store A
        harness.clock.advance_secs(3600);
        assert_eq!(scheduler.erase_current().await.unwrap(), StoreSlot::A);
        assert!(harness.store(StoreSlot::A).is_empty());
    }

    #[tokio::test]
    async fn test_erased_pseudonym_no_longer_relays() {
        let harness = Harness::new();
        let owner_room = key(0x14);
        register_owner(&harness, &[key(0x77)], &owner_room).await;

        let shutdown = CancellationToken::new();
        let (mut owner, _owner_task) = connect(&harness, &owner_room, &shutdown).await;
        let (peer, peer_task) = connect(&harness, &key(0x24), &shutdown).await;

        RotationScheduler::new(harness.router())
            .erase_current()
            .await
            .unwrap();

        peer.send(offer(&key(0x77))).await.unwrap();
        assert!(timeout(QUIET, owner.recv()).await.is_err());
        assert!(!peer_task.is_finished());
        shutdown.cancel();
    }
}
