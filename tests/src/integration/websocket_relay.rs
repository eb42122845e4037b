//! # WebSocket Relay
//!
//! Runs the relay on a loopback listener and drives `/ws` with real WebSocket
//! clients, covering the upgrade, frame decoding and close handling.

#[cfg(test)]
mod tests {
    use futures::{SinkExt, StreamExt};
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;
    use tokio::time::timeout;
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
    use tokio_util::sync::CancellationToken;

    use crate::fixtures::{key, post_register, register_body, Harness, HOUR};
    use hourglass_relay::adapters::MemoryStore;
    use hourglass_relay::{RelayError, SignalStore, StoreSlot};

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    const WAIT: Duration = Duration::from_secs(2);
    const QUIET: Duration = Duration::from_millis(100);

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    struct LiveRelay {
        addr: SocketAddr,
        store: Arc<MemoryStore>,
        shutdown: CancellationToken,
        task: JoinHandle<Result<(), RelayError>>,
    }

    impl LiveRelay {
        /// Register `pseudonym` for `owner_room`, then serve on a loopback port
        async fn start(pseudonym: &str, owner_room: &str) -> Self {
            let harness = Harness::new();
            let (status, body) = post_register(
                harness.app(),
                register_body(&[pseudonym.to_string()], owner_room, HOUR),
            )
            .await;
            assert!(status.is_success(), "registration failed: {status} {body}");

            let Harness {
                service, connector, ..
            } = harness;
            let shutdown = service.shutdown_token();
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let task = tokio::spawn(service.serve_on(listener));

            Self {
                addr,
                store: connector.store(StoreSlot::B),
                shutdown,
                task,
            }
        }

        async fn connect(&self, query: &str) -> Client {
            let url = format!("ws://{}/ws{}", self.addr, query);
            let (client, _) = timeout(WAIT, connect_async(url))
                .await
                .expect("handshake in time")
                .expect("upgrade accepted");
            client
        }

        /// Connect to `room` and wait until its session is subscribed
        async fn join(&self, room: &str) -> Client {
            let before = self.store.subscriber_count(room).await.unwrap();
            let client = self.connect(&format!("?room={room}")).await;
            self.wait_for_subscribers(room, before + 1).await;
            client
        }

        async fn wait_for_subscribers(&self, room: &str, expected: usize) {
            let reached = timeout(WAIT, async {
                while self.store.subscriber_count(room).await.unwrap() != expected {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            })
            .await;
            assert!(reached.is_ok(), "room {room} never had {expected} subscribers");
        }

        async fn stop(self) {
            self.shutdown.cancel();
            let result = timeout(Duration::from_secs(10), self.task)
                .await
                .expect("relay stopped in time")
                .unwrap();
            assert!(result.is_ok(), "relay failed: {result:?}");
        }
    }

    /// Next text frame the server wrote, skipping control frames
    async fn next_text(client: &mut Client) -> Option<String> {
        loop {
            match timeout(WAIT, client.next()).await.expect("frame in time")? {
                Ok(Message::Text(text)) => return Some(text.as_str().to_owned()),
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
                Ok(_) | Err(_) => return None,
            }
        }
    }

    fn offer(pseudonym: &str) -> String {
        format!(r#"{{"ephemeralId":"{pseudonym}","sdp":"X"}}"#)
    }

    // =============================================================================
    // INTEGRATION TESTS
    // =============================================================================

    #[tokio::test]
    async fn test_join_without_room_is_closed_immediately() {
        let relay = LiveRelay::start(&key(0x01), &key(0x10)).await;

        for query in ["", "?room="] {
            let mut client = relay.connect(query).await;
            let first = timeout(WAIT, client.next()).await.expect("close in time");
            assert!(
                matches!(first, None | Some(Ok(Message::Close(_)))),
                "query {query:?} got {first:?}"
            );
        }
        relay.stop().await;
    }

    #[tokio::test]
    async fn test_text_frame_reaches_owner_verbatim() {
        let pseudonym = "ab".repeat(32);
        let owner_room = key(0x10);
        let relay = LiveRelay::start(&pseudonym, &owner_room).await;

        let mut owner = relay.join(&owner_room).await;
        let mut peer = relay.join(&key(0x20)).await;

        let frame = offer(&pseudonym);
        peer.send(Message::text(frame.clone())).await.unwrap();
        assert_eq!(next_text(&mut owner).await, Some(frame));

        // Nothing echoes back to the sender
        assert!(timeout(QUIET, peer.next()).await.is_err());
        relay.stop().await;
    }

    #[tokio::test]
    async fn test_binary_frame_is_relayed_as_text() {
        let pseudonym = "ab".repeat(32);
        let owner_room = key(0x11);
        let relay = LiveRelay::start(&pseudonym, &owner_room).await;

        let mut owner = relay.join(&owner_room).await;
        let mut peer = relay.join(&key(0x21)).await;

        let frame = offer(&pseudonym);
        peer.send(Message::Ping(Vec::new().into())).await.unwrap();
        peer.send(Message::binary(frame.clone().into_bytes()))
            .await
            .unwrap();
        assert_eq!(next_text(&mut owner).await, Some(frame));
        relay.stop().await;
    }

    #[tokio::test]
    async fn test_owner_close_releases_subscription() {
        let owner_room = key(0x12);
        let relay = LiveRelay::start(&key(0x02), &owner_room).await;

        let mut owner = relay.join(&owner_room).await;
        assert_eq!(relay.store.subscriber_count(&owner_room).await.unwrap(), 1);

        owner.close(None).await.unwrap();
        relay.wait_for_subscribers(&owner_room, 0).await;
        relay.stop().await;
    }

    #[tokio::test]
    async fn test_shutdown_closes_open_sockets() {
        let owner_room = key(0x13);
        let relay = LiveRelay::start(&key(0x03), &owner_room).await;
        let mut owner = relay.join(&owner_room).await;

        relay.shutdown.cancel();
        assert_eq!(next_text(&mut owner).await, None);
        let result = timeout(Duration::from_secs(10), relay.task)
            .await
            .expect("relay stopped in time")
            .unwrap();
        assert!(result.is_ok());
    }
}
