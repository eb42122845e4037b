//! # HTTP Surface
//!
//! `POST /register` status mapping, `/health`, the `/ws` route and the static
//! asset fallback, driven through the axum router with `oneshot`.

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use proptest::prelude::*;

    use std::collections::HashSet;

    use crate::fixtures::{
        key, keys, memory_config, post_register, register_body, send, Harness, HOUR,
    };
    use hourglass_relay::{SignalStore, StoreSlot};

    // =============================================================================
    // REGISTRATION
    // =============================================================================

    #[tokio::test]
    async fn test_register_current_hour_lands_in_even_store() {
        let harness = Harness::new();
        let pseudonyms = keys(3);

        let (status, body) =
            post_register(harness.app(), register_body(&pseudonyms, &key(0xee), HOUR)).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert!(body.is_empty());

        let store_b = harness.store(StoreSlot::B);
        for pseudonym in &pseudonyms {
            assert_eq!(store_b.get(pseudonym).await.unwrap(), Some(key(0xee)));
        }
        assert!(harness.store(StoreSlot::A).is_empty());
    }

    #[tokio::test]
    async fn test_register_previous_hour_lands_in_odd_store() {
        let harness = Harness::new();
        let (status, _) =
            post_register(harness.app(), register_body(&keys(1), &key(1), HOUR - 1)).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(harness.store(StoreSlot::A).len(), 1);
        assert!(harness.store(StoreSlot::B).is_empty());
    }

    #[tokio::test]
    async fn test_register_without_content_type() {
        let harness = Harness::new();
        let request = Request::post("/register")
            .body(Body::from(register_body(&keys(1), &key(1), HOUR)))
            .unwrap();
        let (status, _) = send(harness.app(), request).await;
        assert_eq!(status, StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let harness = Harness::new();
        let (status, body) = post_register(harness.app(), "{not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.starts_with("invalid JSON"), "body: {body}");

        let (status, _) = post_register(harness.app(), r#"{"hourId": 1}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_out_of_window_hour_names_both_bounds() {
        let harness = Harness::new();
        for hour_id in [HOUR + 1, HOUR - 2] {
            let (status, body) =
                post_register(harness.app(), register_body(&keys(1), &key(1), hour_id)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert!(body.contains(&HOUR.to_string()), "body: {body}");
            assert!(body.contains(&(HOUR - 1).to_string()), "body: {body}");
        }
        assert!(harness.store(StoreSlot::A).is_empty());
        assert!(harness.store(StoreSlot::B).is_empty());
    }

    #[tokio::test]
    async fn test_validation_failures_are_bad_request() {
        let harness = Harness::new();
        let cases = [
            register_body(&keys(1), "short", HOUR),
            register_body(&[], &key(1), HOUR),
            register_body(&keys(257), &key(1), HOUR),
            register_body(&[key(0xAB).to_uppercase()], &key(1), HOUR),
        ];

        let mut reasons = Vec::new();
        for body in cases {
            let (status, reason) = post_register(harness.app(), body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            reasons.push(reason);
        }
        assert_eq!(reasons[1], "ephemeralContactKeysList is empty");
        let distinct: HashSet<_> = reasons.iter().collect();
        assert_eq!(distinct.len(), 4, "reasons must be distinct: {reasons:?}");
        assert!(harness.store(StoreSlot::B).is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_is_internal_error() {
        let harness = Harness::new();
        harness.store(StoreSlot::B).set_offline(true);

        let (status, body) =
            post_register(harness.app(), register_body(&keys(2), &key(1), HOUR)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.starts_with("failed to register user"), "body: {body}");
    }

    #[tokio::test]
    async fn test_register_rejects_other_methods() {
        let harness = Harness::new();
        for method in [Method::GET, Method::PUT, Method::DELETE] {
            let request = Request::builder()
                .method(method.clone())
                .uri("/register")
                .body(Body::empty())
                .unwrap();
            let (status, _) = send(harness.app(), request).await;
            assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED, "method {method}");
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_only_current_and_previous_hours_accepted(offset in -50i64..50) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let harness = Harness::new();
            let (status, _) = runtime.block_on(post_register(
                harness.app(),
                register_body(&keys(1), &key(7), HOUR + offset),
            ));
            if offset == 0 || offset == -1 {
                prop_assert_eq!(status, StatusCode::ACCEPTED);
            } else {
                prop_assert_eq!(status, StatusCode::BAD_REQUEST);
            }
        }
    }

    // =============================================================================
    // OTHER ROUTES
    // =============================================================================

    #[tokio::test]
    async fn test_health() {
        let harness = Harness::new();
        let (status, body) = send(
            harness.app(),
            Request::get("/health").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_ws_requires_upgrade() {
        let harness = Harness::new();
        let (status, _) = send(
            harness.app(),
            Request::get("/ws?room=room1").body(Body::empty()).unwrap(),
        )
        .await;
        assert!(status.is_client_error(), "status {status}");
    }

    #[tokio::test]
    async fn test_unknown_route_without_static_dir() {
        let harness = Harness::new();
        let (status, _) = send(
            harness.app(),
            Request::get("/index.html").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_static_dir_is_fallback() {
        let dir = std::env::temp_dir().join(format!("hourglass-static-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("index.html"), "<h1>hourglass</h1>").unwrap();

        let mut config = memory_config();
        config.http.static_dir = Some(dir.clone());
        let harness = Harness::with_config(config);

        let (status, body) = send(
            harness.app(),
            Request::get("/index.html").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "<h1>hourglass</h1>");

        // API routes still win over the fallback
        let (status, _) = send(
            harness.app(),
            Request::get("/health").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
