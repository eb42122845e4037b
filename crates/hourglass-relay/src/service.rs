//! Relay service: HTTP surface, WebSocket relay and rotation host.
//!
//! Routes:
//! - `POST /register`: pseudonym registration, 202 on success
//! - `GET /ws?room=<name>`: WebSocket upgrade into a relay session
//! - `GET /health`: liveness
//! - optional static client assets as the fallback

use axum::{
    body::Bytes,
    extract::{ws::WebSocketUpgrade, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::adapters::memory_store::MemoryConnector;
use crate::adapters::redis_store::RedisConnector;
use crate::adapters::websocket::split_socket;
use crate::domain::config::{RelayConfig, StoreBackend};
use crate::domain::error::{ApiError, ApiResult, RelayError};
use crate::domain::hour::HourId;
use crate::ports::clock::{Clock, SystemClock};
use crate::ports::store::StoreConnector;
use crate::registrar::PseudonymRegistrar;
use crate::relay::session::serve_connection;
use crate::rotation::RotationScheduler;
use crate::router::DualStoreRouter;

/// Body of `POST /register`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub ephemeral_contact_keys_list: Vec<String>,
    pub temp_ephemeral_user_id: String,
    pub hour_id: HourId,
}

/// Query string of `GET /ws`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JoinParams {
    pub room: Option<String>,
}

/// The relay process: one store router shared by every request, session and
/// the rotation scheduler.
pub struct RelayService {
    config: RelayConfig,
    router: Arc<DualStoreRouter>,
    registrar: Arc<PseudonymRegistrar>,
    shutdown: CancellationToken,
}

impl RelayService {
    /// Build from configuration, using the system clock and the configured
    /// store backend.
    pub fn new(config: RelayConfig) -> Result<Self, RelayError> {
        config.validate()?;
        let connector: Arc<dyn StoreConnector> = match config.stores.backend {
            StoreBackend::Redis => Arc::new(RedisConnector::new(config.stores.clone())),
            StoreBackend::Memory => {
                Arc::new(MemoryConnector::new(config.relay.channel_capacity))
            }
        };
        Self::with_connector(config, connector, Arc::new(SystemClock))
    }

    /// Build with an explicit store connector and clock
    pub fn with_connector(
        config: RelayConfig,
        connector: Arc<dyn StoreConnector>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, RelayError> {
        config.validate()?;
        let router = Arc::new(DualStoreRouter::new(connector, clock));
        let registrar = Arc::new(PseudonymRegistrar::new(Arc::clone(&router)));

        Ok(Self {
            config,
            router,
            registrar,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn store_router(&self) -> Arc<DualStoreRouter> {
        Arc::clone(&self.router)
    }

    /// Token that stops the server, the scheduler and every session
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Build the HTTP router
    pub fn http_router(&self) -> Router {
        let state = AppState {
            router: Arc::clone(&self.router),
            registrar: Arc::clone(&self.registrar),
            shutdown: self.shutdown.clone(),
            max_message_size: self.config.relay.max_message_size,
        };

        let app = Router::new()
            .route("/register", post(register))
            .route("/ws", get(join_room))
            .route("/health", get(health_check))
            .with_state(state);

        let app = match &self.config.http.static_dir {
            Some(dir) => {
                debug!(dir = %dir.display(), "Serving static assets");
                app.fallback_service(ServeDir::new(dir))
            }
            None => app,
        };

        app.layer(TraceLayer::new_for_http())
    }

    /// Bind the configured address and serve until shutdown
    pub async fn serve(self) -> Result<(), RelayError> {
        let addr = self.config.http_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| RelayError::Bind(format!("{addr}: {e}")))?;
        self.serve_on(listener).await
    }

    /// Serve on an already bound listener.
    ///
    /// On the rotation host the scheduler runs alongside the server. If it
    /// fails, everything is shut down and its error is returned.
    pub async fn serve_on(self, listener: TcpListener) -> Result<(), RelayError> {
        let addr = listener
            .local_addr()
            .map_err(|e| RelayError::Bind(e.to_string()))?;
        let app = self.http_router();
        let shutdown = self.shutdown.clone();

        let scheduler = self
            .config
            .rotation
            .enabled
            .then(|| RotationScheduler::new(Arc::clone(&self.router)));
        info!(
            addr = %addr,
            backend = ?self.config.stores.backend,
            rotation_host = scheduler.is_some(),
            "Starting relay"
        );

        let server_shutdown = shutdown.clone();
        let server = async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
                .await
                .map_err(|e| RelayError::Serve(e.to_string()))
        };

        let rotation = async {
            if let Some(scheduler) = scheduler {
                if let Err(e) = scheduler.run(shutdown.clone()).await {
                    error!(error = %e, "Rotation failed, shutting down");
                    shutdown.cancel();
                    return Err(RelayError::Rotation(e));
                }
            }
            Ok(())
        };

        let (served, rotated) = tokio::join!(server, rotation);
        rotated?;
        served?;

        info!("Relay stopped");
        Ok(())
    }
}

/// State shared across handlers
#[derive(Clone)]
struct AppState {
    router: Arc<DualStoreRouter>,
    registrar: Arc<PseudonymRegistrar>,
    shutdown: CancellationToken,
    max_message_size: usize,
}

/// Handle `POST /register`.
///
/// Parses the raw body so the client's content type does not matter.
async fn register(State(state): State<AppState>, body: Bytes) -> ApiResult<StatusCode> {
    let request: RegisterRequest = serde_json::from_slice(&body).map_err(|e| {
        debug!(error = %e, "Rejecting malformed registration body");
        ApiError::invalid_json(e)
    })?;

    if let Err(e) = state.router.validate_hour_id(request.hour_id) {
        debug!(hour_id = request.hour_id, "Rejecting registration outside hour window");
        return Err(e.into());
    }

    match state
        .registrar
        .register(
            &request.ephemeral_contact_keys_list,
            &request.temp_ephemeral_user_id,
            request.hour_id,
        )
        .await
    {
        Ok(count) => {
            debug!(hour_id = request.hour_id, count, "Registration accepted");
            Ok(StatusCode::ACCEPTED)
        }
        Err(e) if e.is_client_error() => {
            debug!(error = %e, "Rejecting invalid registration");
            Err(e.into())
        }
        Err(e) => {
            warn!(hour_id = request.hour_id, error = %e, "Registration failed");
            Err(e.into())
        }
    }
}

/// Handle `GET /ws`: upgrade, then run a relay session for the room
async fn join_room(
    State(state): State<AppState>,
    Query(params): Query<JoinParams>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.max_message_size(state.max_message_size)
        .on_upgrade(move |socket| async move {
            let (sink, source) = split_socket(socket);
            if let Err(e) = serve_connection(
                &state.router,
                params.room,
                sink,
                source,
                state.shutdown.clone(),
            )
            .await
            {
                debug!(error = %e, "Relay session ended");
            }
        })
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}
