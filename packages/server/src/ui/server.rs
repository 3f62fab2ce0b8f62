//! Server execution logic.

use std::sync::Arc;

use axum::{Router, middleware, routing::get};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use super::{
    handler::{get_message_history, health_check, websocket_handler},
    middleware::require_auth,
    signal::shutdown_signal,
    state::AppState,
};

/// Builds the router: the health check is public, everything else sits behind the auth gate.
pub fn router(state: Arc<AppState>) -> Router {
    let authenticated = Router::new()
        // WebSocket エンドポイント
        .route("/ws/{user_id}", get(websocket_handler))
        // HTTP エンドポイント
        .route("/api/projects/{project_id}/messages", get(get_message_history))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/api/health", get(health_check))
        .merge(authenticated)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// WebSocket fan-out server
///
/// # Example
///
/// ```ignore
/// let instance = Instance::start(&config, collaborators);
/// Server::new(instance.state()).run("127.0.0.1".to_string(), 8080).await?;
/// ```
pub struct Server {
    state: Arc<AppState>,
}

impl Server {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Binds `host:port` and serves until Ctrl+C / SIGTERM.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to the specified address or
    /// if there's an error during server execution.
    pub async fn run(self, host: String, port: u16) -> Result<(), Box<dyn std::error::Error>> {
        let bind_addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&bind_addr).await?;

        tracing::info!("Fan-out server listening on {}", listener.local_addr()?);
        tracing::info!("Connect to: ws://{}/ws/{{user_id}}", bind_addr);
        tracing::info!("Press Ctrl+C to shutdown gracefully");

        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");

        Ok(())
    }

    /// Serves on an already bound listener without a shutdown signal.
    pub async fn serve(self, listener: TcpListener) -> std::io::Result<()> {
        axum::serve(listener, router(self.state)).await
    }
}
