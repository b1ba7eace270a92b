//! HTTP dashboard and JSON API
//!
//! ## Endpoints
//!
//! - `GET /` - HTML dashboard
//! - `GET /api` - Full status history of every service
//! - `GET /api/services` - Per-service summary
//! - `GET /api/services/:name` - Status history of one service

#[cfg(feature = "api")]
pub mod error;
#[cfg(feature = "api")]
pub mod routes;
#[cfg(feature = "api")]
pub mod state;
#[cfg(feature = "api")]
pub mod types;

#[cfg(feature = "api")]
pub use error::{ApiError, ApiResult};
#[cfg(feature = "api")]
pub use state::ApiState;
#[cfg(feature = "api")]
pub use types::{ServiceSummary, ServicesResponse};

#[cfg(feature = "api")]
use axum::{Router, routing::get};
use std::net::{Ipv4Addr, SocketAddr};
use tracing::info;

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Bind address (e.g., "0.0.0.0:8080")
    pub bind_addr: SocketAddr,

    /// Enable permissive CORS
    pub enable_cors: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, crate::util::DEFAULT_PORT)),
            enable_cors: false,
        }
    }
}

/// Build the dashboard router
#[cfg(feature = "api")]
pub fn router(config: &ApiConfig, state: ApiState) -> Router {
    use tower_http::cors::{Any, CorsLayer};
    use tower_http::trace::TraceLayer;

    let mut app = Router::new()
        .route("/", get(routes::dashboard::index))
        .route("/api", get(routes::services::history))
        .route("/api/services", get(routes::services::list_services))
        .route("/api/services/:name", get(routes::services::get_service))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if config.enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    app
}

/// Spawn the API server
///
/// This starts an Axum HTTP server in a background task.
/// Returns the server's local address.
#[cfg(feature = "api")]
pub async fn spawn_api_server(config: ApiConfig, state: ApiState) -> anyhow::Result<SocketAddr> {
    use anyhow::Context;

    let app = router(&config, state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind dashboard to {}", config.bind_addr))?;
    let addr = listener.local_addr()?;

    info!("dashboard listening on http://{}", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("API server error: {}", e);
        }
    });

    Ok(addr)
}
