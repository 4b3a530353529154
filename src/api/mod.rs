//! HTTP endpoints for the Scratch 2 extension
//!
//! Scratch polls `/poll` about 30 times per second and sends command blocks
//! as path segments (`/setGPIO/2/true`). Every request gets `200 OK`, errors
//! are reported through the `_problem` reporter instead.
//! Default port: 8080

use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    routing::any,
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::{debug, info};

use crate::bridge::{Bridge, Command};

/// Default listen port (must match the extension descriptor)
pub const DEFAULT_API_PORT: u16 = 8080;

/// Shared state for API handlers
pub struct ApiState {
    pub bridge: Arc<Bridge>,
    /// Port advertised in the cross-domain policy
    pub port: u16,
}

/// Build the API router
pub fn build_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/poll", any(poll))
        .route("/reset_all", any(reset_all))
        .route("/crossdomain.xml", any(cross_domain_policy))
        .route("/:action/:id/:argument", any(command))
        .fallback(ignored)
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
        .with_state(state)
}

/// GET /poll - reporter values, one `name value` per line
async fn poll(State(state): State<Arc<ApiState>>) -> String {
    state.bridge.poll()
}

/// GET /reset_all - sent when the Scratch stop button is pressed
async fn reset_all(State(state): State<Arc<ApiState>>) -> &'static str {
    state.bridge.reset();
    ""
}

/// GET /crossdomain.xml - Flash player policy
async fn cross_domain_policy(State(state): State<Arc<ApiState>>) -> String {
    debug!("Cross domain policy requested");
    cross_domain_xml(state.port)
}

fn cross_domain_xml(port: u16) -> String {
    format!(
        r#"<cross-domain-policy><allow-access-from domain="*" to-ports="{}"/></cross-domain-policy>"#,
        port
    )
}

/// GET /:action/:id/:argument - command blocks
async fn command(
    Path((action, id, argument)): Path<(String, String, String)>,
    State(state): State<Arc<ApiState>>,
) -> &'static str {
    debug!("Scratch request: /{}/{}/{}", action, id, argument);

    match Command::parse(&action, &id, &argument) {
        Some(command) => state.bridge.execute(command).await,
        None => debug!("Unknown command {:?}", action),
    }
    ""
}

async fn ignored() -> &'static str {
    ""
}

/// Start the API server
pub async fn start_server(state: Arc<ApiState>, port: u16) -> Result<()> {
    let router = build_router(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!("Listening for Scratch on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind API server")?;

    axum::serve(listener, router)
        .await
        .context("API server error")?;

    Ok(())
}
