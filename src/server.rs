//! HTTP host. Mounts enabled services and drives the axum event loop.
//!
//! The shared [`CancellationToken`] is wired to axum's graceful shutdown;
//! `main` cancels it on Ctrl-C.

use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::error::AppError;
use crate::services::Service;
use crate::settings::Settings;

/// Merge the routers of every enabled service.
pub fn build_router(services: &[Box<dyn Service>], settings: Arc<Settings>) -> Router {
    let mut router = Router::new();
    for svc in services {
        match svc.routes(settings.clone()) {
            Some(routes) => {
                info!(service = svc.id(), comment = svc.comment(), "service enabled");
                router = router.merge(routes);
            }
            None => debug!(service = svc.id(), "service disabled"),
        }
    }
    router.layer(TraceLayer::new_for_http())
}

/// Bind `bind_addr` and serve `router` until `shutdown` is cancelled.
pub async fn serve(
    bind_addr: &str,
    router: Router,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    let listener = TcpListener::bind(bind_addr)
        .await
        .map_err(|e| AppError::Server(format!("bind failed on {bind_addr}: {e}")))?;

    let local = listener
        .local_addr()
        .map_err(|e| AppError::Server(format!("no local address for {bind_addr}: {e}")))?;
    info!(%local, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| AppError::Server(format!("axum server error: {e}")))?;

    info!("server shut down");
    Ok(())
}
