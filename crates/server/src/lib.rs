//! HTTP inference service for llamaserve.
//!
//! Exposes the loaded model over two routes:
//! - `GET /` connectivity check
//! - `POST /llama` step-by-step answer for `{"text": ...}`

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use handlers::{Answer, InputText};
pub use routes::{create_router, create_router_with_middleware};
pub use state::{AppState, GenerationSettings, SharedState};

use llamaserve_core::{AppError, AppResult};

/// Bind `address` and serve until Ctrl+C or SIGTERM.
pub async fn serve(state: SharedState, address: &str) -> AppResult<()> {
    let app = create_router_with_middleware(state);

    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|e| AppError::Config(format!("Failed to bind {}: {}", address, e)))?;
    let local = listener.local_addr()?;
    tracing::info!("Server listening on http://{}", local);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
    }
}
