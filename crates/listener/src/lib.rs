//! Inbound HTTP boundary.
//!
//! Exposes [`nodes::PetitionService`] as a JSON API:
//!
//! | Method | Path                      | Operation                   |
//! |--------|---------------------------|-----------------------------|
//! | POST   | `/petitions`              | submit a request            |
//! | GET    | `/petitions`              | list summaries (filtered)   |
//! | GET    | `/petitions/{id}`         | fetch a petition and trail  |
//! | GET    | `/petitions/{id}/history` | trail joined with agents    |
//! | GET    | `/agents`                 | list agents (filtered)      |
//! | POST   | `/agents`                 | register an agent           |
//! | GET    | `/petition-types`         | catalog of petition types   |
//! | GET    | `/health`                 | liveness                    |
//!
//! Each submission runs on its own task; if the client goes away before the
//! pipeline finishes, the run is cancelled and the petition stored as failed.
//! Errors are mapped to status codes by [`ApiError`].

use std::future::Future;

use tokio::net::TcpListener;

pub mod error;
pub mod routes;

pub use error::ApiError;
pub use routes::{router, AppState, SubmitResponse};

/// Serves `app` on `listener` until `shutdown` resolves, then drains
/// in-flight requests.
pub async fn serve<F>(listener: TcpListener, app: axum::Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "petition API listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    tracing::info!("petition API stopped");
    Ok(())
}
