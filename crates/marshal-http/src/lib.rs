//! The HTTP adapter (C8): a thin `axum` front door onto the Governor's
//! admission façade and read-only table snapshots. Explicitly out of the
//! Governor's core per spec.md §1, but its exact shape is dictated by §6
//! and exercised directly by §8's scenarios, so it lives here rather than
//! as prose.

mod dto;
mod error;
mod routes;

pub use dto::{NodeInfoResponse, SubmitTaskRequest, SubmitTaskResponse, TaskStatus, TaskStatusResponse};
pub use error::ApiError;
pub use routes::router;

use std::net::SocketAddr;

use marshal_core::GovernorHandle;
use tokio::net::TcpListener;
use tracing::info;

/// Binds `addr` and serves the router until `shutdown` resolves, mirroring
/// `commonware-node::metrics::install`'s `TcpListener` + `axum::serve`
/// shape.
pub async fn serve(
    addr: SocketAddr,
    governor: GovernorHandle,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "http adapter listening");
    axum::serve(listener, router(governor).into_make_service())
        .with_graceful_shutdown(shutdown)
        .await
}
